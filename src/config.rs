use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::HashKind;
use crate::types::Signature;

/// default namespace for notes when none is configured
pub const DEFAULT_NOTES_REF: &str = "refs/notes/commits";

/// default branch HEAD points at after init
pub const DEFAULT_BRANCH: &str = "main";

/// repository configuration stored in config.toml
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,
    /// identity used when callers do not supply a signature
    #[serde(default, skip_serializing_if = "UserConfig::is_empty")]
    pub user: UserConfig,
    #[serde(default)]
    pub notes: NotesConfig,
    /// configured remotes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remotes: Vec<Remote>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub bare: bool,
    /// digest used for object ids
    #[serde(default)]
    pub hash: HashKind,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            bare: false,
            hash: HashKind::default(),
            default_branch: default_branch(),
        }
    }
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserConfig {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ref: Option<String>,
}

impl Config {
    /// create a config for a fresh repository
    pub fn new(bare: bool) -> Self {
        Self {
            core: CoreConfig {
                bare,
                ..CoreConfig::default()
            },
            ..Self::default()
        }
    }

    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.core.default_branch.is_empty() {
            return Err(Error::InvalidConfig("core.default_branch is empty".to_string()));
        }
        if let Some(notes_ref) = &self.notes.default_ref {
            if !notes_ref.starts_with("refs/") {
                return Err(Error::InvalidConfig(format!(
                    "notes.default_ref must live under refs/: {}",
                    notes_ref
                )));
            }
        }
        Ok(())
    }

    /// notes namespace used when the caller does not name one
    pub fn default_notes_ref(&self) -> &str {
        self.notes.default_ref.as_deref().unwrap_or(DEFAULT_NOTES_REF)
    }

    /// configured user identity stamped with the current time
    pub fn default_signature(&self) -> Option<Result<Signature>> {
        let name = self.user.name.as_ref()?;
        let email = self.user.email.as_ref()?;
        Some(Signature::now(name.clone(), email.clone()))
    }

    /// add a remote
    pub fn add_remote(&mut self, name: impl Into<String>, url: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidConfig(format!("invalid remote name: {:?}", name)));
        }
        if self.remotes.iter().any(|r| r.name == name) {
            return Err(Error::RemoteExists(name));
        }
        self.remotes.push(Remote {
            name,
            url: url.into(),
        });
        Ok(())
    }

    /// remove a remote
    pub fn remove_remote(&mut self, name: &str) -> Result<()> {
        let pos = self
            .remotes
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| Error::RemoteNotFound(name.to_string()))?;
        self.remotes.remove(pos);
        Ok(())
    }

    /// get remote by name
    pub fn get_remote(&self, name: &str) -> Option<&Remote> {
        self.remotes.iter().find(|r| r.name == name)
    }
}

/// a configured remote repository
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

impl Remote {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = Config::new(true);
        config.core.hash = HashKind::Sha256;
        config.user.name = Some("Alice".to_string());
        config.user.email = Some("alice@example.com".to_string());
        config.notes.default_ref = Some("refs/notes/review".to_string());
        config.remotes = vec![
            Remote::new("origin", "/srv/grove/origin"),
            Remote::new("backup", "/mnt/backup/grove"),
        ];

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_add_remove_remote() {
        let mut config = Config::default();

        config.add_remote("origin", "/srv/a").unwrap();
        assert_eq!(config.remotes.len(), 1);

        // duplicate should fail
        assert!(matches!(
            config.add_remote("origin", "/srv/b"),
            Err(Error::RemoteExists(_))
        ));
        assert!(config.add_remote("bad/name", "/srv/b").is_err());

        let r = config.get_remote("origin").unwrap();
        assert_eq!(r.url, "/srv/a");

        config.remove_remote("origin").unwrap();
        assert!(config.remotes.is_empty());

        assert!(matches!(
            config.remove_remote("origin"),
            Err(Error::RemoteNotFound(_))
        ));
    }

    #[test]
    fn test_config_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert!(!config.core.bare);
        assert_eq!(config.core.hash, HashKind::Sha1);
        assert_eq!(config.core.default_branch, "main");
        assert_eq!(config.default_notes_ref(), DEFAULT_NOTES_REF);
        assert!(config.remotes.is_empty());
        assert!(config.default_signature().is_none());
    }

    #[test]
    fn test_config_rejects_bad_notes_ref() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[notes]\ndefault_ref = \"notes/mine\"\n").unwrap();

        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_default_signature_from_user() {
        let mut config = Config::default();
        config.user.name = Some("Bob".to_string());
        config.user.email = Some("bob@example.com".to_string());

        let sig = config.default_signature().unwrap().unwrap();
        assert_eq!(sig.name, "Bob");
        assert_eq!(sig.email, "bob@example.com");
    }
}
