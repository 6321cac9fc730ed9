use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::ObjectId;
use crate::object::ObjectStore;
use crate::ops::{self, Branch, WalkOrder};
use crate::refs::{RefStore, Reference, HEAD};
use crate::types::Signature;

/// name of the store directory inside a non-bare repository
pub const GITDIR_NAME: &str = ".grove";

const CONFIG_FILE: &str = "config.toml";

/// where HEAD currently points
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadState {
    /// HEAD names a branch that has no commits yet
    Unborn,
    /// HEAD holds a commit id directly
    Detached(ObjectId),
    /// HEAD names an existing branch
    OnBranch(Branch),
}

/// a grove repository: one object store and one ref store
pub struct Repository {
    gitdir: PathBuf,
    workdir: Option<PathBuf>,
    config: Config,
    objects: ObjectStore,
    refs: RefStore,
}

impl Repository {
    /// initialize a new repository at the given path
    ///
    /// a non-bare repository keeps its store in `<path>/.grove`; a bare
    /// repository is the store directory itself.
    pub fn init(path: &Path, bare: bool) -> Result<Self> {
        let gitdir = if bare {
            path.to_path_buf()
        } else {
            path.join(GITDIR_NAME)
        };

        let config_path = gitdir.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(Error::RepoExists(path.to_path_buf()));
        }

        // create directory structure
        for dir in ["objects", "refs/heads", "refs/tags", "tmp"] {
            let dir = gitdir.join(dir);
            fs::create_dir_all(&dir).with_path(&dir)?;
        }

        let config = Config::new(bare);
        config.save(&config_path)?;

        let workdir = (!bare).then(|| path.to_path_buf());
        let repo = Self::assemble(gitdir, workdir, config);

        let default_head = format!("refs/heads/{}", repo.config.core.default_branch);
        repo.refs.set_symbolic(HEAD, &default_head)?;

        info!(path = %path.display(), bare, "initialized repository");
        Ok(repo)
    }

    /// open an existing repository
    ///
    /// `path` may be the working directory of a non-bare repository or the
    /// store directory itself.
    pub fn open(path: &Path) -> Result<Self> {
        let nested = path.join(GITDIR_NAME);
        let gitdir = if is_gitdir(&nested) {
            nested
        } else if is_gitdir(path) {
            path.to_path_buf()
        } else {
            return Err(Error::RepositoryNotFound(path.to_path_buf()));
        };

        let config = Config::load(&gitdir.join(CONFIG_FILE))?;

        let workdir = if config.core.bare {
            None
        } else {
            gitdir.parent().map(Path::to_path_buf)
        };

        debug!(gitdir = %gitdir.display(), "opened repository");
        Ok(Self::assemble(gitdir, workdir, config))
    }

    /// probe whether `path` can be opened as a repository; never fails
    pub fn can_open(path: &Path) -> bool {
        Self::open(path).is_ok()
    }

    /// find the repository containing `path` by walking up its parents
    ///
    /// stops at filesystem device boundaries. returns the repository root
    /// (the working directory, or the store directory for bare repositories).
    pub fn discover(path: &Path) -> Option<PathBuf> {
        let start = path.canonicalize().ok()?;
        let device = fs::metadata(&start).ok()?.dev();

        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            match fs::metadata(dir) {
                Ok(meta) if meta.dev() == device => {}
                _ => break,
            }

            if is_gitdir(&dir.join(GITDIR_NAME)) || is_gitdir(dir) {
                return Some(dir.to_path_buf());
            }

            current = dir.parent();
        }
        None
    }

    fn assemble(gitdir: PathBuf, workdir: Option<PathBuf>, config: Config) -> Self {
        let tmp = gitdir.join("tmp");
        let objects = ObjectStore::new(gitdir.join("objects"), &tmp, config.core.hash.hasher());
        let refs = RefStore::new(&gitdir, &tmp);
        Self {
            gitdir,
            workdir,
            config,
            objects,
            refs,
        }
    }

    /// repository root: the working directory, or the store for bare repos
    pub fn path(&self) -> &Path {
        self.workdir.as_deref().unwrap_or(&self.gitdir)
    }

    /// the store directory holding objects, refs and config
    pub fn gitdir(&self) -> &Path {
        &self.gitdir
    }

    /// working directory, absent for bare repositories
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    pub fn is_bare(&self) -> bool {
        self.workdir.is_none()
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// repository configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// mutable access to configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// save configuration changes
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path())
    }

    /// path to config.toml
    pub fn config_path(&self) -> PathBuf {
        self.gitdir.join(CONFIG_FILE)
    }

    /// identity from configuration, stamped now
    pub fn default_signature(&self) -> Result<Signature> {
        self.config.default_signature().unwrap_or_else(|| {
            Err(Error::InvalidConfig(
                "user.name and user.email are not configured".to_string(),
            ))
        })
    }

    /// true when HEAD is unborn and no refs exist
    pub fn is_empty(&self) -> Result<bool> {
        if !matches!(self.head()?, HeadState::Unborn) {
            return Ok(false);
        }
        Ok(self.refs.list(None)?.is_empty())
    }

    /// true when the repository has a non-empty shallow file
    pub fn is_shallow(&self) -> bool {
        fs::metadata(self.gitdir.join("shallow"))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// current HEAD state
    pub fn head(&self) -> Result<HeadState> {
        match self.refs.read(HEAD)? {
            Reference::Direct { target, .. } => Ok(HeadState::Detached(target)),
            Reference::Symbolic { .. } => match self.refs.follow(HEAD)? {
                (_, None) => Ok(HeadState::Unborn),
                (refname, Some(target)) => {
                    Ok(HeadState::OnBranch(Branch::from_ref(self, &refname, target)?))
                }
            },
        }
    }

    pub fn is_head_detached(&self) -> Result<bool> {
        Ok(matches!(self.head()?, HeadState::Detached(_)))
    }

    /// commit HEAD resolves to, `None` for an unborn HEAD
    pub fn head_commit(&self) -> Result<Option<ObjectId>> {
        let (_, target) = self.refs.follow(HEAD)?;
        Ok(target)
    }

    /// point HEAD at a branch; the branch need not exist yet
    pub fn set_head(&self, refname: &str) -> Result<()> {
        if !refname.starts_with("refs/heads/") {
            return Err(Error::InvalidRef(format!(
                "HEAD must point at a branch under refs/heads/: {}",
                refname
            )));
        }
        self.refs.set_symbolic(HEAD, refname)
    }

    /// detach HEAD at a commit
    pub fn set_head_detached(&self, commit: ObjectId) -> Result<()> {
        let (peeled, _) = self.objects.peel_to_commit(&commit)?;
        self.refs.set(HEAD, peeled)
    }

    /// commits reachable from HEAD in the given order
    ///
    /// an unborn HEAD yields an empty list.
    pub fn revisions(&self, order: WalkOrder) -> Result<Vec<ObjectId>> {
        let mut walk = ops::RevWalk::new(self);
        walk.sorting(order);
        walk.push_head()?;
        walk.collect()
    }

    /// aggregate view of the repository state
    pub fn summary(&self) -> Result<RepoSummary> {
        let branches = ops::branches(self, ops::BranchFilter::All)?;
        let (local, remote): (Vec<_>, Vec<_>) = branches.iter().partition(|b| b.is_local());

        Ok(RepoSummary {
            head: self.head()?,
            local_branches: local.len(),
            remote_branches: remote.len(),
            tags: ops::tags(self)?.len(),
            notes: ops::notes::list(self, None)?.len(),
            commits: self.revisions(WalkOrder::Insertion)?.len(),
        })
    }
}

/// status aggregation produced by [`Repository::summary`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoSummary {
    pub head: HeadState,
    pub local_branches: usize,
    pub remote_branches: usize,
    pub tags: usize,
    pub notes: usize,
    /// commits reachable from HEAD
    pub commits: usize,
}

fn is_gitdir(path: &Path) -> bool {
    path.join(CONFIG_FILE).is_file() && path.join("objects").is_dir() && path.join(HEAD).is_file()
}
