use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::error::{Error, IoResultExt, Result};
use crate::fs::{atomic_write, prune_empty_dirs};
use crate::hash::ObjectId;

/// well-known name of the current-branch pointer
pub const HEAD: &str = "HEAD";

const SYMREF_PREFIX: &str = "ref: ";

/// a named pointer, either at an object or at another reference
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reference {
    Direct { name: String, target: ObjectId },
    Symbolic { name: String, target: String },
}

impl Reference {
    pub fn name(&self) -> &str {
        match self {
            Reference::Direct { name, .. } | Reference::Symbolic { name, .. } => name,
        }
    }

    /// target id of a direct reference
    pub fn target(&self) -> Option<ObjectId> {
        match self {
            Reference::Direct { target, .. } => Some(*target),
            Reference::Symbolic { .. } => None,
        }
    }

    /// target name of a symbolic reference
    pub fn symbolic_target(&self) -> Option<&str> {
        match self {
            Reference::Symbolic { target, .. } => Some(target),
            Reference::Direct { .. } => None,
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Reference::Symbolic { .. })
    }

    fn encode(&self) -> String {
        match self {
            Reference::Direct { target, .. } => format!("{}\n", target),
            Reference::Symbolic { target, .. } => format!("{}{}\n", SYMREF_PREFIX, target),
        }
    }

    fn parse(name: &str, content: &str) -> Result<Self> {
        let content = content.trim_end();
        if let Some(target) = content.strip_prefix(SYMREF_PREFIX) {
            return Ok(Reference::Symbolic {
                name: name.to_string(),
                target: target.trim().to_string(),
            });
        }
        let target = ObjectId::from_hex(content).map_err(|_| Error::MalformedRef {
            name: name.to_string(),
            reason: format!("unrecognised content {:?}", content),
        })?;
        Ok(Reference::Direct {
            name: name.to_string(),
            target,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Direct { name, target } => write!(f, "{} {}", target, name),
            Reference::Symbolic { name, target } => write!(f, "ref: {} {}", target, name),
        }
    }
}

/// what an [`RefStore::update`] callback wants done with the ref
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefUpdate {
    Set(ObjectId),
    SetSymbolic(String),
    Delete,
    Keep,
}

/// file-backed reference store
///
/// refs are plain files under the git directory holding either `<hex>\n`
/// or `ref: <name>\n`. every mutation holds an exclusive lock scoped to the
/// single ref name being changed.
pub struct RefStore {
    root: PathBuf,
    tmp: PathBuf,
}

impl RefStore {
    pub fn new(root: impl Into<PathBuf>, tmp: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tmp: tmp.into(),
        }
    }

    /// read a single ref without following symbolic targets
    pub fn read(&self, name: &str) -> Result<Reference> {
        self.try_read(name)?
            .ok_or_else(|| Error::RefNotFound(name.to_string()))
    }

    /// read a ref, returning `None` if it does not exist
    pub fn try_read(&self, name: &str) -> Result<Option<Reference>> {
        validate_ref_name(name)?;
        let path = self.ref_path(name);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            // a directory of that name means the ref itself is absent
            Err(_) if path.is_dir() => return Ok(None),
            Err(e) => return Err(e).with_path(&path),
        };

        Reference::parse(name, &content).map(Some)
    }

    /// check if a ref exists
    pub fn exists(&self, name: &str) -> bool {
        matches!(self.try_read(name), Ok(Some(_)))
    }

    /// follow symbolic refs from `name`
    ///
    /// returns the terminal ref name and its target, or `None` as target
    /// when the terminal ref does not exist (an unborn branch).
    pub fn follow(&self, name: &str) -> Result<(String, Option<ObjectId>)> {
        let mut visited = HashSet::new();
        let mut current = name.to_string();

        loop {
            if !visited.insert(current.clone()) {
                return Err(Error::ReferenceCycle(name.to_string()));
            }
            match self.try_read(&current)? {
                None => return Ok((current, None)),
                Some(Reference::Direct { target, .. }) => return Ok((current, Some(target))),
                Some(Reference::Symbolic { target, .. }) => current = target,
            }
        }
    }

    /// resolve a ref name to an object id, following symbolic chains
    pub fn resolve(&self, name: &str) -> Result<ObjectId> {
        match self.follow(name)? {
            (_, Some(id)) => Ok(id),
            (terminal, None) => Err(Error::RefNotFound(terminal)),
        }
    }

    /// resolve a full hex id or a ref name, trying the usual shorthands
    ///
    /// `main` is looked up as `main`, `refs/main`, `refs/tags/main`,
    /// `refs/heads/main`, `refs/remotes/main` and `refs/remotes/main/HEAD`.
    pub fn resolve_rev(&self, rev: &str) -> Result<ObjectId> {
        if ObjectId::looks_like_hex(rev) && !self.exists(rev) {
            return ObjectId::from_hex(rev);
        }

        let candidates = [
            rev.to_string(),
            format!("refs/{}", rev),
            format!("refs/tags/{}", rev),
            format!("refs/heads/{}", rev),
            format!("refs/remotes/{}", rev),
            format!("refs/remotes/{}/HEAD", rev),
        ];
        for candidate in &candidates {
            if validate_ref_name(candidate).is_err() {
                continue;
            }
            if let (_, Some(id)) = self.follow(candidate)? {
                return Ok(id);
            }
        }
        Err(Error::RefNotFound(rev.to_string()))
    }

    /// point a ref directly at an object (create or update)
    pub fn set(&self, name: &str, target: ObjectId) -> Result<()> {
        self.update(name, |_| Ok(RefUpdate::Set(target)))?;
        Ok(())
    }

    /// point a ref at another ref name
    pub fn set_symbolic(&self, name: &str, target: &str) -> Result<()> {
        validate_ref_name(target)?;
        self.update(name, |_| Ok(RefUpdate::SetSymbolic(target.to_string())))?;
        Ok(())
    }

    /// set a direct ref only if it currently points at `expected`
    ///
    /// `expected == None` requires the ref to be absent.
    pub fn set_if(&self, name: &str, expected: Option<ObjectId>, target: ObjectId) -> Result<()> {
        self.update(name, |current| {
            let actual = current.and_then(Reference::target);
            let matches = match current {
                None => expected.is_none(),
                Some(_) => actual.is_some() && actual == expected,
            };
            if !matches {
                return Err(Error::RefUpdateConflict {
                    name: name.to_string(),
                    expected,
                });
            }
            Ok(RefUpdate::Set(target))
        })?;
        Ok(())
    }

    /// delete a ref
    pub fn delete(&self, name: &str) -> Result<()> {
        self.update(name, |current| match current {
            Some(_) => Ok(RefUpdate::Delete),
            None => Err(Error::RefNotFound(name.to_string())),
        })?;
        Ok(())
    }

    /// check that `name` can be written without colliding with the file
    /// layout of existing refs
    ///
    /// a ref cannot be created where an existing ref is one of its parent
    /// directories, nor where other refs live underneath its name.
    pub fn check_creatable(&self, name: &str) -> Result<()> {
        validate_ref_name(name)?;

        let mut prefix = String::new();
        for component in name.split('/') {
            if !prefix.is_empty() {
                if self.ref_path(&prefix).is_file() {
                    return Err(Error::InvalidRef(format!(
                        "{} conflicts with existing ref {}",
                        name, prefix
                    )));
                }
                prefix.push('/');
            }
            prefix.push_str(component);
        }

        if self.ref_path(name).is_dir() {
            return Err(Error::InvalidRef(format!(
                "{} conflicts with existing refs under it",
                name
            )));
        }
        Ok(())
    }

    /// read-modify-write a ref while holding its lock
    ///
    /// the callback sees the current value and decides the new one; nothing
    /// else can change this ref until the callback's decision is written.
    /// returns the ref as left by the update.
    pub fn update<F>(&self, name: &str, decide: F) -> Result<Option<Reference>>
    where
        F: FnOnce(Option<&Reference>) -> Result<RefUpdate>,
    {
        validate_ref_name(name)?;
        let _lock = self.lock(name)?;

        let current = self.try_read(name)?;
        let path = self.ref_path(name);

        let next = match decide(current.as_ref())? {
            RefUpdate::Keep => return Ok(current),
            RefUpdate::Set(target) => Some(Reference::Direct {
                name: name.to_string(),
                target,
            }),
            RefUpdate::SetSymbolic(target) => Some(Reference::Symbolic {
                name: name.to_string(),
                target,
            }),
            RefUpdate::Delete => None,
        };

        match &next {
            Some(reference) => {
                atomic_write(&self.tmp, &path, reference.encode().as_bytes())?;
                debug!(name, new = %reference, "updated ref");
            }
            None => {
                if current.is_some() {
                    fs::remove_file(&path).with_path(&path)?;
                    if let Some(parent) = path.parent() {
                        prune_empty_dirs(parent, &self.root.join("refs"));
                    }
                    debug!(name, "deleted ref");
                }
            }
        }

        Ok(next)
    }

    /// take the exclusive lock for a single ref name, blocking until free
    pub fn lock(&self, name: &str) -> Result<RefLock> {
        let locks = self.root.join("locks");
        fs::create_dir_all(&locks).with_path(&locks)?;

        // hex keeps nested names flat and collision free
        let lock_path = locks.join(format!("{}.lock", hex::encode(name)));
        let file = File::create(&lock_path).with_path(&lock_path)?;

        let flock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| Error::Io {
            path: lock_path.clone(),
            source: std::io::Error::from(errno),
        })?;

        Ok(RefLock { flock })
    }

    /// list refs under `refs/`, optionally restricted to a name prefix
    ///
    /// the result is a sorted snapshot; refs removed while listing are skipped.
    pub fn list(&self, prefix: Option<&str>) -> Result<Vec<Reference>> {
        let refs_dir = self.root.join("refs");
        let mut names = Vec::new();

        if refs_dir.exists() {
            collect_refs(&self.root, &refs_dir, &mut names)?;
        }

        names.sort();

        let mut refs = Vec::with_capacity(names.len());
        for name in names {
            if let Some(prefix) = prefix {
                if !name.starts_with(prefix) {
                    continue;
                }
            }
            match self.try_read(&name) {
                Ok(Some(reference)) => refs.push(reference),
                Ok(None) => {}
                Err(Error::InvalidRef(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(refs)
    }

    /// list refs whose name matches a glob pattern
    pub fn list_matching(&self, pattern: &str) -> Result<Vec<Reference>> {
        let glob = glob::Pattern::new(pattern).map_err(|e| Error::InvalidRef(e.to_string()))?;
        Ok(self
            .list(None)?
            .into_iter()
            .filter(|r| glob.matches(r.name()))
            .collect())
    }

    /// true if HEAD currently points (through symbolic links) at `name`
    ///
    /// a detached or missing HEAD is never "at" a branch.
    pub fn is_head(&self, name: &str) -> Result<bool> {
        match self.try_read(HEAD)? {
            Some(Reference::Symbolic { .. }) => {
                let (terminal, _) = self.follow(HEAD)?;
                Ok(terminal == name)
            }
            Some(Reference::Direct { .. }) | None => Ok(false),
        }
    }

    /// get filesystem path for a ref
    fn ref_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// guard that holds a ref lock until dropped
pub struct RefLock {
    #[allow(dead_code)]
    flock: Flock<File>,
}
// lock is released automatically when Flock is dropped

/// recursively collect ref names from directory
fn collect_refs(base: &Path, dir: &Path, refs: &mut Vec<String>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        // removed by a concurrent delete
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_path(dir),
    };

    for entry in entries {
        let entry = entry.with_path(dir)?;
        let path = entry.path();

        if path.is_dir() {
            collect_refs(base, &path, refs)?;
        } else if path.is_file() {
            if let Ok(rel) = path.strip_prefix(base) {
                refs.push(rel.to_string_lossy().to_string());
            }
        }
    }
    Ok(())
}

/// validate ref name
///
/// names are either all-caps pseudo refs (`HEAD`, `FETCH_HEAD`) or live
/// under `refs/`.
pub fn validate_ref_name(name: &str) -> Result<()> {
    let invalid = |why: &str| Err(Error::InvalidRef(format!("{}: {:?}", why, name)));

    if name.is_empty() {
        return invalid("empty ref name");
    }

    let pseudo = name.chars().all(|c| c.is_ascii_uppercase() || c == '_');
    if !pseudo && !name.starts_with("refs/") {
        return invalid("ref name must be a pseudo ref or start with refs/");
    }

    if name.ends_with('/') {
        return invalid("ref name cannot end with '/'");
    }

    if name.contains("//") {
        return invalid("ref name cannot contain '//'");
    }

    if name.ends_with(".lock") {
        return invalid("ref name cannot end with .lock");
    }

    if name
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        return invalid("ref name contains a forbidden character");
    }

    // check for path traversal and hidden components
    for component in name.split('/') {
        if component.starts_with('.') {
            return invalid("ref name component cannot start with '.'");
        }
    }

    Ok(())
}
