use std::collections::HashSet;

use tracing::warn;

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::refs::{Reference, HEAD};
use crate::repo::Repository;
use crate::types::{FileMode, Object, ObjectKind};

/// fsck report
#[derive(Debug, Default)]
pub struct FsckReport {
    /// objects checked
    pub objects_checked: usize,
    /// objects that fail hash verification or do not parse
    pub corrupt_objects: Vec<CorruptObject>,
    /// missing objects referenced by other objects or refs
    pub missing_objects: Vec<MissingObject>,
    /// objects not reachable from any ref
    pub dangling_objects: Vec<ObjectId>,
}

impl FsckReport {
    pub fn is_ok(&self) -> bool {
        self.corrupt_objects.is_empty() && self.missing_objects.is_empty()
    }
}

#[derive(Debug)]
pub struct CorruptObject {
    pub id: ObjectId,
    pub message: String,
}

#[derive(Debug)]
pub struct MissingObject {
    pub id: ObjectId,
    /// kind the referrer expected, when known
    pub expected: Option<ObjectKind>,
    pub referenced_by: String,
}

/// verify repository integrity
pub fn fsck(repo: &Repository) -> Result<FsckReport> {
    let mut report = FsckReport::default();
    let mut reachable = HashSet::new();
    let mut corrupt = HashSet::new();

    // verify every stored object
    let all = repo.objects().list()?;
    for id in &all {
        report.objects_checked += 1;
        match repo.objects().read(id) {
            Ok(_) => {}
            Err(e) if e.kind() == crate::ErrorKind::Corruption => {
                corrupt.insert(*id);
                report.corrupt_objects.push(CorruptObject {
                    id: *id,
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    // walk everything reachable from refs and a detached HEAD
    let mut roots: Vec<(ObjectId, String)> = repo
        .refs()
        .list(None)?
        .into_iter()
        .filter_map(|r| match r {
            Reference::Direct { name, target } => Some((target, name)),
            Reference::Symbolic { .. } => None,
        })
        .collect();
    if let Some(Reference::Direct { target, .. }) = repo.refs().try_read(HEAD)? {
        roots.push((target, HEAD.to_string()));
    }

    let mut stack: Vec<(ObjectId, Option<ObjectKind>, String)> = roots
        .into_iter()
        .map(|(id, name)| (id, None, format!("ref {}", name)))
        .collect();

    while let Some((id, expected, referenced_by)) = stack.pop() {
        if !reachable.insert(id) || corrupt.contains(&id) {
            continue;
        }

        let object = match repo.objects().read(&id) {
            Ok(object) => object,
            Err(Error::ObjectNotFound(_)) => {
                report.missing_objects.push(MissingObject {
                    id,
                    expected,
                    referenced_by,
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Some(expected) = expected {
            if object.kind() != expected {
                report.corrupt_objects.push(CorruptObject {
                    id,
                    message: format!(
                        "{} expected {} but found {}",
                        referenced_by,
                        expected,
                        object.kind()
                    ),
                });
                continue;
            }
        }

        let from = format!("{} {}", object.kind(), id);
        match object {
            Object::Blob(_) => {}
            Object::Tree(tree) => {
                for entry in tree.entries() {
                    let kind = match entry.mode {
                        // submodule commits live in another repository
                        FileMode::Commit => continue,
                        FileMode::Tree => ObjectKind::Tree,
                        FileMode::Blob | FileMode::Executable | FileMode::Symlink => ObjectKind::Blob,
                    };
                    stack.push((entry.target, Some(kind), format!("{} entry {}", from, entry.name)));
                }
            }
            Object::Commit(commit) => {
                stack.push((commit.tree, Some(ObjectKind::Tree), from.clone()));
                for parent in commit.parents {
                    stack.push((parent, Some(ObjectKind::Commit), from.clone()));
                }
            }
            Object::Tag(tag) => {
                stack.push((tag.target, Some(tag.target_kind), from));
            }
        }
    }

    for id in all {
        if !reachable.contains(&id) {
            report.dangling_objects.push(id);
        }
    }

    if !report.is_ok() {
        warn!(
            corrupt = report.corrupt_objects.len(),
            missing = report.missing_objects.len(),
            "repository has integrity problems"
        );
    }

    Ok(report)
}
