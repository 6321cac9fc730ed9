use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::ObjectId;
use crate::refs::RefUpdate;
use crate::repo::{Repository, GITDIR_NAME};
use crate::types::{Commit, FileMode, ObjectKind, Signature, Tree, TreeEntry};

/// everything needed to record a commit
#[derive(Clone, Debug)]
pub struct CommitRequest {
    /// ref to advance after writing; `HEAD` advances the branch it names
    pub update_ref: Option<String>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
}

/// write a commit object and optionally advance a ref to it
///
/// the ref only moves if it still points at the first parent (or is absent
/// for a root commit); otherwise the commit is left dangling and
/// `RefUpdateConflict` is returned.
pub fn commit(repo: &Repository, request: CommitRequest) -> Result<ObjectId> {
    let kind = repo.objects().read_kind(&request.tree)?;
    if kind != ObjectKind::Tree {
        return Err(Error::InvalidObjectType {
            id: request.tree,
            expected: ObjectKind::Tree.as_str(),
            actual: kind.as_str(),
        });
    }
    for parent in &request.parents {
        repo.objects().read_commit(parent)?;
    }

    let expected = request.parents.first().copied();
    let commit = Commit::new(
        request.tree,
        request.parents,
        request.author,
        request.committer,
        request.message,
    );
    let id = repo.objects().write_commit(&commit)?;

    if let Some(update_ref) = &request.update_ref {
        let (terminal, _) = repo.refs().follow(update_ref)?;
        repo.refs().update(&terminal, |current| {
            if current.and_then(|r| r.target()) != expected || current.is_some_and(|r| r.is_symbolic()) {
                return Err(Error::RefUpdateConflict {
                    name: terminal.clone(),
                    expected,
                });
            }
            Ok(RefUpdate::Set(id))
        })?;
        debug!(commit = %id.short(), r#ref = %terminal, "advanced ref");
    }

    Ok(id)
}

/// write the contents of a directory as a tree, returning the tree id
///
/// regular files become blobs, symlinks store their target path and
/// subdirectories recurse. the repository's own store directory is skipped.
pub fn snapshot_dir(repo: &Repository, dir: &Path) -> Result<ObjectId> {
    let mut entries = Vec::new();

    let mut dir_entries: Vec<_> = fs::read_dir(dir)
        .with_path(dir)?
        .collect::<std::io::Result<Vec<_>>>()
        .with_path(dir)?;
    dir_entries.sort_by_key(|e| e.file_name());

    for entry in dir_entries {
        let path = entry.path();
        let file_name = entry.file_name();
        if file_name == GITDIR_NAME {
            continue;
        }
        let Some(name) = file_name.to_str().map(str::to_string) else {
            warn!(path = %path.display(), "skipping non utf-8 file name");
            continue;
        };

        let meta = fs::symlink_metadata(&path).with_path(&path)?;
        let file_type = meta.file_type();

        if file_type.is_symlink() {
            let target = fs::read_link(&path).with_path(&path)?;
            let id = repo.objects().write_blob(target.as_os_str().as_bytes())?;
            entries.push(TreeEntry::new(name, FileMode::Symlink, id));
        } else if file_type.is_dir() {
            let id = snapshot_dir(repo, &path)?;
            entries.push(TreeEntry::tree(name, id));
        } else if file_type.is_file() {
            let content = fs::read(&path).with_path(&path)?;
            let id = repo.objects().write_blob(&content)?;
            let mode = if meta.permissions().mode() & 0o111 != 0 {
                FileMode::Executable
            } else {
                FileMode::Blob
            };
            entries.push(TreeEntry::new(name, mode, id));
        } else {
            warn!(path = %path.display(), "skipping special file");
        }
    }

    repo.objects().write_tree(&Tree::new(entries)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::HEAD;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(&dir.path().join("repo"), false).unwrap();
        (dir, repo)
    }

    fn sig(time: i64) -> Signature {
        Signature::new("Test", "test@example.com", time, 0).unwrap()
    }

    fn request(repo: &Repository, parents: Vec<ObjectId>, update_ref: Option<&str>) -> CommitRequest {
        CommitRequest {
            update_ref: update_ref.map(str::to_string),
            author: sig(1),
            committer: sig(2),
            message: format!("commit with {} parents", parents.len()),
            tree: repo.objects().write_tree(&Tree::empty()).unwrap(),
            parents,
        }
    }

    #[test]
    fn test_commit_advances_branch_through_head() {
        let (_dir, repo) = test_repo();

        let c1 = commit(&repo, request(&repo, vec![], Some(HEAD))).unwrap();
        assert_eq!(repo.refs().resolve("refs/heads/main").unwrap(), c1);
        // HEAD itself stays symbolic
        assert!(repo.refs().read(HEAD).unwrap().is_symbolic());

        let c2 = commit(&repo, request(&repo, vec![c1], Some(HEAD))).unwrap();
        assert_eq!(repo.refs().resolve(HEAD).unwrap(), c2);

        let stored = repo.objects().read_commit(&c2).unwrap();
        assert_eq!(stored.parents, vec![c1]);
        assert_eq!(stored.committer.time, 2);
    }

    #[test]
    fn test_commit_without_ref_leaves_refs_alone() {
        let (_dir, repo) = test_repo();

        let id = commit(&repo, request(&repo, vec![], None)).unwrap();
        assert!(repo.objects().exists(&id));
        assert!(repo.refs().list(None).unwrap().is_empty());
    }

    #[test]
    fn test_commit_conflict_when_ref_moved() {
        let (_dir, repo) = test_repo();

        let c1 = commit(&repo, request(&repo, vec![], Some(HEAD))).unwrap();
        let c2 = commit(&repo, request(&repo, vec![c1], Some(HEAD))).unwrap();

        // stale parent
        let mut stale = request(&repo, vec![c1], Some(HEAD));
        stale.message = "stale".to_string();
        let result = commit(&repo, stale);
        assert!(matches!(result, Err(Error::RefUpdateConflict { .. })));
        assert_eq!(repo.refs().resolve(HEAD).unwrap(), c2);

        // root commit onto an existing branch
        let mut root = request(&repo, vec![], Some("refs/heads/main"));
        root.message = "another root".to_string();
        assert!(matches!(
            commit(&repo, root),
            Err(Error::RefUpdateConflict { .. })
        ));
    }

    #[test]
    fn test_commit_validates_inputs() {
        let (_dir, repo) = test_repo();
        let blob = repo.objects().write_blob(b"x").unwrap();

        let mut bad_tree = request(&repo, vec![], None);
        bad_tree.tree = blob;
        assert!(matches!(
            commit(&repo, bad_tree),
            Err(Error::InvalidObjectType { .. })
        ));

        let missing_parent = request(&repo, vec![ObjectId::from_bytes([7; 20])], None);
        assert!(matches!(
            commit(&repo, missing_parent),
            Err(Error::ObjectNotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_dir() {
        let (_dir, repo) = test_repo();
        let root = repo.workdir().unwrap();

        fs::write(root.join("readme.txt"), "hello\n").unwrap();
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin/run.sh"), "#!/bin/sh\n").unwrap();
        fs::set_permissions(root.join("bin/run.sh"), fs::Permissions::from_mode(0o755)).unwrap();
        symlink("readme.txt", root.join("link")).unwrap();

        let tree_id = snapshot_dir(&repo, root).unwrap();
        let tree = repo.objects().read_tree(&tree_id).unwrap();

        let names: Vec<_> = tree.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["bin", "link", "readme.txt"]);

        let readme = tree.get("readme.txt").unwrap();
        assert_eq!(readme.mode, FileMode::Blob);
        assert_eq!(repo.objects().read_blob(&readme.target).unwrap(), b"hello\n");

        let link = tree.get("link").unwrap();
        assert_eq!(link.mode, FileMode::Symlink);
        assert_eq!(repo.objects().read_blob(&link.target).unwrap(), b"readme.txt");

        let bin = repo.objects().read_tree(&tree.get("bin").unwrap().target).unwrap();
        assert_eq!(bin.get("run.sh").unwrap().mode, FileMode::Executable);

        // identical content snapshots to the same tree
        let again = snapshot_dir(&repo, root).unwrap();
        assert_eq!(tree_id, again);
    }
}
