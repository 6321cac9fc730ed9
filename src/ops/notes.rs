//! notes: text annotations attached to objects without changing them
//!
//! a notes namespace is a ref (`refs/notes/commits` by default) pointing at a
//! commit whose tree maps annotated ids to note blobs. entries are written
//! with a two-character fan-out (`ab/cdef...`); flat 40-hex entries are read
//! as well. every change records a new notes commit on top of the previous
//! one and moves the ref last, under that ref's lock.

use tracing::debug;

use crate::error::{Error, Result};
use crate::hash::{ObjectId, HEX_LEN};
use crate::refs::{validate_ref_name, RefUpdate};
use crate::repo::Repository;
use crate::types::{Commit, Signature, Tree, TreeEntry};

/// a note attached to an object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    /// id of the blob holding the message
    pub id: ObjectId,
    /// id of the annotated object
    pub target: ObjectId,
    pub message: String,
    /// notes namespace the note lives in
    pub notes_ref: String,
}

/// configured notes namespace, or `refs/notes/commits`
pub fn default_ref(repo: &Repository) -> String {
    repo.config().default_notes_ref().to_string()
}

/// attach a note to `target`
///
/// fails with `NoteAlreadyExists` if the object already has a note in this
/// namespace, unless `overwrite` is set.
pub fn create(
    repo: &Repository,
    target: ObjectId,
    message: &str,
    author: &Signature,
    committer: &Signature,
    notes_ref: Option<&str>,
    overwrite: bool,
) -> Result<Note> {
    let notes_ref = resolve_notes_ref(repo, notes_ref)?;
    if !repo.objects().exists(&target) {
        return Err(Error::ObjectNotFound(target));
    }

    let (terminal, _) = repo.refs().follow(&notes_ref)?;
    let mut blob = ObjectId::ZERO;
    repo.refs().update(&terminal, |current| {
        let parent = current.and_then(|r| r.target());
        let mut root = notes_tree(repo, parent)?;

        if lookup(repo, &root, &target)?.is_some() && !overwrite {
            return Err(Error::NoteAlreadyExists {
                target,
                notes_ref: notes_ref.clone(),
            });
        }

        blob = repo.objects().write_blob(message.as_bytes())?;
        detach(repo, &mut root, &target)?;
        attach(repo, &mut root, &target, blob)?;

        let commit = write_notes_commit(repo, &root, parent, author, committer, "Notes added by grove")?;
        Ok(RefUpdate::Set(commit))
    })?;

    debug!(target = %target.short(), notes_ref = %notes_ref, "created note");
    Ok(Note {
        id: blob,
        target,
        message: message.to_string(),
        notes_ref,
    })
}

/// remove the note attached to `target`
pub fn remove(
    repo: &Repository,
    target: ObjectId,
    notes_ref: Option<&str>,
    author: &Signature,
    committer: &Signature,
) -> Result<()> {
    let notes_ref = resolve_notes_ref(repo, notes_ref)?;
    let (terminal, _) = repo.refs().follow(&notes_ref)?;

    repo.refs().update(&terminal, |current| {
        let parent = current.and_then(|r| r.target());
        let mut root = notes_tree(repo, parent)?;

        if !detach(repo, &mut root, &target)? {
            return Err(Error::NoteNotFound {
                target,
                notes_ref: notes_ref.clone(),
            });
        }

        let commit = write_notes_commit(repo, &root, parent, author, committer, "Notes removed by grove")?;
        Ok(RefUpdate::Set(commit))
    })?;

    debug!(target = %target.short(), notes_ref = %notes_ref, "removed note");
    Ok(())
}

/// read the note attached to `target`
pub fn read(repo: &Repository, target: ObjectId, notes_ref: Option<&str>) -> Result<Note> {
    let notes_ref = resolve_notes_ref(repo, notes_ref)?;
    let not_found = || Error::NoteNotFound {
        target,
        notes_ref: notes_ref.clone(),
    };

    let (_, tip) = repo.refs().follow(&notes_ref)?;
    let Some(tip) = tip else {
        return Err(not_found());
    };
    let root = notes_tree(repo, Some(tip))?;

    let id = lookup(repo, &root, &target)?.ok_or_else(not_found)?;
    Ok(Note {
        id,
        target,
        message: read_message(repo, &id)?,
        notes_ref: notes_ref.clone(),
    })
}

/// every note in a namespace, ordered by annotated id
///
/// a namespace whose ref does not exist has no notes.
pub fn list(repo: &Repository, notes_ref: Option<&str>) -> Result<Vec<Note>> {
    let notes_ref = resolve_notes_ref(repo, notes_ref)?;
    let (_, tip) = repo.refs().follow(&notes_ref)?;
    let Some(tip) = tip else {
        return Ok(Vec::new());
    };
    let root = notes_tree(repo, Some(tip))?;

    let mut found = Vec::new();
    for entry in root.entries() {
        if entry.is_tree() && entry.name.len() == 2 {
            let fanout = repo.objects().read_tree(&entry.target)?;
            for leaf in fanout.entries() {
                if let Ok(target) = ObjectId::from_hex(&format!("{}{}", entry.name, leaf.name)) {
                    found.push((target, false, leaf.target));
                }
            }
        } else if entry.name.len() == HEX_LEN {
            if let Ok(target) = ObjectId::from_hex(&entry.name) {
                found.push((target, true, entry.target));
            }
        }
    }

    // the fan-out entry sorts ahead of a flat one for the same object and
    // wins, as in `lookup`
    found.sort();
    found.dedup_by_key(|(target, _, _)| *target);

    found
        .into_iter()
        .map(|(target, _, id)| {
            Ok(Note {
                id,
                target,
                message: read_message(repo, &id)?,
                notes_ref: notes_ref.clone(),
            })
        })
        .collect()
}

fn resolve_notes_ref(repo: &Repository, notes_ref: Option<&str>) -> Result<String> {
    let name = notes_ref.map_or_else(|| default_ref(repo), str::to_string);
    validate_ref_name(&name)?;
    if !name.starts_with("refs/") {
        return Err(Error::InvalidRef(format!("notes ref must live under refs/: {}", name)));
    }
    Ok(name)
}

fn notes_tree(repo: &Repository, tip: Option<ObjectId>) -> Result<Tree> {
    match tip {
        Some(tip) => {
            let commit = repo.objects().read_commit(&tip)?;
            repo.objects().read_tree(&commit.tree)
        }
        None => Ok(Tree::empty()),
    }
}

/// blob id of the note for `target`, in either layout
fn lookup(repo: &Repository, root: &Tree, target: &ObjectId) -> Result<Option<ObjectId>> {
    let (dir, rest) = target.to_path_components();

    if let Some(fanout) = root.get(&dir).filter(|e| e.is_tree()) {
        let subtree = repo.objects().read_tree(&fanout.target)?;
        if let Some(leaf) = subtree.get(&rest) {
            return Ok(Some(leaf.target));
        }
    }

    Ok(root.get(&target.to_hex()).map(|e| e.target))
}

/// drop any note for `target` from the root tree; true if one was removed
fn detach(repo: &Repository, root: &mut Tree, target: &ObjectId) -> Result<bool> {
    let mut removed = root.remove(&target.to_hex()).is_some();

    let (dir, rest) = target.to_path_components();
    if let Some(fanout) = root.get(&dir).filter(|e| e.is_tree()).cloned() {
        let mut subtree = repo.objects().read_tree(&fanout.target)?;
        if subtree.remove(&rest).is_some() {
            removed = true;
            if subtree.is_empty() {
                root.remove(&dir);
            } else {
                let id = repo.objects().write_tree(&subtree)?;
                root.upsert(TreeEntry::tree(dir, id))?;
            }
        }
    }

    Ok(removed)
}

/// add the fan-out entry for `target`
fn attach(repo: &Repository, root: &mut Tree, target: &ObjectId, blob: ObjectId) -> Result<()> {
    let (dir, rest) = target.to_path_components();

    let mut subtree = match root.get(&dir).filter(|e| e.is_tree()) {
        Some(fanout) => repo.objects().read_tree(&fanout.target)?,
        None => Tree::empty(),
    };
    subtree.upsert(TreeEntry::blob(rest, blob))?;

    let id = repo.objects().write_tree(&subtree)?;
    root.upsert(TreeEntry::tree(dir, id))
}

fn write_notes_commit(
    repo: &Repository,
    root: &Tree,
    parent: Option<ObjectId>,
    author: &Signature,
    committer: &Signature,
    message: &str,
) -> Result<ObjectId> {
    let tree = repo.objects().write_tree(root)?;
    let commit = Commit::new(
        tree,
        parent.into_iter().collect(),
        author.clone(),
        committer.clone(),
        format!("{}\n", message),
    );
    repo.objects().write_commit(&commit)
}

fn read_message(repo: &Repository, id: &ObjectId) -> Result<String> {
    let bytes = repo.objects().read_blob(id)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sig(time: i64) -> Signature {
        Signature::new("Noter", "noter@example.com", time, 0).unwrap()
    }

    fn setup() -> (tempfile::TempDir, Repository, ObjectId) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path(), false).unwrap();
        let tree = repo.objects().write_tree(&Tree::empty()).unwrap();
        let commit = repo
            .objects()
            .write_commit(&Commit::new(tree, vec![], sig(1), sig(1), "annotated"))
            .unwrap();
        (dir, repo, commit)
    }

    #[test]
    fn test_default_ref() {
        let (_dir, mut repo, _) = setup();
        assert_eq!(default_ref(&repo), "refs/notes/commits");

        repo.config_mut().notes.default_ref = Some("refs/notes/review".to_string());
        assert_eq!(default_ref(&repo), "refs/notes/review");
    }

    #[test]
    fn test_overwrite_scenario() {
        let (_dir, repo, target) = setup();

        let first = create(&repo, target, "first", &sig(2), &sig(2), None, false).unwrap();
        assert_eq!(first.notes_ref, "refs/notes/commits");

        let result = create(&repo, target, "second", &sig(3), &sig(3), None, false);
        assert!(matches!(result, Err(Error::NoteAlreadyExists { .. })));
        assert_eq!(read(&repo, target, None).unwrap().message, "first");

        create(&repo, target, "second", &sig(4), &sig(4), None, true).unwrap();
        let note = read(&repo, target, None).unwrap();
        assert_eq!(note.message, "second");

        let listed = list(&repo, None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].target, target);
        assert_eq!(listed[0].message, "second");

        // two commits; the rejected create left no trace
        let tip = repo.refs().resolve("refs/notes/commits").unwrap();
        let tip_commit = repo.objects().read_commit(&tip).unwrap();
        assert_eq!(tip_commit.parents.len(), 1);
        let first_commit = repo.objects().read_commit(&tip_commit.parents[0]).unwrap();
        assert!(first_commit.is_root());
    }

    #[test]
    fn test_fanout_layout() {
        let (_dir, repo, target) = setup();
        create(&repo, target, "hello", &sig(2), &sig(2), None, false).unwrap();

        let tip = repo.refs().resolve("refs/notes/commits").unwrap();
        let root = notes_tree(&repo, Some(tip)).unwrap();
        let (dir, rest) = target.to_path_components();

        let fanout = root.get(&dir).unwrap();
        assert!(fanout.is_tree());
        let subtree = repo.objects().read_tree(&fanout.target).unwrap();
        assert!(subtree.get(&rest).is_some());
    }

    #[test]
    fn test_reads_flat_layout() {
        let (_dir, repo, target) = setup();

        let blob = repo.objects().write_blob(b"flat note").unwrap();
        let root = Tree::new(vec![TreeEntry::blob(target.to_hex(), blob)]).unwrap();
        let commit = write_notes_commit(&repo, &root, None, &sig(1), &sig(1), "flat").unwrap();
        repo.refs().set("refs/notes/commits", commit).unwrap();

        assert_eq!(read(&repo, target, None).unwrap().message, "flat note");
        assert_eq!(list(&repo, None).unwrap().len(), 1);

        // rewriting moves the note into the fan-out layout
        create(&repo, target, "moved", &sig(2), &sig(2), None, true).unwrap();
        let tip = repo.refs().resolve("refs/notes/commits").unwrap();
        let root = notes_tree(&repo, Some(tip)).unwrap();
        assert!(root.get(&target.to_hex()).is_none());
        assert_eq!(list(&repo, None).unwrap()[0].message, "moved");
    }

    #[test]
    fn test_fanout_entry_shadows_flat_entry() {
        let (_dir, repo, target) = setup();

        let flat = repo.objects().write_blob(b"flat").unwrap();
        let nested = repo.objects().write_blob(b"nested").unwrap();
        let (dir, rest) = target.to_path_components();
        let fanout = repo
            .objects()
            .write_tree(&Tree::new(vec![TreeEntry::blob(rest, nested)]).unwrap())
            .unwrap();
        let root = Tree::new(vec![
            TreeEntry::blob(target.to_hex(), flat),
            TreeEntry::tree(dir, fanout),
        ])
        .unwrap();
        let commit = write_notes_commit(&repo, &root, None, &sig(1), &sig(1), "both").unwrap();
        repo.refs().set("refs/notes/commits", commit).unwrap();

        let read_back = read(&repo, target, None).unwrap();
        let listed = list(&repo, None).unwrap();
        assert_eq!(read_back.message, "nested");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, read_back.id);
        assert_eq!(listed[0].message, "nested");
    }

    #[test]
    fn test_list_sorted_and_namespaced() {
        let (_dir, repo, _) = setup();

        let mut targets = Vec::new();
        for i in 0..5 {
            let blob = repo.objects().write_blob(format!("object {}", i).as_bytes()).unwrap();
            create(&repo, blob, &format!("note {}", i), &sig(i), &sig(i), None, false).unwrap();
            targets.push(blob);
        }
        create(&repo, targets[0], "elsewhere", &sig(9), &sig(9), Some("refs/notes/other"), false).unwrap();

        let notes = list(&repo, None).unwrap();
        let listed: Vec<_> = notes.iter().map(|n| n.target).collect();
        targets.sort();
        assert_eq!(listed, targets);

        let other = list(&repo, Some("refs/notes/other")).unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].message, "elsewhere");

        assert!(list(&repo, Some("refs/notes/empty")).unwrap().is_empty());
    }

    #[test]
    fn test_remove() {
        let (_dir, repo, target) = setup();

        assert!(matches!(
            remove(&repo, target, None, &sig(1), &sig(1)),
            Err(Error::NoteNotFound { .. })
        ));

        create(&repo, target, "temporary", &sig(2), &sig(2), None, false).unwrap();
        remove(&repo, target, None, &sig(3), &sig(3)).unwrap();

        assert!(matches!(read(&repo, target, None), Err(Error::NoteNotFound { .. })));
        assert!(list(&repo, None).unwrap().is_empty());

        // empty fan-out directories are dropped
        let tip = repo.refs().resolve("refs/notes/commits").unwrap();
        assert!(notes_tree(&repo, Some(tip)).unwrap().is_empty());
    }

    #[test]
    fn test_create_on_missing_object() {
        let (_dir, repo, _) = setup();
        let missing = ObjectId::from_bytes([0xab; 20]);

        assert!(matches!(
            create(&repo, missing, "x", &sig(1), &sig(1), None, false),
            Err(Error::ObjectNotFound(_))
        ));
        assert!(matches!(
            create(&repo, missing, "x", &sig(1), &sig(1), Some("notes/bad"), false),
            Err(Error::InvalidRef(_))
        ));
    }
}
