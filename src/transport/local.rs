//! local file transport for repository operations

use std::collections::HashSet;
use std::path::Path;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::refs::Reference;
use crate::repo::Repository;
use crate::types::{FileMode, Object};

use super::Transport;

/// serves refs and objects straight out of another on-disk repository
pub struct LocalTransport {
    repo: Repository,
}

impl LocalTransport {
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path).map_err(|e| match e {
            Error::RepositoryNotFound(path) => Error::Transport {
                message: format!("no repository at {}", path.display()),
            },
            other => other,
        })?;
        Ok(Self { repo })
    }

    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

impl Transport for LocalTransport {
    fn advertise(&mut self) -> Result<Vec<(String, ObjectId)>> {
        let mut refs = Vec::new();
        for prefix in ["refs/heads/", "refs/tags/"] {
            for reference in self.repo.refs().list(Some(prefix))? {
                if let Reference::Direct { name, target } = reference {
                    refs.push((name, target));
                }
            }
        }
        Ok(refs)
    }

    fn fetch(
        &mut self,
        wants: &[ObjectId],
        haves: &HashSet<ObjectId>,
        cancel: &CancelToken,
    ) -> Result<Vec<Object>> {
        let store = self.repo.objects();
        let mut visited: HashSet<ObjectId> = HashSet::new();
        let mut stack: Vec<ObjectId> = wants.to_vec();
        let mut objects = Vec::new();

        while let Some(id) = stack.pop() {
            if haves.contains(&id) || !visited.insert(id) {
                continue;
            }
            cancel.check()?;

            let object = store.read(&id)?;
            match &object {
                Object::Blob(_) => {}
                Object::Tree(tree) => stack.extend(
                    tree.entries()
                        .iter()
                        .filter(|e| e.mode != FileMode::Commit)
                        .map(|e| e.target),
                ),
                Object::Commit(commit) => {
                    stack.push(commit.tree);
                    stack.extend(commit.parents.iter().copied());
                }
                Object::Tag(tag) => stack.push(tag.target),
            }
            objects.push(object);
        }

        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Commit, Signature, Tree, TreeEntry};
    use tempfile::tempdir;

    fn sig() -> Signature {
        Signature::new("Test", "test@example.com", 1, 0).unwrap()
    }

    fn commit_file(repo: &Repository, content: &[u8], parents: Vec<ObjectId>) -> ObjectId {
        let blob = repo.objects().write_blob(content).unwrap();
        let tree = repo
            .objects()
            .write_tree(&Tree::new(vec![TreeEntry::blob("file.txt", blob)]).unwrap())
            .unwrap();
        repo.objects()
            .write_commit(&Commit::new(tree, parents, sig(), sig(), "c"))
            .unwrap()
    }

    #[test]
    fn test_advertise_heads_and_tags() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path(), true).unwrap();
        let c = commit_file(&repo, b"one", vec![]);
        repo.refs().set("refs/heads/main", c).unwrap();
        repo.refs().set("refs/tags/v1", c).unwrap();
        repo.refs().set("refs/notes/commits", c).unwrap();

        let mut transport = LocalTransport::open(dir.path()).unwrap();
        let refs = transport.advertise().unwrap();
        assert_eq!(
            refs,
            vec![
                ("refs/heads/main".to_string(), c),
                ("refs/tags/v1".to_string(), c)
            ]
        );
    }

    #[test]
    fn test_fetch_skips_haves() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path(), true).unwrap();
        let c1 = commit_file(&repo, b"one", vec![]);
        let c2 = commit_file(&repo, b"two", vec![c1]);

        let mut transport = LocalTransport::new(repo);
        let cancel = CancelToken::new();

        let everything = transport.fetch(&[c2], &HashSet::new(), &cancel).unwrap();
        assert_eq!(everything.len(), 6);

        let haves: HashSet<_> = [c1].into_iter().collect();
        let delta = transport.fetch(&[c2], &haves, &cancel).unwrap();
        // commit, tree and blob of c2
        assert_eq!(delta.len(), 3);
    }

    #[test]
    fn test_fetch_cancelled() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path(), true).unwrap();
        let c1 = commit_file(&repo, b"one", vec![]);

        let mut transport = LocalTransport::new(repo);
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(matches!(
            transport.fetch(&[c1], &HashSet::new(), &cancel),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_open_missing() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            LocalTransport::open(&dir.path().join("nope")),
            Err(Error::Transport { .. })
        ));
    }
}
