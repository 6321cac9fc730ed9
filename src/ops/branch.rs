use tracing::{debug, warn};

use crate::config::Remote;
use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::refs::{validate_ref_name, Reference, RefUpdate};
use crate::repo::Repository;

const LOCAL_PREFIX: &str = "refs/heads/";
const REMOTE_PREFIX: &str = "refs/remotes/";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchKind {
    Local,
    Remote,
}

/// which branches [`branches`] returns
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BranchFilter {
    Local,
    Remote,
    #[default]
    All,
}

impl BranchFilter {
    fn accepts(self, kind: BranchKind) -> bool {
        match self {
            BranchFilter::All => true,
            BranchFilter::Local => kind == BranchKind::Local,
            BranchFilter::Remote => kind == BranchKind::Remote,
        }
    }
}

/// typed view of a branch ref
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    /// short name: `main` for a local branch, `origin/main` for a remote one
    pub name: String,
    /// full ref name
    pub refname: String,
    pub kind: BranchKind,
    pub target: ObjectId,
    /// HEAD currently points at this branch
    pub is_head: bool,
    /// configured remote for remote-tracking branches
    pub remote: Option<Remote>,
}

impl Branch {
    /// build the typed view of `refname` pointing at `target`
    pub fn from_ref(repo: &Repository, refname: &str, target: ObjectId) -> Result<Self> {
        let (kind, name) = if let Some(short) = refname.strip_prefix(LOCAL_PREFIX) {
            (BranchKind::Local, short)
        } else if let Some(short) = refname.strip_prefix(REMOTE_PREFIX) {
            (BranchKind::Remote, short)
        } else {
            return Err(Error::InvalidRef(format!("not a branch: {}", refname)));
        };

        let remote = match kind {
            BranchKind::Local => None,
            BranchKind::Remote => name
                .split_once('/')
                .and_then(|(remote, _)| repo.config().get_remote(remote))
                .cloned(),
        };

        Ok(Self {
            name: name.to_string(),
            refname: refname.to_string(),
            kind,
            target,
            is_head: repo.refs().is_head(refname)?,
            remote,
        })
    }

    pub fn is_local(&self) -> bool {
        self.kind == BranchKind::Local
    }
}

/// list branches, ordered by ref name
///
/// symbolic aliases such as `refs/remotes/origin/HEAD` are skipped.
pub fn branches(repo: &Repository, filter: BranchFilter) -> Result<Vec<Branch>> {
    let mut result = Vec::new();

    for (prefix, kind) in [(LOCAL_PREFIX, BranchKind::Local), (REMOTE_PREFIX, BranchKind::Remote)] {
        if !filter.accepts(kind) {
            continue;
        }
        for reference in repo.refs().list(Some(prefix))? {
            match reference {
                Reference::Direct { name, target } => {
                    result.push(Branch::from_ref(repo, &name, target)?);
                }
                Reference::Symbolic { name, .. } => {
                    if kind == BranchKind::Local {
                        warn!(name = %name, "skipping symbolic local branch");
                    }
                }
            }
        }
    }

    Ok(result)
}

/// create a local branch at a commit
///
/// fails with `RefExists` if the branch exists, unless `force` is set.
pub fn create_branch(repo: &Repository, name: &str, target: ObjectId, force: bool) -> Result<Branch> {
    let refname = local_refname(name)?;
    let (commit, _) = repo.objects().peel_to_commit(&target)?;

    repo.refs().update(&refname, |current| {
        if current.is_some() && !force {
            return Err(Error::RefExists(refname.clone()));
        }
        Ok(RefUpdate::Set(commit))
    })?;
    debug!(branch = name, target = %commit.short(), "created branch");

    Branch::from_ref(repo, &refname, commit)
}

/// delete a local branch; the branch HEAD points at cannot be deleted
pub fn delete_branch(repo: &Repository, name: &str) -> Result<()> {
    let refname = local_refname(name)?;
    if repo.refs().is_head(&refname)? {
        return Err(Error::InvalidRef(format!(
            "cannot delete the current branch: {}",
            name
        )));
    }

    match repo.refs().delete(&refname) {
        Err(Error::RefNotFound(_)) => Err(Error::BranchNotFound(name.to_string())),
        other => other,
    }
}

/// look up a branch by short name
pub fn lookup_branch(repo: &Repository, name: &str, kind: BranchKind) -> Result<Branch> {
    let refname = match kind {
        BranchKind::Local => local_refname(name)?,
        BranchKind::Remote => format!("{}{}", REMOTE_PREFIX, name),
    };

    match repo.refs().try_read(&refname)? {
        Some(Reference::Direct { target, .. }) => Branch::from_ref(repo, &refname, target),
        _ => Err(Error::BranchNotFound(name.to_string())),
    }
}

fn local_refname(name: &str) -> Result<String> {
    let refname = format!("{}{}", LOCAL_PREFIX, name);
    validate_ref_name(&refname)?;
    Ok(refname)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{commit, CommitRequest};
    use crate::refs::HEAD;
    use crate::types::{Signature, Tree};
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path(), false).unwrap();
        (dir, repo)
    }

    fn head_commit(repo: &Repository, message: &str) -> ObjectId {
        let sig = Signature::new("Test", "test@example.com", 1, 0).unwrap();
        let parents = repo.head_commit().unwrap().into_iter().collect();
        commit(
            repo,
            CommitRequest {
                update_ref: Some(HEAD.to_string()),
                author: sig.clone(),
                committer: sig,
                message: message.to_string(),
                tree: repo.objects().write_tree(&Tree::empty()).unwrap(),
                parents,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_branches_local_and_remote() {
        let (_dir, mut repo) = test_repo();
        repo.config_mut().add_remote("origin", "/srv/origin").unwrap();

        let c1 = head_commit(&repo, "first");
        create_branch(&repo, "feature", c1, false).unwrap();
        repo.refs().set("refs/remotes/origin/main", c1).unwrap();
        repo.refs()
            .set_symbolic("refs/remotes/origin/HEAD", "refs/remotes/origin/main")
            .unwrap();
        repo.refs().set("refs/remotes/stray/main", c1).unwrap();

        let all = branches(&repo, BranchFilter::All).unwrap();
        let names: Vec<_> = all.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["feature", "main", "origin/main", "stray/main"]);

        let main = &all[1];
        assert!(main.is_head);
        assert!(main.is_local());
        assert!(!all[0].is_head);

        let origin = &all[2];
        assert_eq!(origin.kind, BranchKind::Remote);
        assert_eq!(origin.remote.as_ref().map(|r| r.url.as_str()), Some("/srv/origin"));
        assert_eq!(all[3].remote, None);

        assert_eq!(branches(&repo, BranchFilter::Local).unwrap().len(), 2);
        assert_eq!(branches(&repo, BranchFilter::Remote).unwrap().len(), 2);
    }

    #[test]
    fn test_create_branch_exists() {
        let (_dir, repo) = test_repo();
        let c1 = head_commit(&repo, "first");
        let c2 = head_commit(&repo, "second");

        create_branch(&repo, "topic", c1, false).unwrap();
        assert!(matches!(
            create_branch(&repo, "topic", c2, false),
            Err(Error::RefExists(_))
        ));

        let forced = create_branch(&repo, "topic", c2, true).unwrap();
        assert_eq!(forced.target, c2);
        assert_eq!(lookup_branch(&repo, "topic", BranchKind::Local).unwrap().target, c2);
    }

    #[test]
    fn test_create_branch_invalid_name() {
        let (_dir, repo) = test_repo();
        let c1 = head_commit(&repo, "first");

        assert!(matches!(
            create_branch(&repo, "bad name", c1, false),
            Err(Error::InvalidRef(_))
        ));
        assert!(create_branch(&repo, "../escape", c1, false).is_err());
    }

    #[test]
    fn test_delete_branch() {
        let (_dir, repo) = test_repo();
        let c1 = head_commit(&repo, "first");
        create_branch(&repo, "old", c1, false).unwrap();

        delete_branch(&repo, "old").unwrap();
        assert!(matches!(
            lookup_branch(&repo, "old", BranchKind::Local),
            Err(Error::BranchNotFound(_))
        ));
        assert!(matches!(
            delete_branch(&repo, "old"),
            Err(Error::BranchNotFound(_))
        ));

        // the current branch stays
        assert!(delete_branch(&repo, "main").is_err());
        assert!(repo.refs().exists("refs/heads/main"));
    }
}
