//! fetch operation - pull objects and refs from a remote

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::refs::{RefUpdate, Reference};
use crate::repo::Repository;

use super::Transport;

/// transfer statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransferStats {
    /// objects written to the local store
    pub received: usize,
    /// objects the remote sent that were already present
    pub skipped: usize,
    /// canonical bytes of the received objects
    pub bytes_transferred: u64,
}

/// a ref moved by a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefChange {
    pub name: String,
    pub old: Option<ObjectId>,
    pub new: ObjectId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub stats: TransferStats,
    /// refs created or moved, ordered by name
    pub updated: Vec<RefChange>,
}

/// fetch from a configured remote through `transport`
///
/// every object is stored before any ref moves. remote branches land under
/// `refs/remotes/<remote>/`; remote tags are created locally when missing and
/// never overwritten. refs move together: a name clash aborts before any
/// ref is written, and a failed update restores the refs already moved.
/// cancellation during the object phase leaves all refs untouched.
pub fn fetch(
    repo: &Repository,
    remote_name: &str,
    transport: &mut dyn Transport,
    cancel: &CancelToken,
) -> Result<FetchResult> {
    if repo.config().get_remote(remote_name).is_none() {
        return Err(Error::RemoteNotFound(remote_name.to_string()));
    }

    let advertised = transport.advertise()?;

    let mut wants: Vec<ObjectId> = advertised
        .iter()
        .map(|(_, id)| *id)
        .filter(|id| !repo.objects().exists(id))
        .collect();
    wants.sort();
    wants.dedup();

    let haves: HashSet<ObjectId> = repo
        .refs()
        .list(None)?
        .iter()
        .filter_map(Reference::target)
        .filter(|id| repo.objects().exists(id))
        .collect();

    let mut result = FetchResult::default();

    if !wants.is_empty() {
        let objects = transport.fetch(&wants, &haves, cancel)?;
        for object in &objects {
            cancel.check()?;
            let id = repo.objects().hash(object);
            if repo.objects().exists(&id) {
                result.stats.skipped += 1;
                continue;
            }
            repo.objects().write(object)?;
            result.stats.received += 1;
            result.stats.bytes_transferred += object.encode().len() as u64;
        }

        if let Some(missing) = wants.iter().find(|id| !repo.objects().exists(id)) {
            return Err(Error::Transport {
                message: format!("remote did not send {}", missing),
            });
        }
    }

    // objects are complete; from here on refs may move
    cancel.check()?;

    let plan = plan_ref_changes(repo, remote_name, advertised)?;

    let mut applied: Vec<&RefChange> = Vec::new();
    for change in &plan {
        if let Err(e) = repo.refs().set_if(&change.name, change.old, change.new) {
            rollback(repo, &applied);
            return Err(e);
        }
        debug!(r#ref = %change.name, target = %change.new.short(), "updated from remote");
        applied.push(change);
    }
    result.updated = plan;

    info!(
        remote = remote_name,
        received = result.stats.received,
        refs = result.updated.len(),
        "fetch complete"
    );
    Ok(result)
}

/// decide every ref move up front, ordered by name
///
/// fails before anything is written when a target name collides with the
/// layout of existing refs or with another planned name.
fn plan_ref_changes(
    repo: &Repository,
    remote_name: &str,
    advertised: Vec<(String, ObjectId)>,
) -> Result<Vec<RefChange>> {
    let mut plan = Vec::new();

    for (name, target) in advertised {
        let local_name = if let Some(branch) = name.strip_prefix("refs/heads/") {
            format!("refs/remotes/{}/{}", remote_name, branch)
        } else if name.starts_with("refs/tags/") {
            name
        } else {
            continue;
        };

        let current = repo.refs().try_read(&local_name)?;
        let old = current.as_ref().and_then(Reference::target);
        let unchanged = match &current {
            // tags are never moved once they exist locally
            Some(_) if local_name.starts_with("refs/tags/") => true,
            Some(_) => old == Some(target),
            None => false,
        };
        if unchanged {
            continue;
        }

        repo.refs().check_creatable(&local_name)?;
        plan.push(RefChange {
            name: local_name,
            old,
            new: target,
        });
    }

    let names: HashSet<&str> = plan.iter().map(|c| c.name.as_str()).collect();
    for change in &plan {
        let mut parent = change.name.as_str();
        while let Some((prefix, _)) = parent.rsplit_once('/') {
            if names.contains(prefix) {
                return Err(Error::InvalidRef(format!(
                    "{} conflicts with {}",
                    change.name, prefix
                )));
            }
            parent = prefix;
        }
    }

    plan.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(plan)
}

/// put refs moved by a failed fetch back where they were
fn rollback(repo: &Repository, applied: &[&RefChange]) {
    for change in applied.iter().rev() {
        let restored = repo.refs().update(&change.name, |current| {
            if current.and_then(Reference::target) != Some(change.new) {
                // moved again by someone else since
                return Ok(RefUpdate::Keep);
            }
            Ok(match change.old {
                Some(old) => RefUpdate::Set(old),
                None => RefUpdate::Delete,
            })
        });
        if let Err(e) = restored {
            warn!(r#ref = %change.name, error = %e, "failed to restore ref");
        }
    }
}
