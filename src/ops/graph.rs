use std::collections::{HashSet, VecDeque};

use crate::error::Result;
use crate::hash::ObjectId;
use crate::repo::Repository;

use super::walk::{RevWalk, WalkOrder};

/// true if `ancestor` is reachable from `commit` through parent links
///
/// a commit is not its own descendant. both ids must name commits.
pub fn is_descendant_of(repo: &Repository, commit: ObjectId, ancestor: ObjectId) -> Result<bool> {
    let start = repo.objects().read_commit(&commit)?;
    repo.objects().read_commit(&ancestor)?;

    if commit == ancestor {
        return Ok(false);
    }

    let mut visited = HashSet::new();
    let mut queue: VecDeque<ObjectId> = start.parents.into_iter().collect();

    while let Some(id) = queue.pop_front() {
        if id == ancestor {
            return Ok(true);
        }
        if !visited.insert(id) {
            continue;
        }
        let parent = repo.objects().read_commit(&id)?;
        queue.extend(parent.parents);
    }

    Ok(false)
}

/// nearest common ancestor of two commits, `None` for unrelated histories
pub fn merge_base(repo: &Repository, a: ObjectId, b: ObjectId) -> Result<Option<ObjectId>> {
    let mut from_a = RevWalk::new(repo);
    from_a.sorting(WalkOrder::Insertion);
    from_a.push(a)?;
    let reachable: HashSet<ObjectId> = from_a.collect::<Result<_>>()?;

    let mut from_b = RevWalk::new(repo);
    from_b.sorting(WalkOrder::Time);
    from_b.push(b)?;
    for id in from_b {
        let id = id?;
        if reachable.contains(&id) {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

/// commits only on `local` and commits only on `upstream`
pub fn ahead_behind(repo: &Repository, local: ObjectId, upstream: ObjectId) -> Result<(usize, usize)> {
    let count_exclusive = |tip: ObjectId, other: ObjectId| -> Result<usize> {
        let mut walk = RevWalk::new(repo);
        walk.sorting(WalkOrder::Insertion);
        walk.push(tip)?;
        walk.hide(other)?;
        walk.try_fold(0, |n, id| id.map(|_| n + 1))
    };

    Ok((count_exclusive(local, upstream)?, count_exclusive(upstream, local)?))
}
