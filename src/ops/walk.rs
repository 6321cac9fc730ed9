use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::refs::HEAD;
use crate::repo::Repository;

/// order in which a [`RevWalk`] yields commits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WalkOrder {
    /// children before parents, ties broken by commit time
    Topological,
    /// newest committer time first
    #[default]
    Time,
    /// breadth-first in discovery order
    Insertion,
}

/// commit waiting in the time-ordered queue
struct Pending {
    time: i64,
    seq: u64,
    id: ObjectId,
    parents: Vec<ObjectId>,
}

// newest first, then earliest enqueued
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

enum WalkState {
    Time {
        heap: BinaryHeap<Pending>,
        seq: u64,
    },
    Insertion {
        queue: VecDeque<ObjectId>,
    },
    Sorted(std::vec::IntoIter<ObjectId>),
}

/// revision walker over the commit graph
///
/// configure roots, hidden commits and order, then iterate. each reachable
/// commit is yielded once. the walker is consumed by iteration; build a new
/// one to walk again.
pub struct RevWalk<'r> {
    repo: &'r Repository,
    order: WalkOrder,
    roots: Vec<ObjectId>,
    hide_roots: Vec<ObjectId>,
    cancel: Option<CancelToken>,
    hidden: HashSet<ObjectId>,
    seen: HashSet<ObjectId>,
    state: Option<WalkState>,
    done: bool,
}

impl<'r> RevWalk<'r> {
    pub fn new(repo: &'r Repository) -> Self {
        Self {
            repo,
            order: WalkOrder::default(),
            roots: Vec::new(),
            hide_roots: Vec::new(),
            cancel: None,
            hidden: HashSet::new(),
            seen: HashSet::new(),
            state: None,
            done: false,
        }
    }

    pub fn sorting(&mut self, order: WalkOrder) -> &mut Self {
        self.order = order;
        self
    }

    /// attach a cancellation token checked before every step
    pub fn cancel_with(&mut self, token: CancelToken) -> &mut Self {
        self.cancel = Some(token);
        self
    }

    /// start walking from a commit (annotated tags are peeled)
    pub fn push(&mut self, id: ObjectId) -> Result<&mut Self> {
        let (commit, _) = self.repo.objects().peel_to_commit(&id)?;
        self.roots.push(commit);
        Ok(self)
    }

    /// start walking from whatever a ref resolves to
    pub fn push_ref(&mut self, name: &str) -> Result<&mut Self> {
        let id = self.repo.refs().resolve(name)?;
        self.push(id)
    }

    /// start walking from HEAD; nothing happens when HEAD is unborn
    pub fn push_head(&mut self) -> Result<&mut Self> {
        match self.repo.refs().follow(HEAD)? {
            (_, Some(id)) => self.push(id),
            (_, None) => Ok(self),
        }
    }

    /// exclude a commit and all of its ancestors from the walk
    pub fn hide(&mut self, id: ObjectId) -> Result<&mut Self> {
        let (commit, _) = self.repo.objects().peel_to_commit(&id)?;
        self.hide_roots.push(commit);
        Ok(self)
    }

    fn start(&mut self) -> Result<WalkState> {
        self.hidden = self.ancestors_of(&self.hide_roots)?;
        let roots: Vec<ObjectId> = self.roots.clone();

        match self.order {
            WalkOrder::Time => {
                let mut heap = BinaryHeap::new();
                let mut seq = 0;
                for id in roots {
                    self.enqueue_pending(&mut heap, &mut seq, id)?;
                }
                Ok(WalkState::Time { heap, seq })
            }
            WalkOrder::Insertion => {
                let mut queue = VecDeque::new();
                for id in roots {
                    if !self.hidden.contains(&id) && self.seen.insert(id) {
                        queue.push_back(id);
                    }
                }
                Ok(WalkState::Insertion { queue })
            }
            WalkOrder::Topological => {
                let sorted = self.topological(&roots)?;
                Ok(WalkState::Sorted(sorted.into_iter()))
            }
        }
    }

    fn enqueue_pending(
        &mut self,
        heap: &mut BinaryHeap<Pending>,
        seq: &mut u64,
        id: ObjectId,
    ) -> Result<()> {
        if self.hidden.contains(&id) || !self.seen.insert(id) {
            return Ok(());
        }
        let commit = self.repo.objects().read_commit(&id)?;
        heap.push(Pending {
            time: commit.time(),
            seq: *seq,
            id,
            parents: commit.parents,
        });
        *seq += 1;
        Ok(())
    }

    /// every commit reachable from `starts`, starts included
    fn ancestors_of(&self, starts: &[ObjectId]) -> Result<HashSet<ObjectId>> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<ObjectId> = starts.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let commit = self.repo.objects().read_commit(&id)?;
            queue.extend(commit.parents);
        }
        Ok(visited)
    }

    /// order the reachable set so that every commit precedes its parents
    fn topological(&mut self, roots: &[ObjectId]) -> Result<Vec<ObjectId>> {
        // collect the reachable, non-hidden graph
        let mut nodes: HashMap<ObjectId, (i64, Vec<ObjectId>)> = HashMap::new();
        let mut discovery: HashMap<ObjectId, u64> = HashMap::new();
        let mut queue: VecDeque<ObjectId> = roots.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            if self.hidden.contains(&id) || nodes.contains_key(&id) {
                continue;
            }
            if let Some(cancel) = &self.cancel {
                cancel.check()?;
            }
            let commit = self.repo.objects().read_commit(&id)?;
            let next = discovery.len() as u64;
            discovery.entry(id).or_insert(next);
            queue.extend(commit.parents.iter().copied());
            nodes.insert(id, (commit.time(), commit.parents));
        }

        // count children inside the set
        let mut children: HashMap<ObjectId, usize> = nodes.keys().map(|id| (*id, 0)).collect();
        for (_, parents) in nodes.values() {
            for parent in parents {
                if let Some(count) = children.get_mut(parent) {
                    *count += 1;
                }
            }
        }

        let pending = |id: ObjectId| -> Pending {
            let (time, parents) = &nodes[&id];
            Pending {
                time: *time,
                seq: discovery[&id],
                id,
                parents: parents.clone(),
            }
        };

        let mut ready: BinaryHeap<Pending> = children
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| pending(*id))
            .collect();

        let mut sorted = Vec::with_capacity(nodes.len());
        while let Some(next) = ready.pop() {
            for parent in &next.parents {
                if let Some(count) = children.get_mut(parent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(pending(*parent));
                    }
                }
            }
            sorted.push(next.id);
        }

        self.seen.extend(sorted.iter().copied());
        Ok(sorted)
    }

    fn step(&mut self) -> Result<Option<ObjectId>> {
        let mut state = match self.state.take() {
            Some(state) => state,
            None => self.start()?,
        };

        let next = match &mut state {
            WalkState::Time { heap, seq } => match heap.pop() {
                Some(pending) => {
                    for parent in pending.parents {
                        self.enqueue_pending(heap, seq, parent)?;
                    }
                    Some(pending.id)
                }
                None => None,
            },
            WalkState::Insertion { queue } => match queue.pop_front() {
                Some(id) => {
                    let commit = self.repo.objects().read_commit(&id)?;
                    for parent in commit.parents {
                        if !self.hidden.contains(&parent) && self.seen.insert(parent) {
                            queue.push_back(parent);
                        }
                    }
                    Some(id)
                }
                None => None,
            },
            WalkState::Sorted(iter) => iter.next(),
        };

        self.state = Some(state);
        Ok(next)
    }
}

impl Iterator for RevWalk<'_> {
    type Item = Result<ObjectId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(cancel) = &self.cancel {
            if cancel.is_cancelled() {
                self.done = true;
                return Some(Err(Error::Cancelled));
            }
        }

        match self.step() {
            Ok(Some(id)) => Some(Ok(id)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
