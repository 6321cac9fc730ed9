//! high-level operations on grove repositories

mod branch;
mod commit;
mod fsck;
mod graph;
mod log;
pub mod notes;
mod tag;
mod walk;

pub use branch::{branches, create_branch, delete_branch, lookup_branch, Branch, BranchFilter, BranchKind};
pub use commit::{commit, snapshot_dir, CommitRequest};
pub use fsck::{fsck, CorruptObject, FsckReport, MissingObject};
pub use graph::{ahead_behind, is_descendant_of, merge_base};
pub use log::{log, LogEntry};
pub use notes::Note;
pub use tag::{create_lightweight_tag, create_tag, delete_tag, tags, TagInfo};
pub use walk::{RevWalk, WalkOrder};
