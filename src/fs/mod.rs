pub mod write;

pub use write::{atomic_write, fsync_dir, prune_empty_dirs};
