//! grove - git-style object store
//!
//! a content-addressed store for blobs, trees, commits and tags with
//! reference management and commit-graph traversal, written without any
//! existing git library.
//!
//! # Core concepts
//!
//! - **Object**: blob, tree, commit or tag, identified by the hash of its
//!   canonical encoding (`"<kind> <len>\0" + body`, git compatible with SHA-1)
//! - **Ref**: a named pointer to an object or to another ref (`HEAD`,
//!   `refs/heads/main`, `refs/notes/commits`)
//! - **Walk**: ordered traversal of commit history
//! - **Note**: text attached to an object without changing its id
//!
//! # On-disk layout
//!
//! ```text
//! <repo>/.grove/            (or the repository itself when bare)
//!   config.toml
//!   HEAD
//!   objects/ab/cdef...      zstd-compressed canonical bytes
//!   refs/heads/ refs/tags/ refs/remotes/ refs/notes/
//!   locks/                  per-ref advisory locks
//!   tmp/                    staging for atomic writes
//! ```
//!
//! # Example usage
//!
//! ```no_run
//! use grove::ops::{self, CommitRequest, WalkOrder};
//! use grove::{Repository, Signature, HEAD};
//! use std::path::Path;
//!
//! let repo = Repository::init(Path::new("/path/to/project"), false).unwrap();
//!
//! let tree = ops::snapshot_dir(&repo, Path::new("/path/to/project")).unwrap();
//! let me = Signature::now("Ada", "ada@example.com").unwrap();
//! ops::commit(
//!     &repo,
//!     CommitRequest {
//!         update_ref: Some(HEAD.to_string()),
//!         author: me.clone(),
//!         committer: me,
//!         message: "initial commit\n".to_string(),
//!         tree,
//!         parents: vec![],
//!     },
//! )
//! .unwrap();
//!
//! for id in repo.revisions(WalkOrder::Time).unwrap() {
//!     println!("{}", id);
//! }
//! ```

mod cancel;
mod config;
mod error;
mod hash;
mod object;
mod refs;
mod repo;

pub mod fs;
pub mod ops;
pub mod transport;
pub mod types;

pub use cancel::CancelToken;
pub use config::{Config, Remote, DEFAULT_BRANCH, DEFAULT_NOTES_REF};
pub use error::{Error, ErrorKind, IoResultExt, Result};
pub use hash::{HashKind, ObjectHasher, ObjectId, Sha1Hasher, Sha256Hasher, HEX_LEN, ID_LEN};
pub use object::ObjectStore;
pub use refs::{validate_ref_name, RefLock, RefStore, RefUpdate, Reference, HEAD};
pub use repo::{HeadState, RepoSummary, Repository, GITDIR_NAME};
pub use types::{Commit, FileMode, Object, ObjectKind, Signature, Tag, Tree, TreeEntry};
