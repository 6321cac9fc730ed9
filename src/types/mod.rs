mod commit;
mod object;
mod signature;
mod tag;
mod tree;

pub use commit::Commit;
pub use object::{Object, ObjectKind};
pub use signature::Signature;
pub use tag::Tag;
pub use tree::{FileMode, Tree, TreeEntry};

pub(crate) use object::split_frame;
