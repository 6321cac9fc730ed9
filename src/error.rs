use std::path::PathBuf;

use crate::ObjectId;

/// error type for grove operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("repository not found at {0}")]
    RepositoryNotFound(PathBuf),

    #[error("repository already exists at {0}")]
    RepoExists(PathBuf),

    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("no note for {target} in {notes_ref}")]
    NoteNotFound { target: ObjectId, notes_ref: String },

    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("invalid ref name: {0}")]
    InvalidRef(String),

    #[error("object {id} is a {actual}, expected {expected}")]
    InvalidObjectType {
        id: ObjectId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("unknown object type: {0}")]
    UnknownObjectType(String),

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("duplicate tree entry name: {0}")]
    DuplicateEntryName(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("note for {target} already exists in {notes_ref}")]
    NoteAlreadyExists { target: ObjectId, notes_ref: String },

    #[error("ref already exists: {0}")]
    RefExists(String),

    #[error("remote already exists: {0}")]
    RemoteExists(String),

    #[error("reference cycle detected while resolving {0}")]
    ReferenceCycle(String),

    #[error("ref {name} changed concurrently (expected {expected:?})")]
    RefUpdateConflict {
        name: String,
        expected: Option<ObjectId>,
    },

    #[error("corrupt object: hash mismatch for {0}")]
    CorruptObject(ObjectId),

    #[error("malformed object {id}: {reason}")]
    MalformedObject { id: ObjectId, reason: String },

    #[error("malformed ref {name}: {reason}")]
    MalformedRef { name: String, reason: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

/// coarse classification of an [`Error`], for callers that only need to
/// branch on the failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    AlreadyExists,
    ReferenceCycle,
    Conflict,
    Corruption,
    IoFailure,
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RepositoryNotFound(_)
            | Error::ObjectNotFound(_)
            | Error::RefNotFound(_)
            | Error::BranchNotFound(_)
            | Error::NoteNotFound { .. }
            | Error::RemoteNotFound(_) => ErrorKind::NotFound,

            Error::InvalidHashHex(_)
            | Error::InvalidRef(_)
            | Error::InvalidObjectType { .. }
            | Error::UnknownObjectType(_)
            | Error::InvalidEntryName(_)
            | Error::DuplicateEntryName(_)
            | Error::InvalidSignature(_)
            | Error::InvalidConfig(_) => ErrorKind::InvalidArgument,

            Error::RepoExists(_)
            | Error::NoteAlreadyExists { .. }
            | Error::RefExists(_)
            | Error::RemoteExists(_) => ErrorKind::AlreadyExists,

            Error::ReferenceCycle(_) => ErrorKind::ReferenceCycle,
            Error::RefUpdateConflict { .. } => ErrorKind::Conflict,

            Error::CorruptObject(_) | Error::MalformedObject { .. } | Error::MalformedRef { .. } => {
                ErrorKind::Corruption
            }

            Error::Io { .. }
            | Error::Transport { .. }
            | Error::Config(_)
            | Error::ConfigSerialize(_) => ErrorKind::IoFailure,

            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn malformed(id: ObjectId, reason: impl Into<String>) -> Self {
        Error::MalformedObject {
            id,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
