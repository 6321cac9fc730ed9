//! transport layer for remote operations
//!
//! a [`Transport`] speaks for one remote repository: it advertises the refs
//! the remote offers and hands over the objects a fetch asks for. only a
//! local filesystem transport ships here; network protocols plug in behind
//! the same trait.

mod fetch;
mod local;

use std::collections::HashSet;
use std::path::Path;

pub use fetch::{fetch, FetchResult, RefChange, TransferStats};
pub use local::LocalTransport;

use crate::cancel::CancelToken;
use crate::config::Remote;
use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::types::Object;

/// source of refs and objects for a fetch
pub trait Transport {
    /// refs offered by the remote as `(full ref name, target)` pairs
    fn advertise(&mut self) -> Result<Vec<(String, ObjectId)>>;

    /// objects needed to complete `wants`, skipping history reachable from
    /// `haves`
    ///
    /// implementations check `cancel` between objects and return
    /// `Cancelled` once it trips.
    fn fetch(
        &mut self,
        wants: &[ObjectId],
        haves: &HashSet<ObjectId>,
        cancel: &CancelToken,
    ) -> Result<Vec<Object>>;
}

/// build the transport for a configured remote
///
/// plain paths and `file://` urls open a [`LocalTransport`]; other schemes
/// are rejected.
pub fn transport_for(remote: &Remote) -> Result<Box<dyn Transport>> {
    let url = remote.url.as_str();
    let path = match url.strip_prefix("file://") {
        Some(path) => path,
        None if url.contains("://") => {
            return Err(Error::Transport {
                message: format!("unsupported url for remote {}: {}", remote.name, url),
            })
        }
        None => url,
    };
    Ok(Box::new(LocalTransport::open(Path::new(path))?))
}
