use std::{io, path::PathBuf, time::Duration};

use uuid::Uuid;

/// Outcome of a registry call that did not succeed.
///
/// `NotFound` and `Io` are ordinary results produced by the worker; the
/// worker keeps running after either. `Timeout` and `Unavailable` are
/// produced on the caller's side of the channel.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Session id {0} does not exist")]
    NotFound(Uuid),

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("session registry did not answer within {0:?}")]
    Timeout(Duration),

    #[error("session registry is not running")]
    Unavailable,
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
