use std::fmt;

use tkr_revenue::CompanyFacts;

use crate::{EntityKey, Snapshot};

/// Errors a [`Directory`] implementation may return.
///
/// All of them are transient from the engine's point of view: a failed
/// per-entity fetch skips that entity for the cycle, a failed snapshot fetch
/// aborts the cycle before the store is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Network or transport failure.
    Transport(String),
    /// Upstream answered with a non-success status.
    Status { url: String, status: u16 },
    /// Payload could not be decoded.
    Decode(String),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::Transport(msg) => write!(f, "transport error: {msg}"),
            DirectoryError::Status { url, status } => {
                write!(f, "http status {status} from {url}")
            }
            DirectoryError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Upstream entity directory.
///
/// Object safe so the driver can hold `&dyn Directory`. Request pacing is the
/// implementation's concern, not the engine's.
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Short name for logs (e.g. `"edgar"`).
    fn name(&self) -> &'static str;

    /// Current full population. Anything absent is "not registered".
    async fn fetch_snapshot(&self) -> Result<Snapshot, DirectoryError>;

    /// Financial-facts document of one entity.
    async fn fetch_facts(&self, key: EntityKey) -> Result<CompanyFacts, DirectoryError>;
}
