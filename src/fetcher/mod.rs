mod http;

use crate::collector::{ScopeError, TargetScope};
use crate::profile::RawProfile;
use crate::target::Target;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub use http::HttpFetcher;

/// Profiles gathered from one target, keyed by the kind they were fetched as.
pub type FetchedProfiles = BTreeMap<String, RawProfile>;

/// Failure for a whole target. Failures of single kinds are logged by the
/// fetcher and never surface here.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out gathering profiles")]
    Timeout,

    #[error("cancelled while gathering profiles")]
    Cancelled,

    #[error("{address} is unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("gathering aborted: {0}")]
    Aborted(String),
}

impl From<ScopeError> for FetchError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::DeadlineExceeded => Self::Timeout,
            ScopeError::Cancelled => Self::Cancelled,
            ScopeError::WorkerLost(reason) => Self::Aborted(reason),
        }
    }
}

/// Why a single profile kind could not be gathered.
#[derive(Debug, Error)]
pub enum KindError {
    #[error("unexpected status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("response exceeds {0} bytes")]
    TooLarge(u64),

    #[error("invalid profile: {0:#}")]
    Decode(anyhow::Error),

    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Gathers profiles from a target.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches every configured kind within `scope`. Returns whichever kinds
    /// succeeded; only a failure of the target as a whole is an error.
    async fn fetch(
        &self,
        scope: &TargetScope,
        target: &Target,
    ) -> Result<FetchedProfiles, FetchError>;
}
