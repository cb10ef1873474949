mod client;
mod request;

use crate::classifier::CanonicalProfileKind;
use crate::collector::{ScopeError, TargetScope};
use async_trait::async_trait;
use thiserror::Error;

pub use client::StoreClient;
pub use request::SubmissionRequest;

/// A profile the store accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedProfile {
    pub id: String,
    pub kind: CanonicalProfileKind,
    /// Where the stored profile can be downloaded from.
    pub url: String,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid submission: {0}")]
    InvalidRequest(String),

    #[error("store rejected the profile with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed store response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out submitting profile")]
    Timeout,

    #[error("cancelled while submitting profile")]
    Cancelled,

    #[error("submission aborted: {0}")]
    Aborted(String),
}

impl From<ScopeError> for SubmitError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::DeadlineExceeded => Self::Timeout,
            ScopeError::Cancelled => Self::Cancelled,
            ScopeError::WorkerLost(reason) => Self::Aborted(reason),
        }
    }
}

/// Destination for collected profiles.
#[async_trait]
pub trait ProfileSink: Send + Sync {
    /// Stores one profile. Called once per profile; failures are not retried.
    async fn submit(
        &self,
        scope: &TargetScope,
        request: SubmissionRequest,
    ) -> Result<SavedProfile, SubmitError>;
}
