//! Error taxonomy for the sync pipeline.
//!
//! Every failure is terminal for the invocation: nothing here is retried
//! internally, the caller's scheduler owns re-invocation policy. The only
//! "expected" non-2xx anywhere in the pipeline is a 404 on the contents
//! lookup, which is the create path and never surfaces as an error.

use thiserror::Error;

/// Sub-steps of an archive fetch, named so a failure message identifies
/// exactly where the pipeline stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStep {
    Download,
    Extract,
    Swap,
}

impl std::fmt::Display for FetchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStep::Download => write!(f, "download"),
            FetchStep::Extract => write!(f, "extract"),
            FetchStep::Swap => write!(f, "swap"),
        }
    }
}

/// Errors that can occur during a sync invocation.
///
/// Messages may include provider response bodies for diagnostics; they must
/// never include the App JWT, the private key, or a bearer token.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("contents lookup failed: {0}")]
    Lookup(String),

    #[error("contents write rejected: {0}")]
    Upsert(String),

    #[error("repository dispatch rejected: {0}")]
    Dispatch(String),

    #[error("archive {step} failed: {detail}")]
    Fetch { step: FetchStep, detail: String },
}

impl SyncError {
    pub fn fetch(step: FetchStep, detail: impl Into<String>) -> Self {
        SyncError::Fetch {
            step,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_names_substep() {
        let err = SyncError::fetch(FetchStep::Extract, "truncated gzip stream");
        assert_eq!(
            err.to_string(),
            "archive extract failed: truncated gzip stream"
        );
    }

    #[test]
    fn test_config_error_message() {
        let err = SyncError::Config("APP_ID is not set".to_string());
        assert!(err.to_string().contains("APP_ID"));
    }
}
