pub mod archive;
pub mod config;
pub mod error;
pub mod github;
pub mod workflow;

pub use error::SyncError;

/// User-Agent sent on every GitHub API call.
pub const USER_AGENT: &str = concat!("repolink/", env!("CARGO_PKG_VERSION"));
