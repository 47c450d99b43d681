//! GitHub integration: App authentication and the REST calls the sync
//! pipeline performs (contents upsert, repository dispatch).

pub mod client;
pub mod contents;
pub mod dispatch;
pub mod token;

pub use client::GitHubClient;
pub use contents::RemoteFile;
pub use dispatch::DispatchEvent;
pub use token::mint_installation_token;
