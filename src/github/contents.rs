//! Idempotent create-or-update of a single remote file.
//!
//! GitHub's contents API uses the current blob SHA as an optimistic
//! concurrency token: an update must present it, a create must not. The
//! upsert therefore always looks the file up first and forwards whatever it
//! found. A second run after any failure simply re-looks-up a fresh SHA, so
//! retries stay an external concern.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::client::{error_detail, GitHubClient};
use super::token::API_ROOT;
use crate::error::SyncError;

/// A file to be written into a remote repository.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub content: Vec<u8>,
}

/// PUT body for the contents endpoint. `sha` is serialized only when the
/// lookup found an existing blob; sending it on create would be rejected.
#[derive(Debug, Serialize)]
struct PutContentsBody<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ContentsMeta {
    sha: String,
}

fn contents_url(owner: &str, repo: &str, path: &str) -> String {
    format!("{}/repos/{}/{}/contents/{}", API_ROOT, owner, repo, path)
}

fn put_body<'a>(message: &'a str, content: &[u8], sha: Option<&'a str>) -> PutContentsBody<'a> {
    PutContentsBody {
        message,
        content: BASE64.encode(content),
        sha,
    }
}

/// How a lookup response steers the upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupOutcome {
    /// File exists; its SHA must accompany the write.
    Found,
    /// 404: the expected create path, write with no SHA.
    Create,
    /// Anything else is a lookup failure; no write is attempted.
    Fail,
}

fn classify_lookup(status: StatusCode) -> LookupOutcome {
    if status == StatusCode::NOT_FOUND {
        LookupOutcome::Create
    } else if status.is_success() {
        LookupOutcome::Found
    } else {
        LookupOutcome::Fail
    }
}

/// Fetch the current blob SHA for a path, if the file exists.
///
/// 404 is the expected create path and maps to `None`. Any other non-2xx is
/// a lookup failure and aborts the upsert before a write is attempted.
async fn lookup_content_sha(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    path: &str,
) -> Result<Option<String>, SyncError> {
    let response = client
        .get(&contents_url(owner, repo, path), SyncError::Lookup)
        .await?;

    match classify_lookup(response.status()) {
        LookupOutcome::Create => {
            tracing::debug!(path = %path, "File does not exist; will create");
            Ok(None)
        }
        LookupOutcome::Fail => Err(SyncError::Lookup(error_detail(response).await)),
        LookupOutcome::Found => {
            let meta: ContentsMeta = response.json().await.map_err(|e| {
                SyncError::Lookup(format!("failed to parse contents metadata: {}", e))
            })?;
            Ok(Some(meta.sha))
        }
    }
}

/// Create or replace `file` in its target repository with a single commit.
pub async fn upsert(
    client: &GitHubClient,
    file: &RemoteFile,
    message: &str,
) -> Result<(), SyncError> {
    let sha = lookup_content_sha(client, &file.owner, &file.repo, &file.path).await?;

    let body = put_body(message, &file.content, sha.as_deref());
    let response = client
        .put_json(
            &contents_url(&file.owner, &file.repo, &file.path),
            &body,
            SyncError::Upsert,
        )
        .await?;

    if !response.status().is_success() {
        return Err(SyncError::Upsert(error_detail(response).await));
    }

    tracing::info!(
        repo = %format!("{}/{}", file.owner, file.repo),
        path = %file.path,
        updated = sha.is_some(),
        "Remote file upserted"
    );

    Ok(())
}
