//! Authenticated GitHub REST client.
//!
//! A thin wrapper over `reqwest` that attaches the bearer credential and the
//! headers GitHub requires on every call. Status classification is left to
//! the call sites: a 404 means "does not exist" on the contents lookup but is
//! a hard failure everywhere else, so the helpers hand back the raw response.

use reqwest::Response;
use serde::Serialize;

use crate::error::SyncError;

/// GitHub API client bound to one bearer credential.
///
/// The credential may be an installation access token or an ambient runner
/// token; the client does not care which.
pub struct GitHubClient {
    token: String,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", crate::USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// GET, surfacing transport failures through `classify`.
    pub async fn get(
        &self,
        url: &str,
        classify: impl Fn(String) -> SyncError,
    ) -> Result<Response, SyncError> {
        self.request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| classify(format!("request failed: {}", e)))
    }

    /// PUT with a JSON body.
    pub async fn put_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        classify: impl Fn(String) -> SyncError,
    ) -> Result<Response, SyncError> {
        self.request(reqwest::Method::PUT, url)
            .json(body)
            .send()
            .await
            .map_err(|e| classify(format!("request failed: {}", e)))
    }

    /// POST with a JSON body.
    pub async fn post_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        classify: impl Fn(String) -> SyncError,
    ) -> Result<Response, SyncError> {
        self.request(reqwest::Method::POST, url)
            .json(body)
            .send()
            .await
            .map_err(|e| classify(format!("request failed: {}", e)))
    }
}

/// Render a non-success response into an error detail string.
///
/// Includes the status and the provider body; the body is GitHub's own
/// diagnostic and never contains our credential.
pub async fn error_detail(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{}: {}", status, body)
}
