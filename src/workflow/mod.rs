//! Trigger-workflow generation.
//!
//! `link-workflow` pushes a GitHub Actions workflow into the application
//! repository; on every push to main that workflow re-derives an App JWT
//! from repository secrets, exchanges it for an installation token, and
//! sends a repository_dispatch back to the sync repository.
//!
//! The embedded shell re-implements the minting sequence for a context where
//! this binary is not available. It is rendered from one template with the
//! iat/exp offsets injected from [`crate::github::token`], so the two
//! implementations share their constants and cannot drift. The rendered
//! document never contains a live credential; the runner resolves secrets at
//! trigger time.

use crate::github::token::{API_ROOT, ASSERTION_TTL_SECS, CLOCK_DRIFT_SECS};

/// Where the generated workflow lands in the target repository.
pub const TRIGGER_WORKFLOW_PATH: &str = ".github/workflows/trigger-sync.yml";

/// Commit message used when upserting the workflow.
pub const TRIGGER_WORKFLOW_COMMIT_MESSAGE: &str = "Add/update workflow to trigger repo sync";

const TEMPLATE: &str = r#"# Generated by repolink; do not edit by hand.
name: Trigger Sync

on:
  push:
    branches:
      - main

jobs:
  trigger-sync:
    runs-on: ubuntu-latest
    steps:
      - name: Mint installation token and dispatch
        env:
          APP_PRIVATE_KEY: ${{ secrets.APP_PRIVATE_KEY }}
          APP_ID: ${{ secrets.APP_ID }}
          APP_INSTALLATION_ID: ${{ secrets.APP_INSTALLATION_ID }}
        run: |
          set -euo pipefail
          now=$(date +%s)
          b64url() { openssl base64 -A | tr '+/' '-_' | tr -d '='; }
          header=$(printf '{"alg":"RS256","typ":"JWT"}' | b64url)
          payload=$(printf '{"iat":%d,"exp":%d,"iss":"%s"}' \
            "$((now - __DRIFT_SECS__))" "$((now + __TTL_SECS__))" "$APP_ID" | b64url)
          signature=$(printf '%s.%s' "$header" "$payload" \
            | openssl dgst -sha256 -sign <(printf '%s' "$APP_PRIVATE_KEY") -binary | b64url)
          jwt="$header.$payload.$signature"
          token=$(curl -sf -X POST \
            -H "Authorization: Bearer $jwt" \
            -H "Accept: application/vnd.github+json" \
            "__API_ROOT__/app/installations/$APP_INSTALLATION_ID/access_tokens" | jq -r .token)
          curl -sf -X POST \
            -H "Authorization: Bearer $token" \
            -H "Accept: application/vnd.github+json" \
            --data '{"event_type":"__EVENT_TYPE__","client_payload":{"repo_name":"__SOURCE_REPO__"}}' \
            "__API_ROOT__/repos/__ORG__/__TARGET_REPO__/dispatches"
"#;

/// Render the trigger workflow for `org/source_repo`, dispatching
/// `event_type` to `org/target_repo`.
pub fn render_trigger_workflow(
    org: &str,
    source_repo: &str,
    target_repo: &str,
    event_type: &str,
) -> String {
    TEMPLATE
        .replace("__DRIFT_SECS__", &CLOCK_DRIFT_SECS.to_string())
        .replace("__TTL_SECS__", &ASSERTION_TTL_SECS.to_string())
        .replace("__API_ROOT__", API_ROOT)
        .replace("__ORG__", org)
        .replace("__SOURCE_REPO__", source_repo)
        .replace("__TARGET_REPO__", target_repo)
        .replace("__EVENT_TYPE__", event_type)
}
