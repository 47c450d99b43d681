use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repolink::config::{org_or_default, Credentials};
use repolink::error::SyncError;
use repolink::github::{self, mint_installation_token, DispatchEvent, GitHubClient, RemoteFile};
use repolink::{archive, workflow};

#[derive(Parser, Debug)]
#[command(name = "repolink")]
#[command(author, version, about = "GitHub App driven code and workflow sync between repositories", long_about = None)]
struct Cli {
    /// Override log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push or update the trigger workflow in the application repository
    LinkWorkflow {
        /// Application repository that receives the workflow
        #[arg(long, env = "REPO_NAME")]
        repo: String,

        /// Repository the generated workflow dispatches back to
        #[arg(long, default_value = "idp-repo")]
        target_repo: String,

        /// Event type the generated workflow dispatches
        #[arg(long, default_value = "sync-code")]
        event_type: String,

        /// Path of the workflow file inside the repository
        #[arg(long, default_value = workflow::TRIGGER_WORKFLOW_PATH)]
        path: String,
    },

    /// Send a repository_dispatch event to a target repository
    Dispatch {
        /// Target repository
        #[arg(long)]
        repo: String,

        /// Target owner (defaults to the configured organization)
        #[arg(long)]
        owner: Option<String>,

        /// Event type to dispatch
        #[arg(long, default_value = "sync-code")]
        event_type: String,

        /// Payload entries as key=value; repo_name is stamped in automatically
        #[arg(long = "payload", value_parser = parse_key_val)]
        payload: Vec<(String, String)>,

        /// Repository named as the event's origin in the payload
        #[arg(long, env = "REPO_NAME")]
        source_repo: Option<String>,

        /// Ambient token to use instead of minting App credentials
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Download a repository snapshot and replace a local directory with it
    Fetch {
        /// Repository to download
        #[arg(long, env = "REPO_NAME")]
        repo: String,

        /// Repository owner (defaults to the configured organization)
        #[arg(long)]
        owner: Option<String>,

        /// Branch, tag, or commit to download
        #[arg(long = "ref", default_value = "main")]
        git_ref: String,

        /// Destination directory to replace
        #[arg(long, default_value = "app-code")]
        dest: PathBuf,
    },
}

/// Parse a `key=value` payload argument.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {:?}", s)),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Errors propagate here from every component; this is the single place
    // that decides the exit code.
    if let Err(e) = run(cli.command).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), SyncError> {
    match command {
        Commands::LinkWorkflow {
            repo,
            target_repo,
            event_type,
            path,
        } => {
            let creds = Credentials::from_env()?;
            let token = mint_installation_token(&creds).await?;
            let client = GitHubClient::new(token);

            let content =
                workflow::render_trigger_workflow(&creds.org, &repo, &target_repo, &event_type);
            let file = RemoteFile {
                owner: creds.org.clone(),
                repo,
                path,
                content: content.into_bytes(),
            };
            github::contents::upsert(&client, &file, workflow::TRIGGER_WORKFLOW_COMMIT_MESSAGE)
                .await
        }

        Commands::Dispatch {
            repo,
            owner,
            event_type,
            payload,
            source_repo,
            token,
        } => {
            // An ambient runner token needs no App credentials; otherwise
            // mint a fresh installation token.
            let (token, owner) = match token {
                Some(token) => (token, org_or_default(owner)),
                None => {
                    let creds = Credentials::from_env()?;
                    let owner = owner.unwrap_or_else(|| creds.org.clone());
                    (mint_installation_token(&creds).await?, owner)
                }
            };
            let client = GitHubClient::new(token);

            let source = source_repo.unwrap_or_else(|| repo.clone());
            let event = DispatchEvent::new(&event_type, &source, &payload);
            github::dispatch::send(&client, &owner, &repo, &event).await
        }

        Commands::Fetch {
            repo,
            owner,
            git_ref,
            dest,
        } => {
            let creds = Credentials::from_env()?;
            let owner = owner.unwrap_or_else(|| creds.org.clone());
            let token = mint_installation_token(&creds).await?;
            let client = GitHubClient::new(token);

            archive::fetch(&client, &owner, &repo, &git_ref, &dest).await
        }
    }
}
