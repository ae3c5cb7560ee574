//! # Tenancy Counsel CLI (`counsel`)
//!
//! ## Usage
//!
//! ```bash
//! counsel --config ./config/counsel.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `counsel init` | Create the SQLite database and run schema migrations |
//! | `counsel ingest <path>` | Extract, normalize, chunk, and store documents |
//! | `counsel deactivate <id>` | Soft-delete a knowledge source |
//! | `counsel retrieve "<query>"` | Show the ranked context for a query |
//! | `counsel credits grant <user> <n>` | Add questions to a user's quota |
//! | `counsel credits show <user>` | Print a user's quota |
//! | `counsel chat "<question>" --user <id>` | Ask a question |
//! | `counsel serve` | Start the HTTP server |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tenancy_counsel::prompts::Role;
use tenancy_counsel::{commands, config, ingest, migrate, server};
use tenancy_counsel_core::models::SourceKind;

/// Tenancy Counsel: BC housing-law answers grounded in a curated corpus.
#[derive(Parser)]
#[command(
    name = "counsel",
    about = "Tenancy Counsel: BC housing-law answers grounded in a curated corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/counsel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest a file, or every supported file under a directory.
    ///
    /// Supported extensions: .pdf, .txt, .md, .html.
    Ingest {
        path: PathBuf,

        /// Source kind: `web`, `pdf`, `forum`, or `legislation`.
        #[arg(long, default_value = "pdf")]
        kind: SourceKind,

        /// Replace the source with this id instead of creating one.
        #[arg(long)]
        id: Option<String>,

        /// Display name (defaults to the file name).
        #[arg(long)]
        name: Option<String>,

        /// Page or post URL.
        #[arg(long)]
        url: Option<String>,

        /// Community the post came from (required for forum).
        #[arg(long)]
        community: Option<String>,

        /// Post timestamp (RFC 3339, YYYY-MM-DD, or Unix seconds).
        #[arg(long)]
        posted_at: Option<String>,

        /// Section number for legislation (defaults to the file stem).
        #[arg(long)]
        section: Option<String>,
    },

    /// Soft-delete a knowledge source so it is no longer retrieved.
    Deactivate { id: String },

    /// Show the ranked context and citations for a query.
    Retrieve {
        query: String,

        /// Include per-signal score breakdowns.
        #[arg(long)]
        explain: bool,

        /// Print the raw JSON result.
        #[arg(long)]
        json: bool,
    },

    /// Manage question credits.
    Credits {
        #[command(subcommand)]
        action: CreditsAction,
    },

    /// Ask a question as a user, spending one credit.
    Chat {
        question: String,

        #[arg(long)]
        user: String,

        /// `landlord` or `tenant`.
        #[arg(long, default_value = "tenant")]
        role: Role,

        /// Print the answer as it is generated.
        #[arg(long)]
        stream: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum CreditsAction {
    /// Add questions to a user's quota.
    Grant {
        user: String,
        questions: i64,

        /// Expiry date (YYYY-MM-DD).
        #[arg(long)]
        expires: Option<String>,
    },
    /// Print a user's quota.
    Show { user: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .ok();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            kind,
            id,
            name,
            url,
            community,
            posted_at,
            section,
        } => {
            let opts = ingest::IngestOptions {
                kind,
                id,
                name,
                url,
                community,
                posted_at,
                section,
            };
            ingest::run_ingest(&cfg, &path, &opts).await?;
        }
        Commands::Deactivate { id } => {
            ingest::run_deactivate(&cfg, &id).await?;
        }
        Commands::Retrieve {
            query,
            explain,
            json,
        } => {
            commands::run_retrieve(&cfg, &query, explain, json).await?;
        }
        Commands::Credits { action } => match action {
            CreditsAction::Grant {
                user,
                questions,
                expires,
            } => {
                commands::run_credits_grant(&cfg, &user, questions, expires.as_deref()).await?;
            }
            CreditsAction::Show { user } => {
                commands::run_credits_show(&cfg, &user).await?;
            }
        },
        Commands::Chat {
            question,
            user,
            role,
            stream,
        } => {
            commands::run_chat(&cfg, &question, &user, role, stream).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
