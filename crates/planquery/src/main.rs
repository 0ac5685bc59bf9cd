//! # planquery CLI (`plq`)
//!
//! The `plq` binary is the primary interface for planquery. It provides
//! commands for index initialization, feed ingestion, role-aware
//! semantic search, grounded question answering, and index statistics.
//!
//! ## Usage
//!
//! ```bash
//! plq --config ./config/planquery.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `plq init` | Create the SQLite index and run schema migrations |
//! | `plq build <feed.json>` | Classify, chunk, embed, and index a feed export |
//! | `plq search "<query>"` | Semantic search over indexed chunks |
//! | `plq ask "<question>"` | Generate a grounded answer from retrieved records |
//! | `plq stats` | Show index provenance and category/decision breakdowns |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the index
//! plq init
//!
//! # Build from a feed export
//! plq build data/records.json
//!
//! # Search as a developer
//! plq search "large apartment schemes on public land" --role developer
//!
//! # Narrow by metadata
//! plq search "demolition" --category demolition --since 2024-01-01
//!
//! # Ask a grounded question
//! plq ask "What was decided for 12 Griffith Avenue?" --role homeowner
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use planquery::engine::SearchFilterArgs;
use planquery::{build, config, engine, migrate, stats};
use planquery_core::models::StakeholderRole;

/// planquery CLI — role-aware retrieval over planning application records.
#[derive(Parser)]
#[command(
    name = "plq",
    about = "planquery — role-aware retrieval and grounded answers over planning application records",
    version,
    long_about = "planquery classifies planning application records (development category, \
    land type, scale), synthesizes and embeds natural-language chunks, and serves semantic \
    search and grounded question answering with stakeholder-role-aware ranking."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/planquery.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the index schema.
    ///
    /// Creates the SQLite database file and the index tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Build (or rebuild) the index from a feed export file.
    ///
    /// Classifies every record with the versioned keyword ruleset,
    /// synthesizes chunks, embeds them in batches, and swaps the new
    /// index generation in atomically. Unusable records are skipped
    /// and counted, never fatal.
    Build {
        /// Path to the feed export (JSON array of records).
        input: PathBuf,

        /// Maximum number of records to index.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Search indexed chunks semantically.
    ///
    /// Embeds the query, oversamples nearest neighbours, applies
    /// stakeholder-role boosts, and prints ranked chunks with their
    /// classification metadata.
    Search {
        /// The search query string.
        query: String,

        /// Stakeholder role shaping the ranking: developer, architect,
        /// solicitor, estate_agent, homeowner, journalist, or none.
        #[arg(long, default_value = "none")]
        role: StakeholderRole,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Only chunks with this development category.
        #[arg(long)]
        category: Option<String>,

        /// Only chunks with this land type.
        #[arg(long)]
        land_type: Option<String>,

        /// Only chunks with this development scale.
        #[arg(long)]
        scale: Option<String>,

        /// Only chunks submitted on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only chunks from appealed applications.
        #[arg(long)]
        appeals_only: bool,
    },

    /// Ask a question and get a grounded, citing answer.
    ///
    /// Retrieves the most relevant chunks and feeds them to the
    /// configured generation provider. When retrieval finds nothing,
    /// a fixed no-match answer is returned without calling the provider.
    Ask {
        /// The question to answer.
        question: String,

        /// Stakeholder role shaping ranking and answer framing.
        #[arg(long, default_value = "none")]
        role: StakeholderRole,

        /// Print the retrieved context chunk ids and scores first.
        #[arg(long)]
        show_context: bool,
    },

    /// Show index statistics.
    ///
    /// Prints build provenance (model, ruleset version, build time)
    /// and category/decision breakdowns.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Index initialized successfully.");
        }
        Commands::Build { input, limit } => {
            build::run_build(&cfg, &input, limit).await?;
        }
        Commands::Search {
            query,
            role,
            limit,
            category,
            land_type,
            scale,
            since,
            appeals_only,
        } => {
            let filter_args = SearchFilterArgs {
                category,
                land_type,
                scale,
                since,
                appeals_only,
            };
            engine::run_search(&cfg, &query, role, limit, &filter_args).await?;
        }
        Commands::Ask {
            question,
            role,
            show_context,
        } => {
            engine::run_ask(&cfg, &question, role, show_context).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
