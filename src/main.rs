//! # Heritage Search CLI (`hsearch`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hsearch init` | Create the SQLite database and run schema migrations |
//! | `hsearch load <file>` | Import a catalog dump and index its records |
//! | `hsearch reindex` | Rebuild the searchable value index from stored records |
//! | `hsearch drop-record <id>` | Remove a record and its searchable values |
//! | `hsearch search <terms>...` | Resolve terms to entities of the target kind |
//! | `hsearch session <id>` | Show or clear the results cached for a session |
//!
//! ## Examples
//!
//! ```bash
//! hsearch init --config ./config/hsearch.toml
//! hsearch load ./catalog.json --config ./config/hsearch.toml
//! hsearch search quartz "death valley" --depth 3
//! hsearch search --where material=v-jade --any material=v-gold --session s1
//! hsearch session s1
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use heritage_search::search::SearchRequest;
use heritage_search_core::filter::{AttributeFilter, FieldCondition, FilterOp};
use heritage_search::{config, load, migrate, search};

/// Heritage Search CLI: relationship-aware full-text search for
/// cultural-heritage catalogs.
#[derive(Parser)]
#[command(
    name = "hsearch",
    about = "Heritage Search: relationship-aware full-text search for cultural-heritage catalogs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/hsearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Import a catalog dump (entities, relationships, labels, records).
    ///
    /// Every record is indexed as it is stored.
    Load {
        /// Path to the catalog JSON file.
        file: PathBuf,
    },

    /// Rebuild the whole searchable value index from stored records.
    Reindex,

    /// Remove a record and all of its searchable values.
    DropRecord {
        /// Record id.
        record_id: String,
    },

    /// Search for entities of the target kind.
    ///
    /// Every term must reach a result, directly or through at most
    /// `--depth` relationship hops. With no terms, lists every entity of
    /// the target kind.
    Search {
        /// Search terms (case-insensitive substrings).
        terms: Vec<String>,

        /// Maximum relationship hops from a term match.
        #[arg(long)]
        depth: Option<usize>,

        /// Entity kind to return (defaults to `search.target_kind`).
        #[arg(long)]
        target: Option<String>,

        /// Page number, starting at 1.
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Record field condition all results must satisfy, as
        /// `field_id=value`. Repeatable.
        #[arg(long = "where", value_name = "FIELD=VALUE", value_parser = parse_condition)]
        all_of: Vec<FieldCondition>,

        /// Record field condition that widens the `--where` group, as
        /// `field_id=value`. Repeatable.
        #[arg(long = "any", value_name = "FIELD=VALUE", value_parser = parse_condition)]
        any_of: Vec<FieldCondition>,

        /// Session id to cache results under (random if omitted).
        #[arg(long)]
        session: Option<String>,

        /// Print the result page as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the result set cached by a session's last filtered search.
    Session {
        /// Session id.
        session_id: String,

        /// Forget the cached results instead of printing them.
        #[arg(long)]
        clear: bool,

        /// Print the cached ids as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// `field_id=value`. The value is read as JSON when it parses, else as a
/// plain string.
fn parse_condition(raw: &str) -> Result<FieldCondition, String> {
    let (field_id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{}`", raw))?;
    let field_id = field_id.trim();
    if field_id.is_empty() {
        return Err(format!("missing field id in `{}`", raw));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok(FieldCondition {
        field_id: field_id.to_string(),
        value,
    })
}

fn attribute_filters(all_of: Vec<FieldCondition>, any_of: Vec<FieldCondition>) -> Vec<AttributeFilter> {
    let mut filters = Vec::new();
    if !all_of.is_empty() {
        filters.push(AttributeFilter {
            op: FilterOp::And,
            conditions: all_of,
        });
    }
    if !any_of.is_empty() {
        filters.push(AttributeFilter {
            op: FilterOp::Or,
            conditions: any_of,
        });
    }
    filters
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.log.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load { file } => {
            load::run_load(&cfg, &file).await?;
        }
        Commands::Reindex => {
            load::run_reindex(&cfg).await?;
        }
        Commands::DropRecord { record_id } => {
            load::run_drop_record(&cfg, &record_id).await?;
        }
        Commands::Search {
            terms,
            depth,
            target,
            page,
            all_of,
            any_of,
            session,
            json,
        } => {
            let request = SearchRequest {
                terms,
                attribute_filters: attribute_filters(all_of, any_of),
                session_id: session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                page,
                max_depth: depth,
                target_kind: target,
            };
            search::run_search(&cfg, request, json).await?;
        }
        Commands::Session {
            session_id,
            clear,
            json,
        } => {
            search::run_session(&cfg, &session_id, clear, json).await?;
        }
    }

    Ok(())
}
