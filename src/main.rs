//! # FHIR Tracker Index CLI (`fti`)
//!
//! The `fti` binary is the primary interface for the tracker index. It
//! provides commands for database initialization, data import, keyword
//! extraction, score maintenance, and search.
//!
//! ## Usage
//!
//! ```bash
//! fti --config ./config/fti.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fti init` | Create the SQLite database and run schema migrations |
//! | `fti import issues <file>` | Load a tracker export (JSON) into the record store |
//! | `fti import reference <file>` | Load stop words, lemmas, and FHIR vocabularies |
//! | `fti extract` | Full rebuild: tokenize all issues, write frequencies, score |
//! | `fti fix-scores` | Incremental IDF/BM25 recompute for new k1/b |
//! | `fti search "<query>"` | Ranked keyword search |
//! | `fti search-kind <kind>` | Issues ranked by one keyword kind |
//! | `fti top-keywords` | Most distinctive corpus vocabulary by IDF |
//! | `fti stats` | Database statistics overview |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! fti init --config ./config/fti.toml
//!
//! # Load data, build the index
//! fti import reference fhir-reference.json
//! fti import issues tracker-export.json
//! fti extract
//!
//! # Search
//! fti search "patient identifier validation"
//! fti search-kind element --limit 20
//! fti top-keywords --kind operation
//!
//! # Re-score after tuning parameters, without re-tokenizing
//! fti fix-scores --k1 1.5 --b 0.6
//! ```

mod config;
mod db;
mod extract;
mod import_cmd;
mod migrate;
mod models;
mod progress;
mod reference;
mod scorer;
mod search;
mod stats;
mod tokenizer;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::progress::ProgressMode;

/// FHIR Tracker Index CLI — a domain-aware BM25 relevance index over
/// FHIR issue-tracker content.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fti.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fti",
    about = "FHIR Tracker Index — a domain-aware BM25 relevance index over FHIR issue-tracker content",
    version,
    long_about = "The FHIR Tracker Index ingests issue-tracker content, classifies every token \
    as a word, stop word, FHIR element path, or FHIR operation name, aggregates per-issue and \
    corpus-wide frequencies, scores each keyword with BM25, and serves ranked keyword search \
    from the precomputed scores."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/fti.toml`. Database, BM25, scoring-batch,
    /// and retrieval settings are read from this file.
    #[arg(long, global = true, default_value = "./config/fti.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (issues,
    /// comments, reference stores, keyword and frequency tables, score
    /// singletons). This command is idempotent — running it multiple
    /// times is safe.
    Init,

    /// Import issues or reference data from a JSON file.
    Import {
        #[command(subcommand)]
        what: ImportWhat,
    },

    /// Full keyword extraction and scoring pass.
    ///
    /// Clears the keyword and frequency tables, tokenizes every issue
    /// (title, description, summary, resolution description, comments),
    /// persists per-issue and corpus-wide counts, then computes IDF and
    /// BM25 once. Issues that fail to process are warned and skipped.
    Extract {
        /// Override the k1 parameter from config for this run.
        #[arg(long)]
        k1: Option<f64>,

        /// Override the b parameter from config for this run.
        #[arg(long)]
        b: Option<f64>,

        /// Progress reporting: off, human, or json. Defaults by TTY.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Recompute IDF and BM25 from the existing frequency tables.
    ///
    /// Use after changing k1/b — no text is re-tokenized. Fails with a
    /// clear message when extraction has never run.
    FixScores {
        /// Override the k1 parameter from config for this run.
        #[arg(long)]
        k1: Option<f64>,

        /// Override the b parameter from config for this run.
        #[arg(long)]
        b: Option<f64>,

        /// Progress reporting: off, human, or json. Defaults by TTY.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Ranked keyword search over the precomputed scores.
    ///
    /// The query is tokenized with the same classifier used during
    /// extraction; each issue's score is the sum of its matched terms'
    /// BM25 scores.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Issues ranked by aggregate BM25 within one keyword kind.
    SearchKind {
        /// Keyword kind: word, stop, element, or operation.
        kind: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Most distinctive corpus vocabulary, ordered by IDF.
    TopKeywords {
        /// Restrict to one keyword kind: word, stop, element, or operation.
        #[arg(long)]
        kind: Option<String>,

        /// Maximum number of keywords to list.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Database statistics overview.
    Stats,
}

/// Import subcommands.
#[derive(Subcommand)]
enum ImportWhat {
    /// Load a tracker export: a JSON array of issues with their comments.
    Issues {
        /// Path to the issues JSON file.
        file: PathBuf,
    },

    /// Load reference data: stop words, lemmas, element paths, operation
    /// names.
    Reference {
        /// Path to the reference JSON file.
        file: PathBuf,
    },
}

fn progress_mode(flag: &Option<String>) -> anyhow::Result<ProgressMode> {
    match flag {
        Some(s) => ProgressMode::parse(s),
        None => Ok(ProgressMode::default_for_tty()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { what } => match what {
            ImportWhat::Issues { file } => {
                import_cmd::run_import_issues(&cfg, &file).await?;
            }
            ImportWhat::Reference { file } => {
                import_cmd::run_import_reference(&cfg, &file).await?;
            }
        },
        Commands::Extract { k1, b, progress } => {
            let reporter = progress_mode(&progress)?.reporter();
            let k1 = k1.unwrap_or(cfg.bm25.k1);
            let b = b.unwrap_or(cfg.bm25.b);
            extract::run_extract(&cfg, k1, b, reporter.as_ref()).await?;
        }
        Commands::FixScores { k1, b, progress } => {
            let reporter = progress_mode(&progress)?.reporter();
            let k1 = k1.unwrap_or(cfg.bm25.k1);
            let b = b.unwrap_or(cfg.bm25.b);
            scorer::run_fix_scores(&cfg, k1, b, reporter.as_ref()).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::SearchKind { kind, limit } => {
            search::run_kind_search(&cfg, &kind, limit).await?;
        }
        Commands::TopKeywords { kind, limit } => {
            search::run_top_keywords(&cfg, kind, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
