//! # FHIR Tracker Index
//!
//! A domain-aware BM25 relevance index over FHIR issue-tracker content.
//!
//! The tracker index ingests issue text (titles, descriptions, summaries,
//! resolution descriptions, comments), classifies every token as an ordinary
//! word, stop word, FHIR element path, or FHIR operation name, aggregates
//! per-issue and corpus-wide frequencies into SQLite, scores each
//! (issue, keyword) pair with BM25, and serves ranked keyword search from
//! the precomputed scores.
//!
//! ## Pipeline
//!
//! ```text
//! ┌───────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐
//! │ Reference data │──▶│ Tokenizer/ │──▶│ Frequency  │──▶│ IDF/BM25 │
//! │ stop/lemma/FHIR│   │ classifier │   │ aggregator │   │  scorer  │
//! └───────────────┘   └────────────┘   └────────────┘   └────┬─────┘
//!                                                            │
//!                                                      ┌─────▼─────┐
//!                                                      │  SQLite   │
//!                                                      │  scores   │
//!                                                      └─────┬─────┘
//!                                                            │
//!                                                      ┌─────▼─────┐
//!                                                      │  search   │
//!                                                      └───────────┘
//! ```
//!
//! Documents are tokenized exactly once, during extraction; search only
//! tokenizes the query and reads scores back.
//!
//! ## Quick Start
//!
//! ```bash
//! fti init                          # create database
//! fti import reference fhir.json    # load stop words, lemmas, vocabularies
//! fti import issues tracker.json    # load issues and comments
//! fti extract                       # tokenize, count, score everything
//! fti search "patient identifier"   # ranked search
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and keyword kinds |
//! | [`reference`] | Immutable reference data (stop words, lemmas, vocabularies) |
//! | [`tokenizer`] | Token sanitization and classification |
//! | [`extract`] | Full extraction pass (frequency aggregation) |
//! | [`scorer`] | IDF/BM25 scoring, full and incremental |
//! | [`search`] | Ranked, kind-scoped, and top-keyword queries |
//! | [`import_cmd`] | JSON import of issues and reference data |
//! | [`stats`] | Database statistics overview |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`progress`] | Progress reporting for long-running passes |

pub mod config;
pub mod db;
pub mod extract;
pub mod import_cmd;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod reference;
pub mod scorer;
pub mod search;
pub mod stats;
pub mod tokenizer;
