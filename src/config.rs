use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub bm25: Bm25Config,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// BM25 ranking parameters. The defaults are the conventional literature
/// values; `fti extract --k1/--b` and `fti fix-scores --k1/--b` override
/// them per run.
#[derive(Debug, Deserialize, Clone)]
pub struct Bm25Config {
    #[serde(default = "default_k1")]
    pub k1: f64,
    #[serde(default = "default_b")]
    pub b: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
        }
    }
}

fn default_k1() -> f64 {
    1.2
}
fn default_b() -> f64 {
    0.75
}

/// Batch sizing for the incremental scoring pass.
#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    /// Corpus keywords per IDF batch (one transaction per batch).
    #[serde(default = "default_idf_batch_size")]
    pub idf_batch_size: usize,
    /// Buffered BM25 updates per flush (one bulk statement per flush).
    #[serde(default = "default_bm25_flush_size")]
    pub bm25_flush_size: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            idf_batch_size: default_idf_batch_size(),
            bm25_flush_size: default_bm25_flush_size(),
        }
    }
}

fn default_idf_batch_size() -> usize {
    2000
}
fn default_bm25_flush_size() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_final_limit")]
    pub final_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
        }
    }
}

fn default_final_limit() -> i64 {
    12
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.bm25.k1 <= 0.0 {
        anyhow::bail!("bm25.k1 must be > 0");
    }

    if !(0.0..=1.0).contains(&config.bm25.b) {
        anyhow::bail!("bm25.b must be in [0.0, 1.0]");
    }

    if config.scoring.idf_batch_size == 0 {
        anyhow::bail!("scoring.idf_batch_size must be > 0");
    }

    if config.scoring.bm25_flush_size == 0 {
        anyhow::bail!("scoring.bm25_flush_size must be > 0");
    }

    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied() {
        let config: Config = toml::from_str("[db]\npath = \"data/fti.sqlite\"\n").unwrap();
        assert!((config.bm25.k1 - 1.2).abs() < 1e-9);
        assert!((config.bm25.b - 0.75).abs() < 1e-9);
        assert_eq!(config.scoring.idf_batch_size, 2000);
        assert_eq!(config.scoring.bm25_flush_size, 500);
        assert_eq!(config.retrieval.final_limit, 12);
    }

    #[test]
    fn rejects_bad_b() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fti.toml");
        std::fs::write(&path, "[db]\npath = \"x\"\n[bm25]\nb = 1.5\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
