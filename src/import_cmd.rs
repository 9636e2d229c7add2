//! JSON import of issues and reference data.
//!
//! The tracker export and the reference vocabularies arrive as JSON files;
//! `fti import issues` loads the base record store and `fti import
//! reference` loads the stop-word list, lemma table, and FHIR
//! vocabularies. Both are upserts: re-importing the same file is safe.

use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::Config;
use crate::db;

/// One issue in a tracker export file.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRecord {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub resolution_description: Option<String>,
    #[serde(default)]
    pub comments: Vec<String>,
}

/// Reference data file: stop words, inflection→lemma pairs, and the two
/// FHIR vocabularies.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceFile {
    #[serde(default)]
    pub stop_words: Vec<String>,
    #[serde(default)]
    pub lemmas: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub element_paths: Vec<String>,
    #[serde(default)]
    pub operation_names: Vec<String>,
}

/// Load an issues export into the base record store.
pub async fn run_import_issues(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read issues file: {}", path.display()))?;
    let records: Vec<IssueRecord> =
        serde_json::from_str(&content).with_context(|| "Failed to parse issues file")?;

    let pool = db::connect(config).await?;
    let (issues, comments) = import_issues(&pool, &records).await?;

    println!("import issues");
    println!("  issues upserted: {}", issues);
    println!("  comments written: {}", comments);
    println!("ok");

    pool.close().await;
    Ok(())
}

pub async fn import_issues(pool: &SqlitePool, records: &[IssueRecord]) -> Result<(u64, u64)> {
    let mut tx = pool.begin().await?;
    let mut comments = 0u64;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO issues (id, title, description, summary, resolution_description)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                summary = excluded.summary,
                resolution_description = excluded.resolution_description
            "#,
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.summary)
        .bind(&record.resolution_description)
        .execute(&mut *tx)
        .await?;

        // Comments are replaced wholesale per issue.
        sqlx::query("DELETE FROM comments WHERE issue_id = ?")
            .bind(record.id)
            .execute(&mut *tx)
            .await?;

        for body in &record.comments {
            sqlx::query("INSERT INTO comments (issue_id, body) VALUES (?, ?)")
                .bind(record.id)
                .bind(body)
                .execute(&mut *tx)
                .await?;
            comments += 1;
        }
    }

    tx.commit().await?;
    Ok((records.len() as u64, comments))
}

/// Load a reference data file into the reference stores, replacing any
/// previous snapshot.
pub async fn run_import_reference(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference file: {}", path.display()))?;
    let file: ReferenceFile =
        serde_json::from_str(&content).with_context(|| "Failed to parse reference file")?;

    let pool = db::connect(config).await?;
    import_reference(&pool, &file).await?;

    println!("import reference");
    println!("  stop words: {}", file.stop_words.len());
    println!("  lemmas: {}", file.lemmas.len());
    println!("  element paths: {}", file.element_paths.len());
    println!("  operation names: {}", file.operation_names.len());
    println!("ok");

    pool.close().await;
    Ok(())
}

pub async fn import_reference(pool: &SqlitePool, file: &ReferenceFile) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM stop_words").execute(&mut *tx).await?;
    for word in &file.stop_words {
        sqlx::query("INSERT OR IGNORE INTO stop_words (word) VALUES (?)")
            .bind(word)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM lemmas").execute(&mut *tx).await?;
    for (inflection, lemma) in &file.lemmas {
        sqlx::query("INSERT OR IGNORE INTO lemmas (inflection, lemma) VALUES (?, ?)")
            .bind(inflection)
            .bind(lemma)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM element_paths").execute(&mut *tx).await?;
    for path in &file.element_paths {
        sqlx::query("INSERT OR IGNORE INTO element_paths (path) VALUES (?)")
            .bind(path)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM operation_names").execute(&mut *tx).await?;
    for code in &file.operation_names {
        sqlx::query("INSERT OR IGNORE INTO operation_names (code) VALUES (?)")
            .bind(code)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}
