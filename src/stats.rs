//! Database statistics and health overview.
//!
//! Provides a quick summary of what's indexed: issue and comment counts,
//! keyword row counts, score coverage, and the persisted BM25 parameters.
//! Used by `fti stats` to give confidence that extraction and scoring are
//! working as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let issues: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues")
        .fetch_one(&pool)
        .await?;
    let comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
        .fetch_one(&pool)
        .await?;
    let issue_keywords: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issue_keywords")
        .fetch_one(&pool)
        .await?;
    let scored: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM issue_keywords WHERE bm25 IS NOT NULL")
            .fetch_one(&pool)
            .await?;
    let corpus_keywords: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM corpus_keywords")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("FHIR Tracker Index — Database Stats");
    println!("===================================");
    println!();
    println!("  Database:        {}", config.db.path.display());
    println!("  Size:            {}", format_bytes(db_size));
    println!();
    println!("  Issues:          {}", issues);
    println!("  Comments:        {}", comments);
    println!("  Issue keywords:  {}", issue_keywords);
    println!(
        "  Scored:          {} / {} ({}%)",
        scored,
        issue_keywords,
        if issue_keywords > 0 {
            (scored * 100) / issue_keywords
        } else {
            0
        }
    );
    println!("  Corpus keywords: {}", corpus_keywords);

    // Per-kind breakdown of the index.
    let kind_rows = sqlx::query(
        r#"
        SELECT kind, COUNT(*) AS rows_, SUM(count) AS occurrences
        FROM corpus_keywords
        GROUP BY kind
        ORDER BY kind
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !kind_rows.is_empty() {
        println!();
        println!("  By kind:");
        println!("  {:<12} {:>10} {:>14}", "KIND", "KEYWORDS", "OCCURRENCES");
        for row in &kind_rows {
            let kind: i64 = row.get("kind");
            let name = crate::models::KeywordKind::from_i64(kind)
                .map(|k| k.name())
                .unwrap_or("?");
            println!(
                "  {:<12} {:>10} {:>14}",
                name,
                row.get::<i64, _>("rows_"),
                row.get::<i64, _>("occurrences")
            );
        }
    }

    let stats_row = sqlx::query(
        "SELECT avg_doc_length, doc_count, updated_at FROM document_stats WHERE id = 1",
    )
    .fetch_optional(&pool)
    .await?;

    let config_row = sqlx::query("SELECT k1, b, updated_at FROM bm25_config WHERE id = 1")
        .fetch_optional(&pool)
        .await?;

    println!();
    match stats_row {
        Some(row) => {
            println!(
                "  Avg doc length:  {:.2} over {} documents (as of {})",
                row.get::<f64, _>("avg_doc_length"),
                row.get::<i64, _>("doc_count"),
                format_ts_iso(row.get("updated_at"))
            );
        }
        None => println!("  Document stats:  not computed (run extraction)"),
    }
    match config_row {
        Some(row) => {
            println!(
                "  BM25 parameters: k1={} b={} (as of {})",
                row.get::<f64, _>("k1"),
                row.get::<f64, _>("b"),
                format_ts_iso(row.get("updated_at"))
            );
        }
        None => println!("  BM25 parameters: not recorded (run extraction)"),
    }
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
