//! IDF and BM25 scoring over the persisted frequency tables.
//!
//! Two operating modes share the same math:
//!
//! - [`recompute_all`] — full mode, run at the end of an extraction pass.
//!   Every corpus keyword gets a fresh IDF, every issue keyword a fresh
//!   BM25 score, and the `bm25_config` / `document_stats` singletons are
//!   dropped and re-inserted.
//! - [`fix_scores`] — incremental mode, for re-scoring after a k1/b
//!   change without re-tokenizing any text. Requires a prior extraction;
//!   bails otherwise. Writes are batched: IDF in fixed-size batches, BM25
//!   through a bounded buffer, each flush applied as one multi-row `CASE`
//!   update inside one transaction. The keyword table can be orders of
//!   magnitude larger than the issue table, so collapsing per-row updates
//!   into per-batch statements dominates the runtime of this pass.
//!
//! The numeric helpers never raise for degenerate inputs — zero document
//! counts, zero term frequency, and zero average length all short-circuit
//! to `0.0`.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::config::Config;
use crate::db;
use crate::progress::{IndexProgressEvent, IndexProgressReporter};

/// Inverse document frequency: `ln((N − n + 0.5) / (n + 0.5))`.
///
/// `doc_count` is the number of documents in the corpus, `containing` the
/// number of documents the term appears in. Returns `0.0` when either is
/// non-positive.
pub fn idf(doc_count: i64, containing: i64) -> f64 {
    if doc_count <= 0 || containing <= 0 {
        return 0.0;
    }
    let n = doc_count as f64;
    let df = containing as f64;
    ((n - df + 0.5) / (df + 0.5)).ln()
}

/// BM25 score for one (document, term) pair.
///
/// `tf` is the raw term count in the document, `dl` the document's total
/// word length, `avgdl` the corpus average document length. Returns `0.0`
/// when `tf` or `avgdl` is non-positive.
pub fn bm25(tf: i64, idf: f64, dl: i64, avgdl: f64, k1: f64, b: f64) -> f64 {
    if tf <= 0 || avgdl <= 0.0 {
        return 0.0;
    }
    let tf = tf as f64;
    let dl = dl as f64;
    idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl))
}

/// Mean of per-issue `total_words`, `0.0` for an empty corpus.
pub async fn average_document_length(pool: &SqlitePool) -> Result<f64> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS n, COALESCE(SUM(total_words), 0) AS total
         FROM total_frequencies WHERE issue_id IS NOT NULL",
    )
    .fetch_one(pool)
    .await?;

    let n: i64 = row.get("n");
    let total: i64 = row.get("total");
    if n <= 0 {
        return Ok(0.0);
    }
    Ok(total as f64 / n as f64)
}

/// Per-term document counts: how many distinct issues contain each
/// (keyword, kind). One grouped query instead of one count per keyword.
async fn containing_counts(pool: &SqlitePool) -> Result<HashMap<(String, i64), i64>> {
    let rows = sqlx::query(
        "SELECT keyword, kind, COUNT(DISTINCT issue_id) AS containing
         FROM issue_keywords GROUP BY keyword, kind",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            (
                (row.get::<String, _>("keyword"), row.get::<i64, _>("kind")),
                row.get::<i64, _>("containing"),
            )
        })
        .collect())
}

/// Per-issue document lengths from the total-frequency table.
async fn document_lengths(pool: &SqlitePool) -> Result<HashMap<i64, i64>> {
    let rows = sqlx::query(
        "SELECT issue_id, total_words FROM total_frequencies WHERE issue_id IS NOT NULL",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get::<i64, _>("issue_id"), row.get::<i64, _>("total_words")))
        .collect())
}

/// Full recompute: fresh IDF for every corpus keyword, fresh BM25 for
/// every issue keyword, singletons dropped and re-inserted.
pub async fn recompute_all(
    pool: &SqlitePool,
    k1: f64,
    b: f64,
    reporter: &dyn IndexProgressReporter,
) -> Result<()> {
    let doc_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM total_frequencies WHERE issue_id IS NOT NULL",
    )
    .fetch_one(pool)
    .await?;
    let avgdl = average_document_length(pool).await?;
    let containing = containing_counts(pool).await?;

    // IDF for every corpus keyword.
    let corpus: Vec<(String, i64)> = sqlx::query_as("SELECT keyword, kind FROM corpus_keywords")
        .fetch_all(pool)
        .await?;
    let total_keywords = corpus.len() as u64;

    let mut idf_by_term: HashMap<(String, i64), f64> = HashMap::with_capacity(corpus.len());
    let mut tx = pool.begin().await?;
    for (n, (keyword, kind)) in corpus.into_iter().enumerate() {
        let df = containing
            .get(&(keyword.clone(), kind))
            .copied()
            .unwrap_or(0);
        let value = idf(doc_count, df);

        sqlx::query("UPDATE corpus_keywords SET idf = ? WHERE keyword = ? AND kind = ?")
            .bind(value)
            .bind(&keyword)
            .bind(kind)
            .execute(&mut *tx)
            .await?;
        idf_by_term.insert((keyword, kind), value);

        if (n + 1) % 1000 == 0 || (n + 1) as u64 == total_keywords {
            reporter.report(IndexProgressEvent::ScoringIdf {
                n: (n + 1) as u64,
                total: total_keywords,
            });
        }
    }
    tx.commit().await?;

    // BM25 for every issue keyword.
    let lengths = document_lengths(pool).await?;
    let issue_ids: Vec<i64> =
        sqlx::query_scalar("SELECT DISTINCT issue_id FROM issue_keywords ORDER BY issue_id")
            .fetch_all(pool)
            .await?;
    let total_issues = issue_ids.len() as u64;

    let mut tx = pool.begin().await?;
    for (n, issue_id) in issue_ids.into_iter().enumerate() {
        let dl = lengths.get(&issue_id).copied().unwrap_or(0);
        let rows = sqlx::query(
            "SELECT keyword, kind, count FROM issue_keywords WHERE issue_id = ?",
        )
        .bind(issue_id)
        .fetch_all(&mut *tx)
        .await?;

        for row in &rows {
            let keyword: String = row.get("keyword");
            let kind: i64 = row.get("kind");
            let count: i64 = row.get("count");
            let term_idf = idf_by_term
                .get(&(keyword.clone(), kind))
                .copied()
                .unwrap_or(0.0);
            let score = bm25(count, term_idf, dl, avgdl, k1, b);

            sqlx::query(
                "UPDATE issue_keywords SET bm25 = ? WHERE issue_id = ? AND keyword = ? AND kind = ?",
            )
            .bind(score)
            .bind(issue_id)
            .bind(&keyword)
            .bind(kind)
            .execute(&mut *tx)
            .await?;
        }

        if (n + 1) % 100 == 0 || (n + 1) as u64 == total_issues {
            reporter.report(IndexProgressEvent::ScoringBm25 {
                n: (n + 1) as u64,
                total: total_issues,
            });
        }
    }
    tx.commit().await?;

    // Full mode drops and re-inserts the singletons.
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM bm25_config").execute(&mut *tx).await?;
    sqlx::query("INSERT INTO bm25_config (id, k1, b, updated_at) VALUES (1, ?, ?, ?)")
        .bind(k1)
        .bind(b)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM document_stats").execute(&mut *tx).await?;
    sqlx::query(
        "INSERT INTO document_stats (id, avg_doc_length, doc_count, updated_at) VALUES (1, ?, ?, ?)",
    )
    .bind(avgdl)
    .bind(doc_count)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(())
}

/// One buffered BM25 update waiting for a flush.
struct ScoreUpdate {
    issue_id: i64,
    keyword: String,
    kind: i64,
    score: f64,
}

/// Incremental re-score from the existing frequency tables, for new k1/b
/// parameters. CLI entry point for `fti fix-scores`.
pub async fn run_fix_scores(
    config: &Config,
    k1: f64,
    b: f64,
    reporter: &dyn IndexProgressReporter,
) -> Result<()> {
    let started = std::time::Instant::now();
    let pool = db::connect(config).await?;

    let (keywords, issues) = fix_scores(
        &pool,
        k1,
        b,
        config.scoring.idf_batch_size,
        config.scoring.bm25_flush_size,
        reporter,
    )
    .await?;

    println!("fix-scores");
    println!("  k1: {}", k1);
    println!("  b: {}", b);
    println!("  corpus keywords rescored: {}", keywords);
    println!("  issues rescored: {}", issues);
    println!("  elapsed: {:.1}s", started.elapsed().as_secs_f64());
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Incremental IDF + BM25 recompute. Returns (corpus keywords rescored,
/// issues rescored).
///
/// Fails fast when the keyword tables are empty — that means extraction
/// has never run and there is nothing to rescore.
pub async fn fix_scores(
    pool: &SqlitePool,
    k1: f64,
    b: f64,
    idf_batch_size: usize,
    bm25_flush_size: usize,
    reporter: &dyn IndexProgressReporter,
) -> Result<(u64, u64)> {
    let corpus_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM corpus_keywords")
        .fetch_one(pool)
        .await?;
    let issue_kw_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issue_keywords")
        .fetch_one(pool)
        .await?;
    if corpus_count == 0 || issue_kw_count == 0 {
        bail!("keyword tables are empty — run extraction first");
    }

    let doc_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM total_frequencies WHERE issue_id IS NOT NULL",
    )
    .fetch_one(pool)
    .await?;
    if doc_count == 0 {
        bail!("total-frequency table is empty — run extraction first");
    }

    let avgdl = average_document_length(pool).await?;
    let containing = containing_counts(pool).await?;

    // IDF in fixed-size batches, one transaction per batch. A failure
    // mid-batch rolls back only the in-flight batch.
    let corpus: Vec<(String, i64)> =
        sqlx::query_as("SELECT keyword, kind FROM corpus_keywords ORDER BY keyword, kind")
            .fetch_all(pool)
            .await?;
    let total_keywords = corpus.len() as u64;

    let mut idf_by_term: HashMap<(String, i64), f64> = HashMap::with_capacity(corpus.len());
    let mut done = 0u64;
    for batch in corpus.chunks(idf_batch_size) {
        let updates: Vec<(String, i64, f64)> = batch
            .iter()
            .map(|(keyword, kind)| {
                let df = containing
                    .get(&(keyword.clone(), *kind))
                    .copied()
                    .unwrap_or(0);
                (keyword.clone(), *kind, idf(doc_count, df))
            })
            .collect();

        apply_idf_batch(pool, &updates).await?;

        for (keyword, kind, value) in updates {
            idf_by_term.insert((keyword, kind), value);
        }

        done += batch.len() as u64;
        reporter.report(IndexProgressEvent::ScoringIdf {
            n: done,
            total: total_keywords,
        });
    }

    // BM25 per issue, buffered and flushed as bulk updates. The buffer is
    // a cooperative checkpoint boundary: committed flushes stay committed.
    let lengths = document_lengths(pool).await?;
    let issue_ids: Vec<i64> =
        sqlx::query_scalar("SELECT DISTINCT issue_id FROM issue_keywords ORDER BY issue_id")
            .fetch_all(pool)
            .await?;
    let total_issues = issue_ids.len() as u64;

    let mut buffer: Vec<ScoreUpdate> = Vec::with_capacity(bm25_flush_size);
    for (n, issue_id) in issue_ids.iter().enumerate() {
        let dl = lengths.get(issue_id).copied().unwrap_or(0);
        let rows = sqlx::query(
            "SELECT keyword, kind, count FROM issue_keywords WHERE issue_id = ?",
        )
        .bind(issue_id)
        .fetch_all(pool)
        .await?;

        for row in &rows {
            let keyword: String = row.get("keyword");
            let kind: i64 = row.get("kind");
            let count: i64 = row.get("count");
            let term_idf = idf_by_term
                .get(&(keyword.clone(), kind))
                .copied()
                .unwrap_or(0.0);

            buffer.push(ScoreUpdate {
                issue_id: *issue_id,
                keyword,
                kind,
                score: bm25(count, term_idf, dl, avgdl, k1, b),
            });

            if buffer.len() >= bm25_flush_size {
                apply_bm25_batch(pool, &buffer).await?;
                buffer.clear();
            }
        }

        if (n + 1) % 100 == 0 || (n + 1) as u64 == total_issues {
            reporter.report(IndexProgressEvent::ScoringBm25 {
                n: (n + 1) as u64,
                total: total_issues,
            });
        }
    }
    if !buffer.is_empty() {
        apply_bm25_batch(pool, &buffer).await?;
        buffer.clear();
    }

    // Incremental mode updates the singletons in place.
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO document_stats (id, avg_doc_length, doc_count, updated_at) VALUES (1, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            avg_doc_length = excluded.avg_doc_length,
            doc_count = excluded.doc_count,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(avgdl)
    .bind(doc_count)
    .bind(now)
    .execute(pool)
    .await?;
    sqlx::query(
        r#"
        INSERT INTO bm25_config (id, k1, b, updated_at) VALUES (1, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            k1 = excluded.k1,
            b = excluded.b,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(k1)
    .bind(b)
    .bind(now)
    .execute(pool)
    .await?;

    Ok((total_keywords, total_issues))
}

/// Apply one batch of IDF values as a single multi-row `CASE` update
/// inside one transaction.
async fn apply_idf_batch(pool: &SqlitePool, updates: &[(String, i64, f64)]) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }

    let mut sql = String::from("UPDATE corpus_keywords SET idf = CASE");
    for _ in updates {
        sql.push_str(" WHEN keyword = ? AND kind = ? THEN ?");
    }
    sql.push_str(" ELSE idf END WHERE (keyword, kind) IN (VALUES ");
    sql.push_str(
        &updates
            .iter()
            .map(|_| "(?, ?)")
            .collect::<Vec<_>>()
            .join(", "),
    );
    sql.push(')');

    let mut query = sqlx::query(&sql);
    for (keyword, kind, value) in updates {
        query = query.bind(keyword).bind(kind).bind(value);
    }
    for (keyword, kind, _) in updates {
        query = query.bind(keyword).bind(kind);
    }

    let mut tx = pool.begin().await?;
    query.execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(())
}

/// Apply one flush of buffered BM25 scores as a single multi-row `CASE`
/// update inside one transaction.
async fn apply_bm25_batch(pool: &SqlitePool, updates: &[ScoreUpdate]) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }

    let mut sql = String::from("UPDATE issue_keywords SET bm25 = CASE");
    for _ in updates {
        sql.push_str(" WHEN issue_id = ? AND keyword = ? AND kind = ? THEN ?");
    }
    sql.push_str(" ELSE bm25 END WHERE (issue_id, keyword, kind) IN (VALUES ");
    sql.push_str(
        &updates
            .iter()
            .map(|_| "(?, ?, ?)")
            .collect::<Vec<_>>()
            .join(", "),
    );
    sql.push(')');

    let mut query = sqlx::query(&sql);
    for u in updates {
        query = query
            .bind(u.issue_id)
            .bind(&u.keyword)
            .bind(u.kind)
            .bind(u.score);
    }
    for u in updates {
        query = query.bind(u.issue_id).bind(&u.keyword).bind(u.kind);
    }

    let mut tx = pool.begin().await?;
    query.execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idf_zero_for_degenerate_inputs() {
        assert_eq!(idf(0, 5), 0.0);
        assert_eq!(idf(10, 0), 0.0);
        assert_eq!(idf(-1, -1), 0.0);
    }

    #[test]
    fn idf_monotonically_decreasing_in_df() {
        let n = 1000;
        let mut prev = f64::INFINITY;
        for df in 1..=n {
            let value = idf(n, df);
            assert!(value < prev, "idf not decreasing at df={}", df);
            prev = value;
        }
    }

    #[test]
    fn idf_rare_term_positive_common_term_negative() {
        assert!(idf(1000, 1) > 0.0);
        assert!(idf(10, 9) < 0.0);
    }

    #[test]
    fn bm25_zero_for_degenerate_inputs() {
        assert_eq!(bm25(0, 2.0, 100, 50.0, 1.2, 0.75), 0.0);
        assert_eq!(bm25(5, 2.0, 100, 0.0, 1.2, 0.75), 0.0);
    }

    #[test]
    fn bm25_monotonically_increasing_in_tf() {
        let mut prev = 0.0;
        for tf in 1..100 {
            let score = bm25(tf, 2.0, 120, 100.0, 1.2, 0.75);
            assert!(score > prev, "bm25 not increasing at tf={}", tf);
            prev = score;
        }
    }

    #[test]
    fn bm25_saturates() {
        // Term frequency saturation: doubling tf from 50 to 100 moves the
        // score far less than doubling it from 1 to 2.
        let low = bm25(2, 2.0, 100, 100.0, 1.2, 0.75) - bm25(1, 2.0, 100, 100.0, 1.2, 0.75);
        let high = bm25(100, 2.0, 100, 100.0, 1.2, 0.75) - bm25(50, 2.0, 100, 100.0, 1.2, 0.75);
        assert!(low > high);
    }

    #[test]
    fn bm25_length_normalization() {
        // With b > 0, a longer document scores lower for the same tf.
        let short = bm25(3, 2.0, 50, 100.0, 1.2, 0.75);
        let long = bm25(3, 2.0, 200, 100.0, 1.2, 0.75);
        assert!(short > long);

        // With b = 0, length does not matter.
        let a = bm25(3, 2.0, 50, 100.0, 1.2, 0.0);
        let b_ = bm25(3, 2.0, 200, 100.0, 1.2, 0.0);
        assert!((a - b_).abs() < 1e-12);
    }

    #[test]
    fn bm25_formula_spot_check() {
        // idf=1, tf=2, k1=1.2, b=0.75, dl=avgdl → denominator = tf + k1.
        let score = bm25(2, 1.0, 100, 100.0, 1.2, 0.75);
        let expected = (2.0 * 2.2) / (2.0 + 1.2);
        assert!((score - expected).abs() < 1e-12);
    }
}
