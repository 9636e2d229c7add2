//! Ranked keyword search over the precomputed BM25 scores.
//!
//! Queries are tokenized with the same sanitizer and classifier used
//! during extraction, so a query term goes through the identical stop-word
//! filter, lemma mapping, and minimum-length rule as the indexed text.
//! Documents are never re-tokenized here — search only reads scores back.
//!
//! An issue's aggregate score is the **sum** of its matched terms' BM25
//! scores: matching more query terms and matching one term strongly both
//! raise the aggregate. Degenerate queries (empty, all stop words, no
//! corpus match) produce empty result sets, never errors.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::db;
use crate::models::{KeywordKind, SearchHit};
use crate::reference::ReferenceData;
use crate::tokenizer::{classify, Resolved};

/// Tokenize a query into indexable terms, deduplicated in first-seen
/// order. Stop words and sub-minimum tokens drop out; lemma-mapped terms
/// are carried as their lemma.
pub fn parse_query(query: &str, refs: &ReferenceData) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();

    for raw in query.split_whitespace() {
        let resolved = match classify(raw, refs) {
            Some(r) => r,
            None => continue,
        };
        if matches!(resolved, Resolved::StopWord(_)) {
            continue;
        }
        let keyword = resolved.keyword().to_string();
        if seen.insert(keyword.clone()) {
            terms.push(keyword);
        }
    }

    terms
}

/// Ranked search: sum of matched-term BM25 scores per issue, descending,
/// truncated to `top_k`, joined with issue detail for display.
pub async fn ranked_search(pool: &SqlitePool, query: &str, top_k: i64) -> Result<Vec<SearchHit>> {
    let refs = ReferenceData::load(pool).await?;
    let terms = parse_query(query, &refs);
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    // The lookup is keyword-string based and intentionally spans kinds:
    // a query word can match rows indexed as element paths.
    let mut scores: HashMap<i64, f64> = HashMap::new();
    for term in &terms {
        let rows = sqlx::query(
            "SELECT issue_id, bm25 FROM issue_keywords
             WHERE keyword = ? AND bm25 IS NOT NULL AND bm25 > 0",
        )
        .bind(term)
        .fetch_all(pool)
        .await?;

        for row in &rows {
            let issue_id: i64 = row.get("issue_id");
            let score: f64 = row.get("bm25");
            *scores.entry(issue_id).or_insert(0.0) += score;
        }
    }

    rank_and_join(pool, scores, top_k).await
}

/// Kind-scoped search: sum of BM25 scores per issue restricted to one
/// keyword kind, descending, truncated to `top_k`.
pub async fn kind_search(
    pool: &SqlitePool,
    kind: KeywordKind,
    top_k: i64,
) -> Result<Vec<SearchHit>> {
    let rows = sqlx::query(
        "SELECT issue_id, SUM(bm25) AS score FROM issue_keywords
         WHERE kind = ? AND bm25 IS NOT NULL AND bm25 > 0
         GROUP BY issue_id",
    )
    .bind(kind.as_i64())
    .fetch_all(pool)
    .await?;

    let scores: HashMap<i64, f64> = rows
        .iter()
        .map(|row| (row.get::<i64, _>("issue_id"), row.get::<f64, _>("score")))
        .collect();

    rank_and_join(pool, scores, top_k).await
}

/// Filter to positive aggregates, sort descending, truncate, and join
/// issue title/summary for presentation.
async fn rank_and_join(
    pool: &SqlitePool,
    scores: HashMap<i64, f64>,
    top_k: i64,
) -> Result<Vec<SearchHit>> {
    let mut ranked: Vec<(i64, f64)> = scores
        .into_iter()
        .filter(|(_, score)| *score > 0.0)
        .collect();

    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(top_k.max(0) as usize);

    let mut hits = Vec::with_capacity(ranked.len());
    for (issue_id, score) in ranked {
        let row = sqlx::query("SELECT title, summary FROM issues WHERE id = ?")
            .bind(issue_id)
            .fetch_optional(pool)
            .await?;

        let (title, summary) = match row {
            Some(row) => (row.get("title"), row.get("summary")),
            None => (None, None),
        };

        hits.push(SearchHit {
            issue_id,
            score,
            title,
            summary,
        });
    }

    Ok(hits)
}

/// A corpus keyword surfaced by the top-keywords listing.
#[derive(Debug, Clone)]
pub struct TopKeyword {
    pub keyword: String,
    pub kind: KeywordKind,
    pub count: i64,
    pub idf: f64,
}

/// List the most distinctive corpus vocabulary: keywords with non-null
/// IDF, ordered by IDF descending then raw count descending.
pub async fn top_keywords(
    pool: &SqlitePool,
    kind: Option<KeywordKind>,
    top_k: i64,
) -> Result<Vec<TopKeyword>> {
    let rows = match kind {
        Some(kind) => {
            sqlx::query(
                "SELECT keyword, kind, count, idf FROM corpus_keywords
                 WHERE idf IS NOT NULL AND kind = ?
                 ORDER BY idf DESC, count DESC LIMIT ?",
            )
            .bind(kind.as_i64())
            .bind(top_k)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT keyword, kind, count, idf FROM corpus_keywords
                 WHERE idf IS NOT NULL
                 ORDER BY idf DESC, count DESC LIMIT ?",
            )
            .bind(top_k)
            .fetch_all(pool)
            .await?
        }
    };

    let mut keywords = Vec::with_capacity(rows.len());
    for row in &rows {
        keywords.push(TopKeyword {
            keyword: row.get("keyword"),
            kind: KeywordKind::from_i64(row.get("kind"))?,
            count: row.get("count"),
            idf: row.get("idf"),
        });
    }

    Ok(keywords)
}

/// CLI entry point — ranked search, printed to stdout.
pub async fn run_search(config: &Config, query: &str, limit: Option<i64>) -> Result<()> {
    let pool = db::connect(config).await?;
    let top_k = limit.unwrap_or(config.retrieval.final_limit);

    let hits = ranked_search(&pool, query, top_k).await?;
    print_hits(&hits);

    pool.close().await;
    Ok(())
}

/// CLI entry point — kind-scoped search, printed to stdout.
pub async fn run_kind_search(config: &Config, kind: &str, limit: Option<i64>) -> Result<()> {
    let kind = KeywordKind::parse(kind)?;
    let pool = db::connect(config).await?;
    let top_k = limit.unwrap_or(config.retrieval.final_limit);

    let hits = kind_search(&pool, kind, top_k).await?;
    print_hits(&hits);

    pool.close().await;
    Ok(())
}

/// CLI entry point — top keywords by IDF, printed to stdout.
pub async fn run_top_keywords(
    config: &Config,
    kind: Option<String>,
    limit: Option<i64>,
) -> Result<()> {
    let kind = kind.as_deref().map(KeywordKind::parse).transpose()?;
    let pool = db::connect(config).await?;
    let top_k = limit.unwrap_or(config.retrieval.final_limit);

    let keywords = top_keywords(&pool, kind, top_k).await?;
    if keywords.is_empty() {
        println!("No keywords.");
    } else {
        println!("{:<32} {:<10} {:>8} {:>10}", "KEYWORD", "KIND", "COUNT", "IDF");
        for kw in &keywords {
            println!(
                "{:<32} {:<10} {:>8} {:>10.4}",
                kw.keyword,
                kw.kind.name(),
                kw.count,
                kw.idf
            );
        }
    }

    pool.close().await;
    Ok(())
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        let title = hit.title.as_deref().unwrap_or("(untitled)");
        println!("{}. [{:.4}] #{} {}", i + 1, hit.score, hit.issue_id, title);
        if let Some(ref summary) = hit.summary {
            println!("    summary: \"{}\"", summary.replace('\n', " ").trim());
        }
        println!();
    }
}
