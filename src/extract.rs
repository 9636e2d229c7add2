//! Full extraction pass: frequency aggregation over every issue.
//!
//! Coordinates the rebuild flow: load reference data → tokenize every
//! issue field and comment → accumulate per-issue and corpus-wide counts
//! → persist the keyword and frequency tables → run a full IDF/BM25
//! recompute. A full pass clears the owned tables first; it is not
//! incremental. One malformed issue is warned and skipped so a single bad
//! record cannot abort a long rebuild.

use anyhow::Result;
use regex::Regex;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::config::Config;
use crate::db;
use crate::models::{Issue, KeywordKind, TotalCounters};
use crate::progress::{IndexProgressEvent, IndexProgressReporter};
use crate::reference::ReferenceData;
use crate::scorer;
use crate::tokenizer::{classify, Resolved};

/// Keyword and total-frequency counts accumulated for one issue.
#[derive(Debug, Clone, Default)]
pub struct IssueCounts {
    pub keywords: HashMap<(String, KeywordKind), i64>,
    pub totals: TotalCounters,
}

/// Tokenizes one free-text field at a time into an [`IssueCounts`].
///
/// Fields are ingested independently so neighboring fields never fuse
/// into a single token across their boundary.
pub struct FieldTokenizer {
    tag_re: Regex,
}

impl FieldTokenizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tag_re: Regex::new(r"<[^>]+>")?,
        })
    }

    /// Strip HTML tags, split on whitespace, classify each token, and
    /// update the running counts.
    ///
    /// Every token that survives sanitization and the minimum-length
    /// filter increments `total_words` regardless of class. Stop words
    /// increment only their sub-counter and stay out of the keyword map;
    /// every other class increments both its sub-counter (where one
    /// exists) and its keyword-count entry.
    pub fn ingest(&self, counts: &mut IssueCounts, text: &str, refs: &ReferenceData) {
        let stripped = self.tag_re.replace_all(text, " ");

        for raw in stripped.split_whitespace() {
            let resolved = match classify(raw, refs) {
                Some(r) => r,
                None => continue,
            };

            counts.totals.total_words += 1;

            match &resolved {
                Resolved::StopWord(_) => {
                    counts.totals.stop_words += 1;
                    continue;
                }
                Resolved::ElementPath(_) => counts.totals.element_paths += 1,
                Resolved::OperationName(_) => counts.totals.operation_names += 1,
                Resolved::LemmaWord(_) => counts.totals.lemma_words += 1,
                Resolved::Word(_) => {}
            }

            let key = (resolved.keyword().to_string(), resolved.kind());
            *counts.keywords.entry(key).or_insert(0) += 1;
        }
    }
}

/// Run the full extraction pass: tokenize all issues, rewrite the keyword
/// and frequency tables, then recompute IDF and BM25 once.
pub async fn run_extract(
    config: &Config,
    k1: f64,
    b: f64,
    reporter: &dyn IndexProgressReporter,
) -> Result<()> {
    let started = std::time::Instant::now();
    let pool = db::connect(config).await?;

    let refs = ReferenceData::load(&pool).await?;
    let (stop_count, lemma_count, path_count, op_count) = refs.counts();
    if stop_count == 0 && lemma_count == 0 && path_count == 0 && op_count == 0 {
        eprintln!("warning: no reference data loaded; every token will classify as a plain word");
    }

    let issues = fetch_issues(&pool).await?;
    let total = issues.len() as u64;
    let tokenizer = FieldTokenizer::new()?;

    let mut per_issue: Vec<(i64, IssueCounts)> = Vec::with_capacity(issues.len());
    let mut corpus_keywords: HashMap<(String, KeywordKind), i64> = HashMap::new();
    let mut corpus_totals = TotalCounters::default();
    let mut skipped = 0u64;

    for (n, issue) in issues.iter().enumerate() {
        match process_issue(&pool, &tokenizer, issue, &refs).await {
            Ok(counts) => {
                for (key, count) in &counts.keywords {
                    *corpus_keywords.entry(key.clone()).or_insert(0) += count;
                }
                corpus_totals.add(&counts.totals);
                per_issue.push((issue.id, counts));
            }
            Err(e) => {
                eprintln!("warning: skipping issue {}: {}", issue.id, e);
                skipped += 1;
            }
        }

        if (n + 1) % 100 == 0 || n + 1 == issues.len() {
            reporter.report(IndexProgressEvent::Extracting {
                n: (n + 1) as u64,
                total,
            });
        }
    }

    let keyword_rows = persist_counts(&pool, &per_issue, &corpus_keywords, &corpus_totals).await?;

    scorer::recompute_all(&pool, k1, b, reporter).await?;

    println!("extract");
    println!("  issues processed: {}", per_issue.len());
    if skipped > 0 {
        println!("  issues skipped: {}", skipped);
    }
    println!("  issue keyword rows: {}", keyword_rows);
    println!("  corpus keywords: {}", corpus_keywords.len());
    println!("  elapsed: {:.1}s", started.elapsed().as_secs_f64());
    println!("ok");

    pool.close().await;
    Ok(())
}

async fn fetch_issues(pool: &SqlitePool) -> Result<Vec<Issue>> {
    let rows = sqlx::query(
        "SELECT id, title, description, summary, resolution_description FROM issues ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Issue {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            summary: row.get("summary"),
            resolution_description: row.get("resolution_description"),
        })
        .collect())
}

/// Tokenize one issue: each text field, then every comment body, each
/// independently stripped and tokenized.
async fn process_issue(
    pool: &SqlitePool,
    tokenizer: &FieldTokenizer,
    issue: &Issue,
    refs: &ReferenceData,
) -> Result<IssueCounts> {
    let mut counts = IssueCounts::default();

    for field in [
        &issue.title,
        &issue.description,
        &issue.summary,
        &issue.resolution_description,
    ]
    .into_iter()
    .flatten()
    {
        tokenizer.ingest(&mut counts, field, refs);
    }

    let comment_bodies: Vec<String> =
        sqlx::query_scalar("SELECT body FROM comments WHERE issue_id = ? ORDER BY id")
            .bind(issue.id)
            .fetch_all(pool)
            .await?;

    for body in &comment_bodies {
        tokenizer.ingest(&mut counts, body, refs);
    }

    Ok(counts)
}

/// Rewrite the five owned tables from the accumulated counts. Returns the
/// number of issue keyword rows written.
async fn persist_counts(
    pool: &SqlitePool,
    per_issue: &[(i64, IssueCounts)],
    corpus_keywords: &HashMap<(String, KeywordKind), i64>,
    corpus_totals: &TotalCounters,
) -> Result<u64> {
    let mut tx = pool.begin().await?;

    // Full rebuild: clear everything the pipeline owns.
    sqlx::query("DELETE FROM issue_keywords").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM corpus_keywords").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM total_frequencies").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM bm25_config").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM document_stats").execute(&mut *tx).await?;

    let mut keyword_rows = 0u64;

    for (issue_id, counts) in per_issue {
        for ((keyword, kind), count) in &counts.keywords {
            sqlx::query(
                "INSERT INTO issue_keywords (issue_id, keyword, kind, count, bm25) VALUES (?, ?, ?, ?, NULL)",
            )
            .bind(issue_id)
            .bind(keyword)
            .bind(kind.as_i64())
            .bind(count)
            .execute(&mut *tx)
            .await?;
            keyword_rows += 1;
        }

        insert_totals(&mut tx, Some(*issue_id), &counts.totals).await?;
    }

    for ((keyword, kind), count) in corpus_keywords {
        sqlx::query(
            "INSERT INTO corpus_keywords (keyword, kind, count, idf) VALUES (?, ?, ?, NULL)",
        )
        .bind(keyword)
        .bind(kind.as_i64())
        .bind(count)
        .execute(&mut *tx)
        .await?;
    }

    // The corpus sentinel row: issue_id IS NULL, counters are the sums of
    // all per-issue rows.
    insert_totals(&mut tx, None, corpus_totals).await?;

    tx.commit().await?;
    Ok(keyword_rows)
}

async fn insert_totals(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    issue_id: Option<i64>,
    totals: &TotalCounters,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO total_frequencies
            (issue_id, total_words, stop_words, lemma_words, element_paths, operation_names)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(issue_id)
    .bind(totals.total_words)
    .bind(totals.stop_words)
    .bind(totals.lemma_words)
    .bind(totals.element_paths)
    .bind(totals.operation_names)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs() -> ReferenceData {
        ReferenceData::from_parts(
            vec!["the".to_string(), "and".to_string()],
            vec![("patients".to_string(), "patient".to_string())],
            vec!["Patient.name".to_string()],
            vec!["everything".to_string()],
        )
    }

    #[test]
    fn ingest_counts_by_class() {
        let tokenizer = FieldTokenizer::new().unwrap();
        let refs = refs();
        let mut counts = IssueCounts::default();

        tokenizer.ingest(
            &mut counts,
            "The Patient.name element and $everything for patients",
            &refs,
        );

        // "element" and "for" are plain words here.
        assert_eq!(counts.totals.total_words, 7);
        assert_eq!(counts.totals.stop_words, 2);
        assert_eq!(counts.totals.element_paths, 1);
        assert_eq!(counts.totals.operation_names, 1);
        assert_eq!(counts.totals.lemma_words, 1);

        assert_eq!(
            counts.keywords[&("patientname".to_string(), KeywordKind::ElementPath)],
            1
        );
        assert_eq!(
            counts.keywords[&("everything".to_string(), KeywordKind::OperationName)],
            1
        );
        assert_eq!(
            counts.keywords[&("patient".to_string(), KeywordKind::Word)],
            1
        );
        // Stop words never enter the keyword map.
        assert!(!counts
            .keywords
            .keys()
            .any(|(_, kind)| *kind == KeywordKind::StopWord));
    }

    #[test]
    fn ingest_strips_html_tags() {
        let tokenizer = FieldTokenizer::new().unwrap();
        let refs = refs();
        let mut counts = IssueCounts::default();

        tokenizer.ingest(&mut counts, "<p>resource <b>validation</b></p>", &refs);

        assert!(counts
            .keywords
            .contains_key(&("resource".to_string(), KeywordKind::Word)));
        assert!(counts
            .keywords
            .contains_key(&("validation".to_string(), KeywordKind::Word)));
        assert_eq!(counts.totals.total_words, 2);
    }

    #[test]
    fn ingest_short_tokens_dropped() {
        let tokenizer = FieldTokenizer::new().unwrap();
        let refs = refs();
        let mut counts = IssueCounts::default();

        tokenizer.ingest(&mut counts, "an ab id validation", &refs);

        // Only "validation" survives the 3-char minimum.
        assert_eq!(counts.totals.total_words, 1);
    }

    #[test]
    fn ingest_repeated_tokens_increment() {
        let tokenizer = FieldTokenizer::new().unwrap();
        let refs = refs();
        let mut counts = IssueCounts::default();

        tokenizer.ingest(&mut counts, "resource resource resource", &refs);

        assert_eq!(
            counts.keywords[&("resource".to_string(), KeywordKind::Word)],
            3
        );
    }

    #[test]
    fn ingest_is_deterministic() {
        let tokenizer = FieldTokenizer::new().unwrap();
        let refs = refs();
        let text = "The Patient.name of patients and $everything validation";

        let mut a = IssueCounts::default();
        let mut b = IssueCounts::default();
        tokenizer.ingest(&mut a, text, &refs);
        tokenizer.ingest(&mut b, text, &refs);

        assert_eq!(a.keywords, b.keywords);
        assert_eq!(a.totals, b.totals);
    }
}
