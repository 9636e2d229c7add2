use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Base record store: issues and comments. Populated by `fti import`;
    // the indexing core only reads these.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issues (
            id INTEGER PRIMARY KEY,
            title TEXT,
            description TEXT,
            summary TEXT,
            resolution_description TEXT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            issue_id INTEGER NOT NULL,
            body TEXT NOT NULL,
            FOREIGN KEY (issue_id) REFERENCES issues(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Reference stores: read-only snapshots loaded once per run.
    sqlx::query("CREATE TABLE IF NOT EXISTS stop_words (word TEXT PRIMARY KEY)")
        .execute(&pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lemmas (
            inflection TEXT PRIMARY KEY,
            lemma TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE TABLE IF NOT EXISTS element_paths (path TEXT PRIMARY KEY)")
        .execute(&pool)
        .await?;

    sqlx::query("CREATE TABLE IF NOT EXISTS operation_names (code TEXT PRIMARY KEY)")
        .execute(&pool)
        .await?;

    // Index tables owned by the extraction and scoring passes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issue_keywords (
            issue_id INTEGER NOT NULL,
            keyword TEXT NOT NULL,
            kind INTEGER NOT NULL,
            count INTEGER NOT NULL,
            bm25 REAL,
            PRIMARY KEY (issue_id, keyword, kind)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS corpus_keywords (
            keyword TEXT NOT NULL,
            kind INTEGER NOT NULL,
            count INTEGER NOT NULL,
            idf REAL,
            PRIMARY KEY (keyword, kind)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // issue_id IS NULL marks the corpus sentinel row whose counters are
    // the sums of all per-issue rows.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS total_frequencies (
            issue_id INTEGER,
            total_words INTEGER NOT NULL,
            stop_words INTEGER NOT NULL,
            lemma_words INTEGER NOT NULL,
            element_paths INTEGER NOT NULL,
            operation_names INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Singleton rows recording which parameters produced the current scores.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bm25_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            k1 REAL NOT NULL,
            b REAL NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_stats (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            avg_doc_length REAL NOT NULL,
            doc_count INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Indexes for the search-side access paths.
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_issue_id ON comments(issue_id)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_issue_keywords_keyword ON issue_keywords(keyword)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_issue_keywords_kind ON issue_keywords(kind)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_total_frequencies_issue ON total_frequencies(issue_id)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
