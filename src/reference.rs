//! Immutable reference data backing keyword classification.
//!
//! Four lookup structures are loaded once per run and never mutated
//! afterwards: the stop-word set, the inflection→lemma mapping, and the
//! two FHIR vocabularies (element paths and operation names). Vocabulary
//! entries are normalized with the same sanitizer the tokenizer applies
//! to issue text, so every lookup happens in normalized space — the raw
//! path `Patient.name` and the token `Patient.name` both reduce to
//! `patientname` before comparison.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

use crate::tokenizer::sanitize;

#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    stop_words: HashSet<String>,
    lemmas: HashMap<String, String>,
    element_paths: HashSet<String>,
    operation_names: HashSet<String>,
}

impl ReferenceData {
    /// Load all four reference tables from the database.
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let stop_words: Vec<String> = sqlx::query_scalar("SELECT word FROM stop_words")
            .fetch_all(pool)
            .await?;

        let lemma_rows: Vec<(String, String)> =
            sqlx::query_as("SELECT inflection, lemma FROM lemmas")
                .fetch_all(pool)
                .await?;

        let element_paths: Vec<String> = sqlx::query_scalar("SELECT path FROM element_paths")
            .fetch_all(pool)
            .await?;

        let operation_names: Vec<String> = sqlx::query_scalar("SELECT code FROM operation_names")
            .fetch_all(pool)
            .await?;

        Ok(Self::from_parts(
            stop_words,
            lemma_rows,
            element_paths,
            operation_names,
        ))
    }

    /// Build reference data from raw entry lists, normalizing each entry.
    /// Entries whose sanitized form is empty are dropped.
    pub fn from_parts(
        stop_words: impl IntoIterator<Item = String>,
        lemmas: impl IntoIterator<Item = (String, String)>,
        element_paths: impl IntoIterator<Item = String>,
        operation_names: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut data = ReferenceData::default();

        for word in stop_words {
            if let Some(normalized) = normalize_entry(&word) {
                data.stop_words.insert(normalized);
            }
        }

        for (inflection, lemma) in lemmas {
            if let Some(normalized) = normalize_entry(&inflection) {
                data.lemmas.insert(normalized, lemma.trim().to_string());
            }
        }

        for path in element_paths {
            if let Some(normalized) = normalize_entry(&path) {
                data.element_paths.insert(normalized);
            }
        }

        for code in operation_names {
            if let Some(normalized) = normalize_entry(&code) {
                data.operation_names.insert(normalized);
            }
        }

        data
    }

    pub fn is_stop_word(&self, keyword: &str) -> bool {
        self.stop_words.contains(keyword)
    }

    /// Look up the lemma mapped to a sanitized inflection, if any.
    pub fn lemma(&self, keyword: &str) -> Option<&str> {
        self.lemmas.get(keyword).map(String::as_str)
    }

    pub fn is_element_path(&self, keyword: &str) -> bool {
        self.element_paths.contains(keyword)
    }

    pub fn is_operation_name(&self, keyword: &str) -> bool {
        self.operation_names.contains(keyword)
    }

    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.stop_words.len(),
            self.lemmas.len(),
            self.element_paths.len(),
            self.operation_names.len(),
        )
    }
}

fn normalize_entry(raw: &str) -> Option<String> {
    let token = sanitize(raw);
    if token.keyword.is_empty() {
        None
    } else {
        Some(token.keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_normalized() {
        let refs = ReferenceData::from_parts(
            vec!["The".to_string()],
            vec![("Running".to_string(), "run".to_string())],
            vec!["Patient.name".to_string()],
            vec!["$everything".to_string()],
        );

        assert!(refs.is_stop_word("the"));
        assert_eq!(refs.lemma("running"), Some("run"));
        assert!(refs.is_element_path("patientname"));
        assert!(refs.is_operation_name("everything"));
    }

    #[test]
    fn empty_entries_dropped() {
        let refs = ReferenceData::from_parts(
            vec!["---".to_string()],
            vec![],
            vec![],
            vec![],
        );
        let (stops, _, _, _) = refs.counts();
        assert_eq!(stops, 0);
    }
}
