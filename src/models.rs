//! Core data models used throughout the tracker index.
//!
//! These types represent the issues, keyword rows, and frequency counters
//! that flow through the extraction, scoring, and search pipeline.

use anyhow::{bail, Result};

/// An issue as read from the base record store. All text fields may be
/// absent; the extraction pass tokenizes whichever are present.
#[derive(Debug, Clone)]
pub struct Issue {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub resolution_description: Option<String>,
}

/// Classification of a normalized keyword.
///
/// The discriminants are the values stored in the `kind` columns of
/// `issue_keywords` and `corpus_keywords`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeywordKind {
    /// An ordinary word (possibly lemma-mapped).
    Word = 0,
    /// A stop word. Counted in totals but never indexed.
    StopWord = 1,
    /// A FHIR element path such as `Patient.name`.
    ElementPath = 2,
    /// A FHIR operation name such as `$everything`.
    OperationName = 3,
}

impl KeywordKind {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Result<Self> {
        Ok(match value {
            0 => KeywordKind::Word,
            1 => KeywordKind::StopWord,
            2 => KeywordKind::ElementPath,
            3 => KeywordKind::OperationName,
            other => bail!("unknown keyword kind: {}", other),
        })
    }

    /// Parse a CLI kind name (`word`, `stop`, `element`, `operation`).
    pub fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "word" => KeywordKind::Word,
            "stop" => KeywordKind::StopWord,
            "element" => KeywordKind::ElementPath,
            "operation" => KeywordKind::OperationName,
            other => bail!(
                "Unknown keyword kind: '{}'. Use word, stop, element, or operation.",
                other
            ),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            KeywordKind::Word => "word",
            KeywordKind::StopWord => "stop",
            KeywordKind::ElementPath => "element",
            KeywordKind::OperationName => "operation",
        }
    }
}

impl std::fmt::Display for KeywordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-document (or, for the sentinel row, corpus-wide) token counters
/// broken down by how each token was resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TotalCounters {
    pub total_words: i64,
    pub stop_words: i64,
    pub lemma_words: i64,
    pub element_paths: i64,
    pub operation_names: i64,
}

impl TotalCounters {
    pub fn add(&mut self, other: &TotalCounters) {
        self.total_words += other.total_words;
        self.stop_words += other.stop_words;
        self.lemma_words += other.lemma_words;
        self.element_paths += other.element_paths;
        self.operation_names += other.operation_names;
    }
}

/// A ranked search result joined with issue detail for display.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub issue_id: i64,
    pub score: f64,
    pub title: Option<String>,
    pub summary: Option<String>,
}
