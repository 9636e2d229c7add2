//! Extraction and scoring progress reporting.
//!
//! Reports observable progress during `fti extract` and `fti fix-scores`
//! so users see how far a long rebuild has gotten. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts. Reporting is a side
//! channel only; a no-op reporter never changes results.

use std::io::Write;

/// A single progress event for the index pipeline.
#[derive(Clone, Debug)]
pub enum IndexProgressEvent {
    /// Extraction: n issues tokenized out of total.
    Extracting { n: u64, total: u64 },
    /// IDF pass: n corpus keywords scored out of total.
    ScoringIdf { n: u64, total: u64 },
    /// BM25 pass: n issues scored out of total.
    ScoringBm25 { n: u64, total: u64 },
}

/// Reports pipeline progress. Implementations write to stderr (human or JSON).
pub trait IndexProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the extraction and scoring passes.
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress on stderr: "extract  tokenizing  1,234 / 5,000 issues".
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = match &event {
            IndexProgressEvent::Extracting { n, total } => format!(
                "extract  tokenizing  {} / {} issues\n",
                format_number(*n),
                format_number(*total)
            ),
            IndexProgressEvent::ScoringIdf { n, total } => format!(
                "score  idf  {} / {} keywords\n",
                format_number(*n),
                format_number(*total)
            ),
            IndexProgressEvent::ScoringBm25 { n, total } => format!(
                "score  bm25  {} / {} issues\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = match &event {
            IndexProgressEvent::Extracting { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "extracting",
                "n": n,
                "total": total
            }),
            IndexProgressEvent::ScoringIdf { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "scoring-idf",
                "n": n,
                "total": total
            }),
            IndexProgressEvent::ScoringBm25 { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "scoring-bm25",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => anyhow::bail!("Unknown progress mode: '{}'. Use off, human, or json.", other),
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn IndexProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
