//! Token sanitization and keyword classification.
//!
//! [`sanitize`] is a pure character-level scan: it lower-cases letters,
//! keeps digits, drops punctuation, and remembers two signals that matter
//! later — the first letter in its original case, and a symbol seen before
//! any letter. The case of the first letter disambiguates FHIR element
//! paths from ordinary English words (`Patient` vs `patient`); a leading
//! `$` marks an operation invocation (`$everything`).
//!
//! [`classify`] applies the caller-side minimum length and resolves the
//! sanitized keyword against the reference data, in precedence order:
//! stop word, element path, operation name, lemma-mapped word, plain word.

use crate::models::KeywordKind;
use crate::reference::ReferenceData;

/// Sanitized keywords shorter than this are discarded by all callers.
pub const MIN_KEYWORD_LEN: usize = 3;

/// Prefix symbol marking an operation invocation.
pub const OPERATION_MARKER: char = '$';

/// Result of sanitizing one whitespace-delimited input token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedToken {
    /// Lowercase letters and digits only. Empty when no letter was seen.
    pub keyword: String,
    /// The first letter encountered, in its original case. `None` means
    /// the input contained no letter at all and is not a keyword.
    pub first_letter: Option<char>,
    /// The first ASCII punctuation/symbol character seen before any letter.
    pub prefix_symbol: Option<char>,
}

/// Sanitize a single raw token into a normalized keyword.
///
/// Letters are lower-cased and appended, decimal digits are appended
/// unchanged, ASCII punctuation and symbols are dropped (remembering the
/// first one that precedes any letter), and everything else — marks,
/// separators, format and control characters — is ignored.
pub fn sanitize(raw: &str) -> SanitizedToken {
    let mut keyword = String::new();
    let mut first_letter: Option<char> = None;
    let mut prefix_symbol: Option<char> = None;

    for ch in raw.chars() {
        if ch.is_alphabetic() {
            if first_letter.is_none() {
                first_letter = Some(ch);
            }
            if ch.is_lowercase() {
                keyword.push(ch);
            } else {
                // Uppercase and titlecase letters may lowercase to more
                // than one char (e.g. İ).
                keyword.extend(ch.to_lowercase());
            }
        } else if ch.is_numeric() {
            keyword.push(ch);
        } else if ch.is_ascii_punctuation() {
            // Marker detection needs only ASCII symbols; marks,
            // separators, and format characters are ignored rather than
            // captured, so a zero-width character cannot occupy the
            // prefix slot ahead of a real marker.
            if first_letter.is_none() && prefix_symbol.is_none() {
                prefix_symbol = Some(ch);
            }
        }
    }

    // No letter means no keyword, whatever digits were collected.
    if first_letter.is_none() {
        keyword.clear();
    }

    SanitizedToken {
        keyword,
        first_letter,
        prefix_symbol,
    }
}

/// How a token was resolved into an indexable keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Matched the stop-word set. Counted in totals, never indexed.
    StopWord(String),
    /// Matched the FHIR element-path vocabulary.
    ElementPath(String),
    /// `$`-prefixed match against the operation-name vocabulary.
    OperationName(String),
    /// Mapped through the lemma lookup; carries the lemma, not the
    /// surface form.
    LemmaWord(String),
    /// An ordinary word, indexed under its sanitized surface form.
    Word(String),
}

impl Resolved {
    pub fn keyword(&self) -> &str {
        match self {
            Resolved::StopWord(k)
            | Resolved::ElementPath(k)
            | Resolved::OperationName(k)
            | Resolved::LemmaWord(k)
            | Resolved::Word(k) => k,
        }
    }

    pub fn kind(&self) -> KeywordKind {
        match self {
            Resolved::StopWord(_) => KeywordKind::StopWord,
            Resolved::ElementPath(_) => KeywordKind::ElementPath,
            Resolved::OperationName(_) => KeywordKind::OperationName,
            Resolved::LemmaWord(_) | Resolved::Word(_) => KeywordKind::Word,
        }
    }
}

/// Sanitize and classify one raw token. Returns `None` for tokens with no
/// letter or with a sanitized keyword shorter than [`MIN_KEYWORD_LEN`].
pub fn classify(raw: &str, refs: &ReferenceData) -> Option<Resolved> {
    let token = sanitize(raw);
    token.first_letter?;
    if token.keyword.chars().count() < MIN_KEYWORD_LEN {
        return None;
    }
    Some(resolve(&token, refs))
}

/// Resolve a sanitized token against the reference data.
///
/// Precedence, first match wins:
/// 1. stop word — checked before everything else, so a vocabulary entry
///    that collides with a stop word is dropped from the index;
/// 2. element path — unless the keyword is also a known lemma and the
///    original first letter was lowercase, in which case the author meant
///    the English word rather than the FHIR identifier;
/// 3. operation name, when the token carried the `$` marker;
/// 4. lemma-mapped word (the lemma replaces the surface form);
/// 5. plain word.
pub fn resolve(token: &SanitizedToken, refs: &ReferenceData) -> Resolved {
    let keyword = &token.keyword;

    if refs.is_stop_word(keyword) {
        return Resolved::StopWord(keyword.clone());
    }

    if refs.is_element_path(keyword) {
        let also_lemma = refs.lemma(keyword).is_some();
        let upper_first = token
            .first_letter
            .map(|c| c.is_uppercase())
            .unwrap_or(false);
        if !also_lemma || upper_first {
            return Resolved::ElementPath(keyword.clone());
        }
    }

    if token.prefix_symbol == Some(OPERATION_MARKER) && refs.is_operation_name(keyword) {
        return Resolved::OperationName(keyword.clone());
    }

    if let Some(lemma) = refs.lemma(keyword) {
        if !lemma.is_empty() {
            return Resolved::LemmaWord(lemma.to_string());
        }
    }

    Resolved::Word(keyword.clone())
}
