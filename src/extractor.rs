// 🔎 Extractor - Pull 4-digit suffix codes out of pasted text
// Three layered rules: marker + digits, long digit runs, marked-line 4-digit tokens

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

/// Marker used when no other marker is configured
pub const DEFAULT_MARKER: &str = "TBA";

static DEFAULT_EXTRACTOR: LazyLock<Option<Extractor>> =
    LazyLock::new(|| Extractor::new(DEFAULT_MARKER).ok());

// ============================================================================
// RULES
// ============================================================================

/// Which heuristic produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    /// Marker, optional whitespace, 6+ digits → last 4
    Labeled,

    /// Any run of 10+ digits → last 4
    LongRun,

    /// Standalone 4-digit token on a line that mentions the marker
    MarkedLine,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Labeled => "labeled",
            Rule::LongRun => "long-run",
            Rule::MarkedLine => "marked-line",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("marker must not be empty")]
    EmptyMarker,

    #[error("invalid marker pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// ============================================================================
// EXTRACTOR
// ============================================================================

/// Compiled extraction patterns for one marker.
///
/// Output keeps every hit, including the same run reported by both the
/// labeled and long-run rules. Deduplication belongs to `Registry::merge`.
#[derive(Debug, Clone)]
pub struct Extractor {
    marker: String,
    labeled: Regex,
    long_run: Regex,
    marker_in_line: Regex,
    four_digits: Regex,
}

impl Extractor {
    pub fn new(marker: &str) -> Result<Self, ExtractorError> {
        let marker = marker.trim();
        if marker.is_empty() {
            return Err(ExtractorError::EmptyMarker);
        }

        let escaped = regex::escape(marker);

        Ok(Extractor {
            marker: marker.to_string(),
            labeled: Regex::new(&format!(r"(?i){escaped}\s*([0-9]{{6,}})"))?,
            long_run: Regex::new(r"[0-9]{10,}")?,
            marker_in_line: Regex::new(&format!("(?i){escaped}"))?,
            // ASCII word boundaries: letters, digits and '_' glue a token together
            four_digits: Regex::new(r"(?-u:\b)([0-9]{4})(?-u:\b)")?,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Candidate codes in discovery order (rule 1, then 2, then 3)
    pub fn extract(&self, text: &str) -> Vec<String> {
        self.extract_tagged(text)
            .into_iter()
            .map(|(_, code)| code)
            .collect()
    }

    /// Same as `extract`, keeping the rule that produced each candidate
    pub fn extract_tagged(&self, text: &str) -> Vec<(Rule, String)> {
        let mut found = Vec::new();

        // 1) Marker + digits (most reliable)
        for caps in self.labeled.captures_iter(text) {
            if let Some(digits) = caps.get(1) {
                found.push((Rule::Labeled, last_four(digits.as_str())));
            }
        }

        // 2) Long digit runs
        for m in self.long_run.find_iter(text) {
            found.push((Rule::LongRun, last_four(m.as_str())));
        }

        // 3) Bare 4-digit tokens, only on lines that mention the marker
        for line in text.lines() {
            if !self.marker_in_line.is_match(line) {
                continue;
            }
            for caps in self.four_digits.captures_iter(line) {
                if let Some(token) = caps.get(1) {
                    found.push((Rule::MarkedLine, token.as_str().to_string()));
                }
            }
        }

        found
    }
}

/// Extract with the default `TBA` marker
pub fn extract(text: &str) -> Vec<String> {
    DEFAULT_EXTRACTOR
        .as_ref()
        .map(|extractor| extractor.extract(text))
        .unwrap_or_default()
}

// Callers only pass ASCII digit runs of length >= 4
fn last_four(digits: &str) -> String {
    digits[digits.len() - 4..].to_string()
}
