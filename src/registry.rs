// ✅ Registry - Checklist of codes and their verification status
// Merge, cycle, filter, count, report

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// STATUS
// ============================================================================

/// Verification state of a code.
///
/// Cycles `Unmarked → Confirmed → Missing → Extra → Unmarked`; there is no
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unmarked,
    Confirmed,
    Missing,
    Extra,
}

impl Status {
    /// Cycle order
    pub const ALL: [Status; 4] = [
        Status::Unmarked,
        Status::Confirmed,
        Status::Missing,
        Status::Extra,
    ];

    pub fn next(&self) -> Self {
        match self {
            Status::Unmarked => Status::Confirmed,
            Status::Confirmed => Status::Missing,
            Status::Missing => Status::Extra,
            Status::Extra => Status::Unmarked,
        }
    }

    /// Human-readable label for display
    pub fn label(&self) -> &'static str {
        match self {
            Status::Unmarked => "Unmarked",
            Status::Confirmed => "Confirmed",
            Status::Missing => "Missing",
            Status::Extra => "Extra",
        }
    }

    /// Storage key
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unmarked => "unmarked",
            Status::Confirmed => "confirmed",
            Status::Missing => "missing",
            Status::Extra => "extra",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Status::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Exactly 4 ASCII digits
    pub code: String,

    #[serde(default)]
    pub status: Status,
}

impl Entry {
    pub fn new(code: impl Into<String>) -> Self {
        Entry {
            code: code.into(),
            status: Status::Unmarked,
        }
    }

    fn numeric(&self) -> u16 {
        // Codes are validated on the way in, 0000..=9999 always parses
        self.code.parse().unwrap_or(0)
    }
}

/// Trim and keep at most the first 4 characters
pub fn normalize_code(raw: &str) -> String {
    raw.trim().chars().take(4).collect()
}

pub fn is_valid_code(code: &str) -> bool {
    code.len() == 4 && code.bytes().all(|b| b.is_ascii_digit())
}

// ============================================================================
// COUNTS
// ============================================================================

/// Partition of all entries by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub confirmed: usize,
    pub missing: usize,
    pub extra: usize,
    pub unmarked: usize,
}

impl Counts {
    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Unmarked => self.unmarked,
            Status::Confirmed => self.confirmed,
            Status::Missing => self.missing,
            Status::Extra => self.extra,
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Owns every entry. Codes are unique and kept in ascending numeric order
/// after each mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Rebuild from stored entries, dropping malformed and repeated codes
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut seen = HashSet::new();
        let mut entries: Vec<Entry> = entries
            .into_iter()
            .filter(|entry| is_valid_code(&entry.code))
            .filter(|entry| seen.insert(entry.code.clone()))
            .collect();
        entries.sort_by_key(Entry::numeric);

        Registry { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.code == code)
    }

    /// Add unseen codes as `Unmarked`. Candidates are trimmed and cut to 4
    /// characters; anything that is not 4 digits is skipped.
    ///
    /// Returns how many entries were inserted.
    pub fn merge<I, S>(&mut self, codes: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut existing: HashSet<String> =
            self.entries.iter().map(|entry| entry.code.clone()).collect();
        let mut added = 0;

        for candidate in codes {
            let code = normalize_code(candidate.as_ref());
            if !is_valid_code(&code) {
                continue;
            }
            if existing.insert(code.clone()) {
                self.entries.push(Entry::new(code));
                added += 1;
            }
        }

        self.entries.sort_by_key(Entry::numeric);
        added
    }

    /// Advance one step in the cycle. Unknown codes are ignored.
    pub fn cycle_status(&mut self, code: &str) -> Option<Status> {
        let entry = self.entries.iter_mut().find(|entry| entry.code == code)?;
        entry.status = entry.status.next();
        Some(entry.status)
    }

    pub fn set_all_unmarked(&mut self) {
        for entry in &mut self.entries {
            entry.status = Status::Unmarked;
        }
    }

    /// Drop every unmarked entry, returning how many went
    pub fn remove_unmarked(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.status != Status::Unmarked);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts {
            total: self.entries.len(),
            ..Counts::default()
        };

        for entry in &self.entries {
            match entry.status {
                Status::Unmarked => counts.unmarked += 1,
                Status::Confirmed => counts.confirmed += 1,
                Status::Missing => counts.missing += 1,
                Status::Extra => counts.extra += 1,
            }
        }

        counts
    }

    /// Entries whose code contains `query`; everything when the query is empty
    pub fn filtered_view(&self, query: &str) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|entry| query.is_empty() || entry.code.contains(query))
            .collect()
    }

    /// Codes grouped by status, each list in ascending order
    pub fn codes_with_status(&self, status: Status) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.code.as_str())
            .collect()
    }

    /// Plain-text report: counts, then one section per status
    pub fn summary_report<Tz>(&self, at: DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let counts = self.counts();
        let mut lines = vec![
            format!(
                "Flex Route Verification ({})",
                at.format("%Y-%m-%d %H:%M:%S")
            ),
            format!("Total: {}", counts.total),
            format!("Confirmed: {}", counts.confirmed),
            format!("Missing: {}", counts.missing),
            format!("Extra: {}", counts.extra),
            format!("Unmarked: {}", counts.unmarked),
            String::new(),
        ];

        for status in [
            Status::Confirmed,
            Status::Missing,
            Status::Extra,
            Status::Unmarked,
        ] {
            let codes = self.codes_with_status(status);
            lines.push(format!("{} ({})", status.label(), codes.len()));
            lines.push(codes.join(", "));
            lines.push(String::new());
        }

        lines.join("\n")
    }

    pub fn summary_report_now(&self) -> String {
        self.summary_report(Local::now())
    }
}
