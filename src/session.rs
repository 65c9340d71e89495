// 🎛️ Session - Registry + display preference + persistence
// Every user action goes through here: mutate, save, record, report back

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use crate::db::{self, Event, StoredState};
use crate::extractor::Extractor;
use crate::registry::{Counts, Entry, Registry, Status};

// ============================================================================
// THEME
// ============================================================================

/// Display preference. Cycles `Auto → Dark → Light → Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Dark,
    Light,
}

impl Theme {
    pub fn next(&self) -> Self {
        match self {
            Theme::Auto => Theme::Dark,
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Auto,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Auto => "auto",
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Theme::Auto),
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }
}

// ============================================================================
// NOTICE
// ============================================================================

/// Short message shown to the user after an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice(pub String);

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Notice(message.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session {
    registry: Registry,
    theme: Theme,
    extractor: Extractor,
    conn: Connection,
}

impl Session {
    /// Load saved state from `conn`, starting empty if there is none
    pub fn open(conn: Connection, extractor: Extractor) -> Self {
        let state = db::load_state(&conn);
        let theme = state.theme;
        let registry = state.into_registry();

        tracing::info!(
            entries = registry.len(),
            theme = theme.as_str(),
            marker = extractor.marker(),
            "Session opened"
        );

        Session {
            registry,
            theme,
            extractor,
            conn,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn counts(&self) -> Counts {
        self.registry.counts()
    }

    pub fn view(&self, query: &str) -> Vec<&Entry> {
        self.registry.filtered_view(query)
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn extract_and_merge(&mut self, text: &str) -> Notice {
        let codes = self.extractor.extract(text);
        let added = self.registry.merge(&codes);

        tracing::debug!(candidates = codes.len(), added, "Extracted codes");

        // Nothing changed, nothing to save or record
        if added == 0 {
            return Notice::new("No new codes");
        }

        self.commit("merge", json!({ "candidates": codes.len(), "added": added }));
        Notice::new(format!("Added {added}"))
    }

    pub fn cycle(&mut self, code: &str) -> Notice {
        match self.registry.cycle_status(code) {
            Some(status) => {
                self.commit("cycle", json!({ "code": code, "status": status.as_str() }));
                Notice::new(format!("{code}: {}", status.label()))
            }
            None => Notice::new(format!("Unknown code {code}")),
        }
    }

    pub fn unmark_all(&mut self) -> Notice {
        self.registry.set_all_unmarked();
        self.commit("unmark_all", json!({ "entries": self.registry.len() }));
        Notice::new("Unmarked")
    }

    pub fn remove_unmarked(&mut self) -> Notice {
        let removed = self.registry.remove_unmarked();
        self.commit("remove_unmarked", json!({ "removed": removed }));

        if removed > 0 {
            Notice::new(format!("Removed {removed}"))
        } else {
            Notice::new("Nothing to remove")
        }
    }

    pub fn reset(&mut self) -> Notice {
        let cleared = self.registry.len();
        self.registry.clear();
        self.commit("reset", json!({ "cleared": cleared }));
        Notice::new("Reset")
    }

    pub fn cycle_theme(&mut self) -> Notice {
        self.theme = self.theme.next();
        self.commit("theme", json!({ "theme": self.theme.as_str() }));
        Notice::new(format!("Theme: {}", self.theme.as_str()))
    }

    pub fn report(&self) -> String {
        self.registry.summary_report_now()
    }

    pub fn status_of(&self, code: &str) -> Option<Status> {
        self.registry.get(code).map(|entry| entry.status)
    }

    // Persistence problems never undo the in-memory change
    fn commit(&mut self, event_type: &str, data: serde_json::Value) {
        let state = StoredState::new(&self.registry, self.theme);
        if let Err(e) = db::save_state(&self.conn, &state) {
            tracing::warn!("Failed to save state after {}: {:#}", event_type, e);
        }

        if let Err(e) = db::insert_event(&self.conn, &Event::new(event_type, data)) {
            tracing::warn!("Failed to record {} event: {:#}", event_type, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_session() -> Session {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        Session::open(conn, Extractor::new("TBA").unwrap())
    }

    #[test]
    fn test_theme_cycle() {
        assert_eq!(Theme::Auto.next(), Theme::Dark);
        assert_eq!(Theme::Dark.next(), Theme::Light);
        assert_eq!(Theme::Light.next(), Theme::Auto);
        assert_eq!(Theme::parse("dark"), Some(Theme::Dark));
        assert_eq!(Theme::parse("sepia"), None);
    }

    #[test]
    fn test_merge_notices() {
        let mut session = memory_session();
        assert_eq!(session.extract_and_merge("TBA 123456").as_str(), "Added 1");
        assert_eq!(session.extract_and_merge("TBA 123456").as_str(), "No new codes");
    }

    #[test]
    fn test_noop_merge_is_not_recorded() {
        let mut session = memory_session();
        session.extract_and_merge("TBA 123456");
        session.extract_and_merge("TBA 123456");
        session.extract_and_merge("no codes here");

        let events = db::get_recent_events(session.connection(), 10).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_cycle_notices() {
        let mut session = memory_session();
        session.extract_and_merge("TBA 000001111");

        assert_eq!(session.cycle("1111").as_str(), "1111: Confirmed");
        assert_eq!(session.cycle("9999").as_str(), "Unknown code 9999");
    }

    #[test]
    fn test_remove_notices() {
        let mut session = memory_session();
        assert_eq!(session.remove_unmarked().as_str(), "Nothing to remove");

        session.extract_and_merge("TBA 1111 2222");
        assert_eq!(session.remove_unmarked().as_str(), "Removed 2");
    }

    #[test]
    fn test_actions_are_persisted() {
        let mut session = memory_session();
        session.extract_and_merge("TBA 4444");
        session.cycle("4444");
        session.cycle_theme();

        let state = db::load_state(session.connection());
        assert_eq!(state.theme, Theme::Dark);
        assert_eq!(state.items[0].status, Status::Confirmed);

        let events = db::get_recent_events(session.connection(), 10).unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["theme", "cycle", "merge"]);
    }
}
