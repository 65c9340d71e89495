use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::registry::{is_valid_code, Entry, Registry, Status};
use crate::session::Theme;

/// Slot holding the checklist and display preference
pub const STATE_SLOT: &str = "flex_route_verifier_v1";

/// Audit rows kept; older ones are pruned on insert
pub const MAX_EVENTS: usize = 1000;

/// Everything that survives a restart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    pub theme: Theme,
    pub items: Vec<Entry>,
}

impl StoredState {
    pub fn new(registry: &Registry, theme: Theme) -> Self {
        StoredState {
            theme,
            items: registry.entries().to_vec(),
        }
    }

    pub fn into_registry(self) -> Registry {
        Registry::from_entries(self.items)
    }

    /// Lenient decode. Malformed items are dropped, unknown statuses become
    /// `Unmarked`, anything unreadable yields the empty default.
    pub fn from_json(raw: &str) -> Self {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
            return StoredState::default();
        };

        let mut state = StoredState::default();

        if let Some(items) = value.get("items").and_then(|items| items.as_array()) {
            state.items = items
                .iter()
                .filter_map(|item| {
                    let code = item.get("code")?.as_str()?;
                    if !is_valid_code(code) {
                        return None;
                    }
                    let status = item
                        .get("status")
                        .and_then(|s| s.as_str())
                        .and_then(Status::parse)
                        .unwrap_or_default();
                    Some(Entry {
                        code: code.to_string(),
                        status,
                    })
                })
                .collect();
        }

        if let Some(theme) = value
            .get("theme")
            .and_then(|t| t.as_str())
            .and_then(Theme::parse)
        {
            state.theme = theme;
        }

        state
    }
}

/// Audit trail record for a session action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: &str, data: serde_json::Value) -> Self {
        Event {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            data,
        }
    }
}

pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Open the store, never failing on a damaged file.
///
/// An unreadable database is moved aside as `<name>.corrupt-<timestamp>` and
/// a fresh one is created in its place. If that also fails the session runs
/// on an in-memory database. The returned message describes any recovery.
pub fn open_or_recover(path: &Path) -> Result<(Connection, Option<String>)> {
    let err = match open_database(path) {
        Ok(conn) => return Ok((conn, None)),
        Err(e) => e,
    };
    tracing::warn!("Database {} is unreadable: {:#}", path.display(), err);

    match quarantine(path).and_then(|moved| Ok((open_database(path)?, moved))) {
        Ok((conn, moved)) => {
            tracing::info!("Started a fresh database, old file at {}", moved.display());
            let message = format!(
                "Saved data was unreadable and has been moved to {}; starting empty",
                moved.display()
            );
            Ok((conn, Some(message)))
        }
        Err(e) => {
            tracing::warn!("Could not recreate {}, using memory only: {:#}", path.display(), e);
            let conn = Connection::open_in_memory()?;
            setup_database(&conn)?;
            let message = "Saved data is unavailable; changes will not be kept".to_string();
            Ok((conn, Some(message)))
        }
    }
}

fn quarantine(path: &Path) -> Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "route-verifier.db".to_string());
    let moved = path.with_file_name(format!("{file_name}.corrupt-{stamp}"));

    fs::rename(path, &moved)
        .with_context(|| format!("Failed to move {} aside", path.display()))?;

    // Journal files belong to the damaged database
    for suffix in ["-wal", "-shm"] {
        let sidecar = path.with_file_name(format!("{file_name}{suffix}"));
        if sidecar.exists() {
            let target = path.with_file_name(format!("{file_name}.corrupt-{stamp}{suffix}"));
            let _ = fs::rename(&sidecar, target);
        }
    }

    Ok(moved)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Slots Table (named durable values, JSON encoded)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS slots (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

pub fn write_slot(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, Utc::now().to_rfc3339()],
    )
    .with_context(|| format!("Failed to write slot {key}"))?;

    Ok(())
}

pub fn read_slot(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM slots WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to read slot {key}"))?;

    Ok(value)
}

pub fn save_state(conn: &Connection, state: &StoredState) -> Result<()> {
    let json = serde_json::to_string(state)?;
    write_slot(conn, STATE_SLOT, &json)
}

/// Never fails: a missing, unreadable or corrupt slot means "start empty"
pub fn load_state(conn: &Connection) -> StoredState {
    match read_slot(conn, STATE_SLOT) {
        Ok(Some(raw)) => StoredState::from_json(&raw),
        Ok(None) => StoredState::default(),
        Err(e) => {
            tracing::warn!("Could not read saved state, starting empty: {:#}", e);
            StoredState::default()
        }
    }
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, data) VALUES (?1, ?2, ?3, ?4)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            data_json,
        ],
    )?;

    prune_events(conn, MAX_EVENTS)?;

    Ok(())
}

/// Keep only the newest `keep` events
pub fn prune_events(conn: &Connection, keep: usize) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM events WHERE id NOT IN (
            SELECT id FROM events ORDER BY id DESC LIMIT ?1
        )",
        params![keep as i64],
    )?;

    Ok(removed)
}

/// Most recent events first
pub fn get_recent_events(conn: &Connection, limit: usize) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, data
         FROM events
         ORDER BY id DESC
         LIMIT ?1",
    )?;

    let events = stmt
        .query_map(params![limit as i64], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(3)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
