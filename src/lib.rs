// Route Verifier - Core Library
// Extraction and checklist logic shared by the CLI and the TUI

pub mod config;
pub mod db;
pub mod export;
pub mod extractor;
pub mod logging;
pub mod registry;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    StoredState, Event, STATE_SLOT, MAX_EVENTS,
    open_database, open_or_recover, setup_database, save_state, load_state,
    insert_event, prune_events, get_recent_events,
};
pub use extractor::{extract, Extractor, ExtractorError, Rule, DEFAULT_MARKER};
pub use registry::{is_valid_code, normalize_code, Counts, Entry, Registry, Status};
pub use session::{Notice, Session, Theme};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
