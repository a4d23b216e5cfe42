//! Reader preferences storage
//!
//! Preferences live behind a small get/set port so the reader never touches
//! a storage mechanism directly. The SQLite adapter keeps them in the
//! `settings` table.

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::db::now_timestamp;
use crate::error::{PersistenceError, ToDbError};
use crate::types::HighlightColor;

// ============================================================================
// Constants - Setting Keys
// ============================================================================

pub const KEY_VIEW_MODE: &str = "reader_view_mode";
pub const KEY_NARRATION_VOICE: &str = "reader_narration_voice";
pub const KEY_HIGHLIGHT_COLOR: &str = "reader_highlight_color";

// ============================================================================
// Port
// ============================================================================

/// Persistent key-value preferences
pub trait Preferences {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// Preferences kept only for the life of the process
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RefCell<HashMap<String, String>>,
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Types
// ============================================================================

/// Page layout of the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    #[default]
    Single,
    TwoColumn,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewMode::Single => "single",
            ViewMode::TwoColumn => "two-column",
        })
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(ViewMode::Single),
            "two-column" => Ok(ViewMode::TwoColumn),
            other => Err(format!("unknown view mode '{}'", other)),
        }
    }
}

/// Everything the reader remembers between sessions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPreferences {
    pub view_mode: ViewMode,
    pub narration_voice: Option<String>,
    pub highlight_color: HighlightColor,
}

/// Load reading preferences; unknown stored values fall back to defaults
pub fn load_reading_preferences<P: Preferences + ?Sized>(
    prefs: &P,
) -> Result<ReadingPreferences, PersistenceError> {
    let view_mode = prefs
        .get(KEY_VIEW_MODE)?
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();
    let narration_voice = prefs.get(KEY_NARRATION_VOICE)?.filter(|v| !v.is_empty());
    let highlight_color = prefs
        .get(KEY_HIGHLIGHT_COLOR)?
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();

    Ok(ReadingPreferences {
        view_mode,
        narration_voice,
        highlight_color,
    })
}

/// Save reading preferences
pub fn save_reading_preferences<P: Preferences + ?Sized>(
    prefs: &P,
    settings: &ReadingPreferences,
) -> Result<(), PersistenceError> {
    prefs.set(KEY_VIEW_MODE, &settings.view_mode.to_string())?;
    prefs.set(
        KEY_NARRATION_VOICE,
        settings.narration_voice.as_deref().unwrap_or(""),
    )?;
    prefs.set(KEY_HIGHLIGHT_COLOR, settings.highlight_color.as_str())?;
    Ok(())
}

// ============================================================================
// Database Operations
// ============================================================================

/// Get a setting value by key
pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, PersistenceError> {
    conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .optional()
    .db_err()
}

/// Set a setting value
pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), PersistenceError> {
    conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
        rusqlite::params![key, value, now_timestamp()],
    )
    .db_err()?;
    Ok(())
}
