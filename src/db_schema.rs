use crate::error::{PersistenceError, ToDbError};
use log::info;
use rusqlite::Connection;

/// A forward-only schema step, applied when `PRAGMA user_version` is below `version`
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Returns the database migrations for the application
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "create books and custom outline tables",
            sql: "CREATE TABLE IF NOT EXISTS books (
                    id INTEGER PRIMARY KEY,
                    title TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS custom_outline (
                    id TEXT PRIMARY KEY,
                    book_id INTEGER NOT NULL,
                    user_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    page_number INTEGER NOT NULL CHECK (page_number > 0),
                    parent_id TEXT,
                    sort_order INTEGER NOT NULL DEFAULT 0,
                    original_pdf_index INTEGER,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE,
                    FOREIGN KEY (parent_id) REFERENCES custom_outline(id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_custom_outline_scope
                    ON custom_outline(book_id, user_id, sort_order);",
        },
        Migration {
            version: 2,
            description: "create highlights and notes tables",
            sql: "-- Positions are JSON in un-zoomed page units
                CREATE TABLE IF NOT EXISTS highlights (
                    id TEXT PRIMARY KEY,
                    book_id INTEGER NOT NULL,
                    user_id TEXT NOT NULL,
                    page INTEGER NOT NULL,
                    text TEXT NOT NULL,
                    color TEXT NOT NULL,
                    position TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_highlights_scope ON highlights(book_id, user_id, page);

                CREATE TABLE IF NOT EXISTS notes (
                    id TEXT PRIMARY KEY,
                    book_id INTEGER NOT NULL,
                    user_id TEXT NOT NULL,
                    page INTEGER NOT NULL,
                    content TEXT NOT NULL,
                    position TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_notes_scope ON notes(book_id, user_id, page);",
        },
        Migration {
            version: 3,
            description: "add settings table",
            sql: "CREATE TABLE IF NOT EXISTS settings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    key TEXT NOT NULL UNIQUE,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_settings_key ON settings(key);",
        },
    ]
}

pub fn schema_version(conn: &Connection) -> Result<i64, PersistenceError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .db_err()
}

/// Apply every migration newer than the database, each in its own transaction
pub fn run_migrations(conn: &mut Connection) -> Result<(), PersistenceError> {
    let current = schema_version(conn)?;

    for migration in get_migrations()
        .into_iter()
        .filter(|m| m.version > current)
    {
        info!(
            "applying migration {}: {}",
            migration.version, migration.description
        );
        let tx = conn.transaction().db_err()?;
        tx.execute_batch(migration.sql).db_err()?;
        tx.pragma_update(None, "user_version", migration.version)
            .db_err()?;
        tx.commit().db_err()?;
    }

    Ok(())
}
