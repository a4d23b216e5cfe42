//! Database operations for Shelfmark
//!
//! This module implements the annotation store and the preferences port
//! on top of a single SQLite connection:
//! - schema migrations on open, with foreign keys enforced
//! - custom outline items, highlights and notes, always filtered by book and user
//! - the book rows those records cascade from

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::db_schema::run_migrations;
use crate::error::{PersistenceError, ToDbError};
use crate::settings::{Preferences, get_setting, set_setting};
use crate::store::{AnnotationStore, StoreResult};
use crate::types::{
    CustomOutlineItem, CustomOutlineUpdate, Highlight, HighlightColor, NewCustomOutline,
    NewHighlight, NewNote, NormalizedRect, Note, NotePosition, Scope,
};

/// Current Unix timestamp in seconds
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn index_from_db(value: Option<i64>) -> Option<usize> {
    value.and_then(|v| usize::try_from(v).ok())
}

/// SQLite-backed `AnnotationStore` and `Preferences`
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to date
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        debug!("opening database at {}", path.display());
        Self::from_connection(Connection::open(path).db_err()?)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::from_connection(Connection::open_in_memory().db_err()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, PersistenceError> {
        conn.pragma_update(None, "foreign_keys", true).db_err()?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn
            .lock()
            .map_err(|_| PersistenceError::Database("connection lock poisoned".to_string()))
    }

    /// Register a book if it is not known yet
    pub fn ensure_book(&self, book_id: i64, title: &str) -> Result<(), PersistenceError> {
        self.conn()?
            .execute(
                "INSERT OR IGNORE INTO books (id, title, created_at) VALUES (?1, ?2, ?3)",
                params![book_id, title, now_timestamp()],
            )
            .db_err()?;
        Ok(())
    }

    /// Delete a book together with every outline item and annotation it owns
    pub fn delete_book(&self, book_id: i64) -> Result<bool, PersistenceError> {
        let changed = self
            .conn()?
            .execute("DELETE FROM books WHERE id = ?1", [book_id])
            .db_err()?;
        if changed > 0 {
            info!("deleted book {}", book_id);
        }
        Ok(changed > 0)
    }

    // ------------------------------------------------------------------------
    // Custom outline
    // ------------------------------------------------------------------------

    fn get_custom_outline(
        conn: &Connection,
        scope: &Scope,
        id: &str,
    ) -> StoreResult<CustomOutlineItem> {
        conn.query_row(
            "SELECT id, book_id, user_id, title, page_number, parent_id, sort_order, original_pdf_index
             FROM custom_outline WHERE id = ?1 AND book_id = ?2 AND user_id = ?3",
            params![id, scope.book_id, scope.user_id],
            custom_outline_from_row,
        )
        .optional()
        .db_err()?
        .ok_or_else(|| PersistenceError::NotFound(format!("custom outline item {}", id)))
    }

    fn list_custom_outline_sync(&self, scope: &Scope) -> StoreResult<Vec<CustomOutlineItem>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, user_id, title, page_number, parent_id, sort_order, original_pdf_index
                 FROM custom_outline WHERE book_id = ?1 AND user_id = ?2
                 ORDER BY sort_order, created_at, rowid",
            )
            .db_err()?;
        let items = stmt
            .query_map(params![scope.book_id, scope.user_id], custom_outline_from_row)
            .db_err()?
            .collect::<Result<Vec<_>, _>>()
            .db_err()?;
        Ok(items)
    }

    fn create_custom_outline_sync(
        &self,
        scope: &Scope,
        item: NewCustomOutline,
    ) -> StoreResult<CustomOutlineItem> {
        let conn = self.conn()?;
        let id = new_id();
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO custom_outline (
                id, book_id, user_id, title, page_number, parent_id, sort_order,
                original_pdf_index, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                id,
                scope.book_id,
                scope.user_id,
                item.title,
                item.page_number,
                item.parent_id,
                item.sort_order,
                item.original_pdf_index.map(|i| i as i64),
                now,
            ],
        )
        .db_err()?;
        info!("created custom outline item {} for book {}", id, scope.book_id);

        Ok(CustomOutlineItem {
            id,
            book_id: scope.book_id,
            user_id: scope.user_id.clone(),
            title: item.title,
            page_number: item.page_number,
            parent_id: item.parent_id,
            sort_order: item.sort_order,
            original_pdf_index: item.original_pdf_index,
        })
    }

    fn update_custom_outline_sync(
        &self,
        scope: &Scope,
        id: &str,
        update: CustomOutlineUpdate,
    ) -> StoreResult<CustomOutlineItem> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE custom_outline SET
                    title = COALESCE(?1, title),
                    page_number = COALESCE(?2, page_number),
                    sort_order = COALESCE(?3, sort_order),
                    updated_at = ?4
                 WHERE id = ?5 AND book_id = ?6 AND user_id = ?7",
                params![
                    update.title,
                    update.page_number,
                    update.sort_order,
                    now_timestamp(),
                    id,
                    scope.book_id,
                    scope.user_id,
                ],
            )
            .db_err()?;
        if changed == 0 {
            return Err(PersistenceError::NotFound(format!(
                "custom outline item {}",
                id
            )));
        }
        Self::get_custom_outline(&conn, scope, id)
    }

    fn delete_scoped(&self, table: &str, scope: &Scope, id: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE id = ?1 AND book_id = ?2 AND user_id = ?3",
                    table
                ),
                params![id, scope.book_id, scope.user_id],
            )
            .db_err()?;
        if changed > 0 {
            info!("deleted {} row {}", table, id);
        }
        Ok(changed > 0)
    }

    // ------------------------------------------------------------------------
    // Highlights
    // ------------------------------------------------------------------------

    fn list_highlights_sync(&self, scope: &Scope) -> StoreResult<Vec<Highlight>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, user_id, page, text, color, position, created_at
                 FROM highlights WHERE book_id = ?1 AND user_id = ?2
                 ORDER BY page, created_at, rowid",
            )
            .db_err()?;
        let rows = stmt
            .query_map(params![scope.book_id, scope.user_id], |row| {
                Ok(HighlightRow {
                    id: row.get(0)?,
                    book_id: row.get(1)?,
                    user_id: row.get(2)?,
                    page: row.get(3)?,
                    text: row.get(4)?,
                    color: row.get(5)?,
                    position_json: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })
            .db_err()?
            .collect::<Result<Vec<_>, _>>()
            .db_err()?;
        rows.into_iter().map(HighlightRow::into_highlight).collect()
    }

    fn create_highlight_sync(&self, scope: &Scope, new: NewHighlight) -> StoreResult<Highlight> {
        let conn = self.conn()?;
        let id = new_id();
        let now = now_timestamp();
        let position_json = serde_json::to_string(&new.position)?;
        conn.execute(
            "INSERT INTO highlights (id, book_id, user_id, page, text, color, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                scope.book_id,
                scope.user_id,
                new.page,
                new.text,
                new.color.as_str(),
                position_json,
                now,
            ],
        )
        .db_err()?;
        info!("created highlight {} on page {}", id, new.page);

        Ok(Highlight {
            id,
            book_id: scope.book_id,
            user_id: scope.user_id.clone(),
            page: new.page,
            text: new.text,
            color: new.color,
            position: new.position,
            created_at: now,
        })
    }

    // ------------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------------

    fn get_note(conn: &Connection, scope: &Scope, id: &str) -> StoreResult<Note> {
        conn.query_row(
            "SELECT id, book_id, user_id, page, content, position, created_at, updated_at
             FROM notes WHERE id = ?1 AND book_id = ?2 AND user_id = ?3",
            params![id, scope.book_id, scope.user_id],
            note_row,
        )
        .optional()
        .db_err()?
        .ok_or_else(|| PersistenceError::NotFound(format!("note {}", id)))?
        .into_note()
    }

    fn list_notes_sync(&self, scope: &Scope) -> StoreResult<Vec<Note>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, user_id, page, content, position, created_at, updated_at
                 FROM notes WHERE book_id = ?1 AND user_id = ?2
                 ORDER BY page, created_at, rowid",
            )
            .db_err()?;
        let rows = stmt
            .query_map(params![scope.book_id, scope.user_id], note_row)
            .db_err()?
            .collect::<Result<Vec<_>, _>>()
            .db_err()?;
        rows.into_iter().map(NoteRow::into_note).collect()
    }

    fn create_note_sync(&self, scope: &Scope, new: NewNote) -> StoreResult<Note> {
        let conn = self.conn()?;
        let id = new_id();
        let now = now_timestamp();
        let position_json = serde_json::to_string(&new.position)?;
        conn.execute(
            "INSERT INTO notes (id, book_id, user_id, page, content, position, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                scope.book_id,
                scope.user_id,
                new.page,
                new.content,
                position_json,
                now,
            ],
        )
        .db_err()?;
        info!("created note {} on page {}", id, new.page);

        Ok(Note {
            id,
            book_id: scope.book_id,
            user_id: scope.user_id.clone(),
            page: new.page,
            content: new.content,
            position: new.position,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_note_sync(&self, scope: &Scope, id: &str, content: &str) -> StoreResult<Note> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE notes SET content = ?1, updated_at = ?2
                 WHERE id = ?3 AND book_id = ?4 AND user_id = ?5",
                params![content, now_timestamp(), id, scope.book_id, scope.user_id],
            )
            .db_err()?;
        if changed == 0 {
            return Err(PersistenceError::NotFound(format!("note {}", id)));
        }
        Self::get_note(&conn, scope, id)
    }
}

impl AnnotationStore for SqliteStore {
    async fn list_custom_outline(&self, scope: &Scope) -> StoreResult<Vec<CustomOutlineItem>> {
        self.list_custom_outline_sync(scope)
    }

    async fn create_custom_outline(
        &self,
        scope: &Scope,
        item: NewCustomOutline,
    ) -> StoreResult<CustomOutlineItem> {
        self.create_custom_outline_sync(scope, item)
    }

    async fn update_custom_outline(
        &self,
        scope: &Scope,
        id: &str,
        update: CustomOutlineUpdate,
    ) -> StoreResult<CustomOutlineItem> {
        self.update_custom_outline_sync(scope, id, update)
    }

    async fn delete_custom_outline(&self, scope: &Scope, id: &str) -> StoreResult<bool> {
        self.delete_scoped("custom_outline", scope, id)
    }

    async fn list_highlights(&self, scope: &Scope) -> StoreResult<Vec<Highlight>> {
        self.list_highlights_sync(scope)
    }

    async fn create_highlight(
        &self,
        scope: &Scope,
        highlight: NewHighlight,
    ) -> StoreResult<Highlight> {
        self.create_highlight_sync(scope, highlight)
    }

    async fn delete_highlight(&self, scope: &Scope, id: &str) -> StoreResult<bool> {
        self.delete_scoped("highlights", scope, id)
    }

    async fn list_notes(&self, scope: &Scope) -> StoreResult<Vec<Note>> {
        self.list_notes_sync(scope)
    }

    async fn create_note(&self, scope: &Scope, note: NewNote) -> StoreResult<Note> {
        self.create_note_sync(scope, note)
    }

    async fn update_note(&self, scope: &Scope, id: &str, content: &str) -> StoreResult<Note> {
        self.update_note_sync(scope, id, content)
    }

    async fn delete_note(&self, scope: &Scope, id: &str) -> StoreResult<bool> {
        self.delete_scoped("notes", scope, id)
    }
}

impl Preferences for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let conn = self.conn()?;
        get_setting(&conn, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        set_setting(&conn, key, value)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn custom_outline_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CustomOutlineItem> {
    Ok(CustomOutlineItem {
        id: row.get(0)?,
        book_id: row.get(1)?,
        user_id: row.get(2)?,
        title: row.get(3)?,
        page_number: row.get(4)?,
        parent_id: row.get(5)?,
        sort_order: row.get(6)?,
        original_pdf_index: index_from_db(row.get(7)?),
    })
}

/// Highlight row before its JSON and enum columns are decoded
struct HighlightRow {
    id: String,
    book_id: i64,
    user_id: String,
    page: u32,
    text: String,
    color: String,
    position_json: String,
    created_at: i64,
}

impl HighlightRow {
    fn into_highlight(self) -> StoreResult<Highlight> {
        let position: NormalizedRect = serde_json::from_str(&self.position_json)?;
        let color = self.color.parse::<HighlightColor>().unwrap_or_else(|e| {
            warn!("highlight {}: {}, showing it as yellow", self.id, e);
            HighlightColor::default()
        });
        Ok(Highlight {
            id: self.id,
            book_id: self.book_id,
            user_id: self.user_id,
            page: self.page,
            text: self.text,
            color,
            position,
            created_at: self.created_at,
        })
    }
}

/// Note row before its position JSON is decoded
struct NoteRow {
    id: String,
    book_id: i64,
    user_id: String,
    page: u32,
    content: String,
    position_json: String,
    created_at: i64,
    updated_at: i64,
}

fn note_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        book_id: row.get(1)?,
        user_id: row.get(2)?,
        page: row.get(3)?,
        content: row.get(4)?,
        position_json: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl NoteRow {
    fn into_note(self) -> StoreResult<Note> {
        let position: NotePosition = serde_json::from_str(&self.position_json)?;
        Ok(Note {
            id: self.id,
            book_id: self.book_id,
            user_id: self.user_id,
            page: self.page,
            content: self.content,
            position,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
