//! Persistence port for outline items and annotations
//!
//! Every operation is scoped to one user's view of one book. Implementations
//! report failures as `PersistenceError` and never retry.

use crate::error::PersistenceError;
use crate::types::{
    CustomOutlineItem, CustomOutlineUpdate, Highlight, NewCustomOutline, NewHighlight, NewNote,
    Note, Scope,
};
use std::future::Future;

pub type StoreResult<T> = Result<T, PersistenceError>;

pub trait AnnotationStore {
    /// Custom outline items ordered by `sort_order`
    fn list_custom_outline(
        &self,
        scope: &Scope,
    ) -> impl Future<Output = StoreResult<Vec<CustomOutlineItem>>>;

    fn create_custom_outline(
        &self,
        scope: &Scope,
        item: NewCustomOutline,
    ) -> impl Future<Output = StoreResult<CustomOutlineItem>>;

    fn update_custom_outline(
        &self,
        scope: &Scope,
        id: &str,
        update: CustomOutlineUpdate,
    ) -> impl Future<Output = StoreResult<CustomOutlineItem>>;

    /// `Ok(false)` when nothing in scope had this id
    fn delete_custom_outline(&self, scope: &Scope, id: &str)
    -> impl Future<Output = StoreResult<bool>>;

    fn list_highlights(&self, scope: &Scope) -> impl Future<Output = StoreResult<Vec<Highlight>>>;

    fn create_highlight(
        &self,
        scope: &Scope,
        highlight: NewHighlight,
    ) -> impl Future<Output = StoreResult<Highlight>>;

    fn delete_highlight(&self, scope: &Scope, id: &str) -> impl Future<Output = StoreResult<bool>>;

    fn list_notes(&self, scope: &Scope) -> impl Future<Output = StoreResult<Vec<Note>>>;

    fn create_note(&self, scope: &Scope, note: NewNote) -> impl Future<Output = StoreResult<Note>>;

    fn update_note(
        &self,
        scope: &Scope,
        id: &str,
        content: &str,
    ) -> impl Future<Output = StoreResult<Note>>;

    fn delete_note(&self, scope: &Scope, id: &str) -> impl Future<Output = StoreResult<bool>>;
}
