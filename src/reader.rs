//! Reader controller
//!
//! Owns the in-memory outline and annotation lists for one open book and
//! coordinates page navigation, zoom, the highlight/note modes and the
//! selection pipeline. Highlights are stored as soon as text is selected;
//! notes open a draft that is only stored on an explicit save.
//!
//! Local lists change only after the store confirms a write, so a failed
//! create never shows up in them.

use log::{debug, info, warn};
use std::collections::HashSet;

use crate::config::ReaderConfig;
use crate::error::{Result, ShelfmarkError};
use crate::geometry::{
    NoteOverlay, PageGeometry, PageOrigin, ScreenRect, capture_note_position, normalize_rect,
    project_note, project_rect,
};
use crate::merge::{dangling_overrides, duplicate_overrides, merge_outline};
use crate::outline::{OutlineDocument, extract_outline};
use crate::settings::{
    Preferences, ReadingPreferences, ViewMode, load_reading_preferences, save_reading_preferences,
};
use crate::store::AnnotationStore;
use crate::types::{
    CustomOutlineItem, CustomOutlineUpdate, Highlight, HighlightColor, MergedOutlineEntry,
    NewCustomOutline, NewHighlight, NewNote, Note, NotePosition, OutlineNode, Scope,
};

/// Which pipeline a text selection goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderMode {
    #[default]
    Idle,
    Highlight,
    Note,
}

/// Speech output that page navigation can interrupt
pub trait Narrator {
    fn is_speaking(&self) -> bool;
    fn cancel(&mut self);
}

/// A finished (mouse-up) text selection on a rendered page
#[derive(Debug, Clone, PartialEq)]
pub struct TextSelection {
    pub text: String,
    pub page: u32,
    pub rect: ScreenRect,
    /// `None` when the page element could not be found
    pub page_geometry: Option<PageGeometry>,
}

/// A note waiting for its content before being stored
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub page: u32,
    pub quote: String,
    pub position: NotePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// Collapsed selection, or no mode active
    Ignored,
    Highlighted(Highlight),
    NoteDraftOpened(NoteDraft),
}

/// Build note text, quoting the selection above the user's words
pub fn compose_note_content(quote: &str, body: &str) -> String {
    let quote = quote.trim();
    let body = body.trim();
    if quote.is_empty() {
        return body.to_string();
    }
    let quoted: Vec<String> = quote.lines().map(|line| format!("> {}", line)).collect();
    let quoted = quoted.join("\n");
    if body.is_empty() {
        quoted
    } else {
        format!("{}\n\n{}", quoted, body)
    }
}

pub struct ReaderController<S, P> {
    store: S,
    prefs: P,
    config: ReaderConfig,
    scope: Scope,
    preferences: ReadingPreferences,
    num_pages: u32,
    current_page: u32,
    scale: f64,
    mode: ReaderMode,
    native_outline: Vec<OutlineNode>,
    custom_outline: Vec<CustomOutlineItem>,
    merged_outline: Vec<MergedOutlineEntry>,
    highlights: Vec<Highlight>,
    notes: Vec<Note>,
    note_draft: Option<NoteDraft>,
    narrator: Option<Box<dyn Narrator>>,
}

impl<S: AnnotationStore, P: Preferences> ReaderController<S, P> {
    pub fn new(store: S, prefs: P, config: ReaderConfig, scope: Scope) -> Self {
        let preferences = load_reading_preferences(&prefs).unwrap_or_else(|e| {
            warn!("using default reading preferences: {}", e);
            ReadingPreferences::default()
        });
        let scale = config.initial_scale;
        Self {
            store,
            prefs,
            config,
            scope,
            preferences,
            num_pages: 1,
            current_page: 1,
            scale,
            mode: ReaderMode::Idle,
            native_outline: Vec::new(),
            custom_outline: Vec::new(),
            merged_outline: Vec::new(),
            highlights: Vec::new(),
            notes: Vec::new(),
            note_draft: None,
            narrator: None,
        }
    }

    pub fn with_narrator(mut self, narrator: Box<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Load a document: extract its outline, then fetch the stored outline
    /// items and annotations for this book
    pub async fn open_document<D: OutlineDocument>(&mut self, doc: &D, num_pages: u32) -> Result<()> {
        self.num_pages = num_pages.max(1);
        self.current_page = 1;
        self.note_draft = None;
        self.native_outline = extract_outline(doc).await;
        self.custom_outline.clear();
        self.rebuild_merged_outline();
        debug!(
            "opened book {} with {} pages, {} native outline entries",
            self.scope.book_id,
            self.num_pages,
            self.native_outline.len()
        );
        self.refresh_outline().await?;
        self.load_annotations().await
    }

    /// Re-fetch custom outline items and rebuild the merged outline
    pub async fn refresh_outline(&mut self) -> Result<()> {
        self.custom_outline = self.store.list_custom_outline(&self.scope).await?;
        duplicate_overrides(&self.custom_outline);
        for item in dangling_overrides(&self.native_outline, &self.custom_outline) {
            debug!(
                "outline item '{}' overrides missing native entry {:?}",
                item.title, item.original_pdf_index
            );
        }
        self.rebuild_merged_outline();
        Ok(())
    }

    /// Fetch highlights and notes; both lists are replaced together or not at all
    pub async fn load_annotations(&mut self) -> Result<()> {
        let highlights = self.store.list_highlights(&self.scope).await?;
        let notes = self.store.list_notes(&self.scope).await?;
        self.highlights = highlights;
        self.notes = notes;
        Ok(())
    }

    fn rebuild_merged_outline(&mut self) {
        self.merged_outline = merge_outline(&self.native_outline, &self.custom_outline);
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn mode(&self) -> ReaderMode {
        self.mode
    }

    pub fn preferences(&self) -> &ReadingPreferences {
        &self.preferences
    }

    pub fn native_outline(&self) -> &[OutlineNode] {
        &self.native_outline
    }

    pub fn custom_outline(&self) -> &[CustomOutlineItem] {
        &self.custom_outline
    }

    pub fn merged_outline(&self) -> &[MergedOutlineEntry] {
        &self.merged_outline
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note_draft(&self) -> Option<&NoteDraft> {
        self.note_draft.as_ref()
    }

    // ------------------------------------------------------------------------
    // Navigation and zoom
    // ------------------------------------------------------------------------

    /// Go to `page`, clamped to the document. Interrupts narration.
    pub fn go_to_page(&mut self, page: i64) -> u32 {
        let target = page.clamp(1, i64::from(self.num_pages)) as u32;
        if let Some(narrator) = self.narrator.as_mut()
            && narrator.is_speaking()
        {
            debug!("cancelling narration on page change");
            narrator.cancel();
        }
        self.current_page = target;
        target
    }

    pub fn next_page(&mut self) -> u32 {
        self.go_to_page(i64::from(self.current_page) + 1)
    }

    pub fn prev_page(&mut self) -> u32 {
        self.go_to_page(i64::from(self.current_page) - 1)
    }

    /// Jump to the page of the merged outline entry at `index`
    pub fn navigate_to_entry(&mut self, index: usize) -> Option<u32> {
        let page = self.merged_outline.get(index)?.page;
        Some(self.go_to_page(i64::from(page)))
    }

    pub fn set_scale(&mut self, scale: f64) -> f64 {
        self.scale = self.config.clamp_scale(scale);
        self.scale
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.set_scale(self.scale + self.config.zoom_step)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.set_scale(self.scale - self.config.zoom_step)
    }

    // ------------------------------------------------------------------------
    // Modes and preferences
    // ------------------------------------------------------------------------

    /// Highlight and note modes exclude each other; toggling one clears the other
    pub fn toggle_highlight_mode(&mut self) -> ReaderMode {
        self.mode = match self.mode {
            ReaderMode::Highlight => ReaderMode::Idle,
            _ => ReaderMode::Highlight,
        };
        self.mode
    }

    pub fn toggle_note_mode(&mut self) -> ReaderMode {
        self.mode = match self.mode {
            ReaderMode::Note => ReaderMode::Idle,
            _ => ReaderMode::Note,
        };
        self.mode
    }

    pub fn set_highlight_color(&mut self, color: HighlightColor) -> Result<()> {
        self.update_preferences(|p| p.highlight_color = color)
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) -> Result<()> {
        self.update_preferences(|p| p.view_mode = view_mode)
    }

    pub fn set_narration_voice(&mut self, voice: Option<String>) -> Result<()> {
        self.update_preferences(|p| p.narration_voice = voice)
    }

    fn update_preferences(&mut self, change: impl FnOnce(&mut ReadingPreferences)) -> Result<()> {
        let mut next = self.preferences.clone();
        change(&mut next);
        save_reading_preferences(&self.prefs, &next)?;
        self.preferences = next;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Selection pipeline
    // ------------------------------------------------------------------------

    /// Route a finished text selection according to the current mode
    pub async fn handle_selection(&mut self, selection: TextSelection) -> Result<SelectionOutcome> {
        let text = selection.text.trim();
        if text.is_empty() {
            return Ok(SelectionOutcome::Ignored);
        }

        match self.mode {
            ReaderMode::Idle => Ok(SelectionOutcome::Ignored),
            ReaderMode::Highlight => {
                let position = normalize_rect(
                    &selection.rect,
                    selection.page_geometry.as_ref(),
                    self.scale,
                );
                let new = NewHighlight {
                    page: selection.page,
                    text: text.to_string(),
                    color: self.preferences.highlight_color,
                    position,
                };
                let highlight = self.store.create_highlight(&self.scope, new).await?;
                self.highlights.push(highlight.clone());
                Ok(SelectionOutcome::Highlighted(highlight))
            }
            ReaderMode::Note => {
                let position = capture_note_position(
                    &selection.rect,
                    selection.page_geometry.as_ref(),
                    self.scale,
                );
                let draft = NoteDraft {
                    page: selection.page,
                    quote: text.to_string(),
                    position,
                };
                self.note_draft = Some(draft.clone());
                Ok(SelectionOutcome::NoteDraftOpened(draft))
            }
        }
    }

    pub fn cancel_note_draft(&mut self) -> Option<NoteDraft> {
        self.note_draft.take()
    }

    /// Store the open note draft with `content`. The draft survives a failed save.
    pub async fn save_note(&mut self, content: &str) -> Result<Note> {
        let draft = self
            .note_draft
            .as_ref()
            .ok_or_else(|| ShelfmarkError::InvalidState("no note draft is open".to_string()))?;

        let composed = compose_note_content(&draft.quote, content);
        if composed.is_empty() {
            return Err(ShelfmarkError::InvalidState("note is empty".to_string()));
        }

        let new = NewNote {
            page: draft.page,
            content: composed,
            position: draft.position,
        };
        let note = self.store.create_note(&self.scope, new).await?;
        self.note_draft = None;
        self.notes.push(note.clone());
        Ok(note)
    }

    pub async fn update_note(&mut self, id: &str, content: &str) -> Result<Note> {
        let note = self.store.update_note(&self.scope, id, content).await?;
        if let Some(local) = self.notes.iter_mut().find(|n| n.id == id) {
            *local = note.clone();
        }
        Ok(note)
    }

    pub async fn delete_note(&mut self, id: &str) -> Result<bool> {
        let deleted = self.store.delete_note(&self.scope, id).await?;
        if deleted {
            self.notes.retain(|n| n.id != id);
        }
        Ok(deleted)
    }

    pub async fn delete_highlight(&mut self, id: &str) -> Result<bool> {
        let deleted = self.store.delete_highlight(&self.scope, id).await?;
        if deleted {
            self.highlights.retain(|h| h.id != id);
        }
        Ok(deleted)
    }

    // ------------------------------------------------------------------------
    // Overlays
    // ------------------------------------------------------------------------

    /// Highlights on `page`, projected at the current scale
    pub fn highlight_overlays(&self, page: u32, origin: PageOrigin) -> Vec<(&Highlight, ScreenRect)> {
        self.highlights
            .iter()
            .filter(|h| h.page == page)
            .map(|h| (h, project_rect(&h.position, origin, self.scale)))
            .collect()
    }

    /// Notes on `page`, laid out in the margins at the current scale
    ///
    /// `page_width` is the un-zoomed width of the page as rendered now.
    pub fn note_overlays(
        &self,
        page: u32,
        origin: PageOrigin,
        page_width: Option<f64>,
    ) -> Vec<(&Note, NoteOverlay)> {
        self.notes
            .iter()
            .filter(|n| n.page == page)
            .map(|n| {
                let overlay = project_note(
                    &n.position,
                    origin,
                    self.scale,
                    page_width,
                    &self.config.note_layout,
                );
                (n, overlay)
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Custom outline editing
    // ------------------------------------------------------------------------

    fn next_sort_order(&self) -> i64 {
        self.custom_outline
            .iter()
            .map(|item| item.sort_order + 1)
            .max()
            .unwrap_or(0)
    }

    fn check_page(&self, page: u32) -> Result<()> {
        if page == 0 || page > self.num_pages {
            return Err(ShelfmarkError::InvalidState(format!(
                "page {} is outside 1..={}",
                page, self.num_pages
            )));
        }
        Ok(())
    }

    /// Bookmark the current page
    pub async fn add_bookmark(&mut self, title: Option<&str>) -> Result<CustomOutlineItem> {
        let page = self.current_page;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Page {}", page));
        self.insert_custom(NewCustomOutline {
            title,
            page_number: page,
            sort_order: self.next_sort_order(),
            original_pdf_index: None,
            parent_id: None,
        })
        .await
    }

    /// Replace the native entry at `original_index` with an editable custom copy
    pub async fn convert_native_to_custom(
        &mut self,
        original_index: usize,
        title: Option<&str>,
    ) -> Result<CustomOutlineItem> {
        let node = self.native_outline.get(original_index).ok_or_else(|| {
            ShelfmarkError::InvalidState(format!("no native outline entry {}", original_index))
        })?;
        let new = NewCustomOutline {
            title: title.map(str::to_string).unwrap_or_else(|| node.title.clone()),
            page_number: node.page,
            sort_order: self.next_sort_order(),
            original_pdf_index: Some(original_index),
            parent_id: None,
        };
        self.insert_custom(new).await
    }

    async fn insert_custom(&mut self, new: NewCustomOutline) -> Result<CustomOutlineItem> {
        let item = self.store.create_custom_outline(&self.scope, new).await?;
        info!("added outline item '{}' on page {}", item.title, item.page_number);
        self.custom_outline.push(item.clone());
        self.rebuild_merged_outline();
        Ok(item)
    }

    pub async fn update_custom_outline(
        &mut self,
        id: &str,
        update: CustomOutlineUpdate,
    ) -> Result<CustomOutlineItem> {
        if let Some(page) = update.page_number {
            self.check_page(page)?;
        }
        let item = self
            .store
            .update_custom_outline(&self.scope, id, update)
            .await?;
        if let Some(local) = self.custom_outline.iter_mut().find(|c| c.id == id) {
            *local = item.clone();
        }
        self.custom_outline.sort_by_key(|c| c.sort_order);
        self.rebuild_merged_outline();
        Ok(item)
    }

    /// Delete a custom item; every item nested below it goes with it
    pub async fn delete_custom_outline(&mut self, id: &str) -> Result<bool> {
        let deleted = self.store.delete_custom_outline(&self.scope, id).await?;
        if deleted {
            let mut removed = HashSet::from([id.to_string()]);
            loop {
                let before = removed.len();
                for item in &self.custom_outline {
                    if let Some(parent) = item.parent_id.as_deref()
                        && removed.contains(parent)
                    {
                        removed.insert(item.id.clone());
                    }
                }
                if removed.len() == before {
                    break;
                }
            }
            self.custom_outline.retain(|c| !removed.contains(&c.id));
            self.rebuild_merged_outline();
        }
        Ok(deleted)
    }
}
