//! Type definitions for Shelfmark
//!
//! This module contains the data structures shared by the outline engine,
//! the annotation model, and the persistence layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ownership scope for every persisted record: one user's view of one book
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub book_id: i64,
    pub user_id: String,
}

impl Scope {
    pub fn new(book_id: i64, user_id: impl Into<String>) -> Self {
        Self {
            book_id,
            user_id: user_id.into(),
        }
    }
}

// ============================================
// Outline types
// ============================================

/// An entry of the PDF's own outline, rebuilt on every document load
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutlineNode {
    /// Title of the outline entry
    pub title: String,
    /// Page number (1-indexed, always resolved to something)
    pub page: u32,
    /// Child entries (for nested outlines)
    pub children: Vec<OutlineNode>,
    /// Position among siblings at extraction time
    pub original_index: usize,
}

/// A user-authored bookmark, optionally replacing a native outline entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOutlineItem {
    pub id: String,
    pub book_id: i64,
    pub user_id: String,
    pub title: String,
    pub page_number: u32,
    pub parent_id: Option<String>,
    pub sort_order: i64,
    /// Native sibling index this item hides, if any
    pub original_pdf_index: Option<usize>,
}

/// Where a merged outline entry came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntrySource {
    Native {
        #[serde(rename = "originalIndex")]
        original_index: usize,
    },
    Custom {
        id: String,
        #[serde(rename = "originalIndex", skip_serializing_if = "Option::is_none")]
        original_index: Option<usize>,
    },
}

/// One row of the outline shown to the reader
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedOutlineEntry {
    pub title: String,
    pub page: u32,
    #[serde(flatten)]
    pub source: EntrySource,
}

impl MergedOutlineEntry {
    pub fn is_custom(&self) -> bool {
        matches!(self.source, EntrySource::Custom { .. })
    }

    /// Custom item id, present iff the entry is custom
    pub fn id(&self) -> Option<&str> {
        match &self.source {
            EntrySource::Custom { id, .. } => Some(id),
            EntrySource::Native { .. } => None,
        }
    }

    pub fn original_index(&self) -> Option<usize> {
        match &self.source {
            EntrySource::Native { original_index } => Some(*original_index),
            EntrySource::Custom { original_index, .. } => *original_index,
        }
    }
}

/// Fields for creating a custom outline item
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomOutline {
    pub title: String,
    pub page_number: u32,
    pub sort_order: i64,
    pub original_pdf_index: Option<usize>,
    pub parent_id: Option<String>,
}

/// Partial update of a custom outline item; `None` leaves a field untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOutlineUpdate {
    pub title: Option<String>,
    pub page_number: Option<u32>,
    pub sort_order: Option<i64>,
}

// ============================================
// Annotation types
// ============================================

/// Fixed highlight palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
    Purple,
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 5] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Pink,
        HighlightColor::Purple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
            HighlightColor::Pink => "pink",
            HighlightColor::Purple => "purple",
        }
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HighlightColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HighlightColor::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown highlight color '{}'", s))
    }
}

/// A rectangle in un-zoomed page units, relative to the page's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Which page margin a note box is drawn in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginSide {
    Left,
    Right,
}

/// Anchor of a note in un-zoomed page units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePosition {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<MarginSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_width: Option<f64>,
}

/// A stored text highlight. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: String,
    pub book_id: i64,
    pub user_id: String,
    pub page: u32,
    pub text: String,
    pub color: HighlightColor,
    pub position: NormalizedRect,
    pub created_at: i64,
}

/// A stored margin note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub book_id: i64,
    pub user_id: String,
    pub page: u32,
    pub content: String,
    pub position: NotePosition,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for creating a highlight
#[derive(Debug, Clone, PartialEq)]
pub struct NewHighlight {
    pub page: u32,
    pub text: String,
    pub color: HighlightColor,
    pub position: NormalizedRect,
}

/// Fields for creating a note
#[derive(Debug, Clone, PartialEq)]
pub struct NewNote {
    pub page: u32,
    pub content: String,
    pub position: NotePosition,
}
