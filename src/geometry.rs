//! Annotation coordinate model
//!
//! Selections arrive in screen pixels at whatever zoom the reader had at the
//! time. They are stored divided by that zoom, relative to the page's
//! top-left corner, so they can be drawn at any later zoom by multiplying
//! again.

use crate::error::AnnotationCaptureError;
use crate::types::{MarginSide, NormalizedRect, NotePosition};
use log::warn;
use serde::{Deserialize, Serialize};

/// Position recorded when a selection's page cannot be located
pub const FALLBACK_RECT: NormalizedRect = NormalizedRect {
    x: 0.0,
    y: 0.0,
    width: 1.0,
    height: 0.1,
};

/// A rectangle in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Screen position of a page's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageOrigin {
    pub left: f64,
    pub top: f64,
}

/// Bounding box of a rendered page element, in screen pixels at the current zoom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn origin(&self) -> PageOrigin {
        PageOrigin {
            left: self.left,
            top: self.top,
        }
    }
}

/// Fixed note box layout; never persisted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoteLayout {
    /// Gap between the page edge and the note box
    pub margin: f64,
    pub box_width: f64,
}

impl Default for NoteLayout {
    fn default() -> Self {
        Self {
            margin: 16.0,
            box_width: 220.0,
        }
    }
}

/// Where to draw a note at the current zoom, relative to the viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteOverlay {
    pub anchor_x: f64,
    pub anchor_y: f64,
    pub box_left: f64,
    pub box_top: f64,
    pub box_width: f64,
    pub side: MarginSide,
}

fn check_scale(scale: f64) -> Result<f64, AnnotationCaptureError> {
    if scale.is_finite() && scale > 0.0 {
        Ok(scale)
    } else {
        Err(AnnotationCaptureError::InvalidScale(scale))
    }
}

/// Convert a selection rectangle into page units
pub fn try_normalize_rect(
    rect: &ScreenRect,
    page: Option<&PageGeometry>,
    scale: f64,
) -> Result<NormalizedRect, AnnotationCaptureError> {
    let scale = check_scale(scale)?;
    let page = page.ok_or(AnnotationCaptureError::PageGeometryUnavailable)?;
    Ok(NormalizedRect {
        x: (rect.left - page.left) / scale,
        y: (rect.top - page.top) / scale,
        width: rect.width / scale,
        height: rect.height / scale,
    })
}

/// Like `try_normalize_rect`, but degrades to `FALLBACK_RECT` on failure
pub fn normalize_rect(rect: &ScreenRect, page: Option<&PageGeometry>, scale: f64) -> NormalizedRect {
    try_normalize_rect(rect, page, scale).unwrap_or_else(|e| {
        warn!("highlight recorded without placement: {}", e);
        FALLBACK_RECT
    })
}

/// Screen rectangle of a stored position at `scale`
pub fn project_rect(pos: &NormalizedRect, origin: PageOrigin, scale: f64) -> ScreenRect {
    ScreenRect {
        left: origin.left + pos.x * scale,
        top: origin.top + pos.y * scale,
        width: pos.width * scale,
        height: pos.height * scale,
    }
}

/// Left half of the page puts the note in the left margin
pub fn margin_side(x: f64, page_width: f64) -> MarginSide {
    if x < page_width / 2.0 {
        MarginSide::Left
    } else {
        MarginSide::Right
    }
}

/// Capture a note anchor: the selection's top-left corner in page units,
/// with its margin side and the un-zoomed page width
pub fn try_capture_note_position(
    rect: &ScreenRect,
    page: Option<&PageGeometry>,
    scale: f64,
) -> Result<NotePosition, AnnotationCaptureError> {
    let normalized = try_normalize_rect(rect, page, scale)?;
    let page_width = page.map(|p| p.width / scale).unwrap_or_default();
    Ok(NotePosition {
        x: normalized.x,
        y: normalized.y,
        side: Some(margin_side(normalized.x, page_width)),
        page_width: Some(page_width),
    })
}

/// Like `try_capture_note_position`, degrading to the page corner without a side
pub fn capture_note_position(
    rect: &ScreenRect,
    page: Option<&PageGeometry>,
    scale: f64,
) -> NotePosition {
    try_capture_note_position(rect, page, scale).unwrap_or_else(|e| {
        warn!("note recorded without placement: {}", e);
        NotePosition {
            x: FALLBACK_RECT.x,
            y: FALLBACK_RECT.y,
            side: None,
            page_width: None,
        }
    })
}

/// Lay out a note at `scale`
///
/// `current_page_width` (un-zoomed) fills in for notes captured without a
/// page width. Left-side boxes end `margin` before the page's left edge;
/// right-side boxes start `margin` after its right edge. With no width
/// known at all the box sits to the right of the anchor.
pub fn project_note(
    pos: &NotePosition,
    origin: PageOrigin,
    scale: f64,
    current_page_width: Option<f64>,
    layout: &NoteLayout,
) -> NoteOverlay {
    let anchor_x = origin.left + pos.x * scale;
    let anchor_y = origin.top + pos.y * scale;
    let page_width = pos.page_width.or(current_page_width);

    let side = pos
        .side
        .or_else(|| page_width.map(|w| margin_side(pos.x, w)))
        .unwrap_or(MarginSide::Right);

    let box_left = match (side, page_width) {
        (MarginSide::Left, _) => origin.left - layout.margin - layout.box_width,
        (MarginSide::Right, Some(w)) => origin.left + w * scale + layout.margin,
        (MarginSide::Right, None) => anchor_x + layout.margin,
    };

    NoteOverlay {
        anchor_x,
        anchor_y,
        box_left,
        box_top: anchor_y,
        box_width: layout.box_width,
        side,
    }
}
