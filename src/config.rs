//! Reader configuration
//!
//! Fixed layout and zoom constants handed to the reader at construction.
//! Any field missing from a config file takes its default.

use crate::error::ShelfmarkError;
use crate::geometry::NoteLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaderConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    /// Added to or subtracted from the scale per zoom step
    pub zoom_step: f64,
    pub initial_scale: f64,
    pub note_layout: NoteLayout,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.25,
            max_scale: 4.0,
            zoom_step: 0.25,
            initial_scale: 1.0,
            note_layout: NoteLayout::default(),
        }
    }
}

impl ReaderConfig {
    /// Read a JSON config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ShelfmarkError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ShelfmarkError> {
        let config: ReaderConfig =
            serde_json::from_str(raw).map_err(|e| ShelfmarkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ShelfmarkError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.min_scale) || !positive(self.max_scale) {
            return Err(ShelfmarkError::Config(
                "zoom bounds must be positive".to_string(),
            ));
        }
        if self.min_scale > self.max_scale {
            return Err(ShelfmarkError::Config(format!(
                "minScale {} exceeds maxScale {}",
                self.min_scale, self.max_scale
            )));
        }
        if !positive(self.zoom_step) {
            return Err(ShelfmarkError::Config(
                "zoomStep must be positive".to_string(),
            ));
        }
        if !(self.min_scale..=self.max_scale).contains(&self.initial_scale) {
            return Err(ShelfmarkError::Config(format!(
                "initialScale {} is outside [{}, {}]",
                self.initial_scale, self.min_scale, self.max_scale
            )));
        }
        if self.note_layout.margin < 0.0 || !positive(self.note_layout.box_width) {
            return Err(ShelfmarkError::Config(
                "note layout must have a non-negative margin and a positive width".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamp a requested scale to the configured bounds
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.initial_scale;
        }
        scale.clamp(self.min_scale, self.max_scale)
    }
}
