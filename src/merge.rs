//! Outline merging
//!
//! Combines the PDF's own top-level outline with the user's custom outline
//! items. A custom item carrying `original_pdf_index = k` hides the native
//! entry at sibling index `k`; every custom item is shown. The result is
//! ordered by page, custom entries first among equal pages.

use crate::types::{CustomOutlineItem, EntrySource, MergedOutlineEntry, OutlineNode};
use log::warn;
use std::collections::{BTreeMap, HashSet};

/// Merge native outline entries with custom items
///
/// Only top-level native entries take part; nested children are not
/// individually overridable. `custom_items` order is kept for entries
/// sharing a page.
pub fn merge_outline(
    native: &[OutlineNode],
    custom_items: &[CustomOutlineItem],
) -> Vec<MergedOutlineEntry> {
    let overridden: HashSet<usize> = custom_items
        .iter()
        .filter_map(|item| item.original_pdf_index)
        .collect();

    let mut merged: Vec<MergedOutlineEntry> = custom_items
        .iter()
        .map(|item| MergedOutlineEntry {
            title: item.title.clone(),
            page: item.page_number,
            source: EntrySource::Custom {
                id: item.id.clone(),
                original_index: item.original_pdf_index,
            },
        })
        .collect();

    merged.extend(
        native
            .iter()
            .enumerate()
            .filter(|(index, _)| !overridden.contains(index))
            .map(|(index, node)| MergedOutlineEntry {
                title: node.title.clone(),
                page: node.page,
                source: EntrySource::Native {
                    original_index: index,
                },
            }),
    );

    // Stable: equal pages keep custom-before-native emission order
    merged.sort_by_key(|entry| entry.page);
    merged
}

/// Native indices claimed by more than one custom item, with the claimant ids
///
/// All claimants stay visible in the merged outline; this only reports them.
pub fn duplicate_overrides(custom_items: &[CustomOutlineItem]) -> BTreeMap<usize, Vec<String>> {
    let mut claims: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for item in custom_items {
        if let Some(index) = item.original_pdf_index {
            claims.entry(index).or_default().push(item.id.clone());
        }
    }
    claims.retain(|index, ids| {
        if ids.len() > 1 {
            warn!("native outline entry {} is overridden {} times", index, ids.len());
            true
        } else {
            false
        }
    });
    claims
}

/// Custom overrides pointing past the end of the native outline
///
/// These hide nothing. They are returned so an editor can offer to detach them.
pub fn dangling_overrides<'a>(
    native: &[OutlineNode],
    custom_items: &'a [CustomOutlineItem],
) -> Vec<&'a CustomOutlineItem> {
    custom_items
        .iter()
        .filter(|item| item.original_pdf_index.is_some_and(|i| i >= native.len()))
        .collect()
}
