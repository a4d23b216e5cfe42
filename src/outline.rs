//! Native outline extraction
//!
//! Walks a document's outline and resolves every entry to a concrete
//! 1-indexed page. Resolution is attempted in this order:
//! 1. an explicit destination, through the document's page lookup
//! 2. a named destination, looked up first and then resolved as in (1)
//! 3. an explicit page number carried by the entry itself
//! 4. the entry's 1-based position among its siblings
//!
//! A failure on one entry downgrades that entry only. Siblings and
//! children are resolved independently.

use crate::error::OutlineResolutionError;
use crate::types::OutlineNode;
use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, join_all};
use log::{debug, warn};
use std::future::Future;

/// The page a destination points at, as the document describes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTarget {
    /// Indirect reference to a page object (object number, generation)
    Object(u32, u16),
    /// 0-based page index written directly into the destination
    Index(u32),
}

/// Destination of an outline entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Explicit(PageTarget),
    Named(String),
}

/// An outline entry as the document exposes it, before resolution
///
/// This shape never leaves the extractor; callers only see `OutlineNode`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawOutlineItem {
    pub title: String,
    pub dest: Option<Destination>,
    /// Page number some producers store next to the destination
    pub page: Option<i64>,
    pub children: Vec<RawOutlineItem>,
}

impl RawOutlineItem {
    fn explicit_page(&self) -> Option<u32> {
        self.page
            .filter(|&p| p >= 1)
            .and_then(|p| u32::try_from(p).ok())
    }
}

/// A loaded document that can describe its outline
pub trait OutlineDocument {
    /// Top-level outline entries, or `None` when the document has no outline
    fn outline(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<RawOutlineItem>>, OutlineResolutionError>>;

    /// Look up a named destination
    fn resolve_named_destination(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Destination>, OutlineResolutionError>>;

    /// 0-based index of the page a target points at
    fn page_index(
        &self,
        target: &PageTarget,
    ) -> impl Future<Output = Result<u32, OutlineResolutionError>>;
}

/// Extract the native outline of a document
///
/// Never fails: a document without an outline, or one whose outline cannot
/// be read at all, yields an empty list.
pub async fn extract_outline<D: OutlineDocument>(doc: &D) -> Vec<OutlineNode> {
    let items = match doc.outline().await {
        Ok(Some(items)) => items,
        Ok(None) => {
            debug!("document has no outline");
            return Vec::new();
        }
        Err(e) => {
            warn!("failed to read document outline: {}", e);
            return Vec::new();
        }
    };

    let nodes = extract_level(doc, &items).await;
    debug!("extracted {} top-level outline entries", nodes.len());
    nodes
}

fn extract_level<'a, D>(
    doc: &'a D,
    items: &'a [RawOutlineItem],
) -> LocalBoxFuture<'a, Vec<OutlineNode>>
where
    D: OutlineDocument + 'a,
{
    async move {
        join_all(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| extract_node(doc, item, index)),
        )
        .await
    }
    .boxed_local()
}

async fn extract_node<D: OutlineDocument>(
    doc: &D,
    item: &RawOutlineItem,
    index: usize,
) -> OutlineNode {
    let resolved = match &item.dest {
        Some(dest) => resolve_destination(doc, dest).await,
        None => Err(OutlineResolutionError::MissingDestination),
    };

    let page = match resolved {
        Ok(page) => page,
        Err(err) => {
            let fallback = item.explicit_page().unwrap_or(index as u32 + 1);
            if err == OutlineResolutionError::MissingDestination {
                debug!("'{}' has no destination, using page {}", item.title, fallback);
            } else {
                warn!(
                    "could not resolve '{}' ({}), using page {}",
                    item.title, err, fallback
                );
            }
            fallback
        }
    };

    let children = extract_level(doc, &item.children).await;

    OutlineNode {
        title: item.title.clone(),
        page,
        children,
        original_index: index,
    }
}

/// Resolve a destination to a 1-indexed page
pub async fn resolve_destination<D: OutlineDocument>(
    doc: &D,
    dest: &Destination,
) -> Result<u32, OutlineResolutionError> {
    let target = match dest {
        Destination::Explicit(target) => target.clone(),
        Destination::Named(name) => match doc.resolve_named_destination(name).await? {
            Some(Destination::Explicit(target)) => target,
            // A name resolving to another name is not followed
            Some(Destination::Named(_)) | None => {
                return Err(OutlineResolutionError::NamedDestinationNotFound(
                    name.clone(),
                ));
            }
        },
    };

    Ok(doc.page_index(&target).await? + 1)
}
