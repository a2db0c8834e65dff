//! Page layout seen by tool handlers.
//!
//! [`Layout`] is the seam through which tools change the screen grid, point
//! embedded children at new locations, and reach a child's message target.
//! [`GridLayout`] is the in-memory implementation used by the runtime and the
//! tests; [`StateSnapshot`] summarises any layout for callers that need to
//! resynchronise after a call.

#![warn(missing_docs, clippy::pedantic)]

mod grid;
mod sites;
mod snapshot;

use std::sync::Arc;

use bridge_primitives::{ChildIndex, MessageTarget};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use grid::{DEFAULT_SCREEN_COUNTS, GridLayout};
pub use sites::{SiteOption, site_label, sort_sites};
pub use snapshot::{FrameSummary, StateSnapshot};

/// Result alias for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Errors raised by layout collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Requested screen count is not one of the allowed values.
    #[error("Screen count not allowed: {count}. Allowed: {allowed}")]
    CountNotAllowed {
        /// Rejected count.
        count: usize,
        /// Comma-separated allowed counts.
        allowed: String,
    },

    /// Child index outside the current frame range.
    #[error("Invalid iframe index: {index}. Range: 0..{last}")]
    UnknownChild {
        /// Rejected index, possibly negative.
        index: i64,
        /// Highest valid index (zero when there are no frames).
        last: usize,
    },

    /// Screen index outside the current screen range.
    #[error("Invalid screen index: {index}")]
    UnknownScreen {
        /// Rejected index, possibly negative.
        index: i64,
    },

    /// The frame exists but nothing is loaded into it.
    #[error("iframe {index} has no content window")]
    NoContentWindow {
        /// Index of the empty frame.
        index: usize,
    },
}

impl LayoutError {
    /// Child `index` falls outside a grid of `frames` frames.
    #[must_use]
    pub fn unknown_child(index: i64, frames: usize) -> Self {
        Self::UnknownChild {
            index,
            last: frames.saturating_sub(1),
        }
    }
}

/// Widens an in-memory position for error reporting.
pub(crate) fn signed(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

/// An embedded child context as seen from the page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedContext {
    /// Position of the child inside the page.
    pub index: usize,
    /// Element identifier, if the frame carries one.
    pub id: Option<String>,
    /// Current location; empty when unset.
    pub url: String,
}

/// Layout collaborator consumed by tool handlers.
pub trait Layout: Send + Sync {
    /// Location of the page itself, used to resolve relative child locations.
    fn page_location(&self) -> String;

    /// Rebuilds the grid with `count` screens.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::CountNotAllowed`] for counts outside the
    /// allowed set.
    fn set_grid_layout(&self, count: usize) -> LayoutResult<()>;

    /// Number of screens currently shown.
    fn screen_count(&self) -> usize;

    /// Lists every embedded child in index order.
    fn list_embedded_contexts(&self) -> Vec<EmbeddedContext>;

    /// Points the child at `index` to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownChild`] when the index is out of range.
    fn set_child_url(&self, index: ChildIndex, url: &str) -> LayoutResult<()>;

    /// Returns the message target of the child at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownChild`] when the index is out of range
    /// and [`LayoutError::NoContentWindow`] when nothing is loaded.
    fn content_window(&self, index: ChildIndex) -> LayoutResult<Arc<dyn MessageTarget>>;

    /// Read-only list of authorized site locations.
    fn authorized_sites(&self) -> Vec<String>;

    /// Scrolls so that screen `index` is in view.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownScreen`] when the index is out of range.
    fn scroll_to_index(&self, index: usize) -> LayoutResult<()>;

    /// Scrolls to the next screen, if any.
    fn scroll_next(&self);

    /// Scrolls to the previous screen, if any.
    fn scroll_prev(&self);

    /// Looks up a single child.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownChild`] when the index is out of range.
    fn embedded_context(&self, index: ChildIndex) -> LayoutResult<EmbeddedContext> {
        let contexts = self.list_embedded_contexts();
        let frames = contexts.len();
        contexts
            .into_iter()
            .nth(index.get())
            .ok_or_else(|| LayoutError::unknown_child(signed(index.get()), frames))
    }
}
