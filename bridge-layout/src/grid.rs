//! In-memory screen grid.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bridge_primitives::{ChildIndex, MessageTarget};
use tracing::debug;

use crate::sites::{SiteOption, sort_sites};
use crate::{EmbeddedContext, Layout, LayoutError, LayoutResult, signed};

/// Screen counts accepted when no explicit set is configured.
pub const DEFAULT_SCREEN_COUNTS: [usize; 5] = [1, 2, 3, 4, 20];

/// Widest grid class; larger counts wrap onto extra rows.
const GRID_MAX: usize = 4;

struct Frame {
    id: String,
    src: String,
    window: Option<Arc<dyn MessageTarget>>,
}

struct GridState {
    frames: Vec<Frame>,
    grid_class: String,
    scroll: usize,
}

impl GridState {
    fn with_count(count: usize) -> Self {
        let frames = (0..count)
            .map(|i| Frame {
                id: format!("iframe-{i}"),
                src: String::new(),
                window: None,
            })
            .collect();
        Self {
            frames,
            grid_class: format!("grid-{}", count.min(GRID_MAX)),
            scroll: 0,
        }
    }

    fn frame_mut(&mut self, index: ChildIndex) -> LayoutResult<&mut Frame> {
        let frames = self.frames.len();
        self.frames
            .get_mut(index.get())
            .ok_or_else(|| LayoutError::unknown_child(signed(index.get()), frames))
    }
}

/// Screen grid held entirely in memory.
///
/// Every screen hosts exactly one frame. Rebuilding the grid discards all
/// frames together with any content window mounted into them.
pub struct GridLayout {
    page_location: String,
    allowed_counts: Vec<usize>,
    sites: Vec<String>,
    state: RwLock<GridState>,
}

impl fmt::Debug for GridLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridLayout")
            .field("page_location", &self.page_location)
            .field("allowed_counts", &self.allowed_counts)
            .field("screens", &self.screen_count())
            .finish_non_exhaustive()
    }
}

impl GridLayout {
    /// Creates a single-screen grid for the page at `page_location`.
    #[must_use]
    pub fn new(page_location: impl Into<String>) -> Self {
        Self {
            page_location: page_location.into(),
            allowed_counts: DEFAULT_SCREEN_COUNTS.to_vec(),
            sites: Vec::new(),
            state: RwLock::new(GridState::with_count(1)),
        }
    }

    /// Replaces the accepted screen counts.
    #[must_use]
    pub fn with_allowed_counts(mut self, counts: Vec<usize>) -> Self {
        self.allowed_counts = counts;
        self
    }

    /// Installs the authorized site list, sorted and deduplicated.
    #[must_use]
    pub fn with_authorized_sites(mut self, sites: Vec<String>) -> Self {
        self.sites = sort_sites(sites);
        self
    }

    /// Returns the accepted screen counts.
    #[must_use]
    pub fn allowed_counts(&self) -> &[usize] {
        &self.allowed_counts
    }

    /// Returns `true` if `count` is an accepted screen count.
    #[must_use]
    pub fn is_allowed_count(&self, count: usize) -> bool {
        self.allowed_counts.contains(&count)
    }

    /// CSS-style grid class for the current count, e.g. `grid-3`.
    #[must_use]
    pub fn grid_class(&self) -> String {
        self.read().grid_class.clone()
    }

    /// Index of the screen currently scrolled into view.
    #[must_use]
    pub fn scroll_position(&self) -> usize {
        self.read().scroll
    }

    /// Dropdown entries offered on every screen.
    #[must_use]
    pub fn site_options(&self) -> Vec<SiteOption> {
        self.sites.iter().map(|url| SiteOption::new(url)).collect()
    }

    /// Attaches a content window to the frame at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownChild`] when the index is out of range.
    pub fn mount(&self, index: ChildIndex, window: Arc<dyn MessageTarget>) -> LayoutResult<()> {
        let mut state = self.write();
        state.frame_mut(index)?.window = Some(window);
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, GridState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GridState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Layout for GridLayout {
    fn page_location(&self) -> String {
        self.page_location.clone()
    }

    fn set_grid_layout(&self, count: usize) -> LayoutResult<()> {
        if !self.is_allowed_count(count) {
            let allowed = self
                .allowed_counts
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(LayoutError::CountNotAllowed { count, allowed });
        }

        *self.write() = GridState::with_count(count);
        debug!(count, "grid rebuilt");
        Ok(())
    }

    fn screen_count(&self) -> usize {
        self.read().frames.len()
    }

    fn list_embedded_contexts(&self) -> Vec<EmbeddedContext> {
        self.read()
            .frames
            .iter()
            .enumerate()
            .map(|(index, frame)| EmbeddedContext {
                index,
                id: Some(frame.id.clone()),
                url: frame.src.clone(),
            })
            .collect()
    }

    fn set_child_url(&self, index: ChildIndex, url: &str) -> LayoutResult<()> {
        let mut state = self.write();
        let frame = state.frame_mut(index)?;
        if frame.src != url {
            // A new document replaces whatever was loaded before.
            frame.window = None;
        }
        frame.src = url.to_owned();
        Ok(())
    }

    fn content_window(&self, index: ChildIndex) -> LayoutResult<Arc<dyn MessageTarget>> {
        let state = self.read();
        let frame = state
            .frames
            .get(index.get())
            .ok_or_else(|| LayoutError::unknown_child(signed(index.get()), state.frames.len()))?;
        frame
            .window
            .clone()
            .ok_or(LayoutError::NoContentWindow { index: index.get() })
    }

    fn authorized_sites(&self) -> Vec<String> {
        self.sites.clone()
    }

    fn scroll_to_index(&self, index: usize) -> LayoutResult<()> {
        let mut state = self.write();
        if index >= state.frames.len() {
            return Err(LayoutError::UnknownScreen {
                index: signed(index),
            });
        }
        state.scroll = index;
        Ok(())
    }

    fn scroll_next(&self) {
        let mut state = self.write();
        if state.scroll + 1 < state.frames.len() {
            state.scroll += 1;
        }
    }

    fn scroll_prev(&self) {
        let mut state = self.write();
        state.scroll = state.scroll.saturating_sub(1);
    }
}
