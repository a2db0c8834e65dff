//! Read-only layout summaries attached to dispatch results.

use serde::{Deserialize, Serialize};

use crate::Layout;

/// Summary of one embedded frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSummary {
    /// Position of the frame.
    pub index: usize,
    /// Element identifier, if any.
    pub id: Option<String>,
    /// Current location; empty when unset.
    pub src: String,
}

/// Point-in-time view of the page layout.
///
/// Snapshots are computed on demand and never cached, so two snapshots taken
/// around a layout change always differ where the layout did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Number of screens shown.
    pub screens: usize,
    /// Frames in index order.
    pub iframes: Vec<FrameSummary>,
}

impl StateSnapshot {
    /// Captures the current state of `layout`.
    #[must_use]
    pub fn capture(layout: &dyn Layout) -> Self {
        let iframes = layout
            .list_embedded_contexts()
            .into_iter()
            .map(|context| FrameSummary {
                index: context.index,
                id: context.id,
                src: context.url,
            })
            .collect();
        Self {
            screens: layout.screen_count(),
            iframes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bridge_primitives::ChildIndex;
    use serde_json::json;

    use crate::GridLayout;

    #[test]
    fn snapshot_reflects_layout_changes() {
        let layout = GridLayout::new("http://localhost:3000/");
        let before = StateSnapshot::capture(&layout);
        assert_eq!(before.screens, 1);

        layout.set_grid_layout(2).unwrap();
        layout
            .set_child_url(ChildIndex::new(1), "https://a.example/")
            .unwrap();
        let after = StateSnapshot::capture(&layout);

        assert_eq!(
            serde_json::to_value(&after).unwrap(),
            json!({
                "screens": 2,
                "iframes": [
                    { "index": 0, "id": "iframe-0", "src": "" },
                    { "index": 1, "id": "iframe-1", "src": "https://a.example/" }
                ]
            })
        );
    }
}
