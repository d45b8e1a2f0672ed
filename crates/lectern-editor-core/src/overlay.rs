//! Overlay placement: the sticky toolbar and the contextual menu.
//!
//! Both overlays are pure state machines here; the host applies the
//! computed placement to whatever rendering surface it has. Live layout
//! geometry enters through the [`SelectionGeometry`] port, never through
//! direct layout queries from the kernel.

use tracing::trace;

use crate::engine::{ActiveQuery, Engine};
use crate::types::{Rect, Selection};

/// Host port: where is the selection on screen?
///
/// Implemented by the host's rendering surface. Returns `None` when the
/// selection has no on-screen representation (not laid out yet, collapsed
/// inside a hidden container, ...).
pub trait SelectionGeometry {
    fn selection_rect(&self, selection: &Selection) -> Option<Rect>;
}

/// Placement of the main toolbar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToolbarPlacement {
    /// Toolbar sits in normal document flow.
    InFlow,
    /// Toolbar is fixed to the viewport top; a spacer of the given height
    /// keeps the content from jumping.
    Docked { spacer_height: f64 },
}

/// Sticky toolbar state.
///
/// Records its original vertical offset on first layout; once the viewport
/// scrolls past that offset the toolbar docks to the viewport top, and it
/// reverts as soon as the viewport scrolls back above it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StickyToolbar {
    origin_top: Option<f64>,
    height: f64,
}

impl StickyToolbar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the toolbar's layout. Only the first call captures the
    /// origin offset; later calls just refresh the height.
    pub fn record_layout(&mut self, top: f64, height: f64) {
        if self.origin_top.is_none() {
            trace!(top, height, "recording toolbar origin");
            self.origin_top = Some(top);
        }
        self.height = height;
    }

    /// Placement for the current scroll position.
    pub fn placement(&self, scroll_y: f64) -> ToolbarPlacement {
        match self.origin_top {
            Some(origin) if scroll_y > origin => ToolbarPlacement::Docked {
                spacer_height: self.height,
            },
            _ => ToolbarPlacement::InFlow,
        }
    }

    /// Whether the toolbar is currently docked.
    pub fn is_docked(&self, scroll_y: f64) -> bool {
        matches!(self.placement(scroll_y), ToolbarPlacement::Docked { .. })
    }
}

/// Vertical gap between the selection box and the contextual menu.
const CONTEXT_MENU_OFFSET: f64 = 8.0;

/// Placement of the selection-anchored contextual menu.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextMenuPlacement {
    /// Horizontal center of the anchor.
    pub x: f64,
    /// Top edge for the menu, just below the anchor.
    pub y: f64,
}

/// Compute the contextual menu placement for the current state.
///
/// The menu is shown only while an atomic image or media node is selected;
/// it is anchored to the selection's bounding box and must be recomputed on
/// every selection change. Returns `None` when the menu should be hidden.
pub fn context_menu_placement(
    engine: &Engine,
    geometry: &dyn SelectionGeometry,
) -> Option<ContextMenuPlacement> {
    if !engine.is_active(&ActiveQuery::node("image"))
        && !engine.is_active(&ActiveQuery::node("media"))
    {
        return None;
    }
    let selection = engine.selection();
    let rect = geometry.selection_rect(&selection)?;
    Some(ContextMenuPlacement {
        x: rect.center_x(),
        y: rect.bottom() + CONTEXT_MENU_OFFSET,
    })
}

/// The commands the contextual menu offers.
///
/// Size presets plus delete - every one routed through the command engine,
/// so the menu has no mutation path of its own.
pub fn context_menu_commands() -> Vec<crate::commands::Command> {
    use crate::commands::Command;
    vec![
        Command::ResizeSelected { width: "25%".into() },
        Command::ResizeSelected { width: "50%".into() },
        Command::ResizeSelected { width: "75%".into() },
        Command::ResizeSelected { width: "100%".into() },
        Command::DeleteSelected,
    ]
}
