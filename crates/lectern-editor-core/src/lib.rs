//! lectern-editor-core: pure editor logic for the authoring kernel.
//!
//! This crate provides:
//! - `Selection` and the flattened token position model
//! - `Command` / `Engine` - the command and state-introspection engine
//! - `History` - linear undo over immutable snapshots
//! - `ValueBridge` - host-value synchronization with loop suppression
//! - `StickyToolbar` / `context_menu_placement` - overlay state machines
//! - `Editor` - the facade a host view mounts
//!
//! Everything is synchronous and host-agnostic; layout geometry enters only
//! through the `SelectionGeometry` port.

pub mod bridge;
pub mod commands;
pub mod editor;
pub mod engine;
pub mod history;
pub mod overlay;
pub mod position;
mod transform;
pub mod types;

pub use bridge::ValueBridge;
pub use commands::{Alignment, BlockType, Command};
pub use editor::{Editor, PendingUpload, UploadKind};
pub use engine::{ActiveQuery, Engine};
pub use history::{History, Snapshot};
pub use overlay::{
    ContextMenuPlacement, SelectionGeometry, StickyToolbar, ToolbarPlacement,
    context_menu_commands, context_menu_placement,
};
pub use position::{LeafInfo, TokenMap};
pub use types::{Rect, Selection};
