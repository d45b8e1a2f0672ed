//! lectern-dom: document tree, schema registry, and canonical HTML.
//!
//! This crate owns the data the authoring kernel edits:
//! - `Node`/`Mark`/`Document` - the typed tree and its annotations
//! - `Schema` - the open node-type registry (content rules, parse rules,
//!   render rules)
//! - `serialize`/`deserialize` - canonical HTML out, lenient HTML in
//! - `media` - provider resolution for the media embed node
//!
//! Round-trip law: for any document produced purely through registered
//! editor commands, `deserialize(&serialize(&d, &s), &s) == d`.

pub mod media;
pub mod node;
pub mod parse;
pub mod schema;
pub mod serialize;

pub use node::{Attrs, Document, Mark, Node, normalize_marks};
pub use parse::deserialize;
pub use schema::{AttrParseFn, ContentRule, NodeGroup, NodeSpec, ParseRule, RenderFn, Schema};
pub use serialize::{HtmlWriter, serialize};
pub use smol_str::SmolStr;
