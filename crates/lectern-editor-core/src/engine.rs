//! The command/state engine.
//!
//! Engine state is `{document, selection, history}`. Every command goes
//! through [`Engine::can_apply`] - the gate that silently rejects anything
//! that would violate the schema or has nothing to act on - and
//! [`Engine::apply`], which performs the mutation synchronously and records
//! one history snapshot. [`Engine::is_active`] reports whether the selection
//! is uniformly covered by a mark or node type, which is what toolbar
//! highlighting and the contextual overlay key off.

use lectern_dom::{Attrs, Document, Mark, Node, Schema, SmolStr, media};
use tracing::debug;

use crate::commands::{Alignment, BlockType, Command};
use crate::history::{History, Snapshot};
use crate::position::TokenMap;
use crate::transform;
use crate::types::Selection;

/// A toolbar introspection query: is this mark or node "active" for the
/// current selection?
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveQuery {
    Mark(Mark),
    Node { kind: SmolStr, attrs: Option<Attrs> },
}

impl ActiveQuery {
    pub fn mark(mark: Mark) -> Self {
        ActiveQuery::Mark(mark)
    }

    pub fn node(kind: &str) -> Self {
        ActiveQuery::Node { kind: kind.into(), attrs: None }
    }

    pub fn node_with(kind: &str, attrs: Attrs) -> Self {
        ActiveQuery::Node { kind: kind.into(), attrs: Some(attrs) }
    }
}

/// The editing state machine.
pub struct Engine {
    schema: Schema,
    doc: Document,
    selection: Selection,
    history: History,
}

impl Engine {
    pub fn new(schema: Schema) -> Self {
        Self::with_document(schema, Document::empty())
    }

    pub fn with_document(schema: Schema, mut doc: Document) -> Self {
        transform::normalize(&mut doc, &schema);
        Self {
            schema,
            doc,
            selection: Selection::default(),
            history: History::default(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Move the selection, clamped to the document.
    pub fn set_selection(&mut self, selection: Selection) {
        let map = self.token_map();
        self.selection = selection.clamped(map.total());
    }

    /// Build a fresh token map over the current document.
    pub fn token_map(&self) -> TokenMap {
        TokenMap::build(&self.doc, &self.schema)
    }

    /// Swap in a host-loaded document: selection resets to the document
    /// start and history is cleared (undoing across a host reload would
    /// resurrect content the host replaced).
    pub fn replace_document(&mut self, mut doc: Document) {
        transform::normalize(&mut doc, &self.schema);
        self.doc = doc;
        self.selection = Selection::collapsed(0);
        self.history.clear();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Whether a command currently applies.
    ///
    /// This is the schema-violation gate: a command that would break content
    /// rules or has nothing to operate on reports `false` and is never
    /// surfaced as an error.
    pub fn can_apply(&self, cmd: &Command) -> bool {
        let map = self.token_map();
        let sel = self.selection;
        match cmd {
            Command::InsertText { text } => !text.is_empty(),
            Command::SplitBlock | Command::InsertLineBreak => {
                if sel.is_collapsed() {
                    map.leaf_at(sel.head)
                        .is_some_and(|(idx, _)| !map.leaves()[idx].atomic)
                } else {
                    true
                }
            }
            Command::DeleteBackward => !sel.is_collapsed() || sel.head > 0,
            Command::DeleteForward => !sel.is_collapsed() || sel.head < map.total(),
            Command::ToggleMark { .. }
            | Command::SetLink { .. }
            | Command::Unlink
            | Command::SetTextColor { .. } => {
                transform::range_has_text(&self.doc, &map, sel.start(), sel.end())
            }
            Command::SetBlockType { block } => {
                let level_ok = match block {
                    BlockType::Heading(level) => (1..=6).contains(level),
                    BlockType::Paragraph => true,
                };
                level_ok && self.covered_has_textblock(&map)
            }
            Command::SetAlignment { .. } => self.covered_has_textblock(&map),
            Command::ToggleBulletList
            | Command::ToggleOrderedList
            | Command::ToggleBlockquote => !map.covered(sel.start(), sel.end()).is_empty(),
            Command::InsertHorizontalRule => true,
            Command::InsertTable { rows, cols } => *rows >= 1 && *cols >= 1,
            Command::InsertImage { src, .. } | Command::InsertMedia { src } => !src.is_empty(),
            Command::ResizeSelected { width } => {
                !width.is_empty()
                    && self
                        .selected_atomic_kind(&map)
                        .is_some_and(|kind| kind == "image" || kind == "media")
            }
            Command::DeleteSelected => self.selected_atomic_kind(&map).is_some(),
            Command::SelectAll => true,
            Command::Undo => self.history.can_undo(),
            Command::Redo => self.history.can_redo(),
        }
    }

    /// Apply a command. Returns whether the state changed.
    ///
    /// Atomic from the caller's perspective: either the full mutation lands
    /// or nothing does.
    pub fn apply(&mut self, cmd: &Command) -> bool {
        if !self.can_apply(cmd) {
            debug!(?cmd, "command rejected by can_apply");
            return false;
        }
        debug!(?cmd, "applying command");

        match cmd {
            Command::Undo => {
                let current = self.snapshot();
                match self.history.undo(current) {
                    Some(snapshot) => {
                        self.restore(snapshot);
                        true
                    }
                    None => false,
                }
            }
            Command::Redo => {
                let current = self.snapshot();
                match self.history.redo(current) {
                    Some(snapshot) => {
                        self.restore(snapshot);
                        true
                    }
                    None => false,
                }
            }
            Command::SelectAll => {
                let map = self.token_map();
                self.selection = Selection::new(0, map.total());
                true
            }
            _ => {
                self.history.record(self.snapshot());
                self.execute(cmd);
                transform::normalize(&mut self.doc, &self.schema);
                let map = self.token_map();
                self.selection = self.selection.clamped(map.total());
                true
            }
        }
    }

    /// Whether a mark or node is uniformly active over the selection.
    pub fn is_active(&self, query: &ActiveQuery) -> bool {
        match query {
            ActiveQuery::Mark(mark) => self.is_mark_active(mark),
            ActiveQuery::Node { kind, attrs } => self.is_node_active(kind, attrs.as_ref()),
        }
    }

    pub fn is_mark_active(&self, mark: &Mark) -> bool {
        let map = self.token_map();
        let sel = self.selection;
        if sel.is_collapsed() {
            transform::marks_at(&self.doc, &map, sel.head)
                .iter()
                .any(|m| m.same_type(mark))
        } else {
            transform::mark_uniform(&self.doc, &map, sel.start(), sel.end(), mark)
        }
    }

    pub fn is_node_active(&self, kind: &str, attrs: Option<&Attrs>) -> bool {
        let map = self.token_map();
        let sel = self.selection;

        if let Some(idx) = map.atomic_selection(sel.start(), sel.end()) {
            let leaf = &map.leaves()[idx];
            if leaf.kind == kind {
                return match attrs {
                    Some(want) => self
                        .doc
                        .node_at(&leaf.path)
                        .is_some_and(|node| attrs_subset(want, &node.attrs)),
                    None => true,
                };
            }
        }

        let covered = map.covered(sel.start(), sel.end());
        !covered.is_empty()
            && covered.iter().all(|&(idx, _, _)| {
                transform::has_ancestor_or_self(&self.doc, &map.leaves()[idx], |node| {
                    node.kind == kind
                        && attrs.map(|want| attrs_subset(want, &node.attrs)).unwrap_or(true)
                })
            })
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot { doc: self.doc.clone(), selection: self.selection }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.doc = snapshot.doc;
        let map = self.token_map();
        self.selection = snapshot.selection.clamped(map.total());
    }

    fn covered_has_textblock(&self, map: &TokenMap) -> bool {
        let sel = self.selection;
        map.covered(sel.start(), sel.end())
            .iter()
            .any(|&(idx, _, _)| !map.leaves()[idx].atomic)
    }

    fn selected_atomic_kind(&self, map: &TokenMap) -> Option<SmolStr> {
        let sel = self.selection;
        map.atomic_selection(sel.start(), sel.end())
            .map(|idx| map.leaves()[idx].kind.clone())
    }

    /// Delete the selection if it is non-empty, collapsing to a caret.
    fn collapse_selection(&mut self) -> usize {
        let sel = self.selection;
        if sel.is_collapsed() {
            return sel.head;
        }
        let map = self.token_map();
        let caret =
            transform::delete_range(&mut self.doc, &self.schema, &map, sel.start(), sel.end());
        self.selection = Selection::collapsed(caret);
        caret
    }

    fn execute(&mut self, cmd: &Command) {
        match cmd {
            Command::InsertText { text } => {
                let caret = self.collapse_selection();
                let map = self.token_map();
                let caret = transform::insert_text(&mut self.doc, &map, caret, text);
                self.selection = Selection::collapsed(caret);
            }
            Command::SplitBlock => {
                let caret = self.collapse_selection();
                let map = self.token_map();
                let caret = transform::split_block(&mut self.doc, &map, caret);
                self.selection = Selection::collapsed(caret);
            }
            Command::InsertLineBreak => {
                let caret = self.collapse_selection();
                let map = self.token_map();
                let caret = transform::insert_inline_node(
                    &mut self.doc,
                    &map,
                    caret,
                    Node::atomic("hard_break", Attrs::new()),
                );
                self.selection = Selection::collapsed(caret);
            }
            Command::DeleteBackward => self.delete_backward(),
            Command::DeleteForward => self.delete_forward(),
            Command::ToggleMark { mark } => {
                let (start, end) = (self.selection.start(), self.selection.end());
                let map = self.token_map();
                let uniform = transform::mark_uniform(&self.doc, &map, start, end, mark);
                transform::set_mark(&mut self.doc, &map, start, end, mark, !uniform);
            }
            Command::SetLink { href } => {
                let (start, end) = (self.selection.start(), self.selection.end());
                let map = self.token_map();
                let mark = Mark::Link { href: href.clone() };
                transform::set_mark(&mut self.doc, &map, start, end, &mark, true);
            }
            Command::Unlink => {
                let (start, end) = (self.selection.start(), self.selection.end());
                let map = self.token_map();
                let mark = Mark::Link { href: SmolStr::default() };
                transform::set_mark(&mut self.doc, &map, start, end, &mark, false);
            }
            Command::SetTextColor { color } => {
                let (start, end) = (self.selection.start(), self.selection.end());
                let map = self.token_map();
                let mark = Mark::TextColor { color: color.clone() };
                transform::set_mark(&mut self.doc, &map, start, end, &mark, true);
            }
            Command::SetBlockType { block } => {
                let (start, end) = (self.selection.start(), self.selection.end());
                let map = self.token_map();
                transform::for_each_covered_textblock(&mut self.doc, &map, start, end, |node| {
                    match block {
                        BlockType::Paragraph => {
                            node.kind = "paragraph".into();
                            node.attrs.remove("level");
                        }
                        BlockType::Heading(level) => {
                            node.kind = "heading".into();
                            node.set_attr("level", level.to_string());
                        }
                    }
                });
            }
            Command::SetAlignment { align } => {
                let (start, end) = (self.selection.start(), self.selection.end());
                let map = self.token_map();
                transform::for_each_covered_textblock(&mut self.doc, &map, start, end, |node| {
                    match align {
                        Alignment::Left => {
                            node.attrs.remove("align");
                        }
                        other => node.set_attr("align", other.as_str()),
                    }
                });
            }
            Command::ToggleBulletList => self.toggle_list("bullet_list"),
            Command::ToggleOrderedList => self.toggle_list("ordered_list"),
            Command::ToggleBlockquote => self.toggle_blockquote(),
            Command::InsertHorizontalRule => {
                let node = Node::atomic("horizontal_rule", Attrs::new());
                let path = self.insert_block_at_caret(node);
                let map = self.token_map();
                if let Some(idx) = map.leaf_for_path(&path) {
                    self.selection = Selection::collapsed(map.leaves()[idx].end());
                }
            }
            Command::InsertImage { src, alt } => {
                let mut attrs = Attrs::new();
                attrs.insert("src".into(), src.clone());
                if !alt.is_empty() {
                    attrs.insert("alt".into(), alt.clone());
                }
                let node = Node::atomic("image", attrs);
                self.insert_and_select_atomic(node);
            }
            Command::InsertMedia { src } => {
                let node = Node::atomic("media", media::media_attrs(src));
                self.insert_and_select_atomic(node);
            }
            Command::InsertTable { rows, cols } => {
                let node = build_table(*rows, *cols);
                let path = self.insert_block_at_caret(node);
                let map = self.token_map();
                if let Some(idx) = map.first_leaf_under(&path) {
                    self.selection = Selection::collapsed(map.leaves()[idx].start);
                }
            }
            Command::ResizeSelected { width } => {
                let map = self.token_map();
                let sel = self.selection;
                if let Some(idx) = map.atomic_selection(sel.start(), sel.end()) {
                    let path = map.leaves()[idx].path.clone();
                    if let Some(node) = self.doc.node_at_mut(&path) {
                        node.set_attr("width", width.clone());
                    }
                }
            }
            Command::DeleteSelected => {
                let map = self.token_map();
                let sel = self.selection;
                if let Some(idx) = map.atomic_selection(sel.start(), sel.end()) {
                    let leaf = map.leaves()[idx].clone();
                    let caret = transform::delete_range(
                        &mut self.doc,
                        &self.schema,
                        &map,
                        leaf.start,
                        leaf.end(),
                    );
                    self.selection = Selection::collapsed(caret);
                }
            }
            // Handled in `apply` before reaching here.
            Command::SelectAll | Command::Undo | Command::Redo => {}
        }
    }

    fn delete_backward(&mut self) {
        if !self.selection.is_collapsed() {
            self.collapse_selection();
            return;
        }
        let caret = self.selection.head;
        let map = self.token_map();
        let Some((leaf_idx, offset)) = map.leaf_at(caret) else {
            return;
        };
        let leaf = map.leaves()[leaf_idx].clone();

        if offset > 0 {
            let caret =
                transform::delete_range(&mut self.doc, &self.schema, &map, caret - 1, caret);
            self.selection = Selection::collapsed(caret);
            return;
        }
        // At the leaf's start: act on the previous leaf.
        let Some(prev_idx) = leaf_idx.checked_sub(1) else {
            return;
        };
        let prev = map.leaves()[prev_idx].clone();
        if prev.atomic {
            let caret = transform::delete_range(
                &mut self.doc,
                &self.schema,
                &map,
                prev.start,
                prev.end(),
            );
            self.selection = Selection::collapsed(caret);
        } else if leaf.atomic {
            // Backspace on the gap before an atomic: just step the caret.
            self.selection = Selection::collapsed(prev.end());
        } else {
            let caret = self.merge_blocks(&map, prev_idx, leaf_idx);
            self.selection = Selection::collapsed(caret);
        }
    }

    fn delete_forward(&mut self) {
        if !self.selection.is_collapsed() {
            self.collapse_selection();
            return;
        }
        let caret = self.selection.head;
        let map = self.token_map();
        let Some((leaf_idx, offset)) = map.leaf_at(caret) else {
            return;
        };
        let leaf = map.leaves()[leaf_idx].clone();

        if offset < leaf.len {
            let caret =
                transform::delete_range(&mut self.doc, &self.schema, &map, caret, caret + 1);
            self.selection = Selection::collapsed(caret);
            return;
        }
        let next_idx = leaf_idx + 1;
        if next_idx >= map.leaves().len() {
            return;
        }
        let next = map.leaves()[next_idx].clone();
        if next.atomic {
            transform::delete_range(&mut self.doc, &self.schema, &map, next.start, next.end());
            self.selection = Selection::collapsed(caret);
        } else if leaf.atomic {
            self.selection = Selection::collapsed(next.start);
        } else {
            let caret = self.merge_blocks(&map, leaf_idx, next_idx);
            self.selection = Selection::collapsed(caret);
        }
    }

    /// Join two textblocks, appending the second's content to the first.
    fn merge_blocks(&mut self, map: &TokenMap, first_idx: usize, second_idx: usize) -> usize {
        let first = map.leaves()[first_idx].clone();
        let second = map.leaves()[second_idx].clone();
        let Some(second_node) = self.doc.node_at(&second.path) else {
            return first.end();
        };
        let tail = transform::explode(second_node);
        let Some(first_node) = self.doc.node_at(&first.path) else {
            return first.end();
        };
        let mut atoms = transform::explode(first_node);
        atoms.extend(tail);
        if let Some(node) = self.doc.node_at_mut(&first.path) {
            node.children = transform::rebuild(atoms);
        }
        transform::remove_at(&mut self.doc, &second.path);
        first.end()
    }

    fn insert_block_at_caret(&mut self, node: Node) -> Vec<usize> {
        let caret = self.collapse_selection();
        let map = self.token_map();
        transform::insert_block(&mut self.doc, &map, caret, node)
    }

    fn insert_and_select_atomic(&mut self, node: Node) {
        let path = self.insert_block_at_caret(node);
        let map = self.token_map();
        if let Some(idx) = map.leaf_for_path(&path) {
            let leaf = &map.leaves()[idx];
            self.selection = Selection::new(leaf.start, leaf.end());
        }
    }

    fn toggle_list(&mut self, kind: &str) {
        let (start, end) = (self.selection.start(), self.selection.end());
        let map = self.token_map();
        let all_in_kind = {
            let covered = map.covered(start, end);
            !covered.is_empty()
                && covered.iter().all(|&(idx, _, _)| {
                    transform::has_ancestor_or_self(&self.doc, &map.leaves()[idx], |node| {
                        node.kind == kind
                    })
                })
        };

        if all_in_kind {
            transform::unwrap_lists(&mut self.doc, &map, start, end);
        } else {
            // Clear any other list wrapping first, then wrap. Unwrapping
            // changes paths but not token positions, so only the map needs
            // rebuilding.
            transform::unwrap_lists(&mut self.doc, &map, start, end);
            let map = self.token_map();
            transform::wrap_in_list(&mut self.doc, &map, start, end, kind);
        }
    }

    fn toggle_blockquote(&mut self) {
        let (start, end) = (self.selection.start(), self.selection.end());
        let map = self.token_map();
        let all_quoted = {
            let covered = map.covered(start, end);
            !covered.is_empty()
                && covered.iter().all(|&(idx, _, _)| {
                    transform::has_ancestor_or_self(&self.doc, &map.leaves()[idx], |node| {
                        node.kind == "blockquote"
                    })
                })
        };

        if all_quoted {
            transform::unwrap_blockquotes(&mut self.doc, &map, start, end);
        } else {
            transform::wrap_in_blockquote(&mut self.doc, &map, start, end);
        }
    }
}

fn attrs_subset(want: &Attrs, have: &Attrs) -> bool {
    want.iter().all(|(key, value)| have.get(key) == Some(value))
}

fn build_table(rows: usize, cols: usize) -> Node {
    let row = |_: usize| {
        let cells = (0..cols)
            .map(|_| {
                Node::element(
                    "table_cell",
                    Attrs::new(),
                    vec![Node::element("paragraph", Attrs::new(), Vec::new())],
                )
            })
            .collect();
        Node::element("table_row", Attrs::new(), cells)
    };
    Node::element("table", Attrs::new(), (0..rows).map(row).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_dom::{deserialize, serialize};

    fn engine_with(html: &str) -> Engine {
        let schema = Schema::default();
        let doc = deserialize(html, &schema);
        Engine::with_document(schema, doc)
    }

    #[test]
    fn test_insert_text() {
        let mut engine = engine_with("<p>hello</p>");
        engine.set_selection(Selection::collapsed(5));
        assert!(engine.apply(&Command::InsertText { text: " world".into() }));
        assert_eq!(engine.doc().text_content(), "hello world");
        assert_eq!(engine.selection(), Selection::collapsed(11));
    }

    #[test]
    fn test_insert_text_replaces_selection() {
        let mut engine = engine_with("<p>hello world</p>");
        engine.set_selection(Selection::new(5, 11));
        assert!(engine.apply(&Command::InsertText { text: "!".into() }));
        assert_eq!(engine.doc().text_content(), "hello!");
    }

    #[test]
    fn test_undo_boundary_on_fresh_document() {
        let mut engine = engine_with("<p>hello</p>");
        assert!(!engine.can_apply(&Command::Undo));
        assert!(!engine.apply(&Command::Undo));
        assert_eq!(engine.doc().text_content(), "hello");
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut engine = engine_with("<p>hello</p>");
        engine.set_selection(Selection::collapsed(5));
        engine.apply(&Command::InsertText { text: "!".into() });
        assert_eq!(engine.doc().text_content(), "hello!");

        assert!(engine.apply(&Command::Undo));
        assert_eq!(engine.doc().text_content(), "hello");
        assert!(engine.can_apply(&Command::Redo));

        assert!(engine.apply(&Command::Redo));
        assert_eq!(engine.doc().text_content(), "hello!");
    }

    #[test]
    fn test_new_edit_truncates_redo() {
        let mut engine = engine_with("<p>ab</p>");
        engine.set_selection(Selection::collapsed(2));
        engine.apply(&Command::InsertText { text: "c".into() });
        engine.apply(&Command::Undo);
        assert!(engine.can_apply(&Command::Redo));

        engine.apply(&Command::InsertText { text: "d".into() });
        assert!(!engine.can_apply(&Command::Redo));
    }

    #[test]
    fn test_toggle_mark_and_active_state() {
        let mut engine = engine_with("<p>hello</p>");
        engine.set_selection(Selection::new(0, 5));
        assert!(!engine.is_active(&ActiveQuery::mark(Mark::Bold)));

        assert!(engine.apply(&Command::ToggleMark { mark: Mark::Bold }));
        assert!(engine.is_active(&ActiveQuery::mark(Mark::Bold)));

        // Toggling again removes it (idempotent application, inverse toggle).
        assert!(engine.apply(&Command::ToggleMark { mark: Mark::Bold }));
        assert!(!engine.is_active(&ActiveQuery::mark(Mark::Bold)));
    }

    #[test]
    fn test_partial_bold_selection_is_not_active_and_toggle_extends() {
        let mut engine = engine_with("<p><strong>ab</strong>cd</p>");
        engine.set_selection(Selection::new(0, 4));
        assert!(!engine.is_active(&ActiveQuery::mark(Mark::Bold)));

        engine.apply(&Command::ToggleMark { mark: Mark::Bold });
        assert!(engine.is_active(&ActiveQuery::mark(Mark::Bold)));
    }

    #[test]
    fn test_mark_commands_require_text() {
        let mut engine = engine_with("<p>hello</p>");
        engine.set_selection(Selection::collapsed(2));
        assert!(!engine.can_apply(&Command::ToggleMark { mark: Mark::Bold }));
        assert!(!engine.can_apply(&Command::SetLink { href: "https://x".into() }));
    }

    #[test]
    fn test_set_block_type_heading() {
        let mut engine = engine_with("<p>title</p>");
        engine.set_selection(Selection::collapsed(2));
        assert!(engine.apply(&Command::SetBlockType { block: BlockType::Heading(2) }));

        let mut want = Attrs::new();
        want.insert("level".into(), "2".into());
        assert!(engine.is_active(&ActiveQuery::node_with("heading", want)));
        assert!(!engine.is_active(&ActiveQuery::node("paragraph")));
    }

    #[test]
    fn test_heading_level_out_of_range_rejected() {
        let engine = engine_with("<p>title</p>");
        assert!(!engine.can_apply(&Command::SetBlockType { block: BlockType::Heading(0) }));
        assert!(!engine.can_apply(&Command::SetBlockType { block: BlockType::Heading(7) }));
    }

    #[test]
    fn test_alignment_roundtrip_to_default() {
        let mut engine = engine_with("<p>x</p>");
        engine.set_selection(Selection::collapsed(0));
        engine.apply(&Command::SetAlignment { align: Alignment::Center });
        assert_eq!(engine.doc().children[0].attr("align"), Some("center"));

        engine.apply(&Command::SetAlignment { align: Alignment::Left });
        assert_eq!(engine.doc().children[0].attr("align"), None);
    }

    #[test]
    fn test_toggle_bullet_list() {
        let mut engine = engine_with("<p>a</p><p>b</p>");
        engine.apply(&Command::SelectAll);
        assert!(engine.apply(&Command::ToggleBulletList));
        assert_eq!(engine.doc().children[0].kind, "bullet_list");
        assert!(engine.is_active(&ActiveQuery::node("bullet_list")));

        assert!(engine.apply(&Command::ToggleBulletList));
        assert_eq!(engine.doc().children[0].kind, "paragraph");
    }

    #[test]
    fn test_switching_list_kind() {
        let mut engine = engine_with("<ul><li><p>a</p></li></ul>");
        engine.apply(&Command::SelectAll);
        assert!(engine.apply(&Command::ToggleOrderedList));
        assert_eq!(engine.doc().children[0].kind, "ordered_list");
    }

    #[test]
    fn test_insert_image_selects_it() {
        let mut engine = engine_with("<p>ab</p>");
        engine.set_selection(Selection::collapsed(2));
        assert!(engine.apply(&Command::InsertImage {
            src: "https://cdn.example.com/a.png".into(),
            alt: "pic".into(),
        }));

        assert!(engine.is_active(&ActiveQuery::node("image")));
        let sel = engine.selection();
        assert_eq!(sel.len(), 1);
    }

    #[test]
    fn test_resize_and_delete_selected_image() {
        let mut engine = engine_with("<p>ab</p>");
        engine.set_selection(Selection::collapsed(2));
        engine.apply(&Command::InsertImage { src: "/a.png".into(), alt: "".into() });

        assert!(engine.apply(&Command::ResizeSelected { width: "50%".into() }));
        assert_eq!(engine.doc().children[1].attr("width"), Some("50%"));

        assert!(engine.apply(&Command::DeleteSelected));
        assert!(!engine.is_active(&ActiveQuery::node("image")));
        assert_eq!(engine.doc().children.len(), 1);
    }

    #[test]
    fn test_resize_requires_atomic_selection() {
        let mut engine = engine_with("<p>ab</p>");
        engine.set_selection(Selection::new(0, 2));
        assert!(!engine.can_apply(&Command::ResizeSelected { width: "50%".into() }));
        assert!(!engine.can_apply(&Command::DeleteSelected));
    }

    #[test]
    fn test_block_commands_rejected_on_atomic_selection() {
        let mut engine = engine_with("<p>ab</p>");
        engine.set_selection(Selection::collapsed(2));
        engine.apply(&Command::InsertHorizontalRule);
        // Select the rule.
        let map = engine.token_map();
        let rule = map
            .leaves()
            .iter()
            .find(|leaf| leaf.kind == "horizontal_rule")
            .cloned()
            .unwrap();
        engine.set_selection(Selection::new(rule.start, rule.end()));

        assert!(!engine.can_apply(&Command::SetBlockType { block: BlockType::Heading(1) }));
        assert!(!engine.can_apply(&Command::SetAlignment { align: Alignment::Center }));
    }

    #[test]
    fn test_insert_media_caches_strategy() {
        let mut engine = engine_with("<p></p>");
        engine.apply(&Command::InsertMedia { src: "https://youtu.be/abc123".into() });
        let media = engine
            .doc()
            .children
            .iter()
            .find(|node| node.kind == "media")
            .unwrap();
        assert_eq!(media.attr("strategy"), Some("provider-embed"));
        assert_eq!(media.attr("video-id"), Some("abc123"));
        assert!(engine.is_active(&ActiveQuery::node("media")));
    }

    #[test]
    fn test_insert_table_places_caret_in_first_cell() {
        let mut engine = engine_with("<p>ab</p>");
        engine.set_selection(Selection::collapsed(2));
        assert!(engine.apply(&Command::InsertTable { rows: 2, cols: 2 }));

        let table = engine
            .doc()
            .children
            .iter()
            .find(|node| node.kind == "table")
            .unwrap();
        assert_eq!(table.children.len(), 2);
        assert_eq!(table.children[0].children.len(), 2);

        // Caret sits inside the table's first cell paragraph.
        let map = engine.token_map();
        let (leaf_idx, _) = map.leaf_at(engine.selection().head).unwrap();
        assert!(map.leaves()[leaf_idx].path.len() > 3);
    }

    #[test]
    fn test_delete_backward_joins_paragraphs() {
        let mut engine = engine_with("<p>ab</p><p>cd</p>");
        // Caret at the start of "cd" (token 3).
        engine.set_selection(Selection::collapsed(3));
        assert!(engine.apply(&Command::DeleteBackward));
        assert_eq!(engine.doc().children.len(), 1);
        assert_eq!(engine.doc().text_content(), "abcd");
        assert_eq!(engine.selection(), Selection::collapsed(2));
    }

    #[test]
    fn test_delete_backward_at_document_start_is_rejected() {
        let mut engine = engine_with("<p>ab</p>");
        engine.set_selection(Selection::collapsed(0));
        assert!(!engine.can_apply(&Command::DeleteBackward));
    }

    #[test]
    fn test_delete_forward_removes_following_atomic() {
        let mut engine = engine_with("<p>ab</p><hr /><p>cd</p>");
        engine.set_selection(Selection::collapsed(2));
        assert!(engine.apply(&Command::DeleteForward));
        assert_eq!(engine.doc().children.len(), 2);
        assert_eq!(engine.doc().text_content(), "abcd");
    }

    #[test]
    fn test_split_block() {
        let mut engine = engine_with("<p>hello</p>");
        engine.set_selection(Selection::collapsed(3));
        assert!(engine.apply(&Command::SplitBlock));
        assert_eq!(engine.doc().children.len(), 2);
        assert_eq!(engine.selection(), Selection::collapsed(4));
    }

    #[test]
    fn test_round_trip_of_command_built_document() {
        let mut engine = engine_with("");
        engine.apply(&Command::InsertText { text: "Course intro".into() });
        engine.apply(&Command::SelectAll);
        engine.apply(&Command::SetBlockType { block: BlockType::Heading(1) });

        engine.set_selection(Selection::collapsed(engine.token_map().total()));
        engine.apply(&Command::SplitBlock);
        engine.apply(&Command::InsertText { text: "Welcome to the course.".into() });
        engine.set_selection(Selection::new(13, 15));
        engine.apply(&Command::ToggleMark { mark: Mark::Bold });

        engine.set_selection(Selection::collapsed(engine.token_map().total()));
        engine.apply(&Command::InsertHorizontalRule);
        engine.apply(&Command::InsertMedia { src: "https://vimeo.com/555".into() });
        // Deselect the media node; inserting over a selection replaces it.
        engine.set_selection(Selection::collapsed(engine.token_map().total()));
        engine.apply(&Command::InsertTable { rows: 1, cols: 2 });
        engine.apply(&Command::InsertText { text: "cell".into() });

        let schema = Schema::default();
        let html = serialize(engine.doc(), &schema);
        let reparsed = deserialize(&html, &schema);
        assert_eq!(&reparsed, engine.doc());
    }
}
