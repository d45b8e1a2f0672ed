//! The flattened token sequence.
//!
//! Selections address the document through a flat token space: one token per
//! character or inline atomic inside a textblock, one token for a whole
//! atomic block, and one boundary token between consecutive leaves. The map
//! is recomputed from the tree whenever a position has to be resolved; it is
//! never stored across mutations.

use lectern_dom::{Document, Node, Schema, SmolStr};

/// One addressable leaf block: a textblock or an atomic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafInfo {
    /// Child-index path from the document root.
    pub path: Vec<usize>,
    /// Token offset of the leaf's first position.
    pub start: usize,
    /// Token length: inline length for textblocks, 1 for atomic blocks.
    pub len: usize,
    /// Whether this leaf is an atomic block.
    pub atomic: bool,
    /// Node type name.
    pub kind: SmolStr,
}

impl LeafInfo {
    /// Token offset one past the leaf's last position.
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Token map over a document snapshot.
#[derive(Debug, Clone, Default)]
pub struct TokenMap {
    leaves: Vec<LeafInfo>,
    total: usize,
}

impl TokenMap {
    pub fn build(doc: &Document, schema: &Schema) -> Self {
        let mut map = TokenMap::default();
        let mut path = Vec::new();
        for (idx, child) in doc.children.iter().enumerate() {
            path.push(idx);
            map.walk(child, schema, &mut path);
            path.pop();
        }
        map.total = map.leaves.last().map(LeafInfo::end).unwrap_or(0);
        map
    }

    fn walk(&mut self, node: &Node, schema: &Schema, path: &mut Vec<usize>) {
        if schema.is_textblock(&node.kind) {
            self.push_leaf(path.clone(), inline_len(node, schema), false, node.kind.clone());
        } else if node.children.is_empty() {
            // Atomic blocks, plus any childless node an open registry may
            // have produced: both occupy a single token.
            self.push_leaf(path.clone(), 1, true, node.kind.clone());
        } else {
            for (idx, child) in node.children.iter().enumerate() {
                path.push(idx);
                self.walk(child, schema, path);
                path.pop();
            }
        }
    }

    fn push_leaf(&mut self, path: Vec<usize>, len: usize, atomic: bool, kind: SmolStr) {
        let start = match self.leaves.last() {
            Some(prev) => prev.end() + 1,
            None => 0,
        };
        self.leaves.push(LeafInfo { path, start, len, atomic, kind });
    }

    /// Total number of token positions. A caret is valid in `0..=total`.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn leaves(&self) -> &[LeafInfo] {
        &self.leaves
    }

    /// Resolve a position to `(leaf index, offset inside leaf)`.
    ///
    /// A position on the boundary between two leaves belongs to the earlier
    /// one (it is that leaf's end offset).
    pub fn leaf_at(&self, pos: usize) -> Option<(usize, usize)> {
        for (idx, leaf) in self.leaves.iter().enumerate() {
            if pos < leaf.start {
                return Some((idx, 0));
            }
            if pos <= leaf.end() {
                return Some((idx, pos - leaf.start));
            }
        }
        self.leaves
            .last()
            .map(|leaf| (self.leaves.len() - 1, leaf.len))
    }

    /// Leaves overlapped by a token range, with the local range inside each.
    ///
    /// A collapsed range resolves to the caret's leaf with an empty local
    /// range, so block-scoped commands still know which block the caret is
    /// in.
    pub fn covered(&self, start: usize, end: usize) -> Vec<(usize, usize, usize)> {
        if start == end {
            return match self.leaf_at(start) {
                Some((idx, offset)) => vec![(idx, offset, offset)],
                None => Vec::new(),
            };
        }
        let mut out = Vec::new();
        for (idx, leaf) in self.leaves.iter().enumerate() {
            if leaf.start >= end {
                break;
            }
            if leaf.end() <= start {
                continue;
            }
            let local_start = start.saturating_sub(leaf.start);
            let local_end = (end - leaf.start).min(leaf.len);
            out.push((idx, local_start, local_end));
        }
        out
    }

    /// If the selection covers exactly one atomic block, its leaf index.
    pub fn atomic_selection(&self, start: usize, end: usize) -> Option<usize> {
        if end != start + 1 {
            return None;
        }
        self.leaves
            .iter()
            .position(|leaf| leaf.atomic && leaf.start == start)
    }

    /// Find the leaf for an exact node path.
    pub fn leaf_for_path(&self, path: &[usize]) -> Option<usize> {
        self.leaves.iter().position(|leaf| leaf.path == path)
    }

    /// Find the first leaf at or under a node path.
    pub fn first_leaf_under(&self, path: &[usize]) -> Option<usize> {
        self.leaves
            .iter()
            .position(|leaf| leaf.path.starts_with(path))
    }
}

/// Inline token length of a textblock: characters plus inline atomics.
pub fn inline_len(node: &Node, schema: &Schema) -> usize {
    node.children
        .iter()
        .map(|child| {
            if child.is_text() {
                child.text.chars().count()
            } else if schema.spec(&child.kind).is_some() {
                1
            } else {
                0
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_dom::{Attrs, Node};

    fn schema() -> Schema {
        Schema::default()
    }

    fn para(text: &str) -> Node {
        Node::element(
            "paragraph",
            Attrs::new(),
            if text.is_empty() {
                Vec::new()
            } else {
                vec![Node::text(text, Vec::new())]
            },
        )
    }

    #[test]
    fn test_single_paragraph() {
        let doc = Document::from_blocks(vec![para("ab")]);
        let map = TokenMap::build(&doc, &schema());
        assert_eq!(map.total(), 2);
        assert_eq!(map.leaf_at(0), Some((0, 0)));
        assert_eq!(map.leaf_at(2), Some((0, 2)));
    }

    #[test]
    fn test_two_paragraphs_have_boundary_gap() {
        let doc = Document::from_blocks(vec![para("ab"), para("cd")]);
        let map = TokenMap::build(&doc, &schema());
        // "ab" occupies 0..2, boundary at 2..3, "cd" occupies 3..5.
        assert_eq!(map.leaves()[1].start, 3);
        assert_eq!(map.total(), 5);
        assert_eq!(map.leaf_at(2), Some((0, 2)));
        assert_eq!(map.leaf_at(3), Some((1, 0)));
    }

    #[test]
    fn test_atomic_block_occupies_one_token() {
        let doc = Document::from_blocks(vec![
            para("a"),
            Node::atomic("horizontal_rule", Attrs::new()),
            para("b"),
        ]);
        let map = TokenMap::build(&doc, &schema());
        let rule = &map.leaves()[1];
        assert!(rule.atomic);
        assert_eq!(rule.start, 2);
        assert_eq!(rule.len, 1);
        assert_eq!(map.atomic_selection(2, 3), Some(1));
        assert_eq!(map.atomic_selection(2, 4), None);
        assert_eq!(map.atomic_selection(0, 1), None);
    }

    #[test]
    fn test_nested_leaves_have_full_paths() {
        let item = Node::element("list_item", Attrs::new(), vec![para("x")]);
        let list = Node::element("bullet_list", Attrs::new(), vec![item]);
        let doc = Document::from_blocks(vec![list]);
        let map = TokenMap::build(&doc, &schema());
        assert_eq!(map.leaves()[0].path, vec![0, 0, 0]);
        assert_eq!(map.first_leaf_under(&[0]), Some(0));
    }

    #[test]
    fn test_covered_ranges() {
        let doc = Document::from_blocks(vec![para("ab"), para("cd")]);
        let map = TokenMap::build(&doc, &schema());
        // Select from inside "ab" to inside "cd".
        let covered = map.covered(1, 4);
        assert_eq!(covered, vec![(0, 1, 2), (1, 0, 1)]);
    }

    #[test]
    fn test_inline_atomics_count_one() {
        let node = Node::element(
            "paragraph",
            Attrs::new(),
            vec![
                Node::text("ab", Vec::new()),
                Node::atomic("hard_break", Attrs::new()),
                Node::text("c", Vec::new()),
            ],
        );
        assert_eq!(inline_len(&node, &schema()), 4);
    }
}
