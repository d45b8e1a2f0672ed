//! Tree surgery behind the command engine.
//!
//! Textblock edits go through an explode/rebuild cycle: inline content is
//! flattened to per-character atoms, the edit is a splice over that vector,
//! and rebuilding merges runs back into canonical text leaves. Block edits
//! work on child-index paths taken from the token map, which is always
//! rebuilt after a mutation.

use lectern_dom::{Attrs, Document, Mark, Node, Schema};

use crate::position::{LeafInfo, TokenMap};

/// One token of a textblock's inline content.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InlineAtom {
    Ch { ch: char, marks: Vec<Mark> },
    Node(Node),
}

/// Flatten a textblock's inline content to atoms.
pub(crate) fn explode(node: &Node) -> Vec<InlineAtom> {
    let mut out = Vec::new();
    for child in &node.children {
        if child.is_text() {
            for ch in child.text.chars() {
                out.push(InlineAtom::Ch { ch, marks: child.marks.clone() });
            }
        } else {
            out.push(InlineAtom::Node(child.clone()));
        }
    }
    out
}

/// Rebuild canonical inline children from atoms, merging equal-mark runs.
pub(crate) fn rebuild(atoms: Vec<InlineAtom>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::new();
    let mut run = String::new();
    let mut run_marks: Vec<Mark> = Vec::new();

    for atom in atoms {
        match atom {
            InlineAtom::Ch { ch, marks } => {
                if !run.is_empty() && marks != run_marks {
                    out.push(Node::text(run.as_str(), std::mem::take(&mut run_marks)));
                    run.clear();
                }
                if run.is_empty() {
                    run_marks = marks;
                }
                run.push(ch);
            }
            InlineAtom::Node(node) => {
                if !run.is_empty() {
                    out.push(Node::text(run.as_str(), std::mem::take(&mut run_marks)));
                    run.clear();
                }
                out.push(node);
            }
        }
    }
    if !run.is_empty() {
        out.push(Node::text(run.as_str(), run_marks));
    }
    out
}

fn parent_children_mut<'a>(
    doc: &'a mut Document,
    path: &[usize],
) -> Option<(&'a mut Vec<Node>, usize)> {
    let (&last, prefix) = path.split_last()?;
    if prefix.is_empty() {
        Some((&mut doc.children, last))
    } else {
        doc.node_at_mut(prefix).map(|node| (&mut node.children, last))
    }
}

/// Remove the node at a path.
pub(crate) fn remove_at(doc: &mut Document, path: &[usize]) {
    if let Some((children, idx)) = parent_children_mut(doc, path)
        && idx < children.len()
    {
        children.remove(idx);
    }
}

/// Insert a node so that it lands at the given path.
pub(crate) fn insert_at(doc: &mut Document, path: &[usize], node: Node) {
    if let Some((children, idx)) = parent_children_mut(doc, path) {
        let idx = idx.min(children.len());
        children.insert(idx, node);
    }
}

fn set_inline(doc: &mut Document, path: &[usize], atoms: Vec<InlineAtom>) {
    if let Some(node) = doc.node_at_mut(path) {
        node.children = rebuild(atoms);
    }
}

/// Delete a token range. Returns the caret position for the new document.
pub(crate) fn delete_range(
    doc: &mut Document,
    schema: &Schema,
    map: &TokenMap,
    start: usize,
    end: usize,
) -> usize {
    let covered = map.covered(start, end);
    if covered.is_empty() || start == end {
        return start;
    }

    let mut removals: Vec<Vec<usize>> = Vec::new();
    let mut trims: Vec<(Vec<usize>, Vec<InlineAtom>)> = Vec::new();

    let last_pos = covered.len() - 1;
    let first = covered[0];
    let last = covered[last_pos];
    let first_leaf = &map.leaves()[first.0];
    let last_leaf = &map.leaves()[last.0];

    // Whether the partially covered ends can merge into one textblock.
    let mergeable = last_pos > 0
        && !first_leaf.atomic
        && !last_leaf.atomic
        && first_leaf.path[..first_leaf.path.len() - 1] == last_leaf.path[..last_leaf.path.len() - 1];

    for (i, &(leaf_idx, ls, le)) in covered.iter().enumerate() {
        let leaf = &map.leaves()[leaf_idx];
        if leaf.atomic {
            if le > ls {
                removals.push(leaf.path.clone());
            }
            continue;
        }
        let Some(node) = doc.node_at(&leaf.path) else {
            continue;
        };
        let atoms = explode(node);
        let ls = ls.min(atoms.len());
        let le = le.min(atoms.len());

        if i == 0 {
            let mut kept: Vec<InlineAtom> = atoms[..ls].to_vec();
            if last_pos == 0 {
                // The range is inside this one leaf: keep its tail too.
                kept.extend_from_slice(&atoms[le..]);
            } else if mergeable {
                // Pull the tail of the last leaf into the first.
                if let Some(tail_node) = doc.node_at(&last_leaf.path) {
                    let tail = explode(tail_node);
                    kept.extend_from_slice(&tail[last.2.min(tail.len())..]);
                }
            }
            trims.push((leaf.path.clone(), kept));
        } else if i == last_pos {
            if mergeable {
                removals.push(leaf.path.clone());
            } else {
                trims.push((leaf.path.clone(), atoms[le..].to_vec()));
            }
        } else {
            removals.push(leaf.path.clone());
        }
    }

    for (path, atoms) in trims {
        set_inline(doc, &path, atoms);
    }
    // Remove deepest-last paths first so earlier siblings stay addressable.
    removals.sort();
    for path in removals.into_iter().rev() {
        remove_at(doc, &path);
    }

    normalize(doc, schema);
    start
}

/// Marks a typed character inherits at an insertion point.
fn marks_at_offset(atoms: &[InlineAtom], offset: usize) -> Vec<Mark> {
    let before = offset.checked_sub(1).and_then(|i| atoms.get(i));
    let at = atoms.get(offset);
    match (before, at) {
        (Some(InlineAtom::Ch { marks, .. }), _) => marks.clone(),
        (_, Some(InlineAtom::Ch { marks, .. })) => marks.clone(),
        _ => Vec::new(),
    }
}

/// Insert text at the caret. Returns the new caret position.
pub(crate) fn insert_text(
    doc: &mut Document,
    map: &TokenMap,
    caret: usize,
    text: &str,
) -> usize {
    let Some((leaf_idx, offset)) = map.leaf_at(caret) else {
        return caret;
    };
    let leaf = map.leaves()[leaf_idx].clone();
    let chars: Vec<char> = text.chars().collect();

    if leaf.atomic {
        // Typing next to an atomic block opens a fresh paragraph beside it.
        let after = offset > 0;
        let mut path = leaf.path.clone();
        if after && let Some(last) = path.last_mut() {
            *last += 1;
        }
        let para = Node::element(
            "paragraph",
            Attrs::new(),
            vec![Node::text(text, Vec::new())],
        );
        insert_at(doc, &path, para);
        return if after {
            leaf.end() + 1 + chars.len()
        } else {
            leaf.start + chars.len()
        };
    }

    let Some(node) = doc.node_at(&leaf.path) else {
        return caret;
    };
    let mut atoms = explode(node);
    let offset = offset.min(atoms.len());
    let marks = marks_at_offset(&atoms, offset);
    let inserted: Vec<InlineAtom> = chars
        .iter()
        .map(|&ch| InlineAtom::Ch { ch, marks: marks.clone() })
        .collect();
    atoms.splice(offset..offset, inserted);
    set_inline(doc, &leaf.path, atoms);
    caret + chars.len()
}

/// Insert an inline atomic node (a hard break) at the caret.
pub(crate) fn insert_inline_node(
    doc: &mut Document,
    map: &TokenMap,
    caret: usize,
    node: Node,
) -> usize {
    let Some((leaf_idx, offset)) = map.leaf_at(caret) else {
        return caret;
    };
    let leaf = map.leaves()[leaf_idx].clone();
    if leaf.atomic {
        return caret;
    }
    let Some(block) = doc.node_at(&leaf.path) else {
        return caret;
    };
    let mut atoms = explode(block);
    let offset = offset.min(atoms.len());
    atoms.insert(offset, InlineAtom::Node(node));
    set_inline(doc, &leaf.path, atoms);
    caret + 1
}

/// Split the textblock under the caret into two siblings.
/// Returns the caret position at the start of the second half.
pub(crate) fn split_block(doc: &mut Document, map: &TokenMap, caret: usize) -> usize {
    let Some((leaf_idx, offset)) = map.leaf_at(caret) else {
        return caret;
    };
    let leaf = map.leaves()[leaf_idx].clone();
    if leaf.atomic {
        return caret;
    }
    let Some(node) = doc.node_at_mut(&leaf.path) else {
        return caret;
    };
    let atoms = explode(node);
    let offset = offset.min(atoms.len());
    let kind = node.kind.clone();
    let attrs = node.attrs.clone();
    node.children = rebuild(atoms[..offset].to_vec());

    let tail = Node::element(kind, attrs, rebuild(atoms[offset..].to_vec()));
    let mut path = leaf.path;
    if let Some(last) = path.last_mut() {
        *last += 1;
    }
    insert_at(doc, &path, tail);
    caret + 1
}

/// Insert a block node at the caret, splitting the current textblock when
/// the caret is mid-content. Returns the path of the inserted node.
pub(crate) fn insert_block(
    doc: &mut Document,
    map: &TokenMap,
    caret: usize,
    node: Node,
) -> Vec<usize> {
    let Some((leaf_idx, offset)) = map.leaf_at(caret) else {
        let path = vec![doc.children.len()];
        doc.children.push(node);
        return path;
    };
    let leaf = map.leaves()[leaf_idx].clone();
    let mut path = leaf.path.clone();

    if leaf.atomic || offset == leaf.len {
        // After the current leaf when the caret is past its start, before
        // it otherwise. An empty paragraph stays behind the insertion so
        // there is still a place to type.
        if offset > 0 && let Some(last) = path.last_mut() {
            *last += 1;
        }
        insert_at(doc, &path, node);
        return path;
    }

    if offset == 0 {
        insert_at(doc, &path, node);
        return path;
    }

    // Mid-textblock: split, then slot the node between the halves.
    let Some(block) = doc.node_at_mut(&leaf.path) else {
        return path;
    };
    let atoms = explode(block);
    let offset = offset.min(atoms.len());
    let kind = block.kind.clone();
    let attrs = block.attrs.clone();
    block.children = rebuild(atoms[..offset].to_vec());
    let tail = Node::element(kind, attrs, rebuild(atoms[offset..].to_vec()));

    if let Some(last) = path.last_mut() {
        *last += 1;
    }
    insert_at(doc, &path, tail);
    insert_at(doc, &path, node);
    path
}

/// Add or remove a mark over a token range. Adding replaces any same-type
/// mark, so re-coloring and re-linking work without an explicit removal.
pub(crate) fn set_mark(
    doc: &mut Document,
    map: &TokenMap,
    start: usize,
    end: usize,
    mark: &Mark,
    add: bool,
) {
    for (leaf_idx, ls, le) in map.covered(start, end) {
        let leaf = &map.leaves()[leaf_idx];
        if leaf.atomic {
            continue;
        }
        let Some(node) = doc.node_at(&leaf.path) else {
            continue;
        };
        let mut atoms = explode(node);
        let ls = ls.min(atoms.len());
        let le = le.min(atoms.len());
        for atom in &mut atoms[ls..le] {
            if let InlineAtom::Ch { marks, .. } = atom {
                marks.retain(|m| !m.same_type(mark));
                if add {
                    marks.push(mark.clone());
                    lectern_dom::normalize_marks(marks);
                }
            }
        }
        set_inline(doc, &leaf.path, atoms);
    }
}

/// Whether every character in the range carries the mark (and there is at
/// least one character).
pub(crate) fn mark_uniform(
    doc: &Document,
    map: &TokenMap,
    start: usize,
    end: usize,
    mark: &Mark,
) -> bool {
    let mut found = false;
    for (leaf_idx, ls, le) in map.covered(start, end) {
        let leaf = &map.leaves()[leaf_idx];
        if leaf.atomic {
            continue;
        }
        let Some(node) = doc.node_at(&leaf.path) else {
            continue;
        };
        let atoms = explode(node);
        for atom in &atoms[ls.min(atoms.len())..le.min(atoms.len())] {
            if let InlineAtom::Ch { marks, .. } = atom {
                found = true;
                if !marks.iter().any(|m| m.same_type(mark)) {
                    return false;
                }
            }
        }
    }
    found
}

/// Whether the range contains at least one character of text.
pub(crate) fn range_has_text(doc: &Document, map: &TokenMap, start: usize, end: usize) -> bool {
    map.covered(start, end).into_iter().any(|(leaf_idx, ls, le)| {
        let leaf = &map.leaves()[leaf_idx];
        if leaf.atomic {
            return false;
        }
        let Some(node) = doc.node_at(&leaf.path) else {
            return false;
        };
        let atoms = explode(node);
        atoms[ls.min(atoms.len())..le.min(atoms.len())]
            .iter()
            .any(|atom| matches!(atom, InlineAtom::Ch { .. }))
    })
}

/// Marks in effect at a caret: those of the character before it, falling
/// back to the character after at a block start.
pub(crate) fn marks_at(doc: &Document, map: &TokenMap, caret: usize) -> Vec<Mark> {
    let Some((leaf_idx, offset)) = map.leaf_at(caret) else {
        return Vec::new();
    };
    let leaf = &map.leaves()[leaf_idx];
    if leaf.atomic {
        return Vec::new();
    }
    let Some(node) = doc.node_at(&leaf.path) else {
        return Vec::new();
    };
    marks_at_offset(&explode(node), offset)
}

/// Run a closure over every textblock covered by the range.
pub(crate) fn for_each_covered_textblock(
    doc: &mut Document,
    map: &TokenMap,
    start: usize,
    end: usize,
    mut f: impl FnMut(&mut Node),
) {
    for (leaf_idx, _, _) in map.covered(start, end) {
        let leaf = &map.leaves()[leaf_idx];
        if leaf.atomic {
            continue;
        }
        if let Some(node) = doc.node_at_mut(&leaf.path) {
            f(node);
        }
    }
}

/// Whether a leaf, or any of its ancestors, satisfies the predicate.
pub(crate) fn has_ancestor_or_self(
    doc: &Document,
    leaf: &LeafInfo,
    pred: impl Fn(&Node) -> bool,
) -> bool {
    (1..=leaf.path.len()).any(|depth| doc.node_at(&leaf.path[..depth]).is_some_and(&pred))
}

/// The inclusive top-level block range covered by a selection.
pub(crate) fn top_level_range(map: &TokenMap, start: usize, end: usize) -> Option<(usize, usize)> {
    let covered = map.covered(start, end);
    let first = map.leaves()[covered.first()?.0].path[0];
    let last = map.leaves()[covered.last()?.0].path[0];
    Some((first, last))
}

/// Wrap the covered top-level blocks in a list of the given kind.
pub(crate) fn wrap_in_list(doc: &mut Document, map: &TokenMap, start: usize, end: usize, kind: &str) {
    let Some((a, b)) = top_level_range(map, start, end) else {
        return;
    };
    if doc.children.is_empty() {
        return;
    }
    let blocks: Vec<Node> = doc.children.drain(a..=b.min(doc.children.len() - 1)).collect();
    let items = blocks
        .into_iter()
        .map(|block| Node::element("list_item", Attrs::new(), vec![block]))
        .collect();
    doc.children.insert(a, Node::element(kind, Attrs::new(), items));
}

/// Flatten any covered top-level lists back into their item blocks.
pub(crate) fn unwrap_lists(doc: &mut Document, map: &TokenMap, start: usize, end: usize) {
    let Some((a, b)) = top_level_range(map, start, end) else {
        return;
    };
    if doc.children.is_empty() {
        return;
    }
    for idx in (a..=b.min(doc.children.len() - 1)).rev() {
        if matches!(doc.children[idx].kind.as_str(), "bullet_list" | "ordered_list") {
            let list = doc.children.remove(idx);
            let blocks = list.children.into_iter().flat_map(|item| item.children);
            doc.children.splice(idx..idx, blocks);
        }
    }
}

/// Wrap the covered top-level blocks in a blockquote.
pub(crate) fn wrap_in_blockquote(doc: &mut Document, map: &TokenMap, start: usize, end: usize) {
    let Some((a, b)) = top_level_range(map, start, end) else {
        return;
    };
    if doc.children.is_empty() {
        return;
    }
    let blocks: Vec<Node> = doc.children.drain(a..=b.min(doc.children.len() - 1)).collect();
    doc.children
        .insert(a, Node::element("blockquote", Attrs::new(), blocks));
}

/// Splice any covered top-level blockquotes back into their content.
pub(crate) fn unwrap_blockquotes(doc: &mut Document, map: &TokenMap, start: usize, end: usize) {
    let Some((a, b)) = top_level_range(map, start, end) else {
        return;
    };
    if doc.children.is_empty() {
        return;
    }
    for idx in (a..=b.min(doc.children.len() - 1)).rev() {
        if doc.children[idx].kind == "blockquote" {
            let quote = doc.children.remove(idx);
            doc.children.splice(idx..idx, quote.children);
        }
    }
}

/// Restore structural invariants after a mutation: canonical text runs,
/// no childless containers, and a non-empty document.
pub(crate) fn normalize(doc: &mut Document, schema: &Schema) {
    let children = std::mem::take(&mut doc.children);
    doc.children = normalize_blocks(children, schema);
    if doc.children.is_empty() {
        doc.children
            .push(Node::element("paragraph", Attrs::new(), Vec::new()));
    }
}

fn normalize_blocks(nodes: Vec<Node>, schema: &Schema) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| normalize_node(node, schema))
        .collect()
}

fn normalize_node(mut node: Node, schema: &Schema) -> Option<Node> {
    if node.is_text() {
        return (!node.text.is_empty()).then_some(node);
    }

    if schema.is_textblock(&node.kind) {
        node.children = rebuild(explode(&node));
        return Some(node);
    }

    if schema
        .spec(&node.kind)
        .is_some_and(|spec| spec.atomic)
    {
        node.children.clear();
        return Some(node);
    }

    node.children = normalize_blocks(node.children, schema);
    match node.kind.as_str() {
        // Structural containers die when emptied...
        "list_item" | "bullet_list" | "ordered_list" | "blockquote" | "table" | "table_row" => {
            (!node.children.is_empty()).then_some(node)
        }
        // ...except cells, which keep the table's shape with an empty
        // paragraph.
        "table_cell" => {
            if node.children.is_empty() {
                node.children
                    .push(Node::element("paragraph", Attrs::new(), Vec::new()));
            }
            Some(node)
        }
        _ => Some(node),
    }
}
