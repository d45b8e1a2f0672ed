//! Document tree types: nodes, marks, and attribute maps.
//!
//! A document is an ordered tree of `Node`s rooted at a flat block list.
//! Container nodes hold children, atomic nodes hold none, and text leaves
//! carry a run of characters plus the marks that annotate it.

use std::collections::BTreeMap;

use smol_str::SmolStr;

/// Attribute map for a node.
///
/// Ordered so that serialization has exactly one canonical form.
pub type Attrs = BTreeMap<SmolStr, SmolStr>;

/// A non-nesting inline annotation over a run of text.
///
/// Marks are idempotent (applying one that is already present is a no-op)
/// and mutually independent. They are stored sorted by [`Mark::rank`] so two
/// structurally equal documents compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    Link { href: SmolStr },
    Bold,
    Italic,
    Underline,
    Strike,
    Highlight,
    TextColor { color: SmolStr },
    Code,
}

impl Mark {
    /// Fixed nesting order: lower ranks wrap higher ranks in markup.
    pub fn rank(&self) -> u8 {
        match self {
            Mark::Link { .. } => 0,
            Mark::Bold => 1,
            Mark::Italic => 2,
            Mark::Underline => 3,
            Mark::Strike => 4,
            Mark::Highlight => 5,
            Mark::TextColor { .. } => 6,
            Mark::Code => 7,
        }
    }

    /// Whether two marks are the same kind of annotation, ignoring payload.
    ///
    /// Toolbar highlighting treats any link as "link active" regardless of
    /// its target, so type identity and value identity are distinct checks.
    pub fn same_type(&self, other: &Mark) -> bool {
        self.rank() == other.rank()
    }
}

/// Sort marks into canonical order, dropping same-type duplicates.
pub fn normalize_marks(marks: &mut Vec<Mark>) {
    marks.sort_by_key(Mark::rank);
    marks.dedup_by(|a, b| a.same_type(b));
}

/// A typed element of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Type name from the schema registry (`"paragraph"`, `"image"`, ...).
    /// Text leaves use [`Node::TEXT`].
    pub kind: SmolStr,
    /// Type-specific attributes.
    pub attrs: Attrs,
    /// Marks on this node. Only meaningful for inline content.
    pub marks: Vec<Mark>,
    /// Characters of a text leaf; empty for every other kind.
    pub text: SmolStr,
    /// Child nodes; empty for atomic and text nodes.
    pub children: Vec<Node>,
}

impl Node {
    /// Type name reserved for text leaves.
    pub const TEXT: &'static str = "text";

    /// Create a container node.
    pub fn element(kind: impl Into<SmolStr>, attrs: Attrs, children: Vec<Node>) -> Self {
        Self {
            kind: kind.into(),
            attrs,
            marks: Vec::new(),
            text: SmolStr::default(),
            children,
        }
    }

    /// Create an atomic (childless) node.
    pub fn atomic(kind: impl Into<SmolStr>, attrs: Attrs) -> Self {
        Self::element(kind, attrs, Vec::new())
    }

    /// Create a text leaf with canonicalized marks.
    pub fn text(text: impl Into<SmolStr>, mut marks: Vec<Mark>) -> Self {
        normalize_marks(&mut marks);
        Self {
            kind: SmolStr::new_static(Self::TEXT),
            attrs: Attrs::new(),
            marks,
            text: text.into(),
            children: Vec::new(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == Self::TEXT
    }

    /// Look up an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(SmolStr::as_str)
    }

    /// Set an attribute, replacing any previous value.
    pub fn set_attr(&mut self, name: impl Into<SmolStr>, value: impl Into<SmolStr>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Whether this node carries the given mark (by type).
    pub fn has_mark(&self, mark: &Mark) -> bool {
        self.marks.iter().any(|m| m.same_type(mark))
    }

    /// Concatenated text content of this subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if self.is_text() {
            out.push_str(&self.text);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}

/// An ordered tree of nodes: the unit the editor mutates and serializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Top-level block nodes, in order.
    pub children: Vec<Node>,
}

impl Document {
    /// An empty document: a single empty paragraph.
    pub fn empty() -> Self {
        Self {
            children: vec![Node::element("paragraph", Attrs::new(), Vec::new())],
        }
    }

    /// Build a document from a block list, substituting the empty document
    /// when the list is empty so the tree is always editable.
    pub fn from_blocks(children: Vec<Node>) -> Self {
        if children.is_empty() {
            Self::empty()
        } else {
            Self { children }
        }
    }

    /// Whether the document is a single empty paragraph.
    pub fn is_empty(&self) -> bool {
        matches!(self.children.as_slice(),
            [only] if only.kind == "paragraph" && only.children.is_empty())
    }

    /// Immutable node lookup by child-index path from the root.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.children.get(first)?;
        for &idx in rest {
            node = node.children.get(idx)?;
        }
        Some(node)
    }

    /// Mutable node lookup by child-index path from the root.
    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.children.get_mut(first)?;
        for &idx in rest {
            node = node.children.get_mut(idx)?;
        }
        Some(node)
    }

    /// Concatenated text content of the whole document.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_normalization() {
        let mut marks = vec![Mark::Code, Mark::Bold, Mark::Bold, Mark::Italic];
        normalize_marks(&mut marks);
        assert_eq!(marks, vec![Mark::Bold, Mark::Italic, Mark::Code]);
    }

    #[test]
    fn test_mark_same_type_ignores_payload() {
        let a = Mark::Link { href: "https://a.example".into() };
        let b = Mark::Link { href: "https://b.example".into() };
        assert!(a.same_type(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_text_node_sorts_marks() {
        let node = Node::text("hi", vec![Mark::Italic, Mark::Bold]);
        assert_eq!(node.marks, vec![Mark::Bold, Mark::Italic]);
    }

    #[test]
    fn test_node_at_path() {
        let doc = Document::from_blocks(vec![Node::element(
            "paragraph",
            Attrs::new(),
            vec![Node::text("hello", Vec::new())],
        )]);

        assert_eq!(doc.node_at(&[0]).unwrap().kind, "paragraph");
        assert_eq!(doc.node_at(&[0, 0]).unwrap().text, "hello");
        assert!(doc.node_at(&[1]).is_none());
        assert!(doc.node_at(&[0, 0, 0]).is_none());
    }

    #[test]
    fn test_empty_document_is_editable() {
        let doc = Document::from_blocks(Vec::new());
        assert!(doc.is_empty());
        assert_eq!(doc.children.len(), 1);
    }

    #[test]
    fn test_text_content() {
        let doc = Document::from_blocks(vec![
            Node::element(
                "paragraph",
                Attrs::new(),
                vec![Node::text("ab", Vec::new()), Node::text("cd", vec![Mark::Bold])],
            ),
            Node::atomic("horizontal_rule", Attrs::new()),
        ]);
        assert_eq!(doc.text_content(), "abcd");
    }
}
