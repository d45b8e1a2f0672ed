//! Lenient HTML ingestion.
//!
//! Markup is parsed with html5ever into a small arena DOM, then folded into a
//! [`Document`] through the schema's parse rules. The fold never fails:
//! unknown elements degrade to their content (a generic inline/block
//! fallback), so a load can lose styling but never the text under it.

use std::cell::RefCell;

use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, QualName, parse_document};
use smol_str::SmolStr;
use tracing::warn;

use crate::node::{Document, Mark, Node};
use crate::schema::{ContentRule, NodeGroup, Schema, style_value};
use crate::Attrs;

/// Parse an HTML string into a document.
///
/// Total: any input yields a renderable document. Unrecognized markup is
/// unwrapped to its content and logged, never surfaced as an error.
pub fn deserialize(html: &str, schema: &Schema) -> Document {
    let arena = parse_arena(html);
    let builder = DocBuilder { arena: &arena, schema };
    let blocks = match arena.find_tag("body") {
        Some(body) => builder.blocks(arena.children(body)),
        None => Vec::new(),
    };
    Document::from_blocks(blocks)
}

// === Arena DOM ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ArenaId(usize);

#[derive(Debug)]
enum ArenaData {
    Document,
    Element {
        /// Boxed so the allocation is stable while the sink hands out
        /// references during parsing.
        name: Box<QualName>,
        attrs: Vec<(SmolStr, SmolStr)>,
    },
    Text(String),
    Comment,
}

#[derive(Debug)]
struct ArenaNode {
    data: ArenaData,
    parent: Option<ArenaId>,
    children: Vec<ArenaId>,
}

/// Flat DOM arena produced by the html5ever sink.
#[derive(Debug)]
pub(crate) struct HtmlArena {
    nodes: Vec<ArenaNode>,
}

impl HtmlArena {
    fn new() -> Self {
        Self {
            nodes: vec![ArenaNode {
                data: ArenaData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    fn document(&self) -> ArenaId {
        ArenaId(0)
    }

    fn push(&mut self, data: ArenaData) -> ArenaId {
        let id = ArenaId(self.nodes.len());
        self.nodes.push(ArenaNode { data, parent: None, children: Vec::new() });
        id
    }

    fn append(&mut self, parent: ArenaId, child: ArenaId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn append_text(&mut self, parent: ArenaId, text: &str) {
        let last = self.nodes[parent.0].children.last().copied();
        if let Some(last) = last
            && let ArenaData::Text(existing) = &mut self.nodes[last.0].data
        {
            existing.push_str(text);
            return;
        }
        let id = self.push(ArenaData::Text(text.to_string()));
        self.append(parent, id);
    }

    fn insert_before(&mut self, sibling: ArenaId, new_node: ArenaId) {
        let Some(parent) = self.nodes[sibling.0].parent else {
            return;
        };
        self.detach(new_node);
        let idx = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == sibling)
            .unwrap_or(self.nodes[parent.0].children.len());
        self.nodes[parent.0].children.insert(idx, new_node);
        self.nodes[new_node.0].parent = Some(parent);
    }

    fn detach(&mut self, id: ArenaId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    fn children(&self, id: ArenaId) -> &[ArenaId] {
        &self.nodes[id.0].children
    }

    fn tag(&self, id: ArenaId) -> Option<&str> {
        match &self.nodes[id.0].data {
            ArenaData::Element { name, .. } => Some(&*name.local),
            _ => None,
        }
    }

    fn attrs(&self, id: ArenaId) -> &[(SmolStr, SmolStr)] {
        match &self.nodes[id.0].data {
            ArenaData::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    fn attr(&self, id: ArenaId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn classes(&self, id: ArenaId) -> Vec<&str> {
        self.attr(id, "class")
            .map(|c| c.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    fn text(&self, id: ArenaId) -> Option<&str> {
        match &self.nodes[id.0].data {
            ArenaData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Depth-first search for the first element with the given tag.
    fn find_tag(&self, tag: &str) -> Option<ArenaId> {
        let mut stack = vec![self.document()];
        while let Some(id) = stack.pop() {
            if self.tag(id) == Some(tag) {
                return Some(id);
            }
            for &child in self.nodes[id.0].children.iter().rev() {
                stack.push(child);
            }
        }
        None
    }
}

// === html5ever sink ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SinkHandle(ArenaId);

impl Default for SinkHandle {
    fn default() -> Self {
        SinkHandle(ArenaId(0))
    }
}

/// TreeSink implementation that builds an [`HtmlArena`].
///
/// Interior mutability because html5ever's TreeSink methods take `&self`.
struct ArenaSink {
    arena: RefCell<HtmlArena>,
    quirks_mode: RefCell<QuirksMode>,
}

impl ArenaSink {
    fn new() -> Self {
        Self {
            arena: RefCell::new(HtmlArena::new()),
            quirks_mode: RefCell::new(QuirksMode::NoQuirks),
        }
    }

    fn into_arena(self) -> HtmlArena {
        self.arena.into_inner()
    }
}

fn parse_arena(html: &str) -> HtmlArena {
    let sink = parse_document(ArenaSink::new(), html5ever::driver::ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes());
    sink.into_arena()
}

impl TreeSink for ArenaSink {
    type Handle = SinkHandle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, _msg: std::borrow::Cow<'static, str>) {
        // Lenient like a browser: recover and keep going.
    }

    fn get_document(&self) -> Self::Handle {
        SinkHandle(self.arena.borrow().document())
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static EMPTY: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };

        let arena = self.arena.borrow();
        match &arena.nodes[target.0.0].data {
            ArenaData::Element { name, .. } => {
                // SAFETY: the QualName is boxed, so its heap allocation is
                // stable across arena growth, and element names are never
                // mutated or freed while the sink is alive. The reference
                // cannot be tied to the RefCell guard, so the lifetime is
                // extended manually.
                unsafe { std::mem::transmute::<&QualName, &'a QualName>(&**name) }
            }
            _ => &EMPTY,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let converted: Vec<(SmolStr, SmolStr)> = attrs
            .into_iter()
            .map(|a| (SmolStr::new(&*a.name.local), SmolStr::new(&*a.value)))
            .collect();
        let id = self.arena.borrow_mut().push(ArenaData::Element {
            name: Box::new(name),
            attrs: converted,
        });
        SinkHandle(id)
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        SinkHandle(self.arena.borrow_mut().push(ArenaData::Comment))
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        SinkHandle(self.arena.borrow_mut().push(ArenaData::Comment))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => arena.append(parent.0, node.0),
            NodeOrText::AppendText(text) => arena.append_text(parent.0, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let parent = self.arena.borrow().nodes[element.0.0].parent;
        if parent.is_some() {
            let mut arena = self.arena.borrow_mut();
            match child {
                NodeOrText::AppendNode(node) => arena.insert_before(element.0, node.0),
                NodeOrText::AppendText(text) => {
                    let id = arena.push(ArenaData::Text(text.to_string()));
                    arena.insert_before(element.0, id);
                }
            }
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        // Doctypes carry nothing we fold into a document.
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x.0 == y.0
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        *self.quirks_mode.borrow_mut() = mode;
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => arena.insert_before(sibling.0, node.0),
            NodeOrText::AppendText(text) => {
                let id = arena.push(ArenaData::Text(text.to_string()));
                arena.insert_before(sibling.0, id);
            }
        }
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut arena = self.arena.borrow_mut();
        if let ArenaData::Element { attrs: existing, .. } = &mut arena.nodes[target.0.0].data {
            for attr in attrs {
                let local = SmolStr::new(&*attr.name.local);
                if !existing.iter().any(|(n, _)| *n == local) {
                    existing.push((local, SmolStr::new(&*attr.value)));
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.arena.borrow_mut().detach(target.0);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children: Vec<ArenaId> = self.arena.borrow().children(node.0).to_vec();
        let mut arena = self.arena.borrow_mut();
        for child in children {
            arena.append(new_parent.0, child);
        }
    }
}

// === Arena → Document fold ===

/// Inline HTML tags that dissolve into their content when unrecognized.
const TRANSPARENT_INLINE_TAGS: &[&str] = &[
    "span", "font", "abbr", "cite", "q", "small", "big", "sub", "sup", "time", "label", "ins",
];

struct DocBuilder<'a> {
    arena: &'a HtmlArena,
    schema: &'a Schema,
}

impl DocBuilder<'_> {
    /// Fold a block context: element children become blocks, loose inline
    /// content is gathered into implicit paragraphs.
    fn blocks(&self, ids: &[ArenaId]) -> Vec<Node> {
        let mut out = Vec::new();
        let mut pending: Vec<Node> = Vec::new();

        for &id in ids {
            if let Some(text) = self.arena.text(id) {
                if !text.trim().is_empty() {
                    pending.push(Node::text(text, Vec::new()));
                }
                continue;
            }
            let Some(tag) = self.arena.tag(id) else {
                continue;
            };

            if let Some(mark) = self.mark_for(id, tag) {
                self.inline(id, &[mark], &mut pending);
                continue;
            }

            let classes = self.arena.classes(id);
            match self.schema.match_element(tag, &classes) {
                Some(spec) if spec.group == NodeGroup::Inline => {
                    pending.push(Node::atomic(spec.name.clone(), Attrs::new()));
                }
                Some(spec) => {
                    self.flush_pending(&mut pending, &mut out);
                    out.extend(self.build_block(spec.name.clone(), id));
                }
                None => self.degrade(id, tag, &mut pending, &mut out),
            }
        }

        self.flush_pending(&mut pending, &mut out);
        out
    }

    /// Unknown markup: dissolve the wrapper, keep the content.
    fn degrade(&self, id: ArenaId, tag: &str, pending: &mut Vec<Node>, out: &mut Vec<Node>) {
        warn!(%tag, "unrecognized markup, degrading to content");
        if TRANSPARENT_INLINE_TAGS.contains(&tag) {
            self.inline(id, &[], pending);
        } else {
            self.flush_pending(pending, out);
            out.extend(self.blocks(self.arena.children(id)));
        }
    }

    fn flush_pending(&self, pending: &mut Vec<Node>, out: &mut Vec<Node>) {
        if pending.is_empty() {
            return;
        }
        let items = std::mem::take(pending);
        out.extend(self.finish_textblock("paragraph".into(), Attrs::new(), items));
    }

    /// Build a matched block node. Returns a list because textblocks split
    /// around block-level atomics found in legacy inline positions
    /// (`<p><img/></p>`).
    fn build_block(&self, kind: SmolStr, id: ArenaId) -> Vec<Node> {
        let tag = self.arena.tag(id).unwrap_or_default();
        let spec = match self.schema.spec(&kind) {
            Some(spec) => spec,
            None => return Vec::new(),
        };
        let attrs = spec
            .parse_attrs
            .map(|f| f(tag, self.arena.attrs(id)))
            .unwrap_or_default();

        match spec.content {
            ContentRule::Inline => {
                let mut items = Vec::new();
                self.inline(id, &[], &mut items);
                self.finish_textblock(kind, attrs, items)
            }
            ContentRule::Blocks => {
                vec![Node::element(kind, attrs, self.blocks(self.arena.children(id)))]
            }
            ContentRule::Items => {
                let mut items = Vec::new();
                for &child in self.arena.children(id) {
                    match self.arena.tag(child) {
                        Some("li") => items.extend(self.build_block("list_item".into(), child)),
                        Some(_) => {
                            // A non-item child of a list wraps into an item.
                            let inner = self.blocks(std::slice::from_ref(&child));
                            if !inner.is_empty() {
                                items.push(Node::element("list_item", Attrs::new(), inner));
                            }
                        }
                        None => {}
                    }
                }
                vec![Node::element(kind, attrs, items)]
            }
            ContentRule::Rows => {
                let mut rows = Vec::new();
                self.collect_rows(id, &mut rows);
                vec![Node::element(kind, attrs, rows)]
            }
            ContentRule::Cells => {
                let mut cells = Vec::new();
                for &child in self.arena.children(id) {
                    if matches!(self.arena.tag(child), Some("td") | Some("th")) {
                        cells.extend(self.build_block("table_cell".into(), child));
                    }
                }
                vec![Node::element(kind, attrs, cells)]
            }
            ContentRule::None => vec![Node::atomic(kind, attrs)],
        }
    }

    /// Collect `tr` rows, looking through `thead`/`tbody`/`tfoot` sections
    /// html5ever inserts.
    fn collect_rows(&self, id: ArenaId, rows: &mut Vec<Node>) {
        for &child in self.arena.children(id) {
            match self.arena.tag(child) {
                Some("tr") => rows.extend(self.build_block("table_row".into(), child)),
                Some("thead") | Some("tbody") | Some("tfoot") => self.collect_rows(child, rows),
                _ => {}
            }
        }
    }

    /// Fold an inline context, carrying the accumulated mark stack.
    fn inline(&self, id: ArenaId, marks: &[Mark], out: &mut Vec<Node>) {
        for &child in self.arena.children(id) {
            if let Some(text) = self.arena.text(child) {
                if !text.is_empty() {
                    out.push(Node::text(text, marks.to_vec()));
                }
                continue;
            }
            let Some(tag) = self.arena.tag(child) else {
                continue;
            };

            if let Some(mark) = self.mark_for(child, tag) {
                let mut extended = marks.to_vec();
                extended.push(mark);
                self.inline(child, &extended, out);
                continue;
            }

            let classes = self.arena.classes(child);
            match self.schema.match_element(tag, &classes) {
                Some(spec) if spec.group == NodeGroup::Inline => {
                    out.push(Node::atomic(spec.name.clone(), Attrs::new()));
                }
                Some(spec) => {
                    // Block content inside inline context: keep the node and
                    // let the caller split the textblock around it.
                    out.extend(self.build_block(spec.name.clone(), child));
                }
                None => {
                    warn!(%tag, "unrecognized inline markup, degrading to content");
                    self.inline(child, marks, out);
                }
            }
        }
    }

    /// Which mark, if any, an element contributes.
    fn mark_for(&self, id: ArenaId, tag: &str) -> Option<Mark> {
        match tag {
            "strong" | "b" => Some(Mark::Bold),
            "em" | "i" => Some(Mark::Italic),
            "u" => Some(Mark::Underline),
            "s" | "strike" | "del" => Some(Mark::Strike),
            "code" => Some(Mark::Code),
            "mark" => Some(Mark::Highlight),
            "a" => Some(Mark::Link {
                href: self.arena.attr(id, "href").unwrap_or_default().into(),
            }),
            "span" => {
                let style = self.arena.attr(id, "style")?;
                let color = style_value(style, "color")?;
                Some(Mark::TextColor { color: color.into() })
            }
            _ => None,
        }
    }

    /// Assemble a textblock from parsed inline items, splitting around any
    /// block-level nodes that ended up inside.
    fn finish_textblock(&self, kind: SmolStr, attrs: Attrs, items: Vec<Node>) -> Vec<Node> {
        let mut out = Vec::new();
        let mut run: Vec<Node> = Vec::new();
        let is_inline = |node: &Node| {
            node.is_text()
                || self
                    .schema
                    .spec(&node.kind)
                    .is_some_and(|s| s.group == NodeGroup::Inline)
        };

        for item in items {
            if is_inline(&item) {
                run.push(item);
            } else {
                if !run.is_empty() {
                    out.push(Node::element(kind.clone(), attrs.clone(), merge_text(std::mem::take(&mut run))));
                }
                out.push(item);
            }
        }

        if !run.is_empty() || out.is_empty() {
            out.push(Node::element(kind, attrs, merge_text(run)));
        }
        out
    }
}

/// Merge adjacent text leaves with identical marks into single runs.
fn merge_text(items: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::new();
    for item in items {
        if item.is_text()
            && let Some(last) = out.last_mut()
            && last.is_text()
            && last.marks == item.marks
        {
            let mut merged = last.text.to_string();
            merged.push_str(&item.text);
            last.text = merged.into();
            continue;
        }
        out.push(item);
    }
    out
}
