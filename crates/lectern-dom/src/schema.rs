//! The open node-type registry.
//!
//! A [`Schema`] maps type names to [`NodeSpec`]s: what a node may contain,
//! which source markup parses into it, and how it renders back out. Custom
//! atomic types (the media embed is one) register a spec like any built-in,
//! so the tree algorithms never special-case them.

use std::collections::HashMap;
use std::fmt;

use smol_str::SmolStr;

use crate::media;
use crate::node::Node;
use crate::serialize::{self, HtmlWriter};
use crate::Attrs;

/// What a node type's children must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRule {
    /// Block nodes (paragraphs, headings, lists, tables, ...).
    Blocks,
    /// Inline content: text leaves and inline atomics.
    Inline,
    /// List items only.
    Items,
    /// Table rows only.
    Rows,
    /// Table cells only.
    Cells,
    /// No children at all (atomic leaves).
    None,
}

/// Whether a node participates in block or inline content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeGroup {
    Block,
    Inline,
}

/// Which source markup maps to a node type.
#[derive(Debug, Clone)]
pub struct ParseRule {
    /// Lowercase tag name to match.
    pub tag: SmolStr,
    /// If set, the element must also carry this class.
    pub class: Option<SmolStr>,
}

impl ParseRule {
    pub fn tag(tag: &str) -> Self {
        Self { tag: tag.into(), class: None }
    }

    pub fn tag_class(tag: &str, class: &str) -> Self {
        Self { tag: tag.into(), class: Some(class.into()) }
    }

    fn matches(&self, tag: &str, classes: &[&str]) -> bool {
        if self.tag != tag {
            return false;
        }
        match &self.class {
            Some(class) => classes.iter().any(|c| *c == class.as_str()),
            None => true,
        }
    }
}

/// Extract node attributes from a matched element.
///
/// Receives the lowercase tag name and the element's attributes as
/// `(name, value)` pairs.
pub type AttrParseFn = fn(tag: &str, attrs: &[(SmolStr, SmolStr)]) -> Attrs;

/// Render a node of this type into the writer.
pub type RenderFn = fn(&Node, &mut HtmlWriter<'_>) -> fmt::Result;

/// Everything the kernel knows about one node type.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: SmolStr,
    pub group: NodeGroup,
    /// Atomic nodes have no children and occupy a single selection token.
    pub atomic: bool,
    pub content: ContentRule,
    pub parse_rules: Vec<ParseRule>,
    pub parse_attrs: Option<AttrParseFn>,
    pub render: RenderFn,
}

/// The node-type registry.
///
/// `Schema::default()` registers every built-in type, including the media
/// embed. [`Schema::register`] adds or replaces a type; later registrations
/// win rule matching over earlier ones.
#[derive(Debug, Clone)]
pub struct Schema {
    specs: Vec<NodeSpec>,
    by_name: HashMap<SmolStr, usize>,
}

impl Schema {
    /// An empty registry. Most callers want [`Schema::default`].
    pub fn new() -> Self {
        Self { specs: Vec::new(), by_name: HashMap::new() }
    }

    /// Register a node type, replacing any previous spec with the same name.
    pub fn register(&mut self, spec: NodeSpec) {
        if let Some(&idx) = self.by_name.get(&spec.name) {
            self.specs[idx] = spec;
        } else {
            self.by_name.insert(spec.name.clone(), self.specs.len());
            self.specs.push(spec);
        }
    }

    /// Look up a spec by type name.
    pub fn spec(&self, name: &str) -> Option<&NodeSpec> {
        self.by_name.get(name).map(|&idx| &self.specs[idx])
    }

    /// Find the spec whose parse rule matches an element.
    ///
    /// Later registrations take priority, and within a spec a classed rule
    /// is checked like any other, so `div.video-wrapper` can coexist with
    /// unrelated `div` handling.
    pub fn match_element(&self, tag: &str, classes: &[&str]) -> Option<&NodeSpec> {
        self.specs
            .iter()
            .rev()
            .find(|spec| spec.parse_rules.iter().any(|rule| rule.matches(tag, classes)))
    }

    /// Whether `child` may appear under a node of type `parent`.
    pub fn allows(&self, parent: &str, child: &Node) -> bool {
        let Some(spec) = self.spec(parent) else {
            return false;
        };
        self.rule_allows(spec.content, child)
    }

    /// Whether `child` may appear at the top level of a document.
    pub fn allows_top_level(&self, child: &Node) -> bool {
        self.rule_allows(ContentRule::Blocks, child)
    }

    fn rule_allows(&self, rule: ContentRule, child: &Node) -> bool {
        match rule {
            ContentRule::Blocks => self
                .spec(&child.kind)
                .is_some_and(|s| s.group == NodeGroup::Block),
            ContentRule::Inline => {
                child.is_text()
                    || self
                        .spec(&child.kind)
                        .is_some_and(|s| s.group == NodeGroup::Inline)
            }
            ContentRule::Items => child.kind == "list_item",
            ContentRule::Rows => child.kind == "table_row",
            ContentRule::Cells => child.kind == "table_cell",
            ContentRule::None => false,
        }
    }

    /// Whether a node of this type holds inline content (a textblock).
    pub fn is_textblock(&self, kind: &str) -> bool {
        self.spec(kind)
            .is_some_and(|s| s.content == ContentRule::Inline && !s.atomic)
    }

    /// Whether a node of this type is an atomic block.
    pub fn is_atomic_block(&self, kind: &str) -> bool {
        self.spec(kind)
            .is_some_and(|s| s.atomic && s.group == NodeGroup::Block)
    }

    /// Recursively check that a subtree conforms to the content rules.
    pub fn conforms(&self, node: &Node) -> bool {
        if node.is_text() {
            return node.children.is_empty();
        }
        let Some(spec) = self.spec(&node.kind) else {
            return false;
        };
        if spec.atomic && !node.children.is_empty() {
            return false;
        }
        node.children
            .iter()
            .all(|child| self.rule_allows(spec.content, child) && self.conforms(child))
    }
}

impl Default for Schema {
    fn default() -> Self {
        let mut schema = Self::new();

        schema.register(NodeSpec {
            name: "paragraph".into(),
            group: NodeGroup::Block,
            atomic: false,
            content: ContentRule::Inline,
            parse_rules: vec![ParseRule::tag("p")],
            parse_attrs: Some(parse_align_attrs),
            render: serialize::render_paragraph,
        });

        schema.register(NodeSpec {
            name: "heading".into(),
            group: NodeGroup::Block,
            atomic: false,
            content: ContentRule::Inline,
            parse_rules: (1..=6)
                .map(|level| ParseRule::tag(&format!("h{level}")))
                .collect(),
            parse_attrs: Some(parse_heading_attrs),
            render: serialize::render_heading,
        });

        schema.register(NodeSpec {
            name: "blockquote".into(),
            group: NodeGroup::Block,
            atomic: false,
            content: ContentRule::Blocks,
            parse_rules: vec![ParseRule::tag("blockquote")],
            parse_attrs: None,
            render: serialize::render_blockquote,
        });

        schema.register(NodeSpec {
            name: "bullet_list".into(),
            group: NodeGroup::Block,
            atomic: false,
            content: ContentRule::Items,
            parse_rules: vec![ParseRule::tag("ul")],
            parse_attrs: None,
            render: serialize::render_bullet_list,
        });

        schema.register(NodeSpec {
            name: "ordered_list".into(),
            group: NodeGroup::Block,
            atomic: false,
            content: ContentRule::Items,
            parse_rules: vec![ParseRule::tag("ol")],
            parse_attrs: None,
            render: serialize::render_ordered_list,
        });

        schema.register(NodeSpec {
            name: "list_item".into(),
            group: NodeGroup::Block,
            atomic: false,
            content: ContentRule::Blocks,
            parse_rules: vec![ParseRule::tag("li")],
            parse_attrs: None,
            render: serialize::render_list_item,
        });

        schema.register(NodeSpec {
            name: "table".into(),
            group: NodeGroup::Block,
            atomic: false,
            content: ContentRule::Rows,
            parse_rules: vec![ParseRule::tag("table")],
            parse_attrs: None,
            render: serialize::render_table,
        });

        schema.register(NodeSpec {
            name: "table_row".into(),
            group: NodeGroup::Block,
            atomic: false,
            content: ContentRule::Cells,
            parse_rules: vec![ParseRule::tag("tr")],
            parse_attrs: None,
            render: serialize::render_table_row,
        });

        schema.register(NodeSpec {
            name: "table_cell".into(),
            group: NodeGroup::Block,
            atomic: false,
            content: ContentRule::Blocks,
            parse_rules: vec![ParseRule::tag("td"), ParseRule::tag("th")],
            parse_attrs: Some(parse_cell_attrs),
            render: serialize::render_table_cell,
        });

        schema.register(NodeSpec {
            name: "horizontal_rule".into(),
            group: NodeGroup::Block,
            atomic: true,
            content: ContentRule::None,
            parse_rules: vec![ParseRule::tag("hr")],
            parse_attrs: None,
            render: serialize::render_horizontal_rule,
        });

        schema.register(NodeSpec {
            name: "image".into(),
            group: NodeGroup::Block,
            atomic: true,
            content: ContentRule::None,
            parse_rules: vec![ParseRule::tag("img")],
            parse_attrs: Some(parse_image_attrs),
            render: serialize::render_image,
        });

        schema.register(NodeSpec {
            name: "media".into(),
            group: NodeGroup::Block,
            atomic: true,
            content: ContentRule::None,
            parse_rules: vec![
                ParseRule::tag_class("div", "video-wrapper"),
                ParseRule::tag("video"),
            ],
            parse_attrs: Some(media::parse_media_attrs),
            render: serialize::render_media,
        });

        schema.register(NodeSpec {
            name: "hard_break".into(),
            group: NodeGroup::Inline,
            atomic: true,
            content: ContentRule::None,
            parse_rules: vec![ParseRule::tag("br")],
            parse_attrs: None,
            render: serialize::render_hard_break,
        });

        schema
    }
}

/// Pull one property value out of an inline `style` attribute.
pub(crate) fn style_value<'a>(style: &'a str, property: &str) -> Option<&'a str> {
    style.split(';').find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        if name.trim().eq_ignore_ascii_case(property) {
            Some(value.trim())
        } else {
            None
        }
    })
}

fn html_attr<'a>(attrs: &'a [(SmolStr, SmolStr)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Alignment parsing shared by every textblock type.
///
/// `left` is the canonical default and never stored.
fn parse_align_attrs(_tag: &str, attrs: &[(SmolStr, SmolStr)]) -> Attrs {
    let mut out = Attrs::new();
    if let Some(style) = html_attr(attrs, "style")
        && let Some(align) = style_value(style, "text-align")
    {
        let align = align.to_ascii_lowercase();
        if matches!(align.as_str(), "center" | "right" | "justify") {
            out.insert("align".into(), align.into());
        }
    }
    out
}

fn parse_heading_attrs(tag: &str, attrs: &[(SmolStr, SmolStr)]) -> Attrs {
    let mut out = parse_align_attrs(tag, attrs);
    let level = tag.strip_prefix('h').unwrap_or("1");
    out.insert("level".into(), level.into());
    out
}

fn parse_cell_attrs(tag: &str, _attrs: &[(SmolStr, SmolStr)]) -> Attrs {
    let mut out = Attrs::new();
    if tag == "th" {
        out.insert("header".into(), "true".into());
    }
    out
}

fn parse_image_attrs(_tag: &str, attrs: &[(SmolStr, SmolStr)]) -> Attrs {
    let mut out = Attrs::new();
    for name in ["src", "alt", "width", "height"] {
        if let Some(value) = html_attr(attrs, name)
            && !value.is_empty()
        {
            out.insert(name.into(), value.into());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_has_builtins() {
        let schema = Schema::default();
        for kind in [
            "paragraph",
            "heading",
            "blockquote",
            "bullet_list",
            "ordered_list",
            "list_item",
            "table",
            "table_row",
            "table_cell",
            "horizontal_rule",
            "image",
            "media",
            "hard_break",
        ] {
            assert!(schema.spec(kind).is_some(), "missing spec for {kind}");
        }
    }

    #[test]
    fn test_match_element_prefers_classed_rule() {
        let schema = Schema::default();
        let spec = schema.match_element("div", &["video-wrapper"]).unwrap();
        assert_eq!(spec.name, "media");
        assert!(schema.match_element("div", &["card"]).is_none());
    }

    #[test]
    fn test_content_rules() {
        let schema = Schema::default();
        let item = Node::element("list_item", Attrs::new(), Vec::new());
        let para = Node::element("paragraph", Attrs::new(), Vec::new());

        assert!(schema.allows("bullet_list", &item));
        assert!(!schema.allows("bullet_list", &para));
        assert!(schema.allows("list_item", &para));
        assert!(schema.allows_top_level(&para));
        assert!(!schema.allows_top_level(&Node::text("x", Vec::new())));
    }

    #[test]
    fn test_conforms_rejects_atomic_children() {
        let schema = Schema::default();
        let mut rule = Node::atomic("horizontal_rule", Attrs::new());
        assert!(schema.conforms(&rule));
        rule.children.push(Node::text("x", Vec::new()));
        assert!(!schema.conforms(&rule));
    }

    #[test]
    fn test_style_value() {
        assert_eq!(style_value("text-align: center; color: red", "text-align"), Some("center"));
        assert_eq!(style_value("color:red", "text-align"), None);
        assert_eq!(style_value("TEXT-ALIGN : right ;", "text-align"), Some("right"));
    }

    #[test]
    fn test_heading_attrs_from_tag() {
        let attrs = parse_heading_attrs("h3", &[]);
        assert_eq!(attrs.get("level").map(SmolStr::as_str), Some("3"));
    }
}
