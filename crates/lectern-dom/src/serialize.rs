//! Canonical HTML emission.
//!
//! The writer walks the tree and dispatches each node through its schema
//! render rule, escaping on write. Output is canonical: attribute order is
//! fixed, marks nest in rank order, and default values are never emitted, so
//! serializing structurally equal documents yields identical strings.

use std::fmt;

use pulldown_cmark_escape::{FmtWriter, StrWrite, escape_href, escape_html, escape_html_body_text};
use tracing::warn;

use crate::media::{self, MediaStrategy};
use crate::node::{Document, Mark, Node};
use crate::schema::Schema;

/// Serialize a document to its canonical HTML string.
pub fn serialize(doc: &Document, schema: &Schema) -> String {
    let mut out = String::new();
    let mut writer = HtmlWriter::new(&mut out, schema);
    // Writing into a String cannot fail; the Result is an artifact of the
    // StrWrite plumbing.
    let _ = writer.document(doc);
    out
}

/// Streaming HTML writer over a string sink.
pub struct HtmlWriter<'a> {
    writer: FmtWriter<&'a mut String>,
    schema: &'a Schema,
}

impl<'a> HtmlWriter<'a> {
    pub fn new(out: &'a mut String, schema: &'a Schema) -> Self {
        Self { writer: FmtWriter(out), schema }
    }

    pub fn document(&mut self, doc: &Document) -> fmt::Result {
        for child in &doc.children {
            self.node(child)?;
        }
        Ok(())
    }

    /// Render one node through its registered render rule.
    ///
    /// Unregistered kinds degrade to their content: authored trees must
    /// always serialize to something renderable.
    pub fn node(&mut self, node: &Node) -> fmt::Result {
        if node.is_text() {
            return self.marked_text(node);
        }
        let render = self.schema.spec(&node.kind).map(|spec| spec.render);
        match render {
            Some(render) => render(node, self),
            None => {
                warn!(kind = %node.kind, "no render rule, emitting content only");
                self.inline_children(node)
            }
        }
    }

    /// Render inline content: text runs wrapped in their mark tags plus any
    /// inline nodes.
    pub fn inline_children(&mut self, node: &Node) -> fmt::Result {
        for child in &node.children {
            self.node(child)?;
        }
        Ok(())
    }

    /// Render the children of a block container.
    pub fn block_children(&mut self, node: &Node) -> fmt::Result {
        self.inline_children(node)
    }

    pub fn raw(&mut self, s: &str) -> fmt::Result {
        self.writer.write_str(s)
    }

    pub fn text(&mut self, s: &str) -> fmt::Result {
        escape_html_body_text(&mut self.writer, s)
    }

    /// Write one `name="value"` pair with a leading space.
    pub fn attr(&mut self, name: &str, value: &str) -> fmt::Result {
        self.raw(" ")?;
        self.raw(name)?;
        self.raw("=\"")?;
        escape_html(&mut self.writer, value)?;
        self.raw("\"")
    }

    /// Write one `name="url"` pair with href escaping.
    pub fn href_attr(&mut self, name: &str, value: &str) -> fmt::Result {
        self.raw(" ")?;
        self.raw(name)?;
        self.raw("=\"")?;
        escape_href(&mut self.writer, value)?;
        self.raw("\"")
    }

    fn marked_text(&mut self, node: &Node) -> fmt::Result {
        for mark in &node.marks {
            self.open_mark(mark)?;
        }
        self.text(&node.text)?;
        for mark in node.marks.iter().rev() {
            self.close_mark(mark)?;
        }
        Ok(())
    }

    fn open_mark(&mut self, mark: &Mark) -> fmt::Result {
        match mark {
            Mark::Link { href } => {
                self.raw("<a")?;
                self.attr("href", href)?;
                self.raw(">")
            }
            Mark::Bold => self.raw("<strong>"),
            Mark::Italic => self.raw("<em>"),
            Mark::Underline => self.raw("<u>"),
            Mark::Strike => self.raw("<s>"),
            Mark::Highlight => self.raw("<mark>"),
            Mark::TextColor { color } => {
                self.raw("<span style=\"color: ")?;
                escape_html(&mut self.writer, color)?;
                self.raw("\">")
            }
            Mark::Code => self.raw("<code>"),
        }
    }

    fn close_mark(&mut self, mark: &Mark) -> fmt::Result {
        match mark {
            Mark::Link { .. } => self.raw("</a>"),
            Mark::Bold => self.raw("</strong>"),
            Mark::Italic => self.raw("</em>"),
            Mark::Underline => self.raw("</u>"),
            Mark::Strike => self.raw("</s>"),
            Mark::Highlight => self.raw("</mark>"),
            Mark::TextColor { .. } => self.raw("</span>"),
            Mark::Code => self.raw("</code>"),
        }
    }

    /// Write the opening of a textblock tag, including alignment style.
    fn open_textblock(&mut self, tag: &str, node: &Node) -> fmt::Result {
        self.raw("<")?;
        self.raw(tag)?;
        if let Some(align) = node.attr("align") {
            self.raw(" style=\"text-align: ")?;
            escape_html(&mut self.writer, align)?;
            self.raw("\"")?;
        }
        self.raw(">")
    }
}

pub(crate) fn render_paragraph(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    w.open_textblock("p", node)?;
    w.inline_children(node)?;
    w.raw("</p>\n")
}

pub(crate) fn render_heading(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    let level = node
        .attr("level")
        .and_then(|l| l.parse::<u8>().ok())
        .unwrap_or(1)
        .clamp(1, 6);
    let tag = format!("h{level}");
    w.open_textblock(&tag, node)?;
    w.inline_children(node)?;
    w.raw("</")?;
    w.raw(&tag)?;
    w.raw(">\n")
}

pub(crate) fn render_blockquote(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    w.raw("<blockquote>\n")?;
    w.block_children(node)?;
    w.raw("</blockquote>\n")
}

pub(crate) fn render_bullet_list(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    w.raw("<ul>\n")?;
    w.block_children(node)?;
    w.raw("</ul>\n")
}

pub(crate) fn render_ordered_list(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    w.raw("<ol>\n")?;
    w.block_children(node)?;
    w.raw("</ol>\n")
}

pub(crate) fn render_list_item(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    w.raw("<li>\n")?;
    w.block_children(node)?;
    w.raw("</li>\n")
}

pub(crate) fn render_table(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    w.raw("<table style=\"border-collapse: collapse; width: 100%\">\n")?;
    w.block_children(node)?;
    w.raw("</table>\n")
}

pub(crate) fn render_table_row(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    w.raw("<tr>\n")?;
    w.block_children(node)?;
    w.raw("</tr>\n")
}

pub(crate) fn render_table_cell(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    let tag = if node.attr("header") == Some("true") { "th" } else { "td" };
    w.raw("<")?;
    w.raw(tag)?;
    w.raw(" style=\"border: 1px solid #ccc; padding: 6px\">\n")?;
    w.block_children(node)?;
    w.raw("</")?;
    w.raw(tag)?;
    w.raw(">\n")
}

pub(crate) fn render_horizontal_rule(_node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    w.raw("<hr />\n")
}

pub(crate) fn render_image(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    w.raw("<img")?;
    for name in ["src", "alt", "width", "height"] {
        if let Some(value) = node.attr(name) {
            w.attr(name, value)?;
        }
    }
    w.raw(" />\n")
}

pub(crate) fn render_media(node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    let src = node.attr("src").unwrap_or("");
    match media::cached_strategy(&node.attrs) {
        MediaStrategy::ProviderEmbed { provider, video_id } => {
            w.raw("<div class=\"video-wrapper\"")?;
            w.attr("data-src", src)?;
            w.attr("data-width", node.attr("width").unwrap_or("100%"))?;
            w.attr("data-height", node.attr("height").unwrap_or("auto"))?;
            w.raw("><iframe")?;
            w.href_attr("src", &provider.embed_url(&video_id))?;
            w.raw(" frameborder=\"0\" allowfullscreen></iframe></div>\n")
        }
        MediaStrategy::NativePlayer => {
            w.raw("<video")?;
            w.attr("src", src)?;
            if node.attr("controls") != Some("false") {
                w.raw(" controls")?;
            }
            w.attr("width", node.attr("width").unwrap_or("100%"))?;
            w.attr("height", node.attr("height").unwrap_or("auto"))?;
            w.raw("></video>\n")
        }
    }
}

pub(crate) fn render_hard_break(_node: &Node, w: &mut HtmlWriter<'_>) -> fmt::Result {
    w.raw("<br />")
}
