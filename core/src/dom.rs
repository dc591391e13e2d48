/// HTML fragment tree walking and serialization
///
/// Parses an HTML fragment with html5ever in `<body>` context (no head/body
/// relocation) and re-serializes it while a [`Rewriter`] gets a chance to
/// edit elements and text nodes on the way out.
use html5ever::tendril::TendrilSink;
use html5ever::{parse_fragment, LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Children are emitted as-is, never escaped.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes"];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

/// An element as seen by a [`Rewriter`]. Attribute edits are reflected in
/// the serialized start tag.
#[derive(Clone)]
pub struct Element {
    node: Handle,
    name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    fn from_node(node: &Handle) -> Option<Self> {
        let NodeData::Element { name, attrs, .. } = &node.data else {
            return None;
        };
        let attrs = attrs
            .borrow()
            .iter()
            .map(|attr| {
                let key = match &attr.name.prefix {
                    Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                    None => attr.name.local.to_string(),
                };
                (key, attr.value.to_string())
            })
            .collect();
        Some(Self {
            node: node.clone(),
            name: name.local.to_string(),
            attrs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is(&self, tag: &str) -> bool {
        self.name.eq_ignore_ascii_case(tag)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) {
        self.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let value = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{} {}", existing.trim(), class)
            }
            _ => class.to_string(),
        };
        self.set_attr("class", value);
    }

    /// Element children, in document order.
    pub fn child_elements(&self) -> Vec<Element> {
        self.node
            .children
            .borrow()
            .iter()
            .filter_map(Element::from_node)
            .collect()
    }

    /// Concatenated text of every descendant text node, unescaped.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.node, &mut out);
        out
    }

    pub fn start_tag(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + 2);
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push('>');
        out
    }

    pub fn end_tag(&self) -> String {
        if is_void(&self.name) {
            String::new()
        } else {
            format!("</{}>", self.name)
        }
    }

    /// This element's start tag, `inner` verbatim, and its end tag.
    pub fn wrap(&self, inner: &str) -> String {
        format!("{}{}{}", self.start_tag(), inner, self.end_tag())
    }
}

fn collect_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

/// What to do with an element after [`Rewriter::element`] has seen it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Emit the element and keep rewriting inside it.
    Descend,
    /// Emit the element and its subtree untouched.
    Verbatim,
    /// Emit this HTML instead of the element and its subtree.
    Replace(String),
}

pub trait Rewriter {
    fn element(&mut self, _element: &mut Element) -> Rewrite {
        Rewrite::Descend
    }

    /// Append `text` (unescaped) to `out` as HTML.
    fn text(&mut self, text: &str, out: &mut String) {
        out.push_str(&escape_text(text));
    }
}

struct Verbatim;

impl Rewriter for Verbatim {}

fn parse(html: &str) -> RcDom {
    let context = QualName::new(
        None,
        Namespace::from(HTML_NAMESPACE),
        LocalName::from("body"),
    );
    parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(html)
}

/// Top-level nodes of a parsed fragment. html5ever hangs them off a
/// synthetic `<html>` element.
fn fragment_nodes(dom: &RcDom) -> Vec<Handle> {
    let document_children = dom.document.children.borrow();
    let nodes = match document_children
        .iter()
        .find(|node| matches!(node.data, NodeData::Element { .. }))
    {
        Some(root) => root.children.borrow().clone(),
        None => document_children.clone(),
    };
    nodes
}

/// Parse `html` as a fragment and serialize it back through `rewriter`.
pub fn rewrite(html: &str, rewriter: &mut dyn Rewriter) -> String {
    let dom = parse(html);
    let mut out = String::with_capacity(html.len() + html.len() / 4);
    for node in fragment_nodes(&dom) {
        walk(&node, rewriter, false, &mut out);
    }
    out
}

/// Parse and re-serialize without changes.
pub fn normalize(html: &str) -> String {
    rewrite(html, &mut Verbatim)
}

fn walk(node: &Handle, rewriter: &mut dyn Rewriter, raw_text: bool, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => {
            let text = contents.borrow();
            if raw_text {
                out.push_str(&text);
            } else {
                rewriter.text(&text, out);
            }
        }
        NodeData::Comment { contents } => {
            out.push_str("<!--");
            out.push_str(contents);
            out.push_str("-->");
        }
        NodeData::Element { .. } => {
            let Some(mut element) = Element::from_node(node) else {
                return;
            };
            let rewrite = rewriter.element(&mut element);
            let children_raw = is_raw_text(&element.name);
            match rewrite {
                Rewrite::Replace(html) => out.push_str(&html),
                Rewrite::Verbatim => emit_element(&element, &mut Verbatim, children_raw, out),
                Rewrite::Descend => emit_element(&element, rewriter, children_raw, out),
            }
        }
        NodeData::Document => {
            for child in node.children.borrow().iter() {
                walk(child, rewriter, raw_text, out);
            }
        }
        NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => {}
    }
}

fn emit_element(element: &Element, rewriter: &mut dyn Rewriter, raw_text: bool, out: &mut String) {
    out.push_str(&element.start_tag());
    if is_void(&element.name) {
        return;
    }
    for child in element.node.children.borrow().iter() {
        walk(child, rewriter, raw_text, out);
    }
    out.push_str(&element.end_tag());
}
