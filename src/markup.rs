//! Minimal XHTML node tree used by block splitting and paragraph flattening.
//!
//! Fragments are tokenized with `quick-xml` into an owned tree of
//! [`MarkupNode`] values. The tree is deliberately small: tag names,
//! attributes and text. Styling, layout and asset resolution belong to the
//! host renderer.
//!
//! ```rust
//! use epub_paginate::markup::{parse_fragment, TagClass};
//!
//! let nodes = parse_fragment("<div><p>One</p><p>Two</p></div>").unwrap();
//! assert_eq!(nodes.len(), 1);
//! assert_eq!(TagClass::of("div"), TagClass::Container);
//! ```

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use smallvec::SmallVec;

use crate::error::PrepError;

/// Closed classification of tag names used by block splitting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagClass {
    /// Grouping element whose children are examined for blocks.
    Container,
    /// Block-level leaf taken as one paragraph.
    Block,
    /// Explicit line break; block-level but never a leaf on its own.
    LineBreak,
    /// Inline or unknown element.
    Inline,
}

impl TagClass {
    /// Classify a lowercased local tag name.
    pub fn of(tag: &str) -> Self {
        match tag {
            "section" | "div" | "article" | "aside" | "body" | "main" | "header" | "footer"
            | "nav" | "html" => Self::Container,
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" | "pre" | "ul" | "ol"
            | "li" | "table" | "figure" | "figcaption" | "hr" | "img" | "image" | "dl" | "dd"
            | "dt" | "address" => Self::Block,
            "br" => Self::LineBreak,
            _ => Self::Inline,
        }
    }

    /// Whether the class participates in block flow (blocks and line breaks).
    pub fn is_block_level(self) -> bool {
        matches!(self, Self::Container | Self::Block | Self::LineBreak)
    }
}

/// One element attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name.
    pub name: String,
    /// Unescaped attribute value.
    pub value: String,
}

/// An element node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    /// Lowercased local tag name.
    pub tag: String,
    /// Attributes in source order.
    pub attrs: SmallVec<[Attribute; 4]>,
    /// Child nodes in document order.
    pub children: Vec<MarkupNode>,
}

impl Element {
    /// Create an element without attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: SmallVec::new(),
            children: Vec::new(),
        }
    }

    /// Builder helper appending a child.
    pub fn with_child(mut self, child: MarkupNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder helper appending an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push(Attribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Look up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Classification of this element's tag.
    pub fn class(&self) -> TagClass {
        TagClass::of(&self.tag)
    }
}

/// Owned markup tree node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkupNode {
    /// Element with children.
    Element(Element),
    /// Text content (entities already resolved).
    Text(String),
}

impl MarkupNode {
    /// Convenience constructor for an element node.
    pub fn element(element: Element) -> Self {
        Self::Element(element)
    }

    /// Convenience constructor for a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Tag name, if this is an element.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Element(e) => Some(e.tag.as_str()),
            Self::Text(_) => None,
        }
    }

    /// Child nodes (empty for text).
    pub fn children(&self) -> &[MarkupNode] {
        match self {
            Self::Element(e) => &e.children,
            Self::Text(_) => &[],
        }
    }

    /// Tag classification; text nodes are inline.
    pub fn class(&self) -> TagClass {
        match self {
            Self::Element(e) => e.class(),
            Self::Text(_) => TagClass::Inline,
        }
    }

    /// Raw concatenation of all descendant text.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_raw_text(self, &mut out);
        out
    }

    /// Whitespace-collapsed, trimmed text with single spaces at block and
    /// line-break boundaries.
    pub fn plain_text(&self) -> String {
        let mut raw = String::new();
        collect_spaced_text(self, &mut raw);
        collapse_whitespace(&raw)
    }

    /// Whether rendering this subtree needs more than its plain text.
    pub fn has_rich_content(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Element(e) => {
                is_rich_tag(&e.tag)
                    || e.attr("style").is_some_and(|v| !v.trim().is_empty())
                    || e.attr("class").is_some_and(|v| !v.trim().is_empty())
                    || e.children.iter().any(MarkupNode::has_rich_content)
            }
        }
    }

    /// Serialize back to XHTML markup.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_html(self, &mut out);
        out
    }
}

fn is_rich_tag(tag: &str) -> bool {
    matches!(
        tag,
        "img"
            | "image"
            | "svg"
            | "hr"
            | "table"
            | "ul"
            | "ol"
            | "dl"
            | "em"
            | "i"
            | "strong"
            | "b"
            | "u"
            | "s"
            | "a"
            | "sup"
            | "sub"
            | "code"
            | "pre"
            | "blockquote"
            | "figure"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
    )
}

fn collect_raw_text(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text(t) => out.push_str(t),
        MarkupNode::Element(e) => {
            for child in &e.children {
                collect_raw_text(child, out);
            }
        }
    }
}

fn collect_spaced_text(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text(t) => out.push_str(t),
        MarkupNode::Element(e) => {
            let boundary = e.class().is_block_level();
            if boundary {
                out.push(' ');
            }
            for child in &e.children {
                collect_spaced_text(child, out);
            }
            if boundary {
                out.push(' ');
            }
        }
    }
}

/// Collapse whitespace runs into single spaces and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_space = true;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    if result.ends_with(' ') {
        result.pop();
    }
    result
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "br" | "hr" | "img" | "image" | "col" | "wbr" | "source" | "meta" | "link" | "input"
    )
}

fn write_html(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text(t) => out.push_str(&quick_xml::escape::escape(t.as_str())),
        MarkupNode::Element(e) => {
            out.push('<');
            out.push_str(&e.tag);
            for attr in &e.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&quick_xml::escape::escape(attr.value.as_str()));
                out.push('"');
            }
            if e.children.is_empty() && is_void_tag(&e.tag) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in &e.children {
                write_html(child, out);
            }
            out.push_str("</");
            out.push_str(&e.tag);
            out.push('>');
        }
    }
}

/// Parse an XHTML fragment into its top-level nodes.
///
/// Whitespace-only text between top-level elements is dropped. `script`,
/// `style`, `head` and `noscript` subtrees are skipped. A tag left open at
/// end of input, or a mismatched end tag, is reported as an error.
pub fn parse_fragment(markup: &str) -> Result<Vec<MarkupNode>, PrepError> {
    let mut reader = Reader::from_reader(markup.as_bytes());
    reader.config_mut().trim_text(false);
    let mut buf = Vec::with_capacity(64);
    let mut roots: Vec<MarkupNode> = Vec::new();
    let mut stack: Vec<Element> = Vec::with_capacity(8);
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = decode_tag_name(&reader, e.name().as_ref())?;
                if skip_depth > 0 || should_skip_tag(&tag) {
                    skip_depth += 1;
                } else {
                    stack.push(element_from_start(&reader, &e, tag)?);
                }
            }
            Ok(Event::Empty(e)) => {
                let tag = decode_tag_name(&reader, e.name().as_ref())?;
                if skip_depth == 0 && !should_skip_tag(&tag) {
                    let element = element_from_start(&reader, &e, tag)?;
                    attach(&mut stack, &mut roots, MarkupNode::Element(element));
                }
            }
            Ok(Event::End(e)) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    buf.clear();
                    continue;
                }
                let tag = decode_tag_name(&reader, e.name().as_ref())?;
                let Some(element) = stack.pop() else {
                    return Err(PrepError::parse(
                        "PARSE_UNEXPECTED_END",
                        format!("unexpected closing tag </{}>", tag),
                    )
                    .with_token_offset(reader_token_offset(&reader)));
                };
                if element.tag != tag {
                    return Err(PrepError::parse(
                        "PARSE_MISMATCHED_END",
                        format!("expected </{}> but found </{}>", element.tag, tag),
                    )
                    .with_token_offset(reader_token_offset(&reader)));
                }
                attach(&mut stack, &mut roots, MarkupNode::Element(element));
            }
            Ok(Event::Text(e)) => {
                if skip_depth == 0 {
                    let text = e.decode().map_err(|err| {
                        PrepError::parse("PARSE_DECODE_ERROR", format!("Decode error: {:?}", err))
                            .with_token_offset(reader_token_offset(&reader))
                    })?;
                    push_text(&mut stack, &mut roots, text.as_ref());
                }
            }
            Ok(Event::CData(e)) => {
                if skip_depth == 0 {
                    let text = reader.decoder().decode(&e).map_err(|err| {
                        PrepError::parse("PARSE_DECODE_ERROR", format!("Decode error: {:?}", err))
                            .with_token_offset(reader_token_offset(&reader))
                    })?;
                    push_text(&mut stack, &mut roots, text.as_ref());
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if skip_depth == 0 {
                    let name = e.decode().map_err(|err| {
                        PrepError::parse("PARSE_DECODE_ERROR", format!("Decode error: {:?}", err))
                            .with_token_offset(reader_token_offset(&reader))
                    })?;
                    let resolved = resolve_entity(name.as_ref());
                    push_text(&mut stack, &mut roots, resolved.as_ref());
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(
                    PrepError::parse("PARSE_XML_ERROR", format!("XML error: {:?}", err))
                        .with_token_offset(reader_token_offset(&reader)),
                );
            }
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(PrepError::parse(
            "PARSE_UNCLOSED_TAG",
            format!("unclosed <{}> at end of fragment", open.tag),
        )
        .with_token_offset(reader_token_offset(&reader)));
    }

    roots.retain(|node| match node {
        MarkupNode::Text(t) => !t.trim().is_empty(),
        MarkupNode::Element(_) => true,
    });
    Ok(roots)
}

/// Parse a fragment expected to describe one block.
///
/// A single top-level element is returned as-is; anything else is wrapped in
/// a synthetic `div` so the result is always one node.
pub fn parse_block(markup: &str) -> Result<MarkupNode, PrepError> {
    let mut nodes = parse_fragment(markup)?;
    if nodes.len() == 1 && matches!(nodes[0], MarkupNode::Element(_)) {
        if let Some(node) = nodes.pop() {
            return Ok(node);
        }
    }
    let mut wrapper = Element::new("div");
    wrapper.children = nodes;
    Ok(MarkupNode::Element(wrapper))
}

/// Cut chapter markup into top-level block fragments without building a tree.
///
/// Used when a chapter does not parse as a whole: each block fragment can
/// then be parsed and rejected on its own. Only the `body` content is
/// scanned when a `body` tag exists. Container tags are transparent, inline
/// runs between blocks are kept only when they carry visible text, and a
/// block left open at the end runs to the end of input.
pub fn split_block_fragments(markup: &str) -> Vec<String> {
    let body = body_content(markup);
    let mut fragments = Vec::new();
    let mut depth = 0usize;
    let mut block_start = 0usize;
    let mut loose_start = 0usize;
    let mut pos = 0usize;

    while let Some(rel) = body[pos..].find('<') {
        let open = pos + rel;
        if body[open..].starts_with("<!--") {
            let end = body[open..].find("-->").map_or(body.len(), |end| open + end + 3);
            if depth == 0 {
                push_loose(&body[loose_start..open], &mut fragments);
                loose_start = end;
            }
            pos = end;
            continue;
        }
        let Some(close_rel) = body[open..].find('>') else {
            break;
        };
        let close = open + close_rel + 1;
        pos = close;
        let Some(token) = TagToken::parse(&body[open + 1..close - 1]) else {
            continue;
        };
        let class = TagClass::of(&token.name);
        if !matches!(class, TagClass::Block | TagClass::Container) {
            continue;
        }
        let self_closing = token.self_closing || is_void_tag(&token.name);

        if depth > 0 {
            if token.closing {
                depth -= 1;
                if depth == 0 {
                    fragments.push(body[block_start..close].to_string());
                    loose_start = close;
                }
            } else if !self_closing {
                depth += 1;
            }
            continue;
        }

        push_loose(&body[loose_start..open], &mut fragments);
        loose_start = close;
        if class == TagClass::Container || token.closing {
            continue;
        }
        if self_closing {
            fragments.push(body[open..close].to_string());
        } else {
            block_start = open;
            depth = 1;
        }
    }

    if depth > 0 {
        fragments.push(body[block_start..].to_string());
    } else {
        push_loose(&body[loose_start..], &mut fragments);
    }
    fragments
}

struct TagToken {
    name: String,
    closing: bool,
    self_closing: bool,
}

impl TagToken {
    fn parse(inner: &str) -> Option<Self> {
        if inner.starts_with('!') || inner.starts_with('?') {
            return None;
        }
        let closing = inner.starts_with('/');
        let self_closing = inner.ends_with('/');
        let rest = inner.trim_start_matches('/');
        let raw = rest
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .filter(|n| !n.is_empty())?;
        let local = raw.rsplit(':').next().unwrap_or(raw);
        Some(Self {
            name: local.to_ascii_lowercase(),
            closing,
            self_closing,
        })
    }
}

fn body_content(markup: &str) -> &str {
    let lower = markup.to_ascii_lowercase();
    let Some(tag_start) = lower.find("<body") else {
        return markup;
    };
    let Some(open_end) = lower[tag_start..].find('>') else {
        return markup;
    };
    let start = tag_start + open_end + 1;
    let end = lower
        .rfind("</body")
        .filter(|&end| end >= start)
        .unwrap_or(markup.len());
    &markup[start..end]
}

fn push_loose(segment: &str, fragments: &mut Vec<String>) {
    let mut in_tag = false;
    let visible = segment.chars().any(|c| match c {
        '<' => {
            in_tag = true;
            false
        }
        '>' => {
            in_tag = false;
            false
        }
        _ => !in_tag && !c.is_whitespace(),
    });
    if visible {
        fragments.push(segment.trim().to_string());
    }
}

fn attach(stack: &mut [Element], roots: &mut Vec<MarkupNode>, node: MarkupNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn push_text(stack: &mut [Element], roots: &mut Vec<MarkupNode>, text: &str) {
    if text.is_empty() {
        return;
    }
    let siblings = match stack.last_mut() {
        Some(parent) => &mut parent.children,
        None => roots,
    };
    if let Some(MarkupNode::Text(prev)) = siblings.last_mut() {
        prev.push_str(text);
        return;
    }
    siblings.push(MarkupNode::Text(text.to_string()));
}

fn resolve_entity(name: &str) -> Cow<'static, str> {
    let named = match name {
        "nbsp" => Some('\u{00A0}'),
        "mdash" => Some('\u{2014}'),
        "ndash" => Some('\u{2013}'),
        "hellip" => Some('\u{2026}'),
        "lsquo" => Some('\u{2018}'),
        "rsquo" => Some('\u{2019}'),
        "ldquo" => Some('\u{201C}'),
        "rdquo" => Some('\u{201D}'),
        "shy" => Some('\u{00AD}'),
        "copy" => Some('\u{00A9}'),
        _ => None,
    };
    if let Some(ch) = named {
        return Cow::Owned(ch.to_string());
    }
    let escaped = format!("&{};", name);
    match quick_xml::escape::unescape(&escaped) {
        Ok(value) => Cow::Owned(value.into_owned()),
        Err(_) => {
            log::debug!("unknown entity &{}; kept verbatim", name);
            Cow::Owned(escaped)
        }
    }
}

fn reader_token_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn decode_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String, PrepError> {
    let decoded = reader.decoder().decode(raw).map_err(|err| {
        PrepError::parse("PARSE_DECODE_ERROR", format!("Decode error: {:?}", err))
            .with_token_offset(reader_token_offset(reader))
    })?;
    let local_name = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Ok(local_name.to_ascii_lowercase())
}

fn element_from_start(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
    tag: String,
) -> Result<Element, PrepError> {
    let mut element = Element::new(tag);
    for attr in e.attributes().flatten() {
        let name = match reader.decoder().decode(attr.key.as_ref()) {
            Ok(v) => v.to_ascii_lowercase(),
            Err(_) => continue,
        };
        let raw = match reader.decoder().decode(&attr.value) {
            Ok(v) => v.into_owned(),
            Err(_) => continue,
        };
        let value = match quick_xml::escape::unescape(&raw) {
            Ok(v) => v.into_owned(),
            Err(_) => raw,
        };
        element.attrs.push(Attribute { name, value });
    }
    Ok(element)
}

fn should_skip_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "head" | "noscript")
}
