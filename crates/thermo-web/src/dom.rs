//! Minimal DOM model for the client side of the page.
//!
//! The browser host owns the real DOM; this model is what mounting and
//! hydration checks operate on. `Document::parse` reads the server document
//! (or any markup `render_to_string` produces) and `from_node` builds the
//! structure a client render would create.

use crate::error::DomError;
use crate::node::{Node, escape_html, is_void};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNode {
    Element(DomElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

impl DomElement {
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub children: Vec<DomNode>,
}

impl Document {
    pub fn parse(html: &str) -> Result<Self, DomError> {
        Ok(Self {
            children: parse_fragment(html)?,
        })
    }

    pub fn element_by_id(&self, id: &str) -> Option<&DomElement> {
        find(&self.children, id)
    }

    pub fn element_by_id_mut(&mut self, id: &str) -> Option<&mut DomElement> {
        find_mut(&mut self.children, id)
    }
}

fn find<'a>(nodes: &'a [DomNode], id: &str) -> Option<&'a DomElement> {
    nodes.iter().find_map(|node| match node {
        DomNode::Element(el) if el.get_attr("id") == Some(id) => Some(el),
        DomNode::Element(el) => find(&el.children, id),
        DomNode::Text(_) => None,
    })
}

fn find_mut<'a>(nodes: &'a mut [DomNode], id: &str) -> Option<&'a mut DomElement> {
    for node in nodes {
        if let DomNode::Element(el) = node {
            if el.get_attr("id") == Some(id) {
                return Some(el);
            }
            if let Some(found) = find_mut(&mut el.children, id) {
                return Some(found);
            }
        }
    }
    None
}

/// DOM nodes a client render of `node` produces. Adjacent text collapses into
/// one text node, as it does once markup is parsed.
pub fn from_node(node: &Node) -> Result<Vec<DomNode>, DomError> {
    let mut out = Vec::new();
    build_into(node, &mut out)?;
    Ok(out)
}

fn build_into(node: &Node, out: &mut Vec<DomNode>) -> Result<(), DomError> {
    match node {
        Node::Text(text) => push_node(out, DomNode::Text(text.clone())),
        Node::Raw(markup) => {
            for parsed in parse_fragment(markup)? {
                push_node(out, parsed);
            }
        }
        Node::Element(element) => {
            let mut children = Vec::new();
            for child in &element.children {
                build_into(child, &mut children)?;
            }
            push_node(
                out,
                DomNode::Element(DomElement {
                    tag: element.tag.clone(),
                    attrs: element.attrs.clone(),
                    children,
                }),
            );
        }
    }
    Ok(())
}

fn push_node(siblings: &mut Vec<DomNode>, node: DomNode) {
    if let DomNode::Text(text) = &node {
        if text.is_empty() {
            return;
        }
        if let Some(DomNode::Text(prev)) = siblings.last_mut() {
            prev.push_str(text);
            return;
        }
    }
    siblings.push(node);
}

/// Serializes nodes back to markup with the same conventions as
/// `render_to_string`.
pub fn serialize(nodes: &[DomNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_dom(node, &mut out);
    }
    out
}

fn write_dom(node: &DomNode, out: &mut String) {
    match node {
        DomNode::Text(text) => out.push_str(&escape_html(text)),
        DomNode::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attrs {
                out.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
            }
            if is_void(&el.tag) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            if is_raw_text(&el.tag) {
                out.push_str(&el.text_content());
            } else {
                for child in &el.children {
                    write_dom(child, out);
                }
            }
            out.push_str(&format!("</{}>", el.tag));
        }
    }
}

fn is_raw_text(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

pub fn parse_fragment(input: &str) -> Result<Vec<DomNode>, DomError> {
    let mut roots = Vec::<DomNode>::new();
    let mut stack = Vec::<DomElement>::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let rest = &input[i..];

        if rest.starts_with("<!--") {
            let end = rest
                .find("-->")
                .ok_or_else(|| error(i, "unterminated comment"))?;
            i += end + 3;
            continue;
        }

        if rest.starts_with("<!") {
            let end = find_tag_end(input, i).ok_or_else(|| error(i, "unterminated declaration"))?;
            i = end + 1;
            continue;
        }

        if rest.starts_with("</") {
            let end = find_tag_end(input, i).ok_or_else(|| error(i, "unterminated closing tag"))?;
            let name = input[i + 2..end].trim().to_ascii_lowercase();
            let open = stack
                .pop()
                .ok_or_else(|| error(i, format!("closing tag </{name}> without an open element")))?;
            if open.tag != name {
                return Err(error(
                    i,
                    format!("closing tag </{name}> does not match <{}>", open.tag),
                ));
            }
            attach(&mut stack, &mut roots, DomNode::Element(open));
            i = end + 1;
            continue;
        }

        if bytes[i] == b'<' && bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
            let end = find_tag_end(input, i).ok_or_else(|| error(i, "unterminated start tag"))?;
            let start = parse_start_tag(&input[i + 1..end]);
            let mut element = DomElement {
                tag: start.tag,
                attrs: start.attrs,
                children: Vec::new(),
            };
            i = end + 1;

            if start.self_closing || is_void(&element.tag) {
                attach(&mut stack, &mut roots, DomNode::Element(element));
            } else if is_raw_text(&element.tag) {
                let close = find_close_tag(input, i, &element.tag)
                    .ok_or_else(|| error(i, format!("unterminated <{}>", element.tag)))?;
                push_node(&mut element.children, DomNode::Text(input[i..close].to_string()));
                i = close + element.tag.len() + 3;
                attach(&mut stack, &mut roots, DomNode::Element(element));
            } else {
                stack.push(element);
            }
            continue;
        }

        let skip = usize::from(rest.starts_with('<'));
        let next = rest[skip..]
            .find('<')
            .map(|n| n + skip)
            .unwrap_or(rest.len());
        let text = decode_entities(&rest[..next]);
        attach(&mut stack, &mut roots, DomNode::Text(text));
        i += next;
    }

    if let Some(open) = stack.last() {
        return Err(error(input.len(), format!("unclosed <{}>", open.tag)));
    }
    Ok(roots)
}

fn attach(stack: &mut [DomElement], roots: &mut Vec<DomNode>, node: DomNode) {
    match stack.last_mut() {
        Some(parent) => push_node(&mut parent.children, node),
        None => push_node(roots, node),
    }
}

fn error(offset: usize, reason: impl Into<String>) -> DomError {
    DomError {
        offset,
        reason: reason.into(),
    }
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse::<u32>().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

struct StartTag {
    tag: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
}

/// Parses what sits between `<` and `>`. A bare attribute gets an empty value.
fn parse_start_tag(inside: &str) -> StartTag {
    let inside = inside.trim();
    let (inside, self_closing) = match inside.strip_suffix('/') {
        Some(rest) => (rest, true),
        None => (inside, false),
    };
    let (tag, mut rest) = inside.split_at(inside.find(char::is_whitespace).unwrap_or(inside.len()));

    let mut attrs = Vec::new();
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
        if rest.is_empty() {
            break;
        }
        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let name = rest[..name_len].to_ascii_lowercase();
        rest = rest[name_len..].trim_start();

        let value = match rest.strip_prefix('=') {
            Some(after) => {
                let (raw, remaining) = attribute_value(after.trim_start());
                rest = remaining;
                decode_entities(raw)
            }
            None => String::new(),
        };
        if !name.is_empty() {
            attrs.push((name, value));
        }
    }

    StartTag {
        tag: tag.to_ascii_lowercase(),
        attrs,
        self_closing,
    }
}

/// Splits a quoted or unquoted value off the front of `input`.
fn attribute_value(input: &str) -> (&str, &str) {
    match input.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let body = &input[1..];
            match body.find(quote) {
                Some(end) => (&body[..end], &body[end + 1..]),
                None => (body, ""),
            }
        }
        _ => input.split_at(input.find(char::is_whitespace).unwrap_or(input.len())),
    }
}

/// Byte index of the `>` ending the tag that opens at `open`. A `>` inside a
/// quoted value does not count.
fn find_tag_end(input: &str, open: usize) -> Option<usize> {
    let mut quote = None;
    for (idx, ch) in input[open..].char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '>') => return Some(open + idx),
            (None, _) => {}
        }
    }
    None
}

/// Start of `</tag>` at or after `from`. Raw text is not scanned for markup.
fn find_close_tag(input: &str, from: usize, tag: &str) -> Option<usize> {
    input[from..].find(&format!("</{tag}>")).map(|idx| from + idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{el, render_to_string};

    #[test]
    fn test_parse_document_skips_doctype_and_comments() {
        let doc = Document::parse(
            "<!DOCTYPE html><html lang=\"en\"><!-- c --><head><title>T</title></head><body><div id=\"app\">x</div></body></html>",
        )
        .unwrap();

        let app = doc.element_by_id("app").unwrap();
        assert_eq!(app.tag, "div");
        assert_eq!(app.text_content(), "x");
        assert_eq!(doc.children.len(), 1);
    }

    #[test]
    fn test_parse_void_and_self_closing_elements() {
        let nodes = parse_fragment("<meta charset=\"utf-8\"><link rel=\"icon\" href=\"/f.ico\"/><br>").unwrap();
        assert_eq!(nodes.len(), 3);
        let DomNode::Element(link) = &nodes[1] else {
            panic!("expected element");
        };
        assert_eq!(link.get_attr("href"), Some("/f.ico"));
        assert!(link.children.is_empty());
    }

    #[test]
    fn test_start_tag_attribute_forms() {
        let nodes = parse_fragment(
            "<BUTTON disabled data-step=2 Data-Label='a > b' title = \"x\"  hidden/>",
        )
        .unwrap();
        let DomNode::Element(button) = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(button.tag, "button");
        assert!(button.children.is_empty());
        assert_eq!(
            button.attrs,
            [
                ("disabled".to_string(), String::new()),
                ("data-step".to_string(), "2".to_string()),
                ("data-label".to_string(), "a > b".to_string()),
                ("title".to_string(), "x".to_string()),
                ("hidden".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_entities_are_decoded() {
        let nodes = parse_fragment("<p title=\"a &quot;b&quot;\">&lt;3 &amp; &#176;F &#x2212; &bogus;</p>").unwrap();
        let DomNode::Element(p) = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(p.get_attr("title"), Some("a \"b\""));
        assert_eq!(p.text_content(), "<3 & °F \u{2212} &bogus;");
    }

    #[test]
    fn test_script_content_is_raw_text() {
        let nodes =
            parse_fragment("<script type=\"application/json\">{\"a\":\"<b>\"}</script>").unwrap();
        let DomNode::Element(script) = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(script.text_content(), "{\"a\":\"<b>\"}");
    }

    #[test]
    fn test_mismatched_and_unclosed_tags_fail() {
        assert!(parse_fragment("<div><span></div>").is_err());
        assert!(parse_fragment("<div>").is_err());
        assert!(parse_fragment("</div>").is_err());
    }

    #[test]
    fn test_from_node_matches_parsed_markup() {
        let node: Node = el("div")
            .attr("class", "a")
            .text("one ")
            .text("two")
            .child(Node::raw("<b>three</b>"))
            .child(el("input").attr("value", "x"))
            .into();

        let built = from_node(&node).unwrap();
        let parsed = parse_fragment(&render_to_string(&node)).unwrap();
        assert_eq!(built, parsed);
        assert_eq!(serialize(&built), render_to_string(&node));
    }

    #[test]
    fn test_element_by_id_mut_allows_replacing_children() {
        let mut doc = Document::parse("<body><div id=\"root\"><p>old</p></div></body>").unwrap();
        let root = doc.element_by_id_mut("root").unwrap();
        root.children = vec![DomNode::Text("new".to_string())];
        assert_eq!(
            serialize(&doc.children),
            "<body><div id=\"root\">new</div></body>"
        );
    }
}
