//! Minimal tag tokenizer for JSX modules and HTML-like templates.
//!
//! This is not a full parser. It locates element tags, their attributes and the
//! byte spans needed to rename a tag or append attributes, and leaves every other
//! byte alone. Rewrites are then plain span edits, so untouched code keeps its
//! exact formatting.
//!
//! Two entry points share the attribute grammar:
//!
//! - [`parse_jsx`] walks JavaScript/TypeScript. String literals, template
//!   literals and comments are skipped; `<` only starts an element in expression
//!   position (so `a < b` and `Array<T>` are not tags). Element children are
//!   scanned as JSX text with `{...}` expression holes.
//! - [`parse_markup`] walks HTML-like markup such as a Vue single-file
//!   component. `<script>`/`<style>` bodies are raw text, `{{ ... }}`
//!   interpolations and `<!-- -->` comments are skipped, and void elements
//!   never wait for a closing tag.

/// Byte range `[start, end)` into the scanned source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Inclusive start offset
    pub start: usize,
    /// Exclusive end offset
    pub end: usize,
}

impl Span {
    /// Creates a span.
    pub const fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
        }
    }

    /// The spanned text.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Value of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Quoted or unquoted text, without the quotes
    Literal(String),
    /// JSX expression container contents, without the braces
    Expression(String),
}

/// One attribute of an opening tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name as written (`def`, `:def`, `v-bind:def`)
    pub name: String,
    /// `None` for boolean attributes (`<Widget def/>`)
    pub value: Option<AttrValue>,
    /// Whole attribute including its value
    pub span: Span,
}

/// A closing tag paired with an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseTag {
    /// Span of the name inside `</name>`
    pub name_span: Span,
    /// Offset of `<`
    pub start: usize,
    /// Offset after `>`
    pub end: usize,
}

/// An element found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNode {
    /// Tag name (empty for JSX fragments)
    pub name: String,
    /// Span of the name in the opening tag
    pub name_span: Span,
    /// Offset of the opening `<`
    pub start: usize,
    /// Offset after the opening tag's `>`
    pub end: usize,
    /// Attributes in source order
    pub attributes: Vec<Attribute>,
    /// Offset right after the last attribute (or the name); new attributes go here
    pub attrs_end: usize,
    /// `<Tag/>`
    pub self_closing: bool,
    /// Nesting depth, 0 for top-level elements
    pub depth: usize,
    /// Matching closing tag, when one was found
    pub close: Option<CloseTag>,
}

impl TagNode {
    /// Finds an attribute by exact name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Whether a boolean or valued attribute with `name` is present.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

/// Keywords after which `<` begins a JSX element rather than a comparison.
const KEYWORDS_BEFORE_ELEMENT: &[&str] = &[
    "return", "yield", "await", "case", "default", "else", "do", "in", "of", "typeof", "void",
    "delete", "throw", "new",
];

/// Elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is raw text.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit() || matches!(b, b'-' | b'.' | b':')
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_attr_name_char(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'' | b'{' | b'}' | b'<')
}

struct Cursor<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        self.pos = (self.pos + 1).min(self.bytes.len());
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.bytes[self.pos..].starts_with(pat.as_bytes())
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.bump();
        }
    }

    /// Moves past the next occurrence of `pat`, or to the end.
    fn skip_past(&mut self, pat: &str) {
        match self.src[self.pos..].find(pat) {
            Some(i) => self.pos += i + pat.len(),
            None => self.pos = self.bytes.len(),
        }
    }

    fn read_while(&mut self, f: impl Fn(u8) -> bool) -> Span {
        let start = self.pos;
        while self.peek().is_some_and(&f) {
            self.bump();
        }
        Span::new(start, self.pos)
    }

    fn text(&self, span: Span) -> &'a str {
        &self.src[span.start..span.end]
    }
}

/// How attribute values and tag bodies are read.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Jsx,
    Markup,
}

struct Parser<'a> {
    cur: Cursor<'a>,
    nodes: Vec<TagNode>,
    mode: Mode,
}

/// Finds all JSX elements in a JavaScript or TypeScript module.
pub fn parse_jsx(source: &str) -> Vec<TagNode> {
    let mut parser = Parser {
        cur: Cursor::new(source),
        nodes: Vec::new(),
        mode: Mode::Jsx,
    };
    parser.code(false, 0);
    parser.nodes
}

/// Finds all elements in HTML-like markup.
pub fn parse_markup(source: &str) -> Vec<TagNode> {
    let mut parser = Parser {
        cur: Cursor::new(source),
        nodes: Vec::new(),
        mode: Mode::Markup,
    };
    parser.markup();
    parser.nodes
}

impl Parser<'_> {
    // ----- JSX -----

    /// Scans JavaScript. With `in_braces`, returns after the `}` closing an
    /// already consumed `{`.
    fn code(&mut self, in_braces: bool, depth: usize) {
        let mut braces = 0usize;

        while let Some(b) = self.cur.peek() {
            match b {
                b'/' if self.cur.peek_at(1) == Some(b'/') => self.cur.skip_past("\n"),
                b'/' if self.cur.peek_at(1) == Some(b'*') => {
                    self.cur.bump();
                    self.cur.bump();
                    self.cur.skip_past("*/");
                }
                b'\'' | b'"' => self.skip_string(b),
                b'`' => self.skip_template(depth),
                b'{' => {
                    braces += 1;
                    self.cur.bump();
                }
                b'}' => {
                    self.cur.bump();
                    if braces == 0 {
                        if in_braces {
                            return;
                        }
                    } else {
                        braces -= 1;
                    }
                }
                b'<' if self.element_allowed() && self.at_jsx_element() => {
                    if self.at_type_parameters() {
                        self.cur.bump();
                    } else {
                        self.element(depth);
                    }
                }
                _ => self.cur.bump(),
            }
        }
    }

    fn skip_string(&mut self, quote: u8) {
        self.cur.bump();
        while let Some(b) = self.cur.peek() {
            match b {
                b'\\' => {
                    self.cur.bump();
                    self.cur.bump();
                }
                b'\n' => return,
                _ if b == quote => {
                    self.cur.bump();
                    return;
                }
                _ => self.cur.bump(),
            }
        }
    }

    fn skip_template(&mut self, depth: usize) {
        self.cur.bump();
        while let Some(b) = self.cur.peek() {
            match b {
                b'\\' => {
                    self.cur.bump();
                    self.cur.bump();
                }
                b'`' => {
                    self.cur.bump();
                    return;
                }
                b'$' if self.cur.peek_at(1) == Some(b'{') => {
                    self.cur.bump();
                    self.cur.bump();
                    self.code(true, depth);
                }
                _ => self.cur.bump(),
            }
        }
    }

    /// Whether the token before the current `<` puts it in expression position.
    fn element_allowed(&self) -> bool {
        let before = &self.cur.bytes[..self.cur.pos];
        let Some(last) = before.iter().rposition(|b| !b.is_ascii_whitespace()) else {
            return true;
        };

        let b = before[last];
        if is_ident_byte(b) {
            let start = before[..=last].iter().rposition(|c| !is_ident_byte(*c)).map_or(0, |p| p + 1);
            let word = &before[start..=last];
            return KEYWORDS_BEFORE_ELEMENT.iter().any(|k| k.as_bytes() == word);
        }

        !matches!(b, b')' | b']')
    }

    fn at_jsx_element(&self) -> bool {
        self.cur.peek_at(1).is_some_and(|b| is_name_start(b) || b == b'>')
    }

    /// TSX generic arrow parameters: `<T,>(..)` or `<T extends U>(..)`.
    fn at_type_parameters(&self) -> bool {
        let bytes = self.cur.bytes;
        let mut i = self.cur.pos + 1;
        while bytes.get(i).is_some_and(|b| is_ident_byte(*b)) {
            i += 1;
        }
        if i == self.cur.pos + 1 {
            return false;
        }
        while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }

        match bytes.get(i) {
            Some(b',') => true,
            _ => {
                bytes[i..].starts_with(b"extends")
                    && bytes.get(i + 7).is_some_and(|b| b.is_ascii_whitespace())
            }
        }
    }

    fn element(&mut self, depth: usize) {
        let index = self.open_tag(depth);
        if !self.nodes[index].self_closing {
            self.jsx_children(index, depth);
        }
    }

    /// Scans JSX children of `parent` up to and including its closing tag.
    fn jsx_children(&mut self, parent: usize, depth: usize) {
        while let Some(b) = self.cur.peek() {
            match b {
                b'{' => {
                    self.cur.bump();
                    self.code(true, depth + 1);
                }
                b'<' if self.cur.peek_at(1) == Some(b'/') => {
                    let close = self.close_tag();
                    self.nodes[parent].close = Some(close);
                    return;
                }
                b'<' if self.at_jsx_element() => self.element(depth + 1),
                _ => self.cur.bump(),
            }
        }
    }

    // ----- Markup -----

    fn markup(&mut self) {
        let mut stack: Vec<usize> = Vec::new();

        while let Some(b) = self.cur.peek() {
            match b {
                b'<' if self.cur.starts_with("<!--") => self.cur.skip_past("-->"),
                b'<' if matches!(self.cur.peek_at(1), Some(b'!' | b'?')) => self.cur.skip_past(">"),
                b'<' if self.cur.peek_at(1) == Some(b'/') => {
                    let close = self.close_tag();
                    let name = self.cur.text(close.name_span);
                    if let Some(pos) = stack.iter().rposition(|&i| self.nodes[i].name == name) {
                        let index = stack[pos];
                        self.nodes[index].close = Some(close);
                        stack.truncate(pos);
                    }
                }
                b'<' if self.cur.peek_at(1).is_some_and(is_name_start) => {
                    let index = self.open_tag(stack.len());
                    let node = &self.nodes[index];
                    let lowered = node.name.to_ascii_lowercase();

                    if node.self_closing || VOID_ELEMENTS.contains(&lowered.as_str()) {
                        continue;
                    }

                    if RAW_TEXT_ELEMENTS.contains(&lowered.as_str()) {
                        self.skip_raw_text(&lowered);
                    }
                    stack.push(index);
                }
                b'{' if self.cur.peek_at(1) == Some(b'{') => self.cur.skip_past("}}"),
                _ => self.cur.bump(),
            }
        }
    }

    /// Moves to the `</name` ending a raw-text element.
    fn skip_raw_text(&mut self, name: &str) {
        let needle = format!("</{name}");
        let rest = &self.cur.src[self.cur.pos..];
        match rest.to_ascii_lowercase().find(&needle) {
            Some(i) => self.cur.pos += i,
            None => self.cur.pos = self.cur.bytes.len(),
        }
    }

    // ----- Shared tag grammar -----

    /// Parses an opening tag at `<` and records it; returns its node index.
    fn open_tag(&mut self, depth: usize) -> usize {
        let start = self.cur.pos;
        self.cur.bump();
        let name_span = self.cur.read_while(is_name_char);
        let index = self.nodes.len();

        self.nodes.push(TagNode {
            name: self.cur.text(name_span).to_string(),
            name_span,
            start,
            end: start,
            attributes: Vec::new(),
            attrs_end: name_span.end,
            self_closing: false,
            depth,
            close: None,
        });

        loop {
            self.cur.skip_ws();
            match self.cur.peek() {
                None => break,
                Some(b'/') if self.cur.peek_at(1) == Some(b'>') => {
                    self.nodes[index].self_closing = true;
                    self.cur.bump();
                    self.cur.bump();
                    break;
                }
                Some(b'>') => {
                    self.cur.bump();
                    break;
                }
                Some(b'{') if self.mode == Mode::Jsx => {
                    // spread attribute
                    self.cur.bump();
                    self.code(true, depth + 1);
                    self.nodes[index].attrs_end = self.cur.pos;
                }
                Some(b) if is_attr_name_char(b) => {
                    let attribute = self.attribute(depth);
                    self.nodes[index].attrs_end = attribute.span.end;
                    self.nodes[index].attributes.push(attribute);
                }
                Some(_) => self.cur.bump(),
            }
        }

        self.nodes[index].end = self.cur.pos;
        index
    }

    fn attribute(&mut self, depth: usize) -> Attribute {
        let name_span = self.cur.read_while(is_attr_name_char);
        let name = self.cur.text(name_span).to_string();

        let after_name = self.cur.pos;
        self.cur.skip_ws();
        if self.cur.peek() != Some(b'=') {
            self.cur.pos = after_name;
            return Attribute {
                name,
                value: None,
                span: name_span,
            };
        }

        self.cur.bump();
        self.cur.skip_ws();

        let value = match self.cur.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.cur.bump();
                let start = self.cur.pos;
                let quote_char = char::from(quote);
                let end = match self.cur.src[start..].find(quote_char) {
                    Some(i) => start + i,
                    None => self.cur.bytes.len(),
                };
                self.cur.pos = end;
                self.cur.bump();
                Some(AttrValue::Literal(self.cur.src[start..end].to_string()))
            }
            Some(b'{') if self.mode == Mode::Jsx => {
                self.cur.bump();
                let start = self.cur.pos;
                self.code(true, depth + 1);
                let end = self.cur.pos.saturating_sub(1).max(start);
                Some(AttrValue::Expression(self.cur.src[start..end].to_string()))
            }
            Some(_) => {
                let span = self
                    .cur
                    .read_while(|b| !b.is_ascii_whitespace() && b != b'>' && b != b'"' && b != b'\'');
                // `/` directly before `>` closes the tag
                let span = if span.end > span.start
                    && self.cur.peek() == Some(b'>')
                    && self.cur.bytes[span.end - 1] == b'/'
                {
                    self.cur.pos -= 1;
                    Span::new(span.start, span.end - 1)
                } else {
                    span
                };
                Some(AttrValue::Literal(self.cur.text(span).to_string()))
            }
            None => None,
        };

        Attribute {
            name,
            value,
            span: Span::new(name_span.start, self.cur.pos),
        }
    }

    /// Parses a closing tag at `</`.
    fn close_tag(&mut self) -> CloseTag {
        let start = self.cur.pos;
        self.cur.bump();
        self.cur.bump();
        self.cur.skip_ws();
        let name_span = self.cur.read_while(is_name_char);
        self.cur.skip_past(">");

        CloseTag {
            name_span,
            start,
            end: self.cur.pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(nodes: &[TagNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_jsx_finds_nested_elements_and_closing_tags() {
        let src = r#"export default () => (
  <div className="app">
    <Widget def="ns@1.0.0">child</Widget>
    <Widget def="ns@1.0.0" />
  </div>
);"#;
        let nodes = parse_jsx(src);
        assert_eq!(names(&nodes), vec!["div", "Widget", "Widget"]);

        let first = &nodes[1];
        assert_eq!(first.depth, 1);
        assert!(!first.self_closing);
        assert_eq!(first.close.unwrap().name_span.slice(src), "Widget");
        assert_eq!(
            first.attribute("def").unwrap().value,
            Some(AttrValue::Literal("ns@1.0.0".to_string()))
        );
        assert_eq!(&src[first.attrs_end - 1..first.attrs_end], "\"");

        let second = &nodes[2];
        assert!(second.self_closing);
        assert!(second.close.is_none());
        assert_eq!(nodes[0].close.unwrap().name_span.slice(src), "div");
    }

    #[test]
    fn test_jsx_ignores_comparisons_strings_and_comments() {
        let src = r#"
const a = b < c;
const t = Array<Item>();
const s = "<Widget def='x@1'/>";
// <Widget def="y@1"/>
/* <Widget def="z@1"/> */
const tpl = `<Widget def="w@1"/>`;
if (x) return <Widget def="ok@1"/>;
"#;
        let nodes = parse_jsx(src);
        assert_eq!(names(&nodes), vec!["Widget"]);
        assert_eq!(
            nodes[0].attribute("def").unwrap().value,
            Some(AttrValue::Literal("ok@1".to_string()))
        );
    }

    #[test]
    fn test_jsx_expression_attributes_and_spreads() {
        let src = r#"const el = <Widget {...props} def={"ns@2"} render={() => <Inner a={1} />} flag />;"#;
        let nodes = parse_jsx(src);
        assert_eq!(names(&nodes), vec!["Widget", "Inner"]);

        let widget = &nodes[0];
        assert_eq!(
            widget.attribute("def").unwrap().value,
            Some(AttrValue::Expression("\"ns@2\"".to_string()))
        );
        assert_eq!(widget.attribute("flag").unwrap().value, None);
        assert!(widget.self_closing);
        assert_eq!(&src[widget.attrs_end - 4..widget.attrs_end], "flag");
    }

    #[test]
    fn test_jsx_children_text_with_quotes_and_holes() {
        let src = r#"const el = <p>Don't {items.map(i => <Widget key={i} def="a@1" />)} stop</p>;"#;
        let nodes = parse_jsx(src);
        assert_eq!(names(&nodes), vec!["p", "Widget"]);
        assert_eq!(nodes[0].close.unwrap().name_span.slice(src), "p");
    }

    #[test]
    fn test_jsx_fragment() {
        let src = "const f = <><Widget def=\"a@1\"></Widget></>;";
        let nodes = parse_jsx(src);
        assert_eq!(names(&nodes), vec!["", "Widget"]);
        assert!(nodes[0].close.is_some());
        assert!(nodes[1].close.is_some());
    }

    #[test]
    fn test_jsx_skips_tsx_generic_arrow_parameters() {
        let src = r#"const f = <T,>(x: T) => x;
const g = <K extends string>(k: K) => k;
const a = <Widget def="a@1" />;"#;
        let nodes = parse_jsx(src);
        assert_eq!(names(&nodes), vec!["Widget"]);
        assert!(nodes[0].self_closing);
        assert_eq!(
            nodes[0].attribute("def").unwrap().value,
            Some(AttrValue::Literal("a@1".to_string()))
        );
    }

    #[test]
    fn test_markup_template_and_raw_script() {
        let src = r#"<template>
  <div>
    <img src="a.png">
    <Widget def="ns@1"></Widget>
    <p>{{ a < b }}</p>
    <!-- <Widget def="hidden@1"/> -->
  </div>
</template>
<script setup>
const x = a < b && "<Widget/>";
</script>"#;
        let nodes = parse_markup(src);
        assert_eq!(names(&nodes), vec!["template", "div", "img", "Widget", "p", "script"]);

        let template = &nodes[0];
        assert_eq!(template.depth, 0);
        assert!(template.close.is_some());

        let widget = &nodes[3];
        assert_eq!(widget.depth, 2);
        assert_eq!(widget.close.unwrap().name_span.slice(src), "Widget");

        let script = &nodes[5];
        assert_eq!(script.depth, 0);
        assert!(script.has_attribute("setup"));
        assert!(script.close.is_some());
    }

    #[test]
    fn test_markup_attribute_forms() {
        let src = r#"<Widget :def="expr" def=ns@1 v-if='ok' disabled/>"#;
        let nodes = parse_markup(src);
        assert_eq!(nodes.len(), 1);

        let node = &nodes[0];
        assert!(node.self_closing);
        assert_eq!(node.attribute(":def").unwrap().value, Some(AttrValue::Literal("expr".into())));
        assert_eq!(node.attribute("def").unwrap().value, Some(AttrValue::Literal("ns@1".into())));
        assert_eq!(node.attribute("v-if").unwrap().value, Some(AttrValue::Literal("ok".into())));
        assert_eq!(node.attribute("disabled").unwrap().value, None);
    }
}
