//! Minimal markup tree used to build outgoing messages.
//!
//! Incoming text is read with `roxmltree`, which is read-only. Outgoing
//! messages are assembled as an [`Element`] tree, starting from a parsed
//! skeleton, and serialized with [`Element::save_into`].
use std::fmt::Write;

use roxmltree::Node as XmlNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    /// Text content, written before the child elements.
    text: String,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Parses `text` into an owned tree rooted at its root element.
    pub fn parse(text: &str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        Ok(Self::from_node(doc.root_element()))
    }

    fn from_node(node: XmlNode) -> Self {
        let mut element = Element::new(node.tag_name().name());
        for attr in node.attributes() {
            element
                .attributes
                .push((attr.name().to_string(), attr.value().to_string()));
        }
        for child in node.children() {
            if child.is_element() {
                element.children.push(Self::from_node(child));
            } else if child.is_text() {
                element.text.push_str(child.text().unwrap_or_default());
            }
        }
        element
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces all content with `text`.
    pub fn set_text(&mut self, text: impl ToString) {
        self.children.clear();
        self.text = text.to_string();
    }

    pub fn add_child(&mut self, name: &str) -> &mut Element {
        let index = self.children.len();
        self.children.push(Element::new(name));
        &mut self.children[index]
    }

    /// Appends `<name>text</name>`.
    pub fn add_text_child(&mut self, name: &str, text: impl ToString) -> &mut Element {
        let child = self.add_child(name);
        child.set_text(text);
        child
    }

    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter()
    }

    /// First descendant element named `name`, in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|e| {
            if e.name == name {
                Some(e)
            } else {
                e.find(name)
            }
        })
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Element> {
        let index = self
            .children
            .iter()
            .position(|e| e.name == name || e.find(name).is_some())?;

        let child = &mut self.children[index];
        if child.name == name {
            Some(child)
        } else {
            child.find_mut(name)
        }
    }

    /// First character in any text or attribute value that markup cannot
    /// carry.
    pub fn find_unrepresentable(&self) -> Option<char> {
        let in_attributes = self
            .attributes
            .iter()
            .find_map(|(_, v)| v.chars().find(|&c| !is_xml_char(c)));

        in_attributes
            .or_else(|| self.text.chars().find(|&c| !is_xml_char(c)))
            .or_else(|| self.children.iter().find_map(Element::find_unrepresentable))
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            let _ = write!(out, " {name}=\"{}\"", escape(value, true));
        }

        if self.text.is_empty() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        out.push_str(&escape(&self.text, false));
        for child in &self.children {
            child.write_to(out);
        }
        let _ = write!(out, "</{}>", self.name);
    }

    /// Serializes into `buf` followed by a NUL byte.
    ///
    /// Returns the text length, or `None` if text and terminator do not fit.
    pub fn save_into(&self, buf: &mut [u8]) -> Option<usize> {
        let text = self.to_xml_string();
        if text.len() + 1 > buf.len() {
            return None;
        }
        buf[..text.len()].copy_from_slice(text.as_bytes());
        buf[text.len()] = 0;
        Some(text.len())
    }
}

/// The XML `Char` production. Surrogates cannot occur in a `char`.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

/// Escapes markup characters. Carriage returns are always written as a
/// character reference, since parsers fold raw line endings; inside
/// attributes tabs and newlines are too, as attribute values are
/// whitespace-normalized.
fn escape(s: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\t' if attribute => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
    out
}

/// First descendant of `node` (excluding itself) named `name`.
pub(crate) fn find_element<'a, 'input>(
    node: XmlNode<'a, 'input>,
    name: &str,
) -> Option<XmlNode<'a, 'input>> {
    node.descendants()
        .skip(1)
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// Text content of an element; empty when it has none.
pub(crate) fn opaque<'a>(node: XmlNode<'a, '_>) -> &'a str {
    node.text().unwrap_or_default()
}

/// Integer with C `atoi` leniency: leading whitespace, optional sign,
/// leading digits. Anything unparsable is 0.
pub(crate) fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    if negative { -value } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_serialize_skeleton() {
        let tree = Element::parse("<a><b></b><c x=\"1\">t</c></a>").unwrap();
        assert_eq!(tree.name(), "a");
        assert_eq!(tree.find("c").unwrap().attribute("x"), Some("1"));
        assert_eq!(tree.to_xml_string(), "<a><b/><c x=\"1\">t</c></a>");
    }

    #[test]
    fn find_mut_is_depth_first() {
        let mut tree = Element::parse("<r><h><n/></h><n/></r>").unwrap();
        tree.find_mut("n").unwrap().set_text("first");
        assert_eq!(tree.to_xml_string(), "<r><h><n>first</n></h><n/></r>");
        assert!(tree.find_mut("missing").is_none());
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let mut root = Element::new("r");
        root.add_text_child("v", "a<b & c>d");
        root.set_attribute("q", "\"x\"");
        let text = root.to_xml_string();
        assert_eq!(text, "<r q=\"&quot;x&quot;\"><v>a&lt;b &amp; c&gt;d</v></r>");

        let doc = roxmltree::Document::parse(&text).unwrap();
        let v = find_element(doc.root_element(), "v").unwrap();
        assert_eq!(opaque(v), "a<b & c>d");
    }

    #[test]
    fn line_endings_survive_parsing() {
        let mut root = Element::new("r");
        root.add_text_child("v", "a\r\nb");
        root.set_attribute("q", "x\ty\r\nz");
        let text = root.to_xml_string();
        assert_eq!(
            text,
            "<r q=\"x&#9;y&#13;&#10;z\"><v>a&#13;\nb</v></r>"
        );

        let doc = roxmltree::Document::parse(&text).unwrap();
        assert_eq!(doc.root_element().attribute("q"), Some("x\ty\r\nz"));
        let v = find_element(doc.root_element(), "v").unwrap();
        assert_eq!(opaque(v), "a\r\nb");
    }

    #[test]
    fn unrepresentable_characters_are_found() {
        let mut root = Element::new("r");
        root.add_text_child("ok", "tab\there\u{10000}");
        assert_eq!(root.find_unrepresentable(), None);

        root.add_child("inner").add_text_child("bad", "a\u{1}b");
        assert_eq!(root.find_unrepresentable(), Some('\u{1}'));

        let mut attr = Element::new("r");
        attr.set_attribute("q", "\u{FFFF}");
        assert_eq!(attr.find_unrepresentable(), Some('\u{FFFF}'));
    }

    #[test]
    fn add_child_returns_the_new_child() {
        let mut root = Element::new("r");
        root.add_child("a").set_text("1");
        root.add_child("b").add_child("c");
        assert_eq!(root.to_xml_string(), "<r><a>1</a><b><c/></b></r>");
        assert_eq!(root.children().count(), 2);
    }

    #[test]
    fn save_into_checks_space() {
        let root = Element::new("abc");
        let mut small = [0_u8; 6];
        assert_eq!(root.save_into(&mut small), None);

        let mut exact = [0xff_u8; 7];
        assert_eq!(root.save_into(&mut exact), Some(6));
        assert_eq!(&exact, b"<abc/>\0");
    }

    #[test]
    fn leading_int_like_atoi() {
        assert_eq!(leading_int("42"), 42);
        assert_eq!(leading_int("  -7xyz"), -7);
        assert_eq!(leading_int("+3"), 3);
        assert_eq!(leading_int("abc"), 0);
        assert_eq!(leading_int(""), 0);
    }
}
