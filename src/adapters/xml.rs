//! XML report recovery and a small element tree.
//!
//! Analysis tools happily copy source text into their reports, including
//! control characters and UTF-16 surrogate halves encoded as character
//! references. Those are removed or repaired before the document is handed
//! to `quick-xml`.

use std::borrow::Cow;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::errors::{QualeError, Result};

/// Whether `code` may appear in an XML 1.0 document.
pub fn is_xml_char(code: u32) -> bool {
    matches!(
        code,
        0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

fn is_high_surrogate(code: u32) -> bool {
    (0xD800..=0xDBFF).contains(&code)
}

fn is_low_surrogate(code: u32) -> bool {
    (0xDC00..=0xDFFF).contains(&code)
}

/// Parse a numeric character reference at the start of `s`.
///
/// Returns the referenced code point and the length of the reference
/// including `&#` and `;`.
fn parse_char_ref(s: &str) -> Option<(u32, usize)> {
    let body = s.strip_prefix("&#")?;
    let end = body.find(';')?;
    if end == 0 || end > 10 {
        return None;
    }
    let digits = &body[..end];
    let code = match digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    Some((code, end + 3))
}

/// Remove everything that would make `raw` an ill-formed document.
///
/// Invalid UTF-8 is replaced, literal control characters are dropped,
/// character references to illegal code points are dropped and valid
/// surrogate pairs written as two references are combined into one.
pub fn sanitize(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut out = String::with_capacity(text.len());
    let mut rest: &str = &text;

    while let Some(pos) = rest.find(|c: char| c == '&' || !is_xml_char(c as u32)) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if !rest.starts_with('&') {
            // Literal illegal character.
            let skip = rest.chars().next().map_or(1, char::len_utf8);
            rest = &rest[skip..];
            continue;
        }

        match parse_char_ref(rest) {
            Some((high, len)) if is_high_surrogate(high) => {
                match parse_char_ref(&rest[len..]) {
                    Some((low, low_len)) if is_low_surrogate(low) => {
                        let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                        out.push_str(&format!("&#x{combined:X};"));
                        rest = &rest[len + low_len..];
                    }
                    _ => rest = &rest[len..],
                }
            }
            Some((code, len)) => {
                if is_xml_char(code) {
                    out.push_str(&rest[..len]);
                }
                rest = &rest[len..];
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

/// One element of a parsed report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Tag name
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
    /// Concatenated text content, trimmed
    pub text: String,
}

impl XmlElement {
    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child called `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Text of the first direct child called `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.as_str())
    }

    /// Every element called `name` below this one, in document order.
    pub fn descendants(&self, name: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        let mut stack: Vec<&XmlElement> = self.children.iter().rev().collect();
        while let Some(element) = stack.pop() {
            if element.name == name {
                found.push(element);
            }
            stack.extend(element.children.iter().rev());
        }
        found
    }
}

fn element_from(tag: &BytesStart<'_>) -> std::result::Result<XmlElement, String> {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in tag.attributes().with_checks(false) {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .unwrap_or_else(|_| Cow::Owned(String::from_utf8_lossy(&attr.value).into_owned()))
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        ..XmlElement::default()
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, mut element: XmlElement) {
    element.text = element.text.trim().to_string();
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {}
    }
}

/// Parse a sanitized document into its root element.
pub fn parse_document(text: &str) -> std::result::Result<XmlElement, String> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => stack.push(element_from(&tag)?),
            Ok(Event::Empty(tag)) => {
                let element = element_from(&tag)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "closing tag without opening tag".to_string())?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(text)) => {
                if let Some(current) = stack.last_mut() {
                    let value = text.unescape().map_err(|e| e.to_string())?;
                    current.text.push_str(&value);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(format!("{err} at byte {}", reader.buffer_position()));
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unexpected end of document inside <{}>", open.name));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

/// Read, sanitize and parse a tool report.
///
/// A missing report or one that stays ill-formed after sanitization is a
/// [`QualeError::Report`].
pub fn read_report(tool: &str, path: &Path) -> Result<XmlElement> {
    let raw = std::fs::read(path).map_err(|e| {
        QualeError::report(tool, path.display().to_string(), format!("cannot read report: {e}"))
    })?;
    let text = sanitize(&raw);
    parse_document(&text)
        .map_err(|message| QualeError::report(tool, path.display().to_string(), message))
}

/// Express a tool-reported path relative to the checkout root.
pub fn relative_to_root(reported: &str, checkout_root: &Path) -> String {
    let reported = reported.trim().replace('\\', "/");
    let root = checkout_root.to_string_lossy().replace('\\', "/");
    let root = root.trim_end_matches('/');

    let stripped = if !root.is_empty() {
        reported
            .strip_prefix(root)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(&reported)
    } else {
        &reported
    };

    let stripped = stripped.strip_prefix("./").unwrap_or(stripped);
    stripped.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_sanitize_drops_control_characters() {
        let raw = b"<a>ok\x01\x08 text\x0b</a>";
        assert_eq!(sanitize(raw), "<a>ok text</a>");
    }

    #[test]
    fn test_sanitize_drops_illegal_references() {
        let raw = b"<a msg=\"x&#1;y&#x0B;z&#65;\">&#xFFFE;t</a>";
        assert_eq!(sanitize(raw), "<a msg=\"xyz&#65;\">t</a>");
    }

    #[test]
    fn test_sanitize_combines_surrogate_pairs() {
        let raw = b"<a>&#xD83D;&#xDE00; &#55357;&#56832;</a>";
        assert_eq!(sanitize(raw), "<a>&#x1F600; &#x1F600;</a>");

        let doc = parse_document(&sanitize(raw)).expect("parses");
        assert_eq!(doc.text, "\u{1F600} \u{1F600}");
    }

    #[test]
    fn test_sanitize_drops_lone_surrogates() {
        assert_eq!(sanitize(b"<a>&#xD83D;x&#xDE00;</a>"), "<a>x</a>");
    }

    #[test]
    fn test_sanitize_keeps_entities_and_plain_ampersands() {
        let raw = b"<a>&amp; &lt; & more</a>";
        assert_eq!(sanitize(raw), "<a>&amp; &lt; & more</a>");
    }

    #[test]
    fn test_sanitize_replaces_invalid_utf8() {
        let raw = b"<a>caf\xe9</a>";
        let doc = parse_document(&sanitize(raw)).expect("parses");
        assert_eq!(doc.text, "caf\u{FFFD}");
    }

    #[test]
    fn test_element_tree() {
        let doc = parse_document(
            r#"<root><file name="A.java"><error source="x" message="m"/></file>
               <file name="B.java"/><group><file name="C.java"/></group></root>"#,
        )
        .expect("parses");

        assert_eq!(doc.name, "root");
        assert_eq!(doc.children.len(), 3);
        assert_eq!(doc.child("file").and_then(|f| f.attr("name")), Some("A.java"));

        let names: Vec<_> = doc
            .descendants("file")
            .into_iter()
            .filter_map(|f| f.attr("name"))
            .collect();
        assert_eq!(names, vec!["A.java", "B.java", "C.java"]);
    }

    #[test]
    fn test_child_text_is_trimmed() {
        let doc = parse_document("<Class><ClassName>\n  Foo \n</ClassName></Class>").expect("parses");
        assert_eq!(doc.child_text("ClassName"), Some("Foo"));
    }

    #[test]
    fn test_unbalanced_document_is_rejected() {
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("<a><b>").is_err());
        assert!(parse_document("   ").is_err());
    }

    #[test]
    fn test_read_report_errors_are_report_errors() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.xml");
        assert!(matches!(
            read_report("jhawk", &missing),
            Err(QualeError::Report { .. })
        ));

        let broken = dir.path().join("broken.xml");
        std::fs::write(&broken, "<a><b></a>").expect("write");
        let err = read_report("jhawk", &broken).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("broken.xml"));
    }

    #[test]
    fn test_relative_to_root() {
        let root = PathBuf::from("/work/repo");
        assert_eq!(relative_to_root("/work/repo/src/A.java", &root), "src/A.java");
        assert_eq!(relative_to_root("src/A.java", &root), "src/A.java");
        assert_eq!(relative_to_root("./src/A.java", &root), "src/A.java");
        assert_eq!(relative_to_root("/work/repository/A.java", &root), "work/repository/A.java");
        assert_eq!(relative_to_root("C:\\x\\A.java", Path::new("C:\\x")), "A.java");
    }
}
