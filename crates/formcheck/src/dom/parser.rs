//! Well-formed markup parser producing a [`Document`]

use indexmap::IndexMap;
use tracing::debug;

use crate::dom::cursor::Cursor;
use crate::dom::model::{Document, Element, NodeId};
use crate::error::{Error, ErrorKind, Pos, Result, Span};

/// Configuration for the markup parser
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Maximum element nesting depth (0 means unlimited)
    pub max_depth: u16,
    /// Maximum input size in bytes (0 means unlimited)
    pub max_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: 128,
            max_size: 10 * 1024 * 1024, // 10 MB default
        }
    }
}

impl Config {
    /// Create a new config with unlimited depth and size
    pub const fn unlimited() -> Self {
        Self {
            max_depth: 0,
            max_size: 0,
        }
    }

    /// Create a new config with specific limits
    pub const fn new(max_depth: u16, max_size: usize) -> Self {
        Self {
            max_depth,
            max_size,
        }
    }
}

/// Markup parser
#[derive(Debug)]
pub struct Parser<'a> {
    cursor: Cursor<'a>,
    config: Config,
    depth: u16,
}

impl<'a> Parser<'a> {
    /// Create a new parser with default configuration
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_config(input, Config::default())
    }

    /// Create a new parser with custom configuration
    pub fn with_config(input: &'a [u8], config: Config) -> Self {
        Self {
            cursor: Cursor::new(input),
            config,
            depth: 0,
        }
    }

    /// Parse a document with any root element
    pub fn parse(&mut self) -> Result<Document> {
        if self.config.max_size > 0 && self.cursor.remaining().len() > self.config.max_size {
            return Err(Error::at(
                ErrorKind::MaxSizeExceeded {
                    max: self.config.max_size,
                },
                self.cursor.position(),
            ));
        }

        self.skip_prolog()?;
        let (name, attributes, self_closing) = self.parse_start_tag()?;
        let mut doc = Document::new(Element { name, attributes });
        if !self_closing {
            let root = doc.root();
            self.parse_content(&mut doc, root)?;
        }
        self.skip_misc()?;

        if !self.cursor.is_eof() {
            return Err(self.error_here(ErrorKind::InvalidToken, "content after root element"));
        }

        Ok(doc)
    }

    /// Parse a document whose root must be a `form` element
    pub fn parse_form(&mut self) -> Result<Document> {
        let doc = self.parse()?;
        let root = doc.tag_name(doc.root()).unwrap_or_default();
        if root != "form" {
            debug!(root, "rejecting document with non-form root");
            return Err(Error::new(
                ErrorKind::RootNotForm {
                    found: root.to_string(),
                },
                Span::at(Pos::new(0, 1, 1)),
            ));
        }
        Ok(doc)
    }

    /// Skip the XML declaration, doctype, comments and whitespace before the root
    fn skip_prolog(&mut self) -> Result<()> {
        // byte order mark
        if self.cursor.starts_with(b"\xEF\xBB\xBF") {
            self.cursor.advance_by(3);
        }
        self.skip_misc()?;
        if self.cursor.starts_with(b"<!DOCTYPE") {
            self.skip_until(b">")?;
            self.skip_misc()?;
        }
        if self.cursor.is_eof() {
            return Err(self.error_here(ErrorKind::UnexpectedEof, "expected root element"));
        }
        Ok(())
    }

    /// Skip whitespace, comments and processing instructions outside the root
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.starts_with(b"<?") {
                self.cursor.advance_by(2);
                self.skip_until(b"?>")?;
            } else if self.cursor.starts_with(b"<!--") {
                self.cursor.advance_by(4);
                self.skip_until(b"-->")?;
            } else {
                return Ok(());
            }
        }
    }

    /// Parse `<name attr="..."` up to and including `>` or `/>`
    fn parse_start_tag(&mut self) -> Result<(String, IndexMap<String, String>, bool)> {
        self.expect_byte(b'<')?;
        if self.cursor.current() == Some(b'/') {
            return Err(self.error_here(ErrorKind::InvalidToken, "unexpected closing tag"));
        }
        let name = self.parse_name()?;
        let attributes = self.parse_attributes()?;

        if self.cursor.consume(b'/') {
            self.expect_byte(b'>')?;
            return Ok((name, attributes, true));
        }
        self.expect_byte(b'>')?;
        Ok((name, attributes, false))
    }

    /// Parse children of `parent` until its closing tag
    fn parse_content(&mut self, doc: &mut Document, parent: NodeId) -> Result<()> {
        self.depth = self.depth.saturating_add(1);
        if self.config.max_depth > 0 && self.depth > self.config.max_depth {
            return Err(Error::at(
                ErrorKind::MaxDepthExceeded {
                    max: self.config.max_depth,
                },
                self.cursor.position(),
            ));
        }

        loop {
            if self.cursor.is_eof() {
                return Err(self.error_here(ErrorKind::UnexpectedEof, "unterminated element"));
            }

            if self.cursor.starts_with(b"</") {
                self.cursor.advance_by(2);
                let close_pos = self.cursor.position();
                let close_name = self.parse_name()?;
                let expected = doc.tag_name(parent).unwrap_or_default();
                if close_name != expected {
                    return Err(Error::at(
                        ErrorKind::MismatchedTag {
                            expected: expected.to_string(),
                            found: close_name,
                        },
                        close_pos,
                    ));
                }
                self.cursor.skip_whitespace();
                self.expect_byte(b'>')?;
                break;
            }

            if self.cursor.starts_with(b"<!--") {
                self.cursor.advance_by(4);
                let start = self.cursor.pos();
                self.skip_until(b"-->")?;
                let raw = self.cursor.slice_from(start);
                let text = bytes_to_string(raw.get(..raw.len().saturating_sub(3)).unwrap_or_default())?;
                let comment = doc.create_comment(&text);
                doc.append_child(parent, comment);
                continue;
            }

            if self.cursor.starts_with(b"<![CDATA[") {
                self.cursor.advance_by(9);
                let start = self.cursor.pos();
                self.skip_until(b"]]>")?;
                let raw = self.cursor.slice_from(start);
                let text = bytes_to_string(raw.get(..raw.len().saturating_sub(3)).unwrap_or_default())?;
                let node = doc.create_text(&text);
                doc.append_child(parent, node);
                continue;
            }

            if self.cursor.starts_with(b"<?") {
                self.cursor.advance_by(2);
                self.skip_until(b"?>")?;
                continue;
            }

            if self.cursor.current() == Some(b'<') {
                let (name, attributes, self_closing) = self.parse_start_tag()?;
                let child = doc.create_element(&name);
                if let Some(element) = doc.element_mut(child) {
                    element.attributes = attributes;
                }
                doc.append_child(parent, child);
                if !self_closing {
                    self.parse_content(doc, child)?;
                }
                continue;
            }

            let text = self.parse_text()?;
            let node = doc.create_text(&text);
            doc.append_child(parent, node);
        }

        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    fn parse_attributes(&mut self) -> Result<IndexMap<String, String>> {
        let mut attrs = IndexMap::new();

        loop {
            let before = self.cursor.pos();
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b'/') | Some(b'>') => break,
                Some(_) if self.cursor.pos() == before => {
                    return Err(self.error_here(ErrorKind::InvalidToken, "expected whitespace before attribute"))
                }
                Some(_) => {}
                None => return Err(self.error_here(ErrorKind::UnexpectedEof, "unterminated tag")),
            }

            let name_pos = self.cursor.position();
            let name = self.parse_name()?;
            self.cursor.skip_whitespace();
            self.expect_byte(b'=')?;
            self.cursor.skip_whitespace();
            let value = self.parse_attribute_value()?;

            if attrs.contains_key(&name) {
                return Err(Error::at(ErrorKind::DuplicateAttribute { name }, name_pos));
            }
            attrs.insert(name, value);
        }

        Ok(attrs)
    }

    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(b'"') => b'"',
            Some(b'\'') => b'\'',
            _ => {
                return Err(
                    self.error_here(ErrorKind::InvalidToken, "expected quoted attribute value")
                )
            }
        };
        self.cursor.advance();

        let start_pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance();
                let text = bytes_to_string(raw)?;
                return decode_entities(&text, start_pos);
            }
            if b == b'<' {
                return Err(self.error_here(ErrorKind::InvalidToken, "'<' in attribute value"));
            }
            self.cursor.advance();
        }

        Err(self.error_here(ErrorKind::UnexpectedEof, "unterminated attribute value"))
    }

    fn parse_text(&mut self) -> Result<String> {
        let start_pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            self.cursor.advance();
        }

        let raw = self.cursor.slice_from(start);
        let text = bytes_to_string(raw)?;
        decode_entities(&text, start_pos)
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.cursor.pos();

        match self.cursor.current() {
            Some(first) if is_name_start(first) => self.cursor.advance(),
            Some(_) => return Err(self.error_here(ErrorKind::InvalidToken, "expected name")),
            None => return Err(self.error_here(ErrorKind::UnexpectedEof, "expected name")),
        }

        while let Some(b) = self.cursor.current() {
            if is_name_char(b) {
                self.cursor.advance();
            } else {
                break;
            }
        }

        bytes_to_string(self.cursor.slice_from(start))
    }

    fn skip_until(&mut self, pattern: &[u8]) -> Result<()> {
        while !self.cursor.is_eof() {
            if self.cursor.starts_with(pattern) {
                self.cursor.advance_by(pattern.len());
                return Ok(());
            }
            self.cursor.advance();
        }
        Err(self.error_here(ErrorKind::UnexpectedEof, "unterminated markup"))
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        if self.cursor.consume(expected) {
            Ok(())
        } else if self.cursor.is_eof() {
            Err(self.error_here(ErrorKind::UnexpectedEof, "unexpected end of input"))
        } else {
            Err(self.error_here(
                ErrorKind::InvalidToken,
                &format!("expected '{}'", char::from(expected)),
            ))
        }
    }

    fn error_here(&self, kind: ErrorKind, message: &str) -> Error {
        Error::with_message(kind, Span::at(self.cursor.position()), message)
    }
}

fn bytes_to_string(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| Error::new(ErrorKind::InvalidUtf8, Span::empty()))
}

/// Bytes from 0x80 up belong to multi-byte characters; the name is checked as
/// UTF-8 once collected
fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':' | 0x80..=0xFF)
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}

fn decode_entities(input: &str, pos: Pos) -> Result<String> {
    if !input.contains('&') {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        result.push_str(rest.get(..amp).unwrap_or_default());
        let after = rest.get(amp + 1..).unwrap_or_default();
        let Some(semi) = after.find(';') else {
            return Err(Error::at(
                ErrorKind::InvalidEntity {
                    entity: after.chars().take(8).collect(),
                },
                pos,
            ));
        };
        let entity = after.get(..semi).unwrap_or_default();

        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => decode_numeric_entity(entity),
        };
        match decoded {
            Some(ch) => result.push(ch),
            None => {
                return Err(Error::at(
                    ErrorKind::InvalidEntity {
                        entity: entity.to_string(),
                    },
                    pos,
                ));
            }
        }
        rest = after.get(semi + 1..).unwrap_or_default();
    }
    result.push_str(rest);

    Ok(result)
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().and_then(xml_char)
    } else if let Some(dec) = entity.strip_prefix('#') {
        if dec.is_empty() || !dec.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        dec.parse::<u32>().ok().and_then(xml_char)
    } else {
        None
    }
}

/// Code points allowed by the XML `Char` production
fn xml_char(code: u32) -> Option<char> {
    match code {
        0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x1_0000..=0x10_FFFF => char::from_u32(code),
        _ => None,
    }
}
