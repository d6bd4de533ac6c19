//! Markup serialization and the post-processing filter chain

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::dom::model::{Document, NodeData, NodeId};

#[allow(clippy::expect_used)]
static SELF_CLOSED_TEXTAREA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<textarea([^>]*?)\s*/>").expect("textarea pattern is valid")
});

/// A post-processing step applied to serialized markup
pub trait MarkupFilter {
    fn apply(&self, markup: String) -> String;
}

impl<F> MarkupFilter for F
where
    F: Fn(String) -> String,
{
    fn apply(&self, markup: String) -> String {
        self(markup)
    }
}

/// Rewrites `<textarea .../>` as `<textarea ...></textarea>`; browsers do not
/// accept the self-closing form
#[derive(Clone, Copy, Debug, Default)]
pub struct TextareaFilter;

impl MarkupFilter for TextareaFilter {
    fn apply(&self, markup: String) -> String {
        SELF_CLOSED_TEXTAREA
            .replace_all(&markup, "<textarea$1></textarea>")
            .into_owned()
    }
}

/// Ordered list of filters run over every serialized form
pub struct FilterChain {
    filters: Vec<Box<dyn MarkupFilter>>,
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self {
            filters: vec![Box::new(TextareaFilter)],
        }
    }
}

impl FilterChain {
    /// A chain with no filters at all
    pub fn empty() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn push(&mut self, filter: impl MarkupFilter + 'static) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(&self, markup: String) -> String {
        self.filters
            .iter()
            .fold(markup, |markup, filter| filter.apply(markup))
    }
}

impl Document {
    /// Serialize the root element without running any filters
    pub fn to_markup(&self) -> String {
        let mut output = String::new();
        self.write_node(self.root(), &mut output);
        output
    }

    /// Serialize the root element and run it through `filters`
    pub fn serialize(&self, filters: &FilterChain) -> String {
        filters.apply(self.to_markup())
    }

    fn write_node(&self, id: NodeId, output: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match node.data() {
            NodeData::Text(text) => output.push_str(&escape_text(text)),
            NodeData::Comment(text) => {
                output.push_str("<!--");
                output.push_str(text);
                output.push_str("-->");
            }
            NodeData::Element(element) => {
                output.push('<');
                output.push_str(&element.name);
                for (key, value) in &element.attributes {
                    output.push(' ');
                    output.push_str(key);
                    output.push_str("=\"");
                    output.push_str(&escape_attr(value));
                    output.push('"');
                }

                if node.children().is_empty() {
                    output.push_str("/>");
                    return;
                }

                output.push('>');
                for &child in node.children() {
                    self.write_node(child, output);
                }
                output.push_str("</");
                output.push_str(&element.name);
                output.push('>');
            }
        }
    }
}

/// Escape character data
pub fn escape_text(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            _ => output.push(ch),
        }
    }
    output
}

/// Escape a double-quoted attribute value
pub fn escape_attr(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\n' => output.push_str("&#10;"),
            _ => output.push(ch),
        }
    }
    output
}
