//! Document model adapter: parse form markup into a mutable, queryable tree
//! and serialize it back

pub mod cursor;
pub mod model;
pub mod parser;
pub mod query;
pub mod serialize;

pub use model::{Document, Element, Node, NodeData, NodeId};
pub use parser::{Config, Parser};
pub use query::Query;
pub use serialize::{FilterChain, MarkupFilter, TextareaFilter};

use crate::error::Result;

/// Parse form markup; the root element must be `form`
pub fn parse(markup: &str) -> Result<Document> {
    Parser::new(markup.as_bytes()).parse_form()
}

/// Parse form markup with custom parser limits
pub fn parse_with_config(markup: &str, config: Config) -> Result<Document> {
    Parser::with_config(markup.as_bytes(), config).parse_form()
}
