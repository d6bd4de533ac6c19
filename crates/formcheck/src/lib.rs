//! formcheck - self-validating HTML forms
//!
//! Parses author-supplied form markup, re-populates it from the submitted
//! request, applies HTML5 constraint validation, and produces either the
//! interactive re-rendering (with error markers) or a static, control-free
//! rendering suitable for email.
//!
//! # Quick Start
//!
//! ```
//! use formcheck::{populate, validate, NoCustomValidity, Request};
//! # fn main() -> Result<(), formcheck::Error> {
//! let mut form = formcheck::from_str(
//!     r#"<form method="post"><input type="email" name="email" required="required"/></form>"#,
//! )?;
//! populate(&mut form, &Request::post().field("email", "not-an-email"));
//! let report = validate(&mut form, "contact", &NoCustomValidity);
//! assert_eq!(report.count(), 1);
//! assert!(form.to_markup().contains(r#"data-invalidity="typeMismatch""#));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, ErrorKind, Pos, Result, Span};

pub mod dom;
pub use dom::{
    Config as ParserConfig, Document as FormDocument, Document, FilterChain, MarkupFilter, NodeId,
    Query, TextareaFilter,
};

pub mod control;
pub use control::ControlKind;

pub mod request;
pub use request::{FieldValue, Method, Request};

pub mod populate;
pub use populate::{populate, Submission, SubmissionItem};

pub mod validate;
pub use validate::{validate, CustomValidity, Invalidity, NoCustomValidity, ValidationReport};

pub mod present;
pub use present::present_errors;

pub mod strip;
pub use strip::strip;

pub mod config;
pub use config::{FormOptions, Messages, Page, PipelineConfig};

pub mod email;
pub use email::{EmailMessage, Mailer};

pub mod render;
pub use render::{
    Failure, FormHandler, FormHooks, FormRegistry, NoHooks, Outcome, ProcessingFailure, RenderCache,
    Rendered, StatusIntent,
};

/// Parse form markup with the default parser limits
pub fn from_str(markup: &str) -> Result<Document> {
    dom::parse(markup)
}

/// Parse form markup from bytes
pub fn from_bytes(bytes: &[u8]) -> Result<Document> {
    dom::Parser::new(bytes).parse_form()
}

/// Parse form markup with custom parser limits
pub fn from_str_with_config(markup: &str, config: ParserConfig) -> Result<Document> {
    dom::parse_with_config(markup, config)
}

/// Control-free rendering of `doc` with the default filter chain and
/// placeholder; `doc` itself is left untouched
pub fn stripped(doc: &Document) -> String {
    strip(doc.clone(), &FilterChain::default(), strip::EMPTY_PLACEHOLDER)
}
