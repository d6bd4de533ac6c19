//! Notification email assembly: sender detection, headers and the plain
//! text body

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::dom::{Document, NodeId, Query};
use crate::populate::Submission;

#[allow(clippy::expect_used)]
static SPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +").expect("space pattern is valid"));

/// The submitter, as far as the filled-in form tells
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sender {
    /// Full name, or first and last name joined; empty when unknown
    pub name: String,
    /// Value of the first `type="email"` input
    pub email: Option<String>,
}

impl Sender {
    /// Look for name and email inputs in a populated form.
    ///
    /// Name inputs are text inputs with a value whose `name` contains
    /// `name`; those also containing `first`, or `last`/`surname`, are the
    /// name parts.
    pub fn detect(doc: &Document) -> Self {
        let candidates = doc.select(
            &Query::tag("input")
                .attr_eq("type", "text")
                .attr_ne("value", "")
                .attr_contains("name", "name"),
        );
        let field = |id: NodeId| doc.attr_or_empty(id, "name");
        let first = candidates.iter().find(|&&id| field(id).contains("first"));
        let last = candidates.iter().find(|&&id| {
            let name = field(id);
            name.contains("last") || name.contains("surname")
        });

        let name = match (first, last, candidates.first()) {
            (Some(&first), Some(&last), _) => format!(
                "{} {}",
                doc.attr_or_empty(first, "value"),
                doc.attr_or_empty(last, "value")
            ),
            (_, _, Some(&full)) => doc.attr_or_empty(full, "value").to_string(),
            _ => String::new(),
        };

        let email = doc
            .select_first(&Query::tag("input").attr_eq("type", "email"))
            .map(|id| doc.attr_or_empty(id, "value"))
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Self { name, email }
    }

    /// `From` mailbox: `"Name" <email>` or the bare address. Double quotes
    /// in the name become two single quotes.
    pub fn mailbox(&self) -> Option<String> {
        let email = self.email.as_deref()?;
        if self.name.is_empty() {
            return Some(email.to_string());
        }
        Some(format!("\"{}\" <{email}>", self.name.replace('"', "''")))
    }
}

/// Inputs for [`compose_headers`]
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderOptions<'a> {
    pub html: bool,
    pub cc_sender: bool,
    /// Extra CC address list supplied by the embedding
    pub cc: &'a str,
    pub bcc: &'a str,
}

/// Header lines in send order: content type, `From`, `CC`, `BCC`
pub fn compose_headers(from: Option<&str>, options: HeaderOptions<'_>) -> Vec<String> {
    let content_type = if options.html { "text/html" } else { "text/plain" };
    let mut headers = vec![format!("Content-type: {content_type}; charset=utf-8")];

    if let Some(from) = from {
        headers.push(format!("From: {from}"));
    }

    if options.cc_sender || !options.cc.is_empty() {
        let mut cc = Vec::new();
        if options.cc_sender {
            cc.extend(from);
        }
        if !options.cc.is_empty() {
            cc.push(options.cc);
        }
        headers.push(format!("CC: {}", cc.join(", ")));
    }

    if !options.bcc.is_empty() {
        headers.push(format!("BCC: {}", options.bcc));
    }
    headers
}

/// One CRLF-terminated line per submitted item, hidden inputs excluded:
/// the first text of the item's label, a space, then the value
pub fn plain_text_body(submission: &Submission, doc: &Document) -> String {
    let mut body = String::new();
    for item in submission.values().flatten() {
        if doc.is_tag(item.control, "input") && doc.attr(item.control, "type") == Some("hidden") {
            continue;
        }
        let label = item
            .label
            .and_then(|label| doc.first_child(label))
            .map(|first| doc.text_content(first))
            .unwrap_or_default();
        let line = format!("{label} {}", item.value);
        body.push_str(&SPACE_RUN.replace_all(&line, " "));
        body.push_str("\r\n");
    }
    body
}

/// A message ready for the mail transport
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmailMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub headers: Vec<String>,
}

impl EmailMessage {
    /// Headers joined with CRLF, as a transport expects them
    pub fn header_block(&self) -> String {
        self.headers.join("\r\n")
    }
}

impl fmt::Display for EmailMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "To: {}", self.recipient)?;
        writeln!(f, "Subject: {}", self.subject)?;
        for header in &self.headers {
            writeln!(f, "{header}")?;
        }
        writeln!(f)?;
        f.write_str(&self.body)
    }
}

/// Mail transport; returns whether the message was accepted
pub trait Mailer {
    fn send(&self, message: &EmailMessage) -> bool;
}

impl<F> Mailer for F
where
    F: Fn(&EmailMessage) -> bool,
{
    fn send(&self, message: &EmailMessage) -> bool {
        self(message)
    }
}
