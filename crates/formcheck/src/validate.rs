//! Constraint validation modelled on the HTML5 validity states

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::control::{effective_value, ControlKind};
use crate::dom::{Document, NodeId};
use crate::request::Request;

/// Class token appended to every invalid control
pub const INVALID_CLASS: &str = "invalid";
/// Attribute holding the space-separated invalidity names
pub const INVALIDITY_ATTR: &str = "data-invalidity";
/// Attribute holding the custom validity message
pub const MESSAGE_ATTR: &str = "data-validationMessage";

#[allow(clippy::expect_used)]
static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+@.+\.\w+$").expect("email pattern is valid"));

/// Reasons a control can be invalid, named after `ValidityState`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Invalidity {
    ValueMissing,
    PatternMismatch,
    TooLong,
    TypeMismatch,
    CustomError,
}

impl Invalidity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValueMissing => "valueMissing",
            Self::PatternMismatch => "patternMismatch",
            Self::TooLong => "tooLong",
            Self::TypeMismatch => "typeMismatch",
            Self::CustomError => "customError",
        }
    }
}

impl fmt::Display for Invalidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook supplying an application-defined validity message for a control.
/// An empty message means the control is valid.
pub trait CustomValidity {
    fn validity_message(&self, doc: &Document, control: NodeId, form_name: &str) -> String;
}

impl<F> CustomValidity for F
where
    F: Fn(&Document, NodeId, &str) -> String,
{
    fn validity_message(&self, doc: &Document, control: NodeId, form_name: &str) -> String {
        self(doc, control, form_name)
    }
}

/// Custom validity hook that accepts everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCustomValidity;

impl CustomValidity for NoCustomValidity {
    fn validity_message(&self, _doc: &Document, _control: NodeId, _form_name: &str) -> String {
        String::new()
    }
}

/// One invalid control and why
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidControl {
    pub control: NodeId,
    pub invalidity: Vec<Invalidity>,
    pub message: Option<String>,
}

/// Result of validating a form: the invalid controls in document order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub invalid: Vec<InvalidControl>,
}

impl ValidationReport {
    pub fn count(&self) -> usize {
        self.invalid.len()
    }

    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty()
    }

    /// The first invalid control, which receives focus
    pub fn first(&self) -> Option<NodeId> {
        self.invalid.first().map(|entry| entry.control)
    }

    pub fn controls(&self) -> Vec<NodeId> {
        self.invalid.iter().map(|entry| entry.control).collect()
    }

    /// Invalidity of a given control, empty when valid
    pub fn invalidity_of(&self, control: NodeId) -> &[Invalidity] {
        self.invalid
            .iter()
            .find(|entry| entry.control == control)
            .map(|entry| entry.invalidity.as_slice())
            .unwrap_or_default()
    }
}

/// Only a request that submits this form is validated: the form's method must
/// match the request's and the payload must be non-empty
pub fn should_validate(doc: &Document, request: &Request) -> bool {
    let declared = doc.attr_or_empty(doc.root(), "method");
    declared.eq_ignore_ascii_case(request.method.as_str()) && !request.is_empty()
}

/// Classify one control without touching the document
pub fn check_control(
    doc: &Document,
    control: NodeId,
    kind: ControlKind,
    form_name: &str,
    custom: &dyn CustomValidity,
) -> (Vec<Invalidity>, Option<String>) {
    let value = effective_value(doc, control, kind);

    if doc.has_attr(control, "required") && value.is_empty() {
        return (vec![Invalidity::ValueMissing], None);
    }

    let mut invalidity = Vec::new();

    if !value.is_empty() {
        if let Some(pattern) = doc.attr(control, "pattern").filter(|p| !p.is_empty()) {
            if !matches_pattern(pattern, &value) {
                invalidity.push(Invalidity::PatternMismatch);
            }
        }
    }

    if let Some(max) = max_length(doc, control) {
        if value.chars().count() > max {
            invalidity.push(Invalidity::TooLong);
        }
    }

    if doc.attr(control, "type") == Some("email") && !EMAIL_SHAPE.is_match(&value) {
        invalidity.push(Invalidity::TypeMismatch);
    }

    let message = custom.validity_message(doc, control, form_name);
    let message = if message.is_empty() {
        None
    } else {
        invalidity.push(Invalidity::CustomError);
        Some(message)
    };

    (invalidity, message)
}

/// Full-value match of `pattern`. A pattern that does not compile imposes no
/// constraint.
fn matches_pattern(pattern: &str, value: &str) -> bool {
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(regex) => regex.is_match(value),
        Err(err) => {
            warn!(pattern, %err, "ignoring uncompilable pattern attribute");
            true
        }
    }
}

fn max_length(doc: &Document, control: NodeId) -> Option<usize> {
    doc.attr(control, "maxlength")
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|&max| max > 0)
}

/// Validate every named, enabled, writable control, annotating the invalid
/// ones with [`INVALID_CLASS`] and the diagnostic attributes
pub fn validate(doc: &mut Document, form_name: &str, custom: &dyn CustomValidity) -> ValidationReport {
    let mut report = ValidationReport::default();

    for control in doc.named_controls() {
        let Some(kind) = ControlKind::of(doc, control) else {
            continue;
        };
        let (invalidity, message) = check_control(doc, control, kind, form_name, custom);
        if invalidity.is_empty() {
            continue;
        }

        if let Some(message) = &message {
            doc.set_attr(control, MESSAGE_ATTR, message.as_str());
        }
        doc.add_class(control, INVALID_CLASS);
        let names: Vec<&str> = invalidity.iter().map(|i| i.as_str()).collect();
        doc.set_attr(control, INVALIDITY_ATTR, names.join(" "));

        report.invalid.push(InvalidControl {
            control,
            invalidity,
            message,
        });
    }

    debug!(form = form_name, invalid = report.count(), "validated form");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;
    use crate::populate::populate;

    fn report_for(markup: &str) -> crate::Result<(Document, ValidationReport)> {
        let mut doc = parse(markup)?;
        let report = validate(&mut doc, "test", &NoCustomValidity);
        Ok((doc, report))
    }

    #[test]
    fn test_required_short_circuits() -> crate::Result<()> {
        let (doc, report) = report_for(
            r#"<form><input name="a" required="required" pattern="\d+" maxlength="1" type="email"/></form>"#,
        )?;
        assert_eq!(report.count(), 1);
        let control = doc.by_name("a");
        let tags = control.first().map(|&id| report.invalidity_of(id).to_vec());
        assert_eq!(tags, Some(vec![Invalidity::ValueMissing]));
        assert_eq!(control.first().and_then(|&id| doc.attr(id, INVALIDITY_ATTR)), Some("valueMissing"));
        Ok(())
    }

    #[test]
    fn test_checks_accumulate() -> crate::Result<()> {
        let (doc, report) = report_for(
            r#"<form><input name="a" type="email" value="abcdef" pattern="[a-c]+" maxlength="3" class="wide"/></form>"#,
        )?;
        let control = doc.by_name("a").first().copied();
        let tags = control.map(|id| report.invalidity_of(id).to_vec());
        assert_eq!(
            tags,
            Some(vec![Invalidity::PatternMismatch, Invalidity::TooLong, Invalidity::TypeMismatch])
        );
        assert_eq!(control.and_then(|id| doc.attr(id, "class")), Some("wide invalid"));
        assert_eq!(
            control.and_then(|id| doc.attr(id, INVALIDITY_ATTR)),
            Some("patternMismatch tooLong typeMismatch")
        );
        Ok(())
    }

    #[test]
    fn test_maxlength_counts_code_points() -> crate::Result<()> {
        let (_, report) = report_for(r#"<form><input name="a" maxlength="3" value="éàü"/></form>"#)?;
        assert!(report.is_valid());
        let (_, report) = report_for(r#"<form><input name="a" maxlength="3" value="éàüö"/></form>"#)?;
        assert_eq!(report.count(), 1);
        Ok(())
    }

    #[test]
    fn test_disabled_readonly_and_unnamed_are_skipped() -> crate::Result<()> {
        let (_, report) = report_for(
            r#"<form><input name="a" required="required" disabled="disabled"/><input name="b" required="required" readonly="readonly"/><input required="required"/></form>"#,
        )?;
        assert!(report.is_valid());
        Ok(())
    }

    #[test]
    fn test_select_and_textarea_values() -> crate::Result<()> {
        let (doc, report) = report_for(
            r#"<form><select name="s" required="required"><option value="">Pick</option><option value="x">X</option></select><textarea name="t" required="required">filled</textarea><select name="u" required="required"><option selected="selected" value="">Pick</option></select></form>"#,
        )?;
        let names: Vec<&str> = report
            .controls()
            .into_iter()
            .filter_map(|id| doc.attr(id, "name"))
            .collect();
        assert_eq!(names, vec!["s", "u"]);
        Ok(())
    }

    #[test]
    fn test_bad_pattern_is_ignored() -> crate::Result<()> {
        let (_, report) = report_for(r#"<form><input name="a" value="x" pattern="(?&lt;=a)b"/></form>"#)?;
        assert!(report.is_valid());
        Ok(())
    }

    #[test]
    fn test_email_shape() -> crate::Result<()> {
        let (_, report) = report_for(r#"<form><input name="e" type="email" value="a@example.org"/></form>"#)?;
        assert!(report.is_valid());
        let (_, report) = report_for(r#"<form><input name="e" type="email" value="a@localhost"/></form>"#)?;
        assert_eq!(report.count(), 1);
        Ok(())
    }

    #[test]
    fn test_empty_optional_email_is_type_mismatch() -> crate::Result<()> {
        let mut doc = parse(r#"<form method="post"><input type="email" name="email"/><input name="n"/></form>"#)?;
        let request = Request::post().field("email", "").field("n", "x");
        populate(&mut doc, &request);
        assert!(should_validate(&doc, &request));
        let report = validate(&mut doc, "test", &NoCustomValidity);
        assert_eq!(report.count(), 1);
        let email = doc.by_name("email").first().copied();
        assert_eq!(email.map(|id| report.invalidity_of(id).to_vec()), Some(vec![Invalidity::TypeMismatch]));
        Ok(())
    }

    #[test]
    fn test_custom_validity_message() -> crate::Result<()> {
        let mut doc = parse(r#"<form><input name="code" value="abc"/><input name="other" value="x"/></form>"#)?;
        let hook = |doc: &Document, control: NodeId, form: &str| {
            if doc.attr(control, "name") == Some("code") && form == "signup" {
                "Code already used".to_string()
            } else {
                String::new()
            }
        };
        let report = validate(&mut doc, "signup", &hook);
        assert_eq!(report.count(), 1);
        let entry = report.invalid.first().cloned();
        assert_eq!(entry.as_ref().map(|e| e.invalidity.clone()), Some(vec![Invalidity::CustomError]));
        assert_eq!(entry.and_then(|e| e.message), Some("Code already used".to_string()));
        let control = doc.by_name("code").first().copied();
        assert_eq!(control.and_then(|id| doc.attr(id, MESSAGE_ATTR)), Some("Code already used"));
        Ok(())
    }

    #[test]
    fn test_should_validate_gate() -> crate::Result<()> {
        let doc = parse(r#"<form method="post"><input name="a"/></form>"#)?;
        assert!(should_validate(&doc, &Request::post().field("a", "1")));
        assert!(!should_validate(&doc, &Request::post()));
        assert!(!should_validate(&doc, &Request::get().field("a", "1")));
        Ok(())
    }
}
