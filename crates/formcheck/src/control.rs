//! Control classification
//!
//! Every per-control operation (population, value extraction, stripping)
//! dispatches on [`ControlKind`] instead of inspecting tag and type ad hoc.

use crate::dom::{Document, NodeId};

/// `type` values rendered as plain buttons, including the repeat-template
/// actions
pub const BUTTON_LIKE_TYPES: [&str; 6] = ["button", "add", "remove", "delete", "move-up", "move-down"];

/// The closed set of control variants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlKind {
    TextInput,
    Checkbox,
    Radio,
    Select,
    Textarea,
    Hidden,
    ButtonLike,
}

impl ControlKind {
    /// Classify an element; `None` for elements that are not controls
    pub fn of(doc: &Document, id: NodeId) -> Option<Self> {
        match doc.tag_name(id)? {
            "input" => Some(Self::from_input_type(doc.attr_or_empty(id, "type"))),
            "select" => Some(Self::Select),
            "textarea" => Some(Self::Textarea),
            "button" => Some(Self::ButtonLike),
            _ => None,
        }
    }

    /// Classify an `input` element by its `type` attribute
    pub fn from_input_type(kind: &str) -> Self {
        match kind {
            "checkbox" => Self::Checkbox,
            "radio" => Self::Radio,
            "hidden" => Self::Hidden,
            kind if BUTTON_LIKE_TYPES.contains(&kind) => Self::ButtonLike,
            _ => Self::TextInput,
        }
    }
}

/// The value a control contributes to validation: textarea text, the first
/// selected option's value (or text), otherwise the `value` attribute
pub fn effective_value(doc: &Document, id: NodeId, kind: ControlKind) -> String {
    match kind {
        ControlKind::Textarea => doc.text_content(id),
        ControlKind::Select => doc
            .selected_options(id)
            .first()
            .map(|&option| option_value(doc, option))
            .unwrap_or_default(),
        ControlKind::TextInput
        | ControlKind::Checkbox
        | ControlKind::Radio
        | ControlKind::Hidden
        | ControlKind::ButtonLike => doc.attr_or_empty(id, "value").to_string(),
    }
}

/// An option's submitted value: its `value` attribute, else its text
pub fn option_value(doc: &Document, option: NodeId) -> String {
    match doc.attr(option, "value") {
        Some(value) => value.to_string(),
        None => doc.text_content(option),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;

    #[test]
    fn test_classification() -> crate::Result<()> {
        let doc = parse(
            r#"<form><input name="a"/><input type="email" name="b"/><input type="checkbox" name="c"/><input type="radio" name="d"/><input type="hidden" name="e"/><input type="move-up" name="f"/><button name="g">Go</button><select name="h"/><textarea name="i"/><fieldset name="j"/></form>"#,
        )?;
        let kinds: Vec<Option<ControlKind>> = doc
            .select(&crate::dom::Query::any().with_attr("name"))
            .into_iter()
            .map(|id| ControlKind::of(&doc, id))
            .collect();
        assert_eq!(
            kinds,
            vec![
                Some(ControlKind::TextInput),
                Some(ControlKind::TextInput),
                Some(ControlKind::Checkbox),
                Some(ControlKind::Radio),
                Some(ControlKind::Hidden),
                Some(ControlKind::ButtonLike),
                Some(ControlKind::ButtonLike),
                Some(ControlKind::Select),
                Some(ControlKind::Textarea),
                None,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_effective_values() -> crate::Result<()> {
        let doc = parse(
            r#"<form><textarea name="t">hi</textarea><select name="s"><option value="1">One</option><option selected="selected">Two</option><option selected="selected" value="3">Three</option></select><select name="none"><option>x</option></select></form>"#,
        )?;
        let value_of = |name: &str| {
            doc.by_name(name)
                .first()
                .and_then(|&id| ControlKind::of(&doc, id).map(|kind| effective_value(&doc, id, kind)))
        };
        assert_eq!(value_of("t"), Some("hi".to_string()));
        assert_eq!(value_of("s"), Some("Two".to_string()));
        assert_eq!(value_of("none"), Some(String::new()));
        Ok(())
    }
}
