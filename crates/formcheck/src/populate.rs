//! Request populator: merge submitted values back into the form

use std::collections::VecDeque;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::control::{option_value, ControlKind};
use crate::dom::{Document, NodeId};
use crate::request::{FieldValue, Request};

/// Class token added to the form once any submitted key matched a control
pub const POPULATED_CLASS: &str = "form_populated";

/// One control touched while populating
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionItem {
    /// `label[for]` of the control; never set for checkboxes and radios
    pub label: Option<NodeId>,
    /// The value the control ended up with
    pub value: String,
    pub control: NodeId,
}

/// Touched controls keyed by submitted name, in request order
pub type Submission = IndexMap<String, Vec<SubmissionItem>>;

/// Remaining values for one submitted key. Scalars are compared against
/// every control; sequences are consumed front to back.
#[derive(Debug)]
enum Values<'a> {
    Scalar(&'a str),
    Sequence(VecDeque<&'a str>),
}

impl<'a> Values<'a> {
    fn new(value: &'a FieldValue) -> Self {
        match value {
            FieldValue::Scalar(value) => Self::Scalar(value),
            FieldValue::Sequence(values) => {
                Self::Sequence(values.iter().map(String::as_str).collect())
            }
        }
    }

    fn next(&self) -> Option<&'a str> {
        match self {
            Self::Scalar(value) => Some(*value),
            Self::Sequence(values) => values.front().copied(),
        }
    }

    fn consume(&mut self) {
        if let Self::Sequence(values) = self {
            values.pop_front();
        }
    }
}

/// Control name a submitted key addresses: sequences target `name[]`
fn control_name(key: &str, value: &FieldValue) -> String {
    match value {
        FieldValue::Sequence(_) if !key.ends_with("[]") => format!("{key}[]"),
        _ => key.to_string(),
    }
}

/// Apply every submitted value to the matching controls and collect what
/// was touched. Keys without a matching control are ignored.
pub fn populate(doc: &mut Document, request: &Request) -> Submission {
    let mut items = Submission::new();
    let mut matched_keys = 0usize;

    for (key, value) in &request.payload {
        let name = control_name(key, value);
        let controls: Vec<(NodeId, ControlKind)> = doc
            .by_name(&name)
            .into_iter()
            .filter_map(|id| ControlKind::of(doc, id).map(|kind| (id, kind)))
            .collect();
        if controls.is_empty() {
            trace!(key = key.as_str(), "no control for submitted key");
            continue;
        }
        matched_keys += 1;

        let mut values = Values::new(value);
        let touched = items.entry(key.clone()).or_default();
        for (control, kind) in controls {
            if let Some(item) = apply(doc, control, kind, &mut values) {
                touched.push(item);
            }
        }
    }

    if matched_keys > 0 {
        let root = doc.root();
        doc.add_class(root, POPULATED_CLASS);
    }
    debug!(matched_keys, submitted = request.payload.len(), "populated form");

    items
}

fn apply(
    doc: &mut Document,
    control: NodeId,
    kind: ControlKind,
    values: &mut Values<'_>,
) -> Option<SubmissionItem> {
    match kind {
        ControlKind::Checkbox | ControlKind::Radio => apply_checkable(doc, control, values),
        ControlKind::TextInput | ControlKind::Hidden => Some(apply_value(doc, control, values)),
        ControlKind::ButtonLike if doc.is_tag(control, "input") => {
            Some(apply_value(doc, control, values))
        }
        ControlKind::ButtonLike => None,
        ControlKind::Textarea => {
            let text = values.next().unwrap_or_default().to_string();
            doc.set_text(control, &text);
            values.consume();
            Some(item(doc, control, text))
        }
        ControlKind::Select => Some(apply_select(doc, control, values)),
    }
}

fn apply_checkable(
    doc: &mut Document,
    control: NodeId,
    values: &mut Values<'_>,
) -> Option<SubmissionItem> {
    let checked = match (doc.attr(control, "value"), values.next()) {
        (Some(own), Some(next)) => own == next,
        (None, Some(next)) => next == "on",
        (_, None) => false,
    };

    if !checked {
        doc.remove_attr(control, "checked");
        return None;
    }

    doc.set_attr(control, "checked", "checked");
    values.consume();
    let value = doc.attr(control, "value").unwrap_or("on").to_string();
    Some(SubmissionItem {
        label: None,
        value,
        control,
    })
}

fn apply_value(doc: &mut Document, control: NodeId, values: &mut Values<'_>) -> SubmissionItem {
    let value = values.next().unwrap_or_default().to_string();
    doc.set_attr(control, "value", value.as_str());
    values.consume();
    item(doc, control, value)
}

fn apply_select(doc: &mut Document, select: NodeId, values: &mut Values<'_>) -> SubmissionItem {
    let mut chosen = Vec::new();
    for option in doc.options(select) {
        let own = option_value(doc, option);
        if values.next() == Some(own.as_str()) {
            doc.set_attr(option, "selected", "selected");
            values.consume();
            chosen.push(own);
        } else {
            doc.remove_attr(option, "selected");
        }
    }
    item(doc, select, chosen.join(", "))
}

fn item(doc: &Document, control: NodeId, value: String) -> SubmissionItem {
    SubmissionItem {
        label: doc.attr(control, "id").and_then(|id| doc.label_for(id)),
        value,
        control,
    }
}
