//! Control stripping: turn a filled-in form into static markup for email

use tracing::debug;

use crate::control::ControlKind;
use crate::dom::{Document, FilterChain, NodeId, Query};

/// Default text shown in place of an empty field
pub const EMPTY_PLACEHOLDER: &str = "(Empty)";

/// Consume a document and return its control-free rendering, serialized
/// through `filters`
pub fn strip(mut doc: Document, filters: &FilterChain, empty_placeholder: &str) -> String {
    strip_controls(&mut doc, empty_placeholder);
    doc.serialize(filters)
}

/// Replace every named control with a static equivalent, then drop all
/// remaining buttons
pub fn strip_controls(doc: &mut Document, empty_placeholder: &str) {
    let named = doc.select(&Query::any().with_attr("name"));
    let mut replaced = 0usize;

    for control in named {
        if !doc.is_attached(control) {
            continue;
        }
        let Some(kind) = ControlKind::of(doc, control) else {
            continue;
        };

        let replacement = match kind {
            ControlKind::Checkbox | ControlKind::Radio => checkable_replacement(doc, control),
            ControlKind::Hidden | ControlKind::ButtonLike => None,
            ControlKind::TextInput => {
                let value = doc.attr_or_empty(control, "value").to_string();
                Some(text_or_placeholder(doc, &value, empty_placeholder))
            }
            ControlKind::Select => select_replacement(doc, control),
            ControlKind::Textarea => {
                let text = doc.text_content(control);
                if text.is_empty() {
                    Some(placeholder(doc, empty_placeholder))
                } else {
                    Some(doc.create_element_with_text("pre", &text))
                }
            }
        };

        match replacement {
            Some(node) if doc.is_attached(control) => {
                doc.replace(control, node);
                replaced += 1;
            }
            _ => doc.detach(control),
        }
    }

    for button in doc.select(&Query::tag("button")) {
        doc.detach(button);
    }
    debug!(replaced, "stripped form controls");
}

/// A checked box becomes its label text (with the raw value as a tooltip);
/// the label goes away either way
fn checkable_replacement(doc: &mut Document, control: NodeId) -> Option<NodeId> {
    let label = doc.label_of(control);

    if !doc.has_attr(control, "checked") {
        if let Some(label) = label {
            doc.detach(label);
        }
        return None;
    }

    let value = doc.attr_or_empty(control, "value").to_string();
    let replacement = match label {
        Some(label) => {
            let text = doc.text_content(label).trim().to_string();
            if value.is_empty() {
                doc.create_text(&text)
            } else {
                abbr(doc, &value, &text)
            }
        }
        None => doc.create_text(&value),
    };

    if let Some(label) = label {
        if doc.parent(control) == Some(label) {
            doc.replace(label, control);
        } else {
            doc.detach(label);
        }
    }

    Some(replacement)
}

fn select_replacement(doc: &mut Document, select: NodeId) -> Option<NodeId> {
    let selected = doc.selected_options(select);
    match selected.as_slice() {
        [] => None,
        [option] => Some(option_display(doc, *option)),
        options => {
            let list = doc.create_element("ul");
            for &option in options {
                let item = doc.create_element("li");
                let contents = option_display(doc, option);
                doc.append_child(item, contents);
                doc.append_child(list, item);
            }
            Some(list)
        }
    }
}

/// Option text, wrapped in an `abbr` carrying the value when it has one
fn option_display(doc: &mut Document, option: NodeId) -> NodeId {
    let text = doc.text_content(option);
    let value = doc.attr_or_empty(option, "value").to_string();
    if value.is_empty() {
        doc.create_text(&text)
    } else {
        abbr(doc, &value, &text)
    }
}

fn abbr(doc: &mut Document, title: &str, text: &str) -> NodeId {
    let node = doc.create_element_with_text("abbr", text);
    doc.set_attr(node, "title", title);
    node
}

fn text_or_placeholder(doc: &mut Document, value: &str, empty_placeholder: &str) -> NodeId {
    if value.is_empty() {
        placeholder(doc, empty_placeholder)
    } else {
        doc.create_text(value)
    }
}

fn placeholder(doc: &mut Document, text: &str) -> NodeId {
    doc.create_element_with_text("em", text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;

    fn stripped(markup: &str) -> crate::Result<String> {
        Ok(strip(parse(markup)?, &FilterChain::default(), EMPTY_PLACEHOLDER))
    }

    #[test]
    fn test_static_content_untouched() -> crate::Result<()> {
        let markup = "<form><h2>Contact</h2><p>We reply <b>fast</b> &amp; kindly.</p></form>";
        assert_eq!(stripped(markup)?, markup);
        Ok(())
    }

    #[test]
    fn test_checked_radio_becomes_label_abbr() -> crate::Result<()> {
        let out = stripped(
            r#"<form><input type="radio" name="opt" id="a" value="a" checked="checked"/><label for="a">Option A</label><input type="radio" name="opt" id="b" value="b"/><label for="b">Option B</label></form>"#,
        )?;
        assert_eq!(out, r#"<form><abbr title="a">Option A</abbr></form>"#);
        Ok(())
    }

    #[test]
    fn test_checkbox_inside_label_is_unwrapped() -> crate::Result<()> {
        let out = stripped(
            r#"<form><p><label><input type="checkbox" name="agree" checked="checked"/> I agree</label></p><p><label><input type="checkbox" name="news" value="yes"/> News</label></p></form>"#,
        )?;
        assert_eq!(out, "<form><p>I agree</p><p/></form>");
        Ok(())
    }

    #[test]
    fn test_inputs_and_placeholders() -> crate::Result<()> {
        let out = stripped(
            r#"<form><label for="n">Name</label> <input id="n" name="n" value="Ann"/> <input name="phone"/><input type="hidden" name="token" value="x"/><input type="add" name="more"/><textarea name="msg">Hi &lt;there&gt;</textarea><textarea name="empty"/><button type="submit">Send</button></form>"#,
        )?;
        assert_eq!(
            out,
            r#"<form><label for="n">Name</label> Ann <em>(Empty)</em><pre>Hi &lt;there&gt;</pre><em>(Empty)</em></form>"#
        );
        Ok(())
    }

    #[test]
    fn test_select_variants() -> crate::Result<()> {
        let out = stripped(
            r#"<form><select name="none"><option>A</option></select><select name="one"><option selected="selected">Plain</option></select><select name="many" multiple="multiple"><option value="r" selected="selected">Red</option><option value="g">Green</option><option selected="selected">Blue</option></select></form>"#,
        )?;
        assert_eq!(
            out,
            r#"<form>Plain<ul><li><abbr title="r">Red</abbr></li><li>Blue</li></ul></form>"#
        );
        Ok(())
    }

    #[test]
    fn test_clone_leaves_original_untouched() -> crate::Result<()> {
        let doc = parse(r#"<form><input name="a" value="1"/></form>"#)?;
        let before = doc.to_markup();
        let out = strip(doc.clone(), &FilterChain::default(), "-");
        assert_eq!(out, "<form>1</form>");
        assert_eq!(doc.to_markup(), before);
        Ok(())
    }
}
