//! Error presentation: the error banner, autofocus, and diagnostic panels

use std::sync::LazyLock;

use regex::Regex;

use crate::dom::serialize::escape_text;
use crate::dom::{Document, NodeId, Query};

/// Class token marking the element that shows the form-level error message
pub const ERROR_CONTAINER_CLASS: &str = "form_error_message";

#[allow(clippy::expect_used)]
static HIDING_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)display:\s*none\s*;?|visibility:\s*hidden\s*;?").expect("style pattern is valid")
});

/// Show `message` in every error container, creating one at the top of the
/// form when the markup has none. Calling it again replaces the message.
pub fn present_errors(doc: &mut Document, message: &str) {
    let containers = doc.with_class(ERROR_CONTAINER_CLASS);

    if containers.is_empty() {
        let notice = doc.create_element("p");
        doc.set_attr(notice, "class", ERROR_CONTAINER_CLASS);
        let em = doc.create_element_with_text("em", message);
        doc.append_child(notice, em);
        let root = doc.root();
        let first = doc.first_child(root);
        doc.insert_before(root, notice, first);
        return;
    }

    for container in containers {
        doc.clear_children(container);
        let em = doc.create_element_with_text("em", message);
        doc.append_child(container, em);
        reveal(doc, container);
    }
}

/// Undo the ways authors hide an empty container: `hidden` and inline
/// `display:none` / `visibility:hidden`
fn reveal(doc: &mut Document, id: NodeId) {
    doc.remove_attr(id, "hidden");
    let Some(style) = doc.attr(id, "style") else {
        return;
    };
    let cleaned = HIDING_STYLE.replace_all(style, "").trim().to_string();
    if cleaned.is_empty() {
        doc.remove_attr(id, "style");
    } else {
        doc.set_attr(id, "style", cleaned);
    }
}

/// Move autofocus to `target`, clearing it everywhere else
pub fn set_autofocus(doc: &mut Document, target: NodeId) {
    for id in doc.select(&Query::any().with_attr("autofocus")) {
        doc.remove_attr(id, "autofocus");
    }
    doc.set_attr(target, "autofocus", "autofocus");
}

/// The first `type="submit"` control
pub fn submit_control(doc: &Document) -> Option<NodeId> {
    doc.select_first(&Query::any().attr_eq("type", "submit"))
}

/// Inline diagnostic shown instead of a form that cannot be rendered.
/// `message` is trusted markup; `heading` and `source` are escaped.
pub fn diagnostic_panel(heading: &str, message: &str, source: Option<&str>) -> String {
    let mut html = String::from("<p style=\"color:red\"><em>");
    html.push_str("<strong>");
    html.push_str(&escape_text(heading));
    html.push_str("</strong>: ");
    html.push_str(message);
    html.push_str("</em></p>");
    if let Some(source) = source.filter(|s| !s.is_empty()) {
        html.push_str(
            "<pre style=\"margin-left:5px; border-left:solid 1px red; padding-left:5px;\"><code class=\"xhtml malformed\">",
        );
        html.push_str(&escape_text(source));
        html.push_str("</code></pre>");
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;

    #[test]
    fn test_creates_banner_as_first_child() -> crate::Result<()> {
        let mut doc = parse("<form><input name=\"a\"/></form>")?;
        present_errors(&mut doc, "Oops");
        assert_eq!(
            doc.to_markup(),
            "<form><p class=\"form_error_message\"><em>Oops</em></p><input name=\"a\"/></form>"
        );
        Ok(())
    }

    #[test]
    fn test_presenting_twice_keeps_one_banner() -> crate::Result<()> {
        let mut doc = parse("<form><input name=\"a\"/></form>")?;
        present_errors(&mut doc, "first");
        present_errors(&mut doc, "second");
        let banners = doc.with_class(ERROR_CONTAINER_CLASS);
        assert_eq!(banners.len(), 1);
        assert_eq!(banners.first().map(|&id| doc.text_content(id)), Some("second".to_string()));
        Ok(())
    }

    #[test]
    fn test_existing_container_is_filled_and_revealed() -> crate::Result<()> {
        let mut doc = parse(
            "<form><div class=\"note form_error_message\" hidden=\"hidden\" style=\"color:red; display: none;\">placeholder <b>x</b></div></form>",
        )?;
        present_errors(&mut doc, "Fix it");
        assert_eq!(
            doc.to_markup(),
            "<form><div class=\"note form_error_message\" style=\"color:red;\"><em>Fix it</em></div></form>"
        );
        Ok(())
    }

    #[test]
    fn test_style_removed_when_only_hiding() -> crate::Result<()> {
        let mut doc = parse("<form><p class=\"form_error_message\" style=\"visibility:hidden\"/></form>")?;
        present_errors(&mut doc, "x");
        let banner = doc.with_class(ERROR_CONTAINER_CLASS).first().copied();
        assert_eq!(banner.and_then(|id| doc.attr(id, "style")), None);
        Ok(())
    }

    #[test]
    fn test_autofocus_moves() -> crate::Result<()> {
        let mut doc = parse(
            "<form><input name=\"a\" autofocus=\"autofocus\"/><input name=\"b\"/><input type=\"submit\" value=\"Send\"/></form>",
        )?;
        let b = doc.by_name("b").first().copied();
        if let Some(b) = b {
            set_autofocus(&mut doc, b);
        }
        let focused = doc.select(&Query::any().with_attr("autofocus"));
        assert_eq!(focused, doc.by_name("b"));

        if let Some(submit) = submit_control(&doc) {
            set_autofocus(&mut doc, submit);
        }
        let focused = doc.select(&Query::any().with_attr("autofocus"));
        assert_eq!(focused.first().copied(), submit_control(&doc));
        assert_eq!(focused.len(), 1);
        Ok(())
    }

    #[test]
    fn test_diagnostic_panel_escapes_source() {
        let html = diagnostic_panel("XML Parse Error", "bad <code>f</code>", Some("<form>&"));
        assert!(html.contains("<strong>XML Parse Error</strong>: bad <code>f</code>"));
        assert!(html.contains("<code class=\"xhtml malformed\">&lt;form&gt;&amp;</code>"));
        assert!(!diagnostic_panel("E", "m", None).contains("<pre"));
    }
}
