//! Predicate-based node selection
//!
//! [`Query`] covers the subset of XPath the form pipeline needs: tag name,
//! attribute presence/absence, attribute equality or substring, class tokens,
//! all evaluated in document order below a scope node.

use crate::dom::model::{Document, NodeId};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Predicate {
    Tag(String),
    HasAttr(String),
    LacksAttr(String),
    AttrEq(String, String),
    AttrNe(String, String),
    AttrContains(String, String),
    Class(String),
}

/// A conjunction of element predicates
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    predicates: Vec<Predicate>,
}

impl Query {
    /// Match every element
    pub fn any() -> Self {
        Self::default()
    }

    /// Match elements with the given tag name
    pub fn tag(name: &str) -> Self {
        Self::any().and_tag(name)
    }

    pub fn and_tag(mut self, name: &str) -> Self {
        self.predicates.push(Predicate::Tag(name.to_string()));
        self
    }

    pub fn with_attr(mut self, name: &str) -> Self {
        self.predicates.push(Predicate::HasAttr(name.to_string()));
        self
    }

    pub fn without_attr(mut self, name: &str) -> Self {
        self.predicates.push(Predicate::LacksAttr(name.to_string()));
        self
    }

    pub fn attr_eq(mut self, name: &str, value: &str) -> Self {
        self.predicates
            .push(Predicate::AttrEq(name.to_string(), value.to_string()));
        self
    }

    /// Attribute present and not equal to `value`
    pub fn attr_ne(mut self, name: &str, value: &str) -> Self {
        self.predicates
            .push(Predicate::AttrNe(name.to_string(), value.to_string()));
        self
    }

    pub fn attr_contains(mut self, name: &str, needle: &str) -> Self {
        self.predicates
            .push(Predicate::AttrContains(name.to_string(), needle.to_string()));
        self
    }

    pub fn class(mut self, token: &str) -> Self {
        self.predicates.push(Predicate::Class(token.to_string()));
        self
    }

    /// Whether `id` is an element satisfying every predicate
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        if !doc.is_element(id) {
            return false;
        }
        self.predicates.iter().all(|predicate| match predicate {
            Predicate::Tag(name) => doc.is_tag(id, name),
            Predicate::HasAttr(name) => doc.has_attr(id, name),
            Predicate::LacksAttr(name) => !doc.has_attr(id, name),
            Predicate::AttrEq(name, value) => doc.attr(id, name) == Some(value.as_str()),
            Predicate::AttrNe(name, value) => {
                doc.attr(id, name).is_some_and(|actual| actual != value)
            }
            Predicate::AttrContains(name, needle) => {
                doc.attr(id, name).is_some_and(|actual| actual.contains(needle.as_str()))
            }
            Predicate::Class(token) => doc.has_class(id, token),
        })
    }
}

impl Document {
    /// All attached elements matching `query`, in document order
    pub fn select(&self, query: &Query) -> Vec<NodeId> {
        self.select_within(self.root(), query)
    }

    /// Elements at or below `scope` matching `query`, in document order
    pub fn select_within(&self, scope: NodeId, query: &Query) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| query.matches(self, id))
            .collect()
    }

    /// First attached element matching `query`
    pub fn select_first(&self, query: &Query) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&id| query.matches(self, id))
    }

    /// Named controls that take part in validation: `name` present,
    /// neither `disabled` nor `readonly`
    pub fn named_controls(&self) -> Vec<NodeId> {
        self.select(
            &Query::any()
                .with_attr("name")
                .without_attr("disabled")
                .without_attr("readonly"),
        )
    }

    /// Elements whose `name` is exactly `name`
    pub fn by_name(&self, name: &str) -> Vec<NodeId> {
        self.select(&Query::any().attr_eq("name", name))
    }

    /// The first `label` whose `for` equals `id`
    pub fn label_for(&self, id: &str) -> Option<NodeId> {
        self.select_first(&Query::tag("label").attr_eq("for", id))
    }

    /// The label describing a control: its enclosing `label`, else the
    /// `label[for]` pointing at its id
    pub fn label_of(&self, control: NodeId) -> Option<NodeId> {
        if let Some(parent) = self.parent(control).filter(|&p| self.is_tag(p, "label")) {
            return Some(parent);
        }
        self.attr(control, "id").and_then(|id| self.label_for(id))
    }

    /// `option` elements below `select` carrying `selected`
    pub fn selected_options(&self, select: NodeId) -> Vec<NodeId> {
        self.select_within(select, &Query::tag("option").with_attr("selected"))
    }

    /// Every `option` element below `select`
    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.select_within(select, &Query::tag("option"))
    }

    /// Elements carrying the class token
    pub fn with_class(&self, token: &str) -> Vec<NodeId> {
        self.select(&Query::any().class(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;

    const MARKUP: &str = r#"<form class="a b">
  <label for="name">Name</label>
  <input id="name" name="name" type="text" value="Ann"/>
  <input name="locked" readonly="readonly"/>
  <input name="off" disabled="disabled"/>
  <label><input type="checkbox" name="agree"/> I agree</label>
  <select name="size">
    <option>S</option>
    <optgroup label="big"><option selected="selected">L</option></optgroup>
  </select>
</form>"#;

    #[test]
    fn test_named_controls_skip_disabled_and_readonly() -> crate::Result<()> {
        let doc = parse(MARKUP)?;
        let names: Vec<&str> = doc
            .named_controls()
            .into_iter()
            .filter_map(|id| doc.attr(id, "name"))
            .collect();
        assert_eq!(names, vec!["name", "agree", "size"]);
        Ok(())
    }

    #[test]
    fn test_label_lookup() -> crate::Result<()> {
        let doc = parse(MARKUP)?;
        let name = doc.by_name("name");
        let label = name.first().and_then(|&id| doc.label_of(id));
        assert_eq!(label.map(|id| doc.text_content(id)), Some("Name".to_string()));

        let agree = doc.by_name("agree");
        let label = agree.first().and_then(|&id| doc.label_of(id));
        assert_eq!(label.map(|id| doc.text_content(id)), Some(" I agree".to_string()));
        Ok(())
    }

    #[test]
    fn test_selected_options_descend_into_groups() -> crate::Result<()> {
        let doc = parse(MARKUP)?;
        let select = doc.by_name("size");
        let selected = select
            .first()
            .map(|&id| doc.selected_options(id))
            .unwrap_or_default();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected.first().map(|&id| doc.text_content(id)), Some("L".to_string()));
        Ok(())
    }

    #[test]
    fn test_attribute_predicates() -> crate::Result<()> {
        let doc = parse(MARKUP)?;
        assert_eq!(doc.with_class("b"), vec![doc.root()]);
        let query = Query::tag("input").attr_eq("type", "text").attr_ne("value", "").attr_contains("name", "am");
        assert_eq!(doc.select(&query), doc.by_name("name"));
        assert!(doc.select(&Query::tag("input").attr_ne("value", "Ann")).is_empty());
        Ok(())
    }
}
