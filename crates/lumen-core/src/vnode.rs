//! Render tree produced by executing a block.
//!
//! Plain data: no script values, no interior mutability, `Send + Sync`, serializable. Both the
//! HTML serializer and the JSON output of the CLI read this tree.

use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum VNode {
    Element(Element),
    Text(String),
    Fragment(Vec<VNode>),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub tag: String,
    pub attrs: IndexMap<String, AttrValue>,
    pub children: Vec<VNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrValue {
    Text(String),
    Number(f64),
    /// Boolean attributes: present when `true`, omitted when `false`.
    Bool(bool),
    Style(IndexMap<String, String>),
    /// An event handler was attached; the headless tree records only the event name.
    Handler(String),
    /// A generated function retained by the executing interpreter (see `Invoke::retain`).
    /// Meaningful only while that execution runs; serializers skip it.
    Callback(usize),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        AttrValue::Number(n)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name)? {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        match self.attrs.get(name)? {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr_str("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }
}

impl From<Element> for VNode {
    fn from(el: Element) -> Self {
        VNode::Element(el)
    }
}

impl From<&str> for VNode {
    fn from(s: &str) -> Self {
        VNode::Text(s.to_string())
    }
}

impl From<String> for VNode {
    fn from(s: String) -> Self {
        VNode::Text(s)
    }
}

impl VNode {
    pub fn text(s: impl Into<String>) -> Self {
        VNode::Text(s.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            VNode::Element(el) => Some(el),
            _ => None,
        }
    }

    /// True when the node renders nothing at all.
    pub fn is_blank(&self) -> bool {
        match self {
            VNode::Empty => true,
            VNode::Text(t) => t.is_empty(),
            VNode::Fragment(children) => children.iter().all(VNode::is_blank),
            VNode::Element(_) => false,
        }
    }

    /// Concatenated text of this subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            VNode::Text(t) => out.push_str(t),
            VNode::Element(el) => el.children.iter().for_each(|c| c.collect_text(out)),
            VNode::Fragment(children) => children.iter().for_each(|c| c.collect_text(out)),
            VNode::Empty => {}
        }
    }

    /// First element (depth-first, pre-order) matching `pred`.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        match self {
            VNode::Element(el) => {
                if pred(el) {
                    return Some(el);
                }
                el.children.iter().find_map(|c| c.find(pred))
            }
            VNode::Fragment(children) => children.iter().find_map(|c| c.find(pred)),
            _ => None,
        }
    }

    pub fn find_tag(&self, tag: &str) -> Option<&Element> {
        self.find(&|el| el.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_find_and_text_content() {
        let tree: VNode = Element::new("div")
            .attr("class", "card wide")
            .child(Element::new("b").child("hi"))
            .child(VNode::Fragment(vec![" there".into(), VNode::Empty]))
            .into();
        assert_eq!(tree.text_content(), "hi there");
        assert!(tree.find_tag("b").is_some());
        assert!(tree.as_element().is_some_and(|el| el.has_class("wide")));
        assert!(VNode::Fragment(vec![VNode::Empty, "".into()]).is_blank());
    }

    #[test]
    fn serializes_with_type_tags() {
        let tree: VNode = Element::new("p").attr("hidden", true).child("x").into();
        let json = serde_json::to_value(&tree).expect("serialize");
        assert_eq!(json["type"], "element");
        assert_eq!(json["value"]["tag"], "p");
        assert_eq!(json["value"]["attrs"]["hidden"]["bool"], true);
        assert_eq!(json["value"]["children"][0]["value"], "x");
    }
}
