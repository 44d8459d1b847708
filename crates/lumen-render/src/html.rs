//! HTML serialization of rendered trees.
//!
//! Inline `<svg>` subtrees are written XML-style (empty elements self-close) so they can be
//! extracted and parsed as standalone SVG.

use crate::svg::escape_xml_into;
use lumen_core::script::value::format_number;
use lumen_core::{AttrValue, Element, VNode};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

pub fn render_html(node: &VNode) -> String {
    let mut out = String::new();
    render_html_into(&mut out, node);
    out
}

pub fn render_html_into(out: &mut String, node: &VNode) {
    write_node(out, node, false);
}

fn write_node(out: &mut String, node: &VNode, in_svg: bool) {
    match node {
        VNode::Text(text) => escape_xml_into(out, text),
        VNode::Fragment(children) => {
            for child in children {
                write_node(out, child, in_svg);
            }
        }
        VNode::Element(el) => write_element(out, el, in_svg),
        VNode::Empty => {}
    }
}

fn write_element(out: &mut String, el: &Element, in_svg: bool) {
    if !is_valid_name(&el.tag) {
        tracing::warn!(tag = %el.tag, "dropping element with an invalid tag name");
        return;
    }
    let in_svg = in_svg || el.tag == "svg";
    out.push('<');
    out.push_str(&el.tag);
    for (name, value) in &el.attrs {
        write_attr(out, name, value);
    }

    if in_svg && el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if !in_svg && VOID_ELEMENTS.contains(&el.tag.as_str()) {
        return;
    }
    for child in &el.children {
        write_node(out, child, in_svg);
    }
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

fn write_attr(out: &mut String, name: &str, value: &AttrValue) {
    if !is_valid_name(name) {
        tracing::warn!(attr = %name, "dropping attribute with an invalid name");
        return;
    }
    match value {
        AttrValue::Text(text) => push_attr(out, name, text),
        AttrValue::Number(n) => push_attr(out, name, &format_number(*n)),
        AttrValue::Bool(true) => {
            out.push(' ');
            out.push_str(name);
        }
        AttrValue::Style(style) if !style.is_empty() => {
            let css = style
                .iter()
                .map(|(k, v)| format!("{k}:{v}"))
                .collect::<Vec<_>>()
                .join(";");
            push_attr(out, name, &css);
        }
        AttrValue::Bool(false)
        | AttrValue::Style(_)
        | AttrValue::Handler(_)
        | AttrValue::Callback(_) => {}
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_xml_into(out, value);
    out.push('"');
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn escapes_text_and_attributes() {
        let node: VNode = Element::new("p")
            .attr("title", r#"a "b" & <c>"#)
            .child("1 < 2 && <div>")
            .into();
        assert_eq!(
            render_html(&node),
            r#"<p title="a &quot;b&quot; &amp; &lt;c&gt;">1 &lt; 2 &amp;&amp; &lt;div&gt;</p>"#
        );
    }

    #[test]
    fn attribute_kinds() {
        let mut style = IndexMap::new();
        style.insert("color".to_string(), "red".to_string());
        style.insert("margin-top".to_string(), "8px".to_string());
        let node: VNode = Element::new("input")
            .attr("disabled", true)
            .attr("hidden", false)
            .attr("width", 0.5)
            .attr("style", AttrValue::Style(style))
            .attr("onClick", AttrValue::Handler("click".into()))
            .attr("bad name", "x")
            .into();
        assert_eq!(
            render_html(&node),
            r#"<input disabled width="0.5" style="color:red;margin-top:8px">"#
        );
    }

    #[test]
    fn svg_children_self_close() {
        let node: VNode = Element::new("div")
            .child(Element::new("br"))
            .child(
                Element::new("svg")
                    .child(Element::new("path").attr("d", "M0,0"))
                    .child(Element::new("g")),
            )
            .child(Element::new("span"))
            .into();
        assert_eq!(
            render_html(&node),
            r#"<div><br><svg><path d="M0,0"/><g/></svg><span></span></div>"#
        );
    }
}
