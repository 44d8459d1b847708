//! Conversion of script values into render-tree nodes (host elements, children, styles).

use super::error::RuntimeError;
use super::value::{Props, Value, format_number};
use crate::vnode::{AttrValue, Element, VNode};
use indexmap::IndexMap;

const MAX_CHILD_DEPTH: usize = 512;

/// CSS properties React leaves unitless when given a number.
const UNITLESS_STYLES: &[&str] = &[
    "animationIterationCount",
    "aspectRatio",
    "columnCount",
    "columns",
    "flex",
    "flexGrow",
    "flexShrink",
    "fillOpacity",
    "floodOpacity",
    "fontWeight",
    "gridColumn",
    "gridRow",
    "lineClamp",
    "lineHeight",
    "opacity",
    "order",
    "orphans",
    "scale",
    "stopOpacity",
    "strokeDashoffset",
    "strokeMiterlimit",
    "strokeOpacity",
    "strokeWidth",
    "tabSize",
    "widows",
    "zIndex",
    "zoom",
];

/// camelCase prop names that map to hyphenated SVG/HTML attributes.
const HYPHENATED_ATTRS: &[(&str, &str)] = &[
    ("acceptCharset", "accept-charset"),
    ("alignmentBaseline", "alignment-baseline"),
    ("clipPath", "clip-path"),
    ("clipRule", "clip-rule"),
    ("dominantBaseline", "dominant-baseline"),
    ("fillOpacity", "fill-opacity"),
    ("fillRule", "fill-rule"),
    ("floodColor", "flood-color"),
    ("floodOpacity", "flood-opacity"),
    ("fontFamily", "font-family"),
    ("fontSize", "font-size"),
    ("fontStyle", "font-style"),
    ("fontWeight", "font-weight"),
    ("httpEquiv", "http-equiv"),
    ("letterSpacing", "letter-spacing"),
    ("markerEnd", "marker-end"),
    ("markerMid", "marker-mid"),
    ("markerStart", "marker-start"),
    ("paintOrder", "paint-order"),
    ("pointerEvents", "pointer-events"),
    ("shapeRendering", "shape-rendering"),
    ("stopColor", "stop-color"),
    ("stopOpacity", "stop-opacity"),
    ("strokeDasharray", "stroke-dasharray"),
    ("strokeDashoffset", "stroke-dashoffset"),
    ("strokeLinecap", "stroke-linecap"),
    ("strokeLinejoin", "stroke-linejoin"),
    ("strokeMiterlimit", "stroke-miterlimit"),
    ("strokeOpacity", "stroke-opacity"),
    ("strokeWidth", "stroke-width"),
    ("textAnchor", "text-anchor"),
    ("textDecoration", "text-decoration"),
    ("transformOrigin", "transform-origin"),
    ("vectorEffect", "vector-effect"),
    ("xlinkHref", "xlink:href"),
    ("xmlSpace", "xml:space"),
];

pub fn attr_name(prop: &str) -> &str {
    match prop {
        "className" => "class",
        "htmlFor" => "for",
        _ => HYPHENATED_ATTRS
            .iter()
            .find(|(camel, _)| *camel == prop)
            .map_or(prop, |(_, attr)| attr),
    }
}

/// `backgroundColor` → `background-color`, `WebkitTransform` → `-webkit-transform`,
/// `msFlex` → `-ms-flex`.
pub fn css_property_name(key: &str) -> String {
    if key.starts_with("--") {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    if out.starts_with("ms-") {
        out.insert(0, '-');
    }
    out
}

/// Style object → ordered CSS declarations. Numbers get `px` unless the property is unitless.
pub fn style_map(value: &Value) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    let Value::Object(map) = value else {
        return out;
    };
    for (key, v) in map.borrow().iter() {
        let css = match v {
            Value::Number(n) if *n == 0.0 || UNITLESS_STYLES.contains(&key.as_str()) => {
                format_number(*n)
            }
            Value::Number(n) => format!("{}px", format_number(*n)),
            Value::String(s) => s.to_string(),
            _ => continue,
        };
        out.insert(css_property_name(key), css);
    }
    out
}

/// Builds a host element (`<div>`, `<svg>`, ...) from JSX props.
pub fn host_element(
    tag: &str,
    props: &Props,
    children: Vec<VNode>,
) -> Result<VNode, RuntimeError> {
    let mut el = Element::new(tag);
    for (key, value) in props.iter() {
        if let Some((name, attr)) = host_attr(key, value) {
            el.attrs.insert(name, attr);
        }
    }

    el.children = if children.is_empty() {
        match props.get("children") {
            Some(value) => vec![to_vnode(value)?],
            None => Vec::new(),
        }
    } else {
        children
    };
    Ok(VNode::Element(el))
}

fn host_attr(key: &str, value: &Value) -> Option<(String, AttrValue)> {
    match key {
        "key" | "ref" | "children" => return None,
        "dangerouslySetInnerHTML" => {
            tracing::warn!("ignoring dangerouslySetInnerHTML on a host element");
            return None;
        }
        "style" if matches!(value, Value::Object(_)) => {
            return Some(("style".to_string(), AttrValue::Style(style_map(value))));
        }
        _ => {}
    }

    if let Some(event) = key.strip_prefix("on") {
        if event.starts_with(|c: char| c.is_ascii_uppercase()) {
            return value
                .is_callable()
                .then(|| (key.to_string(), AttrValue::Handler(event.to_ascii_lowercase())));
        }
    }

    let name = attr_name(key).to_string();
    let stringly_bool = name.starts_with("aria-") || name.starts_with("data-");
    let attr = match value {
        Value::String(s) => AttrValue::Text(s.to_string()),
        Value::Number(n) => AttrValue::Number(*n),
        Value::Bool(b) if stringly_bool => AttrValue::Text(b.to_string()),
        Value::Bool(true) => AttrValue::Bool(true),
        Value::Array(_) => AttrValue::Text(value.to_js_string()),
        _ => return None,
    };
    Some((name, attr))
}

/// Converts a rendered value into a child node the way React treats children: strings and
/// numbers become text, booleans and nullish values render nothing, arrays flatten.
pub fn to_vnode(value: &Value) -> Result<VNode, RuntimeError> {
    to_vnode_at(value, 0)
}

fn to_vnode_at(value: &Value, depth: usize) -> Result<VNode, RuntimeError> {
    if depth > MAX_CHILD_DEPTH {
        return Err(RuntimeError::range("Children nested too deeply"));
    }
    Ok(match value {
        Value::Node(node) => node.as_ref().clone(),
        Value::String(s) => VNode::Text(s.to_string()),
        Value::Number(n) => VNode::Text(format_number(*n)),
        Value::Bool(_) | Value::Null | Value::Undefined => VNode::Empty,
        Value::Array(items) => VNode::Fragment(
            items
                .borrow()
                .iter()
                .map(|item| to_vnode_at(item, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let keys: Vec<_> = map.borrow().keys().cloned().collect();
            return Err(RuntimeError::error(format!(
                "Objects are not valid as a child (found: object with keys {{{}}}). \
                 If you meant to render a collection of children, use an array instead.",
                keys.join(", ")
            )));
        }
        Value::Function(_) | Value::Native(_) | Value::Component(_) => {
            tracing::warn!("functions are not valid as a child; rendering nothing");
            VNode::Empty
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(entries: &[(&str, Value)]) -> Value {
        Value::object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn style_objects_become_css_with_px_for_lengths() {
        let style = style_map(&obj(&[
            ("backgroundColor", Value::from("red")),
            ("marginTop", Value::from(8.0)),
            ("opacity", Value::from(0.5)),
            ("zIndex", Value::from(2.0)),
            ("WebkitTransform", Value::from("none")),
            ("--accent", Value::from("#fff")),
            ("color", Value::Null),
        ]));
        let pairs: Vec<_> = style.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("background-color", "red"),
                ("margin-top", "8px"),
                ("opacity", "0.5"),
                ("z-index", "2"),
                ("-webkit-transform", "none"),
                ("--accent", "#fff"),
            ]
        );
    }

    #[test]
    fn host_element_maps_prop_names_and_drops_non_attributes() {
        let mut props = Props::new();
        props.insert("className", Value::from("card"));
        props.insert("strokeWidth", Value::from(2.0));
        props.insert("disabled", Value::Bool(false));
        props.insert("aria-hidden", Value::Bool(true));
        props.insert("key", Value::from("k"));
        props.insert("onClick", Value::Null);
        let node = host_element("rect", &props, vec![]).expect("element");
        let el = node.as_element().expect("element");
        let names: Vec<_> = el.attrs.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["class", "stroke-width", "aria-hidden"]);
        assert_eq!(el.attr_str("aria-hidden"), Some("true"));
    }

    #[test]
    fn children_follow_react_rules() {
        let value = Value::array(vec![
            Value::from("a"),
            Value::from(1.0),
            Value::Bool(false),
            Value::Null,
        ]);
        let node = to_vnode(&value).expect("children");
        assert_eq!(node.text_content(), "a1");

        let err = to_vnode(&obj(&[("x", Value::from(1.0))])).expect_err("object child");
        assert!(err.message.contains("{x}"), "{}", err.message);
    }
}
