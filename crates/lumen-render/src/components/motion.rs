//! `motion`: animated elements rendered at their resting (`animate`) state.

use indexmap::IndexMap;
use lumen_core::script::host::{host_element, style_map};
use lumen_core::script::value::format_number;
use lumen_core::script::{Props, RuntimeError, Value};
use lumen_core::{AttrValue, Component, Namespace, VNode, component_fn};
use serde_json::{Map, Value as Json};
use std::sync::Arc;

pub const MOTION_TAGS: &[&str] = &[
    "a", "article", "aside", "button", "circle", "div", "footer", "g", "h1", "h2", "h3", "h4",
    "header", "img", "li", "line", "main", "nav", "ol", "p", "path", "rect", "section", "span",
    "svg", "text", "ul",
];

/// Props that drive animation and never reach the element.
const MOTION_PROPS: &[&str] = &[
    "initial",
    "animate",
    "exit",
    "transition",
    "variants",
    "whileHover",
    "whileTap",
    "whileFocus",
    "whileDrag",
    "whileInView",
    "viewport",
    "drag",
    "dragConstraints",
    "dragElastic",
    "dragMomentum",
    "layout",
    "layoutId",
    "custom",
    "onAnimationStart",
    "onAnimationComplete",
    "onUpdate",
    "onHoverStart",
    "onHoverEnd",
    "onTap",
    "onTapStart",
    "onDragStart",
    "onDragEnd",
    "onViewportEnter",
    "onViewportLeave",
];

/// Animation values without a resting visual effect in a static tree.
const IGNORED_VALUES: &[&str] = &["transition", "transitionEnd", "pathLength", "pathOffset", "pathSpacing"];

pub fn motion_namespace() -> Namespace {
    let mut ns = Namespace::new().with("AnimatePresence", animate_presence());
    for tag in MOTION_TAGS {
        ns.insert(*tag, motion_component(*tag));
    }
    ns
}

fn animate_presence() -> Arc<dyn Component> {
    component_fn("AnimatePresence", |_, _, children| Ok(VNode::Fragment(children)))
}

fn motion_component(tag: &'static str) -> Arc<dyn Component> {
    component_fn(format!("motion.{tag}"), move |_, props, children| {
        render_motion(tag, props, children)
    })
}

fn render_motion(tag: &str, props: &Props, children: Vec<VNode>) -> Result<VNode, RuntimeError> {
    let element_props: Props = props
        .iter()
        .filter(|(key, _)| !MOTION_PROPS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let node = host_element(tag, &element_props, children)?;
    let VNode::Element(mut el) = node else {
        return Ok(node);
    };

    let variants = props.get("variants").cloned().unwrap_or_default();
    let target = props
        .get("animate")
        .filter(|v| !matches!(v, Value::Bool(false)))
        .or_else(|| props.get("whileInView"))
        .map(|v| resolve_target(v, &variants))
        .unwrap_or_default();

    if !target.is_empty() {
        let mut style = match el.attrs.shift_remove("style") {
            Some(AttrValue::Style(style)) => style,
            _ => IndexMap::new(),
        };
        apply_target(&mut style, &target);
        el.attrs.insert("style".to_string(), AttrValue::Style(style));
    }

    let description = motion_description(props)?;
    if !description.is_empty() {
        let encoded = serde_json::to_string(&Json::Object(description))
            .map_err(|e| RuntimeError::error(e.to_string()))?;
        el.attrs.insert("data-motion".to_string(), AttrValue::Text(encoded));
    }
    Ok(VNode::Element(el))
}

/// The resting values of an animation target: an object, a variant name, or a list of variant
/// names merged in order. Keyframe arrays settle on their last frame.
fn resolve_target(target: &Value, variants: &Value) -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    match target {
        Value::Object(map) => {
            for (key, value) in map.borrow().iter() {
                if IGNORED_VALUES.contains(&key.as_str()) {
                    continue;
                }
                let settled = match value {
                    Value::Array(frames) => frames.borrow().last().cloned().unwrap_or_default(),
                    other => other.clone(),
                };
                out.insert(key.clone(), settled);
            }
        }
        Value::String(name) => {
            if let Value::Object(map) = variants {
                let variant = map.borrow().get(&**name).cloned();
                if let Some(variant @ Value::Object(_)) = variant {
                    out = resolve_target(&variant, &Value::Undefined);
                }
            }
        }
        Value::Array(names) => {
            for name in names.borrow().iter() {
                if matches!(name, Value::String(_)) {
                    out.extend(resolve_target(name, variants));
                }
            }
        }
        _ => {}
    }
    out
}

fn length(value: &Value, unit: &str) -> Option<String> {
    match value {
        Value::Number(n) => Some(format!("{}{unit}", format_number(*n))),
        Value::String(s) => Some(s.to_string()),
        _ => None,
    }
}

/// Writes resting values into `style`: transform shorthands become one `transform`, the rest
/// are CSS properties.
fn apply_target(style: &mut IndexMap<String, String>, target: &IndexMap<String, Value>) {
    let mut transforms = Vec::new();
    let mut css = IndexMap::new();
    for (key, value) in target {
        let part = match key.as_str() {
            "x" => length(value, "px").map(|v| format!("translateX({v})")),
            "y" => length(value, "px").map(|v| format!("translateY({v})")),
            "z" => length(value, "px").map(|v| format!("translateZ({v})")),
            "scale" | "scaleX" | "scaleY" => length(value, "").map(|v| format!("{key}({v})")),
            "rotate" | "rotateX" | "rotateY" | "rotateZ" | "skew" | "skewX" | "skewY" => {
                length(value, "deg").map(|v| format!("{key}({v})"))
            }
            _ => {
                css.insert(key.clone(), value.clone());
                continue;
            }
        };
        transforms.extend(part);
    }
    style.extend(style_map(&Value::object(css)));
    if !transforms.is_empty() {
        style.insert("transform".to_string(), transforms.join(" "));
    }
}

/// The animation props as JSON, for a client that wants to replay them.
fn motion_description(props: &Props) -> Result<Map<String, Json>, RuntimeError> {
    let mut out = Map::new();
    for key in ["initial", "animate", "exit", "transition", "whileHover", "whileTap", "whileInView"] {
        if let Some(value) = props.get(key) {
            if let Some(json) = value.to_json()? {
                out.insert(key.to_string(), json);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::render_html;
    use serde_json::json;

    fn props(json: Json) -> Props {
        Props::from_object(&Value::from_json(&json))
    }

    #[test]
    fn renders_the_animate_end_state() {
        let p = props(json!({
            "className": "card",
            "initial": { "opacity": 0, "y": 20 },
            "animate": { "opacity": 1, "y": 0, "scale": [0.8, 1.2, 1] },
            "transition": { "duration": 0.5 },
            "style": { "padding": 8 }
        }));
        let html = render_html(&render_motion("div", &p, vec![VNode::text("hi")]).expect("motion"));
        assert!(html.starts_with(r#"<div class="card" style="padding:8px;opacity:1;transform:translateY(0px) scale(1)""#));
        assert!(html.contains(r#"data-motion="{&quot;initial&quot;:{&quot;opacity&quot;:0,&quot;y&quot;:20}"#));
        assert!(!html.contains("initial="));
        assert!(html.ends_with(">hi</div>"));
    }

    #[test]
    fn variant_names_resolve_through_variants() {
        let p = props(json!({
            "variants": { "hidden": { "opacity": 0 }, "shown": { "opacity": 1, "rotate": 90 } },
            "initial": "hidden",
            "animate": "shown"
        }));
        let node = render_motion("span", &p, Vec::new()).expect("motion");
        let el = node.as_element().expect("element");
        let Some(AttrValue::Style(style)) = el.get_attr("style") else {
            panic!("style");
        };
        assert_eq!(style.get("opacity").map(String::as_str), Some("1"));
        assert_eq!(style.get("transform").map(String::as_str), Some("rotate(90deg)"));
    }

    #[test]
    fn without_a_target_the_element_is_left_alone() {
        let node = render_motion("p", &props(json!({ "exit": { "opacity": 0 } })), Vec::new())
            .expect("motion");
        let el = node.as_element().expect("element");
        assert!(el.get_attr("style").is_none());
        assert!(el.attr_str("data-motion").is_some());
    }
}
