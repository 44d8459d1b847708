//! Concrete capability helpers.
//!
//! Composite helpers (charts, flows) are assembled from *parts*: child components such as
//! `<Line dataKey="uv" />` render to a hidden `lumen-part` element carrying their props as JSON,
//! and the enclosing chart reads those parts back. Function props on a part (formatters, label
//! renderers) are retained by the interpreter and called while the chart renders.

pub mod charts;
pub mod flow;
pub mod highlight;
pub mod latex;
pub mod motion;
pub mod plot;

use indexmap::IndexMap;
use lumen_core::script::{Invoke, Props, RuntimeError, Value};
use lumen_core::{AttrValue, Component, Element, VNode, component_fn};
use serde_json::{Map, Value as Json};
use std::sync::Arc;

pub(crate) const PART_TAG: &str = "lumen-part";

/// JSON view of a prop; functions and `undefined` are `None`.
pub(crate) fn prop_json(props: &Props, key: &str) -> Result<Option<Json>, RuntimeError> {
    match props.get(key) {
        Some(value) => value.to_json(),
        None => Ok(None),
    }
}

/// Text of a prop, or of the children when the prop is absent.
pub(crate) fn text_prop_or_children(props: &Props, key: &str, children: &[VNode]) -> String {
    props.str(key).unwrap_or_else(|| {
        children
            .iter()
            .map(VNode::text_content)
            .collect::<Vec<_>>()
            .join("")
    })
}

pub(crate) fn json_f64(v: &Json) -> Option<f64> {
    match v {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A child component read back by its parent.
#[derive(Debug, Clone)]
pub(crate) struct Part {
    pub kind: String,
    pub props: Map<String, Json>,
    pub callbacks: IndexMap<String, usize>,
    pub children: Vec<VNode>,
}

impl Part {
    pub fn str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Json::as_str)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.props.get(key).and_then(json_f64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.props.get(key).and_then(Json::as_bool)
    }

    pub fn json(&self, key: &str) -> Option<&Json> {
        self.props.get(key)
    }

    /// Calls the function prop `key`, if the part had one.
    pub fn call(
        &self,
        cx: &mut dyn Invoke,
        key: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, RuntimeError> {
        let Some(handle) = self.callbacks.get(key) else {
            return Ok(None);
        };
        match cx.retained(*handle) {
            Some(callee) => cx.call(&callee, args).map(Some),
            None => Ok(None),
        }
    }

    /// Parts nested inside this one (`<Pie><Cell /></Pie>`).
    pub fn parts(&self) -> Vec<Part> {
        parts(&self.children)
    }
}

pub(crate) fn part_node(
    cx: &mut dyn Invoke,
    kind: &str,
    props: &Props,
    children: Vec<VNode>,
) -> Result<VNode, RuntimeError> {
    let mut json = Map::new();
    let mut el = Element::new(PART_TAG)
        .attr("data-part", kind)
        .attr("hidden", true);
    for (key, value) in props.iter() {
        if key == "children" {
            continue;
        }
        if value.is_callable() {
            if let Some(handle) = cx.retain(value.clone()) {
                el = el.attr(format!("data-callback-{key}"), AttrValue::Callback(handle));
            }
        } else if let Some(v) = value.to_json()? {
            json.insert(key.clone(), v);
        }
    }
    let encoded = serde_json::to_string(&json).map_err(|e| RuntimeError::error(e.to_string()))?;
    Ok(el.attr("data-props", encoded).children(children).into())
}

/// Parts among `children`, in order; fragments are flattened and anything else is skipped.
pub(crate) fn parts(children: &[VNode]) -> Vec<Part> {
    let mut out = Vec::new();
    collect_parts(children, &mut out);
    out
}

fn collect_parts(children: &[VNode], out: &mut Vec<Part>) {
    for child in children {
        match child {
            VNode::Fragment(inner) => collect_parts(inner, out),
            VNode::Element(el) if el.tag == PART_TAG => {
                let props = el
                    .attr_str("data-props")
                    .and_then(|s| serde_json::from_str::<Map<String, Json>>(s).ok())
                    .unwrap_or_default();
                let callbacks = el
                    .attrs
                    .iter()
                    .filter_map(|(name, value)| match value {
                        AttrValue::Callback(handle) => name
                            .strip_prefix("data-callback-")
                            .map(|key| (key.to_string(), *handle)),
                        _ => None,
                    })
                    .collect();
                out.push(Part {
                    kind: el.attr_str("data-part").unwrap_or_default().to_string(),
                    props,
                    callbacks,
                    children: el.children.clone(),
                });
            }
            _ => {}
        }
    }
}

/// Non-part children, kept in order.
pub(crate) fn content(children: Vec<VNode>) -> Vec<VNode> {
    children
        .into_iter()
        .filter(|c| !matches!(c, VNode::Element(el) if el.tag == PART_TAG))
        .collect()
}

/// A component that only describes itself to its parent.
pub(crate) fn part_component(name: &'static str) -> Arc<dyn Component> {
    component_fn(name, move |cx, props, children| {
        part_node(cx, name, props, children)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Vec<Value>);

    impl Invoke for Recorder {
        fn call(&mut self, _: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
            Ok(Value::from(format!("called with {}", args.len())))
        }

        fn retain(&mut self, callee: Value) -> Option<usize> {
            self.0.push(callee);
            Some(self.0.len() - 1)
        }

        fn retained(&self, handle: usize) -> Option<Value> {
            self.0.get(handle).cloned()
        }
    }

    #[test]
    fn parts_round_trip_props_and_callbacks() {
        let mut cx = Recorder(Vec::new());
        let mut props = Props::new();
        props.insert("dataKey", Value::from("uv"));
        props.insert("strokeWidth", Value::from(2.0));
        props.insert(
            "tickFormatter",
            Value::Native(lumen_core::script::NativeFunction::new("fmt", |_, _| {
                Ok(Value::Undefined)
            })),
        );
        let node = part_node(&mut cx, "Line", &props, Vec::new()).expect("part");
        let wrapped = VNode::Fragment(vec![VNode::text("x"), node]);

        let found = parts(std::slice::from_ref(&wrapped));
        assert_eq!(found.len(), 1);
        let line = &found[0];
        assert_eq!(line.kind, "Line");
        assert_eq!(line.str("dataKey"), Some("uv"));
        assert_eq!(line.f64("strokeWidth"), Some(2.0));
        let called = line
            .call(&mut cx, "tickFormatter", vec![Value::from(1.0)])
            .expect("call");
        assert_eq!(called.and_then(|v| v.as_str().map(str::to_string)).as_deref(), Some("called with 1"));
        assert!(line.call(&mut cx, "missing", Vec::new()).expect("call").is_none());
    }
}
