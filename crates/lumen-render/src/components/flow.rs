//! `RF`: node/edge diagrams in the React Flow shape.
//!
//! Nodes are positioned HTML boxes inside a transformed viewport and edges an SVG layer beneath
//! them. The wheel-related props and the initial viewport are written to `data-*` attributes so
//! [`crate::canvas::DiagramCanvas::from_element`] can rebuild the interactive canvas.

use super::{Part, part_component, parts};
use crate::canvas::{MAX_ZOOM, MIN_ZOOM};
use crate::svg::{self, PathData, fmt};
use indexmap::IndexMap;
use lumen_core::script::host::to_vnode;
use lumen_core::script::{Invoke, NativeFunction, Props, RuntimeError, Value};
use lumen_core::{AttrValue, Capability, Component, Element, Namespace, VNode, component_fn};
use serde_json::json;
use std::sync::Arc;

const NODE_WIDTH: f64 = 150.0;
const NODE_HEIGHT: f64 = 40.0;
const DEFAULT_WIDTH: f64 = 600.0;
const DEFAULT_HEIGHT: f64 = 400.0;
const FIT_PADDING: f64 = 0.1;
const EDGE_STROKE: &str = "#b1b1b7";

/// The `RF` namespace. `flow` is the `ReactFlow` component to expose, usually wrapped by the
/// scroll adapter.
pub fn react_flow_namespace(flow: Arc<dyn Component>) -> Namespace {
    Namespace::new()
        .with("ReactFlow", flow)
        .with("Background", part_component("Background"))
        .with("Controls", part_component("Controls"))
        .with("MiniMap", part_component("MiniMap"))
        .with("Handle", handle())
        .with(
            "Position",
            Capability::Data(json!({
                "Left": "left",
                "Top": "top",
                "Right": "right",
                "Bottom": "bottom"
            })),
        )
        .with(
            "MarkerType",
            Capability::Data(json!({ "Arrow": "arrow", "ArrowClosed": "arrowclosed" })),
        )
        .with("addEdge", Capability::Function(add_edge()))
}

pub fn react_flow() -> Arc<dyn Component> {
    component_fn("ReactFlow", render_flow)
}

fn handle() -> Arc<dyn Component> {
    component_fn("Handle", |_, props, _| {
        let position = props.str("position").unwrap_or_else(|| "top".to_string());
        let kind = props.str("type").unwrap_or_else(|| "source".to_string());
        let mut el = Element::new("div")
            .attr("class", format!("react-flow__handle react-flow__handle-{position} {kind}"))
            .attr("data-handlepos", position);
        if let Some(id) = props.str("id") {
            el = el.attr("data-handleid", id);
        }
        Ok(el.into())
    })
}

/// `addEdge(params, edges)`: a copy of `edges` with the new edge appended unless an edge with
/// the same endpoints already exists.
fn add_edge() -> Arc<NativeFunction> {
    NativeFunction::new("addEdge", |_, args| {
        let params = args.first().cloned().unwrap_or_default();
        let existing = match args.get(1) {
            Some(Value::Array(items)) => items.borrow().clone(),
            _ => Vec::new(),
        };
        let Value::Object(map) = &params else {
            return Err(RuntimeError::type_error("addEdge expects an edge object"));
        };
        let mut edge = map.borrow().clone();
        let source = edge.get("source").map(Value::to_js_string).unwrap_or_default();
        let target = edge.get("target").map(Value::to_js_string).unwrap_or_default();
        let duplicate = existing.iter().any(|e| {
            field(e, "source").to_js_string() == source && field(e, "target").to_js_string() == target
        });
        let mut out = existing;
        if !duplicate {
            if !edge.contains_key("id") {
                edge.insert("id".to_string(), Value::from(format!("reactflow__edge-{source}-{target}")));
            }
            out.push(Value::object(edge));
        }
        Ok(Value::array(out))
    })
}

fn field(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(map) => map.borrow().get(key).cloned().unwrap_or_default(),
        _ => Value::Undefined,
    }
}

fn number(value: &Value, key: &str) -> Option<f64> {
    field(value, key).as_f64().filter(|n| n.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    fn parse(value: &Value, default: Side) -> Side {
        match value.as_str() {
            Some("top") => Side::Top,
            Some("right") => Side::Right,
            Some("bottom") => Side::Bottom,
            Some("left") => Side::Left,
            _ => default,
        }
    }

    /// Unit vector pointing out of the node.
    fn normal(self) -> (f64, f64) {
        match self {
            Side::Top => (0.0, -1.0),
            Side::Right => (1.0, 0.0),
            Side::Bottom => (0.0, 1.0),
            Side::Left => (-1.0, 0.0),
        }
    }
}

struct FlowNode {
    id: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    source_side: Side,
    target_side: Side,
    value: Value,
}

impl FlowNode {
    fn anchor(&self, side: Side) -> (f64, f64) {
        match side {
            Side::Top => (self.x + self.width / 2.0, self.y),
            Side::Right => (self.x + self.width, self.y + self.height / 2.0),
            Side::Bottom => (self.x + self.width / 2.0, self.y + self.height),
            Side::Left => (self.x, self.y + self.height / 2.0),
        }
    }
}

fn flow_nodes(props: &Props) -> Vec<FlowNode> {
    let items = props.array("nodes").unwrap_or_default();
    items
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let position = field(&value, "position");
            let style = field(&value, "style");
            FlowNode {
                id: match field(&value, "id") {
                    Value::Undefined => i.to_string(),
                    id => id.to_js_string(),
                },
                x: number(&position, "x").unwrap_or(0.0),
                y: number(&position, "y").unwrap_or(0.0),
                width: number(&value, "width")
                    .or_else(|| number(&style, "width"))
                    .unwrap_or(NODE_WIDTH),
                height: number(&value, "height")
                    .or_else(|| number(&style, "height"))
                    .unwrap_or(NODE_HEIGHT),
                source_side: Side::parse(&field(&value, "sourcePosition"), Side::Bottom),
                target_side: Side::parse(&field(&value, "targetPosition"), Side::Top),
                value,
            }
        })
        .collect()
}

/// Viewport that fits every node into `width` x `height`.
fn fit_view(nodes: &[FlowNode], width: f64, height: f64) -> (f64, f64, f64) {
    if nodes.is_empty() {
        return (0.0, 0.0, 1.0);
    }
    let (mut x0, mut y0) = (f64::INFINITY, f64::INFINITY);
    let (mut x1, mut y1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for n in nodes {
        x0 = x0.min(n.x);
        y0 = y0.min(n.y);
        x1 = x1.max(n.x + n.width);
        y1 = y1.max(n.y + n.height);
    }
    let (bw, bh) = ((x1 - x0).max(1.0), (y1 - y0).max(1.0));
    let zoom = ((width / bw).min(height / bh) / (1.0 + FIT_PADDING)).clamp(MIN_ZOOM, MAX_ZOOM);
    let x = (width - bw * zoom) / 2.0 - x0 * zoom;
    let y = (height - bh * zoom) / 2.0 - y0 * zoom;
    (x, y, zoom)
}

fn edge_path(kind: &str, from: (f64, f64), from_side: Side, to: (f64, f64), to_side: Side) -> String {
    match kind {
        "straight" => PathData::new()
            .move_to(from.0, from.1)
            .line_to(to.0, to.1)
            .finish(),
        "step" | "smoothstep" => {
            let mid_y = (from.1 + to.1) / 2.0;
            PathData::new()
                .move_to(from.0, from.1)
                .line_to(from.0, mid_y)
                .line_to(to.0, mid_y)
                .line_to(to.0, to.1)
                .finish()
        }
        _ => {
            let reach = ((to.0 - from.0).abs().max((to.1 - from.1).abs()) / 2.0).max(25.0);
            let (n0, n1) = (from_side.normal(), to_side.normal());
            PathData::new()
                .move_to(from.0, from.1)
                .cubic_to(
                    (from.0 + n0.0 * reach, from.1 + n0.1 * reach),
                    (to.0 + n1.0 * reach, to.1 + n1.1 * reach),
                    to,
                )
                .finish()
        }
    }
}

fn marker_kind(edge: &Value) -> Option<String> {
    match field(edge, "markerEnd") {
        Value::String(s) => Some(s.to_string()),
        marker @ Value::Object(_) => field(&marker, "type").as_str().map(str::to_string),
        _ => None,
    }
}

fn marker_defs(kinds: &[String]) -> Element {
    let mut defs = Element::new("defs");
    for kind in kinds {
        let fill = if kind == "arrowclosed" { EDGE_STROKE } else { "none" };
        defs = defs.child(
            Element::new("marker")
                .attr("id", format!("lumen-flow-{kind}"))
                .attr("viewBox", "-10 -10 20 20")
                .attr("markerWidth", 12.5)
                .attr("markerHeight", 12.5)
                .attr("orient", "auto-start-reverse")
                .attr("refX", 0.0)
                .attr("refY", 0.0)
                .child(
                    svg::path("M-5,-4 L0,0 L-5,4 Z".to_string(), fill, EDGE_STROKE)
                        .attr("stroke-width", 1.0),
                ),
        );
    }
    defs
}

fn edges_layer(edges: &[Value], nodes: &[FlowNode]) -> Element {
    let mut layer = svg::svg_root(1.0, 1.0)
        .attr("class", "react-flow__edges")
        .attr("overflow", "visible");
    let mut markers: Vec<String> = Vec::new();
    let mut paths = Vec::new();
    for (i, edge) in edges.iter().enumerate() {
        let source = field(edge, "source").to_js_string();
        let target = field(edge, "target").to_js_string();
        let (Some(from), Some(to)) = (
            nodes.iter().find(|n| n.id == source),
            nodes.iter().find(|n| n.id == target),
        ) else {
            tracing::warn!(%source, %target, "skipping edge with an unknown endpoint");
            continue;
        };
        let id = match field(edge, "id") {
            Value::Undefined => format!("e{i}"),
            id => id.to_js_string(),
        };
        let kind = field(edge, "type").as_str().unwrap_or("default").to_string();
        let (p0, p1) = (from.anchor(from.source_side), to.anchor(to.target_side));
        let d = edge_path(&kind, p0, from.source_side, p1, to.target_side);
        let animated = field(edge, "animated").truthy();
        let mut path = svg::path(d, "none", EDGE_STROKE)
            .attr("class", "react-flow__edge-path")
            .attr("stroke-width", 1.0);
        if animated {
            path = path.attr("stroke-dasharray", "5");
        }
        if let Some(marker) = marker_kind(edge) {
            path = path.attr("marker-end", format!("url(#lumen-flow-{marker})"));
            if !markers.contains(&marker) {
                markers.push(marker);
            }
        }
        let class = if animated {
            "react-flow__edge animated"
        } else {
            "react-flow__edge"
        };
        let mut group = svg::group(class).attr("data-id", id).child(path);
        let label = field(edge, "label");
        if !label.is_nullish() {
            let (mx, my) = ((p0.0 + p1.0) / 2.0, (p0.1 + p1.1) / 2.0);
            group = group.child(
                svg::text(mx, my, "middle", label.to_js_string())
                    .attr("class", "react-flow__edge-text")
                    .attr("dominant-baseline", "central"),
            );
        }
        paths.push(group);
    }
    if !markers.is_empty() {
        layer = layer.child(marker_defs(&markers));
    }
    layer.children(paths.into_iter().map(VNode::from))
}

fn node_label(cx: &mut dyn Invoke, node: &FlowNode, node_types: &Value) -> Result<VNode, RuntimeError> {
    let data = field(&node.value, "data");
    let kind = field(&node.value, "type");
    if let Some(kind) = kind.as_str() {
        let renderer = field(node_types, kind);
        if renderer.is_callable() {
            let mut props = IndexMap::new();
            props.insert("id".to_string(), Value::from(node.id.as_str()));
            props.insert("data".to_string(), data);
            props.insert("type".to_string(), Value::from(kind));
            props.insert("xPos".to_string(), Value::from(node.x));
            props.insert("yPos".to_string(), Value::from(node.y));
            props.insert("selected".to_string(), Value::Bool(false));
            props.insert("isConnectable".to_string(), Value::Bool(false));
            let rendered = cx.call(&renderer, vec![Value::object(props)])?;
            return to_vnode(&rendered);
        }
    }
    let label = field(&data, "label");
    if label.is_nullish() {
        return Ok(VNode::Empty);
    }
    to_vnode(&label)
}

fn px(v: f64) -> String {
    format!("{}px", fmt(v))
}

fn background_layer(part: &Part) -> Element {
    let variant = part.str("variant").unwrap_or("dots");
    let gap = part.f64("gap").unwrap_or(20.0).max(1.0);
    let size = part.f64("size").unwrap_or(1.0);
    let color = part.str("color").unwrap_or("#91919a");
    let shape = match variant {
        "lines" => svg::path(
            PathData::new()
                .move_to(gap / 2.0, 0.0)
                .line_to(gap / 2.0, gap)
                .move_to(0.0, gap / 2.0)
                .line_to(gap, gap / 2.0)
                .finish(),
            "none",
            color,
        ),
        "cross" => svg::path(
            PathData::new()
                .move_to(gap / 2.0 - 3.0, gap / 2.0)
                .line_to(gap / 2.0 + 3.0, gap / 2.0)
                .move_to(gap / 2.0, gap / 2.0 - 3.0)
                .line_to(gap / 2.0, gap / 2.0 + 3.0)
                .finish(),
            "none",
            color,
        ),
        _ => svg::circle(gap / 2.0, gap / 2.0, size, color),
    };
    let pattern = Element::new("pattern")
        .attr("id", "lumen-flow-background")
        .attr("x", 0.0)
        .attr("y", 0.0)
        .attr("width", gap)
        .attr("height", gap)
        .attr("patternUnits", "userSpaceOnUse")
        .child(shape);
    let mut style = IndexMap::new();
    style.insert("position".to_string(), "absolute".to_string());
    style.insert("inset".to_string(), "0".to_string());
    svg::svg_root(1.0, 1.0)
        .attr("class", "react-flow__background")
        .attr("width", "100%")
        .attr("height", "100%")
        .attr("style", AttrValue::Style(style))
        .attr("data-variant", variant)
        .child(pattern)
        .child(
            Element::new("rect")
                .attr("width", "100%")
                .attr("height", "100%")
                .attr("fill", "url(#lumen-flow-background)"),
        )
}

fn controls_panel() -> Element {
    let button = |action: &str, label: &str| {
        Element::new("button")
            .attr("type", "button")
            .attr("class", format!("react-flow__controls-button react-flow__controls-{action}"))
            .attr("data-action", action)
            .attr("title", label)
            .child(label.to_string())
    };
    Element::new("div")
        .attr("class", "react-flow__panel react-flow__controls bottom left")
        .child(button("zoomin", "zoom in"))
        .child(button("zoomout", "zoom out"))
        .child(button("fitview", "fit view"))
}

fn minimap(nodes: &[FlowNode]) -> Element {
    const W: f64 = 200.0;
    const H: f64 = 150.0;
    let (x, y, zoom) = fit_view(nodes, W, H);
    let mut map = svg::svg_root(W, H).attr("class", "react-flow__minimap");
    for node in nodes {
        map = map.child(
            svg::rect(
                x + node.x * zoom,
                y + node.y * zoom,
                node.width * zoom,
                node.height * zoom,
                "#e2e2e2",
            )
            .attr("class", "react-flow__minimap-node"),
        );
    }
    Element::new("div")
        .attr("class", "react-flow__panel react-flow__minimap-panel bottom right")
        .child(map)
}

fn render_flow(
    cx: &mut dyn Invoke,
    props: &Props,
    children: Vec<VNode>,
) -> Result<VNode, RuntimeError> {
    let nodes = flow_nodes(props);
    let edges = props.array("edges").unwrap_or_default();
    let node_types = props.get("nodeTypes").cloned().unwrap_or_default();
    let style = props.get("style").cloned().unwrap_or_default();
    let width = number(&style, "width").unwrap_or(DEFAULT_WIDTH);
    let height = number(&style, "height").unwrap_or(DEFAULT_HEIGHT);

    let flag = |key: &str, default: bool| props.bool(key).unwrap_or(default);
    let (vx, vy, zoom) = match props.get("defaultViewport") {
        Some(viewport @ Value::Object(_)) => (
            number(viewport, "x").unwrap_or(0.0),
            number(viewport, "y").unwrap_or(0.0),
            number(viewport, "zoom").unwrap_or(1.0).clamp(MIN_ZOOM, MAX_ZOOM),
        ),
        _ if flag("fitView", false) => fit_view(&nodes, width, height),
        _ => (0.0, 0.0, 1.0),
    };

    let mut node_layer = Element::new("div").attr("class", "react-flow__nodes");
    for node in &nodes {
        let mut node_style = IndexMap::new();
        node_style.insert(
            "transform".to_string(),
            format!("translate({},{})", px(node.x), px(node.y)),
        );
        node_style.insert("width".to_string(), px(node.width));
        node_style.insert("min-height".to_string(), px(node.height));
        let kind = field(&node.value, "type");
        let kind = kind.as_str().unwrap_or("default");
        node_layer = node_layer.child(
            Element::new("div")
                .attr("class", format!("react-flow__node react-flow__node-{kind}"))
                .attr("data-id", node.id.as_str())
                .attr("style", AttrValue::Style(node_style))
                .child(node_label(cx, node, &node_types)?),
        );
    }

    let mut viewport_style = IndexMap::new();
    viewport_style.insert(
        "transform".to_string(),
        format!("translate({},{}) scale({})", px(vx), px(vy), fmt(zoom)),
    );
    viewport_style.insert("transform-origin".to_string(), "0 0".to_string());
    let viewport = Element::new("div")
        .attr("class", "react-flow__viewport")
        .attr("style", AttrValue::Style(viewport_style))
        .child(edges_layer(&edges, &nodes))
        .child(node_layer);

    let mut root_style = IndexMap::new();
    root_style.insert("position".to_string(), "relative".to_string());
    root_style.insert("overflow".to_string(), "hidden".to_string());
    root_style.insert("width".to_string(), "100%".to_string());
    root_style.insert("height".to_string(), px(height));

    let bool_attr = |b: bool| if b { "true" } else { "false" };
    let mut root = Element::new("div")
        .attr("class", "lumen-flow react-flow")
        .attr("style", AttrValue::Style(root_style))
        .attr("data-zoom-on-scroll", bool_attr(flag("zoomOnScroll", true)))
        .attr("data-pan-on-scroll", bool_attr(flag("panOnScroll", false)))
        .attr("data-prevent-scrolling", bool_attr(flag("preventScrolling", true)))
        .attr("data-viewport-x", fmt(vx))
        .attr("data-viewport-y", fmt(vy))
        .attr("data-viewport-zoom", fmt(zoom));

    let flow_parts = parts(&children);
    if let Some(background) = flow_parts.iter().find(|p| p.kind == "Background") {
        root = root.child(background_layer(background));
    }
    root = root.child(
        Element::new("div")
            .attr("class", "react-flow__renderer")
            .child(viewport),
    );
    if flow_parts.iter().any(|p| p.kind == "Controls") {
        root = root.child(controls_panel());
    }
    if flow_parts.iter().any(|p| p.kind == "MiniMap") {
        root = root.child(minimap(&nodes));
    }
    Ok(root.children(super::content(children)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DiagramCanvas, ScrollTree};

    struct NoCalls;

    impl Invoke for NoCalls {
        fn call(&mut self, _: &Value, _: Vec<Value>) -> Result<Value, RuntimeError> {
            Err(RuntimeError::error("unexpected call"))
        }
    }

    fn node(id: &str, x: f64, y: f64, label: &str) -> Value {
        Value::from_json(&json!({
            "id": id,
            "position": { "x": x, "y": y },
            "data": { "label": label }
        }))
    }

    fn flow_props() -> Props {
        let mut props = Props::new();
        props.insert(
            "nodes",
            Value::array(vec![node("a", 0.0, 0.0, "Start"), node("b", 0.0, 100.0, "End")]),
        );
        props.insert(
            "edges",
            Value::from_json(&json!([
                { "id": "a-b", "source": "a", "target": "b", "label": "next", "animated": true,
                  "markerEnd": { "type": "arrowclosed" } },
                { "source": "a", "target": "missing" }
            ])),
        );
        props
    }

    #[test]
    fn renders_nodes_edges_and_canvas_attributes() {
        let node = render_flow(&mut NoCalls, &flow_props(), Vec::new()).expect("flow");
        let root = node.as_element().expect("root");
        assert_eq!(root.attr_str("data-zoom-on-scroll"), Some("true"));
        assert_eq!(root.attr_str("data-prevent-scrolling"), Some("true"));
        assert_eq!(node.text_content(), "nextStartEnd");

        let edges = node.find(&|el| el.has_class("react-flow__edge")).expect("edge");
        assert!(edges.has_class("animated"));
        assert_eq!(edges.attr_str("data-id"), Some("a-b"));
        let path = node.find(&|el| el.has_class("react-flow__edge-path")).expect("path");
        assert_eq!(path.attr_str("d"), Some("M75,40 C75,70 75,70 75,100"));
        assert_eq!(path.attr_str("marker-end"), Some("url(#lumen-flow-arrowclosed)"));
        assert!(node.find_tag("marker").is_some());
    }

    #[test]
    fn fit_view_centres_and_clamps_zoom() {
        let nodes = flow_nodes(&flow_props());
        let (x, y, zoom) = fit_view(&nodes, 600.0, 400.0);
        assert_eq!(zoom, 2.0);
        assert_eq!((x, y), (150.0, 60.0));

        let mut far = flow_props();
        far.insert(
            "nodes",
            Value::array(vec![node("a", 0.0, 0.0, "A"), node("b", 10_000.0, 0.0, "B")]),
        );
        let (_, _, zoom) = fit_view(&flow_nodes(&far), 600.0, 400.0);
        assert_eq!(zoom, MIN_ZOOM);
    }

    #[test]
    fn the_rendered_element_rebuilds_an_interactive_canvas() {
        let mut props = flow_props();
        props.insert("zoomOnScroll", Value::Bool(false));
        props.insert(
            "defaultViewport",
            Value::from_json(&json!({ "x": 10, "y": 20, "zoom": 5 })),
        );
        let node = render_flow(&mut NoCalls, &props, Vec::new()).expect("flow");
        let tree = ScrollTree::new(800.0, 2000.0);
        let canvas = DiagramCanvas::from_element(node.as_element().expect("root"), tree.root(), None);
        assert!(!canvas.props().zoom_on_scroll);
        assert_eq!(canvas.viewport().zoom, MAX_ZOOM);
        assert_eq!(canvas.viewport().x, 10.0);
    }

    #[test]
    fn add_edge_appends_once() {
        let edges = Value::array(Vec::new());
        let params = Value::from_json(&json!({ "source": "a", "target": "b" }));
        let once = add_edge()
            .call(&mut NoCalls, vec![params.clone(), edges])
            .expect("add");
        let twice = add_edge()
            .call(&mut NoCalls, vec![params, once.clone()])
            .expect("add");
        let Value::Array(items) = twice else {
            panic!("array");
        };
        assert_eq!(items.borrow().len(), 1);
        assert_eq!(
            field(&items.borrow()[0], "id").to_js_string(),
            "reactflow__edge-a-b"
        );
    }
}
