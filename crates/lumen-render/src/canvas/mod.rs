//! Diagram canvas wheel handling.
//!
//! A headless model of the host page's scrolling boxes ([`ScrollTree`]) and of a pannable,
//! zoomable diagram canvas placed inside it ([`DiagramCanvas`]). Left alone, the canvas consumes
//! wheel events for zoom/pan, so a reader scrolling the page gets stuck on every diagram.
//! [`ScrollAdapter`] rewires the canvas so the wheel scrolls the page instead.

mod adapter;

pub use adapter::{SCROLL_PARENT_MARKER, ScrollAdaptedFlow, ScrollAdapter};

use lumen_core::{AttrValue, Element};
use std::fmt;
use std::sync::Arc;

/// Zoom limits of the canvas viewport.
pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Auto,
    Scroll,
}

impl Overflow {
    /// `auto` and `scroll` let the user scroll the box.
    pub fn is_scrollable(self) -> bool {
        matches!(self, Overflow::Auto | Overflow::Scroll)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollNode {
    pub parent: Option<NodeId>,
    pub overflow_y: Overflow,
    pub scroll_height: f64,
    pub client_height: f64,
    pub scroll_top: f64,
}

impl ScrollNode {
    /// A box that only contains content (`overflow: visible`).
    pub fn plain(height: f64) -> Self {
        Self {
            parent: None,
            overflow_y: Overflow::Visible,
            scroll_height: height,
            client_height: height,
            scroll_top: 0.0,
        }
    }

    pub fn scrolling(overflow_y: Overflow, client_height: f64, scroll_height: f64) -> Self {
        Self {
            parent: None,
            overflow_y,
            scroll_height,
            client_height,
            scroll_top: 0.0,
        }
    }

    pub fn max_scroll_top(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }

    /// Scrollable box with content taller than its viewport.
    pub fn can_scroll(&self) -> bool {
        self.overflow_y.is_scrollable() && self.scroll_height > self.client_height
    }
}

/// The host page's box tree. Node 0 is the root scrolling element (the document).
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollTree {
    nodes: Vec<ScrollNode>,
}

impl ScrollTree {
    pub fn new(client_height: f64, scroll_height: f64) -> Self {
        Self {
            nodes: vec![ScrollNode::scrolling(
                Overflow::Auto,
                client_height,
                scroll_height,
            )],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Adds `node` under `parent`. An unknown parent attaches it to the root.
    pub fn add_child(&mut self, parent: NodeId, mut node: ScrollNode) -> NodeId {
        let parent = if parent.0 < self.nodes.len() {
            parent
        } else {
            self.root()
        };
        node.parent = Some(parent);
        node.scroll_top = node.scroll_top.clamp(0.0, node.max_scroll_top());
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> Option<&ScrollNode> {
        self.nodes.get(id.0)
    }

    pub fn scroll_top(&self, id: NodeId) -> f64 {
        self.get(id).map_or(0.0, |n| n.scroll_top)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nearest box at or above `from` that can scroll, else the root scrolling element.
    pub fn nearest_scrollable(&self, from: NodeId) -> NodeId {
        let mut current = Some(from).filter(|id| id.0 < self.nodes.len());
        // Parents always precede children, so the walk is bounded by the node count.
        for _ in 0..self.nodes.len() {
            let Some(id) = current else {
                break;
            };
            if id != self.root() && self.nodes[id.0].can_scroll() {
                return id;
            }
            current = self.nodes[id.0].parent;
        }
        self.root()
    }

    /// Scrolls `id` by `delta`, clamped to its scrollable range; returns the distance moved.
    pub fn scroll_by(&mut self, id: NodeId, delta: f64) -> f64 {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return 0.0;
        };
        if !delta.is_finite() {
            return 0.0;
        }
        let before = node.scroll_top;
        node.scroll_top = (before + delta).clamp(0.0, node.max_scroll_top());
        node.scroll_top - before
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WheelEvent {
    pub delta_x: f64,
    pub delta_y: f64,
    /// Innermost box under the pointer.
    pub target: NodeId,
    /// The canvas container handling the event; set on dispatch.
    pub current_target: NodeId,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl WheelEvent {
    pub fn new(target: NodeId, delta_y: f64) -> Self {
        Self {
            delta_x: 0.0,
            delta_y,
            target,
            current_target: target,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

pub type WheelHandler = Arc<dyn Fn(&mut WheelEvent, &mut ScrollTree) + Send + Sync>;

#[derive(Clone)]
pub struct CanvasProps {
    pub zoom_on_scroll: bool,
    pub pan_on_scroll: bool,
    /// Swallow wheel events the canvas does not use, so the page never scrolls under it.
    pub prevent_scrolling: bool,
    pub on_wheel: Option<WheelHandler>,
}

impl Default for CanvasProps {
    fn default() -> Self {
        Self {
            zoom_on_scroll: true,
            pan_on_scroll: false,
            prevent_scrolling: true,
            on_wheel: None,
        }
    }
}

impl fmt::Debug for CanvasProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasProps")
            .field("zoom_on_scroll", &self.zoom_on_scroll)
            .field("pan_on_scroll", &self.pan_on_scroll)
            .field("prevent_scrolling", &self.prevent_scrolling)
            .field("on_wheel", &self.on_wheel.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// Who ended up handling a wheel event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelOutcome {
    /// The canvas zoomed or panned its viewport.
    Viewport,
    /// A scrolling box moved by the given distance.
    Scrolled { node: NodeId, distance: f64 },
    /// A handler prevented the default and nothing else moved.
    Handled,
    /// The canvas swallowed the event.
    Swallowed,
}

#[derive(Debug, Clone)]
pub struct DiagramCanvas {
    container: NodeId,
    props: CanvasProps,
    viewport: Viewport,
}

impl DiagramCanvas {
    pub fn new(container: NodeId, props: CanvasProps) -> Self {
        Self {
            container,
            props,
            viewport: Viewport::default(),
        }
    }

    /// Rebuilds the interactive canvas for a rendered flow element. Canvases carrying the
    /// scroll-parent marker get the [`ScrollAdapter`] applied.
    pub fn from_element(el: &Element, container: NodeId, on_wheel: Option<WheelHandler>) -> Self {
        let flag = |name: &str, default: bool| match el.get_attr(name) {
            Some(AttrValue::Text(s)) => s != "false",
            Some(AttrValue::Bool(b)) => *b,
            _ => default,
        };
        let props = CanvasProps {
            zoom_on_scroll: flag("data-zoom-on-scroll", true),
            pan_on_scroll: flag("data-pan-on-scroll", false),
            prevent_scrolling: flag("data-prevent-scrolling", true),
            on_wheel,
        };
        let props = if el.attr_str("data-wheel") == Some(SCROLL_PARENT_MARKER) {
            ScrollAdapter.adapt(props)
        } else {
            props
        };
        let mut canvas = Self::new(container, props);
        canvas.viewport = Viewport {
            x: el.attr_f64("data-viewport-x").unwrap_or(0.0),
            y: el.attr_f64("data-viewport-y").unwrap_or(0.0),
            zoom: el
                .attr_f64("data-viewport-zoom")
                .unwrap_or(1.0)
                .clamp(MIN_ZOOM, MAX_ZOOM),
        };
        canvas
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn props(&self) -> &CanvasProps {
        &self.props
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Delivers a wheel event to the canvas: the props handler first, then the canvas's own
    /// zoom/pan behaviour, then the browser default (scroll the nearest scrollable box).
    pub fn dispatch_wheel(&mut self, mut event: WheelEvent, tree: &mut ScrollTree) -> WheelOutcome {
        event.current_target = self.container;
        let before: Vec<f64> = (0..tree.len()).map(|i| tree.scroll_top(NodeId(i))).collect();

        if let Some(handler) = self.props.on_wheel.clone() {
            handler(&mut event, tree);
        }
        if event.default_prevented() {
            let moved = (0..tree.len())
                .map(NodeId)
                .find(|id| tree.scroll_top(*id) != before[id.0]);
            return match moved {
                Some(node) => WheelOutcome::Scrolled {
                    node,
                    distance: tree.scroll_top(node) - before[node.0],
                },
                None => WheelOutcome::Handled,
            };
        }

        if self.props.zoom_on_scroll {
            let factor = 2f64.powf(-event.delta_y * 0.002);
            self.viewport.zoom = (self.viewport.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
            return WheelOutcome::Viewport;
        }
        if self.props.pan_on_scroll {
            self.viewport.x -= event.delta_x;
            self.viewport.y -= event.delta_y;
            return WheelOutcome::Viewport;
        }
        if self.props.prevent_scrolling {
            return WheelOutcome::Swallowed;
        }
        let node = tree.nearest_scrollable(self.container);
        let distance = tree.scroll_by(node, event.delta_y);
        WheelOutcome::Scrolled { node, distance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> (ScrollTree, NodeId, NodeId) {
        let mut tree = ScrollTree::new(800.0, 3000.0);
        let article = tree.add_child(
            tree.root(),
            ScrollNode::scrolling(Overflow::Auto, 600.0, 2000.0),
        );
        let wrapper = tree.add_child(article, ScrollNode::plain(400.0));
        let canvas = tree.add_child(wrapper, ScrollNode::plain(400.0));
        (tree, article, canvas)
    }

    #[test]
    fn nearest_scrollable_skips_boxes_that_cannot_scroll() {
        let (mut tree, article, canvas) = page();
        assert_eq!(tree.nearest_scrollable(canvas), article);

        let hidden = tree.add_child(
            canvas,
            ScrollNode::scrolling(Overflow::Hidden, 100.0, 500.0),
        );
        assert_eq!(tree.nearest_scrollable(hidden), article);

        let short = tree.add_child(tree.root(), ScrollNode::scrolling(Overflow::Scroll, 500.0, 500.0));
        assert_eq!(tree.nearest_scrollable(short), tree.root());
        assert_eq!(tree.nearest_scrollable(NodeId(999)), tree.root());
    }

    #[test]
    fn scroll_by_clamps_like_a_browser() {
        let (mut tree, article, _) = page();
        assert_eq!(tree.scroll_by(article, -50.0), 0.0);
        assert_eq!(tree.scroll_by(article, 1500.0), 1400.0);
        assert_eq!(tree.scroll_top(article), 1400.0);
        assert_eq!(tree.scroll_by(NodeId(42), 10.0), 0.0);
    }

    #[test]
    fn a_default_canvas_zooms_and_the_page_stays_put() {
        let (mut tree, article, canvas) = page();
        let mut diagram = DiagramCanvas::new(canvas, CanvasProps::default());
        let outcome = diagram.dispatch_wheel(WheelEvent::new(canvas, 100.0), &mut tree);
        assert_eq!(outcome, WheelOutcome::Viewport);
        assert!(diagram.viewport().zoom < 1.0);
        assert_eq!(tree.scroll_top(article), 0.0);
    }

    #[test]
    fn a_canvas_without_wheel_behaviour_still_swallows_events() {
        let (mut tree, article, canvas) = page();
        let props = CanvasProps {
            zoom_on_scroll: false,
            ..CanvasProps::default()
        };
        let mut diagram = DiagramCanvas::new(canvas, props);
        let outcome = diagram.dispatch_wheel(WheelEvent::new(canvas, 100.0), &mut tree);
        assert_eq!(outcome, WheelOutcome::Swallowed);
        assert_eq!(tree.scroll_top(article), 0.0);
    }
}
