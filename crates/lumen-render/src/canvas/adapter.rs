use super::{CanvasProps, ScrollTree, WheelEvent, WheelHandler};
use lumen_core::script::{Invoke, Props, RuntimeError, Value};
use lumen_core::{Component, VNode};
use std::sync::Arc;

/// `data-wheel` value marking a canvas whose wheel events belong to the page.
pub const SCROLL_PARENT_MARKER: &str = "scroll-parent";

/// Turns off wheel zoom/pan on a canvas and forwards the wheel to the nearest scrollable
/// ancestor instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollAdapter;

impl ScrollAdapter {
    pub fn adapt(&self, props: CanvasProps) -> CanvasProps {
        let caller = props.on_wheel.clone();
        let handler: WheelHandler = Arc::new(move |event: &mut WheelEvent, tree: &mut ScrollTree| {
            event.prevent_default();
            event.stop_propagation();
            let node = tree.nearest_scrollable(event.current_target);
            let moved = tree.scroll_by(node, event.delta_y);
            tracing::trace!(delta = event.delta_y, moved, "forwarded canvas wheel to scroll parent");
            if let Some(caller) = &caller {
                caller(event, tree);
            }
        });
        CanvasProps {
            zoom_on_scroll: false,
            pan_on_scroll: false,
            prevent_scrolling: props.prevent_scrolling,
            on_wheel: Some(handler),
        }
    }
}

/// The flow canvas component with wheel zoom/pan forced off and the scroll-parent marker set.
pub struct ScrollAdaptedFlow {
    inner: Arc<dyn Component>,
}

impl ScrollAdaptedFlow {
    pub fn wrap(inner: Arc<dyn Component>) -> Arc<dyn Component> {
        Arc::new(Self { inner })
    }
}

impl Component for ScrollAdaptedFlow {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn render(
        &self,
        cx: &mut dyn Invoke,
        props: &Props,
        children: Vec<VNode>,
    ) -> Result<VNode, RuntimeError> {
        let mut props = props.clone();
        props.insert("zoomOnScroll", Value::Bool(false));
        props.insert("panOnScroll", Value::Bool(false));
        let node = self.inner.render(cx, &props, children)?;
        Ok(match node {
            VNode::Element(el) => VNode::Element(el.attr("data-wheel", SCROLL_PARENT_MARKER)),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::{DiagramCanvas, NodeId, Overflow, ScrollNode, WheelOutcome};
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page() -> (ScrollTree, NodeId, NodeId) {
        let mut tree = ScrollTree::new(800.0, 3000.0);
        let article = tree.add_child(
            tree.root(),
            ScrollNode::scrolling(Overflow::Scroll, 600.0, 2000.0),
        );
        let canvas = tree.add_child(article, ScrollNode::plain(400.0));
        (tree, article, canvas)
    }

    #[test]
    fn wheel_over_an_adapted_canvas_scrolls_the_parent_by_the_delta() {
        let (mut tree, article, canvas) = page();
        let mut diagram = DiagramCanvas::new(canvas, ScrollAdapter.adapt(CanvasProps::default()));
        let before = diagram.viewport();

        let outcome = diagram.dispatch_wheel(WheelEvent::new(canvas, 120.0), &mut tree);
        assert_eq!(
            outcome,
            WheelOutcome::Scrolled {
                node: article,
                distance: 120.0
            }
        );
        assert_eq!(tree.scroll_top(article), 120.0);
        assert_eq!(diagram.viewport(), before);
        assert!(!diagram.props().zoom_on_scroll);
        assert!(!diagram.props().pan_on_scroll);
    }

    #[test]
    fn falls_back_to_the_document_without_a_scrollable_ancestor() {
        let mut tree = ScrollTree::new(800.0, 3000.0);
        let canvas = tree.add_child(tree.root(), ScrollNode::plain(400.0));
        let mut diagram = DiagramCanvas::new(canvas, ScrollAdapter.adapt(CanvasProps::default()));
        diagram.dispatch_wheel(WheelEvent::new(canvas, -40.0), &mut tree);
        assert_eq!(tree.scroll_top(tree.root()), 0.0);
        diagram.dispatch_wheel(WheelEvent::new(canvas, 250.0), &mut tree);
        assert_eq!(tree.scroll_top(tree.root()), 250.0);
    }

    #[test]
    fn the_callers_handler_runs_after_the_scroll() {
        let (mut tree, article, canvas) = page();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let caller: WheelHandler = Arc::new(move |event: &mut WheelEvent, tree: &mut ScrollTree| {
            assert!(event.default_prevented());
            assert!(event.propagation_stopped());
            counter.store(tree.scroll_top(NodeId(1)) as usize, Ordering::SeqCst);
        });
        let props = CanvasProps {
            on_wheel: Some(caller),
            ..CanvasProps::default()
        };
        let mut diagram = DiagramCanvas::new(canvas, ScrollAdapter.adapt(props));
        diagram.dispatch_wheel(WheelEvent::new(canvas, 30.0), &mut tree);
        assert_eq!(tree.scroll_top(article), 30.0);
        assert_eq!(seen.load(Ordering::SeqCst), 30);
    }
}
