use crate::*;
use std::sync::Arc;

mod compile;
mod shell;

/// A component that renders `<span data-capability=NAME>{text}{children}</span>`.
fn stub(name: &'static str) -> Arc<dyn Component> {
    component_fn(name, move |_, props, children| {
        let mut el = Element::new("span").attr("data-capability", name);
        if let Some(text) = props.str("text") {
            el = el.child(text);
        }
        Ok(el.children(children).into())
    })
}

fn surface_builder() -> SurfaceBuilder {
    CapabilitySurface::builder()
        .with(CapabilityName::Latex, stub("Latex"))
        .with(
            CapabilityName::Recharts,
            Namespace::new()
                .component(stub("LineChart"))
                .component(stub("Line")),
        )
        .with(CapabilityName::Plot, stub("Plot"))
        .with(CapabilityName::SyntaxHighlighter, stub("SyntaxHighlighter"))
        .with(
            CapabilityName::Dark,
            Capability::Data(serde_json::json!({ "color": "#fff" })),
        )
        .with(
            CapabilityName::Rf,
            Namespace::new()
                .component(stub("ReactFlow"))
                .with("Position", Capability::Data(serde_json::json!({ "Left": "left" }))),
        )
        .with(CapabilityName::Motion, Namespace::new().component(stub("div")))
}

fn stub_surface() -> CapabilitySurface {
    surface_builder().build().expect("complete surface")
}
