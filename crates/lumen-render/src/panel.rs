//! What a block looks like on the page in each shell state. No state renders blank.

use crate::html::render_html;
use lumen_core::{
    BlockShell, BlockState, Element, Failure, FailureStage, LumenConfig, RenderOutcome, VNode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelOptions {
    /// Include the collapsible trace in failure panels.
    pub show_trace: bool,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self { show_trace: true }
    }
}

impl PanelOptions {
    pub fn from_config(config: &LumenConfig) -> Self {
        Self {
            show_trace: config.show_trace(),
        }
    }
}

pub fn loading_node() -> VNode {
    Element::new("div")
        .attr("class", "lumen-block lumen-loading")
        .attr("role", "status")
        .attr("aria-busy", "true")
        .child(Element::new("span").attr("class", "lumen-spinner"))
        .child(Element::new("span").child("Loading…"))
        .into()
}

pub fn rendered_node(tree: &VNode) -> VNode {
    Element::new("div")
        .attr("class", "lumen-block")
        .child(tree.clone())
        .into()
}

pub fn failure_node(failure: &Failure, options: PanelOptions) -> VNode {
    let stage = match failure.stage {
        FailureStage::Load => "load",
        FailureStage::Compile => "compile",
        FailureStage::Execute => "execute",
    };
    let mut panel = Element::new("div")
        .attr("class", "lumen-block lumen-error")
        .attr("role", "alert")
        .attr("data-stage", stage)
        .child(
            Element::new("p")
                .attr("class", "lumen-error-title")
                .child("This block could not be rendered"),
        )
        .child(
            Element::new("pre")
                .attr("class", "lumen-error-message")
                .child(failure.message.as_str()),
        );
    if options.show_trace && !failure.trace.is_empty() {
        panel = panel.child(
            Element::new("details")
                .attr("class", "lumen-error-trace")
                .child(Element::new("summary").child("Trace"))
                .child(Element::new("pre").child(failure.trace.as_str())),
        );
    }
    panel
        .child(
            Element::new("button")
                .attr("type", "button")
                .attr("class", "lumen-retry")
                .attr("data-action", "retry")
                .child("Retry"),
        )
        .into()
}

pub fn outcome_node(outcome: &RenderOutcome, options: PanelOptions) -> VNode {
    match outcome {
        RenderOutcome::Rendered { tree } => rendered_node(tree),
        RenderOutcome::Failed { failure } => failure_node(failure, options),
    }
}

pub fn outcome_html(outcome: &RenderOutcome, options: PanelOptions) -> String {
    render_html(&outcome_node(outcome, options))
}

/// The block as it should currently appear: a placeholder until it settles.
pub fn shell_html(shell: &BlockShell, options: PanelOptions) -> String {
    match (shell.state(), shell.outcome()) {
        (BlockState::Rendered | BlockState::Failed, Some(outcome)) => {
            outcome_html(outcome, options)
        }
        _ => render_html(&loading_node()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> Failure {
        Failure {
            stage: FailureStage::Execute,
            message: "ReferenceError: useState is not defined".to_string(),
            trace: "ReferenceError: useState is not defined\n    at <block> (block:1:9)".to_string(),
        }
    }

    #[test]
    fn failure_panels_offer_a_retry() {
        let html = render_html(&failure_node(&failure(), PanelOptions::default()));
        assert!(html.starts_with(r#"<div class="lumen-block lumen-error" role="alert" data-stage="execute">"#));
        assert!(html.contains("ReferenceError: useState is not defined"));
        assert!(html.contains("<details class=\"lumen-error-trace\">"));
        assert!(html.contains("at &lt;block&gt; (block:1:9)"));
        assert!(html.contains(r#"data-action="retry""#));
    }

    #[test]
    fn traces_can_be_hidden() {
        let html = render_html(&failure_node(&failure(), PanelOptions { show_trace: false }));
        assert!(!html.contains("<details"));
        assert!(html.contains("lumen-retry"));
    }

    #[test]
    fn config_controls_trace_visibility() {
        let config = LumenConfig::with_overrides(&serde_json::json!({ "shell": { "showTrace": false } }));
        assert!(!PanelOptions::from_config(&config).show_trace);
        assert!(PanelOptions::from_config(&LumenConfig::default()).show_trace);
    }

    #[test]
    fn rendered_and_loading_blocks_are_never_blank() {
        let tree = VNode::text("hi");
        let rendered = outcome_html(&RenderOutcome::Rendered { tree }, PanelOptions::default());
        assert_eq!(rendered, r#"<div class="lumen-block">hi</div>"#);
        assert!(render_html(&loading_node()).contains("lumen-loading"));
    }
}
