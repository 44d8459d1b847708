//! The stock capability surface: every [`CapabilityName`] bound to a concrete helper.

use crate::canvas::ScrollAdaptedFlow;
use crate::components::charts::{ChartSize, recharts};
use crate::components::flow::{react_flow, react_flow_namespace};
use crate::components::highlight::{dark_theme, syntax_highlighter};
use crate::components::latex::latex;
use crate::components::motion::motion_namespace;
use crate::components::plot::{PlotSize, plot};
use crate::{Error, Result};
use lumen_core::{Capability, CapabilityName, CapabilitySurface, Lazy, LumenConfig};

/// Highlighter themes a config may name under `highlight.theme`.
pub fn theme(name: &str) -> Option<serde_json::Value> {
    match name {
        "dark" => Some(dark_theme()),
        _ => None,
    }
}

pub fn default_surface(config: &LumenConfig) -> Result<CapabilitySurface> {
    let theme_name = config.get_str("highlight.theme").unwrap_or("dark");
    let highlight_theme = theme(theme_name).ok_or_else(|| Error::UnknownTheme {
        name: theme_name.to_string(),
    })?;

    let plot_size = PlotSize::from_config(config);
    let lazy_plot = Lazy::new("Plot", move || async move { Ok(plot(plot_size)) });

    let flow = if config.get_bool("canvas.scrollAdapter").unwrap_or(true) {
        ScrollAdaptedFlow::wrap(react_flow())
    } else {
        tracing::debug!("scroll adapter disabled; RF canvases keep wheel zoom");
        react_flow()
    };

    let surface = CapabilitySurface::builder()
        .with(CapabilityName::Latex, latex())
        .with(
            CapabilityName::Recharts,
            recharts(ChartSize::from_config(config)),
        )
        .with(CapabilityName::Plot, Capability::Lazy(lazy_plot))
        .with(
            CapabilityName::SyntaxHighlighter,
            syntax_highlighter(highlight_theme),
        )
        .with(CapabilityName::Dark, Capability::Data(dark_theme()))
        .with(CapabilityName::Rf, react_flow_namespace(flow))
        .with(CapabilityName::Motion, motion_namespace())
        .build()?;
    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn every_name_is_bound() {
        let surface = default_surface(&LumenConfig::default()).expect("surface");
        for name in CapabilityName::ALL {
            assert!(surface.get(name).is_some(), "{name} is bound");
        }
        let Some(Capability::Namespace(rf)) = surface.get(CapabilityName::Rf) else {
            panic!("RF is a namespace");
        };
        for member in ["ReactFlow", "Background", "Controls", "MiniMap", "Position", "MarkerType"] {
            assert!(rf.get(member).is_some(), "RF.{member}");
        }
    }

    #[test]
    fn plot_loads_lazily_once() {
        let surface = default_surface(&LumenConfig::default()).expect("surface");
        assert!(!surface.is_ready(&[CapabilityName::Plot]));
        assert!(surface.is_ready(&[CapabilityName::Recharts, CapabilityName::Latex]));

        block_on(surface.ensure_loaded(&[CapabilityName::Plot])).expect("plot loads");
        block_on(surface.ensure_loaded(&[CapabilityName::Plot])).expect("cached");
        let modules = surface.lazy_modules(&[CapabilityName::Plot]);
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].attempts(), 1);
        assert!(surface.is_ready(&[CapabilityName::Plot]));
    }

    #[test]
    fn unknown_highlight_themes_are_rejected() {
        let config = LumenConfig::with_overrides(&json!({ "highlight": { "theme": "solarized" } }));
        let err = default_surface(&config).expect_err("unknown theme");
        assert_eq!(err.to_string(), "unknown highlight theme: solarized");
    }
}
