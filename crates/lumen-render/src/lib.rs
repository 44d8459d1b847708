#![forbid(unsafe_code)]

//! Concrete helpers for the lumen capability surface, plus headless output.
//!
//! - [`surface::default_surface`] binds every capability name (`Latex`, `Recharts`, `Plot`,
//!   `SyntaxHighlighter`, `dark`, `RF`, `motion`) to a helper in [`components`]
//! - [`canvas`] models wheel routing for diagram canvases and the scroll adapter wrapped
//!   around `RF.ReactFlow`
//! - [`html`] and [`panel`] turn trees and block outcomes into HTML

pub mod canvas;
pub mod components;
pub mod html;
pub mod panel;
pub mod surface;
pub mod svg;

pub use canvas::{DiagramCanvas, ScrollAdaptedFlow, ScrollAdapter};
pub use html::render_html;
pub use panel::{PanelOptions, outcome_html, shell_html};
pub use surface::default_surface;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Surface(#[from] lumen_core::Error),
    #[error("unknown highlight theme: {name}")]
    UnknownTheme { name: String },
    #[error("outcome JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The outcome as pretty JSON (`{"status": "rendered", "tree": ...}`).
pub fn outcome_json(outcome: &lumen_core::RenderOutcome) -> Result<String> {
    Ok(serde_json::to_string_pretty(outcome)?)
}
