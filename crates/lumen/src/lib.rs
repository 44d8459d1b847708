#![forbid(unsafe_code)]

//! `lumen` renders untrusted, AI-generated JSX blocks without giving them the host.
//!
//! Each block is normalized (entity repair), compiled by an embedded interpreter that only sees
//! a closed capability surface, and executed inside an isolation shell: a failing block becomes
//! an error panel with a trace and a retry action, never a blank page.
//!
//! # Features
//!
//! - `render`: concrete capability helpers, HTML output and [`render::HeadlessRenderer`]

pub use lumen_core::*;

#[cfg(feature = "render")]
pub mod render {
    use futures::executor::block_on;
    use lumen_core::{
        BlockShell, CompiledUnit, Compiler, Failure, GenerationBlock, LumenConfig, Page,
        RenderOutcome, Runtime, normalize,
    };
    use std::sync::Arc;

    pub use lumen_render::canvas::{DiagramCanvas, ScrollAdaptedFlow, ScrollAdapter};
    pub use lumen_render::html::render_html;
    pub use lumen_render::panel::{PanelOptions, outcome_html, shell_html};
    pub use lumen_render::surface::default_surface;

    #[derive(Debug, thiserror::Error)]
    pub enum HeadlessError {
        #[error(transparent)]
        Core(#[from] lumen_core::Error),
        #[error(transparent)]
        Render(#[from] lumen_render::Error),
    }

    pub type Result<T> = std::result::Result<T, HeadlessError>;

    /// Bundles the stock capability surface, a ready compiler and panel options, so rendering a
    /// block is a single call. Runtime-agnostic: the async methods need no particular executor
    /// and the `_sync` variants drive them with `futures::executor::block_on`.
    #[derive(Debug, Clone)]
    pub struct HeadlessRenderer {
        pub config: LumenConfig,
        pub runtime: Runtime,
        pub panel: PanelOptions,
    }

    impl HeadlessRenderer {
        pub fn new() -> Result<Self> {
            Self::with_config(LumenConfig::default())
        }

        pub fn with_config(config: LumenConfig) -> Result<Self> {
            let surface = default_surface(&config)?;
            let runtime = Runtime::with_config(Arc::new(surface), &config);
            let panel = PanelOptions::from_config(&config);
            Ok(Self {
                config,
                runtime,
                panel,
            })
        }

        /// Compiles without executing. The failure carries the same message and trace a
        /// rendered error panel would show.
        pub fn check(&self, text: &str) -> std::result::Result<CompiledUnit, Failure> {
            let source = normalize(text);
            Compiler::from_config(&self.config)
                .compile(&source)
                .map_err(|err| Failure::syntax(&err, source.as_str()))
        }

        pub async fn render_block(&self, text: &str) -> RenderOutcome {
            let mut shell = BlockShell::new(self.runtime.clone(), GenerationBlock::new(text));
            shell.run().await.clone()
        }

        pub async fn render_block_html(&self, text: &str) -> String {
            outcome_html(&self.render_block(text).await, self.panel)
        }

        /// Every block rendered side by side in a `div.lumen-page`; failures stay inside their
        /// own panel.
        pub async fn render_page_html<I, S>(&self, blocks: I) -> String
        where
            I: IntoIterator<Item = S>,
            S: Into<Arc<str>>,
        {
            let mut page = Page::new(&self.runtime, blocks.into_iter().map(GenerationBlock::new));
            let outcomes = page.run_all().await;
            let mut html = String::from(r#"<div class="lumen-page">"#);
            for outcome in &outcomes {
                html.push_str(&outcome_html(outcome, self.panel));
            }
            html.push_str("</div>");
            html
        }

        pub fn render_block_sync(&self, text: &str) -> RenderOutcome {
            block_on(self.render_block(text))
        }

        pub fn render_block_html_sync(&self, text: &str) -> String {
            block_on(self.render_block_html(text))
        }

        pub fn render_page_html_sync<I, S>(&self, blocks: I) -> String
        where
            I: IntoIterator<Item = S>,
            S: Into<Arc<str>>,
        {
            block_on(self.render_page_html(blocks))
        }

        /// The outcome as pretty JSON (`{"status": ..., "tree" | "failure": ...}`).
        pub fn render_block_json_sync(&self, text: &str) -> Result<String> {
            Ok(lumen_render::outcome_json(&self.render_block_sync(text))?)
        }
    }
}
