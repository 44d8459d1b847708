#![forbid(unsafe_code)]

//! Headless core for rendering AI-generated UI blocks.
//!
//! Design goals:
//! - generated text is untrusted: it only ever sees the closed [`CapabilitySurface`]
//! - one block failing never affects the page or its siblings ([`BlockShell`])
//! - deterministic, testable outputs (a plain [`VNode`] tree)
//! - runtime-agnostic async APIs (no specific executor required)

pub mod capability;
pub mod compile;
pub mod config;
pub mod entities;
pub mod error;
pub mod normalize;
pub mod script;
pub mod shell;
pub mod vnode;

pub use capability::{
    Capability, CapabilityName, CapabilitySurface, Component, Lazy, LazyComponent, LoadError,
    Namespace, SurfaceBuilder, component_fn,
};
pub use compile::{CompiledUnit, Compiler};
pub use config::LumenConfig;
pub use error::{Error, Result};
pub use normalize::{NormalizeReport, NormalizedSource, normalize, normalize_with_report};
pub use shell::{
    BlockShell, BlockState, Failure, FailureStage, GenerationBlock, Page, RenderOutcome, Runtime,
    compile_source, instantiate_unit, render_source,
};
pub use vnode::{AttrValue, Element, VNode};

#[cfg(test)]
mod tests;
