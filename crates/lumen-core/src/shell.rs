//! Per-block fault containment.
//!
//! A [`BlockShell`] drives one generation block through `Loading → Compiling → Rendered | Failed`.
//! Whatever goes wrong (a load error, a syntax error, a thrown error, a panicking helper) ends in
//! `Failed` with diagnostics; nothing escapes to the page or to sibling blocks. `reset` retries
//! from the same normalized source.

use crate::capability::{CapabilitySurface, Lazy, LoadError};
use crate::compile::{CompiledUnit, Compiler};
use crate::config::LumenConfig;
use crate::normalize::{NormalizedSource, normalize};
use crate::script::{RuntimeError, Span, SyntaxError};
use crate::vnode::VNode;
use serde::Serialize;
use std::any::Any;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

/// Stack for the thread that compiles and executes a block. Script recursion is bounded by the
/// call-depth limit; this only has to hold that many interpreter frames.
const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

const MAX_TRACE_FRAMES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Load,
    Compile,
    Execute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub stage: FailureStage,
    /// One line, e.g. `ReferenceError: useState is not defined`.
    pub message: String,
    /// Message, frames and a source excerpt.
    pub trace: String,
}

impl Failure {
    pub fn load(err: &LoadError) -> Self {
        Self {
            stage: FailureStage::Load,
            message: err.to_string(),
            trace: format!("{err}\n    while loading module `{}`", err.module),
        }
    }

    pub fn syntax(err: &SyntaxError, source: &str) -> Self {
        let message = err.to_string();
        let mut trace = message.clone();
        let (line, col) = line_col(source, err.span.start);
        let _ = write!(trace, "\n    at <block> (block:{line}:{col})");
        push_excerpt(&mut trace, source, err.span);
        Self {
            stage: FailureStage::Compile,
            message,
            trace,
        }
    }

    pub fn runtime(err: &RuntimeError, source: &str) -> Self {
        let message = err.to_string();
        let mut trace = message.clone();

        let names: Vec<&str> = err
            .frames
            .iter()
            .map(|f| f.function.as_str())
            .chain(std::iter::once("<block>"))
            .collect();
        let locations: Vec<Option<Span>> = std::iter::once(err.span)
            .chain(err.frames.iter().map(|f| Some(f.call_site)))
            .collect();
        for (name, location) in names.iter().zip(&locations).take(MAX_TRACE_FRAMES) {
            match location {
                Some(span) => {
                    let (line, col) = line_col(source, span.start);
                    let _ = write!(trace, "\n    at {name} (block:{line}:{col})");
                }
                None => {
                    let _ = write!(trace, "\n    at {name} (block)");
                }
            }
        }
        if names.len() > MAX_TRACE_FRAMES {
            let _ = write!(
                trace,
                "\n    ... {} more frames",
                names.len() - MAX_TRACE_FRAMES
            );
        }
        if let Some(span) = err.span {
            push_excerpt(&mut trace, source, span);
        }
        Self {
            stage: FailureStage::Execute,
            message,
            trace,
        }
    }

    fn panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let message = format!("Internal error: {detail}");
        Self {
            stage: FailureStage::Execute,
            trace: format!("{message}\n    (a capability helper panicked while rendering)"),
            message,
        }
    }
}

/// 1-based line and column (in characters) of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let col = before[line_start..].chars().count() + 1;
    (line, col)
}

fn push_excerpt(out: &mut String, source: &str, span: Span) {
    let (line, col) = line_col(source, span.start);
    let Some(text) = source.lines().nth(line - 1) else {
        return;
    };
    let gutter = line.to_string();
    let line_chars = text.chars().count();
    let span_chars = source
        .get(span.start..span.end.max(span.start))
        .map_or(1, |s| s.lines().next().unwrap_or("").chars().count())
        .max(1);
    let width = span_chars.min(line_chars.saturating_sub(col - 1).max(1));
    let _ = write!(
        out,
        "\n\n {gutter} | {text}\n {pad} | {spaces}{carets}",
        pad = " ".repeat(gutter.len()),
        spaces = " ".repeat(col - 1),
        carets = "^".repeat(width),
    );
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RenderOutcome {
    Rendered { tree: VNode },
    Failed { failure: Failure },
}

impl RenderOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderOutcome::Rendered { .. })
    }

    pub fn tree(&self) -> Option<&VNode> {
        match self {
            RenderOutcome::Rendered { tree } => Some(tree),
            RenderOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            RenderOutcome::Failed { failure } => Some(failure),
            RenderOutcome::Rendered { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    Loading,
    Compiling,
    Rendered,
    Failed,
}

/// Untrusted generated text to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationBlock {
    raw_text: Arc<str>,
}

impl GenerationBlock {
    pub fn new(raw_text: impl Into<Arc<str>>) -> Self {
        Self {
            raw_text: raw_text.into(),
        }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

/// What every block on a page shares: the surface and the (lazily loaded) compiler.
#[derive(Debug, Clone)]
pub struct Runtime {
    surface: Arc<CapabilitySurface>,
    compiler: Lazy<Compiler>,
}

impl Runtime {
    pub fn new(surface: Arc<CapabilitySurface>, compiler: Lazy<Compiler>) -> Self {
        Self { surface, compiler }
    }

    /// A runtime whose compiler is available immediately.
    pub fn with_config(surface: Arc<CapabilitySurface>, config: &LumenConfig) -> Self {
        Self::new(
            surface,
            Lazy::ready("compiler", Compiler::from_config(config)),
        )
    }

    pub fn surface(&self) -> &Arc<CapabilitySurface> {
        &self.surface
    }

    pub fn compiler(&self) -> &Lazy<Compiler> {
        &self.compiler
    }
}

fn timing_enabled() -> bool {
    static ENABLED: std::sync::OnceLock<bool> = std::sync::OnceLock::new();
    *ENABLED.get_or_init(|| match std::env::var("LUMEN_RENDER_TIMING").as_deref() {
        Ok("1") | Ok("true") => true,
        _ => false,
    })
}

/// Runs `work` on a dedicated worker thread with a large stack; a panic comes back as a
/// [`Failure`].
fn guarded<T: Send>(work: impl FnOnce() -> Result<T, Failure> + Send) -> Result<T, Failure> {
    let joined = std::thread::scope(|scope| {
        std::thread::Builder::new()
            .name("lumen-block".to_string())
            .stack_size(WORKER_STACK_SIZE)
            .spawn_scoped(scope, work)
            .map(|handle| handle.join())
    });
    match joined {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(Failure::panic(payload)),
        Err(err) => Err(Failure {
            stage: FailureStage::Execute,
            message: format!("Internal error: could not start the block worker: {err}"),
            trace: String::new(),
        }),
    }
}

/// Parses `source` under the fault boundary.
pub fn compile_source(
    compiler: &Compiler,
    source: &NormalizedSource,
) -> Result<CompiledUnit, Failure> {
    guarded(|| {
        let start = timing_enabled().then(Instant::now);
        let unit = compiler
            .compile(source)
            .map_err(|e| Failure::syntax(&e, source.as_str()));
        if let Some(start) = start {
            eprintln!(
                "[render-timing] stage=compile elapsed={:?} input_bytes={}",
                start.elapsed(),
                source.as_str().len(),
            );
        }
        unit
    })
}

/// First invocation of a compiled unit under the fault boundary. Every lazy capability the unit
/// requests must already be loaded.
pub fn instantiate_unit(
    unit: &CompiledUnit,
    surface: &CapabilitySurface,
) -> Result<VNode, Failure> {
    guarded(|| {
        let start = timing_enabled().then(Instant::now);
        let tree = unit
            .instantiate(surface)
            .map_err(|e| Failure::runtime(&e, unit.source().as_str()));
        if let Some(start) = start {
            eprintln!(
                "[render-timing] stage=execute elapsed={:?} capabilities={}",
                start.elapsed(),
                unit.parameter_list(),
            );
        }
        tree
    })
}

/// Compiles and executes `source` in one step, for surfaces whose lazy capabilities are already
/// loaded. [`BlockShell`] loads them between the two halves.
pub fn render_source(
    compiler: &Compiler,
    source: &NormalizedSource,
    surface: &CapabilitySurface,
) -> Result<VNode, Failure> {
    let unit = compile_source(compiler, source)?;
    instantiate_unit(&unit, surface)
}

#[derive(Debug)]
pub struct BlockShell {
    runtime: Runtime,
    block: GenerationBlock,
    source: NormalizedSource,
    state: BlockState,
    outcome: Option<RenderOutcome>,
    attempts: usize,
}

impl BlockShell {
    pub fn new(runtime: Runtime, block: GenerationBlock) -> Self {
        let source = normalize(block.raw_text());
        Self {
            runtime,
            block,
            source,
            state: BlockState::Loading,
            outcome: None,
            attempts: 0,
        }
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    pub fn block(&self) -> &GenerationBlock {
        &self.block
    }

    pub fn source(&self) -> &NormalizedSource {
        &self.source
    }

    pub fn outcome(&self) -> Option<&RenderOutcome> {
        self.outcome.as_ref()
    }

    /// Render attempts started so far (initial run plus retries).
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Drives the block to `Rendered` or `Failed`. Finished blocks return their outcome without
    /// doing any work. Dropping the future before it completes leaves the state untouched.
    pub async fn run(&mut self) -> &RenderOutcome {
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None => {
                let outcome = self.attempt().await;
                self.state = match &outcome {
                    RenderOutcome::Rendered { .. } => BlockState::Rendered,
                    RenderOutcome::Failed { failure } => {
                        tracing::warn!(
                            stage = ?failure.stage,
                            message = %failure.message,
                            attempt = self.attempts,
                            "block failed"
                        );
                        BlockState::Failed
                    }
                };
                tracing::debug!(state = ?self.state, "block settled");
                outcome
            }
        };
        self.outcome.insert(outcome)
    }

    async fn attempt(&mut self) -> RenderOutcome {
        self.attempts += 1;
        let runtime = self.runtime.clone();
        let compiler = match runtime.compiler.load().await {
            Ok(compiler) => compiler,
            Err(err) => return failed(Failure::load(&err)),
        };

        self.state = BlockState::Compiling;
        tracing::debug!(attempt = self.attempts, "compiling block");
        let unit = match compile_source(compiler, &self.source) {
            Ok(unit) => unit,
            Err(failure) => return failed(failure),
        };
        if let Err(err) = runtime
            .surface
            .ensure_loaded(unit.capabilities_requested())
            .await
        {
            return failed(Failure::load(&err));
        }
        match instantiate_unit(&unit, &runtime.surface) {
            Ok(tree) => RenderOutcome::Rendered { tree },
            Err(failure) => failed(failure),
        }
    }

    /// Retry after a failure: back to `Compiling` with the same normalized source. No-op in any
    /// other state.
    pub fn reset(&mut self) {
        if self.state == BlockState::Failed {
            self.state = BlockState::Compiling;
            self.outcome = None;
        }
    }

    /// Swaps in a new generation; the shell starts over at `Loading`.
    pub fn replace(&mut self, block: GenerationBlock) {
        self.source = normalize(block.raw_text());
        self.block = block;
        self.state = BlockState::Loading;
        self.outcome = None;
    }
}

fn failed(failure: Failure) -> RenderOutcome {
    RenderOutcome::Failed { failure }
}

/// Many blocks rendered concurrently; each is contained independently.
#[derive(Debug)]
pub struct Page {
    shells: Vec<BlockShell>,
}

impl Page {
    pub fn new(runtime: &Runtime, blocks: impl IntoIterator<Item = GenerationBlock>) -> Self {
        Self {
            shells: blocks
                .into_iter()
                .map(|block| BlockShell::new(runtime.clone(), block))
                .collect(),
        }
    }

    pub fn shells(&self) -> &[BlockShell] {
        &self.shells
    }

    pub fn shells_mut(&mut self) -> &mut [BlockShell] {
        &mut self.shells
    }

    pub async fn run_all(&mut self) -> Vec<RenderOutcome> {
        futures::future::join_all(
            self.shells
                .iter_mut()
                .map(|shell| async move { shell.run().await.clone() }),
        )
        .await
    }
}
