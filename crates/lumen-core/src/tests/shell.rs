use super::{stub, stub_surface, surface_builder};
use crate::*;
use futures::FutureExt;
use futures::executor::block_on;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn runtime(surface: CapabilitySurface) -> Runtime {
    Runtime::with_config(Arc::new(surface), &LumenConfig::default())
}

fn shell(text: &str) -> BlockShell {
    BlockShell::new(runtime(stub_surface()), GenerationBlock::new(text))
}

fn failure_of(text: &str) -> Failure {
    let mut shell = shell(text);
    let outcome = block_on(shell.run()).clone();
    assert_eq!(shell.state(), BlockState::Failed);
    outcome.failure().cloned().expect("block fails")
}

#[test]
fn a_good_block_settles_rendered() {
    let mut shell = shell(r#"return <p title="it&#39;s">{'ok'}</p>;"#);
    assert_eq!(shell.state(), BlockState::Loading);
    assert!(shell.source().as_str().contains(r#"title="it's""#));

    let outcome = block_on(shell.run()).clone();
    assert_eq!(shell.state(), BlockState::Rendered);
    let tree = outcome.tree().expect("rendered");
    let p = tree.find_tag("p").expect("p");
    assert_eq!(p.attr_str("title"), Some("it's"));
    assert_eq!(tree.text_content(), "ok");

    // Settled blocks do no further work.
    block_on(shell.run());
    assert_eq!(shell.attempts(), 1);
}

#[test]
fn reference_errors_fail_execution_with_a_trace() {
    let failure = failure_of("const a = 1;\nreturn <div>{useState(0)}</div>;");
    assert_eq!(failure.stage, FailureStage::Execute);
    assert_eq!(failure.message, "ReferenceError: useState is not defined");
    assert!(
        failure.trace.contains("at <block> (block:2:14)"),
        "{}",
        failure.trace
    );
    assert!(
        failure
            .trace
            .contains(" 2 | return <div>{useState(0)}</div>;"),
        "{}",
        failure.trace
    );
    assert!(failure.trace.contains(&format!(" {}^^^^^^^^", " ".repeat(13))));
}

#[test]
fn traces_name_the_functions_that_unwound() {
    let failure = failure_of(
        "function Row() {\n  return missing.value;\n}\nreturn <div><Row /></div>;",
    );
    let at_lines: Vec<&str> = failure
        .trace
        .lines()
        .filter(|l| l.trim_start().starts_with("at "))
        .collect();
    assert_eq!(
        at_lines,
        vec!["    at Row (block:2:10)", "    at <block> (block:4:13)"]
    );
}

#[test]
fn syntax_errors_fail_at_compile_time() {
    let failure = failure_of("return <div>;");
    assert_eq!(failure.stage, FailureStage::Compile);
    assert!(failure.message.starts_with("SyntaxError: "));
    assert!(failure.trace.contains("(block:1:"));
}

#[test]
fn a_panicking_capability_is_contained() {
    let surface = surface_builder()
        .with(
            CapabilityName::Latex,
            component_fn("Latex", |_, _, _| panic!("katex exploded")),
        )
        .build()
        .expect("surface");
    let mut shell = BlockShell::new(
        runtime(surface),
        GenerationBlock::new(r#"return <Latex text="x" />;"#),
    );
    let failure = block_on(shell.run())
        .failure()
        .cloned()
        .expect("panic becomes a failure");
    assert_eq!(failure.stage, FailureStage::Execute);
    assert_eq!(failure.message, "Internal error: katex exploded");
    assert_eq!(shell.state(), BlockState::Failed);
}

#[test]
fn runaway_recursion_fails_without_taking_down_the_host() {
    let failure = failure_of("function f(n) { return f(n + 1); }\nreturn <p>{f(0)}</p>;");
    assert_eq!(failure.message, "RangeError: Maximum call stack size exceeded");
    let frames = failure
        .trace
        .lines()
        .filter(|l| l.starts_with("    at "))
        .count();
    assert_eq!(frames, 10);
    assert!(failure.trace.contains("more frames"));
}

#[test]
fn infinite_loops_fail_with_a_range_error() {
    let failure = failure_of("while (true) {}\nreturn null;");
    assert_eq!(failure.message, "RangeError: Loop iteration limit exceeded");
}

#[test]
fn failed_loads_can_be_retried_with_the_same_source() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let plot: LazyComponent = Lazy::new("Plot", move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err(LoadError::new("Plot", "offline"))
            } else {
                Ok(stub("Plot"))
            }
        }
    });
    let surface = surface_builder()
        .with(CapabilityName::Plot, Capability::Lazy(plot))
        .build()
        .expect("surface");
    let mut shell = BlockShell::new(
        runtime(surface),
        GenerationBlock::new("return <Plot text=\"chart\" />;"),
    );
    let source = shell.source().clone();

    let failure = block_on(shell.run()).failure().cloned().expect("load fails");
    assert_eq!(failure.stage, FailureStage::Load);
    assert_eq!(failure.message, "Failed to load Plot: offline");
    assert_eq!(shell.state(), BlockState::Failed);

    shell.reset();
    assert_eq!(shell.state(), BlockState::Compiling);
    assert!(shell.outcome().is_none());
    assert!(shell.source().ptr_eq(&source));

    let outcome = block_on(shell.run()).clone();
    assert_eq!(shell.state(), BlockState::Rendered);
    assert_eq!(outcome.tree().map(VNode::text_content).as_deref(), Some("chart"));
    assert_eq!(shell.attempts(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn reset_is_ignored_unless_failed() {
    let mut shell = shell("return 1;");
    shell.reset();
    assert_eq!(shell.state(), BlockState::Loading);
    block_on(shell.run());
    shell.reset();
    assert_eq!(shell.state(), BlockState::Rendered);
}

#[test]
fn a_compiler_that_never_loads_leaves_the_block_loading() {
    let runtime = Runtime::new(
        Arc::new(stub_surface()),
        Lazy::new("compiler", futures::future::pending::<std::result::Result<Compiler, LoadError>>),
    );
    let mut shell = BlockShell::new(runtime, GenerationBlock::new("return 1;"));
    assert!(shell.run().now_or_never().is_none());
    assert_eq!(shell.state(), BlockState::Loading);
    assert!(shell.outcome().is_none());
}

#[test]
fn replacing_the_block_starts_over() {
    let mut shell = shell("return <p>{nope}</p>;");
    block_on(shell.run());
    assert_eq!(shell.state(), BlockState::Failed);

    shell.replace(GenerationBlock::new("return <p>fixed</p>;"));
    assert_eq!(shell.state(), BlockState::Loading);
    let outcome = block_on(shell.run()).clone();
    assert_eq!(outcome.tree().map(VNode::text_content).as_deref(), Some("fixed"));
}

#[test]
fn siblings_on_a_page_are_isolated() {
    let runtime = runtime(stub_surface());
    let mut page = Page::new(
        &runtime,
        [
            GenerationBlock::new("return <p>one</p>;"),
            GenerationBlock::new("return <p>;"),
            GenerationBlock::new("return <p>{missing()}</p>;"),
            GenerationBlock::new("return <p>four</p>;"),
        ],
    );
    let outcomes = block_on(page.run_all());
    let states: Vec<_> = page.shells().iter().map(BlockShell::state).collect();
    assert_eq!(
        states,
        vec![
            BlockState::Rendered,
            BlockState::Failed,
            BlockState::Failed,
            BlockState::Rendered
        ]
    );
    assert_eq!(
        outcomes[1].failure().map(|f| f.stage),
        Some(FailureStage::Compile)
    );
    assert_eq!(
        outcomes[2].failure().map(|f| f.stage),
        Some(FailureStage::Execute)
    );
    assert_eq!(
        outcomes[3].tree().map(VNode::text_content).as_deref(),
        Some("four")
    );
}

#[test]
fn mutating_a_capability_does_not_leak_into_other_blocks() {
    let runtime = runtime(stub_surface());
    let mut page = Page::new(
        &runtime,
        [
            GenerationBlock::new(
                "dark.color = 'red'; RF.Position.Left = 'up'; return <p>{dark.color}</p>;",
            ),
            GenerationBlock::new("return <p>{dark.color} {RF.Position.Left}</p>;"),
        ],
    );
    let outcomes = block_on(page.run_all());
    let texts: Vec<_> = outcomes
        .iter()
        .map(|o| o.tree().map(VNode::text_content))
        .collect();
    assert_eq!(
        texts,
        vec![Some("red".to_string()), Some("#fff left".to_string())]
    );
}

#[test]
fn outcomes_serialize_with_a_status_tag() {
    let mut shell = shell("return <p>{nope}</p>;");
    let json = serde_json::to_value(block_on(shell.run())).expect("serialize");
    assert_eq!(json["status"], "failed");
    assert_eq!(json["failure"]["stage"], "execute");
    assert_eq!(
        json["failure"]["message"],
        "ReferenceError: nope is not defined"
    );
}
