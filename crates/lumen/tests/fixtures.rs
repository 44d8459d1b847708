use lumen::render::HeadlessRenderer;
use lumen::{FailureStage, LumenConfig, RenderOutcome};
use std::path::{Path, PathBuf};

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .join("fixtures")
        .join("blocks")
}

fn fixtures(prefix: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = std::fs::read_dir(fixtures_dir())
        .expect("fixtures/blocks")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "jsx")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
        })
        .map(|path| {
            let text = std::fs::read_to_string(&path).expect("read fixture");
            (path.display().to_string(), text)
        })
        .collect();
    out.sort();
    assert!(!out.is_empty(), "no {prefix}* fixtures");
    out
}

/// A `// key: value` header line in a fixture.
fn header<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines()
        .take_while(|l| l.starts_with("//"))
        .find_map(|l| {
            l.trim_start_matches('/')
                .trim()
                .strip_prefix(key)?
                .strip_prefix(':')
        })
        .map(str::trim)
}

fn assert_svgs_well_formed(name: &str, html: &str) {
    let mut rest = html;
    while let Some(start) = rest.find("<svg") {
        let end = rest[start..].find("</svg>").expect("closed svg") + start + "</svg>".len();
        if let Err(err) = roxmltree::Document::parse(&rest[start..end]) {
            panic!("{name}: malformed svg: {err}");
        }
        rest = &rest[end..];
    }
}

#[test]
fn ok_fixtures_render() {
    let renderer = HeadlessRenderer::new().expect("renderer");
    for (name, text) in fixtures("ok_") {
        let outcome = renderer.render_block_sync(&text);
        if let RenderOutcome::Failed { failure } = &outcome {
            panic!("{name} failed: {}\n{}", failure.message, failure.trace);
        }
        let html = renderer.render_block_html_sync(&text);
        assert!(html.starts_with(r#"<div class="lumen-block">"#), "{name}");
        assert_svgs_well_formed(&name, &html);
        assert!(renderer.check(&text).is_ok(), "{name} compiles");
    }
}

#[test]
fn err_fixtures_fail_with_the_expected_message() {
    let renderer = HeadlessRenderer::new().expect("renderer");
    for (name, text) in fixtures("err_") {
        let outcome = renderer.render_block_sync(&text);
        let failure = outcome
            .failure()
            .unwrap_or_else(|| panic!("{name} should fail"));
        if let Some(expected) = header(&text, "expect") {
            assert_eq!(failure.message, expected, "{name}");
        }
        if header(&text, "expect-stage") == Some("compile") {
            assert_eq!(failure.stage, FailureStage::Compile, "{name}");
            assert!(renderer.check(&text).is_err(), "{name}");
        }
        let html = renderer.render_block_html_sync(&text);
        assert!(html.contains(r#"role="alert""#), "{name}");
        assert!(html.contains(r#"data-action="retry""#), "{name}");
    }
}

#[test]
fn entity_fixture_decodes_apostrophes_but_keeps_markup_inert() {
    let renderer = HeadlessRenderer::new().expect("renderer");
    let text = std::fs::read_to_string(fixtures_dir().join("ok_entities.jsx")).expect("fixture");
    let html = renderer.render_block_html_sync(&text);
    assert!(html.contains(r#"title="Opponent's Deduced Range""#), "{html}");
    assert!(html.contains("Café &amp; bar"), "{html}");
    assert!(html.contains("Don't panic"), "{html}");
    assert!(!html.contains("<div> markup"), "{html}");
}

#[test]
fn a_page_keeps_failures_inside_their_panels() {
    let renderer = HeadlessRenderer::new().expect("renderer");
    let html = renderer.render_page_html_sync([
        "return <p>first</p>;",
        "return <p>{missing}</p>;",
        "return <p>third</p>;",
    ]);
    assert!(html.starts_with(r#"<div class="lumen-page">"#));
    assert!(html.contains("<p>first</p>"));
    assert!(html.contains("ReferenceError: missing is not defined"));
    assert!(html.contains("<p>third</p>"));
}

#[test]
fn hidden_traces_and_json_output() {
    let mut config = LumenConfig::default();
    config.set_value("shell.showTrace", serde_json::Value::Bool(false));
    let renderer = HeadlessRenderer::with_config(config).expect("renderer");
    let html = renderer.render_block_html_sync("return <p>{nope}</p>;");
    assert!(html.contains("ReferenceError: nope is not defined"));
    assert!(!html.contains("<details"));

    let json = renderer
        .render_block_json_sync("return <p>ok</p>;")
        .expect("json");
    assert!(json.contains(r#""status": "rendered""#), "{json}");
}
