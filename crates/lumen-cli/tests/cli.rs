use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};

fn repo_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .to_path_buf()
}

fn fixture(name: &str) -> PathBuf {
    let path = repo_root().join("fixtures").join("blocks").join(name);
    assert!(path.exists(), "fixture missing: {}", path.display());
    path
}

fn cli() -> Command {
    assert_cmd::cargo_bin_cmd!("lumen-cli")
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().expect("run lumen-cli");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).expect("utf-8 stdout")
}

#[test]
fn renders_a_chart_fixture_to_html() {
    let html = stdout_of(cli().args(["render", fixture("ok_line_chart.jsx").to_string_lossy().as_ref()]));
    assert!(html.starts_with(r#"<div class="lumen-block">"#), "{html}");
    assert!(html.contains("recharts-surface"));
}

#[test]
fn a_failing_block_still_renders_its_panel() {
    let html = stdout_of(cli().args([
        "render",
        "--no-trace",
        fixture("err_hooks.jsx").to_string_lossy().as_ref(),
    ]));
    assert!(html.contains("ReferenceError: useState is not defined"));
    assert!(html.contains(r#"data-action="retry""#));
    assert!(!html.contains("<details"));
}

#[test]
fn json_output_goes_to_the_requested_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("outcome.json");
    cli()
        .args([
            "render",
            "--format",
            "json",
            "--out",
            out.to_string_lossy().as_ref(),
            fixture("err_syntax.jsx").to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("read json")).expect("valid json");
    assert_eq!(json["status"], "failed");
    assert_eq!(json["failure"]["stage"], "compile");
}

#[test]
fn normalize_reads_stdin_and_reports_stages() {
    let output = cli()
        .args(["normalize", "--report"])
        .write_stdin(r#"<p title="it&#39;s">{'don&#39;t'}</p>"#)
        .output()
        .expect("run lumen-cli");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("report json");
    assert_eq!(json["source"], r#"<p title="it's">{"don't"}</p>"#);
    assert!(json["report"]["changed"].as_array().is_some_and(|a| !a.is_empty()));
}

#[test]
fn check_exits_nonzero_on_syntax_errors() {
    cli()
        .args(["check", fixture("err_syntax.jsx").to_string_lossy().as_ref()])
        .assert()
        .failure()
        .code(1);
    cli()
        .args(["check", fixture("ok_flow.jsx").to_string_lossy().as_ref()])
        .assert()
        .success();
}

#[test]
fn yaml_config_and_pages() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = tmp.path().join("lumen.yaml");
    fs::write(&config, "shell:\n  showTrace: false\nchart:\n  width: 480\n").expect("write config");

    let html = stdout_of(cli().args([
        "page",
        "--config",
        config.to_string_lossy().as_ref(),
        fixture("ok_pie_chart.jsx").to_string_lossy().as_ref(),
        fixture("err_recursion.jsx").to_string_lossy().as_ref(),
    ]));
    assert!(html.starts_with(r#"<div class="lumen-page">"#));
    assert!(html.contains("recharts-pie"));
    assert!(html.contains("RangeError: Maximum call stack size exceeded"));
    assert!(!html.contains("<details"));
}

#[test]
fn usage_errors_exit_with_two() {
    cli().args(["render", "--format", "png"]).assert().failure().code(2);
    cli().args(["page"]).assert().failure().code(2);
}
