use super::stub_surface;
use crate::script::ErrorKind;
use crate::*;

fn compile(text: &str) -> CompiledUnit {
    Compiler::default()
        .compile(&normalize(text))
        .unwrap_or_else(|e| panic!("compile failed: {e}"))
}

#[test]
fn requested_capabilities_follow_surface_order() {
    let unit = compile(
        r#"
        const side = RF.Position.Left;
        return <div>
          <Latex text="x^2" />
          <Recharts.LineChart />
          <p>{side}</p>
        </div>;
        "#,
    );
    assert_eq!(
        unit.capabilities_requested(),
        &[
            CapabilityName::Latex,
            CapabilityName::Recharts,
            CapabilityName::Rf
        ]
    );
    assert_eq!(unit.parameter_list(), "{ Latex, Recharts, RF }");
}

#[test]
fn names_in_strings_and_comments_are_not_requested() {
    let unit = compile(
        r#"
        // Plot would be nice here
        return <p title="Latex">{"motion"}</p>;
        "#,
    );
    assert!(unit.capabilities_requested().is_empty());
    assert_eq!(unit.parameter_list(), "{  }");
}

#[test]
fn instantiate_renders_capabilities_from_the_surface() {
    let unit = compile(r#"return <section><Latex text="e=mc^2" /></section>;"#);
    let tree = unit.instantiate(&stub_surface()).expect("render");
    let span = tree.find_tag("span").expect("latex stub");
    assert_eq!(span.attr_str("data-capability"), Some("Latex"));
    assert_eq!(tree.text_content(), "e=mc^2");
}

#[test]
fn unrequested_capabilities_are_not_in_scope() {
    let unit = compile("const f = () => Latex; return <p>{typeof f}</p>;");
    assert_eq!(unit.capabilities_requested(), &[CapabilityName::Latex]);

    let unit = compile("return <p>{typeof React}</p>;");
    let tree = unit.instantiate(&stub_surface()).expect("render");
    assert_eq!(tree.text_content(), "undefined");
}

#[test]
fn a_returned_component_is_rendered_with_empty_props() {
    let unit = compile(
        r#"
        const App = (props) => <p>{Object.keys(props).length} props</p>;
        return App;
        "#,
    );
    let tree = unit.instantiate(&stub_surface()).expect("render");
    assert_eq!(tree.text_content(), "0 props");
}

#[test]
fn returning_nothing_is_a_type_error() {
    let unit = compile("const a = 1;");
    let err = unit
        .instantiate(&stub_surface())
        .expect_err("nothing returned");
    assert_eq!(err.kind, ErrorKind::TypeError);
    assert_eq!(
        err.message,
        "Nothing was returned from the block. Return an element, text or a component."
    );
}

#[test]
fn text_results_become_text_nodes() {
    let unit = compile("return `n = ${[1, 2, 3].length}`;");
    let tree = unit.instantiate(&stub_surface()).expect("render");
    assert_eq!(tree, VNode::text("n = 3"));
}

#[test]
fn a_lone_space_between_children_stays_single() {
    let unit = compile("const a = 'x'; return <p>{a} {'y'}</p>;");
    let tree = unit.instantiate(&stub_surface()).expect("render");
    assert_eq!(tree.text_content(), "x y");

    let unit = compile("return <p><b>x</b> <i>y</i></p>;");
    let tree = unit.instantiate(&stub_surface()).expect("render");
    assert_eq!(tree.text_content(), "x y");
}

#[test]
fn syntax_errors_carry_a_location() {
    let err = Compiler::default()
        .compile(&normalize("return <div>;"))
        .expect_err("unclosed element");
    assert!(err.to_string().starts_with("SyntaxError: "), "{err}");
    assert!(err.span.start <= "return <div>;".len());
}

#[test]
fn compiler_limits_come_from_config() {
    let config = LumenConfig::with_overrides(&serde_json::json!({
        "script": { "maxCallDepth": 8 }
    }));
    let unit = Compiler::from_config(&config)
        .compile(&normalize(
            "function f(n) { return n === 0 ? 0 : f(n - 1); } return <p>{f(20)}</p>;",
        ))
        .expect("compile");
    let err = unit.instantiate(&stub_surface()).expect_err("too deep");
    assert_eq!(err.to_string(), "RangeError: Maximum call stack size exceeded");
}
