use super::*;
use crate::vnode::VNode;

fn run_with(src: &str, limits: Limits) -> Result<Value, RuntimeError> {
    let program = parse_program(src).unwrap_or_else(|e| panic!("parse failed: {e}"));
    let mut interp = Interpreter::new(limits);
    let scope = interp.scope(None);
    intrinsics::install(&scope);
    interp.run(&program.body, &scope)
}

fn run(src: &str) -> Result<Value, RuntimeError> {
    run_with(src, Limits::default())
}

fn eval_str(src: &str) -> String {
    run(src)
        .unwrap_or_else(|e| panic!("{e}"))
        .to_js_string()
}

/// Deep recursion needs more stack than the default test thread has.
fn on_big_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(f)
        .expect("spawn")
        .join()
        .expect("join")
}

#[test]
fn arithmetic_and_concatenation_coerce_like_javascript() {
    assert_eq!(eval_str(r#"return 1 + 2 * 3 + "x";"#), "7x");
    assert_eq!(eval_str(r#"return "3" * "4";"#), "12");
    assert_eq!(eval_str("return 2 ** 3 ** 2;"), "512");
    assert_eq!(eval_str("return 7 % 3 + (1 / 0);"), "Infinity");
    assert_eq!(eval_str("return [1, 2] + '';"), "1,2");
    assert_eq!(eval_str("return null ?? 'd';"), "d");
    assert_eq!(eval_str("return 0 || 'f';"), "f");
}

#[test]
fn closures_capture_their_defining_scope() {
    let src = "
        function make() {
          let n = 0;
          return () => ++n;
        }
        const c = make();
        c();
        c();
        return c();
    ";
    assert_eq!(eval_str(src), "3");
}

#[test]
fn destructuring_supports_defaults_holes_and_rest() {
    let src = r#"
        const { a, b = 2, ...rest } = { a: 1, c: 3, d: 4 };
        const [x, , y = 9, ...zs] = [1, 2, undefined, 4, 5];
        return [a, b, Object.keys(rest).join(""), x, y, zs.length].join(",");
    "#;
    assert_eq!(eval_str(src), "1,2,cd,1,9,2");
}

#[test]
fn optional_chains_short_circuit_the_whole_chain() {
    let src = r#"
        const o = null;
        return [o?.a.b.c, o?.f(), typeof missing].join("|");
    "#;
    assert_eq!(eval_str(src), "||undefined");
}

#[test]
fn array_and_string_builtins() {
    assert_eq!(
        eval_str("return [3, 1, 2].sort((a, b) => a - b).map(x => x * 2).filter(x => x > 2).reduce((s, x) => s + x, 0);"),
        "10"
    );
    assert_eq!(eval_str("return [10, 9, 1].sort();"), "1,10,9");
    assert_eq!(
        eval_str(r#"return "a-b-c".split("-").reverse().join("+");"#),
        "c+b+a"
    );
    assert_eq!(eval_str(r#"return "7".padStart(3, "0");"#), "007");
    assert_eq!(eval_str("return (1234.5).toFixed(1);"), "1234.5");
    assert_eq!(
        eval_str("return Array.from({ length: 3 }, (_, i) => i * i);"),
        "0,1,4"
    );
    assert_eq!(eval_str("return Math.max(...[4, 9, 2]);"), "9");
    assert_eq!(eval_str(r#"return JSON.stringify({ a: [1, "x"] });"#), r#"{"a":[1,"x"]}"#);
}

#[test]
fn loops_honour_break_and_continue() {
    let src = "
        let out = [];
        for (let i = 0; i < 10; i++) {
          if (i % 2) continue;
          if (i > 6) break;
          out.push(i);
        }
        for (const ch of 'ab') out.push(ch);
        let n = 0;
        while (n < 3) n += 1;
        out.push(n);
        return out.join('');
    ";
    assert_eq!(eval_str(src), "0246ab3");
}

#[test]
fn template_literals_interpolate() {
    assert_eq!(eval_str("const n = 2; return `a${n + 1}b${'c'}`;"), "a3bc");
}

#[test]
fn unknown_identifiers_are_reference_errors_with_location() {
    let src = "const a = 1;\nreturn nope + a;";
    let err = run(src).expect_err("reference error");
    assert_eq!(err.kind, ErrorKind::ReferenceError);
    assert_eq!(err.to_string(), "ReferenceError: nope is not defined");
    assert_eq!(err.span.map(|s| s.start), src.find("nope"));
}

#[test]
fn assigning_a_const_is_a_type_error() {
    let err = run("const a = 1; a = 2;").expect_err("const");
    assert_eq!(err.to_string(), "TypeError: Assignment to constant variable.");
}

#[test]
fn new_works_with_builtin_constructors_only() {
    assert_eq!(eval_str("return new Array(3).fill(0).join('-');"), "0-0-0");
    assert_eq!(eval_str("return new Array(1, 2).length;"), "2");
    assert_eq!(eval_str("return new Number('4') + 1;"), "5");

    let err = run("const F = () => 1; return new F();").expect_err("arrow");
    assert_eq!(err.to_string(), "TypeError: F is not a constructor");
    let err = run("return new Map();").expect_err("no Map");
    assert_eq!(err.kind, ErrorKind::ReferenceError);
}

#[test]
fn calling_a_missing_method_names_the_callee() {
    let err = run("const o = {}; o.foo();").expect_err("not a function");
    assert_eq!(err.to_string(), "TypeError: o.foo is not a function");
}

#[test]
fn errors_record_the_calls_they_unwound_through() {
    let src = "
        function inner() { return missing; }
        function outer() { return inner(); }
        return outer();
    ";
    let err = run(src).expect_err("reference error");
    let names: Vec<_> = err.frames.iter().map(|f| f.function.as_str()).collect();
    assert_eq!(names, vec!["inner", "outer"]);
}

#[test]
fn runaway_recursion_is_a_range_error() {
    let err = on_big_stack(|| {
        run("function f(n) { return f(n + 1); } return f(0);")
            .map(|v| v.to_js_string())
            .expect_err("unbounded recursion")
    });
    assert_eq!(err.kind, ErrorKind::RangeError);
    assert_eq!(err.message, "Maximum call stack size exceeded");
}

#[test]
fn runaway_loops_hit_the_iteration_budget() {
    let limits = Limits {
        max_loop_iterations: 1000,
        ..Limits::default()
    };
    let err = run_with("let i = 0; while (true) { i++; }", limits).expect_err("infinite loop");
    assert_eq!(err.to_string(), "RangeError: Loop iteration limit exceeded");
}

#[test]
fn jsx_renders_function_components_and_host_elements() {
    let src = r#"
        const Item = ({ label }) => <li className="x">{label}</li>;
        return <ul>{["a", "b"].map(l => <Item key={l} label={l} />)}</ul>;
    "#;
    let value = run(src).unwrap_or_else(|e| panic!("{e}"));
    let Value::Node(node) = value else {
        panic!("expected a node, got {value:?}");
    };
    assert_eq!(node.text_content(), "ab");
    let li = node.find_tag("li").expect("li");
    assert!(li.has_class("x"));
    assert!(li.get_attr("key").is_none());
}

#[test]
fn children_prop_reaches_function_components() {
    let src = r#"
        const Card = ({ title, children }) => <section><h2>{title}</h2>{children}</section>;
        return <Card title="T"><p>body</p></Card>;
    "#;
    let Value::Node(node) = run(src).unwrap_or_else(|e| panic!("{e}")) else {
        panic!("expected a node");
    };
    assert_eq!(node.text_content(), "Tbody");
    assert!(matches!(node.as_ref(), VNode::Element(el) if el.tag == "section"));
}

#[test]
fn undefined_component_is_a_reference_error() {
    let err = run("return <Missing />;").expect_err("missing component");
    assert_eq!(err.to_string(), "ReferenceError: Missing is not defined");
}
