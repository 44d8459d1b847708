use super::*;
use crate::script::parser::jsx::clean_jsx_text;

fn parse(src: &str) -> Program {
    parse_program(src).unwrap_or_else(|e| panic!("parse failed: {e} at {:?}", e.span))
}

fn returned_jsx(program: &Program) -> &JsxElement {
    for stmt in &program.body {
        if let Stmt::Return {
            value: Some(Expr::Jsx(el)),
            ..
        } = stmt
        {
            return el;
        }
    }
    panic!("no returned JSX element");
}

#[test]
fn parses_component_with_destructured_props_and_default_naming() {
    let program = parse(
        "const Card = ({ title, items = [] }) => {\n  return <div className=\"card\">{title}</div>;\n};\nreturn Card;",
    );
    let Stmt::Decl { declarators, .. } = &program.body[0] else {
        panic!("expected declaration");
    };
    let Some(Expr::Function(def)) = &declarators[0].init else {
        panic!("expected arrow function");
    };
    assert_eq!(def.name.as_deref(), Some("Card"));
    assert!(matches!(def.params[0].pattern, Pattern::Object { .. }));
}

#[test]
fn jsx_names_split_into_intrinsic_and_component_paths() {
    let program = parse("return <RF.ReactFlow><motion.div /><my-el /><span /></RF.ReactFlow>;");
    let root = returned_jsx(&program);
    assert_eq!(
        root.name,
        JsxName::Component(vec!["RF".into(), "ReactFlow".into()])
    );
    let names: Vec<_> = root
        .children
        .iter()
        .filter_map(|c| match c {
            JsxChild::Element(el) => Some(el.name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        names,
        vec![
            JsxName::Component(vec!["motion".into(), "div".into()]),
            JsxName::Intrinsic("my-el".into()),
            JsxName::Intrinsic("span".into()),
        ]
    );
}

#[test]
fn jsx_text_decodes_entities_so_escaped_markup_stays_text() {
    let program = parse("return <p>&lt;div&gt; &amp; caf&eacute;</p>;");
    let root = returned_jsx(&program);
    assert!(matches!(
        root.children.as_slice(),
        [JsxChild::Text(t)] if t == "<div> & café"
    ));
}

#[test]
fn jsx_attribute_strings_decode_entities_without_backslash_escapes() {
    let program = parse(r#"return <img alt="say &quot;hi&quot; it's" data-path="a\b" />;"#);
    let root = returned_jsx(&program);
    let values: Vec<_> = root
        .attrs
        .iter()
        .filter_map(|a| match a {
            JsxAttr::Named {
                value: JsxAttrValue::Str(s),
                ..
            } => Some(s.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(values, vec![r#"say "hi" it's"#, r"a\b"]);
}

#[test]
fn jsx_whitespace_follows_line_rules() {
    assert_eq!(
        clean_jsx_text("\n    Hello\n    world  \n  ").as_deref(),
        Some("Hello world")
    );
    assert_eq!(clean_jsx_text("  a  ").as_deref(), Some("  a  "));
    assert_eq!(clean_jsx_text("\n   \n"), None);
    assert_eq!(clean_jsx_text(" ").as_deref(), Some(" "));
    assert_eq!(clean_jsx_text("   ").as_deref(), Some("   "));
}

#[test]
fn expression_containers_spreads_and_comments() {
    let program = parse(
        "return <div {...rest} hidden>{/* note */}{items.map(i => <li key={i}>{i}</li>)}</div>;",
    );
    let root = returned_jsx(&program);
    assert!(matches!(root.attrs[0], JsxAttr::Spread(_)));
    assert!(matches!(
        root.attrs[1],
        JsxAttr::Named {
            value: JsxAttrValue::True,
            ..
        }
    ));
    assert_eq!(root.children.len(), 1);
}

#[test]
fn templates_nest_expressions_and_templates() {
    let program = parse("const s = `a${b ? `x${c}` : 'y'}z`;");
    let Stmt::Decl { declarators, .. } = &program.body[0] else {
        panic!("expected declaration");
    };
    let Some(Expr::Template { quasis, exprs }) = &declarators[0].init else {
        panic!("expected template");
    };
    assert_eq!(quasis, &vec!["a".to_string(), "z".to_string()]);
    assert_eq!(exprs.len(), 1);
}

#[test]
fn parenthesized_expressions_are_not_mistaken_for_arrows() {
    let program = parse("const a = (b + c) * 2;\nconst f = (x, y = 1, ...r) => x;");
    assert_eq!(program.body.len(), 2);
    let Stmt::Decl { declarators, .. } = &program.body[1] else {
        panic!("expected declaration");
    };
    let Some(Expr::Function(def)) = &declarators[0].init else {
        panic!("expected arrow");
    };
    assert_eq!(def.params.len(), 2);
    assert!(def.rest.is_some());
}

#[test]
fn return_on_its_own_line_returns_nothing() {
    let program = parse("function f() {\n  return\n  1;\n}");
    let Stmt::Function(def) = &program.body[0] else {
        panic!("expected function");
    };
    let FunctionBody::Block(body) = &def.body else {
        panic!("expected block body");
    };
    assert!(matches!(body[0], Stmt::Return { value: None, .. }));
}

#[test]
fn mismatched_closing_tag_reports_its_position() {
    let src = "return <div><span></div>;";
    let err = parse_program(src).expect_err("mismatched tags");
    assert!(err.message.contains("<span>"), "{}", err.message);
    assert_eq!(err.span.start, src.find("</div>").expect("closing tag"));
}

#[test]
fn unexpected_tokens_carry_spans() {
    let src = "const x = ;";
    let err = parse_program(src).expect_err("missing expression");
    assert_eq!(err.message, "Unexpected token ';'");
    assert_eq!(err.span.start, 10);
}

#[test]
fn unsupported_keywords_are_syntax_errors() {
    assert!(parse_program("const d = new Date();").is_err());
    assert!(parse_program("class A {}").is_err());
}

#[test]
fn deep_nesting_is_a_syntax_error_not_a_stack_overflow() {
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let src = format!("const x = {}1{};", "(".repeat(5000), ")".repeat(5000));
            parse_program(&src).map(|_| ())
        })
        .expect("spawn parser thread");
    let err = handle
        .join()
        .expect("parser thread")
        .expect_err("too deep");
    assert_eq!(err.message, "Maximum nesting depth exceeded");
}
