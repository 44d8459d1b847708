//! `SyntaxHighlighter` and its `dark` theme.
//!
//! The theme is a Prism-style object: a style for the `pre`/`code` containers plus one style per
//! token class. Generated code may pass any object of that shape as `style`.

use super::text_prop_or_children;
use lumen_core::script::host::style_map;
use lumen_core::script::{Props, Value};
use lumen_core::{AttrValue, Component, Element, VNode, component_fn};
use serde_json::json;
use std::sync::Arc;

const PRE_KEY: &str = r#"pre[class*="language-"]"#;
const CODE_KEY: &str = r#"code[class*="language-"]"#;

pub fn dark_theme() -> serde_json::Value {
    json!({
        PRE_KEY: {
            "color": "#d4d4d4",
            "background": "#1e1e1e",
            "fontFamily": "Menlo, Monaco, Consolas, \"Courier New\", monospace",
            "fontSize": "13px",
            "lineHeight": "1.5",
            "padding": "1em",
            "margin": ".5em 0",
            "overflow": "auto",
            "borderRadius": "6px"
        },
        CODE_KEY: {
            "color": "#d4d4d4",
            "fontFamily": "Menlo, Monaco, Consolas, \"Courier New\", monospace",
            "whiteSpace": "pre"
        },
        "comment": { "color": "#6a9955", "fontStyle": "italic" },
        "keyword": { "color": "#569cd6" },
        "boolean": { "color": "#569cd6" },
        "string": { "color": "#ce9178" },
        "number": { "color": "#b5cea8" },
        "function": { "color": "#dcdcaa" },
        "punctuation": { "color": "#d4d4d4" },
        "operator": { "color": "#d4d4d4" }
    })
}

pub fn syntax_highlighter(default_theme: serde_json::Value) -> Arc<dyn Component> {
    component_fn("SyntaxHighlighter", move |_, props, children| {
        let theme = match props.get("style") {
            Some(style @ Value::Object(_)) => style.clone(),
            _ => Value::from_json(&default_theme),
        };
        Ok(highlight(props, &children, &theme))
    })
}

fn highlight(props: &Props, children: &[VNode], theme: &Value) -> VNode {
    let code = text_prop_or_children(props, "children", children);
    let code = code.trim_end_matches('\n');
    let language = props
        .str("language")
        .unwrap_or_else(|| "text".to_string())
        .to_ascii_lowercase();
    let show_line_numbers = props.bool("showLineNumbers").unwrap_or(false);
    let def = language_def(&language);
    let tokens = tokenize(code, def);

    let mut pre_style = style_map(&theme_entry(theme, PRE_KEY));
    if let Some(custom @ Value::Object(_)) = props.get("customStyle") {
        pre_style.extend(style_map(custom));
    }
    let mut code_el = Element::new("code")
        .attr("class", format!("language-{language}"))
        .attr("style", AttrValue::Style(style_map(&theme_entry(theme, CODE_KEY))));

    let lines = split_lines(&tokens);
    let width = lines.len().to_string().len();
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            code_el = code_el.child("\n");
        }
        if show_line_numbers {
            let number = format!("{:>width$}", index + 1);
            code_el = code_el.child(
                Element::new("span")
                    .attr("class", "lumen-line-number")
                    .attr(
                        "style",
                        AttrValue::Style(
                            [
                                ("display".to_string(), "inline-block".to_string()),
                                ("min-width".to_string(), format!("{}em", width + 1)),
                                ("padding-right".to_string(), "1em".to_string()),
                                ("text-align".to_string(), "right".to_string()),
                                ("user-select".to_string(), "none".to_string()),
                                ("opacity".to_string(), "0.5".to_string()),
                            ]
                            .into_iter()
                            .collect(),
                        ),
                    )
                    .child(number),
            );
        }
        for (kind, text) in line {
            code_el = code_el.child(token_node(*kind, text, theme));
        }
    }

    Element::new("pre")
        .attr("class", format!("lumen-code language-{language}"))
        .attr("style", AttrValue::Style(pre_style))
        .child(code_el)
        .into()
}

fn theme_entry(theme: &Value, key: &str) -> Value {
    match theme {
        Value::Object(map) => map.borrow().get(key).cloned().unwrap_or_default(),
        _ => Value::Undefined,
    }
}

fn token_node(kind: TokenKind, text: &str, theme: &Value) -> VNode {
    let Some(class) = kind.class() else {
        return VNode::text(text);
    };
    let mut el = Element::new("span").attr("class", format!("token {class}"));
    let style = style_map(&theme_entry(theme, class));
    if !style.is_empty() {
        el = el.attr("style", AttrValue::Style(style));
    }
    el.child(text).into()
}

/// Splits tokens at newlines so each source line can carry its own number.
fn split_lines(tokens: &[(TokenKind, String)]) -> Vec<Vec<(TokenKind, String)>> {
    let mut lines = vec![Vec::new()];
    for (kind, text) in tokens {
        let mut pieces = text.split('\n');
        if let Some(first) = pieces.next() {
            if let (false, Some(line)) = (first.is_empty(), lines.last_mut()) {
                line.push((*kind, first.to_string()));
            }
        }
        for piece in pieces {
            let mut line = Vec::new();
            if !piece.is_empty() {
                line.push((*kind, piece.to_string()));
            }
            lines.push(line);
        }
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Plain,
    Keyword,
    Boolean,
    String,
    Number,
    Comment,
    Function,
    Punctuation,
    Operator,
}

impl TokenKind {
    fn class(self) -> Option<&'static str> {
        Some(match self {
            TokenKind::Plain => return None,
            TokenKind::Keyword => "keyword",
            TokenKind::Boolean => "boolean",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Comment => "comment",
            TokenKind::Function => "function",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Operator => "operator",
        })
    }
}

struct LanguageDef {
    keywords: &'static [&'static str],
    literals: &'static [&'static str],
    line_comments: &'static [&'static str],
    block_comment: Option<(&'static str, &'static str)>,
    quotes: &'static [char],
    case_insensitive: bool,
}

const JS_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
    "delete", "do", "else", "export", "extends", "finally", "for", "from", "function", "if",
    "import", "in", "instanceof", "interface", "let", "new", "of", "return", "static", "switch",
    "this", "throw", "try", "type", "typeof", "var", "void", "while", "yield",
];
const PY_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];
const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "type", "unsafe", "use",
    "where", "while",
];
const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "class", "const", "continue", "default", "do", "double",
    "else", "enum", "extern", "final", "float", "for", "goto", "if", "import", "int", "long",
    "namespace", "new", "package", "private", "protected", "public", "return", "short", "signed",
    "sizeof", "static", "struct", "switch", "template", "this", "throw", "typedef", "union",
    "unsigned", "using", "void", "volatile", "while", "func", "go", "var", "val", "fun",
];
const SQL_KEYWORDS: &[&str] = &[
    "select", "from", "where", "insert", "into", "values", "update", "set", "delete", "create",
    "table", "drop", "alter", "join", "left", "right", "inner", "outer", "on", "group", "by",
    "order", "having", "limit", "offset", "as", "and", "or", "not", "in", "is", "like",
    "between", "distinct", "union", "all", "case", "when", "then", "else", "end", "primary",
    "key", "foreign", "references", "index", "with", "asc", "desc",
];
const BASH_KEYWORDS: &[&str] = &[
    "if", "then", "else", "elif", "fi", "for", "while", "until", "do", "done", "case", "esac",
    "in", "function", "return", "export", "local", "echo", "exit", "source",
];
const GENERIC_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "return", "function", "def", "class", "import", "const", "let",
    "var",
];

fn language_def(language: &str) -> &'static LanguageDef {
    static JS: LanguageDef = LanguageDef {
        keywords: JS_KEYWORDS,
        literals: &["true", "false", "null", "undefined", "NaN", "Infinity"],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        quotes: &['"', '\'', '`'],
        case_insensitive: false,
    };
    static PYTHON: LanguageDef = LanguageDef {
        keywords: PY_KEYWORDS,
        literals: &["True", "False", "None"],
        line_comments: &["#"],
        block_comment: None,
        quotes: &['"', '\''],
        case_insensitive: false,
    };
    static RUST: LanguageDef = LanguageDef {
        keywords: RUST_KEYWORDS,
        literals: &["true", "false", "None", "Some", "Ok", "Err"],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        quotes: &['"'],
        case_insensitive: false,
    };
    static C_LIKE: LanguageDef = LanguageDef {
        keywords: C_KEYWORDS,
        literals: &["true", "false", "null", "nullptr", "nil", "NULL"],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        quotes: &['"', '\''],
        case_insensitive: false,
    };
    static SQL: LanguageDef = LanguageDef {
        keywords: SQL_KEYWORDS,
        literals: &["null", "true", "false"],
        line_comments: &["--"],
        block_comment: Some(("/*", "*/")),
        quotes: &['\''],
        case_insensitive: true,
    };
    static BASH: LanguageDef = LanguageDef {
        keywords: BASH_KEYWORDS,
        literals: &["true", "false"],
        line_comments: &["#"],
        block_comment: None,
        quotes: &['"', '\''],
        case_insensitive: false,
    };
    static GENERIC: LanguageDef = LanguageDef {
        keywords: GENERIC_KEYWORDS,
        literals: &["true", "false", "null"],
        line_comments: &["//", "#"],
        block_comment: Some(("/*", "*/")),
        quotes: &['"', '\''],
        case_insensitive: false,
    };
    match language {
        "js" | "javascript" | "jsx" | "ts" | "typescript" | "tsx" | "json" => &JS,
        "py" | "python" => &PYTHON,
        "rs" | "rust" => &RUST,
        "c" | "cpp" | "c++" | "h" | "java" | "go" | "kotlin" | "csharp" | "cs" | "swift" => {
            &C_LIKE
        }
        "sql" => &SQL,
        "bash" | "sh" | "shell" | "zsh" => &BASH,
        _ => &GENERIC,
    }
}

/// Splits `code` into classified tokens. Concatenating the texts gives back `code`.
fn tokenize(code: &str, def: &LanguageDef) -> Vec<(TokenKind, String)> {
    let chars: Vec<char> = code.chars().collect();
    let mut out: Vec<(TokenKind, String)> = Vec::new();
    let mut push = |kind: TokenKind, text: String| match out.last_mut() {
        Some((last, buf)) if *last == kind && kind == TokenKind::Plain => buf.push_str(&text),
        _ => out.push((kind, text)),
    };
    let starts = |at: usize, pat: &str| {
        pat.chars()
            .enumerate()
            .all(|(k, p)| chars.get(at + k) == Some(&p))
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if let Some(marker) = def.line_comments.iter().copied().find(|m| starts(i, m)) {
            i += marker.chars().count();
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            push(TokenKind::Comment, chars[start..i].iter().collect());
            continue;
        }
        if let Some((open, close)) = def.block_comment {
            if starts(i, open) {
                i += open.chars().count();
                while i < chars.len() && !starts(i, close) {
                    i += 1;
                }
                i = (i + close.chars().count()).min(chars.len());
                push(TokenKind::Comment, chars[start..i].iter().collect());
                continue;
            }
        }
        if def.quotes.contains(&c) {
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    i += 1;
                } else if chars[i] == '\n' && c != '`' {
                    break;
                }
                i += 1;
            }
            i = (i + 1).min(chars.len());
            push(TokenKind::String, chars[start..i].iter().collect());
            continue;
        }
        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                i += 1;
            }
            push(TokenKind::Number, chars[start..i].iter().collect());
            continue;
        }
        if c.is_alphabetic() || c == '_' || c == '$' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let matches = |list: &[&str]| {
                if def.case_insensitive {
                    list.iter().any(|k| k.eq_ignore_ascii_case(&word))
                } else {
                    list.contains(&word.as_str())
                }
            };
            let kind = if matches(def.keywords) {
                TokenKind::Keyword
            } else if matches(def.literals) {
                TokenKind::Boolean
            } else if next_non_space(&chars, i) == Some('(') {
                TokenKind::Function
            } else {
                TokenKind::Plain
            };
            push(kind, word);
            continue;
        }
        i += 1;
        let kind = if "{}[]();,.:".contains(c) {
            TokenKind::Punctuation
        } else if "+-*/%=<>!&|^~?".contains(c) {
            TokenKind::Operator
        } else {
            TokenKind::Plain
        };
        push(kind, c.to_string());
    }
    out
}

fn next_non_space(chars: &[char], from: usize) -> Option<char> {
    chars[from..].iter().copied().find(|c| *c != ' ' && *c != '\t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::render_html;

    fn kinds(code: &str, language: &str) -> Vec<(TokenKind, String)> {
        tokenize(code, language_def(language))
            .into_iter()
            .filter(|(k, _)| *k != TokenKind::Plain)
            .collect()
    }

    #[test]
    fn tokens_cover_the_source_exactly() {
        let code = "const add = (a, b) => a + b; // sum\nconsole.log(`x ${1}`)";
        let joined: String = tokenize(code, language_def("js"))
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert_eq!(joined, code);
    }

    #[test]
    fn classifies_per_language() {
        let js = kinds("if (x) return fetch('a', 42) /* c */", "js");
        assert!(js.contains(&(TokenKind::Keyword, "if".into())));
        assert!(js.contains(&(TokenKind::Function, "fetch".into())));
        assert!(js.contains(&(TokenKind::String, "'a'".into())));
        assert!(js.contains(&(TokenKind::Number, "42".into())));
        assert!(js.contains(&(TokenKind::Comment, "/* c */".into())));

        let py = kinds("def f(x):\n    return None  # done", "python");
        assert!(py.contains(&(TokenKind::Keyword, "def".into())));
        assert!(py.contains(&(TokenKind::Function, "f".into())));
        assert!(py.contains(&(TokenKind::Boolean, "None".into())));
        assert!(py.contains(&(TokenKind::Comment, "# done".into())));

        let sql = kinds("SELECT * FROM t -- all", "sql");
        assert!(sql.contains(&(TokenKind::Keyword, "SELECT".into())));
        assert!(sql.contains(&(TokenKind::Comment, "-- all".into())));
    }

    #[test]
    fn unterminated_strings_stop_at_the_line_end() {
        let tokens = kinds("x = \"open\ny = 1", "python");
        assert_eq!(tokens[1], (TokenKind::String, "\"open\n".into()));
        assert!(tokens.contains(&(TokenKind::Number, "1".into())));
    }

    #[test]
    fn renders_themed_spans_and_line_numbers() {
        let mut props = Props::new();
        props.insert("language", Value::from("rust"));
        props.insert("showLineNumbers", Value::from(true));
        props.insert("children", Value::from("fn main() {\n    let x = 1;\n}\n"));
        let node = highlight(&props, &[], &Value::from_json(&dark_theme()));
        let html = render_html(&node);
        assert!(html.starts_with(r#"<pre class="lumen-code language-rust" style="color:#d4d4d4;background:#1e1e1e;"#));
        assert!(html.contains(r#"<span class="token keyword" style="color:#569cd6">fn</span>"#));
        assert!(html.contains(r#"<span class="token function" style="color:#dcdcaa">main</span>"#));
        assert_eq!(html.matches("lumen-line-number").count(), 3);
        assert_eq!(node.text_content().lines().count(), 3);
    }

    #[test]
    fn a_custom_style_object_replaces_the_theme() {
        let mut props = Props::new();
        props.insert("language", Value::from("js"));
        let theme = Value::from_json(&json!({ "keyword": { "color": "red" } }));
        let html = render_html(&highlight(&props, &[VNode::text("let a")], &theme));
        assert!(html.contains(r#"<span class="token keyword" style="color:red">let</span>"#));
        assert!(html.contains(r#"<code class="language-js">"#));
    }
}
