//! Global bindings every block sees: `Math`, `JSON`, `Object`, `Array`, `Number`, `String`,
//! `console` and the numeric helpers.

use super::environment::Scope;
use super::error::RuntimeError;
use super::methods::MAX_ARRAY_LEN;
use super::value::{Invoke, NativeFunction, Value, arg, parse_js_number, to_int32};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Names bound by [`install`]. Scripts may shadow them; capabilities may not.
pub const GLOBAL_NAMES: &[&str] = &[
    "Array", "Boolean", "Infinity", "JSON", "Math", "NaN", "Number", "Object", "String",
    "console", "isFinite", "isNaN", "parseFloat", "parseInt",
];

const RANDOM_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

pub fn install(scope: &Scope) {
    scope.declare("Math", math(), false);
    scope.declare("JSON", json(), false);
    scope.declare("Object", object(), false);
    scope.declare("console", console(), false);
    scope.declare(
        "Array",
        Value::Native(NativeFunction::with_statics("Array", array_ctor, array_statics)),
        false,
    );
    scope.declare(
        "Number",
        Value::Native(NativeFunction::with_statics(
            "Number",
            |_, args| Ok(Value::Number(args.first().map_or(0.0, Value::to_number))),
            number_statics,
        )),
        false,
    );
    scope.declare(
        "String",
        Value::Native(NativeFunction::with_statics(
            "String",
            |_, args| {
                Ok(Value::from(
                    args.first().map(Value::to_js_string).unwrap_or_default(),
                ))
            },
            string_statics,
        )),
        false,
    );
    scope.declare(
        "Boolean",
        native("Boolean", |_, args| Ok(Value::Bool(arg(&args, 0).truthy()))),
        false,
    );
    scope.declare("parseFloat", parse_float_fn(), false);
    scope.declare("parseInt", parse_int_fn(), false);
    scope.declare(
        "isNaN",
        native("isNaN", |_, args| Ok(Value::Bool(arg(&args, 0).to_number().is_nan()))),
        false,
    );
    scope.declare(
        "isFinite",
        native("isFinite", |_, args| {
            Ok(Value::Bool(arg(&args, 0).to_number().is_finite()))
        }),
        false,
    );
    scope.declare("Infinity", Value::Number(f64::INFINITY), false);
    scope.declare("NaN", Value::Number(f64::NAN), false);
}

fn native<F>(name: &str, f: F) -> Value
where
    F: Fn(&mut dyn Invoke, Vec<Value>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
{
    Value::Native(NativeFunction::new(name, f))
}

fn namespace(entries: Vec<(&str, Value)>) -> Value {
    Value::object(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn math() -> Value {
    let unary: [(&str, fn(f64) -> f64); 20] = [
        ("abs", f64::abs),
        ("ceil", f64::ceil),
        ("floor", f64::floor),
        ("round", |x| (x + 0.5).floor()),
        ("trunc", f64::trunc),
        ("sign", |x| {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("log10", f64::log10),
        ("log2", f64::log2),
        ("log1p", f64::ln_1p),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("sinh", f64::sinh),
    ];
    let mut entries: Vec<(&str, Value)> = unary
        .into_iter()
        .map(|(name, f)| {
            (
                name,
                native(name, move |_, args| Ok(Value::Number(f(arg(&args, 0).to_number())))),
            )
        })
        .collect();

    entries.push((
        "atan2",
        native("atan2", |_, args| {
            Ok(Value::Number(
                arg(&args, 0).to_number().atan2(arg(&args, 1).to_number()),
            ))
        }),
    ));
    entries.push((
        "pow",
        native("pow", |_, args| {
            Ok(Value::Number(
                arg(&args, 0).to_number().powf(arg(&args, 1).to_number()),
            ))
        }),
    ));
    entries.push((
        "hypot",
        native("hypot", |_, args| {
            Ok(Value::Number(
                args.iter()
                    .map(|v| v.to_number().powi(2))
                    .sum::<f64>()
                    .sqrt(),
            ))
        }),
    ));
    entries.push((
        "max",
        native("max", |_, args| Ok(Value::Number(fold_extreme(&args, f64::NEG_INFINITY, f64::max)))),
    ));
    entries.push((
        "min",
        native("min", |_, args| Ok(Value::Number(fold_extreme(&args, f64::INFINITY, f64::min)))),
    ));

    // Seeded per execution so a block renders the same tree every time.
    let state = Arc::new(AtomicU64::new(RANDOM_SEED));
    entries.push((
        "random",
        native("random", move |_, _| {
            let mut x = state.load(Ordering::Relaxed);
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            state.store(x, Ordering::Relaxed);
            Ok(Value::Number((x >> 11) as f64 / (1u64 << 53) as f64))
        }),
    ));

    for (name, value) in [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ] {
        entries.push((name, Value::Number(value)));
    }
    namespace(entries)
}

/// `Math.max`/`Math.min`: any `NaN` argument wins.
fn fold_extreme(args: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for v in args {
        let n = v.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, n);
    }
    acc
}

fn json() -> Value {
    namespace(vec![
        (
            "stringify",
            native("stringify", |_, args| {
                let Some(json) = arg(&args, 0).to_json()? else {
                    return Ok(Value::Undefined);
                };
                let indent = match arg(&args, 2) {
                    Value::Number(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
                    Value::String(s) => s.chars().take(10).collect(),
                    _ => String::new(),
                };
                stringify(&json, &indent).map(Value::from)
            }),
        ),
        (
            "parse",
            native("parse", |_, args| {
                let text = arg(&args, 0).to_js_string();
                serde_json::from_str::<serde_json::Value>(&text)
                    .map(|json| Value::from_json(&json))
                    .map_err(|e| RuntimeError::error(format!("JSON.parse: {e}")))
            }),
        ),
    ])
}

fn stringify(json: &serde_json::Value, indent: &str) -> Result<String, RuntimeError> {
    if indent.is_empty() {
        return serde_json::to_string(json).map_err(|e| RuntimeError::type_error(e.to_string()));
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    json.serialize(&mut ser)
        .map_err(|e| RuntimeError::type_error(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| RuntimeError::type_error(e.to_string()))
}

fn own_entries(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => map
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::from(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

fn object() -> Value {
    namespace(vec![
        (
            "keys",
            native("keys", |_, args| {
                Ok(Value::array(
                    own_entries(&arg(&args, 0))
                        .into_iter()
                        .map(|(k, _)| Value::from(k))
                        .collect(),
                ))
            }),
        ),
        (
            "values",
            native("values", |_, args| {
                Ok(Value::array(
                    own_entries(&arg(&args, 0))
                        .into_iter()
                        .map(|(_, v)| v)
                        .collect(),
                ))
            }),
        ),
        (
            "entries",
            native("entries", |_, args| {
                Ok(Value::array(
                    own_entries(&arg(&args, 0))
                        .into_iter()
                        .map(|(k, v)| Value::array(vec![Value::from(k), v]))
                        .collect(),
                ))
            }),
        ),
        (
            "assign",
            native("assign", |_, args| {
                let target = arg(&args, 0);
                let Value::Object(map) = &target else {
                    return Err(RuntimeError::type_error(
                        "Cannot convert undefined or null to object",
                    ));
                };
                for source in args.iter().skip(1) {
                    for (k, v) in own_entries(source) {
                        map.borrow_mut().insert(k, v);
                    }
                }
                Ok(target)
            }),
        ),
        (
            "fromEntries",
            native("fromEntries", |_, args| {
                let mut out = IndexMap::new();
                if let Value::Array(items) = arg(&args, 0) {
                    for pair in items.borrow().iter() {
                        if let Value::Array(pair) = pair {
                            let pair = pair.borrow();
                            let key = pair.first().cloned().unwrap_or_default();
                            let value = pair.get(1).cloned().unwrap_or_default();
                            out.insert(key.to_property_key(), value);
                        }
                    }
                }
                Ok(Value::object(out))
            }),
        ),
        (
            "freeze",
            native("freeze", |_, args| Ok(arg(&args, 0))),
        ),
    ])
}

fn console() -> Value {
    let line = |args: &[Value]| {
        args.iter()
            .map(Value::to_js_string)
            .collect::<Vec<_>>()
            .join(" ")
    };
    namespace(vec![
        (
            "log",
            native("log", move |_, args| {
                tracing::debug!(target: "lumen::console", "{}", line(&args));
                Ok(Value::Undefined)
            }),
        ),
        (
            "info",
            native("info", move |_, args| {
                tracing::info!(target: "lumen::console", "{}", line(&args));
                Ok(Value::Undefined)
            }),
        ),
        (
            "debug",
            native("debug", move |_, args| {
                tracing::debug!(target: "lumen::console", "{}", line(&args));
                Ok(Value::Undefined)
            }),
        ),
        (
            "warn",
            native("warn", move |_, args| {
                tracing::warn!(target: "lumen::console", "{}", line(&args));
                Ok(Value::Undefined)
            }),
        ),
        (
            "error",
            native("error", move |_, args| {
                tracing::warn!(target: "lumen::console", "console.error: {}", line(&args));
                Ok(Value::Undefined)
            }),
        ),
    ])
}

fn array_ctor(_: &mut dyn Invoke, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match args.as_slice() {
        [Value::Number(n)] => {
            if *n < 0.0 || n.fract() != 0.0 || *n > MAX_ARRAY_LEN as f64 {
                return Err(RuntimeError::range("Invalid array length"));
            }
            Ok(Value::array(vec![Value::Undefined; *n as usize]))
        }
        _ => Ok(Value::array(args)),
    }
}

fn array_statics(key: &str) -> Option<Value> {
    Some(match key {
        "isArray" => native("isArray", |_, args| {
            Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_))))
        }),
        "of" => native("of", |_, args| Ok(Value::array(args))),
        "from" => native("from", |cx, args| {
            let source = arg(&args, 0);
            let items: Vec<Value> = match &source {
                Value::Array(items) => items.borrow().clone(),
                Value::String(s) => s.chars().map(|c| Value::from(c.to_string())).collect(),
                Value::Object(map) => {
                    let len = map.borrow().get("length").map_or(0.0, Value::to_number);
                    let len = if len.is_nan() { 0.0 } else { len.max(0.0) };
                    if len > MAX_ARRAY_LEN as f64 {
                        return Err(RuntimeError::range("Invalid array length"));
                    }
                    (0..len as usize)
                        .map(|i| map.borrow().get(&i.to_string()).cloned().unwrap_or_default())
                        .collect()
                }
                _ => Vec::new(),
            };
            let map_fn = arg(&args, 1);
            if !map_fn.is_callable() {
                return Ok(Value::array(items));
            }
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                out.push(cx.call(&map_fn, vec![item, Value::Number(i as f64)])?);
            }
            Ok(Value::array(out))
        }),
        _ => return None,
    })
}

fn number_statics(key: &str) -> Option<Value> {
    Some(match key {
        "isInteger" => native("isInteger", |_, args| {
            Ok(Value::Bool(matches!(
                arg(&args, 0),
                Value::Number(n) if n.is_finite() && n.fract() == 0.0
            )))
        }),
        "isFinite" => native("isFinite", |_, args| {
            Ok(Value::Bool(matches!(arg(&args, 0), Value::Number(n) if n.is_finite())))
        }),
        "isNaN" => native("isNaN", |_, args| {
            Ok(Value::Bool(matches!(arg(&args, 0), Value::Number(n) if n.is_nan())))
        }),
        "parseFloat" => parse_float_fn(),
        "parseInt" => parse_int_fn(),
        "MAX_SAFE_INTEGER" => Value::Number(9_007_199_254_740_991.0),
        "MIN_SAFE_INTEGER" => Value::Number(-9_007_199_254_740_991.0),
        "EPSILON" => Value::Number(f64::EPSILON),
        "MAX_VALUE" => Value::Number(f64::MAX),
        "MIN_VALUE" => Value::Number(5e-324),
        "POSITIVE_INFINITY" => Value::Number(f64::INFINITY),
        "NEGATIVE_INFINITY" => Value::Number(f64::NEG_INFINITY),
        "NaN" => Value::Number(f64::NAN),
        _ => return None,
    })
}

fn string_statics(key: &str) -> Option<Value> {
    match key {
        "fromCharCode" => Some(native("fromCharCode", |_, args| {
            Ok(Value::from(
                args.iter()
                    .map(|v| {
                        let code = to_int32(v.to_number()) as u32 & 0xFFFF;
                        char::from_u32(code).unwrap_or('\u{FFFD}')
                    })
                    .collect::<String>(),
            ))
        })),
        _ => None,
    }
}

fn float_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:Infinity|\d+(?:\.\d*)?(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?)")
            .expect("valid regex")
    })
}

/// `parseFloat`: longest numeric prefix, `NaN` when there is none.
pub fn parse_float(s: &str) -> f64 {
    match float_prefix_regex().find(s.trim_start()) {
        Some(m) => parse_js_number(m.as_str()),
        None => f64::NAN,
    }
}

/// `parseInt` with an optional radix.
pub fn parse_int(s: &str, radix: &Value) -> f64 {
    let mut s = s.trim_start();
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    let mut radix = match radix {
        Value::Undefined => 0,
        other => to_int32(other.to_number()),
    };
    let hex_prefix = s.starts_with("0x") || s.starts_with("0X");
    if radix == 0 {
        radix = if hex_prefix { 16 } else { 10 };
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if radix == 16 && hex_prefix {
        s = &s[2..];
    }
    let radix = radix as u32;
    let mut acc: Option<f64> = None;
    for c in s.chars() {
        let Some(d) = c.to_digit(radix) else {
            break;
        };
        acc = Some(acc.unwrap_or(0.0) * f64::from(radix) + f64::from(d));
    }
    acc.map_or(f64::NAN, |n| sign * n)
}

fn parse_float_fn() -> Value {
    native("parseFloat", |_, args| {
        Ok(Value::Number(parse_float(&arg(&args, 0).to_js_string())))
    })
}

fn parse_int_fn() -> Value {
    native("parseInt", |_, args| {
        Ok(Value::Number(parse_int(
            &arg(&args, 0).to_js_string(),
            &arg(&args, 1),
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_float_takes_the_numeric_prefix() {
        assert_eq!(parse_float("  3.5px"), 3.5);
        assert_eq!(parse_float("-1e3x"), -1000.0);
        assert_eq!(parse_float(".25"), 0.25);
        assert_eq!(parse_float("1e"), 1.0);
        assert!(parse_float("px").is_nan());
        assert_eq!(parse_float("Infinityx"), f64::INFINITY);
    }

    #[test]
    fn parse_int_handles_radix_and_prefixes() {
        assert_eq!(parse_int("42px", &Value::Undefined), 42.0);
        assert_eq!(parse_int("-0x1f", &Value::Undefined), -31.0);
        assert_eq!(parse_int("101", &Value::from(2.0)), 5.0);
        assert_eq!(parse_int("7.9", &Value::Undefined), 7.0);
        assert!(parse_int("z", &Value::Undefined).is_nan());
        assert!(parse_int("1", &Value::from(99.0)).is_nan());
    }

    #[test]
    fn stringify_indents_like_json_stringify() {
        let json = serde_json::json!({ "a": [1, 2] });
        assert_eq!(stringify(&json, "").ok().as_deref(), Some(r#"{"a":[1,2]}"#));
        assert_eq!(
            stringify(&json, "  ").ok().as_deref(),
            Some("{\n  \"a\": [\n    1,\n    2\n  ]\n}")
        );
    }

    #[test]
    fn random_is_deterministic_per_install() {
        let draw = || {
            let scope = Scope::root();
            install(&scope);
            let math = scope.get("Math").unwrap_or_default();
            let Value::Object(map) = math else {
                panic!("Math is an object");
            };
            let random = map.borrow().get("random").cloned().unwrap_or_default();
            let Value::Native(random) = random else {
                panic!("Math.random is native");
            };
            struct NoCalls;
            impl Invoke for NoCalls {
                fn call(&mut self, _: &Value, _: Vec<Value>) -> Result<Value, RuntimeError> {
                    Ok(Value::Undefined)
                }
            }
            random
                .call(&mut NoCalls, Vec::new())
                .ok()
                .and_then(|v| v.as_f64())
                .unwrap_or(f64::NAN)
        };
        let first = draw();
        assert!((0.0..1.0).contains(&first));
        assert_eq!(first, draw());
    }
}
