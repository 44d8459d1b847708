//! Property access and the built-in prototype methods of arrays, strings, numbers and objects.

use super::error::RuntimeError;
use super::value::{Invoke, Value, arg, format_number};
use std::cmp::Ordering;

const ARRAY_METHODS: &[&str] = &[
    "at", "concat", "entries", "every", "fill", "filter", "find", "findIndex", "findLast",
    "findLastIndex", "flat", "flatMap", "forEach", "includes", "indexOf", "join", "keys",
    "lastIndexOf", "map", "pop", "push", "reduce", "reduceRight", "reverse", "shift", "slice",
    "some", "sort", "splice", "toString", "unshift",
];

const STRING_METHODS: &[&str] = &[
    "at", "charAt", "charCodeAt", "concat", "endsWith", "includes", "indexOf", "lastIndexOf",
    "localeCompare", "padEnd", "padStart", "repeat", "replace", "replaceAll", "slice", "split",
    "startsWith", "substring", "toLowerCase", "toString", "toUpperCase", "trim", "trimEnd",
    "trimStart",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toLocaleString", "toPrecision", "toString"];

const OBJECT_METHODS: &[&str] = &["hasOwnProperty", "toString"];

/// Sparse arrays are stored densely, so writes past this length are refused.
pub(crate) const MAX_ARRAY_LEN: usize = 1 << 24;

pub fn get_member(object: &Value, key: &str) -> Result<Value, RuntimeError> {
    Ok(match object {
        Value::Undefined | Value::Null => {
            return Err(RuntimeError::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            )));
        }
        Value::String(s) => match key {
            "length" => Value::Number(s.chars().count() as f64),
            _ => match key.parse::<usize>() {
                Ok(i) => s
                    .chars()
                    .nth(i)
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or_default(),
                Err(_) => Value::Undefined,
            },
        },
        Value::Array(items) => match key {
            "length" => Value::Number(items.borrow().len() as f64),
            _ => match key.parse::<usize>() {
                Ok(i) => items.borrow().get(i).cloned().unwrap_or_default(),
                Err(_) => Value::Undefined,
            },
        },
        Value::Object(map) => map.borrow().get(key).cloned().unwrap_or_default(),
        Value::Function(closure) => match key {
            "name" => Value::from(closure.name()),
            "length" => Value::Number(closure.def.params.len() as f64),
            _ => Value::Undefined,
        },
        Value::Native(native) => match key {
            "name" => Value::from(native.name()),
            _ => native.static_member(key).unwrap_or_default(),
        },
        Value::Component(component) => match key {
            "name" | "displayName" => Value::from(component.name()),
            _ => Value::Undefined,
        },
        Value::Bool(_) | Value::Number(_) | Value::Node(_) => Value::Undefined,
    })
}

pub fn set_member(object: &Value, key: &str, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::Undefined | Value::Null => Err(RuntimeError::type_error(format!(
            "Cannot set properties of {} (setting '{key}')",
            object.to_js_string()
        ))),
        Value::Object(map) => {
            map.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if key == "length" {
                let len = value.to_number();
                if len < 0.0 || len.fract() != 0.0 || len.is_nan() || len > MAX_ARRAY_LEN as f64 {
                    return Err(RuntimeError::range("Invalid array length"));
                }
                items.resize(len as usize, Value::Undefined);
            } else if let Ok(i) = key.parse::<usize>() {
                if i >= MAX_ARRAY_LEN {
                    return Err(RuntimeError::range("Invalid array length"));
                }
                if i >= items.len() {
                    items.resize(i + 1, Value::Undefined);
                }
                items[i] = value;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// True when `object.key(...)` dispatches to a built-in method rather than a stored property.
pub fn is_builtin(object: &Value, key: &str) -> bool {
    match object {
        Value::Array(_) => ARRAY_METHODS.contains(&key),
        Value::String(_) => STRING_METHODS.contains(&key),
        Value::Number(_) => NUMBER_METHODS.contains(&key),
        Value::Object(map) => OBJECT_METHODS.contains(&key) && !map.borrow().contains_key(key),
        _ => false,
    }
}

pub fn call_builtin(
    cx: &mut dyn Invoke,
    object: &Value,
    key: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    match object {
        Value::Array(_) => array_method(cx, object, key, args),
        Value::String(s) => string_method(cx, s, key, args),
        Value::Number(n) => number_method(*n, key, &args),
        Value::Object(map) => Ok(match key {
            "hasOwnProperty" => {
                Value::Bool(map.borrow().contains_key(&arg(&args, 0).to_property_key()))
            }
            _ => Value::from("[object Object]"),
        }),
        _ => Err(RuntimeError::type_error(format!("{key} is not a function"))),
    }
}

/// `relative` index resolution shared by `slice`, `at`, `splice`, ...
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn callback(args: &[Value], method: &str) -> Result<Value, RuntimeError> {
    let f = arg(args, 0);
    if f.is_callable() {
        Ok(f)
    } else {
        Err(RuntimeError::type_error(format!(
            "{} is not a function (Array.prototype.{method})",
            f.to_js_string()
        )))
    }
}

fn array_method(
    cx: &mut dyn Invoke,
    this: &Value,
    key: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let Value::Array(items) = this else {
        return Ok(Value::Undefined);
    };
    // Callbacks may mutate the array, so iterate over a snapshot and never hold the borrow.
    let snapshot = || items.borrow().clone();
    let len = items.borrow().len();

    Ok(match key {
        "push" => {
            let mut items = items.borrow_mut();
            items.extend(args);
            Value::Number(items.len() as f64)
        }
        "pop" => items.borrow_mut().pop().unwrap_or_default(),
        "shift" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }
        "unshift" => {
            let mut items = items.borrow_mut();
            let tail = std::mem::take(&mut *items);
            items.extend(args);
            items.extend(tail);
            Value::Number(items.len() as f64)
        }
        "slice" => {
            let start = relative_index(&arg(&args, 0), len, 0);
            let end = relative_index(&arg(&args, 1), len, len);
            let items = items.borrow();
            Value::array(items.get(start..end.max(start)).unwrap_or_default().to_vec())
        }
        "splice" => {
            let start = relative_index(&arg(&args, 0), len, 0);
            let delete = match args.get(1) {
                None => len - start,
                Some(v) => {
                    let n = v.to_number();
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        (n as usize).min(len - start)
                    }
                }
            };
            let inserted = args.into_iter().skip(2);
            let removed: Vec<Value> = items
                .borrow_mut()
                .splice(start..start + delete, inserted)
                .collect();
            Value::array(removed)
        }
        "concat" => {
            let mut out = snapshot();
            for a in args {
                match &a {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    _ => out.push(a),
                }
            }
            Value::array(out)
        }
        "join" => {
            let sep = match arg(&args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_js_string(),
            };
            let parts: Vec<String> = snapshot()
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_js_string()
                    }
                })
                .collect();
            Value::from(parts.join(&sep))
        }
        "toString" => Value::from(this.to_js_string()),
        "reverse" => {
            items.borrow_mut().reverse();
            this.clone()
        }
        "indexOf" | "lastIndexOf" | "includes" => {
            let needle = arg(&args, 0);
            let items = snapshot();
            let found = if key == "lastIndexOf" {
                items.iter().rposition(|v| v.strict_equals(&needle))
            } else if key == "includes" {
                items.iter().position(|v| {
                    v.strict_equals(&needle)
                        || matches!((v, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
                })
            } else {
                items.iter().position(|v| v.strict_equals(&needle))
            };
            if key == "includes" {
                Value::Bool(found.is_some())
            } else {
                Value::Number(found.map_or(-1.0, |i| i as f64))
            }
        }
        "at" => {
            let n = arg(&args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            if index < 0.0 {
                Value::Undefined
            } else {
                items.borrow().get(index as usize).cloned().unwrap_or_default()
            }
        }
        "fill" => {
            let value = arg(&args, 0);
            let start = relative_index(&arg(&args, 1), len, 0);
            let end = relative_index(&arg(&args, 2), len, len);
            let mut items = items.borrow_mut();
            for slot in items.iter_mut().take(end).skip(start) {
                *slot = value.clone();
            }
            drop(items);
            this.clone()
        }
        "keys" => Value::array((0..len).map(|i| Value::Number(i as f64)).collect()),
        "entries" => Value::array(
            snapshot()
                .into_iter()
                .enumerate()
                .map(|(i, v)| Value::array(vec![Value::Number(i as f64), v]))
                .collect(),
        ),
        "flat" => {
            let depth = match arg(&args, 0) {
                Value::Undefined => 1.0,
                other => other.to_number(),
            };
            let mut out = Vec::new();
            flatten_into(&snapshot(), depth, &mut out);
            Value::array(out)
        }
        "forEach" | "map" | "filter" | "find" | "findIndex" | "findLast" | "findLastIndex"
        | "some" | "every" | "flatMap" => {
            let f = callback(&args, key)?;
            let items = snapshot();
            let mut indices: Vec<usize> = (0..items.len()).collect();
            if key == "findLast" || key == "findLastIndex" {
                indices.reverse();
            }
            let mut mapped = Vec::new();
            for i in indices {
                let item = items[i].clone();
                let out = cx.call(
                    &f,
                    vec![item.clone(), Value::Number(i as f64), this.clone()],
                )?;
                match key {
                    "map" => mapped.push(out),
                    "flatMap" => match &out {
                        Value::Array(inner) => mapped.extend(inner.borrow().iter().cloned()),
                        _ => mapped.push(out),
                    },
                    "filter" if out.truthy() => mapped.push(item),
                    "find" | "findLast" if out.truthy() => return Ok(item),
                    "findIndex" | "findLastIndex" if out.truthy() => {
                        return Ok(Value::Number(i as f64));
                    }
                    "some" if out.truthy() => return Ok(Value::Bool(true)),
                    "every" if !out.truthy() => return Ok(Value::Bool(false)),
                    _ => {}
                }
            }
            match key {
                "forEach" | "find" | "findLast" => Value::Undefined,
                "findIndex" | "findLastIndex" => Value::Number(-1.0),
                "some" => Value::Bool(false),
                "every" => Value::Bool(true),
                _ => Value::array(mapped),
            }
        }
        "reduce" | "reduceRight" => {
            let f = callback(&args, key)?;
            let items = snapshot();
            let mut indices: Vec<usize> = (0..items.len()).collect();
            if key == "reduceRight" {
                indices.reverse();
            }
            let mut indices = indices.into_iter();
            let mut acc = match args.get(1) {
                Some(init) => init.clone(),
                None => match indices.next() {
                    Some(i) => items[i].clone(),
                    None => {
                        return Err(RuntimeError::type_error(
                            "Reduce of empty array with no initial value",
                        ));
                    }
                },
            };
            for i in indices {
                acc = cx.call(
                    &f,
                    vec![acc, items[i].clone(), Value::Number(i as f64), this.clone()],
                )?;
            }
            acc
        }
        "sort" => {
            let comparator = arg(&args, 0);
            let items_now = snapshot();
            let sorted = if comparator.is_callable() {
                merge_sort(items_now, &mut |a, b| {
                    let out = cx.call(&comparator, vec![a.clone(), b.clone()])?;
                    let n = out.to_number();
                    Ok(if n > 0.0 {
                        Ordering::Greater
                    } else if n < 0.0 {
                        Ordering::Less
                    } else {
                        Ordering::Equal
                    })
                })?
            } else {
                merge_sort(items_now, &mut |a, b| Ok(default_compare(a, b)))?
            };
            *items.borrow_mut() = sorted;
            this.clone()
        }
        _ => Value::Undefined,
    })
}

fn flatten_into(items: &[Value], depth: f64, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => {
                let inner = inner.borrow().clone();
                flatten_into(&inner, depth - 1.0, out);
            }
            other => out.push(other.clone()),
        }
    }
}

/// `Array.prototype.sort` without a comparator: `undefined` last, everything else by string.
fn default_compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        _ => a.to_js_string().cmp(&b.to_js_string()),
    }
}

/// Stable merge sort with a fallible comparator. User comparators need not be consistent, so
/// this never relies on the total-order contract of `slice::sort_by`.
fn merge_sort(
    items: Vec<Value>,
    cmp: &mut dyn FnMut(&Value, &Value) -> Result<Ordering, RuntimeError>,
) -> Result<Vec<Value>, RuntimeError> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(left, cmp)?;
    let right = merge_sort(right, cmp)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => cmp(l, r)? == Ordering::Greater,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        out.extend(next);
    }
    Ok(out)
}

fn string_method(
    cx: &mut dyn Invoke,
    s: &str,
    key: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let substr = |start: usize, end: usize| -> Value {
        Value::from(chars[start..end.max(start)].iter().collect::<String>())
    };
    let text_arg = |i: usize| arg(&args, i).to_js_string();

    Ok(match key {
        "toUpperCase" => Value::from(s.to_uppercase()),
        "toLowerCase" => Value::from(s.to_lowercase()),
        "trim" => Value::from(s.trim()),
        "trimStart" => Value::from(s.trim_start()),
        "trimEnd" => Value::from(s.trim_end()),
        "toString" => Value::from(s),
        "concat" => {
            let mut out = s.to_string();
            for a in &args {
                out.push_str(&a.to_js_string());
            }
            Value::from(out)
        }
        "slice" => {
            let start = relative_index(&arg(&args, 0), len, 0);
            let end = relative_index(&arg(&args, 1), len, len);
            substr(start, end)
        }
        "substring" => {
            let clamp = |v: &Value, default: usize| match v {
                Value::Undefined => default,
                other => {
                    let n = other.to_number();
                    if n.is_nan() { 0 } else { n.clamp(0.0, len as f64) as usize }
                }
            };
            let a = clamp(&arg(&args, 0), 0);
            let b = clamp(&arg(&args, 1), len);
            substr(a.min(b), a.max(b))
        }
        "charAt" | "at" | "charCodeAt" => {
            let n = arg(&args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if key == "at" && n < 0.0 { len as f64 + n } else { n };
            let c = if index < 0.0 { None } else { chars.get(index as usize) };
            match (key, c) {
                ("charCodeAt", Some(c)) => Value::Number(f64::from(u32::from(*c))),
                ("charCodeAt", None) => Value::Number(f64::NAN),
                ("charAt", None) => Value::from(""),
                ("at", None) => Value::Undefined,
                (_, Some(c)) => Value::from(c.to_string()),
                _ => Value::Undefined,
            }
        }
        "indexOf" | "lastIndexOf" | "includes" | "startsWith" | "endsWith" => {
            let needle: Vec<char> = text_arg(0).chars().collect();
            let matches_at = |i: usize| chars.get(i..i + needle.len()) == Some(&needle[..]);
            match key {
                "indexOf" | "includes" => {
                    let from = relative_index(&arg(&args, 1), len, 0);
                    let found = (from..=len).find(|&i| matches_at(i));
                    if key == "includes" {
                        Value::Bool(found.is_some())
                    } else {
                        Value::Number(found.map_or(-1.0, |i| i as f64))
                    }
                }
                "lastIndexOf" => {
                    let found = (0..=len).rev().find(|&i| matches_at(i));
                    Value::Number(found.map_or(-1.0, |i| i as f64))
                }
                "startsWith" => {
                    let at = relative_index(&arg(&args, 1), len, 0);
                    Value::Bool(matches_at(at))
                }
                _ => {
                    let end = relative_index(&arg(&args, 1), len, len);
                    Value::Bool(end >= needle.len() && matches_at(end - needle.len()))
                }
            }
        }
        "split" => match arg(&args, 0) {
            Value::Undefined => Value::array(vec![Value::from(s)]),
            sep => {
                let sep = sep.to_js_string();
                let parts: Vec<Value> = if sep.is_empty() {
                    chars.iter().map(|c| Value::from(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(Value::from).collect()
                };
                let limit = match arg(&args, 1) {
                    Value::Undefined => parts.len(),
                    n => n.to_number().max(0.0) as usize,
                };
                Value::array(parts.into_iter().take(limit).collect())
            }
        },
        "replace" | "replaceAll" => {
            let pattern = text_arg(0);
            let replacement = arg(&args, 1);
            let mut out = String::new();
            let mut rest = s;
            let mut offset = 0;
            loop {
                let Some(pos) = rest.find(pattern.as_str()) else {
                    out.push_str(rest);
                    break;
                };
                out.push_str(&rest[..pos]);
                let position = s[..offset + pos].chars().count();
                let text = if replacement.is_callable() {
                    cx.call(
                        &replacement,
                        vec![
                            Value::from(pattern.as_str()),
                            Value::Number(position as f64),
                            Value::from(s),
                        ],
                    )?
                    .to_js_string()
                } else {
                    expand_replacement(&replacement.to_js_string(), &pattern)
                };
                out.push_str(&text);
                let advance = pos + pattern.len();
                if key == "replace" {
                    out.push_str(&rest[advance..]);
                    break;
                }
                if pattern.is_empty() {
                    // Empty pattern matches between every character.
                    match rest[advance..].chars().next() {
                        Some(c) => {
                            out.push(c);
                            rest = &rest[advance + c.len_utf8()..];
                            offset += advance + c.len_utf8();
                        }
                        None => break,
                    }
                } else {
                    rest = &rest[advance..];
                    offset += advance;
                }
            }
            Value::from(out)
        }
        "repeat" => {
            let n = arg(&args, 0).to_number();
            if n < 0.0 || n.is_infinite() {
                return Err(RuntimeError::range(format!(
                    "Invalid count value: {}",
                    format_number(n)
                )));
            }
            let n = if n.is_nan() { 0 } else { n as usize };
            if s.len().saturating_mul(n) > MAX_STRING_LEN {
                return Err(RuntimeError::range("Invalid string length"));
            }
            Value::from(s.repeat(n))
        }
        "padStart" | "padEnd" => {
            let target = arg(&args, 0).to_number();
            let target = if target.is_nan() { 0 } else { target.max(0.0) as usize };
            if target > MAX_STRING_LEN {
                return Err(RuntimeError::range("Invalid string length"));
            }
            let fill = match arg(&args, 1) {
                Value::Undefined => " ".to_string(),
                other => other.to_js_string(),
            };
            if target <= len || fill.is_empty() {
                return Ok(Value::from(s));
            }
            let pad: String = fill.chars().cycle().take(target - len).collect();
            Value::from(if key == "padStart" {
                format!("{pad}{s}")
            } else {
                format!("{s}{pad}")
            })
        }
        "localeCompare" => {
            let other = text_arg(0);
            let ord = s
                .to_lowercase()
                .cmp(&other.to_lowercase())
                .then_with(|| s.cmp(other.as_str()));
            Value::Number(match ord {
                Ordering::Less => -1.0,
                Ordering::Equal => 0.0,
                Ordering::Greater => 1.0,
            })
        }
        _ => Value::Undefined,
    })
}

const MAX_STRING_LEN: usize = 1 << 28;

/// `$&` (the match) and `$$` in string replacement patterns.
fn expand_replacement(template: &str, matched: &str) -> String {
    if !template.contains('$') {
        return template.to_string();
    }
    let mut out = String::new();
    let mut iter = template.chars().peekable();
    while let Some(c) = iter.next() {
        if c == '$' {
            match iter.peek() {
                Some('$') => {
                    iter.next();
                    out.push('$');
                    continue;
                }
                Some('&') => {
                    iter.next();
                    out.push_str(matched);
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

fn number_method(n: f64, key: &str, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(match key {
        "toFixed" => {
            let digits = digits_arg(args, 0, 100, "toFixed() digits")?.unwrap_or(0);
            Value::from(to_fixed(n, digits))
        }
        "toPrecision" => match digits_arg(args, 1, 100, "toPrecision() argument")? {
            None => Value::from(format_number(n)),
            Some(p) => Value::from(to_precision(n, p)),
        },
        "toString" => match arg(args, 0) {
            Value::Undefined => Value::from(format_number(n)),
            radix => {
                let radix = radix.to_number();
                if !(2.0..=36.0).contains(&radix) {
                    return Err(RuntimeError::range(
                        "toString() radix must be between 2 and 36",
                    ));
                }
                Value::from(to_radix(n, radix as u32))
            }
        },
        "toLocaleString" => Value::from(to_locale_string(n)),
        _ => Value::Undefined,
    })
}

fn digits_arg(
    args: &[Value],
    min: usize,
    max: usize,
    what: &str,
) -> Result<Option<usize>, RuntimeError> {
    match arg(args, 0) {
        Value::Undefined => Ok(None),
        v => {
            let d = v.to_number();
            let d = if d.is_nan() { 0.0 } else { d.trunc() };
            if d < min as f64 || d > max as f64 {
                return Err(RuntimeError::range(format!(
                    "{what} must be between {min} and {max}"
                )));
            }
            Ok(Some(d as usize))
        }
    }
}

/// `Number.prototype.toFixed`; halves round away from zero.
pub fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return format_number(n);
    }
    let mut out = format!("{:.*}", digits, n);
    // `format!` rounds exact ties to even; JavaScript picks the larger magnitude.
    let scaled = n.abs() * 10f64.powi(digits as i32);
    if scaled.fract() == 0.5 && digits <= 15 {
        let bumped = (scaled.trunc() + 1.0) / 10f64.powi(digits as i32);
        out = format!("{:.*}", digits, bumped.copysign(n));
    }
    if n == 0.0 && out.starts_with('-') {
        out.remove(0);
    }
    out
}

fn to_precision(n: f64, precision: usize) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    if n == 0.0 {
        return to_fixed(0.0, precision - 1);
    }
    let exponent = n.abs().log10().floor() as i32;
    if exponent < -6 || exponent >= precision as i32 {
        let formatted = format!("{:.*e}", precision - 1, n);
        match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        }
    } else {
        to_fixed(n, (precision as i32 - 1 - exponent).max(0) as usize)
    }
}

fn to_radix(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() {
        return format_number(n);
    }
    let negative = n < 0.0;
    let n = n.abs();
    let mut int = n.trunc();
    let mut digits = Vec::new();
    if int == 0.0 {
        digits.push('0');
    }
    while int >= 1.0 {
        let d = (int % radix as f64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        int = (int / radix as f64).trunc();
    }
    digits.reverse();
    let mut out: String = digits.into_iter().collect();
    let mut frac = n.fract();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..20 {
            frac *= radix as f64;
            let d = frac.trunc() as u32;
            out.push(std::char::from_digit(d, radix).unwrap_or('0'));
            frac = frac.fract();
            if frac == 0.0 {
                break;
            }
        }
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

/// `en-US` grouping with at most three fraction digits.
pub fn to_locale_string(n: f64) -> String {
    if !n.is_finite() {
        return match n {
            f64::INFINITY => "∞".to_string(),
            f64::NEG_INFINITY => "-∞".to_string(),
            _ => "NaN".to_string(),
        };
    }
    let fixed = to_fixed(n, 3);
    let (sign, body) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int, frac) = body.split_once('.').unwrap_or((body, ""));
    let frac = frac.trim_end_matches('0');
    let mut grouped = String::new();
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting_matches_javascript() {
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(-0.0001, 2), "-0.00");
        assert_eq!(to_fixed(-0.0, 1), "0.0");
        assert_eq!(to_fixed(12.0, 2), "12.00");
        assert_eq!(to_precision(123.456, 4), "123.5");
        assert_eq!(to_precision(123456.0, 2), "1.2e+5");
        assert_eq!(to_radix(255.0, 16), "ff");
        assert_eq!(to_radix(-10.0, 2), "-1010");
        assert_eq!(to_locale_string(1234567.891), "1,234,567.891");
        assert_eq!(to_locale_string(-1000.5), "-1,000.5");
        assert_eq!(to_locale_string(999.0), "999");
    }

    #[test]
    fn replacement_patterns_expand_match_and_dollar() {
        assert_eq!(expand_replacement("[$&]", "x"), "[x]");
        assert_eq!(expand_replacement("$$", "x"), "$");
        assert_eq!(expand_replacement("$1", "x"), "$1");
    }

    #[test]
    fn relative_indices_clamp() {
        assert_eq!(relative_index(&Value::from(-2.0), 5, 0), 3);
        assert_eq!(relative_index(&Value::from(-9.0), 5, 0), 0);
        assert_eq!(relative_index(&Value::from(9.0), 5, 0), 5);
        assert_eq!(relative_index(&Value::Undefined, 5, 5), 5);
    }

    #[test]
    fn property_reads_on_nullish_values_are_type_errors() {
        let err = get_member(&Value::Undefined, "x").expect_err("undefined");
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot read properties of undefined (reading 'x')"
        );
        assert_eq!(
            get_member(&Value::from("héllo"), "length")
                .ok()
                .and_then(|v| v.as_f64()),
            Some(5.0)
        );
    }
}
