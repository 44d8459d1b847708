//! Entity-decoding normalizer for generated block text.
//!
//! Generated blocks arrive with HTML-entity-encoded punctuation introduced upstream (transport
//! escaping, model output quirks). Decoding everything blindly would turn `&lt;div&gt;` into live
//! markup and `&quot;` into a string terminator, so decoding runs in context-aware stages:
//!
//! 1. repair attribute values broken by a mis-escaped apostrophe
//! 2. re-quote single-quoted string literals that carry apostrophes
//! 3. decode apostrophes inside double-quoted attribute values
//! 4. decode apostrophes inside template literals
//! 5. shield structural entities (`&lt;` `&gt;` `&amp;` `&quot;`, any spelling)
//! 6. decode every remaining entity
//! 7. restore the shielded entities verbatim
//!
//! Every stage is best-effort: a pattern that does not match leaves the text unchanged.

use crate::entities::{decode_entities, shield_structural_entities};
use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::{Arc, OnceLock};

const APOSTROPHE_ENTITY: &str = r"&#0*39;|&#[xX]0*27;|&apos;";

/// Source text after normalization. Cheap to clone; retries reuse the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSource(Arc<str>);

impl NormalizedSource {
    /// Wraps text that is already normalized (or that should bypass normalization).
    pub fn from_normalized(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when both values share the same backing allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Display for NormalizedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    EscapeRepair,
    StringLiterals,
    AttributeValues,
    TemplateLiterals,
    StructuralShield,
    EntityDecode,
}

/// Which stages changed the text, plus how many structural entities were shielded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub changed: Vec<Stage>,
    pub structural_entities: usize,
}

pub fn normalize(raw: &str) -> NormalizedSource {
    normalize_with_report(raw).0
}

pub fn normalize_with_report(raw: &str) -> (NormalizedSource, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut text = raw.to_string();

    let passes: [(Stage, fn(&str) -> String); 4] = [
        (Stage::EscapeRepair, repair_broken_attribute_escapes),
        (Stage::StringLiterals, requote_single_quoted_literals),
        (Stage::AttributeValues, decode_attribute_apostrophes),
        (Stage::TemplateLiterals, decode_template_apostrophes),
    ];
    for (stage, pass) in passes {
        let next = pass(&text);
        if next != text {
            tracing::debug!(?stage, "normalizer stage rewrote block text");
            report.changed.push(stage);
            text = next;
        }
    }

    match shield_structural_entities(&text) {
        Some(shielded) => {
            report.structural_entities = shielded.protected_count();
            if shielded.protected_count() > 0 {
                report.changed.push(Stage::StructuralShield);
            }
            let decoded = decode_entities(shielded.text());
            let restored = shielded.restore(&decoded);
            if restored != text {
                report.changed.push(Stage::EntityDecode);
                text = restored;
            }
        }
        None => {
            tracing::warn!("no free placeholder sentinel; skipping entity decode");
        }
    }

    (NormalizedSource(text.into()), report)
}

fn apostrophe_entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(APOSTROPHE_ENTITY).expect("valid regex"))
}

fn broken_escape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?P<attr>[A-Za-z_][\w:-]*)="(?P<head>[^"\\\n]*)"(?P<tail>[A-Za-z][^\\\n]*?)\\""#)
            .expect("valid regex")
    })
}

fn single_quoted_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"\B'(?P<inner>(?:{APOSTROPHE_ENTITY}|\\.|\b'\b|[^'\n\\])*)'\B"
        ))
        .expect("valid regex")
    })
}

fn attribute_value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?P<lead>\s)(?P<attr>[A-Za-z_][\w:-]*)="(?P<value>(?:\\"|[^"\n])*)""#)
            .expect("valid regex")
    })
}

fn template_literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`[^`]*`").expect("valid regex"))
}

fn has_apostrophe(s: &str) -> bool {
    s.contains('\'') || apostrophe_entity_regex().is_match(s)
}

/// Stage 1: `title="Opponent"s Deduced Range\"` → `title="Opponent's Deduced Range"`.
///
/// The break point is read as an apostrophe; double quotes inside the rebuilt value become
/// `&quot;` so the value stays delimited.
fn repair_broken_attribute_escapes(text: &str) -> String {
    broken_escape_regex()
        .replace_all(text, |caps: &Captures| {
            let value = format!("{}'{}", &caps["head"], &caps["tail"]).replace('"', "&quot;");
            format!("{}=\"{}\"", &caps["attr"], value)
        })
        .into_owned()
}

/// Stage 2: single-quoted literals holding an apostrophe become double-quoted literals.
fn requote_single_quoted_literals(text: &str) -> String {
    single_quoted_regex()
        .replace_all(text, |caps: &Captures| {
            let inner = &caps["inner"];
            if !has_apostrophe(inner) {
                return caps[0].to_string();
            }
            let decoded = apostrophe_entity_regex().replace_all(inner, "'");
            let mut out = String::with_capacity(decoded.len() + 2);
            out.push('"');
            let mut chars = decoded.chars();
            while let Some(ch) = chars.next() {
                match ch {
                    '\\' => match chars.next() {
                        Some('\'') => out.push('\''),
                        Some(next) => {
                            out.push('\\');
                            out.push(next);
                        }
                        None => out.push('\\'),
                    },
                    '"' => out.push_str("\\\""),
                    _ => out.push(ch),
                }
            }
            out.push('"');
            out
        })
        .into_owned()
}

/// Stage 3: attribute values tolerate literal apostrophes, but not backslash-escaped quotes.
///
/// Only attributes inside a JSX opening tag are touched; `a="..."` in script code keeps its
/// escapes.
fn decode_attribute_apostrophes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    for (start, end) in jsx_opening_tags(text) {
        out.push_str(&text[copied..start]);
        let tag = attribute_value_regex().replace_all(&text[start..end], |caps: &Captures| {
            let value = &caps["value"];
            if !has_apostrophe(value) {
                return caps[0].to_string();
            }
            let decoded = apostrophe_entity_regex()
                .replace_all(value, "'")
                .replace("\\\"", "&quot;");
            format!("{}{}=\"{}\"", &caps["lead"], &caps["attr"], decoded)
        });
        out.push_str(&tag);
        copied = end;
    }
    out.push_str(&text[copied..]);
    out
}

/// Byte ranges of `<Name ...>` opening tags: `<`, a tag name, then whitespace, `/` or `>`.
/// Quoted values and `{...}` expressions are skipped while looking for the closing `>`.
fn jsx_opening_tags(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut tags = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'<' || !bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
            i += 1;
            continue;
        }
        let mut name_end = i + 1;
        while bytes
            .get(name_end)
            .is_some_and(|b| b.is_ascii_alphanumeric() || matches!(*b, b'_' | b'.' | b':' | b'-'))
        {
            name_end += 1;
        }
        let opens_tag = bytes
            .get(name_end)
            .is_some_and(|b| b.is_ascii_whitespace() || matches!(*b, b'/' | b'>'));
        match opens_tag.then(|| tag_end(bytes, name_end)).flatten() {
            Some(end) => {
                tags.push((i, end));
                i = end;
            }
            None => i = name_end,
        }
    }
    tags
}

/// Index just past the `>` closing a tag whose attributes start at `from`.
fn tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Some(i + 1),
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Stage 4: template literals tolerate raw apostrophes.
fn decode_template_apostrophes(text: &str) -> String {
    template_literal_regex()
        .replace_all(text, |caps: &Captures| {
            apostrophe_entity_regex()
                .replace_all(&caps[0], "'")
                .into_owned()
        })
        .into_owned()
}

#[cfg(test)]
mod tests;
