use rustc_hash::FxHashSet;
use std::borrow::Cow;

/// Named forms of the four structural entities. HTML5 also defines the upper-case spellings;
/// mixed case (`&Lt;`, `&Gt;`) names different characters and is left alone.
const STRUCTURAL_NAMES: [&str; 8] = ["amp", "AMP", "lt", "LT", "gt", "GT", "quot", "QUOT"];

/// Code points of `"`, `&`, `<`, `>`.
const STRUCTURAL_CODE_POINTS: [u32; 4] = [34, 38, 60, 62];

/// Decodes HTML entities (`&eacute;`, `&#9829;`, `&nbsp;`, ...) into Unicode.
///
/// This is the standards-based decoder used for the generic decode stage and for JSX text and
/// attribute values at parse time, so named entities match browser behavior.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    htmlize::unescape(input)
}

/// Text whose structural entities were swapped for placeholder tokens.
///
/// A placeholder is `<sentinel><index><sentinel>` where the sentinel is a private-use character
/// that neither occurs in the input nor can be produced by decoding one of its numeric
/// references, so restoration can never pick up a token that was not inserted here.
#[derive(Debug, Clone)]
pub struct Shielded {
    text: String,
    sentinel: char,
    originals: Vec<String>,
}

impl Shielded {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn protected_count(&self) -> usize {
        self.originals.len()
    }

    /// Replaces every placeholder in `text` with the exact entity text it stood for.
    pub fn restore(&self, text: &str) -> String {
        if self.originals.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len() + self.originals.len() * 4);
        for (i, segment) in text.split(self.sentinel).enumerate() {
            if i % 2 == 0 {
                out.push_str(segment);
                continue;
            }
            match segment
                .parse::<usize>()
                .ok()
                .and_then(|idx| self.originals.get(idx))
            {
                Some(original) => out.push_str(original),
                None => {
                    // Unreachable for text produced by `shield_structural_entities`; keep the
                    // segment rather than dropping content.
                    out.push(self.sentinel);
                    out.push_str(segment);
                    out.push(self.sentinel);
                }
            }
        }
        out
    }
}

/// Replaces structural entities with collision-free placeholders.
///
/// Returns `None` only when no sentinel character is available, i.e. the input already uses
/// every private-use code point.
pub fn shield_structural_entities(input: &str) -> Option<Shielded> {
    let sentinel = pick_sentinel(input)?;
    let mut text = String::with_capacity(input.len());
    let mut originals = Vec::new();

    let mut rest = input;
    while let Some(idx) = rest.find('&') {
        text.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        match structural_entity_len(tail) {
            Some(len) => {
                text.push(sentinel);
                text.push_str(&originals.len().to_string());
                text.push(sentinel);
                originals.push(tail[..len].to_string());
                rest = &tail[len..];
            }
            None => {
                text.push('&');
                rest = &tail[1..];
            }
        }
    }
    text.push_str(rest);

    Some(Shielded {
        text,
        sentinel,
        originals,
    })
}

/// Returns the byte length of the structural entity starting at `s` (which starts with `&`).
///
/// Semicolon-less forms are included because the HTML decoder resolves the legacy spellings
/// (`&lt`, `&amp`) and the numeric ones without a terminator.
pub fn structural_entity_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'&') {
        return None;
    }

    if bytes.get(1) == Some(&b'#') {
        let (digits_start, radix) = match bytes.get(2) {
            Some(b'x' | b'X') => (3, 16),
            _ => (2, 10),
        };
        let mut end = digits_start;
        while end < bytes.len() && (bytes[end] as char).is_digit(radix) {
            end += 1;
        }
        if end == digits_start {
            return None;
        }
        let value = u32::from_str_radix(&s[digits_start..end], radix).ok()?;
        if !STRUCTURAL_CODE_POINTS.contains(&value) {
            return None;
        }
        if bytes.get(end) == Some(&b';') {
            end += 1;
        }
        return Some(end);
    }

    let mut end = 1;
    while end < bytes.len() && bytes[end].is_ascii_alphanumeric() {
        end += 1;
    }
    let name = &s[1..end];
    let terminated = bytes.get(end) == Some(&b';');
    for candidate in STRUCTURAL_NAMES {
        if name == candidate {
            return Some(if terminated { end + 1 } else { end });
        }
        if !terminated && name.starts_with(candidate) {
            return Some(1 + candidate.len());
        }
    }
    None
}

fn pick_sentinel(input: &str) -> Option<char> {
    let present: FxHashSet<u32> = input.chars().map(|c| c as u32).collect();
    let referenced = numeric_reference_code_points(input);
    ('\u{E000}'..='\u{F8FF}')
        .find(|c| !present.contains(&(*c as u32)) && !referenced.contains(&(*c as u32)))
}

fn numeric_reference_code_points(input: &str) -> FxHashSet<u32> {
    let mut out = FxHashSet::default();
    let mut rest = input;
    while let Some(idx) = rest.find("&#") {
        let tail = &rest[idx + 2..];
        let (digits, radix) = match tail.as_bytes().first() {
            Some(b'x' | b'X') => (&tail[1..], 16),
            _ => (tail, 10),
        };
        let len = digits
            .bytes()
            .take_while(|b| (*b as char).is_digit(radix))
            .count();
        if let Ok(v) = u32::from_str_radix(&digits[..len], radix) {
            out.insert(v);
        }
        rest = tail;
    }
    out
}
