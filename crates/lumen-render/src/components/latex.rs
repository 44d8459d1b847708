//! `Latex`: TeX math rendered as a readable Unicode approximation.
//!
//! Content is either all math (`<Latex>{"\\frac{a}{b}"}</Latex>`) or text with `$…$`, `$$…$$`,
//! `\(…\)` and `\[…\]` segments. The original TeX is kept in `data-tex` for client-side
//! typesetting.

use super::text_prop_or_children;
use lumen_core::script::{Props, RuntimeError};
use lumen_core::{Component, Element, VNode, component_fn};
use std::sync::Arc;

const MAX_GROUP_DEPTH: usize = 64;

pub fn latex() -> Arc<dyn Component> {
    component_fn("Latex", |_, props, children| render_latex(props, &children))
}

fn render_latex(props: &Props, children: &[VNode]) -> Result<VNode, RuntimeError> {
    let source = props
        .str("math")
        .unwrap_or_else(|| text_prop_or_children(props, "children", children));
    let display = props.bool("display").unwrap_or(false) || props.bool("block").unwrap_or(false);

    let segments = split_segments(&source);
    let has_delimiters = segments.iter().any(|s| !matches!(s, Segment::Text(_)));
    if !has_delimiters {
        return Ok(math_node(&source, display).into());
    }
    let wrapper = if display { "div" } else { "span" };
    let mut el = Element::new(wrapper).attr("class", "lumen-latex-text");
    for segment in segments {
        el = match segment {
            Segment::Text(text) => el.child(text),
            Segment::Inline(tex) => el.child(math_node(&tex, false)),
            Segment::Display(tex) => el.child(math_node(&tex, true)),
        };
    }
    Ok(el.into())
}

fn math_node(tex: &str, display: bool) -> Element {
    let (tag, class) = if display {
        ("div", "lumen-latex lumen-latex-display")
    } else {
        ("span", "lumen-latex")
    };
    Element::new(tag)
        .attr("class", class)
        .attr("role", "math")
        .attr("data-tex", tex.trim())
        .child(tex_to_unicode(tex))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Inline(String),
    Display(String),
}

fn split_segments(source: &str) -> Vec<Segment> {
    const DELIMITERS: [(&str, &str, bool); 4] = [
        ("$$", "$$", true),
        ("\\[", "\\]", true),
        ("\\(", "\\)", false),
        ("$", "$", false),
    ];
    let mut out = Vec::new();
    let mut text = String::new();
    let mut rest = source;
    'scan: while !rest.is_empty() {
        if rest.starts_with("\\$") {
            text.push('$');
            rest = &rest[2..];
            continue;
        }
        for (open, close, display) in DELIMITERS {
            let Some(after) = rest.strip_prefix(open) else {
                continue;
            };
            let Some(end) = after.find(close) else {
                continue;
            };
            if end == 0 {
                continue;
            }
            if !text.is_empty() {
                out.push(Segment::Text(std::mem::take(&mut text)));
            }
            let tex = after[..end].to_string();
            out.push(if display {
                Segment::Display(tex)
            } else {
                Segment::Inline(tex)
            });
            rest = &after[end + close.len()..];
            continue 'scan;
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            text.push(c);
        }
        rest = chars.as_str();
    }
    if !text.is_empty() {
        out.push(Segment::Text(text));
    }
    out
}

/// Converts TeX math to plain Unicode text.
pub fn tex_to_unicode(tex: &str) -> String {
    let chars: Vec<char> = tex.chars().collect();
    let mut reader = TexReader { chars, pos: 0 };
    let out = reader.read_until(None, 0);
    collapse_spaces(&out)
}

fn collapse_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = true;
    for c in s.chars() {
        if c == ' ' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = c == '\n';
        }
    }
    out.trim_end().to_string()
}

struct TexReader {
    chars: Vec<char>,
    pos: usize,
}

impl TexReader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Reads until the closing `}` (when `close` is set) or the end of input.
    fn read_until(&mut self, close: Option<char>, depth: usize) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if Some(c) == close {
                self.pos += 1;
                return out;
            }
            self.pos += 1;
            match c {
                '{' => out.push_str(&self.group_body(depth)),
                '}' => {}
                '\\' => out.push_str(&self.command(depth)),
                '^' => {
                    let arg = self.argument(depth);
                    out.push_str(&script(&arg, superscript, '^'));
                }
                '_' => {
                    let arg = self.argument(depth);
                    out.push_str(&script(&arg, subscript, '_'));
                }
                '~' => out.push(' '),
                '&' => out.push(' '),
                c if c.is_whitespace() => out.push(' '),
                c => out.push(c),
            }
        }
        out
    }

    fn group_body(&mut self, depth: usize) -> String {
        if depth >= MAX_GROUP_DEPTH {
            let start = self.pos;
            self.skip_group();
            return self.chars[start..self.pos.saturating_sub(1)].iter().collect();
        }
        self.read_until(Some('}'), depth + 1)
    }

    fn skip_group(&mut self) {
        let mut open = 1usize;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '{' => open += 1,
                '}' => {
                    open -= 1;
                    if open == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// A `{group}`, a `\command` or a single character.
    fn argument(&mut self, depth: usize) -> String {
        self.skip_spaces();
        match self.peek() {
            Some('{') => {
                self.pos += 1;
                self.group_body(depth)
            }
            Some('\\') => {
                self.pos += 1;
                self.command(depth)
            }
            Some(c) => {
                self.pos += 1;
                c.to_string()
            }
            None => String::new(),
        }
    }

    fn optional_argument(&mut self) -> Option<String> {
        self.skip_spaces();
        if self.peek() != Some('[') {
            return None;
        }
        let start = self.pos + 1;
        let end = self.chars[start..].iter().position(|c| *c == ']')? + start;
        self.pos = end + 1;
        Some(self.chars[start..end].iter().collect())
    }

    fn command(&mut self, depth: usize) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        if self.pos == start {
            // Control symbol: `\,`, `\{`, `\\`, ...
            let Some(c) = self.peek() else {
                return String::new();
            };
            self.pos += 1;
            return match c {
                ',' | ':' | ';' | ' ' | '!' => " ".to_string(),
                '\\' => "\n".to_string(),
                other => other.to_string(),
            };
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        match name.as_str() {
            "frac" | "dfrac" | "tfrac" => {
                let num = self.argument(depth);
                let den = self.argument(depth);
                format!("{}/{}", wrap(&num), wrap(&den))
            }
            "sqrt" => {
                let index = self.optional_argument();
                let body = self.argument(depth);
                let root = match index.as_deref() {
                    Some("3") => "∛",
                    Some("4") => "∜",
                    _ => "√",
                };
                format!("{root}{}", wrap(&body))
            }
            "text" | "textrm" | "textbf" | "textit" | "mathrm" | "mathbf" | "mathit" | "mathsf"
            | "operatorname" | "boldsymbol" | "mbox" => self.argument(depth),
            "mathbb" => self.argument(depth).chars().map(double_struck).collect(),
            "hat" | "widehat" => accent(&self.argument(depth), '\u{0302}'),
            "bar" | "overline" => accent(&self.argument(depth), '\u{0304}'),
            "vec" => accent(&self.argument(depth), '\u{20D7}'),
            "dot" => accent(&self.argument(depth), '\u{0307}'),
            "ddot" => accent(&self.argument(depth), '\u{0308}'),
            "tilde" | "widetilde" => accent(&self.argument(depth), '\u{0303}'),
            "left" | "right" | "big" | "Big" | "bigg" | "Bigg" | "displaystyle" | "limits" => {
                String::new()
            }
            "quad" => "  ".to_string(),
            "qquad" => "    ".to_string(),
            "begin" | "end" => {
                self.argument(depth);
                String::new()
            }
            other => symbol(other).map_or_else(|| other.to_string(), str::to_string),
        }
    }
}

/// Parenthesizes compound expressions (`a+b` → `(a+b)`).
fn wrap(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() <= 1 || s.chars().all(|c| c.is_alphanumeric() || c == '.') {
        s.to_string()
    } else {
        format!("({s})")
    }
}

fn accent(base: &str, mark: char) -> String {
    let mut out = base.trim().to_string();
    out.push(mark);
    out
}

fn script(arg: &str, map: fn(char) -> Option<char>, marker: char) -> String {
    let arg = arg.trim();
    if let Some(mapped) = arg.chars().map(map).collect::<Option<String>>() {
        if !mapped.is_empty() {
            return mapped;
        }
    }
    if arg.chars().count() == 1 {
        format!("{marker}{arg}")
    } else {
        format!("{marker}({arg})")
    }
}

fn superscript(c: char) -> Option<char> {
    Some(match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '-' | '−' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        'a' => 'ᵃ',
        'b' => 'ᵇ',
        'c' => 'ᶜ',
        'd' => 'ᵈ',
        'e' => 'ᵉ',
        'f' => 'ᶠ',
        'g' => 'ᵍ',
        'h' => 'ʰ',
        'i' => 'ⁱ',
        'j' => 'ʲ',
        'k' => 'ᵏ',
        'l' => 'ˡ',
        'm' => 'ᵐ',
        'n' => 'ⁿ',
        'o' => 'ᵒ',
        'p' => 'ᵖ',
        'r' => 'ʳ',
        's' => 'ˢ',
        't' => 'ᵗ',
        'u' => 'ᵘ',
        'v' => 'ᵛ',
        'w' => 'ʷ',
        'x' => 'ˣ',
        'y' => 'ʸ',
        'z' => 'ᶻ',
        'T' => 'ᵀ',
        '′' => '′',
        _ => return None,
    })
}

fn subscript(c: char) -> Option<char> {
    Some(match c {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        '+' => '₊',
        '-' | '−' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        'a' => 'ₐ',
        'e' => 'ₑ',
        'h' => 'ₕ',
        'i' => 'ᵢ',
        'j' => 'ⱼ',
        'k' => 'ₖ',
        'l' => 'ₗ',
        'm' => 'ₘ',
        'n' => 'ₙ',
        'o' => 'ₒ',
        'p' => 'ₚ',
        'r' => 'ᵣ',
        's' => 'ₛ',
        't' => 'ₜ',
        'u' => 'ᵤ',
        'v' => 'ᵥ',
        'x' => 'ₓ',
        _ => return None,
    })
}

fn double_struck(c: char) -> char {
    match c {
        'R' => 'ℝ',
        'N' => 'ℕ',
        'Z' => 'ℤ',
        'Q' => 'ℚ',
        'C' => 'ℂ',
        'P' => 'ℙ',
        'E' => '𝔼',
        other => other,
    }
}

fn symbol(name: &str) -> Option<&'static str> {
    Some(match name {
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" | "varepsilon" => "ε",
        "zeta" => "ζ",
        "eta" => "η",
        "theta" | "vartheta" => "θ",
        "iota" => "ι",
        "kappa" => "κ",
        "lambda" => "λ",
        "mu" => "μ",
        "nu" => "ν",
        "xi" => "ξ",
        "pi" => "π",
        "rho" | "varrho" => "ρ",
        "sigma" => "σ",
        "tau" => "τ",
        "upsilon" => "υ",
        "phi" | "varphi" => "φ",
        "chi" => "χ",
        "psi" => "ψ",
        "omega" => "ω",
        "Gamma" => "Γ",
        "Delta" => "Δ",
        "Theta" => "Θ",
        "Lambda" => "Λ",
        "Xi" => "Ξ",
        "Pi" => "Π",
        "Sigma" => "Σ",
        "Upsilon" => "Υ",
        "Phi" => "Φ",
        "Psi" => "Ψ",
        "Omega" => "Ω",
        "times" => "×",
        "cdot" => "⋅",
        "div" => "÷",
        "pm" => "±",
        "mp" => "∓",
        "le" | "leq" => "≤",
        "ge" | "geq" => "≥",
        "ll" => "≪",
        "gg" => "≫",
        "ne" | "neq" => "≠",
        "approx" => "≈",
        "equiv" => "≡",
        "sim" => "∼",
        "simeq" => "≃",
        "cong" => "≅",
        "propto" => "∝",
        "infty" => "∞",
        "partial" => "∂",
        "nabla" => "∇",
        "sum" => "∑",
        "prod" => "∏",
        "int" => "∫",
        "iint" => "∬",
        "oint" => "∮",
        "in" => "∈",
        "notin" => "∉",
        "ni" => "∋",
        "subset" => "⊂",
        "subseteq" => "⊆",
        "supset" => "⊃",
        "supseteq" => "⊇",
        "cup" => "∪",
        "cap" => "∩",
        "setminus" => "∖",
        "forall" => "∀",
        "exists" => "∃",
        "emptyset" | "varnothing" => "∅",
        "to" | "rightarrow" => "→",
        "leftarrow" | "gets" => "←",
        "Rightarrow" | "implies" => "⇒",
        "Leftarrow" => "⇐",
        "leftrightarrow" => "↔",
        "Leftrightarrow" | "iff" => "⇔",
        "mapsto" => "↦",
        "uparrow" => "↑",
        "downarrow" => "↓",
        "cdots" | "dots" | "ldots" => "…",
        "vdots" => "⋮",
        "angle" => "∠",
        "circ" => "∘",
        "degree" => "°",
        "neg" | "lnot" => "¬",
        "land" | "wedge" => "∧",
        "lor" | "vee" => "∨",
        "oplus" => "⊕",
        "otimes" => "⊗",
        "perp" => "⊥",
        "parallel" => "∥",
        "hbar" => "ℏ",
        "ell" => "ℓ",
        "Re" => "ℜ",
        "Im" => "ℑ",
        "aleph" => "ℵ",
        "prime" => "′",
        "langle" => "⟨",
        "rangle" => "⟩",
        "lfloor" => "⌊",
        "rfloor" => "⌋",
        "lceil" => "⌈",
        "rceil" => "⌉",
        "vert" | "mid" => "|",
        "Vert" => "‖",
        "lbrace" => "{",
        "rbrace" => "}",
        "sin" | "cos" | "tan" | "cot" | "sec" | "csc" | "log" | "ln" | "exp" | "lim" | "max"
        | "min" | "sup" | "inf" | "det" | "arg" | "deg" | "gcd" | "sinh" | "cosh" | "tanh"
        | "arcsin" | "arccos" | "arctan" => return Some(named_operator(name)),
        _ => return None,
    })
}

fn named_operator(name: &str) -> &'static str {
    const NAMES: &[&str] = &[
        "sin", "cos", "tan", "cot", "sec", "csc", "log", "ln", "exp", "lim", "max", "min", "sup",
        "inf", "det", "arg", "deg", "gcd", "sinh", "cosh", "tanh", "arcsin", "arccos", "arctan",
    ];
    NAMES.iter().find(|n| **n == name).copied().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_common_constructs() {
        assert_eq!(tex_to_unicode(r"\alpha + \beta \le \infty"), "α + β ≤ ∞");
        assert_eq!(tex_to_unicode(r"x^2 + y_{10}"), "x² + y₁₀");
        assert_eq!(tex_to_unicode(r"\frac{a+b}{2}"), "(a+b)/2");
        assert_eq!(tex_to_unicode(r"\sqrt{x^2+1}"), "√(x²+1)");
        assert_eq!(tex_to_unicode(r"e^{i\pi} = -1"), "e^(iπ) = -1");
        assert_eq!(tex_to_unicode(r"\mathbb{R}^n"), "ℝⁿ");
        assert_eq!(tex_to_unicode(r"\text{area} = \pi r^2"), "area = π r²");
        assert_eq!(tex_to_unicode(r"\sin\theta"), "sinθ");
    }

    #[test]
    fn unknown_commands_and_broken_input_degrade_gracefully() {
        assert_eq!(tex_to_unicode(r"\unknowncmd x"), "unknowncmd x");
        assert_eq!(tex_to_unicode(r"\frac{1}"), "1/");
        assert_eq!(tex_to_unicode("{{{a"), "a");
        assert_eq!(tex_to_unicode("\\"), "");
        let deep = format!("{}x{}", "{".repeat(500), "}".repeat(500));
        assert!(tex_to_unicode(&deep).contains('x'));
    }

    #[test]
    fn splits_delimited_math_from_text() {
        assert_eq!(
            split_segments(r"Area $\pi r^2$ costs \$5 and $$E=mc^2$$"),
            vec![
                Segment::Text("Area ".into()),
                Segment::Inline(r"\pi r^2".into()),
                Segment::Text(" costs $5 and ".into()),
                Segment::Display("E=mc^2".into()),
            ]
        );
        assert_eq!(split_segments("just $ text"), vec![Segment::Text("just $ text".into())]);
    }

    #[test]
    fn renders_math_or_mixed_content() {
        let mut props = Props::new();
        props.insert("math", lumen_core::script::Value::from(r"\frac{1}{2}"));
        props.insert("display", lumen_core::script::Value::from(true));
        let node = render_latex(&props, &[]).expect("render");
        let el = node.as_element().expect("element");
        assert_eq!(el.tag, "div");
        assert!(el.has_class("lumen-latex-display"));
        assert_eq!(el.attr_str("data-tex"), Some(r"\frac{1}{2}"));
        assert_eq!(node.text_content(), "1/2");

        let node = render_latex(&Props::new(), &[VNode::text("Let $x_1$ be")]).expect("render");
        assert_eq!(node.text_content(), "Let x₁ be");
        assert!(node.find(&|el| el.has_class("lumen-latex")).is_some());
    }
}
