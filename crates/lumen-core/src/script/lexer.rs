use super::ast::Span;
use super::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifiers and keywords alike; the parser decides which is which.
    Ident(String),
    Number(f64),
    Str(String),
    Punct(&'static str),
    /// Opening backtick. Template contents are scanned by the parser.
    Backtick,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub newline_before: bool,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(q) if q == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s == name)
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(s) => s.clone(),
            TokenKind::Number(n) => crate::script::value::format_number(*n),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Punct(p) => (*p).to_string(),
            TokenKind::Backtick => "`".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// Longest first, so a prefix scan yields the maximal munch.
const PUNCTUATORS: &[&str] = &[
    "...", "===", "!==", "**=", "&&=", "||=", "??=", "=>", "==", "!=", "<=", ">=", "&&", "||",
    "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "**", "{", "}", "(", ")", "[", "]", ";",
    ",", "<", ">", "+", "-", "*", "/", "%", "!", "?", ":", "=", ".", "&", "|", "^", "~",
];

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

pub struct Lexer<'src> {
    src: &'src str,
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn source(&self) -> &'src str {
        self.src
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Moves the cursor; the parser uses this to hand over between JS, JSX and template scanning.
    pub fn reset(&mut self, pos: usize) {
        self.pos = pos.min(self.src.len());
    }

    pub fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut it = self.src[self.pos..].chars();
        it.next();
        it.next()
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    /// Skips whitespace and comments. Returns whether a line break was crossed.
    pub fn skip_trivia(&mut self) -> Result<bool, SyntaxError> {
        let mut newline = false;
        loop {
            match self.peek_char() {
                Some('\n') | Some('\u{2028}') | Some('\u{2029}') => {
                    newline = true;
                    self.bump();
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.src[self.pos..].find("*/") {
                        Some(end) => {
                            if self.src[self.pos..self.pos + end].contains('\n') {
                                newline = true;
                            }
                            self.pos += end + 2;
                        }
                        None => {
                            return Err(SyntaxError::new(
                                "Unterminated comment",
                                Span::new(start, self.src.len()),
                            ));
                        }
                    }
                }
                _ => return Ok(newline),
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        let newline_before = self.skip_trivia()?;
        let start = self.pos;
        let Some(c) = self.peek_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
                newline_before,
            });
        };

        let kind = if is_ident_start(c) {
            while self.peek_char().is_some_and(is_ident_continue) {
                self.bump();
            }
            TokenKind::Ident(self.src[start..self.pos].to_string())
        } else if c.is_ascii_digit()
            || (c == '.' && self.peek_second().is_some_and(|d| d.is_ascii_digit()))
        {
            self.lex_number(start)?
        } else if c == '"' || c == '\'' {
            self.lex_string(c, start)?
        } else if c == '`' {
            self.bump();
            TokenKind::Backtick
        } else {
            let rest = &self.src[start..];
            let Some(mut p) = PUNCTUATORS.iter().copied().find(|p| rest.starts_with(p)) else {
                return Err(SyntaxError::new(
                    format!("Invalid or unexpected token '{c}'"),
                    Span::new(start, start + c.len_utf8()),
                ));
            };
            // `a?.5:b` is a conditional, not optional chaining.
            if p == "?." && rest[2..].starts_with(|d: char| d.is_ascii_digit()) {
                p = "?";
            }
            self.pos += p.len();
            TokenKind::Punct(p)
        };

        Ok(Token {
            kind,
            span: Span::new(start, self.pos),
            newline_before,
        })
    }

    fn lex_number(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        let radix = if self.starts_with("0x") || self.starts_with("0X") {
            16
        } else if self.starts_with("0b") || self.starts_with("0B") {
            2
        } else if self.starts_with("0o") || self.starts_with("0O") {
            8
        } else {
            10
        };

        let value = if radix != 10 {
            self.pos += 2;
            let digits_start = self.pos;
            while self
                .peek_char()
                .is_some_and(|c| c.is_digit(radix) || c == '_')
            {
                self.bump();
            }
            let digits: String = self.src[digits_start..self.pos]
                .chars()
                .filter(|c| *c != '_')
                .collect();
            u64::from_str_radix(&digits, radix)
                .map(|v| v as f64)
                .map_err(|_| {
                    SyntaxError::new("Invalid number literal", Span::new(start, self.pos))
                })?
        } else {
            self.eat_digits();
            if self.peek_char() == Some('.') {
                self.bump();
                self.eat_digits();
            }
            if matches!(self.peek_char(), Some('e' | 'E')) {
                let save = self.pos;
                self.bump();
                if matches!(self.peek_char(), Some('+' | '-')) {
                    self.bump();
                }
                if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.eat_digits();
                } else {
                    self.pos = save;
                }
            }
            let text: String = self.src[start..self.pos]
                .chars()
                .filter(|c| *c != '_')
                .collect();
            text.parse::<f64>().map_err(|_| {
                SyntaxError::new("Invalid number literal", Span::new(start, self.pos))
            })?
        };

        if self.peek_char().is_some_and(is_ident_start) {
            return Err(SyntaxError::new(
                "Invalid or unexpected token",
                Span::new(start, self.pos + 1),
            ));
        }
        Ok(TokenKind::Number(value))
    }

    fn eat_digits(&mut self) {
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_digit() || c == '_')
        {
            self.bump();
        }
    }

    fn lex_string(&mut self, quote: char, start: usize) -> Result<TokenKind, SyntaxError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(SyntaxError::new(
                        "Invalid or unexpected token (unterminated string literal)",
                        Span::new(start, self.pos),
                    ));
                }
                Some('\\') => self.read_escape(&mut out)?,
                Some(c) if c == quote => break,
                Some(c) => out.push(c),
            }
        }
        Ok(TokenKind::Str(out))
    }

    /// Decodes one escape sequence; the cursor sits just past the backslash.
    pub fn read_escape(&mut self, out: &mut String) -> Result<(), SyntaxError> {
        let start = self.pos.saturating_sub(1);
        let Some(c) = self.bump() else {
            return Err(SyntaxError::new(
                "Invalid escape sequence",
                Span::new(start, self.pos),
            ));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !self.peek_char().is_some_and(|d| d.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let cp = self.read_hex(2, start)?;
                out.push(char::from_u32(cp).unwrap_or('\u{FFFD}'));
            }
            'u' => {
                let cp = if self.peek_char() == Some('{') {
                    self.bump();
                    let digits_start = self.pos;
                    while self.peek_char().is_some_and(|d| d.is_ascii_hexdigit()) {
                        self.bump();
                    }
                    let digits = &self.src[digits_start..self.pos];
                    if self.bump() != Some('}') || digits.is_empty() {
                        return Err(SyntaxError::new(
                            "Invalid Unicode escape sequence",
                            Span::new(start, self.pos),
                        ));
                    }
                    u32::from_str_radix(digits, 16).map_err(|_| {
                        SyntaxError::new("Undefined Unicode code-point", Span::new(start, self.pos))
                    })?
                } else {
                    self.read_hex(4, start)?
                };
                out.push(char::from_u32(cp).unwrap_or('\u{FFFD}'));
            }
            '\r' => {
                if self.peek_char() == Some('\n') {
                    self.bump();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
        Ok(())
    }

    fn read_hex(&mut self, count: usize, start: usize) -> Result<u32, SyntaxError> {
        let digits_start = self.pos;
        for _ in 0..count {
            match self.peek_char() {
                Some(d) if d.is_ascii_hexdigit() => {
                    self.bump();
                }
                _ => {
                    return Err(SyntaxError::new(
                        "Invalid hexadecimal escape sequence",
                        Span::new(start, self.pos),
                    ));
                }
            }
        }
        u32::from_str_radix(&self.src[digits_start..self.pos], 16).map_err(|_| {
            SyntaxError::new(
                "Invalid hexadecimal escape sequence",
                Span::new(start, self.pos),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().expect("lex");
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn lexes_numbers_strings_and_maximal_punctuators() {
        assert_eq!(
            kinds("x ??= 0x1F + .5e1 === 'a\\'b' ... 1_000"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Punct("??="),
                TokenKind::Number(31.0),
                TokenKind::Punct("+"),
                TokenKind::Number(5.0),
                TokenKind::Punct("==="),
                TokenKind::Str("a'b".into()),
                TokenKind::Punct("..."),
                TokenKind::Number(1000.0),
            ]
        );
    }

    #[test]
    fn optional_chain_is_not_confused_with_conditional_decimal() {
        assert_eq!(
            kinds("a?.5:b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("?"),
                TokenKind::Number(0.5),
                TokenKind::Punct(":"),
                TokenKind::Ident("b".into()),
            ]
        );
    }

    #[test]
    fn string_escapes_decode() {
        assert_eq!(
            kinds(r#""\u{1F600}\x41B\n""#),
            vec![TokenKind::Str("\u{1F600}AB\n".into())]
        );
    }

    #[test]
    fn newline_flag_tracks_line_breaks_and_block_comments() {
        let mut lexer = Lexer::new("a /* x\n */ b\nc");
        assert!(!lexer.next_token().expect("a").newline_before);
        assert!(lexer.next_token().expect("b").newline_before);
        assert!(lexer.next_token().expect("c").newline_before);
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let err = Lexer::new("'abc").next_token().expect_err("unterminated");
        assert_eq!(err.span.start, 0);
    }
}
