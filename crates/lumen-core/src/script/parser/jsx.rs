use super::Parser;
use crate::entities::decode_entities;
use crate::script::ast::*;
use crate::script::error::SyntaxError;
use crate::script::lexer::{is_ident_continue, is_ident_start};

impl Parser<'_> {
    /// Parses a JSX element whose `<` is the current token.
    pub(super) fn parse_jsx(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.tok.span.start;
        let (element, end) = self.jsx_element(start)?;
        self.resume_at(end)?;
        Ok(Expr::Jsx(Box::new(element)))
    }

    fn jsx_error(&self, message: impl Into<String>) -> SyntaxError {
        let pos = self.lexer.pos();
        SyntaxError::new(message, Span::new(pos, pos + 1))
    }

    fn jsx_skip_ws(&mut self) -> Result<(), SyntaxError> {
        self.lexer.skip_trivia().map(|_| ())
    }

    /// Element starting at the `<` at byte `start`. Returns the element and the byte offset just
    /// past it.
    fn jsx_element(&mut self, start: usize) -> Result<(JsxElement, usize), SyntaxError> {
        self.nested(|p| p.jsx_element_inner(start))
    }

    fn jsx_element_inner(&mut self, start: usize) -> Result<(JsxElement, usize), SyntaxError> {
        self.lexer.reset(start + 1);
        self.jsx_skip_ws()?;

        if self.lexer.peek_char() == Some('>') {
            self.lexer.bump();
            let children = self.jsx_children(&JsxName::Fragment, start)?;
            let end = self.lexer.pos();
            let element = JsxElement {
                name: JsxName::Fragment,
                attrs: Vec::new(),
                children,
                span: Span::new(start, end),
            };
            return Ok((element, end));
        }

        let name = self.jsx_element_name()?;
        let mut attrs = Vec::new();
        loop {
            self.jsx_skip_ws()?;
            match self.lexer.peek_char() {
                Some('/') => {
                    self.lexer.bump();
                    if self.lexer.bump() != Some('>') {
                        return Err(self.jsx_error("Expected '>' to close a self-closing tag"));
                    }
                    let end = self.lexer.pos();
                    let element = JsxElement {
                        name,
                        attrs,
                        children: Vec::new(),
                        span: Span::new(start, end),
                    };
                    return Ok((element, end));
                }
                Some('>') => {
                    self.lexer.bump();
                    break;
                }
                Some('{') => attrs.push(JsxAttr::Spread(self.jsx_spread_attr()?)),
                Some(c) if is_ident_start(c) => {
                    let attr_name = self.jsx_identifier();
                    self.jsx_skip_ws()?;
                    let value = if self.lexer.peek_char() == Some('=') {
                        self.lexer.bump();
                        self.jsx_skip_ws()?;
                        self.jsx_attr_value()?
                    } else {
                        JsxAttrValue::True
                    };
                    attrs.push(JsxAttr::Named {
                        name: attr_name,
                        value,
                    });
                }
                None => {
                    return Err(SyntaxError::new(
                        format!("Unterminated JSX tag <{}>", name.display()),
                        Span::new(start, self.lexer.pos()),
                    ));
                }
                Some(c) => return Err(self.jsx_error(format!("Unexpected token '{c}'"))),
            }
        }

        let children = self.jsx_children(&name, start)?;
        let end = self.lexer.pos();
        let element = JsxElement {
            name,
            attrs,
            children,
            span: Span::new(start, end),
        };
        Ok((element, end))
    }

    fn jsx_identifier(&mut self) -> String {
        let start = self.lexer.pos();
        while self
            .lexer
            .peek_char()
            .is_some_and(|c| is_ident_continue(c) || c == '-' || c == ':')
        {
            self.lexer.bump();
        }
        self.lexer.source()[start..self.lexer.pos()].to_string()
    }

    fn jsx_element_name(&mut self) -> Result<JsxName, SyntaxError> {
        if !self.lexer.peek_char().is_some_and(is_ident_start) {
            return Err(self.jsx_error("Unexpected token in JSX element name"));
        }
        let mut path = vec![self.jsx_identifier()];
        while self.lexer.peek_char() == Some('.') {
            self.lexer.bump();
            let segment = self.jsx_identifier();
            if segment.is_empty() {
                return Err(self.jsx_error("Unexpected token in JSX member expression"));
            }
            path.push(segment);
        }

        if let [single] = path.as_slice() {
            let intrinsic = single.starts_with(|c: char| c.is_ascii_lowercase())
                || single.contains('-')
                || single.contains(':');
            if intrinsic {
                return Ok(JsxName::Intrinsic(single.clone()));
            }
        }
        Ok(JsxName::Component(path))
    }

    fn jsx_attr_value(&mut self) -> Result<JsxAttrValue, SyntaxError> {
        match self.lexer.peek_char() {
            Some(quote @ ('"' | '\'')) => {
                self.lexer.bump();
                let body_start = self.lexer.pos();
                let rest = &self.lexer.source()[body_start..];
                let Some(len) = rest.find(quote) else {
                    return Err(SyntaxError::new(
                        "Unterminated string constant",
                        Span::new(body_start - 1, self.lexer.source().len()),
                    ));
                };
                // JSX attribute strings have no backslash escapes; entities are the only escape.
                let value = decode_entities(&rest[..len]).into_owned();
                self.lexer.reset(body_start + len + 1);
                Ok(JsxAttrValue::Str(value))
            }
            Some('{') => match self.jsx_expression_container()? {
                Some(expr) => Ok(JsxAttrValue::Expr(expr)),
                None => Err(self.jsx_error(
                    "JSX attributes must only be assigned a non-empty expression",
                )),
            },
            Some('<') => {
                let (element, end) = self.jsx_element(self.lexer.pos())?;
                self.lexer.reset(end);
                Ok(JsxAttrValue::Expr(Expr::Jsx(Box::new(element))))
            }
            _ => Err(self.jsx_error("JSX value should be either an expression or a quoted text")),
        }
    }

    /// `{ expr }` starting at `{`. `None` for an empty container such as `{/* note */}`.
    fn jsx_expression_container(&mut self) -> Result<Option<Expr>, SyntaxError> {
        self.lexer.bump();
        self.tok = self.lexer.next_token()?;
        if self.is_punct("}") {
            self.lexer.reset(self.tok.span.end);
            return Ok(None);
        }
        let expr = self.parse_expression()?;
        if !self.is_punct("}") {
            return Err(self.unexpected());
        }
        self.lexer.reset(self.tok.span.end);
        Ok(Some(expr))
    }

    fn jsx_spread_attr(&mut self) -> Result<Expr, SyntaxError> {
        self.lexer.bump();
        self.tok = self.lexer.next_token()?;
        if !self.is_punct("...") {
            return Err(self.unexpected());
        }
        self.advance()?;
        let expr = self.parse_assignment()?;
        if !self.is_punct("}") {
            return Err(self.unexpected());
        }
        self.lexer.reset(self.tok.span.end);
        Ok(expr)
    }

    fn jsx_children(
        &mut self,
        name: &JsxName,
        start: usize,
    ) -> Result<Vec<JsxChild>, SyntaxError> {
        let mut children = Vec::new();
        loop {
            let text_start = self.lexer.pos();
            let rest = &self.lexer.source()[text_start..];
            let text_len = rest.find(|c| c == '<' || c == '{').unwrap_or(rest.len());
            if text_len > 0 {
                let decoded = decode_entities(&rest[..text_len]);
                if let Some(text) = clean_jsx_text(&decoded) {
                    children.push(JsxChild::Text(text));
                }
                self.lexer.reset(text_start + text_len);
            }

            match self.lexer.peek_char() {
                Some('{') => {
                    if let Some(expr) = self.jsx_expression_container()? {
                        children.push(JsxChild::Expr(expr));
                    }
                }
                Some('<') => {
                    let lt = self.lexer.pos();
                    self.lexer.bump();
                    self.jsx_skip_ws()?;
                    if self.lexer.peek_char() != Some('/') {
                        let (element, end) = self.jsx_element(lt)?;
                        self.lexer.reset(end);
                        children.push(JsxChild::Element(element));
                        continue;
                    }

                    self.lexer.bump();
                    self.jsx_skip_ws()?;
                    let closing = if self.lexer.peek_char() == Some('>') {
                        JsxName::Fragment
                    } else {
                        self.jsx_element_name()?
                    };
                    self.jsx_skip_ws()?;
                    if self.lexer.bump() != Some('>') {
                        return Err(self.jsx_error("Expected '>' in closing tag"));
                    }
                    if &closing != name {
                        return Err(SyntaxError::new(
                            format!(
                                "Expected corresponding JSX closing tag for <{}>",
                                name.display()
                            ),
                            Span::new(lt, self.lexer.pos()),
                        ));
                    }
                    return Ok(children);
                }
                _ => {
                    return Err(SyntaxError::new(
                        format!(
                            "Unterminated JSX contents: expected a closing tag for <{}>",
                            name.display()
                        ),
                        Span::new(start, self.lexer.pos()),
                    ));
                }
            }
        }
    }
}

/// JSX text whitespace rules: lines are trimmed where they meet a line break, blank lines
/// vanish, and the surviving lines are joined with single spaces.
pub(crate) fn clean_jsx_text(raw: &str) -> Option<String> {
    let lines: Vec<String> = raw
        .split('\n')
        .map(|line| line.trim_end_matches('\r').replace('\t', " "))
        .collect();
    let last_non_empty = lines.iter().rposition(|line| line.contains(|c: char| c != ' '));

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut trimmed = line.as_str();
        if i != 0 {
            trimmed = trimmed.trim_start_matches(' ');
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches(' ');
        }
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        if last_non_empty.is_some_and(|last| i < last) {
            out.push(' ');
        }
    }

    if out.is_empty() { None } else { Some(out) }
}
