//! Recursive-descent parser for block bodies.
//!
//! The lexer only knows JavaScript tokens. JSX and template literals are scanned here in raw
//! mode: the parser moves the lexer cursor to the start of the construct, walks the characters
//! itself, and re-enters token mode for embedded `{ ... }` / `${ ... }` expressions.

mod jsx;

use super::ast::*;
use super::error::SyntaxError;
use super::lexer::{Lexer, Token, TokenKind};
use super::value::format_number;
use std::sync::Arc;

const RESERVED: &[&str] = &[
    "await",
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "let",
    "new",
    "null",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

pub fn parse_program(src: &str) -> Result<Program, SyntaxError> {
    let mut parser = Parser::new(src)?;
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.parse_statement()?);
    }
    Ok(Program { body })
}

enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

struct Snapshot {
    tok: Token,
    pos: usize,
    prev_end: usize,
}

/// Statements, unary operands and JSX elements each count one level.
const MAX_NESTING: usize = 512;

pub(crate) struct Parser<'src> {
    lexer: Lexer<'src>,
    tok: Token,
    prev_end: usize,
    depth: usize,
}

impl<'src> Parser<'src> {
    fn new(src: &'src str) -> Result<Self, SyntaxError> {
        let mut lexer = Lexer::new(src);
        let tok = lexer.next_token()?;
        Ok(Self {
            lexer,
            tok,
            prev_end: 0,
            depth: 0,
        })
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::new(
                "Maximum nesting depth exceeded",
                self.tok.span,
            ));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn at_eof(&self) -> bool {
        self.tok.kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Result<Token, SyntaxError> {
        let next = self.lexer.next_token()?;
        self.prev_end = self.tok.span.end;
        Ok(std::mem::replace(&mut self.tok, next))
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            tok: self.tok.clone(),
            pos: self.lexer.pos(),
            prev_end: self.prev_end,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.tok = snapshot.tok;
        self.lexer.reset(snapshot.pos);
        self.prev_end = snapshot.prev_end;
    }

    /// Re-enters token mode at `pos` after raw scanning.
    fn resume_at(&mut self, pos: usize) -> Result<(), SyntaxError> {
        self.prev_end = pos;
        self.lexer.reset(pos);
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn is_punct(&self, p: &str) -> bool {
        self.tok.is_punct(p)
    }

    fn is_kw(&self, kw: &str) -> bool {
        self.tok.is_ident(kw)
    }

    fn eat_punct(&mut self, p: &str) -> Result<bool, SyntaxError> {
        if self.is_punct(p) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn eat_kw(&mut self, kw: &str) -> Result<bool, SyntaxError> {
        if self.is_kw(kw) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<Token, SyntaxError> {
        if self.is_punct(p) {
            self.advance()
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> SyntaxError {
        match self.tok.kind {
            TokenKind::Eof => SyntaxError::new("Unexpected end of input", self.tok.span),
            _ => SyntaxError::new(
                format!("Unexpected token '{}'", self.tok.describe()),
                self.tok.span,
            ),
        }
    }

    fn expect_ident(&mut self) -> Result<String, SyntaxError> {
        match &self.tok.kind {
            TokenKind::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Object keys and member names accept keywords, strings and numbers.
    fn property_key(&mut self) -> Result<String, SyntaxError> {
        let key = match &self.tok.kind {
            TokenKind::Ident(name) | TokenKind::Str(name) => name.clone(),
            TokenKind::Number(n) => format_number(*n),
            _ => return Err(self.unexpected()),
        };
        self.advance()?;
        Ok(key)
    }

    fn consume_semicolon(&mut self) -> Result<(), SyntaxError> {
        if self.eat_punct(";")? {
            return Ok(());
        }
        if self.is_punct("}") || self.at_eof() || self.tok.newline_before {
            return Ok(());
        }
        Err(self.unexpected())
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, SyntaxError> {
        if self.eat_punct("{")? {
            return Ok(Stmt::Block(self.parse_block_body()?));
        }
        if self.eat_punct(";")? {
            return Ok(Stmt::Empty);
        }

        let keyword = match &self.tok.kind {
            TokenKind::Ident(word) => word.clone(),
            _ => String::new(),
        };
        match keyword.as_str() {
            "const" | "let" | "var" => {
                let stmt = self.parse_declaration()?;
                self.consume_semicolon()?;
                Ok(stmt)
            }
            "function" => Ok(Stmt::Function(self.parse_function(true)?)),
            "return" => {
                let span = self.advance()?.span;
                let value = if self.is_punct(";")
                    || self.is_punct("}")
                    || self.at_eof()
                    || self.tok.newline_before
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return { value, span })
            }
            "if" => {
                self.advance()?;
                self.expect_punct("(")?;
                let test = self.parse_expression()?;
                self.expect_punct(")")?;
                let consequent = Box::new(self.parse_statement()?);
                let alternate = if self.eat_kw("else")? {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    test,
                    consequent,
                    alternate,
                })
            }
            "for" => self.parse_for(),
            "while" => {
                self.advance()?;
                self.expect_punct("(")?;
                let test = self.parse_expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While { test, body })
            }
            "break" | "continue" => {
                let span = self.advance()?.span;
                self.consume_semicolon()?;
                Ok(if keyword == "break" {
                    Stmt::Break(span)
                } else {
                    Stmt::Continue(span)
                })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// Statements up to and including the closing `}`; the opening brace is already consumed.
    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        self.advance()?;
        Ok(body)
    }

    fn decl_kind(&mut self) -> Result<DeclKind, SyntaxError> {
        let kind = match &self.tok.kind {
            TokenKind::Ident(k) if k == "const" => DeclKind::Const,
            TokenKind::Ident(k) if k == "let" => DeclKind::Let,
            TokenKind::Ident(k) if k == "var" => DeclKind::Var,
            _ => return Err(self.unexpected()),
        };
        self.advance()?;
        Ok(kind)
    }

    fn parse_declaration(&mut self) -> Result<Stmt, SyntaxError> {
        let kind = self.decl_kind()?;
        let declarators = self.parse_declarators(kind, None)?;
        Ok(Stmt::Decl { kind, declarators })
    }

    fn parse_declarators(
        &mut self,
        kind: DeclKind,
        mut first: Option<(Pattern, usize)>,
    ) -> Result<Vec<Declarator>, SyntaxError> {
        let mut declarators = Vec::new();
        loop {
            let (target, start) = match first.take() {
                Some(parsed) => parsed,
                None => {
                    let start = self.tok.span.start;
                    (self.parse_binding_pattern()?, start)
                }
            };
            let mut init = if self.eat_punct("=")? {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if init.is_none() && (kind == DeclKind::Const || !matches!(target, Pattern::Ident(_)))
            {
                return Err(SyntaxError::new(
                    "Missing initializer in declaration",
                    Span::new(start, self.prev_end),
                ));
            }
            if let (Pattern::Ident(name), Some(Expr::Function(def))) = (&target, init.as_mut()) {
                if let Some(def) = Arc::get_mut(def) {
                    def.name.get_or_insert_with(|| name.clone());
                }
            }
            declarators.push(Declarator {
                target,
                init,
                span: Span::new(start, self.prev_end),
            });
            if !self.eat_punct(",")? {
                return Ok(declarators);
            }
        }
    }

    fn parse_for(&mut self) -> Result<Stmt, SyntaxError> {
        self.advance()?;
        self.expect_punct("(")?;

        let init = if self.is_punct(";") {
            None
        } else if self.is_kw("const") || self.is_kw("let") || self.is_kw("var") {
            let kind = self.decl_kind()?;
            let start = self.tok.span.start;
            let target = self.parse_binding_pattern()?;
            if self.eat_kw("of")? {
                let iterable = self.parse_assignment()?;
                self.expect_punct(")")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Stmt::ForOf {
                    kind,
                    target,
                    iterable,
                    body,
                });
            }
            let declarators = self.parse_declarators(kind, Some((target, start)))?;
            Some(Box::new(Stmt::Decl { kind, declarators }))
        } else {
            Some(Box::new(Stmt::Expr(self.parse_expression()?)))
        };
        self.expect_punct(";")?;

        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(";")?;

        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(")")?;

        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_function(&mut self, require_name: bool) -> Result<Arc<FunctionDef>, SyntaxError> {
        let start = self.advance()?.span.start;
        let name = match &self.tok.kind {
            TokenKind::Ident(_) => Some(self.expect_ident()?),
            _ if require_name => return Err(self.unexpected()),
            _ => None,
        };
        self.expect_punct("(")?;
        let (params, rest) = self.parse_params()?;
        self.expect_punct("{")?;
        let body = self.parse_block_body()?;
        Ok(Arc::new(FunctionDef {
            name,
            params,
            rest,
            body: FunctionBody::Block(body),
            span: Span::new(start, self.prev_end),
        }))
    }

    /// Parameter list after `(`, through the closing `)`.
    fn parse_params(&mut self) -> Result<(Vec<Param>, Option<Pattern>), SyntaxError> {
        let mut params = Vec::new();
        let mut rest = None;
        while !self.is_punct(")") {
            if self.eat_punct("...")? {
                rest = Some(self.parse_binding_pattern()?);
                break;
            }
            let pattern = self.parse_binding_pattern()?;
            let default = if self.eat_punct("=")? {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param { pattern, default });
            if !self.eat_punct(",")? {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok((params, rest))
    }

    fn parse_binding_pattern(&mut self) -> Result<Pattern, SyntaxError> {
        if self.eat_punct("{")? {
            let mut props = Vec::new();
            let mut rest = None;
            while !self.is_punct("}") {
                if self.eat_punct("...")? {
                    rest = Some(self.expect_ident()?);
                    break;
                }
                let shorthand_ok =
                    matches!(&self.tok.kind, TokenKind::Ident(name) if !is_reserved(name));
                let key_span = self.tok.span;
                let key = self.property_key()?;
                let value = if self.eat_punct(":")? {
                    self.parse_binding_pattern()?
                } else if shorthand_ok {
                    Pattern::Ident(key.clone())
                } else {
                    return Err(SyntaxError::new(
                        format!("Unexpected token '{key}'"),
                        key_span,
                    ));
                };
                let default = if self.eat_punct("=")? {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                props.push(ObjectPatternProp {
                    key,
                    value,
                    default,
                });
                if !self.eat_punct(",")? {
                    break;
                }
            }
            self.expect_punct("}")?;
            return Ok(Pattern::Object { props, rest });
        }

        if self.eat_punct("[")? {
            let mut elements = Vec::new();
            let mut rest = None;
            while !self.is_punct("]") {
                if self.eat_punct(",")? {
                    elements.push(None);
                    continue;
                }
                if self.eat_punct("...")? {
                    rest = Some(Box::new(self.parse_binding_pattern()?));
                    break;
                }
                let pattern = self.parse_binding_pattern()?;
                let default = if self.eat_punct("=")? {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                elements.push(Some(PatternElem { pattern, default }));
                if !self.eat_punct(",")? {
                    break;
                }
            }
            self.expect_punct("]")?;
            return Ok(Pattern::Array { elements, rest });
        }

        Ok(Pattern::Ident(self.expect_ident()?))
    }

    // ---- expressions ----

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, SyntaxError> {
        if let Some(arrow) = self.try_arrow()? {
            return Ok(arrow);
        }

        let start = self.tok.span.start;
        let target = self.parse_conditional()?;
        let op = match self.tok.kind {
            TokenKind::Punct(p) => assign_op(p),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(target);
        };
        if !matches!(target, Expr::Ident { .. } | Expr::Member { .. }) {
            return Err(SyntaxError::new(
                "Invalid left-hand side in assignment",
                Span::new(start, self.prev_end),
            ));
        }
        self.advance()?;
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
            span: Span::new(start, self.prev_end),
        })
    }

    /// Speculatively parses an arrow function head, rewinding when the input is not one.
    fn try_arrow(&mut self) -> Result<Option<Expr>, SyntaxError> {
        let start = self.tok.span.start;

        if let TokenKind::Ident(name) = &self.tok.kind {
            if is_reserved(name) {
                return Ok(None);
            }
            let name = name.clone();
            let snapshot = self.snapshot();
            self.advance()?;
            if self.is_punct("=>") && !self.tok.newline_before {
                self.advance()?;
                let params = vec![Param {
                    pattern: Pattern::Ident(name),
                    default: None,
                }];
                return self.finish_arrow(params, None, start).map(Some);
            }
            self.restore(snapshot);
            return Ok(None);
        }

        if !self.is_punct("(") {
            return Ok(None);
        }
        let snapshot = self.snapshot();
        self.advance()?;
        match self.parse_params() {
            Ok((params, rest)) if self.is_punct("=>") && !self.tok.newline_before => {
                self.advance()?;
                self.finish_arrow(params, rest, start).map(Some)
            }
            _ => {
                self.restore(snapshot);
                Ok(None)
            }
        }
    }

    fn finish_arrow(
        &mut self,
        params: Vec<Param>,
        rest: Option<Pattern>,
        start: usize,
    ) -> Result<Expr, SyntaxError> {
        let body = if self.eat_punct("{")? {
            FunctionBody::Block(self.parse_block_body()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assignment()?))
        };
        Ok(Expr::Function(Arc::new(FunctionDef {
            name: None,
            params,
            rest,
            body,
            span: Span::new(start, self.prev_end),
        })))
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let test = self.parse_binary(1)?;
        if !self.eat_punct("?")? {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn infix(&self) -> Option<(u8, Infix)> {
        use BinaryOp::*;
        let op = match &self.tok.kind {
            TokenKind::Punct(p) => match *p {
                "??" => (1, Infix::Logical(LogicalOp::Nullish)),
                "||" => (2, Infix::Logical(LogicalOp::Or)),
                "&&" => (3, Infix::Logical(LogicalOp::And)),
                "|" => (4, Infix::Binary(BitOr)),
                "^" => (5, Infix::Binary(BitXor)),
                "&" => (6, Infix::Binary(BitAnd)),
                "==" => (7, Infix::Binary(Eq)),
                "!=" => (7, Infix::Binary(NotEq)),
                "===" => (7, Infix::Binary(StrictEq)),
                "!==" => (7, Infix::Binary(StrictNotEq)),
                "<" => (8, Infix::Binary(Lt)),
                ">" => (8, Infix::Binary(Gt)),
                "<=" => (8, Infix::Binary(LtEq)),
                ">=" => (8, Infix::Binary(GtEq)),
                "+" => (9, Infix::Binary(Add)),
                "-" => (9, Infix::Binary(Sub)),
                "*" => (10, Infix::Binary(Mul)),
                "/" => (10, Infix::Binary(Div)),
                "%" => (10, Infix::Binary(Rem)),
                "**" => (11, Infix::Binary(Pow)),
                _ => return None,
            },
            TokenKind::Ident(word) if word == "in" => (8, Infix::Binary(In)),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let start = self.tok.span.start;
        let mut left = self.parse_unary()?;
        while let Some((prec, op)) = self.infix() {
            if prec < min_prec {
                break;
            }
            self.advance()?;
            let right_assoc = matches!(op, Infix::Binary(BinaryOp::Pow));
            let right = self.parse_binary(if right_assoc { prec } else { prec + 1 })?;
            left = match op {
                Infix::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    span: Span::new(start, self.prev_end),
                },
                Infix::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(Self::parse_unary_inner)
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.tok.span.start;
        let op = match &self.tok.kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Punct("~") => Some(UnaryOp::BitNot),
            TokenKind::Ident(w) if w == "typeof" => Some(UnaryOp::TypeOf),
            TokenKind::Ident(w) if w == "void" => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.advance()?;
            let arg = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                arg: Box::new(arg),
                span: Span::new(start, self.prev_end),
            });
        }

        if self.is_punct("++") || self.is_punct("--") {
            let op = if self.is_punct("++") {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance()?;
            let target = self.parse_unary()?;
            return self.update(op, true, target, start);
        }

        let expr = self.parse_call_member()?;
        if (self.is_punct("++") || self.is_punct("--")) && !self.tok.newline_before {
            let op = if self.is_punct("++") {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance()?;
            return self.update(op, false, expr, start);
        }
        Ok(expr)
    }

    fn update(
        &self,
        op: UpdateOp,
        prefix: bool,
        target: Expr,
        start: usize,
    ) -> Result<Expr, SyntaxError> {
        let span = Span::new(start, self.prev_end);
        if !matches!(target, Expr::Ident { .. } | Expr::Member { .. }) {
            return Err(SyntaxError::new(
                "Invalid left-hand side expression in update operation",
                span,
            ));
        }
        Ok(Expr::Update {
            op,
            prefix,
            target: Box::new(target),
            span,
        })
    }

    fn parse_call_member(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.tok.span.start;
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_punct(".")? {
                let name = self.property_key()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Named(name),
                    optional: false,
                    span: Span::new(start, self.prev_end),
                };
            } else if self.eat_punct("?.")? {
                if self.eat_punct("(")? {
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: true,
                        span: Span::new(start, self.prev_end),
                    };
                } else if self.eat_punct("[")? {
                    let prop = self.parse_expression()?;
                    self.expect_punct("]")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(prop)),
                        optional: true,
                        span: Span::new(start, self.prev_end),
                    };
                } else {
                    let name = self.property_key()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Named(name),
                        optional: true,
                        span: Span::new(start, self.prev_end),
                    };
                }
            } else if self.eat_punct("[")? {
                let prop = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Computed(Box::new(prop)),
                    optional: false,
                    span: Span::new(start, self.prev_end),
                };
            } else if self.eat_punct("(")? {
                let args = self.parse_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    optional: false,
                    span: Span::new(start, self.prev_end),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<ArrayElem>, SyntaxError> {
        let mut args = Vec::new();
        while !self.is_punct(")") {
            if self.eat_punct("...")? {
                args.push(ArrayElem::Spread(self.parse_assignment()?));
            } else {
                args.push(ArrayElem::Item(self.parse_assignment()?));
            }
            if !self.eat_punct(",")? {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let tok = self.tok.clone();
        match tok.kind {
            TokenKind::Number(n) => {
                self.advance()?;
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance()?;
                Ok(Expr::Str(s))
            }
            TokenKind::Backtick => self.parse_template(tok.span),
            TokenKind::Punct("(") => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => self.parse_array_literal(),
            TokenKind::Punct("{") => self.parse_object_literal(),
            TokenKind::Punct("<") => self.parse_jsx(),
            TokenKind::Ident(name) => match name.as_str() {
                "true" | "false" => {
                    self.advance()?;
                    Ok(Expr::Bool(name == "true"))
                }
                "null" => {
                    self.advance()?;
                    Ok(Expr::Null)
                }
                "undefined" => {
                    self.advance()?;
                    Ok(Expr::Undefined)
                }
                "function" => Ok(Expr::Function(self.parse_function(false)?)),
                "new" => self.parse_new(),
                _ if is_reserved(&name) => Err(self.unexpected()),
                _ => {
                    self.advance()?;
                    Ok(Expr::Ident {
                        name,
                        span: tok.span,
                    })
                }
            },
            _ => Err(self.unexpected()),
        }
    }

    /// `new Callee.path[key](args)`; the argument list is optional.
    fn parse_new(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.tok.span.start;
        self.advance()?;
        let mut callee = self.parse_primary()?;
        loop {
            if self.eat_punct(".")? {
                let name = self.property_key()?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberProp::Named(name),
                    optional: false,
                    span: Span::new(start, self.prev_end),
                };
            } else if self.eat_punct("[")? {
                let prop = self.parse_expression()?;
                self.expect_punct("]")?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberProp::Computed(Box::new(prop)),
                    optional: false,
                    span: Span::new(start, self.prev_end),
                };
            } else {
                break;
            }
        }
        let args = if self.eat_punct("(")? {
            self.parse_args()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
            span: Span::new(start, self.prev_end),
        })
    }

    fn parse_array_literal(&mut self) -> Result<Expr, SyntaxError> {
        self.advance()?;
        let mut items = Vec::new();
        while !self.is_punct("]") {
            if self.eat_punct(",")? {
                items.push(ArrayElem::Hole);
                continue;
            }
            if self.eat_punct("...")? {
                items.push(ArrayElem::Spread(self.parse_assignment()?));
            } else {
                items.push(ArrayElem::Item(self.parse_assignment()?));
            }
            if !self.eat_punct(",")? {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(Expr::Array(items))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, SyntaxError> {
        self.advance()?;
        let mut props = Vec::new();
        while !self.is_punct("}") {
            if self.eat_punct("...")? {
                props.push(ObjectProp::Spread(self.parse_assignment()?));
            } else {
                let key_tok = self.tok.clone();
                let key = if self.eat_punct("[")? {
                    let expr = self.parse_assignment()?;
                    self.expect_punct("]")?;
                    PropKey::Computed(expr)
                } else {
                    PropKey::Named(self.property_key()?)
                };

                let value = if self.eat_punct(":")? {
                    self.parse_assignment()?
                } else if self.eat_punct("(")? {
                    let start = key_tok.span.start;
                    let (params, rest) = self.parse_params()?;
                    self.expect_punct("{")?;
                    let body = self.parse_block_body()?;
                    let name = match &key {
                        PropKey::Named(name) => Some(name.clone()),
                        PropKey::Computed(_) => None,
                    };
                    Expr::Function(Arc::new(FunctionDef {
                        name,
                        params,
                        rest,
                        body: FunctionBody::Block(body),
                        span: Span::new(start, self.prev_end),
                    }))
                } else {
                    match key_tok.kind {
                        TokenKind::Ident(name) if !is_reserved(&name) => Expr::Ident {
                            name,
                            span: key_tok.span,
                        },
                        _ => return Err(self.unexpected()),
                    }
                };
                props.push(ObjectProp::KeyValue { key, value });
            }
            if !self.eat_punct(",")? {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object(props))
    }

    fn parse_template(&mut self, open: Span) -> Result<Expr, SyntaxError> {
        self.lexer.reset(open.end);
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let mut cur = String::new();
        loop {
            match self.lexer.bump() {
                None => {
                    return Err(SyntaxError::new(
                        "Unterminated template literal",
                        Span::new(open.start, self.lexer.pos()),
                    ));
                }
                Some('`') => break,
                Some('\\') => self.lexer.read_escape(&mut cur)?,
                Some('$') if self.lexer.peek_char() == Some('{') => {
                    self.lexer.bump();
                    quasis.push(std::mem::take(&mut cur));
                    self.tok = self.lexer.next_token()?;
                    let expr = self.parse_expression()?;
                    if !self.is_punct("}") {
                        return Err(self.unexpected());
                    }
                    self.lexer.reset(self.tok.span.end);
                    exprs.push(expr);
                }
                Some('\r') => {
                    if self.lexer.peek_char() == Some('\n') {
                        self.lexer.bump();
                    }
                    cur.push('\n');
                }
                Some(c) => cur.push(c),
            }
        }
        quasis.push(cur);
        let end = self.lexer.pos();
        self.resume_at(end)?;
        Ok(Expr::Template { quasis, exprs })
    }
}

fn assign_op(p: &str) -> Option<AssignOp> {
    Some(match p {
        "=" => AssignOp::Assign,
        "+=" => AssignOp::Add,
        "-=" => AssignOp::Sub,
        "*=" => AssignOp::Mul,
        "/=" => AssignOp::Div,
        "%=" => AssignOp::Rem,
        "**=" => AssignOp::Pow,
        "&&=" => AssignOp::And,
        "||=" => AssignOp::Or,
        "??=" => AssignOp::Nullish,
        _ => return None,
    })
}

#[cfg(test)]
mod tests;
