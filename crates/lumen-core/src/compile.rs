//! Runtime compilation of normalized block text into an instantiable unit.
//!
//! The block text is the body of a function whose only parameter destructures the capability
//! names it uses: `({ Latex, RF }) => { <block text> }`. Compiling parses the body once;
//! instantiating binds those names from a surface and runs it.

use crate::capability::{CapabilityName, CapabilitySurface};
use crate::config::LumenConfig;
use crate::normalize::NormalizedSource;
use crate::script::ast::*;
use crate::script::host::to_vnode;
use crate::script::{
    Interpreter, Limits, RuntimeError, SyntaxError, Value, intrinsics, parse_program,
};
use crate::vnode::VNode;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    limits: Limits,
}

impl Compiler {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn from_config(config: &LumenConfig) -> Self {
        Self::new(Limits::from_config(config))
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn compile(&self, source: &NormalizedSource) -> Result<CompiledUnit, SyntaxError> {
        let program = parse_program(source.as_str())?;
        let identifiers = free_identifiers(&program);
        let requested: Vec<CapabilityName> = CapabilityName::ALL
            .into_iter()
            .filter(|name| identifiers.contains(name.as_str()))
            .collect();
        tracing::debug!(
            statements = program.body.len(),
            capabilities = ?requested,
            "compiled block"
        );
        Ok(CompiledUnit {
            source: source.clone(),
            program,
            requested,
            limits: self.limits,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledUnit {
    source: NormalizedSource,
    program: Program,
    requested: Vec<CapabilityName>,
    limits: Limits,
}

impl CompiledUnit {
    pub fn source(&self) -> &NormalizedSource {
        &self.source
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Capability names the body references, in surface order.
    pub fn capabilities_requested(&self) -> &[CapabilityName] {
        &self.requested
    }

    /// The wrapper's parameter pattern, e.g. `{ Latex, RF }`.
    pub fn parameter_list(&self) -> String {
        let names: Vec<&str> = self.requested.iter().map(|n| n.as_str()).collect();
        format!("{{ {} }}", names.join(", "))
    }

    /// Runs the body with the requested capabilities bound and turns its result into a tree.
    ///
    /// A returned component (a function or capability component) is rendered with empty props.
    pub fn instantiate(&self, surface: &CapabilitySurface) -> Result<VNode, RuntimeError> {
        let mut interp = Interpreter::new(self.limits);
        let globals = interp.scope(None);
        intrinsics::install(&globals);
        let params = interp.scope(Some(&globals));
        surface.bind(&params, &self.requested)?;
        let body = interp.scope(Some(&params));

        let mut value = interp.run(&self.program.body, &body)?;
        if value.is_callable() {
            value = interp.call_value(&value, vec![Value::object(IndexMap::new())], Span::default())?;
        }
        if matches!(value, Value::Undefined) {
            return Err(RuntimeError::type_error(
                "Nothing was returned from the block. Return an element, text or a component.",
            ));
        }
        to_vnode(&value)
    }
}

/// Identifiers read anywhere in the program (over-approximates free variables: shadowing is
/// ignored, which can only add names).
fn free_identifiers(program: &Program) -> FxHashSet<String> {
    let mut out = FxHashSet::default();
    for stmt in &program.body {
        walk_stmt(stmt, &mut out);
    }
    out
}

fn walk_stmt(stmt: &Stmt, out: &mut FxHashSet<String>) {
    match stmt {
        Stmt::Decl { declarators, .. } => {
            for decl in declarators {
                walk_pattern(&decl.target, out);
                if let Some(init) = &decl.init {
                    walk_expr(init, out);
                }
            }
        }
        Stmt::Function(def) => walk_function(def, out),
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                walk_expr(value, out);
            }
        }
        Stmt::If {
            test,
            consequent,
            alternate,
        } => {
            walk_expr(test, out);
            walk_stmt(consequent, out);
            if let Some(alternate) = alternate {
                walk_stmt(alternate, out);
            }
        }
        Stmt::For {
            init,
            test,
            update,
            body,
        } => {
            if let Some(init) = init {
                walk_stmt(init, out);
            }
            for expr in test.iter().chain(update.iter()) {
                walk_expr(expr, out);
            }
            walk_stmt(body, out);
        }
        Stmt::ForOf {
            target,
            iterable,
            body,
            ..
        } => {
            walk_pattern(target, out);
            walk_expr(iterable, out);
            walk_stmt(body, out);
        }
        Stmt::While { test, body } => {
            walk_expr(test, out);
            walk_stmt(body, out);
        }
        Stmt::Block(body) => body.iter().for_each(|s| walk_stmt(s, out)),
        Stmt::Expr(expr) => walk_expr(expr, out),
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty => {}
    }
}

/// Patterns only contribute their default-value expressions.
fn walk_pattern(pattern: &Pattern, out: &mut FxHashSet<String>) {
    match pattern {
        Pattern::Ident(_) => {}
        Pattern::Object { props, .. } => {
            for prop in props {
                walk_pattern(&prop.value, out);
                if let Some(default) = &prop.default {
                    walk_expr(default, out);
                }
            }
        }
        Pattern::Array { elements, rest } => {
            for element in elements.iter().flatten() {
                walk_pattern(&element.pattern, out);
                if let Some(default) = &element.default {
                    walk_expr(default, out);
                }
            }
            if let Some(rest) = rest {
                walk_pattern(rest, out);
            }
        }
    }
}

fn walk_function(def: &FunctionDef, out: &mut FxHashSet<String>) {
    for param in &def.params {
        walk_pattern(&param.pattern, out);
        if let Some(default) = &param.default {
            walk_expr(default, out);
        }
    }
    match &def.body {
        FunctionBody::Block(body) => body.iter().for_each(|s| walk_stmt(s, out)),
        FunctionBody::Expr(expr) => walk_expr(expr, out),
    }
}

fn walk_elements(items: &[ArrayElem], out: &mut FxHashSet<String>) {
    for item in items {
        match item {
            ArrayElem::Item(expr) | ArrayElem::Spread(expr) => walk_expr(expr, out),
            ArrayElem::Hole => {}
        }
    }
}

fn walk_expr(expr: &Expr, out: &mut FxHashSet<String>) {
    match expr {
        Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Null | Expr::Undefined => {}
        Expr::Template { exprs, .. } => exprs.iter().for_each(|e| walk_expr(e, out)),
        Expr::Ident { name, .. } => {
            out.insert(name.clone());
        }
        Expr::Array(items) => walk_elements(items, out),
        Expr::Object(props) => {
            for prop in props {
                match prop {
                    ObjectProp::KeyValue { key, value } => {
                        if let PropKey::Computed(key) = key {
                            walk_expr(key, out);
                        }
                        walk_expr(value, out);
                    }
                    ObjectProp::Spread(expr) => walk_expr(expr, out),
                }
            }
        }
        Expr::Member {
            object, property, ..
        } => {
            walk_expr(object, out);
            if let MemberProp::Computed(key) = property {
                walk_expr(key, out);
            }
        }
        Expr::Call { callee, args, .. } | Expr::New { callee, args, .. } => {
            walk_expr(callee, out);
            walk_elements(args, out);
        }
        Expr::Unary { arg, .. } => walk_expr(arg, out),
        Expr::Update { target, .. } => walk_expr(target, out),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            walk_expr(left, out);
            walk_expr(right, out);
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            walk_expr(test, out);
            walk_expr(consequent, out);
            walk_expr(alternate, out);
        }
        Expr::Assign { target, value, .. } => {
            walk_expr(target, out);
            walk_expr(value, out);
        }
        Expr::Function(def) => walk_function(def, out),
        Expr::Jsx(el) => walk_jsx(el, out),
    }
}

fn walk_jsx(el: &JsxElement, out: &mut FxHashSet<String>) {
    if let JsxName::Component(path) = &el.name {
        if let Some(head) = path.first() {
            out.insert(head.clone());
        }
    }
    for attr in &el.attrs {
        match attr {
            JsxAttr::Named {
                value: JsxAttrValue::Expr(expr),
                ..
            }
            | JsxAttr::Spread(expr) => walk_expr(expr, out),
            JsxAttr::Named { .. } => {}
        }
    }
    for child in &el.children {
        match child {
            JsxChild::Text(_) => {}
            JsxChild::Expr(expr) => walk_expr(expr, out),
            JsxChild::Element(child) => walk_jsx(child, out),
        }
    }
}
