//! Tree-walking evaluator for block bodies.

use super::ast::*;
use super::environment::{AssignError, Scope, WeakScope};
use super::error::RuntimeError;
use super::host::{host_element, to_vnode};
use super::methods;
use super::value::{Closure, Invoke, Props, Value, to_int32};
use crate::capability::Component;
use crate::config::LumenConfig;
use crate::vnode::VNode;
use indexmap::IndexMap;
use std::rc::Rc;
use std::sync::Arc;

const SCOPE_PRUNE_FLOOR: usize = 4096;

/// Resource limits for one execution. Exceeding either raises a `RangeError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_call_depth: usize,
    pub max_loop_iterations: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_loop_iterations: 1_000_000,
        }
    }
}

impl Limits {
    pub fn from_config(config: &LumenConfig) -> Self {
        Self {
            max_call_depth: config.max_call_depth(),
            max_loop_iterations: config.max_loop_iterations(),
        }
    }
}

enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter {
    limits: Limits,
    depth: usize,
    iterations: usize,
    /// Call site of the innermost native/component call, used for callbacks made via [`Invoke`].
    site: Span,
    scopes: Vec<WeakScope>,
    prune_at: usize,
    retained: Vec<Value>,
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.retained.clear();
        for scope in self.scopes.drain(..) {
            scope.clear();
        }
    }
}

impl Invoke for Interpreter {
    fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let site = self.site;
        self.call_value(callee, args, site)
    }

    fn retain(&mut self, callee: Value) -> Option<usize> {
        self.retained.push(callee);
        Some(self.retained.len() - 1)
    }

    fn retained(&self, handle: usize) -> Option<Value> {
        self.retained.get(handle).cloned()
    }
}

impl Interpreter {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            depth: 0,
            iterations: 0,
            site: Span::default(),
            scopes: Vec::new(),
            prune_at: SCOPE_PRUNE_FLOOR,
            retained: Vec::new(),
        }
    }

    /// A scope tracked by this interpreter; its bindings are released when the interpreter drops.
    pub fn scope(&mut self, parent: Option<&Scope>) -> Scope {
        let scope = match parent {
            Some(parent) => parent.child(),
            None => Scope::root(),
        };
        if self.scopes.len() >= self.prune_at {
            self.scopes.retain(WeakScope::is_alive);
            self.prune_at = (self.scopes.len() * 2).max(SCOPE_PRUNE_FLOOR);
        }
        self.scopes.push(scope.downgrade());
        scope
    }

    /// Runs a statement list as a function body; yields the `return` value or `undefined`.
    pub fn run(&mut self, body: &[Stmt], scope: &Scope) -> Result<Value, RuntimeError> {
        match self.exec_block(body, scope)? {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    fn tick(&mut self, span: Span) -> Result<(), RuntimeError> {
        self.iterations += 1;
        if self.iterations > self.limits.max_loop_iterations {
            return Err(RuntimeError::range("Loop iteration limit exceeded").at(span));
        }
        Ok(())
    }

    fn exec_block(&mut self, body: &[Stmt], scope: &Scope) -> Result<Completion, RuntimeError> {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                let name = def.name.clone().unwrap_or_default();
                let closure = self.make_closure(def, scope);
                scope.declare(&name, closure, true);
            }
        }
        for stmt in body {
            match self.exec(stmt, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_nested(&mut self, stmt: &Stmt, scope: &Scope) -> Result<Completion, RuntimeError> {
        match stmt {
            Stmt::Block(body) => {
                let inner = self.scope(Some(scope));
                self.exec_block(body, &inner)
            }
            other => self.exec(other, scope),
        }
    }

    fn exec(&mut self, stmt: &Stmt, scope: &Scope) -> Result<Completion, RuntimeError> {
        match stmt {
            Stmt::Decl { kind, declarators } => {
                for decl in declarators {
                    let value = match &decl.init {
                        Some(init) => self.eval(init, scope)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(&decl.target, value, scope, *kind != DeclKind::Const)
                        .map_err(|e| e.at(decl.span))?;
                }
                Ok(Completion::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Completion::Normal),
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec_nested(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec_nested(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let loop_scope = self.scope(Some(scope));
                if let Some(init) = init {
                    self.exec(init, &loop_scope)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, &loop_scope)?.truthy() {
                            break;
                        }
                    }
                    match self.exec_nested(body, &loop_scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &loop_scope)?;
                    }
                    self.tick(expr_span(test.as_ref()))?;
                }
                Ok(Completion::Normal)
            }
            Stmt::ForOf {
                kind,
                target,
                iterable,
                body,
            } => {
                let collection = self.eval(iterable, scope)?;
                let items = iterate(&collection, iterable)?;
                for item in items {
                    let iter_scope = self.scope(Some(scope));
                    self.bind_pattern(target, item, &iter_scope, *kind != DeclKind::Const)?;
                    match self.exec_nested(body, &iter_scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    self.tick(expr_span(Some(iterable)))?;
                }
                Ok(Completion::Normal)
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec_nested(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    self.tick(expr_span(Some(test)))?;
                }
                Ok(Completion::Normal)
            }
            Stmt::Block(body) => {
                let inner = self.scope(Some(scope));
                self.exec_block(body, &inner)
            }
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Completion::Normal)
            }
            Stmt::Break(_) => Ok(Completion::Break),
            Stmt::Continue(_) => Ok(Completion::Continue),
        }
    }

    fn make_closure(&mut self, def: &Arc<FunctionDef>, scope: &Scope) -> Value {
        Value::Function(Rc::new(Closure {
            def: Arc::clone(def),
            env: scope.clone(),
        }))
    }

    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        scope: &Scope,
        mutable: bool,
    ) -> Result<(), RuntimeError> {
        match pattern {
            Pattern::Ident(name) => {
                scope.declare(name, value, mutable);
                Ok(())
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(RuntimeError::type_error(format!(
                        "Cannot destructure '{}' as it is {}.",
                        value.to_js_string(),
                        value.to_js_string()
                    )));
                }
                for prop in props {
                    let mut v = methods::get_member(&value, &prop.key)?;
                    if matches!(v, Value::Undefined) {
                        if let Some(default) = &prop.default {
                            v = self.eval(default, scope)?;
                        }
                    }
                    self.bind_pattern(&prop.value, v, scope, mutable)?;
                }
                if let Some(rest) = rest {
                    let taken: Vec<&str> = props.iter().map(|p| p.key.as_str()).collect();
                    let mut remaining = IndexMap::new();
                    if let Value::Object(map) = &value {
                        for (k, v) in map.borrow().iter() {
                            if !taken.contains(&k.as_str()) {
                                remaining.insert(k.clone(), v.clone());
                            }
                        }
                    }
                    scope.declare(rest, Value::object(remaining), mutable);
                }
                Ok(())
            }
            Pattern::Array { elements, rest } => {
                let items = match &value {
                    Value::Array(items) => items.borrow().clone(),
                    Value::String(s) => s.chars().map(|c| Value::from(c.to_string())).collect(),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "{} is not iterable",
                            other.type_of()
                        )));
                    }
                };
                let mut iter = items.into_iter();
                for element in elements {
                    let mut v = iter.next().unwrap_or_default();
                    let Some(element) = element else {
                        continue;
                    };
                    if matches!(v, Value::Undefined) {
                        if let Some(default) = &element.default {
                            v = self.eval(default, scope)?;
                        }
                    }
                    self.bind_pattern(&element.pattern, v, scope, mutable)?;
                }
                if let Some(rest) = rest {
                    self.bind_pattern(rest, Value::array(iter.collect()), scope, mutable)?;
                }
                Ok(())
            }
        }
    }

    pub fn eval(&mut self, expr: &Expr, scope: &Scope) -> Result<Value, RuntimeError> {
        Ok(match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Str(s) => Value::string(s.as_str()),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Null => Value::Null,
            Expr::Undefined => Value::Undefined,
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = exprs.get(i) {
                        out.push_str(&self.eval(expr, scope)?.to_js_string());
                    }
                }
                Value::from(out)
            }
            Expr::Ident { name, span } => scope
                .get(name)
                .ok_or_else(|| RuntimeError::not_defined(name).at(*span))?,
            Expr::Array(items) => Value::array(self.eval_elements(items, scope)?),
            Expr::Object(props) => self.eval_object(props, scope)?,
            Expr::Member { .. } | Expr::Call { .. } => {
                self.eval_chain(expr, scope)?.unwrap_or_default()
            }
            Expr::New { callee, args, span } => {
                let ctor = self.eval(callee, scope)?;
                if !matches!(ctor, Value::Native(_)) {
                    return Err(RuntimeError::type_error(format!(
                        "{} is not a constructor",
                        callee.describe()
                    ))
                    .at(*span));
                }
                let args = self.eval_elements(args, scope)?;
                self.call_value(&ctor, args, *span)?
            }
            Expr::Unary { op, arg, span } => self.eval_unary(*op, arg, scope, *span)?,
            Expr::Update {
                op,
                prefix,
                target,
                span,
            } => self.eval_update(*op, *prefix, target, scope, *span)?,
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                binary(*op, &l, &r).map_err(|e| e.at(*span))?
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(left, scope)?;
                let take_right = match op {
                    LogicalOp::And => l.truthy(),
                    LogicalOp::Or => !l.truthy(),
                    LogicalOp::Nullish => l.is_nullish(),
                };
                if take_right {
                    self.eval(right, scope)?
                } else {
                    l
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)?
                } else {
                    self.eval(alternate, scope)?
                }
            }
            Expr::Assign {
                op,
                target,
                value,
                span,
            } => self.eval_assign(*op, target, value, scope, *span)?,
            Expr::Function(def) => self.make_closure(def, scope),
            Expr::Jsx(el) => self.eval_jsx(el, scope)?,
        })
    }

    fn eval_elements(
        &mut self,
        items: &[ArrayElem],
        scope: &Scope,
    ) -> Result<Vec<Value>, RuntimeError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ArrayElem::Item(expr) => out.push(self.eval(expr, scope)?),
                ArrayElem::Spread(expr) => {
                    let value = self.eval(expr, scope)?;
                    out.extend(iterate(&value, expr)?);
                }
                ArrayElem::Hole => out.push(Value::Undefined),
            }
        }
        Ok(out)
    }

    fn eval_object(&mut self, props: &[ObjectProp], scope: &Scope) -> Result<Value, RuntimeError> {
        let mut map = IndexMap::new();
        for prop in props {
            match prop {
                ObjectProp::KeyValue { key, value } => {
                    let key = match key {
                        PropKey::Named(name) => name.clone(),
                        PropKey::Computed(expr) => self.eval(expr, scope)?.to_property_key(),
                    };
                    let value = self.eval(value, scope)?;
                    map.insert(key, value);
                }
                ObjectProp::Spread(expr) => match self.eval(expr, scope)? {
                    Value::Object(other) => {
                        for (k, v) in other.borrow().iter() {
                            map.insert(k.clone(), v.clone());
                        }
                    }
                    Value::Array(items) => {
                        for (i, v) in items.borrow().iter().enumerate() {
                            map.insert(i.to_string(), v.clone());
                        }
                    }
                    Value::String(s) => {
                        for (i, c) in s.chars().enumerate() {
                            map.insert(i.to_string(), Value::from(c.to_string()));
                        }
                    }
                    _ => {}
                },
            }
        }
        Ok(Value::object(map))
    }

    fn member_key(&mut self, property: &MemberProp, scope: &Scope) -> Result<String, RuntimeError> {
        Ok(match property {
            MemberProp::Named(name) => name.clone(),
            MemberProp::Computed(expr) => self.eval(expr, scope)?.to_property_key(),
        })
    }

    /// Member and call chains. `None` means an optional link short-circuited the whole chain.
    fn eval_chain(&mut self, expr: &Expr, scope: &Scope) -> Result<Option<Value>, RuntimeError> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
                span,
            } => {
                let Some(object) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                methods::get_member(&object, &key)
                    .map(Some)
                    .map_err(|e| e.at(*span))
            }
            Expr::Call {
                callee,
                args,
                optional,
                span,
            } => {
                let func = match callee.as_ref() {
                    Expr::Member {
                        object,
                        property,
                        optional: member_optional,
                        span: member_span,
                    } => {
                        let Some(object) = self.eval_chain(object, scope)? else {
                            return Ok(None);
                        };
                        if *member_optional && object.is_nullish() {
                            return Ok(None);
                        }
                        let key = self.member_key(property, scope)?;
                        if methods::is_builtin(&object, &key) {
                            let args = self.eval_elements(args, scope)?;
                            return methods::call_builtin(self, &object, &key, args)
                                .map(Some)
                                .map_err(|e| e.at(*span));
                        }
                        methods::get_member(&object, &key).map_err(|e| e.at(*member_span))?
                    }
                    other => match self.eval_chain(other, scope)? {
                        Some(func) => func,
                        None => return Ok(None),
                    },
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                if !func.is_callable() {
                    return Err(RuntimeError::type_error(format!(
                        "{} is not a function",
                        callee.describe()
                    ))
                    .at(*span));
                }
                let args = self.eval_elements(args, scope)?;
                self.call_value(&func, args, *span).map(Some)
            }
            other => self.eval(other, scope).map(Some),
        }
    }

    fn eval_unary(
        &mut self,
        op: UnaryOp,
        arg: &Expr,
        scope: &Scope,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        if op == UnaryOp::TypeOf {
            if let Expr::Ident { name, .. } = arg {
                if !scope.has(name) {
                    return Ok(Value::from("undefined"));
                }
            }
        }
        let value = self.eval(arg, scope).map_err(|e| e.at(span))?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::BitNot => Value::Number(f64::from(!to_int32(value.to_number()))),
            UnaryOp::TypeOf => Value::from(value.type_of()),
            UnaryOp::Void => Value::Undefined,
        })
    }

    fn read_target(&mut self, target: &Expr, scope: &Scope) -> Result<Value, RuntimeError> {
        match target {
            Expr::Ident { name, span } => scope
                .get(name)
                .ok_or_else(|| RuntimeError::not_defined(name).at(*span)),
            other => Ok(self.eval_chain(other, scope)?.unwrap_or_default()),
        }
    }

    fn write_target(
        &mut self,
        target: &Expr,
        value: Value,
        scope: &Scope,
    ) -> Result<(), RuntimeError> {
        match target {
            Expr::Ident { name, span } => scope.assign(name, value).map_err(|e| {
                match e {
                    AssignError::Undeclared => RuntimeError::not_defined(name),
                    AssignError::Constant => {
                        RuntimeError::type_error("Assignment to constant variable.")
                    }
                }
                .at(*span)
            }),
            Expr::Member {
                object,
                property,
                span,
                ..
            } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                methods::set_member(&object, &key, value).map_err(|e| e.at(*span))
            }
            _ => Err(RuntimeError::type_error("Invalid assignment target")),
        }
    }

    fn eval_update(
        &mut self,
        op: UpdateOp,
        prefix: bool,
        target: &Expr,
        scope: &Scope,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let old = self.read_target(target, scope)?.to_number();
        let new = match op {
            UpdateOp::Inc => old + 1.0,
            UpdateOp::Dec => old - 1.0,
        };
        self.write_target(target, Value::Number(new), scope)
            .map_err(|e| e.at(span))?;
        Ok(Value::Number(if prefix { new } else { old }))
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
        scope: &Scope,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let new = if op == AssignOp::Assign {
            self.eval(value, scope)?
        } else {
            let current = self.read_target(target, scope)?;
            let arithmetic = match op {
                AssignOp::Add => Some(BinaryOp::Add),
                AssignOp::Sub => Some(BinaryOp::Sub),
                AssignOp::Mul => Some(BinaryOp::Mul),
                AssignOp::Div => Some(BinaryOp::Div),
                AssignOp::Rem => Some(BinaryOp::Rem),
                AssignOp::Pow => Some(BinaryOp::Pow),
                _ => None,
            };
            match arithmetic {
                Some(bin) => {
                    let rhs = self.eval(value, scope)?;
                    binary(bin, &current, &rhs).map_err(|e| e.at(span))?
                }
                None => {
                    let assign = match op {
                        AssignOp::And => current.truthy(),
                        AssignOp::Or => !current.truthy(),
                        _ => current.is_nullish(),
                    };
                    if !assign {
                        return Ok(current);
                    }
                    self.eval(value, scope)?
                }
            }
        };
        self.write_target(target, new.clone(), scope)?;
        Ok(new)
    }

    /// Calls any callable value. Enforces the call-depth limit and records a trace frame when an
    /// error unwinds out of a script function.
    pub fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        site: Span,
    ) -> Result<Value, RuntimeError> {
        if self.depth >= self.limits.max_call_depth {
            return Err(RuntimeError::range("Maximum call stack size exceeded").at(site));
        }
        self.depth += 1;
        let saved_site = std::mem::replace(&mut self.site, site);

        let result = match callee {
            Value::Function(closure) => self.call_closure(closure, args).map_err(|mut e| {
                if e.span.is_none() {
                    e.span = Some(closure.def.span);
                }
                e.push_frame(closure.name(), site);
                e
            }),
            Value::Native(native) => native.call(self, args).map_err(|mut e| {
                if e.span.is_some() {
                    e.push_frame(native.name(), site);
                    e
                } else {
                    e.at(site)
                }
            }),
            Value::Component(component) => {
                let props = args.first().map(Props::from_object).unwrap_or_default();
                self.render_component_unchecked(component, props, Vec::new(), site)
                    .map(Value::from)
            }
            other => Err(RuntimeError::type_error(format!(
                "{} is not a function",
                other.type_of()
            ))
            .at(site)),
        };

        self.site = saved_site;
        self.depth -= 1;
        result
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let def = &closure.def;
        let scope = self.scope(Some(&closure.env));
        let mut args = args.into_iter();
        for param in &def.params {
            let mut value = args.next().unwrap_or_default();
            if matches!(value, Value::Undefined) {
                if let Some(default) = &param.default {
                    value = self.eval(default, &scope)?;
                }
            }
            self.bind_pattern(&param.pattern, value, &scope, true)?;
        }
        if let Some(rest) = &def.rest {
            self.bind_pattern(rest, Value::array(args.collect()), &scope, true)?;
        }
        match &def.body {
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
            FunctionBody::Block(body) => self.run(body, &scope),
        }
    }

    /// Renders a capability component. Counts toward the call depth like a function call.
    pub fn render_component(
        &mut self,
        component: &Arc<dyn Component>,
        props: Props,
        children: Vec<VNode>,
        site: Span,
    ) -> Result<VNode, RuntimeError> {
        if self.depth >= self.limits.max_call_depth {
            return Err(RuntimeError::range("Maximum call stack size exceeded").at(site));
        }
        self.depth += 1;
        let saved_site = std::mem::replace(&mut self.site, site);
        let result = self.render_component_unchecked(component, props, children, site);
        self.site = saved_site;
        self.depth -= 1;
        result
    }

    fn render_component_unchecked(
        &mut self,
        component: &Arc<dyn Component>,
        props: Props,
        children: Vec<VNode>,
        site: Span,
    ) -> Result<VNode, RuntimeError> {
        tracing::trace!(component = component.name(), "rendering capability component");
        component.render(self, &props, children).map_err(|mut e| {
            if e.span.is_some() {
                e.push_frame(component.name(), site);
                e
            } else {
                e.at(site)
            }
        })
    }

    fn eval_jsx(&mut self, el: &JsxElement, scope: &Scope) -> Result<Value, RuntimeError> {
        let children = self.eval_jsx_children(&el.children, scope)?;
        match &el.name {
            JsxName::Fragment => Ok(Value::from(VNode::Fragment(vnodes(&children, el.span)?))),
            JsxName::Intrinsic(tag) => {
                let props = self.eval_jsx_attrs(&el.attrs, scope)?;
                let node = host_element(tag, &props, vnodes(&children, el.span)?)
                    .map_err(|e| e.at(el.span))?;
                Ok(Value::from(node))
            }
            JsxName::Component(path) => {
                let target = self.resolve_jsx_path(path, el.span, scope)?;
                let mut props = self.eval_jsx_attrs(&el.attrs, scope)?;
                match &target {
                    Value::Component(component) => {
                        let kids = vnodes(&children, el.span)?;
                        self.render_component(component, props, kids, el.span)
                            .map(Value::from)
                    }
                    Value::Function(_) | Value::Native(_) => {
                        match children.len() {
                            0 => {}
                            1 => props.insert("children", children.into_iter().next().unwrap_or_default()),
                            _ => props.insert("children", Value::array(children)),
                        }
                        let out = self.call_value(&target, vec![props.into_object()], el.span)?;
                        to_vnode(&out).map(Value::from).map_err(|e| e.at(el.span))
                    }
                    Value::String(tag) => {
                        let node = host_element(tag, &props, vnodes(&children, el.span)?)
                            .map_err(|e| e.at(el.span))?;
                        Ok(Value::from(node))
                    }
                    other => Err(RuntimeError::type_error(format!(
                        "Element type is invalid: expected a component but got: {} (<{}>)",
                        if other.is_nullish() {
                            other.to_js_string()
                        } else {
                            other.type_of().to_string()
                        },
                        path.join(".")
                    ))
                    .at(el.span)),
                }
            }
        }
    }

    fn resolve_jsx_path(
        &mut self,
        path: &[String],
        span: Span,
        scope: &Scope,
    ) -> Result<Value, RuntimeError> {
        let Some((head, rest)) = path.split_first() else {
            return Ok(Value::Undefined);
        };
        let mut value = scope
            .get(head)
            .ok_or_else(|| RuntimeError::not_defined(head).at(span))?;
        for segment in rest {
            value = methods::get_member(&value, segment).map_err(|e| e.at(span))?;
        }
        Ok(value)
    }

    fn eval_jsx_attrs(&mut self, attrs: &[JsxAttr], scope: &Scope) -> Result<Props, RuntimeError> {
        let mut props = Props::new();
        for attr in attrs {
            match attr {
                JsxAttr::Named { name, value } => {
                    let value = match value {
                        JsxAttrValue::True => Value::Bool(true),
                        JsxAttrValue::Str(s) => Value::string(s.as_str()),
                        JsxAttrValue::Expr(expr) => self.eval(expr, scope)?,
                    };
                    props.insert(name.clone(), value);
                }
                JsxAttr::Spread(expr) => {
                    if let Value::Object(map) = self.eval(expr, scope)? {
                        for (k, v) in map.borrow().iter() {
                            props.insert(k.clone(), v.clone());
                        }
                    }
                }
            }
        }
        Ok(props)
    }

    fn eval_jsx_children(
        &mut self,
        children: &[JsxChild],
        scope: &Scope,
    ) -> Result<Vec<Value>, RuntimeError> {
        children
            .iter()
            .map(|child| match child {
                JsxChild::Text(text) => Ok(Value::string(text.as_str())),
                JsxChild::Expr(expr) => self.eval(expr, scope),
                JsxChild::Element(el) => self.eval_jsx(el, scope),
            })
            .collect()
    }
}

fn vnodes(values: &[Value], span: Span) -> Result<Vec<VNode>, RuntimeError> {
    values
        .iter()
        .map(|v| to_vnode(v).map_err(|e| e.at(span)))
        .collect()
}

fn expr_span(expr: Option<&Expr>) -> Span {
    match expr {
        Some(
            Expr::Ident { span, .. }
            | Expr::Member { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Update { span, .. },
        ) => *span,
        _ => Span::default(),
    }
}

/// Values produced by iterating `value` (`for...of`, spread).
fn iterate(value: &Value, source: &Expr) -> Result<Vec<Value>, RuntimeError> {
    match value {
        Value::Array(items) => Ok(items.borrow().clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        _ => Err(RuntimeError::type_error(format!(
            "{} is not iterable",
            source.describe()
        ))
        .at(expr_span(Some(source)))),
    }
}

/// Binary operators with JavaScript coercions.
pub fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    use BinaryOp::*;
    Ok(match op {
        Add => {
            let lp = to_primitive(l);
            let rp = to_primitive(r);
            if matches!(lp, Value::String(_)) || matches!(rp, Value::String(_)) {
                Value::from(format!("{}{}", lp.to_js_string(), rp.to_js_string()))
            } else {
                Value::Number(lp.to_number() + rp.to_number())
            }
        }
        Sub => Value::Number(l.to_number() - r.to_number()),
        Mul => Value::Number(l.to_number() * r.to_number()),
        Div => Value::Number(l.to_number() / r.to_number()),
        Rem => Value::Number(l.to_number() % r.to_number()),
        Pow => Value::Number(l.to_number().powf(r.to_number())),
        Lt | Gt | LtEq | GtEq => Value::Bool(compare(op, l, r)),
        Eq => Value::Bool(l.loose_equals(r)),
        NotEq => Value::Bool(!l.loose_equals(r)),
        StrictEq => Value::Bool(l.strict_equals(r)),
        StrictNotEq => Value::Bool(!l.strict_equals(r)),
        BitAnd => Value::Number(f64::from(to_int32(l.to_number()) & to_int32(r.to_number()))),
        BitOr => Value::Number(f64::from(to_int32(l.to_number()) | to_int32(r.to_number()))),
        BitXor => Value::Number(f64::from(to_int32(l.to_number()) ^ to_int32(r.to_number()))),
        In => {
            let key = l.to_property_key();
            match r {
                Value::Object(map) => Value::Bool(map.borrow().contains_key(&key)),
                Value::Array(items) => Value::Bool(
                    key == "length"
                        || key
                            .parse::<usize>()
                            .is_ok_and(|i| i < items.borrow().len()),
                ),
                other => {
                    return Err(RuntimeError::type_error(format!(
                        "Cannot use 'in' operator to search for '{key}' in {}",
                        other.to_js_string()
                    )));
                }
            }
        }
    })
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_)
        | Value::Object(_)
        | Value::Node(_)
        | Value::Function(_)
        | Value::Native(_)
        | Value::Component(_) => Value::from(value.to_js_string()),
        other => other.clone(),
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> bool {
    let lp = to_primitive(l);
    let rp = to_primitive(r);
    if let (Value::String(a), Value::String(b)) = (&lp, &rp) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Gt => a > b,
            BinaryOp::LtEq => a <= b,
            _ => a >= b,
        };
    }
    let (a, b) = (lp.to_number(), rp.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Gt => a > b,
        BinaryOp::LtEq => a <= b,
        _ => a >= b,
    }
}
