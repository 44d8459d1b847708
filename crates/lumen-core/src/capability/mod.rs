//! The closed set of named helpers generated code may use.
//!
//! A [`CapabilitySurface`] is assembled once (the builder refuses a surface missing any
//! [`CapabilityName`]), shared behind `Arc`, and never mutated afterwards. Each compiled unit gets
//! fresh script values built from it, so whatever generated code does to those values stays inside
//! that unit.

mod lazy;

pub use lazy::{Lazy, LoadError};

use crate::error::{Error, Result};
use crate::script::{Invoke, NativeFunction, Props, RuntimeError, Scope, Value};
use crate::vnode::VNode;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CapabilityName {
    Latex,
    Recharts,
    Plot,
    SyntaxHighlighter,
    #[serde(rename = "dark")]
    Dark,
    #[serde(rename = "RF")]
    Rf,
    #[serde(rename = "motion")]
    Motion,
}

impl CapabilityName {
    pub const ALL: [CapabilityName; 7] = [
        CapabilityName::Latex,
        CapabilityName::Recharts,
        CapabilityName::Plot,
        CapabilityName::SyntaxHighlighter,
        CapabilityName::Dark,
        CapabilityName::Rf,
        CapabilityName::Motion,
    ];

    /// The identifier generated code uses.
    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityName::Latex => "Latex",
            CapabilityName::Recharts => "Recharts",
            CapabilityName::Plot => "Plot",
            CapabilityName::SyntaxHighlighter => "SyntaxHighlighter",
            CapabilityName::Dark => "dark",
            CapabilityName::Rf => "RF",
            CapabilityName::Motion => "motion",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CapabilityName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::UnknownCapability {
            name: s.to_string(),
        })
    }
}

/// A renderable helper. `cx` calls back into generated code (formatters, sampled functions).
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    fn render(
        &self,
        cx: &mut dyn Invoke,
        props: &Props,
        children: Vec<VNode>,
    ) -> std::result::Result<VNode, RuntimeError>;
}

type RenderFn = dyn Fn(&mut dyn Invoke, &Props, Vec<VNode>) -> std::result::Result<VNode, RuntimeError>
    + Send
    + Sync;

/// A [`Component`] backed by a closure.
pub struct FnComponent {
    name: String,
    render: Box<RenderFn>,
}

impl Component for FnComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(
        &self,
        cx: &mut dyn Invoke,
        props: &Props,
        children: Vec<VNode>,
    ) -> std::result::Result<VNode, RuntimeError> {
        (self.render)(cx, props, children)
    }
}

pub fn component_fn<F>(name: impl Into<String>, render: F) -> Arc<dyn Component>
where
    F: Fn(&mut dyn Invoke, &Props, Vec<VNode>) -> std::result::Result<VNode, RuntimeError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnComponent {
        name: name.into(),
        render: Box::new(render),
    })
}

pub type LazyComponent = Lazy<Arc<dyn Component>>;

#[derive(Clone)]
pub enum Capability {
    Component(Arc<dyn Component>),
    Function(Arc<NativeFunction>),
    Namespace(Namespace),
    Data(serde_json::Value),
    Lazy(LazyComponent),
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Component(c) => write!(f, "Component({})", c.name()),
            Capability::Function(n) => write!(f, "Function({})", n.name()),
            Capability::Namespace(ns) => f.debug_tuple("Namespace").field(ns).finish(),
            Capability::Data(v) => f.debug_tuple("Data").field(v).finish(),
            Capability::Lazy(l) => f.debug_tuple("Lazy").field(l).finish(),
        }
    }
}

impl From<Arc<dyn Component>> for Capability {
    fn from(c: Arc<dyn Component>) -> Self {
        Capability::Component(c)
    }
}

impl From<Namespace> for Capability {
    fn from(ns: Namespace) -> Self {
        Capability::Namespace(ns)
    }
}

impl Capability {
    /// A fresh script value for one execution.
    pub fn to_value(&self) -> std::result::Result<Value, RuntimeError> {
        Ok(match self {
            Capability::Component(c) => Value::Component(Arc::clone(c)),
            Capability::Function(f) => Value::Native(Arc::clone(f)),
            Capability::Data(json) => Value::from_json(json),
            Capability::Namespace(ns) => {
                let mut map = IndexMap::with_capacity(ns.members.len());
                for (name, member) in &ns.members {
                    map.insert(name.clone(), member.to_value()?);
                }
                Value::object(map)
            }
            Capability::Lazy(lazy) => match lazy.get() {
                Some(c) => Value::Component(Arc::clone(c)),
                None => {
                    return Err(RuntimeError::error(format!(
                        "{} was used before it finished loading",
                        lazy.name()
                    )));
                }
            },
        })
    }

    fn collect_lazy(&self, out: &mut Vec<LazyComponent>) {
        match self {
            Capability::Lazy(lazy) => out.push(lazy.clone()),
            Capability::Namespace(ns) => ns.members.values().for_each(|m| m.collect_lazy(out)),
            _ => {}
        }
    }
}

/// Named members (`Recharts.LineChart`, `RF.Position`, `motion.div`).
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    members: IndexMap<String, Capability>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, member: impl Into<Capability>) -> Self {
        self.insert(name, member);
        self
    }

    pub fn component(self, component: Arc<dyn Component>) -> Self {
        let name = component.name().to_string();
        self.with(name, Capability::Component(component))
    }

    pub fn insert(&mut self, name: impl Into<String>, member: impl Into<Capability>) {
        self.members.insert(name.into(), member.into());
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.members.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Capability)> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CapabilitySurface {
    entries: IndexMap<CapabilityName, Capability>,
}

#[derive(Debug, Default)]
pub struct SurfaceBuilder {
    entries: IndexMap<CapabilityName, Capability>,
}

impl SurfaceBuilder {
    pub fn with(mut self, name: CapabilityName, capability: impl Into<Capability>) -> Self {
        self.entries.insert(name, capability.into());
        self
    }

    pub fn build(self) -> Result<CapabilitySurface> {
        let missing: Vec<&'static str> = CapabilityName::ALL
            .into_iter()
            .filter(|name| !self.entries.contains_key(name))
            .map(CapabilityName::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(Error::IncompleteSurface { missing });
        }
        let mut entries = self.entries;
        entries.sort_keys();
        Ok(CapabilitySurface { entries })
    }
}

impl CapabilitySurface {
    pub fn builder() -> SurfaceBuilder {
        SurfaceBuilder::default()
    }

    pub fn get(&self, name: CapabilityName) -> Option<&Capability> {
        self.entries.get(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CapabilityName, &Capability)> {
        self.entries.iter().map(|(name, cap)| (*name, cap))
    }

    /// Lazy modules reachable from `requested`.
    pub fn lazy_modules(&self, requested: &[CapabilityName]) -> Vec<LazyComponent> {
        let mut out = Vec::new();
        for name in requested {
            if let Some(cap) = self.entries.get(name) {
                cap.collect_lazy(&mut out);
            }
        }
        out
    }

    /// True when nothing in `requested` is still waiting for a lazy module.
    pub fn is_ready(&self, requested: &[CapabilityName]) -> bool {
        self.lazy_modules(requested).iter().all(Lazy::is_loaded)
    }

    /// Loads every lazy module `requested` reaches. Modules already loaded are not fetched again.
    pub async fn ensure_loaded(
        &self,
        requested: &[CapabilityName],
    ) -> std::result::Result<(), LoadError> {
        let modules = self.lazy_modules(requested);
        let loads = modules.iter().map(|m| async move { m.load().await.map(|_| ()) });
        futures::future::try_join_all(loads).await?;
        Ok(())
    }

    /// Declares `requested` capabilities in `scope` as fresh values.
    pub fn bind(
        &self,
        scope: &Scope,
        requested: &[CapabilityName],
    ) -> std::result::Result<(), RuntimeError> {
        for name in requested {
            if let Some(cap) = self.entries.get(name) {
                scope.declare(name.as_str(), cap.to_value()?, false);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn text_component(name: &'static str) -> Arc<dyn Component> {
        component_fn(name, move |_, _, _| Ok(VNode::text(name)))
    }

    fn full_builder() -> SurfaceBuilder {
        CapabilitySurface::builder()
            .with(CapabilityName::Latex, text_component("Latex"))
            .with(
                CapabilityName::Recharts,
                Namespace::new().component(text_component("LineChart")),
            )
            .with(
                CapabilityName::Plot,
                Capability::Lazy(Lazy::ready("Plot", text_component("Plot"))),
            )
            .with(
                CapabilityName::SyntaxHighlighter,
                text_component("SyntaxHighlighter"),
            )
            .with(
                CapabilityName::Dark,
                Capability::Data(serde_json::json!({ "color": "#fff" })),
            )
            .with(CapabilityName::Rf, Namespace::new())
    }

    #[test]
    fn names_round_trip_through_their_identifiers() {
        for name in CapabilityName::ALL {
            assert_eq!(CapabilityName::parse(name.as_str()), Some(name));
        }
        assert_eq!(CapabilityName::parse("rf"), None);
        assert!("React".parse::<CapabilityName>().is_err());
    }

    #[test]
    fn builder_rejects_incomplete_surfaces() {
        let err = full_builder().build().expect_err("motion missing");
        assert_eq!(
            err.to_string(),
            "Capability surface is incomplete; missing: motion"
        );
        assert!(
            full_builder()
                .with(CapabilityName::Motion, Namespace::new())
                .build()
                .is_ok()
        );
    }

    #[test]
    fn each_binding_is_a_fresh_value() {
        let surface = full_builder()
            .with(CapabilityName::Motion, Namespace::new())
            .build()
            .expect("surface");
        let first = Scope::root();
        let second = Scope::root();
        surface
            .bind(&first, &[CapabilityName::Dark])
            .expect("bind");
        surface
            .bind(&second, &[CapabilityName::Dark])
            .expect("bind");

        let Some(Value::Object(theme)) = first.get("dark") else {
            panic!("dark is an object");
        };
        theme
            .borrow_mut()
            .insert("color".to_string(), Value::from("#000"));

        let Some(Value::Object(untouched)) = second.get("dark") else {
            panic!("dark is an object");
        };
        assert_eq!(
            untouched.borrow().get("color").and_then(Value::as_str),
            Some("#fff")
        );
        assert!(first.get("Latex").is_none());
    }

    #[test]
    fn unloaded_lazy_capabilities_block_binding_until_loaded() {
        let plot: LazyComponent = Lazy::new("Plot", || async { Ok(text_component("Plot")) });
        let surface = full_builder()
            .with(CapabilityName::Plot, Capability::Lazy(plot.clone()))
            .with(CapabilityName::Motion, Namespace::new())
            .build()
            .expect("surface");

        let scope = Scope::root();
        assert!(!surface.is_ready(&[CapabilityName::Plot]));
        assert!(surface.bind(&scope, &[CapabilityName::Plot]).is_err());

        block_on(surface.ensure_loaded(&[CapabilityName::Plot])).expect("load");
        assert!(surface.is_ready(&[CapabilityName::Plot]));
        surface
            .bind(&scope, &[CapabilityName::Plot])
            .expect("bind after load");
        assert!(matches!(scope.get("Plot"), Some(Value::Component(_))));
        assert_eq!(plot.attempts(), 1);
    }
}
