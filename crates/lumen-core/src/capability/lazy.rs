//! Asynchronously loaded modules (the compiler, heavy capabilities).
//!
//! A `Lazy` starts empty and is filled by the first successful `load()`; clones share the cell,
//! so a module is fetched at most once per process no matter how many blocks need it. Callers
//! that arrive while a load is in flight await that same load. A failed load leaves the cell
//! empty and the next `load()` tries again.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to load {module}: {message}")]
pub struct LoadError {
    pub module: String,
    pub message: String,
}

impl LoadError {
    pub fn new(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            message: message.into(),
        }
    }
}

type Loader<T> = dyn Fn() -> BoxFuture<'static, Result<T, LoadError>> + Send + Sync;

type InFlight = Shared<BoxFuture<'static, Result<(), LoadError>>>;

struct Inner<T> {
    name: String,
    loader: Box<Loader<T>>,
    cell: OnceLock<T>,
    in_flight: Mutex<Option<InFlight>>,
    attempts: AtomicUsize,
}

impl<T> Inner<T> {
    fn clear_in_flight(&self) {
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

pub struct Lazy<T>(Arc<Inner<T>>);

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("name", &self.0.name)
            .field("loaded", &self.0.cell.get().is_some())
            .field("attempts", &self.0.attempts.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T: Send + Sync + 'static> Lazy<T> {
    pub fn new<F, Fut>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, LoadError>> + Send + 'static,
    {
        Self(Arc::new(Inner {
            name: name.into(),
            loader: Box::new(move || -> BoxFuture<'static, Result<T, LoadError>> {
                Box::pin(loader())
            }),
            cell: OnceLock::new(),
            in_flight: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        }))
    }

    /// An already-loaded module.
    pub fn ready(name: impl Into<String>, value: T) -> Self {
        let lazy = Self::new(name, || async {
            Err(LoadError::new("<ready>", "module is preloaded"))
        });
        let _ = lazy.0.cell.set(value);
        lazy
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn get(&self) -> Option<&T> {
        self.0.cell.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.0.cell.get().is_some()
    }

    /// How many times the loader has been started.
    pub fn attempts(&self) -> usize {
        self.0.attempts.load(Ordering::Relaxed)
    }

    pub async fn load(&self) -> Result<&T, LoadError> {
        if let Some(value) = self.0.cell.get() {
            return Ok(value);
        }
        self.in_flight().await?;
        self.0
            .cell
            .get()
            .ok_or_else(|| LoadError::new(self.0.name.clone(), "module was not stored"))
    }

    /// The load currently running, or a new one.
    fn in_flight(&self) -> InFlight {
        let mut slot = self
            .0
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(load) = slot.as_ref() {
            return load.clone();
        }
        let attempt = self.0.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(module = %self.0.name, attempt, "loading module");
        let inner = Arc::clone(&self.0);
        let load = async move {
            let result = match (inner.loader)().await {
                Ok(value) => {
                    let _ = inner.cell.set(value);
                    Ok(())
                }
                Err(err) => {
                    tracing::warn!(
                        module = %inner.name,
                        attempt,
                        error = %err,
                        "module load failed"
                    );
                    Err(err)
                }
            };
            inner.clear_in_flight();
            result
        }
        .boxed()
        .shared();
        *slot = Some(load.clone());
        load
    }
}
