//! Deferred engine initialization
//!
//! The optional heavy backend must not pay its startup cost unless a
//! repository actually touches it. [`LazyEngine`] defers an async init to
//! first use and memoizes the in-flight future: concurrent first uses share
//! one pending init instead of triggering duplicates. A failed init is
//! surfaced to every waiter and may be retried by the next caller.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use stratum_domain::error::Result;

type InitFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<T>>> + Send + Sync>;

/// Memoized one-time async initialization of an engine resource
pub struct LazyEngine<T: Send + Sync + 'static> {
    cell: OnceCell<Arc<T>>,
    init: InitFn<T>,
}

impl<T: Send + Sync + 'static> LazyEngine<T> {
    /// Defer `init` until the first call to [`get`](Self::get)
    pub fn new<F, Fut>(init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Arc<T>>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(move || -> BoxFuture<'static, Result<Arc<T>>> { Box::pin(init()) }),
        }
    }

    /// Wrap an already-initialized resource; `get` never runs an init
    pub fn ready(value: Arc<T>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(value)),
            init: Box::new(|| -> BoxFuture<'static, Result<Arc<T>>> {
                Box::pin(async {
                    Err(stratum_domain::Error::internal(
                        "lazy engine init called after ready()",
                    ))
                })
            }),
        }
    }

    /// Get the resource, running the init exactly once on first use
    pub async fn get(&self) -> Result<Arc<T>> {
        self.cell
            .get_or_try_init(|| (self.init)())
            .await
            .map(Arc::clone)
    }

    /// Whether the init has already completed successfully
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for LazyEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyEngine")
            .field("initialized", &self.cell.initialized())
            .finish_non_exhaustive()
    }
}
