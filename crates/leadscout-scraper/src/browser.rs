//! Browser-automation capability consumed by the pipeline.
//!
//! The crate does not bind a browser engine. It consumes "navigate, wait for
//! a selector, query elements, read text/attributes, click" as object-safe
//! traits, so any engine binding (or a test fake) can drive the pipeline.
//! [`ContextPool`] manages the one genuinely shared mutable resource: a pool
//! of reusable browser execution contexts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Opaque element locator, CSS-selector shaped. The pipeline never inspects
/// its contents; it only passes it through to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    pub fn new(selector: impl Into<String>) -> Self {
        Locator(selector.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Locator {
    fn from(selector: &str) -> Self {
        Locator::new(selector)
    }
}

/// Errors surfaced by a browser-driver binding.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The operation did not complete within its hard timeout. Treated as a
    /// soft failure by every caller.
    #[error("browser operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The page or element handle died (navigation raced ahead, detail pane
    /// re-rendered). The borrowing extraction abandons its field.
    #[error("browser context is no longer valid: {reason}")]
    ContextInvalid { reason: String },

    /// The driver process itself cannot serve requests.
    #[error("browser driver unavailable: {reason}")]
    Unavailable { reason: String },

    /// Any other single-operation failure (element not clickable, detached
    /// frame). Recoverable by retry or by skipping the operation.
    #[error("browser operation failed: {reason}")]
    Operation { reason: String },
}

/// Common query surface shared by pages and elements.
#[async_trait]
pub trait Queryable: Send + Sync {
    /// First element matching `locator` within this scope, or `None`.
    async fn query_one(&self, locator: &Locator)
        -> Result<Option<Box<dyn BrowserElement>>, DriverError>;
}

/// A live browser tab.
#[async_trait]
pub trait BrowserPage: Queryable {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Wait until any of `locators` matches, bounded by `timeout`. Returns
    /// the locator that matched first.
    async fn wait_for_any(
        &self,
        locators: &[Locator],
        timeout: Duration,
    ) -> Result<Locator, DriverError>;

    async fn query_all(&self, locator: &Locator)
        -> Result<Vec<Box<dyn BrowserElement>>, DriverError>;
}

/// A DOM element handle.
#[async_trait]
pub trait BrowserElement: Queryable {
    async fn inner_text(&self) -> Result<String, DriverError>;
    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError>;
    async fn click(&self) -> Result<(), DriverError>;
    async fn scroll_into_view(&self) -> Result<(), DriverError>;
}

/// A reusable browser execution context (isolated cookies/storage).
#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn BrowserPage>, DriverError>;

    /// Close extraneous pages and clear cookies/permissions so that no state
    /// leaks into the next borrower.
    async fn reset(&self) -> Result<(), DriverError>;
}

/// Factory for browser contexts.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_context(&self) -> Result<Box<dyn BrowserContext>, DriverError>;
}

struct PooledContext {
    context: Box<dyn BrowserContext>,
    /// Set when the context comes back from a borrower; a dirty context is
    /// reset before it is handed out again.
    dirty: bool,
}

struct PoolShared {
    idle: Mutex<VecDeque<PooledContext>>,
    permits: Arc<Semaphore>,
}

/// Bounded pool of reusable browser contexts.
///
/// Contexts are created lazily up to `size`. Checkout is exception-safe: the
/// returned [`ContextGuard`] hands its context back on drop, whatever the
/// borrowing task did, and a returned context is reset before its next use.
pub struct ContextPool {
    driver: Arc<dyn BrowserDriver>,
    shared: Arc<PoolShared>,
}

impl ContextPool {
    #[must_use]
    pub fn new(driver: Arc<dyn BrowserDriver>, size: usize) -> Self {
        let size = size.max(1);
        ContextPool {
            driver,
            shared: Arc::new(PoolShared {
                idle: Mutex::new(VecDeque::with_capacity(size)),
                permits: Arc::new(Semaphore::new(size)),
            }),
        }
    }

    /// Borrow a context, waiting for a free slot if the pool is saturated.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Unavailable`] if the driver cannot create a
    /// context (and none are idle), or if the pool has been closed.
    pub async fn checkout(&self) -> Result<ContextGuard, DriverError> {
        let permit = Arc::clone(&self.shared.permits)
            .acquire_owned()
            .await
            .map_err(|_| DriverError::Unavailable {
                reason: "context pool closed".to_string(),
            })?;

        loop {
            let entry = self.shared.idle.lock().expect("pool lock").pop_front();
            match entry {
                Some(mut pooled) => {
                    if pooled.dirty {
                        if let Err(err) = pooled.context.reset().await {
                            // A context that cannot be reset is discarded
                            // rather than reused with leaked state.
                            tracing::warn!(error = %err, "discarding unresettable browser context");
                            continue;
                        }
                        pooled.dirty = false;
                    }
                    return Ok(ContextGuard {
                        entry: Some(pooled),
                        shared: Arc::clone(&self.shared),
                        _permit: permit,
                    });
                }
                None => {
                    let context = self.driver.new_context().await?;
                    return Ok(ContextGuard {
                        entry: Some(PooledContext {
                            context,
                            dirty: false,
                        }),
                        shared: Arc::clone(&self.shared),
                        _permit: permit,
                    });
                }
            }
        }
    }
}

/// RAII borrow of a pooled browser context.
pub struct ContextGuard {
    entry: Option<PooledContext>,
    shared: Arc<PoolShared>,
    _permit: OwnedSemaphorePermit,
}

impl ContextGuard {
    #[must_use]
    pub fn context(&self) -> &dyn BrowserContext {
        self.entry
            .as_ref()
            .map(|e| e.context.as_ref())
            .expect("context present until drop")
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(mut pooled) = self.entry.take() {
            pooled.dirty = true;
            self.shared.idle.lock().expect("pool lock").push_back(pooled);
        }
        // The permit drops with the guard, freeing the slot.
    }
}
