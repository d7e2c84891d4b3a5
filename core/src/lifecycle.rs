//! Scoped acquisition and release of shared worker resources.
//!
//! A worker acquires its shared resources (models, pools, caches) once
//! before it starts consuming, exposes them read-only to handlers while it
//! runs, and releases them exactly once at shutdown — in reverse acquisition
//! order, whether or not setup completed.
//!
//! The lifecycle is an explicit two-phase manager:
//! [`LifecycleManager::enter`] populates the
//! [`LifecycleContext`] and opens its read window;
//! [`LifecycleManager::exit`] closes the window and tears down. Reading the
//! context outside that window is a [`LifecycleError::OutsideScope`]
//! programming error, surfaced at first occurrence.

use crate::error::LifecycleError;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Type-erased shared resource instance.
pub type SharedResource = Arc<dyn Any + Send + Sync>;

/// Future returned by [`Resource::acquire`].
pub type AcquireFuture<'a> =
    Pin<Box<dyn Future<Output = Result<SharedResource, LifecycleError>> + Send + 'a>>;

/// Future returned by [`Resource::release`].
pub type ReleaseFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A shared resource with scoped setup and teardown.
///
/// Declared on the application; acquired per worker. Uses explicit boxed
/// futures so resource lists can be held as `Vec<Arc<dyn Resource>>`.
pub trait Resource: Send + Sync {
    /// Name handlers use to look the resource up in the context.
    fn name(&self) -> &str;

    /// Acquire one instance of the resource.
    ///
    /// A failure here aborts worker startup entirely; it is never retried.
    fn acquire(&self) -> AcquireFuture<'_>;

    /// Release a previously acquired instance.
    ///
    /// Called exactly once per successful [`Resource::acquire`], in reverse
    /// acquisition order.
    fn release(&self, instance: SharedResource) -> ReleaseFuture<'_>;
}

/// Window state of a [`LifecycleContext`].
const SCOPE_PENDING: u8 = 0;
const SCOPE_OPEN: u8 = 1;
const SCOPE_CLOSED: u8 = 2;

/// Read-only view of acquired resources, handed to every handler invocation.
///
/// Populated during `enter()`, readable only between `enter()` completing
/// and `exit()` beginning. The context itself is the only object shared
/// across handler invocations within one worker; it is never written during
/// the running phase, so handlers need no locking.
pub struct LifecycleContext {
    entries: RwLock<HashMap<String, SharedResource>>,
    scope: AtomicU8,
}

impl std::fmt::Debug for LifecycleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleContext")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl LifecycleContext {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            scope: AtomicU8::new(SCOPE_PENDING),
        }
    }

    fn insert(&self, name: &str, instance: SharedResource) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(name.to_string(), instance);
        }
    }

    fn open(&self) {
        self.scope.store(SCOPE_OPEN, Ordering::SeqCst);
    }

    fn close(&self) {
        self.scope.store(SCOPE_CLOSED, Ordering::SeqCst);
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Read a resource by name, downcast to its concrete type.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::OutsideScope`] outside the enter/exit window
    /// - [`LifecycleError::MissingResource`] for an unknown name
    /// - [`LifecycleError::TypeMismatch`] when the stored instance is not a `T`
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, LifecycleError> {
        if self.scope.load(Ordering::SeqCst) != SCOPE_OPEN {
            return Err(LifecycleError::OutsideScope {
                resource: name.to_string(),
            });
        }
        let entries = self.entries.read().map_err(|_| LifecycleError::OutsideScope {
            resource: name.to_string(),
        })?;
        let instance = entries
            .get(name)
            .ok_or_else(|| LifecycleError::MissingResource {
                resource: name.to_string(),
            })?;
        Arc::clone(instance)
            .downcast::<T>()
            .map_err(|_| LifecycleError::TypeMismatch {
                resource: name.to_string(),
            })
    }
}

/// Two-phase resource manager owned by one worker.
///
/// `enter()` acquires every declared resource in order; `exit()` releases
/// every *acquired* resource in reverse order, exactly once, even when
/// `enter()` failed after acquiring a subset.
pub struct LifecycleManager {
    resources: Vec<Arc<dyn Resource>>,
    context: Arc<LifecycleContext>,
    acquired: Mutex<Vec<(Arc<dyn Resource>, SharedResource)>>,
}

impl LifecycleManager {
    /// Create a manager over the declared resource list.
    #[must_use]
    pub fn new(resources: Vec<Arc<dyn Resource>>) -> Self {
        Self {
            resources,
            context: Arc::new(LifecycleContext::new()),
            acquired: Mutex::new(Vec::new()),
        }
    }

    /// Run the setup phase and open the context's read window.
    ///
    /// # Errors
    ///
    /// Propagates the first acquisition failure as
    /// [`LifecycleError::SetupFailed`]. Resources acquired before the
    /// failure stay tracked and are released by the next [`Self::exit`]
    /// call; the read window is never opened.
    pub async fn enter(&self) -> Result<Arc<LifecycleContext>, LifecycleError> {
        for resource in &self.resources {
            let name = resource.name().to_string();
            tracing::debug!(resource = %name, "acquiring lifecycle resource");
            match resource.acquire().await {
                Ok(instance) => {
                    self.context.insert(&name, Arc::clone(&instance));
                    self.acquired
                        .lock()
                        .await
                        .push((Arc::clone(resource), instance));
                }
                Err(e) => {
                    tracing::error!(resource = %name, error = %e, "lifecycle setup failed");
                    return Err(LifecycleError::SetupFailed {
                        resource: name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.context.open();
        tracing::info!(resources = self.resources.len(), "lifecycle setup complete");
        Ok(Arc::clone(&self.context))
    }

    /// Run the teardown phase.
    ///
    /// Closes the context's read window, then releases every acquired
    /// resource in reverse acquisition order. Safe to call whether or not
    /// `enter()` completed, and idempotent: a second call finds nothing
    /// left to release.
    pub async fn exit(&self) {
        self.context.close();
        let mut acquired = self.acquired.lock().await;
        while let Some((resource, instance)) = acquired.pop() {
            tracing::debug!(resource = %resource.name(), "releasing lifecycle resource");
            resource.release(instance).await;
        }
    }

    /// The context this manager populates.
    ///
    /// Reads fail with [`LifecycleError::OutsideScope`] until `enter()`
    /// completes.
    #[must_use]
    pub fn context(&self) -> Arc<LifecycleContext> {
        Arc::clone(&self.context)
    }
}
