//! Connection scope guard

use crate::connection::context::{try_with_current, with_current};
use crate::connection::ExecutionContext;
use crate::engine::{self, Engine};
use crate::Result;
use std::marker::PhantomData;

/// Guard that keeps this thread's execution context initialized
///
/// The first scope on a thread initializes the context and owns it; scopes
/// entered while it is active reuse the same connection and leave it alone on
/// exit. Only the owning scope closes the physical connection, either through
/// [`close`](Self::close) or when dropped.
///
/// ```
/// use scopedb::driver::memory::{Event, MemoryConnector};
/// use scopedb::{ConnectionScope, Engine, EngineConfig};
///
/// let driver = MemoryConnector::new();
/// let engine = Engine::new(EngineConfig::new("test", "root"), driver.clone());
///
/// let outer = ConnectionScope::enter_on(&engine)?;
/// {
///     let inner = ConnectionScope::enter_on(&engine)?;
///     assert!(!inner.owns_connection());
///     scopedb::update("update user set name = ? where id = ?", &scopedb::params!["a", 1])?;
/// }
/// scopedb::update("delete from user where id = ?", &scopedb::params![2])?;
/// outer.close()?;
///
/// assert_eq!(driver.count(|e| matches!(e, Event::Connect { .. })), 1);
/// assert_eq!(driver.count(|e| matches!(e, Event::Close { .. })), 1);
/// # Ok::<(), scopedb::Error>(())
/// ```
#[derive(Debug)]
pub struct ConnectionScope {
    owns: bool,
    // The guard refers to thread-local state and must stay on its thread
    _not_send: PhantomData<*const ()>,
}

impl ConnectionScope {
    /// Enter a scope, initializing the context from the process-wide engine if needed
    ///
    /// Fails with [`crate::Error::NotInitialized`] when the context is inactive
    /// and no engine has been installed.
    pub fn enter() -> Result<Self> {
        Self::acquire(None)
    }

    /// Enter a scope, initializing the context from `engine` if needed
    pub fn enter_on(engine: &Engine) -> Result<Self> {
        Self::acquire(Some(engine))
    }

    pub(crate) fn acquire(engine: Option<&Engine>) -> Result<Self> {
        let owns = with_current(|ctx| -> Result<bool> {
            if ctx.is_initialized() {
                if let (Some(requested), Some(bound)) = (engine, ctx.engine()) {
                    if !requested.ptr_eq(bound) {
                        tracing::warn!(
                            requested = requested.id(),
                            bound = bound.id(),
                            "context already bound to another engine, reusing it"
                        );
                    }
                }
                return Ok(false);
            }
            let engine = match engine {
                Some(engine) => engine.clone(),
                None => engine::global()?,
            };
            ctx.initialize(engine)?;
            Ok(true)
        })?;
        if owns {
            tracing::trace!("acquired execution context");
        }
        Ok(Self {
            owns,
            _not_send: PhantomData,
        })
    }

    /// Whether this scope initialized the context and will tear it down
    pub fn owns_connection(&self) -> bool {
        self.owns
    }

    /// Leave the scope, returning any error from closing the connection
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    pub(crate) fn release(&mut self) -> Result<()> {
        if !std::mem::take(&mut self.owns) {
            return Ok(());
        }
        tracing::trace!("releasing execution context");
        try_with_current(ExecutionContext::teardown).unwrap_or(Ok(()))
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            crate::metrics::counters::cleanup_failed("connection_scope");
            tracing::error!(error = %e, "failed to release connection");
        }
    }
}
