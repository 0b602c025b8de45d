//! Engine: the connection factory
//!
//! An [`Engine`] pairs an [`EngineConfig`] with a driver [`Connector`]. It is
//! immutable once built and cheap to clone. One engine per process can be
//! installed with [`initialize`] or [`create_engine`]; operations that run
//! outside any scope use it to open their connection.

mod config;

pub use config::{EngineConfig, EngineConfigBuilder, DEFAULT_HOST, DEFAULT_PORT};

use crate::driver::{Connector, PhysicalConnection};
use crate::query::Placeholder;
use crate::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

static GLOBAL_ENGINE: OnceLock<Engine> = OnceLock::new();

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Connection factory shared by every execution context
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

struct Inner {
    id: u64,
    config: EngineConfig,
    connector: Box<dyn Connector>,
}

impl Engine {
    /// Create an engine from configuration and a driver connector
    pub fn new(config: EngineConfig, connector: impl Connector) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
                config,
                connector: Box::new(connector),
            }),
        }
    }

    /// Process-unique engine id, used in logs
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Configuration handed to the driver
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Native placeholder style of the driver
    pub fn placeholder(&self) -> Placeholder {
        self.inner.connector.placeholder()
    }

    /// Open a new physical connection
    pub fn connect(&self) -> Result<Box<dyn PhysicalConnection>> {
        match self.inner.connector.connect(&self.inner.config) {
            Ok(conn) => {
                crate::metrics::counters::connection_opened();
                tracing::debug!(
                    engine = self.id(),
                    address = %self.inner.config.address(),
                    "opened physical connection"
                );
                Ok(conn)
            }
            Err(e) => {
                crate::metrics::counters::connection_failed();
                tracing::debug!(engine = self.id(), error = %e, "connect failed");
                Err(Error::Connection(e))
            }
        }
    }

    /// Whether both handles refer to the same engine
    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` inside a connection scope on this engine
    ///
    /// See [`crate::with_connection`]; the only difference is that an
    /// uninitialized context is bound to this engine instead of the global one.
    pub fn with_connection<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<Error>,
    {
        crate::scope::run_with_connection(Some(self), f)
    }

    /// Run `f` inside a transaction scope on this engine
    ///
    /// See [`crate::with_transaction`].
    pub fn with_transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<Error>,
    {
        crate::scope::run_with_transaction(Some(self), f)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.inner.id)
            .field("user", &self.inner.config.user)
            .field("database", &self.inner.config.database)
            .field("address", &self.inner.config.address())
            .field("placeholder", &self.placeholder())
            .finish()
    }
}

/// Install the process-wide engine
///
/// Fails with [`Error::AlreadyInitialized`] if an engine is already installed.
pub fn initialize(engine: Engine) -> Result<()> {
    let id = engine.id();
    GLOBAL_ENGINE
        .set(engine)
        .map_err(|_| Error::AlreadyInitialized("engine"))?;
    tracing::info!(engine = id, "initialized engine");
    Ok(())
}

/// Build an engine and install it as the process-wide engine
pub fn create_engine(config: EngineConfig, connector: impl Connector) -> Result<Engine> {
    let engine = Engine::new(config, connector);
    initialize(engine.clone())?;
    Ok(engine)
}

/// The process-wide engine
pub fn global() -> Result<Engine> {
    GLOBAL_ENGINE
        .get()
        .cloned()
        .ok_or(Error::NotInitialized("engine"))
}

/// Whether a process-wide engine is installed
pub fn is_initialized() -> bool {
    GLOBAL_ENGINE.get().is_some()
}
