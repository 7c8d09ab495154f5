//! Fixed-size backend client pool
//!
//! Checkouts are bounded by a semaphore and fair in arrival order. A
//! checkout held across a request is reclaimed when its guard drops;
//! cancellation during checkout returns `Cancelled` without consuming a
//! permit. Idle clients are reaped after a configurable quiet period.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ragweave_core::error::{RagError, Result};

use crate::backend::VectorBackend;

/// Connects new backend client handles for the pool
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Establish one client handle
    async fn connect(&self) -> Result<Arc<dyn VectorBackend>>;
}

/// Factory that hands out clones of one shared backend handle
///
/// Used with the in-memory backend, where every "connection" views the
/// same state.
pub struct SharedClientFactory {
    backend: Arc<dyn VectorBackend>,
}

impl SharedClientFactory {
    /// Wrap a backend handle
    pub fn new(backend: Arc<dyn VectorBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ClientFactory for SharedClientFactory {
    async fn connect(&self) -> Result<Arc<dyn VectorBackend>> {
        Ok(Arc::clone(&self.backend))
    }
}

struct IdleClient {
    client: Arc<dyn VectorBackend>,
    since: Instant,
}

/// Fixed-size pool of backend client handles
pub struct ConnectionPool {
    factory: Arc<dyn ClientFactory>,
    idle: Mutex<Vec<IdleClient>>,
    permits: Arc<Semaphore>,
    size: usize,
    idle_timeout: Duration,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("size", &self.size)
            .field("idle", &self.idle.lock().len())
            .finish_non_exhaustive()
    }
}

impl ConnectionPool {
    /// Create a pool of `size` checkouts backed by `factory`
    pub fn new(factory: Arc<dyn ClientFactory>, size: usize, idle_timeout: Duration) -> Self {
        Self {
            factory,
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(size)),
            size,
            idle_timeout,
        }
    }

    /// Check out a client handle, waiting for a free slot
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when the token fires first, `Capacity` when the
    /// pool has been closed, or the factory's connection error.
    pub async fn checkout(self: &Arc<Self>, cancel: &CancellationToken) -> Result<PoolGuard> {
        if cancel.is_cancelled() {
            return Err(RagError::cancelled("pool checkout cancelled"));
        }
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(RagError::cancelled("pool checkout cancelled"));
            }
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|_| RagError::capacity("connection pool is closed"))?
            }
        };

        let reused = self.idle.lock().pop();
        let client = match reused {
            Some(idle) => idle.client,
            None => {
                debug!("pool connecting a new backend client");
                self.factory.connect().await?
            }
        };

        Ok(PoolGuard {
            client: Some(client),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Drop clients idle longer than the pool's quiet period; returns how
    /// many were reaped
    pub fn reap_idle(&self) -> usize {
        let mut idle = self.idle.lock();
        let before = idle.len();
        idle.retain(|c| c.since.elapsed() < self.idle_timeout);
        let reaped = before - idle.len();
        if reaped > 0 {
            info!(reaped, "reaped idle backend clients");
        }
        reaped
    }

    /// Close the pool; outstanding guards finish, new checkouts fail
    pub fn close(&self) {
        self.permits.close();
        self.idle.lock().clear();
    }

    /// Configured pool size
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    fn return_client(&self, client: Arc<dyn VectorBackend>) {
        self.idle.lock().push(IdleClient {
            client,
            since: Instant::now(),
        });
    }
}

/// A checked-out client handle; returns to the pool on drop
pub struct PoolGuard {
    client: Option<Arc<dyn VectorBackend>>,
    pool: Arc<ConnectionPool>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PoolGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolGuard").finish_non_exhaustive()
    }
}

impl PoolGuard {
    /// The checked-out client
    #[must_use]
    pub fn client(&self) -> &Arc<dyn VectorBackend> {
        self.client
            .as_ref()
            .unwrap_or_else(|| unreachable!("client present until drop"))
    }
}

impl std::ops::Deref for PoolGuard {
    type Target = dyn VectorBackend;

    fn deref(&self) -> &Self::Target {
        self.client().as_ref()
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.return_client(client);
        }
    }
}
