//! A connection slot pool (§4.5): caps how many requests a transport may
//! have in flight at once. Modeled as a counting semaphore rather than a
//! literal pool of sockets, since the actual connections are owned by the
//! HTTP client underneath the transport; this just throttles concurrency.

use std::sync::Arc;

use tablestore_api::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

pub struct ConnectionPool {
    semaphore: Arc<Semaphore>,
}

/// Held for the lifetime of one in-flight call; releases its slot on drop.
pub struct ConnectionPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl ConnectionPool {
    pub fn new(max_in_flight: usize) -> Self {
        assert!(max_in_flight > 0, "connection pool must allow at least one slot");
        ConnectionPool { semaphore: Arc::new(Semaphore::new(max_in_flight)) }
    }

    /// Waits for a free slot. Only fails if the pool has been shut down,
    /// which this type never does on its own, so this is effectively
    /// infallible in practice; it returns `Result` to match every other
    /// fallible collaborator the pipeline awaits.
    pub async fn acquire(&self) -> Result<ConnectionPermit<'_>, Error> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::no_available_connection("connection pool closed"))?;
        Ok(ConnectionPermit { _permit: permit })
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
