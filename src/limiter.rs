//! Concurrency limiting for network operations
//!
//! The ConcurrencyLimiter bounds how many requests are outstanding at once across every
//! fetch task of a run. It is handed to each task explicitly rather than living in a global.

use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Permit pool shared by all fetch tasks
///
/// Cloning is cheap and every clone draws from the same pool.
///
/// # Examples
///
/// ```
/// use pepe_pin::limiter::ConcurrencyLimiter;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = ConcurrencyLimiter::new(2)?;
/// let permit = limiter.acquire().await?;
/// assert_eq!(limiter.available(), 1);
/// drop(permit);
/// assert_eq!(limiter.available(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Admission for one network operation
///
/// The slot returns to the pool when the permit is dropped, on success, error or
/// cancellation alike.
#[must_use = "the permit is released as soon as it is dropped"]
#[derive(Debug)]
pub struct Permit {
    _inner: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `capacity` concurrent operations
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `capacity` is zero or exceeds what the
    /// underlying semaphore supports.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(Error::config(
                "fetch.max_concurrency",
                format!(
                    "concurrency must be between 1 and {}",
                    Semaphore::MAX_PERMITS
                ),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait until a permit is free and take it
    pub async fn acquire(&self) -> Result<Permit> {
        let inner = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            // The semaphore is never closed while a limiter handle exists.
            .map_err(|_| Error::Interrupted)?;
        Ok(Permit { _inner: inner })
    }

    /// Configured maximum number of concurrent operations
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}
