//! Named bounded-concurrency gates, one per external host.
//!
//! Each pool is a FIFO-fair [`tokio::sync::Semaphore`] with a fixed
//! capacity. Acquisition returns a [`PoolPermit`] that releases its slot when
//! dropped, so every exit path (commit, failure, cancellation, panic unwind)
//! gives the slot back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use mf_core::config::PoolConfig;
use mf_core::{Error, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

struct Pool {
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

/// Fixed set of named resource pools, built once at startup.
#[derive(Default)]
pub struct ResourcePools {
    pools: HashMap<String, Pool>,
}

impl ResourcePools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a pool. A zero capacity is raised to one.
    pub fn with_pool(mut self, name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        self.pools.insert(
            name.into(),
            Pool {
                capacity,
                semaphore: Arc::new(Semaphore::new(capacity)),
            },
        );
        self
    }

    /// Build pools from configuration.
    pub fn from_config(configs: &[PoolConfig]) -> Self {
        configs
            .iter()
            .fold(Self::new(), |pools, cfg| pools.with_pool(cfg.name.clone(), cfg.capacity))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    pub fn capacity(&self, name: &str) -> Option<usize> {
        self.pools.get(name).map(|p| p.capacity)
    }

    /// Number of slots currently held.
    pub fn in_use(&self, name: &str) -> Option<usize> {
        self.pools
            .get(name)
            .map(|p| p.capacity - p.semaphore.available_permits())
    }

    /// Wait for a slot in `name`.
    ///
    /// Suspends while the pool is saturated. Returns [`Error::Cancelled`] if
    /// `cancellation` fires first and [`Error::NotFound`] for unknown pools.
    pub async fn acquire(&self, name: &str, cancellation: &CancellationToken) -> Result<PoolPermit> {
        let pool = self
            .pools
            .get(name)
            .ok_or_else(|| Error::not_found("resource pool", name))?;

        let semaphore = pool.semaphore.clone();
        let permit = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(Error::Cancelled),
            permit = semaphore.acquire_owned() => permit
                .map_err(|_| Error::Internal(format!("resource pool '{name}' closed")))?,
        };

        tracing::trace!(pool = name, "Acquired pool slot");

        Ok(PoolPermit {
            pool: name.to_string(),
            acquired_at: Instant::now(),
            _permit: permit,
        })
    }
}

/// A held slot in a resource pool. Dropping it releases the slot.
pub struct PoolPermit {
    pool: String,
    acquired_at: Instant,
    _permit: OwnedSemaphorePermit,
}

impl PoolPermit {
    pub fn pool(&self) -> &str {
        &self.pool
    }
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        tracing::trace!(
            pool = %self.pool,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Released pool slot"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    #[tokio::test]
    async fn unknown_pool_is_not_found() {
        let pools = ResourcePools::new();
        let token = CancellationToken::new();
        let err = pools.acquire("nope", &token).await.err().unwrap();
        assert_matches!(err, Error::NotFound { .. });
    }

    #[tokio::test]
    async fn permits_are_released_on_drop() {
        let pools = ResourcePools::new().with_pool("fanart", 2);
        let token = CancellationToken::new();

        let a = pools.acquire("fanart", &token).await.unwrap();
        let b = pools.acquire("fanart", &token).await.unwrap();
        assert_eq!(pools.in_use("fanart"), Some(2));
        assert_eq!(a.pool(), "fanart");

        drop(a);
        assert_eq!(pools.in_use("fanart"), Some(1));
        drop(b);
        assert_eq!(pools.in_use("fanart"), Some(0));
    }

    #[tokio::test]
    async fn saturated_pool_suspends_until_release() {
        let pools = Arc::new(ResourcePools::new().with_pool("slow", 1));
        let token = CancellationToken::new();
        let held = pools.acquire("slow", &token).await.unwrap();

        let waiter = {
            let pools = pools.clone();
            let token = token.clone();
            tokio::spawn(async move { pools.acquire("slow", &token).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn cancellation_interrupts_waiting() {
        let pools = ResourcePools::new().with_pool("slow", 1);
        let token = CancellationToken::new();
        let _held = pools.acquire("slow", &token).await.unwrap();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });

        let err = pools.acquire("slow", &token).await.err().unwrap();
        assert_matches!(err, Error::Cancelled);
        assert_eq!(pools.in_use("slow"), Some(1));
    }

    #[test]
    fn from_config_raises_zero_capacity() {
        let pools = ResourcePools::from_config(&[
            PoolConfig { name: "fanart".into(), capacity: 0 },
            PoolConfig { name: "tvdb".into(), capacity: 3 },
        ]);
        assert_eq!(pools.capacity("fanart"), Some(1));
        assert_eq!(pools.capacity("tvdb"), Some(3));
        assert!(pools.contains("tvdb"));
        assert!(!pools.contains("tmdb"));
    }
}
