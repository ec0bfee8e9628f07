//! Bounded pool of node connections.
//!
//! At most `max_size` connections are lent at any time; borrowers beyond
//! that wait. `initial_size` connections are opened eagerly and further ones
//! lazily through the [`ConnectionManager`]. A borrowed connection goes back
//! to the idle queue when its guard is dropped, unless it was discarded.

use std::collections::VecDeque;
use std::ops::Deref;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, trace};

use crate::error::{ChainError, ChainResult, IndexerError, IndexerResult};
use crate::ports::ConnectionManager;

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections opened at startup.
    pub initial_size: usize,
    /// Maximum connections lent at once.
    pub max_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 50,
            max_size: 100,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> IndexerResult<()> {
        if self.max_size == 0 {
            return Err(IndexerError::ConfigError(
                "pool max size must be positive".into(),
            ));
        }
        if self.initial_size > self.max_size {
            return Err(IndexerError::ConfigError(format!(
                "pool initial size ({}) exceeds max size ({})",
                self.initial_size, self.max_size
            )));
        }
        Ok(())
    }
}

pub struct NodePool<M: ConnectionManager> {
    manager: M,
    idle: Mutex<VecDeque<M::Connection>>,
    permits: Semaphore,
    max_size: usize,
}

impl<M: ConnectionManager> NodePool<M> {
    /// Create the pool and open `initial_size` connections.
    pub async fn new(manager: M, config: PoolConfig) -> ChainResult<Self> {
        let mut idle = VecDeque::with_capacity(config.initial_size);
        for _ in 0..config.initial_size {
            idle.push_back(manager.connect().await?);
        }
        debug!(
            initial = config.initial_size,
            max = config.max_size,
            "Node pool ready"
        );

        Ok(Self {
            manager,
            idle: Mutex::new(idle),
            permits: Semaphore::new(config.max_size),
            max_size: config.max_size,
        })
    }

    /// Borrow a connection, waiting while `max_size` are already lent.
    pub async fn get(&self) -> ChainResult<PooledConnection<'_, M>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ChainError::PoolClosed)?;

        let reused = self.idle.lock().pop_front();
        let conn = match reused {
            Some(conn) => conn,
            None => {
                trace!("Opening new node connection");
                self.manager.connect().await?
            }
        };

        Ok(PooledConnection {
            pool: self,
            conn: Some(conn),
            _permit: permit,
        })
    }

    /// Connections currently lent out.
    pub fn in_use(&self) -> usize {
        self.max_size - self.permits.available_permits()
    }

    /// Connections waiting in the idle queue.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Stop lending; pending and future borrows fail with [`ChainError::PoolClosed`].
    pub fn close(&self) {
        self.permits.close();
    }
}

/// A borrowed connection. Returns to the pool on drop.
pub struct PooledConnection<'a, M: ConnectionManager> {
    pool: &'a NodePool<M>,
    conn: Option<M::Connection>,
    _permit: SemaphorePermit<'a>,
}

impl<M: ConnectionManager> PooledConnection<'_, M> {
    /// Drop the connection instead of returning it to the pool.
    pub fn discard(mut self) {
        self.conn.take();
    }
}

impl<M: ConnectionManager> Deref for PooledConnection<'_, M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        // Only `discard` and `drop` take the connection, both consume the guard.
        self.conn
            .as_ref()
            .expect("pooled connection accessed after release")
    }
}

impl<M: ConnectionManager> Drop for PooledConnection<'_, M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.idle.lock().push_back(conn);
        }
    }
}
