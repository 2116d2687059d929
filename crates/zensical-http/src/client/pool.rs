// Copyright (c) 2025 Zensical and contributors

// SPDX-License-Identifier: MIT
// Third-party contributions licensed under DCO

// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to
// deal in the Software without restriction, including without limitation the
// rights to use, copy, modify, merge, publish, distribute, sublicense, and/or
// sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:

// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NON-INFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS
// IN THE SOFTWARE.

// ----------------------------------------------------------------------------

//! Connection pool.

use futures_lite::io::{AsyncBufRead, BufReader};
use parking_lot::Mutex;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Waker};
use std::time::{Duration, Instant};
use tracing::debug;
use zensical_net::runtime::Handle;
use zensical_net::sync::Semaphore;

use crate::error::{Error, Result};

use super::connector::BoxTransport;
use super::within;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Connection to a remote host.
///
/// The transport is buffered for reading, and buffered bytes belong to the
/// next response, which is why a connection is only reusable if the buffer
/// is empty after an exchange.
pub struct Connection {
    /// Buffered transport.
    pub transport: BufReader<BoxTransport>,
}

/// Connection pool of a remote host.
///
/// The pool bounds the number of connections that are in use at the same
/// time, and keeps connections that are not for the keep-alive time. Permits
/// are handed out in arrival order, and waiting for one is bounded by the
/// pool timeout. Connections in use are either leased for a single exchange,
/// or owned by a pipeline for its whole lifetime.
pub struct Pool {
    /// Remote host.
    host: String,
    /// Runtime handle.
    handle: Handle,
    /// Connections in use.
    connections: Semaphore,
    /// Connections not in use.
    idle: Mutex<Vec<Idle>>,
    /// Time after which an idle connection is closed.
    keep_alive: Duration,
    /// Timeout for waiting on a permit.
    pool_timeout: Duration,
}

/// Idle connection.
struct Idle {
    /// Connection.
    connection: Connection,
    /// Time since which the connection is idle.
    since: Instant,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Connection {
    /// Creates a connection from a transport.
    #[must_use]
    pub fn new(transport: BoxTransport) -> Self {
        Self { transport: BufReader::new(transport) }
    }

    /// Returns whether bytes beyond the last response were received.
    #[inline]
    #[must_use]
    pub fn has_buffered(&self) -> bool {
        !self.transport.buffer().is_empty()
    }

    /// Returns whether an idle connection can be reused.
    ///
    /// An idle connection must stay silent until the next request is written,
    /// so it is only healthy if reading from it would block. Bytes, end of
    /// stream or an error mean that the peer closed it, or is about to.
    #[must_use]
    pub fn is_healthy(&mut self) -> bool {
        let mut cx = Context::from_waker(Waker::noop());
        let transport = Pin::new(&mut self.transport);
        transport.poll_fill_buf(&mut cx).is_pending()
    }
}

// ----------------------------------------------------------------------------

impl Pool {
    /// Creates a pool.
    #[must_use]
    pub fn new(
        host: &str, handle: &Handle, max_connections: usize,
        keep_alive: Duration, pool_timeout: Duration,
    ) -> Self {
        Self {
            host: host.to_string(),
            handle: handle.clone(),
            connections: Semaphore::new(max_connections),
            idle: Mutex::new(Vec::new()),
            keep_alive,
            pool_timeout,
        }
    }

    /// Waits for a permit to use a connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolTimeout`] if no permit was handed over within the
    /// pool timeout, and [`Error::PoolClosed`] if the pool was closed.
    pub async fn admit(&self) -> Result {
        match within(&self.handle, self.pool_timeout, self.enter()).await {
            Ok(res) => res,
            Err(err) if err.is_timeout() => {
                Err(Error::PoolTimeout { host: self.host.clone() })
            }
            Err(_) => Err(Error::PoolClosed { host: self.host.clone() }),
        }
    }

    /// Waits for a permit without a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] if the pool was closed.
    pub async fn enter(&self) -> Result {
        let host = &self.host;
        let res = self.connections.enter().await;
        res.map_err(|_| Error::PoolClosed { host: host.clone() })
    }

    /// Attempts to obtain a permit without waiting.
    ///
    /// Fails if other tasks are waiting, so permits are handed out fairly.
    #[inline]
    pub fn try_admit(&self) -> bool {
        self.connections.try_enter()
    }

    /// Returns a permit.
    #[inline]
    pub fn leave(&self) {
        self.connections.leave();
    }

    /// Takes the most recently used idle connection that has neither expired
    /// nor been closed by the peer.
    pub fn take_idle(&self) -> Option<Connection> {
        self.evict_expired();
        let mut idle = self.idle.lock();
        while let Some(Idle { mut connection, .. }) = idle.pop() {
            if connection.is_healthy() {
                return Some(connection);
            }
            debug!(host = %self.host, "discarded closed idle connection");
        }
        None
    }

    /// Puts a connection back for reuse, scheduling its eviction.
    pub fn put_idle(self: &Arc<Self>, connection: Connection) {
        if self.connections.is_closed() {
            return;
        }
        {
            let mut idle = self.idle.lock();
            if idle.len() >= self.connections.limit() {
                return;
            }
            idle.push(Idle { connection, since: Instant::now() });
        }

        // Evict the connection once it has been idle for too long, unless it
        // was taken meanwhile, which the next eviction catches instead
        let pool = Arc::downgrade(self);
        let wait = self.handle.timeouts().wait(self.keep_alive);
        self.handle.spawn(async move {
            if wait.await.is_ok() {
                if let Some(pool) = pool.upgrade() {
                    pool.evict_expired();
                }
            }
        })
        .detach();
    }

    /// Closes all idle connections that exceeded the keep-alive time.
    pub fn evict_expired(&self) {
        let mut idle = self.idle.lock();
        let before = idle.len();
        idle.retain(|idle| idle.since.elapsed() < self.keep_alive);
        let evicted = before - idle.len();
        if evicted > 0 {
            debug!(host = %self.host, evicted, "evicted idle connections");
        }
    }

    /// Closes the pool.
    ///
    /// Waiting and future admissions fail, and idle connections are closed.
    /// Connections in use are closed once their exchanges are complete.
    pub fn close(&self) {
        self.connections.close();
        self.idle.lock().clear();
    }
}

#[allow(clippy::must_use_candidate)]
impl Pool {
    /// Returns the number of connections in use.
    #[inline]
    pub fn active(&self) -> usize {
        self.connections.visitors()
    }

    /// Returns the number of idle connections.
    #[inline]
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Returns the number of tasks waiting for a permit.
    #[inline]
    pub fn waiting(&self) -> usize {
        self.connections.waiting()
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl fmt::Debug for Pool {
    /// Formats the pool for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Pool")
            .field("host", &self.host)
            .field("active", &self.active())
            .field("idle", &self.idle())
            .field("waiting", &self.waiting())
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::AsyncWriteExt;
    use std::pin::pin;
    use std::time::Duration;
    use zensical_net::io::{DuplexStream, duplex};
    use zensical_net::runtime::Runtime;

    use super::*;

    fn connection() -> (Connection, DuplexStream) {
        let (transport, peer) = duplex(64);
        (Connection::new(Box::new(transport)), peer)
    }

    fn pool(runtime: &Runtime, limit: usize, pool_timeout: u64) -> Arc<Pool> {
        Arc::new(Pool::new(
            "example.com",
            runtime.handle(),
            limit,
            Duration::from_secs(5),
            Duration::from_millis(pool_timeout),
        ))
    }

    #[test]
    fn test_admission_times_out() {
        let runtime = Runtime::new().unwrap();
        let pool = pool(&runtime, 1, 20);
        assert!(pool.try_admit());
        let res = runtime.block_on(pool.admit());
        assert!(matches!(res, Err(Error::PoolTimeout { .. })));
        assert_eq!(pool.waiting(), 0);
    }

    #[test]
    fn test_permits_are_handed_out_in_order() {
        let runtime = Runtime::new().unwrap();
        let pool = pool(&runtime, 1, 0);
        assert!(pool.try_admit());
        runtime.block_on(async {
            let mut first = pin!(pool.admit());
            let mut second = pin!(pool.admit());
            assert!(futures_lite::future::poll_once(&mut first).await.is_none());
            assert!(futures_lite::future::poll_once(&mut second).await.is_none());

            // New arrivals can't overtake waiting tasks
            pool.leave();
            assert!(!pool.try_admit());
            assert!(first.await.is_ok());
            pool.leave();
            assert!(second.await.is_ok());
        });
    }

    #[test]
    fn test_close_fails_waiting_tasks() {
        let runtime = Runtime::new().unwrap();
        let pool = pool(&runtime, 1, 0);
        assert!(pool.try_admit());
        let (connection, _peer) = connection();
        pool.put_idle(connection);
        assert_eq!(pool.idle(), 1);
        runtime.block_on(async {
            let mut admit = pin!(pool.admit());
            assert!(futures_lite::future::poll_once(&mut admit).await.is_none());
            pool.close();
            assert!(matches!(admit.await, Err(Error::PoolClosed { .. })));
        });
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_expired_connections_are_evicted() {
        let runtime = Runtime::new().unwrap();
        let pool = Arc::new(Pool::new(
            "example.com",
            runtime.handle(),
            2,
            Duration::ZERO,
            Duration::ZERO,
        ));
        let (connection, _peer) = connection();
        pool.put_idle(connection);
        assert!(pool.take_idle().is_none());
    }

    #[test]
    fn test_closed_connections_are_discarded() {
        let runtime = Runtime::new().unwrap();
        let pool = pool(&runtime, 3, 0);
        let (healthy, _peer) = connection();
        pool.put_idle(healthy);

        // Closed by the peer, and sent bytes nobody asked for
        let (closed, peer) = connection();
        drop(peer);
        pool.put_idle(closed);
        let (chatty, mut peer) = connection();
        runtime.block_on(peer.write_all(b"HTTP/1.1")).unwrap();
        pool.put_idle(chatty);

        // Only the silent connection is handed out
        assert_eq!(pool.idle(), 3);
        let mut connection = pool.take_idle().unwrap();
        assert!(!connection.has_buffered());
        assert!(connection.is_healthy());
        assert_eq!(pool.idle(), 0);
    }
}
