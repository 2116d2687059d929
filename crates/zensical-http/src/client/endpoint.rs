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

//! Endpoint.

use futures_lite::future;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace, warn};
use zensical_net::runtime::Handle;
use zensical_net::sync::{Queue, TrySendError};

use crate::codec::{ConnectionOptions, read_response, write_request};
use crate::config::{ClientConfig, EndpointConfig, Limits};
use crate::error::{Error, Phase, Result, TimeoutKind};
use crate::message::{Framing, Request, Response, Status};

use super::connector::{BoxTransport, Connector};
use super::pool::{Connection, Pool};
use super::task::RequestTask;
use super::{Address, within};

mod pipeline;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Endpoint of a remote host.
///
/// An endpoint owns everything the client keeps per remote host: the pool,
/// which bounds the number of connections, and the delivery queue through
/// which requests are handed to pipelines. The delivery queue is a rendezvous
/// queue, so a request is only accepted by a pipeline writer that is idle at
/// that very moment. If none is, a new pipeline is started, unless the pool
/// is exhausted, in which case the request waits for whichever comes first,
/// an idle writer or a free connection.
pub struct Endpoint {
    /// Remote address.
    address: Address,
    /// Remote host, for errors and logging.
    host: String,
    /// Runtime handle.
    handle: Handle,
    /// Connector.
    connector: Arc<dyn Connector>,
    /// Endpoint configuration.
    config: EndpointConfig,
    /// Codec limits.
    limits: Limits,
    /// Connection pool.
    pool: Arc<Pool>,
    /// Delivery queue of pipelined requests.
    delivery: Queue<RequestTask>,
    /// Counters.
    counters: Counters,
}

/// Endpoint counters.
#[derive(Debug, Default)]
struct Counters {
    /// Number of connections opened.
    opened: AtomicUsize,
    /// Number of live pipelines.
    pipelines: AtomicUsize,
    /// Highest number of requests in flight on a single connection.
    max_in_flight: AtomicUsize,
}

/// Snapshot of an endpoint's counters.
///
/// # Examples
///
/// ```
/// use zensical_http::client::EndpointStats;
///
/// // Create empty snapshot
/// let stats = EndpointStats::default();
/// assert_eq!(stats.opened, 0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EndpointStats {
    /// Number of connections opened over the endpoint's lifetime.
    pub opened: usize,
    /// Number of connections in use.
    pub active: usize,
    /// Number of idle connections.
    pub idle: usize,
    /// Number of live pipelines.
    pub pipelines: usize,
    /// Highest number of requests in flight on a single connection.
    pub max_in_flight: usize,
}

/// Permit of the pool, returned on drop.
struct Permit<'a>(&'a Pool);

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(
        address: Address, handle: &Handle, connector: Arc<dyn Connector>,
        config: &ClientConfig,
    ) -> Self {
        let endpoint = &config.endpoint;
        let pool = Pool::new(
            &address.host,
            handle,
            endpoint.max_connections_per_host,
            endpoint.keep_alive_time,
            endpoint.pool_timeout,
        );
        Self {
            host: address.host.clone(),
            address,
            handle: handle.clone(),
            connector,
            config: endpoint.clone(),
            limits: config.limits,
            pool: Arc::new(pool),
            delivery: Queue::new(0),
            counters: Counters::default(),
        }
    }

    /// Executes a request.
    ///
    /// Requests that close or upgrade the connection always use a dedicated
    /// connection, and so do all requests if pipelining is disabled.
    pub async fn execute(
        self: &Arc<Self>, request: Request, pipelining: bool,
    ) -> Result<Response> {
        let options = ConnectionOptions::parse(&request.headers);
        if !pipelining || options.close || options.upgrade {
            return self.exchange(request).await;
        }

        // Hand request to a pipeline and wait for the outcome
        let (task, deferred) = RequestTask::new(request);
        self.dispatch(task).await;
        let host = &self.host;
        deferred
            .await
            .unwrap_or_else(|_| Err(Error::Canceled { host: host.clone() }))
    }

    /// Executes a request on a dedicated connection.
    ///
    /// The connection is taken from the idle set or opened, and put back
    /// after the exchange if it can be reused.
    async fn exchange(&self, request: Request) -> Result<Response> {
        self.pool.admit().await?;
        let permit = Permit(&self.pool);
        let mut connection = match self.pool.take_idle() {
            Some(connection) => connection,
            None => Connection::new(self.connect().await?),
        };

        // Write request and read response, each bounded by the socket timeout
        let timeout = self.config.socket_timeout;
        let write = write_request(&mut connection.transport, &request);
        match within(&self.handle, timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(Error::from_io(&self.host, Phase::Write, err.into()));
            }
            Err(err) => return Err(self.timeout(&err, TimeoutKind::Socket)),
        }
        let method = request.method;
        let read = read_response(&mut connection.transport, method, &self.limits);
        let response = match within(&self.handle, timeout, read).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                let err = Error::from_codec(&self.host, Phase::Read, err);
                if let Error::Protocol { cause, .. } = &err {
                    warn!(host = %self.host, %cause, "protocol violation");
                }
                return Err(err);
            }
            Err(err) => return Err(self.timeout(&err, TimeoutKind::Socket)),
        };

        // Put connection back before returning the permit, so the next task
        // that is handed the permit finds it
        if !is_last(&request, &response) && !connection.has_buffered() {
            self.pool.put_idle(connection);
        }
        drop(permit);
        Ok(response)
    }

    /// Dispatches a task to a pipeline.
    ///
    /// The task is handed to an idle pipeline writer, or to a new pipeline,
    /// if the pool has room. Otherwise, it waits within the pool timeout.
    /// Failures are delivered through the task's promise.
    fn dispatch(
        self: &Arc<Self>, task: RequestTask,
    ) -> impl Future<Output = ()> + Send + 'static {
        let endpoint = Arc::clone(self);
        async move {
            let mut slot = Some(task);
            let timeout = endpoint.config.pool_timeout;
            let res = match within(
                &endpoint.handle,
                timeout,
                endpoint.deliver(&mut slot),
            )
            .await
            {
                Ok(res) => res,
                Err(err) if err.is_timeout() => {
                    Err(Error::PoolTimeout { host: endpoint.host.clone() })
                }
                Err(_) => {
                    Err(Error::PoolClosed { host: endpoint.host.clone() })
                }
            };

            // A task that is still in the slot was either admitted, in which
            // case we hold a permit, or it failed
            let Some(task) = slot.take() else {
                return;
            };
            if let Err(err) = res {
                let _ = task.promise.complete(Err(err));
                return;
            }
            let permit = Permit(&endpoint.pool);
            match endpoint.connect().await {
                Ok(transport) => {
                    // The pipeline returns the permit once it's closed
                    mem::forget(permit);
                    pipeline::spawn(&endpoint, transport, task);
                }
                Err(err) => {
                    let _ = task.promise.complete(Err(err));
                }
            }
        }
    }

    /// Delivers the task in the slot to an idle pipeline writer, or obtains
    /// a permit to open a new connection for it.
    ///
    /// The slot is empty after the task was delivered, and still holds it if
    /// a permit was obtained or delivery failed.
    async fn deliver(&self, slot: &mut Option<RequestTask>) -> Result {
        loop {
            let Some(task) = slot.take() else {
                return Ok(());
            };
            match self.delivery.try_send(task) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(task)) => *slot = Some(task),
                Err(TrySendError::Closed(task)) => {
                    *slot = Some(task);
                    return Err(self.closed());
                }
            }
            if self.pool.try_admit() {
                return Ok(());
            }

            // Wait for a writer to become idle, or for a permit, whichever
            // comes first, and retry if the writer was taken meanwhile
            let admitted = async { self.pool.enter().await.map(|()| true) };
            let ready = async {
                if self.delivery.ready().await {
                    Ok(false)
                } else {
                    Err(self.closed())
                }
            };
            if future::or(admitted, ready).await? {
                return Ok(());
            }
        }
    }

    /// Opens a connection.
    ///
    /// Each attempt is bounded by the connect timeout. If all attempts fail,
    /// the error of the last attempt is returned.
    async fn connect(&self) -> Result<BoxTransport> {
        let mut last = None;
        for attempt in 1..=self.config.connect_attempts {
            let connect = self.connector.connect(&self.address);
            let timeout = self.config.connect_timeout;
            match within(&self.handle, timeout, connect).await {
                Ok(Ok(transport)) => {
                    let opened = &self.counters.opened;
                    let opened = 1 + opened.fetch_add(1, Ordering::Relaxed);
                    debug!(host = %self.host, attempt, opened, "connected");
                    return Ok(transport);
                }
                Ok(Err(err)) => {
                    debug!(host = %self.host, attempt, %err, "connect failed");
                    last = Some(Error::Transport {
                        host: self.host.clone(),
                        phase: Phase::Connect,
                        cause: Arc::new(err),
                    });
                }
                Err(err) if err.is_timeout() => {
                    debug!(host = %self.host, attempt, "connect timed out");
                    last = Some(self.timeout(&err, TimeoutKind::Connect));
                }
                Err(_) => {
                    return Err(Error::Canceled { host: self.host.clone() });
                }
            }
        }
        Err(last.unwrap_or(Error::Timeout {
            host: self.host.clone(),
            kind: TimeoutKind::Connect,
        }))
    }

    /// Re-dispatches tasks that were accepted on behalf of a pipeline writer
    /// which left before taking them.
    fn rescue(self: &Arc<Self>) {
        if self.delivery.receivers() > 0 {
            return;
        }
        for task in self.delivery.drain() {
            self.requeue(task);
        }
    }

    /// Dispatches a task again that was taken by a pipeline writer, but
    /// never written.
    fn requeue(self: &Arc<Self>, task: RequestTask) {
        trace!(host = %self.host, "re-dispatching request");
        self.handle.spawn(self.dispatch(task)).detach();
    }

    /// Closes the endpoint.
    ///
    /// Tasks waiting for a connection fail, and pipelines close once their
    /// requests in flight are complete.
    pub fn close(&self) {
        self.delivery.close();
        self.pool.close();
        debug!(host = %self.host, "endpoint closed");
    }

    /// Creates an error from a failed timeout.
    fn timeout(&self, err: &zensical_net::Error, kind: TimeoutKind) -> Error {
        if err.is_timeout() {
            Error::Timeout { host: self.host.clone(), kind }
        } else {
            Error::Canceled { host: self.host.clone() }
        }
    }

    /// Creates an error for a closed endpoint.
    fn closed(&self) -> Error {
        Error::PoolClosed { host: self.host.clone() }
    }

    /// Returns a snapshot of the endpoint's counters.
    #[must_use]
    pub fn stats(&self) -> EndpointStats {
        EndpointStats {
            opened: self.counters.opened.load(Ordering::Relaxed),
            active: self.pool.active(),
            idle: self.pool.idle(),
            pipelines: self.counters.pipelines.load(Ordering::Relaxed),
            max_in_flight: self.counters.max_in_flight.load(Ordering::Relaxed),
        }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Drop for Permit<'_> {
    /// Returns the permit.
    #[inline]
    fn drop(&mut self) {
        self.0.leave();
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns whether an exchange is the last one on its connection.
///
/// Besides explicit close, responses delimited by closing the connection
/// and switched protocols take over the connection.
fn is_last(request: &Request, response: &Response) -> bool {
    ConnectionOptions::parse(&request.headers).is_last(request.version)
        || ConnectionOptions::parse(&response.headers).is_last(response.version)
        || response.body.framing == Framing::UntilClose
        || response.status == Status::SWITCHING_PROTOCOLS
}
