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

//! Connection pipeline.
//!
//! A pipeline owns a connection and runs two tasks on it. The writer takes
//! requests from the endpoint's delivery queue and writes them back to back,
//! without waiting for responses, as long as fewer than the maximum number of
//! requests are in flight. The reader reads responses in the same order, and
//! completes the corresponding tasks. If either side fails, the pipeline is
//! aborted, and every task that is still in flight fails with the same cause,
//! in order. Tasks that were taken but never written are dispatched again.
//!
//! While no request is in flight, the reader watches the connection, and
//! closes the pipeline as soon as the peer closes the connection, so it is
//! never handed requests it can't serve.

use futures_lite::future;
use futures_lite::io::{
    self, AsyncBufReadExt, BufReader, ReadHalf, WriteHalf,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Instrument, debug, debug_span, trace, warn};
use zensical_net::sync::{Latch, Promise, Queue, Semaphore};

use crate::codec::{ConnectionOptions, read_response, write_request};
use crate::error::{Error, Phase, Result, TimeoutKind};
use crate::message::{Framing, Method, Response, Status};

use super::super::connector::BoxTransport;
use super::super::task::RequestTask;
use super::super::within;
use super::Endpoint;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// State shared between the writer and reader of a pipeline.
struct Shared {
    /// Slots for requests in flight.
    limit: Semaphore,
    /// Requests in flight, in the order they were written.
    responses: Queue<InFlight>,
    /// Abort signal, released when either side fails or the pipeline ends.
    abort: Latch,
    /// Cause of the abort, recorded by whichever side failed first.
    cause: Mutex<Option<Error>>,
    /// Number of requests in flight.
    in_flight: AtomicUsize,
}

/// Next event of the reader.
enum Next {
    /// Request was written, and awaits its response.
    Response(InFlight),
    /// Bytes or end of stream arrived while no request was in flight.
    Stale(io::Result<usize>),
    /// Pipeline is done.
    Done,
}

/// Request in flight, awaiting its response.
struct InFlight {
    /// Promise of the outcome.
    promise: Promise<Result<Response>>,
    /// Request method, which determines the response framing.
    method: Method,
    /// Whether the request is the last one on the connection.
    last: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Shared {
    /// Records the cause of a failure and aborts the pipeline.
    ///
    /// Only the first cause is kept, as later failures are consequences.
    fn fail(&self, cause: Error) {
        self.cause.lock().get_or_insert(cause);
        self.abort.release();
    }

    /// Returns the cause of the abort.
    ///
    /// A pipeline that ended without a failure was closed by the peer, or
    /// after the last request, which fails requests that didn't make it.
    fn cause(&self, host: &str) -> Error {
        self.cause
            .lock()
            .get_or_insert_with(|| Error::Closed {
                host: host.to_string(),
                phase: Phase::Read,
            })
            .clone()
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Starts a pipeline on a connection, with the given task written first.
///
/// The pipeline holds a permit of the pool, which it returns once closed.
pub fn spawn(
    endpoint: &Arc<Endpoint>, transport: BoxTransport, first: RequestTask,
) {
    let size = endpoint.config.pipeline_max_size;
    let shared = Arc::new(Shared {
        limit: Semaphore::new(size),
        responses: Queue::new(size),
        abort: Latch::new(),
        cause: Mutex::new(None),
        in_flight: AtomicUsize::new(0),
    });
    let pipelines = &endpoint.counters.pipelines;
    let pipelines = 1 + pipelines.fetch_add(1, Ordering::Relaxed);
    debug!(host = %endpoint.host, pipelines, "pipeline started");

    // Run writer and reader as separate tasks on the halves of the transport
    let (reader, writer) = io::split(transport);
    let span = debug_span!("pipeline", host = %endpoint.host);
    let handle = &endpoint.handle;
    handle
        .spawn(
            write_loop(Arc::clone(endpoint), Arc::clone(&shared), writer, first)
                .instrument(span.clone()),
        )
        .detach();
    handle
        .spawn(read_loop(Arc::clone(endpoint), shared, reader).instrument(span))
        .detach();
}

// ----------------------------------------------------------------------------

/// Writes requests until the pipeline is aborted, the connection is idle
/// for the keep-alive time, or the last request was written.
async fn write_loop(
    endpoint: Arc<Endpoint>, shared: Arc<Shared>,
    mut writer: WriteHalf<BoxTransport>, first: RequestTask,
) {
    let mut next = Some(first);
    loop {
        let task = match next.take() {
            Some(task) => task,
            None => match receive(&endpoint, &shared).await {
                Some(task) => task,
                None => break,
            },
        };
        if task.is_canceled() {
            trace!("skipped canceled request");
            continue;
        }

        // Wait for a free slot, so the number of requests in flight is bounded
        let entered = future::or(
            async { shared.limit.enter().await.is_ok() },
            async {
                shared.abort.wait().await;
                false
            },
        )
        .await;
        if !entered || shared.abort.is_released() {
            endpoint.requeue(task);
            break;
        }

        // Queue the response before writing, so the reader can't miss it
        let RequestTask { request, promise } = task;
        let options = ConnectionOptions::parse(&request.headers);
        let last = options.is_last(request.version);
        let method = request.method;
        let in_flight = InFlight { promise, method, last };
        if let Err(err) = shared.responses.try_send(in_flight) {
            let InFlight { promise, .. } = err.into_inner();
            endpoint.requeue(RequestTask { request, promise });
            break;
        }
        let in_flight = 1 + shared.in_flight.fetch_add(1, Ordering::AcqRel);
        endpoint
            .counters
            .max_in_flight
            .fetch_max(in_flight, Ordering::Relaxed);

        // Write request, unless the reader failed meanwhile
        let target = &request.target;
        trace!(%method, %target, in_flight, "writing request");
        let timeout = endpoint.config.socket_timeout;
        let write = within(
            &endpoint.handle,
            timeout,
            write_request(&mut writer, &request),
        );
        let aborted = async {
            shared.abort.wait().await;
            None
        };
        match future::or(async { Some(write.await) }, aborted).await {
            Some(Ok(Ok(()))) => {}
            Some(Ok(Err(err))) => {
                let host = &endpoint.host;
                warn!(%err, "writing request failed");
                shared.fail(Error::from_io(host, Phase::Write, err.into()));
                break;
            }
            Some(Err(err)) => {
                shared.fail(endpoint.timeout(&err, TimeoutKind::Socket));
                break;
            }
            None => break,
        }
        if last {
            debug!("last request written");
            break;
        }
    }

    // The reader ends after the responses in flight, and tasks accepted on
    // behalf of this writer after it left are dispatched again
    shared.responses.close();
    endpoint.rescue();
}

/// Receives the next task, waiting at most for the keep-alive time.
async fn receive(endpoint: &Endpoint, shared: &Shared) -> Option<RequestTask> {
    let timeouts = endpoint.handle.timeouts();
    let keep_alive = endpoint.config.keep_alive_time;
    let recv = timeouts.with_timeout(keep_alive, endpoint.delivery.recv());
    let aborted = async {
        shared.abort.wait().await;
        Ok(None)
    };
    match future::or(recv, aborted).await {
        Ok(task) => task,
        Err(err) => {
            if err.is_timeout() {
                debug!("keep-alive expired");
            }
            None
        }
    }
}

/// Reads responses in order until the pipeline is aborted, the writer is
/// done and all responses were read, or the connection was closed.
async fn read_loop(
    endpoint: Arc<Endpoint>, shared: Arc<Shared>,
    reader: ReadHalf<BoxTransport>,
) {
    let mut reader = BufReader::new(reader);
    let mut watching = true;
    let failed = loop {
        let recv = async {
            shared.responses.recv().await.map_or(Next::Done, Next::Response)
        };
        let aborted = async {
            shared.abort.wait().await;
            Next::Done
        };

        // Bytes or end of stream before a request was written mean that the
        // peer closed the connection, or is about to
        let stale = async {
            if watching {
                let res = reader.fill_buf().await.map(<[u8]>::len);
                Next::Stale(res)
            } else {
                future::pending::<Next>().await
            }
        };
        let next = future::or(recv, future::or(aborted, stale)).await;
        let in_flight = match next {
            Next::Response(in_flight) => in_flight,
            Next::Done => break None,
            Next::Stale(res) => {
                // Requests are queued before they are written, so bytes are
                // only a response if a request is queued
                let bytes = matches!(res, Ok(n) if n > 0);
                if bytes && !shared.responses.is_empty() {
                    continue;
                }
                match res {
                    Ok(0) => debug!("connection closed by peer while idle"),
                    Ok(n) => warn!(bytes = n, "unsolicited bytes while idle"),
                    Err(err) => debug!(%err, "connection failed while idle"),
                }

                // Stop accepting requests, and read those already written
                shared.responses.close();
                watching = false;
                continue;
            }
        };

        // Read response, unless the writer failed meanwhile
        let timeout = endpoint.config.socket_timeout;
        let read = within(
            &endpoint.handle,
            timeout,
            read_response(&mut reader, in_flight.method, &endpoint.limits),
        );
        let aborted = async {
            shared.abort.wait().await;
            None
        };
        let res = future::or(async { Some(read.await) }, aborted).await;
        let response = match res {
            Some(Ok(Ok(response))) => response,
            Some(Ok(Err(err))) => {
                let err = Error::from_codec(&endpoint.host, Phase::Read, err);
                if let Error::Protocol { cause, .. } = &err {
                    warn!(%cause, "protocol violation");
                }
                shared.fail(err);
                break Some(in_flight);
            }
            Some(Err(err)) => {
                shared.fail(endpoint.timeout(&err, TimeoutKind::Socket));
                break Some(in_flight);
            }
            None => break Some(in_flight),
        };

        // Free the slot before completing, so the writer can continue
        shared.in_flight.fetch_sub(1, Ordering::AcqRel);
        shared.limit.leave();
        let last = in_flight.last || is_last(&response);
        trace!(status = response.status.code(), "read response");
        let _ = in_flight.promise.complete(Ok(response));
        if last {
            debug!("connection closed after response");
            break None;
        }
    };

    // Stop the writer, and return the permit before failing the remaining
    // tasks, so retries can open a new connection right away
    let cause = shared.cause(&endpoint.host);
    shared.abort.release();
    shared.responses.close();
    endpoint.pool.leave();
    let pipelines = &endpoint.counters.pipelines;
    let pipelines = pipelines.fetch_sub(1, Ordering::Relaxed) - 1;

    // Fail remaining tasks in the order they were written
    let remaining = failed.into_iter().chain(shared.responses.drain());
    let mut count = 0;
    for in_flight in remaining {
        let _ = in_flight.promise.complete(Err(cause.clone()));
        count += 1;
    }
    debug!(failed = count, pipelines, "pipeline closed");
}

/// Returns whether a response is the last one on its connection.
fn is_last(response: &Response) -> bool {
    ConnectionOptions::parse(&response.headers).is_last(response.version)
        || response.body.framing == Framing::UntilClose
        || response.status == Status::SWITCHING_PROTOCOLS
}
