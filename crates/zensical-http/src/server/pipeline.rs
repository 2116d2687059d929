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

//! Server connection pipeline.

use futures_lite::future;
use futures_lite::io::{
    self, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, trace, warn};
use zensical_net::runtime::{Handle, JoinHandle};
use zensical_net::sync::{Latch, Queue};

use crate::codec::{self, ConnectionOptions, read_request, write_response};
use crate::config::ServerConfig;
use crate::message::{Framing, Header, Method, Response, Status, Version};

use super::Handler;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Maximum number of responses waiting to be written.
const MAX_PENDING: usize = 3;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Response waiting to be written.
struct Pending {
    /// Response, or the task computing it.
    response: Outcome,
    /// Request method, which determines whether the body is written.
    method: Method,
    /// Request version.
    version: Version,
    /// Whether the request is the last one on the connection.
    last: bool,
}

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Response or the task computing it.
enum Outcome {
    /// Handler task.
    Handler(JoinHandle<Response>),
    /// Error response, which ends the connection.
    Error(Response),
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Serves a connection.
///
/// Requests are read in order, and the handler runs for each of them in a
/// task of its own, so slow requests don't hold up the ones behind them.
/// Responses are written strictly in the order of the requests, and at most
/// a few of them are pending at any time, after which reading stalls. The
/// connection is closed after the last request, after a malformed request,
/// which is answered with `400 Bad Request`, or when no request arrives
/// within the idle timeout.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use futures_lite::{AsyncReadExt, AsyncWriteExt};
/// use std::sync::Arc;
/// use zensical_http::server::serve_connection;
/// use zensical_http::{Request, Response, ServerConfig};
/// use zensical_net::io::duplex;
/// use zensical_net::runtime::Runtime;
///
/// // Serve connection over an in-memory stream
/// let runtime = Runtime::new()?;
/// let (mut client, server) = duplex(1024);
/// let handler = Arc::new(|_: Request| async { Response::new().body("hi") });
/// let config = ServerConfig::default();
/// let handle = runtime.handle().clone();
/// let task = runtime.spawn(serve_connection(handle, server, config, handler));
///
/// // Send request and read response
/// let res = runtime.block_on(async {
///     client.write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await?;
///     let mut res = String::new();
///     client.read_to_string(&mut res).await?;
///     std::io::Result::Ok(res)
/// })?;
/// assert!(res.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(res.ends_with("\r\n\r\nhi"));
/// runtime.block_on(task)?;
/// # Ok(())
/// # }
/// ```
pub async fn serve_connection<S, H>(
    handle: Handle, stream: S, config: ServerConfig, handler: Arc<H>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    H: Handler + ?Sized,
{
    let (reader, writer) = io::split(stream);
    let pending = Arc::new(Queue::new(MAX_PENDING));
    let done = Arc::new(Latch::new());

    // Write responses in a task of their own, as the reader may stall
    let writing = handle.spawn(write_loop(
        writer,
        Arc::clone(&pending),
        Arc::clone(&done),
    ));
    read_loop(&handle, reader, &config, &handler, &pending, &done).await;
    pending.close();
    let _ = writing.await;
    trace!("connection closed");
}

// ----------------------------------------------------------------------------

/// Reads requests until the last one, and dispatches them to the handler.
async fn read_loop<S, H>(
    handle: &Handle, reader: ReadHalf<S>, config: &ServerConfig,
    handler: &Arc<H>, pending: &Queue<Pending>, done: &Latch,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    H: Handler + ?Sized,
{
    let mut reader = BufReader::new(reader);
    let timeouts = handle.timeouts();
    loop {
        // Read request, unless the writer is done, which ends the connection
        let read = timeouts.with_timeout(
            config.idle_timeout,
            read_request(&mut reader, &config.limits),
        );
        let stopped = async {
            done.wait().await;
            Ok(Ok(None))
        };
        let request = match future::or(read, stopped).await {
            Ok(Ok(Some(request))) => request,
            Ok(Ok(None)) => break,
            Ok(Err(codec::Error::Parse(err))) => {
                warn!(%err, "malformed request");
                let response = Response::new()
                    .status(Status::BAD_REQUEST)
                    .body(err.to_string());
                let _ = pending
                    .send(Pending {
                        response: Outcome::Error(response),
                        method: Method::Get,
                        version: Version::Http11,
                        last: true,
                    })
                    .await;
                break;
            }
            Ok(Err(codec::Error::Io(err))) => {
                debug!(%err, "reading request failed");
                break;
            }
            Err(err) => {
                if err.is_timeout() {
                    debug!("idle timeout");
                }
                break;
            }
        };

        // Run handler in its own task, and queue the response in order
        let options = ConnectionOptions::parse(&request.headers);
        let last = options.is_last(request.version);
        let method = request.method;
        let version = request.version;
        trace!(%method, target = %request.target, "read request");
        let handler = Arc::clone(handler);
        let task = handle.spawn(async move { handler.handle(request).await });
        let response = Outcome::Handler(task);
        let next = Pending { response, method, version, last };
        if pending.send(next).await.is_err() || last {
            break;
        }
    }
}

/// Writes responses in order until the last one.
async fn write_loop<S>(
    mut writer: WriteHalf<S>, pending: Arc<Queue<Pending>>, done: Arc<Latch>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    while let Some(next) = pending.recv().await {
        let (mut response, mut last) = match next.response {
            Outcome::Handler(task) => match task.await {
                Ok(response) => (response, next.last),
                Err(err) => {
                    warn!(%err, "handler failed");
                    let status = Status::INTERNAL_SERVER_ERROR;
                    (Response::new().status(status), true)
                }
            },
            Outcome::Error(response) => (response, true),
        };

        // Answer in the version of the request, and close the connection if
        // the response is delimited by closing it
        if next.version == Version::Http10 {
            response.version = Version::Http10;
        }
        last = last
            || ConnectionOptions::parse(&response.headers)
                .is_last(response.version)
            || response.body.framing == Framing::UntilClose;
        prepare(&mut response, last);

        // Write response, and stop if it's the last one
        let status = response.status.code();
        let write = write_response(&mut writer, &response, next.method);
        if let Err(err) = write.await {
            debug!(%err, "writing response failed");
            break;
        }
        trace!(status, "wrote response");
        if last {
            break;
        }
    }

    // Stop the reader, and close our side of the connection
    pending.close();
    done.release();
    drop(pending.drain());
    let _ = writer.close().await;
}

/// Adds the `Date` header and the connection options to a response.
fn prepare(response: &mut Response, last: bool) {
    if !response.headers.contains(Header::Date) {
        let date = httpdate::fmt_http_date(SystemTime::now());
        response.headers.insert(Header::Date, date);
    }
    if last {
        response.headers.insert(Header::Connection, "close");
    } else if response.version == Version::Http10 {
        response.headers.insert(Header::Connection, "keep-alive");
    }
}
