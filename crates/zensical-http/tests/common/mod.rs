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

//! Shared test utilities.

#![allow(dead_code)]

use futures_lite::future::Boxed;
use futures_lite::io::{AsyncRead, AsyncWrite};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use zensical_http::client::{BoxTransport, Connector, Transport};
use zensical_http::server::{Handler, serve_connection};
use zensical_http::{Address, Request, Response, ServerConfig};
use zensical_net::io::duplex;
use zensical_net::runtime::Handle;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Connector serving connections in memory.
///
/// Transports prepared upfront are handed out first, and every further
/// connection is served by the given handler over an in-memory stream.
#[derive(Clone)]
pub struct MockConnector {
    handle: Handle,
    handler: Arc<dyn Handler>,
    prepared: Arc<Mutex<VecDeque<BoxTransport>>>,
    connects: Arc<AtomicUsize>,
}

/// Fault that can be injected into a transport.
#[derive(Clone, Default)]
pub struct Fault {
    state: Arc<Mutex<FaultState>>,
}

/// Fault state.
#[derive(Default)]
struct FaultState {
    triggered: bool,
    failing_writes: bool,
    written: usize,
    waker: Option<Waker>,
}

/// Transport on which writes succeed and reads hang until the fault is
/// triggered, after which both fail. Writes can also be failed alone.
pub struct FaultyTransport {
    fault: Fault,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl MockConnector {
    pub fn new<H>(handle: &Handle, handler: H) -> Self
    where
        H: Handler,
    {
        Self {
            handle: handle.clone(),
            handler: Arc::new(handler),
            prepared: Arc::default(),
            connects: Arc::default(),
        }
    }

    /// Prepares a transport for the next connection.
    pub fn prepare<T>(&self, transport: T)
    where
        T: Transport,
    {
        self.prepared.lock().push_back(Box::new(transport));
    }

    /// Returns the number of connections opened.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }
}

impl Fault {
    /// Creates a transport subject to the fault.
    pub fn transport(&self) -> FaultyTransport {
        FaultyTransport { fault: self.clone() }
    }

    /// Triggers the fault, failing pending and future reads.
    pub fn trigger(&self) {
        let waker = {
            let mut state = self.state.lock();
            state.triggered = true;
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Fails all further writes, while reads keep hanging.
    pub fn fail_writes(&self) {
        self.state.lock().failing_writes = true;
    }

    /// Returns the number of bytes written.
    pub fn written(&self) -> usize {
        self.state.lock().written
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Connector for MockConnector {
    fn connect(&self, _address: &Address) -> Boxed<io::Result<BoxTransport>> {
        self.connects.fetch_add(1, Ordering::AcqRel);
        let prepared = self.prepared.lock().pop_front();
        let transport = prepared.unwrap_or_else(|| {
            let (client, server) = duplex(1 << 16);
            let connection = serve_connection(
                self.handle.clone(),
                server,
                ServerConfig::default(),
                Arc::clone(&self.handler),
            );
            self.handle.spawn(connection).detach();
            let transport: BoxTransport = Box::new(client);
            transport
        });
        Box::pin(async move { Ok(transport) })
    }
}

impl AsyncRead for FaultyTransport {
    fn poll_read(
        self: Pin<&mut Self>, cx: &mut Context, _buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.fault.state.lock();
        if state.triggered {
            Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl AsyncWrite for FaultyTransport {
    fn poll_write(
        self: Pin<&mut Self>, _cx: &mut Context, buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.fault.state.lock();
        if state.triggered {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        } else if state.failing_writes {
            Poll::Ready(Err(io::ErrorKind::ConnectionAborted.into()))
        } else {
            state.written += buf.len();
            Poll::Ready(Ok(buf.len()))
        }
    }

    fn poll_flush(
        self: Pin<&mut Self>, _cx: &mut Context,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(
        self: Pin<&mut Self>, _cx: &mut Context,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns a handler which echoes the method, target and body of requests.
///
/// Requests with a `delay` query parameter are answered after the given
/// number of milliseconds, and requests for `/panic` make the handler panic.
pub fn echo(handle: &Handle) -> impl Handler + use<> {
    let handle = handle.clone();
    move |req: Request| {
        let handle = handle.clone();
        async move {
            if req.target == "/panic" {
                panic!("handler panicked");
            }
            if let Some(delay) = delay(&req.target) {
                let _ = handle.timeouts().wait(delay).await;
            }
            let mut text = format!("{} {}", req.method, req.target);
            if !req.body.is_empty() {
                text.push(' ');
                text.push_str(&req.body.text());
            }
            Response::new().body(text)
        }
    }
}

/// Installs a subscriber, filtered through `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Waits until the condition holds, polling it periodically.
pub async fn eventually<F>(handle: &Handle, condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..1000 {
        if condition() {
            return;
        }
        let _ = handle.timeouts().wait(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

/// Returns the delay given in the query of a target.
fn delay(target: &str) -> Option<Duration> {
    let (_, query) = target.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("delay="))
        .and_then(|value| value.parse().ok())
        .map(Duration::from_millis)
}
