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

//! Runtime integration tests.

use futures_lite::{AsyncReadExt, AsyncWriteExt, future};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use zensical_net::Error;
use zensical_net::net::{TcpListener, TcpStream};
use zensical_net::runtime::Runtime;
use zensical_net::sync::Semaphore;

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Installs a subscriber, filtered through `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[test]
fn test_semaphore_bounds_concurrent_holders() {
    init_tracing();
    let runtime = Runtime::builder().workers(4).build().unwrap();
    let handle = runtime.handle();
    let semaphore = Arc::new(Semaphore::new(3));
    let holders = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    // Hold a permit for a moment in each of many tasks
    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let handle = handle.clone();
            let semaphore = Arc::clone(&semaphore);
            let holders = Arc::clone(&holders);
            let peak = Arc::clone(&peak);
            handle.clone().spawn(async move {
                semaphore.enter().await.unwrap();
                let current = 1 + holders.fetch_add(1, Ordering::AcqRel);
                peak.fetch_max(current, Ordering::AcqRel);
                let wait = Duration::from_millis(2);
                let _ = handle.timeouts().wait(wait).await;
                holders.fetch_sub(1, Ordering::AcqRel);
                semaphore.leave();
            })
        })
        .collect();
    for task in tasks {
        runtime.block_on(task).unwrap();
    }
    assert!((1..=3).contains(&peak.load(Ordering::Acquire)));
    assert_eq!(semaphore.visitors(), 0);
}

#[test]
fn test_timeouts_fire_unless_completed() {
    init_tracing();
    let runtime = Runtime::new().unwrap();
    let timeouts = runtime.handle().timeouts();
    let duration = Duration::from_millis(20);
    let pending = future::pending::<()>();
    let res = runtime.block_on(timeouts.with_timeout(duration, pending));
    assert!(res.unwrap_err().is_timeout());

    // Completed futures are never cancelled
    let duration = Duration::from_secs(60);
    let res = runtime.block_on(timeouts.with_timeout(duration, async { 42 }));
    assert_eq!(res.unwrap(), 42);
}

#[test]
fn test_shutdown_fails_pending_waits() {
    init_tracing();
    let runtime = Runtime::new().unwrap();
    let wait = runtime.handle().timeouts().wait(Duration::from_secs(60));
    runtime.shutdown();
    assert!(matches!(runtime.block_on(wait), Err(Error::QueueClosed)));
}

#[test]
fn test_many_concurrent_connections() {
    init_tracing();
    let runtime = Runtime::builder().workers(4).build().unwrap();
    let handle = runtime.handle().clone();
    let listener = TcpListener::bind(&handle, "127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    // Echo four bytes back on every accepted connection
    let server = {
        let handle = handle.clone();
        runtime.spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                handle
                    .spawn(async move {
                        let mut buf = [0; 4];
                        stream.read_exact(&mut buf).await?;
                        stream.write_all(&buf).await
                    })
                    .detach();
            }
        })
    };

    // Open connections concurrently, and check that each gets its own reply
    let clients: Vec<_> = (0..64)
        .map(|n| {
            let handle = handle.clone();
            runtime.spawn(async move {
                let mut stream = TcpStream::connect(&handle, addr).await?;
                let message = format!("{n:04}");
                stream.write_all(message.as_bytes()).await?;
                let mut buf = [0; 4];
                stream.read_exact(&mut buf).await?;
                assert_eq!(&buf, message.as_bytes());
                zensical_net::Result::Ok(())
            })
        })
        .collect();
    for client in clients {
        runtime.block_on(client).unwrap().unwrap();
    }
    drop(server);
}
