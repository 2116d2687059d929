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

//! Client integration tests.

use futures_lite::future;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use zensical_http::message::Header;
use zensical_http::{
    Address, Client, ClientConfig, Error, Method, Phase, Request, Response,
    TimeoutKind,
};
use zensical_net::runtime::Runtime;
use zensical_net::sync::Latch;

mod common;

use common::{Fault, MockConnector, echo, eventually, init_tracing};

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns the address all tests run against.
fn address() -> Address {
    Address::new("example.com", 80)
}

/// Returns a client configuration.
fn config(
    pipelining: bool, pipeline_max_size: usize, max_connections: usize,
) -> ClientConfig {
    let mut config = ClientConfig { pipelining, ..ClientConfig::default() };
    config.endpoint.pipeline_max_size = pipeline_max_size;
    config.endpoint.max_connections_per_host = max_connections;
    config
}

/// Creates a client with a connector serving the echo handler.
fn client(
    runtime: &Runtime, config: ClientConfig,
) -> (Arc<Client>, MockConnector) {
    init_tracing();
    let handle = runtime.handle();
    let connector = MockConnector::new(handle, echo(handle));
    let client = Client::new(handle, config, connector.clone()).unwrap();
    (Arc::new(client), connector)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[test]
fn test_pipelined_responses_match_requests() {
    let runtime = Runtime::new().unwrap();
    let (client, connector) = client(&runtime, config(true, 3, 1));

    // Earlier requests take longer, so responses would overtake each other
    // if they weren't written in order
    let targets: Vec<_> = (0..6)
        .map(|n| format!("/{n}?delay={}", 30 - n * 5))
        .collect();
    let tasks: Vec<_> = targets
        .iter()
        .map(|target| {
            let client = Arc::clone(&client);
            let request = Request::new().target(target);
            runtime.spawn(async move {
                client.execute(&address(), request).await
            })
        })
        .collect();
    for (task, target) in tasks.into_iter().zip(&targets) {
        let res = runtime.block_on(task).unwrap().unwrap();
        assert_eq!(res.body.text(), format!("GET {target}"));
    }

    // All requests share a single connection, with a bounded window
    let stats = client.stats(&address()).unwrap();
    assert_eq!(stats.opened, 1);
    assert!((1..=3).contains(&stats.max_in_flight));
    assert_eq!(connector.connects(), 1);
}

#[test]
fn test_requests_wait_for_a_free_slot() {
    init_tracing();
    let runtime = Runtime::new().unwrap();
    let handle = runtime.handle();

    // Record when the server receives and answers requests
    let log = Arc::new(Mutex::new(Vec::new()));
    let handler = {
        let log = Arc::clone(&log);
        let handle = handle.clone();
        move |req: Request| {
            let log = Arc::clone(&log);
            let handle = handle.clone();
            async move {
                let method = req.method.to_string();
                log.lock().push(format!("{method} received"));
                if req.method == Method::Get {
                    let delay = Duration::from_millis(100);
                    let _ = handle.timeouts().wait(delay).await;
                }
                log.lock().push(format!("{method} answered"));
                Response::new().body(method)
            }
        }
    };
    let connector = MockConnector::new(handle, handler);
    let client = Client::new(handle, config(true, 1, 1), connector).unwrap();
    let client = Arc::new(client);

    // Submit the POST while the GET is still in flight
    let get = {
        let client = Arc::clone(&client);
        runtime.spawn(async move {
            client.execute(&address(), Request::new()).await
        })
    };
    runtime.block_on(eventually(handle, || {
        client.stats(&address()).is_some_and(|stats| stats.max_in_flight == 1)
    }));
    let post = {
        let client = Arc::clone(&client);
        let request = Request::new().method(Method::Post).body("data");
        runtime.spawn(async move { client.execute(&address(), request).await })
    };
    let res = runtime.block_on(get).unwrap().unwrap();
    assert_eq!(res.body.text(), "GET");
    let res = runtime.block_on(post).unwrap().unwrap();
    assert_eq!(res.body.text(), "POST");

    // The POST was only written after the response to the GET was read
    assert_eq!(
        *log.lock(),
        ["GET received", "GET answered", "POST received", "POST answered"]
    );
    let stats = client.stats(&address()).unwrap();
    assert_eq!(stats.opened, 1);
    assert_eq!(stats.max_in_flight, 1);
}

#[test]
fn test_canceled_request_keeps_pipeline_in_order() {
    let runtime = Runtime::new().unwrap();
    let handle = runtime.handle();
    let (client, _) = client(&runtime, config(true, 3, 1));
    let in_flight = |n: usize| {
        runtime.block_on(eventually(handle, || {
            client
                .stats(&address())
                .is_some_and(|stats| stats.max_in_flight == n)
        }));
    };

    // Put three requests in flight, and cancel the one in the middle
    let first = {
        let client = Arc::clone(&client);
        let request = Request::new().target("/a?delay=200");
        runtime.spawn(async move { client.execute(&address(), request).await })
    };
    in_flight(1);
    let cancel = Arc::new(Latch::new());
    let second = {
        let client = Arc::clone(&client);
        let cancel = Arc::clone(&cancel);
        let request = Request::new().target("/b?delay=100");
        runtime.spawn(async move {
            let execute = async {
                Some(client.execute(&address(), request).await)
            };
            let canceled = async {
                cancel.wait().await;
                None
            };
            future::or(execute, canceled).await
        })
    };
    in_flight(2);
    let third = {
        let client = Arc::clone(&client);
        let request = Request::new().target("/c");
        runtime.spawn(async move { client.execute(&address(), request).await })
    };
    in_flight(3);
    cancel.release();
    assert!(runtime.block_on(second).unwrap().is_none());

    // The siblings still receive their own responses
    let res = runtime.block_on(first).unwrap().unwrap();
    assert_eq!(res.body.text(), "GET /a?delay=200");
    let res = runtime.block_on(third).unwrap().unwrap();
    assert_eq!(res.body.text(), "GET /c");

    // The slot of the canceled request was freed, so the connection serves
    // as many requests at once as before
    let tasks: Vec<_> = (0..3)
        .map(|n| {
            let client = Arc::clone(&client);
            let request = Request::new().target(format!("/{n}?delay=20"));
            runtime.spawn(async move {
                client.execute(&address(), request).await
            })
        })
        .collect();
    for (n, task) in tasks.into_iter().enumerate() {
        let res = runtime.block_on(task).unwrap().unwrap();
        assert_eq!(res.body.text(), format!("GET /{n}?delay=20"));
    }
    let stats = client.stats(&address()).unwrap();
    assert_eq!(stats.opened, 1);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.pipelines, 1);
}

#[test]
fn test_sequential_requests_reuse_pipeline() {
    let runtime = Runtime::new().unwrap();
    let (client, _) = client(&runtime, config(true, 1, 1));
    runtime.block_on(async {
        let res = client.execute(&address(), Request::new()).await.unwrap();
        assert_eq!(res.body.text(), "GET /");
        let req = Request::new().method(Method::Post).body("data");
        let res = client.execute(&address(), req).await.unwrap();
        assert_eq!(res.body.text(), "POST / data");
    });
    let stats = client.stats(&address()).unwrap();
    assert_eq!(stats.opened, 1);
    assert_eq!(stats.pipelines, 1);
    assert_eq!(stats.max_in_flight, 1);
}

#[test]
fn test_connection_failure_fails_requests_in_flight() {
    let runtime = Runtime::new().unwrap();
    let handle = runtime.handle();
    let (client, connector) = client(&runtime, config(true, 3, 1));
    let fault = Fault::default();
    connector.prepare(fault.transport());

    // Put three requests in flight on a connection that never answers
    let tasks: Vec<_> = (0..3)
        .map(|n| {
            let client = Arc::clone(&client);
            let request = Request::new().target(format!("/{n}"));
            runtime.spawn(async move {
                client.execute(&address(), request).await
            })
        })
        .collect();
    runtime.block_on(eventually(handle, || {
        client
            .stats(&address())
            .is_some_and(|stats| stats.max_in_flight == 3)
    }));
    assert!(fault.written() > 0);

    // All of them fail with the same cause once the connection breaks
    fault.trigger();
    let causes: Vec<_> = tasks
        .into_iter()
        .map(|task| match runtime.block_on(task).unwrap() {
            Err(Error::Transport { phase: Phase::Read, cause, .. }) => cause,
            res => panic!("unexpected result: {res:?}"),
        })
        .collect();
    assert!(causes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

    // The next request opens a new connection
    let res = runtime.block_on(client.execute(&address(), Request::new()));
    assert_eq!(res.unwrap().body.text(), "GET /");
    assert_eq!(client.stats(&address()).unwrap().opened, 2);
    assert_eq!(connector.connects(), 2);
}

#[test]
fn test_write_failure_fails_requests_in_order() {
    let runtime = Runtime::builder().workers(1).build().unwrap();
    let handle = runtime.handle();
    let (client, connector) = client(&runtime, config(true, 4, 1));
    let fault = Fault::default();
    connector.prepare(fault.transport());

    // Record the order in which requests complete
    let completed = Arc::new(Mutex::new(Vec::new()));
    let spawn = |n: usize| {
        let client = Arc::clone(&client);
        let completed = Arc::clone(&completed);
        let request = Request::new().target(format!("/{n}"));
        runtime.spawn(async move {
            let res = client.execute(&address(), request).await;
            completed.lock().push(n);
            res
        })
    };

    // Put three requests in flight, and fail writing the fourth
    let mut tasks: Vec<_> = (0..3).map(&spawn).collect();
    runtime.block_on(eventually(handle, || {
        client
            .stats(&address())
            .is_some_and(|stats| stats.max_in_flight == 3)
    }));
    fault.fail_writes();
    tasks.push(spawn(3));

    // All of them fail with the same cause, in the order they were written
    let causes: Vec<_> = tasks
        .into_iter()
        .map(|task| match runtime.block_on(task).unwrap() {
            Err(Error::Transport { phase: Phase::Write, cause, .. }) => cause,
            res => panic!("unexpected result: {res:?}"),
        })
        .collect();
    assert!(causes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(*completed.lock(), [0, 1, 2, 3]);

    // The next request opens a new connection
    let res = runtime.block_on(client.execute(&address(), Request::new()));
    assert_eq!(res.unwrap().body.text(), "GET /");
    assert_eq!(client.stats(&address()).unwrap().opened, 2);
    assert_eq!(connector.connects(), 2);
}

#[test]
fn test_dedicated_connections_are_reused() {
    let runtime = Runtime::new().unwrap();
    let (client, _) = client(&runtime, config(false, 1, 1));
    runtime.block_on(async {
        for target in ["/a", "/b", "/c"] {
            let req = Request::new().target(target);
            let res = client.execute(&address(), req).await.unwrap();
            assert_eq!(res.body.text(), format!("GET {target}"));
        }
    });
    let stats = client.stats(&address()).unwrap();
    assert_eq!(stats.opened, 1);
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.pipelines, 0);
}

#[test]
fn test_closing_requests_get_own_connection() {
    let runtime = Runtime::new().unwrap();
    let (client, _) = client(&runtime, config(true, 3, 2));
    let req = Request::new().header(Header::Connection, "close");
    let res = runtime.block_on(client.execute(&address(), req)).unwrap();
    assert_eq!(res.body.text(), "GET /");

    // The connection is neither pipelined nor kept
    let stats = client.stats(&address()).unwrap();
    assert_eq!(stats.opened, 1);
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.pipelines, 0);
}

#[test]
fn test_pool_timeout() {
    let runtime = Runtime::new().unwrap();
    let mut config = config(false, 1, 1);
    config.endpoint.pool_timeout = Duration::from_millis(50);
    let (client, connector) = client(&runtime, config);
    let fault = Fault::default();
    connector.prepare(fault.transport());

    // Occupy the only connection with a request that is never answered
    let first = {
        let client = Arc::clone(&client);
        runtime.spawn(async move {
            client.execute(&address(), Request::new()).await
        })
    };
    runtime.block_on(eventually(runtime.handle(), || {
        client.stats(&address()).is_some_and(|stats| stats.active == 1)
    }));
    let res = runtime.block_on(client.execute(&address(), Request::new()));
    let err = res.unwrap_err();
    assert!(matches!(err, Error::PoolTimeout { .. }));
    assert!(!err.is_timeout());
    assert!(err.is_retry_safe());

    // Breaking the connection fails the first request after sending it
    fault.trigger();
    let err = runtime.block_on(first).unwrap().unwrap_err();
    assert_eq!(err.phase(), Some(Phase::Read));
    assert!(!err.is_retry_safe());
}

#[test]
fn test_request_timeout() {
    let runtime = Runtime::new().unwrap();
    let mut config = config(true, 3, 1);
    config.request_timeout = Duration::from_millis(50);
    let (client, connector) = client(&runtime, config);
    connector.prepare(Fault::default().transport());
    let res = runtime.block_on(client.execute(&address(), Request::new()));
    assert!(matches!(
        res,
        Err(Error::Timeout { kind: TimeoutKind::Request, .. })
    ));
}

#[test]
fn test_socket_timeout() {
    let runtime = Runtime::new().unwrap();
    let mut config = config(true, 3, 1);
    config.endpoint.socket_timeout = Duration::from_millis(50);
    let (client, connector) = client(&runtime, config);
    connector.prepare(Fault::default().transport());
    let res = runtime.block_on(client.execute(&address(), Request::new()));
    let err = res.unwrap_err();
    assert!(matches!(
        err,
        Error::Timeout { kind: TimeoutKind::Socket, .. }
    ));
    assert!(err.is_timeout());
}

#[test]
fn test_close_fails_waiting_requests() {
    let runtime = Runtime::new().unwrap();
    let (client, connector) = client(&runtime, config(false, 1, 1));
    let fault = Fault::default();
    connector.prepare(fault.transport());

    // Second request waits for the connection held by the first
    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let client = Arc::clone(&client);
            runtime.spawn(async move {
                client.execute(&address(), Request::new()).await
            })
        })
        .collect();
    runtime.block_on(eventually(runtime.handle(), || {
        client.stats(&address()).is_some_and(|stats| stats.active == 1)
    }));
    client.close();
    fault.trigger();
    let results: Vec<_> = tasks
        .into_iter()
        .map(|task| runtime.block_on(task).unwrap())
        .collect();
    assert!(results.iter().all(Result::is_err));
    assert!(
        results
            .iter()
            .any(|res| matches!(res, Err(Error::PoolClosed { .. })))
    );

    // Closed clients refuse all further requests
    let res = runtime.block_on(client.execute(&address(), Request::new()));
    assert!(matches!(res, Err(Error::PoolClosed { .. })));
}

#[test]
fn test_secure_address_requires_tls() {
    let runtime = Runtime::new().unwrap();
    let (client, connector) = client(&runtime, ClientConfig::default());
    let address = Address::secure("example.com", 443);
    let res = runtime.block_on(client.execute(&address, Request::new()));
    assert!(matches!(res, Err(Error::Unsupported("TLS"))));
    assert_eq!(connector.connects(), 0);
}

#[test]
fn test_capabilities() {
    let runtime = Runtime::new().unwrap();
    let (client, _) = client(&runtime, config(true, 3, 1));
    let capabilities = client.capabilities();
    assert!(capabilities.pipelining);
    assert!(!capabilities.websocket);
    assert!(!capabilities.tls);
}

#[test]
fn test_invalid_config() {
    let runtime = Runtime::new().unwrap();
    let handle = runtime.handle();
    let connector = MockConnector::new(handle, echo(handle));
    let res = Client::new(handle, config(true, 0, 1), connector);
    assert!(matches!(res, Err(Error::Config(_))));
}
