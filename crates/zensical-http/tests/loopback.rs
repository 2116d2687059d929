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

//! End-to-end tests over loopback TCP.

use std::sync::Arc;
use std::time::Duration;
use zensical_http::client::TcpConnector;
use zensical_http::{
    Address, Client, ClientConfig, Request, Server, ServerConfig,
};
use zensical_net::runtime::Runtime;

mod common;

use common::{echo, init_tracing};

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[test]
fn test_client_and_server_over_tcp() {
    init_tracing();
    let runtime = Runtime::new().unwrap();
    let handle = runtime.handle();

    // Start server on an ephemeral port
    let config = ServerConfig::default();
    let server = Server::bind(handle, "127.0.0.1:0", config).unwrap();
    let port = server.local_addr().unwrap().port();
    let server = Arc::new(server);
    let serving = {
        let server = Arc::clone(&server);
        let handler = echo(handle);
        runtime.spawn(async move { server.serve(handler).await })
    };

    // Execute pipelined and dedicated requests against it
    let address = Address::new("127.0.0.1", port);
    for pipelining in [true, false] {
        let config = ClientConfig { pipelining, ..ClientConfig::default() };
        let connector = TcpConnector::new(handle);
        let client = Arc::new(Client::new(handle, config, connector).unwrap());
        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let client = Arc::clone(&client);
                let address = address.clone();
                let request = Request::new().target(format!("/{n}"));
                runtime.spawn(async move {
                    client.execute(&address, request).await
                })
            })
            .collect();
        for (n, task) in tasks.into_iter().enumerate() {
            let res = runtime.block_on(task).unwrap().unwrap();
            assert_eq!(res.body.text(), format!("GET /{n}"));
        }
        let stats = client.stats(&address).unwrap();
        assert!(stats.opened >= 1);

        // URLs are resolved to addresses and targets
        let url = format!("http://127.0.0.1:{port}/docs?page=2");
        let res = runtime.block_on(client.get(&url)).unwrap();
        assert_eq!(res.body.text(), "GET /docs?page=2");
        client.close();
    }

    // Closing the server ends the accept loop
    server.close();
    runtime.block_on(serving).unwrap().unwrap();
}

#[test]
fn test_connections_closed_by_server_are_not_reused() {
    init_tracing();
    let runtime = Runtime::new().unwrap();
    let handle = runtime.handle();

    // Start server that closes connections after a short idle time
    let config = ServerConfig {
        idle_timeout: Duration::from_millis(50),
        ..ServerConfig::default()
    };
    let server = Server::bind(handle, "127.0.0.1:0", config).unwrap();
    let port = server.local_addr().unwrap().port();
    let server = Arc::new(server);
    let serving = {
        let server = Arc::clone(&server);
        let handler = echo(handle);
        runtime.spawn(async move { server.serve(handler).await })
    };

    // Outlive the server's idle timeout between two requests
    let address = Address::new("127.0.0.1", port);
    for pipelining in [true, false] {
        let config = ClientConfig { pipelining, ..ClientConfig::default() };
        let connector = TcpConnector::new(handle);
        let client = Client::new(handle, config, connector).unwrap();
        runtime.block_on(async {
            let res = client.execute(&address, Request::new()).await;
            assert_eq!(res.unwrap().body.text(), "GET /");
            let wait = handle.timeouts().wait(Duration::from_millis(300));
            wait.await.unwrap();
            let res = client.execute(&address, Request::new()).await;
            assert_eq!(res.unwrap().body.text(), "GET /");
        });

        // The second request was served by a new connection
        let stats = client.stats(&address).unwrap();
        assert_eq!(stats.opened, 2);
        client.close();
    }
    server.close();
    runtime.block_on(serving).unwrap().unwrap();
}
