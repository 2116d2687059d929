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

//! HTTP server.
//!
//! The server accepts connections and runs a pipeline on each of them, which
//! reads requests in order, runs the handler for each of them concurrently,
//! and writes the responses strictly in the order the requests arrived.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, debug_span, warn};
use zensical_net::net::TcpListener;
use zensical_net::runtime::Handle;

use crate::config::ServerConfig;

mod error;
mod handler;
mod pipeline;

pub use error::{Error, Result};
pub use handler::Handler;
pub use pipeline::serve_connection;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP server.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use zensical_http::{Request, Response, Server, ServerConfig};
/// use zensical_net::runtime::Runtime;
///
/// // Create server on an ephemeral port
/// let runtime = Runtime::new()?;
/// let config = ServerConfig::default();
/// let server = Server::bind(runtime.handle(), "127.0.0.1:0", config)?;
/// assert_ne!(server.local_addr()?.port(), 0);
///
/// // Closing the server ends the accept loop
/// server.close();
/// runtime.block_on(server.serve(|_: Request| async { Response::new() }))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Server {
    /// Runtime handle.
    handle: Handle,
    /// Listener.
    listener: TcpListener,
    /// Server configuration.
    config: ServerConfig,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Server {
    /// Binds a server to the given address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid, and
    /// [`Error::Net`] if the address can't be bound.
    pub fn bind<A>(
        handle: &Handle, addr: A, config: ServerConfig,
    ) -> Result<Self>
    where
        A: ToSocketAddrs,
    {
        config.validate()?;
        let listener = TcpListener::bind(handle, addr)?;
        Ok(Self { handle: handle.clone(), listener, config })
    }

    /// Accepts connections until the server is closed.
    ///
    /// Every connection is served by a task of its own, which outlives this
    /// method if its exchanges are not complete when the server is closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Net`] if the runtime was shut down.
    pub async fn serve<H>(&self, handler: H) -> Result
    where
        H: Handler,
    {
        let handler = Arc::new(handler);
        let mut failures = 0;
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(zensical_net::Error::Closed) => break,
                Err(zensical_net::Error::Io(err)) => {
                    // Failures like exhausted file descriptors persist while
                    // the listener stays ready, so retry after a pause
                    failures += 1;
                    let delay = backoff(failures);
                    warn!(%err, ?delay, "accepting connection failed");
                    self.handle.timeouts().wait(delay).await?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            failures = 0;

            // Serve connection in its own task
            debug!(%peer, "accepted connection");
            let span = debug_span!("connection", %peer);
            let connection = serve_connection(
                self.handle.clone(),
                stream,
                self.config.clone(),
                Arc::clone(&handler),
            );
            self.handle.spawn(connection.instrument(span)).detach();
        }
        debug!("server closed");
        Ok(())
    }

    /// Returns the local address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Net`] if the address can't be determined.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|err| zensical_net::Error::from(err).into())
    }

    /// Closes the server, ending the accept loop.
    #[inline]
    pub fn close(&self) {
        self.listener.close();
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns the pause after the given number of consecutive accept failures.
///
/// The pause doubles with every failure, from 10ms up to one second.
fn backoff(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(7);
    Duration::from_millis(10 << exponent).min(Duration::from_secs(1))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_backoff_grows_and_is_capped() {
        assert_eq!(backoff(1), Duration::from_millis(10));
        assert_eq!(backoff(2), Duration::from_millis(20));
        assert_eq!(backoff(7), Duration::from_millis(640));
        assert_eq!(backoff(8), Duration::from_secs(1));
        assert_eq!(backoff(u32::MAX), Duration::from_secs(1));
    }
}
