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

//! Connectors.

use futures_lite::future::Boxed;
use futures_lite::io::{AsyncRead, AsyncWrite, BufReader};
use std::io;
use std::sync::Arc;
use tracing::debug;
use zensical_net::net::TcpStream;
use zensical_net::runtime::Handle;

use crate::codec::{read_response, write_request};
use crate::config::Limits;
use crate::message::{Header, Method, Request};

use super::Address;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// TCP connector.
///
/// The connector opens plain TCP connections through the runtime, either to
/// the target directly, or to a forward proxy. Secure targets behind a proxy
/// are reached through a `CONNECT` tunnel, and all secure connections are
/// handed to a [`TlsWrapper`], without which they are refused.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use zensical_http::client::{Connector, TcpConnector};
/// use zensical_http::Address;
/// use zensical_net::runtime::Runtime;
///
/// // Create connector forwarding through a proxy
/// let runtime = Runtime::new()?;
/// let connector = TcpConnector::new(runtime.handle())
///     .proxy(Address::new("proxy.local", 3128));
///
/// // Plain targets are proxied, secure targets tunneled
/// assert!(connector.is_proxied(&Address::new("example.com", 80)));
/// assert!(!connector.supports_tls());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TcpConnector {
    /// Runtime handle.
    handle: Handle,
    /// Forward proxy, if any.
    proxy: Option<Address>,
    /// TLS wrapper, if any.
    tls: Option<Arc<dyn TlsWrapper>>,
}

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Byte stream a connection runs on.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Connector.
///
/// Connectors open transports to remote hosts, and are the seam at which
/// proxies and TLS are plugged in, so the client itself only ever sees a
/// byte stream. Each call to [`Connector::connect`] is a single attempt,
/// as retries and timeouts are handled by the endpoint.
pub trait Connector: Send + Sync + 'static {
    /// Opens a transport to the given address.
    fn connect(&self, address: &Address) -> Boxed<io::Result<BoxTransport>>;

    /// Returns whether requests to the address are sent through a proxy,
    /// which requires them to carry the absolute target.
    fn is_proxied(&self, _address: &Address) -> bool {
        false
    }

    /// Returns whether secure addresses are supported.
    fn supports_tls(&self) -> bool {
        false
    }
}

/// TLS wrapper.
///
/// The client doesn't implement TLS itself, but accepts an implementation
/// which wraps a connected transport into an encrypted one.
pub trait TlsWrapper: Send + Sync + 'static {
    /// Wraps a transport, performing the handshake for the given host.
    fn wrap(
        &self, host: &str, transport: BoxTransport,
    ) -> Boxed<io::Result<BoxTransport>>;
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl TcpConnector {
    /// Creates a TCP connector.
    #[must_use]
    pub fn new(handle: &Handle) -> Self {
        Self { handle: handle.clone(), proxy: None, tls: None }
    }

    /// Sets the forward proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: Address) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets the TLS wrapper.
    #[must_use]
    pub fn tls<T>(mut self, tls: T) -> Self
    where
        T: TlsWrapper,
    {
        self.tls = Some(Arc::new(tls));
        self
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

// ----------------------------------------------------------------------------

impl Connector for TcpConnector {
    fn connect(&self, address: &Address) -> Boxed<io::Result<BoxTransport>> {
        let handle = self.handle.clone();
        let proxy = self.proxy.clone();
        let tls = self.tls.clone();
        let address = address.clone();
        Box::pin(async move {
            let peer = proxy.as_ref().unwrap_or(&address);
            let stream =
                TcpStream::connect(&handle, (peer.host.clone(), peer.port))
                    .await
                    .map_err(io::Error::from)?;

            // Plain connections are ready, secure ones need a handshake
            let mut transport: BoxTransport = Box::new(stream);
            if !address.secure {
                return Ok(transport);
            }
            let Some(tls) = tls else {
                let message = "TLS is not supported by this connector";
                return Err(io::Error::new(io::ErrorKind::Unsupported, message));
            };
            if proxy.is_some() {
                transport = tunnel(transport, &address).await?;
            }
            tls.wrap(&address.host, transport).await
        })
    }

    #[inline]
    fn is_proxied(&self, address: &Address) -> bool {
        self.proxy.is_some() && !address.secure
    }

    #[inline]
    fn supports_tls(&self) -> bool {
        self.tls.is_some()
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Opens a tunnel to the address through a proxy with `CONNECT`.
async fn tunnel(
    mut transport: BoxTransport, address: &Address,
) -> io::Result<BoxTransport> {
    let authority = format!("{}:{}", address.host, address.port);
    let request = Request::new()
        .method(Method::Connect)
        .target(authority.as_str())
        .header(Header::Host, &authority);
    write_request(&mut transport, &request).await?;

    // Only a successful response turns the connection into a tunnel
    let mut reader = BufReader::new(transport);
    let limits = Limits::default();
    let response = read_response(&mut reader, Method::Connect, &limits)
        .await
        .map_err(io::Error::other)?;
    if !response.status.is_success() {
        let message = format!("proxy refused tunnel: {}", response.status);
        return Err(io::Error::new(io::ErrorKind::ConnectionRefused, message));
    }
    if !reader.buffer().is_empty() {
        let message = "proxy sent data before the tunnel was established";
        return Err(io::Error::new(io::ErrorKind::InvalidData, message));
    }
    debug!(%authority, "tunnel established");
    Ok(reader.into_inner())
}

// ----------------------------------------------------------------------------
// Type aliases
// ----------------------------------------------------------------------------

/// Boxed transport.
pub type BoxTransport = Box<dyn Transport>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
