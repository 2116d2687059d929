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

//! HTTP client.
//!
//! The client keeps an endpoint per remote host, through which requests
//! are either pipelined over shared keep-alive connections, or sent over a
//! dedicated connection, depending on the configuration and the request.
//! Transports are opened by a [`Connector`], which is where proxies and TLS
//! are plugged in.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;
use zensical_net::runtime::Handle;
use zensical_net::selector::{Backend, Selector};

use crate::config::ClientConfig;
use crate::error::{Error, Result, TimeoutKind};
use crate::message::{Header, Request, Response};

mod connector;
mod endpoint;
mod pool;
mod task;

pub use connector::{
    BoxTransport, Connector, TcpConnector, TlsWrapper, Transport,
};
pub use endpoint::EndpointStats;
use endpoint::Endpoint;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP client.
///
/// The client is shared between tasks by reference, and every call to
/// [`Client::execute`] runs a single exchange. Whether requests are pipelined
/// is decided by the configuration, except for requests that close or upgrade
/// the connection, which always get a connection of their own. Connections
/// per host are bounded, and callers wait in arrival order if the bound is
/// reached.
///
/// # Examples
///
/// ```no_run
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use zensical_http::client::TcpConnector;
/// use zensical_http::{Client, ClientConfig};
/// use zensical_net::runtime::Runtime;
///
/// // Create client
/// let runtime = Runtime::new()?;
/// let handle = runtime.handle();
/// let connector = TcpConnector::new(handle);
/// let client = Client::new(handle, ClientConfig::default(), connector)?;
///
/// // Execute request
/// let res = runtime.block_on(client.get("http://example.com/"))?;
/// println!("{}", res.status);
/// # Ok(())
/// # }
/// ```
pub struct Client {
    /// Runtime handle.
    handle: Handle,
    /// Client configuration.
    config: ClientConfig,
    /// Connector.
    connector: Arc<dyn Connector>,
    /// Endpoints by address.
    endpoints: Mutex<HashMap<Address, Arc<Endpoint>>>,
    /// Whether the client was closed.
    closed: AtomicBool,
}

/// Address of a remote host.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    /// Host name or IP address.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Whether the connection is secured with TLS.
    pub secure: bool,
}

/// Capabilities of a client.
///
/// Capabilities the client lacks are reported here, rather than discovered
/// through failing calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether requests are pipelined.
    pub pipelining: bool,
    /// Whether WebSocket sessions are supported.
    pub websocket: bool,
    /// Whether secure addresses are supported.
    pub tls: bool,
    /// Platform backend of the selector.
    pub backend: Backend,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Client {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new<C>(
        handle: &Handle, config: ClientConfig, connector: C,
    ) -> Result<Self>
    where
        C: Connector,
    {
        config.validate()?;
        Ok(Self {
            handle: handle.clone(),
            config,
            connector: Arc::new(connector),
            endpoints: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Executes a request against the given address.
    ///
    /// The `Host` header is set from the address, unless given, and requests
    /// sent through a proxy carry the absolute target. The request timeout,
    /// if any, bounds the whole exchange, including waiting for a connection.
    /// Dropping the returned future cancels the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for secure addresses if the connector
    /// doesn't support TLS, [`Error::PoolClosed`] if the client was closed,
    /// and otherwise the error of the exchange, which tells whether the
    /// request might have been sent.
    pub async fn execute(
        &self, address: &Address, mut request: Request,
    ) -> Result<Response> {
        if self.closed.load(Ordering::Acquire) {
            let host = address.host.clone();
            return Err(Error::PoolClosed { host });
        }
        if address.secure && !self.connector.supports_tls() {
            return Err(Error::Unsupported("TLS"));
        }

        // Prepare request for the address
        if !request.headers.contains(Header::Host) {
            request.headers.insert(Header::Host, address.authority());
        }
        if self.connector.is_proxied(address) && request.target.starts_with('/')
        {
            let authority = address.authority();
            request.target = format!("http://{authority}{}", request.target);
        }

        // Execute request within the request timeout
        let endpoint = self.endpoint(address);
        let exchange = endpoint.execute(request, self.config.pipelining);
        let timeout = self.config.request_timeout;
        match within(&self.handle, timeout, exchange).await {
            Ok(res) => res,
            Err(err) if err.is_timeout() => Err(Error::Timeout {
                host: address.host.clone(),
                kind: TimeoutKind::Request,
            }),
            Err(_) => Err(Error::Canceled { host: address.host.clone() }),
        }
    }

    /// Executes a `GET` request for the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the URL is invalid, [`Error::Unsupported`]
    /// if its scheme is not `http` or `https`, and otherwise the error of
    /// [`Client::execute`].
    pub async fn get(&self, url: &str) -> Result<Response> {
        let url = Url::parse(url)?;
        let address = Address::from_url(&url)?;
        self.execute(&address, Request::new().target(target(&url))).await
    }

    /// Returns the capabilities of the client.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            pipelining: self.config.pipelining,
            websocket: false,
            tls: self.connector.supports_tls(),
            backend: Selector::backend(),
        }
    }

    /// Returns a snapshot of the counters of the endpoint for the address,
    /// if requests were made to it.
    #[must_use]
    pub fn stats(&self, address: &Address) -> Option<EndpointStats> {
        let endpoints = self.endpoints.lock();
        endpoints.get(address).map(|endpoint| endpoint.stats())
    }

    /// Closes the client.
    ///
    /// Requests waiting for a connection fail with [`Error::PoolClosed`], and
    /// so do all future requests. Requests in flight are completed.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let endpoints: Vec<_> = self.endpoints.lock().drain().collect();
        for (_, endpoint) in endpoints {
            endpoint.close();
        }
        debug!("client closed");
    }

    /// Returns the endpoint for the address, creating it if necessary.
    fn endpoint(&self, address: &Address) -> Arc<Endpoint> {
        let mut endpoints = self.endpoints.lock();
        let endpoint = endpoints.entry(address.clone()).or_insert_with(|| {
            Arc::new(Endpoint::new(
                address.clone(),
                &self.handle,
                Arc::clone(&self.connector),
                &self.config,
            ))
        });
        Arc::clone(endpoint)
    }
}

// ----------------------------------------------------------------------------

impl Address {
    /// Creates a plain address.
    #[must_use]
    pub fn new<H>(host: H, port: u16) -> Self
    where
        H: Into<String>,
    {
        Self { host: host.into(), port, secure: false }
    }

    /// Creates a secure address.
    #[must_use]
    pub fn secure<H>(host: H, port: u16) -> Self
    where
        H: Into<String>,
    {
        Self { host: host.into(), port, secure: true }
    }

    /// Creates an address from a URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] if the scheme is not `http` or `https`,
    /// and [`Error::Url`] if the URL has no host.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use url::Url;
    /// use zensical_http::Address;
    ///
    /// // Create address from URL
    /// let url = Url::parse("https://example.com/docs/")?;
    /// let address = Address::from_url(&url)?;
    /// assert_eq!(address, Address::secure("example.com", 443));
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_url(url: &Url) -> Result<Self> {
        let secure = match url.scheme() {
            "http" => false,
            "https" => true,
            _ => return Err(Error::Unsupported("URL scheme")),
        };
        let host = url.host_str().ok_or(url::ParseError::EmptyHost)?;
        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });
        Ok(Self { host: host.to_string(), port, secure })
    }

    /// Returns the authority, omitting the default port of the scheme.
    #[must_use]
    pub fn authority(&self) -> String {
        let default = if self.secure { 443 } else { 80 };
        if self.port == default {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl fmt::Display for Address {
    /// Formats the address for display.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let scheme = if self.secure { "https" } else { "http" };
        write!(f, "{scheme}://{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for Client {
    /// Formats the client for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("endpoints", &self.endpoints.lock().len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Runs a future within the given duration, where zero means no timeout.
pub(crate) async fn within<F>(
    handle: &Handle, duration: Duration, fut: F,
) -> zensical_net::Result<F::Output>
where
    F: Future,
{
    if duration.is_zero() {
        Ok(fut.await)
    } else {
        handle.timeouts().with_timeout(duration, fut).await
    }
}

/// Returns the origin-form target of a URL.
fn target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_url() {
        let url = Url::parse("http://example.com:8080/a?b=c").unwrap();
        let address = Address::from_url(&url).unwrap();
        assert_eq!(address, Address::new("example.com", 8080));
        assert_eq!(address.authority(), "example.com:8080");
        assert_eq!(target(&url), "/a?b=c");
    }

    #[test]
    fn test_unsupported_scheme() {
        let url = Url::parse("ftp://example.com/").unwrap();
        let err = Address::from_url(&url).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_authority_omits_default_port() {
        let address = Address::secure("example.com", 443);
        assert_eq!(address.authority(), "example.com");
        let address = Address::new("example.com", 443);
        assert_eq!(address.authority(), "example.com:443");
    }
}
