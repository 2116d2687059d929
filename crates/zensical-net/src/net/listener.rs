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

//! TCP listener.

use futures_lite::future;
use mio::net;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use tracing::debug;

use crate::Result;
use crate::runtime::Handle;
use crate::selector::{Interest, Selectable, Selector};

use super::TcpStream;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// TCP listener.
#[derive(Debug)]
pub struct TcpListener {
    /// Registered socket.
    inner: Selectable<net::TcpListener>,
    /// Selector, for accepted streams.
    selector: Selector,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl TcpListener {
    /// Binds a listener to the first address that can be bound.
    ///
    /// # Errors
    ///
    /// Returns the last I/O error if no address could be bound.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use zensical_net::net::TcpListener;
    /// use zensical_net::runtime::Runtime;
    ///
    /// // Create runtime and bind listener to an ephemeral port
    /// let runtime = Runtime::new()?;
    /// let listener = TcpListener::bind(runtime.handle(), "127.0.0.1:0")?;
    /// assert_ne!(listener.local_addr()?.port(), 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn bind<A>(handle: &Handle, addr: A) -> Result<Self>
    where
        A: ToSocketAddrs,
    {
        let mut last = None;
        for addr in addr.to_socket_addrs()? {
            match net::TcpListener::bind(addr) {
                Ok(listener) => {
                    let selector = handle.selector().clone();
                    let inner = Selectable::register(
                        &selector,
                        listener,
                        Interest::ACCEPT,
                    )?;
                    debug!(%addr, "listening");
                    return Ok(Self { inner, selector });
                }
                Err(err) => last = Some(err),
            }
        }
        Err(last
            .unwrap_or_else(|| {
                let message = "could not resolve to any address";
                io::Error::new(io::ErrorKind::InvalidInput, message)
            })
            .into())
    }

    /// Accepts a connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`][] if the listener or selector was closed,
    /// and an I/O error if accepting failed.
    ///
    /// [`Error::Closed`]: crate::Error::Closed
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = future::poll_fn(|cx| {
            self.inner.poll_io(cx, Interest::ACCEPT, net::TcpListener::accept)
        })
        .await
        .map_err(|err| match err.kind() {
            io::ErrorKind::NotConnected if self.inner.is_closed() => {
                crate::Error::Closed
            }
            _ => err.into(),
        })?;
        TcpStream::from_accepted(&self.selector, stream)
            .map(|stream| (stream, addr))
    }

    /// Returns the local address.
    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.source().local_addr()
    }

    /// Closes the listener, failing pending and future accepts.
    #[inline]
    pub fn close(&self) {
        self.inner.close();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::{AsyncReadExt, AsyncWriteExt};
    use std::sync::Arc;

    use crate::Error;
    use crate::runtime::Runtime;

    use super::*;

    #[test]
    fn test_echo_over_loopback() {
        let runtime = Runtime::builder().workers(2).build().unwrap();
        let handle = runtime.handle().clone();
        let listener = TcpListener::bind(&handle, "127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        // Echo a single message back
        let server = runtime.spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0; 5];
            stream.read_exact(&mut buf).await.unwrap();
            stream.write_all(&buf).await.unwrap();
        });
        let client = runtime.spawn(async move {
            let mut stream = TcpStream::connect(&handle, addr).await.unwrap();
            stream.write_all(b"hello").await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            buf
        });
        runtime.block_on(server).unwrap();
        assert_eq!(runtime.block_on(client).unwrap(), b"hello");
    }

    #[test]
    fn test_close_fails_accept() {
        let runtime = Runtime::builder().workers(1).build().unwrap();
        let handle = runtime.handle();
        let listener =
            Arc::new(TcpListener::bind(handle, "127.0.0.1:0").unwrap());
        let task = runtime.spawn({
            let listener = Arc::clone(&listener);
            async move { listener.accept().await.map(|_| ()) }
        });
        listener.close();
        assert!(matches!(runtime.block_on(task).unwrap(), Err(Error::Closed)));
    }

    #[test]
    fn test_connect_refused() {
        let runtime = Runtime::builder().workers(1).build().unwrap();
        let handle = runtime.handle().clone();

        // Bind and drop a listener to find a port nobody listens on
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|listener| listener.local_addr())
            .unwrap();
        let task = runtime.spawn(async move {
            TcpStream::connect(&handle, addr).await.map(|_| ())
        });
        assert!(matches!(runtime.block_on(task).unwrap(), Err(Error::Io(_))));
    }
}
