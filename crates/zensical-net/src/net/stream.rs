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

//! TCP stream.

use futures_lite::future;
use futures_lite::io::{AsyncRead, AsyncWrite};
use mio::net;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::trace;

use crate::Result;
use crate::runtime::Handle;
use crate::selector::{Interest, Selectable, Selector};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// TCP stream.
#[derive(Debug)]
pub struct TcpStream {
    /// Registered socket.
    inner: Selectable<net::TcpStream>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl TcpStream {
    /// Opens a connection to the given address.
    ///
    /// Address resolution runs on the blocking dispatcher. Every resolved
    /// address is tried in turn, and the last error is returned if none of
    /// them accepts the connection.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address can't be resolved or connected,
    /// and [`Error::Closed`][] if the selector was closed meanwhile.
    ///
    /// [`Error::Closed`]: crate::Error::Closed
    pub async fn connect<A>(handle: &Handle, addr: A) -> Result<Self>
    where
        A: ToSocketAddrs + Send + 'static,
    {
        let addrs = handle
            .spawn_blocking(move || {
                addr.to_socket_addrs().map(Iterator::collect::<Vec<_>>)
            })
            .await??;

        // Try all addresses in order
        let mut last = None;
        for addr in addrs {
            match Self::connect_addr(handle.selector(), addr).await {
                Ok(stream) => return Ok(stream),
                Err(err) => last = Some(err),
            }
        }
        Err(last.unwrap_or_else(|| {
            let message = "could not resolve to any address";
            io::Error::new(io::ErrorKind::InvalidInput, message).into()
        }))
    }

    /// Opens a connection to a resolved address.
    async fn connect_addr(selector: &Selector, addr: SocketAddr) -> Result<Self> {
        let stream = net::TcpStream::connect(addr)?;
        let interest = Interest::READ | Interest::WRITE | Interest::CONNECT;
        let inner = Selectable::register(selector, stream, interest)?;

        // The connection is established once the socket is writable and has
        // a peer, or failed if the socket reports an error
        future::poll_fn(|cx| {
            inner.poll_io(cx, Interest::CONNECT, |stream| {
                if let Some(err) = stream.take_error()? {
                    return Err(err);
                }
                match stream.peer_addr() {
                    Err(err) if err.kind() == io::ErrorKind::NotConnected => {
                        Err(io::ErrorKind::WouldBlock.into())
                    }
                    res => res.map(|_| ()),
                }
            })
        })
        .await?;

        // Disable Nagle's algorithm, as requests are written in one go
        let _ = inner.source().set_nodelay(true);
        trace!(%addr, "connected");
        Ok(Self { inner })
    }

    /// Creates a stream from an accepted socket.
    pub(crate) fn from_accepted(
        selector: &Selector, stream: net::TcpStream,
    ) -> Result<Self> {
        let _ = stream.set_nodelay(true);
        let interest = Interest::READ | Interest::WRITE;
        Selectable::register(selector, stream, interest)
            .map(|inner| Self { inner })
    }

    /// Returns the local address.
    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.source().local_addr()
    }

    /// Returns the peer address.
    #[inline]
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.source().peer_addr()
    }

    /// Closes the stream, failing pending reads and writes.
    #[inline]
    pub fn close(&self) {
        self.inner.close();
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl AsyncRead for TcpStream {
    fn poll_read(
        self: Pin<&mut Self>, cx: &mut Context, buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        self.inner.poll_io(cx, Interest::READ, |mut stream| stream.read(buf))
    }
}

impl AsyncWrite for TcpStream {
    fn poll_write(
        self: Pin<&mut Self>, cx: &mut Context, buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.inner.poll_io(cx, Interest::WRITE, |mut stream| stream.write(buf))
    }

    #[inline]
    fn poll_flush(
        self: Pin<&mut Self>, _cx: &mut Context,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(
        self: Pin<&mut Self>, _cx: &mut Context,
    ) -> Poll<io::Result<()>> {
        match self.inner.source().shutdown(Shutdown::Write) {
            Err(err) if err.kind() != io::ErrorKind::NotConnected => {
                Poll::Ready(Err(err))
            }
            _ => Poll::Ready(Ok(())),
        }
    }
}
