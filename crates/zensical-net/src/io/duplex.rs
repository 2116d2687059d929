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

//! In-memory duplex stream.

use futures_lite::io::{AsyncRead, AsyncWrite};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// In-memory duplex stream.
///
/// Each endpoint reads what the other endpoint writes. Writes are bounded by
/// the capacity of the underlying pipe, so a writer suspends until its peer
/// reads, which mirrors the backpressure of a socket.
#[derive(Debug)]
pub struct DuplexStream {
    /// Pipe read from.
    read: Arc<Mutex<Pipe>>,
    /// Pipe written to.
    write: Arc<Mutex<Pipe>>,
}

/// Unidirectional pipe.
#[derive(Debug)]
struct Pipe {
    /// Buffered bytes.
    buffer: VecDeque<u8>,
    /// Capacity.
    capacity: usize,
    /// Whether the writing side is closed.
    closed: bool,
    /// Whether the reading side is gone.
    dropped: bool,
    /// Waker of the reading side.
    reader: Option<Waker>,
    /// Waker of the writing side.
    writer: Option<Waker>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Pipe {
    /// Creates a pipe with the given capacity.
    fn new(capacity: usize) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            closed: false,
            dropped: false,
            reader: None,
            writer: None,
        }))
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl AsyncRead for DuplexStream {
    fn poll_read(
        self: Pin<&mut Self>, cx: &mut Context, buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let mut pipe = self.read.lock();
        if pipe.buffer.is_empty() {
            if pipe.closed || buf.is_empty() {
                return Poll::Ready(Ok(0));
            }
            pipe.reader = Some(cx.waker().clone());
            return Poll::Pending;
        }

        // Copy as much as fits, and make room for the writer
        let n = buf.len().min(pipe.buffer.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.buffer.drain(..n)) {
            *slot = byte;
        }
        if let Some(waker) = pipe.writer.take() {
            waker.wake();
        }
        Poll::Ready(Ok(n))
    }
}

impl AsyncWrite for DuplexStream {
    fn poll_write(
        self: Pin<&mut Self>, cx: &mut Context, buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut pipe = self.write.lock();
        if pipe.dropped || pipe.closed {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let room = pipe.capacity - pipe.buffer.len();
        if room == 0 {
            pipe.writer = Some(cx.waker().clone());
            return Poll::Pending;
        }

        // Buffer as much as fits, and wake the reader
        let n = buf.len().min(room);
        pipe.buffer.extend(&buf[..n]);
        if let Some(waker) = pipe.reader.take() {
            waker.wake();
        }
        Poll::Ready(Ok(n))
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
        let mut pipe = self.write.lock();
        pipe.closed = true;
        if let Some(waker) = pipe.reader.take() {
            waker.wake();
        }
        Poll::Ready(Ok(()))
    }
}

impl Drop for DuplexStream {
    /// Closes both directions, so the peer observes end of stream.
    fn drop(&mut self) {
        let reader = {
            let mut write = self.write.lock();
            write.closed = true;
            write.reader.take()
        };
        let writer = {
            let mut read = self.read.lock();
            read.dropped = true;
            read.writer.take()
        };
        let wakers = [reader, writer];
        wakers.into_iter().flatten().for_each(Waker::wake);
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Creates a pair of connected in-memory streams.
///
/// Each direction buffers up to `capacity` bytes.
///
/// # Panics
///
/// Panics if the capacity is zero.
///
/// # Examples
///
/// ```
/// use futures_lite::{AsyncReadExt, AsyncWriteExt, future};
/// use zensical_net::io::duplex;
///
/// // Create connected streams and send bytes
/// let (mut a, mut b) = duplex(64);
/// future::block_on(async {
///     a.write_all(b"ping").await?;
///     let mut buf = [0; 4];
///     b.read_exact(&mut buf).await?;
///     assert_eq!(&buf, b"ping");
///     std::io::Result::Ok(())
/// })
/// .unwrap();
/// ```
#[must_use]
pub fn duplex(capacity: usize) -> (DuplexStream, DuplexStream) {
    assert!(capacity > 0, "duplex capacity must be positive");
    let a = Pipe::new(capacity);
    let b = Pipe::new(capacity);
    (
        DuplexStream { read: Arc::clone(&a), write: Arc::clone(&b) },
        DuplexStream { read: b, write: a },
    )
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::{AsyncReadExt, AsyncWriteExt, future};
    use std::pin::pin;

    use super::*;

    #[test]
    fn test_writer_suspends_at_capacity() {
        let (mut a, mut b) = duplex(4);
        future::block_on(async {
            assert_eq!(a.write(b"abcdef").await.unwrap(), 4);
            let mut write = pin!(a.write(b"ef"));
            assert!(future::poll_once(&mut write).await.is_none());

            // Reading makes room again
            let mut buf = [0; 2];
            b.read_exact(&mut buf).await.unwrap();
            assert_eq!(write.await.unwrap(), 2);
        });
    }

    #[test]
    fn test_close_and_drop() {
        let (mut a, mut b) = duplex(8);
        future::block_on(async {
            a.write_all(b"hi").await.unwrap();
            a.close().await.unwrap();
            let mut buf = Vec::new();
            b.read_to_end(&mut buf).await.unwrap();
            assert_eq!(buf, b"hi");

            // Writing to a dropped peer fails
            drop(a);
            let err = b.write_all(b"x").await.unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        });
    }
}
