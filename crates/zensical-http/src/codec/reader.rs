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

//! Message reader.

use futures_lite::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use memchr::memchr;
use std::io;
use tracing::trace;

use crate::config::Limits;
use crate::message::{Body, Framing, Method, Request, Response, Status};

use super::chunked::ChunkedDecoder;
use super::error::{ParseError, Result};
use super::framing::{request_framing, response_framing};
use super::parser::{parse_request_head, parse_response_head};

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Reads a request, including its body.
///
/// Returns [`None`] if the stream ended cleanly before the request started,
/// which is how a peer closes a persistent connection.
///
/// # Errors
///
/// Returns an I/O error if reading failed, and a [`ParseError`] if the
/// request is malformed, exceeds the limits, or ends prematurely.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use futures_lite::future;
/// use futures_lite::io::BufReader;
/// use zensical_http::codec::read_request;
/// use zensical_http::config::Limits;
///
/// // Read request with body
/// let bytes = b"POST / HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi".as_slice();
/// let mut reader = BufReader::new(bytes);
/// let req = future::block_on(read_request(&mut reader, &Limits::default()))?;
/// assert_eq!(req.unwrap().body.data, b"hi");
/// # Ok(())
/// # }
/// ```
pub async fn read_request<R>(
    reader: &mut R, limits: &Limits,
) -> Result<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(head) = read_head(reader, limits, true).await? else {
        return Ok(None);
    };
    let mut request = parse_request_head(&head, limits)?;
    let framing = request_framing(&request)?;
    request.body = read_body(reader, framing, limits).await?;
    Ok(Some(request))
}

/// Reads the final response to a request with the given method.
///
/// Interim responses, except `101 Switching Protocols`, are skipped.
///
/// # Errors
///
/// Returns an I/O error of kind [`io::ErrorKind::UnexpectedEof`] if the
/// stream ended before the response started, other I/O errors if reading
/// failed, and a [`ParseError`] if the response is malformed, exceeds the
/// limits, or ends prematurely.
pub async fn read_response<R>(
    reader: &mut R, method: Method, limits: &Limits,
) -> Result<Response>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let head = read_head(reader, limits, false)
            .await?
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;

        // Skip interim responses, as the final response follows
        let mut response = parse_response_head(&head, limits)?;
        let status = response.status;
        if status.is_informational() && status != Status::SWITCHING_PROTOCOLS {
            trace!(status = status.code(), "skipped interim response");
            continue;
        }
        let framing = response_framing(&response, method)?;
        response.body = read_body(reader, framing, limits).await?;
        return Ok(response);
    }
}

/// Reads a body with the given framing.
///
/// # Errors
///
/// Returns an I/O error if reading failed, and a [`ParseError`] if the body
/// is malformed or ends before its declared length.
pub async fn read_body<R>(
    reader: &mut R, framing: Framing, limits: &Limits,
) -> Result<Body>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Body { framing, ..Body::default() };
    match framing {
        Framing::Length(expected) => {
            let capacity = usize::try_from(expected).unwrap_or(usize::MAX);
            body.data.reserve(capacity.min(64 * 1024));

            // Read exactly the declared length
            let mut remaining = expected;
            while remaining > 0 {
                let buf = reader.fill_buf().await?;
                if buf.is_empty() {
                    let received = expected - remaining;
                    let err = ParseError::PrematureEnd { expected, received };
                    return Err(err.into());
                }
                let n = usize::try_from(remaining)
                    .map_or(buf.len(), |remaining| remaining.min(buf.len()));
                body.data.extend_from_slice(&buf[..n]);
                reader.consume(n);
                remaining -= n as u64;
            }
        }

        // Feed the decoder until the terminating chunk and trailers are read
        Framing::Chunked => {
            let mut decoder = ChunkedDecoder::new(*limits);
            while !decoder.is_done() {
                let buf = reader.fill_buf().await?;
                if buf.is_empty() {
                    return Err(ParseError::ChunkedEof.into());
                }
                let n = decoder.decode(buf, &mut body.data)?;
                reader.consume(n);
            }
            body.trailers = decoder.into_trailers();
        }

        Framing::UntilClose => {
            reader.read_to_end(&mut body.data).await?;
        }
    }
    Ok(body)
}

// ----------------------------------------------------------------------------

/// Reads a head up to and including the terminating blank line.
///
/// Returns [`None`] if the stream ended before the head started. If empty
/// lines are skipped, they're not counted as the start of the head.
async fn read_head<R>(
    reader: &mut R, limits: &Limits, skip_empty: bool,
) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::new();
    let mut lines = 0;
    loop {
        let start = head.len();
        if read_line(reader, &mut head, limits.max_line_length).await? == 0 {
            return if head.is_empty() {
                Ok(None)
            } else {
                Err(ParseError::HeadEof.into())
            };
        }

        // An empty line ends the head, unless it precedes the start line
        let line = &head[start..];
        if line == b"\r\n" || line == b"\n" {
            if lines > 0 {
                return Ok(Some(head));
            } else if skip_empty {
                head.truncate(start);
                continue;
            }
            return Err(ParseError::StartLine.into());
        }

        // The start line is not counted as a header
        lines += 1;
        if lines > limits.max_headers + 1 {
            return Err(ParseError::TooManyHeaders(limits.max_headers).into());
        }
    }
}

/// Reads a line including its terminator, appending it to the buffer.
///
/// Returns the number of bytes read, which is zero at the end of the stream.
/// A line that is cut off by the end of the stream is returned as is.
async fn read_line<R>(
    reader: &mut R, buf: &mut Vec<u8>, limit: usize,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut total = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(total);
        }
        let (n, done) = match memchr(b'\n', available) {
            Some(index) => (index + 1, true),
            None => (available.len(), false),
        };

        // The limit excludes the line terminator
        total += n;
        if total > limit + 2 || (!done && total > limit + 1) {
            return Err(ParseError::LineTooLong(limit).into());
        }
        buf.extend_from_slice(&available[..n]);
        reader.consume(n);
        if done {
            return Ok(total);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::future;
    use futures_lite::io::{AsyncRead, BufReader};
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use crate::codec::Error;

    use super::*;

    /// Reader that delivers a single byte per read.
    struct Trickle<'a>(&'a [u8]);

    impl<'a> AsyncRead for Trickle<'a> {
        fn poll_read(
            mut self: Pin<&mut Self>, _cx: &mut Context, buf: &mut [u8],
        ) -> Poll<io::Result<usize>> {
            let data: &'a [u8] = self.0;
            match (data.split_first(), buf.first_mut()) {
                (Some((byte, rest)), Some(slot)) => {
                    *slot = *byte;
                    self.0 = rest;
                    Poll::Ready(Ok(1))
                }
                _ => Poll::Ready(Ok(0)),
            }
        }
    }

    fn parse_error<T>(res: Result<T>) -> ParseError {
        match res {
            Err(Error::Parse(err)) => err,
            Err(Error::Io(err)) => panic!("unexpected I/O error: {err}"),
            Ok(_) => panic!("unexpected success"),
        }
    }

    #[test]
    fn test_request_byte_at_a_time() {
        let bytes = b"\r\nPOST /a HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
                      4\r\nwiki\r\n0\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let mut reader = BufReader::new(Trickle(bytes));
        let limits = Limits::default();
        future::block_on(async {
            let req = read_request(&mut reader, &limits).await.unwrap().unwrap();
            assert_eq!(req.target, "/a");
            assert_eq!(req.body.framing, Framing::Chunked);
            assert_eq!(req.body.data, b"wiki");

            // Pipelined request follows
            let req = read_request(&mut reader, &limits).await.unwrap().unwrap();
            assert_eq!(req.target, "/b");
            assert!(read_request(&mut reader, &limits).await.unwrap().is_none());
        });
    }

    #[test]
    fn test_response_skips_interim() {
        let bytes = b"HTTP/1.1 100 Continue\r\n\r\n\
                      HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabc";
        let mut reader = BufReader::new(bytes.as_slice());
        let res = future::block_on(read_response(
            &mut reader,
            Method::Post,
            &Limits::default(),
        ))
        .unwrap();
        assert_eq!(res.status, Status::OK);
        assert_eq!(res.body.data, b"abc");
    }

    #[test]
    fn test_response_until_close() {
        let bytes = b"HTTP/1.0 200 OK\r\n\r\nthe rest";
        let mut reader = BufReader::new(Trickle(bytes));
        let res = future::block_on(read_response(
            &mut reader,
            Method::Get,
            &Limits::default(),
        ))
        .unwrap();
        assert_eq!(res.body.framing, Framing::UntilClose);
        assert_eq!(res.body.data, b"the rest");
    }

    #[test]
    fn test_premature_end_of_body() {
        let bytes = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc";
        let mut reader = BufReader::new(bytes.as_slice());
        let res = future::block_on(read_response(
            &mut reader,
            Method::Get,
            &Limits::default(),
        ));
        let err = parse_error(res);
        assert_eq!(err, ParseError::PrematureEnd { expected: 10, received: 3 });
    }

    #[test]
    fn test_oversize_line() {
        let limits = Limits { max_line_length: 16, ..Limits::default() };
        let bytes = b"GET /a-very-long-target HTTP/1.1\r\n\r\n";
        let mut reader = BufReader::new(Trickle(bytes));
        let res = future::block_on(read_request(&mut reader, &limits));
        assert_eq!(parse_error(res), ParseError::LineTooLong(16));
    }

    #[test]
    fn test_end_of_stream_before_response() {
        let mut reader = BufReader::new(b"".as_slice());
        let res = future::block_on(read_response(
            &mut reader,
            Method::Get,
            &Limits::default(),
        ));
        match res {
            Err(Error::Io(err)) => {
                assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
            }
            _ => panic!("expected end of stream"),
        }
    }

    #[test]
    fn test_end_of_stream_inside_head() {
        let mut reader = BufReader::new(b"HTTP/1.1 200 OK\r\nA: b".as_slice());
        let res = future::block_on(read_response(
            &mut reader,
            Method::Get,
            &Limits::default(),
        ));
        assert_eq!(parse_error(res), ParseError::HeadEof);
    }
}
