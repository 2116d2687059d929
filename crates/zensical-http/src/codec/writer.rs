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

//! Message writer.

use futures_lite::io::{AsyncWrite, AsyncWriteExt};
use std::io;

use crate::message::{Body, Framing, Header, Headers, Method, Request};
use crate::message::{Response, Version};

use super::encoding::{Encoder, Identity, encoder};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Maximum size of a chunk written by the chunked encoder.
const CHUNK_SIZE: usize = 16 * 1024;

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Encodes a request, appending it to the buffer.
///
/// Framing headers are derived from the body, replacing any given ones:
/// chunked bodies are written with `Transfer-Encoding: chunked`, all others
/// with `Content-Length`, which is omitted for empty bodies of methods that
/// don't carry a body by default.
///
/// # Examples
///
/// ```
/// use zensical_http::codec::encode_request;
/// use zensical_http::{Method, Request};
///
/// // Encode request
/// let req = Request::new()
///     .method(Method::Post)
///     .header("Host", "example.com")
///     .body("hi");
///
/// let mut buf = Vec::new();
/// encode_request(&req, &mut buf);
/// assert_eq!(
///     buf,
///     b"POST / HTTP/1.1\r\nHost: example.com\r\nContent-Length: 2\r\n\r\nhi"
/// );
/// ```
pub fn encode_request(request: &Request, buf: &mut Vec<u8>) {
    let body = &request.body;
    buf.reserve(64 + request.headers.len() * 64 + body.len());
    buf.extend_from_slice(request.method.name().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(request.target.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(request.version.as_str().as_bytes());
    buf.extend_from_slice(b"\r\n");
    encode_headers(&request.headers, buf);

    // Requests can't be delimited by closing the connection
    match body.framing {
        Framing::Chunked => encode_chunked_header(buf),
        Framing::Length(_) | Framing::UntilClose => {
            if !(body.is_empty() && request.method.is_bodyless()) {
                encode_length_header(body.len(), buf);
            }
        }
    }
    buf.extend_from_slice(b"\r\n");
    encode_body(body, buf);
}

/// Encodes a response to a request with the given method, appending it to
/// the buffer.
///
/// Framing headers are derived from the body, replacing any given ones.
/// Responses to `HEAD` keep their framing headers, but omit the body, and
/// responses with a status that doesn't allow a body omit both. Chunked
/// bodies of HTTP/1.0 responses are delimited by closing the connection.
pub fn encode_response(response: &Response, method: Method, buf: &mut Vec<u8>) {
    let body = &response.body;
    buf.reserve(64 + response.headers.len() * 64 + body.len());
    buf.extend_from_slice(response.version.as_str().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(response.status.code().to_string().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(response.reason.as_bytes());
    buf.extend_from_slice(b"\r\n");
    encode_headers(&response.headers, buf);

    // Determine framing, which HTTP/1.0 peers only understand partially
    let allows_body = response.status.allows_body();
    let framing = match body.framing {
        Framing::Chunked if response.version == Version::Http10 => {
            Framing::UntilClose
        }
        framing => framing,
    };
    if allows_body {
        match framing {
            Framing::Chunked => encode_chunked_header(buf),
            Framing::Length(_) => encode_length_header(body.len(), buf),
            Framing::UntilClose => {}
        }
    }
    buf.extend_from_slice(b"\r\n");
    if allows_body && method != Method::Head {
        if framing == Framing::UntilClose {
            buf.extend_from_slice(&body.data);
        } else {
            encode_body(body, buf);
        }
    }
}

/// Writes a request and flushes the writer.
///
/// # Errors
///
/// Returns an I/O error if writing failed.
pub async fn write_request<W>(writer: &mut W, request: &Request) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    encode_request(request, &mut buf);
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Writes a response to a request with the given method, and flushes the
/// writer.
///
/// # Errors
///
/// Returns an I/O error if writing failed.
pub async fn write_response<W>(
    writer: &mut W, response: &Response, method: Method,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    encode_response(response, method, &mut buf);
    writer.write_all(&buf).await?;
    writer.flush().await
}

// ----------------------------------------------------------------------------

/// Encodes headers, except for framing headers.
fn encode_headers(headers: &Headers, buf: &mut Vec<u8>) {
    let framing = [Header::ContentLength, Header::TransferEncoding];
    for (name, value) in headers.iter() {
        if framing.iter().any(|header| name.eq_ignore_ascii_case(header.name())) {
            continue;
        }
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
}

/// Encodes a `Content-Length` header.
fn encode_length_header(len: usize, buf: &mut Vec<u8>) {
    buf.extend_from_slice(Header::ContentLength.name().as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(len.to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Encodes a `Transfer-Encoding: chunked` header.
fn encode_chunked_header(buf: &mut Vec<u8>) {
    buf.extend_from_slice(Header::TransferEncoding.name().as_bytes());
    buf.extend_from_slice(b": chunked\r\n");
}

/// Encodes a body with the encoder matching its framing.
fn encode_body(body: &Body, buf: &mut Vec<u8>) {
    let mut encoder: Box<dyn Encoder> =
        encoder(body.framing.encoding()).unwrap_or_else(|| Box::new(Identity));
    for chunk in body.data.chunks(CHUNK_SIZE) {
        encoder.encode(chunk, buf);
    }
    encoder.finish(&body.trailers, buf);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::future;
    use futures_lite::io::BufReader;

    use crate::codec::{read_request, read_response};
    use crate::config::Limits;
    use crate::message::Status;

    use super::*;

    #[test]
    fn test_get_without_content_length() {
        let req = Request::new().header("Content-Length", "10");
        let mut buf = Vec::new();
        encode_request(&req, &mut buf);
        assert_eq!(buf, b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn test_chunked_request_with_trailers() {
        let body = Body::chunked("hello").trailer("X-Digest", "abc");
        let req = Request::new().method(Method::Put).body(body);
        let mut buf = Vec::new();
        encode_request(&req, &mut buf);

        // Reading the request yields the same body
        let mut reader = BufReader::new(buf.as_slice());
        let limits = Limits::default();
        let res = future::block_on(read_request(&mut reader, &limits));
        let parsed = res.unwrap().unwrap();
        assert_eq!(parsed.body, req.body);
    }

    #[test]
    fn test_head_response_omits_body() {
        let res = Response::new().body("hello");
        let mut buf = Vec::new();
        encode_response(&res, Method::Head, &mut buf);
        assert_eq!(buf, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n");
    }

    #[test]
    fn test_no_content_omits_framing() {
        let res = Response::new().status(Status::NO_CONTENT).body("x");
        let mut buf = Vec::new();
        encode_response(&res, Method::Get, &mut buf);
        assert_eq!(buf, b"HTTP/1.1 204 No Content\r\n\r\n");
    }

    #[test]
    fn test_response_round_trip() {
        let res = Response::new()
            .status(Status::CREATED)
            .header("Set-Cookie", "a=1")
            .header("Set-Cookie", "b=2")
            .body(Body::chunked(vec![7; 40_000]));
        let mut buf = Vec::new();
        encode_response(&res, Method::Post, &mut buf);

        let mut reader = BufReader::new(buf.as_slice());
        let limits = Limits::default();
        let parsed = future::block_on(read_response(
            &mut reader,
            Method::Post,
            &limits,
        ))
        .unwrap();
        assert_eq!(parsed.status, Status::CREATED);
        assert_eq!(parsed.headers.get_all("set-cookie").count(), 2);
        assert_eq!(parsed.body.data, res.body.data);
    }
}
