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

//! Head parser.

use crate::config::Limits;
use crate::message::{Body, Headers, Request, Response, Status, Version};

use super::error::ParseError;

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Parses a complete request head, including the terminating blank line.
///
/// Empty lines preceding the request line are skipped. The returned request
/// has an empty body, which is read separately according to its framing.
///
/// # Errors
///
/// Returns a [`ParseError`] if the head is malformed, incomplete, or exceeds
/// the given limits.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use zensical_http::codec::parse_request_head;
/// use zensical_http::config::Limits;
/// use zensical_http::Method;
///
/// // Parse request head
/// let head = b"\r\nGET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
/// let req = parse_request_head(head, &Limits::default())?;
/// assert_eq!(req.method, Method::Get);
/// assert_eq!(req.target, "/index.html");
/// assert_eq!(req.headers.get("host"), Some("example.com"));
/// # Ok(())
/// # }
/// ```
pub fn parse_request_head(
    bytes: &[u8], limits: &Limits,
) -> Result<Request, ParseError> {
    let mut headers = vec![httparse::EMPTY_HEADER; limits.max_headers];
    let mut req = httparse::Request::new(&mut headers);
    check(req.parse(skip_empty_lines(bytes)), limits)?;

    // A complete parse guarantees method, path and version
    let method = req.method.ok_or(ParseError::StartLine)?.parse()?;
    let target = req.path.ok_or(ParseError::StartLine)?;
    let version = req.version.ok_or(ParseError::StartLine)?;
    Ok(Request {
        method,
        target: target.to_string(),
        version: Version::from_minor(version),
        headers: convert(req.headers),
        body: Body::empty(),
    })
}

/// Parses a complete response head, including the terminating blank line.
///
/// The returned response has an empty body, which is read separately
/// according to its framing.
///
/// # Errors
///
/// Returns a [`ParseError`] if the head is malformed, incomplete, or exceeds
/// the given limits.
pub fn parse_response_head(
    bytes: &[u8], limits: &Limits,
) -> Result<Response, ParseError> {
    let mut headers = vec![httparse::EMPTY_HEADER; limits.max_headers];
    let mut res = httparse::Response::new(&mut headers);
    check(res.parse(bytes), limits)?;

    // A complete parse guarantees version and code
    let version = res.version.ok_or(ParseError::StartLine)?;
    let code = res.code.ok_or(ParseError::StartLine)?;
    Ok(Response {
        version: Version::from_minor(version),
        status: Status::from_code(code),
        reason: res.reason.unwrap_or_default().to_string(),
        headers: convert(res.headers),
        body: Body::empty(),
    })
}

// ----------------------------------------------------------------------------

/// Checks the outcome of the parser.
fn check(
    status: httparse::Result<usize>, limits: &Limits,
) -> Result<(), ParseError> {
    match status {
        Ok(httparse::Status::Complete(_)) => Ok(()),
        Ok(httparse::Status::Partial) => Err(ParseError::HeadEof),
        Err(httparse::Error::TooManyHeaders) => {
            Err(ParseError::TooManyHeaders(limits.max_headers))
        }
        Err(err) => Err(err.into()),
    }
}

/// Converts parsed headers, replacing invalid UTF-8 in values.
fn convert(headers: &[httparse::Header]) -> Headers {
    headers
        .iter()
        .map(|header| (header.name, String::from_utf8_lossy(header.value)))
        .collect()
}

/// Returns the bytes following any leading empty lines.
fn skip_empty_lines(mut bytes: &[u8]) -> &[u8] {
    loop {
        if let Some(rest) = bytes.strip_prefix(b"\r\n") {
            bytes = rest;
        } else if let Some(rest) = bytes.strip_prefix(b"\n") {
            bytes = rest;
        } else {
            return bytes;
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::message::Method;

    use super::*;

    #[test]
    fn test_request_preserves_duplicates() {
        let head = b"POST /a HTTP/1.0\r\nX-A: 1\r\nx-a: 2\r\nHost: h\r\n\r\n";
        let req = parse_request_head(head, &Limits::default()).unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.version, Version::Http10);
        assert_eq!(req.headers.get_all("X-A").collect::<Vec<_>>(), ["1", "2"]);
        assert_eq!(req.headers.len(), 3);
    }

    #[test]
    fn test_request_malformed_start_line() {
        let limits = Limits::default();
        let err = parse_request_head(b"GET\r\n\r\n", &limits).unwrap_err();
        assert_eq!(err, ParseError::StartLine);
        let err = parse_request_head(b"BREW / HTTP/1.1\r\n\r\n", &limits);
        assert_eq!(err.unwrap_err(), ParseError::Method);
    }

    #[test]
    fn test_request_too_many_headers() {
        let limits = Limits { max_headers: 1, ..Limits::default() };
        let head = b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\n\r\n";
        let err = parse_request_head(head, &limits).unwrap_err();
        assert_eq!(err, ParseError::TooManyHeaders(1));
    }

    #[test]
    fn test_response_keeps_reason() {
        let head = b"HTTP/1.1 599 Custom Thing\r\nContent-Length: 0\r\n\r\n";
        let res = parse_response_head(head, &Limits::default()).unwrap();
        assert_eq!(res.status.code(), 599);
        assert_eq!(res.reason, "Custom Thing");
    }

    #[test]
    fn test_response_incomplete() {
        let head = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n";
        let err = parse_response_head(head, &Limits::default()).unwrap_err();
        assert_eq!(err, ParseError::HeadEof);
    }
}
