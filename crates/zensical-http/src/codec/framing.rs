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

//! Body framing and connection options.

use crate::message::{Framing, Header, Headers, Method, Request, Response};
use crate::message::Version;

use super::error::ParseError;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Connection options, as given by the `Connection` header.
///
/// # Examples
///
/// ```
/// use zensical_http::codec::ConnectionOptions;
/// use zensical_http::message::{Headers, Version};
///
/// // Parse connection options
/// let mut headers = Headers::new();
/// headers.append("Connection", "Keep-Alive, Upgrade");
/// let options = ConnectionOptions::parse(&headers);
/// assert!(options.keep_alive && options.upgrade);
///
/// // Upgrades always take over the connection
/// assert!(options.is_last(Version::Http11));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Connection is closed after the exchange.
    pub close: bool,
    /// Connection is kept alive after the exchange.
    pub keep_alive: bool,
    /// Connection is upgraded to another protocol.
    pub upgrade: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl ConnectionOptions {
    /// Parses connection options from all `Connection` headers.
    ///
    /// Unknown options are ignored.
    #[must_use]
    pub fn parse(headers: &Headers) -> Self {
        let mut options = Self::default();
        let values = headers.get_all(Header::Connection);
        for option in values.flat_map(|value| value.split(',')) {
            let option = option.trim();
            if option.eq_ignore_ascii_case("close") {
                options.close = true;
            } else if option.eq_ignore_ascii_case("keep-alive") {
                options.keep_alive = true;
            } else if option.eq_ignore_ascii_case("upgrade") {
                options.upgrade = true;
            }
        }
        options
    }

    /// Returns whether the exchange is the last one on its connection.
    ///
    /// HTTP/1.1 connections are persistent unless closed explicitly, while
    /// HTTP/1.0 connections must opt into keep-alive.
    #[must_use]
    pub fn is_last(&self, version: Version) -> bool {
        self.close
            || self.upgrade
            || (version == Version::Http10 && !self.keep_alive)
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns the framing of a received request body.
///
/// Requests without `Transfer-Encoding` or `Content-Length` have no body.
///
/// # Errors
///
/// Returns [`ParseError::TransferEncoding`] if the final transfer coding is
/// not `chunked`, and [`ParseError::ContentLength`] if the `Content-Length`
/// headers are invalid or disagree.
pub fn request_framing(request: &Request) -> Result<Framing, ParseError> {
    match final_coding(&request.headers) {
        Some(true) => Ok(Framing::Chunked),
        Some(false) => Err(ParseError::TransferEncoding),
        None => content_length(&request.headers)
            .map(|length| Framing::Length(length.unwrap_or(0))),
    }
}

/// Returns the framing of a received response body.
///
/// Responses to `HEAD`, interim responses and `204`/`304` responses have no
/// body, and neither do successful responses to `CONNECT`, as the connection
/// turns into a tunnel. Responses without usable framing headers are read
/// until the connection is closed.
///
/// # Errors
///
/// Returns [`ParseError::ContentLength`] if the `Content-Length` headers are
/// invalid or disagree.
pub fn response_framing(
    response: &Response, method: Method,
) -> Result<Framing, ParseError> {
    let status = response.status;
    if method == Method::Head
        || !status.allows_body()
        || (method == Method::Connect && status.is_success())
    {
        return Ok(Framing::Length(0));
    }
    match final_coding(&response.headers) {
        Some(true) => Ok(Framing::Chunked),
        Some(false) => Ok(Framing::UntilClose),
        None => content_length(&response.headers)
            .map(|length| length.map_or(Framing::UntilClose, Framing::Length)),
    }
}

// ----------------------------------------------------------------------------

/// Returns whether the final transfer coding is `chunked`, if any is given.
fn final_coding(headers: &Headers) -> Option<bool> {
    let values = headers.get_all(Header::TransferEncoding);
    values
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|coding| !coding.is_empty())
        .last()
        .map(|coding| coding.eq_ignore_ascii_case("chunked"))
}

/// Returns the content length, if given.
///
/// Duplicate values, whether in separate headers or a comma-separated list,
/// are accepted only if they agree.
fn content_length(headers: &Headers) -> Result<Option<u64>, ParseError> {
    let mut length = None;
    let values = headers.get_all(Header::ContentLength);
    for value in values.flat_map(|value| value.split(',')) {
        let value = value.trim();
        if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ParseError::ContentLength);
        }
        let value = value.parse().map_err(|_| ParseError::ContentLength)?;
        match length {
            Some(length) if length != value => {
                return Err(ParseError::ContentLength);
            }
            _ => length = Some(value),
        }
    }
    Ok(length)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::message::Status;

    use super::*;

    fn response(headers: &[(&str, &str)]) -> Response {
        let mut res = Response::new();
        res.headers = headers.iter().copied().collect();
        res
    }

    #[test]
    fn test_chunked_takes_precedence() {
        let res = response(&[
            ("Content-Length", "10"),
            ("Transfer-Encoding", "gzip, chunked"),
        ]);
        let framing = response_framing(&res, Method::Get).unwrap();
        assert_eq!(framing, Framing::Chunked);
    }

    #[test]
    fn test_response_until_close() {
        let res = response(&[]);
        let framing = response_framing(&res, Method::Get).unwrap();
        assert_eq!(framing, Framing::UntilClose);
        let res = response(&[("Transfer-Encoding", "gzip")]);
        let framing = response_framing(&res, Method::Get).unwrap();
        assert_eq!(framing, Framing::UntilClose);
    }

    #[test]
    fn test_response_without_body() {
        let res = response(&[("Content-Length", "10")]);
        let framing = response_framing(&res, Method::Head).unwrap();
        assert_eq!(framing, Framing::Length(0));
        let res = res.status(Status::NOT_MODIFIED);
        let framing = response_framing(&res, Method::Get).unwrap();
        assert_eq!(framing, Framing::Length(0));
    }

    #[test]
    fn test_content_length_duplicates() {
        let res = response(&[("Content-Length", "5, 5"), ("Content-Length", "5")]);
        let framing = response_framing(&res, Method::Get).unwrap();
        assert_eq!(framing, Framing::Length(5));
        let res = response(&[("Content-Length", "5"), ("Content-Length", "6")]);
        let err = response_framing(&res, Method::Get).unwrap_err();
        assert_eq!(err, ParseError::ContentLength);
        let res = response(&[("Content-Length", "+5")]);
        let err = response_framing(&res, Method::Get).unwrap_err();
        assert_eq!(err, ParseError::ContentLength);
    }

    #[test]
    fn test_request_framing() {
        let req = Request::new();
        assert_eq!(request_framing(&req), Ok(Framing::Length(0)));
        let req = Request::new().header("Transfer-Encoding", "chunked, gzip");
        assert_eq!(request_framing(&req), Err(ParseError::TransferEncoding));
    }

    #[test]
    fn test_http10_needs_keep_alive() {
        let options = ConnectionOptions::default();
        assert!(options.is_last(Version::Http10));
        assert!(!options.is_last(Version::Http11));
        let options = ConnectionOptions { keep_alive: true, ..options };
        assert!(!options.is_last(Version::Http10));
    }
}
