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

//! HTTP response.

use super::{Body, Headers, Status, Version};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP response.
///
/// While all members of this struct are public, there are also some dedicated
/// methods with identical names, providing a builder-like interface. Received
/// responses keep the reason phrase as sent by the peer.
///
/// # Examples
///
/// ```
/// use zensical_http::message::Header;
/// use zensical_http::{Response, Status};
///
/// // Create response
/// let res = Response::new()
///     .status(Status::OK)
///     .header(Header::ContentType, "text/plain")
///     .body("Hello, world!");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// Response version.
    pub version: Version,
    /// Response status.
    pub status: Status,
    /// Response reason phrase.
    pub reason: String,
    /// Response headers.
    pub headers: Headers,
    /// Response body.
    pub body: Body,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Response {
    /// Creates a `200 OK` response.
    ///
    /// # Examples
    ///
    /// ```
    /// use zensical_http::{Response, Status};
    ///
    /// // Create response
    /// let res = Response::new();
    /// assert_eq!(res.status, Status::OK);
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response status, and the canonical reason phrase.
    #[inline]
    #[must_use]
    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self.reason = status.reason().unwrap_or_default().to_string();
        self
    }

    /// Sets the response version.
    #[inline]
    #[must_use]
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Appends a response header.
    #[inline]
    #[must_use]
    pub fn header<N, V>(mut self, name: N, value: V) -> Self
    where
        N: AsRef<str>,
        V: ToString,
    {
        self.headers.append(name, value);
        self
    }

    /// Sets the response body.
    #[inline]
    #[must_use]
    pub fn body<B>(mut self, body: B) -> Self
    where
        B: Into<Body>,
    {
        self.body = body.into();
        self
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Response {
    /// Creates a `200 OK` response.
    fn default() -> Self {
        Self {
            version: Version::Http11,
            status: Status::OK,
            reason: String::from("OK"),
            headers: Headers::new(),
            body: Body::empty(),
        }
    }
}
