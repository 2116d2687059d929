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

//! HTTP request.

use super::{Body, Headers, Method, Version};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP request.
///
/// While all members of this struct are public, there are also some dedicated
/// methods with identical names, providing a builder-like interface.
///
/// # Examples
///
/// ```
/// use zensical_http::message::Header;
/// use zensical_http::{Method, Request};
///
/// // Create request
/// let req = Request::new()
///     .method(Method::Post)
///     .target("/upload")
///     .header(Header::ContentType, "text/plain")
///     .body("Hello, world!");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Request target, in origin form or absolute form.
    pub target: String,
    /// Request version.
    pub version: Version,
    /// Request headers.
    pub headers: Headers,
    /// Request body.
    pub body: Body,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Request {
    /// Creates a `GET` request for `/`.
    ///
    /// # Examples
    ///
    /// ```
    /// use zensical_http::{Method, Request};
    ///
    /// // Create request
    /// let req = Request::new();
    /// assert_eq!(req.method, Method::Get);
    /// assert_eq!(req.target, "/");
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { target: String::from("/"), ..Default::default() }
    }

    /// Sets the request method.
    #[inline]
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the request target.
    #[inline]
    #[must_use]
    pub fn target<T>(mut self, target: T) -> Self
    where
        T: Into<String>,
    {
        self.target = target.into();
        self
    }

    /// Sets the request version.
    #[inline]
    #[must_use]
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Appends a request header.
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

    /// Sets the request body.
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
