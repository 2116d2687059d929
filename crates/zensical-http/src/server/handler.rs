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

//! Request handler.

use futures_lite::future::Boxed;

use crate::message::{Request, Response};

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Request handler.
///
/// Handlers are shared by all connections of a server, and run concurrently,
/// each request in a task of its own. Closures returning a future of a
/// [`Response`] implement this trait.
///
/// # Examples
///
/// ```
/// use futures_lite::future;
/// use zensical_http::server::Handler;
/// use zensical_http::{Request, Response};
///
/// // Create handler echoing the request target
/// let handler = |req: Request| async move { Response::new().body(req.target) };
/// let res = future::block_on(handler.handle(Request::new().target("/a")));
/// assert_eq!(res.body.data, b"/a");
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handles a request.
    fn handle(&self, request: Request) -> Boxed<Response>;
}

// ----------------------------------------------------------------------------
// Blanket implementations
// ----------------------------------------------------------------------------

impl<F, R> Handler for F
where
    F: Fn(Request) -> R + Send + Sync + 'static,
    R: Future<Output = Response> + Send + 'static,
{
    #[inline]
    fn handle(&self, request: Request) -> Boxed<Response> {
        Box::pin(self(request))
    }
}
