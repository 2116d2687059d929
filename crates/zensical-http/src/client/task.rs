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

//! Request task.

use zensical_net::sync::{Deferred, Promise, promise};

use crate::error::Result;
use crate::message::{Request, Response};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Request task.
///
/// A task pairs a request with the promise through which its outcome is
/// delivered. It is handed from the caller to a pipeline writer, and from
/// there to the reader, which completes it. The caller awaits the deferred
/// side, and dropping it cancels the task.
#[derive(Debug)]
pub struct RequestTask {
    /// Request.
    pub request: Request,
    /// Promise of the outcome.
    pub promise: Promise<Result<Response>>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl RequestTask {
    /// Creates a task, returning it together with its outcome.
    #[must_use]
    pub fn new(request: Request) -> (Self, Deferred<Result<Response>>) {
        let (promise, deferred) = promise();
        (Self { request, promise }, deferred)
    }

    /// Returns whether the caller stopped waiting for the outcome.
    #[inline]
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.promise.is_canceled()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::future;

    use crate::error::Error;

    use super::*;

    #[test]
    fn test_dropped_outcome_cancels() {
        let (task, deferred) = RequestTask::new(Request::new());
        assert!(!task.is_canceled());
        drop(deferred);
        assert!(task.is_canceled());
        let err = Error::Canceled { host: "example.com".into() };
        assert!(task.promise.complete(Err(err)).is_err());
    }

    #[test]
    fn test_outcome_is_delivered() {
        let (task, deferred) = RequestTask::new(Request::new());
        task.promise.complete(Ok(Response::new())).unwrap();
        let res = future::block_on(deferred).unwrap().unwrap();
        assert_eq!(res.status.code(), 200);
    }
}
