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

//! One-shot promise.

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::{Error, Result};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Completing side of a one-shot value.
///
/// A promise is completed at most once. Dropping it without completing makes
/// the corresponding [`Deferred`] fail with [`Error::Canceled`].
pub struct Promise<T> {
    /// Shared state.
    shared: Arc<Mutex<Shared<T>>>,
    /// Whether the promise was completed.
    completed: bool,
}

/// Awaiting side of a one-shot value.
///
/// Dropping the deferred cancels it, which the completing side can observe
/// through [`Promise::is_canceled`] to skip work nobody waits for.
pub struct Deferred<T> {
    /// Shared state.
    shared: Arc<Mutex<Shared<T>>>,
}

/// Shared state of a promise.
struct Shared<T> {
    /// Completed value, until taken.
    value: Option<T>,
    /// Whether the promise was completed or abandoned.
    settled: bool,
    /// Whether the promise was dropped without completing.
    abandoned: bool,
    /// Whether the deferred was dropped.
    canceled: bool,
    /// Waker of the awaiting task.
    waker: Option<Waker>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl<T> Promise<T> {
    /// Completes the promise.
    ///
    /// # Errors
    ///
    /// Returns the value if the deferred was already dropped.
    pub fn complete(mut self, value: T) -> std::result::Result<(), T> {
        self.completed = true;
        let waker = {
            let mut shared = self.shared.lock();
            if shared.canceled {
                return Err(value);
            }
            shared.value = Some(value);
            shared.settled = true;
            shared.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    /// Returns whether the deferred was dropped.
    #[inline]
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.shared.lock().canceled
    }
}

impl<T> Deferred<T> {
    /// Returns whether the promise was completed or abandoned.
    ///
    /// This stays true after the value was taken.
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.shared.lock().settled
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl<T> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let mut shared = self.shared.lock();
        if let Some(value) = shared.value.take() {
            return Poll::Ready(Ok(value));
        }
        if shared.abandoned {
            return Poll::Ready(Err(Error::Canceled));
        }
        match &mut shared.waker {
            Some(waker) if waker.will_wake(cx.waker()) => {}
            slot => *slot = Some(cx.waker().clone()),
        }
        Poll::Pending
    }
}

impl<T> Drop for Promise<T> {
    /// Abandons the promise, unless it was completed.
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let waker = {
            let mut shared = self.shared.lock();
            shared.abandoned = true;
            shared.settled = true;
            shared.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for Deferred<T> {
    /// Cancels the deferred.
    fn drop(&mut self) {
        self.shared.lock().canceled = true;
    }
}

// ----------------------------------------------------------------------------

impl<T> fmt::Debug for Promise<T> {
    /// Formats the promise for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Promise")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    /// Formats the deferred for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("settled", &self.is_settled())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Creates a connected promise and deferred.
///
/// # Examples
///
/// ```
/// use futures_lite::future;
/// use zensical_net::sync::promise;
///
/// // Create promise and complete it
/// let (promise, deferred) = promise();
/// promise.complete(42).unwrap();
/// assert_eq!(future::block_on(deferred).unwrap(), 42);
/// ```
#[must_use]
pub fn promise<T>() -> (Promise<T>, Deferred<T>) {
    let shared = Arc::new(Mutex::new(Shared {
        value: None,
        settled: false,
        abandoned: false,
        canceled: false,
        waker: None,
    }));
    let deferred = Deferred { shared: Arc::clone(&shared) };
    (Promise { shared, completed: false }, deferred)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::future;

    use super::*;

    #[test]
    fn test_abandoned_promise_cancels() {
        let (promise, deferred) = promise::<()>();
        drop(promise);
        assert!(matches!(future::block_on(deferred), Err(Error::Canceled)));
    }

    #[test]
    fn test_dropped_deferred_is_observed() {
        let (promise, deferred) = promise();
        assert!(!promise.is_canceled());
        drop(deferred);
        assert!(promise.is_canceled());
        assert_eq!(promise.complete(1), Err(1));
    }

    #[test]
    fn test_settled_after_value_is_taken() {
        let (promise, mut deferred) = promise();
        assert!(!deferred.is_settled());
        promise.complete(1).unwrap();
        assert_eq!(future::block_on(&mut deferred).unwrap(), 1);
        assert!(deferred.is_settled());
    }
}
