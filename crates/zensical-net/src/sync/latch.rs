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

//! Latch.

use futures_lite::future;
use parking_lot::Mutex;
use slab::Slab;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Poll, Waker};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Latch.
///
/// A latch starts closed and is released exactly once, waking all waiting
/// tasks. Waiting on a released latch completes immediately. Latches are
/// usually raced against other futures to abort them.
#[derive(Debug, Default)]
pub struct Latch {
    /// Whether the latch was released.
    released: AtomicBool,
    /// Wakers of waiting tasks.
    wakers: Mutex<Slab<Waker>>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Latch {
    /// Creates a latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the latch, waking all waiting tasks.
    ///
    /// Returns whether this call released the latch.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        let wakers: Vec<_> = self.wakers.lock().drain().collect();
        wakers.into_iter().for_each(Waker::wake);
        true
    }

    /// Returns whether the latch was released.
    #[inline]
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Waits until the latch is released.
    pub async fn wait(&self) {
        let mut guard = Guard { latch: self, key: None };
        future::poll_fn(|cx| {
            // Check under the lock, so a concurrent release can't be missed
            let mut wakers = self.wakers.lock();
            if self.is_released() {
                return Poll::Ready(());
            }
            match guard.key {
                Some(key) => {
                    if let Some(waker) = wakers.get_mut(key) {
                        waker.clone_from(cx.waker());
                    }
                }
                None => guard.key = Some(wakers.insert(cx.waker().clone())),
            }
            Poll::Pending
        })
        .await;
    }
}

// ----------------------------------------------------------------------------

/// Registration of a waiting task, unregistered on drop.
struct Guard<'a> {
    /// Latch.
    latch: &'a Latch,
    /// Key, once registered.
    key: Option<usize>,
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.latch.wakers.lock().try_remove(key);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::future;
    use std::pin::pin;

    use super::*;

    #[test]
    fn test_release_wakes_waiters() {
        let latch = Latch::new();
        let mut wait = pin!(latch.wait());
        assert!(future::block_on(future::poll_once(&mut wait)).is_none());
        assert!(latch.release());
        assert!(!latch.release());
        future::block_on(wait);
        future::block_on(latch.wait());
    }
}
