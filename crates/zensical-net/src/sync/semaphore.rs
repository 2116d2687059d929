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

//! Semaphore.

use parking_lot::{Mutex, MutexGuard};
use slab::Slab;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::{Error, Result};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Semaphore.
///
/// A semaphore admits at most `limit` concurrent visitors. Tasks that can't
/// enter are queued in arrival order, and a visitor leaving hands its permit
/// directly to the oldest waiting task, so no task is overtaken by a later
/// arrival.
///
/// # Examples
///
/// ```
/// use futures_lite::future;
/// use zensical_net::sync::Semaphore;
///
/// // Create semaphore and enter it
/// let semaphore = Semaphore::new(1);
/// future::block_on(semaphore.enter()).unwrap();
/// assert!(!semaphore.try_enter());
///
/// // Leave semaphore again
/// semaphore.leave();
/// assert_eq!(semaphore.visitors(), 0);
/// ```
pub struct Semaphore {
    /// Maximum number of visitors.
    limit: usize,
    /// Mutable state.
    state: Mutex<State>,
}

/// Mutable state of a semaphore.
#[derive(Default)]
struct State {
    /// Number of visitors.
    visitors: usize,
    /// Waiting tasks.
    waiters: Slab<Waiter>,
    /// Waiting tasks in arrival order.
    order: VecDeque<usize>,
    /// Whether the semaphore is closed.
    closed: bool,
}

/// Waiting task.
struct Waiter {
    /// Whether a permit was handed over.
    granted: bool,
    /// Waker.
    waker: Option<Waker>,
}

/// Future returned by [`Semaphore::enter`].
#[must_use = "futures do nothing unless polled"]
pub struct Enter<'a> {
    /// Semaphore.
    semaphore: &'a Semaphore,
    /// Waiter key, once queued.
    key: Option<usize>,
    /// Whether the future resolved.
    done: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Semaphore {
    /// Creates a semaphore with the given limit.
    ///
    /// # Panics
    ///
    /// Panics if the limit is zero.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "semaphore limit must be positive");
        Self { limit, state: Mutex::default() }
    }

    /// Enters the semaphore, waiting for a permit if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the semaphore was closed before a permit
    /// was handed over.
    #[inline]
    pub fn enter(&self) -> Enter<'_> {
        Enter { semaphore: self, key: None, done: false }
    }

    /// Attempts to enter the semaphore without waiting.
    ///
    /// Fails if waiting tasks are queued, even if a permit is available.
    pub fn try_enter(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed || !state.order.is_empty() {
            return false;
        }
        if state.visitors < self.limit {
            state.visitors += 1;
            true
        } else {
            false
        }
    }

    /// Leaves the semaphore, handing the permit to the oldest waiting task.
    ///
    /// # Panics
    ///
    /// Panics if the semaphore has no visitors.
    pub fn leave(&self) {
        let waker = release(self.state.lock());
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Closes the semaphore, failing all waiting and future entries.
    ///
    /// Visitors may still leave after the semaphore is closed.
    pub fn close(&self) {
        let wakers: Vec<_> = {
            let mut state = self.state.lock();
            state.closed = true;
            state
                .waiters
                .iter_mut()
                .filter(|(_, waiter)| !waiter.granted)
                .filter_map(|(_, waiter)| waiter.waker.take())
                .collect()
        };
        wakers.into_iter().for_each(Waker::wake);
    }

    /// Returns the number of visitors.
    #[inline]
    #[must_use]
    pub fn visitors(&self) -> usize {
        self.state.lock().visitors
    }

    /// Returns the number of waiting tasks.
    #[inline]
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.state.lock().order.len()
    }

    /// Returns the limit.
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns whether the semaphore is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Future for Enter<'_> {
    type Output = Result;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let this = &mut *self;
        let semaphore = this.semaphore;
        let mut state = semaphore.state.lock();
        if let Some(key) = this.key {
            // Permit was handed over by a leaving visitor
            if state.waiters[key].granted {
                state.waiters.remove(key);
                this.key = None;
                this.done = true;
                return Poll::Ready(Ok(()));
            }
            if state.closed {
                state.waiters.remove(key);
                state.order.retain(|&k| k != key);
                this.key = None;
                this.done = true;
                return Poll::Ready(Err(Error::Closed));
            }
            let waiter = &mut state.waiters[key];
            match &mut waiter.waker {
                Some(waker) if waker.will_wake(cx.waker()) => {}
                slot => *slot = Some(cx.waker().clone()),
            }
            return Poll::Pending;
        }

        // Enter immediately if nobody is waiting, or queue up
        if state.closed {
            this.done = true;
            return Poll::Ready(Err(Error::Closed));
        }
        if state.order.is_empty() && state.visitors < semaphore.limit {
            state.visitors += 1;
            this.done = true;
            return Poll::Ready(Ok(()));
        }
        let key = state.waiters.insert(Waiter {
            granted: false,
            waker: Some(cx.waker().clone()),
        });
        state.order.push_back(key);
        this.key = Some(key);
        Poll::Pending
    }
}

impl Drop for Enter<'_> {
    /// Unregisters the waiting task, passing on a permit it was handed.
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let mut state = self.semaphore.state.lock();
        let waiter = state.waiters.remove(key);
        if waiter.granted {
            if let Some(waker) = release(state) {
                waker.wake();
            }
        } else {
            state.order.retain(|&k| k != key);
        }
    }
}

// ----------------------------------------------------------------------------

impl fmt::Debug for Semaphore {
    /// Formats the semaphore for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Semaphore")
            .field("limit", &self.limit)
            .field("visitors", &state.visitors)
            .field("waiting", &state.order.len())
            .finish()
    }
}

impl fmt::Debug for Enter<'_> {
    /// Formats the future for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Enter")
            .field("queued", &self.key.is_some())
            .field("done", &self.done)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Releases a permit, returning the waker of the task it was handed to.
fn release(mut state: MutexGuard<State>) -> Option<Waker> {
    assert!(state.visitors > 0, "semaphore left without visitors");
    match state.order.pop_front() {
        Some(key) => {
            let waiter = &mut state.waiters[key];
            waiter.granted = true;
            waiter.waker.take()
        }
        None => {
            state.visitors -= 1;
            None
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::future;

    use super::*;

    #[test]
    fn test_waiters_are_served_in_order() {
        let semaphore = Semaphore::new(1);
        future::block_on(semaphore.enter()).unwrap();

        // Queue two waiters behind the visitor
        let mut a = semaphore.enter();
        let mut b = semaphore.enter();
        assert!(future::block_on(future::poll_once(&mut a)).is_none());
        assert!(future::block_on(future::poll_once(&mut b)).is_none());
        assert!(!semaphore.try_enter());

        // Permits are handed over in arrival order
        semaphore.leave();
        assert!(future::block_on(future::poll_once(&mut b)).is_none());
        assert!(future::block_on(future::poll_once(&mut a)).is_some());
        semaphore.leave();
        assert!(future::block_on(future::poll_once(&mut b)).is_some());
        assert_eq!(semaphore.visitors(), 1);
    }

    #[test]
    fn test_dropped_waiter_passes_permit_on() {
        let semaphore = Semaphore::new(1);
        future::block_on(semaphore.enter()).unwrap();
        let mut a = semaphore.enter();
        let mut b = semaphore.enter();
        assert!(future::block_on(future::poll_once(&mut a)).is_none());
        assert!(future::block_on(future::poll_once(&mut b)).is_none());

        // Hand permit to a, which is dropped before observing it
        semaphore.leave();
        drop(a);
        assert!(future::block_on(future::poll_once(&mut b)).is_some());
        assert_eq!(semaphore.visitors(), 1);
        assert_eq!(semaphore.waiting(), 0);
    }

    #[test]
    fn test_close_fails_waiters() {
        let semaphore = Semaphore::new(1);
        assert!(semaphore.try_enter());
        let mut a = semaphore.enter();
        assert!(future::block_on(future::poll_once(&mut a)).is_none());
        semaphore.close();
        assert!(matches!(future::block_on(a), Err(Error::Closed)));
        semaphore.leave();
        assert_eq!(semaphore.visitors(), 0);
    }

    #[test]
    #[should_panic(expected = "without visitors")]
    fn test_leave_without_visitors_panics() {
        Semaphore::new(2).leave();
    }
}
