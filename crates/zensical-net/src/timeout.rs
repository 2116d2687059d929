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

//! Timeout queue.

use futures_lite::future;
use parking_lot::Mutex;
use slab::Slab;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tracing::trace;

use crate::{Error, Result};

mod clock;

pub use clock::{Clock, CoarseClock, ManualClock, SystemClock};
use clock::millis;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Timeout queue.
///
/// The queue tracks the deadlines of many concurrent waits without a timer
/// per wait. Deadlines are rounded up to the queue's granularity and grouped
/// into buckets, which are fired in batches by [`TimeoutQueue::process`]. A
/// wait thus never fires before its deadline as seen by the queue's clock,
/// and at most one granularity after it, when the queue is processed at least
/// once per granularity.
///
/// Dropping a [`Wait`] unregisters it in constant time.
///
/// # Examples
///
/// ```
/// use futures_lite::future;
/// use std::time::Duration;
/// use zensical_net::timeout::{ManualClock, TimeoutQueue};
///
/// // Create timeout queue driven by a manual clock
/// let clock = ManualClock::new();
/// let queue = TimeoutQueue::with_clock(Duration::from_millis(10), clock.clone());
///
/// // Create wait and let it expire
/// let mut wait = queue.wait(Duration::from_millis(25));
/// clock.advance(Duration::from_millis(30));
/// assert_eq!(queue.process(), 1);
/// assert!(future::block_on(&mut wait).is_ok());
/// ```
#[derive(Clone)]
pub struct TimeoutQueue {
    /// Shared state.
    inner: Arc<Inner>,
}

/// Shared state of a timeout queue.
struct Inner {
    /// Granularity in milliseconds.
    granularity: u64,
    /// Clock.
    clock: Box<dyn Clock>,
    /// Mutable state.
    state: Mutex<State>,
}

/// Mutable state of a timeout queue.
#[derive(Default)]
struct State {
    /// Registered waits.
    targets: Slab<Target>,
    /// Buckets of waits, keyed by rounded deadline.
    buckets: BTreeMap<u64, Vec<(usize, u64)>>,
    /// Generation counter, distinguishing reused slab entries.
    generation: u64,
    /// Whether the queue was cancelled.
    closed: bool,
}

/// Registered wait.
struct Target {
    /// Generation.
    generation: u64,
    /// Status.
    status: Status,
    /// Waker of the waiting task.
    waker: Option<Waker>,
}

/// Wait for a timeout.
///
/// The wait resolves with `Ok(())` once its deadline passed, or fails with
/// [`Error::QueueClosed`] when the queue is cancelled.
#[must_use = "waits do nothing unless polled"]
pub struct Wait {
    /// Shared state.
    inner: Arc<Inner>,
    /// Wait state.
    state: WaitState,
}

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Status of a registered wait.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Status {
    /// Deadline not yet reached.
    Pending,
    /// Deadline reached.
    Fired,
    /// Queue cancelled.
    Canceled,
}

/// State of a wait.
enum WaitState {
    /// Registered under key and generation.
    Registered(usize, u64),
    /// Resolved, or to be resolved with the given result.
    Done(Option<Result>),
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl TimeoutQueue {
    /// Creates a timeout queue with the given granularity.
    #[must_use]
    pub fn new(granularity: Duration) -> Self {
        Self::with_clock(granularity, SystemClock::default())
    }

    /// Creates a timeout queue with the given granularity and clock.
    ///
    /// Granularities below one millisecond are raised to one millisecond.
    #[must_use]
    pub fn with_clock<C>(granularity: Duration, clock: C) -> Self
    where
        C: Clock,
    {
        Self {
            inner: Arc::new(Inner {
                granularity: millis(granularity).max(1),
                clock: Box::new(clock),
                state: Mutex::default(),
            }),
        }
    }

    /// Registers a wait for the given duration.
    ///
    /// If the queue was cancelled, the wait fails immediately.
    pub fn wait(&self, duration: Duration) -> Wait {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Wait {
                inner: Arc::clone(&self.inner),
                state: WaitState::Done(Some(Err(Error::QueueClosed))),
            };
        }

        // Round deadline up to the next bucket, so waits never fire early
        let g = self.inner.granularity;
        let deadline = self.inner.clock.now().saturating_add(millis(duration));
        let bucket = deadline.div_ceil(g).saturating_mul(g);

        // Register target and add it to its bucket
        state.generation += 1;
        let generation = state.generation;
        let key = state.targets.insert(Target {
            generation,
            status: Status::Pending,
            waker: None,
        });
        state.buckets.entry(bucket).or_default().push((key, generation));
        Wait {
            inner: Arc::clone(&self.inner),
            state: WaitState::Registered(key, generation),
        }
    }

    /// Runs a future, failing with [`Error::Timeout`] after the duration.
    ///
    /// The future wins if it completes in the same poll as the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the duration elapsed first, and
    /// [`Error::QueueClosed`] if the queue was cancelled.
    pub async fn with_timeout<F>(
        &self, duration: Duration, fut: F,
    ) -> Result<F::Output>
    where
        F: Future,
    {
        let wait = self.wait(duration);
        future::or(async { Ok(fut.await) }, async {
            wait.await?;
            Err(Error::Timeout)
        })
        .await
    }

    /// Fires all waits whose deadline has passed.
    ///
    /// Returns the number of waits fired. Entries of dropped waits are
    /// discarded silently.
    pub fn process(&self) -> usize {
        let now = self.inner.clock.now();
        let mut wakers = Vec::new();
        {
            let mut state = self.inner.state.lock();
            let pending = state.buckets.split_off(&now.saturating_add(1));
            let expired = std::mem::replace(&mut state.buckets, pending);

            // Fire targets of expired buckets, unless the slot was reused
            for (key, generation) in expired.into_values().flatten() {
                if let Some(target) = state.targets.get_mut(key) {
                    if target.generation == generation
                        && target.status == Status::Pending
                    {
                        target.status = Status::Fired;
                        wakers.extend(target.waker.take());
                    }
                }
            }
        }

        // Wake tasks outside of the lock
        let count = wakers.len();
        if count > 0 {
            trace!(count, "fired timeouts");
        }
        wakers.into_iter().for_each(Waker::wake);
        count
    }

    /// Cancels the queue, failing all pending and future waits.
    pub fn cancel(&self) {
        let mut wakers = Vec::new();
        {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.buckets.clear();
            for (_, target) in &mut state.targets {
                if target.status == Status::Pending {
                    target.status = Status::Canceled;
                    wakers.extend(target.waker.take());
                }
            }
        }
        wakers.into_iter().for_each(Waker::wake);
    }

    /// Returns the granularity.
    #[inline]
    #[must_use]
    pub fn granularity(&self) -> Duration {
        Duration::from_millis(self.inner.granularity)
    }

    /// Returns whether the queue was cancelled.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Returns the number of registered waits.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().targets.len()
    }

    /// Returns whether no waits are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Future for Wait {
    type Output = Result;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let (key, generation) = match &mut self.state {
            WaitState::Registered(key, generation) => (*key, *generation),
            WaitState::Done(res) => {
                return Poll::Ready(res.take().unwrap_or(Ok(())));
            }
        };

        // Check status, or store the waker for the processing thread
        let res = {
            let mut state = self.inner.state.lock();
            let target = match state.targets.get_mut(key) {
                Some(target) if target.generation == generation => target,
                _ => return Poll::Ready(Ok(())),
            };
            match target.status {
                Status::Pending => {
                    match &mut target.waker {
                        Some(waker) if waker.will_wake(cx.waker()) => {}
                        slot => *slot = Some(cx.waker().clone()),
                    }
                    return Poll::Pending;
                }
                Status::Fired => Ok(()),
                Status::Canceled => Err(Error::QueueClosed),
            }
        };

        // Release target, as the wait is resolved
        self.inner.state.lock().targets.remove(key);
        self.state = WaitState::Done(None);
        Poll::Ready(res)
    }
}

impl Drop for Wait {
    /// Unregisters the wait, if still registered.
    fn drop(&mut self) {
        if let WaitState::Registered(key, generation) = self.state {
            let mut state = self.inner.state.lock();
            if state
                .targets
                .get(key)
                .is_some_and(|target| target.generation == generation)
            {
                state.targets.remove(key);
            }
        }
    }
}

// ----------------------------------------------------------------------------

impl fmt::Debug for TimeoutQueue {
    /// Formats the timeout queue for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimeoutQueue")
            .field("granularity", &self.granularity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Wait {
    /// Formats the wait for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let resolved = matches!(self.state, WaitState::Done(_));
        f.debug_struct("Wait").field("resolved", &resolved).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::future;
    use std::time::Duration;

    use super::*;

    fn queue() -> (TimeoutQueue, ManualClock) {
        let clock = ManualClock::new();
        let queue =
            TimeoutQueue::with_clock(Duration::from_millis(10), clock.clone());
        (queue, clock)
    }

    #[test]
    fn test_wait_never_fires_early() {
        let (queue, clock) = queue();
        let mut wait = queue.wait(Duration::from_millis(25));
        clock.advance(Duration::from_millis(25));
        assert_eq!(queue.process(), 0);
        assert!(future::block_on(future::poll_once(&mut wait)).is_none());

        // Deadline is rounded up to the next bucket
        clock.advance(Duration::from_millis(5));
        assert_eq!(queue.process(), 1);
        let res = future::block_on(future::poll_once(&mut wait));
        assert!(matches!(res, Some(Ok(()))));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dropped_wait_is_unregistered() {
        let (queue, clock) = queue();
        let wait = queue.wait(Duration::from_millis(10));
        let _other = queue.wait(Duration::from_millis(10));
        assert_eq!(queue.len(), 2);
        drop(wait);
        assert_eq!(queue.len(), 1);

        // Only the remaining wait is fired
        clock.advance(Duration::from_millis(10));
        assert_eq!(queue.process(), 1);
    }

    #[test]
    fn test_cancel_fails_waits() {
        let (queue, _) = queue();
        let wait = queue.wait(Duration::from_secs(60));
        queue.cancel();
        assert!(matches!(future::block_on(wait), Err(Error::QueueClosed)));
        let wait = queue.wait(Duration::from_secs(60));
        assert!(matches!(future::block_on(wait), Err(Error::QueueClosed)));
    }

    #[test]
    fn test_with_timeout() {
        let (queue, clock) = queue();
        let res = future::block_on(
            queue.with_timeout(Duration::from_millis(10), async { 42 }),
        );
        assert!(matches!(res, Ok(42)));

        // Expire the wait while the future is stuck
        let mut fut = Box::pin(
            queue.with_timeout(Duration::from_millis(10), future::pending::<()>()),
        );
        assert!(future::block_on(future::poll_once(&mut fut)).is_none());
        clock.advance(Duration::from_millis(10));
        queue.process();
        let res = future::block_on(future::poll_once(&mut fut));
        assert!(matches!(res, Some(Err(Error::Timeout))));
    }
}
