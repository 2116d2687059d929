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

//! Registration of a source with a selector.

use parking_lot::Mutex;
use std::task::{Context, Poll, Waker};

use crate::{Error, Result};

use super::interest::Interest;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Registration of a source with a selector.
///
/// A registration tracks which of the declared interests are currently ready,
/// together with at most one pending waker per interest. The selector thread
/// sets readiness, and tasks clear it again after an operation would block.
#[derive(Debug)]
pub struct Registration {
    /// Slab index, which doubles as the poller token.
    token: usize,
    /// Declared interest.
    declared: Interest,
    /// Mutable state.
    state: Mutex<State>,
}

/// Mutable state of a registration.
#[derive(Debug, Default)]
struct State {
    /// Ready interests.
    ready: Interest,
    /// Number of readiness events observed.
    tick: u64,
    /// Whether the registration is closed.
    closed: bool,
    /// Pending wakers, one per interest.
    wakers: [Option<Waker>; 4],
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Registration {
    /// Creates a registration.
    pub fn new(token: usize, declared: Interest) -> Self {
        Self {
            token,
            declared,
            state: Mutex::default(),
        }
    }

    /// Returns the token.
    #[inline]
    pub fn token(&self) -> usize {
        self.token
    }

    /// Returns the declared interest.
    #[inline]
    pub fn declared(&self) -> Interest {
        self.declared
    }

    /// Returns whether the registration is closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Marks the given interests as ready and wakes their waiters.
    ///
    /// Wakers are invoked after the lock is released, so a woken task that is
    /// polled inline can re-enter the registration without deadlocking.
    pub fn dispatch(&self, ready: Interest) {
        let ready = ready & self.declared;
        if ready.is_empty() {
            return;
        }

        // Record readiness and collect wakers of ready interests
        let mut wakers = Vec::with_capacity(2);
        {
            let mut state = self.state.lock();
            state.ready |= ready;
            state.tick = state.tick.wrapping_add(1);
            for interest in ready.iter() {
                if let Some(waker) = state.wakers[interest.index()].take() {
                    wakers.push(waker);
                }
            }
        }
        wakers.into_iter().for_each(Waker::wake);
    }

    /// Closes the registration and fails all pending waits.
    pub fn close(&self) {
        let wakers = {
            let mut state = self.state.lock();
            state.closed = true;
            state.wakers.each_mut().map(Option::take)
        };
        wakers.into_iter().flatten().for_each(Waker::wake);
    }

    /// Polls for readiness of a single interest.
    ///
    /// On success, the current tick is returned, which must be handed back to
    /// [`Registration::clear`] when the operation would block. This ensures
    /// that readiness which arrived in the meantime is never lost.
    ///
    /// # Panics
    ///
    /// Panics if the interest was not declared, or is not a single interest.
    pub fn poll_ready(
        &self, cx: &mut Context, interest: Interest,
    ) -> Poll<Result<u64>> {
        assert!(
            self.declared.contains(interest),
            "selecting on undeclared interest {interest:?}, declared {:?}",
            self.declared
        );
        let index = interest.index();

        // Check readiness, or store the waker for the selector thread
        let mut state = self.state.lock();
        if state.closed {
            return Poll::Ready(Err(Error::Closed));
        }
        if state.ready.intersects(interest) {
            return Poll::Ready(Ok(state.tick));
        }
        match &mut state.wakers[index] {
            Some(waker) if waker.will_wake(cx.waker()) => {}
            slot => *slot = Some(cx.waker().clone()),
        }
        Poll::Pending
    }

    /// Clears readiness of an interest, unless new events arrived since.
    pub fn clear(&self, interest: Interest, tick: u64) {
        let mut state = self.state.lock();
        if state.tick == tick {
            state.ready.remove(interest);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::future;
    use std::task::Poll;

    use super::*;

    #[test]
    fn test_dispatch_wakes_and_clear_respects_tick() {
        let registration = Registration::new(0, Interest::READ);
        future::block_on(future::poll_fn(|cx| {
            assert!(registration.poll_ready(cx, Interest::READ).is_pending());
            Poll::Ready(())
        }));

        // Readiness arriving after the tick was taken must survive a clear
        registration.dispatch(Interest::READ | Interest::WRITE);
        let tick = future::block_on(future::poll_fn(|cx| {
            registration.poll_ready(cx, Interest::READ)
        }))
        .unwrap();
        registration.dispatch(Interest::READ);
        registration.clear(Interest::READ, tick);
        let res = future::block_on(future::poll_fn(|cx| {
            Poll::Ready(registration.poll_ready(cx, Interest::READ))
        }));
        assert!(matches!(res, Poll::Ready(Ok(_))));
    }

    #[test]
    fn test_close_fails_waits() {
        let registration = Registration::new(0, Interest::ACCEPT);
        registration.close();
        let res = future::block_on(future::poll_fn(|cx| {
            registration.poll_ready(cx, Interest::ACCEPT)
        }));
        assert!(matches!(res, Err(Error::Closed)));
    }

    #[test]
    #[should_panic(expected = "undeclared interest")]
    fn test_undeclared_interest_panics() {
        let registration = Registration::new(0, Interest::READ);
        future::block_on(future::poll_fn(|cx| {
            registration.poll_ready(cx, Interest::WRITE)
        }))
        .unwrap();
    }
}
