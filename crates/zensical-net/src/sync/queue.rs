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

//! Bounded queue.

use futures_lite::future;
use parking_lot::Mutex;
use slab::Slab;
use std::collections::VecDeque;
use std::fmt;
use std::task::{Context, Poll, Waker};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Bounded queue.
///
/// The queue connects many producers with many consumers. A queue with a
/// capacity of zero is a rendezvous queue: a value is only accepted when a
/// receiver is currently waiting for it. This allows producers to detect
/// whether a consumer is idle, and to spin up a new one if not.
///
/// # Examples
///
/// ```
/// use futures_lite::future;
/// use zensical_net::sync::{Queue, TrySendError};
///
/// // Create rendezvous queue, which rejects values without receivers
/// let queue = Queue::new(0);
/// assert!(matches!(queue.try_send(1), Err(TrySendError::Full(1))));
///
/// // Create buffered queue
/// let queue = Queue::new(1);
/// queue.try_send(1).unwrap();
/// assert_eq!(future::block_on(queue.recv()), Some(1));
/// ```
pub struct Queue<T> {
    /// Capacity.
    capacity: usize,
    /// Mutable state.
    state: Mutex<State<T>>,
}

/// Mutable state of a queue.
struct State<T> {
    /// Buffered values.
    items: VecDeque<T>,
    /// Waiting receivers.
    receivers: Slab<Option<Waker>>,
    /// Waiting senders.
    senders: Slab<Option<Waker>>,
    /// Whether the queue is closed.
    closed: bool,
}

/// Registration of a waiting task, unregistered on drop.
struct Waiting<'a, T> {
    /// Queue.
    queue: &'a Queue<T>,
    /// Key, once registered.
    key: Option<usize>,
    /// Whether the task is a receiver.
    receiver: bool,
}

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Error returned by [`Queue::try_send`].
#[derive(Clone, Copy, PartialEq, Eq, Error)]
pub enum TrySendError<T> {
    /// Queue is at capacity.
    #[error("queue full")]
    Full(T),
    /// Queue is closed.
    #[error("queue closed")]
    Closed(T),
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl<T> Queue<T> {
    /// Creates a queue with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                receivers: Slab::new(),
                senders: Slab::new(),
                closed: false,
            }),
        }
    }

    /// Attempts to send a value without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TrySendError::Full`] if the queue is at capacity, which for
    /// a rendezvous queue means that no receiver is waiting, and
    /// [`TrySendError::Closed`] if the queue is closed.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TrySendError::Closed(value));
        }
        if !state.has_room(self.capacity) {
            return Err(TrySendError::Full(value));
        }
        state.items.push_back(value);
        let wakers = take(&mut state.receivers);
        drop(state);
        wakers.into_iter().for_each(Waker::wake);
        Ok(())
    }

    /// Sends a value, waiting for room if necessary.
    ///
    /// # Errors
    ///
    /// Returns the value if the queue is closed.
    pub async fn send(&self, value: T) -> Result<(), T> {
        let mut waiting = Waiting::new(self, false);
        let mut value = Some(value);
        future::poll_fn(|cx| {
            let mut state = self.state.lock();
            if state.closed {
                waiting.unregister(&mut state);
                return Poll::Ready(value.take().map_or(Ok(()), Err));
            }
            if state.has_room(self.capacity) {
                waiting.unregister(&mut state);
                if let Some(value) = value.take() {
                    state.items.push_back(value);
                }
                let wakers = take(&mut state.receivers);
                drop(state);
                wakers.into_iter().for_each(Waker::wake);
                return Poll::Ready(Ok(()));
            }
            waiting.register(&mut state.senders, cx);
            Poll::Pending
        })
        .await
    }

    /// Waits until the queue has room for a value, without sending one.
    ///
    /// Returns `false` if the queue is closed. Room is not reserved, so a
    /// subsequent [`Queue::try_send`] may still fail if another sender was
    /// faster, which makes this suitable for racing against other events.
    pub async fn ready(&self) -> bool {
        let mut waiting = Waiting::new(self, false);
        future::poll_fn(|cx| {
            let mut state = self.state.lock();
            if state.closed {
                waiting.unregister(&mut state);
                return Poll::Ready(false);
            }
            if state.has_room(self.capacity) {
                waiting.unregister(&mut state);
                return Poll::Ready(true);
            }
            waiting.register(&mut state.senders, cx);
            Poll::Pending
        })
        .await
    }

    /// Receives a value, waiting if necessary.
    ///
    /// Returns [`None`] once the queue is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        let mut waiting = Waiting::new(self, true);
        future::poll_fn(|cx| self.poll_recv(cx, &mut waiting)).await
    }

    /// Attempts to receive a value without waiting.
    pub fn try_recv(&self) -> Option<T> {
        let mut state = self.state.lock();
        let value = state.items.pop_front()?;
        let wakers = take(&mut state.senders);
        drop(state);
        wakers.into_iter().for_each(Waker::wake);
        Some(value)
    }

    /// Closes the queue.
    ///
    /// Buffered values can still be received, but sending fails.
    pub fn close(&self) {
        let wakers = {
            let mut state = self.state.lock();
            state.closed = true;
            let mut wakers = take(&mut state.receivers);
            wakers.extend(take(&mut state.senders));
            wakers
        };
        wakers.into_iter().for_each(Waker::wake);
    }

    /// Removes and returns all buffered values.
    pub fn drain(&self) -> Vec<T> {
        let values: Vec<_> = self.state.lock().items.drain(..).collect();
        if !values.is_empty() {
            let wakers = take(&mut self.state.lock().senders);
            wakers.into_iter().for_each(Waker::wake);
        }
        values
    }

    /// Returns the capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of buffered values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns whether no values are buffered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether the queue is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns the number of waiting receivers.
    #[inline]
    #[must_use]
    pub fn receivers(&self) -> usize {
        self.state.lock().receivers.len()
    }

    /// Polls for a value on behalf of a waiting receiver.
    fn poll_recv(
        &self, cx: &mut Context, waiting: &mut Waiting<'_, T>,
    ) -> Poll<Option<T>> {
        let mut state = self.state.lock();
        if let Some(value) = state.items.pop_front() {
            waiting.unregister(&mut state);
            let wakers = take(&mut state.senders);
            drop(state);
            wakers.into_iter().for_each(Waker::wake);
            return Poll::Ready(Some(value));
        }
        if state.closed {
            waiting.unregister(&mut state);
            return Poll::Ready(None);
        }

        // A new waiting receiver makes room in a rendezvous queue
        let fresh = waiting.key.is_none();
        waiting.register(&mut state.receivers, cx);
        if fresh {
            let wakers = take(&mut state.senders);
            drop(state);
            wakers.into_iter().for_each(Waker::wake);
        }
        Poll::Pending
    }
}

impl<T> TrySendError<T> {
    /// Returns the value that couldn't be sent.
    #[inline]
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(value) | TrySendError::Closed(value) => value,
        }
    }
}

impl<T> State<T> {
    /// Returns whether a value can be accepted.
    ///
    /// Every waiting receiver adds room for one value beyond the capacity,
    /// which it consumes once it is woken.
    fn has_room(&self, capacity: usize) -> bool {
        self.items.len() < capacity + self.receivers.len()
    }
}

impl<'a, T> Waiting<'a, T> {
    /// Creates an unregistered waiting task.
    fn new(queue: &'a Queue<T>, receiver: bool) -> Self {
        Self { queue, key: None, receiver }
    }

    /// Registers or refreshes the waker.
    fn register(&mut self, slab: &mut Slab<Option<Waker>>, cx: &Context) {
        match self.key {
            Some(key) => match &mut slab[key] {
                Some(waker) if waker.will_wake(cx.waker()) => {}
                slot => *slot = Some(cx.waker().clone()),
            },
            None => self.key = Some(slab.insert(Some(cx.waker().clone()))),
        }
    }

    /// Unregisters the waiting task.
    fn unregister(&mut self, state: &mut State<T>) {
        if let Some(key) = self.key.take() {
            if self.receiver {
                state.receivers.remove(key);
            } else {
                state.senders.remove(key);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl<T> Drop for Waiting<'_, T> {
    /// Unregisters the waiting task.
    ///
    /// A receiver that leaves after a value was accepted on its behalf passes
    /// the wakeup on to the remaining receivers.
    fn drop(&mut self) {
        if self.key.is_none() {
            return;
        }
        let queue = self.queue;
        let mut state = queue.state.lock();
        self.unregister(&mut state);
        if self.receiver && !state.items.is_empty() {
            let wakers = take(&mut state.receivers);
            drop(state);
            wakers.into_iter().for_each(Waker::wake);
        }
    }
}

// ----------------------------------------------------------------------------

impl<T> fmt::Debug for Queue<T> {
    /// Formats the queue for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Queue")
            .field("capacity", &self.capacity)
            .field("len", &state.items.len())
            .field("receivers", &state.receivers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    /// Formats the error for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.write_str("Full(..)"),
            TrySendError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Takes all wakers of waiting tasks, leaving them registered.
fn take(slab: &mut Slab<Option<Waker>>) -> Vec<Waker> {
    slab.iter_mut().filter_map(|(_, waker)| waker.take()).collect()
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
    fn test_rendezvous_requires_waiting_receiver() {
        let queue = Queue::new(0);
        assert!(matches!(queue.try_send(1), Err(TrySendError::Full(1))));

        // Park a receiver, which makes room for exactly one value
        let mut recv = pin!(queue.recv());
        assert!(future::block_on(future::poll_once(&mut recv)).is_none());
        assert_eq!(queue.receivers(), 1);
        queue.try_send(1).unwrap();
        assert!(matches!(queue.try_send(2), Err(TrySendError::Full(2))));
        assert_eq!(future::block_on(recv), Some(1));
        assert_eq!(queue.receivers(), 0);
    }

    #[test]
    fn test_ready_when_receiver_arrives() {
        let queue = Queue::<u32>::new(0);
        let mut ready = pin!(queue.ready());
        assert!(future::block_on(future::poll_once(&mut ready)).is_none());

        // A waiting receiver makes room, without a value being sent
        let mut recv = pin!(queue.recv());
        assert!(future::block_on(future::poll_once(&mut recv)).is_none());
        assert!(future::block_on(ready));
        assert!(queue.is_empty());
        queue.close();
        assert!(!future::block_on(queue.ready()));
    }

    #[test]
    fn test_send_waits_for_room() {
        let queue = Queue::new(1);
        future::block_on(queue.send(1)).unwrap();
        let mut send = pin!(queue.send(2));
        assert!(future::block_on(future::poll_once(&mut send)).is_none());
        assert_eq!(queue.try_recv(), Some(1));
        assert_eq!(future::block_on(send), Ok(()));
        assert_eq!(queue.try_recv(), Some(2));
    }

    #[test]
    fn test_close_drains_then_ends() {
        let queue = Queue::new(2);
        queue.try_send(1).unwrap();
        queue.close();
        assert!(matches!(queue.try_send(2), Err(TrySendError::Closed(2))));
        assert_eq!(future::block_on(queue.send(3)), Err(3));
        assert_eq!(future::block_on(queue.recv()), Some(1));
        assert_eq!(future::block_on(queue.recv()), None);
    }
}
