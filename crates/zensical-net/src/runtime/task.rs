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

//! Task.

use futures_lite::future::Boxed;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Wake, Waker};
use tracing::warn;

use super::Shared;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Task.
///
/// A task owns a spawned future, and is its own waker: waking a task sends it
/// to the run queue, unless it is queued already. The future is dropped as
/// soon as it completes, panics, or the runtime shuts down.
pub struct Task {
    /// Key in the runtime's task registry.
    key: usize,
    /// Future, until completed.
    future: Mutex<Option<Boxed<()>>>,
    /// Whether the task is in the run queue.
    queued: AtomicBool,
    /// Runtime.
    shared: Weak<Shared>,
}

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Message for worker threads.
pub enum Message {
    /// Poll task.
    Run(Arc<Task>),
    /// Stop worker.
    Stop,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Task {
    /// Creates a task.
    pub fn new(key: usize, future: Boxed<()>, shared: Weak<Shared>) -> Self {
        Self {
            key,
            future: Mutex::new(Some(future)),
            queued: AtomicBool::new(false),
            shared,
        }
    }

    /// Sends the task to the run queue, unless it is queued already.
    pub fn schedule(self: Arc<Self>) {
        if self.queued.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            let _ = shared.sender.send(Message::Run(self));
        }
    }

    /// Polls the task once.
    ///
    /// Panics are caught and logged, and drop the future, which fails the
    /// task's join handle with a cancellation.
    pub fn run(self: Arc<Self>) {
        self.queued.store(false, Ordering::Release);
        let waker = Waker::from(Arc::clone(&self));
        let mut cx = Context::from_waker(&waker);

        // Poll future, unless it was already completed or dropped
        let mut slot = self.future.lock();
        let Some(future) = slot.as_mut() else {
            return;
        };
        let res = panic::catch_unwind(AssertUnwindSafe(|| {
            future.as_mut().poll(&mut cx)
        }));
        let done = match res {
            Ok(Poll::Pending) => false,
            Ok(Poll::Ready(())) => true,
            Err(_) => {
                warn!(task = self.key, "task panicked");
                true
            }
        };
        if !done {
            return;
        }

        // Drop future outside of the lock, and unregister task
        let future = slot.take();
        drop(slot);
        drop(future);
        if let Some(shared) = self.shared.upgrade() {
            shared.tasks.lock().try_remove(self.key);
        }
    }

    /// Drops the future, cancelling the task.
    pub fn cancel(&self) {
        let future = self.future.lock().take();
        drop(future);
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Wake for Task {
    #[inline]
    fn wake(self: Arc<Self>) {
        self.schedule();
    }

    #[inline]
    fn wake_by_ref(self: &Arc<Self>) {
        Arc::clone(self).schedule();
    }
}
