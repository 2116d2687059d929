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

//! Worker runtime.

use crossbeam::channel::Sender;
use futures_lite::future;
use parking_lot::Mutex;
use slab::Slab;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::thread;
use tracing::debug;

use crate::Result;
use crate::selector::Selector;
use crate::sync::{Deferred, promise};
use crate::timeout::TimeoutQueue;

mod blocking;
mod builder;
mod task;

pub use builder::Builder;
use blocking::Job;
use task::{Message, Task};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Worker runtime.
///
/// The runtime drives spawned tasks on a small pool of worker threads, and
/// owns the [`Selector`] and [`TimeoutQueue`] those tasks suspend on. Blocking
/// platform calls are offloaded to a separate pool of blocking threads, so
/// workers only ever poll futures.
///
/// Shutting down the runtime, which also happens when it's dropped, closes
/// the selector, cancels the timeout queue, joins all threads, and drops
/// every task that has not yet completed.
pub struct Runtime {
    /// Handle.
    handle: Handle,
    /// Threads.
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
    /// Stop signal for the timer thread.
    stop: Mutex<Option<Sender<()>>>,
    /// Number of worker threads.
    workers: usize,
    /// Number of blocking threads.
    blocking_threads: usize,
}

/// Handle to a runtime.
///
/// Handles are cheap to clone, and are used to spawn tasks and to access the
/// runtime's selector and timeout queue from within tasks.
#[derive(Clone)]
pub struct Handle {
    /// Shared state.
    shared: Arc<Shared>,
}

/// Shared state of a runtime.
pub(crate) struct Shared {
    /// Run queue.
    sender: Sender<Message>,
    /// Blocking job queue.
    blocking: Sender<Job>,
    /// Live tasks.
    tasks: Mutex<Slab<Arc<Task>>>,
    /// Selector.
    selector: Selector,
    /// Timeout queue.
    timeouts: TimeoutQueue,
    /// Whether the runtime was shut down.
    shutdown: AtomicBool,
}

/// Handle to a spawned task.
///
/// The handle resolves to the task's output, or fails with
/// [`Error::Canceled`][] if the task panicked or the runtime shut down before
/// it completed. Dropping the handle detaches the task.
///
/// [`Error::Canceled`]: crate::Error::Canceled
#[must_use = "dropping a join handle detaches the task"]
pub struct JoinHandle<T> {
    /// Deferred output.
    deferred: Deferred<T>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Runtime {
    /// Creates a runtime with default settings.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the runtime can't be started.
    #[inline]
    pub fn new() -> Result<Self> {
        Builder::new().build()
    }

    /// Creates a runtime builder.
    #[inline]
    #[must_use]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Returns the handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawns a task.
    #[inline]
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Drives a future to completion on the calling thread.
    #[inline]
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future,
    {
        future::block_on(future)
    }

    /// Shuts the runtime down.
    ///
    /// Pending selects fail with [`Error::Closed`][], pending waits fail with
    /// [`Error::QueueClosed`][], and tasks that did not yet complete are
    /// dropped. Shutting down is idempotent.
    ///
    /// [`Error::Closed`]: crate::Error::Closed
    /// [`Error::QueueClosed`]: crate::Error::QueueClosed
    pub fn shutdown(&self) {
        let shared = &self.handle.shared;
        if shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        // Fail all pending waits, so suspended tasks observe the shutdown
        debug!("runtime shutting down");
        shared.selector.close();
        shared.timeouts.cancel();

        // Stop all threads and join them, unless we're on one of them
        for _ in 0..self.workers {
            let _ = shared.sender.send(Message::Stop);
        }
        for _ in 0..self.blocking_threads {
            let _ = shared.blocking.send(None);
        }
        drop(self.stop.lock().take());
        let current = thread::current().id();
        for handle in self.threads.lock().drain(..) {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }

        // Drop remaining tasks, which cancels their join handles
        let tasks: Vec<_> = shared.tasks.lock().drain().collect();
        for task in &tasks {
            task.cancel();
        }
        debug!(canceled = tasks.len(), "runtime shut down");
    }
}

impl Handle {
    /// Spawns a task.
    ///
    /// If the runtime was shut down, the task is dropped immediately, and its
    /// join handle fails with [`Error::Canceled`][].
    ///
    /// [`Error::Canceled`]: crate::Error::Canceled
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (promise, deferred) = promise();
        let future = Box::pin(async move {
            let _ = promise.complete(future.await);
        });

        // Register task, unless the runtime was shut down
        let task = {
            let mut tasks = self.shared.tasks.lock();
            if self.is_shutdown() {
                return JoinHandle { deferred };
            }
            let entry = tasks.vacant_entry();
            let task = Arc::new(Task::new(
                entry.key(),
                future,
                Arc::downgrade(&self.shared),
            ));
            entry.insert(Arc::clone(&task));
            task
        };

        // Schedule task for its first poll
        task.schedule();
        JoinHandle { deferred }
    }

    /// Runs a blocking function on the blocking dispatcher.
    pub fn spawn_blocking<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (promise, deferred) = promise();
        if !self.is_shutdown() {
            let job = Box::new(move || {
                let _ = promise.complete(f());
            });
            let _ = self.shared.blocking.send(Some(job));
        }
        JoinHandle { deferred }
    }

    /// Returns the selector.
    #[inline]
    #[must_use]
    pub fn selector(&self) -> &Selector {
        &self.shared.selector
    }

    /// Returns the timeout queue.
    #[inline]
    #[must_use]
    pub fn timeouts(&self) -> &TimeoutQueue {
        &self.shared.timeouts
    }

    /// Returns whether the runtime was shut down.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Returns the number of live tasks.
    #[inline]
    #[must_use]
    pub fn tasks(&self) -> usize {
        self.shared.tasks.lock().len()
    }
}

impl<T> JoinHandle<T> {
    /// Returns whether the task completed.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.deferred.is_settled()
    }

    /// Detaches the task, letting it run to completion unobserved.
    #[inline]
    pub fn detach(self) {}
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl<T> Future for JoinHandle<T> {
    type Output = Result<T>;

    #[inline]
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        Pin::new(&mut self.deferred).poll(cx)
    }
}

impl Drop for Runtime {
    /// Shuts the runtime down.
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ----------------------------------------------------------------------------

impl fmt::Debug for Runtime {
    /// Formats the runtime for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("workers", &self.workers)
            .field("blocking_threads", &self.blocking_threads)
            .field("handle", &self.handle)
            .finish()
    }
}

impl fmt::Debug for Handle {
    /// Formats the handle for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Handle")
            .field("tasks", &self.tasks())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    /// Formats the join handle for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::Error;
    use crate::sync::Latch;

    use super::*;

    fn runtime() -> Runtime {
        Runtime::builder()
            .workers(2)
            .blocking_threads(1)
            .granularity(Duration::from_millis(5))
            .build()
            .unwrap()
    }

    #[test]
    fn test_spawn_and_join() {
        let runtime = runtime();
        let handle = runtime.handle().clone();
        let task = runtime.spawn(async move {
            let inner = handle.spawn(async { 20 });
            let blocking = handle.spawn_blocking(|| 22);
            inner.await.unwrap() + blocking.await.unwrap()
        });
        assert_eq!(runtime.block_on(task).unwrap(), 42);
    }

    #[test]
    fn test_finished_after_join() {
        let runtime = runtime();
        let mut task = runtime.spawn(async { 1 });
        assert_eq!(runtime.block_on(&mut task).unwrap(), 1);
        assert!(task.is_finished());
    }

    fn explode() -> u32 {
        panic!("boom")
    }

    #[test]
    fn test_panicking_task_is_canceled() {
        let runtime = Runtime::builder().workers(1).build().unwrap();
        let task = runtime.spawn(async { explode() });
        assert!(matches!(runtime.block_on(task), Err(Error::Canceled)));

        // The worker survives the panic
        let task = runtime.spawn(async { 1 });
        assert_eq!(runtime.block_on(task).unwrap(), 1);
    }

    #[test]
    fn test_timeouts_fire() {
        let runtime = runtime();
        let timeouts = runtime.handle().timeouts().clone();
        let task = runtime.spawn(async move {
            timeouts
                .with_timeout(Duration::from_millis(20), future::pending::<()>())
                .await
        });
        assert!(matches!(runtime.block_on(task).unwrap(), Err(Error::Timeout)));
    }

    #[test]
    fn test_shutdown_cancels_pending_tasks() {
        let runtime = runtime();
        let latch = Arc::new(Latch::new());
        let task = runtime.spawn({
            let latch = Arc::clone(&latch);
            async move { latch.wait().await }
        });
        let wait = runtime.handle().timeouts().wait(Duration::from_secs(60));
        runtime.shutdown();
        assert!(matches!(runtime.block_on(task), Err(Error::Canceled)));
        assert!(matches!(runtime.block_on(wait), Err(Error::QueueClosed)));

        // Spawning after shutdown cancels immediately
        let task = runtime.spawn(async {});
        assert!(matches!(runtime.block_on(task), Err(Error::Canceled)));
        assert_eq!(runtime.handle().tasks(), 0);
    }
}
