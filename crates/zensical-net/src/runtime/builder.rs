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

//! Runtime builder.

use crossbeam::channel::{self, RecvTimeoutError};
use parking_lot::Mutex;
use slab::Slab;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::Result;
use crate::selector::Selector;
use crate::timeout::{CoarseClock, TimeoutQueue};

use super::task::Message;
use super::{Handle, Runtime, Shared, blocking};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Runtime builder.
#[derive(Clone, Debug)]
pub struct Builder {
    /// Number of worker threads.
    workers: usize,
    /// Number of blocking threads.
    blocking_threads: usize,
    /// Timer granularity.
    granularity: Duration,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Builder {
    /// Creates a runtime builder.
    ///
    /// Note that the canonical way to create a [`Runtime`] is to invoke the
    /// [`Runtime::builder`] method, which creates an instance of [`Builder`].
    /// By default, one worker per available core, four blocking threads and
    /// a timer granularity of 10ms are used.
    #[must_use]
    pub fn new() -> Self {
        let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self {
            workers,
            blocking_threads: 4,
            granularity: Duration::from_millis(10),
        }
    }

    /// Sets the number of worker threads.
    ///
    /// # Panics
    ///
    /// Panics if the number is zero.
    #[inline]
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        assert!(workers > 0, "runtime needs at least one worker");
        self.workers = workers;
        self
    }

    /// Sets the number of blocking threads.
    ///
    /// # Panics
    ///
    /// Panics if the number is zero.
    #[inline]
    #[must_use]
    pub fn blocking_threads(mut self, blocking_threads: usize) -> Self {
        assert!(blocking_threads > 0, "runtime needs a blocking thread");
        self.blocking_threads = blocking_threads;
        self
    }

    /// Sets the timer granularity.
    #[inline]
    #[must_use]
    pub fn granularity(mut self, granularity: Duration) -> Self {
        self.granularity = granularity;
        self
    }

    /// Creates the runtime and starts its threads.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the selector can't be created, or if a thread
    /// can't be spawned.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use zensical_net::runtime::Runtime;
    ///
    /// // Create runtime and run task
    /// let runtime = Runtime::builder().workers(2).build()?;
    /// let task = runtime.spawn(async { 1 + 1 });
    /// assert_eq!(runtime.block_on(task)?, 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self) -> Result<Runtime> {
        let clock = CoarseClock::new();
        let (sender, receiver) = channel::unbounded();
        let (blocking_sender, blocking_receiver) = channel::unbounded();
        let shared = Arc::new(Shared {
            sender,
            blocking: blocking_sender,
            tasks: Mutex::new(Slab::new()),
            selector: Selector::new()?,
            timeouts: TimeoutQueue::with_clock(self.granularity, clock.clone()),
            shutdown: AtomicBool::new(false),
        });

        // Create runtime first, so threads are joined if spawning fails
        let (stop, stopped) = channel::bounded::<()>(0);
        let mut runtime = Runtime {
            handle: Handle { shared: Arc::clone(&shared) },
            threads: Mutex::new(Vec::new()),
            stop: Mutex::new(Some(stop)),
            workers: self.workers,
            blocking_threads: self.blocking_threads,
        };

        // Start worker threads, draining the run queue
        let threads = runtime.threads.get_mut();
        for n in 0..self.workers {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("zensical/worker-{n}"))
                .spawn(move || {
                    for message in &receiver {
                        match message {
                            Message::Run(task) => task.run(),
                            Message::Stop => break,
                        }
                    }
                })?;
            threads.push(handle);
        }

        // Start blocking threads
        for n in 0..self.blocking_threads {
            let receiver = blocking_receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("zensical/blocking-{n}"))
                .spawn(move || blocking::run(&receiver))?;
            threads.push(handle);
        }

        // Start timer thread, which samples the clock and fires timeouts once
        // per granularity, until the runtime is shut down
        let timeouts = shared.timeouts.clone();
        let granularity = timeouts.granularity();
        let handle = thread::Builder::new()
            .name(String::from("zensical/timer"))
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(granularity) {
                        Err(RecvTimeoutError::Timeout) => {
                            clock.tick();
                            timeouts.process();
                        }
                        _ => break,
                    }
                }
            })?;
        threads.push(handle);

        // Return runtime
        debug!(
            workers = self.workers,
            blocking_threads = self.blocking_threads,
            ?granularity,
            "runtime started"
        );
        Ok(runtime)
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Builder {
    /// Creates a runtime builder with default settings.
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
