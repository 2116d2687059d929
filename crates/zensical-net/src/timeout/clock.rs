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

//! Clocks for the timeout queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Monotonic clock with millisecond resolution.
pub trait Clock: Send + Sync + 'static {
    /// Returns the milliseconds elapsed since an arbitrary fixed origin.
    fn now(&self) -> u64;
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Clock backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    /// Origin.
    origin: Instant,
}

/// Clock sampled at a coarse interval.
///
/// Reading the clock is a single atomic load. The time only moves when
/// [`CoarseClock::tick`] is called, which the runtime's timer thread does once
/// per granularity, right before processing expired timeouts.
#[derive(Clone, Debug)]
pub struct CoarseClock {
    /// Origin.
    origin: Instant,
    /// Sampled time in milliseconds.
    now: Arc<AtomicU64>,
}

/// Clock that only moves when advanced.
///
/// Clones share the same time, which makes this clock suitable to drive a
/// [`TimeoutQueue`][] deterministically.
///
/// [`TimeoutQueue`]: crate::timeout::TimeoutQueue
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    /// Current time in milliseconds.
    now: Arc<AtomicU64>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl CoarseClock {
    /// Creates a coarse clock starting now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            now: Arc::default(),
        }
    }

    /// Samples the monotonic clock.
    pub fn tick(&self) {
        let now = millis(self.origin.elapsed());
        self.now.fetch_max(now, Ordering::AcqRel);
    }
}

impl ManualClock {
    /// Creates a manual clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock.
    pub fn advance(&self, duration: Duration) {
        self.now.fetch_add(millis(duration), Ordering::AcqRel);
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> u64 {
        millis(self.origin.elapsed())
    }
}

impl Clock for CoarseClock {
    #[inline]
    fn now(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

// ----------------------------------------------------------------------------

impl Default for CoarseClock {
    /// Creates a coarse clock starting now.
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Default for SystemClock {
    /// Creates a clock starting now.
    #[inline]
    fn default() -> Self {
        Self { origin: Instant::now() }
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Converts a duration into milliseconds, saturating.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
