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

//! Blocking dispatcher.

use crossbeam::channel::Receiver;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

// ----------------------------------------------------------------------------
// Type aliases
// ----------------------------------------------------------------------------

/// Blocking job, or [`None`] to stop the thread.
pub type Job = Option<Box<dyn FnOnce() + Send + 'static>>;

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Runs blocking jobs until stopped.
///
/// Blocking platform calls, e.g., address resolution, run here, so they never
/// stall a worker thread. A panicking job fails its join handle, but leaves
/// the thread running.
pub fn run(receiver: &Receiver<Job>) {
    for job in receiver {
        let Some(job) = job else {
            break;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("blocking job panicked");
        }
    }
}
