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

//! Non-blocking network I/O runtime.
//!
//! This crate bridges platform socket readiness notification into futures. A
//! [`Selector`][] runs the platform demultiplexer on a dedicated thread and
//! wakes the tasks whose declared interest became ready, while a
//! [`TimeoutQueue`][] tracks deadlines for many concurrent waits in coarse
//! buckets, so that no wait ever needs its own timer. Both are owned by a [`Runtime`][], which
//! drives tasks on a small pool of worker threads.
//!
//! [`Runtime`]: runtime::Runtime
//! [`Selector`]: selector::Selector
//! [`TimeoutQueue`]: timeout::TimeoutQueue

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]

mod error;
pub mod io;
pub mod net;
pub mod runtime;
pub mod selector;
pub mod sync;
pub mod timeout;

pub use error::{Error, Result};
