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

//! Runtime error.

use std::sync::Arc;
use std::{io, result};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Runtime error.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Selectable or selector was closed.
    #[error("channel closed")]
    Closed,

    /// Selectable was already deregistered.
    #[error("selectable already deregistered")]
    Deregistered,

    /// Wait exceeded its deadline.
    #[error("timed out")]
    Timeout,

    /// Timeout queue was cancelled.
    #[error("timeout queue closed")]
    QueueClosed,

    /// Task was dropped before completion.
    #[error("task canceled")]
    Canceled,

    /// Runtime was shut down.
    #[error("runtime shut down")]
    Shutdown,

    /// I/O error.
    #[error(transparent)]
    Io(Arc<io::Error>),
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Error {
    /// Returns whether the error is a timeout.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl From<io::Error> for Error {
    /// Creates an error from an I/O error.
    #[inline]
    fn from(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<Error> for io::Error {
    /// Converts a runtime error into an I/O error.
    ///
    /// Closed selectables surface as [`io::ErrorKind::NotConnected`] and
    /// expired waits as [`io::ErrorKind::TimedOut`], so that socket readers
    /// and writers can keep returning plain I/O errors.
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => match Arc::try_unwrap(err) {
                Ok(err) => err,
                Err(err) => io::Error::new(err.kind(), err.to_string()),
            },
            Error::Timeout => io::Error::new(io::ErrorKind::TimedOut, err),
            Error::Closed | Error::Deregistered => {
                io::Error::new(io::ErrorKind::NotConnected, err)
            }
            _ => io::Error::other(err),
        }
    }
}

// ----------------------------------------------------------------------------
// Type aliases
// ----------------------------------------------------------------------------

/// Runtime result.
pub type Result<T = ()> = result::Result<T, Error>;
