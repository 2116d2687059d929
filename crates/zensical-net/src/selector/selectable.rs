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

//! Selectable source.

use futures_lite::future;
use mio::event::Source;
use std::io;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::{Error, Result};

use super::interest::Interest;
use super::registration::Registration;
use super::Selector;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Selectable source.
///
/// A selectable owns a non-blocking source, e.g., a socket, registered with a
/// [`Selector`] for a fixed set of declared interests. Tasks suspend on one of
/// those interests, and the selector resumes them once the source is ready.
/// The raw source is only exposed to I/O closures, which run after readiness
/// was observed, and whose [`io::ErrorKind::WouldBlock`] result clears it.
///
/// Dropping a selectable deregisters it.
#[derive(Debug)]
pub struct Selectable<S>
where
    S: Source,
{
    /// Owned source.
    source: S,
    /// Registration.
    registration: Arc<Registration>,
    /// Selector the source is registered with.
    selector: Selector,
    /// Whether the source was deregistered.
    deregistered: bool,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl<S> Selectable<S>
where
    S: Source,
{
    /// Registers a source with the selector for the given interest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the selector was closed, and an I/O error
    /// if the platform poller refused the registration.
    ///
    /// # Panics
    ///
    /// Panics if the interest is empty.
    pub fn register(
        selector: &Selector, mut source: S, interest: Interest,
    ) -> Result<Self> {
        let registration = selector.register(&mut source, interest)?;
        Ok(Self {
            source,
            registration,
            selector: selector.clone(),
            deregistered: false,
        })
    }

    /// Waits until the source is ready for the given interest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the selectable or selector was closed
    /// while waiting, or before the wait began.
    ///
    /// # Panics
    ///
    /// Panics if the interest was not declared at registration.
    pub async fn select(&self, interest: Interest) -> Result {
        future::poll_fn(|cx| self.poll_select(cx, interest)).await
    }

    /// Polls for readiness of the given interest.
    #[inline]
    pub fn poll_select(
        &self, cx: &mut Context, interest: Interest,
    ) -> Poll<Result> {
        self.registration.poll_ready(cx, interest).map_ok(|_| ())
    }

    /// Attempts an I/O operation once the given interest is ready.
    ///
    /// The closure is retried until it either succeeds, fails, or would block,
    /// in which case readiness is cleared and the task suspends again.
    pub fn poll_io<F, R>(
        &self, cx: &mut Context, interest: Interest, mut f: F,
    ) -> Poll<io::Result<R>>
    where
        F: FnMut(&S) -> io::Result<R>,
    {
        loop {
            let tick = match self.registration.poll_ready(cx, interest) {
                Poll::Ready(Ok(tick)) => tick,
                Poll::Ready(Err(err)) => return Poll::Ready(Err(err.into())),
                Poll::Pending => return Poll::Pending,
            };
            match f(&self.source) {
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    self.registration.clear(interest, tick);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                res => return Poll::Ready(res),
            }
        }
    }

    /// Returns the declared interest.
    #[inline]
    #[must_use]
    pub fn interest(&self) -> Interest {
        self.registration.declared()
    }

    /// Returns whether the selectable is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.registration.is_closed()
    }

    /// Closes the selectable, failing all pending and future waits.
    ///
    /// This is idempotent, and leaves the source registered until dropped.
    #[inline]
    pub fn close(&self) {
        self.registration.close();
    }

    /// Deregisters the source from the selector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Deregistered`] if the source was deregistered before.
    pub fn deregister(&mut self) -> Result {
        if self.deregistered {
            return Err(Error::Deregistered);
        }
        self.deregistered = true;
        self.selector.deregister(&mut self.source, &self.registration)
    }

    /// Returns a reference to the source.
    #[inline]
    pub(crate) fn source(&self) -> &S {
        &self.source
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl<S> Drop for Selectable<S>
where
    S: Source,
{
    /// Deregisters the source, ignoring errors.
    fn drop(&mut self) {
        if !self.deregistered {
            let _ = self.deregister();
        }
    }
}
