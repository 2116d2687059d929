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

//! Readiness selector.

use mio::event::Source;
use mio::{Registry, Token, Waker};
use parking_lot::Mutex;
use slab::Slab;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

use crate::{Error, Result};

mod interest;
mod poller;
mod registration;
mod selectable;

pub use interest::Interest;
use poller::{Poller, WAKER};
use registration::Registration;
pub use selectable::Selectable;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Platform demultiplexing backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Linux `epoll`.
    Epoll,
    /// BSD and macOS `kqueue`.
    Kqueue,
    /// Windows I/O completion ports.
    Iocp,
    /// Portable `poll`.
    Poll,
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Readiness selector.
///
/// The selector owns the platform demultiplexer and runs it on a dedicated
/// thread. Sources are registered through [`Selectable::register`], and every
/// readiness event is dispatched to the waker of the task that suspended on
/// the corresponding interest. Waiting never blocks a worker thread.
///
/// The selector is cheap to clone, and runs until [`Selector::close`] is
/// called, which fails all pending and future waits with [`Error::Closed`].
#[derive(Clone)]
pub struct Selector {
    /// Shared state.
    inner: Arc<Inner>,
}

/// Shared state of a selector.
struct Inner {
    /// Registry handle.
    registry: Registry,
    /// Waker for the selector thread.
    waker: Arc<Waker>,
    /// Registrations, indexed by token.
    registrations: Mutex<Slab<Arc<Registration>>>,
    /// Whether the selector is closed.
    closed: AtomicBool,
    /// Selector thread.
    thread: Mutex<Option<JoinHandle<()>>>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Selector {
    /// Creates a selector and starts its thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the platform poller can't be created, or if
    /// the selector thread can't be spawned.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// use zensical_net::selector::Selector;
    ///
    /// // Create selector and close it again
    /// let selector = Selector::new()?;
    /// selector.close();
    /// assert!(selector.is_closed());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Result<Self> {
        let poller = Poller::with_capacity(1024)?;
        let inner = Arc::new(Inner {
            registry: poller.registry()?,
            waker: poller.waker(),
            registrations: Mutex::new(Slab::new()),
            closed: AtomicBool::new(false),
            thread: Mutex::new(None),
        });

        // Start selector thread, which dispatches events until closed
        let handle = thread::Builder::new()
            .name(String::from("zensical/selector"))
            .spawn({
                let inner = Arc::clone(&inner);
                move || run(poller, &inner)
            })?;

        // Return selector
        *inner.thread.lock() = Some(handle);
        debug!(backend = ?Self::backend(), "selector started");
        Ok(Self { inner })
    }

    /// Returns the platform backend in use.
    #[must_use]
    pub const fn backend() -> Backend {
        if cfg!(any(
            target_os = "linux",
            target_os = "android",
            target_os = "illumos",
            target_os = "redox"
        )) {
            Backend::Epoll
        } else if cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "tvos",
            target_os = "watchos",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd",
            target_os = "dragonfly"
        )) {
            Backend::Kqueue
        } else if cfg!(windows) {
            Backend::Iocp
        } else {
            Backend::Poll
        }
    }

    /// Waits until the selectable is ready for the given interest.
    ///
    /// This is a convenience for [`Selectable::select`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the selectable or selector is closed.
    ///
    /// # Panics
    ///
    /// Panics if the interest was not declared at registration.
    #[inline]
    pub async fn select<S>(
        &self, selectable: &Selectable<S>, interest: Interest,
    ) -> Result
    where
        S: Source,
    {
        selectable.select(interest).await
    }

    /// Closes the selector.
    ///
    /// All registrations are closed, their pending waits fail, and the
    /// selector thread is stopped and joined. Closing is idempotent.
    pub fn close(&self) {
        // Mark as closed under the registrations lock, so every registration
        // either fails or is part of the snapshot
        let registrations: Vec<_> = {
            let registrations = self.inner.registrations.lock();
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            registrations.iter().map(|(_, r)| Arc::clone(r)).collect()
        };

        // Close all registrations, waking their waiters
        for registration in registrations {
            registration.close();
        }

        // Wake selector thread and join it, unless we're on it
        if let Err(err) = self.inner.waker.wake() {
            warn!(%err, "failed to wake selector thread");
        }
        let handle = self.inner.thread.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        debug!("selector closed");
    }

    /// Returns whether the selector is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns the number of registered sources.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registrations.lock().len()
    }

    /// Returns whether no sources are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a source for the given interest.
    fn register<S>(
        &self, source: &mut S, interest: Interest,
    ) -> Result<Arc<Registration>>
    where
        S: Source,
    {
        // Register source under the key of the vacant slab entry
        let mut registrations = self.inner.registrations.lock();
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let entry = registrations.vacant_entry();
        let token = entry.key();
        self.inner
            .registry
            .register(source, Token(token), interest.to_mio())?;

        // Store registration, so events can be dispatched to it
        let registration = Arc::new(Registration::new(token, interest));
        entry.insert(Arc::clone(&registration));
        trace!(token, ?interest, "registered");
        Ok(registration)
    }

    /// Deregisters a source and closes its registration.
    fn deregister<S>(
        &self, source: &mut S, registration: &Registration,
    ) -> Result
    where
        S: Source,
    {
        let token = registration.token();
        self.inner.registrations.lock().try_remove(token);
        registration.close();
        trace!(token, "deregistered");

        // Deregistering after close may fail, as the poller is gone
        match self.inner.registry.deregister(source) {
            Err(_) if self.is_closed() => Ok(()),
            res => res.map_err(Into::into),
        }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl fmt::Debug for Selector {
    /// Formats the selector for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Selector")
            .field("backend", &Self::backend())
            .field("registrations", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Dispatches readiness events until the selector is closed.
fn run(mut poller: Poller, inner: &Inner) {
    loop {
        if let Err(err) = poller.poll(None) {
            warn!(%err, "selector failed, closing");
            inner.closed.store(true, Ordering::Release);
            for (_, registration) in inner.registrations.lock().iter() {
                registration.close();
            }
            return;
        }
        if inner.closed.load(Ordering::Acquire) {
            return;
        }

        // Dispatch events outside of the registrations lock
        for event in &poller {
            let token = event.token();
            if token == WAKER {
                continue;
            }
            let registration = inner.registrations.lock().get(token.0).cloned();
            if let Some(registration) = registration {
                registration.dispatch(Interest::from_event(event));
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use futures_lite::future;
    use mio::net::{TcpListener, TcpStream};
    use std::io::{Read, Write};
    use std::net::SocketAddr;

    use super::*;

    fn bind() -> TcpListener {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        TcpListener::bind(addr).unwrap()
    }

    #[test]
    fn test_accept_and_read_readiness() {
        let selector = Selector::new().unwrap();
        let listener = Selectable::register(
            &selector,
            bind(),
            Interest::ACCEPT,
        )
        .unwrap();
        let addr = listener.source().local_addr().unwrap();

        // Connect a blocking client and accept it through the selector
        let mut client = std::net::TcpStream::connect(addr).unwrap();
        let (stream, _) = future::block_on(future::poll_fn(|cx| {
            listener.poll_io(cx, Interest::ACCEPT, TcpListener::accept)
        }))
        .unwrap();
        let stream =
            Selectable::register(&selector, stream, Interest::READ).unwrap();
        assert_eq!(selector.len(), 2);

        // Write from the client and read through the selector
        client.write_all(b"ping").unwrap();
        let mut buf = [0; 4];
        let n = future::block_on(future::poll_fn(|cx| {
            stream.poll_io(cx, Interest::READ, |mut s: &TcpStream| {
                s.read(&mut buf)
            })
        }))
        .unwrap();
        assert_eq!(&buf[..n], &b"ping"[..n]);
        selector.close();
    }

    #[test]
    fn test_closed_selectable_fails_select() {
        let selector = Selector::new().unwrap();
        let listener = Selectable::register(
            &selector,
            bind(),
            Interest::ACCEPT,
        )
        .unwrap();
        listener.close();
        let res = future::block_on(listener.select(Interest::ACCEPT));
        assert!(matches!(res, Err(Error::Closed)));
        selector.close();
    }

    #[test]
    fn test_close_fails_pending_waits() {
        let selector = Selector::new().unwrap();
        let listener = Selectable::register(
            &selector,
            bind(),
            Interest::ACCEPT,
        )
        .unwrap();
        let closer = selector.clone();
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(50));
            closer.close();
        });
        let res = future::block_on(selector.select(&listener, Interest::ACCEPT));
        assert!(matches!(res, Err(Error::Closed)));
        handle.join().unwrap();

        // Registering after close fails
        let res = Selectable::register(&selector, bind(), Interest::ACCEPT);
        assert!(matches!(res, Err(Error::Closed)));
    }

    #[test]
    fn test_concurrent_register_and_close() {
        for _ in 0..20 {
            let selector = Selector::new().unwrap();
            let registering = selector.clone();
            let handle = thread::spawn(move || {
                let mut registered = Vec::new();
                for _ in 0..64 {
                    match Selectable::register(
                        &registering,
                        bind(),
                        Interest::ACCEPT,
                    ) {
                        Ok(listener) => registered.push(listener),
                        Err(_) => break,
                    }
                }
                registered
            });
            thread::yield_now();
            selector.close();

            // Every registration that succeeded was closed with the selector
            for listener in handle.join().unwrap() {
                let res = future::block_on(listener.select(Interest::ACCEPT));
                assert!(matches!(res, Err(Error::Closed)));
            }
        }
    }

    #[test]
    fn test_deregister_twice_fails() {
        let selector = Selector::new().unwrap();
        let mut listener = Selectable::register(
            &selector,
            bind(),
            Interest::ACCEPT,
        )
        .unwrap();
        listener.deregister().unwrap();
        assert!(selector.is_empty());
        assert!(matches!(listener.deregister(), Err(Error::Deregistered)));
        selector.close();
    }

    #[test]
    #[should_panic(expected = "undeclared interest")]
    fn test_select_undeclared_interest_panics() {
        let selector = Selector::new().unwrap();
        let listener = Selectable::register(
            &selector,
            bind(),
            Interest::ACCEPT,
        )
        .unwrap();
        let _ = future::block_on(listener.select(Interest::READ));
    }
}
