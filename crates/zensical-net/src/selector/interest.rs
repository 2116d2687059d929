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

//! Selection interest.

use mio::event::Event;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Selection interest.
///
/// Interests form a small bitmask, which is declared once when a source is
/// registered with the [`Selector`][]. Selecting on an interest that was not
/// declared is a programming error, and panics immediately.
///
/// [`Selector`]: crate::selector::Selector
///
/// # Examples
///
/// ```
/// use zensical_net::selector::Interest;
///
/// // Create interest for a stream
/// let interest = Interest::READ | Interest::WRITE;
/// assert!(interest.contains(Interest::READ));
/// assert!(!interest.contains(Interest::ACCEPT));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interest(u8);

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Interest {
    /// Interest in readable data.
    pub const READ: Interest = Interest(1);
    /// Interest in writable buffer space.
    pub const WRITE: Interest = Interest(1 << 1);
    /// Interest in pending connections.
    pub const ACCEPT: Interest = Interest(1 << 2);
    /// Interest in connection establishment.
    pub const CONNECT: Interest = Interest(1 << 3);

    /// All interests, in index order.
    const ALL: [Interest; 4] =
        [Self::READ, Self::WRITE, Self::ACCEPT, Self::CONNECT];

    /// Creates an empty interest.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns whether the interest is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns whether all interests of the other value are contained.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether any interest of the other value is contained.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Interest) -> bool {
        self.0 & other.0 != 0
    }

    /// Removes the interests of the other value.
    #[inline]
    pub fn remove(&mut self, other: Interest) {
        self.0 &= !other.0;
    }

    /// Returns an iterator over the single interests contained.
    pub fn iter(self) -> impl Iterator<Item = Interest> {
        Self::ALL.into_iter().filter(move |&interest| self.contains(interest))
    }

    /// Returns the slot index of a single interest.
    ///
    /// # Panics
    ///
    /// Panics if the value does not contain exactly one interest.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::READ => 0,
            Self::WRITE => 1,
            Self::ACCEPT => 2,
            Self::CONNECT => 3,
            _ => panic!("expected a single interest, got {self:?}"),
        }
    }

    /// Converts the interest into the platform poller's interest.
    ///
    /// # Panics
    ///
    /// Panics if the interest is empty.
    pub(crate) fn to_mio(self) -> mio::Interest {
        let readable = self.intersects(Self::READ | Self::ACCEPT);
        let writable = self.intersects(Self::WRITE | Self::CONNECT);
        match (readable, writable) {
            (true, true) => mio::Interest::READABLE | mio::Interest::WRITABLE,
            (true, false) => mio::Interest::READABLE,
            (false, true) => mio::Interest::WRITABLE,
            (false, false) => panic!("cannot register an empty interest"),
        }
    }

    /// Derives the ready interests from a poller event.
    ///
    /// Errors and hang-ups make every interest on that side ready, so that
    /// the waiting task retries its operation and observes the failure.
    pub(crate) fn from_event(event: &Event) -> Self {
        let mut ready = Self::empty();
        if event.is_readable() || event.is_read_closed() || event.is_error() {
            ready |= Self::READ | Self::ACCEPT;
        }
        if event.is_writable() || event.is_write_closed() || event.is_error()
        {
            ready |= Self::WRITE | Self::CONNECT;
        }
        ready
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl BitOr for Interest {
    type Output = Self;

    /// Combines two interests.
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    /// Adds the interests of the other value.
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Interest {
    type Output = Self;

    /// Intersects two interests.
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

// ----------------------------------------------------------------------------

impl fmt::Debug for Interest {
    /// Formats the interest for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(empty)");
        }
        let names = ["READ", "WRITE", "ACCEPT", "CONNECT"];
        let mut first = true;
        for (interest, name) in Self::ALL.iter().zip(names) {
            if self.contains(*interest) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iter_yields_single_interests() {
        let interest = Interest::READ | Interest::CONNECT;
        let all: Vec<_> = interest.iter().collect();
        assert_eq!(all, vec![Interest::READ, Interest::CONNECT]);
        assert_eq!(format!("{interest:?}"), "READ | CONNECT");
    }

    #[test]
    fn test_mio_mapping() {
        assert_eq!(Interest::ACCEPT.to_mio(), mio::Interest::READABLE);
        assert_eq!(Interest::CONNECT.to_mio(), mio::Interest::WRITABLE);
        assert_eq!(
            (Interest::READ | Interest::WRITE).to_mio(),
            mio::Interest::READABLE | mio::Interest::WRITABLE
        );
    }

    #[test]
    #[should_panic(expected = "expected a single interest")]
    fn test_index_rejects_combined_interest() {
        let _ = (Interest::READ | Interest::WRITE).index();
    }
}
