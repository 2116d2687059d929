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

//! HTTP headers.

use std::fmt;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP headers.
///
/// Headers keep the order in which they were received or added, and allow
/// duplicates, which is required for headers like `Set-Cookie`. Names are
/// compared case-insensitively, but preserved as given.
///
/// # Examples
///
/// ```
/// use zensical_http::message::{Header, Headers};
///
/// // Create headers with a duplicate
/// let mut headers = Headers::new();
/// headers.append("Set-Cookie", "a=1");
/// headers.append("set-cookie", "b=2");
/// headers.insert(Header::ContentLength, "0");
///
/// // Look up headers case-insensitively
/// assert_eq!(headers.get("SET-COOKIE"), Some("a=1"));
/// assert_eq!(headers.get_all("Set-Cookie").count(), 2);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    /// Ordered name-value pairs.
    inner: Vec<(String, String)>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Headers {
    /// Creates empty headers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first value of the header with the given name.
    pub fn get<N>(&self, name: N) -> Option<&str>
    where
        N: AsRef<str>,
    {
        self.get_all(name).next()
    }

    /// Returns all values of the header with the given name, in order.
    pub fn get_all<N>(&self, name: N) -> impl Iterator<Item = &str>
    where
        N: AsRef<str>,
    {
        self.inner.iter().filter_map(move |(key, value)| {
            key.eq_ignore_ascii_case(name.as_ref()).then_some(value.as_str())
        })
    }

    /// Returns whether a header with the given name exists.
    #[inline]
    pub fn contains<N>(&self, name: N) -> bool
    where
        N: AsRef<str>,
    {
        self.get(name).is_some()
    }

    /// Appends a header, keeping existing headers with the same name.
    pub fn append<N, V>(&mut self, name: N, value: V)
    where
        N: AsRef<str>,
        V: ToString,
    {
        self.inner.push((name.as_ref().to_string(), value.to_string()));
    }

    /// Sets a header, replacing all existing headers with the same name.
    ///
    /// The header takes the position of the first replaced header, or is
    /// appended if there was none.
    pub fn insert<N, V>(&mut self, name: N, value: V)
    where
        N: AsRef<str>,
        V: ToString,
    {
        let name = name.as_ref();
        let position = self.position(name);
        self.remove(name);
        let entry = (name.to_string(), value.to_string());
        match position {
            Some(index) => self.inner.insert(index, entry),
            None => self.inner.push(entry),
        }
    }

    /// Removes all headers with the given name, returning how many there were.
    pub fn remove<N>(&mut self, name: N) -> usize
    where
        N: AsRef<str>,
    {
        let len = self.inner.len();
        self.inner.retain(|(key, _)| !key.eq_ignore_ascii_case(name.as_ref()));
        len - self.inner.len()
    }

    /// Returns an iterator over all headers, in order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the index of the first header with the given name.
    fn position(&self, name: &str) -> Option<usize> {
        self.inner.iter().position(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}

#[allow(clippy::must_use_candidate)]
impl Headers {
    /// Returns the number of headers.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether there are no headers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: AsRef<str>,
    V: ToString,
{
    /// Creates headers from an iterator.
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (N, V)>,
    {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

// ----------------------------------------------------------------------------

impl fmt::Debug for Headers {
    /// Formats the headers for debugging.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::message::Header;

    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut headers = Headers::new();
        headers.append("Host", "a");
        headers.append("Content-Length", "1");
        headers.append("content-length", "2");
        headers.append("Accept", "*/*");
        headers.insert(Header::ContentLength, 3);

        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["Host", "Content-Length", "Accept"]);
        assert_eq!(headers.get("CONTENT-LENGTH"), Some("3"));
    }

    #[test]
    fn test_remove_counts() {
        let mut headers: Headers =
            [("Via", "a"), ("via", "b"), ("Host", "c")].into_iter().collect();
        assert_eq!(headers.remove("VIA"), 2);
        assert_eq!(headers.len(), 1);
        assert!(!headers.contains("via"));
    }
}
