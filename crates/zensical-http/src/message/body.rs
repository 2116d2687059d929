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

//! HTTP body.

use super::Headers;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP body.
///
/// Bodies are buffered in full, and tagged with their framing. Received
/// bodies carry the framing they were delimited with, and chunked bodies
/// also carry their trailers. Bodies to be sent carry the framing they should
/// be written with.
///
/// # Examples
///
/// ```
/// use zensical_http::{Body, Framing};
///
/// // Create body with known length
/// let body = Body::from("Hello, world!");
/// assert_eq!(body.framing, Framing::Length(13));
///
/// // Create body which is written in chunks
/// let body = Body::chunked("Hello, world!");
/// assert_eq!(body.framing, Framing::Chunked);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Body {
    /// Body framing.
    pub framing: Framing,
    /// Body data.
    pub data: Vec<u8>,
    /// Trailers, only sent or received with chunked framing.
    pub trailers: Headers,
}

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Body framing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// Body with a known length.
    Length(u64),
    /// Body in chunked transfer encoding.
    Chunked,
    /// Body delimited by the end of the connection.
    UntilClose,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Body {
    /// Creates an empty body.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a body written in chunked transfer encoding.
    #[must_use]
    pub fn chunked<D>(data: D) -> Self
    where
        D: Into<Vec<u8>>,
    {
        Self {
            framing: Framing::Chunked,
            data: data.into(),
            trailers: Headers::new(),
        }
    }

    /// Creates a body delimited by closing the connection.
    #[must_use]
    pub fn until_close<D>(data: D) -> Self
    where
        D: Into<Vec<u8>>,
    {
        Self {
            framing: Framing::UntilClose,
            data: data.into(),
            trailers: Headers::new(),
        }
    }

    /// Adds a trailer, switching to chunked framing.
    #[must_use]
    pub fn trailer<N, V>(mut self, name: N, value: V) -> Self
    where
        N: AsRef<str>,
        V: ToString,
    {
        self.framing = Framing::Chunked;
        self.trailers.append(name, value);
        self
    }

    /// Returns the body data as a string, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

#[allow(clippy::must_use_candidate)]
impl Body {
    /// Returns the number of bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the body is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Framing {
    /// Returns the name of the transfer encoding for this framing.
    #[must_use]
    pub const fn encoding(&self) -> &'static str {
        match self {
            Framing::Chunked => "chunked",
            Framing::Length(_) | Framing::UntilClose => "identity",
        }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Framing {
    /// Creates the framing of an empty body.
    #[inline]
    fn default() -> Self {
        Framing::Length(0)
    }
}

// ----------------------------------------------------------------------------

impl From<Vec<u8>> for Body {
    /// Creates a body with known length from bytes.
    #[inline]
    fn from(data: Vec<u8>) -> Self {
        Self {
            framing: Framing::Length(data.len() as u64),
            data,
            trailers: Headers::new(),
        }
    }
}

impl From<&[u8]> for Body {
    /// Creates a body with known length from bytes.
    #[inline]
    fn from(data: &[u8]) -> Self {
        Self::from(data.to_vec())
    }
}

impl From<&str> for Body {
    /// Creates a body with known length from a string.
    #[inline]
    fn from(data: &str) -> Self {
        Self::from(data.as_bytes().to_vec())
    }
}

impl From<String> for Body {
    /// Creates a body with known length from a string.
    #[inline]
    fn from(data: String) -> Self {
        Self::from(data.into_bytes())
    }
}
