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

//! Codec error.

use std::sync::Arc;
use std::{io, result};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Codec error.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error(transparent)]
    Io(Arc<io::Error>),

    /// Protocol violation.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Protocol violation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Malformed start line.
    #[error("malformed start line")]
    StartLine,

    /// Unknown method.
    #[error("unknown method")]
    Method,

    /// Line exceeds the maximum line length.
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    /// Too many headers or trailers.
    #[error("more than {0} headers")]
    TooManyHeaders(usize),

    /// Malformed header.
    #[error("malformed header")]
    Header,

    /// Invalid or conflicting `Content-Length`.
    #[error("invalid content length")]
    ContentLength,

    /// Transfer encoding not ending in `chunked`.
    #[error("unsupported transfer encoding")]
    TransferEncoding,

    /// Invalid chunk size line.
    #[error("invalid chunk size")]
    ChunkSize,

    /// Chunk data not followed by CRLF.
    #[error("invalid chunk terminator")]
    ChunkTerminator,

    /// End of stream inside a chunked body.
    #[error("premature end of chunked body")]
    ChunkedEof,

    /// End of stream before the declared length was received.
    #[error("premature end of body: expected {expected} bytes, received {received}")]
    PrematureEnd {
        /// Declared length.
        expected: u64,
        /// Received length.
        received: u64,
    },

    /// End of stream inside a head.
    #[error("unexpected end of head")]
    HeadEof,
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

impl From<httparse::Error> for ParseError {
    /// Creates a parse error from a parser error.
    fn from(err: httparse::Error) -> Self {
        match err {
            httparse::Error::HeaderName | httparse::Error::HeaderValue => {
                ParseError::Header
            }
            _ => ParseError::StartLine,
        }
    }
}

// ----------------------------------------------------------------------------
// Type aliases
// ----------------------------------------------------------------------------

/// Codec result.
pub type Result<T = ()> = result::Result<T, Error>;
