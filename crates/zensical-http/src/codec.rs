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

//! HTTP/1.x wire codec.
//!
//! The codec reads heads and bodies from byte streams that may deliver data
//! in arbitrarily small pieces, and writes them back in one go. Heads are
//! collected line by line under the configured [`Limits`][], and parsed with
//! [`httparse`] once the blank line terminating them was received. Bodies
//! are delimited by chunked transfer encoding, `Content-Length` or the end
//! of the connection, in that order of precedence.
//!
//! Every [`ParseError`] is a protocol violation. After a violation, the
//! byte boundaries of the connection are unknown, so the connection must be
//! discarded, never reused.
//!
//! [`Limits`]: crate::config::Limits

mod chunked;
mod encoding;
mod error;
mod framing;
mod parser;
mod reader;
mod writer;

pub use chunked::ChunkedDecoder;
pub use encoding::{Chunked, Encoder, Identity, encoder};
pub use error::{Error, ParseError, Result};
pub use framing::{ConnectionOptions, request_framing, response_framing};
pub use parser::{parse_request_head, parse_response_head};
pub use reader::{read_body, read_request, read_response};
pub use writer::{
    encode_request, encode_response, write_request, write_response,
};
