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

//! Body encoders.

use crate::message::Headers;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Identity encoder, writing data as is.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

/// Chunked encoder, writing data in length-prefixed chunks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Chunked;

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Body encoder.
///
/// Encoders are selected by the name of the transfer encoding, and write the
/// body in one or more pieces, followed by whatever terminates the body.
pub trait Encoder: Send {
    /// Returns the name of the transfer encoding.
    fn name(&self) -> &'static str;

    /// Encodes a piece of the body.
    fn encode(&mut self, data: &[u8], out: &mut Vec<u8>);

    /// Terminates the body, writing trailers where supported.
    fn finish(&mut self, trailers: &Headers, out: &mut Vec<u8>);
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Encoder for Identity {
    #[inline]
    fn name(&self) -> &'static str {
        "identity"
    }

    #[inline]
    fn encode(&mut self, data: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(data);
    }

    #[inline]
    fn finish(&mut self, _trailers: &Headers, _out: &mut Vec<u8>) {}
}

impl Encoder for Chunked {
    #[inline]
    fn name(&self) -> &'static str {
        "chunked"
    }

    /// Encodes a piece of the body as a single chunk.
    ///
    /// Empty pieces are skipped, as an empty chunk terminates the body.
    fn encode(&mut self, data: &[u8], out: &mut Vec<u8>) {
        if !data.is_empty() {
            out.extend_from_slice(format!("{:X}\r\n", data.len()).as_bytes());
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
    }

    /// Writes the terminating chunk and trailers.
    fn finish(&mut self, trailers: &Headers, out: &mut Vec<u8>) {
        out.extend_from_slice(b"0\r\n");
        for (name, value) in trailers.iter() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Returns the encoder for the given transfer encoding, if supported.
///
/// # Examples
///
/// ```
/// use zensical_http::codec::encoder;
/// use zensical_http::message::Headers;
///
/// // Encode body in chunks
/// let mut encoder = encoder("chunked").unwrap();
/// let mut out = Vec::new();
/// encoder.encode(b"hello", &mut out);
/// encoder.finish(&Headers::new(), &mut out);
/// assert_eq!(out, b"5\r\nhello\r\n0\r\n\r\n");
/// ```
#[must_use]
pub fn encoder(name: &str) -> Option<Box<dyn Encoder>> {
    if name.eq_ignore_ascii_case("identity") {
        Some(Box::new(Identity))
    } else if name.eq_ignore_ascii_case("chunked") {
        Some(Box::new(Chunked))
    } else {
        None
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::codec::ChunkedDecoder;
    use crate::config::Limits;

    use super::*;

    #[test]
    fn test_unknown_encoding() {
        assert!(encoder("gzip").is_none());
        let encoder = encoder("Chunked").unwrap();
        assert_eq!(encoder.name(), "chunked");
    }

    #[test]
    fn test_empty_body() {
        let mut out = Vec::new();
        Chunked.encode(b"", &mut out);
        Chunked.finish(&Headers::new(), &mut out);
        assert_eq!(out, b"0\r\n\r\n");
    }

    proptest! {
        #[test]
        fn test_chunked_round_trip(
            body in proptest::collection::vec(any::<u8>(), 0..2048),
            sizes in proptest::collection::vec(1usize..300, 1..16),
            reads in proptest::collection::vec(1usize..64, 1..16),
        ) {
            // Encode body in chunks of random sizes
            let mut out = Vec::new();
            let mut rest = body.as_slice();
            for size in sizes.iter().cycle() {
                if rest.is_empty() {
                    break;
                }
                let (chunk, tail) = rest.split_at((*size).min(rest.len()));
                Chunked.encode(chunk, &mut out);
                rest = tail;
            }
            let mut trailers = Headers::new();
            trailers.append("X-Check", body.len());
            Chunked.finish(&trailers, &mut out);

            // Decode with random read boundaries
            let mut decoder = ChunkedDecoder::new(Limits::default());
            let mut data = Vec::new();
            let mut input = out.as_slice();
            for size in reads.iter().cycle() {
                if input.is_empty() {
                    break;
                }
                let (piece, tail) = input.split_at((*size).min(input.len()));
                let n = decoder.decode(piece, &mut data).unwrap();
                prop_assert_eq!(n, piece.len());
                input = tail;
            }
            prop_assert!(decoder.is_done());
            prop_assert_eq!(&data, &body);
            let len = body.len().to_string();
            let trailers = decoder.into_trailers();
            prop_assert_eq!(trailers.get("x-check"), Some(len.as_str()));
        }
    }
}
