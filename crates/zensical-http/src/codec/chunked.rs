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

//! Chunked transfer decoding.

use std::mem;

use crate::config::Limits;
use crate::message::Headers;

use super::error::ParseError;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Chunked transfer decoder.
///
/// The decoder is a state machine that is fed with whatever bytes are
/// available, and consumes them up to the end of the body, so it's agnostic
/// of how the input is split. Chunk extensions are ignored, and trailers are
/// collected as headers.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use zensical_http::codec::ChunkedDecoder;
/// use zensical_http::config::Limits;
///
/// // Create decoder and feed it in two pieces
/// let mut decoder = ChunkedDecoder::new(Limits::default());
/// let mut data = Vec::new();
/// decoder.decode(b"5;ext=1\r\nhel", &mut data)?;
/// decoder.decode(b"lo\r\n0\r\n\r\nnext", &mut data)?;
/// assert!(decoder.is_done());
/// assert_eq!(data, b"hello");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChunkedDecoder {
    /// Decoder state.
    state: State,
    /// Codec limits.
    limits: Limits,
    /// Length of the current size or trailer line.
    length: usize,
    /// Current trailer line.
    line: Vec<u8>,
    /// Trailers.
    trailers: Headers,
}

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Decoder state.
#[derive(Clone, Copy, Debug)]
enum State {
    /// Reading hex digits of the chunk size.
    Size { size: u64, seen: bool },
    /// Skipping a chunk extension.
    Extension { size: u64 },
    /// Expecting LF after the chunk size line.
    SizeLf { size: u64 },
    /// Reading chunk data.
    Data { remaining: u64 },
    /// Expecting CR after chunk data.
    DataCr,
    /// Expecting LF after chunk data.
    DataLf,
    /// Reading a trailer line.
    Trailer,
    /// Body complete.
    Done,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl ChunkedDecoder {
    /// Creates a chunked decoder.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            state: State::Size { size: 0, seen: false },
            limits,
            length: 0,
            line: Vec::new(),
            trailers: Headers::new(),
        }
    }

    /// Decodes the given input, appending chunk data to the output.
    ///
    /// Returns the number of bytes consumed, which is less than the length of
    /// the input only if the body ended before.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the input is not valid chunked encoding,
    /// or if a size or trailer line exceeds the limits.
    pub fn decode(
        &mut self, input: &[u8], out: &mut Vec<u8>,
    ) -> Result<usize, ParseError> {
        let mut pos = 0;
        while pos < input.len() {
            match self.state {
                State::Done => break,

                // Copy as much chunk data as is available at once
                State::Data { remaining } => {
                    let available = input.len() - pos;
                    let n = usize::try_from(remaining)
                        .map_or(available, |remaining| remaining.min(available));
                    out.extend_from_slice(&input[pos..pos + n]);
                    pos += n;
                    self.state = match remaining - n as u64 {
                        0 => State::DataCr,
                        remaining => State::Data { remaining },
                    };
                }

                // Everything else is processed byte by byte
                _ => {
                    self.step(input[pos])?;
                    pos += 1;
                }
            }
        }
        Ok(pos)
    }

    /// Returns whether the terminating chunk and trailers were decoded.
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Returns the trailers, consuming the decoder.
    #[inline]
    #[must_use]
    pub fn into_trailers(self) -> Headers {
        self.trailers
    }

    /// Processes a single byte outside of chunk data.
    fn step(&mut self, byte: u8) -> Result<(), ParseError> {
        if !matches!(self.state, State::DataCr | State::DataLf) {
            self.length += 1;
            if self.length > self.limits.max_line_length + 2 {
                return Err(ParseError::LineTooLong(self.limits.max_line_length));
            }
        }
        self.state = match self.state {
            State::Size { size, seen } => match byte {
                b'\r' | b'\n' | b';' | b' ' | b'\t' if !seen => {
                    return Err(ParseError::ChunkSize);
                }
                b'\r' => State::SizeLf { size },
                b'\n' => self.begin(size),
                b';' | b' ' | b'\t' => State::Extension { size },
                _ => {
                    let digit = char::from(byte)
                        .to_digit(16)
                        .ok_or(ParseError::ChunkSize)?;
                    let size = size
                        .checked_mul(16)
                        .and_then(|size| size.checked_add(u64::from(digit)))
                        .ok_or(ParseError::ChunkSize)?;
                    State::Size { size, seen: true }
                }
            },
            State::Extension { size } => match byte {
                b'\r' => State::SizeLf { size },
                b'\n' => self.begin(size),
                _ => State::Extension { size },
            },
            State::SizeLf { size } => match byte {
                b'\n' => self.begin(size),
                _ => return Err(ParseError::ChunkSize),
            },
            State::DataCr => match byte {
                b'\r' => State::DataLf,
                b'\n' => self.begin_size(),
                _ => return Err(ParseError::ChunkTerminator),
            },
            State::DataLf => match byte {
                b'\n' => self.begin_size(),
                _ => return Err(ParseError::ChunkTerminator),
            },
            State::Trailer => match byte {
                b'\n' => self.end_trailer()?,
                _ => {
                    self.line.push(byte);
                    State::Trailer
                }
            },
            state @ (State::Data { .. } | State::Done) => state,
        };
        Ok(())
    }

    /// Begins the chunk of the given size, or the trailers.
    fn begin(&mut self, size: u64) -> State {
        self.length = 0;
        if size == 0 {
            State::Trailer
        } else {
            State::Data { remaining: size }
        }
    }

    /// Begins the next chunk size line.
    fn begin_size(&mut self) -> State {
        self.length = 0;
        State::Size { size: 0, seen: false }
    }

    /// Ends a trailer line, which ends the body if it's empty.
    fn end_trailer(&mut self) -> Result<State, ParseError> {
        self.length = 0;
        let mut line = mem::take(&mut self.line);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            return Ok(State::Done);
        }

        // Trailers count against the header limit
        if self.trailers.len() >= self.limits.max_headers {
            return Err(ParseError::TooManyHeaders(self.limits.max_headers));
        }
        let line = String::from_utf8(line).map_err(|_| ParseError::Header)?;
        let (name, value) = line.split_once(':').ok_or(ParseError::Header)?;
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ParseError::Header);
        }
        self.trailers.append(name, value.trim());
        Ok(State::Trailer)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Result<(Vec<u8>, usize, bool), ParseError> {
        let mut decoder = ChunkedDecoder::new(Limits::default());
        let mut data = Vec::new();
        let n = decoder.decode(input, &mut data)?;
        Ok((data, n, decoder.is_done()))
    }

    #[test]
    fn test_stops_at_end_of_body() {
        let input = b"3\r\nabc\r\n2\r\nde\r\n0\r\n\r\nGET";
        let (data, n, done) = decode(input).unwrap();
        assert_eq!(data, b"abcde");
        assert_eq!(n, input.len() - 3);
        assert!(done);
    }

    #[test]
    fn test_byte_at_a_time_with_trailers() {
        let input = b"A\r\n0123456789\r\n0\r\nX-Sum: 45\r\nX-Other:1\r\n\r\n";
        let mut decoder = ChunkedDecoder::new(Limits::default());
        let mut data = Vec::new();
        for byte in input {
            assert_eq!(decoder.decode(&[*byte], &mut data).unwrap(), 1);
        }
        assert!(decoder.is_done());
        assert_eq!(data, b"0123456789");
        let trailers = decoder.into_trailers();
        assert_eq!(trailers.get("x-sum"), Some("45"));
        assert_eq!(trailers.get("X-Other"), Some("1"));
    }

    #[test]
    fn test_invalid_chunk_size() {
        assert_eq!(decode(b"xyz\r\n"), Err(ParseError::ChunkSize));
        assert_eq!(decode(b"\r\n"), Err(ParseError::ChunkSize));
        assert_eq!(
            decode(b"11111111111111111\r\n"),
            Err(ParseError::ChunkSize)
        );
    }

    #[test]
    fn test_invalid_chunk_terminator() {
        assert_eq!(decode(b"2\r\nabc\r\n"), Err(ParseError::ChunkTerminator));
    }

    #[test]
    fn test_oversize_size_line() {
        let limits = Limits { max_line_length: 8, ..Limits::default() };
        let mut decoder = ChunkedDecoder::new(limits);
        let err = decoder.decode(b"1;aaaaaaaaaaaaaaa\r\n", &mut Vec::new());
        assert_eq!(err, Err(ParseError::LineTooLong(8)));
    }

    #[test]
    fn test_incomplete_body() {
        let (data, _, done) = decode(b"5\r\nab").unwrap();
        assert_eq!(data, b"ab");
        assert!(!done);
    }
}
