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

//! Client error.

use std::sync::Arc;
use std::{fmt, io, result};
use thiserror::Error;

use crate::codec::{self, ParseError};
use crate::config;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Phase of an exchange in which a failure occurred.
///
/// Failures in the [`Phase::Connect`] phase guarantee that no byte of the
/// request reached the peer. Failures in later phases leave the outcome of
/// the request unknown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Connection establishment, or waiting for a connection.
    Connect,
    /// Writing the request.
    Write,
    /// Reading the response.
    Read,
}

/// Kind of timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Connection establishment timed out.
    Connect,
    /// Socket read or write timed out.
    Socket,
    /// Request timed out as a whole.
    Request,
}

// ----------------------------------------------------------------------------

/// Client error.
///
/// Errors are [`Clone`], so a single cause can fail every request that was
/// in flight on a broken connection.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Transport error.
    #[error("transport error on {host} during {phase}: {cause}")]
    Transport {
        /// Remote host.
        host: String,
        /// Phase.
        phase: Phase,
        /// Underlying I/O error.
        cause: Arc<io::Error>,
    },

    /// Protocol violation by the peer.
    #[error("protocol violation by {host}: {cause}")]
    Protocol {
        /// Remote host.
        host: String,
        /// Parse error.
        cause: ParseError,
    },

    /// Timeout.
    #[error("{kind} timeout on {host}")]
    Timeout {
        /// Remote host.
        host: String,
        /// Timeout kind.
        kind: TimeoutKind,
    },

    /// Waiting for a pooled connection timed out.
    #[error("timed out waiting for a connection to {host}")]
    PoolTimeout {
        /// Remote host.
        host: String,
    },

    /// Connection pool was closed.
    #[error("connection pool of {host} closed")]
    PoolClosed {
        /// Remote host.
        host: String,
    },

    /// Connection was closed by the peer.
    #[error("connection to {host} closed during {phase}")]
    Closed {
        /// Remote host.
        host: String,
        /// Phase.
        phase: Phase,
    },

    /// Request was canceled.
    #[error("request to {host} canceled")]
    Canceled {
        /// Remote host.
        host: String,
    },

    /// Capability is not supported.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// URL error.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] config::Error),
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Error {
    /// Creates an error from a codec error.
    ///
    /// End of stream is reported as [`Error::Closed`], since the peer closed
    /// the connection before the exchange was complete.
    pub(crate) fn from_codec(
        host: &str, phase: Phase, err: codec::Error,
    ) -> Self {
        match err {
            codec::Error::Parse(cause) => {
                Error::Protocol { host: host.to_string(), cause }
            }
            codec::Error::Io(cause) => Error::from_io(host, phase, cause),
        }
    }

    /// Creates an error from a shared I/O error.
    pub(crate) fn from_io(
        host: &str, phase: Phase, cause: Arc<io::Error>,
    ) -> Self {
        let host = host.to_string();
        match cause.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => {
                Error::Closed { host, phase }
            }
            _ => Error::Transport { host, phase, cause },
        }
    }

    /// Returns the phase in which the error occurred, if known.
    ///
    /// # Examples
    ///
    /// ```
    /// use zensical_http::{Error, Phase};
    ///
    /// // Create error while waiting for a connection
    /// let err = Error::PoolTimeout { host: "example.com".into() };
    /// assert_eq!(err.phase(), Some(Phase::Connect));
    /// ```
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::Transport { phase, .. } | Error::Closed { phase, .. } => {
                Some(*phase)
            }
            Error::Protocol { .. } => Some(Phase::Read),
            Error::Timeout { kind: TimeoutKind::Connect, .. }
            | Error::PoolTimeout { .. }
            | Error::PoolClosed { .. }
            | Error::Unsupported(_)
            | Error::Url(_)
            | Error::Config(_) => Some(Phase::Connect),
            Error::Timeout { .. } | Error::Canceled { .. } => None,
        }
    }

    /// Returns the remote host the error is tagged with, if any.
    ///
    /// Only invalid URLs and configurations fail before a host is known.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Error::Transport { host, .. }
            | Error::Protocol { host, .. }
            | Error::Timeout { host, .. }
            | Error::PoolTimeout { host }
            | Error::PoolClosed { host }
            | Error::Closed { host, .. }
            | Error::Canceled { host } => Some(host),
            Error::Unsupported(_) | Error::Url(_) | Error::Config(_) => None,
        }
    }

    /// Returns whether the request was certainly not sent.
    ///
    /// Only failures before the first byte was written are safe to retry.
    /// Requests that were sent, but whose response is unknown, never are.
    #[must_use]
    pub fn is_retry_safe(&self) -> bool {
        self.phase() == Some(Phase::Connect)
    }

    /// Returns whether the error is a timeout, excluding pool timeouts.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl fmt::Display for Phase {
    /// Formats the phase for display.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Phase::Connect => "connect",
            Phase::Write => "write",
            Phase::Read => "read",
        })
    }
}

impl fmt::Display for TimeoutKind {
    /// Formats the timeout kind for display.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            TimeoutKind::Connect => "connect",
            TimeoutKind::Socket => "socket",
            TimeoutKind::Request => "request",
        })
    }
}

// ----------------------------------------------------------------------------
// Type aliases
// ----------------------------------------------------------------------------

/// Client result.
pub type Result<T = ()> = result::Result<T, Error>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_safety_follows_phase() {
        let host = String::from("example.com");
        let cause = Arc::new(io::Error::from(io::ErrorKind::ConnectionReset));
        let err = Error::Transport {
            host: host.clone(),
            phase: Phase::Connect,
            cause: Arc::clone(&cause),
        };
        assert!(err.is_retry_safe());

        // Sent requests are never safe to retry
        let phase = Phase::Write;
        let err = Error::Transport { host: host.clone(), phase, cause };
        assert!(!err.is_retry_safe());
        let err = Error::Timeout { host, kind: TimeoutKind::Socket };
        assert!(!err.is_retry_safe());
    }

    #[test]
    fn test_pool_timeout_is_not_a_timeout() {
        let err = Error::PoolTimeout { host: "example.com".into() };
        assert!(!err.is_timeout());
        assert!(err.is_retry_safe());
    }

    #[test]
    fn test_end_of_stream_maps_to_closed() {
        let cause = Arc::new(io::Error::from(io::ErrorKind::UnexpectedEof));
        let err = Error::from_io("example.com", Phase::Read, cause);
        assert!(matches!(err, Error::Closed { phase: Phase::Read, .. }));
    }

    #[test]
    fn test_failures_are_tagged_with_host() {
        let host = String::from("example.com");
        let err = Error::PoolClosed { host: host.clone() };
        assert_eq!(err.host(), Some("example.com"));
        assert!(err.is_retry_safe());
        let err = Error::Canceled { host };
        assert_eq!(err.host(), Some("example.com"));
        assert_eq!(err.to_string(), "request to example.com canceled");
        assert!(!err.is_retry_safe());
    }
}
