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

//! HTTP status.

use std::fmt;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// HTTP status.
///
/// Statuses are kept as plain codes, so codes unknown to this crate are
/// preserved as received. Well-known codes are available as constants.
///
/// # Examples
///
/// ```
/// use zensical_http::Status;
///
/// // Create status and obtain reason phrase
/// let status = Status::NOT_FOUND;
/// assert_eq!(status.code(), 404);
/// assert_eq!(status.reason(), Some("Not Found"));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Status(u16);

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Status {
    /// Creates a status from a code.
    #[inline]
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        Self(code)
    }

    /// Returns the status code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Returns whether the status is informational (1xx).
    #[inline]
    #[must_use]
    pub const fn is_informational(self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Returns whether the status is successful (2xx).
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns whether a response with this status may carry a body.
    ///
    /// Informational responses, `204 No Content` and `304 Not Modified` never
    /// carry a body, regardless of their headers.
    #[inline]
    #[must_use]
    pub const fn allows_body(self) -> bool {
        !(self.is_informational() || self.0 == 204 || self.0 == 304)
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl fmt::Display for Status {
    /// Formats the status for display.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{} {reason}", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

// ----------------------------------------------------------------------------
// Macros
// ----------------------------------------------------------------------------

/// Defines and implements HTTP status codes.
macro_rules! define_and_impl_status {
    (
        $(
            // Status group
            $(#[$_:meta])*
            $group:ident:
            {
                $(
                    // Status definition
                    $(#[$comment:meta])*
                    $name:ident = $code:literal, $reason:expr
                ),+
                $(,)?
            }
        )+
    ) => {
        impl Status {
            $(
                $(
                    $(#[$comment])*
                    pub const $name: Status = Status($code);
                )+
            )+

            /// Returns the canonical reason phrase, if the code is known.
            ///
            /// # Examples
            ///
            /// ```
            /// use zensical_http::Status;
            ///
            /// // Obtain reason phrase
            /// assert_eq!(Status::NOT_MODIFIED.reason(), Some("Not Modified"));
            /// assert_eq!(Status::from_code(599).reason(), None);
            /// ```
            #[must_use]
            pub const fn reason(self) -> Option<&'static str> {
                match self.0 {
                    $(
                        $(
                            $code => Some($reason),
                        )+
                    )+
                    _ => None,
                }
            }
        }
    };
}

// ----------------------------------------------------------------------------

define_and_impl_status! {

    /// 1xx Informational
    Informational: {
        /// 100 Continue
        CONTINUE = 100, "Continue",
        /// 101 Switching Protocols
        SWITCHING_PROTOCOLS = 101, "Switching Protocols",
        /// 103 Early Hints
        EARLY_HINTS = 103, "Early Hints",
    }

    /// 2xx Success
    Success: {
        /// 200 OK
        OK = 200, "OK",
        /// 201 Created
        CREATED = 201, "Created",
        /// 202 Accepted
        ACCEPTED = 202, "Accepted",
        /// 204 No Content
        NO_CONTENT = 204, "No Content",
        /// 206 Partial Content
        PARTIAL_CONTENT = 206, "Partial Content",
    }

    /// 3xx Redirection
    Redirection: {
        /// 301 Moved Permanently
        MOVED_PERMANENTLY = 301, "Moved Permanently",
        /// 302 Found
        FOUND = 302, "Found",
        /// 303 See Other
        SEE_OTHER = 303, "See Other",
        /// 304 Not Modified
        NOT_MODIFIED = 304, "Not Modified",
        /// 307 Temporary Redirect
        TEMPORARY_REDIRECT = 307, "Temporary Redirect",
        /// 308 Permanent Redirect
        PERMANENT_REDIRECT = 308, "Permanent Redirect",
    }

    /// 4xx Client Error
    ClientError: {
        /// 400 Bad Request
        BAD_REQUEST = 400, "Bad Request",
        /// 401 Unauthorized
        UNAUTHORIZED = 401, "Unauthorized",
        /// 403 Forbidden
        FORBIDDEN = 403, "Forbidden",
        /// 404 Not Found
        NOT_FOUND = 404, "Not Found",
        /// 405 Method Not Allowed
        METHOD_NOT_ALLOWED = 405, "Method Not Allowed",
        /// 407 Proxy Authentication Required
        PROXY_AUTHENTICATION_REQUIRED = 407, "Proxy Authentication Required",
        /// 408 Request Timeout
        REQUEST_TIMEOUT = 408, "Request Timeout",
        /// 411 Length Required
        LENGTH_REQUIRED = 411, "Length Required",
        /// 413 Content Too Large
        CONTENT_TOO_LARGE = 413, "Content Too Large",
        /// 414 URI Too Long
        URI_TOO_LONG = 414, "URI Too Long",
        /// 431 Request Header Fields Too Large
        REQUEST_HEADER_FIELDS_TOO_LARGE = 431, "Request Header Fields Too Large",
    }

    /// 5xx Server Error
    ServerError: {
        /// 500 Internal Server Error
        INTERNAL_SERVER_ERROR = 500, "Internal Server Error",
        /// 501 Not Implemented
        NOT_IMPLEMENTED = 501, "Not Implemented",
        /// 502 Bad Gateway
        BAD_GATEWAY = 502, "Bad Gateway",
        /// 503 Service Unavailable
        SERVICE_UNAVAILABLE = 503, "Service Unavailable",
        /// 504 Gateway Timeout
        GATEWAY_TIMEOUT = 504, "Gateway Timeout",
        /// 505 HTTP Version Not Supported
        HTTP_VERSION_NOT_SUPPORTED = 505, "HTTP Version Not Supported",
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_body() {
        assert!(Status::OK.allows_body());
        assert!(!Status::CONTINUE.allows_body());
        assert!(!Status::NO_CONTENT.allows_body());
        assert!(!Status::NOT_MODIFIED.allows_body());
    }

    #[test]
    fn test_display_unknown_code() {
        assert_eq!(Status::BAD_REQUEST.to_string(), "400 Bad Request");
        assert_eq!(Status::from_code(599).to_string(), "599");
    }
}
