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

//! HTTP header name.

use std::fmt;

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl AsRef<str> for Header {
    /// Returns the string representation.
    #[inline]
    fn as_ref(&self) -> &str {
        self.name()
    }
}

// ----------------------------------------------------------------------------

impl fmt::Display for Header {
    /// Formats the header for display.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Macros
// ----------------------------------------------------------------------------

/// Defines and implements HTTP header names.
macro_rules! define_and_impl_header {
    (
        $(
            // Header group
            $(#[$_:meta])*
            $group:ident:
            {
                $(
                    // Header definition
                    $(#[$comment:meta])*
                    $name:ident = $header:expr
                ),+
                $(,)?
            }
        )+
    ) => {
        /// HTTP header name.
        ///
        /// This enum names the headers that the codec and connection layers
        /// interpret. Any other header can be used by its name as a string,
        /// as [`Headers`][] accepts everything that implements [`AsRef<str>`].
        ///
        /// [`Headers`]: crate::message::Headers
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Header {
            $(
                $(
                    $(#[$comment])*
                    $name,
                )+
            )+
        }

        impl Header {
            /// Returns the header name.
            ///
            /// # Examples
            ///
            /// ```
            /// use zensical_http::message::Header;
            ///
            /// // Create header
            /// let header = Header::TransferEncoding;
            ///
            /// // Obtain header name
            /// assert_eq!(header.name(), "Transfer-Encoding");
            /// ```
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    $(
                        $(
                            Header::$name => $header,
                        )+
                    )+
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------

define_and_impl_header! {

    /// Connection management
    Connection: {
        /// Connection
        Connection = "Connection",
        /// Keep-Alive
        KeepAlive = "Keep-Alive",
        /// Upgrade
        Upgrade = "Upgrade",
        /// Host
        Host = "Host",
    }

    /// Message framing
    Framing: {
        /// Content-Length
        ContentLength = "Content-Length",
        /// Transfer-Encoding
        TransferEncoding = "Transfer-Encoding",
        /// Trailer
        Trailer = "Trailer",
    }

    /// Informational
    Informational: {
        /// Date
        Date = "Date",
        /// Server
        Server = "Server",
        /// User-Agent
        UserAgent = "User-Agent",
        /// Content-Type
        ContentType = "Content-Type",
    }
}
