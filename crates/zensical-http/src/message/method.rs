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

//! HTTP method.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::codec::ParseError;

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Method {
    /// Returns whether a request with this method carries no body by default.
    ///
    /// Requests with these methods are written without `Content-Length` if
    /// their body is empty.
    #[must_use]
    pub const fn is_bodyless(&self) -> bool {
        matches!(
            self,
            Method::Get
                | Method::Head
                | Method::Delete
                | Method::Options
                | Method::Trace
                | Method::Connect
        )
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Method {
    /// Creates the default method.
    #[inline]
    fn default() -> Self {
        Method::Get
    }
}

impl AsRef<str> for Method {
    /// Returns the string representation.
    #[inline]
    fn as_ref(&self) -> &str {
        self.name()
    }
}

// ----------------------------------------------------------------------------

impl fmt::Display for Method {
    /// Formats the method for display.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Macros
// ----------------------------------------------------------------------------

/// Defines and implements HTTP methods.
macro_rules! define_and_impl_method {
    (
        $(
            // Method definition
            $(#[$comment:meta])*
            $name:ident = $method:expr
        ),+
        $(,)?
    ) => {
        /// HTTP method.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Method {
            $(
                $(#[$comment])*
                $name,
            )+
        }

        impl Method {
            /// Returns the method name.
            ///
            /// # Examples
            ///
            /// ```
            /// use zensical_http::Method;
            ///
            /// // Create method
            /// let method = Method::Connect;
            ///
            /// // Obtain method name
            /// assert_eq!(method.name(), "CONNECT");
            /// ```
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    $(
                        Method::$name => $method,
                    )+
                }
            }
        }

        /// Lookup table for HTTP methods (case-sensitive).
        static METHOD_LOOKUP_TABLE: LazyLock<HashMap<&'static str, Method>> =
            LazyLock::new(|| {
                HashMap::from_iter([
                    $(
                        ($method, Method::$name),
                    )+
                ])
            });

        impl FromStr for Method {
            type Err = ParseError;

            /// Attempts to create a method from a string.
            ///
            /// Method names are case-sensitive.
            ///
            /// # Errors
            ///
            /// This method returns [`ParseError::Method`], if the string does
            /// not match one of the known methods.
            ///
            /// # Examples
            ///
            /// ```
            /// # use std::error::Error;
            /// # fn main() -> Result<(), Box<dyn Error>> {
            /// use zensical_http::Method;
            ///
            /// // Create method from string
            /// let method: Method = "POST".parse()?;
            /// assert_eq!(method, Method::Post);
            /// # Ok(())
            /// # }
            /// ```
            fn from_str(value: &str) -> Result<Self, Self::Err> {
                METHOD_LOOKUP_TABLE
                    .get(value)
                    .copied()
                    .ok_or(ParseError::Method)
            }
        }
    }
}

// ----------------------------------------------------------------------------

define_and_impl_method! {
    /// GET method
    Get = "GET",
    /// HEAD method
    Head = "HEAD",
    /// POST method
    Post = "POST",
    /// PUT method
    Put = "PUT",
    /// DELETE method
    Delete = "DELETE",
    /// CONNECT method
    Connect = "CONNECT",
    /// OPTIONS method
    Options = "OPTIONS",
    /// TRACE method
    Trace = "TRACE",
    /// PATCH method
    Patch = "PATCH",
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!("CONNECT".parse::<Method>(), Ok(Method::Connect));
        assert_eq!("get".parse::<Method>(), Err(ParseError::Method));
    }
}
