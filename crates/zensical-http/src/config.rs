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

//! Configuration.
//!
//! Configuration types are plain values without behavior. They can be built
//! in code, starting from their defaults, or loaded from TOML, in which case
//! missing fields fall back to their defaults. Durations are given in
//! milliseconds, and a zero socket or pool timeout means "no timeout".

use serde::{Deserialize, Serialize};
use std::time::Duration;

mod error;
mod millis;

pub use error::{Error, Result};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Client configuration.
///
/// # Examples
///
/// ```
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// use zensical_http::ClientConfig;
///
/// // Load configuration from TOML
/// let config = ClientConfig::from_toml(r#"
///     pipelining = true
///
///     [endpoint]
///     pipeline_max_size = 4
/// "#)?;
/// assert_eq!(config.endpoint.pipeline_max_size, 4);
/// assert_eq!(config.endpoint.max_connections_per_host, 100);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Whether to pipeline requests.
    pub pipelining: bool,
    /// Timeout for a request as a whole, or zero for none.
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    /// Endpoint configuration.
    pub endpoint: EndpointConfig,
    /// Codec limits.
    pub limits: Limits,
}

/// Endpoint configuration, applied to every remote host.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    /// Maximum number of in-flight requests per connection.
    pub pipeline_max_size: usize,
    /// Time after which an idle connection is closed.
    #[serde(with = "millis")]
    pub keep_alive_time: Duration,
    /// Maximum number of connections per host.
    pub max_connections_per_host: usize,
    /// Timeout for each connection attempt.
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    /// Timeout for each socket read and write, or zero for none.
    #[serde(with = "millis")]
    pub socket_timeout: Duration,
    /// Number of connection attempts.
    pub connect_attempts: usize,
    /// Timeout for waiting on a connection, or zero for none.
    #[serde(with = "millis")]
    pub pool_timeout: Duration,
}

/// Server configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Time after which a connection without requests is closed.
    #[serde(with = "millis")]
    pub idle_timeout: Duration,
    /// Codec limits.
    pub limits: Limits,
}

/// Codec limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Maximum length of a start line, header line or chunk size line.
    pub max_line_length: usize,
    /// Maximum number of headers or trailers.
    pub max_headers: usize,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl ClientConfig {
    /// Loads and validates client configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Toml`] if the source can't be deserialized, and
    /// [`Error::Invalid`] if a value is out of range.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate().map(|()| config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] if a value is out of range.
    pub fn validate(&self) -> Result {
        self.endpoint.validate()?;
        self.limits.validate()
    }
}

impl EndpointConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] if a value is out of range.
    pub fn validate(&self) -> Result {
        let checks = [
            ("pipeline_max_size", self.pipeline_max_size),
            ("max_connections_per_host", self.max_connections_per_host),
            ("connect_attempts", self.connect_attempts),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(Error::Invalid { field, reason: "must be positive" });
            }
        }
        Ok(())
    }
}

impl ServerConfig {
    /// Loads and validates server configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Toml`] if the source can't be deserialized, and
    /// [`Error::Invalid`] if a value is out of range.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate().map(|()| config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] if a value is out of range.
    pub fn validate(&self) -> Result {
        if self.idle_timeout.is_zero() {
            let reason = "must be positive";
            return Err(Error::Invalid { field: "idle_timeout", reason });
        }
        self.limits.validate()
    }
}

impl Limits {
    /// Validates the limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] if a limit is zero.
    pub fn validate(&self) -> Result {
        if self.max_line_length == 0 {
            let reason = "must be positive";
            return Err(Error::Invalid { field: "max_line_length", reason });
        }
        if self.max_headers == 0 {
            let reason = "must be positive";
            return Err(Error::Invalid { field: "max_headers", reason });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for ClientConfig {
    /// Creates the default client configuration.
    fn default() -> Self {
        Self {
            pipelining: false,
            request_timeout: Duration::ZERO,
            endpoint: EndpointConfig::default(),
            limits: Limits::default(),
        }
    }
}

impl Default for EndpointConfig {
    /// Creates the default endpoint configuration.
    fn default() -> Self {
        Self {
            pipeline_max_size: 20,
            keep_alive_time: Duration::from_millis(5000),
            max_connections_per_host: 100,
            connect_timeout: Duration::from_millis(5000),
            socket_timeout: Duration::ZERO,
            connect_attempts: 1,
            pool_timeout: Duration::ZERO,
        }
    }
}

impl Default for ServerConfig {
    /// Creates the default server configuration.
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(45_000),
            limits: Limits::default(),
        }
    }
}

impl Default for Limits {
    /// Creates the default limits.
    fn default() -> Self {
        Self { max_line_length: 8192, max_headers: 100 }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.endpoint.keep_alive_time, Duration::from_secs(5));
        assert_eq!(config.limits.max_line_length, 8192);
    }

    #[test]
    fn test_durations_in_millis() {
        let config = ClientConfig::from_toml(
            "request_timeout = 1500\n[endpoint]\nsocket_timeout = 250\n",
        )
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.endpoint.socket_timeout, Duration::from_millis(250));

        // Serializing yields milliseconds again
        let source = toml::to_string(&config).unwrap();
        assert!(source.contains("request_timeout = 1500"));
    }

    #[test]
    fn test_rejects_zero_pipeline_size() {
        let err = ClientConfig::from_toml("[endpoint]\npipeline_max_size = 0\n")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Invalid { field: "pipeline_max_size", .. }
        ));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = ServerConfig::from_toml("idle = 5\n").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }
}
