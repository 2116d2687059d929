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

//! HTTP/1.1 wire codec and connection pipelining engine.
//!
//! This crate implements the HTTP/1.x layer on top of [`zensical_net`]: a
//! streaming codec for heads and bodies, a client which multiplexes requests
//! over pipelined keep-alive connections bounded per host, and a server which
//! answers pipelined requests strictly in order.

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod codec;
pub mod config;
mod error;
pub mod message;
pub mod server;

pub use client::{Address, Client};
pub use config::{ClientConfig, EndpointConfig, Limits, ServerConfig};
pub use error::{Error, Phase, Result, TimeoutKind};
pub use message::{Body, Framing, Headers, Method, Request, Response, Status};
pub use server::Server;
