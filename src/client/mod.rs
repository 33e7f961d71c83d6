//! Robots-aware HTTP client
//!
//! This module provides the request interceptor and the raw transport it
//! wraps.
//!
//! # Components
//!
//! - `RobotsClient`: checks each request against robots.txt before sending it
//! - `Transport`: the raw, unchecked way of sending a request

mod interceptor;
mod transport;

pub use interceptor::RobotsClient;
pub use transport::{build_http_client, Transport};
