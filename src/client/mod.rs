//! Client Module
//!
//! HTTP client and rate limit detection.

pub mod http;
pub mod rate_limit;

pub use http::HttpClient;
pub use rate_limit::{is_rate_limit_error, parse_retry_after};
