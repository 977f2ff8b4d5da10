//! Unit test suite for cloudcom
//!
//! Tests that need more than one module but no binary: the HTTP fetcher
//! against a local mock endpoint, and the transformer end to end with real
//! HTTP.
//!
//! ```bash
//! cargo test --test unit
//! ```

mod http_fetcher;
mod transformer;
