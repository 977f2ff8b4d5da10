//! Integration test suite for the `cloudcom` binary
//!
//! End-to-end runs of the CLI against temporary projects. Component endpoints
//! are served by wiremock.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **transform**: `cloudcom transform` output modes and summaries
//! - **cache**: `cloudcom cache list` and `cloudcom cache verify`
//! - **init**: `cloudcom init`

mod cache;
mod init;
mod transform;
