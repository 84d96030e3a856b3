//! Integration tests for Reddit-Harvest
//!
//! Sessions and batches run against an in-memory API; the HTTP client runs against
//! wiremock.

mod batch_tests;
mod common;
mod session_tests;
