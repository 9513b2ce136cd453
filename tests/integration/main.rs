//! Integration tests
//!
//! These tests use wiremock to create mock HTTP servers and drive the
//! archiver end-to-end through its public API.

mod aops_tests;
mod common;
mod feed_tests;
mod stackexchange_tests;
mod transport_tests;
