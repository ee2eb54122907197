//! Gatehouse Backend Library
//!
//! Exposes the authentication core for use by the binary and tests.

pub mod auth;
