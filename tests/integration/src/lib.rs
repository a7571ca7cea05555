//! Integration test utilities
//!
//! In-process mock REST and gateway servers for end-to-end tests of the
//! client.

pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
