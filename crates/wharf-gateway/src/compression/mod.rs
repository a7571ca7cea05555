//! Transport compression
//!
//! With `compress=zlib-stream` the server deflates the whole socket as one
//! zlib stream and flushes after every message.

mod inflater;

pub use inflater::{InflateError, Inflater, ZLIB_SUFFIX};
