//! Event dispatch
//!
//! Bridges gateway dispatch frames to user callbacks.

mod dispatcher;
mod event;
mod parsers;

pub use dispatcher::{Dispatcher, Handler, HandlerError};
pub use event::{Event, EventData};
