//! Core types for chatrelay.

mod identifiers;
mod message;

pub use identifiers::*;
pub use message::*;
