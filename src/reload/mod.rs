//! Live-reload wire protocol.

mod message;

pub use message::{ReloadEvent, ReloadMessage};
