//! Process-wide state and shared primitives.

mod priority;
mod state;

pub use priority::{PRIORITY_PREVIEW, PRIORITY_SCAN};
pub use state::{
    is_healthy, is_serving, is_shutdown, register_server, set_healthy, set_serving,
    setup_shutdown_handler,
};
