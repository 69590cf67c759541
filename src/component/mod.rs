//! Component catalog: the central data model and the authoritative
//! in-memory registry.
//!
//! ```text
//! Scanner --register/remove--> ComponentRegistry --events--> BuildPipeline
//!                                                        \--> PreviewServer
//! ```

mod cycles;
mod event;
mod info;
mod registry;

pub use event::{ComponentEvent, EventKind};
pub use info::{ComponentInfo, Parameter, validate_name};
pub use registry::{ComponentRegistry, SUBSCRIBER_BUFFER};
