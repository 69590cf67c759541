//! Build task priorities.
//!
//! Priorities are plain integers; higher runs sooner. Equal priorities
//! fall back to FIFO arrival order in the pipeline queue.

/// Scan-induced rebuilds (background work).
pub const PRIORITY_SCAN: i32 = 0;

/// User-initiated previews (someone is waiting on this render).
pub const PRIORITY_PREVIEW: i32 = 10;
