//! Incremental log entry counting.
//!
//! - [`WatermarkTracker`]: per-stream watermark and entry counters
//! - [`LogSource`]: polls every log stream and reports the counters

mod collector;
mod watermark;

pub use collector::LogSource;
pub use watermark::{LogPosition, WatermarkTracker};
