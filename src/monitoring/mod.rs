//! Monitoring Module
//!
//! Execution timing for workflow runs.
//!
//! - [`timeline`]: Per-step start/settle events and timing summaries

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
