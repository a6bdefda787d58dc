//! Execution Timeline
//!
//! Tracks step start/end events during a walk for generating
//! execution reports.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Step started executing
    Started,
    /// Step completed successfully
    Completed,
    /// Step failed
    Failed,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Name of the step
    pub step: String,
    /// Type of event
    pub event_type: EventType,
    /// When the event occurred
    pub timestamp: Instant,
}

/// Tracks the execution timeline of a workflow run.
///
/// Records when each step starts, completes, or fails. A step revisited
/// by a failure-handler loop contributes one event pair per visit.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Records an event for a step.
    pub fn add_event(&mut self, step: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            step: step.into(),
            event_type,
            timestamp: Instant::now(),
        });
    }

    /// Returns all recorded events.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Returns the wall-clock time the run started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Generates a textual timing summary, one line per step visit.
    pub fn summary(&self) -> String {
        let mut output = format!("Run started {}\n", self.started_at.to_rfc3339());

        // Pair each Started event with the next settle event for the step
        let mut open: HashMap<&str, Instant> = HashMap::new();

        for event in &self.events {
            match event.event_type {
                EventType::Started => {
                    open.insert(&event.step, event.timestamp);
                }
                EventType::Completed | EventType::Failed => {
                    if let Some(start) = open.remove(event.step.as_str()) {
                        let label = if event.event_type == EventType::Failed {
                            "failed"
                        } else {
                            "completed"
                        };
                        output.push_str(&format!(
                            "  {} {} in {:.2?}\n",
                            event.step,
                            label,
                            event.timestamp.duration_since(start)
                        ));
                    }
                }
            }
        }

        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}
