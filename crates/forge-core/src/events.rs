//! Advisory event sink
//!
//! The crew reports progress through a narrow injected interface. Sinks are
//! infallible and synchronous; they may observe a run but never steer it.

use uuid::Uuid;

/// A completed task, with its final agent and a short result summary
#[derive(Debug, Clone)]
pub struct TaskCompleted {
    /// Run identifier
    pub run_id: Uuid,
    /// Task name
    pub task: String,
    /// Agent that produced the accepted result
    pub agent: String,
    /// Attempts used across retries and escalation
    pub attempts: u32,
    /// Short result summary
    pub summary: String,
}

/// An intermediate step (planning, attempts, escalation)
#[derive(Debug, Clone)]
pub struct StepEvent {
    /// Run identifier
    pub run_id: Uuid,
    /// Agent the step belongs to
    pub agent: String,
    /// Human-readable step description
    pub detail: String,
}

/// Observer interface for crew runs
pub trait EventSink: Send + Sync {
    /// Called for intermediate steps
    fn on_step(&self, _event: &StepEvent) {}

    /// Called once per completed task
    fn on_task_complete(&self, _event: &TaskCompleted) {}
}

/// Sink that logs through `tracing`
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn on_step(&self, event: &StepEvent) {
        tracing::info!(
            run_id = %event.run_id,
            agent = %event.agent,
            "{}",
            event.detail
        );
    }

    fn on_task_complete(&self, event: &TaskCompleted) {
        tracing::info!(
            run_id = %event.run_id,
            task = %event.task,
            agent = %event.agent,
            attempts = event.attempts,
            summary = %event.summary,
            "Task completed"
        );
    }
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {}
