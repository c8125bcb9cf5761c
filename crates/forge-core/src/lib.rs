//! Forge Core - Crew Engine
//!
//! This crate provides the crew machinery for the Forge service:
//! - Roster: role definitions loaded from YAML (the agent registry)
//! - Tasks: task definitions with run-input placeholders (the task registry)
//! - Plan: the manager's explicit, inspectable delegation
//! - Crew: hierarchical run coordination with retries and escalation
//! - Workspace: per-run isolated output directories
//! - Archive: the flattened zip deliverable
//! - Events: advisory observation of a run

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod crew;
pub mod error;
pub mod events;
pub mod manager;
pub mod plan;
pub mod retry;
pub mod roster;
pub mod tasks;
pub mod worker;
pub mod workspace;

pub use archive::{package, DEFAULT_ARCHIVE_NAME};
pub use crew::{Crew, RunReport, TaskRecord};
pub use error::{Error, Result};
pub use events::{EventSink, NullEventSink, StepEvent, TaskCompleted, TracingEventSink};
pub use manager::{LlmManagerPlanner, ManagerPlanner};
pub use plan::{Assignment, DelegationPlan};
pub use retry::RetryPolicy;
pub use roster::{ExecutionLimits, ExecutionMode, RoleSpec, Roster};
pub use tasks::{RunInputs, TaskBook, TaskSpec};
pub use worker::{LlmWorkerRunner, TaskOutcome, WorkerRunner};
pub use workspace::RunWorkspace;
