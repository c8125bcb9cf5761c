//! Crew — the hierarchical execution coordinator
//!
//! One crew composes the roster and the task book under a distinguished
//! manager. The manager plans the delegation; workers execute it wave by
//! wave, each under its role's retry policy; a worker that exhausts its
//! budget is escalated back to the manager for one re-delegation.

use crate::error::{Error, Result};
use crate::events::{EventSink, StepEvent, TaskCompleted};
use crate::manager::ManagerPlanner;
use crate::plan::Assignment;
use crate::retry::RetryPolicy;
use crate::roster::{RoleSpec, Roster};
use crate::tasks::{RunInputs, TaskBook, TaskSpec};
use crate::worker::{TaskOutcome, WorkerRunner};
use crate::workspace::RunWorkspace;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// One task's final accounting within a run
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// Task name
    pub task: String,
    /// Agent that produced the accepted result
    pub agent: String,
    /// Attempts used by that agent
    pub attempts: u32,
    /// Result summary (full text, as chained to dependents)
    pub summary: String,
    /// Files written into the workspace
    pub files: Vec<std::path::PathBuf>,
}

/// Summary of one completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run identifier (matches the workspace)
    pub run_id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Per-task records, in completion order
    pub tasks: Vec<TaskRecord>,
}

impl RunReport {
    /// All files produced across the run
    #[must_use]
    pub fn files(&self) -> Vec<&std::path::Path> {
        self.tasks
            .iter()
            .flat_map(|t| t.files.iter().map(|p| p.as_path()))
            .collect()
    }
}

/// The crew: roster + task book + manager, wired to a planner, a worker
/// runner and an event sink.
pub struct Crew {
    roster: Roster,
    tasks: TaskBook,
    manager: String,
    planner: Arc<dyn ManagerPlanner>,
    runner: Arc<dyn WorkerRunner>,
    events: Arc<dyn EventSink>,
}

impl Crew {
    /// Compose a crew.
    ///
    /// # Errors
    /// Fatal configuration errors: unknown manager, tasks bound to unknown
    /// roles, or a roster with no workers besides the manager.
    pub fn new(
        roster: Roster,
        tasks: TaskBook,
        manager: impl Into<String>,
        planner: Arc<dyn ManagerPlanner>,
        runner: Arc<dyn WorkerRunner>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let manager = manager.into();
        roster.get(&manager)?;
        tasks.validate_against(&roster)?;

        let crew = Self {
            roster,
            tasks,
            manager,
            planner,
            runner,
            events,
        };
        if crew.workers().is_empty() {
            return Err(Error::Configuration(format!(
                "roster has no workers besides the manager '{}'",
                crew.manager
            )));
        }
        Ok(crew)
    }

    /// The name of the manager role
    #[must_use]
    pub fn manager(&self) -> &str {
        &self.manager
    }

    /// The workable pool: every role except the manager
    #[must_use]
    pub fn workers(&self) -> Vec<Arc<RoleSpec>> {
        self.roster
            .iter()
            .filter(|r| r.name != self.manager)
            .cloned()
            .collect()
    }

    /// Run every task to completion under manager delegation.
    ///
    /// # Errors
    /// `Error::Planning` when the manager cannot produce a viable plan,
    /// `Error::Execution` when a task fails beyond retries and escalation.
    #[instrument(skip_all, fields(run_id = %workspace.run_id()))]
    pub async fn kickoff(
        &self,
        inputs: &RunInputs,
        workspace: &RunWorkspace,
    ) -> Result<RunReport> {
        let run_id = workspace.run_id();
        let started_at = Utc::now();

        let rendered = self.tasks.rendered(inputs);
        let workers = self.workers();

        info!(tasks = rendered.len(), workers = workers.len(), "Crew run starting");
        self.events.on_step(&StepEvent {
            run_id,
            agent: self.manager.clone(),
            detail: format!("planning delegation for {} tasks", rendered.len()),
        });

        let plan = self.planner.plan(&workers, &rendered).await?;
        plan.validate(&rendered, &workers, &self.manager)?;
        let waves = plan.waves()?;

        self.events.on_step(&StepEvent {
            run_id,
            agent: self.manager.clone(),
            detail: format!(
                "delegation ready: {} tasks in {} waves",
                plan.assignments.len(),
                waves.len()
            ),
        });

        let by_name: BTreeMap<&str, &TaskSpec> =
            rendered.iter().map(|t| (t.name.as_str(), t)).collect();

        let mut summaries: BTreeMap<String, String> = BTreeMap::new();
        let mut records = Vec::new();

        for (index, wave) in waves.iter().enumerate() {
            debug!(wave = index + 1, tasks = wave.len(), "Executing wave");

            let futures: Vec<_> = wave
                .iter()
                .map(|assignment| {
                    self.execute_assignment(
                        run_id,
                        assignment,
                        by_name[assignment.task.as_str()],
                        &workers,
                        &summaries,
                        workspace,
                    )
                })
                .collect();

            for result in join_all(futures).await {
                let record = result?;
                summaries.insert(record.task.clone(), record.summary.clone());
                self.events.on_task_complete(&TaskCompleted {
                    run_id,
                    task: record.task.clone(),
                    agent: record.agent.clone(),
                    attempts: record.attempts,
                    summary: short_summary(&record.summary),
                });
                records.push(record);
            }
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            tasks: records,
        };
        info!(
            tasks = report.tasks.len(),
            files = report.files().len(),
            "Crew run complete"
        );
        Ok(report)
    }

    /// Run one assignment: retries under the role's policy, then one
    /// escalation round through the manager.
    async fn execute_assignment(
        &self,
        run_id: Uuid,
        assignment: &Assignment,
        task: &TaskSpec,
        workers: &[Arc<RoleSpec>],
        summaries: &BTreeMap<String, String>,
        workspace: &RunWorkspace,
    ) -> Result<TaskRecord> {
        let context = build_context(&assignment.depends_on, summaries);
        let role = self.roster.get(&assignment.agent)?;

        match self
            .attempt_with_role(run_id, &role, task, &context, workspace)
            .await
        {
            Ok((outcome, attempts)) => Ok(record(task, &role.name, attempts, outcome)),
            Err(first_error) => {
                warn!(
                    task = %task.name,
                    agent = %role.name,
                    error = %first_error,
                    "Worker exhausted retries, escalating to manager"
                );
                self.events.on_step(&StepEvent {
                    run_id,
                    agent: self.manager.clone(),
                    detail: format!(
                        "re-delegating '{}' after '{}' failed",
                        task.name, role.name
                    ),
                });

                let candidates: Vec<Arc<RoleSpec>> = workers
                    .iter()
                    .filter(|w| w.name != role.name)
                    .cloned()
                    .collect();
                let Some(alternate) =
                    self.planner.reassign(task, &role.name, &candidates).await?
                else {
                    return Err(Error::Execution(format!(
                        "task '{}' abandoned after '{}' failed: {first_error}",
                        task.name, role.name
                    )));
                };

                let alt_role = self.roster.get(&alternate)?;
                if alt_role.name == self.manager || alt_role.name == role.name {
                    return Err(Error::Planning(format!(
                        "invalid re-delegation of '{}' to '{}'",
                        task.name, alternate
                    )));
                }

                let (outcome, attempts) = self
                    .attempt_with_role(run_id, &alt_role, task, &context, workspace)
                    .await
                    .map_err(|e| {
                        Error::Execution(format!(
                            "task '{}' failed after re-delegation to '{}': {e}",
                            task.name, alt_role.name
                        ))
                    })?;
                Ok(record(task, &alt_role.name, attempts, outcome))
            }
        }
    }

    /// Run the task as one role under that role's retry policy.
    async fn attempt_with_role(
        &self,
        run_id: Uuid,
        role: &Arc<RoleSpec>,
        task: &TaskSpec,
        context: &str,
        workspace: &RunWorkspace,
    ) -> Result<(TaskOutcome, u32)> {
        let policy = RetryPolicy::for_role(role);
        policy
            .run(|attempt| {
                self.events.on_step(&StepEvent {
                    run_id,
                    agent: role.name.clone(),
                    detail: format!("attempt {attempt} on '{}'", task.name),
                });
                self.runner.run_task(role, task, context, workspace)
            })
            .await
    }
}

fn record(task: &TaskSpec, agent: &str, attempts: u32, outcome: TaskOutcome) -> TaskRecord {
    TaskRecord {
        task: task.name.clone(),
        agent: agent.to_string(),
        attempts,
        summary: outcome.summary,
        files: outcome.files,
    }
}

/// Join dependency outputs into one context block.
fn build_context(depends_on: &[String], summaries: &BTreeMap<String, String>) -> String {
    let mut context = String::new();
    for dep in depends_on {
        if let Some(summary) = summaries.get(dep) {
            context.push_str(&format!("### {dep}\n{summary}\n\n"));
        }
    }
    context
}

/// Truncate a summary for event payloads.
fn short_summary(text: &str) -> String {
    const MAX: usize = 240;
    if text.len() <= MAX {
        return text.to_string();
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
