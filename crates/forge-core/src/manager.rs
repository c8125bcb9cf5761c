//! Manager planning
//!
//! The manager is the one role that never performs work itself: it turns the
//! task book and the worker pool into a [`DelegationPlan`], and is consulted
//! again when a worker exhausts its retries. The seam is a trait so plans
//! can be scripted in tests.

use crate::error::{Error, Result};
use crate::plan::DelegationPlan;
use crate::roster::RoleSpec;
use crate::tasks::TaskSpec;
use forge_llm::{CompletionRequest, LlmProvider, Message};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Produces and repairs delegations for a run
#[async_trait::async_trait]
pub trait ManagerPlanner: Send + Sync {
    /// Produce a complete delegation of `tasks` across `workers`.
    async fn plan(
        &self,
        workers: &[Arc<RoleSpec>],
        tasks: &[TaskSpec],
    ) -> Result<DelegationPlan>;

    /// Pick a different worker for a task whose assignee exhausted its
    /// retries. `None` abandons the task (and with it, the run).
    async fn reassign(
        &self,
        task: &TaskSpec,
        failed_agent: &str,
        workers: &[Arc<RoleSpec>],
    ) -> Result<Option<String>>;
}

/// LLM-backed manager planner
pub struct LlmManagerPlanner {
    provider: Arc<dyn LlmProvider>,
    manager: Arc<RoleSpec>,
    model: Option<String>,
}

impl LlmManagerPlanner {
    /// Create a planner driven by the given manager role
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, manager: Arc<RoleSpec>) -> Self {
        Self {
            provider,
            manager,
            model: None,
        }
    }

    /// Override the model used for planning calls
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    fn system_prompt(&self) -> String {
        format!(
            "{}\n\nYou direct a team of worker agents. You never perform tasks \
             yourself: you assign every task to exactly one worker and decide the \
             order through dependencies.\n\
             Respond with JSON only, in this shape:\n\
             {{\"assignments\": [{{\"task\": \"<task name>\", \"agent\": \
             \"<worker name>\", \"depends_on\": [\"<task name>\", ...]}}]}}",
            self.manager.persona_prompt()
        )
    }

    fn planning_request(workers: &[Arc<RoleSpec>], tasks: &[TaskSpec]) -> String {
        let mut prompt = String::from("## Workers\n");
        for worker in workers {
            prompt.push_str(&format!(
                "- {} ({}): {}{}\n",
                worker.name,
                worker.role,
                worker.goal.trim(),
                if worker.allow_code_execution {
                    " [may execute code]"
                } else {
                    ""
                }
            ));
        }

        prompt.push_str("\n## Tasks\n");
        for task in tasks {
            prompt.push_str(&format!(
                "### {} (suggested agent: {})\n{}\nExpected output: {}\n\n",
                task.name,
                task.agent,
                task.description.trim(),
                task.expected_output.trim()
            ));
        }

        prompt.push_str("Assign every task to one worker. Respond with JSON only.");
        prompt
    }
}

#[async_trait::async_trait]
impl ManagerPlanner for LlmManagerPlanner {
    #[instrument(skip_all, fields(manager = %self.manager.name, tasks = tasks.len()))]
    async fn plan(
        &self,
        workers: &[Arc<RoleSpec>],
        tasks: &[TaskSpec],
    ) -> Result<DelegationPlan> {
        let mut messages = vec![
            Message::system(self.system_prompt()),
            Message::user(Self::planning_request(workers, tasks)),
        ];

        let mut last_error = Error::Planning("manager produced no plan".to_string());

        // One corrective round: feed the violation back before giving up.
        for round in 0..2 {
            let request = CompletionRequest::new(self.model())
                .with_messages(messages.clone())
                .with_max_tokens(2048)
                .with_temperature(0.0);

            let response = self.provider.complete(request).await?;
            debug!(round, "Received delegation proposal");

            match DelegationPlan::from_json(&response.content).and_then(|plan| {
                plan.validate(tasks, workers, &self.manager.name)?;
                Ok(plan)
            }) {
                Ok(plan) => return Ok(plan),
                Err(e) => {
                    warn!(round, error = %e, "Rejected delegation proposal");
                    messages.push(Message::assistant(response.content));
                    messages.push(Message::user(format!(
                        "That plan was invalid: {e}. Respond again with JSON only, \
                         fixing this."
                    )));
                    last_error = e;
                }
            }
        }

        Err(Error::Planning(format!(
            "manager could not produce a viable plan: {last_error}"
        )))
    }

    #[instrument(skip_all, fields(task = %task.name, failed = %failed_agent))]
    async fn reassign(
        &self,
        task: &TaskSpec,
        failed_agent: &str,
        workers: &[Arc<RoleSpec>],
    ) -> Result<Option<String>> {
        let candidates: Vec<&Arc<RoleSpec>> = workers
            .iter()
            .filter(|w| w.name != failed_agent)
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut prompt = format!(
            "Task '{}' was assigned to '{}' and failed after all retries.\n\
             Task description: {}\n\nAvailable workers:\n",
            task.name,
            failed_agent,
            task.description.trim()
        );
        for worker in &candidates {
            prompt.push_str(&format!("- {} ({})\n", worker.name, worker.role));
        }
        prompt.push_str(
            "\nReply with exactly one worker name to re-delegate the task, \
             or 'none' to abandon it.",
        );

        let request = CompletionRequest::new(self.model())
            .with_message(Message::system(self.system_prompt()))
            .with_message(Message::user(prompt))
            .with_max_tokens(64)
            .with_temperature(0.0);

        let response = self.provider.complete(request).await?;
        let answer = response.content.trim().to_lowercase();

        let chosen = candidates
            .iter()
            .find(|w| w.name.to_lowercase() == answer)
            .map(|w| w.name.clone());

        if chosen.is_none() && answer != "none" {
            warn!(answer = %answer, "Unrecognized reassignment answer, abandoning task");
        }
        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;
    use forge_llm::{CompletionResponse, Result as LlmResult};
    use std::sync::Mutex;

    /// Provider double that replays queued responses.
    struct ScriptedProvider {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().rev().map(ToString::to_string).collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn available_models(&self) -> Vec<String> {
            vec!["scripted".to_string()]
        }

        fn default_model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: CompletionRequest) -> LlmResult<CompletionResponse> {
            let content = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .expect("scripted provider ran out of responses");
            Ok(CompletionResponse {
                content,
                usage: None,
                finish_reason: Some("stop".to_string()),
                model: "scripted".to_string(),
            })
        }
    }

    fn fixture() -> (Arc<RoleSpec>, Vec<Arc<RoleSpec>>, Vec<TaskSpec>) {
        let roster = Roster::from_yaml(
            r#"
orchestrator:
  role: Orchestrator
  goal: Direct the team
lead:
  role: Lead
  goal: Design
coder:
  role: Coder
  goal: Implement
"#,
        )
        .unwrap();
        let manager = roster.get("orchestrator").unwrap();
        let workers: Vec<Arc<RoleSpec>> = roster
            .iter()
            .filter(|r| r.name != "orchestrator")
            .cloned()
            .collect();
        let tasks = vec![
            TaskSpec {
                name: "design".to_string(),
                description: "Design the module".to_string(),
                expected_output: "A design doc".to_string(),
                agent: "lead".to_string(),
                output_file: None,
            },
            TaskSpec {
                name: "code".to_string(),
                description: "Implement the design".to_string(),
                expected_output: "A source file".to_string(),
                agent: "coder".to_string(),
                output_file: None,
            },
        ];
        (manager, workers, tasks)
    }

    #[tokio::test]
    async fn test_plan_parses_valid_json() {
        let (manager, workers, tasks) = fixture();
        let provider = Arc::new(ScriptedProvider::new(&[r#"{"assignments": [
            {"task": "design", "agent": "lead"},
            {"task": "code", "agent": "coder", "depends_on": ["design"]}
        ]}"#]));

        let planner = LlmManagerPlanner::new(provider, manager);
        let plan = planner.plan(&workers, &tasks).await.unwrap();

        assert_eq!(plan.assignments.len(), 2);
        assert_eq!(plan.assignments[1].depends_on, vec!["design"]);
    }

    #[tokio::test]
    async fn test_plan_corrective_retry() {
        let (manager, workers, tasks) = fixture();
        // First proposal assigns the manager; the corrected one is valid.
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"[{"task": "design", "agent": "orchestrator"}, {"task": "code", "agent": "coder"}]"#,
            r#"[{"task": "design", "agent": "lead"}, {"task": "code", "agent": "coder"}]"#,
        ]));

        let planner = LlmManagerPlanner::new(provider, manager);
        let plan = planner.plan(&workers, &tasks).await.unwrap();
        assert_eq!(plan.assignments[0].agent, "lead");
    }

    #[tokio::test]
    async fn test_plan_gives_up_after_retry() {
        let (manager, workers, tasks) = fixture();
        let provider = Arc::new(ScriptedProvider::new(&[
            "I cannot plan this.",
            "Still not JSON.",
        ]));

        let planner = LlmManagerPlanner::new(provider, manager);
        let err = planner.plan(&workers, &tasks).await.unwrap_err();
        assert!(matches!(err, Error::Planning(_)));
    }

    #[tokio::test]
    async fn test_reassign_picks_candidate() {
        let (manager, workers, tasks) = fixture();
        let provider = Arc::new(ScriptedProvider::new(&["coder"]));

        let planner = LlmManagerPlanner::new(provider, manager);
        let chosen = planner
            .reassign(&tasks[0], "lead", &workers)
            .await
            .unwrap();
        assert_eq!(chosen.as_deref(), Some("coder"));
    }

    #[tokio::test]
    async fn test_reassign_none_abandons() {
        let (manager, workers, tasks) = fixture();
        let provider = Arc::new(ScriptedProvider::new(&["none"]));

        let planner = LlmManagerPlanner::new(provider, manager);
        let chosen = planner
            .reassign(&tasks[0], "lead", &workers)
            .await
            .unwrap();
        assert!(chosen.is_none());
    }

    #[tokio::test]
    async fn test_reassign_never_returns_failed_agent() {
        let (manager, workers, tasks) = fixture();
        // Even if the model insists on the failed worker, it is not a candidate.
        let provider = Arc::new(ScriptedProvider::new(&["lead"]));

        let planner = LlmManagerPlanner::new(provider, manager);
        let chosen = planner
            .reassign(&tasks[0], "lead", &workers)
            .await
            .unwrap();
        assert!(chosen.is_none());
    }
}
