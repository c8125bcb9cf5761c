//! Delegation plan
//!
//! The manager's output is an explicit, inspectable plan: an assignment of
//! every task to one worker, with dependencies. Validation and ordering live
//! here so they can be tested without any LLM involvement.

use crate::error::{Error, Result};
use crate::roster::RoleSpec;
use crate::tasks::TaskSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One task handed to one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Task name
    pub task: String,
    /// Worker role name
    pub agent: String,
    /// Tasks that must complete before this one starts
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// The manager's complete delegation for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationPlan {
    /// All assignments, one per task
    pub assignments: Vec<Assignment>,
}

/// Strip a single surrounding markdown code fence, if present.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "yaml", ...) on the opening fence line.
    let Some(newline) = rest.find('\n') else {
        return trimmed;
    };
    let body = &rest[newline + 1..];
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => trimmed,
    }
}

impl DelegationPlan {
    /// Parse a plan from model output.
    ///
    /// Accepts either `{"assignments": [...]}` or a bare assignment array,
    /// with or without a surrounding code fence.
    ///
    /// # Errors
    /// Returns `Error::Planning` when neither shape parses.
    pub fn from_json(text: &str) -> Result<Self> {
        let body = strip_code_fences(text);

        if let Ok(plan) = serde_json::from_str::<DelegationPlan>(body) {
            return Ok(plan);
        }
        if let Ok(assignments) = serde_json::from_str::<Vec<Assignment>>(body) {
            return Ok(Self { assignments });
        }

        Err(Error::Planning(format!(
            "manager output is not a delegation plan: {}",
            body.chars().take(120).collect::<String>()
        )))
    }

    /// Validate the plan against the rendered task set and the worker pool.
    ///
    /// Every task must be assigned exactly once, every agent must be a known
    /// worker (never the manager), and dependencies must name planned tasks.
    ///
    /// # Errors
    /// Returns `Error::Planning` describing the first violation found.
    pub fn validate(
        &self,
        tasks: &[TaskSpec],
        workers: &[Arc<RoleSpec>],
        manager: &str,
    ) -> Result<()> {
        let expected: BTreeSet<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        let worker_names: BTreeSet<&str> = workers.iter().map(|w| w.name.as_str()).collect();

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for assignment in &self.assignments {
            let task = assignment.task.as_str();
            if !expected.contains(task) {
                return Err(Error::Planning(format!("plan assigns unknown task '{task}'")));
            }
            if !seen.insert(task) {
                return Err(Error::Planning(format!("plan assigns task '{task}' twice")));
            }
            if assignment.agent == manager {
                return Err(Error::Planning(format!(
                    "plan assigns task '{task}' to the manager"
                )));
            }
            if !worker_names.contains(assignment.agent.as_str()) {
                return Err(Error::Planning(format!(
                    "plan assigns task '{task}' to unknown worker '{}'",
                    assignment.agent
                )));
            }
            for dep in &assignment.depends_on {
                if dep == task {
                    return Err(Error::Planning(format!("task '{task}' depends on itself")));
                }
                if !expected.contains(dep.as_str()) {
                    return Err(Error::Planning(format!(
                        "task '{task}' depends on unknown task '{dep}'"
                    )));
                }
            }
        }

        if let Some(missing) = expected.iter().find(|t| !seen.contains(*t)) {
            return Err(Error::Planning(format!("plan leaves task '{missing}' unassigned")));
        }

        Ok(())
    }

    /// Layer the plan into dependency waves (Kahn's algorithm).
    ///
    /// Assignments within one wave have no ordering constraints between them
    /// and may run concurrently.
    ///
    /// # Errors
    /// Returns `Error::Planning` when the dependencies form a cycle.
    pub fn waves(&self) -> Result<Vec<Vec<&Assignment>>> {
        let by_name: BTreeMap<&str, &Assignment> = self
            .assignments
            .iter()
            .map(|a| (a.task.as_str(), a))
            .collect();

        let mut remaining: BTreeMap<&str, BTreeSet<&str>> = self
            .assignments
            .iter()
            .map(|a| {
                let deps: BTreeSet<&str> = a
                    .depends_on
                    .iter()
                    .map(String::as_str)
                    .filter(|d| by_name.contains_key(d))
                    .collect();
                (a.task.as_str(), deps)
            })
            .collect();

        let mut waves = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| *name)
                .collect();

            if ready.is_empty() {
                let stuck: Vec<&str> = remaining.keys().copied().collect();
                return Err(Error::Planning(format!(
                    "dependency cycle among tasks: {}",
                    stuck.join(", ")
                )));
            }

            for name in &ready {
                remaining.remove(name);
            }
            for deps in remaining.values_mut() {
                for name in &ready {
                    deps.remove(name);
                }
            }

            waves.push(ready.into_iter().map(|name| by_name[name]).collect());
        }

        Ok(waves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;

    fn workers() -> Vec<Arc<RoleSpec>> {
        let roster = Roster::from_yaml(
            r#"
lead:
  role: Lead
  goal: Design
coder:
  role: Coder
  goal: Implement
"#,
        )
        .unwrap();
        roster.iter().cloned().collect()
    }

    fn tasks() -> Vec<TaskSpec> {
        ["design", "code"]
            .iter()
            .map(|name| TaskSpec {
                name: (*name).to_string(),
                description: String::new(),
                expected_output: String::new(),
                agent: "lead".to_string(),
                output_file: None,
            })
            .collect()
    }

    fn plan(json: &str) -> DelegationPlan {
        DelegationPlan::from_json(json).unwrap()
    }

    #[test]
    fn test_from_json_object_and_array() {
        let p = plan(r#"{"assignments": [{"task": "design", "agent": "lead"}]}"#);
        assert_eq!(p.assignments.len(), 1);

        let p = plan(r#"[{"task": "design", "agent": "lead", "depends_on": []}]"#);
        assert_eq!(p.assignments[0].task, "design");
    }

    #[test]
    fn test_from_json_fenced() {
        let text = "```json\n[{\"task\": \"design\", \"agent\": \"lead\"}]\n```";
        let p = plan(text);
        assert_eq!(p.assignments[0].agent, "lead");
    }

    #[test]
    fn test_from_json_garbage() {
        assert!(matches!(
            DelegationPlan::from_json("I think the lead should start."),
            Err(Error::Planning(_))
        ));
    }

    #[test]
    fn test_validate_complete_plan() {
        let p = plan(
            r#"[{"task": "design", "agent": "lead"},
                {"task": "code", "agent": "coder", "depends_on": ["design"]}]"#,
        );
        assert!(p.validate(&tasks(), &workers(), "manager").is_ok());
    }

    #[test]
    fn test_validate_rejects_manager_assignment() {
        let p = plan(
            r#"[{"task": "design", "agent": "manager"},
                {"task": "code", "agent": "coder"}]"#,
        );
        let err = p.validate(&tasks(), &workers(), "manager").unwrap_err();
        assert!(err.to_string().contains("manager"));
    }

    #[test]
    fn test_validate_rejects_missing_task() {
        let p = plan(r#"[{"task": "design", "agent": "lead"}]"#);
        let err = p.validate(&tasks(), &workers(), "manager").unwrap_err();
        assert!(err.to_string().contains("unassigned"));
    }

    #[test]
    fn test_validate_rejects_duplicate_task() {
        let p = plan(
            r#"[{"task": "design", "agent": "lead"},
                {"task": "design", "agent": "coder"},
                {"task": "code", "agent": "coder"}]"#,
        );
        assert!(p.validate(&tasks(), &workers(), "manager").is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_worker() {
        let p = plan(
            r#"[{"task": "design", "agent": "ghost"},
                {"task": "code", "agent": "coder"}]"#,
        );
        assert!(p.validate(&tasks(), &workers(), "manager").is_err());
    }

    #[test]
    fn test_waves_respect_dependencies() {
        let p = plan(
            r#"[{"task": "code", "agent": "coder", "depends_on": ["design"]},
                {"task": "design", "agent": "lead"},
                {"task": "docs", "agent": "lead", "depends_on": ["code"]}]"#,
        );
        let waves = p.waves().unwrap();
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0][0].task, "design");
        assert_eq!(waves[1][0].task, "code");
        assert_eq!(waves[2][0].task, "docs");
    }

    #[test]
    fn test_waves_group_independent_tasks() {
        let p = plan(
            r#"[{"task": "a", "agent": "lead"},
                {"task": "b", "agent": "coder"},
                {"task": "c", "agent": "coder", "depends_on": ["a", "b"]}]"#,
        );
        let waves = p.waves().unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].len(), 2);
        assert_eq!(waves[1][0].task, "c");
    }

    #[test]
    fn test_waves_detect_cycle() {
        let p = plan(
            r#"[{"task": "a", "agent": "lead", "depends_on": ["b"]},
                {"task": "b", "agent": "coder", "depends_on": ["a"]}]"#,
        );
        let err = p.waves().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("plain"), "plain");
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        // Unterminated fence falls back to the raw text
        assert_eq!(strip_code_fences("```json\n[1]"), "```json\n[1]");
    }
}
