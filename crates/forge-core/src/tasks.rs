//! Task book (task registry)
//!
//! Tasks are declared in a YAML map keyed by task name. Each task binds to a
//! default agent role; the manager may override that binding at plan time.
//! Instructions may reference `{requirements}`, `{module_name}` and
//! `{class_name}`, rendered from [`RunInputs`] when a run kicks off.

use crate::error::{Error, Result};
use crate::roster::Roster;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Inputs supplied per run, never persisted
#[derive(Debug, Clone)]
pub struct RunInputs {
    /// Free-text requirement description
    pub requirements: String,
    /// Target module name for generated code
    pub module_name: String,
    /// Target primary class name for generated code
    pub class_name: String,
}

impl RunInputs {
    /// Render a template, substituting run-input placeholders
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{requirements}", &self.requirements)
            .replace("{module_name}", &self.module_name)
            .replace("{class_name}", &self.class_name)
    }
}

/// One configured unit of instructed work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Task name (the registry key); filled in by the loader
    #[serde(skip)]
    pub name: String,
    /// Instructions, possibly containing run-input placeholders
    pub description: String,
    /// What a good result looks like
    pub expected_output: String,
    /// Default agent role bound to this task
    pub agent: String,
    /// Workspace file the result is written to, when the task produces one
    #[serde(default)]
    pub output_file: Option<String>,
}

impl TaskSpec {
    /// Produce a copy with all placeholders rendered from the run inputs
    #[must_use]
    pub fn rendered(&self, inputs: &RunInputs) -> TaskSpec {
        TaskSpec {
            name: self.name.clone(),
            description: inputs.render(&self.description),
            expected_output: inputs.render(&self.expected_output),
            agent: self.agent.clone(),
            output_file: self.output_file.as_deref().map(|f| inputs.render(f)),
        }
    }
}

/// The loaded set of tasks
#[derive(Debug, Clone, Default)]
pub struct TaskBook {
    tasks: BTreeMap<String, Arc<TaskSpec>>,
}

impl TaskBook {
    /// Parse a task book from YAML text (a map keyed by task name).
    ///
    /// # Errors
    /// Returns `Error::Configuration` on parse failure or an empty book.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let entries: BTreeMap<String, TaskSpec> = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Configuration(format!("failed to parse task book: {e}")))?;

        let mut tasks = BTreeMap::new();
        for (name, mut spec) in entries {
            spec.name = name.clone();
            info!(task = %name, agent = %spec.agent, "Loaded task");
            tasks.insert(name, Arc::new(spec));
        }

        if tasks.is_empty() {
            return Err(Error::Configuration("task book is empty".to_string()));
        }

        debug!(count = tasks.len(), "Task book loaded");
        Ok(Self { tasks })
    }

    /// Load a task book from a YAML file.
    ///
    /// # Errors
    /// Returns `Error::Configuration` on read or parse failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    /// Check every task's default agent against the roster.
    ///
    /// # Errors
    /// A task referencing an unknown role is a fatal configuration error.
    pub fn validate_against(&self, roster: &Roster) -> Result<()> {
        for task in self.tasks.values() {
            if !roster.contains(&task.agent) {
                return Err(Error::Configuration(format!(
                    "task '{}' references unknown role '{}'",
                    task.name, task.agent
                )));
            }
        }
        Ok(())
    }

    /// Resolve a task by name.
    ///
    /// # Errors
    /// An unresolvable name is a fatal configuration error.
    pub fn get(&self, name: &str) -> Result<Arc<TaskSpec>> {
        self.tasks
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Configuration(format!("unknown task '{name}'")))
    }

    /// Iterate over all tasks in name order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskSpec>> {
        self.tasks.values()
    }

    /// Render every task with the given run inputs
    #[must_use]
    pub fn rendered(&self, inputs: &RunInputs) -> Vec<TaskSpec> {
        self.tasks.values().map(|t| t.rendered(inputs)).collect()
    }

    /// Number of tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the book is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
