//! Agent roster (role registry)
//!
//! Roles are declared in a YAML map keyed by role name and become immutable
//! [`RoleSpec`]s shared across the crew.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How a code-capable role executes generated code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Isolated from the host (container-backed)
    Sandboxed,
    /// No code execution
    #[default]
    None,
}

/// Execution limits for a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Execution sandbox mode
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Wall-clock limit for one attempt, in seconds
    #[serde(default = "default_max_execution_secs")]
    pub max_execution_secs: u64,
    /// Bounded attempt count on failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_execution_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::None,
            max_execution_secs: default_max_execution_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ExecutionLimits {
    /// Wall-clock budget for one attempt
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.max_execution_secs)
    }
}

/// One configured agent role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    /// Role name (the registry key); filled in by the loader
    #[serde(skip)]
    pub name: String,
    /// Human-readable role title
    pub role: String,
    /// What the role is trying to achieve
    pub goal: String,
    /// Persona background injected into the system prompt
    #[serde(default)]
    pub backstory: String,
    /// Whether the role may execute generated code
    #[serde(default)]
    pub allow_code_execution: bool,
    /// Execution limits; meaningful for code-capable roles
    #[serde(default)]
    pub execution: ExecutionLimits,
}

impl RoleSpec {
    /// Validate capability configuration.
    ///
    /// Code-capable roles must run sandboxed with a non-zero timeout and a
    /// bounded, non-zero attempt count.
    pub fn validate(&self) -> Result<()> {
        if self.allow_code_execution {
            if self.execution.mode != ExecutionMode::Sandboxed {
                return Err(Error::Configuration(format!(
                    "role '{}' allows code execution but is not sandboxed",
                    self.name
                )));
            }
            if self.execution.max_execution_secs == 0 {
                return Err(Error::Configuration(format!(
                    "role '{}' allows code execution but has no execution timeout",
                    self.name
                )));
            }
            if self.execution.max_retries == 0 {
                return Err(Error::Configuration(format!(
                    "role '{}' allows code execution but has no retry bound",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// System-prompt persona for this role
    #[must_use]
    pub fn persona_prompt(&self) -> String {
        let mut prompt = format!("You are the {}.", self.role);
        if !self.backstory.trim().is_empty() {
            prompt.push(' ');
            prompt.push_str(self.backstory.trim());
        }
        prompt.push_str("\n\nYour goal: ");
        prompt.push_str(self.goal.trim());
        prompt
    }
}

/// The loaded set of roles
#[derive(Debug, Clone, Default)]
pub struct Roster {
    roles: BTreeMap<String, Arc<RoleSpec>>,
}

impl Roster {
    /// Parse a roster from YAML text (a map keyed by role name).
    ///
    /// # Errors
    /// Returns `Error::Configuration` on parse or validation failure.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let entries: BTreeMap<String, RoleSpec> = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Configuration(format!("failed to parse roster: {e}")))?;

        let mut roles = BTreeMap::new();
        for (name, mut spec) in entries {
            spec.name = name.clone();
            spec.validate()?;
            info!(role = %name, code_execution = spec.allow_code_execution, "Loaded role");
            roles.insert(name, Arc::new(spec));
        }

        if roles.is_empty() {
            return Err(Error::Configuration("roster is empty".to_string()));
        }

        debug!(count = roles.len(), "Roster loaded");
        Ok(Self { roles })
    }

    /// Load a roster from a YAML file.
    ///
    /// # Errors
    /// Returns `Error::Configuration` on read, parse or validation failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    /// Resolve a role by name.
    ///
    /// # Errors
    /// An unresolvable name is a fatal configuration error.
    pub fn get(&self, name: &str) -> Result<Arc<RoleSpec>> {
        self.roles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Configuration(format!("unknown role '{name}'")))
    }

    /// Check whether a role exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// Iterate over all roles in name order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RoleSpec>> {
        self.roles.values()
    }

    /// Number of roles
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether the roster is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
