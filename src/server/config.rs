//! Server configuration types

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub crew: CrewConfig,
    pub delivery: DeliveryConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// LLM backend settings (the API key comes from the environment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model used for planning and worker calls
    #[serde(default)]
    pub model: Option<String>,
    /// Custom OpenAI-compatible endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            base_url: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Crew composition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewConfig {
    /// Role name of the non-participating manager
    #[serde(default = "default_manager")]
    pub manager: String,
    /// Path to the roster YAML
    #[serde(default = "default_agents_file")]
    pub agents_file: String,
    /// Path to the task book YAML
    #[serde(default = "default_tasks_file")]
    pub tasks_file: String,
}

fn default_manager() -> String {
    "orchestrator".to_string()
}

fn default_agents_file() -> String {
    "config/crew/agents.yaml".to_string()
}

fn default_tasks_file() -> String {
    "config/crew/tasks.yaml".to_string()
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            manager: default_manager(),
            agents_file: default_agents_file(),
            tasks_file: default_tasks_file(),
        }
    }
}

/// Delivery settings: workspace root, archive naming, run-input defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Directory under which per-run workspaces are created
    #[serde(default = "default_output_root")]
    pub output_root: String,
    /// Archive file name inside a run workspace
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
    /// File name offered to HTTP clients
    #[serde(default = "default_archive_name")]
    pub download_name: String,
    /// Default target module name
    #[serde(default = "default_module_name")]
    pub module_name: String,
    /// Default target class name
    #[serde(default = "default_class_name")]
    pub class_name: String,
    /// Requirement text used by the direct-run entry point
    #[serde(default)]
    pub default_requirements: String,
}

fn default_output_root() -> String {
    "output".to_string()
}

fn default_archive_name() -> String {
    forge_core::DEFAULT_ARCHIVE_NAME.to_string()
}

fn default_module_name() -> String {
    "wallet".to_string()
}

fn default_class_name() -> String {
    "Wallet".to_string()
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            archive_name: default_archive_name(),
            download_name: default_archive_name(),
            module_name: default_module_name(),
            class_name: default_class_name(),
            default_requirements: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_defaults() {
        let delivery = DeliveryConfig::default();
        assert_eq!(delivery.archive_name, "final_delivery.zip");
        assert_eq!(delivery.module_name, "wallet");
        assert_eq!(delivery.class_name, "Wallet");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: DeliveryConfig = toml_from_str("output_root = \"/tmp/runs\"");
        assert_eq!(config.output_root, "/tmp/runs");
        assert_eq!(config.archive_name, "final_delivery.zip");
    }

    fn toml_from_str(s: &str) -> DeliveryConfig {
        config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
