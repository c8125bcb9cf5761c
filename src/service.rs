//! Crew service
//!
//! Wires the loaded configuration into one reusable [`Crew`] and drives
//! complete runs: isolated workspace, kickoff, packaging, delivery.

use crate::server::AppConfig;
use anyhow::{Context, Result};
use forge_core::{
    package, Crew, Error as CoreError, LlmManagerPlanner, LlmWorkerRunner, Result as CoreResult,
    Roster, RunInputs, RunWorkspace, TaskBook, TracingEventSink,
};
use forge_llm::{LlmProvider, OpenAiProvider, OpenAiProviderConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// A packaged run, ready to hand to an HTTP client
#[derive(Debug)]
pub struct GeneratedArchive {
    /// Zip archive contents
    pub bytes: Vec<u8>,
    /// File name offered for download
    pub file_name: String,
    /// The run this archive came from
    pub run_id: Uuid,
}

/// One crew plus the delivery settings runs are executed under
pub struct CrewService {
    crew: Crew,
    output_root: String,
    archive_name: String,
    download_name: String,
    module_name: String,
    class_name: String,
    default_requirements: String,
}

impl CrewService {
    /// Build the service from configuration. Any unresolvable role or task
    /// is surfaced here, at startup.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut provider_config = OpenAiProviderConfig::from_env()
            .context("LLM backend is not configured (set OPENAI_API_KEY)")?;
        if let Some(model) = &config.llm.model {
            provider_config = provider_config.with_model(model);
        }
        if let Some(base_url) = &config.llm.base_url {
            provider_config = provider_config.with_base_url(base_url);
        }
        provider_config =
            provider_config.with_timeout(Duration::from_secs(config.llm.timeout_secs));

        let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(provider_config));

        let roster = Roster::load(&config.crew.agents_file)
            .context("Failed to load the agent roster")?;
        let tasks = TaskBook::load(&config.crew.tasks_file)
            .context("Failed to load the task book")?;
        let manager = roster
            .get(&config.crew.manager)
            .context("Configured manager role is not in the roster")?;

        let planner = Arc::new(LlmManagerPlanner::new(provider.clone(), manager));
        let runner = Arc::new(LlmWorkerRunner::new(provider));

        let crew = Crew::new(
            roster,
            tasks,
            config.crew.manager.as_str(),
            planner,
            runner,
            Arc::new(TracingEventSink),
        )
        .context("Failed to compose the crew")?;

        info!(
            manager = %config.crew.manager,
            workers = crew.workers().len(),
            "Crew service initialized"
        );

        Ok(Self {
            crew,
            output_root: config.delivery.output_root.clone(),
            archive_name: config.delivery.archive_name.clone(),
            download_name: config.delivery.download_name.clone(),
            module_name: config.delivery.module_name.clone(),
            class_name: config.delivery.class_name.clone(),
            default_requirements: config.delivery.default_requirements.clone(),
        })
    }

    /// Run inputs for an HTTP request, falling back to configured naming
    pub fn inputs(
        &self,
        requirements: String,
        module_name: Option<String>,
        class_name: Option<String>,
    ) -> RunInputs {
        RunInputs {
            requirements,
            module_name: module_name.unwrap_or_else(|| self.module_name.clone()),
            class_name: class_name.unwrap_or_else(|| self.class_name.clone()),
        }
    }

    /// Run inputs for the direct-run entry point
    pub fn default_inputs(&self, requirements: Option<String>) -> RunInputs {
        self.inputs(
            requirements.unwrap_or_else(|| self.default_requirements.clone()),
            None,
            None,
        )
    }

    /// One full run: isolated workspace, kickoff, package, read the archive
    /// into memory, then remove the run directory.
    pub async fn generate(&self, inputs: RunInputs) -> CoreResult<GeneratedArchive> {
        let workspace = RunWorkspace::create(&self.output_root)?;
        let run_id = workspace.run_id();

        let outcome = self.run_and_read(&inputs, &workspace).await;

        if let Err(e) = workspace.cleanup() {
            warn!(run_id = %run_id, error = %e, "Failed to clean up run workspace");
        }

        Ok(GeneratedArchive {
            bytes: outcome?,
            file_name: self.download_name.clone(),
            run_id,
        })
    }

    async fn run_and_read(
        &self,
        inputs: &RunInputs,
        workspace: &RunWorkspace,
    ) -> CoreResult<Vec<u8>> {
        self.crew.kickoff(inputs, workspace).await?;
        let zip_path = package(workspace.dir(), &self.archive_name)?;
        std::fs::read(&zip_path)
            .map_err(|e| CoreError::Packaging(format!("failed to read {}: {e}", zip_path.display())))
    }

    /// One full run that keeps the run directory, returning the archive path
    pub async fn run_once(&self, inputs: RunInputs) -> CoreResult<PathBuf> {
        let workspace = RunWorkspace::create(&self.output_root)?;
        self.crew.kickoff(&inputs, &workspace).await?;
        package(workspace.dir(), &self.archive_name)
    }
}
