//! Worker execution
//!
//! A worker takes one rendered task, produces a result with its persona
//! prompt, and materializes any emitted files into the run workspace. The
//! seam is a trait so the crew can be exercised with scripted workers.

use crate::error::Result;
use crate::plan::strip_code_fences;
use crate::roster::RoleSpec;
use crate::tasks::TaskSpec;
use crate::workspace::RunWorkspace;
use forge_llm::{CompletionRequest, LlmProvider, Message};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result of one task execution
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Textual result, passed as context to dependent tasks
    pub summary: String,
    /// Files written into the run workspace
    pub files: Vec<PathBuf>,
}

/// Executes one task as one worker role
#[async_trait::async_trait]
pub trait WorkerRunner: Send + Sync {
    /// Run `task` as `role`, with `context` carrying the outputs of the
    /// tasks this one depends on.
    async fn run_task(
        &self,
        role: &RoleSpec,
        task: &TaskSpec,
        context: &str,
        workspace: &RunWorkspace,
    ) -> Result<TaskOutcome>;
}

/// A file emitted by a worker reply
#[derive(Debug, Deserialize)]
struct EmittedFile {
    path: String,
    content: String,
}

/// Parse a reply that is a JSON array of emitted files, fenced or not.
fn parse_emitted_files(reply: &str) -> Option<Vec<EmittedFile>> {
    let body = strip_code_fences(reply);
    if !body.starts_with('[') {
        return None;
    }
    serde_json::from_str(body).ok()
}

/// LLM-backed worker runner
pub struct LlmWorkerRunner {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
}

const FILE_PROTOCOL: &str = "When your result is one or more files, reply with ONLY a JSON \
array of objects, each with \"path\" (workspace-relative) and \"content\" (the complete file \
text). Reply with plain text otherwise. Never wrap the result in commentary.";

impl LlmWorkerRunner {
    /// Create a runner over the given provider
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: None,
        }
    }

    /// Override the model used for worker calls
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

    fn task_prompt(task: &TaskSpec, context: &str) -> String {
        let mut prompt = format!(
            "## Task\n{}\n\n## Expected output\n{}\n",
            task.description.trim(),
            task.expected_output.trim()
        );
        if let Some(output_file) = &task.output_file {
            prompt.push_str(&format!(
                "\nWrite the primary result to the file `{output_file}`.\n"
            ));
        }
        if !context.trim().is_empty() {
            prompt.push_str(&format!("\n## Results from earlier tasks\n{context}\n"));
        }
        prompt
    }
}

#[async_trait::async_trait]
impl WorkerRunner for LlmWorkerRunner {
    #[instrument(skip_all, fields(role = %role.name, task = %task.name))]
    async fn run_task(
        &self,
        role: &RoleSpec,
        task: &TaskSpec,
        context: &str,
        workspace: &RunWorkspace,
    ) -> Result<TaskOutcome> {
        let request = CompletionRequest::new(self.model())
            .with_message(Message::system(format!(
                "{}\n\n{FILE_PROTOCOL}",
                role.persona_prompt()
            )))
            .with_message(Message::user(Self::task_prompt(task, context)));

        let response = self.provider.complete(request).await?;
        let reply = response.content;

        if let Some(emitted) = parse_emitted_files(&reply) {
            let mut files = Vec::with_capacity(emitted.len());
            for file in &emitted {
                files.push(workspace.write_file(&file.path, &file.content)?);
            }
            let names: Vec<&str> = emitted.iter().map(|f| f.path.as_str()).collect();
            debug!(files = ?names, "Worker emitted files");
            return Ok(TaskOutcome {
                summary: format!("Produced {} file(s): {}", names.len(), names.join(", ")),
                files,
            });
        }

        if let Some(output_file) = &task.output_file {
            let body = strip_code_fences(&reply);
            let path = workspace.write_file(output_file, body)?;
            debug!(file = %output_file, "Worker wrote declared output file");
            return Ok(TaskOutcome {
                summary: reply,
                files: vec![path],
            });
        }

        Ok(TaskOutcome {
            summary: reply,
            files: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_llm::{CompletionResponse, Result as LlmResult};
    use std::sync::Mutex;

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

    fn role() -> RoleSpec {
        RoleSpec {
            name: "backend_engineer".to_string(),
            role: "Backend Engineer".to_string(),
            goal: "Implement the module".to_string(),
            backstory: String::new(),
            allow_code_execution: false,
            execution: Default::default(),
        }
    }

    fn task(output_file: Option<&str>) -> TaskSpec {
        TaskSpec {
            name: "code".to_string(),
            description: "Implement the wallet".to_string(),
            expected_output: "A source file".to_string(),
            agent: "backend_engineer".to_string(),
            output_file: output_file.map(ToString::to_string),
        }
    }

    #[tokio::test]
    async fn test_json_manifest_writes_files() {
        let root = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(root.path()).unwrap();
        let provider = Arc::new(ScriptedProvider::new(&[r#"```json
[{"path": "wallet.py", "content": "class Wallet: pass"},
 {"path": "test_wallet.py", "content": "def test(): pass"}]
```"#]));

        let runner = LlmWorkerRunner::new(provider);
        let outcome = runner
            .run_task(&role(), &task(None), "", &ws)
            .await
            .unwrap();

        assert_eq!(outcome.files.len(), 2);
        assert!(ws.dir().join("wallet.py").exists());
        assert!(ws.dir().join("test_wallet.py").exists());
        assert!(outcome.summary.contains("wallet.py"));
    }

    #[tokio::test]
    async fn test_plain_reply_writes_declared_output_file() {
        let root = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(root.path()).unwrap();
        let provider = Arc::new(ScriptedProvider::new(&[
            "```python\nclass Wallet:\n    pass\n```",
        ]));

        let runner = LlmWorkerRunner::new(provider);
        let outcome = runner
            .run_task(&role(), &task(Some("wallet.py")), "", &ws)
            .await
            .unwrap();

        assert_eq!(outcome.files.len(), 1);
        let written = std::fs::read_to_string(ws.dir().join("wallet.py")).unwrap();
        assert_eq!(written, "class Wallet:\n    pass");
    }

    #[tokio::test]
    async fn test_advisory_reply_is_context_only() {
        let root = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(root.path()).unwrap();
        let provider = Arc::new(ScriptedProvider::new(&["The design looks sound."]));

        let runner = LlmWorkerRunner::new(provider);
        let outcome = runner
            .run_task(&role(), &task(None), "", &ws)
            .await
            .unwrap();

        assert!(outcome.files.is_empty());
        assert_eq!(outcome.summary, "The design looks sound.");
    }

    #[tokio::test]
    async fn test_escaping_manifest_path_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(root.path()).unwrap();
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"[{"path": "../evil.sh", "content": "rm -rf"}]"#,
        ]));

        let runner = LlmWorkerRunner::new(provider);
        let result = runner.run_task(&role(), &task(None), "", &ws).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_emitted_files_rejects_non_array() {
        assert!(parse_emitted_files("plain text").is_none());
        assert!(parse_emitted_files(r#"{"path": "a", "content": "b"}"#).is_none());
        assert!(parse_emitted_files(r#"[{"path": "a"}]"#).is_none());
    }
}
