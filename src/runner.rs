//! Run collaborator: one-shot execution of a program's entry tool.
//!
//! Prompt tools go through the model client; command tools (`#!` bodies) run
//! as subprocesses with the resolved environment, gated by the authorizer
//! hook when one is installed.

use crate::api::{ChatMessage, ChatRequest, ModelClient};
use crate::error::{ApiError, ExecutionError};
use crate::events::RunEvent;
use crate::options::RuntimeOptions;
use crate::program::{Program, Tool};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Result text substituted when the authorizer denies a command action.
///
/// Denial aborts that action only; the run itself completes with this text.
pub const DENIED_RESULT: &str = "command execution was denied";

pub struct Runner {
    client: Arc<dyn ModelClient>,
    options: RuntimeOptions,
}

impl Runner {
    pub fn new(client: Arc<dyn ModelClient>, options: RuntimeOptions) -> Self {
        Self { client, options }
    }

    /// Resolved runtime configuration this runner was built with.
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Execute the program's entry tool once and return its result text.
    pub async fn run(
        &self,
        program: &Program,
        env: &[String],
        input: &str,
    ) -> Result<String, ExecutionError> {
        let Some(entry) = program.entry_tool() else {
            return Err(ExecutionError::Chat(format!(
                "program {} declares no tools",
                program.name
            )));
        };

        if let Some(sink) = &self.options.event_sink {
            sink.emit(&RunEvent::RunStarted {
                program: program.name.clone(),
                tool: entry.name.clone(),
            });
        }

        // Blocking programs that serve a daemon get the first ephemeral port
        // from the configured range.
        let daemon_env;
        let env = if program.blocking && self.options.ports.start != 0 {
            daemon_env = [env, &[format!("PORT={}", self.options.ports.start)]].concat();
            daemon_env.as_slice()
        } else {
            env
        };

        let result = self.complete(entry, env, &[], input).await;

        if let Some(sink) = &self.options.event_sink {
            sink.emit(&RunEvent::RunFinished {
                program: program.name.clone(),
                ok: result.is_ok(),
            });
        }
        result
    }

    /// One completion against the entry tool with prior conversation history.
    ///
    /// The chat collaborator owns the history; command tools ignore it, since
    /// a subprocess holds no conversation.
    pub async fn complete(
        &self,
        tool: &Tool,
        env: &[String],
        history: &[ChatMessage],
        input: &str,
    ) -> Result<String, ExecutionError> {
        if tool.is_command() {
            return self.run_command(tool, env, input).await;
        }
        self.run_prompt(tool, history, input).await
    }

    /// Available model identifiers, optionally filtered by provider prefixes.
    pub async fn list_models(&self, providers: &[String]) -> Result<Vec<String>, ApiError> {
        self.client.list_models(providers).await
    }

    async fn run_prompt(
        &self,
        tool: &Tool,
        history: &[ChatMessage],
        input: &str,
    ) -> Result<String, ExecutionError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if !tool.instructions.is_empty() {
            messages.push(ChatMessage::system(tool.instructions.clone()));
        }
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(input.to_string()));
        let request = ChatRequest {
            model: tool
                .model
                .clone()
                .unwrap_or_else(|| self.options.api.model.clone()),
            messages,
        };
        Ok(self.client.complete(&request).await?)
    }

    async fn run_command(
        &self,
        tool: &Tool,
        env: &[String],
        input: &str,
    ) -> Result<String, ExecutionError> {
        let line = tool.command_line().unwrap_or_default();
        let mut parts = line.split_whitespace();
        let Some(binary) = parts.next() else {
            return Err(ExecutionError::Command {
                command: tool.name.clone(),
                message: "empty command line".to_string(),
            });
        };

        if let Some(authorizer) = &self.options.authorizer {
            if !authorizer.authorize(&format!("run command: {line}")) {
                tracing::info!(command = line, "command denied by authorizer");
                return Ok(DENIED_RESULT.to_string());
            }
        }

        let command_err = |message: String| ExecutionError::Command {
            command: line.to_string(),
            message,
        };

        let mut command = Command::new(binary);
        command
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear();
        for pair in env {
            if let Some((key, value)) = pair.split_once('=') {
                command.env(key, value);
            }
        }

        let mut child = command.spawn().map_err(|e| command_err(e.to_string()))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| command_err(e.to_string()))?;
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| command_err(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(command_err(format!(
                "exit status {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authorizer;
    use crate::config::Config;
    use crate::options::{resolve, OptionsInput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockClient {
        replies: Mutex<Vec<String>>,
        requests: Mutex<Vec<ChatRequest>>,
        calls: AtomicUsize,
    }

    impl MockClient {
        fn new(replies: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().map(String::from).collect()),
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ModelClient for MockClient {
        async fn complete(&self, request: &ChatRequest) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().expect("lock").push(request.clone());
            let mut replies = self.replies.lock().expect("lock");
            if replies.is_empty() {
                return Err(ApiError::InvalidResponse("no mock reply queued".into()));
            }
            Ok(replies.remove(0))
        }

        async fn list_models(&self, _providers: &[String]) -> Result<Vec<String>, ApiError> {
            Ok(vec!["provider/model-a".into(), "provider/model-b".into()])
        }
    }

    struct Deny;

    impl Authorizer for Deny {
        fn authorize(&self, _action: &str) -> bool {
            false
        }
    }

    fn runtime_options() -> RuntimeOptions {
        resolve(&OptionsInput::default(), &Config::default()).expect("resolve options")
    }

    fn prompt_program(instructions: &str) -> Program {
        Program {
            name: "demo".into(),
            tools: vec![Tool {
                instructions: instructions.into(),
                ..Tool::default()
            }],
            ..Program::default()
        }
    }

    #[tokio::test]
    async fn prompt_tool_builds_system_and_user_messages() {
        let client = MockClient::new(vec!["the answer"]);
        let runner = Runner::new(client.clone(), runtime_options());
        let result = runner
            .run(&prompt_program("Be concise."), &[], "what is up?")
            .await
            .expect("run");
        assert_eq!(result, "the answer");

        let requests = client.requests.lock().expect("lock");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0].content, "Be concise.");
        assert_eq!(requests[0].messages[1].content, "what is up?");
    }

    #[tokio::test]
    async fn tool_model_overrides_default() {
        let client = MockClient::new(vec!["ok"]);
        let mut program = prompt_program("x");
        program.tools[0].model = Some("special-model".into());
        let runner = Runner::new(client.clone(), runtime_options());
        runner.run(&program, &[], "hi").await.expect("run");
        let requests = client.requests.lock().expect("lock");
        assert_eq!(requests[0].model, "special-model");
    }

    #[tokio::test]
    async fn denied_command_aborts_action_not_run() {
        let client = MockClient::new(vec![]);
        let mut options = runtime_options();
        options.authorizer = Some(Arc::new(Deny));
        let runner = Runner::new(client.clone(), options);

        let program = Program {
            name: "demo".into(),
            tools: vec![Tool {
                name: "danger".into(),
                instructions: "#!rm -rf /tmp/whatever".into(),
                ..Tool::default()
            }],
            ..Program::default()
        };
        let result = runner.run(&program, &[], "").await.expect("run completes");
        assert_eq!(result, DENIED_RESULT);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_tool_runs_with_given_environment() {
        let client = MockClient::new(vec![]);
        let runner = Runner::new(client, runtime_options());
        let program = Program {
            name: "demo".into(),
            tools: vec![Tool {
                name: "env-probe".into(),
                instructions: "#!/usr/bin/env printenv GREETING".into(),
                ..Tool::default()
            }],
            ..Program::default()
        };
        let env = vec![
            "GREETING=hello".to_string(),
            "PATH=/usr/bin:/bin".to_string(),
        ];
        let result = runner.run(&program, &env, "").await.expect("run");
        assert_eq!(result.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn blocking_program_receives_daemon_port() {
        let client = MockClient::new(vec![]);
        let options = resolve(
            &OptionsInput {
                ports: Some("11000-12000".into()),
                ..OptionsInput::default()
            },
            &Config::default(),
        )
        .expect("resolve options");
        let runner = Runner::new(client, options);

        let program = Program {
            name: "daemon".into(),
            tools: vec![Tool {
                instructions: "#!/usr/bin/env printenv PORT".into(),
                ..Tool::default()
            }],
            ..Program::default()
        }
        .with_blocking();
        let env = vec!["PATH=/usr/bin:/bin".to_string()];
        let result = runner.run(&program, &env, "").await.expect("run");
        assert_eq!(result.trim(), "11000");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_execution_error() {
        let client = MockClient::new(vec![]);
        let runner = Runner::new(client, runtime_options());
        let program = Program {
            name: "demo".into(),
            tools: vec![Tool {
                instructions: "#!/usr/bin/env false".into(),
                ..Tool::default()
            }],
            ..Program::default()
        };
        let env = vec!["PATH=/usr/bin:/bin".to_string()];
        let err = runner.run(&program, &env, "").await.unwrap_err();
        assert!(err.to_string().contains("exit status"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_program_is_execution_error() {
        let client = MockClient::new(vec![]);
        let runner = Runner::new(client, runtime_options());
        let err = runner.run(&Program::default(), &[], "").await.unwrap_err();
        assert!(err.to_string().contains("declares no tools"), "got: {err}");
    }
}
