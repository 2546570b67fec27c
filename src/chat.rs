//! Chat collaborator: stateless single turns and the interactive loop.
//!
//! Conversation state is carried as an opaque JSON token of prior turns. The
//! dispatcher persists tokens verbatim; only this module looks inside.

use crate::api::ChatMessage;
use crate::chatstate;
use crate::error::{CliError, ExecutionError};
use crate::events::RunEvent;
use crate::program::Program;
use crate::render::Renderer;
use crate::runner::Runner;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::BufRead;

/// Result of one chat turn: the assistant reply and the serialized state
/// token that resumes the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub content: String,
    pub state: String,
}

/// On-the-wire state document behind the opaque token.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDoc {
    messages: Vec<ChatMessage>,
}

fn parse_state(prior: Option<&str>) -> Result<StateDoc, ExecutionError> {
    match prior {
        None => Ok(StateDoc::default()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ExecutionError::Chat(format!("state token is not valid: {e}"))),
    }
}

/// Run exactly one chat turn against the given prior state.
pub async fn turn(
    runner: &Runner,
    program: &Program,
    env: &[String],
    prior: Option<&str>,
    input: &str,
) -> Result<ChatTurn, ExecutionError> {
    let Some(entry) = program.entry_tool() else {
        return Err(ExecutionError::Chat(format!(
            "program {} declares no tools",
            program.name
        )));
    };
    let mut doc = parse_state(prior)?;

    let content = runner.complete(entry, env, &doc.messages, input).await?;

    doc.messages.push(ChatMessage::user(input.to_string()));
    doc.messages.push(ChatMessage::assistant(content.clone()));
    let state = serde_json::to_string(&doc)
        .map_err(|e| ExecutionError::Chat(format!("serializing state: {e}")))?;
    Ok(ChatTurn { content, state })
}

/// Serialize a stateless-mode reply: the turn content plus the state object,
/// emitted as the program's result.
pub fn stateless_reply(turn: &ChatTurn) -> Result<String, ExecutionError> {
    let state: serde_json::Value = serde_json::from_str(&turn.state)
        .map_err(|e| ExecutionError::Chat(format!("serializing reply: {e}")))?;
    let reply = serde_json::json!({
        "content": turn.content,
        "state": state,
    });
    Ok(reply.to_string())
}

/// Interactive multi-turn loop.
///
/// Reads user input line by line, invokes the program for each turn, renders
/// the reply, and persists updated state to `save_target` when one is set.
/// The program provider is re-invoked each turn so edits to the source are
/// picked up mid-conversation.
pub async fn start<F, Fut>(
    runner: &Runner,
    provider: F,
    env: &[String],
    initial_state: Option<String>,
    first_input: String,
    save_target: &str,
    renderer: &Renderer,
) -> Result<(), CliError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Program, CliError>>,
{
    let stdin = std::io::stdin();
    run_loop(
        runner,
        provider,
        env,
        initial_state,
        first_input,
        save_target,
        renderer,
        &mut stdin.lock(),
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn run_loop<F, Fut>(
    runner: &Runner,
    provider: F,
    env: &[String],
    initial_state: Option<String>,
    first_input: String,
    save_target: &str,
    renderer: &Renderer,
    lines: &mut impl BufRead,
) -> Result<(), CliError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Program, CliError>>,
{
    let mut state = initial_state;
    let mut pending = if first_input.is_empty() {
        None
    } else {
        Some(first_input)
    };
    let mut turns: u32 = 0;

    loop {
        let input = match pending.take() {
            Some(input) => input,
            None => {
                renderer.prompt();
                let mut line = String::new();
                let read = lines.read_line(&mut line).map_err(|source| CliError::Io {
                    context: "reading chat input".to_string(),
                    source,
                })?;
                if read == 0 {
                    return Ok(());
                }
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    return Ok(());
                }
                line.to_string()
            }
        };

        let program = provider().await?;
        let result = turn(runner, &program, env, state.as_deref(), &input).await?;
        renderer.assistant_message(&result.content);

        turns += 1;
        if let Some(sink) = &runner.options().event_sink {
            sink.emit(&RunEvent::ChatTurn {
                program: program.name.clone(),
                turn: turns,
            });
        }

        if !save_target.is_empty() && !chatstate::is_stateless_target(save_target) {
            chatstate::persist(save_target, &result.state)?;
        }
        state = Some(result.state);
    }
}
