//! Chat-state codec: materializing and persisting opaque conversation state.
//!
//! The dispatcher never interprets the state token; it only decides where it
//! comes from (inline JSON, a file, or nothing) and where it goes afterward.

use crate::error::CliError;
use std::fs;

/// Save targets meaning "the state is the program's result, not a side file".
const STATELESS_TARGETS: [&str; 2] = ["-", "stdout"];

/// True when the configured save target selects stateless chat.
pub fn is_stateless_target(target: &str) -> bool {
    STATELESS_TARGETS.contains(&target)
}

/// Materialize the initial state for a raw `--chat-state` token.
///
/// Empty or the literal `null` start a fresh session; a leading `{` marks
/// inline JSON used verbatim; anything else is a file path read fully.
pub fn resolve_initial(token: &str) -> Result<Option<String>, CliError> {
    if token.is_empty() || token == "null" {
        return Ok(None);
    }
    if token.starts_with('{') {
        return Ok(Some(token.to_string()));
    }
    let contents = fs::read_to_string(token).map_err(|source| CliError::Io {
        context: format!("reading chat state {token}"),
        source,
    })?;
    Ok(Some(contents))
}

/// Persist updated state to the configured save target, verbatim.
///
/// Callers must not pass a stateless target; those route the state through
/// the output printer instead.
pub fn persist(target: &str, state: &str) -> Result<(), CliError> {
    fs::write(target, state).map_err(|source| CliError::Io {
        context: format!("writing chat state {target}"),
        source,
    })
}
