//! Authorization hook consulted before potentially dangerous actions.

use std::io::{self, BufRead, Write};

/// Decides whether a pending action may proceed.
///
/// Installed into the runtime options by `--confirm`. The execution engine
/// calls it with a human-readable action description; a denial aborts that
/// action only, never the whole run.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, action: &str) -> bool;
}

/// Interactive y/n prompt on the terminal.
#[derive(Debug, Default)]
pub struct TerminalAuthorizer;

impl TerminalAuthorizer {
    fn ask(&self, action: &str, input: &mut impl BufRead, prompt_out: &mut impl Write) -> bool {
        let _ = write!(prompt_out, "Allow? {action} [y/N] ");
        let _ = prompt_out.flush();
        let mut line = String::new();
        if input.read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

impl Authorizer for TerminalAuthorizer {
    fn authorize(&self, action: &str) -> bool {
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        self.ask(action, &mut stdin.lock(), &mut stderr)
    }
}
