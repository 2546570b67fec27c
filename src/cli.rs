//! CLI argument parsing via clap.

use clap::Parser;
use toolscript::build_info;

/// Run tool scripts: one-shot, chat, daemon, server, or artifact assembly.
#[derive(Debug, Parser)]
#[command(
    name = "toolscript",
    version = build_info::cli_version_text(),
    about = "Execute tool scripts against an OpenAI-compatible model API."
)]
pub struct Args {
    /// Program file ("-" for stdin) followed by input arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Path to config file (default: ./toolscript.toml or
    /// ~/.config/toolscript/toolscript.toml).
    #[arg(long = "config")]
    pub config: Option<String>,

    /// Prompt before running potentially dangerous commands.
    #[arg(long = "confirm")]
    pub confirm: bool,

    /// Enable debug logging.
    #[arg(long = "debug")]
    pub debug: bool,

    /// No output logging (defaults to on when stdout is not a terminal;
    /// set --quiet=false to force off).
    #[arg(
        short = 'q',
        long = "quiet",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub quiet: Option<bool>,

    /// Save output to a file, or - for stdout.
    #[arg(short = 'o', long = "output", default_value = "")]
    pub output: String,

    /// Stream events to this location: a file, a named pipe, or a
    /// descriptor handle (fd://1, fd://2).
    #[arg(long = "events-stream-to")]
    pub events_stream_to: Option<String>,

    /// Read input from a file ("-" for stdin).
    #[arg(short = 'f', long = "input")]
    pub input: Option<String>,

    /// Use the tool of this name, not the first tool in the file.
    #[arg(long = "sub-tool", default_value = "")]
    pub sub_tool: String,

    /// Assemble the program into a single artifact, saved to --output.
    #[arg(long = "assemble", hide = true)]
    pub assemble: bool,

    /// List the models available and exit.
    #[arg(long = "list-models")]
    pub list_models: bool,

    /// List the program's tools and exit.
    #[arg(long = "list-tools")]
    pub list_tools: bool,

    /// Start the HTTP server.
    #[arg(long = "server")]
    pub server: bool,

    /// Server listen address.
    #[arg(long = "listen-address")]
    pub listen_address: Option<String>,

    /// Change the current working directory before doing anything else.
    #[arg(short = 'C', long = "chdir")]
    pub chdir: Option<String>,

    /// Run the program as a daemon.
    #[arg(long = "daemon", hide = true)]
    pub daemon: bool,

    /// Port range for ephemeral daemon ports (ex: 11000-12000).
    #[arg(long = "ports", hide = true)]
    pub ports: Option<String>,

    /// Context name in which to store credentials.
    #[arg(long = "credential-context", default_value = "default")]
    pub credential_context: String,

    /// Credentials to override (ex: --credential-override
    /// example.com/cred-tool:API_TOKEN=1234).
    #[arg(long = "credential-override")]
    pub credential_override: Vec<String>,

    /// The chat state to continue, or null to start a new chat and return
    /// the state.
    #[arg(long = "chat-state", default_value = "")]
    pub chat_state: String,

    /// Force an interactive chat session even if the top-level tool is not
    /// a chat tool.
    #[arg(long = "force-chat")]
    pub force_chat: bool,

    /// Directory to use for the workspace; if specified it is not deleted
    /// on exit.
    #[arg(long = "workspace")]
    pub workspace: Option<String>,

    /// Launch the companion chat UI.
    #[arg(long = "ui")]
    pub ui: bool,

    /// Don't use the rich chat rendering; plain output instead.
    #[arg(long = "disable-tui")]
    pub disable_tui: bool,

    /// A file to save the chat state to so a conversation can be resumed
    /// with --chat-state ("-" or "stdout" returns the state as the result).
    #[arg(long = "save-chat-state-file", default_value = "")]
    pub save_chat_state_file: String,

    /// Disable color output.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Disable the remote-source cache.
    #[arg(long = "disable-cache")]
    pub disable_cache: bool,

    /// Directory for the remote-source cache.
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;

    #[test]
    fn program_and_input_args_are_positional() {
        let args = Args::parse_from(["toolscript", "prog.tls", "summarize", "this"]);
        assert_eq!(args.args, vec!["prog.tls", "summarize", "this"]);
    }

    #[test]
    fn stdin_sentinel_parses_as_program_reference() {
        let args = Args::parse_from(["toolscript", "-", ""]);
        assert_eq!(args.args, vec!["-", ""]);
    }

    #[test]
    fn quiet_without_value_means_true() {
        let args = Args::parse_from(["toolscript", "--quiet", "prog.tls"]);
        assert_eq!(args.quiet, Some(true));
    }

    #[test]
    fn quiet_accepts_explicit_false() {
        let args = Args::parse_from(["toolscript", "--quiet=false", "prog.tls"]);
        assert_eq!(args.quiet, Some(false));
    }

    #[test]
    fn credential_override_repeats() {
        let args = Args::parse_from([
            "toolscript",
            "--credential-override",
            "a.com/t:K=1",
            "--credential-override",
            "b.com/t:K=2",
            "prog.tls",
        ]);
        assert_eq!(args.credential_override.len(), 2);
    }

    #[test]
    fn server_and_list_models_can_both_be_set() {
        // Precedence is the dispatcher's contract, not the parser's.
        let args = Args::parse_from(["toolscript", "--server", "--list-models"]);
        assert!(args.server);
        assert!(args.list_models);
        assert!(args.args.is_empty());
    }
}
