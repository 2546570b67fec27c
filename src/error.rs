//! Unified error types for the dispatcher and its collaborators.

use std::fmt;
use std::io;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced while resolving runtime configuration.
///
/// Configuration errors are reported before any program is loaded and are
/// never retried.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Toml(toml::de::Error),
    /// Port-range string that failed to parse or violated `end >= start`.
    InvalidPortRange(String),
    /// Event-stream sink target that could not be opened for writing.
    EventSink { target: String, source: io::Error },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::InvalidPortRange(range) => write!(f, "invalid port range: {range}"),
            Self::EventSink { target, source } => {
                write!(f, "opening event stream {target}: {source}")
            }
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

/// Errors while loading or parsing a program source.
#[derive(Debug)]
pub enum LoadError {
    /// Source file or remote identifier could not be read.
    Read {
        source_name: String,
        source: io::Error,
    },
    /// Remote source fetch failed.
    Fetch {
        source_name: String,
        message: String,
    },
    /// Source bytes did not parse as a tool script.
    Parse {
        source_name: String,
        message: String,
    },
    /// The requested sub-tool is not declared in the program.
    UnknownSubTool {
        source_name: String,
        sub_tool: String,
    },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read {
                source_name,
                source,
            } => write!(f, "reading {source_name}: {source}"),
            Self::Fetch {
                source_name,
                message,
            } => write!(f, "fetching {source_name}: {message}"),
            Self::Parse {
                source_name,
                message,
            } => write!(f, "parsing {source_name}: {message}"),
            Self::UnknownSubTool {
                source_name,
                sub_tool,
            } => write!(f, "{source_name}: no tool named {sub_tool}"),
        }
    }
}

impl std::error::Error for LoadError {}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors from the model HTTP client.
#[derive(Debug)]
pub enum ApiError {
    /// Network / reqwest-level error.
    Http(reqwest::Error),
    /// Non-2xx status from the API.
    Status(u16, String),
    /// Response body that did not match the expected shape.
    InvalidResponse(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Status(code, body) => write!(f, "status {code}: {body}"),
            Self::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// ExecutionError
// ---------------------------------------------------------------------------

/// Failures inside the run/chat/server collaborators.
///
/// The dispatcher propagates these unchanged; it never inspects or
/// reclassifies them, it only skips output printing when one occurs.
#[derive(Debug)]
pub enum ExecutionError {
    Api(ApiError),
    /// Command-tool subprocess failed to spawn or exited abnormally.
    Command { command: String, message: String },
    /// Chat collaborator failure (bad state token, turn failure).
    Chat(String),
    /// Server collaborator failure (bind, serve).
    Server(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "api: {e}"),
            Self::Command { command, message } => write!(f, "command {command}: {message}"),
            Self::Chat(msg) => write!(f, "chat: {msg}"),
            Self::Server(msg) => write!(f, "server: {msg}"),
        }
    }
}

impl std::error::Error for ExecutionError {}

impl From<ApiError> for ExecutionError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

// ---------------------------------------------------------------------------
// CliError — top-level
// ---------------------------------------------------------------------------

/// Top-level error for one invocation.
///
/// The binary maps this to an exit code and message; no variant is retried.
#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Load(LoadError),
    /// Standard-input read, output-file write, or chat-state file read.
    Io { context: String, source: io::Error },
    Execution(ExecutionError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Load(e) => write!(f, "{e}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Execution(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

impl From<ExecutionError> for CliError {
    fn from(e: ExecutionError) -> Self {
        Self::Execution(e)
    }
}
