//! Execution-mode selection and run orchestration.
//!
//! One invocation maps to exactly one execution mode. The precedence is a
//! first-class ordered-rule table rather than emergent control flow: first
//! match wins, and the ordering is a deliberate contract. Server and
//! model-listing must work without any program; daemon blocking must be
//! established before deciding how long to hold the process open; the
//! no-arguments help fallback runs before an empty load is treated as
//! runnable; UI bootstrap rewrites the argument list and therefore resolves
//! before the plain run consumes it.

use crate::api::ModelClient;
use crate::chat;
use crate::chatstate;
use crate::error::{CliError, ConfigError};
use crate::input::{self, StdinCache};
use crate::loader::{self, LoaderOptions};
use crate::options::RuntimeOptions;
use crate::output;
use crate::program::Program;
use crate::render::Renderer;
use crate::runner::Runner;
use crate::server::{self, AppState};
use crate::shutdown::{self, ShutdownSignal};
use crate::startup;
use std::fs;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

/// Environment variable naming the companion chat UI tool.
pub const UI_TOOL_ENV_VAR: &str = "TOOLSCRIPT_CHAT_UI_TOOL";
/// Default companion chat UI tool reference.
const DEFAULT_UI_TOOL: &str = "https://get.toolscript.dev/chat-ui.tls";

/// The ten execution modes. Exactly one is selected per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Server,
    ListModels,
    DaemonRun,
    ListTools,
    Help,
    Assemble,
    StatelessChat,
    InteractiveChat,
    UiBootstrap,
    PlainRun,
}

/// Facts the selector decides over.
///
/// `chat_program` is only known after the program loads; the orchestrator
/// evaluates the table once before loading (where the earlier rules cannot
/// depend on it) and once after.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeInputs {
    pub server: bool,
    pub list_models: bool,
    pub daemon: bool,
    pub list_tools: bool,
    pub no_args: bool,
    pub assemble: bool,
    /// Save target is the stateless marker ("-" or "stdout").
    pub stateless_sink: bool,
    pub chat_program: bool,
    pub force_chat: bool,
    pub ui: bool,
}

/// The ordered rule table. First match wins; [`ExecutionMode::PlainRun`] is
/// the default when nothing matches.
const MODE_RULES: &[(fn(&ModeInputs) -> bool, ExecutionMode)] = &[
    (|i| i.server, ExecutionMode::Server),
    (|i| i.list_models, ExecutionMode::ListModels),
    (|i| i.daemon, ExecutionMode::DaemonRun),
    (|i| i.list_tools, ExecutionMode::ListTools),
    (|i| i.no_args, ExecutionMode::Help),
    (|i| i.assemble, ExecutionMode::Assemble),
    (|i| i.stateless_sink, ExecutionMode::StatelessChat),
    (
        |i| i.chat_program || i.force_chat,
        ExecutionMode::InteractiveChat,
    ),
    (|i| i.ui, ExecutionMode::UiBootstrap),
];

/// Select the execution mode. Pure: same inputs, same mode.
pub fn select(inputs: &ModeInputs) -> ExecutionMode {
    MODE_RULES
        .iter()
        .find(|(applies, _)| applies(inputs))
        .map(|(_, mode)| *mode)
        .unwrap_or(ExecutionMode::PlainRun)
}

/// Per-invocation arguments and flags, already free of parser details.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Program reference followed by trailing input arguments.
    pub args: Vec<String>,
    pub sub_tool: String,
    /// `--input` value: a file path or `-` for standard input.
    pub input: Option<String>,
    /// `--output` target; empty means standard streams.
    pub output: String,
    pub chat_state: String,
    pub save_chat_state_file: String,
    pub force_chat: bool,
    pub disable_tui: bool,
    pub debug: bool,
    pub server: bool,
    pub list_models: bool,
    pub list_tools: bool,
    pub assemble: bool,
    pub daemon: bool,
    pub ui: bool,
}

impl Invocation {
    fn mode_inputs(&self, chat_program: bool) -> ModeInputs {
        ModeInputs {
            server: self.server,
            list_models: self.list_models,
            daemon: self.daemon,
            list_tools: self.list_tools,
            no_args: self.args.is_empty(),
            assemble: self.assemble,
            stateless_sink: chatstate::is_stateless_target(&self.save_chat_state_file),
            chat_program,
            force_chat: self.force_chat,
            ui: self.ui,
        }
    }
}

/// What the caller should do after a completed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Done,
    /// No arguments were given; display usage help. Not an error.
    Help,
}

/// Run orchestrator: executes the selected mode against the collaborators.
pub struct Dispatcher {
    options: RuntimeOptions,
    runner: Arc<Runner>,
    stdin: StdinCache,
    shutdown: ShutdownSignal,
}

impl Dispatcher {
    pub fn new(
        options: RuntimeOptions,
        client: Arc<dyn ModelClient>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let runner = Arc::new(Runner::new(client, options.clone()));
        Self {
            options,
            runner,
            stdin: StdinCache::new(),
            shutdown,
        }
    }

    /// Standard-input cache shared by program and input acquisition.
    pub fn stdin(&self) -> &StdinCache {
        &self.stdin
    }

    fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            cache: self.options.cache.clone(),
        }
    }

    /// Obtain the program for the argument list, or the empty sentinel.
    async fn acquire(&self, args: &[String], sub_tool: &str) -> Result<Program, CliError> {
        let Some(reference) = args.first() else {
            return Ok(Program::default());
        };
        if reference == input::STDIN_SENTINEL {
            let bytes = self.stdin.get_or_read()?;
            let text = String::from_utf8_lossy(bytes).into_owned();
            return Ok(loader::from_source(
                loader::STDIN_SOURCE_NAME,
                &text,
                sub_tool,
            )?);
        }
        Ok(loader::load(reference, sub_tool, &self.loader_options()).await?)
    }

    /// Execute one invocation to completion.
    pub async fn run(&self, invocation: Invocation) -> Result<RunOutcome, CliError> {
        // Rules before the program load: these modes must work without a
        // valid program argument.
        match select(&invocation.mode_inputs(false)) {
            ExecutionMode::Server => return self.serve().await,
            ExecutionMode::ListModels => return self.list_models(&invocation.args).await,
            _ => {}
        }

        let program = self
            .acquire(&invocation.args, &invocation.sub_tool)
            .await?;
        let mode = select(&invocation.mode_inputs(program.is_chat()));
        tracing::debug!(?mode, program = %program.name, "selected execution mode");

        match mode {
            // Resolved before the program load; the flags have not changed.
            ExecutionMode::Server | ExecutionMode::ListModels => Ok(RunOutcome::Done),
            ExecutionMode::DaemonRun => self.daemon_run(&program, &invocation, None).await,
            ExecutionMode::ListTools => {
                println!("{}", program.listing());
                Ok(RunOutcome::Done)
            }
            ExecutionMode::Help => Ok(RunOutcome::Help),
            ExecutionMode::Assemble => self.assemble(&program, &invocation),
            ExecutionMode::StatelessChat => self.stateless_chat(&program, &invocation).await,
            ExecutionMode::InteractiveChat => self.interactive_chat(&invocation).await,
            ExecutionMode::UiBootstrap => {
                let (rewritten, env) = self.ui_bootstrap(&invocation)?;
                let program = self
                    .acquire(&rewritten.args, &rewritten.sub_tool)
                    .await?;
                self.daemon_run(&program, &rewritten, Some(env)).await
            }
            ExecutionMode::PlainRun => {
                let input = self.resolve_input(&invocation)?;
                let result = self
                    .runner
                    .run(&program, &self.options.env, &input)
                    .await?;
                output::print_output(&input, &result, &invocation.output, self.options.quiet)?;
                Ok(RunOutcome::Done)
            }
        }
    }

    async fn serve(&self) -> Result<RunOutcome, CliError> {
        server::serve(
            &self.options.listen_address,
            AppState::new(Arc::clone(&self.runner)),
            self.shutdown.clone(),
            true,
        )
        .await?;
        Ok(RunOutcome::Done)
    }

    async fn list_models(&self, providers: &[String]) -> Result<RunOutcome, CliError> {
        let models = self
            .runner
            .list_models(providers)
            .await
            .map_err(crate::error::ExecutionError::Api)?;
        println!("{}", models.join("\n"));
        Ok(RunOutcome::Done)
    }

    /// Daemon mode: the blocking program produces output, then the process
    /// holds open until the external shutdown signal fires.
    async fn daemon_run(
        &self,
        program: &Program,
        invocation: &Invocation,
        env_override: Option<Vec<String>>,
    ) -> Result<RunOutcome, CliError> {
        let blocking = program.with_blocking();
        let env = env_override.unwrap_or_else(|| self.options.env.clone());
        let input = self.resolve_input(invocation)?;
        let result = self.runner.run(&blocking, &env, &input).await?;
        output::print_output(&input, &result, &invocation.output, self.options.quiet)?;
        shutdown::wait(self.shutdown.clone()).await;
        Ok(RunOutcome::Done)
    }

    fn assemble(
        &self,
        program: &Program,
        invocation: &Invocation,
    ) -> Result<RunOutcome, CliError> {
        if !invocation.output.is_empty() && invocation.output != "-" {
            let mut file =
                fs::File::create(&invocation.output).map_err(|source| CliError::Io {
                    context: format!("opening {}", invocation.output),
                    source,
                })?;
            crate::assemble::assemble(program, &mut file)?;
        } else {
            let stdout = std::io::stdout();
            crate::assemble::assemble(program, &mut stdout.lock())?;
        }
        Ok(RunOutcome::Done)
    }

    async fn stateless_chat(
        &self,
        program: &Program,
        invocation: &Invocation,
    ) -> Result<RunOutcome, CliError> {
        let input = self.resolve_input(invocation)?;
        let state = chatstate::resolve_initial(&invocation.chat_state)?;
        let turn = chat::turn(
            &self.runner,
            program,
            &self.options.env,
            state.as_deref(),
            &input,
        )
        .await?;
        let reply = chat::stateless_reply(&turn)?;
        output::print_output(&input, &reply, &invocation.output, self.options.quiet)?;
        Ok(RunOutcome::Done)
    }

    async fn interactive_chat(&self, invocation: &Invocation) -> Result<RunOutcome, CliError> {
        let input = self.resolve_input(invocation)?;
        let state = chatstate::resolve_initial(&invocation.chat_state)?;
        // A richer rendering is preferred unless debugging or a missing
        // terminal forces plain output.
        let rich = !invocation.disable_tui && !invocation.debug && std::io::stdout().is_terminal();
        let renderer = Renderer::new(self.options.color && rich, rich);

        let args = invocation.args.clone();
        let sub_tool = invocation.sub_tool.clone();
        chat::start(
            &self.runner,
            || {
                let args = args.clone();
                let sub_tool = sub_tool.clone();
                async move { self.acquire(&args, &sub_tool).await }
            },
            &self.options.env,
            state,
            input,
            &invocation.save_chat_state_file,
            &renderer,
        )
        .await?;
        Ok(RunOutcome::Done)
    }

    /// Rewrite the invocation to launch the companion chat UI tool.
    ///
    /// Returns the rewritten invocation (daemon mode forced) and the extended
    /// environment pointing at the script's directory.
    fn ui_bootstrap(&self, invocation: &Invocation) -> Result<(Invocation, Vec<String>), CliError> {
        let ui_tool = std::env::var(UI_TOOL_ENV_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_UI_TOOL.to_string());
        let (args, env) = rewrite_ui_args(&ui_tool, &invocation.args, &self.options.env)?;
        let rewritten = Invocation {
            args,
            daemon: true,
            ui: false,
            ..invocation.clone()
        };
        Ok((rewritten, env))
    }

    fn resolve_input(&self, invocation: &Invocation) -> Result<String, CliError> {
        input::from_cli(invocation.input.as_deref(), &invocation.args, &self.stdin)
    }
}

/// Pure argument rewrite for UI bootstrap.
///
/// The UI tool reference is prepended; a user-supplied script becomes a
/// `--file=<basename>` argument with `SCRIPTS_PATH` exported next to it.
fn rewrite_ui_args(
    ui_tool: &str,
    args: &[String],
    base_env: &[String],
) -> Result<(Vec<String>, Vec<String>), CliError> {
    let mut env = base_env.to_vec();

    let Some(script) = args.first() else {
        let cwd = std::env::current_dir().map_err(|source| CliError::Io {
            context: "determining current working directory".to_string(),
            source,
        })?;
        env.push(format!("SCRIPTS_PATH={}", cwd.display()));
        return Ok((vec![ui_tool.to_string()], env));
    };

    if script == input::STDIN_SENTINEL {
        return Err(CliError::Config(ConfigError::Invalid(
            "chat UI only supports files, cannot read from stdin".to_string(),
        )));
    }

    let absolute = fs::canonicalize(script).map_err(|source| CliError::Io {
        context: format!("resolving absolute path to script {script}"),
        source,
    })?;
    let dir = absolute.parent().unwrap_or_else(|| Path::new("/"));
    env.push(format!("SCRIPTS_PATH={}", dir.display()));
    if !base_env
        .iter()
        .any(|pair| pair.starts_with(&format!("{}=", startup::BIN_ENV_VAR)))
    {
        env.push(format!("{}={}", startup::BIN_ENV_VAR, startup::bin()));
    }

    let basename = absolute
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| script.clone());
    let mut rewritten = vec![ui_tool.to_string(), format!("--file={basename}")];
    rewritten.extend(args.iter().skip(1).cloned());
    Ok((rewritten, env))
}
