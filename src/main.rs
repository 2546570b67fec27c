//! CLI entry point for toolscript.

mod cli;

use clap::{CommandFactory, Parser};
use std::io::IsTerminal;
use std::sync::Arc;
use toolscript::api::HttpModelClient;
use toolscript::config::load_config;
use toolscript::dispatch::{Dispatcher, Invocation, RunOutcome};
use toolscript::options::{resolve, OptionsInput};
use toolscript::render::Renderer;
use toolscript::shutdown;
use toolscript::startup;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    // Global process state changes happen exactly once, before any
    // mode-specific logic runs.
    if let Err(e) = startup::apply(args.chdir.as_deref()) {
        eprintln!("error: changing directory: {e}");
        std::process::exit(1);
    }

    // Quiet defaults to on when stdout is not a terminal.
    let quiet = args
        .quiet
        .unwrap_or_else(|| !std::io::stdout().is_terminal());
    init_logging(args.debug, quiet);

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    if args.no_color || !std::io::stderr().is_terminal() {
        config.color = false;
    }
    let renderer = Renderer::new(config.color, false);

    let options_input = OptionsInput {
        confirm: args.confirm,
        quiet: Some(quiet),
        ports: args.ports.clone(),
        events_stream_to: args.events_stream_to.clone(),
        credential_context: args.credential_context.clone(),
        credential_overrides: args.credential_override.clone(),
        workspace: args.workspace.clone(),
        listen_address: args.listen_address.clone(),
        disable_cache: args.disable_cache,
        cache_dir: args.cache_dir.clone(),
    };
    let options = match resolve(&options_input, &config) {
        Ok(options) => options,
        Err(e) => {
            renderer.error(&e.to_string());
            std::process::exit(1);
        }
    };

    let client = Arc::new(HttpModelClient::new(&options.api));
    let (trigger, signal) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("shutdown signal received");
            let _ = trigger.send(true);
        }
    });

    let dispatcher = Dispatcher::new(options, client, signal);
    let invocation = Invocation {
        args: args.args.clone(),
        sub_tool: args.sub_tool.clone(),
        input: args.input.clone(),
        output: args.output.clone(),
        chat_state: args.chat_state.clone(),
        save_chat_state_file: args.save_chat_state_file.clone(),
        force_chat: args.force_chat,
        disable_tui: args.disable_tui,
        debug: args.debug,
        server: args.server,
        list_models: args.list_models,
        list_tools: args.list_tools,
        assemble: args.assemble,
        daemon: args.daemon,
        ui: args.ui,
    };

    match dispatcher.run(invocation).await {
        Ok(RunOutcome::Done) => {}
        Ok(RunOutcome::Help) => {
            let _ = cli::Args::command().print_help();
        }
        Err(e) => {
            renderer.error(&e.to_string());
            std::process::exit(1);
        }
    }
}

fn init_logging(debug: bool, quiet: bool) {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
