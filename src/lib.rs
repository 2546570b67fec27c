//! Toolscript — front-end dispatcher for a tool-script execution platform.
//!
//! Given a program reference (file path, stdin, or remote identifier) and a
//! set of runtime flags, the dispatcher decides how to execute the program:
//! one-shot run, interactive chat, background daemon, HTTP server, artifact
//! assembly, or metadata listing. It assembles the runtime configuration for
//! whichever collaborator handles the selected mode.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolscript::api::HttpModelClient;
//! use toolscript::config::load_config;
//! use toolscript::dispatch::{Dispatcher, Invocation};
//! use toolscript::options::{resolve, OptionsInput};
//! use toolscript::shutdown;
//!
//! # async fn example() -> Result<(), toolscript::error::CliError> {
//! let config = load_config(None)?;
//! let options = resolve(&OptionsInput::default(), &config)?;
//! let client = Arc::new(HttpModelClient::new(&options.api));
//! let dispatcher = Dispatcher::new(options, client, shutdown::canceled());
//! dispatcher
//!     .run(Invocation {
//!         args: vec!["greeter.tls".to_string(), "hello".to_string()],
//!         ..Invocation::default()
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod assemble;
pub mod auth;
pub mod build_info;
pub mod chat;
pub mod chatstate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod input;
pub mod loader;
pub mod options;
pub mod output;
pub mod program;
pub mod render;
pub mod runner;
pub mod server;
pub mod shutdown;
pub mod startup;
