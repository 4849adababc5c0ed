//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod say;


use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::say::run_say;
use crate::core::config::{Config, GatewaySettings};
use crate::gateway::provider::{
    CompletionProvider, OpenAiCompatProvider, ProviderCredentials, API_KEY_VAR, BASE_URL_VAR,
};
use crate::gateway::{self, GatewayState};
use crate::logging::{self, LogTarget, CLIENT_DEFAULT_FILTER, SERVER_DEFAULT_FILTER};
use crate::ui::chat_loop::run_chat;

#[derive(Parser, Debug)]
#[command(name = "thinkchat", version)]
#[command(about = "Chat with reasoning models, with their thinking shown apart from the answer")]
#[command(
    long_about = "thinkchat runs a small streaming gateway in front of an OpenAI-compatible \
inference provider, and a terminal chat client that shows a reasoning model's thinking \
separately from its final answer.\n\n\
Environment Variables (read by `serve`):\n\
  DEEPSEEK_BASE_URL   Base URL of the provider API\n\
  DEEPSEEK_API_KEY    API key sent as a bearer token\n\
  RUST_LOG            Log filter directives\n\n\
Controls:\n\
  Enter             Send the message\n\
  Shift/Alt+Enter   Insert a new line\n\
  Up/Down/PgUp/PgDn Scroll through chat history\n\
  Ctrl+C            Quit the application"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Read configuration from this file instead of the default location
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write logs to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the chat gateway
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:3000
        #[arg(short, long)]
        bind: Option<String>,
        /// Model identifier forwarded to the provider
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Start the chat interface (default)
    Chat {
        /// Gateway chat URL
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Send a single prompt and print the reply
    Say {
        /// Gateway chat URL
        #[arg(short, long)]
        url: Option<String>,
        /// Prompt text; multiple words are joined with spaces
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    match args.command.unwrap_or(Commands::Chat { url: None }) {
        Commands::Serve { bind, model } => {
            logging::init(
                logging::target_for(args.log, LogTarget::Stderr),
                SERVER_DEFAULT_FILTER,
            )?;
            let settings = gateway_settings(config.gateway, bind, model);
            run_serve(&settings).await
        }
        Commands::Chat { url } => {
            // The TUI owns the terminal, so logs only go to an explicit file.
            logging::init(
                logging::target_for(args.log, LogTarget::Disabled),
                CLIENT_DEFAULT_FILTER,
            )?;
            run_chat(url.unwrap_or_else(|| config.client.gateway_url())).await
        }
        Commands::Say { url, prompt } => {
            logging::init(
                logging::target_for(args.log, LogTarget::Stderr),
                CLIENT_DEFAULT_FILTER,
            )?;
            run_say(prompt, url.unwrap_or_else(|| config.client.gateway_url())).await
        }
    }
}

/// Command-line flags take precedence over the config file.
fn gateway_settings(
    mut settings: GatewaySettings,
    bind: Option<String>,
    model: Option<String>,
) -> GatewaySettings {
    if bind.is_some() {
        settings.bind = bind;
    }
    if model.is_some() {
        settings.model = model;
    }
    settings
}

async fn run_serve(settings: &GatewaySettings) -> Result<(), Box<dyn Error>> {
    let provider: Option<Arc<dyn CompletionProvider>> = match ProviderCredentials::from_env() {
        Some(credentials) => {
            info!(?credentials, "provider credentials loaded");
            Some(Arc::new(OpenAiCompatProvider::new(credentials)))
        }
        None => {
            warn!(
                "{BASE_URL_VAR} or {API_KEY_VAR} is not set; chat requests will fail with a configuration error"
            );
            None
        }
    };

    let listener = TcpListener::bind(settings.bind()).await?;
    let state = Arc::new(GatewayState::new(settings, provider));
    gateway::serve(listener, state).await?;
    Ok(())
}
