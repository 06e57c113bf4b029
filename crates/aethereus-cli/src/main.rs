//! Terminal client for the Aethereus chat backend.
//!
//! Usage:
//! ```bash
//! # Ask a question anonymously (kept in local storage, one thread per model)
//! aethereus chat "Explain cloud computing"
//!
//! # Interactive chat as a signed-in user, continuing conversation 12
//! AETHEREUS_TOKEN=... aethereus chat --conversation 12
//!
//! # Generate an image
//! AETHEREUS_TOKEN=... aethereus image "a red fox in the snow"
//! ```

mod commands;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "aethereus",
    about = "Aethereus chat client",
    long_about = "Chat with the Aethereus backend from the terminal. Without a token, conversations are kept on this device."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL override
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token of the signed-in user
    #[arg(long, global = true, env = "AETHEREUS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Directory for anonymous conversations
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Send a message, or start an interactive chat when no message is given
    Chat {
        /// Message text
        message: Vec<String>,

        /// Model for new conversations (claude, openai)
        #[arg(long, short = 'm')]
        model: Option<String>,

        /// Continue an existing conversation
        #[arg(long, short = 'c')]
        conversation: Option<String>,

        /// Upload a file and attach it to the first message
        #[arg(long, short = 'a')]
        attach: Option<PathBuf>,
    },

    /// List conversations
    List,

    /// Print a conversation's messages
    Show {
        id: String,

        /// Print formatted HTML instead of raw text
        #[arg(long)]
        html: bool,
    },

    /// Delete a conversation and its messages
    Delete { id: String },

    /// Generate an image (requires a token)
    Image { prompt: Vec<String> },

    /// List generated images (requires a token)
    Gallery,

    /// Format markdown from a file or stdin as HTML
    Render { file: Option<PathBuf> },

    /// Print the effective settings
    Config {
        /// Write the effective settings back to the settings file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let options = commands::GlobalOptions {
        config_path: cli.config,
        api_url: cli.api_url,
        token: cli.token,
        data_dir: cli.data_dir,
    };

    match cli.command {
        Command::Chat {
            message,
            model,
            conversation,
            attach,
        } => {
            let message = (!message.is_empty()).then(|| message.join(" "));
            commands::chat(&options, message, model, conversation, attach).await
        }
        Command::List => commands::list(&options).await,
        Command::Show { id, html } => commands::show(&options, &id, html).await,
        Command::Delete { id } => commands::delete(&options, &id).await,
        Command::Image { prompt } => commands::image(&options, &prompt.join(" ")).await,
        Command::Gallery => commands::gallery(&options).await,
        Command::Render { file } => commands::render(file).await,
        Command::Config { save } => commands::show_config(&options, save).await,
    }
}
