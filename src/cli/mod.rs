//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the
//! appropriate commands.

pub mod say;
pub mod serve;

use std::error::Error;

use clap::{Parser, Subcommand};

use crate::core::config::Config;

#[derive(Parser)]
#[command(name = "passerelle")]
#[command(about = "A streaming chat relay for conversational AI backends")]
#[command(long_about = "Passerelle sits between a chat UI and a conversational AI backend. \
It forwards chat requests upstream and pipes the backend's NDJSON event stream \
back to the client unmodified, shaping connection failures into well-formed \
error events so downstream decoders never see a malformed stream.\n\n\
Environment Variables:\n\
  PASSERELLE_UPSTREAM_URL   Upstream backend base URL\n\
  PASSERELLE_RELAY_URL      Relay base URL used by the say client\n\
  PASSERELLE_LISTEN_ADDR    Relay listen address\n\
  PASSERELLE_MODE           Response mode: stream | single")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay server (default)
    Serve {
        /// Listen address, e.g. 127.0.0.1:3000
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Send one message through the relay and print the reply
    Say {
        /// The message to send
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
        /// Relay base URL (overrides configuration)
        #[arg(long)]
        url: Option<String>,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        value: String,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Print the effective configuration
    Show,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Serve { listen: None }) {
        Commands::Serve { listen } => serve::run_serve(listen).await,
        Commands::Say { message, url } => say::run_say(message, url).await,
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("✅ Set {key} to: {value}");
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            config.unset(&key)?;
            config.save()?;
            println!("✅ Unset {key}");
            Ok(())
        }
        Commands::Show => {
            let config = Config::load()?;
            config.print_all();
            Ok(())
        }
    }
}
