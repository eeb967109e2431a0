//! CLI argument definitions.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::compile::{DEFAULT_FROTZ, DEFAULT_INFORM6, DEFAULT_INFORM7, DEFAULT_INTERNAL};

/// fablebot - a chat service for building and playing Inform 7 stories
#[derive(Parser, Debug)]
#[command(name = "fablebot")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address for the HTTP transport to listen on
    #[arg(long, default_value = "127.0.0.1:8372")]
    pub listen: SocketAddr,

    /// Path to the author store file (defaults to ~/.fablebot/store.json)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Path to the Inform 7 compiler
    #[arg(long, default_value = DEFAULT_INFORM7)]
    pub inform7: PathBuf,

    /// Path to the Inform 6 compiler
    #[arg(long, default_value = DEFAULT_INFORM6)]
    pub inform6: PathBuf,

    /// Path to the dumb-mode Frotz interpreter
    #[arg(long, default_value = DEFAULT_FROTZ)]
    pub frotz: PathBuf,

    /// Directory holding the Inform 7 internal data files
    #[arg(long, default_value = DEFAULT_INTERNAL)]
    pub internal: PathBuf,

    /// Idle settle window when draining interpreter output, in milliseconds
    #[arg(long, default_value_t = 10)]
    pub settle_ms: u64,
}

impl Args {
    /// The store path, explicit or defaulted under the home directory.
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store {
            Some(path) => Ok(path.clone()),
            None => {
                let home = dirs::home_dir().context("could not find home directory")?;
                Ok(home.join(".fablebot").join("store.json"))
            }
        }
    }
}
