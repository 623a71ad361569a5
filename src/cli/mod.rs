//! CLI module for Keygate

pub mod serve;

use clap::{Parser, Subcommand};

/// Keygate - license key validation and activation service
#[derive(Parser)]
#[command(name = "keygate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve,
}
