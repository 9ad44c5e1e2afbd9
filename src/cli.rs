//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Automated onboarding runner for the tenant screening service.
#[derive(Debug, Parser)]
#[command(name = "app-factory", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one application end to end from a magic link.
    Run {
        /// Invitation link, e.g. https://screen.<env>/a/<token>
        magic_link: String,

        /// Number of co-applicants to invite.
        #[arg(long)]
        co_applicants: Option<u32>,

        /// Number of guarantors to invite.
        #[arg(long)]
        guarantors: Option<u32>,

        /// Talk to this service address instead of the one the link names.
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Serve the HTTP control surface.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 3500)]
        port: u16,
    },

    /// Print the effective configuration as TOML.
    Config,
}
