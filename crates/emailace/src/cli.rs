//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use emailace_core::SortKey;

#[derive(Parser, Debug)]
#[command(name = "emailace")]
#[command(version)]
#[command(about = "Triage, analyze and answer support email from the terminal", long_about = None)]
pub struct Cli {
    /// Backend service root, e.g. `http://localhost:8000/api/v1`
    #[arg(long, global = true, env = "EMAILACE_API_URL")]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Settings file to use instead of the one in the config directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the backend is up
    Health,

    /// List emails
    Inbox {
        /// Only emails whose sender or subject contains this text
        #[arg(short, long, default_value = "")]
        search: String,

        /// Order by date, priority, sender or status
        #[arg(long, default_value = "date")]
        sort: SortKey,

        /// Search sender, subject and body on the backend instead
        #[arg(long)]
        server_search: bool,

        /// Keep running and reprint whenever the list changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Show one email with its classification
    Show {
        /// Email id
        id: i64,
    },

    /// Show resolution rate and breakdowns
    Analytics {
        /// Keep running and reprint whenever the counts change
        #[arg(short, long)]
        watch: bool,
    },

    /// Draft, edit and send a reply
    Reply {
        /// Email id
        id: i64,

        /// Instructions for the drafting model
        #[arg(short, long)]
        prompt: Option<String>,

        /// Use this text as the reply
        #[arg(short, long)]
        text: Option<String>,

        /// Send the reply once drafted
        #[arg(long)]
        send: bool,
    },

    /// Archive an email without replying
    Archive {
        /// Email id
        id: i64,
    },

    /// Pull new mail into the backend
    Sync,

    /// Print the effective settings
    Settings {
        /// Write them to the settings file
        #[arg(long)]
        save: bool,
    },
}
