//! CLI command definitions for the `pawbook` binary.
//!
//! Uses clap derive macros for argument parsing. Every messaging command
//! acts on behalf of the user named by `--user`.

pub mod config;
pub mod conversation;
pub mod demo;
pub mod message;
pub mod watch;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Direct messaging between Pawbook users.
#[derive(Parser)]
#[command(name = "pawbook", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List a user's conversations, most recent first.
    #[command(alias = "ls")]
    Conversations {
        /// User id (email address).
        #[arg(long, short)]
        user: String,
    },

    /// Find or start the conversation between two users.
    Open {
        #[arg(long, short)]
        user: String,

        /// The other participant.
        #[arg(long, short)]
        with: String,
    },

    /// Send a message.
    Send {
        #[arg(long, short)]
        user: String,

        /// Display name shown next to the message (defaults to the id's local part).
        #[arg(long, short)]
        name: Option<String>,

        #[arg(long, short)]
        with: String,

        /// Message text.
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Show the message history of a conversation.
    History {
        #[arg(long, short)]
        user: String,

        #[arg(long, short)]
        with: String,
    },

    /// Follow the conversation list (and optionally one conversation) live.
    Watch {
        #[arg(long, short)]
        user: String,

        /// Also open the conversation with this user.
        #[arg(long, short)]
        with: Option<String>,
    },

    /// Run a two-user exchange against an in-process backend.
    Demo,

    /// Show the effective configuration (API key redacted).
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Default display name for a user id: the part before `@`.
pub fn default_display_name(user_id: &str) -> String {
    user_id
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .unwrap_or(user_id)
        .to_string()
}

/// Format a timestamp relative to now.
pub fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let now = chrono::Utc::now();
    let diff = now - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}
