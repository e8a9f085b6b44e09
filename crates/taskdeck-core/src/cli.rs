use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use taskdeck_shared::{SortField, SortOrder};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "taskdeck: task list client with a demo backend and a REST backend",
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Use the in-memory demo backend.
    #[arg(long = "demo")]
    pub demo: bool,

    #[arg(long = "api-url")]
    pub api_url: Option<String>,

    /// A single shell command to run instead of the interactive prompt.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<String>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    // stdout belongs to the shell's output
    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// One line typed at the prompt.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "taskdeck",
    no_binary_name = true,
    disable_version_flag = true,
    help_template = "{subcommands}"
)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Show the filtered, sorted task list.
    #[command(alias = "ls")]
    List,
    /// Show completion counts.
    Stats,
    /// Show one task in full.
    Show { id: String },
    /// Create a task.
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(short = 'd', long)]
        description: Option<String>,
        #[arg(short = 'p', long, default_value = "medium")]
        priority: String,
        #[arg(short = 'c', long, default_value = "other")]
        category: String,
        /// YYYY-MM-DD, today, tomorrow or +Nd.
        #[arg(long)]
        due: Option<String>,
    },
    /// Change a task's fields; unset flags keep the current value.
    Edit {
        id: String,
        #[arg(short = 't', long)]
        title: Option<String>,
        #[arg(short = 'd', long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(short = 'p', long)]
        priority: Option<String>,
        #[arg(short = 'c', long)]
        category: Option<String>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long)]
        clear_due: bool,
    },
    /// Flip a task between pending and completed.
    #[command(alias = "done")]
    Toggle { id: String },
    /// Delete a task.
    #[command(alias = "rm")]
    Delete { id: String },
    /// Set the search text; no words clears it.
    Search { text: Vec<String> },
    /// Set one filter: status, priority or category.
    Filter { key: String, value: String },
    /// Set the sort field and, optionally, the order.
    Sort {
        field: SortField,
        order: Option<SortOrder>,
    },
    /// Clear filters and search, keeping the sort.
    Clear,
    /// Reset filters, search and sort.
    Reset,
    /// Refetch the task list.
    Refresh,
    /// Show the signed-in user's profile.
    Profile,
    /// Change the profile display name.
    Rename {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Change the account password.
    Password { current: String, new: String },
    /// Leave the shell.
    #[command(alias = "exit")]
    Quit,
}

pub fn parse_shell_words(words: &[String]) -> Result<ShellCommand, clap::Error> {
    ShellLine::try_parse_from(words).map(|line| line.command)
}

/// Splits a prompt line into words with POSIX shell quoting rules.
pub fn split_words(line: &str) -> anyhow::Result<Vec<String>> {
    shell_words::split(line).with_context(|| format!("cannot split {line:?} into words"))
}
