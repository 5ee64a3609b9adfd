use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "quadro",
    version,
    about = "Quadro: kanban task board client",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "quadrorc", global = true)]
    pub quadrorc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in and store the session tokens.
    Login {
        email: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    Whoami,
    Health,
    /// Print the board for the active tab and view mode.
    Board {
        #[arg(long)]
        view: Option<String>,
        #[arg(long)]
        tab: Option<String>,
    },
    /// Drop a task on another column of the board.
    Move {
        id: u64,
        column: String,
        #[arg(long)]
        view: Option<String>,
    },
    /// Expand the archived column, loading `pages` pages.
    Archived {
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long)]
        tab: Option<String>,
    },
    Show {
        id: u64,
    },
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        status: Option<String>,
        /// Due date, RFC 3339 or `YYYY-MM-DD[ HH:MM]`.
        #[arg(long)]
        due: Option<String>,
        #[arg(long = "tag", action = ArgAction::Append)]
        tags: Vec<String>,
        #[arg(long)]
        team: Option<u64>,
    },
    /// Change the title, description or due date of a task.
    Edit {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        /// Due date, RFC 3339 or `YYYY-MM-DD[ HH:MM]`.
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
    },
    Delete {
        id: u64,
    },
    Comments {
        id: u64,
    },
    Comment {
        id: u64,
        text: String,
    },
    /// Show the saved tab and view mode.
    Prefs,
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

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_around_subcommands() {
        let cli = GlobalCli::try_parse_from([
            "quadro",
            "-vv",
            "move",
            "12",
            "in_progress",
            "--rc",
            "api.timeout=5",
            "--view",
            "status",
        ])
        .expect("valid args");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides[0].key, "api.timeout");
        assert_eq!(cli.rc_overrides[0].value, "5");
        match cli.command {
            Command::Move { id, column, view } => {
                assert_eq!(id, 12);
                assert_eq!(column, "in_progress");
                assert_eq!(view.as_deref(), Some("status"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn edit_rejects_setting_and_clearing_the_due_date() {
        let cli = GlobalCli::try_parse_from(["quadro", "edit", "3", "--title", "Novo", "--clear-due"])
            .expect("valid args");
        assert!(matches!(
            cli.command,
            Command::Edit { id: 3, clear_due: true, due: None, .. }
        ));

        let both = GlobalCli::try_parse_from(["quadro", "edit", "3", "--due", "2025-03-10", "--clear-due"]);
        assert!(both.is_err());
    }

    #[test]
    fn rc_override_requires_key_value() {
        assert!(GlobalCli::try_parse_from(["quadro", "--rc", "oops", "board"]).is_err());
        assert!("a = b".parse::<KeyVal>().is_ok());
    }
}
