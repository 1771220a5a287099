// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line grammar, shared by the binary and the interactive shell.

use clap::{Parser, Subcommand, ValueEnum};
use ingatin_core::Shift;

/// Ingat-In - terminal dashboard for the WhatsApp attendance bot.
#[derive(Parser, Debug)]
#[command(name = "ingatin", version, about, long_about = None)]
pub struct Cli {
    /// Disable coloured output.
    #[arg(long, global = true)]
    pub plain: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show the landing page with the bot link.
    Landing,
    /// Sign in as a staff member.
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// End the current session.
    Logout,
    /// Attendance overview.
    Dashboard {
        /// Keep the view open and re-render on every change.
        #[arg(long)]
        watch: bool,
    },
    /// Manage users.
    #[command(subcommand)]
    Users(UsersCommand),
    /// Clear one attendance flag for every user.
    Reset {
        shift: ShiftArg,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Launch an interactive shell.
    Shell,
    /// Show backend and session health.
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum UsersCommand {
    /// List every user, newest first.
    List,
    /// Show one user.
    Show { id: String },
    /// Register a WhatsApp number.
    Create {
        /// Local (08...) or international (62...) number.
        number: String,
        #[arg(long)]
        name: Option<String>,
        /// Mark the morning check-in as done.
        #[arg(long)]
        pagi: bool,
        /// Mark the evening check-in as done.
        #[arg(long)]
        sore: bool,
    },
    /// Flip one attendance flag.
    Toggle { id: String, shift: ShiftArg },
    /// Change the display name. An empty name clears it.
    Rename {
        id: String,
        #[arg(num_args = 0..)]
        name: Vec<String>,
    },
    /// Delete a user.
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftArg {
    #[value(alias = "pagi")]
    Morning,
    #[value(alias = "sore")]
    Evening,
}

impl From<ShiftArg> for Shift {
    fn from(arg: ShiftArg) -> Self {
        match arg {
            ShiftArg::Morning => Shift::Morning,
            ShiftArg::Evening => Shift::Evening,
        }
    }
}

/// One line typed into the shell.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Navigate to a route (`/`, `/login`, `/dashboard`, `/users`, `/users/<id>`).
    Goto { route: String },
    /// Render the current route again.
    Show,
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    Logout,
    #[command(subcommand)]
    Users(UsersCommand),
    Reset {
        shift: ShiftArg,
        #[arg(long)]
        yes: bool,
    },
    Status,
    /// Leave the shell.
    #[command(alias = "exit")]
    Quit,
}

impl ShellLine {
    /// Parses whitespace-separated words; clap renders usage errors.
    pub fn parse(line: &str) -> Result<ShellCommand, clap::Error> {
        let words = line.split_whitespace();
        Self::try_parse_from(words).map(|l| l.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_nested_user_commands() {
        let cli = Cli::try_parse_from(["ingatin", "users", "toggle", "42", "pagi"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Users(UsersCommand::Toggle {
                id: "42".into(),
                shift: ShiftArg::Morning
            }))
        );
    }

    #[test]
    fn cli_without_subcommand_is_landing() {
        let cli = Cli::try_parse_from(["ingatin", "--plain"]).unwrap();
        assert!(cli.plain);
        assert!(cli.command.is_none());
    }

    #[test]
    fn rename_joins_words() {
        let cmd = ShellLine::parse("users rename 7 Budi Santoso").unwrap();
        assert_eq!(
            cmd,
            ShellCommand::Users(UsersCommand::Rename {
                id: "7".into(),
                name: vec!["Budi".into(), "Santoso".into()]
            })
        );
    }

    #[test]
    fn shell_parses_navigation_and_quit() {
        assert_eq!(
            ShellLine::parse("goto /dashboard").unwrap(),
            ShellCommand::Goto {
                route: "/dashboard".into()
            }
        );
        assert_eq!(ShellLine::parse("exit").unwrap(), ShellCommand::Quit);
        assert!(ShellLine::parse("fly away").is_err());
    }

    #[test]
    fn shift_aliases() {
        let cli = Cli::try_parse_from(["ingatin", "reset", "sore", "--yes"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Reset {
                shift: ShiftArg::Evening,
                yes: true
            })
        );
        assert_eq!(Shift::from(ShiftArg::Evening), Shift::Evening);
    }
}
