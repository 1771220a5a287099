// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingat-In - terminal dashboard for the WhatsApp attendance bot.
//!
//! This is the binary entry point.

use std::io::IsTerminal;

use clap::Parser;
use colored::Colorize;
use ingatin::app::App;
use ingatin::cli::{Cli, Commands};
use ingatin::{commands, shell};
use ingatin_core::IngatinError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let config = match ingatin_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            ingatin_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    ingatin::init_tracing(&config.dashboard.log_level);
    if cli.plain || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let command = cli.command.unwrap_or(Commands::Landing);
    if command == Commands::Landing {
        print!("{}", commands::landing(&config));
        return;
    }

    let app = match App::connect(config).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{}: {e}", "error".red());
            std::process::exit(1);
        }
    };

    let result = run(&app, command).await;
    app.shutdown();
    if let Err(e) = result {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

async fn run(app: &App, command: Commands) -> Result<(), IngatinError> {
    let out = match command {
        Commands::Landing => commands::landing(app.config()),
        Commands::Login { email } => {
            let (email, password) = commands::prompt_credentials(email)?;
            commands::login(app, &email, &password).await?
        }
        Commands::Logout => commands::logout(app).await?,
        Commands::Dashboard { watch: false } => commands::dashboard(app).await?,
        Commands::Dashboard { watch: true } => {
            let cancel = ingatin::install_signal_handler();
            commands::watch_dashboard(app, cancel).await?;
            String::new()
        }
        Commands::Users(cmd) => commands::users(app, cmd, &mut commands::stdin_confirm).await?,
        Commands::Reset { shift, yes } => {
            commands::reset(app, shift.into(), yes, &mut commands::stdin_confirm).await?
        }
        Commands::Shell => {
            shell::run_shell(app).await?;
            String::new()
        }
        Commands::Status { json } => commands::status(app, json).await?,
    };
    print!("{out}");
    Ok(())
}
