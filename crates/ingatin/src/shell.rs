// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ingatin shell` command implementation.
//!
//! An interactive session over one [`App`]: the query cache and the realtime
//! subscription live as long as the shell, and the auth guard runs after
//! every command and every session change.

use colored::Colorize;
use ingatin_auth::{AuthGuard, AuthState};
use ingatin_core::{IngatinError, UserId};
use ingatin_query::RealtimeSubscription;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::app::App;
use crate::cli::{ShellCommand, ShellLine};
use crate::commands::{self, Confirm};
use crate::views::{self, DashboardView};

/// Route state and guard for one shell session.
pub struct Shell<'a> {
    app: &'a App,
    route: String,
    guard: AuthGuard,
    auth: watch::Receiver<AuthState>,
    realtime: Option<RealtimeSubscription>,
}

impl<'a> Shell<'a> {
    pub fn new(app: &'a App) -> Self {
        Self {
            app,
            route: "/".to_string(),
            guard: app.guard(),
            auth: app.session().subscribe(),
            realtime: None,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// Moves to `route`, then lets the guard have its say.
    pub fn navigate(&mut self, route: &str) -> Option<String> {
        self.route = route.to_string();
        self.apply_guard()
    }

    /// Runs the guard for the current (state, route) pair.
    ///
    /// Also keeps the realtime channel open exactly while signed in. Returns
    /// the redirect target when the route changed.
    pub fn apply_guard(&mut self) -> Option<String> {
        let state = *self.auth.borrow_and_update();
        self.sync_realtime(state);
        let redirect = self.guard.check(state, &self.route)?;
        info!(from = %redirect.from, to = %redirect.to, "redirecting");
        self.route = redirect.to.clone();
        Some(redirect.to)
    }

    fn sync_realtime(&mut self, state: AuthState) {
        match (state.is_authenticated(), self.realtime.is_some()) {
            (true, false) => self.realtime = self.app.subscribe_users(),
            (false, true) => {
                if let Some(mut sub) = self.realtime.take() {
                    sub.close();
                }
            }
            _ => {}
        }
    }

    /// `true` if the session changed since the guard last looked.
    pub fn auth_changed(&self) -> bool {
        self.auth.has_changed().unwrap_or(false)
    }

    /// Renders whatever the current route shows.
    ///
    /// Queries only fetch while signed in; a session that ended since the
    /// last guard run renders from the cache.
    pub async fn render(&self) -> Result<String, IngatinError> {
        let app = self.app;
        let enabled = app.session().is_authenticated();
        let route = self.route.trim_end_matches('/');
        match route {
            "" => Ok(commands::landing(app.config())),
            r if r == self.guard.login_route() => Ok(format!(
                "  {}\n  type {} to sign in\n",
                "Login".bold(),
                "login".yellow()
            )),
            "/dashboard" => {
                let state = app.queries().users(enabled).await;
                Ok(views::render_dashboard(&DashboardView {
                    users: state.data.as_deref(),
                    loading: state.is_loading,
                    error: state.error.as_deref(),
                    realtime: self.realtime.as_ref().map(|s| s.realtime_status()),
                    offset: app.offset(),
                }))
            }
            "/users" => {
                let state = app.queries().users(enabled).await;
                if let Some(error) = &state.error {
                    return Ok(views::error_banner(error));
                }
                Ok(views::render_user_table(
                    state.data.as_deref().unwrap_or_default(),
                    &app.offset(),
                ))
            }
            r => match r.strip_prefix("/users/") {
                Some(id) if !id.is_empty() => {
                    let state = app.queries().user(&UserId::from(id), enabled).await;
                    match (&state.data, &state.error) {
                        (_, Some(error)) => Ok(views::error_banner(error)),
                        (Some(user), None) => Ok(views::render_user_detail(user, &app.offset())),
                        (None, None) => Ok(String::new()),
                    }
                }
                _ => Err(IngatinError::NotFound {
                    resource: "route".to_string(),
                    id: route.to_string(),
                }),
            },
        }
    }

    /// Executes one parsed command. Returns `false` when the shell should exit.
    pub async fn execute(
        &mut self,
        command: ShellCommand,
        confirm: Confirm<'_>,
    ) -> Result<(bool, String), IngatinError> {
        let app = self.app;
        let out = match command {
            ShellCommand::Quit => return Ok((false, String::new())),
            ShellCommand::Goto { route } => {
                let mut out = String::new();
                if let Some(to) = self.navigate(&route) {
                    out.push_str(&format!("→ {to}\n"));
                }
                out.push_str(&self.render().await?);
                out
            }
            ShellCommand::Show => self.render().await?,
            ShellCommand::Login { email } => {
                if app.session().is_authenticated() {
                    "already signed in\n".to_string()
                } else {
                    let (email, password) = commands::prompt_credentials(email)?;
                    let identity = app.session().sign_in(&email, &password).await?;
                    format!(
                        "{} signed in as {}\n",
                        "✓".green(),
                        identity.email.unwrap_or(identity.id)
                    )
                }
            }
            ShellCommand::Logout => commands::logout(app).await?,
            ShellCommand::Users(cmd) => commands::users(app, cmd, confirm).await?,
            ShellCommand::Reset { shift, yes } => {
                commands::reset(app, shift.into(), yes, confirm).await?
            }
            ShellCommand::Status => commands::status(app, false).await?,
        };
        Ok((true, out))
    }
}

/// Runs the `ingatin shell` interactive REPL.
pub async fn run_shell(app: &App) -> Result<(), IngatinError> {
    let mut rl = DefaultEditor::new()
        .map_err(|e| IngatinError::Internal(format!("failed to initialize readline: {e}")))?;
    let mut shell = Shell::new(app);

    println!("{}", "ingatin shell".bold().green());
    println!(
        "Type {} to navigate, {} for commands, {} to exit.\n",
        "goto /dashboard".yellow(),
        "help".yellow(),
        "quit".yellow()
    );
    shell.apply_guard();
    print!("{}", shell.render().await.unwrap_or_default());

    loop {
        if shell.auth_changed()
            && let Some(to) = shell.apply_guard()
        {
            println!("→ {to}");
            match shell.render().await {
                Ok(screen) => print!("{screen}"),
                Err(e) => eprintln!("{}: {e}", "error".red()),
            }
        }

        let prompt = format!("{} {}> ", "ingatin".green(), shell.route().dimmed());
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                let command = match ShellLine::parse(trimmed) {
                    Ok(command) => command,
                    Err(e) => {
                        let _ = e.print();
                        continue;
                    }
                };
                debug!(?command, "shell command");
                match shell.execute(command, &mut commands::stdin_confirm).await {
                    Ok((true, out)) => print!("{out}"),
                    Ok((false, _)) => break,
                    Err(e) => eprintln!("{}: {e}", "error".red()),
                }
                if let Some(to) = shell.apply_guard() {
                    println!("→ {to}");
                    match shell.render().await {
                        Ok(screen) => print!("{screen}"),
                        Err(e) => eprintln!("{}: {e}", "error".red()),
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    if let Some(mut sub) = shell.realtime.take() {
        sub.close();
    }
    Ok(())
}
