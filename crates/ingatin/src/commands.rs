// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command handlers shared by the one-shot CLI and the shell.
//!
//! Handlers return the text to print so the shell and the tests can reuse
//! them. Only the interactive helpers (`prompt_credentials`,
//! `stdin_confirm`, `watch_dashboard`) touch the terminal directly.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use colored::Colorize;
use ingatin_config::IngatinConfig;
use ingatin_core::whatsapp::{display_number, format_number};
use ingatin_core::{
    HealthStatus, IngatinError, NewUser, Shift, SubscriptionStatus, User, UserId, UserPatch,
};
use ingatin_query::QueryState;
use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::App;
use crate::cli::UsersCommand;
use crate::views::{self, DashboardView};

/// Asks the operator to confirm a destructive action.
pub type Confirm<'a> = &'a mut dyn FnMut(&str) -> bool;

/// Reads `y`/`ya`/`yes` from stdin. Anything else declines.
pub fn stdin_confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "ya" | "yes")
}

/// Prompts for whatever was not given on the command line.
pub fn prompt_credentials(email: Option<String>) -> Result<(String, SecretString), IngatinError> {
    let email = match email {
        Some(email) => email,
        None => {
            print!("Email: ");
            let _ = io::stdout().flush();
            let mut line = String::new();
            io::stdin()
                .read_line(&mut line)
                .map_err(|e| IngatinError::Internal(format!("failed to read email: {e}")))?;
            line.trim().to_string()
        }
    };
    let password = rpassword::prompt_password("Password: ")
        .map_err(|e| IngatinError::Internal(format!("failed to read password: {e}")))?;
    Ok((email, SecretString::from(password)))
}

/// Applies the auth guard before showing `route`.
///
/// Commands run once per process, so a redirect here ends the command.
pub fn enter(app: &App, route: &str) -> Result<(), IngatinError> {
    let mut guard = app.guard();
    match guard.check(app.session().state(), route) {
        Some(redirect) if redirect.to == guard.login_route() => Err(IngatinError::auth(format!(
            "{} requires a session, run `ingatin login` first",
            redirect.from
        ))),
        _ => Ok(()),
    }
}

/// The public landing page. Needs no backend.
pub fn landing(config: &IngatinConfig) -> String {
    views::render_landing(&config.bot)
}

pub async fn login(
    app: &App,
    email: &str,
    password: &SecretString,
) -> Result<String, IngatinError> {
    let mut guard = app.guard();
    let login_route = guard.login_route().to_string();
    if let Some(identity) = app.session().identity() {
        return Ok(format!(
            "already signed in as {}\n",
            identity.email.unwrap_or(identity.id)
        ));
    }

    let identity = app.session().sign_in(email, password).await?;
    let mut out = format!(
        "{} signed in as {}\n",
        "✓".green(),
        identity.email.unwrap_or(identity.id)
    );
    if let Some(redirect) = guard.check(app.session().state(), &login_route) {
        out.push_str(&format!("→ {}\n", redirect.to));
    }
    Ok(out)
}

pub async fn logout(app: &App) -> Result<String, IngatinError> {
    if !app.session().is_authenticated() {
        return Ok("not signed in\n".to_string());
    }
    app.session().sign_out().await?;
    Ok(format!("{} signed out\n", "✓".green()))
}

/// Turns a query snapshot into its data, preferring a fresh error over stale rows.
fn settled<T>(state: QueryState<T>) -> Result<T, IngatinError> {
    if let Some(error) = state.error {
        let error = Arc::try_unwrap(error)
            .unwrap_or_else(|shared| IngatinError::remote(shared.to_string()));
        return Err(error);
    }
    state
        .data
        .ok_or_else(|| IngatinError::Internal("query finished without data".to_string()))
}

/// One render of the dashboard.
pub async fn dashboard(app: &App) -> Result<String, IngatinError> {
    enter(app, "/dashboard")?;
    let state = app.queries().users(app.session().is_authenticated()).await;
    Ok(views::render_dashboard(&DashboardView {
        users: state.data.as_deref(),
        loading: state.is_loading,
        error: state.error.as_deref(),
        realtime: None,
        offset: app.offset(),
    }))
}

async fn next_status(rx: &mut Option<watch::Receiver<SubscriptionStatus>>) {
    match rx {
        Some(inner) => {
            if inner.changed().await.is_err() {
                *rx = None;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

/// Keeps the dashboard on screen, re-rendering whenever the cached list,
/// the realtime status, or the session changes.
pub async fn watch_dashboard(app: &App, cancel: CancellationToken) -> Result<(), IngatinError> {
    enter(app, "/dashboard")?;
    let mut guard = app.guard();
    let mut auth = app.session().subscribe();
    let mut observer = app.queries().observe_users(app.session().is_authenticated());
    let mut subscription = app.subscribe_users();
    let mut status_rx = subscription.as_ref().map(|s| s.watch_status());
    let clear = io::stdout().is_terminal();

    info!("watching dashboard");
    loop {
        let state = observer.state();
        let realtime = subscription.as_ref().map(|s| s.realtime_status());
        let screen = views::render_dashboard(&DashboardView {
            users: state.data.as_deref(),
            loading: state.is_loading,
            error: state.error.as_deref(),
            realtime,
            offset: app.offset(),
        });
        if clear {
            print!("\x1b[2J\x1b[H");
        }
        print!("{screen}");
        println!("  {}", "Ctrl+C untuk keluar".dimmed());
        let _ = io::stdout().flush();

        tokio::select! {
            _ = cancel.cancelled() => break,
            alive = observer.changed() => {
                if !alive {
                    break;
                }
            }
            _ = next_status(&mut status_rx) => {}
            changed = auth.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *auth.borrow_and_update();
                observer.set_enabled(state.is_authenticated());
                if let Some(redirect) = guard.check(state, "/dashboard") {
                    println!("→ {}", redirect.to);
                    break;
                }
            }
        }
    }

    if let Some(sub) = subscription.as_mut() {
        sub.close();
    }
    debug!("dashboard watch ended");
    Ok(())
}

async fn load_user(app: &App, id: &UserId) -> Result<User, IngatinError> {
    settled(app.queries().user(id, app.session().is_authenticated()).await)
}

pub async fn users(
    app: &App,
    command: UsersCommand,
    confirm: Confirm<'_>,
) -> Result<String, IngatinError> {
    let route = match &command {
        UsersCommand::Show { id } => format!("/users/{id}"),
        _ => "/users".to_string(),
    };
    enter(app, &route)?;

    match command {
        UsersCommand::List => {
            let enabled = app.session().is_authenticated();
            let users = settled(app.queries().users(enabled).await)?;
            Ok(views::render_user_table(&users, &app.offset()))
        }
        UsersCommand::Show { id } => {
            let user = load_user(app, &UserId::from(id)).await?;
            Ok(views::render_user_detail(&user, &app.offset()))
        }
        UsersCommand::Create {
            number,
            name,
            pagi,
            sore,
        } => {
            let new_user = NewUser {
                number: format_number(&number)?,
                name: name.clone().filter(|n| !n.trim().is_empty()),
                absen_pagi: pagi,
                absen_sore: sore,
                ..NewUser::default()
            };
            match app.mutations().create_user(&new_user).await {
                Ok(user) => Ok(format!(
                    "{} created {} ({})\n",
                    "✓".green(),
                    user.id,
                    display_number(&user.number)
                )),
                Err(e) => {
                    eprintln!(
                        "  retry with: ingatin users create {number}{}{}{}",
                        name.map(|n| format!(" --name \"{n}\"")).unwrap_or_default(),
                        if pagi { " --pagi" } else { "" },
                        if sore { " --sore" } else { "" },
                    );
                    Err(e)
                }
            }
        }
        UsersCommand::Toggle { id, shift } => {
            let shift = Shift::from(shift);
            let user = load_user(app, &UserId::from(id)).await?;
            let updated = app.mutations().toggle_attendance(&user, shift).await?;
            Ok(format!(
                "{} {} {}: {}\n",
                "✓".green(),
                updated.id,
                shift,
                if shift.is_done(&updated) { "sudah" } else { "belum" }
            ))
        }
        UsersCommand::Rename { id, name } => {
            let name = name.join(" ");
            let name = (!name.trim().is_empty()).then_some(name);
            let updated = app
                .mutations()
                .update_user(&UserId::from(id), UserPatch::rename(name))
                .await?;
            Ok(format!(
                "{} {} is now {}\n",
                "✓".green(),
                updated.id,
                updated.name.as_deref().unwrap_or("-")
            ))
        }
        UsersCommand::Delete { id, yes } => {
            let id = UserId::from(id);
            if !yes && !confirm(&format!("Hapus user {id}?")) {
                return Ok("cancelled\n".to_string());
            }
            app.mutations().delete_user(&id).await?;
            Ok(format!("{} deleted {id}\n", "✓".green()))
        }
    }
}

pub async fn reset(
    app: &App,
    shift: Shift,
    yes: bool,
    confirm: Confirm<'_>,
) -> Result<String, IngatinError> {
    enter(app, "/dashboard")?;
    let label = match shift {
        Shift::Morning => "pagi",
        Shift::Evening => "sore",
    };
    if !yes && !confirm(&format!("Reset absen {label} untuk semua user?")) {
        return Ok("cancelled\n".to_string());
    }
    app.mutations().reset_attendance(shift).await?;
    Ok(format!("{} absen {label} reset\n", "✓".green()))
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub auth_state: String,
    pub signed_in_as: Option<String>,
    pub realtime_enabled: bool,
    pub adapters: Vec<AdapterReport>,
}

#[derive(Debug, Serialize)]
pub struct AdapterReport {
    pub name: String,
    pub kind: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub async fn status_report(app: &App) -> StatusReport {
    let adapters = app
        .health()
        .await
        .into_iter()
        .map(|h| {
            let (status, detail) = match h.status {
                HealthStatus::Healthy => ("healthy", None),
                HealthStatus::Degraded(d) => ("degraded", Some(d)),
                HealthStatus::Unhealthy(d) => ("unhealthy", Some(d)),
            };
            AdapterReport {
                name: h.name,
                kind: h.adapter_type.to_string(),
                status: status.to_string(),
                detail,
            }
        })
        .collect();
    StatusReport {
        auth_state: app.session().state().to_string(),
        signed_in_as: app
            .session()
            .identity()
            .map(|i| i.email.unwrap_or(i.id)),
        realtime_enabled: app.config().realtime.enabled,
        adapters,
    }
}

pub async fn status(app: &App, json: bool) -> Result<String, IngatinError> {
    let report = status_report(app).await;
    if json {
        let mut out = serde_json::to_string_pretty(&report)
            .map_err(|e| IngatinError::Internal(format!("failed to encode status: {e}")))?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    out.push_str(&format!("{}\n", "Ingat-In Status".bold()));
    out.push_str(&format!(
        "  Session:  {}{}\n",
        report.auth_state,
        report
            .signed_in_as
            .as_deref()
            .map(|who| format!(" ({who})"))
            .unwrap_or_default()
    ));
    out.push_str(&format!(
        "  Realtime: {}\n",
        if report.realtime_enabled { "enabled" } else { "disabled" }
    ));
    for adapter in &report.adapters {
        let mark = match adapter.status.as_str() {
            "healthy" => "✓".green(),
            "degraded" => "!".yellow(),
            _ => "✗".red(),
        };
        out.push_str(&format!("  {mark} {:<10} {}", adapter.kind, adapter.name));
        if let Some(detail) = &adapter.detail {
            out.push_str(&format!(" ({detail})"));
        }
        out.push('\n');
    }
    Ok(out)
}
