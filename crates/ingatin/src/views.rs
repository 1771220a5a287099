// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of the dashboard views.
//!
//! Every function returns the rendered text; callers decide where it goes.
//! Colour is applied through `colored` and switched off globally for
//! non-terminal output.

use std::fmt::Write as _;

use chrono::FixedOffset;
use colored::Colorize;
use ingatin_config::model::BotConfig;
use ingatin_core::format::{format_date, format_full_date_time, format_time};
use ingatin_core::whatsapp::{display_number, generate_bot_whatsapp_link};
use ingatin_core::{AttendanceStats, CategoryStats, IngatinError, User};
use ingatin_query::RealtimeStatus;

const RULE_WIDTH: usize = 64;
const BAR_WIDTH: usize = 20;

/// Number of rows in the recent activity panel.
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

fn header(out: &mut String, title: &str, subtitle: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", title.bold());
    let _ = writeln!(out, "  {}", subtitle.dimmed());
    let _ = writeln!(out, "  {}", rule());
}

/// Landing page with the call to action for the bot.
pub fn render_landing(bot: &BotConfig) -> String {
    let mut out = String::new();
    header(
        &mut out,
        "Ingat-In",
        "Absensi harian lewat WhatsApp, dipantau secara real-time",
    );
    let _ = writeln!(out, "  1. Kirim pesan ke bot WhatsApp");
    let _ = writeln!(out, "  2. Bot mencatat absen pagi dan sore");
    let _ = writeln!(out, "  3. Admin memantau kehadiran dari dashboard");
    let _ = writeln!(out);
    match &bot.whatsapp_number {
        Some(number) => {
            let link = generate_bot_whatsapp_link(number, bot.greeting.as_deref());
            let _ = writeln!(out, "  Mulai sekarang: {}", link.cyan().underline());
        }
        None => {
            let _ = writeln!(out, "  {}", "Nomor bot belum dikonfigurasi ([bot] whatsapp_number)".yellow());
        }
    }
    let _ = writeln!(out, "  Admin: {}", "ingatin login".bold());
    out
}

/// Header badge for the realtime connection.
pub fn realtime_badge(status: Option<RealtimeStatus>) -> String {
    match status {
        Some(RealtimeStatus::Connected) => format!("{} Live", "●".green()),
        Some(RealtimeStatus::Connecting) => format!("{} Connecting", "○".yellow()),
        Some(RealtimeStatus::Disconnected) => format!("{} Offline", "✗".red()),
        None => format!("{} Realtime off", "-".dimmed()),
    }
}

/// Inline banner shown above the data when a query failed.
pub fn error_banner(error: &IngatinError) -> String {
    format!(
        "  {} {}\n    {}\n",
        "!".red().bold(),
        "Gagal memuat data".red().bold(),
        error.to_string().red()
    )
}

fn progress_bar(percentage: u32) -> String {
    let filled = (percentage.min(100) as usize * BAR_WIDTH + 50) / 100;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn category_line(label: &str, stats: CategoryStats, total: usize) -> String {
    format!(
        "  {:<12} {:>4}/{:<4} {} {:>3}% Completion rate",
        label,
        stats.sudah,
        total,
        progress_bar(stats.percentage),
        stats.percentage
    )
}

/// The three stat cards.
pub fn render_stats(stats: &AttendanceStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {:<12} {:>4}", "Total Users", stats.total_users);
    let _ = writeln!(out, "{}", category_line("Absen Pagi", stats.absen_pagi, stats.total_users));
    let _ = writeln!(out, "{}", category_line("Absen Sore", stats.absen_sore, stats.total_users));
    out
}

fn mark(done: bool) -> String {
    if done {
        "✓".green().to_string()
    } else {
        "·".dimmed().to_string()
    }
}

fn last_checkin(user: &User, offset: &FixedOffset) -> String {
    user.last_checkin
        .map(|at| {
            let local = at.with_timezone(offset);
            format!("{} {}", format_date(&local), format_time(&local))
        })
        .unwrap_or_else(|| "-".to_string())
}

/// The user table, in list order.
pub fn render_user_table(users: &[User], offset: &FixedOffset) -> String {
    let mut out = String::new();
    if users.is_empty() {
        let _ = writeln!(out, "  {}", "Belum ada pengguna".dimmed());
        return out;
    }
    let _ = writeln!(
        out,
        "  {:<36}  {:<16}  {:<18}  {:^4}  {:^4}  {}",
        "ID", "Nomor", "Nama", "Pagi", "Sore", "Check-in terakhir"
    );
    for user in users {
        let _ = writeln!(
            out,
            "  {:<36}  {:<16}  {:<18}  {:^4}  {:^4}  {}",
            user.id.as_str().dimmed(),
            display_number(&user.number),
            user.name.as_deref().unwrap_or("-"),
            mark(user.absen_pagi),
            mark(user.absen_sore),
            last_checkin(user, offset)
        );
    }
    out
}

/// Users with a check-in, most recent first.
pub fn recent_activity(users: &[User], limit: usize) -> Vec<&User> {
    let mut active: Vec<&User> = users.iter().filter(|u| u.last_checkin.is_some()).collect();
    active.sort_by(|a, b| b.last_checkin.cmp(&a.last_checkin));
    active.truncate(limit);
    active
}

fn render_recent_activity(users: &[User], offset: &FixedOffset) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {}", "Recent Activity".bold());
    let recent = recent_activity(users, RECENT_ACTIVITY_LIMIT);
    if recent.is_empty() {
        let _ = writeln!(out, "  {}", "No recent activity".dimmed());
        return out;
    }
    for user in recent {
        let who = match &user.name {
            Some(name) => format!("{name} ({})", display_number(&user.number)),
            None => display_number(&user.number),
        };
        let mut badges = Vec::new();
        if user.absen_pagi {
            badges.push("Morning".green().to_string());
        }
        if user.absen_sore {
            badges.push("Evening".magenta().to_string());
        }
        let _ = writeln!(out, "  {:<40} {:<20} {}", who, last_checkin(user, offset), badges.join(" "));
    }
    out
}

/// What the dashboard view shows for one render.
pub struct DashboardView<'a> {
    pub users: Option<&'a [User]>,
    pub loading: bool,
    pub error: Option<&'a IngatinError>,
    pub realtime: Option<RealtimeStatus>,
    pub offset: FixedOffset,
}

pub fn render_dashboard(view: &DashboardView<'_>) -> String {
    let mut out = String::new();
    header(
        &mut out,
        "Dashboard Overview",
        "Real-time monitoring of WhatsApp Bot attendance system",
    );
    let _ = writeln!(out, "  {}", realtime_badge(view.realtime));
    let _ = writeln!(out);

    if let Some(error) = view.error {
        out.push_str(&error_banner(error));
        let _ = writeln!(out);
    }
    if view.loading && view.users.is_none() {
        let _ = writeln!(out, "  {}", "Memuat data...".dimmed());
        return out;
    }

    let users = view.users.unwrap_or_default();
    out.push_str(&render_stats(&AttendanceStats::from_users(users)));
    let _ = writeln!(out, "  {}", rule());
    out.push_str(&render_recent_activity(users, &view.offset));
    let _ = writeln!(out, "  {}", rule());
    out.push_str(&render_user_table(users, &view.offset));
    out
}

/// One user in full.
pub fn render_user_detail(user: &User, offset: &FixedOffset) -> String {
    let mut out = String::new();
    let status = |done: bool| if done { "Sudah".green() } else { "Belum".yellow() };
    let _ = writeln!(out, "  {:<18} {}", "ID", user.id);
    let _ = writeln!(out, "  {:<18} {}", "Nomor", display_number(&user.number));
    let _ = writeln!(out, "  {:<18} {}", "Nama", user.name.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "  {:<18} {}", "Absen pagi", status(user.absen_pagi));
    let _ = writeln!(out, "  {:<18} {}", "Absen sore", status(user.absen_sore));
    let _ = writeln!(out, "  {:<18} {}", "Check-in terakhir", last_checkin(user, offset));
    if let Some(until) = user.suspend_until {
        let _ = writeln!(
            out,
            "  {:<18} {}",
            "Ditangguhkan s/d",
            format_full_date_time(&until.with_timezone(offset))
        );
    }
    let _ = writeln!(
        out,
        "  {:<18} {}",
        "Dibuat",
        format_full_date_time(&user.created_at.with_timezone(offset))
    );
    out
}
