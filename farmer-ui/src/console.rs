//! Terminal dashboard.

use std::io::{self, Write};
use std::net::SocketAddr;

use colored::Colorize;
use farmer::core::types::RunState;
use farmer::status::{ProfileStatus, StatusReport};

pub const HELP_LINE: &str = "Commands: add | pause <id> | resume <id> | stop <id> | \
mode <id> <xp|gem|streak_farm|streak_repair|combo> | targets <id> xp=<n> gems=<n> streak+=<n> | \
api on | quit";

const CLEAR: &str = "\x1b[2J\x1b[H";

/// Render the whole dashboard as text.
pub fn render(report: &StatusReport, bridge: Option<SocketAddr>, prompt: Option<&str>) -> String {
    let mut out = String::new();
    let header = format!(
        "AutoFarm — {} running | ΔXP={} ΔGems={}",
        report.running, report.experience_gained, report.currency_gained
    );
    out.push_str(&header.bold().to_string());
    if let Some(addr) = bridge {
        out.push_str(&format!("  [api http://{addr}]").dimmed().to_string());
    }
    out.push('\n');
    out.push_str(&format!(
        "{:>3}  {:<12} {:<14} {:<22} {:<8} {:>7} {:>9} {:>8}  {}\n",
        "ID", "Profile", "User", "Mode", "Langs", "Streak", "XP", "Gems", "Status"
    ));
    for row in &report.profiles {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    if report.profiles.is_empty() {
        out.push_str(&"  no profiles yet; type `add`\n".dimmed().to_string());
    }
    out.push('\n');
    out.push_str(&HELP_LINE.dimmed().to_string());
    out.push('\n');
    if let Some(prompt) = prompt {
        out.push_str(&prompt.bold().to_string());
        out.push(' ');
    }
    out
}

fn render_row(row: &ProfileStatus) -> String {
    let status = match (row.state, row.paused) {
        (RunState::Stopped, _) => row.last_status.red().to_string(),
        (_, true) => row.last_status.yellow().to_string(),
        (RunState::Running, false) => row.last_status.green().to_string(),
        (RunState::Initializing, false) => row.last_status.normal().to_string(),
    };
    format!(
        "{:>3}  {:<12} {:<14} {:<22} {:<8} {:>7} {:>9} {:>8}  {}",
        row.id,
        row.label,
        row.user,
        row.mode_label(),
        format!("{}->{}", row.source_locale, row.target_locale),
        row.streak,
        row.experience,
        row.currency,
        status
    )
}

/// Clear the terminal and draw the dashboard.
pub fn draw(report: &StatusReport, bridge: Option<SocketAddr>, prompt: Option<&str>) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{CLEAR}{}", render(report, bridge, prompt))?;
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmer::core::types::Strategy;

    fn row(id: u32, paused: bool) -> ProfileStatus {
        ProfileStatus {
            id,
            label: format!("profile{id}"),
            strategy: Strategy::CurrencyFarm,
            state: RunState::Running,
            paused,
            stop_cause: None,
            user: "lin".to_string(),
            source_locale: "vi".to_string(),
            target_locale: "en".to_string(),
            streak: 4,
            experience: 1200,
            currency: 530,
            last_status: "+30 gems".to_string(),
        }
    }

    #[test]
    fn renders_totals_rows_and_prompt() {
        colored::control::set_override(false);
        let report = StatusReport {
            running: 1,
            experience_gained: 0,
            currency_gained: 30,
            profiles: vec![row(1, false), row(2, true)],
        };

        let text = render(&report, None, Some("JWT token:"));

        assert!(text.contains("1 running | ΔXP=0 ΔGems=30"));
        assert!(text.contains("gem (paused)"));
        assert!(text.contains("vi->en"));
        assert!(text.contains(HELP_LINE));
        assert!(text.trim_end().ends_with("JWT token:"));
    }
}
