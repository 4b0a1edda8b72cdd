use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use stagehand_daemon::CheckOutcome;
use stagehand_installer::ReadyMap;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

impl TerminalRenderer {
    pub(crate) fn current() -> Self {
        Self {
            style: current_output_style(),
        }
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    resolve_output_style(std::io::stdout().is_terminal(), no_color)
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, no_color: bool) -> OutputStyle {
    if stdout_is_tty && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let (badge, badge_style) = status_badge(status);
            format!("{} {message}", colorize(badge_style, badge))
        }
    }
}

fn status_badge(status: &str) -> (&'static str, Style) {
    match status {
        "ok" => ("[OK]", badge_style(AnsiColor::BrightGreen)),
        "pending" => ("[..]", badge_style(AnsiColor::BrightCyan)),
        "warn" => ("[WARN]", badge_style(AnsiColor::BrightYellow)),
        "error" => ("[ERR]", badge_style(AnsiColor::BrightRed)),
        _ => ("[--]", Style::new()),
    }
}

fn badge_style(color: AnsiColor) -> Style {
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// One line per staged upgrade and per approval that has nothing to apply.
pub(crate) fn format_status_lines(
    ready: &ReadyMap,
    approvals: &[String],
    style: OutputStyle,
) -> Vec<String> {
    if ready.is_empty() && approvals.is_empty() {
        return vec![render_status_line(style, "ok", "no staged upgrades")];
    }

    let mut lines = Vec::new();
    for (name, staged) in ready {
        let approved = approvals.iter().any(|approval| approval == name);
        let line = if approved {
            render_status_line(
                style,
                "pending",
                &format!(
                    "{name} {} approved, applies on the next tick",
                    staged.version
                ),
            )
        } else {
            render_status_line(
                style,
                "ok",
                &format!(
                    "{name} {} staged at {}, awaiting approval",
                    staged.version,
                    staged.staging_dir.display()
                ),
            )
        };
        lines.push(line);
    }
    for name in approvals {
        if !ready.contains_key(name) {
            lines.push(render_status_line(
                style,
                "warn",
                &format!("{name} approved but nothing is staged"),
            ));
        }
    }
    lines
}

pub(crate) fn format_check_outcome(name: &str, outcome: &CheckOutcome, style: OutputStyle) -> String {
    match outcome {
        CheckOutcome::UpToDate { local, remote } => render_status_line(
            style,
            "ok",
            &format!("{name} is up to date (local {local}, remote {remote})"),
        ),
        CheckOutcome::AlreadyStaged { version } => render_status_line(
            style,
            "pending",
            &format!("{name} {version} is already staged, awaiting approval"),
        ),
        CheckOutcome::Staged {
            staging_dir,
            version,
        } => render_status_line(
            style,
            "pending",
            &format!(
                "{name} {version} staged at {}; run `stagehand approve {name}` to apply",
                staging_dir.display()
            ),
        ),
        CheckOutcome::Applied { version } => {
            render_status_line(style, "ok", &format!("{name} upgraded to {version}"))
        }
    }
}
