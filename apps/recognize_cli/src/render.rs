//! Terminal rendering of orchestrator views, one rewritten status line per update.

use std::io::{self, Write};

use client_core::{Tone, View};
use shared::domain::StepState;

const BAR_WIDTH: usize = 30;
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const CLEAR_LINE: &str = "\r\x1b[2K";

pub fn render_line(view: &View) -> String {
    if view.drop_zone_visible {
        return "Waiting for a file...".to_string();
    }
    if view.result_visible {
        return format!(
            "Done. Result ready: {}",
            view.download_target.as_deref().unwrap_or_default()
        );
    }

    let mut line = format!(
        "[{}] {}",
        progress_bar(view.progress_percent),
        step_markers(view)
    );
    if let Some((current, total)) = view.file_counter {
        line.push_str(&format!(" (file {current}/{total})"));
    }
    line.push_str("  ");
    match view.tone {
        Tone::Normal => line.push_str(&view.status_text),
        Tone::Error => line.push_str(&format!("{RED}{}{RESET}", view.status_text)),
    }
    line
}

pub fn draw(out: &mut impl Write, view: &View) -> io::Result<()> {
    write!(out, "{CLEAR_LINE}{}", render_line(view))?;
    out.flush()
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) * BAR_WIDTH / 100;
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn step_markers(view: &View) -> String {
    view.steps
        .iter()
        .map(|step| {
            let marker = match step.state {
                StepState::Complete => "[x]",
                StepState::Active => "[>]",
                StepState::Pending => "[ ]",
            };
            format!("{marker} {}", step.step.label())
        })
        .collect::<Vec<_>>()
        .join(" ")
}
