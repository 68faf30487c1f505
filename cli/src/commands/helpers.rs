use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};

use stride_core::gate::{AdminGate, WrongPin};
use stride_core::service::StrideService;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Form date field value (`YYYY-MM-DD`) for a CLI date argument.
pub(crate) fn form_date(date_str: Option<String>) -> Result<String> {
    Ok(parse_date(date_str)?.format("%Y-%m-%d").to_string())
}

fn read_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(line)
}

/// Ask a yes/no question on the terminal. Anything but `y`/`yes` is a no.
pub(crate) fn prompt_confirm(question: &str) -> Result<bool> {
    let line = read_line(&format!("{question} [y/N]: "))?;
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "j" | "ja")
}

/// Pass the admin gate with `--pin`, or prompt for the PIN when none was given.
pub(crate) fn unlock(pin: Option<&str>) -> Result<AdminGate> {
    let input = match pin {
        Some(p) => p.to_string(),
        None => read_line("PIN: ")?.trim().to_string(),
    };
    let mut gate = AdminGate::new();
    if !gate.submit(&input) {
        bail!(WrongPin);
    }
    Ok(gate)
}

/// Print queued storage notices to stderr.
pub(crate) fn report_notices(svc: &mut StrideService) {
    for notice in svc.take_notices() {
        eprintln!("Warning: {notice}");
    }
}

/// `[#####.....]`-style bar for a fraction in `[0, 1]`.
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub(crate) fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// First line of a multi-line text, for table cells.
pub(crate) fn first_line(s: &str) -> &str {
    s.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}
