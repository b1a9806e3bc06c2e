use anyhow::Result;
use crossterm::{
    execute,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nbx_agent::{ComplianceResult, Verdict};
use nbx_core::Scope;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const INFO: Color = Color::Blue;
    const HEADER: Color = Color::Blue;
    const PASS: Color = Color::Green;
    const FAIL: Color = Color::Red;
    const UNKNOWN: Color = Color::Yellow;
    const BULLET: Color = Color::Cyan;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
}

/// How one line of the model's markdown report is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    /// `## Status: ...`, colored by verdict.
    Status(Verdict),
    Heading,
    Bullet,
    Plain,
}

/// Pick the style for a report line.
pub fn style_line(line: &str) -> LineStyle {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        let heading = trimmed.trim_start_matches('#').trim();
        if let Some(status) = heading.strip_prefix("Status:") {
            return LineStyle::Status(nbx_agent::classify::verdict_of(status));
        }
        return LineStyle::Heading;
    }
    if trimmed.starts_with("- ") || trimmed.starts_with("* ") {
        return LineStyle::Bullet;
    }
    LineStyle::Plain
}

fn verdict_color(verdict: Verdict) -> Color {
    match verdict {
        Verdict::Pass => Colors::PASS,
        Verdict::Fail => Colors::FAIL,
        Verdict::Unknown => Colors::UNKNOWN,
    }
}

/// Writes the check preamble, the report and errors to the console.
#[derive(Debug, Default)]
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// Echo what is about to be checked.
    pub fn print_preamble(&self, rule: &str, scope: &Scope, model: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::INFO),
            Print(format!("Running compliance check: {}\n", rule)),
            Print(format!("Scope: {}\n", scope.render())),
            Print(format!("Model: {}\n\n", model)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print the results header and the report with light markdown styling.
    pub fn print_report(&self, result: &ComplianceResult, elapsed: Duration) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::HEADER),
            SetAttribute(Attribute::Bold),
            Print("Compliance Check Results\n"),
            SetAttribute(Attribute::Reset),
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "Time: {:.2}s | Tool calls: {}\n\n",
                elapsed.as_secs_f64(),
                result.tool_calls
            )),
            ResetColor,
        )?;

        if result.raw_output.trim().is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("No output received\n"),
                ResetColor,
            )?;
        }

        for line in result.raw_output.lines() {
            match style_line(line) {
                LineStyle::Status(verdict) => execute!(
                    stdout,
                    SetForegroundColor(verdict_color(verdict)),
                    SetAttribute(Attribute::Bold),
                    Print(line.trim_start().trim_start_matches('#').trim()),
                    SetAttribute(Attribute::Reset),
                    ResetColor,
                    Print("\n"),
                )?,
                LineStyle::Heading => execute!(
                    stdout,
                    SetAttribute(Attribute::Bold),
                    Print(line.trim_start().trim_start_matches('#').trim()),
                    SetAttribute(Attribute::Reset),
                    Print("\n"),
                )?,
                LineStyle::Bullet => execute!(
                    stdout,
                    SetForegroundColor(Colors::BULLET),
                    Print("  • "),
                    ResetColor,
                    Print(&line.trim_start()[2..]),
                    Print("\n"),
                )?,
                LineStyle::Plain => execute!(stdout, Print(line), Print("\n"))?,
            }
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print the result object as pretty JSON.
    pub fn print_json(&self, result: &ComplianceResult) -> Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", serde_json::to_string_pretty(result)?)?;
        stdout.flush()?;
        Ok(())
    }

    /// Show a waiting indicator on stderr while the check runs.
    pub fn start_spinner(&self, message: &str) -> Result<SpinnerHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let message = message.to_string();

        let handle = std::thread::spawn(move || {
            let frames = ['|', '/', '-', '\\'];
            let mut i = 0;
            while running_clone.load(Ordering::SeqCst) {
                let mut stderr = io::stderr();
                execute!(
                    stderr,
                    SetForegroundColor(Colors::DIM),
                    Print(format!("\r{} {}", frames[i % frames.len()], message)),
                    ResetColor,
                )
                .ok();
                stderr.flush().ok();
                i += 1;
                std::thread::sleep(Duration::from_millis(100));
            }
            // Clear spinner
            let mut stderr = io::stderr();
            execute!(stderr, Print(format!("\r{}\r", " ".repeat(message.len() + 2)))).ok();
            stderr.flush().ok();
        });

        Ok(SpinnerHandle {
            running,
            thread: Some(handle),
        })
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stderr.flush()?;
        Ok(())
    }
}

/// Handle to a running spinner. Drop or call stop() to terminate it.
pub struct SpinnerHandle {
    running: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SpinnerHandle {
    /// Stop the spinner and wait for the line to be cleared.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.join().ok();
        }
    }
}

impl Drop for SpinnerHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_colored_by_verdict() {
        assert_eq!(style_line("## Status: FAIL"), LineStyle::Status(Verdict::Fail));
        assert_eq!(style_line("## Status: PASS"), LineStyle::Status(Verdict::Pass));
        assert_eq!(style_line("# Status: pending"), LineStyle::Status(Verdict::Unknown));
    }

    #[test]
    fn test_headings_and_bullets() {
        assert_eq!(style_line("## Findings"), LineStyle::Heading);
        assert_eq!(style_line("- dmi01-akron-rtr01: No primary IPv4 or IPv6"), LineStyle::Bullet);
        assert_eq!(style_line("  * nested"), LineStyle::Bullet);
        assert_eq!(style_line("Examined 4 devices in the DM-Akron site."), LineStyle::Plain);
        assert_eq!(style_line("-not a bullet"), LineStyle::Plain);
        assert_eq!(style_line(""), LineStyle::Plain);
    }

    #[test]
    fn test_spinner_stops() {
        let spinner = Terminal::new().start_spinner("Checking").unwrap();
        spinner.stop();
    }
}
