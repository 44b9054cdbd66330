//! Console rendering and the output file.

use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use crossterm::style::{Color, Stylize};
use probeup::{BatchResultSet, ProbeResult, ResultSink};

pub const BANNER: &str = r"
  _____ _          __   __
 |  ___(_)_ __ ___ \ \ / /
 | |_  | | '__/ _ \ \ V /
 |  _| | | | |  __/  | |
 |_|   |_|_|  \___|  |_|

 Firebase Authorization Tester
 =============================
";

const DETAIL_BODY_LIMIT: usize = 200;

fn status_color(status_code: u16) -> Color {
    match status_code {
        200..=299 => Color::Green,
        401 | 403 => Color::Yellow,
        404 => Color::Cyan,
        _ => Color::Red,
    }
}

fn paint(text: String, color: Color) -> String {
    if io::stdout().is_terminal() { text.with(color).to_string() } else { text }
}

fn outcome(result: &ProbeResult) -> String {
    if result.is_success() {
        format!(
            "{} {} (length: {} bytes)",
            result.status_code, result.status_class, result.body_length
        )
    } else {
        format!("{} {}", result.status_code, result.status_class)
    }
}

/// One coloured line per result, printed as results arrive
pub fn print_live(result: &ProbeResult) {
    println!(
        "[{}] {} -> {}",
        result.method,
        result.path,
        paint(outcome(result), status_color(result.status_code))
    );
}

/// Cut `text` to at most `max_chars` characters
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn print_details(batch: &BatchResultSet) {
    let rule = "=".repeat(60);
    println!("\n{rule}\nDetailed Results\n{rule}");

    for result in batch {
        println!("\nTimestamp: {}", timestamp(&result.timestamp));
        println!("Path: {}", result.path);
        println!("Method: {}", result.method);
        println!("Status Code: {}", result.status_code);
        println!("Status: {}", result.status_class);
        println!("Response Length: {} bytes", result.body_length);
        if let Some(body) = result.body.as_deref().filter(|b| !b.is_empty()) {
            println!("Response Body: {}", truncate(body, DETAIL_BODY_LIMIT));
        }
        println!("{}", "-".repeat(60));
    }
}

pub fn print_summary(batch: &BatchResultSet) {
    let rule = "=".repeat(40);
    println!("\n{rule}\nSummary\n{rule}");

    for entry in batch.summary() {
        let label = format!("{} {}", entry.status_code, entry.status_class);
        println!("{}: {}", paint(label, status_color(entry.status_code)), entry.count);
    }

    println!("\nTotal: {}", batch.len());
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Output file line: JSON when verbose, plain text otherwise
pub fn format_line(result: &ProbeResult, verbose: bool) -> io::Result<String> {
    if verbose {
        return serde_json::to_string(result).map_err(io::Error::other);
    }

    Ok(format!(
        "[{}] {} {} -> {}",
        timestamp(&result.timestamp),
        result.method,
        result.path,
        outcome(result)
    ))
}

fn open_append(path: &Path) -> io::Result<std::fs::File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append a batch to the output file
pub fn append_results(path: &Path, batch: &BatchResultSet, verbose: bool) -> io::Result<()> {
    let mut lines = String::new();
    for result in batch {
        lines.push_str(&format_line(result, verbose)?);
        lines.push('\n');
    }

    open_append(path)?.write_all(lines.as_bytes())
}

/// Monitoring output file; reopened for every write so it can be rotated
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    verbose: bool,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, verbose: bool) -> Self {
        Self { path: path.into(), verbose }
    }

    fn append_marker(&self, marker: &str) -> io::Result<()> {
        writeln!(open_append(&self.path)?, "\n=== {marker} ===")
    }
}

impl ResultSink for FileSink {
    fn iteration_started(&mut self, iteration: u64, at: DateTime<Utc>) -> io::Result<()> {
        self.append_marker(&format!("Iteration {iteration} - {}", timestamp(&at)))
    }

    fn record_batch(&mut self, batch: &BatchResultSet) -> io::Result<()> {
        append_results(&self.path, batch, self.verbose)
    }

    fn monitoring_completed(&mut self, at: DateTime<Utc>) -> io::Result<()> {
        self.append_marker(&format!("Monitoring Completed - {}", timestamp(&at)))
    }
}
