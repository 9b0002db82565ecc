//! Structured logging module for Legacy Linter
//!
//! Writes logs to `<LOG_DIR>/legacy-linter-YYYY-MM-DD.log` with categories:
//! - SERVER: Startup and shutdown
//! - REQUEST: Chat request lifecycle
//! - COMPLETION: Chat-completion calls
//! - REPAIR: JSON repair attempts
//! - IMAGE: Diagram generation
//! - HISTORY: Persisted modernization results
//! - AUTH: Registration
//! - ERROR: Errors

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Log categories for structured logging
#[derive(Debug, Clone, Copy)]
pub enum LogCategory {
    Server,
    Request,
    Completion,
    Repair,
    Image,
    History,
    Auth,
    Error,
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Server => "SERVER",
            LogCategory::Request => "REQUEST",
            LogCategory::Completion => "COMPLETION",
            LogCategory::Repair => "REPAIR",
            LogCategory::Image => "IMAGE",
            LogCategory::History => "HISTORY",
            LogCategory::Auth => "AUTH",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Log directory, set by `init_logging`. Console-only until then.
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

fn log_dir() -> Option<PathBuf> {
    LOG_DIR.lock().ok().and_then(|dir| dir.clone())
}

/// Get today's log file path
fn log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("legacy-linter-{}.log", today))
}

/// Initialize the logging system - creates log directory if needed
pub fn init_logging(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    if let Ok(mut slot) = LOG_DIR.lock() {
        *slot = Some(dir.to_path_buf());
    }

    log(LogCategory::Server, None, "Legacy Linter logging initialized");

    Ok(())
}

fn format_line(category: LogCategory, request_id: Option<&str>, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let request_context = request_id
        .map(|id| format!("request={} | ", id.chars().take(8).collect::<String>()))
        .unwrap_or_default();

    format!(
        "[{}] [{}] {}{}\n",
        timestamp,
        category.as_str(),
        request_context,
        message
    )
}

/// Log a message with category and optional request context
pub fn log(category: LogCategory, request_id: Option<&str>, message: &str) {
    let log_line = format_line(category, request_id, message);

    print!("{}", log_line);

    if let Some(dir) = log_dir() {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path(&dir))
        {
            let _ = file.write_all(log_line.as_bytes());
        }
    }
}

pub fn log_server(message: &str) {
    log(LogCategory::Server, None, message);
}

pub fn log_request(request_id: Option<&str>, message: &str) {
    log(LogCategory::Request, request_id, message);
}

pub fn log_completion(request_id: Option<&str>, message: &str) {
    log(LogCategory::Completion, request_id, message);
}

pub fn log_repair(request_id: Option<&str>, message: &str) {
    log(LogCategory::Repair, request_id, message);
}

pub fn log_image(request_id: Option<&str>, message: &str) {
    log(LogCategory::Image, request_id, message);
}

pub fn log_history(message: &str) {
    log(LogCategory::History, None, message);
}

pub fn log_auth(message: &str) {
    log(LogCategory::Auth, None, message);
}

pub fn log_error(request_id: Option<&str>, message: &str) {
    log(LogCategory::Error, request_id, message);
}

/// Clean up old log files (keep last 7 days)
pub fn cleanup_old_logs() -> std::io::Result<usize> {
    let Some(dir) = log_dir() else {
        return Ok(0);
    };
    let mut deleted = 0;

    if !dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);

    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}
