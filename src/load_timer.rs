//! Per-call import timing
//!
//! Each `profile_import` call owns one `LoadTimer`. The timer keeps every
//! tracked record, but `summarize()` only reports the most recent one.

use std::time::{Duration, Instant};

/// Log target for per-load and cumulative timing lines
pub const IMPORT_LOG_TARGET: &str = "viscera::imports";

/// Loads at or above this many milliseconds are highlighted
pub const SLOW_IMPORT_MS: f64 = 1000.0;

const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// One timed load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRecord {
    pub module_name: String,
    pub duration_ms: f64,
}

/// Tracks import times for a single caller
#[derive(Debug)]
pub struct LoadTimer {
    caller_file: String,
    caller_package: Option<String>,
    imports: Vec<LoadRecord>,
    start_time: Instant,
    last_import: Option<LoadRecord>,
    last_total_time: Duration,
}

impl LoadTimer {
    pub fn new(caller_file: impl Into<String>, caller_package: Option<String>) -> Self {
        Self {
            caller_file: caller_file.into(),
            caller_package,
            imports: Vec::new(),
            start_time: Instant::now(),
            last_import: None,
            last_total_time: Duration::ZERO,
        }
    }

    /// Record the load time of a module, replacing any earlier record for it
    pub fn track(&mut self, module_name: &str, duration_ms: f64) {
        let record = LoadRecord {
            module_name: module_name.to_string(),
            duration_ms,
        };
        match self
            .imports
            .iter_mut()
            .find(|r| r.module_name == module_name)
        {
            Some(existing) => existing.duration_ms = duration_ms,
            None => self.imports.push(record.clone()),
        }
        self.last_import = Some(record);
    }

    /// Log the most recent import and return the logged line
    ///
    /// Returns `None` (and logs nothing) if nothing has been tracked.
    pub fn summarize(&mut self) -> Option<String> {
        let total = self.start_time.elapsed();
        let last = self.last_import.as_ref()?;

        let line = format_import_line(&last.module_name, last.duration_ms);
        tracing::debug!(
            target: IMPORT_LOG_TARGET,
            caller = %self.caller_file,
            package = self.caller_package.as_deref().unwrap_or("-"),
            "{}",
            line
        );

        self.last_total_time = total;
        Some(line)
    }

    pub fn caller_file(&self) -> &str {
        &self.caller_file
    }

    pub fn caller_package(&self) -> Option<&str> {
        self.caller_package.as_deref()
    }

    /// All tracked records in first-tracked order
    pub fn imports(&self) -> &[LoadRecord] {
        &self.imports
    }

    pub fn get(&self, module_name: &str) -> Option<f64> {
        self.imports
            .iter()
            .find(|r| r.module_name == module_name)
            .map(|r| r.duration_ms)
    }

    pub fn last_import(&self) -> Option<&LoadRecord> {
        self.last_import.as_ref()
    }

    /// Time from construction to the last `summarize()` that logged
    pub fn last_total_time(&self) -> Duration {
        self.last_total_time
    }
}

/// Format `[<name>] (importTime: <ms>ms)`, red when the load was slow
pub fn format_import_line(module_name: &str, duration_ms: f64) -> String {
    let time = if duration_ms >= SLOW_IMPORT_MS {
        format!("{}{:.2}{}", RED, duration_ms, RESET)
    } else {
        format!("{:.2}", duration_ms)
    };
    format!("[{}] (importTime: {}ms)", module_name, time)
}
