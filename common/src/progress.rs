//! Aggregate progress of a multi-source copy
//!
//! [`ProgressState`] is the single accumulator of one run: every chunk written by the copy
//! loop is recorded into it, across all sources and files, and it renders the
//! one-line status that the console overwrites in place.

use std::io::Write;
use std::time::{Duration, Instant};

/// Label of the file being copied is cut to this many characters.
pub const LABEL_MAX_CHARS: usize = 40;

/// Rendered lines are padded to this width so shorter lines fully overwrite longer ones.
pub const LINE_WIDTH: usize = 120;

pub const DEFAULT_RENDER_DELAY: Duration = Duration::from_millis(100);

/// Human-readable size, base 1024 with one decimal: `10.0 B`, `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    for unit in &UNITS[..UNITS.len() - 1] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} {}", size, UNITS[UNITS.len() - 1])
}

/// `H:MM:SS` when at least one hour is left, `MM:SS` otherwise, `--:--` when unknown.
pub fn format_eta(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "--:--".to_string();
    }
    let seconds = seconds.max(0.0) as u64;
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

fn truncate_label(label: &str) -> &str {
    match label.char_indices().nth(LABEL_MAX_CHARS) {
        Some((index, _)) => &label[..index],
        None => label,
    }
}

/// Point-in-time view of a [`ProgressState`]
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub copied_bytes: u64,
    pub total_bytes: u64,
    pub elapsed: Duration,
}

impl Snapshot {
    /// Bytes per second since the start, 0 before any time has passed.
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed > 0.0 {
            self.copied_bytes as f64 / elapsed
        } else {
            0.0
        }
    }
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.copied_bytes as f64 / self.total_bytes as f64 * 100.0
    }
    /// Seconds left at the current average rate; infinite when the rate is unknown.
    pub fn eta_seconds(&self) -> f64 {
        let speed = self.throughput();
        if speed > 0.0 {
            self.total_bytes.saturating_sub(self.copied_bytes) as f64 / speed
        } else {
            f64::INFINITY
        }
    }
    pub fn format_line(&self, label: &str) -> String {
        format!(
            "Overall {:6.2}%  {} / {}  | {}/s  | ETA {}  | current: {}",
            self.percent(),
            format_size(self.copied_bytes),
            format_size(self.total_bytes),
            format_size(self.throughput() as u64),
            format_eta(self.eta_seconds()),
            truncate_label(label),
        )
    }
}

/// Run-scoped progress accumulator with render throttling
#[derive(Debug)]
pub struct ProgressState {
    total_bytes: u64,
    copied_bytes: u64,
    start_time: Instant,
    last_render: Option<Instant>,
    delay: Duration,
}

impl ProgressState {
    pub fn new(total_bytes: u64, delay: Duration) -> Self {
        Self::started_at(total_bytes, delay, Instant::now())
    }
    pub fn started_at(total_bytes: u64, delay: Duration, start_time: Instant) -> Self {
        Self {
            total_bytes,
            copied_bytes: 0,
            start_time,
            last_render: None,
            delay,
        }
    }
    /// Add bytes that were just written. The running total never decreases.
    pub fn record(&mut self, bytes: u64) {
        self.copied_bytes = self.copied_bytes.saturating_add(bytes);
    }
    pub fn copied_bytes(&self) -> u64 {
        self.copied_bytes
    }
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
    pub fn snapshot_at(&self, now: Instant) -> Snapshot {
        Snapshot {
            copied_bytes: self.copied_bytes,
            total_bytes: self.total_bytes,
            elapsed: now.saturating_duration_since(self.start_time),
        }
    }
    /// Status line, or `None` when the previous line is younger than the render delay.
    pub fn render(&mut self, label: &str) -> Option<String> {
        self.render_at(label, Instant::now())
    }
    pub fn render_at(&mut self, label: &str, now: Instant) -> Option<String> {
        if let Some(last) = self.last_render {
            if now.saturating_duration_since(last) < self.delay {
                return None;
            }
        }
        Some(self.render_forced_at(label, now))
    }
    /// Status line regardless of throttling, used for the final state of a run.
    pub fn render_forced(&mut self, label: &str) -> String {
        self.render_forced_at(label, Instant::now())
    }
    fn render_forced_at(&mut self, label: &str, now: Instant) -> String {
        self.last_render = Some(now);
        self.snapshot_at(now).format_line(label)
    }
}

/// Receives the size of every chunk as soon as it is written.
pub trait ChunkObserver {
    fn on_chunk_copied(&mut self, bytes: u64);
}

/// Forwards chunks into a [`ProgressState`] and prints the throttled status line.
pub struct ProgressPrinter<'a, W: Write> {
    state: &'a mut ProgressState,
    out: &'a mut W,
    enabled: bool,
    label: String,
    printed: bool,
}

impl<'a, W: Write> ProgressPrinter<'a, W> {
    pub fn new(state: &'a mut ProgressState, out: &'a mut W, enabled: bool) -> Self {
        Self {
            state,
            out,
            enabled,
            label: String::new(),
            printed: false,
        }
    }
    /// Set the label shown for the following chunks.
    pub fn set_label(&mut self, label: String) {
        self.label = label;
    }
    /// True once at least one status line was written.
    pub fn printed(&self) -> bool {
        self.printed
    }
    pub fn state(&self) -> &ProgressState {
        &*self.state
    }
    fn write_line(&mut self, line: &str) {
        let res = write!(self.out, "\r{:<width$}", line, width = LINE_WIDTH)
            .and_then(|_| self.out.flush());
        match res {
            Ok(()) => self.printed = true,
            Err(error) => tracing::debug!("failed writing progress line: {}", error),
        }
    }
    /// Print the final state, bypassing the throttle.
    pub fn finish(&mut self) {
        if !self.enabled {
            return;
        }
        let line = self.state.render_forced(&self.label);
        self.write_line(&line);
    }
}

impl<W: Write> ChunkObserver for ProgressPrinter<'_, W> {
    fn on_chunk_copied(&mut self, bytes: u64) {
        self.state.record(bytes);
        if !self.enabled {
            return;
        }
        if let Some(line) = self.state.render(&self.label) {
            self.write_line(&line);
        }
    }
}
