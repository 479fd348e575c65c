//! Configuration types for output and progress reporting

use std::time::Duration;

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
}

impl OutputConfig {
    /// Filter directive for the tracing subscriber
    pub fn log_directive(&self) -> &'static str {
        if self.quiet {
            return "off";
        }
        match self.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Progress line configuration
#[derive(Debug, Clone, Copy)]
pub struct ProgressConfig {
    /// Print the overwritten progress line while copying
    pub enabled: bool,
    /// Minimum time between two progress lines
    pub delay: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: crate::progress::DEFAULT_RENDER_DELAY,
        }
    }
}
