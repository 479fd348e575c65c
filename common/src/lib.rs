//! Common library for the `rbak` directory backup tool
//!
//! The engine copies one or more project directories into fresh directories under a
//! destination parent, skipping virtual environments, caches and bytecode, and reports
//! aggregate progress while it streams file contents.
//!
//! # Modules
//!
//! - [`ignore`] - which entries are skipped
//! - [`scan`] - totals of what would be copied
//! - [`destination`] - output directory naming and safety checks
//! - [`progress`] - the throttled status line
//! - [`copy`] - the run itself
//! - [`preserve`] - timestamps and permissions of copied files
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), common::Error> {
//! let sources = vec![std::path::PathBuf::from("/work/project")];
//! let cancel = tokio_util::sync::CancellationToken::new();
//! let outcome = common::copy::copy_many(
//!     &sources,
//!     std::path::Path::new("/backups"),
//!     &common::ignore::Settings::default(),
//!     &common::copy::Settings::default(),
//!     &cancel,
//!     &mut std::io::stdout(),
//! )
//! .await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod copy;
pub mod destination;
pub mod error;
pub mod ignore;
pub mod preserve;
pub mod progress;
pub mod scan;

#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, ProgressConfig};
pub use error::Error;

use std::future::Future;
use std::io::IsTerminal;

fn init_tracing(output: &OutputConfig) {
    let filter = tracing_subscriber::EnvFilter::new(output.log_directive());
    let res = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .try_init();
    if let Err(error) = res {
        // only happens when a subscriber was already installed, e.g. in tests
        eprintln!("tracing subscriber not installed: {}", error);
    }
}

/// Install logging, build a single-threaded runtime and drive `func` to completion.
///
/// A failure is logged as one line; cancellation is left for the caller to report since
/// it is not a failure. The caller decides on the exit code.
pub fn run<T, Fut>(output: OutputConfig, func: impl FnOnce() -> Fut) -> Result<T, Error>
where
    Fut: Future<Output = Result<T, Error>>,
{
    init_tracing(&output);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Runtime)?;
    let res = runtime.block_on(func());
    match &res {
        Err(error) if error.is_cancelled() => tracing::debug!("run cancelled"),
        Err(error) => tracing::error!("{}", error),
        Ok(_) => {}
    }
    res
}
