use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

mod picker;

use picker::{DirectoryPicker, PromptPicker};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rbak",
    version,
    about = "Copy a project while skipping venvs, __pycache__, and .pyc files",
    long_about = "`rbak` copies one or more project directories into new directories under a destination parent, skipping virtual environments, caches, bytecode and other generated artifacts.

An existing directory is never written into: when the name is taken, `-copy-1`, `-copy-2`, ... suffixes are tried until a free one is found.

When --source or --dest is missing, the paths are asked for on stdin.

EXAMPLES:
    # Back up one project
    rbak -s ~/work/project -d /mnt/backup

    # Back up two projects, keeping .env files
    rbak -s ~/work/api -s ~/work/web -d /mnt/backup --include-dotenv

    # Show where things would go without copying
    rbak -s ~/work/project -d /mnt/backup --dry-run"
)]
struct Args {
    // Paths
    /// Source folder to copy (repeat this flag to add multiple)
    #[arg(short, long = "source", value_name = "PATH", help_heading = "Paths")]
    source: Vec<PathBuf>,

    /// Destination parent folder (e.g., a drive or directory)
    #[arg(short, long, value_name = "PATH", help_heading = "Paths")]
    dest: Option<PathBuf>,

    /// Name of the new folder at the destination (single source only)
    #[arg(long, value_name = "NAME", help_heading = "Paths")]
    name: Option<String>,

    // Filtering
    /// Include .env files instead of excluding them
    #[arg(long, help_heading = "Filtering")]
    include_dotenv: bool,

    /// Additional name glob to ignore (can repeat)
    #[arg(long, value_name = "GLOB", help_heading = "Filtering")]
    extra_ignore: Vec<String>,

    /// Read additional name globs to ignore from a file, one per line, '#' starts a comment
    #[arg(long, value_name = "PATH", help_heading = "Filtering")]
    ignore_file: Option<PathBuf>,

    // Copy options
    /// Scan and print where each source would be copied, without copying anything
    #[arg(long, help_heading = "Copy options")]
    dry_run: bool,

    /// Read/write block size. Accepts suffixes like "64KiB", "1MiB"
    #[arg(
        long,
        default_value = "1MiB",
        value_name = "SIZE",
        help_heading = "Copy options"
    )]
    chunk_size: bytesize::ByteSize,

    // Progress & output
    /// Minimum delay between progress updates. Accepts human-readable durations like "100ms", "1s"
    #[arg(
        long,
        default_value = "100ms",
        value_name = "DELAY",
        help_heading = "Progress & output"
    )]
    progress_delay: humantime::Duration,

    /// Do not print the progress line
    #[arg(long, help_heading = "Progress & output")]
    no_progress: bool,

    /// Verbose level (implies summary): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,
}

fn ignore_settings(args: &Args) -> Result<common::ignore::Settings, common::Error> {
    let mut settings = common::ignore::Settings {
        include_dotenv: args.include_dotenv,
        ..Default::default()
    };
    for pattern in &args.extra_ignore {
        settings
            .add_extra_glob(pattern)
            .with_context(|| format!("invalid --extra-ignore value {:?}", pattern))
            .map_err(common::Error::InvalidPattern)?;
    }
    if let Some(path) = &args.ignore_file {
        settings
            .extend_from_file(path)
            .map_err(common::Error::InvalidPattern)?;
    }
    Ok(settings)
}

fn copy_settings(args: &Args) -> Result<common::copy::Settings, common::Error> {
    if args.chunk_size.as_u64() == 0 {
        return Err(common::Error::InvalidSetting(
            "--chunk-size must be greater than zero".to_string(),
        ));
    }
    Ok(common::copy::Settings {
        name: args.name.clone(),
        chunk_size: args.chunk_size.as_u64(),
        progress: common::ProgressConfig {
            enabled: !args.no_progress,
            delay: *args.progress_delay,
        },
        dry_run: args.dry_run,
    })
}

#[instrument(skip(args))]
async fn async_main(
    args: Args,
    sources: Vec<PathBuf>,
    dest_parent: PathBuf,
) -> Result<common::copy::Outcome, common::Error> {
    let ignore = ignore_settings(&args)?;
    let settings = copy_settings(&args)?;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }
    let mut stdout = std::io::stdout();
    let outcome = common::copy::copy_many(
        &sources,
        &dest_parent,
        &ignore,
        &settings,
        &cancel,
        &mut stdout,
    )
    .await?;
    if let common::copy::Outcome::Completed(summary) = &outcome {
        tracing::info!("{}", summary);
    }
    Ok(outcome)
}

/// Use the paths from the command line, asking for the missing ones.
fn resolve_paths(
    args: &Args,
    picker: &mut impl DirectoryPicker,
) -> anyhow::Result<(Vec<PathBuf>, PathBuf)> {
    let sources = if args.source.is_empty() {
        match picker.pick_sources()? {
            Some(sources) => sources,
            None => {
                println!("No source folders selected.");
                std::process::exit(1);
            }
        }
    } else {
        args.source.clone()
    };
    let dest_parent = match &args.dest {
        Some(dest) => dest.clone(),
        None => match picker.pick_destination()? {
            Some(dest) => dest,
            None => {
                println!("No directory selected.");
                std::process::exit(1);
            }
        },
    };
    Ok((sources, dest_parent))
}

/// Line printed on stdout for an outcome that is not reported as an error.
fn outcome_message(error: &common::Error) -> Option<String> {
    // the engine already ended any progress line
    error.is_cancelled().then(|| format!("{}.", error))
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let (sources, dest_parent) = resolve_paths(&args, &mut PromptPicker::stdio())?;
    let func = {
        let args = args.clone();
        || async_main(args, sources, dest_parent)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
    };
    if let Err(error) = common::run(output, func) {
        if let Some(message) = outcome_message(&error) {
            println!("{}", message);
        }
        std::process::exit(error.exit_code());
    }
    Ok(())
}
