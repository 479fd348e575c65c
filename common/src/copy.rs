//! Multi-source copy engine
//!
//! A run goes through these phases, each aborting the whole run on failure:
//!
//! 1. validating - destination parent and every source must be existing directories, the
//!    ignore patterns must compile and the name override must be a plain name
//! 2. scanning - every source is scanned with the same ignore rules to get the grand totals
//! 3. copying - sources are copied one after another into their own fresh directory under
//!    the destination parent, each file streamed in chunks and reported to one shared
//!    [`ProgressState`]
//! 4. finalizing - the progress line is terminated and the destination is reported
//!
//! Outputs of sources that finished before a failure or cancellation are left in place.

use anyhow::Context;
use std::collections::HashSet;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::ProgressConfig;
use crate::destination;
use crate::error::Error;
use crate::ignore::{self, IgnoreRules};
use crate::preserve;
use crate::progress::{ChunkObserver, ProgressPrinter, ProgressState, format_size};
use crate::scan::{self, Totals};

pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Name of the output directory, only honored when a single source is copied
    pub name: Option<String>,
    /// Read/write block size for streaming file contents
    pub chunk_size: u64,
    pub progress: ProgressConfig,
    /// Scan and resolve destinations without creating anything
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: ProgressConfig::default(),
            dry_run: false,
        }
    }
}

/// Phase of a copy run, see the module documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Scanning,
    Copying(usize),
    Finalizing,
}

/// Scan result and chosen destination of one source
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub source: PathBuf,
    pub totals: Totals,
    pub destination: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub bytes_copied: u64,
    pub files_copied: u64,
    pub directories_created: u64,
    /// Output directory of every source, in source order
    pub destinations: Vec<PathBuf>,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes copied: {}\n\
            files copied: {}\n\
            directories created: {}",
            format_size(self.bytes_copied),
            self.files_copied,
            self.directories_created,
        )?;
        for destination in &self.destinations {
            write!(f, "\ndestination: {}", destination.display())?;
        }
        Ok(())
    }
}

/// Successful end of a run
#[derive(Debug)]
pub enum Outcome {
    /// Everything was filtered out or all sources are empty; nothing was created
    NothingToCopy,
    /// Dry run: what would have been copied, and where
    Planned(Vec<SourcePlan>),
    Completed(Summary),
}

fn enter(phase: Phase) {
    tracing::debug!("entering phase {:?}", phase);
}

fn write_out<W: Write>(out: &mut W, args: std::fmt::Arguments) -> Result<(), Error> {
    out.write_fmt(args)
        .and_then(|_| out.flush())
        .map_err(Error::Output)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|md| md.is_dir())
        .unwrap_or(false)
}

async fn validate_inputs(
    sources: &[PathBuf],
    dest_parent: &Path,
    settings: &Settings,
) -> Result<(), Error> {
    if sources.is_empty() {
        return Err(Error::NoSources);
    }
    if !is_dir(dest_parent).await {
        return Err(Error::DestinationParentMissing(dest_parent.to_path_buf()));
    }
    for source in sources {
        if !is_dir(source).await {
            return Err(Error::SourceMissing(source.to_path_buf()));
        }
    }
    // the override is ignored for multiple sources, so it does not need to be valid either
    if let (Some(name), 1) = (&settings.name, sources.len()) {
        destination::validate_name(name)?;
    }
    Ok(())
}

/// Copy every source into its own new directory under `dest_parent`.
///
/// Skips whatever `ignore` excludes, reports progress to `out` and stops between chunks
/// once `cancel` is triggered, returning [`Error::Cancelled`].
#[instrument(skip(ignore, settings, cancel, out))]
pub async fn copy_many<W: Write + Send>(
    sources: &[PathBuf],
    dest_parent: &Path,
    ignore: &ignore::Settings,
    settings: &Settings,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<Outcome, Error> {
    enter(Phase::Validating);
    validate_inputs(sources, dest_parent, settings).await?;
    let rules = IgnoreRules::new(ignore)?;
    if settings.name.is_some() && sources.len() != 1 {
        write_out(
            out,
            format_args!("Note: the destination name is ignored when copying multiple sources.\n"),
        )?;
    }
    // every source name must be usable before anything gets created
    let mut names: Vec<OsString> = Vec::with_capacity(sources.len());
    for source in sources {
        names.push(
            destination::desired_name(source, settings.name.as_deref(), sources.len()).await?,
        );
    }

    enter(Phase::Scanning);
    let mut plans = Vec::with_capacity(sources.len());
    for source in sources {
        let totals = scan::scan(source, &rules, cancel).await?;
        plans.push(SourcePlan {
            source: source.clone(),
            totals,
            destination: None,
        });
    }
    let grand_totals: Totals = plans.iter().map(|plan| plan.totals).sum();
    if grand_totals.bytes == 0 {
        write_out(
            out,
            format_args!("Nothing to copy after applying ignore rules.\n"),
        )?;
        return Ok(Outcome::NothingToCopy);
    }
    write_out(
        out,
        format_args!(
            "Sources: {} | Files: {} | Size: {}\n\
            Skipping virtual environments, __pycache__, and Python bytecode.\n",
            sources.len(),
            grand_totals.files,
            format_size(grand_totals.bytes)
        ),
    )?;

    if settings.dry_run {
        // nothing gets created, so earlier plans must block their names explicitly
        let mut planned = HashSet::new();
        for (plan, name) in plans.iter_mut().zip(&names) {
            let dst = destination::unique_destination(dest_parent, name, &planned)
                .await
                .with_context(|| format!("failed probing destination names in {:?}", dest_parent))
                .map_err(Error::CopyFailed)?;
            destination::validate(&plan.source, &dst).await?;
            planned.insert(dst.clone());
            write_out(
                out,
                format_args!(
                    "{} -> {} ({} files, {})\n",
                    plan.source.display(),
                    dst.display(),
                    plan.totals.files,
                    format_size(plan.totals.bytes)
                ),
            )?;
            plan.destination = Some(dst);
        }
        return Ok(Outcome::Planned(plans));
    }

    let mut state = ProgressState::new(grand_totals.bytes, settings.progress.delay);
    let mut printer = ProgressPrinter::new(&mut state, out, settings.progress.enabled);
    let mut summary = Summary::default();
    let res = copy_sources(
        &plans,
        &names,
        dest_parent,
        &rules,
        settings,
        cancel,
        &mut printer,
        &mut summary,
    )
    .await;
    if res.is_ok() {
        printer.finish();
    }
    let printed = printer.printed();
    drop(printer);
    if let Err(error) = res {
        // leave the progress line before the error gets reported
        if printed {
            write_out(out, format_args!("\n"))?;
        }
        return Err(error);
    }

    enter(Phase::Finalizing);
    summary.bytes_copied = state.copied_bytes();
    if printed {
        write_out(out, format_args!("\n"))?;
    }
    write_out(
        out,
        format_args!("Done.\nBackups located under: {}\n", dest_parent.display()),
    )?;
    Ok(Outcome::Completed(summary))
}

#[allow(clippy::too_many_arguments)]
async fn copy_sources<W: Write + Send>(
    plans: &[SourcePlan],
    names: &[OsString],
    dest_parent: &Path,
    rules: &IgnoreRules,
    settings: &Settings,
    cancel: &CancellationToken,
    printer: &mut ProgressPrinter<'_, W>,
    summary: &mut Summary,
) -> Result<(), Error> {
    let none = HashSet::new();
    for (index, (plan, name)) in plans.iter().zip(names).enumerate() {
        enter(Phase::Copying(index));
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let dst = destination::unique_destination(dest_parent, name, &none)
            .await
            .with_context(|| format!("failed probing destination names in {:?}", dest_parent))
            .map_err(Error::CopyFailed)?;
        destination::validate(&plan.source, &dst).await?;
        tracing::info!("copying {:?} -> {:?}", plan.source, dst);
        copy_tree(&plan.source, &dst, rules, settings, cancel, printer, summary).await?;
        summary.destinations.push(dst);
    }
    Ok(())
}

/// Pre-order copy of one source tree, pruned the same way as [`scan::scan`].
async fn copy_tree<W: Write + Send>(
    src_root: &Path,
    dst_root: &Path,
    rules: &IgnoreRules,
    settings: &Settings,
    cancel: &CancellationToken,
    printer: &mut ProgressPrinter<'_, W>,
    summary: &mut Summary,
) -> Result<(), Error> {
    let source_name = destination::desired_name(src_root, None, 1)
        .await?
        .to_string_lossy()
        .into_owned();
    let mut pending = vec![(src_root.to_path_buf(), dst_root.to_path_buf())];
    while let Some((src_dir, dst_dir)) = pending.pop() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let listing = match scan::list_dir(&src_dir, rules).await {
            Ok(listing) => listing,
            Err(error) => {
                // the scan left this directory out of the totals as well
                tracing::warn!("cannot list {:?}, skipping it: {}", src_dir, error);
                continue;
            }
        };
        tokio::fs::create_dir_all(&dst_dir)
            .await
            .with_context(|| format!("cannot create directory {:?}", dst_dir))
            .map_err(Error::CopyFailed)?;
        summary.directories_created += 1;
        for name in &listing.files {
            let src_file = src_dir.join(name);
            let dst_file = dst_dir.join(name);
            let relative = src_file.strip_prefix(src_root).unwrap_or(&src_file);
            printer.set_label(format!("{}/{}", source_name, relative.to_string_lossy()));
            copy_file(&src_file, &dst_file, settings.chunk_size, cancel, printer).await?;
            summary.files_copied += 1;
        }
        // reversed so that the first subdirectory is popped first
        for name in listing.dirs.iter().rev() {
            pending.push((src_dir.join(name), dst_dir.join(name)));
        }
    }
    Ok(())
}

/// Stream `src` into a new file `dst` in `chunk_size` blocks, reporting every block.
///
/// Metadata is copied afterwards on a best-effort basis.
#[instrument(skip(cancel, observer))]
pub async fn copy_file<O: ChunkObserver + Send>(
    src: &Path,
    dst: &Path,
    chunk_size: u64,
    cancel: &CancellationToken,
    observer: &mut O,
) -> Result<u64, Error> {
    let mut reader = tokio::fs::File::open(src)
        .await
        .with_context(|| format!("failed opening {:?} for reading", src))
        .map_err(Error::CopyFailed)?;
    let mut writer = tokio::fs::File::create(dst)
        .await
        .with_context(|| format!("failed opening {:?} for writing", dst))
        .map_err(Error::CopyFailed)?;
    let mut buffer = vec![0u8; chunk_size.max(1) as usize];
    let mut copied: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let n = reader
            .read(&mut buffer)
            .await
            .with_context(|| format!("failed reading from {:?}", src))
            .map_err(Error::CopyFailed)?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buffer[..n])
            .await
            .with_context(|| format!("failed writing to {:?}", dst))
            .map_err(Error::CopyFailed)?;
        copied += n as u64;
        observer.on_chunk_copied(n as u64);
    }
    // tokio completes writes in the background, wait for them before touching metadata
    writer
        .flush()
        .await
        .with_context(|| format!("failed writing to {:?}", dst))
        .map_err(Error::CopyFailed)?;
    drop(writer);
    if let Err(error) = preserve::set_file_metadata(src, dst).await {
        tracing::warn!("failed preserving metadata of {:?}: {:#}", dst, error);
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils;

    fn quiet_settings() -> Settings {
        Settings {
            progress: ProgressConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn run(
        sources: &[PathBuf],
        dest_parent: &Path,
        settings: &Settings,
    ) -> (Result<Outcome, Error>, String) {
        let mut out = Vec::new();
        let res = copy_many(
            sources,
            dest_parent,
            &ignore::Settings::default(),
            settings,
            &CancellationToken::new(),
            &mut out,
        )
        .await;
        (res, String::from_utf8(out).unwrap())
    }

    fn read_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn basic_copy_single_file() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("proj");
        let parent = tmp.path().join("backups");
        std::fs::create_dir(&src).unwrap();
        std::fs::create_dir(&parent).unwrap();
        std::fs::write(src.join("data.txt"), "0123456789").unwrap();
        let (res, out) = run(&[src.clone()], &parent, &Settings::default()).await;
        let Outcome::Completed(summary) = res.unwrap() else {
            panic!("expected a completed run");
        };
        assert_eq!(read_names(&parent), vec!["proj"]);
        assert_eq!(read_names(&parent.join("proj")), vec!["data.txt"]);
        assert_eq!(std::fs::metadata(parent.join("proj/data.txt")).unwrap().len(), 10);
        assert_eq!(summary.bytes_copied, 10);
        assert_eq!(summary.files_copied, 1);
        assert_eq!(summary.destinations, vec![parent.join("proj")]);
        assert!(out.contains("Sources: 1 | Files: 1 | Size: 10.0 B"));
        let last_line = out.rsplit('\r').next().unwrap();
        assert!(last_line.starts_with("Overall 100.00%  10.0 B / 10.0 B"), "{out}");
        assert!(out.contains("current: proj/data.txt"));
        assert!(out.ends_with(&format!("Done.\nBackups located under: {}\n", parent.display())));
    }

    #[tokio::test]
    async fn copy_applies_ignore_rules_and_matches_scan() {
        let tmp = testutils::setup_project_dir();
        let src = tmp.path().join("project");
        let parent = tmp.path().join("out");
        std::fs::create_dir(&parent).unwrap();
        let (res, _) = run(&[src.clone()], &parent, &quiet_settings()).await;
        let Outcome::Completed(summary) = res.unwrap() else {
            panic!("expected a completed run");
        };
        let dst = parent.join("project");
        assert_eq!(read_names(&dst), vec!["README.md", "main.py", "pkg"]);
        assert_eq!(read_names(&dst.join("pkg")), vec!["util.py"]);
        assert_eq!(
            std::fs::read_to_string(dst.join("pkg/util.py")).unwrap(),
            testutils::UTIL_PY
        );
        assert_eq!(summary.bytes_copied, testutils::PROJECT_TOTALS.bytes);
        assert_eq!(summary.files_copied, testutils::PROJECT_TOTALS.files);
        assert_eq!(summary.directories_created, 2);
    }

    #[tokio::test]
    async fn nothing_to_copy_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let parent = tmp.path().join("out");
        std::fs::create_dir_all(src.join("__pycache__")).unwrap();
        std::fs::write(src.join("__pycache__").join("a.cpython-312.pyc"), "x").unwrap();
        std::fs::write(src.join("a.pyc"), "bytecode").unwrap();
        std::fs::create_dir(&parent).unwrap();
        let (res, out) = run(&[src], &parent, &Settings::default()).await;
        assert!(matches!(res.unwrap(), Outcome::NothingToCopy));
        assert!(out.contains("Nothing to copy after applying ignore rules."));
        assert!(read_names(&parent).is_empty());
    }

    #[tokio::test]
    async fn second_run_gets_copy_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("proj");
        let parent = tmp.path().join("out");
        std::fs::create_dir(&src).unwrap();
        std::fs::create_dir(&parent).unwrap();
        std::fs::write(src.join("a.txt"), "first").unwrap();
        run(&[src.clone()], &parent, &quiet_settings()).await.0.unwrap();
        std::fs::write(src.join("a.txt"), "second").unwrap();
        run(&[src.clone()], &parent, &quiet_settings()).await.0.unwrap();
        assert_eq!(read_names(&parent), vec!["proj", "proj-copy-1"]);
        assert_eq!(std::fs::read_to_string(parent.join("proj/a.txt")).unwrap(), "first");
        assert_eq!(
            std::fs::read_to_string(parent.join("proj-copy-1/a.txt")).unwrap(),
            "second"
        );
    }

    #[tokio::test]
    async fn name_override_single_source() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("proj");
        let parent = tmp.path().join("out");
        std::fs::create_dir(&src).unwrap();
        std::fs::create_dir(&parent).unwrap();
        std::fs::write(src.join("a.txt"), "abc").unwrap();
        let settings = Settings {
            name: Some("snapshot".to_string()),
            ..quiet_settings()
        };
        run(&[src], &parent, &settings).await.0.unwrap();
        assert_eq!(read_names(&parent), vec!["snapshot"]);
    }

    #[tokio::test]
    async fn name_override_ignored_for_multiple_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        let parent = tmp.path().join("out");
        for dir in [&first, &second, &parent] {
            std::fs::create_dir(dir).unwrap();
        }
        std::fs::write(first.join("a.txt"), "aaaa").unwrap();
        std::fs::write(second.join("b.txt"), "bb").unwrap();
        let settings = Settings {
            name: Some("snapshot".to_string()),
            ..quiet_settings()
        };
        let (res, out) = run(&[first, second], &parent, &settings).await;
        let Outcome::Completed(summary) = res.unwrap() else {
            panic!("expected a completed run");
        };
        assert!(out.contains("Note: the destination name is ignored"));
        assert!(out.contains("Sources: 2 | Files: 2 | Size: 6.0 B"));
        assert_eq!(read_names(&parent), vec!["first", "second"]);
        assert_eq!(summary.bytes_copied, 6);
    }

    #[tokio::test]
    async fn missing_destination_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        std::fs::write(src.join("a.txt"), "abc").unwrap();
        let (res, _) = run(&[src], &tmp.path().join("missing"), &quiet_settings()).await;
        assert!(matches!(res, Err(Error::DestinationParentMissing(_))));
    }

    #[tokio::test]
    async fn missing_source_fails_before_any_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good");
        let parent = tmp.path().join("out");
        std::fs::create_dir(&good).unwrap();
        std::fs::create_dir(&parent).unwrap();
        std::fs::write(good.join("a.txt"), "abc").unwrap();
        let (res, _) = run(
            &[good, tmp.path().join("missing")],
            &parent,
            &quiet_settings(),
        )
        .await;
        assert!(matches!(res, Err(Error::SourceMissing(_))));
        assert!(read_names(&parent).is_empty());
        let (res, _) = run(&[], &parent, &quiet_settings()).await;
        assert!(matches!(res, Err(Error::NoSources)));
    }

    #[tokio::test]
    async fn destination_inside_source_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("backups")).unwrap();
        std::fs::write(src.join("a.txt"), "abc").unwrap();
        let (res, _) = run(&[src.clone()], &src.join("backups"), &quiet_settings()).await;
        assert!(matches!(res, Err(Error::DestinationInsideSource { .. })));
        assert!(read_names(&src.join("backups")).is_empty());
    }

    #[tokio::test]
    async fn earlier_sources_are_kept_on_safety_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let parent = tmp.path().join("parent");
        let first = tmp.path().join("first");
        std::fs::create_dir_all(&parent).unwrap();
        std::fs::create_dir(&first).unwrap();
        std::fs::write(first.join("a.txt"), "abc").unwrap();
        std::fs::write(parent.join("b.txt"), "def").unwrap();
        // the second source is the destination parent itself
        let (res, _) = run(&[first, parent.clone()], &parent, &quiet_settings()).await;
        assert!(matches!(res, Err(Error::DestinationInsideSource { .. })));
        assert_eq!(read_names(&parent), vec!["b.txt", "first"]);
    }

    #[tokio::test]
    async fn cancellation_is_distinct_from_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let parent = tmp.path().join("out");
        std::fs::create_dir(&src).unwrap();
        std::fs::create_dir(&parent).unwrap();
        std::fs::write(src.join("a.txt"), "abc").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut out = Vec::new();
        let res = copy_many(
            &[src],
            &parent,
            &ignore::Settings::default(),
            &quiet_settings(),
            &cancel,
            &mut out,
        )
        .await;
        let error = res.unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(error.exit_code(), 8);
    }

    struct CancelAfterFirstChunk {
        cancel: CancellationToken,
        chunks: usize,
    }

    impl ChunkObserver for CancelAfterFirstChunk {
        fn on_chunk_copied(&mut self, _bytes: u64) {
            self.chunks += 1;
            self.cancel.cancel();
        }
    }

    #[tokio::test]
    async fn copy_file_stops_between_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("big.bin");
        let dst = tmp.path().join("copy.bin");
        std::fs::write(&src, vec![1u8; 64]).unwrap();
        let mut observer = CancelAfterFirstChunk {
            cancel: CancellationToken::new(),
            chunks: 0,
        };
        let cancel = observer.cancel.clone();
        let res = copy_file(&src, &dst, 16, &cancel, &mut observer).await;
        assert!(matches!(res, Err(Error::Cancelled)));
        assert_eq!(observer.chunks, 1);
        // partial output stays in place
        assert!(dst.exists());
    }

    struct CountingObserver(Vec<u64>);

    impl ChunkObserver for CountingObserver {
        fn on_chunk_copied(&mut self, bytes: u64) {
            self.0.push(bytes);
        }
    }

    #[tokio::test]
    async fn copy_file_reports_every_chunk_and_keeps_mtime() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("data.bin");
        let dst = tmp.path().join("copy.bin");
        let data: Vec<u8> = (0..100u8).collect();
        std::fs::write(&src, &data).unwrap();
        let mtime = filetime::FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&src, mtime).unwrap();
        let mut observer = CountingObserver(Vec::new());
        let copied = copy_file(&src, &dst, 32, &CancellationToken::new(), &mut observer)
            .await
            .unwrap();
        assert_eq!(copied, 100);
        assert_eq!(observer.0.iter().sum::<u64>(), 100);
        assert!(observer.0.iter().all(|n| *n <= 32));
        assert_eq!(std::fs::read(&dst).unwrap(), data);
        let dst_md = std::fs::metadata(&dst).unwrap();
        assert_eq!(filetime::FileTime::from_last_modification_time(&dst_md), mtime);
    }

    #[tokio::test]
    async fn vanished_file_fails_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("gone.txt");
        let dst = tmp.path().join("copy.txt");
        let res = copy_file(
            &src,
            &dst,
            DEFAULT_CHUNK_SIZE,
            &CancellationToken::new(),
            &mut CountingObserver(Vec::new()),
        )
        .await;
        let error = res.unwrap_err();
        assert!(matches!(error, Error::CopyFailed(_)));
        assert!(error.to_string().contains("gone.txt"));
    }

    #[tokio::test]
    async fn dry_run_creates_nothing() {
        let tmp = testutils::setup_project_dir();
        let src = tmp.path().join("project");
        let parent = tmp.path().join("out");
        std::fs::create_dir(&parent).unwrap();
        std::fs::create_dir(parent.join("project")).unwrap();
        let settings = Settings {
            dry_run: true,
            ..quiet_settings()
        };
        let (res, out) = run(&[src.clone()], &parent, &settings).await;
        let Outcome::Planned(plans) = res.unwrap() else {
            panic!("expected a plan");
        };
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].totals, testutils::PROJECT_TOTALS);
        assert_eq!(plans[0].destination, Some(parent.join("project-copy-1")));
        assert!(out.contains("project-copy-1 (3 files"));
        assert_eq!(read_names(&parent), vec!["project"]);
    }

    #[tokio::test]
    async fn dry_run_plan_matches_real_run_for_same_names() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("a").join("proj");
        let second = tmp.path().join("b").join("proj");
        let parent = tmp.path().join("out");
        for (dir, content) in [(&first, "first"), (&second, "second")] {
            std::fs::create_dir_all(dir).unwrap();
            std::fs::write(dir.join("a.txt"), content).unwrap();
        }
        std::fs::create_dir(&parent).unwrap();
        let sources = vec![first, second];
        let settings = Settings {
            dry_run: true,
            ..quiet_settings()
        };
        let (res, _) = run(&sources, &parent, &settings).await;
        let Outcome::Planned(plans) = res.unwrap() else {
            panic!("expected a plan");
        };
        let planned: Vec<PathBuf> = plans
            .into_iter()
            .map(|plan| plan.destination.unwrap())
            .collect();
        assert!(read_names(&parent).is_empty());
        let (res, _) = run(&sources, &parent, &quiet_settings()).await;
        let Outcome::Completed(summary) = res.unwrap() else {
            panic!("expected a completed run");
        };
        assert_eq!(planned, summary.destinations);
        assert_eq!(
            planned,
            vec![parent.join("proj"), parent.join("proj-copy-1")]
        );
    }

    #[tokio::test]
    async fn no_blank_line_without_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("proj");
        let parent = tmp.path().join("out");
        std::fs::create_dir(&src).unwrap();
        std::fs::create_dir(&parent).unwrap();
        std::fs::write(src.join("a.txt"), "abc").unwrap();
        let (res, out) = run(&[src], &parent, &quiet_settings()).await;
        res.unwrap();
        assert!(!out.contains('\r'));
        assert!(!out.contains("\n\n"), "{out:?}");
        assert!(out.contains("Python bytecode.\nDone.\n"), "{out:?}");
    }

    #[tokio::test]
    async fn invalid_name_is_ignored_for_multiple_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        let parent = tmp.path().join("out");
        for dir in [&first, &second, &parent] {
            std::fs::create_dir(dir).unwrap();
        }
        std::fs::write(first.join("a.txt"), "a").unwrap();
        std::fs::write(second.join("b.txt"), "b").unwrap();
        let settings = Settings {
            name: Some("../escape".to_string()),
            ..quiet_settings()
        };
        let (res, _) = run(&[first.clone(), second], &parent, &settings).await;
        assert!(matches!(res.unwrap(), Outcome::Completed(_)));
        assert_eq!(read_names(&parent), vec!["first", "second"]);
        // a single source still rejects it
        let (res, _) = run(&[first], &parent, &settings).await;
        assert!(matches!(res, Err(Error::InvalidName(_))));
    }

    #[test]
    fn summary_display() {
        let summary = Summary {
            bytes_copied: 2048,
            files_copied: 3,
            directories_created: 2,
            destinations: vec![PathBuf::from("/backups/proj")],
        };
        assert_eq!(
            summary.to_string(),
            "bytes copied: 2.0 KB\nfiles copied: 3\ndirectories created: 2\ndestination: /backups/proj"
        );
    }
}
