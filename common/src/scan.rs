//! Pre-copy traversal computing file and byte totals
//!
//! The scanner and the copy engine share `list_dir`, so both prune exactly the same
//! entries and the scanned byte total is the denominator the copy loop counts towards.

use async_recursion::async_recursion;
use std::ffi::OsString;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::Error;
use crate::ignore::IgnoreRules;

/// File count and byte count of the entries that survive the ignore rules
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub files: u64,
    pub bytes: u64,
}

impl std::ops::Add for Totals {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            files: self.files + other.files,
            bytes: self.bytes + other.bytes,
        }
    }
}

impl std::iter::Sum for Totals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, totals| acc + totals)
    }
}

/// Included children of one directory, sorted by name
#[derive(Debug, Default)]
pub(crate) struct Listing {
    /// subdirectories to descend into
    pub dirs: Vec<OsString>,
    /// everything else, symlinks to files included
    pub files: Vec<OsString>,
}

/// List `dir` and apply the ignore rules to its children.
///
/// Symlinks to directories are subject to the directory rule but are never descended into,
/// and are not reported as files either.
pub(crate) async fn list_dir(dir: &Path, rules: &IgnoreRules) -> std::io::Result<Listing> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut children: Vec<(OsString, bool)> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let is_symlink = entry
            .file_type()
            .await
            .map(|ft| ft.is_symlink())
            .unwrap_or(false);
        children.push((entry.file_name(), is_symlink));
    }
    let names: Vec<OsString> = children.iter().map(|(name, _)| name.clone()).collect();
    let skipped = rules.decide(dir, &names).await;
    let mut listing = Listing::default();
    for (name, is_symlink) in children {
        if skipped.contains(&name) {
            continue;
        }
        let path = dir.join(&name);
        let is_dir = tokio::fs::metadata(&path)
            .await
            .map(|md| md.is_dir())
            .unwrap_or(false);
        if is_dir && is_symlink {
            tracing::debug!("not following directory symlink {:?}", path);
        } else if is_dir {
            listing.dirs.push(name);
        } else {
            listing.files.push(name);
        }
    }
    listing.dirs.sort();
    listing.files.sort();
    Ok(listing)
}

/// Count the files and bytes under `root` that a copy would transfer.
///
/// Best effort: a file that cannot be stat'ed and a directory that cannot be listed are
/// left out of the totals without reporting an error. `cancel` is checked before every
/// directory and ends the scan with [`Error::Cancelled`].
#[instrument(skip(rules, cancel))]
pub async fn scan(
    root: &Path,
    rules: &IgnoreRules,
    cancel: &CancellationToken,
) -> Result<Totals, Error> {
    let mut totals = Totals::default();
    scan_dir(root, rules, cancel, &mut totals).await?;
    tracing::debug!(
        "scanned {:?}: {} files, {} bytes",
        root,
        totals.files,
        totals.bytes
    );
    Ok(totals)
}

#[async_recursion]
async fn scan_dir(
    dir: &Path,
    rules: &IgnoreRules,
    cancel: &CancellationToken,
    totals: &mut Totals,
) -> Result<(), Error> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let listing = match list_dir(dir, rules).await {
        Ok(listing) => listing,
        Err(error) => {
            tracing::debug!("cannot list {:?}, leaving it out: {}", dir, error);
            return Ok(());
        }
    };
    for name in &listing.files {
        let path = dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(md) => {
                totals.files += 1;
                totals.bytes += md.len();
            }
            Err(error) => tracing::debug!("cannot stat {:?}, leaving it out: {}", path, error),
        }
    }
    for name in &listing.dirs {
        scan_dir(&dir.join(name), rules, cancel, totals).await?;
    }
    Ok(())
}
