//! Choosing and validating the output directory of one source
//!
//! Each source is copied into a new directory directly under the destination parent. The
//! name is the source's own directory name (or the caller's override for single-source
//! runs); when that name is taken, `-copy-1`, `-copy-2`, ... suffixes are probed until a
//! free one is found, so an existing directory is never written into.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

use crate::error::Error;

/// Name of the output directory for `source`.
///
/// `name_override` only applies when exactly one source is copied; callers are expected to
/// tell the user when it is being ignored.
pub async fn desired_name(
    source: &Path,
    name_override: Option<&str>,
    source_count: usize,
) -> Result<OsString, Error> {
    if let (Some(name), 1) = (name_override, source_count) {
        validate_name(name)?;
        return Ok(OsString::from(name));
    }
    let resolved = tokio::fs::canonicalize(source)
        .await
        .unwrap_or_else(|_| source.to_path_buf());
    resolved
        .file_name()
        .map(OsStr::to_os_string)
        .ok_or_else(|| Error::InvalidSourceName(source.to_path_buf()))
}

/// Reject names that would not create a direct child of the destination parent.
pub fn validate_name(name: &str) -> Result<(), Error> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == OsStr::new(name) => Ok(()),
        _ => Err(Error::InvalidName(name.to_string())),
    }
}

async fn is_taken(path: &Path, reserved: &HashSet<PathBuf>) -> std::io::Result<bool> {
    if reserved.contains(path) {
        return Ok(true);
    }
    // symlink_metadata so that a dangling symlink also counts as taken
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

/// First free path among `parent/name`, `parent/name-copy-1`, `parent/name-copy-2`, ...
///
/// Paths in `reserved` count as taken even when nothing exists there yet, e.g. destinations
/// already planned for earlier sources of a dry run.
pub async fn unique_destination(
    parent: &Path,
    name: &OsStr,
    reserved: &HashSet<PathBuf>,
) -> std::io::Result<PathBuf> {
    let candidate = parent.join(name);
    if !is_taken(&candidate, reserved).await? {
        return Ok(candidate);
    }
    let mut index: u64 = 1;
    loop {
        let mut suffixed = name.to_os_string();
        suffixed.push(format!("-copy-{}", index));
        let candidate = parent.join(&suffixed);
        if !is_taken(&candidate, reserved).await? {
            tracing::debug!("{:?} is taken, using {:?}", parent.join(name), candidate);
            return Ok(candidate);
        }
        index += 1;
    }
}

/// Canonicalize the longest existing ancestor of `path` and append the rest lexically.
///
/// The destination normally does not exist yet, so plain canonicalization would fail.
pub async fn resolve_lenient(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    let mut existing = absolute.as_path();
    let mut rest: Vec<Component> = Vec::new();
    let mut resolved = loop {
        if let Ok(resolved) = tokio::fs::canonicalize(existing).await {
            break resolved;
        }
        let Some(parent) = existing.parent() else {
            break existing.to_path_buf();
        };
        if let Some(last) = existing.components().next_back() {
            rest.push(last);
        }
        existing = parent;
    };
    for component in rest.into_iter().rev() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

/// Refuse to copy a source onto itself or into one of its own descendants.
pub async fn validate(source: &Path, destination: &Path) -> Result<(), Error> {
    let src = tokio::fs::canonicalize(source)
        .await
        .map_err(|_| Error::SourceMissing(source.to_path_buf()))?;
    let dst = resolve_lenient(destination).await;
    if src == dst {
        return Err(Error::SameLocation { src, dst });
    }
    if dst.starts_with(&src) {
        return Err(Error::DestinationInsideSource { src, dst });
    }
    Ok(())
}
