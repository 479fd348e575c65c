//! Name-based exclusion of build and dependency artifacts
//!
//! Two rules decide whether a directory entry is skipped:
//!
//! - directory rule: a directory whose lowercased name is in [`EXCLUDED_DIR_NAMES`], or
//!   whose lowercased name starts or ends with `venv` (`venv2`, `myproject_venv`, ...)
//! - glob rule: any entry whose name matches one of the configured glob patterns
//!
//! Globs are shell-style (`*`, `?`, `[...]`), case-sensitive and matched against the bare
//! entry name. The default set can drop its dotenv patterns and can be extended with extra
//! patterns, but the defaults are otherwise never removed.
//!
//! # Examples
//!
//! ```
//! use common::ignore::{IgnoreResult, IgnoreRules, Settings};
//! use std::ffi::OsStr;
//!
//! let mut settings = Settings::default();
//! settings.add_extra_glob("*.tmp").unwrap();
//! let rules = IgnoreRules::new(&settings).unwrap();
//!
//! assert_eq!(rules.check(OsStr::new(".venv"), true), IgnoreResult::ExcludedDir);
//! assert_eq!(
//!     rules.check(OsStr::new("scratch.tmp"), false),
//!     IgnoreResult::ExcludedByPattern("*.tmp".to_string())
//! );
//! assert_eq!(rules.check(OsStr::new("main.py"), false), IgnoreResult::Included);
//! ```

use anyhow::{Context, anyhow};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::Path;

use crate::error::Error;

/// Directory names that are never copied (compared lowercased).
pub const EXCLUDED_DIR_NAMES: &[&str] = &[
    "__pycache__",
    "venv",
    ".venv",
    "env",
    ".env",
    ".git",
    ".hg",
    ".svn",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    ".idea",
    ".vscode",
    "build",
    "dist",
    ".ruff_cache",
];

/// Glob patterns skipped unless explicitly re-enabled.
pub const DEFAULT_EXCLUDED_FILE_GLOBS: &[&str] = &[
    "*.pyc",
    "*.pyo",
    "*.pyd",
    ".DS_Store",
    "*.log",
    "*.egg",
    "*.egg-info",
    "*.so",
    ".coverage",
    ".env",
    ".env.*",
];

const VENV_MARKER: &str = "venv";

fn is_dotenv_glob(pattern: &str) -> bool {
    pattern == ".env" || pattern.starts_with(".env.")
}

/// Caller-facing knobs for building an [`IgnoreRules`].
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// keep `.env` / `.env.*` files instead of skipping them
    pub include_dotenv: bool,
    /// additional glob patterns, appended after the defaults
    pub extra_globs: Vec<String>,
}

impl Settings {
    /// Append one extra glob pattern
    pub fn add_extra_glob(&mut self, pattern: &str) -> Result<(), anyhow::Error> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(anyhow!("empty pattern is not allowed"));
        }
        self.extra_globs.push(pattern.to_string());
        Ok(())
    }
    /// Append the patterns listed in an ignore file
    pub fn extend_from_file(&mut self, path: &Path) -> Result<(), anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ignore file: {:?}", path))?;
        self.extend_from_content(&content)
    }
    /// Append patterns from ignore-file content: one pattern per line, `#` starts a comment
    pub fn extend_from_content(&mut self, content: &str) -> Result<(), anyhow::Error> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.add_extra_glob(line)?;
        }
        Ok(())
    }
    /// Effective glob list in evaluation order
    pub fn globs(&self) -> Vec<String> {
        DEFAULT_EXCLUDED_FILE_GLOBS
            .iter()
            .filter(|pattern| !(self.include_dotenv && is_dotenv_glob(pattern)))
            .map(|pattern| pattern.to_string())
            .chain(self.extra_globs.iter().cloned())
            .collect()
    }
}

/// Why an entry was (not) skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreResult {
    /// entry is copied
    Included,
    /// directory matched the excluded-name or venv rule
    ExcludedDir,
    /// entry name matched the given glob pattern
    ExcludedByPattern(String),
}

impl IgnoreResult {
    pub fn is_excluded(&self) -> bool {
        !matches!(self, IgnoreResult::Included)
    }
}

/// Compiled, immutable ignore policy for one run
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    dir_names: HashSet<String>,
    patterns: Vec<String>,
    globs: globset::GlobSet,
}

impl IgnoreRules {
    pub fn new(settings: &Settings) -> Result<Self, Error> {
        let patterns = settings.globs();
        let mut builder = globset::GlobSetBuilder::new();
        for pattern in &patterns {
            if pattern.is_empty() {
                return Err(Error::InvalidPattern(anyhow!("empty pattern is not allowed")));
            }
            let glob = globset::GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .with_context(|| format!("invalid glob pattern: {}", pattern))
                .map_err(Error::InvalidPattern)?;
            builder.add(glob);
        }
        let globs = builder
            .build()
            .context("failed compiling ignore patterns")
            .map_err(Error::InvalidPattern)?;
        Ok(Self {
            dir_names: EXCLUDED_DIR_NAMES
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
            patterns,
            globs,
        })
    }
    /// Glob patterns in evaluation order
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
    /// Decide a single entry; `is_dir` must reflect the entry with symlinks followed
    pub fn check(&self, name: &OsStr, is_dir: bool) -> IgnoreResult {
        if is_dir {
            let name_lower = name.to_string_lossy().to_lowercase();
            if self.dir_names.contains(&name_lower)
                || name_lower.starts_with(VENV_MARKER)
                || name_lower.ends_with(VENV_MARKER)
            {
                return IgnoreResult::ExcludedDir;
            }
        }
        // lowest index is the first pattern in evaluation order
        match self.globs.matches(Path::new(name)).into_iter().min() {
            Some(index) => IgnoreResult::ExcludedByPattern(self.patterns[index].clone()),
            None => IgnoreResult::Included,
        }
    }
    /// Subset of `names` (entries of `dir`) that must be skipped
    pub async fn decide(&self, dir: &Path, names: &[OsString]) -> HashSet<OsString> {
        let mut skipped = HashSet::new();
        for name in names {
            let path = dir.join(name);
            // metadata() follows symlinks, a dangling link counts as a file
            let is_dir = tokio::fs::metadata(&path)
                .await
                .map(|md| md.is_dir())
                .unwrap_or(false);
            match self.check(name, is_dir) {
                IgnoreResult::Included => continue,
                IgnoreResult::ExcludedDir => tracing::trace!("skipping directory {:?}", path),
                IgnoreResult::ExcludedByPattern(pattern) => {
                    tracing::trace!("skipping {:?}: matches {:?}", path, pattern)
                }
            }
            skipped.insert(name.clone());
        }
        skipped
    }
}
