//! Interactive fallback for sources and destination missing from the command line

use anyhow::Context;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Asks the user for directories when none were passed as arguments.
///
/// `None` means the user gave no answer.
pub trait DirectoryPicker {
    fn pick_sources(&mut self) -> anyhow::Result<Option<Vec<PathBuf>>>;
    fn pick_destination(&mut self) -> anyhow::Result<Option<PathBuf>>;
}

/// Line-based prompts, normally on stdin/stdout.
pub struct PromptPicker<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl PromptPicker<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptPicker<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Empty string on end of input.
    fn read_answer(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .context("failed reading answer from stdin")?;
        Ok(line.trim().to_string())
    }
}

fn unquote(raw: &str) -> &str {
    raw.trim().trim_matches('"')
}

/// Split a `;` separated answer into paths, dropping empty parts and repeats.
pub fn parse_path_list(raw: &str) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for part in raw.split(';').map(unquote).filter(|part| !part.is_empty()) {
        let path = PathBuf::from(part);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

impl<R: BufRead, W: Write> DirectoryPicker for PromptPicker<R, W> {
    fn pick_sources(&mut self) -> anyhow::Result<Option<Vec<PathBuf>>> {
        write!(
            self.output,
            "Enter one or more source folder paths\n\
            Tip: Separate multiple paths with ';'\n: "
        )?;
        self.output.flush()?;
        let paths = parse_path_list(&self.read_answer()?);
        Ok(if paths.is_empty() { None } else { Some(paths) })
    }

    fn pick_destination(&mut self) -> anyhow::Result<Option<PathBuf>> {
        write!(self.output, "Enter destination parent folder path: ")?;
        self.output.flush()?;
        let answer = self.read_answer()?;
        let path = unquote(&answer);
        Ok(if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        })
    }
}
