//! Core types shared across cpai modules

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Why a discovered file carries no metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    BinaryExt,
    TooLarge,
    NotAFile,
    /// Message of the I/O error raised while reading.
    Io(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BinaryExt => f.write_str("binary-ext"),
            SkipReason::TooLarge => f.write_str("too-large"),
            SkipReason::NotAFile => f.write_str("not-a-file"),
            SkipReason::Io(msg) => f.write_str(msg),
        }
    }
}

/// One physical file considered by a scan. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub abs_path: PathBuf,
    /// Posix-separated path relative to the scan root; the stable key.
    pub rel_path: String,
    pub bytes: u64,
    pub lines: usize,
    pub tokens: usize,
    /// Lowercase extension without the dot.
    pub extension: String,
    skip: Option<SkipReason>,
}

impl FileEntry {
    pub fn measured(
        abs_path: PathBuf,
        rel_path: String,
        bytes: u64,
        lines: usize,
        tokens: usize,
    ) -> Self {
        let extension = extension_of(&rel_path);
        Self {
            abs_path,
            rel_path,
            bytes,
            lines,
            tokens,
            extension,
            skip: None,
        }
    }

    /// `bytes` is only non-zero for `too-large`, where the real size is kept
    /// for reporting.
    pub fn skipped(abs_path: PathBuf, rel_path: String, reason: SkipReason, bytes: u64) -> Self {
        let extension = extension_of(&rel_path);
        Self {
            abs_path,
            rel_path,
            bytes,
            lines: 0,
            tokens: 0,
            extension,
            skip: Some(reason),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip.is_some()
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        self.skip.as_ref()
    }

    /// Parent directory in posix form, `.` for top-level files.
    pub fn parent_dir(&self) -> &str {
        match self.rel_path.rfind('/') {
            Some(idx) => &self.rel_path[..idx],
            None => ".",
        }
    }
}

/// `archive.tar.gz` -> `gz`, `.bashrc` -> ``, `Makefile` -> ``.
pub fn extension_of(rel_path: &str) -> String {
    std::path::Path::new(rel_path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Per-directory rollup over direct children only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirStats {
    pub tokens: usize,
    pub bytes: u64,
    pub files: usize,
    pub lines: usize,
}

/// Aggregate of one scan pass.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<FileEntry>,
    pub total_tokens: usize,
    pub total_bytes: u64,
    pub total_lines: usize,
    pub by_directory: BTreeMap<String, DirStats>,
    /// Listed files that the tool ignore file switches off by default.
    pub auto_deselected: BTreeSet<String>,
    /// Set when a cancellation was observed; such a result is incomplete.
    pub cancelled: bool,
}

impl ScanResult {
    /// Totals and directory rollups are derived from the non-skipped entries.
    pub fn from_files(files: Vec<FileEntry>) -> Self {
        let mut result = Self {
            files,
            ..Default::default()
        };
        for f in result.files.iter().filter(|f| !f.is_skipped()) {
            result.total_tokens += f.tokens;
            result.total_bytes += f.bytes;
            result.total_lines += f.lines;

            let agg = result
                .by_directory
                .entry(f.parent_dir().to_string())
                .or_default();
            agg.tokens += f.tokens;
            agg.bytes += f.bytes;
            agg.files += 1;
            agg.lines += f.lines;
        }
        result
    }

    pub fn eligible(&self) -> Vec<FileEntry> {
        self.files
            .iter()
            .filter(|f| !f.is_skipped())
            .cloned()
            .collect()
    }
}

/// Ordering applied before greedy admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackOrder {
    #[default]
    SmallFirst,
    LargeFirst,
    Path,
}

/// Output format selector. Wrapping styles are separate flags on the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Plain,
    Json,
}
