//! File discovery: enumerate candidate files under include/exclude globs,
//! `.gitignore`, hidden-file visibility and the tool ignore file.

use std::collections::BTreeSet;
use std::path::{Component, Path};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::error::{CpaiError, Result};

/// How patterns from the tool ignore file take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolIgnoreMode {
    /// Tool ignore patterns are not consulted.
    Off,
    /// Matching files are dropped from the listing, like `.gitignore`.
    Hide,
    /// Matching files stay listed but are reported as auto-deselected.
    AutoDeselect,
}

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryOptions<'a> {
    pub root: &'a Path,
    /// Empty means `**/*`.
    pub include: &'a [String],
    pub exclude: &'a [String],
    pub use_gitignore: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Relative posix paths in sorted order.
    pub paths: Vec<String>,
    pub auto_deselected: BTreeSet<String>,
}

fn compile(pattern: &str) -> std::result::Result<globset::Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// Builds a glob set; any invalid pattern is fatal.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = compile(pattern).map_err(|source| CpaiError::Glob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| CpaiError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

/// Builds a glob set from ignore-file lines, skipping lines that do not parse.
fn build_lenient_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match compile(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("skipping ignore pattern `{}`: {}", pattern, e),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!("ignore patterns unusable: {}", e);
        GlobSet::empty()
    })
}

/// `a/b/c.rs` regardless of platform separator.
pub fn to_posix(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// True when `rel` or any directory above it matches, so a pattern naming a
/// directory covers everything beneath it.
fn matches_path_or_ancestor(set: &GlobSet, rel: &str) -> bool {
    if set.is_empty() {
        return false;
    }
    set.is_match(rel)
        || rel
            .match_indices('/')
            .any(|(i, _)| set.is_match(&rel[..i]))
}

/// Walks `root` and returns every regular file passing gitignore, hidden and
/// include/exclude rules. Symlinks are neither followed nor listed.
pub fn walk_candidates(opts: &DiscoveryOptions<'_>) -> Result<Vec<String>> {
    if !opts.root.is_dir() {
        return Err(CpaiError::NotADirectory(opts.root.to_path_buf()));
    }

    let default_include = vec!["**/*".to_string()];
    let include = if opts.include.is_empty() {
        build_globset(&default_include)?
    } else {
        build_globset(opts.include)?
    };
    let exclude = build_globset(opts.exclude)?;

    let mut builder = WalkBuilder::new(opts.root);
    builder
        .standard_filters(false)
        .hidden(!opts.hidden)
        .git_ignore(opts.use_gitignore)
        .require_git(false)
        .follow_links(false);

    let mut files = Vec::new();
    for result in builder.build() {
        let entry = result.map_err(|source| CpaiError::Walk {
            path: opts.root.to_path_buf(),
            source,
        })?;
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(opts.root) else {
            continue;
        };
        let rel = to_posix(relative);
        if rel.is_empty() || !include.is_match(&rel) || matches_path_or_ancestor(&exclude, &rel) {
            continue;
        }
        files.push(rel);
    }

    files.sort();
    Ok(files)
}

/// Paths from `paths` that the tool ignore patterns switch off.
pub fn auto_deselect<'a>(
    paths: impl IntoIterator<Item = &'a str>,
    patterns: &[String],
) -> BTreeSet<String> {
    if patterns.is_empty() {
        return BTreeSet::new();
    }
    let set = build_lenient_globset(patterns);
    paths
        .into_iter()
        .filter(|p| matches_path_or_ancestor(&set, p))
        .map(String::from)
        .collect()
}

/// Full discovery. Tool ignore patterns act as extra excludes: the difference
/// between the unfiltered and filtered listings is either hidden or reported
/// as auto-deselected, depending on `mode`.
pub fn discover(
    opts: &DiscoveryOptions<'_>,
    tool_patterns: &[String],
    mode: ToolIgnoreMode,
) -> Result<Discovery> {
    let all = walk_candidates(opts)?;
    debug!(candidates = all.len(), root = %opts.root.display(), "walked");

    if mode == ToolIgnoreMode::Off || tool_patterns.is_empty() {
        return Ok(Discovery {
            paths: all,
            auto_deselected: BTreeSet::new(),
        });
    }

    let dropped = auto_deselect(all.iter().map(String::as_str), tool_patterns);
    match mode {
        ToolIgnoreMode::Hide => Ok(Discovery {
            paths: all.into_iter().filter(|p| !dropped.contains(p)).collect(),
            auto_deselected: BTreeSet::new(),
        }),
        _ => Ok(Discovery {
            paths: all,
            auto_deselected: dropped,
        }),
    }
}
