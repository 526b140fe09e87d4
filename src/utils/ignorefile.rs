//! `.cpaiignore` support: tool-specific exclude globs from the project root and
//! from `~/.cpai/.cpaiignore`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

pub const IGNORE_FILE_NAME: &str = ".cpaiignore";

/// `~/.cpai`, where the global config and ignore file live.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cpai"))
}

/// One pattern per line; blank lines and `#` comments are dropped.
pub fn parse_patterns(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Reads one ignore file. A missing or unreadable file yields no patterns.
pub fn load_patterns(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(raw) => parse_patterns(&raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!("ignoring unreadable {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Project patterns followed by global ones, concatenated.
pub fn load_tool_ignore(root: &Path) -> Vec<String> {
    let mut patterns = load_patterns(&root.join(IGNORE_FILE_NAME));
    if let Some(dir) = global_dir() {
        patterns.extend(load_patterns(&dir.join(IGNORE_FILE_NAME)));
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_patterns() {
        let temp = TempDir::new().unwrap();
        let ignore_path = temp.path().join(IGNORE_FILE_NAME);

        {
            let mut file = fs::File::create(&ignore_path).unwrap();
            writeln!(file, "# Comment line").unwrap();
            writeln!(file, "**/*.test.rs").unwrap();
            writeln!(file).unwrap();
            writeln!(file, "mock_*").unwrap();
            writeln!(file, "  # Indented comment  ").unwrap();
            writeln!(file, "  spaced_pattern  \r").unwrap();
        }

        let patterns = load_patterns(&ignore_path);
        assert_eq!(patterns, vec!["**/*.test.rs", "mock_*", "spaced_pattern"]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(load_patterns(&temp.path().join(IGNORE_FILE_NAME)).is_empty());
    }
}
