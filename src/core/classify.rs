//! Per-file classification: binary heuristic, size ceiling, read, measure.

use std::fs;
use std::path::Path;

use crate::core::types::{FileEntry, SkipReason, extension_of};
use crate::utils::binary::is_binary_extension;
use crate::utils::tokens::TokenCounter;

/// Separators + 1, so `"a\nb\n"` is three lines. `\r\n` counts once.
pub fn count_lines(content: &str) -> usize {
    content.bytes().filter(|&b| b == b'\n').count() + 1
}

/// Classifies `root/rel_path`. Never fails: problems become a [`SkipReason`].
pub fn classify(
    root: &Path,
    rel_path: &str,
    max_bytes: u64,
    counter: &dyn TokenCounter,
) -> FileEntry {
    let abs_path = root.join(rel_path);
    let rel = rel_path.to_string();

    if is_binary_extension(&extension_of(rel_path)) {
        return FileEntry::skipped(abs_path, rel, SkipReason::BinaryExt, 0);
    }

    // Links are never followed, even when handed a path directly.
    let metadata = match fs::symlink_metadata(&abs_path) {
        Ok(m) => m,
        Err(e) => return FileEntry::skipped(abs_path, rel, SkipReason::Io(e.to_string()), 0),
    };
    if !metadata.is_file() {
        return FileEntry::skipped(abs_path, rel, SkipReason::NotAFile, 0);
    }
    if metadata.len() > max_bytes {
        return FileEntry::skipped(abs_path, rel, SkipReason::TooLarge, metadata.len());
    }

    let raw = match fs::read(&abs_path) {
        Ok(raw) => raw,
        Err(e) => return FileEntry::skipped(abs_path, rel, SkipReason::Io(e.to_string()), 0),
    };
    let content = String::from_utf8_lossy(&raw);
    let lines = count_lines(&content);
    let tokens = counter.count(&content);

    FileEntry::measured(abs_path, rel, raw.len() as u64, lines, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// One token per whitespace-separated word.
    struct Words;

    impl TokenCounter for Words {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    #[test]
    fn test_count_lines_matches_plain_split() {
        assert_eq!(count_lines(""), 1);
        assert_eq!(count_lines("a"), 1);
        assert_eq!(count_lines("a\nb\n"), 3);
        assert_eq!(count_lines("a\r\nb"), 2);
    }

    #[test]
    fn test_binary_extension_is_skipped_without_stat() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("photo.png"), vec![0u8; 4096]).unwrap();

        let entry = classify(temp.path(), "photo.png", 512_000, &Words);
        assert_eq!(entry.skip_reason(), Some(&SkipReason::BinaryExt));
        assert_eq!(entry.bytes, 0);

        // Missing on disk still classifies as binary.
        let ghost = classify(temp.path(), "ghost.PNG", 512_000, &Words);
        assert_eq!(ghost.skip_reason(), Some(&SkipReason::BinaryExt));
    }

    #[test]
    fn test_too_large_keeps_real_size() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("big.txt"), vec![b'a'; 600_000]).unwrap();

        let entry = classify(temp.path(), "big.txt", 512_000, &Words);
        assert_eq!(entry.skip_reason(), Some(&SkipReason::TooLarge));
        assert_eq!(entry.bytes, 600_000);
        assert_eq!((entry.lines, entry.tokens), (0, 0));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        let entry = classify(temp.path(), "sub", 512_000, &Words);
        assert_eq!(entry.skip_reason(), Some(&SkipReason::NotAFile));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_outside_root_is_not_read() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "hunter2").unwrap();
        let temp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), temp.path().join("link.txt")).unwrap();

        let entry = classify(temp.path(), "link.txt", 512_000, &Words);
        assert_eq!(entry.skip_reason(), Some(&SkipReason::NotAFile));
        assert_eq!(entry.tokens, 0);
    }

    #[test]
    fn test_missing_file_reports_io_message() {
        let temp = TempDir::new().unwrap();
        let entry = classify(temp.path(), "gone.rs", 512_000, &Words);
        assert!(matches!(entry.skip_reason(), Some(SkipReason::Io(msg)) if !msg.is_empty()));
        assert_eq!(entry.bytes, 0);
    }

    #[test]
    fn test_text_file_is_measured() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.md"), "one two\nthree\n").unwrap();

        let entry = classify(temp.path(), "notes.md", 512_000, &Words);
        assert!(!entry.is_skipped());
        assert_eq!(entry.bytes, 14);
        assert_eq!(entry.lines, 3);
        assert_eq!(entry.tokens, 3);
        assert_eq!(entry.extension, "md");
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("odd.txt"), [b'o', b'k', 0xff, b' ', b'x']).unwrap();
        let entry = classify(temp.path(), "odd.txt", 512_000, &Words);
        assert!(!entry.is_skipped());
        assert_eq!(entry.bytes, 5);
        assert_eq!(entry.tokens, 2);
    }

    #[test]
    fn test_empty_file_is_valid() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("empty.rs"), "").unwrap();
        let entry = classify(temp.path(), "empty.rs", 512_000, &Words);
        assert!(!entry.is_skipped());
        assert_eq!((entry.bytes, entry.lines, entry.tokens), (0, 1, 0));
    }
}
