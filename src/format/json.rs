//! JSON metadata listing. Bodies are only read when explicitly requested.

use std::fs;

use serde::Serialize;

use crate::core::FileEntry;
use crate::error::{CpaiError, Result};

#[derive(Serialize)]
struct JsonEntry<'a> {
    path: &'a str,
    bytes: u64,
    lines: usize,
    tokens: usize,
    skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

fn read_body(entry: &FileEntry) -> Result<Option<String>> {
    if entry.is_skipped() {
        return Ok(None);
    }
    let raw = fs::read(&entry.abs_path).map_err(|source| CpaiError::Render {
        path: entry.abs_path.clone(),
        source,
    })?;
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

/// Pretty-printed array of `{path, bytes, lines, tokens, skipped, reason}`.
pub fn render_json(entries: &[FileEntry], include_bodies: bool) -> Result<String> {
    let rows = entries
        .iter()
        .map(|e| {
            Ok(JsonEntry {
                path: &e.rel_path,
                bytes: e.bytes,
                lines: e.lines,
                tokens: e.tokens,
                skipped: e.is_skipped(),
                reason: e.skip_reason().map(|r| r.to_string()),
                content: if include_bodies { read_body(e)? } else { None },
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::to_string_pretty(&rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SkipReason;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_metadata_only() {
        let entries = vec![
            FileEntry::measured(PathBuf::from("/nowhere/a.rs"), "a.rs".into(), 12, 2, 5),
            FileEntry::skipped(
                PathBuf::from("/nowhere/b.png"),
                "b.png".into(),
                SkipReason::BinaryExt,
                0,
            ),
        ];
        let out = render_json(&entries, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value[0]["path"], "a.rs");
        assert_eq!(value[0]["tokens"], 5);
        assert_eq!(value[0]["skipped"], false);
        assert!(value[0].get("reason").is_none());
        assert!(value[0].get("content").is_none());
        assert_eq!(value[1]["skipped"], true);
        assert_eq!(value[1]["reason"], "binary-ext");
        assert!(out.contains("\n  {"));
    }

    #[test]
    fn test_bodies_on_request() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.rs");
        fs::write(&path, "fn a() {}\n").unwrap();
        let entries = vec![FileEntry::measured(path, "a.rs".into(), 10, 2, 4)];

        let out = render_json(&entries, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["content"], "fn a() {}\n");
    }
}
