//! Saved prompts and prompt composition for interactive sessions.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::ignorefile::global_dir;

const PROMPT_EXTENSIONS: &[&str] = &["md", "txt", "prompt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPrompt {
    /// File stem, used as the block heading.
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

fn read_prompt_dir(dir: &Path) -> Vec<SavedPrompt> {
    let Ok(items) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut prompts = Vec::new();
    for item in items.flatten() {
        let path = item.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !PROMPT_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        if let Ok(text) = fs::read_to_string(&path) {
            prompts.push(SavedPrompt { name, path, text });
        }
    }
    prompts
}

/// Prompts from `hint`, `.cpai/prompts`, `prompts` and `~/.cpai/prompts`, in
/// that priority. The first directory to define a name keeps it.
pub fn load_saved_prompts(root: &Path, hint: Option<&Path>) -> Vec<SavedPrompt> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(hint) = hint {
        dirs.push(root.join(hint));
    }
    dirs.push(root.join(".cpai").join("prompts"));
    dirs.push(root.join("prompts"));
    if let Some(global) = global_dir() {
        dirs.push(global.join("prompts"));
    }

    let mut by_name: BTreeMap<String, SavedPrompt> = BTreeMap::new();
    for dir in &dirs {
        for prompt in read_prompt_dir(dir) {
            by_name.entry(prompt.name.clone()).or_insert(prompt);
        }
    }
    debug!(count = by_name.len(), "loaded saved prompts");
    by_name.into_values().collect()
}

/// Picked prompts as `### name` blocks, then the ad-hoc text, sections
/// separated by a `---` rule. `None` when nothing is left.
pub fn compose_prompt(
    available: &[SavedPrompt],
    picked: &BTreeSet<String>,
    ad_hoc: Option<&str>,
) -> Option<String> {
    let mut sections = Vec::new();
    let blocks: Vec<String> = available
        .iter()
        .filter(|p| picked.contains(&p.name))
        .map(|p| format!("### {}\n{}", p.name, p.text.trim()))
        .collect();
    if !blocks.is_empty() {
        sections.push(blocks.join("\n\n"));
    }
    if let Some(text) = ad_hoc.map(str::trim).filter(|t| !t.is_empty()) {
        sections.push(text.to_string());
    }
    let composed = sections.join("\n\n---\n\n");
    (!composed.is_empty()).then_some(composed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn prompt(name: &str, text: &str) -> SavedPrompt {
        SavedPrompt {
            name: name.into(),
            path: PathBuf::from(format!("{name}.md")),
            text: text.into(),
        }
    }

    #[test]
    fn test_compose_prompt() {
        let available = vec![prompt("review", " be strict \n"), prompt("docs", "explain"), prompt("unused", "x")];
        let picked: BTreeSet<String> = ["review", "docs"].iter().map(|s| s.to_string()).collect();

        let out = compose_prompt(&available, &picked, Some("  and fix it  ")).unwrap();
        assert_eq!(out, "### review\nbe strict\n\n### docs\nexplain\n\n---\n\nand fix it");

        assert_eq!(compose_prompt(&available, &BTreeSet::new(), Some("only")).as_deref(), Some("only"));
        assert_eq!(compose_prompt(&available, &BTreeSet::new(), Some("   ")), None);
    }

    #[test]
    fn test_load_saved_prompts_project_wins() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join(".cpai/prompts")).unwrap();
        fs::create_dir_all(root.join("prompts")).unwrap();
        fs::write(root.join(".cpai/prompts/review.md"), "dot-cpai").unwrap();
        fs::write(root.join("prompts/review.txt"), "plain dir").unwrap();
        fs::write(root.join("prompts/audit.prompt"), "audit").unwrap();
        fs::write(root.join("prompts/notes.json"), "{}").unwrap();

        let prompts = load_saved_prompts(root, None);
        let local: Vec<_> = prompts
            .iter()
            .filter(|p| p.path.starts_with(root))
            .map(|p| (p.name.as_str(), p.text.as_str()))
            .collect();
        assert_eq!(local, vec![("audit", "audit"), ("review", "dot-cpai")]);
    }
}
