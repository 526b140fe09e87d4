//! Directory trie over a flat file list: ASCII rendering for bundles and
//! recursive inclusion rollups for the interactive tree.

use std::collections::{BTreeMap, HashSet};

use crate::core::types::FileEntry;

/// Index of the root node.
pub const ROOT: usize = 0;

#[derive(Debug)]
struct DirNode {
    name: String,
    /// Posix path from the scan root, `.` for the root itself.
    path: String,
    parent: Option<usize>,
    dirs: BTreeMap<String, usize>,
    /// Indices into the entry slice.
    files: Vec<usize>,
}

/// Whether a directory's descendants are all, some or none eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
    Full,
    Mixed,
    Excluded,
}

/// Recursive rollup for one directory. Tokens count eligible files only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub tokens: usize,
    pub included: usize,
    pub total: usize,
}

impl NodeStats {
    pub fn inclusion(&self) -> Inclusion {
        if self.total > 0 && self.included == self.total {
            Inclusion::Full
        } else if self.included > 0 {
            Inclusion::Mixed
        } else {
            Inclusion::Excluded
        }
    }
}

/// One line of the interactive tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeRow<'a> {
    Dir {
        depth: usize,
        path: String,
        name: String,
        inclusion: Inclusion,
        tokens: usize,
    },
    File {
        depth: usize,
        entry: &'a FileEntry,
        included: bool,
    },
}

#[derive(Debug)]
pub struct DirTree<'a> {
    nodes: Vec<DirNode>,
    entries: &'a [FileEntry],
}

impl<'a> DirTree<'a> {
    pub fn build(entries: &'a [FileEntry], root_name: &str) -> Self {
        let mut nodes = vec![DirNode {
            name: root_name.to_string(),
            path: ".".to_string(),
            parent: None,
            dirs: BTreeMap::new(),
            files: Vec::new(),
        }];

        for (idx, entry) in entries.iter().enumerate() {
            let mut parts: Vec<&str> = entry.rel_path.split('/').collect();
            parts.pop();
            let mut node = ROOT;
            for part in parts {
                node = match nodes[node].dirs.get(part) {
                    Some(&child) => child,
                    None => {
                        let path = if node == ROOT {
                            part.to_string()
                        } else {
                            format!("{}/{}", nodes[node].path, part)
                        };
                        let child = nodes.len();
                        nodes.push(DirNode {
                            name: part.to_string(),
                            path,
                            parent: Some(node),
                            dirs: BTreeMap::new(),
                            files: Vec::new(),
                        });
                        nodes[node].dirs.insert(part.to_string(), child);
                        child
                    }
                };
            }
            nodes[node].files.push(idx);
        }

        Self { nodes, entries }
    }

    fn file_name(&self, idx: usize) -> &str {
        let rel = &self.entries[idx].rel_path;
        rel.rsplit('/').next().unwrap_or(rel)
    }

    /// Root label line followed by the box-drawn tree; directories come
    /// before files at every level, each group alphabetical.
    pub fn render_ascii(&self, root_label: &str) -> String {
        let mut lines = vec![root_label.to_string()];
        self.ascii_lines(ROOT, "", &mut lines);
        lines.join("\n")
    }

    fn ascii_lines(&self, node: usize, prefix: &str, out: &mut Vec<String>) {
        let dirs: Vec<usize> = self.nodes[node].dirs.values().copied().collect();
        let mut files: Vec<&str> = self.nodes[node]
            .files
            .iter()
            .map(|&i| self.file_name(i))
            .collect();
        files.sort_unstable();

        let count = dirs.len() + files.len();
        for (pos, &dir) in dirs.iter().enumerate() {
            let last = pos + 1 == count;
            let branch = if last { "└─ " } else { "├─ " };
            out.push(format!("{}{}{}/", prefix, branch, self.nodes[dir].name));
            let next = format!("{}{}", prefix, if last { "   " } else { "│  " });
            self.ascii_lines(dir, &next, out);
        }
        for (pos, name) in files.iter().enumerate() {
            let last = dirs.len() + pos + 1 == count;
            let branch = if last { "└─ " } else { "├─ " };
            out.push(format!("{}{}{}", prefix, branch, name));
        }
    }

    /// Rollups for every node, indexed like the arena.
    pub fn stats(&self, eligible: &HashSet<&str>) -> Vec<NodeStats> {
        let mut stats = vec![NodeStats::default(); self.nodes.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            for &f in &node.files {
                let entry = &self.entries[f];
                stats[idx].total += 1;
                if eligible.contains(entry.rel_path.as_str()) {
                    stats[idx].included += 1;
                    stats[idx].tokens += entry.tokens;
                }
            }
        }
        // Children always sit after their parent in the arena.
        for idx in (1..self.nodes.len()).rev() {
            if let Some(parent) = self.nodes[idx].parent {
                let child = stats[idx];
                stats[parent].tokens += child.tokens;
                stats[parent].included += child.included;
                stats[parent].total += child.total;
            }
        }
        stats
    }

    /// Stats for the directory at `path` (`.` for the root).
    pub fn stats_for(&self, path: &str, eligible: &HashSet<&str>) -> Option<NodeStats> {
        let idx = self.nodes.iter().position(|n| n.path == path)?;
        Some(self.stats(eligible)[idx])
    }

    /// Depth-first rows: a directory row, then (when expanded) its
    /// subdirectories alphabetically, then its files by path.
    pub fn visible_rows(&self, expanded: &HashSet<String>, eligible: &HashSet<&str>) -> Vec<TreeRow<'a>> {
        let stats = self.stats(eligible);
        let mut rows = Vec::new();
        self.walk_rows(ROOT, 0, expanded, eligible, &stats, &mut rows);
        rows
    }

    fn walk_rows(
        &self,
        node: usize,
        depth: usize,
        expanded: &HashSet<String>,
        eligible: &HashSet<&str>,
        stats: &[NodeStats],
        rows: &mut Vec<TreeRow<'a>>,
    ) {
        let dir = &self.nodes[node];
        rows.push(TreeRow::Dir {
            depth,
            path: dir.path.clone(),
            name: dir.name.clone(),
            inclusion: stats[node].inclusion(),
            tokens: stats[node].tokens,
        });
        if !expanded.contains(&dir.path) {
            return;
        }
        for &child in dir.dirs.values() {
            self.walk_rows(child, depth + 1, expanded, eligible, stats, rows);
        }
        let entries = self.entries;
        let mut files: Vec<&'a FileEntry> = dir.files.iter().map(|&i| &entries[i]).collect();
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        for entry in files {
            rows.push(TreeRow::File {
                depth: depth + 1,
                entry,
                included: eligible.contains(entry.rel_path.as_str()),
            });
        }
    }
}

/// ASCII tree of `entries` under `root_label/`.
pub fn render_ascii_tree(entries: &[FileEntry], root_name: &str) -> String {
    DirTree::build(entries, root_name).render_ascii(&format!("{}/", root_name))
}
