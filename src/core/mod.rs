//! Core module for cpai
//!
//! Data model, per-file classification, the scan engine and the directory tree.

pub mod classify;
pub mod scanner;
pub mod tree;
mod types;

pub use classify::{classify, count_lines};
pub use scanner::{CancelToken, ScanControl, scan, scan_concurrent, scan_with};
pub use tree::{DirTree, Inclusion, NodeStats, TreeRow, render_ascii_tree};
pub use types::*;
