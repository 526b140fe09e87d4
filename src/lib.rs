pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod fs;
pub mod logging;
pub mod pack;
pub mod runner;
pub mod session;
pub mod utils;

// Re-export the scan / pack / render entry points
pub use crate::config::{ConfigLayer, LayeredConfig, SelectionPolicy};
pub use crate::core::{FileEntry, OutputFormat, PackOrder, ScanResult, SkipReason, scan, scan_concurrent};
pub use crate::error::{CpaiError, Result};
pub use crate::format::{render, render_bundle};
pub use crate::pack::{Bundle, PackOutcome, bundle, pack};
pub use crate::utils::tokens::{TokenCounter, Tokenizer};
