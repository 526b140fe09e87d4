//! Utility modules for cpai
//!
//! - `tokens` - tokenizer oracle
//! - `binary`, `ignorefile` - classification and ignore-file inputs
//! - `clipboard`, `display`, `watch` - CLI-side helpers

pub mod binary;
pub mod clipboard;
pub mod display;
pub mod ignorefile;
pub mod tokens;
pub mod watch;
