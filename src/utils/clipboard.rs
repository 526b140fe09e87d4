use anyhow::{Context, Result};
use arboard::Clipboard;
use tracing::{debug, warn};

fn write_text(content: &str) -> Result<()> {
    let mut clipboard = Clipboard::new().context("no clipboard available")?;
    clipboard
        .set_text(content)
        .context("clipboard rejected the bundle")?;
    Ok(())
}

/// Copies the bundle. Failure is reported as a warning, never as an error,
/// so the returned flag only tells the caller what to print.
pub fn copy_to_clipboard(content: &str) -> bool {
    match write_text(content) {
        Ok(()) => {
            debug!(bytes = content.len(), "copied bundle to clipboard");
            true
        }
        Err(e) => {
            warn!("clipboard copy failed: {:#}", e);
            false
        }
    }
}
