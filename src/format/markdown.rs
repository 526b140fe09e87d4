//! Markdown bundle: a level-3 heading per file, optionally fenced.

use std::io::{self, Write};

use super::{FileView, Formatter};

pub struct MarkdownFormatter {
    code_fences: bool,
}

impl MarkdownFormatter {
    pub fn new(code_fences: bool) -> Self {
        Self { code_fences }
    }
}

impl Formatter for MarkdownFormatter {
    fn write_header(
        &mut self,
        output: &mut dyn Write,
        header: Option<&str>,
        _tree: Option<&str>,
    ) -> io::Result<()> {
        if let Some(h) = header {
            writeln!(output, "{}", h.trim())?;
            writeln!(output)?;
        }
        Ok(())
    }

    fn write_file(&mut self, output: &mut dyn Write, file: &FileView<'_>) -> io::Result<()> {
        writeln!(output, "### {}", file.entry.rel_path)?;
        if self.code_fences {
            writeln!(output, "```{}", file.language)?;
            writeln!(output, "{}", file.content.trim_end())?;
            writeln!(output, "```")?;
        } else {
            writeln!(output, "{}", file.content)?;
        }
        writeln!(output)?;
        Ok(())
    }

    fn write_footer(&mut self, _output: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}
