//! Tag-wrapped bundle: `<TREE>` overview, optional `<HEADER>`, then numbered
//! `<FILE_n>` blocks. Numbers follow bundle order only.

use std::io::{self, Write};

use super::{FileView, Formatter};

pub struct TagsFormatter;

impl Formatter for TagsFormatter {
    fn needs_tree(&self) -> bool {
        true
    }

    fn write_header(
        &mut self,
        output: &mut dyn Write,
        header: Option<&str>,
        tree: Option<&str>,
    ) -> io::Result<()> {
        writeln!(output, "<TREE>")?;
        writeln!(output, "{}", tree.unwrap_or_default())?;
        writeln!(output, "</TREE>")?;
        writeln!(output)?;
        if let Some(h) = header {
            writeln!(output, "<HEADER>{}</HEADER>", h)?;
            writeln!(output)?;
        }
        Ok(())
    }

    fn write_file(&mut self, output: &mut dyn Write, file: &FileView<'_>) -> io::Result<()> {
        writeln!(output, "<FILE_{} path=\"{}\">", file.index, file.entry.rel_path)?;
        writeln!(output, "{}", file.content.trim_end())?;
        writeln!(output, "</FILE_{}>", file.index)?;
        writeln!(output)?;
        Ok(())
    }

    fn write_footer(&mut self, _output: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}
