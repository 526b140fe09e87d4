//! Plain bundle: `### path` heading over the raw content, files joined by the
//! configured block separator.

use std::io::{self, Write};

use super::{FileView, Formatter};

pub struct PlainFormatter {
    separator: String,
    first_file: bool,
}

impl PlainFormatter {
    pub fn new(separator: &str) -> Self {
        Self {
            separator: separator.to_string(),
            first_file: true,
        }
    }
}

impl Formatter for PlainFormatter {
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
        if !self.first_file {
            write!(output, "{}", self.separator)?;
        }
        self.first_file = false;
        write!(output, "### {}\n{}", file.entry.rel_path, file.content.trim_end())
    }

    fn write_footer(&mut self, output: &mut dyn Write) -> io::Result<()> {
        if !self.first_file {
            writeln!(output)?;
        }
        Ok(())
    }
}
