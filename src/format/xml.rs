//! XML bundle with CDATA-wrapped header, tree and file bodies.

use std::io::{self, Write};

use quick_xml::escape::escape;

use super::{FileView, Formatter};

/// Splits every `]]>` across two CDATA sections so the section can hold any text.
pub fn encode_cdata(text: &str) -> String {
    text.replace("]]>", "]]]]><![CDATA[>")
}

pub struct XmlFormatter;

impl Formatter for XmlFormatter {
    fn needs_tree(&self) -> bool {
        true
    }

    fn write_header(
        &mut self,
        output: &mut dyn Write,
        header: Option<&str>,
        tree: Option<&str>,
    ) -> io::Result<()> {
        writeln!(output, "<cpai version=\"{}\">", env!("CARGO_PKG_VERSION"))?;
        if let Some(h) = header {
            writeln!(output, "  <header><![CDATA[{}]]></header>", encode_cdata(h))?;
        }
        writeln!(output, "  <tree>")?;
        writeln!(output, "    <![CDATA[")?;
        for line in tree.unwrap_or_default().split('\n') {
            writeln!(output, "    {}", encode_cdata(line))?;
        }
        writeln!(output, "    ]]>")?;
        writeln!(output, "  </tree>")?;
        writeln!(output, "  <files>")?;
        Ok(())
    }

    fn write_file(&mut self, output: &mut dyn Write, file: &FileView<'_>) -> io::Result<()> {
        let entry = file.entry;
        writeln!(
            output,
            "    <file path=\"{}\" bytes=\"{}\" lines=\"{}\" tokens=\"{}\" language=\"{}\">",
            escape(entry.rel_path.as_str()),
            entry.bytes,
            entry.lines,
            entry.tokens,
            file.language
        )?;
        // Body goes in unindented so the CDATA text is exactly the file content.
        writeln!(output, "<![CDATA[{}]]>", encode_cdata(file.content))?;
        writeln!(output, "    </file>")?;
        Ok(())
    }

    fn write_footer(&mut self, output: &mut dyn Write) -> io::Result<()> {
        writeln!(output, "  </files>")?;
        writeln!(output, "</cpai>")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_cdata() {
        assert_eq!(encode_cdata("a]]>b"), "a]]]]><![CDATA[>b");
        assert_eq!(encode_cdata("plain"), "plain");
    }
}
