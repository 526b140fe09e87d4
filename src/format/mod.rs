//! Output formats for cpai bundles

pub mod json;
pub mod markdown;
pub mod plain;
pub mod tags;
pub mod xml;

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::SelectionPolicy;
use crate::core::{FileEntry, OutputFormat, render_ascii_tree};
use crate::error::{CpaiError, Result};

pub use json::render_json;

/// One file as handed to a formatter.
pub struct FileView<'a> {
    pub entry: &'a FileEntry,
    pub content: &'a str,
    /// 1-based position in the bundle.
    pub index: usize,
    pub language: &'static str,
}

/// Streams one bundle body. Every formatter writes newline-terminated
/// lines; the renderer drops the final newline.
pub trait Formatter {
    /// Formatters that print a directory tree get one built from the selection.
    fn needs_tree(&self) -> bool {
        false
    }

    fn write_header(
        &mut self,
        output: &mut dyn Write,
        header: Option<&str>,
        tree: Option<&str>,
    ) -> io::Result<()>;

    fn write_file(&mut self, output: &mut dyn Write, file: &FileView<'_>) -> io::Result<()>;

    fn write_footer(&mut self, output: &mut dyn Write) -> io::Result<()>;
}

/// XML wrapping beats tag wrapping, which beats the plain/markdown format.
pub fn create_formatter(policy: &SelectionPolicy) -> Box<dyn Formatter> {
    if policy.xml_wrap {
        Box::new(xml::XmlFormatter)
    } else if policy.tags_wrap {
        Box::new(tags::TagsFormatter)
    } else {
        match policy.format {
            OutputFormat::Plain => Box::new(plain::PlainFormatter::new(&policy.block_separator)),
            _ => Box::new(markdown::MarkdownFormatter::new(policy.code_fences)),
        }
    }
}

lazy_static! {
    static ref EXT_TO_LANG: HashMap<&'static str, &'static str> = [
        ("ts", "ts"),
        ("tsx", "tsx"),
        ("js", "js"),
        ("cjs", "js"),
        ("mjs", "js"),
        ("jsx", "jsx"),
        ("json", "json"),
        ("md", "md"),
        ("sh", "bash"),
        ("bash", "bash"),
        ("zsh", "bash"),
        ("ps1", "powershell"),
        ("py", "python"),
        ("rb", "ruby"),
        ("go", "go"),
        ("rs", "rust"),
        ("java", "java"),
        ("kt", "kotlin"),
        ("swift", "swift"),
        ("php", "php"),
        ("scala", "scala"),
        ("sql", "sql"),
        ("yml", "yaml"),
        ("yaml", "yaml"),
        ("toml", "toml"),
        ("ini", "ini"),
        ("dockerfile", "dockerfile"),
        ("c", "c"),
        ("h", "c"),
        ("cc", "cpp"),
        ("cpp", "cpp"),
        ("cxx", "cpp"),
        ("cs", "csharp"),
        ("css", "css"),
        ("scss", "scss"),
        ("less", "less"),
        ("txt", "text"),
        ("env", "dotenv"),
    ]
    .into_iter()
    .collect();
    static ref INSTRUCTIONS_BLOCK: Regex =
        Regex::new(r"(?is)<INSTRUCTIONS>.*?</INSTRUCTIONS>").expect("static regex");
}

/// Fence language for a file: by extension, then by well-known file name.
pub fn language_for(rel_path: &str, extension: &str) -> &'static str {
    if let Some(&lang) = EXT_TO_LANG.get(extension) {
        return lang;
    }
    let base = rel_path.rsplit('/').next().unwrap_or(rel_path).to_lowercase();
    match base.as_str() {
        "dockerfile" => "dockerfile",
        "makefile" => "makefile",
        _ => "",
    }
}

/// Label used for the root of rendered trees.
pub fn root_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_os_string())
        .or_else(|| {
            let canonical = root.canonicalize().ok()?;
            canonical.file_name().map(|n| n.to_os_string())
        })
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

/// Renders bundle bodies, keeping file contents in memory so repeated renders
/// of shrinking selections read each file once.
#[derive(Debug, Default)]
pub struct Renderer {
    contents: HashMap<PathBuf, String>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(&mut self, entry: &FileEntry) -> Result<()> {
        if !self.contents.contains_key(&entry.abs_path) {
            let raw = fs::read(&entry.abs_path).map_err(|source| CpaiError::Render {
                path: entry.abs_path.clone(),
                source,
            })?;
            self.contents.insert(
                entry.abs_path.clone(),
                String::from_utf8_lossy(&raw).into_owned(),
            );
        }
        Ok(())
    }

    /// Body only, without the instruction wrapping.
    pub fn render(&mut self, files: &[FileEntry], policy: &SelectionPolicy) -> Result<String> {
        for entry in files {
            self.load(entry)?;
        }

        let mut formatter = create_formatter(policy);
        let tree = formatter
            .needs_tree()
            .then(|| render_ascii_tree(files, &root_name(&policy.root)));
        let header = policy.header.as_deref().filter(|h| !h.is_empty());

        let mut output: Vec<u8> = Vec::new();
        formatter.write_header(&mut output, header, tree.as_deref())?;
        for (i, entry) in files.iter().enumerate() {
            let content = self
                .contents
                .get(&entry.abs_path)
                .map(String::as_str)
                .unwrap_or_default();
            let view = FileView {
                entry,
                content,
                index: i + 1,
                language: language_for(&entry.rel_path, &entry.extension),
            };
            formatter.write_file(&mut output, &view)?;
        }
        formatter.write_footer(&mut output)?;

        if output.last() == Some(&b'\n') {
            output.pop();
        }
        String::from_utf8(output).map_err(|e| CpaiError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Body plus instruction wrapping: the final artifact.
    pub fn render_bundle(&mut self, files: &[FileEntry], policy: &SelectionPolicy) -> Result<String> {
        let body = self.render(files, policy)?;
        Ok(wrap_with_prompt(&body, policy.prompt.as_deref()))
    }
}

/// One-shot render of the body.
pub fn render(files: &[FileEntry], policy: &SelectionPolicy) -> Result<String> {
    Renderer::new().render(files, policy)
}

/// One-shot render of the wrapped bundle.
pub fn render_bundle(files: &[FileEntry], policy: &SelectionPolicy) -> Result<String> {
    Renderer::new().render_bundle(files, policy)
}

/// Top-of-bundle instruction block. Pre-tagged text is kept verbatim.
pub fn instruction_preface(prompt: &str) -> String {
    if prompt.contains("<INSTRUCTIONS>") || prompt.contains("<PROMPT") {
        prompt.to_string()
    } else {
        format!("<INSTRUCTIONS>\n{}\n</INSTRUCTIONS>", prompt)
    }
}

/// What gets repeated after the body: the `<INSTRUCTIONS>` block if any,
/// otherwise the whole preface.
pub fn instruction_footer(preface: &str) -> &str {
    INSTRUCTIONS_BLOCK
        .find(preface)
        .map(|m| m.as_str())
        .unwrap_or(preface)
}

/// Places the prompt before the body and repeats its instructions after it.
pub fn wrap_with_prompt(body: &str, prompt: Option<&str>) -> String {
    let Some(prompt) = prompt.filter(|p| !p.is_empty()) else {
        return body.to_string();
    };
    let preface = instruction_preface(prompt);
    let bottom = instruction_footer(&preface);
    [preface.as_str(), "", body, "", bottom].join("\n")
}
