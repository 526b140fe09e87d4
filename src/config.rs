//! Layered configuration: global file, `package.json#cpai`, project rc file,
//! named profile and CLI flags, merged in that order into a [`SelectionPolicy`].

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{OutputFormat, PackOrder};
use crate::error::Result;
use crate::utils::ignorefile::global_dir;

pub const PROJECT_RC_JSON: &str = ".cpairc.json";
pub const PROJECT_RC_TOML: &str = ".cpairc.toml";
pub const GLOBAL_CONFIG_FILE: &str = "config.json";
pub const PACKAGE_KEY: &str = "cpai";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_BYTES_PER_FILE: u64 = 512_000;

pub fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

pub fn default_exclude() -> Vec<String> {
    [
        "**/{node_modules,dist,build,.git,.next,.cache,coverage}/**",
        "**/.cpaiignore",
        "**/*.{png,jpg,jpeg,gif,webp,svg,ico,bmp,pdf,zip,tgz,gz,rar,7z,mp3,mp4,ogg,webm,avi,mov,exe,dll,dylib,so,wasm,woff,woff2,ttf,eot}",
        "**/*.min.{js,css}",
        "**/*.lock",
        "**/*.log",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// One configuration source. Every field is optional; unset fields leave
/// lower layers untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_gitignore: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_cpai_ignore: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bytes_per_file: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack_order: Option<PackOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_fences: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_separator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml_wrap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags_wrap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_bodies: Option<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, ConfigLayer>,
}

fn overlay<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

fn overlay_list(slot: &mut Option<Vec<String>>, value: &Option<Vec<String>>) {
    if let Some(list) = value
        && !list.is_empty()
    {
        *slot = Some(list.clone());
    }
}

impl ConfigLayer {
    /// The defaults as written by `cpai init`. The encoding is left out so it
    /// keeps following the model.
    pub fn defaults() -> Self {
        Self {
            include: Some(default_include()),
            exclude: Some(default_exclude()),
            use_gitignore: Some(true),
            use_cpai_ignore: Some(true),
            hidden: Some(false),
            max_bytes_per_file: Some(DEFAULT_MAX_BYTES_PER_FILE),
            model: Some(DEFAULT_MODEL.to_string()),
            format: Some(OutputFormat::Markdown),
            ..Default::default()
        }
    }

    /// Lays `higher` over `self`. Scalars: last writer wins. Lists: the
    /// higher layer wins outright when non-empty. Profiles are not merged.
    pub fn merge(&mut self, higher: &ConfigLayer) {
        overlay_list(&mut self.include, &higher.include);
        overlay_list(&mut self.exclude, &higher.exclude);
        overlay(&mut self.use_gitignore, &higher.use_gitignore);
        overlay(&mut self.use_cpai_ignore, &higher.use_cpai_ignore);
        overlay(&mut self.hidden, &higher.hidden);
        overlay(&mut self.max_bytes_per_file, &higher.max_bytes_per_file);
        overlay(&mut self.model, &higher.model);
        overlay(&mut self.encoding, &higher.encoding);
        overlay(&mut self.format, &higher.format);
        overlay(&mut self.max_tokens, &higher.max_tokens);
        overlay(&mut self.pack_order, &higher.pack_order);
        overlay(&mut self.strict, &higher.strict);
        overlay(&mut self.code_fences, &higher.code_fences);
        overlay(&mut self.header, &higher.header);
        overlay(&mut self.block_separator, &higher.block_separator);
        overlay(&mut self.xml_wrap, &higher.xml_wrap);
        overlay(&mut self.tags_wrap, &higher.tags_wrap);
        overlay(&mut self.prompt, &higher.prompt);
        overlay(&mut self.prompt_file, &higher.prompt_file);
        overlay(&mut self.json_bodies, &higher.json_bodies);
    }
}

/// Everything that governs one scan + pack + render run.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    pub root: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub use_gitignore: bool,
    pub use_tool_ignore: bool,
    pub hidden: bool,
    pub max_bytes_per_file: u64,
    pub model: Option<String>,
    pub encoding: Option<String>,
    pub format: OutputFormat,
    pub max_tokens: Option<usize>,
    pub pack_order: PackOrder,
    pub strict: bool,
    pub code_fences: bool,
    pub header: Option<String>,
    pub block_separator: String,
    pub xml_wrap: bool,
    pub tags_wrap: bool,
    /// Resolved prompt text, already read from a prompt file if one was set.
    pub prompt: Option<String>,
    pub json_bodies: bool,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            include: default_include(),
            exclude: default_exclude(),
            use_gitignore: true,
            use_tool_ignore: true,
            hidden: false,
            max_bytes_per_file: DEFAULT_MAX_BYTES_PER_FILE,
            model: Some(DEFAULT_MODEL.to_string()),
            encoding: None,
            format: OutputFormat::Markdown,
            max_tokens: None,
            pack_order: PackOrder::SmallFirst,
            strict: true,
            code_fences: true,
            header: None,
            block_separator: "\n\n".to_string(),
            xml_wrap: false,
            tags_wrap: true,
            prompt: None,
            json_bodies: false,
        }
    }
}

impl SelectionPolicy {
    /// Copies every set field of a merged layer onto the policy. Prompt files
    /// are handled by [`LayeredConfig::resolve`].
    fn apply(&mut self, layer: &ConfigLayer) {
        if let Some(v) = &layer.include {
            self.include.clone_from(v);
        }
        if let Some(v) = &layer.exclude {
            self.exclude.clone_from(v);
        }
        if let Some(v) = layer.use_gitignore {
            self.use_gitignore = v;
        }
        if let Some(v) = layer.use_cpai_ignore {
            self.use_tool_ignore = v;
        }
        if let Some(v) = layer.hidden {
            self.hidden = v;
        }
        if let Some(v) = layer.max_bytes_per_file {
            self.max_bytes_per_file = v;
        }
        overlay(&mut self.model, &layer.model);
        overlay(&mut self.encoding, &layer.encoding);
        if let Some(v) = layer.format {
            self.format = v;
        }
        overlay(&mut self.max_tokens, &layer.max_tokens);
        if let Some(v) = layer.pack_order {
            self.pack_order = v;
        }
        if let Some(v) = layer.strict {
            self.strict = v;
        }
        if let Some(v) = layer.code_fences {
            self.code_fences = v;
        }
        overlay(&mut self.header, &layer.header);
        if let Some(v) = &layer.block_separator {
            self.block_separator.clone_from(v);
        }
        if let Some(v) = layer.xml_wrap {
            self.xml_wrap = v;
        }
        if let Some(v) = layer.tags_wrap {
            self.tags_wrap = v;
        }
        if let Some(v) = layer.json_bodies {
            self.json_bodies = v;
        }
    }
}

/// All five sources, kept apart until [`LayeredConfig::resolve`].
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    pub global: ConfigLayer,
    pub package: ConfigLayer,
    pub project: ConfigLayer,
    pub profile: Option<String>,
    pub flags: ConfigLayer,
}

fn read_optional(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!("ignoring unreadable config {}: {}", path.display(), e);
            None
        }
    }
}

fn parse_json_layer<T: DeserializeOwned + Default>(path: &Path, raw: &str) -> T {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("ignoring malformed config {}: {}", path.display(), e);
        T::default()
    })
}

/// `~/.cpai/config.json`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILE))
}

pub fn load_global_layer(path: &Path) -> ConfigLayer {
    read_optional(path)
        .map(|raw| parse_json_layer(path, &raw))
        .unwrap_or_default()
}

/// The `cpai` object inside `package.json`, if any.
pub fn load_package_layer(root: &Path) -> ConfigLayer {
    let path = root.join("package.json");
    let Some(raw) = read_optional(&path) else {
        return ConfigLayer::default();
    };
    let manifest: serde_json::Value = parse_json_layer(&path, &raw);
    match manifest.get(PACKAGE_KEY) {
        Some(value) if value.is_object() => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!("ignoring malformed `{}` key in {}: {}", PACKAGE_KEY, path.display(), e);
            ConfigLayer::default()
        }),
        _ => ConfigLayer::default(),
    }
}

/// `.cpairc.json`, falling back to `.cpairc.toml`.
pub fn load_project_layer(root: &Path) -> ConfigLayer {
    let json_path = root.join(PROJECT_RC_JSON);
    if let Some(raw) = read_optional(&json_path) {
        return parse_json_layer(&json_path, &raw);
    }
    let toml_path = root.join(PROJECT_RC_TOML);
    match read_optional(&toml_path) {
        Some(raw) => toml::from_str(&raw).unwrap_or_else(|e| {
            warn!("ignoring malformed config {}: {}", toml_path.display(), e);
            ConfigLayer::default()
        }),
        None => ConfigLayer::default(),
    }
}

impl LayeredConfig {
    /// Reads every file-backed layer for `root`. Missing or malformed files
    /// count as empty layers.
    pub fn load(root: &Path, profile: Option<String>, flags: ConfigLayer) -> Self {
        let global = global_config_path()
            .map(|p| load_global_layer(&p))
            .unwrap_or_default();
        Self::from_layers(global, root, profile, flags)
    }

    /// Like [`LayeredConfig::load`] with an already loaded global layer.
    pub fn from_layers(
        global: ConfigLayer,
        root: &Path,
        profile: Option<String>,
        flags: ConfigLayer,
    ) -> Self {
        Self {
            global,
            package: load_package_layer(root),
            project: load_project_layer(root),
            profile,
            flags,
        }
    }

    /// Project rc first, then package metadata, then global.
    pub fn profile_layer(&self) -> Option<&ConfigLayer> {
        let name = self.profile.as_deref()?;
        let found = self
            .project
            .profiles
            .get(name)
            .or_else(|| self.package.profiles.get(name))
            .or_else(|| self.global.profiles.get(name));
        if found.is_none() {
            warn!("profile `{}` not found in any config", name);
        }
        found
    }

    pub fn merged(&self) -> ConfigLayer {
        let mut merged = ConfigLayer::default();
        merged.merge(&self.global);
        merged.merge(&self.package);
        merged.merge(&self.project);
        if let Some(profile) = self.profile_layer() {
            merged.merge(profile);
        }
        merged.merge(&self.flags);
        merged
    }

    pub fn resolve(&self, root: &Path) -> SelectionPolicy {
        let merged = self.merged();
        let mut policy = SelectionPolicy {
            root: root.to_path_buf(),
            ..SelectionPolicy::default()
        };
        policy.apply(&merged);
        policy.prompt = resolve_prompt(root, merged.prompt_file.as_deref(), merged.prompt.as_deref());
        debug!(?policy, "resolved policy");
        policy
    }
}

/// A readable prompt file wins over inline text.
pub fn resolve_prompt(root: &Path, file: Option<&str>, text: Option<&str>) -> Option<String> {
    if let Some(file) = file.filter(|f| !f.is_empty()) {
        let path = Path::new(file);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        match fs::read_to_string(&path) {
            Ok(raw) => return Some(raw),
            Err(e) => warn!("could not read prompt file {}: {}", path.display(), e),
        }
    }
    text.filter(|t| !t.is_empty()).map(String::from)
}

/// Writes the default config as pretty JSON to `path`.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = serde_json::to_string_pretty(&ConfigLayer::defaults())?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}
