//! CLI flows: scan report, copy, watch and init.
//!
//! Library errors are typed; this layer wraps them with `anyhow` context for
//! the terminal.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{
    ConfigLayer, LayeredConfig, PROJECT_RC_JSON, SelectionPolicy, global_config_path,
    write_default_config,
};
use crate::core::{DirStats, FileEntry, OutputFormat, ScanControl, ScanResult, scan, scan_concurrent};
use crate::format::render_json;
use crate::fs::to_posix;
use crate::pack::bundle;
use crate::session::{Session, SessionUpdate, compose_prompt, load_saved_prompts};
use crate::utils::clipboard::copy_to_clipboard;
use crate::utils::display::{human_bytes, pad_plain};
use crate::utils::ignorefile::IGNORE_FILE_NAME;
use crate::utils::tokens::{OracleScope, TokenCounter};
use crate::utils::watch::{Debouncer, FileWatcher, WatchEvent};

const PATH_WIDTH: usize = 60;
const SCAN_BY_DIR_LIMIT: usize = 10;
const COPY_BY_DIR_LIMIT: usize = 20;
const WATCH_EVENT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Where to scan and which configuration to layer on top.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub root: PathBuf,
    pub profile: Option<String>,
    pub flags: ConfigLayer,
    /// Saved prompts to compose into the prompt, by name.
    pub use_prompts: Vec<String>,
    pub prompts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub json: bool,
    pub by_dir: bool,
    /// `Some` selects the concurrent scanner with a progress bar.
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    pub output: Option<PathBuf>,
    pub clip: bool,
    pub by_dir: bool,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub output: PathBuf,
}

fn resolve_policy(inv: &Invocation) -> SelectionPolicy {
    LayeredConfig::load(&inv.root, inv.profile.clone(), inv.flags.clone()).resolve(&inv.root)
}

/// Resolves the layered config for `inv`, composing any saved prompts picked
/// on the command line.
pub fn load_policy(inv: &Invocation) -> SelectionPolicy {
    let mut policy = resolve_policy(inv);
    if !inv.use_prompts.is_empty() {
        let saved = load_saved_prompts(&inv.root, inv.prompts_dir.as_deref());
        let picked = picked_prompts(inv, &saved);
        policy.prompt = compose_prompt(&saved, &picked, policy.prompt.as_deref());
    }
    policy
}

fn picked_prompts(inv: &Invocation, saved: &[crate::session::SavedPrompt]) -> BTreeSet<String> {
    let mut picked = BTreeSet::new();
    for name in &inv.use_prompts {
        if saved.iter().any(|p| &p.name == name) {
            picked.insert(name.clone());
        } else {
            warn!("saved prompt `{}` not found", name);
        }
    }
    picked
}

fn open_oracle(policy: &SelectionPolicy) -> Result<OracleScope> {
    OracleScope::open(policy.model.as_deref(), policy.encoding.as_deref())
        .context("Failed to initialise the tokenizer")
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40.blue} {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("█▓▒░  "));
    }
    pb.set_message("scanning");
    pb
}

fn run_scan_pass(
    policy: &SelectionPolicy,
    counter: &dyn TokenCounter,
    concurrency: Option<usize>,
) -> Result<ScanResult> {
    let result = match concurrency {
        Some(n) => {
            let pb = progress_bar();
            let on_progress = |done: usize, total: usize| {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
            };
            let control = ScanControl {
                concurrency: n,
                on_progress: Some(&on_progress),
                cancel: None,
            };
            let result = scan_concurrent(policy, counter, &control);
            pb.finish_and_clear();
            result
        }
        None => scan(policy, counter),
    };
    result.with_context(|| format!("Failed to scan {}", policy.root.display()))
}

#[derive(Serialize)]
struct ReportFile<'a> {
    path: &'a str,
    bytes: u64,
    lines: usize,
    tokens: usize,
    skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanReport<'a> {
    total_tokens: usize,
    total_bytes: u64,
    total_lines: usize,
    files: Vec<ReportFile<'a>>,
    by_dir: &'a BTreeMap<String, DirStats>,
}

pub fn scan_report_json(result: &ScanResult) -> Result<String> {
    let report = ScanReport {
        total_tokens: result.total_tokens,
        total_bytes: result.total_bytes,
        total_lines: result.total_lines,
        files: result
            .files
            .iter()
            .map(|f| ReportFile {
                path: &f.rel_path,
                bytes: f.bytes,
                lines: f.lines,
                tokens: f.tokens,
                skipped: f.is_skipped(),
                reason: f.skip_reason().map(|r| r.to_string()),
            })
            .collect(),
        by_dir: &result.by_directory,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn status_of(entry: &FileEntry) -> String {
    match entry.skip_reason() {
        Some(reason) => format!("skip: {}", reason),
        None => "ok".to_string(),
    }
}

pub fn write_scan_table(out: &mut dyn Write, result: &ScanResult) -> io::Result<()> {
    writeln!(
        out,
        "{} {:>10} {:>8} {:>9}  STATUS",
        pad_plain("PATH", PATH_WIDTH),
        "BYTES",
        "LINES",
        "TOKENS"
    )?;
    for f in &result.files {
        writeln!(
            out,
            "{} {:>10} {:>8} {:>9}  {}",
            pad_plain(&f.rel_path, PATH_WIDTH),
            human_bytes(f.bytes),
            f.lines,
            f.tokens,
            status_of(f)
        )?;
    }
    let counted = result.files.iter().filter(|f| !f.is_skipped()).count();
    writeln!(
        out,
        "TOTAL  files={}/{}  tokens={}  lines={}  bytes={}",
        counted,
        result.files.len(),
        result.total_tokens,
        result.total_lines,
        human_bytes(result.total_bytes)
    )
}

/// Heaviest directories by token count, ties broken by path.
pub fn write_by_dir(
    out: &mut dyn Write,
    by_dir: &BTreeMap<String, DirStats>,
    limit: usize,
) -> io::Result<()> {
    let mut dirs: Vec<(&String, &DirStats)> = by_dir.iter().collect();
    dirs.sort_by(|a, b| b.1.tokens.cmp(&a.1.tokens).then(a.0.cmp(b.0)));
    writeln!(out, "By directory:")?;
    for (dir, stats) in dirs.into_iter().take(limit) {
        writeln!(
            out,
            "  {} {:>9} tokens {:>6} files {:>10}",
            pad_plain(dir, PATH_WIDTH - 2),
            stats.tokens,
            stats.files,
            human_bytes(stats.bytes)
        )?;
    }
    Ok(())
}

/// `cpai scan`: per-file table or JSON report.
pub fn run_scan(inv: &Invocation, opts: &ScanOptions) -> Result<()> {
    let policy = load_policy(inv);
    let oracle = open_oracle(&policy)?;
    let result = run_scan_pass(&policy, oracle.tokenizer(), opts.concurrency)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if opts.json {
        writeln!(out, "{}", scan_report_json(&result)?)?;
        return Ok(());
    }
    write_scan_table(&mut out, &result)?;
    if opts.by_dir {
        writeln!(out)?;
        write_by_dir(&mut out, &result.by_directory, SCAN_BY_DIR_LIMIT)?;
    }
    Ok(())
}

fn emit(text: &str, output: Option<&Path>, clip: bool) -> Result<()> {
    match output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("Failed to write bundle to {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            writeln!(out, "{}", text)?;
        }
    }
    if clip && copy_to_clipboard(text) {
        eprintln!("copied to clipboard");
    }
    Ok(())
}

/// `cpai copy`: scan, pack, render and deliver one bundle.
pub fn run_copy(inv: &Invocation, opts: &CopyOptions) -> Result<()> {
    let policy = load_policy(inv);
    let oracle = open_oracle(&policy)?;
    let counter = oracle.tokenizer();
    let result = run_scan_pass(&policy, counter, opts.concurrency)?;
    let eligible = result.eligible();

    if policy.format == OutputFormat::Json {
        let text = render_json(&eligible, policy.json_bodies).context("Failed to render JSON")?;
        emit(&text, opts.output.as_deref(), opts.clip)?;
        let totals = ScanResult::from_files(eligible);
        eprintln!(
            "files={}  tokens={}  lines={}  bytes={}",
            totals.files.len(),
            totals.total_tokens,
            totals.total_lines,
            totals.total_bytes
        );
        return Ok(());
    }

    let bundle = bundle(&eligible, &policy, counter).context("Failed to render bundle")?;
    if let Some(budget) = policy.max_tokens
        && bundle.selected.is_empty()
        && !eligible.is_empty()
    {
        warn!("a budget of {} tokens leaves room for no files", budget);
    }
    emit(&bundle.text, opts.output.as_deref(), opts.clip)?;

    let selected = ScanResult::from_files(bundle.selected);
    eprintln!(
        "selected={}/{}  tokens≈{}  lines={}  bytes={}",
        selected.files.len(),
        eligible.len(),
        bundle.tokens,
        selected.total_lines,
        human_bytes(selected.total_bytes)
    );
    if opts.by_dir {
        write_by_dir(&mut io::stderr(), &selected.by_directory, COPY_BY_DIR_LIMIT)?;
    }
    Ok(())
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn write_watch_output(session: &Session, output: &Path) -> Result<()> {
    let bundle = session.bundle().context("Failed to render bundle")?;
    fs::write(output, &bundle.text)
        .with_context(|| format!("Failed to write bundle to {}", output.display()))?;
    info!(
        files = bundle.selected.len(),
        tokens = bundle.tokens,
        exact = bundle.exact,
        "wrote {}",
        output.display()
    );
    Ok(())
}

/// `cpai watch`: keep FILE in sync with the tree until interrupted.
pub fn run_watch(inv: &Invocation, opts: &WatchOptions) -> Result<()> {
    let mut policy = resolve_policy(inv);
    // Our own output must neither be bundled nor trigger rescans.
    let output = std::path::absolute(&opts.output).unwrap_or_else(|_| opts.output.clone());
    if let Ok(root) = policy.root.canonicalize()
        && let Some(parent) = output.parent().and_then(|p| p.canonicalize().ok())
        && let Ok(rel) = parent.strip_prefix(&root)
        && let Some(name) = output.file_name()
    {
        policy.exclude.push(globset::escape(&to_posix(&rel.join(name))));
    }

    let oracle = open_oracle(&policy)?;
    let counter: Arc<dyn TokenCounter> = Arc::new(oracle.tokenizer().clone());
    let saved = load_saved_prompts(&inv.root, inv.prompts_dir.as_deref());
    let picked = picked_prompts(inv, &saved);

    let watcher = FileWatcher::new(&policy.root)
        .with_context(|| format!("Failed to watch {}", policy.root.display()))?;
    // Saved prompts are composed by the session on every bundle.
    let mut session = Session::start(policy, counter);
    session.state.saved_prompts = saved;
    session.state.picked_prompts = picked;

    let mut debouncer = Debouncer::new(WATCH_EVENT_DEBOUNCE);
    eprintln!("watching {} -> {}", session.state.policy.root.display(), output.display());

    loop {
        while let Some(update) = session.next_update(Duration::from_millis(20)) {
            match update {
                SessionUpdate::Applied { generation } => {
                    debug!(generation, "rescan applied");
                    write_watch_output(&session, &output)?;
                }
                SessionUpdate::Failed(e) => warn!("rescan failed: {}", e),
                SessionUpdate::Progress { .. } | SessionUpdate::Stale { .. } => {}
            }
        }

        let Some(event) = watcher.next_event(Duration::from_millis(100)) else {
            debouncer.cleanup();
            continue;
        };
        let path = match &event {
            WatchEvent::Error(e) => {
                warn!("watch error: {}", e);
                continue;
            }
            other => match other.path() {
                Some(p) => p.to_path_buf(),
                None => continue,
            },
        };
        if same_path(&path, &output) || !debouncer.should_process(&path) {
            continue;
        }
        if path.file_name().is_some_and(|n| n == IGNORE_FILE_NAME) {
            info!("ignore file changed, recomputing auto-deselection");
            session.state.reload_tool_ignore();
            write_watch_output(&session, &output)?;
        } else {
            session.request_rescan();
        }
    }
}

/// `cpai init`: write the default config.
pub fn run_init(root: &Path, global: bool, force: bool) -> Result<()> {
    let path = if global {
        global_config_path().context("Failed to locate the home directory")?
    } else {
        root.join(PROJECT_RC_JSON)
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_default_config(&path).with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}
