//! Scan engine: discovery followed by classification of every candidate,
//! sequentially or on a bounded worker pool.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use crate::config::SelectionPolicy;
use crate::core::classify::classify;
use crate::core::types::{FileEntry, ScanResult};
use crate::error::Result;
use crate::fs::{Discovery, DiscoveryOptions, ToolIgnoreMode, discover};
use crate::utils::ignorefile::load_tool_ignore;
use crate::utils::tokens::TokenCounter;

pub const DEFAULT_CONCURRENCY: usize = 16;
pub const MAX_CONCURRENCY: usize = 64;

/// Cooperative cancellation flag shared between a scan and whoever owns it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Sync);

/// Knobs for one scan pass.
#[derive(Clone, Default)]
pub struct ScanControl<'a> {
    /// Worker count, clamped into `[1, 64]`. Zero means the default of 16.
    pub concurrency: usize,
    /// Called after every classified file with `(done, total)`.
    pub on_progress: Option<ProgressFn<'a>>,
    pub cancel: Option<CancelToken>,
}

impl ScanControl<'_> {
    pub fn sequential() -> Self {
        Self {
            concurrency: 1,
            ..Default::default()
        }
    }
}

pub fn clamp_concurrency(requested: usize) -> usize {
    if requested == 0 {
        DEFAULT_CONCURRENCY
    } else {
        requested.clamp(1, MAX_CONCURRENCY)
    }
}

/// Runs discovery for `policy`. Tool ignore patterns only apply when the
/// policy enables them.
pub fn discover_for(policy: &SelectionPolicy, mode: ToolIgnoreMode) -> Result<Discovery> {
    let (patterns, mode) = if policy.use_tool_ignore && mode != ToolIgnoreMode::Off {
        (load_tool_ignore(&policy.root), mode)
    } else {
        (Vec::new(), ToolIgnoreMode::Off)
    };
    let opts = DiscoveryOptions {
        root: &policy.root,
        include: &policy.include,
        exclude: &policy.exclude,
        use_gitignore: policy.use_gitignore,
        hidden: policy.hidden,
    };
    discover(&opts, &patterns, mode)
}

/// Sequential scan with tool-ignored files hidden.
pub fn scan(policy: &SelectionPolicy, counter: &dyn TokenCounter) -> Result<ScanResult> {
    scan_with(policy, counter, ToolIgnoreMode::Hide, &ScanControl::sequential())
}

/// Concurrent scan. Produces the same entries in the same order as [`scan`].
pub fn scan_concurrent(
    policy: &SelectionPolicy,
    counter: &dyn TokenCounter,
    control: &ScanControl<'_>,
) -> Result<ScanResult> {
    scan_with(policy, counter, ToolIgnoreMode::Hide, control)
}

pub fn scan_with(
    policy: &SelectionPolicy,
    counter: &dyn TokenCounter,
    mode: ToolIgnoreMode,
    control: &ScanControl<'_>,
) -> Result<ScanResult> {
    let Discovery {
        paths,
        auto_deselected,
    } = discover_for(policy, mode)?;

    let total = paths.len();
    let cancel = control.cancel.clone().unwrap_or_default();
    let slots: Vec<OnceLock<FileEntry>> = (0..total).map(|_| OnceLock::new()).collect();
    let next = AtomicUsize::new(0);
    let done = AtomicUsize::new(0);

    // Workers claim indices from a shared counter and write into their slot,
    // so output order is discovery order whatever the completion order.
    let work = || {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let idx = next.fetch_add(1, Ordering::SeqCst);
            if idx >= total {
                break;
            }
            let entry = classify(&policy.root, &paths[idx], policy.max_bytes_per_file, counter);
            let _ = slots[idx].set(entry);
            let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = control.on_progress {
                progress(finished, total);
            }
        }
    };

    let workers = clamp_concurrency(control.concurrency).min(total.max(1));
    if workers == 1 {
        work();
    } else {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("cpai-scan-{i}"))
            .build()?;
        let work = &work;
        pool.scope(|s| {
            for _ in 0..workers {
                s.spawn(move |_| work());
            }
        });
    }

    let cancelled = cancel.is_cancelled();
    let files: Vec<FileEntry> = slots.into_iter().filter_map(OnceLock::into_inner).collect();
    debug!(total, classified = files.len(), workers, cancelled, "scan finished");
    if cancelled {
        info!("scan cancelled after {} of {} files", files.len(), total);
    }

    let mut result = ScanResult::from_files(files);
    result.auto_deselected = auto_deselected;
    result.cancelled = cancelled;
    Ok(result)
}
