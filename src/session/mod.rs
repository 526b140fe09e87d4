//! Long-lived interactive session: selection state owned by one foreground
//! owner, fed by background rescans over a channel.

pub mod prompts;
pub mod scheduler;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use tracing::{debug, warn};

use crate::config::SelectionPolicy;
use crate::core::{DirTree, FileEntry, ScanResult, TreeRow};
use crate::error::{CpaiError, Result};
use crate::format::root_name;
use crate::fs::auto_deselect;
use crate::pack::{Bundle, bundle};
use crate::utils::ignorefile::load_tool_ignore;
use crate::utils::tokens::TokenCounter;

pub use prompts::{SavedPrompt, compose_prompt, load_saved_prompts};
pub use scheduler::{RESCAN_DEBOUNCE, RescanScheduler, SessionEvent};

/// What the user has switched on and off, over the latest listing.
#[derive(Debug, Clone)]
pub struct SelectionState {
    pub policy: SelectionPolicy,
    /// Non-skipped files from the last applied scan, in discovery order.
    pub files: Vec<FileEntry>,
    pub manual_excluded: BTreeSet<String>,
    /// Switched off by the tool ignore file.
    pub auto_deselected: BTreeSet<String>,
    /// Auto-deselected files the user turned back on.
    pub forced_included: BTreeSet<String>,
    /// Expanded directory paths in the tree view; `.` is the root.
    pub expanded: HashSet<String>,
    pub saved_prompts: Vec<SavedPrompt>,
    pub picked_prompts: BTreeSet<String>,
}

impl SelectionState {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            policy,
            files: Vec::new(),
            manual_excluded: BTreeSet::new(),
            auto_deselected: BTreeSet::new(),
            forced_included: BTreeSet::new(),
            expanded: HashSet::from([".".to_string()]),
            saved_prompts: Vec::new(),
            picked_prompts: BTreeSet::new(),
        }
    }

    /// Replaces the listing and drops selection keys that no longer exist.
    pub fn apply_scan(&mut self, result: ScanResult) {
        self.files = result.files.into_iter().filter(|f| !f.is_skipped()).collect();
        self.auto_deselected = result.auto_deselected;

        let known: HashSet<&str> = self.files.iter().map(|f| f.rel_path.as_str()).collect();
        self.manual_excluded.retain(|p| known.contains(p.as_str()));
        self.forced_included
            .retain(|p| known.contains(p.as_str()) && self.auto_deselected.contains(p));
    }

    /// Recomputes auto-deselection after the ignore file changed, without a rescan.
    pub fn reload_tool_ignore(&mut self) {
        self.auto_deselected = if self.policy.use_tool_ignore {
            let patterns = load_tool_ignore(&self.policy.root);
            auto_deselect(self.files.iter().map(|f| f.rel_path.as_str()), &patterns)
        } else {
            BTreeSet::new()
        };
        let auto = &self.auto_deselected;
        self.forced_included.retain(|p| auto.contains(p));
    }

    pub fn is_included(&self, rel_path: &str) -> bool {
        if self.manual_excluded.contains(rel_path) {
            return false;
        }
        !self.auto_deselected.contains(rel_path) || self.forced_included.contains(rel_path)
    }

    /// Flips one file and returns its new state.
    pub fn toggle(&mut self, rel_path: &str) -> bool {
        if self.is_included(rel_path) {
            self.forced_included.remove(rel_path);
            self.manual_excluded.insert(rel_path.to_string());
            false
        } else {
            self.manual_excluded.remove(rel_path);
            if self.auto_deselected.contains(rel_path) {
                self.forced_included.insert(rel_path.to_string());
            }
            true
        }
    }

    /// Includes every file under `dir` unless all of them already are, in
    /// which case excludes them all.
    pub fn toggle_dir(&mut self, dir: &str) {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let members: Vec<String> = self
            .files
            .iter()
            .filter(|f| dir == "." || f.rel_path.starts_with(&prefix))
            .map(|f| f.rel_path.clone())
            .collect();
        let all_included = members.iter().all(|p| self.is_included(p));
        for path in members {
            if self.is_included(&path) == all_included {
                self.toggle(&path);
            }
        }
    }

    /// Back to the defaults: nothing manually excluded, auto-deselected files off.
    pub fn select_all(&mut self) {
        self.manual_excluded.clear();
        self.forced_included.clear();
    }

    pub fn select_none(&mut self) {
        self.manual_excluded = self.files.iter().map(|f| f.rel_path.clone()).collect();
    }

    pub fn invert(&mut self) {
        let paths: Vec<String> = self.files.iter().map(|f| f.rel_path.clone()).collect();
        for path in paths {
            self.toggle(&path);
        }
    }

    pub fn eligible(&self) -> Vec<FileEntry> {
        self.files
            .iter()
            .filter(|f| self.is_included(&f.rel_path))
            .cloned()
            .collect()
    }

    /// Flattened tree for display.
    pub fn tree_rows(&self) -> Vec<TreeRow<'_>> {
        let tree = DirTree::build(&self.files, &root_name(&self.policy.root));
        let eligible: HashSet<&str> = self
            .files
            .iter()
            .filter(|f| self.is_included(&f.rel_path))
            .map(|f| f.rel_path.as_str())
            .collect();
        tree.visible_rows(&self.expanded, &eligible)
    }

    pub fn toggle_expanded(&mut self, dir: &str) {
        if !self.expanded.remove(dir) {
            self.expanded.insert(dir.to_string());
        }
    }

    /// The policy with picked saved prompts composed into the prompt text.
    pub fn effective_policy(&self) -> SelectionPolicy {
        let mut policy = self.policy.clone();
        policy.prompt = compose_prompt(
            &self.saved_prompts,
            &self.picked_prompts,
            self.policy.prompt.as_deref(),
        );
        policy
    }

    pub fn bundle(&self, counter: &dyn TokenCounter) -> Result<Bundle> {
        bundle(&self.eligible(), &self.effective_policy(), counter)
    }
}

/// Outcome of handling one [`SessionEvent`].
#[derive(Debug)]
pub enum SessionUpdate {
    Progress { done: usize, total: usize },
    Applied { generation: u64 },
    /// Superseded or cancelled; nothing changed.
    Stale { generation: u64 },
    Failed(CpaiError),
}

pub struct Session {
    pub state: SelectionState,
    counter: Arc<dyn TokenCounter>,
    events: Receiver<SessionEvent>,
    scheduler: RescanScheduler,
}

impl Session {
    pub fn start(policy: SelectionPolicy, counter: Arc<dyn TokenCounter>) -> Self {
        Self::with_debounce(policy, counter, RESCAN_DEBOUNCE)
    }

    pub fn with_debounce(
        policy: SelectionPolicy,
        counter: Arc<dyn TokenCounter>,
        debounce: Duration,
    ) -> Self {
        let (tx, events) = unbounded();
        let scheduler = RescanScheduler::spawn(Arc::clone(&counter), tx, debounce);
        let session = Self {
            state: SelectionState::new(policy),
            counter,
            events,
            scheduler,
        };
        session.request_rescan();
        session
    }

    pub fn request_rescan(&self) {
        self.scheduler.request(self.state.policy.clone());
    }

    /// Swaps the policy (rules changed) and rescans.
    pub fn set_policy(&mut self, policy: SelectionPolicy) {
        self.state.policy = policy;
        self.request_rescan();
    }

    pub fn latest_generation(&self) -> u64 {
        self.scheduler.latest_generation()
    }

    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.events
    }

    pub fn handle(&mut self, event: SessionEvent) -> SessionUpdate {
        match event {
            SessionEvent::Progress { done, total, .. } => SessionUpdate::Progress { done, total },
            SessionEvent::Scanned { generation, result } => {
                if generation != self.latest_generation() {
                    debug!(generation, latest = self.latest_generation(), "discarding stale scan");
                    return SessionUpdate::Stale { generation };
                }
                match result {
                    Ok(result) if result.cancelled => SessionUpdate::Stale { generation },
                    Ok(result) => {
                        self.state.apply_scan(result);
                        SessionUpdate::Applied { generation }
                    }
                    Err(e) => {
                        warn!("rescan failed: {}", e);
                        SessionUpdate::Failed(e)
                    }
                }
            }
        }
    }

    /// Waits up to `timeout` for the next event and handles it.
    pub fn next_update(&mut self, timeout: Duration) -> Option<SessionUpdate> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(self.handle(event)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn bundle(&self) -> Result<Bundle> {
        self.state.bundle(self.counter.as_ref())
    }
}
