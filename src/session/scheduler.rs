//! Background rescan scheduling: debounce, coalesce, cancel, tag with a generation.
//!
//! The scheduler thread owns no selection state. Each scan runs on its own
//! thread and reports back over the event channel; the session decides
//! whether a result is still current.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, unbounded};
use tracing::{debug, warn};

use crate::config::SelectionPolicy;
use crate::core::scanner::{CancelToken, DEFAULT_CONCURRENCY, ScanControl, scan_with};
use crate::core::ScanResult;
use crate::error::Result;
use crate::fs::ToolIgnoreMode;
use crate::utils::tokens::TokenCounter;

/// Quiet period before a requested rescan starts.
pub const RESCAN_DEBOUNCE: Duration = Duration::from_millis(150);

/// Upper bound on how long the scheduler sleeps with nothing to do.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Messages from background scans to the session.
#[derive(Debug)]
pub enum SessionEvent {
    Progress {
        generation: u64,
        done: usize,
        total: usize,
    },
    Scanned {
        generation: u64,
        result: Result<ScanResult>,
    },
}

enum Command {
    Rescan(SelectionPolicy),
    Finished(u64),
    Shutdown,
}

struct Running {
    generation: u64,
    cancel: CancelToken,
}

pub struct RescanScheduler {
    commands: Sender<Command>,
    generation: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl RescanScheduler {
    pub fn spawn(
        counter: Arc<dyn TokenCounter>,
        events: Sender<SessionEvent>,
        debounce: Duration,
    ) -> Self {
        let (commands, inbox) = unbounded::<Command>();
        let generation = Arc::new(AtomicU64::new(0));

        let loop_commands = commands.clone();
        let loop_generation = Arc::clone(&generation);
        let handle = thread::Builder::new()
            .name("cpai-rescan".into())
            .spawn(move || {
                let mut pending: Option<SelectionPolicy> = None;
                let mut deadline: Option<Instant> = None;
                let mut queued: Option<SelectionPolicy> = None;
                let mut running: Option<Running> = None;

                let start = |policy: SelectionPolicy| -> Running {
                    let generation = loop_generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let cancel = CancelToken::new();
                    spawn_scan(
                        generation,
                        policy,
                        Arc::clone(&counter),
                        cancel.clone(),
                        events.clone(),
                        loop_commands.clone(),
                    );
                    Running { generation, cancel }
                };

                loop {
                    let wait = deadline
                        .map(|d| d.saturating_duration_since(Instant::now()))
                        .unwrap_or(IDLE_WAIT);
                    match inbox.recv_timeout(wait) {
                        Ok(Command::Rescan(policy)) => {
                            pending = Some(policy);
                            deadline = Some(Instant::now() + debounce);
                        }
                        Ok(Command::Finished(generation)) => {
                            if running.as_ref().is_some_and(|r| r.generation == generation) {
                                running = None;
                                if let Some(policy) = queued.take() {
                                    running = Some(start(policy));
                                }
                            }
                        }
                        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                            if let Some(r) = &running {
                                r.cancel.cancel();
                            }
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            deadline = None;
                            let Some(policy) = pending.take() else {
                                continue;
                            };
                            match &running {
                                // Supersede the in-flight scan; at most one run waits behind it.
                                Some(r) => {
                                    r.cancel.cancel();
                                    queued = Some(policy);
                                }
                                None => running = Some(start(policy)),
                            }
                        }
                    }
                }
                debug!("rescan scheduler stopped");
            });

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                warn!("could not start rescan scheduler: {}", e);
                None
            }
        };

        Self {
            commands,
            generation,
            handle,
        }
    }

    /// Asks for a rescan under `policy`. Bursts within the debounce window
    /// collapse into one scan.
    pub fn request(&self, policy: SelectionPolicy) {
        let _ = self.commands.send(Command::Rescan(policy));
    }

    /// Generation of the most recently started scan; 0 before the first.
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Drop for RescanScheduler {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn spawn_scan(
    generation: u64,
    policy: SelectionPolicy,
    counter: Arc<dyn TokenCounter>,
    cancel: CancelToken,
    events: Sender<SessionEvent>,
    commands: Sender<Command>,
) {
    let fallback = commands.clone();
    let spawned = thread::Builder::new()
        .name(format!("cpai-scan-gen{generation}"))
        .spawn(move || {
            debug!(generation, "rescan started");
            let progress = |done: usize, total: usize| {
                let _ = events.send(SessionEvent::Progress {
                    generation,
                    done,
                    total,
                });
            };
            let control = ScanControl {
                concurrency: DEFAULT_CONCURRENCY,
                on_progress: Some(&progress),
                cancel: Some(cancel),
            };
            let result = scan_with(
                &policy,
                counter.as_ref(),
                ToolIgnoreMode::AutoDeselect,
                &control,
            );
            let _ = events.send(SessionEvent::Scanned { generation, result });
            let _ = commands.send(Command::Finished(generation));
        });
    if let Err(e) = spawned {
        warn!("could not start rescan: {}", e);
        let _ = fallback.send(Command::Finished(generation));
    }
}
