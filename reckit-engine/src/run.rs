//! Background run management.
//!
//! One OS thread per active experiment run, tracked in a mutex-guarded
//! table keyed by run name. Cancellation is cooperative: `stop` flips an
//! atomic flag that the worker polls through its [`RunSignal`] at the
//! pipeline's suspension points; nothing is ever force-terminated.

use crate::error::RunError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Lifecycle state of one tracked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Stopping,
    Done,
}

/// The cooperative stop signal handed to a worker.
///
/// The worker (and the pipelines it drives) polls `is_running` at coarse
/// suspension points; the manager owns the flag's storage.
#[derive(Debug, Clone)]
pub struct RunSignal {
    stop: Arc<AtomicBool>,
}

impl RunSignal {
    /// A stand-alone signal that stays running until `stop` is called.
    /// Useful for driving a pipeline without a manager.
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}

struct RunHandle {
    signal: RunSignal,
    status: RunStatus,
    /// Kept so the worker thread stays attached to its entry; dropped
    /// (detaching the thread) when the entry is removed on completion.
    #[allow(dead_code)]
    thread: JoinHandle<()>,
}

/// Starts, tracks, and cancels named background experiment runs.
///
/// The handle table is the only state shared across runs; everything a
/// worker touches beyond it is owned by that worker alone.
#[derive(Clone, Default)]
pub struct RunManager {
    runs: Arc<Mutex<HashMap<String, RunHandle>>>,
}

impl RunManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a background worker for `work` under `name`.
    ///
    /// Fails synchronously with [`RunError::AlreadyActive`] when a run of
    /// that name is still tracked — no background work begins.
    pub fn start<F>(&self, name: &str, work: F) -> Result<(), RunError>
    where
        F: FnOnce(RunSignal) + Send + 'static,
    {
        self.start_with_callback(name, work, |_| {})
    }

    /// Like [`RunManager::start`], with a completion callback invoked
    /// exactly once after the worker returns (normally or via stop) and
    /// its handle has been removed.
    pub fn start_with_callback<F, C>(&self, name: &str, work: F, on_done: C) -> Result<(), RunError>
    where
        F: FnOnce(RunSignal) + Send + 'static,
        C: FnOnce(&str) + Send + 'static,
    {
        let mut runs = self.lock();
        if runs.contains_key(name) {
            return Err(RunError::AlreadyActive {
                name: name.to_string(),
            });
        }

        let signal = RunSignal::new();
        let worker_signal = signal.clone();
        let table = Arc::clone(&self.runs);
        let run_name = name.to_string();
        let thread = std::thread::Builder::new()
            .name(format!("run-{name}"))
            .spawn(move || {
                info!(run = %run_name, "run started");
                work(worker_signal);
                let mut runs = table
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if let Some(mut handle) = runs.remove(&run_name) {
                    handle.status = RunStatus::Done;
                } else {
                    warn!(run = %run_name, "finished run was not tracked");
                }
                drop(runs);
                info!(run = %run_name, "run finished");
                on_done(&run_name);
            })
            .map_err(|e| RunError::Spawn {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        // The table lock is still held: the worker cannot remove its
        // entry before it is inserted.
        runs.insert(
            name.to_string(),
            RunHandle {
                signal,
                status: RunStatus::Running,
                thread,
            },
        );
        Ok(())
    }

    /// Request cooperative stop of a named run.
    ///
    /// Returns whether an active handle existed. Never blocks and never
    /// force-terminates; the worker exits at its next suspension point.
    pub fn stop(&self, name: &str) -> bool {
        let mut runs = self.lock();
        match runs.get_mut(name) {
            Some(handle) => {
                info!(run = %name, "stop requested");
                handle.signal.stop();
                handle.status = RunStatus::Stopping;
                true
            }
            None => false,
        }
    }

    /// Request cooperative stop of every active run.
    pub fn stop_all(&self) {
        let mut runs = self.lock();
        for (name, handle) in runs.iter_mut() {
            info!(run = %name, "stop requested");
            handle.signal.stop();
            handle.status = RunStatus::Stopping;
        }
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Status of a tracked run; `None` once the handle is removed.
    pub fn status(&self, name: &str) -> Option<RunStatus> {
        self.lock().get(name).map(|h| h.status)
    }

    /// Names of all active runs, sorted for deterministic listings.
    pub fn list_active(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RunHandle>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
