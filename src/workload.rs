//! Workload pause control and the quiescence bookkeeping around an import.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadId(pub u64);

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The host's view of its running workloads.
pub trait WorkloadController: Send + Sync {
    fn list_identifiers(&self) -> Vec<WorkloadId>;
    fn is_paused(&self, id: WorkloadId) -> bool;
    /// `enforce_queue = false` pauses or resumes without re-ordering the
    /// scheduling queue.
    fn set_paused(&self, id: WorkloadId, paused: bool, enforce_queue: bool);
}

/// Pause state of every workload at the moment an import began.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PauseSnapshot {
    entries: Vec<(WorkloadId, bool)>,
}

impl PauseSnapshot {
    pub fn was_paused(&self, id: WorkloadId) -> Option<bool> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, paused)| *paused)
    }

    /// Workloads this snapshot's import paused itself.
    pub fn paused_by_import(&self) -> Vec<WorkloadId> {
        self.entries
            .iter()
            .filter(|(_, was_paused)| !was_paused)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Soft-pauses every running workload and records who was already paused.
pub fn quiesce_all(controller: &dyn WorkloadController) -> PauseSnapshot {
    let mut entries = Vec::new();
    for id in controller.list_identifiers() {
        let was_paused = controller.is_paused(id);
        if !was_paused {
            controller.set_paused(id, true, false);
        }
        entries.push((id, was_paused));
    }

    let snapshot = PauseSnapshot { entries };
    debug!(
        "Quiesced {} of {} workloads",
        snapshot.paused_by_import().len(),
        snapshot.len()
    );
    snapshot
}

/// Resumes exactly the workloads `quiesce_all` paused.
pub fn restore(controller: &dyn WorkloadController, snapshot: PauseSnapshot) {
    let resumed = snapshot.paused_by_import();
    for id in &resumed {
        controller.set_paused(*id, false, false);
    }
    debug!("Resumed {} workloads", resumed.len());
}

/// Holds a [`PauseSnapshot`] for one import attempt and restores it exactly
/// once, either through [`QuiescenceGuard::restore`] or on drop.
pub struct QuiescenceGuard {
    controller: Arc<dyn WorkloadController>,
    snapshot: Option<PauseSnapshot>,
}

impl QuiescenceGuard {
    pub fn engage(controller: Arc<dyn WorkloadController>) -> Self {
        let snapshot = quiesce_all(controller.as_ref());
        Self {
            controller,
            snapshot: Some(snapshot),
        }
    }

    pub fn restore(mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            restore(self.controller.as_ref(), snapshot);
        }
    }
}

impl Drop for QuiescenceGuard {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            warn!("Import attempt abandoned, resuming quiesced workloads");
            restore(self.controller.as_ref(), snapshot);
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    queue: Vec<WorkloadId>,
    paused: FxHashMap<WorkloadId, bool>,
}

/// In-memory workload table with a scheduling queue.
///
/// A pause with `enforce_queue` moves paused workloads behind active ones;
/// a soft pause leaves the queue as it is.
#[derive(Debug, Default)]
pub struct WorkloadRegistry {
    state: RwLock<RegistryState>,
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: WorkloadId, paused: bool) {
        let mut state = self.state.write().unwrap();
        if state.paused.insert(id, paused).is_none() {
            state.queue.push(id);
        }
    }

    pub fn remove(&self, id: WorkloadId) {
        let mut state = self.state.write().unwrap();
        if state.paused.remove(&id).is_some() {
            state.queue.retain(|queued| *queued != id);
        }
    }

    pub fn queue_order(&self) -> Vec<WorkloadId> {
        self.state.read().unwrap().queue.clone()
    }
}

impl WorkloadController for WorkloadRegistry {
    fn list_identifiers(&self) -> Vec<WorkloadId> {
        self.queue_order()
    }

    fn is_paused(&self, id: WorkloadId) -> bool {
        self.state
            .read()
            .unwrap()
            .paused
            .get(&id)
            .copied()
            .unwrap_or(false)
    }

    fn set_paused(&self, id: WorkloadId, paused: bool, enforce_queue: bool) {
        let mut state = self.state.write().unwrap();
        let RegistryState {
            queue,
            paused: flags,
        } = &mut *state;

        match flags.get_mut(&id) {
            Some(flag) => *flag = paused,
            None => return,
        }

        if enforce_queue {
            // Stable: active workloads keep their order ahead of paused ones
            queue.sort_by_key(|queued| flags.get(queued).copied().unwrap_or(false));
        }
    }
}
