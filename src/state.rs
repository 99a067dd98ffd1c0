use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::models::{Availability, Target, TargetState};

/// Last known availability per target URL.
///
/// Shared between the scheduler (the only writer during a pass) and the
/// control surface (reads and display). Every access goes through the lock, so
/// a reader sees either the previous or the new value.
#[derive(Debug, Default)]
pub struct TargetStateStore {
    states: RwLock<HashMap<String, TargetState>>,
}

impl TargetStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, target: &Target) -> TargetState {
        let states = self.states.read().await;
        states.get(&target.url).copied().unwrap_or_default()
    }

    pub async fn set(&self, target: &Target, availability: Availability) {
        let mut states = self.states.write().await;
        states.insert(target.url.clone(), TargetState::from(availability));
    }

    /// Insert `NeverObserved` for targets without an entry. Existing entries are kept.
    pub async fn initialize<'a, I>(&self, targets: I)
    where
        I: IntoIterator<Item = &'a Target>,
    {
        let mut states = self.states.write().await;
        for target in targets {
            states.entry(target.url.clone()).or_default();
        }
    }

    pub async fn snapshot(&self) -> HashMap<String, TargetState> {
        let states = self.states.read().await;
        states.clone()
    }
}

/// Operator-controlled switches read by the scheduler and dispatcher.
#[derive(Debug, Default)]
pub struct RuntimeFlags {
    alerts_enabled: AtomicBool,
    suppress_out_of_stock: AtomicBool,
}

impl RuntimeFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts_enabled(&self) -> bool {
        self.alerts_enabled.load(Ordering::SeqCst)
    }

    /// Returns true only for the call that flipped the flag on.
    pub fn enable_alerts(&self) -> bool {
        self.alerts_enabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn suppress_out_of_stock(&self) -> bool {
        self.suppress_out_of_stock.load(Ordering::SeqCst)
    }

    /// Returns false if the flag already had this value.
    pub fn set_suppress_out_of_stock(&self, suppress: bool) -> bool {
        self.suppress_out_of_stock.swap(suppress, Ordering::SeqCst) != suppress
    }
}
