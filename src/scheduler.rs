use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::{AppConfig, ScraperConfig, SchedulerConfig};
use crate::dispatcher::{AlertDispatcher, DispatchOutcome};
use crate::fetcher::PageFetcher;
use crate::models::{Availability, Group, StatusReport, Target};
use crate::page_analyzer::PageAnalyzer;
use crate::state::{RuntimeFlags, TargetStateStore};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Polling,
    Sleeping,
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerPhase::Idle => write!(f, "idle"),
            SchedulerPhase::Polling => write!(f, "polling"),
            SchedulerPhase::Sleeping => write!(f, "sleeping"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Alert only when the stored state changes
    EdgeTriggered,
    /// Alert on every determinable status and seed the store
    Seed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassSummary {
    pub checked: usize,
    pub in_stock: usize,
    pub out_of_stock: usize,
    pub unknown: usize,
    pub alerts_sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PassSummary {
    fn record_status(&mut self, availability: Availability) {
        self.checked += 1;
        match availability {
            Availability::InStock => self.in_stock += 1,
            Availability::OutOfStock => self.out_of_stock += 1,
            Availability::Unknown => self.unknown += 1,
        }
    }

    fn record_outcome(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.alerts_sent += 1,
            DispatchOutcome::Skipped => self.skipped += 1,
            DispatchOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checked {} (in stock {}, out of stock {}, unknown {}); ",
            self.checked, self.in_stock, self.out_of_stock, self.unknown
        )?;
        write!(
            f,
            "alerts sent {}, skipped {}, failed {}",
            self.alerts_sent, self.skipped, self.failed
        )
    }
}

/// Result of a read-only check of one target.
#[derive(Debug, Clone)]
pub struct TargetCheck {
    pub group: String,
    pub target: Target,
    pub report: StatusReport,
}

pub struct MonitorScheduler {
    groups: Arc<Vec<Group>>,
    analyzer: PageAnalyzer,
    fetcher: Arc<dyn PageFetcher>,
    dispatcher: Arc<AlertDispatcher>,
    states: Arc<TargetStateStore>,
    flags: Arc<RuntimeFlags>,
    scraper_config: ScraperConfig,
    config: SchedulerConfig,
    phase: RwLock<SchedulerPhase>,
    // Serialises passes so a seed pass and an automatic pass never interleave
    pass_lock: Mutex<()>,
}

impl MonitorScheduler {
    pub fn new(
        groups: Arc<Vec<Group>>,
        fetcher: Arc<dyn PageFetcher>,
        dispatcher: Arc<AlertDispatcher>,
        states: Arc<TargetStateStore>,
        flags: Arc<RuntimeFlags>,
        config: &AppConfig,
    ) -> Result<Self, AppError> {
        Ok(Self {
            groups,
            analyzer: PageAnalyzer::new()?,
            fetcher,
            dispatcher,
            states,
            flags,
            scraper_config: config.scraper.clone(),
            config: config.scheduler.clone(),
            phase: RwLock::new(SchedulerPhase::Idle),
            pass_lock: Mutex::new(()),
        })
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub async fn phase(&self) -> SchedulerPhase {
        *self.phase.read().await
    }

    async fn set_phase(&self, phase: SchedulerPhase) {
        *self.phase.write().await = phase;
    }

    /// Background loop: poll when alerts are on, then sleep for the interval.
    pub async fn run(self: Arc<Self>) {
        self.states
            .initialize(self.groups.iter().flat_map(|g| g.targets.iter()))
            .await;

        let interval = self.config.check_interval();
        tracing::info!(
            "Monitor scheduler started for {} groups, interval {}s",
            self.groups.len(),
            interval.as_secs()
        );

        loop {
            if self.flags.alerts_enabled() {
                self.run_pass(PassMode::EdgeTriggered).await;
            } else {
                tracing::debug!("Alerts are disabled, skipping automatic pass");
            }

            self.set_phase(SchedulerPhase::Sleeping).await;
            tokio::time::sleep(interval).await;
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Turn alerts on and run the initial full pass.
    ///
    /// Returns `None` when alerts were already enabled.
    pub async fn enable_and_seed(&self) -> Option<PassSummary> {
        let _pass = self.pass_lock.lock().await;
        if !self.flags.enable_alerts() {
            return None;
        }

        tracing::info!("Alerts enabled, running initial pass");
        Some(self.pass(PassMode::Seed).await)
    }

    pub async fn run_pass(&self, mode: PassMode) -> PassSummary {
        let _pass = self.pass_lock.lock().await;
        self.pass(mode).await
    }

    /// Fetch and classify every target without alerting or touching state.
    pub async fn check_all(&self) -> Vec<TargetCheck> {
        let _pass = self.pass_lock.lock().await;
        let mut checks = Vec::new();

        for group in self.groups.iter() {
            for target in &group.targets {
                let report = self.observe(target).await;
                checks.push(TargetCheck {
                    group: group.name.clone(),
                    target: target.clone(),
                    report,
                });
            }
        }

        checks
    }

    async fn pass(&self, mode: PassMode) -> PassSummary {
        let previous_phase = self.phase().await;
        self.set_phase(SchedulerPhase::Polling).await;

        let mut summary = PassSummary::default();
        for group in self.groups.iter() {
            for target in &group.targets {
                self.poll_target(group, target, mode, &mut summary).await;
            }
        }

        tracing::info!("Pass complete ({:?}): {}", mode, summary);
        self.set_phase(previous_phase).await;
        summary
    }

    async fn poll_target(
        &self,
        group: &Group,
        target: &Target,
        mode: PassMode,
        summary: &mut PassSummary,
    ) {
        let report = self.observe(target).await;
        let availability = report.availability;
        summary.record_status(availability);

        if !availability.is_determinable() {
            tracing::info!("Status of {} is unknown, keeping previous state", target.url);
            return;
        }

        let previous = self.states.get(target).await;
        let should_alert = match mode {
            PassMode::EdgeTriggered => previous.is_transition_to(availability),
            PassMode::Seed => true,
        };

        if !should_alert {
            tracing::debug!("No change for {} ({})", target.url, availability);
            return;
        }

        tracing::info!("{}: {} -> {}", target.name, previous, availability);
        let outcome = self.dispatcher.dispatch(group, target, &report).await;
        summary.record_outcome(&outcome);

        // Advance even when delivery failed so the same transition is not re-sent
        self.states.set(target, availability).await;
    }

    /// Fetch and analyze one target, retrying timeouts a bounded number of times.
    pub async fn observe(&self, target: &Target) -> StatusReport {
        let timeout = self.scraper_config.request_timeout();
        let attempts = self.scraper_config.retry_attempts + 1;

        for attempt in 1..=attempts {
            let fetch = self.fetcher.fetch(&target.url, timeout);
            let result = match tokio::time::timeout(timeout, fetch).await {
                Ok(result) => result,
                Err(_) => Err(AppError::FetchTimeout {
                    url: target.url.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(html) => return self.analyzer.analyze(&target.url, &html),
                Err(e) if e.is_timeout() && attempt < attempts => {
                    tracing::warn!(
                        "Attempt {}/{} for {} timed out, retrying in {}ms",
                        attempt,
                        attempts,
                        target.url,
                        self.scraper_config.retry_delay_ms
                    );
                    tokio::time::sleep(self.scraper_config.retry_delay()).await;
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {}", target.url, e);
                    return StatusReport::unknown();
                }
            }
        }

        StatusReport::unknown()
    }
}
