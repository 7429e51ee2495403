use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::extractor::Extractor;
use crate::fetcher::Fetcher;
use crate::models::{
    drop_percent, load_targets, AlertEvent, ExtractionResult, Severity, Target, TriggerKind,
};
use crate::plugins::PluginManager;
use crate::store::TargetStore;
use crate::utils::error::FetchFailure;

/// What happened to one target during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome {
    /// Not fetched; the site blocked us recently.
    CoolingDown { until: DateTime<Utc> },
    Checked(ExtractionResult),
}

#[derive(Debug, Clone)]
pub struct TargetReport {
    pub name: String,
    pub url: String,
    pub outcome: TargetOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub outcomes: Vec<TargetReport>,
    pub alerts: Vec<AlertEvent>,
}

impl CycleReport {
    pub fn successes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|r| matches!(&r.outcome, TargetOutcome::Checked(result) if result.is_success()))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|r| matches!(r.outcome, TargetOutcome::CoolingDown { .. }))
            .count()
    }
}

impl From<FetchFailure> for ExtractionResult {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::Blocked(_) => ExtractionResult::Blocked {
                reason: failure.to_string(),
            },
            FetchFailure::NotFound => ExtractionResult::NotFound { attempts: Vec::new() },
            FetchFailure::Timeout | FetchFailure::ServerError(_) | FetchFailure::Transport(_) => {
                ExtractionResult::Error {
                    reason: failure.to_string(),
                }
            }
        }
    }
}

/// Fetches one target and runs extraction with its site profile.
pub async fn check_target(fetcher: &dyn Fetcher, extractor: &Extractor, target: &Target) -> ExtractionResult {
    let profile = extractor.profile_for(target);
    debug!("Checking {} with profile {}", target.name, profile.name());

    match fetcher.fetch(&target.url).await {
        Ok(content) => extractor.extract(&content, profile).await,
        Err(failure) => failure.into(),
    }
}

/// Alert conditions for a fresh price. One event per trigger kind, `BelowTarget` first.
pub fn evaluate_alerts(
    target: &Target,
    previous: Option<Decimal>,
    price: Decimal,
    flash_sale_threshold: Decimal,
    detected_at: DateTime<Utc>,
) -> Vec<AlertEvent> {
    let severity = Severity::from_drop_percent(drop_percent(previous, target.target_price, price));
    let mut events = Vec::new();

    if price < target.target_price {
        events.push(AlertEvent::new(
            target,
            TriggerKind::BelowTarget,
            previous,
            price,
            severity,
            detected_at,
        ));
    }

    if let Some(prev) = previous.filter(|p| *p > Decimal::ZERO) {
        if (prev - price) / prev > flash_sale_threshold {
            events.push(AlertEvent::new(
                target,
                TriggerKind::FlashSale,
                previous,
                price,
                severity,
                detected_at,
            ));
        }
    }

    events
}

/// Base interval shifted by a uniform offset in `[-jitter, +jitter]` seconds,
/// never shorter than `min_delay_secs`.
pub fn jittered_delay<R: Rng + ?Sized>(
    base: Duration,
    jitter_secs: u64,
    min_delay_secs: u64,
    rng: &mut R,
) -> Duration {
    let jitter = i64::try_from(jitter_secs).unwrap_or(i64::MAX);
    let offset = if jitter == 0 { 0 } else { rng.gen_range(-jitter..=jitter) };
    let base = i64::try_from(base.as_secs()).unwrap_or(i64::MAX);
    let floor = i64::try_from(min_delay_secs).unwrap_or(i64::MAX);
    let secs = base.saturating_add(offset).max(floor);
    Duration::from_secs(secs.unsigned_abs())
}

pub struct Monitor {
    config: MonitorConfig,
    store: TargetStore,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<Extractor>,
    notifiers: PluginManager,
    target_source: Option<PathBuf>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        store: TargetStore,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<Extractor>,
        notifiers: PluginManager,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            extractor,
            notifiers,
            target_source: None,
        }
    }

    /// File the target list is re-read from when `reload_targets` is enabled.
    pub fn with_target_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_source = Some(path.into());
        self
    }

    pub fn store(&self) -> &TargetStore {
        &self.store
    }

    /// Runs one check over every target that is not cooling down.
    ///
    /// State is written only after all checks have finished; dropping the
    /// future before then aborts the in-flight checks and leaves state untouched.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Utc::now();
        let targets = self.store.targets().to_vec();
        let mut skipped = Vec::new();
        let mut pending = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for (index, target) in targets.into_iter().enumerate() {
            if let Some(state) = self.store.state(&target.url) {
                if state.is_cooling_down(started) {
                    let until = state.cooldown_until.unwrap_or(started);
                    debug!("Skipping {} (cooling down until {})", target.name, until);
                    skipped.push((index, target, until));
                    continue;
                }
                if state.cooldown_until.is_some() {
                    self.store.state_mut(&target.url).clear_expired_cooldown(started);
                    info!("Cooldown for {} expired, resuming checks", target.name);
                }
            }

            let fetcher = Arc::clone(&self.fetcher);
            let extractor = Arc::clone(&self.extractor);
            let timeout = self.config.target_timeout();
            pending.insert(index, target.clone());

            tasks.spawn(async move {
                let result = match tokio::time::timeout(
                    timeout,
                    check_target(fetcher.as_ref(), &extractor, &target),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => ExtractionResult::Error {
                        reason: format!("check timed out after {}s", timeout.as_secs()),
                    },
                };
                (index, result)
            });
        }

        let mut checked = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(target) = pending.remove(&index) {
                        checked.push((index, target, result));
                    }
                }
                Err(e) => error!("Check task failed: {}", e),
            }
        }
        // Whatever is left belongs to a task that panicked.
        for (index, target) in pending {
            checked.push((
                index,
                target,
                ExtractionResult::Error {
                    reason: "check task failed unexpectedly".to_string(),
                },
            ));
        }
        checked.sort_by_key(|(index, _, _)| *index);

        let mut alerts = Vec::new();
        let mut reports: Vec<(usize, TargetReport)> = skipped
            .into_iter()
            .map(|(index, target, until)| {
                (
                    index,
                    TargetReport {
                        name: target.name,
                        url: target.url,
                        outcome: TargetOutcome::CoolingDown { until },
                    },
                )
            })
            .collect();

        for (index, target, result) in checked {
            alerts.extend(self.apply_outcome(&target, &result, Utc::now()));
            reports.push((
                index,
                TargetReport {
                    name: target.name,
                    url: target.url,
                    outcome: TargetOutcome::Checked(result),
                },
            ));
        }
        reports.sort_by_key(|(index, _)| *index);

        // State reaches disk before any alert goes out.
        if let Err(e) = self.store.save() {
            warn!("Failed to save target state: {}", e);
        }

        if !alerts.is_empty() {
            let deliveries = self.notifiers.dispatch(&alerts).await;
            let failed = deliveries.iter().filter(|d| !d.succeeded()).count();
            if failed > 0 {
                warn!("{} of {} alert deliveries failed", failed, deliveries.len());
            }
        }

        CycleReport {
            outcomes: reports.into_iter().map(|(_, report)| report).collect(),
            alerts,
        }
    }

    fn apply_outcome(&mut self, target: &Target, result: &ExtractionResult, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let cooldown = self.config.cooldown();
        let threshold = self.config.failure_cooldown_threshold;
        let flash_sale_threshold = self.config.flash_sale_threshold;
        let state = self.store.state_mut(&target.url);

        match result {
            ExtractionResult::Success { price, tier, rule } => {
                info!("{}: ${:.2} ({} via {})", target.name, price, tier, rule);
                let alerts = evaluate_alerts(target, state.last_price, *price, flash_sale_threshold, now);
                state.record_success(*price, now);
                alerts
            }
            ExtractionResult::Blocked { reason } => {
                state.record_failure(now);
                state.enter_cooldown(now, cooldown);
                warn!(
                    "{} blocked ({}), cooling down for {} minutes",
                    target.name,
                    reason,
                    cooldown.num_minutes()
                );
                Vec::new()
            }
            other => {
                state.record_failure(now);
                warn!(
                    "{}: {} ({} consecutive failures)",
                    target.name, other, state.consecutive_failures
                );
                if let Some(limit) = threshold {
                    if state.consecutive_failures >= limit {
                        state.enter_cooldown(now, cooldown);
                        warn!(
                            "{} failed {} times in a row, cooling down for {} minutes",
                            target.name,
                            state.consecutive_failures,
                            cooldown.num_minutes()
                        );
                    }
                }
                Vec::new()
            }
        }
    }

    /// Re-reads the target source when reloading is enabled. Returns whether the list was replaced.
    pub fn reload_targets(&mut self) -> bool {
        if !self.config.reload_targets {
            return false;
        }
        let Some(path) = &self.target_source else {
            return false;
        };

        match load_targets(path) {
            Ok(targets) => {
                self.store.reload(targets);
                true
            }
            Err(e) => {
                warn!("Keeping previous targets, reload of {} failed: {}", path.display(), e);
                false
            }
        }
    }

    /// Runs cycles until `shutdown` resolves, sleeping a jittered interval between them.
    pub async fn run_forever<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut rng = StdRng::from_entropy();
        let mut cycle: u64 = 0;

        info!(
            "Monitoring {} targets every {}s (±{}s)",
            self.store.targets().len(),
            self.config.interval_secs,
            self.config.jitter_secs
        );

        loop {
            self.reload_targets();
            cycle += 1;

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, abandoning cycle {}", cycle);
                    break;
                }
                report = self.run_cycle() => {
                    info!(
                        "Cycle {} complete: {} checked, {} priced, {} cooling down, {} alerts",
                        cycle,
                        report.outcomes.len() - report.skipped(),
                        report.successes(),
                        report.skipped(),
                        report.alerts.len()
                    );
                }
            }

            let delay = jittered_delay(
                self.config.interval(),
                self.config.jitter_secs,
                self.config.min_delay_secs,
                &mut rng,
            );
            debug!("Next check in {}s", delay.as_secs());

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
