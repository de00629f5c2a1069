//! Composition root of a simulation run.
//!
//! A run is responsible for:
//! - Wiring a [`SimulatedHost`] to a [`DestinationScheduler`]
//! - Logging every lifecycle and custom channel
//! - Driving the host from the [`StreamSimulator`] or from a recorded script
//! - Reporting the ledger once the run ends

use crate::config::{LoadedConfig, Selection};
use anyhow::Context;
use monetize_core::events::ChannelPayload;
use monetize_core::host::{SimulatedHost, StreamSimulator};
use monetize_core::{Activation, DestinationScheduler, GrandTotal, Ledger};
use monetize_sdk::objects::{LifecycleEvent, LifecycleEventKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct Simulation {
    config: LoadedConfig,
    /// Events replayed instead of running the stream simulator.
    script: Option<Vec<LifecycleEvent>>,
}

impl Simulation {
    pub fn new(config: LoadedConfig) -> Self {
        Self {
            config,
            script: None,
        }
    }

    /// Replay events from a script, one `{type, detail}` JSON record per line.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn with_script(mut self, script: &str) -> anyhow::Result<Self> {
        let mut events = Vec::new();
        for (index, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let event = LifecycleEvent::from_json(line)
                .with_context(|| format!("invalid event on script line {}", index + 1))?;
            events.push(event);
        }
        self.script = Some(events);
        Ok(self)
    }

    /// Run until the configured duration elapses or `shutdown` completes.
    pub async fn run<S>(self, shutdown: S) -> anyhow::Result<Report>
    where
        S: Future<Output = ()>,
    {
        let host = Arc::new(SimulatedHost::new());
        let scheduler = DestinationScheduler::new(host.clone(), self.config.scheduler.clone());
        log_channels(&scheduler);

        let deadline = Instant::now() + self.config.duration;
        let mode = self.config.selection.mode_name();
        info!(mode, duration_secs = self.config.duration.as_secs(), "Starting simulation");

        let activation = start_selection(&scheduler, self.config.selection);
        if let Some(error) = activation.immediate_error() {
            return Err(anyhow::Error::new(error.clone()).context("activation failed"));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = match self.script {
            Some(events) => {
                info!(events = events.len(), "Replaying script");
                for event in events {
                    host.dispatch(event);
                }
                None
            }
            None => {
                let simulator = StreamSimulator::new(host.clone(), self.config.stream);
                info!(request_id = simulator.request_id(), "Starting stream simulator");
                Some(tokio::spawn(simulator.run(shutdown_rx)))
            }
        };

        tokio::pin!(shutdown);
        let mut interrupted = false;
        tokio::select! {
            biased;

            _ = &mut shutdown => interrupted = true,

            result = activation => match result {
                Ok(router) => {
                    let destination = router
                        .start_event()
                        .map(|event| event.destination().to_string())
                        .unwrap_or_default();
                    info!(%destination, "Stream is live");
                }
                Err(e) => warn!("Activation failed: {}", e),
            },

            _ = tokio::time::sleep_until(deadline) => {
                warn!("Stream did not start before the run ended");
            }
        }

        if !interrupted {
            tokio::select! {
                _ = &mut shutdown => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }

        if shutdown_tx.send(true).is_err() {
            debug!("Stream driver already finished");
        }
        if let Some(driver) = driver {
            driver.await.context("stream simulator task failed")?;
        }

        let report = Report::new(mode, &scheduler.ledger().read());
        scheduler.teardown();
        Ok(report)
    }
}

fn start_selection(scheduler: &DestinationScheduler, selection: Selection) -> Activation {
    match selection {
        Selection::Static(destination) => scheduler.activate(Some(destination)),
        Selection::Sequential {
            destinations,
            interval,
        } => scheduler.cycle_sequential(destinations, interval, None),
        Selection::Weighted { weights, interval } => scheduler.cycle_weighted(weights, interval),
        Selection::Pluck(candidates) => scheduler.pluck(candidates),
    }
}

fn log_channels(scheduler: &DestinationScheduler) {
    let mut channels: Vec<String> = LifecycleEventKind::ALL
        .iter()
        .map(|kind| kind.channel_name().to_string())
        .collect();
    channels.extend(scheduler.config().custom_channels.iter().cloned());

    for channel in channels {
        let on_event = channel.clone();
        let on_error = channel.clone();
        scheduler
            .on(&channel)
            .on_success(move |payload| match payload {
                ChannelPayload::Lifecycle(LifecycleEvent::Progress(detail)) => debug!(
                    channel = %on_event,
                    destination = %detail.destination,
                    amount = detail.amount_delta,
                    "Received payment"
                ),
                ChannelPayload::Lifecycle(event) => info!(
                    channel = %on_event,
                    destination = %event.destination(),
                    request_id = ?event.request_id(),
                    "Lifecycle event"
                ),
                ChannelPayload::Custom(value) => {
                    info!(channel = %on_event, payload = %value, "Custom event")
                }
            })
            .on_failure(move |e| warn!(channel = %on_error, "Channel failed: {}", e));
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Ledger summary printed at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub mode: &'static str,
    pub destinations: Vec<ReportEntry>,
    /// Formatted totals keyed by currency code.
    pub grand_total: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub destination: String,
    pub amount: u64,
    pub formatted: String,
    pub currency: Option<String>,
}

const UNKNOWN_CURRENCY: &str = "unknown";

impl Report {
    pub fn new(mode: &'static str, ledger: &Ledger) -> Self {
        let mut destinations: Vec<ReportEntry> = ledger
            .entries()
            .map(|entry| ReportEntry {
                destination: entry.destination.to_string(),
                amount: entry.accumulated_amount,
                formatted: entry.formatted_amount().to_string(),
                currency: entry.currency_code.as_ref().map(ToString::to_string),
            })
            .collect();
        destinations.sort_by(|a, b| a.destination.cmp(&b.destination));

        let grand_total = match ledger.formatted_grand_total() {
            GrandTotal::Single(total) => {
                let currency = destinations
                    .iter()
                    .find_map(|entry| entry.currency.clone())
                    .unwrap_or_else(|| UNKNOWN_CURRENCY.to_string());
                BTreeMap::from([(currency, total.to_string())])
            }
            GrandTotal::PerCurrency(totals) => totals
                .into_iter()
                .map(|(currency, total)| {
                    let currency = currency
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| UNKNOWN_CURRENCY.to_string());
                    (currency, total.to_string())
                })
                .collect(),
        };

        Self {
            mode,
            destinations,
            grand_total,
        }
    }

    pub fn total_amount(&self) -> u64 {
        self.destinations
            .iter()
            .fold(0u64, |sum, entry| sum.saturating_add(entry.amount))
    }
}
