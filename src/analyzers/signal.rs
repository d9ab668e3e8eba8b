use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use tracing::{debug, error, info, warn};

use crate::analyzers::categorize::categorize;
use crate::analyzers::normalize::{Orientation, normalize_scores};
use crate::analyzers::outliers::{ClampToBand, OutlierDetector, OutlierReport};
use crate::analyzers::trend::{weighted_slope, years_covered};
use crate::config::PipelineConfig;
use crate::storage::{SignalStore, StateYearStore};
use crate::types::{Category, SignalRecord, StateSignal, StateYearRecord};

/// Counts from one signal calculation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SignalRunSummary {
    pub states_listed: usize,
    pub states_computed: usize,
    pub states_skipped: usize,
    pub states_failed: usize,
    pub signals_saved: usize,
}

/// Derives the trend figures of one state from its yearly records.
///
/// Returns `None` when the state has no records at all.
pub fn state_signal(state: &str, mut records: Vec<StateYearRecord>, threshold: f64) -> Option<StateSignal> {
    if records.is_empty() {
        return None;
    }
    records.sort_by_key(|r| r.year);

    let physical = weighted_slope(&records, Category::BrickAndMortar);
    let ecommerce = weighted_slope(&records, Category::Ecommerce);

    Some(StateSignal {
        state: state.to_string(),
        physical_slope: physical.slope,
        ecommerce_slope: ecommerce.slope,
        physical_trend: categorize(physical.slope, threshold),
        ecommerce_trend: categorize(ecommerce.slope, threshold),
        data_points: physical.data_points + ecommerce.data_points,
        years_analyzed: years_covered(&records),
    })
}

/// Turns stored state-year data into scored, persisted signals.
pub struct SignalCalculator {
    state_years: Arc<dyn StateYearStore>,
    signals: Arc<dyn SignalStore>,
    batch_size: usize,
    batch_pause: Duration,
    trend_threshold: f64,
    detector: OutlierDetector,
}

impl SignalCalculator {
    pub fn new(state_years: Arc<dyn StateYearStore>, signals: Arc<dyn SignalStore>, config: &PipelineConfig) -> Self {
        Self {
            state_years,
            signals,
            batch_size: config.signal_batch_size.max(1),
            batch_pause: config.signal_batch_pause,
            trend_threshold: config.trend_threshold,
            detector: OutlierDetector::new(config.outlier_std_multiple, Box::new(ClampToBand)),
        }
    }

    pub fn with_detector(mut self, detector: OutlierDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Computes trends for every state with data, normalizes them across
    /// states and saves one signal per state.
    ///
    /// Listing the states is the only fatal step. A state whose records cannot
    /// be loaded, or whose signal cannot be saved, is logged and left out.
    pub async fn calculate_all(&self) -> Result<SignalRunSummary> {
        let states = self
            .state_years
            .list_states_with_any_data()
            .await
            .context("listing states with data")?;

        let mut summary = SignalRunSummary {
            states_listed: states.len(),
            ..Default::default()
        };
        info!(states = states.len(), batch_size = self.batch_size, "Calculating state signals");

        let mut computed: Vec<StateSignal> = Vec::with_capacity(states.len());
        let batch_count = states.len().div_ceil(self.batch_size);

        for (batch_idx, batch) in states.chunks(self.batch_size).enumerate() {
            let mut tasks = Vec::with_capacity(batch.len());

            for state in batch {
                let store = self.state_years.clone();
                let task_state = state.clone();
                let threshold = self.trend_threshold;
                let span = tracing::info_span!("state_signal", state = %state);

                let task = tokio::spawn(
                    async move {
                        let records = store
                            .get_all_state_year_records(&task_state)
                            .await
                            .with_context(|| format!("loading records for {task_state}"))?;
                        debug!(records = records.len(), "Records loaded");
                        Ok::<_, anyhow::Error>(state_signal(&task_state, records, threshold))
                    }
                    .instrument(span),
                );
                tasks.push((state.clone(), task));
            }

            for (state, task) in tasks {
                match task.await {
                    Ok(Ok(Some(signal))) => computed.push(signal),
                    Ok(Ok(None)) => {
                        summary.states_skipped += 1;
                        info!(state = %state, "No stored years for state, skipping");
                    }
                    Ok(Err(e)) => {
                        summary.states_failed += 1;
                        error!(state = %state, error = %e, "State trend calculation failed");
                    }
                    Err(e) => {
                        summary.states_failed += 1;
                        error!(state = %state, error = %e, "State trend task aborted");
                    }
                }
            }

            if batch_idx + 1 < batch_count && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
        }
        summary.states_computed = computed.len();

        let physical_slopes: HashMap<String, f64> =
            computed.iter().map(|s| (s.state.clone(), s.physical_slope)).collect();
        let ecommerce_slopes: HashMap<String, f64> =
            computed.iter().map(|s| (s.state.clone(), s.ecommerce_slope)).collect();

        let physical_scores = normalize_scores(&physical_slopes, Orientation::Inverted);
        let ecommerce_scores = normalize_scores(&ecommerce_slopes, Orientation::Direct);

        let calculated_at = Utc::now();
        for signal in computed {
            let physical_score = physical_scores.get(&signal.state).copied().unwrap_or(f64::NAN);
            let ecommerce_score = ecommerce_scores.get(&signal.state).copied().unwrap_or(f64::NAN);
            if physical_score.is_nan() || ecommerce_score.is_nan() {
                warn!(state = %signal.state, "Degenerate score distribution, saving NaN score");
            }

            let record = SignalRecord {
                state: signal.state,
                timestamp: calculated_at,
                calculated_at,
                physical_slope: signal.physical_slope,
                physical_trend: signal.physical_trend,
                ecommerce_slope: signal.ecommerce_slope,
                ecommerce_trend: signal.ecommerce_trend,
                physical_score,
                ecommerce_score,
                data_points: signal.data_points,
                years_analyzed: signal.years_analyzed,
            };

            match self.signals.save_signal(&record).await {
                Ok(()) => summary.signals_saved += 1,
                Err(e) => error!(state = %record.state, error = %e, "Failed to save signal"),
            }
        }

        info!(
            computed = summary.states_computed,
            skipped = summary.states_skipped,
            failed = summary.states_failed,
            saved = summary.signals_saved,
            "Signal calculation complete"
        );
        Ok(summary)
    }

    /// Latest physical-retail scores per state, outlier-corrected.
    pub async fn physical_scores(&self) -> Result<OutlierReport> {
        let scores: HashMap<String, f64> = self
            .signals
            .get_all_signals()
            .await?
            .into_iter()
            .map(|s| (s.state, s.physical_score))
            .collect();

        let report = self.detector.detect(&scores);
        if !report.outliers.is_empty() {
            info!(outliers = ?report.outliers, "Corrected outlying physical scores");
        }
        Ok(report)
    }

    /// Latest e-commerce scores per state, as stored.
    pub async fn ecommerce_scores(&self) -> Result<HashMap<String, f64>> {
        Ok(self
            .signals
            .get_all_signals()
            .await?
            .into_iter()
            .map(|s| (s.state, s.ecommerce_score))
            .collect())
    }
}
