//! Per-state accumulation of location quotients for a single year.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::ingest::classify::CategoryTag;
use crate::types::StateYearRecord;

/// Running LQ sums for one state, one map per category.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StateAggregate {
    pub brick_and_mortar: HashMap<String, f64>,
    pub ecommerce: HashMap<String, f64>,
}

impl StateAggregate {
    pub fn is_empty(&self) -> bool {
        self.brick_and_mortar.is_empty() && self.ecommerce.is_empty()
    }
}

/// Aggregation state for one year's stream. Owned by a single year run and
/// dropped once that year's records have been materialized.
#[derive(Debug, Default)]
pub struct YearAccumulator {
    states: HashMap<&'static str, StateAggregate>,
}

impl YearAccumulator {
    /// Adds `lq` to every category the tag selects and returns how many
    /// categories received it.
    pub fn add(&mut self, state: &'static str, industry_code: &str, lq: f64, tag: CategoryTag) -> usize {
        let aggregate = self.states.entry(state).or_default();
        let mut contributed = 0;

        if tag.is_brick_and_mortar {
            *aggregate
                .brick_and_mortar
                .entry(industry_code.to_string())
                .or_insert(0.0) += lq;
            contributed += 1;
        }

        if tag.is_ecommerce {
            *aggregate
                .ecommerce
                .entry(industry_code.to_string())
                .or_insert(0.0) += lq;
            contributed += 1;
        }

        contributed
    }

    pub fn state(&self, state: &str) -> Option<&StateAggregate> {
        self.states.get(state)
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Turns the accumulated sums into persistable records, dropping states
    /// that never received a categorized row.
    pub fn into_records(self, year: i32, timestamp: DateTime<Utc>) -> Vec<StateYearRecord> {
        let mut records: Vec<StateYearRecord> = self
            .states
            .into_iter()
            .filter(|(_, aggregate)| !aggregate.is_empty())
            .map(|(state, aggregate)| StateYearRecord {
                state: state.to_string(),
                year,
                timestamp,
                brick_and_mortar_codes: aggregate.brick_and_mortar,
                ecommerce_codes: aggregate.ecommerce,
            })
            .collect();

        records.sort_by(|a, b| a.state.cmp(&b.state));
        records
    }
}
