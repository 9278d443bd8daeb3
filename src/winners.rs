use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::model::{AbsoluteMetricKind, PipelineVariant};
use crate::stats::locate_min;
use crate::store::{DatasetResults, ResultStore};

/// Indices into a dataset's eligible variants that attain the minimum of one
/// metric. More than one index is a tie.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinnerRecord {
    pub min_value: Option<f64>,
    pub indices: Vec<usize>,
}

impl WinnerRecord {
    /// The single winning index, or `None` on a tie or when nothing was eligible.
    pub fn strict_winner(&self) -> Option<usize> {
        match self.indices.as_slice() {
            [index] => Some(*index),
            _ => None,
        }
    }

    pub fn is_tie(&self) -> bool {
        self.indices.len() > 1
    }
}

/// Winner records of one dataset for every absolute-error metric.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetWinners {
    /// Variants that competed, in declared order; record indices point here.
    pub eligible: Vec<PipelineVariant>,
    pub records: BTreeMap<AbsoluteMetricKind, WinnerRecord>,
}

impl DatasetWinners {
    pub fn record(&self, metric: AbsoluteMetricKind) -> Option<&WinnerRecord> {
        self.records.get(&metric)
    }

    /// True when `variant` alone holds the minimum of `metric`.
    pub fn is_strict_winner(&self, metric: AbsoluteMetricKind, variant: PipelineVariant) -> bool {
        self.record(metric)
            .and_then(WinnerRecord::strict_winner)
            .and_then(|index| self.eligible.get(index))
            .is_some_and(|winner| *winner == variant)
    }

    pub fn winning_variants(&self, metric: AbsoluteMetricKind) -> Vec<PipelineVariant> {
        self.record(metric)
            .map(|record| {
                record
                    .indices
                    .iter()
                    .filter_map(|index| self.eligible.get(*index).copied())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Runs the tie-aware minimum over every variant except `reference` that has
/// results for the dataset.
pub fn select_dataset_winners(
    dataset: &DatasetResults,
    store: &ResultStore,
    reference: PipelineVariant,
) -> Result<DatasetWinners> {
    let eligible: Vec<PipelineVariant> = PipelineVariant::ALL
        .into_iter()
        .filter(|variant| *variant != reference)
        .filter(|variant| dataset.variants().any(|present| present == *variant))
        .collect();

    let mut stats = Vec::with_capacity(eligible.len());
    for variant in &eligible {
        stats.push(*store.get_absolute_stats(dataset.name(), *variant)?);
    }

    let mut records = BTreeMap::new();
    for metric in AbsoluteMetricKind::ALL {
        let values: Vec<f64> = stats.iter().map(|stats| metric.value_of(stats)).collect();
        let record = if values.is_empty() {
            WinnerRecord {
                min_value: None,
                indices: Vec::new(),
            }
        } else {
            let (min_value, indices) = locate_min(&values)?;
            WinnerRecord {
                min_value: Some(min_value),
                indices,
            }
        };
        if record.is_tie() {
            debug!(
                dataset = dataset.name(),
                metric = ?metric,
                indices = ?record.indices,
                "tied minimum"
            );
        }
        records.insert(metric, record);
    }

    Ok(DatasetWinners { eligible, records })
}

/// Winner records for every dataset in the store, keyed by dataset name.
pub fn select_winners(
    store: &ResultStore,
    reference: PipelineVariant,
) -> Result<BTreeMap<String, DatasetWinners>> {
    store
        .datasets()
        .map(|dataset| {
            select_dataset_winners(dataset, store, reference)
                .map(|winners| (dataset.name().to_string(), winners))
        })
        .collect()
}
