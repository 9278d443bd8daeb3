use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::improvement::ImprovementSummary;

/// Estimation pipeline configurations under comparison, in declared order.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
pub enum PipelineVariant {
    /// Structureless factors only.
    #[value(name = "S")]
    S,
    /// Structureless and projection factors.
    #[value(name = "SP")]
    SP,
    /// Structureless, projection and regularity factors.
    #[value(name = "SPR")]
    SPR,
}

impl PipelineVariant {
    pub const ALL: [PipelineVariant; 3] = [Self::S, Self::SP, Self::SPR];

    /// Directory name of the variant under a dataset directory.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::SP => "SP",
            Self::SPR => "SPR",
        }
    }

    /// Column-group heading used in the comparison table.
    pub fn table_label(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::SP => "S + P",
            Self::SPR => "S + P + R",
        }
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelativeMetricKind {
    #[serde(rename = "rpe_trans")]
    Translation,
    #[serde(rename = "rpe_rot")]
    Rotation,
}

impl RelativeMetricKind {
    pub const ALL: [RelativeMetricKind; 2] = [Self::Translation, Self::Rotation];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Translation => "rpe_trans",
            Self::Rotation => "rpe_rot",
        }
    }
}

impl fmt::Display for RelativeMetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsoluteMetricKind {
    Median,
    Mean,
    Rmse,
}

impl AbsoluteMetricKind {
    pub const ALL: [AbsoluteMetricKind; 3] = [Self::Median, Self::Mean, Self::Rmse];

    pub fn value_of(self, stats: &AbsoluteErrorStats) -> f64 {
        match self {
            Self::Median => stats.median,
            Self::Mean => stats.mean,
            Self::Rmse => stats.rmse,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResultsFormat {
    Yaml,
    Json,
}

impl ResultsFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Yaml => "results.yaml",
            Self::Json => "results.json",
        }
    }
}

/// Absolute pose error summary, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteErrorStats {
    pub median: f64,
    pub mean: f64,
    pub rmse: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeErrorStats {
    pub median: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentErrors {
    pub rpe_trans: RelativeErrorStats,
    pub rpe_rot: RelativeErrorStats,
}

impl SegmentErrors {
    pub fn get(&self, kind: RelativeMetricKind) -> RelativeErrorStats {
        match kind {
            RelativeMetricKind::Translation => self.rpe_trans,
            RelativeMetricKind::Rotation => self.rpe_rot,
        }
    }
}

/// On-disk shape of `<results_root>/<dataset>/<variant>/results.<format>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub absolute_errors: AbsoluteErrorStats,
    pub relative_errors: BTreeMap<String, SegmentErrors>,
}

/// Relative error statistics of one variant, aligned to the declared segments.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativeSeries {
    pub medians: Vec<f64>,
    pub stds: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceHash {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetFailure {
    pub dataset: String,
    pub stage: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub improvements: BTreeMap<RelativeMetricKind, ImprovementSummary>,
    pub winners: BTreeMap<AbsoluteMetricKind, Vec<PipelineVariant>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub results_root: String,
    pub reference_variant: PipelineVariant,
    pub baseline_variant: PipelineVariant,
    pub proposed_variant: PipelineVariant,
    pub datasets: Vec<DatasetReport>,
    pub failures: Vec<DatasetFailure>,
    pub source_hashes: Vec<SourceHash>,
    pub table_path: String,
}
