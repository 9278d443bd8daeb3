use std::path::PathBuf;

use thiserror::Error;

use crate::model::PipelineVariant;

/// Failures raised by the statistics core.
///
/// Data problems (`NotFound`, `SegmentMismatch`, `Parse`, `Io`) abort a single
/// dataset. `InvalidInput` and `DimensionMismatch` mean the caller built its
/// inputs wrong and are propagated unchanged.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("no results for dataset {dataset}{}", variant_suffix(.variant))]
    NotFound {
        dataset: String,
        variant: Option<PipelineVariant>,
    },

    #[error("segments of dataset {dataset} variant {variant} do not match the declared list: {detail}")]
    SegmentMismatch {
        dataset: String,
        variant: PipelineVariant,
        detail: String,
    },

    #[error("{what}: expected {expected} values, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("cannot compute improvement for {context} segment {segment}: {reason}")]
    Computation {
        context: String,
        segment: String,
        reason: String,
    },

    #[error("failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn variant_suffix(variant: &Option<PipelineVariant>) -> String {
    variant
        .map(|variant| format!(" variant {variant}"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ReportError>;
