use serde::Serialize;
use tracing::warn;

use crate::error::{ReportError, Result};
use crate::model::RelativeSeries;
use crate::stats::{max, mean};

/// Percentage improvement of the proposed variant over the baseline across a
/// segment sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImprovementSummary {
    /// One entry per declared segment; `None` where the baseline median was zero.
    pub per_segment: Vec<Option<f64>>,
    pub excluded_segments: Vec<String>,
    pub mean_improvement: Option<f64>,
    pub max_improvement: Option<f64>,
    pub mean_std_baseline: f64,
    pub mean_std_proposed: f64,
}

/// Signed improvement of `proposed` over `baseline`, in percent.
///
/// Positive means the proposed variant reduced the error. A zero baseline has
/// no defined relative change and is reported as a computation error.
pub fn percentage_improvement(
    context: &str,
    segment: &str,
    baseline: f64,
    proposed: f64,
) -> Result<f64> {
    if baseline == 0.0 {
        return Err(ReportError::Computation {
            context: context.to_string(),
            segment: segment.to_string(),
            reason: "baseline median is zero".to_string(),
        });
    }

    let improvement = (baseline - proposed) / baseline * 100.0;
    if !improvement.is_finite() {
        return Err(ReportError::Computation {
            context: context.to_string(),
            segment: segment.to_string(),
            reason: format!("non-finite result from baseline {baseline} and proposed {proposed}"),
        });
    }
    Ok(improvement)
}

impl ImprovementSummary {
    /// Compares two aligned series segment by segment.
    ///
    /// `segments` labels the positions for diagnostics and must have the same
    /// length as every series. Segments whose improvement cannot be computed
    /// are logged and left out of the mean and max.
    pub fn compute(
        context: &str,
        segments: &[String],
        baseline: &RelativeSeries,
        proposed: &RelativeSeries,
    ) -> Result<Self> {
        if segments.is_empty() {
            return Err(ReportError::DimensionMismatch {
                what: "segment list",
                expected: 1,
                actual: 0,
            });
        }
        for (what, actual) in [
            ("baseline medians", baseline.medians.len()),
            ("baseline stds", baseline.stds.len()),
            ("proposed medians", proposed.medians.len()),
            ("proposed stds", proposed.stds.len()),
        ] {
            if actual != segments.len() {
                return Err(ReportError::DimensionMismatch {
                    what,
                    expected: segments.len(),
                    actual,
                });
            }
        }

        let mut per_segment = Vec::with_capacity(segments.len());
        let mut excluded_segments = Vec::new();
        for ((segment, &base), &prop) in segments
            .iter()
            .zip(&baseline.medians)
            .zip(&proposed.medians)
        {
            match percentage_improvement(context, segment, base, prop) {
                Ok(value) => per_segment.push(Some(value)),
                Err(err) => {
                    warn!(error = %err, "segment excluded from improvement aggregates");
                    per_segment.push(None);
                    excluded_segments.push(segment.clone());
                }
            }
        }

        let valid: Vec<f64> = per_segment.iter().flatten().copied().collect();

        Ok(Self {
            mean_improvement: mean(&valid),
            max_improvement: max(&valid),
            mean_std_baseline: mean(&baseline.stds).unwrap_or_default(),
            mean_std_proposed: mean(&proposed.stds).unwrap_or_default(),
            per_segment,
            excluded_segments,
        })
    }
}
