use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::CommonArgs;
use crate::improvement::ImprovementSummary;
use crate::model::{DatasetFailure, RelativeMetricKind};
use crate::store::{ResultStore, VariantSelection, read_segment_list, segments_path};

pub type DatasetImprovements = BTreeMap<RelativeMetricKind, ImprovementSummary>;

/// Outcome of one pass over the requested datasets.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub store: ResultStore,
    pub improvements: BTreeMap<String, DatasetImprovements>,
    pub failures: Vec<DatasetFailure>,
}

/// Rejects variant combinations that would make the comparison meaningless.
pub fn validate_variants(args: &CommonArgs) -> Result<()> {
    if args.baseline_variant == args.proposed_variant {
        bail!(
            "invalid input: baseline and proposed variant are both {}",
            args.baseline_variant
        );
    }
    if args.proposed_variant == args.reference_variant {
        bail!(
            "invalid input: proposed variant {} is the table reference variant",
            args.proposed_variant
        );
    }
    Ok(())
}

/// Loads each dataset in declared order, optionally printing its RPE
/// improvement summary to `out`.
///
/// A dataset whose segment list or required results cannot be loaded is
/// reported to `out`, logged, and skipped.
pub fn process_datasets<W: Write>(
    args: &CommonArgs,
    variants: &VariantSelection,
    with_improvement: bool,
    out: &mut W,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    let dataset_names = args.dataset_names();

    for dataset in &dataset_names {
        let segments = match read_segment_list(&segments_path(&args.results_root, dataset)) {
            Ok(segments) => segments,
            Err(err) => {
                record_failure(&mut outcome, out, dataset, "segments", &err)?;
                continue;
            }
        };

        let loaded = outcome
            .store
            .load_variants(
                &args.results_root,
                dataset,
                segments,
                variants,
                args.results_format,
            )
            .map(|_| ());
        if let Err(err) = loaded {
            record_failure(&mut outcome, out, dataset, "results", &err)?;
            continue;
        }

        if with_improvement {
            let improvements = compute_improvements(&outcome.store, dataset, args)?;
            write_improvements(out, dataset, args, &improvements)?;
            outcome.improvements.insert(dataset.clone(), improvements);
        }
    }

    info!(
        requested = dataset_names.len(),
        loaded = outcome.store.len(),
        failed = outcome.failures.len(),
        "dataset pass complete"
    );

    if outcome.store.is_empty() {
        bail!("none of the {} requested datasets could be loaded", dataset_names.len());
    }
    Ok(outcome)
}

/// Translation and rotation summaries of the proposed variant against the baseline.
pub fn compute_improvements(
    store: &ResultStore,
    dataset: &str,
    args: &CommonArgs,
) -> Result<DatasetImprovements> {
    let segments = store.dataset(dataset)?.segments();

    let mut improvements = BTreeMap::new();
    for kind in RelativeMetricKind::ALL {
        let baseline = store.relative_series(dataset, args.baseline_variant, kind)?;
        let proposed = store.relative_series(dataset, args.proposed_variant, kind)?;
        let summary = ImprovementSummary::compute(
            &format!("{dataset} {kind}"),
            segments,
            &baseline,
            &proposed,
        )
        .with_context(|| format!("improvement of {dataset} {kind}"))?;
        improvements.insert(kind, summary);
    }
    Ok(improvements)
}

fn record_failure<W: Write>(
    outcome: &mut BatchOutcome,
    out: &mut W,
    dataset: &str,
    stage: &str,
    err: &crate::error::ReportError,
) -> Result<()> {
    warn!(dataset, stage, error = %err, "skipping dataset");
    writeln!(out, "{dataset}")?;
    writeln!(out, "  skipped: {stage} stage failed: {err}")?;
    outcome.failures.push(DatasetFailure {
        dataset: dataset.to_string(),
        stage: stage.to_string(),
        error: err.to_string(),
    });
    Ok(())
}

fn write_improvements<W: Write>(
    out: &mut W,
    dataset: &str,
    args: &CommonArgs,
    improvements: &DatasetImprovements,
) -> Result<()> {
    writeln!(out, "{dataset}")?;
    for (kind, summary) in improvements {
        writeln!(
            out,
            "  {kind}: mean improvement {}, max improvement {}",
            format_percent(summary.mean_improvement),
            format_percent(summary.max_improvement),
        )?;
        writeln!(
            out,
            "  {kind}: mean std {} {:.4}, {} {:.4}",
            args.baseline_variant,
            summary.mean_std_baseline,
            args.proposed_variant,
            summary.mean_std_proposed,
        )?;
        if !summary.excluded_segments.is_empty() {
            writeln!(
                out,
                "  {kind}: excluded segments with zero baseline: {}",
                summary.excluded_segments.join(", ")
            )?;
        }
    }
    Ok(())
}

fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.2}%"),
        None => "n/a".to_string(),
    }
}
