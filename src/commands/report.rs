use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::cli::ReportArgs;
use crate::commands::batch::{BatchOutcome, process_datasets, validate_variants};
use crate::commands::table::{build_table, table_path, table_variants};
use crate::model::{AbsoluteMetricKind, DatasetReport, ReportManifest, SourceHash};
use crate::store::VariantSelection;
use crate::util::{now_utc_string, sha256_file, write_json_pretty, write_text};
use crate::winners::DatasetWinners;

pub fn run(args: ReportArgs) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    execute(&args, &mut output)?;
    output.flush()?;
    Ok(())
}

pub fn execute<W: Write>(args: &ReportArgs, out: &mut W) -> Result<ReportManifest> {
    let common = &args.common;
    validate_variants(common)?;

    let variants = VariantSelection::required([common.baseline_variant, common.proposed_variant])
        .with_optional(table_variants(common));

    info!(
        results_root = %common.results_root.display(),
        reference = %common.reference_variant,
        baseline = %common.baseline_variant,
        proposed = %common.proposed_variant,
        "report requested"
    );

    let outcome = process_datasets(common, &variants, true, out)?;
    let (winners, table) = build_table(&outcome.store, common)?;

    let path = table_path(args.table_path.as_deref(), &common.results_root);
    write_text(&path, &table)?;
    writeln!(out, "Saved table of APE results to: {}", path.display())?;
    info!(path = %path.display(), rows = outcome.store.len(), "wrote APE table");

    let manifest = build_manifest(args, &outcome, &winners, path)?;
    if let Some(summary_path) = &args.summary_path {
        write_json_pretty(summary_path, &manifest)?;
        info!(path = %summary_path.display(), "wrote report manifest");
    }

    info!(
        datasets = manifest.datasets.len(),
        failures = manifest.failures.len(),
        "report completed"
    );
    Ok(manifest)
}

fn build_manifest(
    args: &ReportArgs,
    outcome: &BatchOutcome,
    winners: &BTreeMap<String, DatasetWinners>,
    table_path: PathBuf,
) -> Result<ReportManifest> {
    let common = &args.common;

    let datasets = outcome
        .store
        .datasets()
        .map(|dataset| {
            let name = dataset.name().to_string();
            let winners: BTreeMap<_, _> = winners
                .get(&name)
                .map(|dataset_winners| {
                    AbsoluteMetricKind::ALL
                        .into_iter()
                        .map(|metric| (metric, dataset_winners.winning_variants(metric)))
                        .collect()
                })
                .unwrap_or_default();
            DatasetReport {
                improvements: outcome.improvements.get(&name).cloned().unwrap_or_default(),
                winners,
                dataset: name,
            }
        })
        .collect();

    let mut source_hashes = Vec::with_capacity(outcome.store.sources().len());
    for path in outcome.store.sources() {
        source_hashes.push(SourceHash {
            path: path.display().to_string(),
            sha256: sha256_file(path)?,
        });
    }
    source_hashes.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(ReportManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        results_root: common.results_root.display().to_string(),
        reference_variant: common.reference_variant,
        baseline_variant: common.baseline_variant,
        proposed_variant: common.proposed_variant,
        datasets,
        failures: outcome.failures.clone(),
        source_hashes,
        table_path: table_path.display().to_string(),
    })
}
