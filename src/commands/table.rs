use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{CommonArgs, TableArgs};
use crate::commands::batch::{process_datasets, validate_variants};
use crate::model::PipelineVariant;
use crate::store::{ResultStore, VariantSelection};
use crate::table::{TABLE_FILE_NAME, TableLayout, render_table};
use crate::util::write_text;
use crate::winners::{DatasetWinners, select_winners};

pub fn run(args: TableArgs) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    execute(&args, &mut output)?;
    output.flush()?;
    Ok(())
}

/// Returns the path the table was written to, or `None` on a dry run.
pub fn execute<W: Write>(args: &TableArgs, out: &mut W) -> Result<Option<PathBuf>> {
    validate_variants(&args.common)?;

    let variants = VariantSelection::required([args.common.proposed_variant])
        .with_optional(table_variants(&args.common));
    let outcome = process_datasets(&args.common, &variants, false, out)?;
    let (_, table) = build_table(&outcome.store, &args.common)?;

    if args.dry_run {
        write!(out, "{table}")?;
        info!(rows = outcome.store.len(), "table dry-run complete");
        return Ok(None);
    }

    let path = table_path(args.table_path.as_deref(), &args.common.results_root);
    write_text(&path, &table)?;
    info!(path = %path.display(), rows = outcome.store.len(), "wrote APE table");
    Ok(Some(path))
}

/// Column variants of the table: everything except the reference.
pub fn table_variants(args: &CommonArgs) -> Vec<PipelineVariant> {
    PipelineVariant::ALL
        .into_iter()
        .filter(|variant| *variant != args.reference_variant)
        .collect()
}

pub fn table_path(explicit: Option<&Path>, results_root: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| results_root.join(TABLE_FILE_NAME))
}

/// Selects winners over every loaded dataset and renders the comparison table.
pub fn build_table(
    store: &ResultStore,
    args: &CommonArgs,
) -> Result<(BTreeMap<String, DatasetWinners>, String)> {
    let winners =
        select_winners(store, args.reference_variant).context("failed to select winners")?;
    let layout = TableLayout::excluding(args.reference_variant, args.proposed_variant);
    let table = render_table(store, &winners, &layout).context("failed to render APE table")?;
    Ok((winners, table))
}
