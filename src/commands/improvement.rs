use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::CommonArgs;
use crate::commands::batch::{process_datasets, validate_variants};
use crate::store::VariantSelection;

pub fn run(args: CommonArgs) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    execute(&args, &mut output)?;
    output.flush()?;
    Ok(())
}

pub fn execute<W: Write>(args: &CommonArgs, out: &mut W) -> Result<()> {
    validate_variants(args)?;
    info!(
        results_root = %args.results_root.display(),
        baseline = %args.baseline_variant,
        proposed = %args.proposed_variant,
        "computing relative pose error improvements"
    );

    let variants = VariantSelection::required([args.baseline_variant, args.proposed_variant]);
    let outcome = process_datasets(args, &variants, true, out)?;

    info!(
        summarized = outcome.improvements.len(),
        failed = outcome.failures.len(),
        "improvement summary complete"
    );
    Ok(())
}
