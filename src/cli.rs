use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::{PipelineVariant, ResultsFormat};

pub const DEFAULT_DATASETS: [&str; 11] = [
    "MH_01_easy",
    "MH_02_easy",
    "MH_03_medium",
    "mh_04_difficult",
    "MH_05_difficult",
    "V1_01_easy",
    "V1_02_medium",
    "V1_03_difficult",
    "V2_01_easy",
    "V2_02_medium",
    "v2_03_difficult",
];

#[derive(Parser, Debug)]
#[command(
    name = "trajectory-report",
    version,
    about = "Compare pose-error statistics of trajectory estimation pipeline variants"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print RPE improvements and write the APE comparison table.
    Report(ReportArgs),
    /// Print RPE improvements of the proposed variant over the baseline.
    Improvement(CommonArgs),
    /// Write the APE comparison table.
    Table(TableArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, default_value = "results")]
    pub results_root: PathBuf,

    #[arg(long = "dataset")]
    pub datasets: Vec<String>,

    #[arg(long, value_enum, default_value_t = PipelineVariant::S)]
    pub reference_variant: PipelineVariant,

    #[arg(long, value_enum, default_value_t = PipelineVariant::SP)]
    pub baseline_variant: PipelineVariant,

    #[arg(long, value_enum, default_value_t = PipelineVariant::SPR)]
    pub proposed_variant: PipelineVariant,

    #[arg(long, value_enum, default_value_t = ResultsFormat::Yaml)]
    pub results_format: ResultsFormat,
}

impl CommonArgs {
    /// Requested datasets, falling back to the EuRoC sequence list.
    pub fn dataset_names(&self) -> Vec<String> {
        if self.datasets.is_empty() {
            DEFAULT_DATASETS.iter().map(|name| name.to_string()).collect()
        } else {
            self.datasets.clone()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long)]
    pub table_path: Option<PathBuf>,

    #[arg(long)]
    pub summary_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TableArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long)]
    pub table_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
