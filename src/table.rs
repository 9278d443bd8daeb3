use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{ReportError, Result};
use crate::model::{AbsoluteMetricKind, PipelineVariant};
use crate::store::ResultStore;
use crate::winners::DatasetWinners;

pub const TABLE_FILE_NAME: &str = "APE_table.tex";

const METERS_TO_CENTIMETERS: f64 = 100.0;
const LABEL_WIDTH: usize = 25;
const CAPTION: &str = "Accuracy of the state estimation when using Structureless factors (S), \
Structureless and Projection factors (P), and our proposed approach using Structureless, \
Projection and Regularity factors (R).";

/// Column groups of the comparison table, left to right.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub columns: Vec<PipelineVariant>,
    pub proposed: PipelineVariant,
}

impl TableLayout {
    /// Every declared variant except `reference`.
    pub fn excluding(reference: PipelineVariant, proposed: PipelineVariant) -> Self {
        Self {
            columns: PipelineVariant::ALL
                .into_iter()
                .filter(|variant| *variant != reference)
                .collect(),
            proposed,
        }
    }
}

/// Renders the full LaTeX table: header, one row per dataset in name order,
/// footer.
pub fn render_table(
    store: &ResultStore,
    winners: &BTreeMap<String, DatasetWinners>,
    layout: &TableLayout,
) -> Result<String> {
    let special = latex_special_chars()?;

    let mut table = render_header(layout);
    for dataset in store.datasets() {
        table.push_str(&render_row(
            store,
            dataset.name(),
            winners.get(dataset.name()),
            layout,
            &special,
        ));
    }
    table.push_str(&render_footer());
    Ok(table)
}

fn latex_special_chars() -> Result<Regex> {
    Regex::new(r"([_&%#$])")
        .map_err(|err| ReportError::InvalidInput(format!("latex escape pattern: {err}")))
}

pub fn escape_latex(text: &str, special: &Regex) -> String {
    special.replace_all(text, r"\${1}").into_owned()
}

/// Formats a distance in meters as centimeters with one decimal.
pub fn format_centimeters(meters: f64) -> String {
    format!("{:.1}", meters * METERS_TO_CENTIMETERS)
}

pub fn render_row(
    store: &ResultStore,
    dataset: &str,
    winners: Option<&DatasetWinners>,
    layout: &TableLayout,
    special: &Regex,
) -> String {
    let label = escape_latex(dataset, special);
    let mut row = format!("    {label:>LABEL_WIDTH$} ");

    for &variant in &layout.columns {
        let Ok(stats) = store.get_absolute_stats(dataset, variant) else {
            for _ in AbsoluteMetricKind::ALL {
                row.push_str("& -- ");
            }
            continue;
        };

        for metric in AbsoluteMetricKind::ALL {
            let value = format_centimeters(metric.value_of(stats));
            let emphasize =
                winners.is_some_and(|winners| winners.is_strict_winner(metric, variant));
            if emphasize {
                row.push_str(&format!("& \\textbf{{{value}}} "));
            } else {
                row.push_str(&format!("& {value} "));
            }
        }
    }

    row.push_str("\\\\\n");
    row
}

fn render_header(layout: &TableLayout) -> String {
    let groups = layout.columns.len();
    let value_columns = groups * AbsoluteMetricKind::ALL.len();

    let mut header = String::new();
    header.push_str("\\begin{table}[H]\n");
    header.push_str("  \\centering\n");
    header.push_str(&format!(
        "  \\begin{{tabularx}}{{\\textwidth}}{{l *{value_columns}{{Y}}}}\n"
    ));
    header.push_str("    \\toprule\n");
    header.push_str(&format!(
        "    & \\multicolumn{{{value_columns}}}{{c}}{{APE Translation}} \\\\\n"
    ));
    header.push_str(&format!("    \\cmidrule{{2-{}}}\n", value_columns + 1));

    header.push_str("    ");
    for &variant in &layout.columns {
        let suffix = if variant == layout.proposed {
            " (Proposed)"
        } else {
            ""
        };
        header.push_str(&format!(
            "& \\multicolumn{{3}}{{c}}{{\\textbf{{{}}}{suffix}}} ",
            variant.table_label()
        ));
    }
    header.push_str("\\\\\n");

    let rules: Vec<String> = (0..groups)
        .map(|group| {
            let first = 2 + group * 3;
            let trim = match (group == 0, group + 1 == groups) {
                (true, true) => "",
                (true, false) => "(r)",
                (false, true) => "(l)",
                (false, false) => "(lr)",
            };
            format!("\\cmidrule{trim}{{{first}-{}}}", first + 2)
        })
        .collect();
    if !rules.is_empty() {
        header.push_str(&format!("    {}\n", rules.join(" ")));
    }

    header.push_str("    Sequence ");
    for _ in 0..groups {
        header.push_str("& Median (cm) & Mean (cm) & RMSE (cm) ");
    }
    header.push_str("\\\\\n");
    header.push_str("    \\midrule\n");
    header
}

fn render_footer() -> String {
    format!(
        "    \\bottomrule\n  \\end{{tabularx}}%\n  \\caption{{{CAPTION}}}\n  \\label{{tab:accuracy_comparison}}\n\\end{{table}}\n"
    )
}
