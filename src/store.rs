use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ReportError, Result};
use crate::model::{
    AbsoluteErrorStats, PipelineVariant, RelativeErrorStats, RelativeMetricKind, RelativeSeries,
    ResultsFile, ResultsFormat,
};

pub const SEGMENTS_FILE_NAME: &str = "segments.txt";

/// Results of every loaded variant for one dataset.
///
/// Construction checks that each variant covers exactly the declared segments,
/// so relative series taken from different variants line up position by
/// position.
#[derive(Debug, Clone)]
pub struct DatasetResults {
    name: String,
    segments: Vec<String>,
    variants: BTreeMap<PipelineVariant, ResultsFile>,
}

impl DatasetResults {
    pub fn new(
        name: impl Into<String>,
        segments: Vec<String>,
        variants: BTreeMap<PipelineVariant, ResultsFile>,
    ) -> Result<Self> {
        let name = name.into();
        let declared: BTreeSet<&str> = segments.iter().map(String::as_str).collect();

        for (variant, results) in &variants {
            if results.relative_errors.len() != segments.len() {
                return Err(ReportError::SegmentMismatch {
                    dataset: name.clone(),
                    variant: *variant,
                    detail: format!(
                        "declared {} segments, results contain {}",
                        segments.len(),
                        results.relative_errors.len()
                    ),
                });
            }
            if let Some(unknown) = results
                .relative_errors
                .keys()
                .find(|label| !declared.contains(label.as_str()))
            {
                return Err(ReportError::SegmentMismatch {
                    dataset: name.clone(),
                    variant: *variant,
                    detail: format!("segment {unknown} is not declared"),
                });
            }
        }

        Ok(Self {
            name,
            segments,
            variants,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn variants(&self) -> impl Iterator<Item = PipelineVariant> + '_ {
        self.variants.keys().copied()
    }

    fn variant(&self, variant: PipelineVariant) -> Result<&ResultsFile> {
        self.variants
            .get(&variant)
            .ok_or_else(|| ReportError::NotFound {
                dataset: self.name.clone(),
                variant: Some(variant),
            })
    }
}

/// Variants to read for each dataset, in declared order.
///
/// A missing required file fails the dataset. A missing optional file is
/// skipped and the variant is simply absent from the loaded results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantSelection {
    variants: BTreeMap<PipelineVariant, bool>,
}

impl VariantSelection {
    pub fn required(variants: impl IntoIterator<Item = PipelineVariant>) -> Self {
        Self {
            variants: variants.into_iter().map(|variant| (variant, true)).collect(),
        }
    }

    /// Adds `variants` as optional unless they are already required.
    pub fn with_optional(mut self, variants: impl IntoIterator<Item = PipelineVariant>) -> Self {
        for variant in variants {
            self.variants.entry(variant).or_insert(false);
        }
        self
    }

    /// `(variant, required)` pairs in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (PipelineVariant, bool)> + '_ {
        self.variants
            .iter()
            .map(|(variant, required)| (*variant, *required))
    }
}

/// In-memory view of all loaded datasets, keyed and iterated by name.
#[derive(Debug, Default)]
pub struct ResultStore {
    datasets: BTreeMap<String, DatasetResults>,
    sources: Vec<PathBuf>,
}

impl ResultStore {
    pub fn insert(&mut self, dataset: DatasetResults) {
        self.datasets.insert(dataset.name.clone(), dataset);
    }

    /// Reads each selected variant's results for `dataset` against its parsed
    /// segment list.
    ///
    /// Nothing is inserted unless every required file and every optional file
    /// that exists loads and lines up with the declared segments.
    pub fn load_variants(
        &mut self,
        results_root: &Path,
        dataset: &str,
        segments: Vec<String>,
        selection: &VariantSelection,
        format: ResultsFormat,
    ) -> Result<&DatasetResults> {
        let dataset_dir = results_root.join(dataset);
        let mut sources = vec![segments_path(results_root, dataset)];

        let mut loaded = BTreeMap::new();
        for (variant, required) in selection.iter() {
            let path = dataset_dir.join(variant.as_str()).join(format.file_name());
            if !path.is_file() {
                if required {
                    return Err(ReportError::NotFound {
                        dataset: dataset.to_string(),
                        variant: Some(variant),
                    });
                }
                warn!(
                    dataset,
                    variant = %variant,
                    path = %path.display(),
                    "optional variant results missing"
                );
                continue;
            }
            let results = read_results_file(&path, format)?;
            debug!(dataset, variant = %variant, path = %path.display(), "read results file");
            loaded.insert(variant, results);
            sources.push(path);
        }

        let results = DatasetResults::new(dataset, segments, loaded)?;
        info!(
            dataset,
            segments = results.segments.len(),
            variants = results.variants.len(),
            "loaded dataset results"
        );

        self.sources.extend(sources);
        self.datasets.insert(dataset.to_string(), results);
        self.dataset(dataset)
    }

    pub fn dataset(&self, dataset: &str) -> Result<&DatasetResults> {
        self.datasets
            .get(dataset)
            .ok_or_else(|| ReportError::NotFound {
                dataset: dataset.to_string(),
                variant: None,
            })
    }

    /// Datasets in ascending name order.
    pub fn datasets(&self) -> impl Iterator<Item = &DatasetResults> {
        self.datasets.values()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Segment lists and results files behind every loaded dataset, in read order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn get_absolute_stats(
        &self,
        dataset: &str,
        variant: PipelineVariant,
    ) -> Result<&AbsoluteErrorStats> {
        Ok(&self.dataset(dataset)?.variant(variant)?.absolute_errors)
    }

    /// `(segment, stats)` pairs in declared segment order.
    pub fn get_relative_stats(
        &self,
        dataset: &str,
        variant: PipelineVariant,
        kind: RelativeMetricKind,
    ) -> Result<Vec<(String, RelativeErrorStats)>> {
        let results = self.dataset(dataset)?;
        let file = results.variant(variant)?;

        results
            .segments
            .iter()
            .map(|segment| {
                file.relative_errors
                    .get(segment)
                    .map(|errors| (segment.clone(), errors.get(kind)))
                    .ok_or_else(|| ReportError::SegmentMismatch {
                        dataset: dataset.to_string(),
                        variant,
                        detail: format!("segment {segment} is missing"),
                    })
            })
            .collect()
    }

    pub fn relative_series(
        &self,
        dataset: &str,
        variant: PipelineVariant,
        kind: RelativeMetricKind,
    ) -> Result<RelativeSeries> {
        let stats = self.get_relative_stats(dataset, variant, kind)?;
        Ok(RelativeSeries {
            medians: stats.iter().map(|(_, stats)| stats.median).collect(),
            stds: stats.iter().map(|(_, stats)| stats.std).collect(),
        })
    }
}

pub fn segments_path(results_root: &Path, dataset: &str) -> PathBuf {
    results_root.join(dataset).join(SEGMENTS_FILE_NAME)
}

pub fn read_segment_list(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_segment_list(&raw).map_err(|reason| ReportError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parses a single comma-separated line of segment labels.
pub fn parse_segment_list(raw: &str) -> std::result::Result<Vec<String>, String> {
    let joined: String = raw.chars().filter(|ch| *ch != '\n' && *ch != '\r').collect();
    if joined.trim().is_empty() {
        return Err("segment list is empty".to_string());
    }

    let mut seen = BTreeSet::new();
    let mut segments = Vec::new();
    for (position, label) in joined.split(',').map(str::trim).enumerate() {
        if label.is_empty() {
            return Err(format!("empty segment label at position {position}"));
        }
        if !seen.insert(label) {
            return Err(format!("duplicate segment label {label}"));
        }
        segments.push(label.to_string());
    }
    Ok(segments)
}

pub fn read_results_file(path: &Path, format: ResultsFormat) -> Result<ResultsFile> {
    let raw = fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed: std::result::Result<ResultsFile, String> = match format {
        ResultsFormat::Yaml => serde_yaml::from_str(&raw).map_err(|err| err.to_string()),
        ResultsFormat::Json => serde_json::from_str(&raw).map_err(|err| err.to_string()),
    };
    let results = parsed.map_err(|reason| ReportError::Parse {
        path: path.to_path_buf(),
        reason,
    })?;

    if let Some(field) = first_non_finite(&results) {
        return Err(ReportError::Parse {
            path: path.to_path_buf(),
            reason: format!("{field} is not a finite number"),
        });
    }
    Ok(results)
}

/// Dotted name of the first NaN or infinite statistic, if any.
fn first_non_finite(results: &ResultsFile) -> Option<String> {
    let abs = &results.absolute_errors;
    let absolute = [
        ("median", abs.median),
        ("mean", abs.mean),
        ("rmse", abs.rmse),
        ("min", abs.min),
        ("max", abs.max),
        ("std", abs.std),
    ];
    if let Some((name, _)) = absolute.iter().find(|(_, value)| !value.is_finite()) {
        return Some(format!("absolute_errors.{name}"));
    }

    for (segment, errors) in &results.relative_errors {
        for kind in RelativeMetricKind::ALL {
            let stats = errors.get(kind);
            for (name, value) in [("median", stats.median), ("std", stats.std)] {
                if !value.is_finite() {
                    return Some(format!("relative_errors.{segment}.{kind}.{name}"));
                }
            }
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;

    use super::{
        DatasetResults, ResultStore, VariantSelection, parse_segment_list, read_results_file,
        read_segment_list, segments_path,
    };
    use crate::error::ReportError;
    use crate::model::{
        AbsoluteErrorStats, PipelineVariant, RelativeErrorStats, RelativeMetricKind,
        ResultsFile, ResultsFormat, SegmentErrors,
    };

    pub(crate) fn absolute(median: f64, mean: f64, rmse: f64) -> AbsoluteErrorStats {
        AbsoluteErrorStats {
            median,
            mean,
            rmse,
            min: 0.0,
            max: rmse * 3.0,
            std: 0.01,
        }
    }

    /// Results whose translation and rotation medians are both `medians`.
    pub(crate) fn results(
        abs: AbsoluteErrorStats,
        segments: &[&str],
        medians: &[f64],
    ) -> ResultsFile {
        let relative_errors = segments
            .iter()
            .zip(medians)
            .map(|(segment, median)| {
                let stats = RelativeErrorStats {
                    median: *median,
                    std: 0.01,
                };
                (
                    segment.to_string(),
                    SegmentErrors {
                        rpe_trans: stats,
                        rpe_rot: stats,
                    },
                )
            })
            .collect();
        ResultsFile {
            absolute_errors: abs,
            relative_errors,
        }
    }

    pub(crate) fn write_dataset(
        root: &Path,
        dataset: &str,
        segments: &[&str],
        variants: &[(PipelineVariant, ResultsFile)],
    ) {
        let dir = root.join(dataset);
        fs::create_dir_all(&dir).expect("create dataset dir");
        fs::write(dir.join("segments.txt"), format!("{}\n", segments.join(",")))
            .expect("write segments");
        for (variant, results) in variants {
            let variant_dir = dir.join(variant.as_str());
            fs::create_dir_all(&variant_dir).expect("create variant dir");
            let yaml = serde_yaml::to_string(results).expect("serialize results");
            fs::write(variant_dir.join("results.yaml"), yaml).expect("write results");
        }
    }

    fn segment_list(root: &Path, dataset: &str) -> Vec<String> {
        read_segment_list(&segments_path(root, dataset)).expect("segment list")
    }

    #[test]
    fn segment_list_strips_whitespace_and_newlines() {
        let segments = parse_segment_list(" 7, 14,\n21 \n").expect("valid list");
        assert_eq!(segments, vec!["7", "14", "21"]);
    }

    #[test]
    fn segment_list_rejects_empty_and_duplicate_labels() {
        assert!(parse_segment_list("").is_err());
        assert!(parse_segment_list("\n").is_err());
        assert!(parse_segment_list("7,,21").is_err());
        let error = parse_segment_list("7,14,7").expect_err("duplicate should fail");
        assert!(error.contains("duplicate"), "unexpected: {error}");
    }

    #[test]
    fn yaml_results_in_evaluation_tool_layout_deserialize() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.yaml");
        fs::write(
            &path,
            r#"
absolute_errors:
  max: 0.31
  mean: 0.12
  median: 0.11
  min: 0.01
  rmse: 0.14
  std: 0.05
relative_errors:
  '7':
    rpe_rot: {median: 1.2, std: 0.4, mean: 1.3}
    rpe_trans: {median: 0.05, std: 0.02}
  '14':
    rpe_rot: {median: 1.8, std: 0.5}
    rpe_trans: {median: 0.08, std: 0.03}
"#,
        )
        .expect("write yaml");

        let results = read_results_file(&path, ResultsFormat::Yaml).expect("parse yaml");
        assert_eq!(results.absolute_errors.rmse, 0.14);
        assert_eq!(results.relative_errors.len(), 2);
        assert_eq!(results.relative_errors["14"].rpe_rot.median, 1.8);
    }

    #[test]
    fn malformed_results_report_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.json");
        fs::write(&path, r#"{"absolute_errors": {"median": 0.1}}"#).expect("write json");

        let error = read_results_file(&path, ResultsFormat::Json).expect_err("missing keys");
        assert!(matches!(error, ReportError::Parse { .. }));
    }

    #[test]
    fn loaded_relative_stats_follow_declared_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let segments = ["21", "7", "14"];
        write_dataset(
            dir.path(),
            "MH_01_easy",
            &segments,
            &[
                (
                    PipelineVariant::SP,
                    results(absolute(0.1, 0.1, 0.1), &segments, &[0.11, 0.05, 0.08]),
                ),
                (
                    PipelineVariant::SPR,
                    results(absolute(0.1, 0.1, 0.1), &segments, &[0.09, 0.04, 0.07]),
                ),
            ],
        );

        let mut store = ResultStore::default();
        store
            .load_variants(
                dir.path(),
                "MH_01_easy",
                segment_list(dir.path(), "MH_01_easy"),
                &VariantSelection::required([PipelineVariant::SP, PipelineVariant::SPR]),
                ResultsFormat::Yaml,
            )
            .expect("dataset loads");

        let stats = store
            .get_relative_stats("MH_01_easy", PipelineVariant::SP, RelativeMetricKind::Translation)
            .expect("stats present");
        let labels: Vec<&str> = stats.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, vec!["21", "7", "14"]);
        assert_eq!(stats[0].1.median, 0.11);
        assert_eq!(store.sources().len(), 3);
    }

    #[test]
    fn missing_variant_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let segments = ["7"];
        write_dataset(
            dir.path(),
            "V1_01_easy",
            &segments,
            &[(PipelineVariant::SP, results(absolute(0.1, 0.1, 0.1), &segments, &[0.1]))],
        );

        let mut store = ResultStore::default();
        let error = store
            .load_variants(
                dir.path(),
                "V1_01_easy",
                segment_list(dir.path(), "V1_01_easy"),
                &VariantSelection::required([PipelineVariant::SP, PipelineVariant::SPR]),
                ResultsFormat::Yaml,
            )
            .expect_err("SPR is missing");
        assert!(matches!(
            error,
            ReportError::NotFound {
                variant: Some(PipelineVariant::SPR),
                ..
            }
        ));
        assert!(store.is_empty());
        assert!(store.sources().is_empty());
    }

    #[test]
    fn missing_optional_variant_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let segments = ["7"];
        write_dataset(
            dir.path(),
            "V1_01_easy",
            &segments,
            &[(PipelineVariant::SPR, results(absolute(0.1, 0.1, 0.1), &segments, &[0.1]))],
        );

        let selection =
            VariantSelection::required([PipelineVariant::SPR]).with_optional([PipelineVariant::SP]);
        let mut store = ResultStore::default();
        let loaded = store
            .load_variants(
                dir.path(),
                "V1_01_easy",
                segment_list(dir.path(), "V1_01_easy"),
                &selection,
                ResultsFormat::Yaml,
            )
            .expect("optional SP may be absent");

        let variants: Vec<PipelineVariant> = loaded.variants().collect();
        assert_eq!(variants, vec![PipelineVariant::SPR]);
        assert_eq!(store.sources().len(), 2);
        assert!(matches!(
            store.get_absolute_stats("V1_01_easy", PipelineVariant::SP),
            Err(ReportError::NotFound { .. })
        ));
    }

    #[test]
    fn required_variant_stays_required_when_also_optional() {
        let selection = VariantSelection::required([PipelineVariant::SPR])
            .with_optional([PipelineVariant::SP, PipelineVariant::SPR]);
        let pairs: Vec<(PipelineVariant, bool)> = selection.iter().collect();
        assert_eq!(
            pairs,
            vec![(PipelineVariant::SP, false), (PipelineVariant::SPR, true)]
        );
    }

    #[test]
    fn non_finite_statistics_are_rejected_at_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.yaml");
        fs::write(
            &path,
            r#"
absolute_errors: {median: .nan, mean: 0.1, rmse: 0.1, min: 0.0, max: 0.3, std: 0.01}
relative_errors:
  '7':
    rpe_rot: {median: 1.2, std: 0.4}
    rpe_trans: {median: 0.05, std: 0.02}
"#,
        )
        .expect("write yaml");
        let error = read_results_file(&path, ResultsFormat::Yaml).expect_err("NaN median");
        assert!(matches!(error, ReportError::Parse { .. }));
        assert!(
            error.to_string().contains("absolute_errors.median is not a finite number"),
            "unexpected: {error}"
        );

        fs::write(
            &path,
            r#"
absolute_errors: {median: 0.1, mean: 0.1, rmse: 0.1, min: 0.0, max: 0.3, std: 0.01}
relative_errors:
  '7':
    rpe_rot: {median: 1.2, std: .inf}
    rpe_trans: {median: 0.05, std: 0.02}
"#,
        )
        .expect("write yaml");
        let error = read_results_file(&path, ResultsFormat::Yaml).expect_err("infinite std");
        assert!(
            error.to_string().contains("relative_errors.7.rpe_rot.std"),
            "unexpected: {error}"
        );
    }

    #[test]
    fn mismatched_segments_fail_construction() {
        let declared = vec!["7".to_string(), "14".to_string()];

        let mut short = BTreeMap::new();
        short.insert(
            PipelineVariant::SP,
            results(absolute(0.1, 0.1, 0.1), &["7"], &[0.1]),
        );
        let error = DatasetResults::new("d", declared.clone(), short).expect_err("short");
        assert!(matches!(error, ReportError::SegmentMismatch { .. }));

        let mut renamed = BTreeMap::new();
        renamed.insert(
            PipelineVariant::SPR,
            results(absolute(0.1, 0.1, 0.1), &["7", "15"], &[0.1, 0.2]),
        );
        let error = DatasetResults::new("d", declared, renamed).expect_err("renamed");
        assert!(
            error.to_string().contains("segment 15 is not declared"),
            "unexpected: {error}"
        );
    }

    #[test]
    fn lookups_of_unknown_dataset_or_variant_are_not_found() {
        let mut store = ResultStore::default();
        let mut variants = BTreeMap::new();
        variants.insert(
            PipelineVariant::SP,
            results(absolute(0.1, 0.2, 0.3), &["7"], &[0.1]),
        );
        store.insert(DatasetResults::new("d", vec!["7".to_string()], variants).expect("valid"));

        assert_eq!(
            store
                .get_absolute_stats("d", PipelineVariant::SP)
                .expect("present")
                .mean,
            0.2
        );
        assert!(matches!(
            store.get_absolute_stats("d", PipelineVariant::S),
            Err(ReportError::NotFound { .. })
        ));
        assert!(matches!(
            store.dataset("missing"),
            Err(ReportError::NotFound { variant: None, .. })
        ));
    }
}
