//! Persistence for pipeline results.
//!
//! Writes the cleaned table as CSV, the metrics snapshot as JSON, a Markdown
//! report, and appends one row per run to a history CSV.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::debug;

use crate::enricher::EnrichmentStats;
use crate::quality::QualityMetrics;
use crate::table::Table;
use crate::transform::Transformation;

/// One row of the run-history CSV.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub total_records: usize,
    pub cleaned_records: usize,
    pub enriched_records: usize,
    pub completeness_score: f64,
    pub duplicates_pct: f64,
    pub geocoding_success_rate: f64,
    pub quality_grade: String,
    pub duration_seconds: f64,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// Writes `table` as CSV with a header row. Nulls are empty cells.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    writer.write_record(table.column_names())?;
    for row in 0..table.row_count() {
        writer.write_record(table.columns().iter().map(|c| c.display(row)))?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = table.row_count(), "Table written");
    Ok(())
}

/// Writes the metrics snapshot as pretty JSON, null counts sorted by column.
pub fn write_metrics_json(path: &Path, metrics: &QualityMetrics) -> Result<()> {
    ensure_parent(path)?;
    let mut value = serde_json::to_value(metrics)?;
    let sorted: BTreeMap<_, _> = metrics.null_counts.iter().collect();
    value["null_counts"] = serde_json::to_value(sorted)?;

    fs::write(path, serde_json::to_string_pretty(&value)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Everything the Markdown report is rendered from.
pub struct ReportContext<'a> {
    pub generated_at: DateTime<Utc>,
    pub source: &'a str,
    pub metrics: &'a QualityMetrics,
    pub enrichment: Option<EnrichmentStats>,
    pub transformations: &'a [Transformation],
    pub recommendations: Option<&'a str>,
    pub suggested_transformations: Option<&'a str>,
}

pub fn render_report(ctx: &ReportContext<'_>) -> String {
    let m = ctx.metrics;
    let mut out = String::new();

    // writing to a String cannot fail
    let _ = writeln!(out, "# Data quality report\n");
    let _ = writeln!(out, "- Source: `{}`", ctx.source);
    let _ = writeln!(
        out,
        "- Generated: {}\n",
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let _ = writeln!(out, "## Metrics\n");
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Total records | {} |", m.total_records);
    let _ = writeln!(out, "| Unique records | {} |", m.valid_records);
    let _ = writeln!(out, "| Completeness | {:.1}% |", m.completeness_score * 100.0);
    let _ = writeln!(
        out,
        "| Duplicates | {} ({:.2}%) |",
        m.duplicates_count, m.duplicates_pct
    );
    let _ = writeln!(out, "| Geocoding success | {:.2}% |", m.geocoding_success_rate);
    let _ = writeln!(out, "| Avg geocoding score | {:.3} |", m.avg_geocoding_score);
    let _ = writeln!(out, "| **Grade** | **{}** |\n", m.quality_grade);

    if let Some(stats) = ctx.enrichment {
        let _ = writeln!(out, "## Enrichment\n");
        let _ = writeln!(
            out,
            "{} of {} records enriched ({:.1}%), {} not enriched.\n",
            stats.successfully_enriched,
            stats.total_processed,
            stats.success_rate(),
            stats.failed_enrichment
        );
    }

    let mut nulls: Vec<_> = m.null_counts.iter().filter(|(_, n)| **n > 0).collect();
    nulls.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let _ = writeln!(out, "## Null values\n");
    if nulls.is_empty() {
        let _ = writeln!(out, "No null values.\n");
    } else {
        let _ = writeln!(out, "| Column | Nulls |");
        let _ = writeln!(out, "|---|---|");
        for (column, n) in nulls {
            let _ = writeln!(out, "| {column} | {n} |");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Transformations\n");
    if ctx.transformations.is_empty() {
        let _ = writeln!(out, "None applied.\n");
    } else {
        for t in ctx.transformations {
            let _ = writeln!(out, "- {t}");
        }
        let _ = writeln!(out);
    }

    if let Some(text) = ctx.recommendations {
        let _ = writeln!(out, "## Recommendations\n");
        let _ = writeln!(out, "{}", text.trim());
    }

    if let Some(text) = ctx.suggested_transformations {
        let _ = writeln!(out, "\n## Suggested transformations\n");
        let _ = writeln!(out, "{}", text.trim());
    }

    out
}

/// Appends a [`RunSummary`] row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_run_record(path: &Path, summary: &RunSummary) -> Result<()> {
    ensure_parent(path)?;
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending run record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // header only on the first row
        .from_writer(file);

    writer.serialize(summary)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::Grade;
    use crate::table::Column;
    use std::collections::HashMap;
    use std::env;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn metrics() -> QualityMetrics {
        QualityMetrics {
            total_records: 4,
            valid_records: 3,
            completeness_score: 0.917,
            duplicates_count: 1,
            duplicates_pct: 25.0,
            geocoding_success_rate: 50.0,
            avg_geocoding_score: 0.81,
            null_counts: HashMap::from([
                ("brands".to_string(), 1),
                ("code".to_string(), 0),
                ("sugars_100g".to_string(), 2),
            ]),
            quality_grade: Grade::C,
        }
    }

    fn summary() -> RunSummary {
        RunSummary {
            timestamp: Utc::now(),
            source: "products.json".into(),
            total_records: 4,
            cleaned_records: 3,
            enriched_records: 2,
            completeness_score: 0.917,
            duplicates_pct: 25.0,
            geocoding_success_rate: 50.0,
            quality_grade: Grade::C.to_string(),
            duration_seconds: 1.5,
        }
    }

    #[test]
    fn test_write_table_csv_renders_nulls_empty() {
        let path = temp_path("store_geo_quality_table.csv");
        let table = Table::new(vec![
            Column::text("code", vec![Some("1".into()), Some("2".into())]),
            Column::numeric("sugars_100g", vec![Some(4.5), None]),
        ])
        .unwrap();

        write_table_csv(&path, &table).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines, vec!["code,sugars_100g", "1,4.5", "2,"]);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_metrics_json() {
        let path = temp_path("store_geo_quality_metrics.json");

        write_metrics_json(&path, &metrics()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["quality_grade"], "C");
        assert_eq!(value["null_counts"]["sugars_100g"], 2);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_report_sections() {
        let m = metrics();
        let transformations = vec![Transformation::DuplicatesRemoved { removed: 1 }];
        let report = render_report(&ReportContext {
            generated_at: Utc::now(),
            source: "products.json",
            metrics: &m,
            enrichment: Some(EnrichmentStats {
                total_processed: 4,
                successfully_enriched: 2,
                failed_enrichment: 2,
            }),
            transformations: &transformations,
            recommendations: None,
            suggested_transformations: None,
        });

        assert!(report.contains("| **Grade** | **C** |"));
        assert!(report.contains("| Unique records | 3 |"));
        assert!(report.contains("2 of 4 records enriched (50.0%)"));
        assert!(report.contains("- Duplicates removed: 1"));
        // zero-null columns are omitted, largest first
        assert!(!report.contains("| code |"));
        assert!(report.find("| sugars_100g | 2 |").unwrap() < report.find("| brands | 1 |").unwrap());
        assert!(!report.contains("## Recommendations"));
        assert!(!report.contains("## Suggested transformations"));
    }

    #[test]
    fn test_report_includes_recommendations() {
        let m = metrics();
        let report = render_report(&ReportContext {
            generated_at: Utc::now(),
            source: "products.json",
            metrics: &m,
            enrichment: None,
            transformations: &[],
            recommendations: Some("1. Fill missing brands\n"),
            suggested_transformations: Some("Normalize store names"),
        });

        assert!(report.contains("## Recommendations\n\n1. Fill missing brands"));
        assert!(report.contains("## Suggested transformations\n\nNormalize store names"));
        assert!(report.contains("None applied."));
        assert!(!report.contains("## Enrichment"));
    }

    #[test]
    fn test_append_run_record_writes_header_once() {
        let path = temp_path("store_geo_quality_history_header.csv");
        let _ = fs::remove_file(&path);

        append_run_record(&path, &summary()).unwrap();
        append_run_record(&path, &summary()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 data rows
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }
}
