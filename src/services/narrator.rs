//! Trait for turning a quality snapshot into free-text recommendations.

use anyhow::Result;

use crate::quality::types::QualityMetrics;

/// Produces prose from pipeline state. The text is not validated.
#[async_trait::async_trait]
pub trait Narrator: Send + Sync {
    /// Priority recommendations for a metrics snapshot.
    async fn recommend(&self, metrics: &QualityMetrics) -> Result<String>;

    /// Further cleaning steps, given a description of the table and the
    /// steps already applied.
    async fn suggest_transformations(&self, context: &str) -> Result<String>;
}

/// Builds the plain-text context handed to a narrator.
pub fn metrics_context(metrics: &QualityMetrics) -> String {
    let mut nulls: Vec<_> = metrics.null_counts.iter().collect();
    nulls.sort();
    let nulls = nulls
        .iter()
        .map(|(col, n)| format!("  - {col}: {n}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Dataset quality analysis:\n\
         - Total: {} records\n\
         - Completeness: {:.1}%\n\
         - Duplicates: {:.1}%\n\
         - Geocoding success: {:.1}%\n\
         - Grade: {}\n\n\
         Null values per column:\n{}",
        metrics.total_records,
        metrics.completeness_score * 100.0,
        metrics.duplicates_pct,
        metrics.geocoding_success_rate,
        metrics.quality_grade,
        nulls,
    )
}
