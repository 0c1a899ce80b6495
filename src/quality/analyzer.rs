use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, info};

use crate::quality::grade::{grade, quality_score};
use crate::quality::types::QualityMetrics;
use crate::quality::utility::{mean, round_to};
use crate::services::narrator::Narrator;
use crate::table::Table;

const GEOCODING_SCORE_COLUMN: &str = "geocoding_score";

/// Scores completeness, duplication and geocoding yield of a table.
///
/// The last snapshot is kept on the analyzer; calling [`analyze`](Self::analyze)
/// again replaces it.
pub struct QualityAnalyzer<'a> {
    table: &'a Table,
    metrics: Option<QualityMetrics>,
}

impl<'a> QualityAnalyzer<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            metrics: None,
        }
    }

    /// Share of non-null cells over all cells, 0 for an empty table.
    pub fn calculate_completeness(&self) -> f64 {
        let total_cells = self.table.size();
        if total_cells == 0 {
            return 0.0;
        }
        let null_cells: usize = self.table.columns().iter().map(|c| c.null_count()).sum();
        (total_cells - null_cells) as f64 / total_cells as f64
    }

    /// Rows repeating an earlier identity value, as a count and a percentage.
    pub fn count_duplicates(&self) -> (usize, f64) {
        let Some(id_col) = self.table.identity_column() else {
            return (0, 0.0);
        };

        let duplicates = self
            .table
            .duplicated(&[id_col])
            .into_iter()
            .filter(|d| *d)
            .count();

        let rows = self.table.row_count();
        let pct = if rows == 0 {
            0.0
        } else {
            duplicates as f64 / rows as f64 * 100.0
        };

        (duplicates, pct)
    }

    /// Success rate (percent of rows with a positive score) and the mean
    /// score over those rows. `None` when the table has no geocoding column.
    pub fn calculate_geocoding_stats(&self) -> Option<(f64, f64)> {
        let column = self.table.column(GEOCODING_SCORE_COLUMN)?;

        let valid: Vec<f64> = column
            .as_numeric()
            .unwrap_or_default()
            .iter()
            .flatten()
            .copied()
            .filter(|s| *s > 0.0)
            .collect();

        let rows = self.table.row_count();
        let rate = if rows == 0 {
            0.0
        } else {
            valid.len() as f64 / rows as f64 * 100.0
        };

        Some((rate, mean(&valid)))
    }

    pub fn calculate_null_counts(&self) -> HashMap<String, usize> {
        self.table
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.null_count()))
            .collect()
    }

    /// Runs every measure, grades the table and stores the snapshot.
    pub fn analyze(&mut self) -> &QualityMetrics {
        let completeness = self.calculate_completeness();
        let (duplicates, duplicates_pct) = self.count_duplicates();
        let geo = self.calculate_geocoding_stats();
        let null_counts = self.calculate_null_counts();

        let score = quality_score(completeness, duplicates_pct, geo.map(|(rate, _)| rate));
        let (geo_rate, geo_avg) = geo.unwrap_or((0.0, 0.0));
        debug!(score, completeness, duplicates_pct, geo_rate, "Quality score computed");

        let metrics = QualityMetrics {
            total_records: self.table.row_count(),
            valid_records: self.table.row_count() - duplicates,
            completeness_score: round_to(completeness, 3),
            duplicates_count: duplicates,
            duplicates_pct: round_to(duplicates_pct, 2),
            geocoding_success_rate: round_to(geo_rate, 2),
            avg_geocoding_score: round_to(geo_avg, 3),
            null_counts,
            quality_grade: grade(score),
        };

        info!(
            total = metrics.total_records,
            valid = metrics.valid_records,
            completeness = metrics.completeness_score,
            duplicates_pct = metrics.duplicates_pct,
            geocoding_success_rate = metrics.geocoding_success_rate,
            grade = %metrics.quality_grade,
            "Quality analysis complete"
        );

        self.metrics.insert(metrics)
    }

    pub fn metrics(&self) -> Option<&QualityMetrics> {
        self.metrics.as_ref()
    }

    /// Asks the narrator for recommendations, analyzing first if needed.
    pub async fn recommendations<N>(&mut self, narrator: &N) -> Result<String>
    where
        N: Narrator + ?Sized,
    {
        let metrics = match self.metrics.clone() {
            Some(metrics) => metrics,
            None => self.analyze().clone(),
        };
        narrator.recommend(&metrics).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::types::Grade;
    use crate::records::Record;
    use crate::table::Column;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn text(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(String::from)).collect()
    }

    #[test]
    fn test_three_rows_one_duplicate_no_geocoding() {
        let table = Table::new(vec![
            Column::text("code", text(&[Some("1"), Some("2"), Some("1")])),
            Column::numeric("value", vec![Some(1.0), Some(2.0), Some(3.0)]),
        ])
        .unwrap();

        let mut analyzer = QualityAnalyzer::new(&table);
        let metrics = analyzer.analyze().clone();

        assert_eq!(metrics.total_records, 3);
        assert_eq!(metrics.valid_records, 2);
        assert_eq!(metrics.completeness_score, 1.0);
        assert_eq!(metrics.duplicates_count, 1);
        assert_eq!(metrics.duplicates_pct, 33.33);
        assert_eq!(metrics.geocoding_success_rate, 0.0);
        assert_eq!(metrics.quality_grade, Grade::C);
    }

    #[test]
    fn test_mixed_table_with_geocoding() {
        let table = Table::new(vec![
            Column::text("code", text(&[Some("1"), Some("2"), Some("3")])),
            Column::numeric("value", vec![Some(10.0), Some(20.0), None]),
            Column::numeric("geocoding_score", vec![Some(0.8), None, Some(0.6)]),
        ])
        .unwrap();

        let mut analyzer = QualityAnalyzer::new(&table);
        let metrics = analyzer.analyze().clone();

        assert_eq!(metrics.total_records, 3);
        assert_eq!(metrics.completeness_score, 0.778);
        assert_eq!(metrics.duplicates_count, 0);
        assert_eq!(metrics.geocoding_success_rate, 66.67);
        assert_eq!(metrics.avg_geocoding_score, 0.7);
        assert_eq!(metrics.null_counts["value"], 1);
        assert_eq!(metrics.null_counts["code"], 0);
        // 31.1 + 30 + 20 = 81.1
        assert_eq!(metrics.quality_grade, Grade::B);
    }

    #[test]
    fn test_zero_scores_are_not_geocoded() {
        let table = Table::new(vec![
            Column::text("code", text(&[Some("1"), Some("2")])),
            Column::numeric("geocoding_score", vec![Some(0.0), Some(0.5)]),
        ])
        .unwrap();

        let analyzer = QualityAnalyzer::new(&table);
        assert_eq!(analyzer.calculate_geocoding_stats(), Some((50.0, 0.5)));
    }

    #[test]
    fn test_no_valid_geocoding_rows() {
        let table = Table::new(vec![
            Column::text("code", text(&[Some("1")])),
            Column::numeric("geocoding_score", vec![None]),
        ])
        .unwrap();

        let mut analyzer = QualityAnalyzer::new(&table);
        let metrics = analyzer.analyze();
        assert_eq!(metrics.geocoding_success_rate, 0.0);
        assert_eq!(metrics.avg_geocoding_score, 0.0);
    }

    #[test]
    fn test_empty_table_has_defined_zeros() {
        let table = Table::default();
        let mut analyzer = QualityAnalyzer::new(&table);
        let metrics = analyzer.analyze();

        assert_eq!(metrics.total_records, 0);
        assert_eq!(metrics.completeness_score, 0.0);
        assert_eq!(metrics.duplicates_pct, 0.0);
        assert!(metrics.null_counts.is_empty());
    }

    #[test]
    fn test_fieldless_records_still_count_as_records() {
        let records: Vec<Record> = (0..3)
            .filter_map(|_| Record::from_value(serde_json::json!({})))
            .collect();
        let table = Table::from_records(&records);

        let mut analyzer = QualityAnalyzer::new(&table);
        let metrics = analyzer.analyze();

        assert_eq!(metrics.total_records, 3);
        assert_eq!(metrics.valid_records, 3);
        assert_eq!(metrics.duplicates_count, 0);
        assert_eq!(metrics.completeness_score, 0.0);
    }

    #[test]
    fn test_all_null_table() {
        let table = Table::new(vec![
            Column::text("a", vec![None, None]),
            Column::numeric("b", vec![None, None]),
        ])
        .unwrap();

        let analyzer = QualityAnalyzer::new(&table);
        assert_eq!(analyzer.calculate_completeness(), 0.0);
        // both identity cells are null, so the second row repeats the first
        assert_eq!(analyzer.count_duplicates(), (1, 50.0));
    }

    #[test]
    fn test_completeness_bounds() {
        let tables = [
            Table::new(vec![Column::numeric("a", vec![Some(1.0), None])]).unwrap(),
            Table::new(vec![Column::numeric("a", vec![Some(1.0), Some(2.0)])]).unwrap(),
            Table::new(vec![Column::numeric("a", vec![None])]).unwrap(),
        ];
        for table in &tables {
            let c = QualityAnalyzer::new(table).calculate_completeness();
            assert!((0.0..=1.0).contains(&c));
            let no_nulls = table.columns().iter().all(|col| col.null_count() == 0);
            assert_eq!(c == 1.0, no_nulls);
        }
    }

    struct CountingNarrator(AtomicUsize);

    #[async_trait::async_trait]
    impl Narrator for CountingNarrator {
        async fn recommend(&self, metrics: &QualityMetrics) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("grade {}", metrics.quality_grade))
        }

        async fn suggest_transformations(&self, _context: &str) -> Result<String> {
            unreachable!("analyzer only asks for recommendations")
        }
    }

    #[tokio::test]
    async fn test_recommendations_analyze_first() {
        let table = Table::new(vec![Column::text("code", text(&[Some("1")]))]).unwrap();
        let mut analyzer = QualityAnalyzer::new(&table);
        assert!(analyzer.metrics().is_none());

        let narrator = CountingNarrator(AtomicUsize::new(0));
        let text = analyzer.recommendations(&narrator).await.unwrap();

        assert_eq!(text, "grade A");
        assert!(analyzer.metrics().is_some());
        assert_eq!(narrator.0.load(Ordering::SeqCst), 1);
    }
}
