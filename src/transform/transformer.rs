use tracing::info;

use crate::error::Result;
use crate::services::narrator::Narrator;
use crate::table::{Column, ColumnData, Table};
use crate::transform::impute::NumericStrategy;
use crate::transform::outliers::OutlierFilter;
use crate::transform::types::{FillValue, Transformation};

/// Upper bounds of the `sugar_category` bins; each bin is `(previous, bound]`.
const SUGAR_BINS: [(f64, &str); 4] = [
    (5.0, "low"),
    (15.0, "moderate"),
    (30.0, "high"),
    (f64::INFINITY, "very_high"),
];

/// Score at or above which a row counts as geocoded.
const GEOCODED_MIN_SCORE: f64 = 0.5;

/// Cleans a table step by step, logging every step applied.
pub struct DataTransformer {
    table: Table,
    log: Vec<Transformation>,
}

impl DataTransformer {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            log: Vec::new(),
        }
    }

    /// Drops rows repeating an earlier row on `subset`, or on the identity
    /// column when no subset is given. The first occurrence is kept.
    pub fn remove_duplicates(&mut self, subset: Option<&[&str]>) -> &mut Self {
        let default_subset: Vec<&str> = self.table.identity_column().into_iter().collect();
        let subset = subset.unwrap_or(&default_subset);

        let keep: Vec<bool> = self
            .table
            .duplicated(subset)
            .into_iter()
            .map(|dup| !dup)
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        self.table.retain_rows(&keep);

        self.record(Transformation::DuplicatesRemoved { removed })
    }

    /// Fills numeric nulls per `numeric` and text nulls with `text_fill`.
    /// Boolean columns are left alone.
    pub fn handle_missing_values(&mut self, numeric: NumericStrategy, text_fill: &str) -> &mut Self {
        let mut filled = Vec::new();

        for column in self.table.columns_mut() {
            let count = column.null_count();
            if count == 0 {
                continue;
            }
            match &mut column.data {
                ColumnData::Numeric(values) => {
                    let Some(fill) = numeric.fill_value(values) else {
                        continue;
                    };
                    values.iter_mut().filter(|v| v.is_none()).for_each(|v| *v = Some(fill));
                    filled.push(Transformation::NullsFilled {
                        column: column.name.clone(),
                        count,
                        fill: FillValue::Number(fill),
                    });
                }
                ColumnData::Text(values) => {
                    values
                        .iter_mut()
                        .filter(|v| v.is_none())
                        .for_each(|v| *v = Some(text_fill.to_string()));
                    filled.push(Transformation::NullsFilled {
                        column: column.name.clone(),
                        count,
                        fill: FillValue::Text(text_fill.to_string()),
                    });
                }
                ColumnData::Bool(_) => {}
            }
        }

        for t in filled {
            self.record(t);
        }
        self
    }

    /// Trims and lowercases text columns: the named ones, or all of them.
    /// Nulls and non-text columns are left as they are.
    pub fn normalize_text_columns(&mut self, columns: Option<&[&str]>) -> &mut Self {
        let mut touched = Vec::new();

        for column in self.table.columns_mut() {
            if columns.is_some_and(|names| !names.contains(&column.name.as_str())) {
                continue;
            }
            if let ColumnData::Text(values) = &mut column.data {
                for v in values.iter_mut().flatten() {
                    *v = v.trim().to_lowercase();
                }
                touched.push(column.name.clone());
            }
        }

        self.record(Transformation::TextNormalized { columns: touched })
    }

    /// Drops outlier rows column by column; see [`OutlierFilter::apply`].
    pub fn filter_outliers(&mut self, columns: &[String], filter: OutlierFilter) -> Result<&mut Self> {
        let removed = filter.apply(&mut self.table, columns)?;
        Ok(self.record(Transformation::OutliersFiltered {
            method: filter.method,
            removed,
        }))
    }

    /// Adds `sugar_category` (from `sugars_100g`) and `is_geocoded` (from
    /// `geocoding_score`) when their source columns are numeric.
    pub fn add_derived_columns(&mut self) -> Result<&mut Self> {
        if let Some(sugars) = self.numeric("sugars_100g") {
            let categories = sugars.iter().map(|v| v.and_then(sugar_category)).collect();
            self.table.set_column(Column::text("sugar_category", categories))?;
            self.record(Transformation::ColumnAdded {
                column: "sugar_category".into(),
            });
        }

        if let Some(scores) = self.numeric("geocoding_score") {
            let flags = scores
                .iter()
                .map(|v| Some(v.is_some_and(|s| s >= GEOCODED_MIN_SCORE)))
                .collect();
            self.table.set_column(Column::boolean("is_geocoded", flags))?;
            self.record(Transformation::ColumnAdded {
                column: "is_geocoded".into(),
            });
        }

        Ok(self)
    }

    /// Runs an arbitrary table-to-table step and logs it under `name`.
    pub fn apply_custom<F>(&mut self, name: &str, step: F) -> &mut Self
    where
        F: FnOnce(Table) -> Table,
    {
        let table = std::mem::take(&mut self.table);
        self.table = step(table);
        self.record(Transformation::Custom {
            name: name.to_string(),
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    pub fn transformations(&self) -> &[Transformation] {
        &self.log
    }

    /// One bullet line per transformation applied.
    pub fn summary(&self) -> String {
        self.log
            .iter()
            .map(|t| format!("• {t}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plain-text description of the table and the steps applied so far.
    pub fn suggestion_context(&self) -> String {
        let columns = self
            .table
            .columns()
            .iter()
            .map(|c| {
                let kind = match c.data {
                    ColumnData::Numeric(_) => "numeric",
                    ColumnData::Text(_) => "text",
                    ColumnData::Bool(_) => "bool",
                };
                format!("- {} ({kind})", c.name)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let applied = if self.log.is_empty() {
            "none".to_string()
        } else {
            self.summary()
        };

        format!(
            "Dataset with {} rows.\n\nColumns:\n{columns}\n\nTransformations already applied:\n{applied}",
            self.table.row_count()
        )
    }

    /// Asks `narrator` which cleaning steps should follow the ones applied.
    pub async fn suggest_transformations<N: Narrator + ?Sized>(
        &self,
        narrator: &N,
    ) -> anyhow::Result<String> {
        narrator.suggest_transformations(&self.suggestion_context()).await
    }

    fn record(&mut self, t: Transformation) -> &mut Self {
        info!(transformation = %t, rows = self.table.row_count(), "Transformation applied");
        self.log.push(t);
        self
    }

    fn numeric(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.table
            .column(name)
            .and_then(Column::as_numeric)
            .map(<[_]>::to_vec)
    }
}

fn sugar_category(value: f64) -> Option<String> {
    if value <= 0.0 {
        return None;
    }
    SUGAR_BINS
        .iter()
        .find(|(upper, _)| value <= *upper)
        .map(|(_, label)| label.to_string())
}
