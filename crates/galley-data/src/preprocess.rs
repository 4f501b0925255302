//! Feature engineering: from raw records to the numeric training table.
//!
//! Steps, in order:
//!
//! 1. drop records whose consumed quantity is not positive (or missing)
//! 2. derive consumption/return rates, per-passenger consumption and the
//!    operational-issue flag
//! 3. fit one [`CategoryEncoder`] per categorical attribute
//! 4. assemble the seven [`FEATURE_NAMES`] columns and drop rows with any
//!    missing feature or target value
//!
//! Standard stocked quantity is never a feature: the model should learn
//! demand, not past stocking decisions.

use crate::encoder::{CategoryEncoder, CategoryEncoders};
use crate::record::{CategoricalAttribute, ConsumptionRecord};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Crew notes that mark an operational problem on the flight.
pub const ISSUE_PHRASES: [&str; 3] = ["drawer incomplete", "ran out early", "low demand"];

/// Feature columns, in the order the model sees them.
pub const FEATURE_NAMES: [&str; 7] = [
    "origin_code",
    "flight_type_code",
    "service_type_code",
    "passenger_count",
    "product_code",
    "unit_cost",
    "issue_flag",
];

/// Name of the regression target.
pub const TARGET_COLUMN: &str = "quantity_consumed";

/// True when `note` is one of the known problem phrases (exact match).
pub fn is_issue_note(note: &str) -> bool {
    ISSUE_PHRASES.contains(&note)
}

/// Ratios derived from one record.
///
/// A ratio is `None` when its denominator is zero or missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// consumed / standard stocked quantity.
    pub consumption_rate: Option<f64>,
    /// returned / standard stocked quantity.
    pub return_rate: Option<f64>,
    /// consumed / passenger count.
    pub consumption_per_passenger: Option<f64>,
    pub has_issues: bool,
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Computes the derived fields of a record.
pub fn derive_metrics(record: &ConsumptionRecord) -> DerivedMetrics {
    DerivedMetrics {
        consumption_rate: ratio(record.quantity_consumed, record.standard_qty),
        return_rate: ratio(record.quantity_returned, record.standard_qty),
        consumption_per_passenger: ratio(record.quantity_consumed, record.passenger_count),
        has_issues: is_issue_note(&record.crew_feedback),
    }
}

/// Row-major numeric table with named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    /// Creates an empty table with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Creates an empty table with the standard [`FEATURE_NAMES`] columns.
    pub fn with_feature_names() -> Self {
        Self::new(FEATURE_NAMES)
    }

    /// Appends a row.
    ///
    /// # Panics
    ///
    /// Panics if the row width does not match the column count.
    pub fn push_row(&mut self, row: Vec<f64>) {
        assert_eq!(
            row.len(),
            self.columns.len(),
            "Row width mismatch: expected {}, got {}",
            self.columns.len(),
            row.len()
        );
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns a new table holding the rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }
}

/// Row counts observed while preprocessing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessStats {
    pub input_rows: usize,
    /// Rows removed because consumption was not positive or missing.
    pub dropped_non_positive: usize,
    /// Rows left after the consumption filter.
    pub after_consumption_filter: usize,
    /// Rows removed because a feature or the target was missing.
    pub dropped_missing: usize,
    pub output_rows: usize,
    /// Output rows flagged with an operational issue.
    pub issue_rows: usize,
}

/// Output of [`preprocess`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedCorpus {
    /// Seven-column feature table.
    pub features: FeatureTable,
    /// Consumed quantity for each feature row.
    pub target: Vec<f64>,
    /// Encoders fit on the filtered corpus.
    pub encoders: CategoryEncoders,
    /// Derived ratios for each feature row.
    pub derived: Vec<DerivedMetrics>,
    pub stats: PreprocessStats,
}

impl PreprocessedCorpus {
    /// Mean consumed / standard stocked ratio over the rows that have one.
    pub fn mean_utilization(&self) -> Option<f64> {
        let rates: Vec<f64> = self
            .derived
            .iter()
            .filter_map(|d| d.consumption_rate)
            .collect();
        if rates.is_empty() {
            None
        } else {
            Some(rates.iter().sum::<f64>() / rates.len() as f64)
        }
    }
}

fn fit_encoder(attribute: CategoricalAttribute, records: &[&ConsumptionRecord]) -> CategoryEncoder {
    CategoryEncoder::fit(
        attribute,
        records.iter().filter_map(|r| r.categorical(attribute)),
    )
}

fn feature_row(record: &ConsumptionRecord, encoders: &CategoryEncoders, issue: bool) -> Option<Vec<f64>> {
    let code = |attribute: CategoricalAttribute| -> Option<f64> {
        let value = record.categorical(attribute)?;
        encoders.encode(attribute, value).ok().map(f64::from)
    };
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());

    Some(vec![
        code(CategoricalAttribute::Origin)?,
        code(CategoricalAttribute::FlightType)?,
        code(CategoricalAttribute::ServiceType)?,
        finite(record.passenger_count)?,
        code(CategoricalAttribute::ProductName)?,
        finite(record.unit_cost)?,
        if issue { 1.0 } else { 0.0 },
    ])
}

/// Turns a loaded corpus into the training table.
///
/// Deterministic: the same corpus always yields the same encoders and the
/// same table.
pub fn preprocess(corpus: &[ConsumptionRecord]) -> PreprocessedCorpus {
    let mut stats = PreprocessStats {
        input_rows: corpus.len(),
        ..Default::default()
    };

    let kept: Vec<&ConsumptionRecord> = corpus
        .iter()
        .filter(|r| r.has_positive_consumption())
        .collect();
    stats.after_consumption_filter = kept.len();
    stats.dropped_non_positive = corpus.len() - kept.len();
    if stats.dropped_non_positive > 0 {
        info!(
            dropped = stats.dropped_non_positive,
            "Dropped rows without positive consumption"
        );
    }

    let encoders = CategoryEncoders {
        origin: fit_encoder(CategoricalAttribute::Origin, &kept),
        flight_type: fit_encoder(CategoricalAttribute::FlightType, &kept),
        service_type: fit_encoder(CategoricalAttribute::ServiceType, &kept),
        product_name: fit_encoder(CategoricalAttribute::ProductName, &kept),
    };

    let mut features = FeatureTable::with_feature_names();
    let mut target = Vec::with_capacity(kept.len());
    let mut derived = Vec::with_capacity(kept.len());

    for record in &kept {
        let metrics = derive_metrics(record);
        let consumed = record.quantity_consumed.filter(|q| q.is_finite());
        match (feature_row(record, &encoders, metrics.has_issues), consumed) {
            (Some(row), Some(consumed)) => {
                features.push_row(row);
                target.push(consumed);
                derived.push(metrics);
            }
            _ => stats.dropped_missing += 1,
        }
    }

    if stats.dropped_missing > 0 {
        warn!(
            dropped = stats.dropped_missing,
            "Dropped rows with missing feature values"
        );
    }

    stats.output_rows = features.n_rows();
    stats.issue_rows = derived.iter().filter(|d| d.has_issues).count();

    info!(
        rows = stats.output_rows,
        features = features.n_features(),
        issue_rows = stats.issue_rows,
        origins = encoders.origin.len(),
        products = encoders.product_name.len(),
        "Preprocessing complete"
    );

    PreprocessedCorpus {
        features,
        target,
        encoders,
        derived,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(origin: &str, product: &str, consumed: Option<f64>, note: &str) -> ConsumptionRecord {
        ConsumptionRecord {
            origin: Some(origin.to_string()),
            flight_type: Some("long-haul".to_string()),
            service_type: Some("Retail".to_string()),
            product_name: Some(product.to_string()),
            passenger_count: Some(200.0),
            unit_cost: Some(0.5),
            standard_qty: Some(250.0),
            quantity_consumed: consumed,
            quantity_returned: Some(50.0),
            crew_feedback: note.to_string(),
        }
    }

    #[test]
    fn test_issue_phrases_match_exactly() {
        assert!(is_issue_note("drawer incomplete"));
        assert!(is_issue_note("ran out early"));
        assert!(is_issue_note("low demand"));
        assert!(!is_issue_note("Low demand"));
        assert!(!is_issue_note("all good"));
        assert!(!is_issue_note(""));
    }

    #[test]
    fn test_derive_metrics() {
        let r = record("DOH", "Water", Some(200.0), "ran out early");
        let m = derive_metrics(&r);
        assert_eq!(m.consumption_rate, Some(0.8));
        assert_eq!(m.return_rate, Some(0.2));
        assert_eq!(m.consumption_per_passenger, Some(1.0));
        assert!(m.has_issues);
    }

    #[test]
    fn test_zero_denominator_yields_none() {
        let mut r = record("DOH", "Water", Some(10.0), "");
        r.standard_qty = Some(0.0);
        r.passenger_count = None;
        let m = derive_metrics(&r);
        assert_eq!(m.consumption_rate, None);
        assert_eq!(m.return_rate, None);
        assert_eq!(m.consumption_per_passenger, None);
    }

    #[test]
    fn test_drops_non_positive_consumption() {
        let corpus = vec![
            record("DOH", "Water", Some(100.0), ""),
            record("DOH", "Water", Some(0.0), ""),
            record("JFK", "Juice", Some(-5.0), ""),
            record("JFK", "Juice", Some(40.0), ""),
            record("JFK", "Juice", None, ""),
        ];
        let out = preprocess(&corpus);
        assert_eq!(out.stats.input_rows, 5);
        assert_eq!(out.stats.dropped_non_positive, 3);
        assert_eq!(out.stats.after_consumption_filter, 2);
        assert_eq!(out.features.n_rows(), 2);
        assert_eq!(out.target, vec![100.0, 40.0]);
    }

    #[test]
    fn test_feature_columns_and_codes() {
        let corpus = vec![
            record("JFK", "Water", Some(100.0), "low demand"),
            record("DOH", "Juice", Some(50.0), ""),
        ];
        let out = preprocess(&corpus);
        assert_eq!(out.features.columns(), &FEATURE_NAMES);
        // DOH=0, JFK=1; Juice=0, Water=1
        assert_eq!(
            out.features.row(0).unwrap(),
            &[1.0, 0.0, 0.0, 200.0, 1.0, 0.5, 1.0]
        );
        assert_eq!(
            out.features.row(1).unwrap(),
            &[0.0, 0.0, 0.0, 200.0, 0.0, 0.5, 0.0]
        );
        assert_eq!(out.stats.issue_rows, 1);
    }

    #[test]
    fn test_drops_rows_with_missing_features() {
        let mut missing_cost = record("DOH", "Water", Some(10.0), "");
        missing_cost.unit_cost = None;
        let mut missing_origin = record("DOH", "Water", Some(10.0), "");
        missing_origin.origin = None;
        let corpus = vec![
            record("DOH", "Water", Some(10.0), ""),
            missing_cost,
            missing_origin,
        ];
        let out = preprocess(&corpus);
        assert_eq!(out.stats.after_consumption_filter, 3);
        assert_eq!(out.stats.dropped_missing, 2);
        assert_eq!(out.features.n_rows(), 1);
        assert_eq!(out.derived.len(), 1);
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let corpus = vec![
            record("JFK", "Water", Some(100.0), ""),
            record("DOH", "Juice", Some(50.0), "drawer incomplete"),
            record("LHR", "Coffee", Some(0.0), ""),
        ];
        let a = preprocess(&corpus);
        let b = preprocess(&corpus);
        assert_eq!(a, b);
    }

    #[test]
    fn test_mean_utilization() {
        let corpus = vec![
            record("DOH", "Water", Some(125.0), ""),
            record("DOH", "Water", Some(250.0), ""),
        ];
        let out = preprocess(&corpus);
        let util = out.mean_utilization().unwrap();
        assert!((util - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_table_select_and_column() {
        let mut table = FeatureTable::new(["a", "b"]);
        table.push_row(vec![1.0, 2.0]);
        table.push_row(vec![3.0, 4.0]);
        table.push_row(vec![5.0, 6.0]);
        let picked = table.select(&[2, 0]);
        assert_eq!(picked.rows(), &[vec![5.0, 6.0], vec![1.0, 2.0]]);
        assert_eq!(table.column("b"), Some(vec![2.0, 4.0, 6.0]));
        assert_eq!(table.column("c"), None);
    }

    #[test]
    #[should_panic(expected = "Row width mismatch")]
    fn test_push_row_width_mismatch_panics() {
        let mut table = FeatureTable::with_feature_names();
        table.push_row(vec![1.0]);
    }
}
