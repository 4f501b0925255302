//! Batch prediction over many requests.
//!
//! Every input row ends up as exactly one [`BatchOutcome`]: a unit count or
//! a rejection with the reason. Rejected rows never get a default value.

use crate::error::{ServingError, ServingResult};
use crate::predictor::{DemandPredictor, PredictionRequest};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Columns a batch file must have; `has_issues` is optional.
pub const REQUEST_COLUMNS: [&str; 6] = [
    "origin",
    "flight_type",
    "service_type",
    "passenger_count",
    "product_name",
    "unit_cost",
];

/// Result for one request. `row` counts data rows from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Predicted {
        row: usize,
        request: PredictionRequest,
        units: u64,
    },
    Rejected {
        row: usize,
        reason: String,
    },
}

impl BatchOutcome {
    pub fn row(&self) -> usize {
        match self {
            Self::Predicted { row, .. } | Self::Rejected { row, .. } => *row,
        }
    }

    pub fn units(&self) -> Option<u64> {
        match self {
            Self::Predicted { units, .. } => Some(*units),
            Self::Rejected { .. } => None,
        }
    }
}

/// All outcomes of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
    pub predicted: usize,
    pub rejected: usize,
    /// Sum of predicted units over accepted rows.
    pub total_units: u64,
}

impl BatchReport {
    fn from_outcomes(outcomes: Vec<BatchOutcome>) -> Self {
        let predicted = outcomes.iter().filter(|o| o.units().is_some()).count();
        let total_units = outcomes.iter().filter_map(BatchOutcome::units).sum();
        Self {
            rejected: outcomes.len() - predicted,
            predicted,
            total_units,
            outcomes,
        }
    }
}

/// A parsed batch row, or the reason it could not be parsed.
pub type ParsedRow = Result<PredictionRequest, String>;

fn predict_one(predictor: &DemandPredictor, row: usize, parsed: ParsedRow) -> BatchOutcome {
    let request = match parsed {
        Ok(request) => request,
        Err(reason) => return BatchOutcome::Rejected { row, reason },
    };
    match predictor.predict(&request) {
        Ok(units) => BatchOutcome::Predicted {
            row,
            request,
            units,
        },
        Err(e) => BatchOutcome::Rejected {
            row,
            reason: e.to_string(),
        },
    }
}

/// Predicts every request in order.
pub fn predict_batch(predictor: &DemandPredictor, requests: &[PredictionRequest]) -> BatchReport {
    let outcomes = requests
        .iter()
        .enumerate()
        .map(|(i, r)| predict_one(predictor, i + 1, Ok(r.clone())))
        .collect();
    BatchReport::from_outcomes(outcomes)
}

fn parse_flag(cell: &str) -> Result<bool, String> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        other => Err(format!("has_issues: cannot parse '{other}' as a flag")),
    }
}

fn parse_number(cell: &str, column: &str) -> Result<f64, String> {
    cell.trim()
        .parse::<f64>()
        .map_err(|_| format!("{column}: cannot parse '{cell}' as a number"))
}

fn parse_row(positions: &[usize; 6], issues: Option<usize>, record: &StringRecord) -> ParsedRow {
    let cell = |slot: usize| record.get(positions[slot]).unwrap_or("");
    for (slot, column) in REQUEST_COLUMNS.iter().enumerate() {
        if cell(slot).trim().is_empty() {
            return Err(format!("{column}: missing value"));
        }
    }
    let has_issues = match issues {
        Some(i) => parse_flag(record.get(i).unwrap_or(""))?,
        None => false,
    };
    Ok(PredictionRequest {
        origin: cell(0).to_string(),
        flight_type: cell(1).to_string(),
        service_type: cell(2).to_string(),
        passenger_count: parse_number(cell(3), "passenger_count")?,
        product_name: cell(4).to_string(),
        unit_cost: parse_number(cell(5), "unit_cost")?,
        has_issues,
    })
}

/// Reads batch requests from CSV. Row-level problems become `Err` entries;
/// only an unreadable stream or a missing column fails the whole read.
pub fn read_requests<R: Read>(reader: R, origin: impl Into<PathBuf>) -> ServingResult<Vec<ParsedRow>> {
    let origin = origin.into();
    let batch_error = |source: csv::Error| ServingError::BatchInput {
        path: origin.clone(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let header = reader.headers().map_err(batch_error)?.clone();
    let find = |name: &str| header.iter().position(|h| h.trim() == name);

    let mut positions = [0usize; 6];
    for (slot, column) in REQUEST_COLUMNS.iter().enumerate() {
        positions[slot] = find(column).ok_or_else(|| {
            ServingError::invalid_request(format!(
                "batch input {} has no '{column}' column",
                origin.display()
            ))
        })?;
    }
    let issues = find("has_issues");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(batch_error)?;
        rows.push(parse_row(&positions, issues, &record));
    }
    Ok(rows)
}

/// Reads `path` and predicts every row.
pub fn predict_batch_file(predictor: &DemandPredictor, path: impl AsRef<Path>) -> ServingResult<BatchReport> {
    let path = path.as_ref();
    info!(path = %path.display(), "Running batch prediction");
    let file = std::fs::File::open(path).map_err(|e| ServingError::BatchInput {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    let rows = read_requests(file, path)?;

    let outcomes: Vec<BatchOutcome> = rows
        .into_iter()
        .enumerate()
        .map(|(i, parsed)| predict_one(predictor, i + 1, parsed))
        .collect();
    let report = BatchReport::from_outcomes(outcomes);
    if report.rejected > 0 {
        warn!(rejected = report.rejected, "Some batch rows were rejected");
    }
    info!(
        predicted = report.predicted,
        rejected = report.rejected,
        total_units = report.total_units,
        "Batch prediction complete"
    );
    Ok(report)
}
