//! CSV loader for the consumption export.
//!
//! Header names are matched after trimming surrounding whitespace; extra
//! columns are ignored. Categorical cells are kept verbatim, numeric cells
//! are trimmed before parsing, and empty cells become `None`.

use crate::record::{ConsumptionRecord, Corpus, REQUIRED_COLUMNS};
use crate::{DataError, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Column positions resolved from the header row.
struct ColumnIndex {
    positions: [usize; REQUIRED_COLUMNS.len()],
}

impl ColumnIndex {
    fn resolve(header: &StringRecord, path: &Path) -> Result<Self> {
        let mut positions = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, column) in REQUIRED_COLUMNS.iter().enumerate() {
            positions[slot] = header
                .iter()
                .position(|h| h.trim() == *column)
                .ok_or_else(|| DataError::MissingColumn {
                    column: column.to_string(),
                    path: path.to_path_buf(),
                })?;
        }
        Ok(Self { positions })
    }

    fn cell<'r>(&self, row: &'r StringRecord, slot: usize) -> &'r str {
        row.get(self.positions[slot]).unwrap_or("")
    }
}

fn text(cell: &str) -> Option<String> {
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}

fn number(cell: &str, column: &str, line: u64) -> Result<Option<f64>> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| DataError::InvalidValue {
            column: column.to_string(),
            value: cell.to_string(),
            line,
        })
}

fn parse_row(index: &ColumnIndex, row: &StringRecord, line: u64) -> Result<ConsumptionRecord> {
    let num = |slot: usize| number(index.cell(row, slot), REQUIRED_COLUMNS[slot], line);
    Ok(ConsumptionRecord {
        origin: text(index.cell(row, 0)),
        flight_type: text(index.cell(row, 1)),
        service_type: text(index.cell(row, 2)),
        product_name: text(index.cell(row, 3)),
        passenger_count: num(4)?,
        unit_cost: num(5)?,
        standard_qty: num(6)?,
        quantity_consumed: num(7)?,
        quantity_returned: num(8)?,
        crew_feedback: index.cell(row, 9).to_string(),
    })
}

/// Loads the consumption export at `path`.
///
/// # Errors
///
/// Returns [`DataError::NotFound`] when the file is missing,
/// [`DataError::MissingColumn`] when the header lacks a required column and
/// [`DataError::Csv`] / [`DataError::InvalidValue`] for malformed content.
pub fn load(path: impl AsRef<Path>) -> Result<Corpus> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading consumption dataset");

    if !path.exists() {
        return Err(DataError::NotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path).map_err(|e| DataError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let corpus = load_from_reader(file, path)?;
    info!(path = %path.display(), rows = corpus.len(), "Dataset loaded");
    Ok(corpus)
}

/// Loads records from any reader; `origin` is only used in error messages.
pub fn load_from_reader<R: Read>(reader: R, origin: impl Into<PathBuf>) -> Result<Corpus> {
    let origin = origin.into();
    let csv_error = |source: csv::Error| DataError::Csv {
        path: origin.clone(),
        source,
    };

    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let header = reader.headers().map_err(csv_error)?.clone();
    let index = ColumnIndex::resolve(&header, &origin)?;
    debug!(columns = header.len(), "Resolved dataset header");

    let mut corpus = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        corpus.push(parse_row(&index, &row, line)?);
    }
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str = "Flight_ID,Origin,Flight_Type,Service_Type,Product_Name,Passenger_Count,Unit_Cost,Standard_Specification_Qty,Quantity_Consumed,Quantity_Returned,Crew_Feedback";

    #[test]
    fn test_load_from_reader_parses_rows() {
        let data = format!(
            "{HEADER}\nQR1,DOH,long-haul,Retail,Still Water 500ml,250,0.5,300,180,120,ran out early\nQR2,JFK,short-haul,Pick & Pack,Mixed Nuts 30g,120,0.65,150,90,60,\n"
        );
        let corpus = load_from_reader(data.as_bytes(), "inline.csv").unwrap();
        assert_eq!(corpus.len(), 2);

        let first = &corpus[0];
        assert_eq!(first.origin.as_deref(), Some("DOH"));
        assert_eq!(first.product_name.as_deref(), Some("Still Water 500ml"));
        assert_eq!(first.passenger_count, Some(250.0));
        assert_eq!(first.quantity_consumed, Some(180.0));
        assert_eq!(first.crew_feedback, "ran out early");

        let second = &corpus[1];
        assert_eq!(second.service_type.as_deref(), Some("Pick & Pack"));
        assert_eq!(second.crew_feedback, "");
    }

    #[test]
    fn test_header_whitespace_is_trimmed() {
        let data = " Origin ,Flight_Type,Service_Type,Product_Name,Passenger_Count,Unit_Cost,Standard_Specification_Qty,Quantity_Consumed,Quantity_Returned,Crew_Feedback \nDOH,long-haul,Retail,Water,100,0.5,120,80,40,\n";
        let corpus = load_from_reader(data.as_bytes(), "inline.csv").unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus[0].origin.as_deref(), Some("DOH"));
    }

    #[test]
    fn test_empty_cells_are_missing() {
        let data = format!("{HEADER}\nQR1,,long-haul,Retail,Water,,0.5,300,,120,\n");
        let corpus = load_from_reader(data.as_bytes(), "inline.csv").unwrap();
        assert_eq!(corpus[0].origin, None);
        assert_eq!(corpus[0].passenger_count, None);
        assert_eq!(corpus[0].quantity_consumed, None);
    }

    #[test]
    fn test_missing_column_is_named() {
        let data = "Origin,Flight_Type\nDOH,long-haul\n";
        let err = load_from_reader(data.as_bytes(), "inline.csv").unwrap_err();
        assert!(
            matches!(&err, DataError::MissingColumn { column, .. } if column == "Service_Type"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_invalid_number_reports_line() {
        let data = format!("{HEADER}\nQR1,DOH,long-haul,Retail,Water,many,0.5,300,180,120,\n");
        let err = load_from_reader(data.as_bytes(), "inline.csv").unwrap_err();
        match err {
            DataError::InvalidValue { column, value, line } => {
                assert_eq!(column, "Passenger_Count");
                assert_eq!(value, "many");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_ragged_row_is_csv_error() {
        let data = format!("{HEADER}\nQR1,DOH\n");
        let err = load_from_reader(data.as_bytes(), "inline.csv").unwrap_err();
        assert!(matches!(err, DataError::Csv { .. }), "unexpected error: {err:?}");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let err = load(&path).unwrap_err();
        assert!(matches!(err, DataError::NotFound(p) if p == path));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("consumption.csv");
        std::fs::write(
            &path,
            format!("{HEADER}\nQR1,DOH,long-haul,Retail,Water,250,0.5,300,180,120,low demand\n"),
        )
        .unwrap();
        let corpus = load(&path).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus[0].standard_qty, Some(300.0));
    }
}
