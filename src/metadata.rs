use std::path::Path;

use csv::ReaderBuilder;
use serde_json::{Map, Number, Value};

use crate::catalog::SampleMetadata;
use crate::error::MgsError;

/// Reads a metadata CSV whose first column holds sample names and whose
/// remaining columns are attributes. When `sample_names` is non-empty only
/// those samples are kept.
pub fn parse_metadata_csv(path: &Path, sample_names: &[String]) -> Result<SampleMetadata, MgsError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| MgsError::MetadataParse(format!("{}: {err}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|err| MgsError::MetadataParse(err.to_string()))?
        .clone();
    if headers.len() < 2 {
        return Err(MgsError::MetadataParse(format!(
            "{}: expected a sample column and at least one attribute column",
            path.display()
        )));
    }

    let mut metadata = SampleMetadata::new();
    for record in reader.records() {
        let record = record.map_err(|err| MgsError::MetadataParse(err.to_string()))?;
        let Some(sample_name) = record.get(0) else {
            continue;
        };
        if !sample_names.is_empty() && !sample_names.iter().any(|name| name == sample_name) {
            continue;
        }
        let attributes = headers
            .iter()
            .zip(record.iter())
            .skip(1)
            .map(|(column, cell)| (column.to_string(), cell_value(cell)))
            .collect::<Map<String, Value>>();
        metadata.insert(sample_name.to_string(), attributes);
    }
    Ok(metadata)
}

fn cell_value(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(value) = cell.parse::<i64>() {
        return Value::Number(value.into());
    }
    if let Some(value) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(value);
    }
    Value::String(cell.to_string())
}
