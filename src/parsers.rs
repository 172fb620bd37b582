use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::domain::normalize_key;
use crate::error::MgsError;
use crate::tabular::TabularFile;

pub const TAXON_SEPARATOR: char = '|';

pub const AGS_KEY: &str = "average_genome_size";
pub const TOTAL_BASES_KEY: &str = "total_bases";
pub const GENOME_EQUIVALENTS_KEY: &str = "genome_equivalents";

pub const ABUNDANCE_KEY: &str = "abundance";
pub const COVERAGE_KEY: &str = "coverage";

pub const RPK_KEY: &str = "rpk";
pub const RPKM_KEY: &str = "rpkm";
pub const RPKMG_KEY: &str = "rpkmg";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Int(value) => *value as f64,
            Scalar::Float(value) => *value,
        }
    }
}

pub type Table = IndexMap<String, Scalar>;
pub type RecordTable = IndexMap<String, Table>;

/// Normalized output of one result parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedResult {
    Table(Table),
    Records(RecordTable),
    Json(Value),
}

impl ParsedResult {
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            ParsedResult::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&RecordTable> {
        match self {
            ParsedResult::Records(records) => Some(records),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<Value, MgsError> {
        serde_json::to_value(self).map_err(|err| MgsError::Json(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Integer,
    Float,
}

/// Column layout of a two-column key/value table.
#[derive(Debug, Clone)]
pub struct KeyValueLayout {
    pub skip: usize,
    pub separator: u8,
    pub comment: Option<u8>,
    pub key_column: usize,
    pub value_column: usize,
    pub kind: NumericKind,
}

impl Default for KeyValueLayout {
    fn default() -> Self {
        Self {
            skip: 0,
            separator: b'\t',
            comment: Some(b'#'),
            key_column: 0,
            value_column: 1,
            kind: NumericKind::Float,
        }
    }
}

impl KeyValueLayout {
    /// ResistomeAnalyzer output: a `Sample\tName\tHits` header, then one row per name.
    fn resistome() -> Self {
        Self {
            skip: 1,
            key_column: 1,
            value_column: 2,
            kind: NumericKind::Integer,
            ..Self::default()
        }
    }
}

pub fn parse_number(value: &str, kind: NumericKind) -> Result<Scalar, MgsError> {
    let trimmed = value.trim();
    match kind {
        NumericKind::Integer => trimmed
            .parse::<i64>()
            .map(Scalar::Int)
            .map_err(|err| MgsError::InvalidNumber {
                value: trimmed.to_string(),
                reason: err.to_string(),
            }),
        NumericKind::Float => trimmed
            .parse::<f64>()
            .map(Scalar::Float)
            .map_err(|err| MgsError::InvalidNumber {
                value: trimmed.to_string(),
                reason: err.to_string(),
            }),
    }
}

/// Later rows overwrite earlier rows with the same key.
pub fn parse_key_value_table(path: &Path, layout: &KeyValueLayout) -> Result<Table, MgsError> {
    let file = TabularFile::new(path)
        .skip(layout.skip)
        .separator(layout.separator)
        .comment(layout.comment);

    let mut table = Table::new();
    for row in file.rows()? {
        let row = row?;
        let (Some(key), Some(value)) = (row.get(layout.key_column), row.get(layout.value_column))
        else {
            return Err(MgsError::FormatMismatch(format!(
                "{}: row has {} fields, expected key column {} and value column {}",
                file.path().display(),
                row.len(),
                layout.key_column,
                layout.value_column
            )));
        };
        table.insert(normalize_key(key), parse_number(value, layout.kind)?);
    }
    Ok(table)
}

pub fn parse_key_val_file(path: &Path) -> Result<ParsedResult, MgsError> {
    parse_key_value_table(path, &KeyValueLayout::default()).map(ParsedResult::Table)
}

/// Taxonomic profile in MPA layout, normalized so top-level taxa sum to one.
pub fn parse_mpa(path: &Path) -> Result<ParsedResult, MgsError> {
    let table = parse_key_value_table(path, &KeyValueLayout::default())?;
    normalize_abundances(table).map(ParsedResult::Table)
}

pub fn normalize_abundances(table: Table) -> Result<Table, MgsError> {
    let total: f64 = table
        .iter()
        .filter(|(taxon, _)| !taxon.contains(TAXON_SEPARATOR))
        .map(|(_, value)| value.as_f64())
        .sum();
    if total <= 0.0 {
        return Err(MgsError::FormatMismatch(
            "top-level taxa abundances sum to zero".to_string(),
        ));
    }

    Ok(table
        .into_iter()
        .map(|(taxon, value)| (taxon, Scalar::Float(value.as_f64() / total)))
        .collect())
}

/// Gene quantification block: one header row of gene names and three
/// positionally aligned value rows (RPK, RPKM, RPKMG). A leading row-label
/// column is dropped when present.
pub fn parse_gene_table(path: &Path) -> Result<ParsedResult, MgsError> {
    let rows = TabularFile::new(path)
        .separator(b',')
        .comment(None)
        .min_fields(1)
        .rows()?
        .take(4)
        .collect::<Result<Vec<_>, _>>()?;

    let [header, rpk, rpkm, rpkmg] = rows.as_slice() else {
        return Err(MgsError::FormatMismatch(format!(
            "{}: gene table needs a header and three value rows, found {} rows",
            path.display(),
            rows.len()
        )));
    };
    let value_rows = [(RPK_KEY, rpk), (RPKM_KEY, rpkm), (RPKMG_KEY, rpkmg)];
    for (name, row) in value_rows {
        if row.len() != header.len() {
            return Err(MgsError::FormatMismatch(format!(
                "{}: {name} row has {} fields but header has {}",
                path.display(),
                row.len(),
                header.len()
            )));
        }
    }

    let has_label_column = rpk
        .first()
        .map(|cell| cell.trim().parse::<f64>().is_err())
        .unwrap_or(false);
    let offset = usize::from(has_label_column);

    let genes = &header[offset..];
    let mut metrics = Vec::with_capacity(3);
    for (name, row) in value_rows {
        let values = row[offset..]
            .iter()
            .map(|cell| parse_number(cell, NumericKind::Float))
            .collect::<Result<Vec<_>, _>>()?;
        metrics.push((name, values));
    }

    let mut records = RecordTable::new();
    for (index, gene) in genes.iter().enumerate() {
        let record = metrics
            .iter()
            .map(|(name, values)| (name.to_string(), values[index].clone()))
            .collect::<Table>();
        records.insert(normalize_key(gene), record);
    }
    Ok(ParsedResult::Records(records))
}

/// MicrobeCensus report: requires average genome size, total bases and
/// genome equivalents, in any order.
pub fn parse_microbe_census(path: &Path) -> Result<ParsedResult, MgsError> {
    let rows = TabularFile::new(path).comment(None).rows()?;

    let mut average_genome_size = None;
    let mut total_bases = None;
    let mut genome_equivalents = None;
    for row in rows {
        let row = row?;
        let label = row[0].as_str();
        let value = row[1].as_str();
        if label.contains(AGS_KEY) {
            average_genome_size = Some(parse_number(value, NumericKind::Float)?);
        } else if label.contains(TOTAL_BASES_KEY) {
            total_bases = Some(parse_number(value, NumericKind::Integer)?);
        } else if label.contains(GENOME_EQUIVALENTS_KEY) {
            genome_equivalents = Some(parse_number(value, NumericKind::Float)?);
        }
    }

    let mut table = Table::new();
    for (key, value) in [
        (AGS_KEY, average_genome_size),
        (TOTAL_BASES_KEY, total_bases),
        (GENOME_EQUIVALENTS_KEY, genome_equivalents),
    ] {
        let value = value.ok_or_else(|| MgsError::MissingRequiredField(key.to_string()))?;
        table.insert(key.to_string(), value);
    }
    Ok(ParsedResult::Table(table))
}

pub fn parse_resistome_tables(
    gene: &Path,
    group: &Path,
    classus: &Path,
    mech: &Path,
) -> Result<ParsedResult, MgsError> {
    let layout = KeyValueLayout::resistome();
    let mut records = RecordTable::new();
    for (name, path) in [
        ("genes", gene),
        ("groups", group),
        ("classes", classus),
        ("mechanisms", mech),
    ] {
        records.insert(name.to_string(), parse_key_value_table(path, &layout)?);
    }
    Ok(ParsedResult::Records(records))
}

pub fn parse_humann2_pathways(abundance: &Path, coverage: &Path) -> Result<ParsedResult, MgsError> {
    let layout = KeyValueLayout::default();
    let abundances = parse_key_value_table(abundance, &layout)?;
    let coverages = parse_key_value_table(coverage, &layout)?;
    zip_tables(
        (ABUNDANCE_KEY, abundances),
        (COVERAGE_KEY, coverages),
        coverage,
    )
    .map(ParsedResult::Records)
}

pub fn parse_humann2_tables(
    read_depth_norm: &Path,
    ags_norm: &Path,
) -> Result<ParsedResult, MgsError> {
    let layout = KeyValueLayout::default();
    let rpkm = parse_key_value_table(read_depth_norm, &layout)?;
    let rpkmg = parse_key_value_table(ags_norm, &layout)?;
    zip_tables((RPKM_KEY, rpkm), (RPKMG_KEY, rpkmg), ags_norm).map(ParsedResult::Records)
}

/// Joins two tables on the primary table's keys.
fn zip_tables(
    primary: (&str, Table),
    secondary: (&str, Table),
    secondary_path: &Path,
) -> Result<RecordTable, MgsError> {
    let (primary_name, primary) = primary;
    let (secondary_name, mut secondary) = secondary;
    let mut records = RecordTable::new();
    for (key, value) in primary {
        let other = secondary.swap_remove(&key).ok_or_else(|| {
            MgsError::KeyLookup(format!("{key} missing from {}", secondary_path.display()))
        })?;
        let mut record = Table::new();
        record.insert(primary_name.to_string(), value);
        record.insert(secondary_name.to_string(), other);
        records.insert(key, record);
    }
    Ok(records)
}

pub fn parse_json(path: &Path) -> Result<ParsedResult, MgsError> {
    let content = fs::read_to_string(path)
        .map_err(|err| MgsError::Filesystem(format!("read {}: {err}", path.display())))?;
    serde_json::from_str(&content)
        .map(ParsedResult::Json)
        .map_err(|err| MgsError::Json(format!("{}: {err}", path.display())))
}
