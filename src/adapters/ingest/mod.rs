//! File ingestion: turns uploaded files into a [`PatientDataset`].
//!
//! Supported shapes:
//! - JSON / YAML object: patient id -> attribute map
//! - JSON / YAML array: attribute maps, identity from the `ID` field or
//!   `Patient_{index}`
//! - CSV / TSV / spreadsheet (first sheet): header row = attribute keys,
//!   first column = patient id

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader};
use serde_json::Value;

use crate::domain::{PatientDataset, PatientRecord, RawValue};
use crate::ports::PatientSource;

/// Default input size limit (10 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Default patient row limit.
pub const DEFAULT_MAX_ROWS: usize = 10_000;

/// Error type for ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unsupported input format: {0:?}")]
    UnsupportedFormat(String),

    #[error("Invalid input shape: {0}")]
    InvalidShape(String),

    #[error("Input is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("Input has more than {limit} patient rows")]
    TooManyRows { limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
}

/// Input file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestFormat {
    Json,
    Yaml,
    Csv,
    Tsv,
    /// Excel or OpenDocument workbook; only the first sheet is read.
    Spreadsheet,
}

impl IngestFormat {
    /// Detect the format from a file extension (case-insensitive).
    ///
    /// # Errors
    /// Returns `UnsupportedFormat` for unknown extensions.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Spreadsheet),
            _ => Err(IngestError::UnsupportedFormat(ext)),
        }
    }
}

/// Size and row limits applied to every input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestLimits {
    pub max_input_bytes: u64,
    pub max_rows: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl IngestLimits {
    fn check_size(&self, size: u64) -> Result<(), IngestError> {
        if size > self.max_input_bytes {
            return Err(IngestError::TooLarge {
                size,
                limit: self.max_input_bytes,
            });
        }
        Ok(())
    }

    fn check_rows(&self, rows: usize) -> Result<(), IngestError> {
        if rows > self.max_rows {
            return Err(IngestError::TooManyRows {
                limit: self.max_rows,
            });
        }
        Ok(())
    }
}

/// Parse in-memory text of a known format.
///
/// # Errors
/// Returns error if the text exceeds the limits, fails to parse, or is not
/// a patient mapping.
pub fn parse_str(
    text: &str,
    format: IngestFormat,
    limits: &IngestLimits,
) -> Result<PatientDataset, IngestError> {
    limits.check_size(text.len() as u64)?;

    match format {
        IngestFormat::Json => from_document(serde_json::from_str(text)?, limits),
        IngestFormat::Yaml => from_document(serde_yaml::from_str(text)?, limits),
        IngestFormat::Csv => from_table(text, b',', limits),
        IngestFormat::Tsv => from_table(text, b'\t', limits),
        IngestFormat::Spreadsheet => from_sheet(text.as_bytes(), limits),
    }
}

/// Parse raw file contents of a known format.
///
/// # Errors
/// Returns error if the input exceeds the limits, is not valid UTF-8 for a
/// text format, fails to parse, or is not a patient mapping.
pub fn parse_bytes(
    bytes: &[u8],
    format: IngestFormat,
    limits: &IngestLimits,
) -> Result<PatientDataset, IngestError> {
    limits.check_size(bytes.len() as u64)?;

    if format == IngestFormat::Spreadsheet {
        return from_sheet(bytes, limits);
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|e| IngestError::InvalidShape(format!("input is not UTF-8: {e}")))?;
    parse_str(text, format, limits)
}

fn from_document(document: Value, limits: &IngestLimits) -> Result<PatientDataset, IngestError> {
    match document {
        Value::Object(patients) => {
            limits.check_rows(patients.len())?;
            let mut map = BTreeMap::new();
            for (patient_id, attributes) in patients {
                if patient_id.trim().is_empty() {
                    continue;
                }
                map.insert(patient_id, attribute_map(attributes)?);
            }
            Ok(PatientDataset::from_map(map))
        }
        Value::Array(rows) => {
            limits.check_rows(rows.len())?;
            let rows = rows
                .into_iter()
                .map(attribute_map)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PatientDataset::from_rows(rows))
        }
        _ => Err(IngestError::InvalidShape(
            "top level must be an object of patients or an array of rows".to_string(),
        )),
    }
}

fn attribute_map(value: Value) -> Result<BTreeMap<String, RawValue>, IngestError> {
    let Value::Object(fields) = value else {
        return Err(IngestError::InvalidShape(
            "every patient entry must be an attribute map".to_string(),
        ));
    };

    fields
        .into_iter()
        .map(|(key, value)| {
            let raw = scalar(&key, value)?;
            Ok((key, raw))
        })
        .collect()
}

fn scalar(key: &str, value: Value) -> Result<RawValue, IngestError> {
    match value {
        Value::Null => Ok(RawValue::Missing),
        Value::Bool(b) => Ok(RawValue::Flag(b)),
        Value::Number(n) => n.as_f64().map(RawValue::Number).ok_or_else(|| {
            IngestError::InvalidShape(format!("attribute {key:?} is not a representable number"))
        }),
        Value::String(s) => Ok(RawValue::Text(s)),
        Value::Array(_) | Value::Object(_) => Err(IngestError::InvalidShape(format!(
            "attribute {key:?} holds a nested value"
        ))),
    }
}

fn from_table(
    text: &str,
    delimiter: u8,
    limits: &IngestLimits,
) -> Result<PatientDataset, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader.records().map(|row| -> Result<Vec<RawValue>, IngestError> {
        let row = row?;
        Ok(row.iter().map(RawValue::from).collect())
    });

    from_grid(&headers, rows, limits)
}

/// First sheet of a workbook, laid out like a CSV table.
fn from_sheet(bytes: &[u8], limits: &IngestLimits) -> Result<PatientDataset, IngestError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(PatientDataset::default());
    };
    let range = range?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(PatientDataset::default());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    from_grid(
        &headers,
        rows.map(|row| -> Result<Vec<RawValue>, IngestError> {
            Ok(row.iter().map(cell_value).collect())
        }),
        limits,
    )
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Missing,
        Data::Int(n) => RawValue::Number(*n as f64),
        Data::Float(n) => RawValue::Number(*n),
        Data::Bool(b) => RawValue::Flag(*b),
        Data::String(s) => RawValue::Text(s.clone()),
        other => RawValue::Text(other.to_string()),
    }
}

/// Shared table layout: `headers[0]` names the id column, every other
/// non-empty header is an attribute key. Rows with an empty id are skipped
/// and short rows read as missing values.
fn from_grid<I>(
    headers: &[String],
    rows: I,
    limits: &IngestLimits,
) -> Result<PatientDataset, IngestError>
where
    I: Iterator<Item = Result<Vec<RawValue>, IngestError>>,
{
    let mut records = Vec::new();

    for row in rows {
        let row = row?;
        let patient_id = row
            .first()
            .map(|cell| cell.as_text().into_owned())
            .unwrap_or_default();
        if patient_id.is_empty() {
            continue;
        }
        limits.check_rows(records.len() + 1)?;

        let attributes = headers
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, key)| !key.is_empty())
            .map(|(i, key)| {
                let cell = row.get(i).cloned().unwrap_or(RawValue::Missing);
                (key.clone(), cell)
            })
            .collect();

        records.push(PatientRecord {
            patient_id,
            attributes,
        });
    }

    Ok(PatientDataset::from_records(records))
}

/// A patient file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    format: IngestFormat,
    limits: IngestLimits,
}

impl FileSource {
    /// Open a file, detecting its format from the extension.
    ///
    /// # Errors
    /// Returns `UnsupportedFormat` if the extension is not recognized.
    pub fn open(path: impl Into<PathBuf>, limits: IngestLimits) -> Result<Self, IngestError> {
        let path = path.into();
        let format = IngestFormat::from_path(&path)?;
        Ok(Self {
            path,
            format,
            limits,
        })
    }

    #[must_use]
    pub fn format(&self) -> IngestFormat {
        self.format
    }
}

impl PatientSource for FileSource {
    type Error = IngestError;

    fn load(&self) -> Result<PatientDataset, IngestError> {
        let size = std::fs::metadata(&self.path)?.len();
        self.limits.check_size(size)?;

        let bytes = std::fs::read(&self.path)?;
        let dataset = parse_bytes(&bytes, self.format, &self.limits)?;

        tracing::info!(
            format = ?self.format,
            bytes = size,
            patients = dataset.len(),
            "Loaded patient file"
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("Should create temp file");
        file.write_all(content.as_bytes()).expect("Should write");
        file
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(IngestFormat::from_path(Path::new("a.JSON")).ok(), Some(IngestFormat::Json));
        assert_eq!(IngestFormat::from_path(Path::new("a.yml")).ok(), Some(IngestFormat::Yaml));
        assert_eq!(IngestFormat::from_path(Path::new("a.tsv")).ok(), Some(IngestFormat::Tsv));
        assert_eq!(
            IngestFormat::from_path(Path::new("cohort.XLSX")).ok(),
            Some(IngestFormat::Spreadsheet)
        );
        assert_eq!(
            IngestFormat::from_path(Path::new("cohort.xls")).ok(),
            Some(IngestFormat::Spreadsheet)
        );
        assert!(matches!(
            IngestFormat::from_path(Path::new("cohort.numbers")),
            Err(IngestError::UnsupportedFormat(ext)) if ext == "numbers"
        ));
        assert!(IngestFormat::from_path(Path::new("README")).is_err());
    }

    #[test]
    fn test_json_keyed_object() {
        let text = r#"{"P2": {"gender": 1, "age": "45"}, "P1": {"HB": 10.5, "EGFR": null}}"#;
        let dataset = parse_str(text, IngestFormat::Json, &IngestLimits::default())
            .expect("Should parse");

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records()[0].patient_id, "P1");
        let p2 = dataset.get("P2").expect("P2 present");
        assert_eq!(p2.get("gender").map(|v| v.as_text().into_owned()), Some("1".to_string()));
        assert_eq!(dataset.get("P1").and_then(|p| p.get("EGFR")), Some(&RawValue::Missing));
    }

    #[test]
    fn test_json_rows_use_id_or_position() {
        let text = r#"[{"ID": "A-7", "age": 50}, {"age": 61}]"#;
        let dataset = parse_str(text, IngestFormat::Json, &IngestLimits::default())
            .expect("Should parse");
        let ids: Vec<_> = dataset.records().iter().map(|r| r.patient_id.as_str()).collect();
        assert_eq!(ids, vec!["A-7", "Patient_1"]);
    }

    #[test]
    fn test_invalid_shapes() {
        let limits = IngestLimits::default();
        assert!(matches!(
            parse_str("42", IngestFormat::Json, &limits),
            Err(IngestError::InvalidShape(_))
        ));
        assert!(matches!(
            parse_str(r#"{"P1": [1, 2]}"#, IngestFormat::Json, &limits),
            Err(IngestError::InvalidShape(_))
        ));
        assert!(matches!(
            parse_str(r#"{"P1": {"age": {"value": 4}}}"#, IngestFormat::Json, &limits),
            Err(IngestError::InvalidShape(_))
        ));
        assert!(matches!(
            parse_str("{not json", IngestFormat::Json, &limits),
            Err(IngestError::Json(_))
        ));
    }

    #[test]
    fn test_yaml_document() {
        let text = "P1:\n  gender: 0\n  age: 72\n  HTN: '1'\nP2:\n  gender: 1\n";
        let dataset = parse_str(text, IngestFormat::Yaml, &IngestLimits::default())
            .expect("Should parse");
        assert_eq!(dataset.len(), 2);
        let p1 = dataset.get("P1").expect("P1 present");
        assert_eq!(p1.get("age"), Some(&RawValue::Number(72.0)));
        assert_eq!(p1.get("HTN"), Some(&RawValue::Text("1".to_string())));
    }

    #[test]
    fn test_csv_table() {
        let text = "ID,gender,age,HB\nP1,1,45,10\n,0,50,11\nP2, 0 ,,12.5\n";
        let dataset = parse_str(text, IngestFormat::Csv, &IngestLimits::default())
            .expect("Should parse");

        assert_eq!(dataset.len(), 2);
        let p2 = dataset.get("P2").expect("P2 present");
        assert_eq!(p2.get("gender"), Some(&RawValue::Text("0".to_string())));
        assert!(p2.get("age").is_some_and(RawValue::is_empty));
        assert!(p2.get("ID").is_none());
    }

    #[test]
    fn test_csv_short_row_reads_missing() {
        let dataset = parse_str("ID,gender,age
P1,1
", IngestFormat::Csv, &IngestLimits::default())
            .expect("Should parse");
        let p1 = dataset.get("P1").expect("P1 present");
        assert_eq!(p1.get("age"), Some(&RawValue::Missing));
    }

    fn workbook_file(rows: &[&[Cell]]) -> NamedTempFile {
        let file = tempfile::Builder::new()
            .suffix(".xlsx")
            .tempfile()
            .expect("Should create temp file");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match cell {
                    Cell::Text(s) => sheet.write_string(r, c, *s).map(|_| ()),
                    Cell::Num(n) => sheet.write_number(r, c, *n).map(|_| ()),
                    Cell::Blank => Ok(()),
                }
                .expect("Should write cell");
            }
        }
        workbook.save(file.path()).expect("Should save workbook");
        file
    }

    enum Cell {
        Text(&'static str),
        Num(f64),
        Blank,
    }

    #[test]
    fn test_spreadsheet_first_sheet() {
        use Cell::{Blank, Num, Text};
        let file = workbook_file(&[
            &[Text("ID"), Text("gender"), Text("age"), Text("HBA")],
            &[Text("P1"), Num(1.0), Num(45.0), Text("8.5%")],
            &[Blank, Num(0.0), Num(50.0), Blank],
            &[Num(1002.0), Num(0.0), Blank, Num(11.0)],
        ]);

        let source = FileSource::open(file.path(), IngestLimits::default()).expect("Should open");
        assert_eq!(source.format(), IngestFormat::Spreadsheet);
        let dataset = source.load().expect("Should load");

        assert_eq!(dataset.len(), 2);
        let p1 = dataset.get("P1").expect("P1 present");
        assert_eq!(p1.get("gender").map(|v| v.as_text().into_owned()), Some("1".to_string()));
        assert_eq!(p1.get("HBA"), Some(&RawValue::Text("8.5%".to_string())));

        let numeric = dataset.get("1002").expect("Numeric id present");
        assert!(numeric.get("age").is_some_and(RawValue::is_empty));
        assert_eq!(numeric.get("HBA"), Some(&RawValue::Number(11.0)));
    }

    #[test]
    fn test_spreadsheet_header_only_is_empty() {
        let file = workbook_file(&[&[Cell::Text("ID"), Cell::Text("gender")]]);
        let dataset = FileSource::open(file.path(), IngestLimits::default())
            .expect("Should open")
            .load()
            .expect("Should load");
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_spreadsheet_garbage_is_error() {
        let file = temp_with(".xlsx", "ID,gender\nP1,1\n");
        let source = FileSource::open(file.path(), IngestLimits::default()).expect("Should open");
        assert!(matches!(source.load(), Err(IngestError::Spreadsheet(_))));
    }

    #[test]
    fn test_tsv_header_only_is_empty() {
        let dataset = parse_str("ID\tgender\n", IngestFormat::Tsv, &IngestLimits::default())
            .expect("Should parse");
        assert!(dataset.is_empty());

        let empty = parse_str("", IngestFormat::Csv, &IngestLimits::default())
            .expect("Should parse");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_limits() {
        let tight = IngestLimits {
            max_input_bytes: 16,
            max_rows: 1,
        };
        assert!(matches!(
            parse_str(&"x".repeat(17), IngestFormat::Csv, &tight),
            Err(IngestError::TooLarge { size: 17, limit: 16 })
        ));

        let rows = IngestLimits {
            max_input_bytes: 1024,
            max_rows: 1,
        };
        assert!(matches!(
            parse_str("ID,age\nA,1\nB,2\n", IngestFormat::Csv, &rows),
            Err(IngestError::TooManyRows { limit: 1 })
        ));
        assert!(matches!(
            parse_str(r#"[{"age": 1}, {"age": 2}]"#, IngestFormat::Json, &rows),
            Err(IngestError::TooManyRows { .. })
        ));
    }

    #[test]
    fn test_file_source_loads() {
        let file = temp_with(".json", r#"{"P1": {"gender": "1", "age": "45"}}"#);
        let source = FileSource::open(file.path(), IngestLimits::default()).expect("Should open");
        assert_eq!(source.format(), IngestFormat::Json);

        let dataset = source.load().expect("Should load");
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_file_source_enforces_size_before_reading() {
        let file = temp_with(".csv", "ID,age\nP1,40\n");
        let limits = IngestLimits {
            max_input_bytes: 4,
            ..IngestLimits::default()
        };
        let source = FileSource::open(file.path(), limits).expect("Should open");
        assert!(matches!(source.load(), Err(IngestError::TooLarge { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("Should create dir");
        let source = FileSource::open(dir.path().join("absent.csv"), IngestLimits::default())
            .expect("Should open");
        assert!(matches!(source.load(), Err(IngestError::Io(_))));
    }
}
