//! CSV table loader: binds table headers to [`Field`]s and yields [`JobRow`]s.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use deftable_core::JobRow;
use deftable_types::{DeftableError, Field, Result};

/// Header name bound to each field. Defaults to [`Field::default_header`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    headers: BTreeMap<Field, String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            headers: Field::ALL
                .iter()
                .map(|&f| (f, f.default_header().to_string()))
                .collect(),
        }
    }
}

impl ColumnMap {
    /// Parse overrides from a JSON object such as `{"JobName": "JOB"}`.
    /// Fields not named keep their default header.
    pub fn from_json(json: &str) -> Result<Self> {
        let overrides: BTreeMap<String, String> = serde_json::from_str(json)?;
        let mut map = Self::default();
        for (name, header) in overrides {
            let field: Field = name.parse()?;
            map.headers.insert(field, header.trim().to_string());
        }
        Ok(map)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn header(&self, field: Field) -> &str {
        self.headers
            .get(&field)
            .map(String::as_str)
            .unwrap_or_else(|| field.default_header())
    }
}

fn csv_error(err: csv::Error) -> DeftableError {
    DeftableError::Csv(err.to_string())
}

/// Read every data row of a CSV table.
///
/// Optional columns that are absent from the header read as empty cells; a
/// missing required column is fatal.
pub fn load_csv<R: Read>(reader: R, columns: &ColumnMap) -> Result<Vec<JobRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut bindings = Vec::new();
    for field in Field::ALL {
        let wanted = columns.header(field);
        match headers.iter().position(|h| h == wanted) {
            Some(idx) => bindings.push((field, idx)),
            None if field.is_required() => {
                return Err(DeftableError::MissingColumn {
                    column: wanted.to_string(),
                })
            }
            None => tracing::debug!(field = %field, header = wanted, "Optional column not present"),
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let row: JobRow = bindings
            .iter()
            .map(|&(field, idx)| (field, record.get(idx).unwrap_or("")))
            .collect();
        rows.push(row);
    }
    tracing::debug!(rows = rows.len(), columns = bindings.len(), "Loaded table");
    Ok(rows)
}

pub fn load_csv_file(path: &Path, columns: &ColumnMap) -> Result<Vec<JobRow>> {
    let file = std::fs::File::open(path)?;
    load_csv(file, columns)
}
