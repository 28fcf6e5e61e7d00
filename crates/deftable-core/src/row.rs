use std::collections::BTreeMap;

use deftable_types::Field;
use serde::{Deserialize, Serialize};

/// One raw table record. Cells the loader did not bind read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRow {
    cells: BTreeMap<Field, String>,
}

impl JobRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, handy for constructing rows in code.
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.cells.insert(field, value.into());
    }

    /// Raw cell value, untrimmed. Unbound fields yield `""`.
    pub fn get(&self, field: Field) -> &str {
        self.cells.get(&field).map(String::as_str).unwrap_or("")
    }
}

impl<S: Into<String>> FromIterator<(Field, S)> for JobRow {
    fn from_iter<I: IntoIterator<Item = (Field, S)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|(f, v)| (f, v.into())).collect(),
        }
    }
}
