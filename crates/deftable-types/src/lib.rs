//! Shared fields, configuration, and errors for the DEFTABLE transformer.
//!
//! This crate provides the foundational types used across the other crates:
//! - `DeftableError`: unified error taxonomy
//! - `Field`: the fixed column schema of a job table
//! - `ParseMode` / `TransformConfig`: knobs for the normalizer and tree builder

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unified error type for all DEFTABLE subsystems.
#[derive(Debug, thiserror::Error)]
pub enum DeftableError {
    // === Loader boundary ===
    #[error("Required column '{column}' is missing from the input table")]
    MissingColumn { column: String },

    #[error("Invalid column map: {0}")]
    ColumnMap(String),

    #[error("CSV error: {0}")]
    Csv(String),

    // === Row-level (strict mode only) ===
    #[error("Malformed {field} on row {row}: '{token}' ({reason})")]
    MalformedField {
        row: usize,
        field: Field,
        token: String,
        reason: String,
    },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeftableError {
    /// Returns `true` if the error concerns a single row's data rather than the
    /// shape of the whole input.
    pub fn is_row_level(&self) -> bool {
        matches!(self, DeftableError::MalformedField { .. })
    }

    /// The 1-based data row the error refers to, when there is one.
    pub fn row(&self) -> Option<usize> {
        match self {
            DeftableError::MalformedField { row, .. } => Some(*row),
            _ => None,
        }
    }
}

/// A convenience alias for `Result<T, DeftableError>`.
pub type Result<T> = std::result::Result<T, DeftableError>;

// ---------------------------------------------------------------------------
// Field: the fixed column schema
// ---------------------------------------------------------------------------

/// One column of the job table. The set is closed; column-name binding to
/// concrete table headers is the loader's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Folder,
    JobName,
    Type,
    Application,
    SubApplication,
    Description,
    Host,
    RunAs,
    MaxRerun,
    MaxWait,
    Command,
    FileName,
    FilePath,
    ScriptBody,
    Days,
    Cyclic,
    Interval,
    TimeFrom,
    TimeUntil,
    Variables,
    InConditions,
    OutConditions,
    Quantitative,
    Calendars,
    ShoutWhen,
    ShoutTime,
    ShoutUrgency,
    ShoutDest,
    ShoutMessage,
    OnSuccess,
    OnSuccessDest,
    OnFailure,
    OnFailureDest,
}

impl Field {
    /// Every field, in table order.
    pub const ALL: [Field; 33] = [
        Field::Folder,
        Field::JobName,
        Field::Type,
        Field::Application,
        Field::SubApplication,
        Field::Description,
        Field::Host,
        Field::RunAs,
        Field::MaxRerun,
        Field::MaxWait,
        Field::Command,
        Field::FileName,
        Field::FilePath,
        Field::ScriptBody,
        Field::Days,
        Field::Cyclic,
        Field::Interval,
        Field::TimeFrom,
        Field::TimeUntil,
        Field::Variables,
        Field::InConditions,
        Field::OutConditions,
        Field::Quantitative,
        Field::Calendars,
        Field::ShoutWhen,
        Field::ShoutTime,
        Field::ShoutUrgency,
        Field::ShoutDest,
        Field::ShoutMessage,
        Field::OnSuccess,
        Field::OnSuccessDest,
        Field::OnFailure,
        Field::OnFailureDest,
    ];

    /// Identifier used in column map files and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Field::Folder => "Folder",
            Field::JobName => "JobName",
            Field::Type => "Type",
            Field::Application => "Application",
            Field::SubApplication => "SubApplication",
            Field::Description => "Description",
            Field::Host => "Host",
            Field::RunAs => "RunAs",
            Field::MaxRerun => "MaxRerun",
            Field::MaxWait => "MaxWait",
            Field::Command => "Command",
            Field::FileName => "FileName",
            Field::FilePath => "FilePath",
            Field::ScriptBody => "ScriptBody",
            Field::Days => "Days",
            Field::Cyclic => "Cyclic",
            Field::Interval => "Interval",
            Field::TimeFrom => "TimeFrom",
            Field::TimeUntil => "TimeUntil",
            Field::Variables => "Variables",
            Field::InConditions => "InConditions",
            Field::OutConditions => "OutConditions",
            Field::Quantitative => "Quantitative",
            Field::Calendars => "Calendars",
            Field::ShoutWhen => "ShoutWhen",
            Field::ShoutTime => "ShoutTime",
            Field::ShoutUrgency => "ShoutUrgency",
            Field::ShoutDest => "ShoutDest",
            Field::ShoutMessage => "ShoutMessage",
            Field::OnSuccess => "OnSuccess",
            Field::OnSuccessDest => "OnSuccessDest",
            Field::OnFailure => "OnFailure",
            Field::OnFailureDest => "OnFailureDest",
        }
    }

    /// Header the loader looks for when no column map overrides it.
    pub fn default_header(self) -> &'static str {
        match self {
            Field::Folder => "Folder Name",
            Field::JobName => "Job Name",
            Field::Type => "Type",
            Field::Application => "Application",
            Field::SubApplication => "Sub Application",
            Field::Description => "Description",
            Field::Host => "Host",
            Field::RunAs => "Run As",
            Field::MaxRerun => "Max Rerun",
            Field::MaxWait => "Max Wait",
            Field::Command => "Command",
            Field::FileName => "File Name",
            Field::FilePath => "File Path",
            Field::ScriptBody => "Script Body",
            Field::Days => "Days",
            Field::Cyclic => "Cyclic",
            Field::Interval => "Interval",
            Field::TimeFrom => "Time From",
            Field::TimeUntil => "Time Until",
            Field::Variables => "Variables",
            Field::InConditions => "In Conditions",
            Field::OutConditions => "Out Conditions",
            Field::Quantitative => "Quantitative Resources",
            Field::Calendars => "Rule Based Calendars",
            Field::ShoutWhen => "Shout When",
            Field::ShoutTime => "Shout Time",
            Field::ShoutUrgency => "Shout Urgency",
            Field::ShoutDest => "Shout Dest",
            Field::ShoutMessage => "Shout Message",
            Field::OnSuccess => "On Success Actions",
            Field::OnSuccessDest => "On Success Dest",
            Field::OnFailure => "On Failure Actions",
            Field::OnFailureDest => "On Failure Dest",
        }
    }

    /// Columns without which a table is structurally incompatible.
    pub fn is_required(self) -> bool {
        matches!(self, Field::Folder | Field::JobName)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = DeftableError;

    fn from_str(s: &str) -> Result<Self> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| DeftableError::ColumnMap(format!("unknown field '{}'", s)))
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the normalizer treats irregular sub-field tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Drop the offending token and keep going.
    #[default]
    Lenient,
    /// Fail the transform on the first irregular token.
    Strict,
}

/// Configuration for one transform run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Nest job nodes under one `SMART_FOLDER` per distinct folder key.
    pub group_by_folder: bool,
    pub mode: ParseMode,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            group_by_folder: true,
            mode: ParseMode::Lenient,
        }
    }
}
