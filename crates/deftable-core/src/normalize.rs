//! Row normalizer: decodes one raw [`JobRow`] into typed, trimmed parts.
//!
//! Every list field is split on `;` and trimmed. Irregular tokens (a variable
//! without `=`, an unknown directive keyword, ...) are either recorded and
//! dropped ([`ParseMode::Lenient`]) or reported as
//! [`DeftableError::MalformedField`] ([`ParseMode::Strict`]).

use deftable_types::{DeftableError, Field, ParseMode, Result};
use serde::{Deserialize, Serialize};

use crate::row::JobRow;

/// Override token used when a condition names no date.
pub const DEFAULT_ODATE: &str = "ODAT";

const LIST_DELIMITER: char = ';';
const NOTIFY_KEYWORDS: &[&str] = &["DOSHOUT", "NOTIFY"];
const RERUN_KEYWORDS: &[&str] = &["DORERUN", "RERUN"];

/// Fields copied verbatim onto the job node, in table order.
pub const SCALAR_FIELDS: [Field; 10] = [
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
];

// ---------------------------------------------------------------------------
// Normalized parts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    Command,
    ExternalScript,
    EmbeddedScript,
    /// Holds the raw type text. Empty when the row declares no type.
    Unknown(String),
}

impl JobType {
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "command" => JobType::Command,
            "script" | "job" | "external script" => JobType::ExternalScript,
            "embedded script" | "embedded" => JobType::EmbeddedScript,
            _ => JobType::Unknown(raw.trim().to_string()),
        }
    }
}

/// The type-specific part of a job. At most one variant's attributes are
/// ever emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Command {
        command: Option<String>,
    },
    ExternalScript {
        file_name: Option<String>,
        file_path: Option<String>,
    },
    EmbeddedScript {
        file_name: Option<String>,
        body: Option<String>,
    },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub cyclic: String,
    pub interval: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub days: Option<String>,
    pub cycle: Option<Cycle>,
    /// Zero-padded to four characters.
    pub time_from: Option<String>,
    pub time_until: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// Empty when the token was `NAME=`.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub odate: String,
}

/// One position across the parallel shout columns. Only built when the
/// message at that position is non-empty; the other columns may be shorter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoutRecord {
    pub when: Option<String>,
    pub time: Option<String>,
    pub urgency: Option<String>,
    pub dest: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    Notify {
        message: String,
        dest: Option<String>,
    },
    Rerun,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeActions {
    pub directives: Vec<Directive>,
}

impl OutcomeActions {
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

/// A token the normalizer could not interpret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Irregularity {
    pub field: Field,
    pub token: String,
    pub reason: String,
}

impl Irregularity {
    pub fn into_error(self, row: usize) -> DeftableError {
        DeftableError::MalformedField {
            row,
            field: self.field,
            token: self.token,
            reason: self.reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// 1-based position of the row in the source table.
    pub index: usize,
    /// Non-empty scalar fields, trimmed, in [`SCALAR_FIELDS`] order.
    pub scalars: Vec<(Field, String)>,
    pub job_type: JobType,
    pub payload: Payload,
    pub schedule: Schedule,
    pub variables: Vec<Variable>,
    pub in_conditions: Vec<Condition>,
    pub out_conditions: Vec<Condition>,
    pub quantitative: Vec<String>,
    pub calendars: Vec<String>,
    pub shouts: Vec<ShoutRecord>,
    pub on_success: OutcomeActions,
    pub on_failure: OutcomeActions,
    /// Tokens dropped in lenient mode. Always empty in strict mode.
    pub irregularities: Vec<Irregularity>,
}

impl NormalizedRow {
    pub fn scalar(&self, field: Field) -> Option<&str> {
        self.scalars
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    /// Grouping key; `None` when the folder cell is empty.
    pub fn folder(&self) -> Option<&str> {
        self.scalar(Field::Folder)
    }
}

// ---------------------------------------------------------------------------
// Splitting helpers
// ---------------------------------------------------------------------------

fn trimmed(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Split a list cell on `;`, trimming each token and discarding empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(LIST_DELIMITER).filter_map(trimmed).collect()
}

/// Split a parallel cell on `;` keeping positions. An empty cell has no
/// positions at all.
fn split_positional(raw: &str) -> Vec<Option<String>> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(LIST_DELIMITER).map(trimmed).collect()
}

/// Token at `index`, or `None` when the list is shorter or the slot is empty.
fn token_at(list: &[Option<String>], index: usize) -> Option<String> {
    list.get(index).cloned().flatten()
}

/// Left-pad a time value with zeros to four characters (`800` -> `0800`).
pub fn pad_time(raw: &str) -> String {
    format!("{:0>4}", raw)
}

// ---------------------------------------------------------------------------
// Token parsers
// ---------------------------------------------------------------------------

fn parse_variable(token: &str) -> std::result::Result<Variable, &'static str> {
    let (name, value) = token.split_once('=').ok_or("missing '='")?;
    let name = name.trim();
    if name.is_empty() {
        return Err("empty variable name");
    }
    Ok(Variable {
        name: name.to_string(),
        value: value.trim().to_string(),
    })
}

fn parse_condition(token: &str) -> std::result::Result<Condition, &'static str> {
    let mut words = token.split_whitespace();
    let name = words.next().ok_or("empty condition")?;
    let odate = words.next().unwrap_or(DEFAULT_ODATE);
    if words.next().is_some() {
        return Err("expected 'NAME [ODATE]'");
    }
    Ok(Condition {
        name: name.to_string(),
        odate: odate.to_string(),
    })
}

fn parse_directive(token: &str) -> std::result::Result<Directive, &'static str> {
    match token.split_once('=') {
        Some((keyword, message)) => {
            let keyword = keyword.trim().to_ascii_uppercase();
            if !NOTIFY_KEYWORDS.contains(&keyword.as_str()) {
                return Err("unrecognized directive");
            }
            let message = message.trim();
            if message.is_empty() {
                return Err("notification without a message");
            }
            Ok(Directive::Notify {
                message: message.to_string(),
                dest: None,
            })
        }
        None => {
            let keyword = token.trim().to_ascii_uppercase();
            if RERUN_KEYWORDS.contains(&keyword.as_str()) {
                Ok(Directive::Rerun)
            } else {
                Err("unrecognized directive")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

struct Normalizer<'r> {
    row: &'r JobRow,
    index: usize,
    mode: ParseMode,
    irregularities: Vec<Irregularity>,
}

impl<'r> Normalizer<'r> {
    fn cell(&self, field: Field) -> Option<String> {
        trimmed(self.row.get(field))
    }

    /// Record an irregular token, or fail in strict mode.
    fn flag(&mut self, field: Field, token: &str, reason: &str) -> Result<()> {
        let irregularity = Irregularity {
            field,
            token: token.to_string(),
            reason: reason.to_string(),
        };
        match self.mode {
            ParseMode::Strict => Err(irregularity.into_error(self.index)),
            ParseMode::Lenient => {
                tracing::debug!(
                    row = self.index,
                    field = %field,
                    token,
                    reason,
                    "Skipping irregular token"
                );
                self.irregularities.push(irregularity);
                Ok(())
            }
        }
    }

    /// Parse every token of a list field, keeping the ones `parse` accepts.
    fn parse_list<T>(
        &mut self,
        field: Field,
        parse: fn(&str) -> std::result::Result<T, &'static str>,
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for token in split_list(self.row.get(field)) {
            match parse(&token) {
                Ok(item) => out.push(item),
                Err(reason) => self.flag(field, &token, reason)?,
            }
        }
        Ok(out)
    }

    fn job_type(&mut self) -> Result<JobType> {
        let job_type = JobType::parse(self.row.get(Field::Type));
        if let JobType::Unknown(raw) = &job_type {
            if !raw.is_empty() {
                let raw = raw.clone();
                self.flag(Field::Type, &raw, "unknown job type")?;
            }
        }
        Ok(job_type)
    }

    fn payload(&self, job_type: &JobType) -> Payload {
        match job_type {
            JobType::Command => Payload::Command {
                command: self.cell(Field::Command),
            },
            JobType::ExternalScript => Payload::ExternalScript {
                file_name: self.cell(Field::FileName),
                file_path: self.cell(Field::FilePath),
            },
            JobType::EmbeddedScript => Payload::EmbeddedScript {
                file_name: self.cell(Field::FileName),
                body: self.cell(Field::ScriptBody),
            },
            JobType::Unknown(_) => Payload::Unknown,
        }
    }

    fn schedule(&self) -> Schedule {
        let cycle = match (self.cell(Field::Cyclic), self.cell(Field::Interval)) {
            (Some(cyclic), Some(interval)) => Some(Cycle { cyclic, interval }),
            _ => None,
        };
        Schedule {
            days: self.cell(Field::Days),
            cycle,
            time_from: self.cell(Field::TimeFrom).map(|t| pad_time(&t)),
            time_until: self.cell(Field::TimeUntil),
        }
    }

    fn shouts(&self) -> Vec<ShoutRecord> {
        let when = split_positional(self.row.get(Field::ShoutWhen));
        let time = split_positional(self.row.get(Field::ShoutTime));
        let urgency = split_positional(self.row.get(Field::ShoutUrgency));
        let dest = split_positional(self.row.get(Field::ShoutDest));
        let messages = split_positional(self.row.get(Field::ShoutMessage));

        messages
            .iter()
            .enumerate()
            .filter_map(|(i, message)| {
                let message = message.clone()?;
                Some(ShoutRecord {
                    when: token_at(&when, i),
                    time: token_at(&time, i),
                    urgency: token_at(&urgency, i),
                    dest: token_at(&dest, i),
                    message,
                })
            })
            .collect()
    }

    /// Directives pair with the destination at the same position. A single
    /// destination token applies to every notification of the outcome.
    fn outcome(&mut self, actions: Field, dest: Field) -> Result<OutcomeActions> {
        let tokens = split_positional(self.row.get(actions));
        let dests = split_positional(self.row.get(dest));
        let shared = match dests.as_slice() {
            [only] => only.clone(),
            _ => None,
        };

        let mut directives = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            let Some(token) = token else { continue };
            match parse_directive(token) {
                Ok(Directive::Notify { message, .. }) => directives.push(Directive::Notify {
                    message,
                    dest: shared.clone().or_else(|| token_at(&dests, i)),
                }),
                Ok(directive) => directives.push(directive),
                Err(reason) => self.flag(actions, token, reason)?,
            }
        }
        Ok(OutcomeActions { directives })
    }
}

/// Normalize one row. `index` is the row's 1-based position in the table.
pub fn normalize(row: &JobRow, index: usize, mode: ParseMode) -> Result<NormalizedRow> {
    let mut n = Normalizer {
        row,
        index,
        mode,
        irregularities: Vec::new(),
    };

    let scalars = SCALAR_FIELDS
        .iter()
        .filter_map(|&field| n.cell(field).map(|v| (field, v)))
        .collect();
    let job_type = n.job_type()?;
    let payload = n.payload(&job_type);
    let schedule = n.schedule();
    let variables = n.parse_list(Field::Variables, parse_variable)?;
    let in_conditions = n.parse_list(Field::InConditions, parse_condition)?;
    let out_conditions = n.parse_list(Field::OutConditions, parse_condition)?;
    let quantitative = split_list(row.get(Field::Quantitative));
    let calendars = split_list(row.get(Field::Calendars));
    let shouts = n.shouts();
    let on_success = n.outcome(Field::OnSuccess, Field::OnSuccessDest)?;
    let on_failure = n.outcome(Field::OnFailure, Field::OnFailureDest)?;

    Ok(NormalizedRow {
        index,
        scalars,
        job_type,
        payload,
        schedule,
        variables,
        in_conditions,
        out_conditions,
        quantitative,
        calendars,
        shouts,
        on_success,
        on_failure,
        irregularities: n.irregularities,
    })
}
