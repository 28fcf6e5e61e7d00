//! Row normalizer and tree builder for DEFTABLE job definitions.
//!
//! Takes the rows of a flat job table, where list fields are `;`-delimited
//! strings, and produces a nested document: an optional `SMART_FOLDER` per
//! folder key, one `JOB` per row, and typed children for the schedule,
//! variables, conditions, notifications and on-outcome actions.
//!
//! # Example
//! ```
//! use deftable_core::{transform, JobRow};
//! use deftable_types::{Field, TransformConfig};
//!
//! let rows = vec![JobRow::new()
//!     .with(Field::Folder, "F1")
//!     .with(Field::JobName, "J1")
//!     .with(Field::Variables, "A=1;B=2")];
//! let out = transform(&rows, &TransformConfig::default()).unwrap();
//! let jobs = out.document.jobs();
//! assert_eq!(jobs.len(), 1);
//! assert_eq!(jobs[0].child("VARIABLES").unwrap().children.len(), 2);
//! ```

pub mod builder;
pub mod normalize;
pub mod render;
pub mod row;
pub mod tree;

pub use builder::{build_job_node, transform, TransformReport, Transformed, TreeBuilder};
pub use normalize::{
    normalize, split_list, Condition, Cycle, Directive, Irregularity, JobType, NormalizedRow,
    OutcomeActions, Payload, Schedule, ShoutRecord, Variable, DEFAULT_ODATE,
};
pub use render::{to_json, to_xml};
pub use row::JobRow;
pub use tree::{AttrBuilder, Attribute, Document, Element};
