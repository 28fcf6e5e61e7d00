//! Tree builder: turns normalized rows into the DEFTABLE element hierarchy.
//!
//! Job nodes are built once per row and appended either to the document root
//! or to a `SMART_FOLDER` group created on the first row carrying its key.

use std::collections::HashMap;

use deftable_types::{Field, Result, TransformConfig};
use serde::Serialize;

use crate::normalize::{
    normalize, Condition, Directive, Irregularity, NormalizedRow, OutcomeActions, Payload,
};
use crate::row::JobRow;
use crate::tree::{AttrBuilder, Document, Element};

pub const ROOT_TAG: &str = "DEFTABLE";
pub const GROUP_TAG: &str = "SMART_FOLDER";
pub const JOB_TAG: &str = "JOB";

/// Sign marking an out-condition as raised rather than required.
pub const OUTCOND_SIGN: &str = "ADD";

/// Urgency carried by every on-outcome notification.
pub const NOTIFY_URGENCY: &str = "V";

/// Output attribute name for each scalar field.
pub fn scalar_attribute(field: Field) -> Option<&'static str> {
    let name = match field {
        Field::Folder => "PARENT_FOLDER",
        Field::JobName => "JOBNAME",
        Field::Type => "TASKTYPE",
        Field::Application => "APPLICATION",
        Field::SubApplication => "SUB_APPLICATION",
        Field::Description => "DESCRIPTION",
        Field::Host => "NODEID",
        Field::RunAs => "RUN_AS",
        Field::MaxRerun => "MAXRERUN",
        Field::MaxWait => "MAXWAIT",
        _ => return None,
    };
    Some(name)
}

// --- Child builders ---

fn schedule_element(row: &NormalizedRow) -> Element {
    let s = &row.schedule;
    let attrs = AttrBuilder::new()
        .set_opt("WEEKDAYS", s.days.as_deref())
        .set_opt("CYCLIC", s.cycle.as_ref().map(|c| c.cyclic.as_str()))
        .set_opt("INTERVAL", s.cycle.as_ref().map(|c| c.interval.as_str()))
        .set_opt("TIMEFROM", s.time_from.as_deref())
        .set_opt("TIMEUNTIL", s.time_until.as_deref())
        .build();
    Element::new("SCHEDULE", attrs)
}

fn variables_element(row: &NormalizedRow) -> Option<Element> {
    if row.variables.is_empty() {
        return None;
    }
    let entries = row
        .variables
        .iter()
        .map(|v| {
            let attrs = AttrBuilder::new()
                .set("NAME", &v.name)
                .set("VALUE", &v.value)
                .build();
            Element::new("VARIABLE", attrs)
        })
        .collect();
    Some(Element::new("VARIABLES", Vec::new()).with_children(entries))
}

fn conditions_element(
    wrapper: &str,
    entry: &str,
    conditions: &[Condition],
    sign: Option<&str>,
) -> Option<Element> {
    if conditions.is_empty() {
        return None;
    }
    let entries = conditions
        .iter()
        .map(|c| {
            let attrs = AttrBuilder::new()
                .set("NAME", &c.name)
                .set("ODATE", &c.odate)
                .set_opt("SIGN", sign)
                .build();
            Element::new(entry, attrs)
        })
        .collect();
    Some(Element::new(wrapper, Vec::new()).with_children(entries))
}

fn outcome_element(code: &str, actions: &OutcomeActions) -> Option<Element> {
    if actions.is_empty() {
        return None;
    }
    let entries = actions
        .directives
        .iter()
        .map(|d| match d {
            Directive::Notify { message, dest } => {
                let attrs = AttrBuilder::new()
                    .set("URGENCY", NOTIFY_URGENCY)
                    .set("MESSAGE", message)
                    .set_opt("DEST", dest.as_deref())
                    .build();
                Element::new("DOSHOUT", attrs)
            }
            Directive::Rerun => Element::new("DORERUN", Vec::new()),
        })
        .collect();
    let attrs = AttrBuilder::new().set("STMT", "*").set("CODE", code).build();
    Some(Element::new("ON", attrs).with_children(entries))
}

fn payload_attrs(attrs: AttrBuilder, payload: &Payload) -> AttrBuilder {
    match payload {
        Payload::Command { command } => attrs.set_opt("CMDLINE", command.as_deref()),
        Payload::ExternalScript {
            file_name,
            file_path,
        } => attrs
            .set_opt("MEMNAME", file_name.as_deref())
            .set_opt("MEMLIB", file_path.as_deref()),
        Payload::EmbeddedScript { file_name, body } => attrs
            .set_opt("MEMNAME", file_name.as_deref())
            .set_opt("INSTREAM_SCRIPT", body.as_deref()),
        Payload::Unknown => attrs,
    }
}

/// Build the complete, immutable job node for one normalized row.
pub fn build_job_node(row: &NormalizedRow) -> Element {
    let mut attrs = AttrBuilder::new();
    for (field, value) in &row.scalars {
        if let Some(name) = scalar_attribute(*field) {
            attrs.insert(name, value);
        }
    }
    let attrs = payload_attrs(attrs, &row.payload).build();

    let mut children = vec![schedule_element(row)];
    children.extend(variables_element(row));
    children.extend(conditions_element("INCONDS", "INCOND", &row.in_conditions, None));
    children.extend(conditions_element(
        "OUTCONDS",
        "OUTCOND",
        &row.out_conditions,
        Some(OUTCOND_SIGN),
    ));
    children.extend(row.quantitative.iter().map(|name| {
        let attrs = AttrBuilder::new()
            .set("NAME", name)
            .set("QUANT", "1")
            .set("ONFAIL", "R")
            .set("ONOK", "R")
            .build();
        Element::new("QUANTITATIVE", attrs)
    }));
    children.extend(row.shouts.iter().map(|s| {
        let attrs = AttrBuilder::new()
            .set_opt("WHEN", s.when.as_deref())
            .set_opt("TIME", s.time.as_deref())
            .set_opt("URGENCY", s.urgency.as_deref())
            .set_opt("DEST", s.dest.as_deref())
            .set("MESSAGE", &s.message)
            .build();
        Element::new("SHOUT", attrs)
    }));
    children.extend(outcome_element("OK", &row.on_success));
    children.extend(outcome_element("NOTOK", &row.on_failure));
    children.extend(row.calendars.iter().map(|name| {
        Element::new(
            "RULE_BASED_CALENDARS",
            AttrBuilder::new().set("NAME", name).build(),
        )
    }));

    Element::new(JOB_TAG, attrs).with_children(children)
}

// ---------------------------------------------------------------------------
// TreeBuilder
// ---------------------------------------------------------------------------

/// Incrementally assembles a document, one row at a time, in table order.
pub struct TreeBuilder {
    group_by_folder: bool,
    root: Element,
    /// Folder key -> index of its group node among the root's children.
    groups: HashMap<String, usize>,
    jobs: usize,
}

impl TreeBuilder {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            group_by_folder: config.group_by_folder,
            root: Element::new(ROOT_TAG, Vec::new()),
            groups: HashMap::new(),
            jobs: 0,
        }
    }

    /// Append the job node for `row`. Rows without a folder key go directly
    /// under the root.
    pub fn push(&mut self, row: &NormalizedRow) {
        let job = build_job_node(row);
        self.jobs += 1;

        let folder = if self.group_by_folder { row.folder() } else { None };
        let Some(folder) = folder else {
            self.root.push(job);
            return;
        };

        let slot = match self.groups.get(folder) {
            Some(&slot) => slot,
            None => {
                tracing::debug!(folder, "Creating folder group");
                let attrs = AttrBuilder::new().set("FOLDER_NAME", folder).build();
                self.root.push(Element::new(GROUP_TAG, attrs));
                let slot = self.root.children.len() - 1;
                self.groups.insert(folder.to_string(), slot);
                slot
            }
        };
        self.root.children[slot].push(job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn finish(self) -> Document {
        Document::new(self.root)
    }
}

// ---------------------------------------------------------------------------
// One-shot transform
// ---------------------------------------------------------------------------

/// Summary of a transform run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformReport {
    pub rows: usize,
    pub jobs: usize,
    pub groups: usize,
    /// Tokens dropped in lenient mode, with their 1-based row number.
    pub irregularities: Vec<(usize, Irregularity)>,
}

#[derive(Debug, Clone)]
pub struct Transformed {
    pub document: Document,
    pub report: TransformReport,
}

/// Normalize and build every row in a single forward pass.
pub fn transform(rows: &[JobRow], config: &TransformConfig) -> Result<Transformed> {
    let mut builder = TreeBuilder::new(config);
    let mut irregularities = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        let normalized = normalize(row, i + 1, config.mode)?;
        builder.push(&normalized);
        irregularities.extend(
            normalized
                .irregularities
                .into_iter()
                .map(|irr| (normalized.index, irr)),
        );
    }

    let report = TransformReport {
        rows: rows.len(),
        jobs: builder.job_count(),
        groups: builder.group_count(),
        irregularities,
    };
    tracing::info!(
        rows = report.rows,
        groups = report.groups,
        skipped_tokens = report.irregularities.len(),
        "Transform complete"
    );

    Ok(Transformed {
        document: builder.finish(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use deftable_types::ParseMode;

    fn node(row: JobRow) -> Element {
        build_job_node(&normalize(&row, 1, ParseMode::Lenient).unwrap())
    }

    #[test]
    fn attributes_are_exactly_non_empty_scalars() {
        let job = node(
            JobRow::new()
                .with(Field::Folder, "F1")
                .with(Field::JobName, "J1")
                .with(Field::Description, "")
                .with(Field::Host, " host01 ")
                .with(Field::MaxRerun, "3"),
        );
        assert_eq!(
            job.attr_names(),
            vec!["PARENT_FOLDER", "JOBNAME", "NODEID", "MAXRERUN"]
        );
        assert_eq!(job.attr("NODEID"), Some("host01"));
    }

    #[test]
    fn schedule_is_always_present() {
        let job = node(JobRow::new().with(Field::JobName, "J1"));
        let schedules: Vec<_> = job.children_named("SCHEDULE").collect();
        assert_eq!(schedules.len(), 1);
        assert!(schedules[0].attrs.is_empty());
        assert_eq!(job.children.len(), 1);
    }

    #[test]
    fn schedule_attributes() {
        let job = node(
            JobRow::new()
                .with(Field::Days, "MON")
                .with(Field::Cyclic, "1")
                .with(Field::Interval, "00015M")
                .with(Field::TimeFrom, "930")
                .with(Field::TimeUntil, "2200"),
        );
        let s = job.child("SCHEDULE").unwrap();
        assert_eq!(
            s.attr_names(),
            vec!["WEEKDAYS", "CYCLIC", "INTERVAL", "TIMEFROM", "TIMEUNTIL"]
        );
        assert_eq!(s.attr("TIMEFROM"), Some("0930"));
    }

    #[test]
    fn variables_in_order_and_malformed_dropped() {
        let job = node(JobRow::new().with(Field::Variables, "A=B;C=D;E"));
        let vars: Vec<_> = job
            .child("VARIABLES")
            .unwrap()
            .children
            .iter()
            .map(|v| (v.attr("NAME").unwrap(), v.attr("VALUE").unwrap()))
            .collect();
        assert_eq!(vars, vec![("A", "B"), ("C", "D")]);
    }

    #[test]
    fn variables_child_absent_when_nothing_parses() {
        let job = node(JobRow::new().with(Field::Variables, "E;F"));
        assert!(job.child("VARIABLES").is_none());
    }

    #[test]
    fn conditions_carry_odate_and_sign() {
        let job = node(
            JobRow::new()
                .with(Field::InConditions, "COND1 20240101;COND2")
                .with(Field::OutConditions, "DONE"),
        );
        let ins = &job.child("INCONDS").unwrap().children;
        assert_eq!(ins[0].attr("NAME"), Some("COND1"));
        assert_eq!(ins[0].attr("ODATE"), Some("20240101"));
        assert_eq!(ins[1].attr("ODATE"), Some("ODAT"));
        assert_eq!(ins[0].attr("SIGN"), None);

        let outs = &job.child("OUTCONDS").unwrap().children;
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].attr("SIGN"), Some("ADD"));
    }

    #[test]
    fn outcome_blocks_hold_directives_in_order() {
        let job = node(
            JobRow::new()
                .with(Field::OnSuccess, "DOSHOUT=done")
                .with(Field::OnFailure, "DORERUN;DOSHOUT=failed;UNKNOWN")
                .with(Field::OnFailureDest, "ops-team"),
        );
        let ons: Vec<_> = job.children_named("ON").collect();
        assert_eq!(ons.len(), 2);
        assert_eq!(ons[0].attr("CODE"), Some("OK"));
        assert_eq!(ons[0].children[0].attr("DEST"), None);

        let failure = ons[1];
        assert_eq!(failure.attr("CODE"), Some("NOTOK"));
        assert_eq!(failure.attr("STMT"), Some("*"));
        let names: Vec<_> = failure.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["DORERUN", "DOSHOUT"]);
        assert!(failure.children[0].attrs.is_empty());
        assert_eq!(failure.children[1].attr("MESSAGE"), Some("failed"));
        assert_eq!(failure.children[1].attr("DEST"), Some("ops-team"));
        assert_eq!(failure.children[1].attr("URGENCY"), Some("V"));
        assert_eq!(
            failure.children[1].attr_names(),
            vec!["URGENCY", "MESSAGE", "DEST"]
        );
    }

    #[test]
    fn each_notification_gets_its_own_destination() {
        let job = node(
            JobRow::new()
                .with(Field::OnFailure, "DOSHOUT=m1;DOSHOUT=m2")
                .with(Field::OnFailureDest, "ops;dba"),
        );
        let on = job.child("ON").unwrap();
        assert_eq!(on.children[0].attr("MESSAGE"), Some("m1"));
        assert_eq!(on.children[0].attr("DEST"), Some("ops"));
        assert_eq!(on.children[1].attr("MESSAGE"), Some("m2"));
        assert_eq!(on.children[1].attr("DEST"), Some("dba"));
    }

    #[test]
    fn outcome_block_absent_when_only_unrecognized_tokens() {
        let job = node(JobRow::new().with(Field::OnSuccess, "FOO;BAR"));
        assert_eq!(job.children_named("ON").count(), 0);
    }

    #[test]
    fn shout_suppressed_without_message() {
        let job = node(
            JobRow::new()
                .with(Field::ShoutWhen, "A;B")
                .with(Field::ShoutMessage, "m1;"),
        );
        let shouts: Vec<_> = job.children_named("SHOUT").collect();
        assert_eq!(shouts.len(), 1);
        assert_eq!(shouts[0].attr("WHEN"), Some("A"));
        assert_eq!(shouts[0].attr("MESSAGE"), Some("m1"));
        assert_eq!(shouts[0].attr("TIME"), None);
    }

    #[test]
    fn command_type_emits_only_cmdline() {
        let job = node(
            JobRow::new()
                .with(Field::Type, "Command")
                .with(Field::Command, "echo hi")
                .with(Field::FileName, "x.sh")
                .with(Field::FilePath, "/opt")
                .with(Field::ScriptBody, "echo body"),
        );
        assert_eq!(job.attr("CMDLINE"), Some("echo hi"));
        for attr in ["MEMNAME", "MEMLIB", "INSTREAM_SCRIPT"] {
            assert_eq!(job.attr(attr), None, "{attr} should be absent");
        }
    }

    #[test]
    fn external_and_embedded_script_payloads() {
        let job = node(
            JobRow::new()
                .with(Field::Type, "Script")
                .with(Field::Command, "ignored")
                .with(Field::FileName, "x.sh")
                .with(Field::FilePath, "/opt"),
        );
        assert_eq!(job.attr("MEMNAME"), Some("x.sh"));
        assert_eq!(job.attr("MEMLIB"), Some("/opt"));
        assert_eq!(job.attr("CMDLINE"), None);

        let job = node(
            JobRow::new()
                .with(Field::Type, "Embedded Script")
                .with(Field::FileName, "x.sh")
                .with(Field::FilePath, "/opt")
                .with(Field::ScriptBody, "echo body"),
        );
        assert_eq!(job.attr("MEMNAME"), Some("x.sh"));
        assert_eq!(job.attr("INSTREAM_SCRIPT"), Some("echo body"));
        assert_eq!(job.attr("MEMLIB"), None);
    }

    #[test]
    fn unknown_type_keeps_other_children() {
        let job = node(
            JobRow::new()
                .with(Field::Type, "Mainframe")
                .with(Field::Command, "echo hi")
                .with(Field::Variables, "A=1"),
        );
        assert_eq!(job.attr("TASKTYPE"), Some("Mainframe"));
        for attr in ["CMDLINE", "MEMNAME", "MEMLIB", "INSTREAM_SCRIPT"] {
            assert_eq!(job.attr(attr), None);
        }
        assert!(job.child("VARIABLES").is_some());
    }

    #[test]
    fn quantitative_and_calendars() {
        let job = node(
            JobRow::new()
                .with(Field::Quantitative, "CPU;DB_CONN")
                .with(Field::Calendars, "WORKDAYS"),
        );
        let quants: Vec<_> = job.children_named("QUANTITATIVE").collect();
        assert_eq!(quants.len(), 2);
        assert_eq!(quants[1].attr("NAME"), Some("DB_CONN"));
        assert_eq!(quants[1].attr("QUANT"), Some("1"));
        assert_eq!(
            job.child("RULE_BASED_CALENDARS").unwrap().attr("NAME"),
            Some("WORKDAYS")
        );
    }

    #[test]
    fn grouping_preserves_first_occurrence_order() {
        let rows: Vec<_> = [("X", "J1"), ("Y", "J2"), ("X", "J3")]
            .into_iter()
            .map(|(f, j)| JobRow::new().with(Field::Folder, f).with(Field::JobName, j))
            .collect();
        let out = transform(&rows, &TransformConfig::default()).unwrap();
        let groups: Vec<_> = out.document.groups().collect();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].attr("FOLDER_NAME"), Some("X"));
        assert_eq!(groups[1].attr("FOLDER_NAME"), Some("Y"));
        let x_jobs: Vec<_> = groups[0]
            .children
            .iter()
            .map(|j| j.attr("JOBNAME").unwrap())
            .collect();
        assert_eq!(x_jobs, vec!["J1", "J3"]);
        assert_eq!(out.report.groups, 2);
        assert_eq!(out.report.jobs, 3);
    }

    #[test]
    fn grouping_disabled_yields_flat_jobs() {
        let rows = vec![
            JobRow::new().with(Field::Folder, "X").with(Field::JobName, "J1"),
            JobRow::new().with(Field::Folder, "Y").with(Field::JobName, "J2"),
        ];
        let config = TransformConfig {
            group_by_folder: false,
            ..TransformConfig::default()
        };
        let out = transform(&rows, &config).unwrap();
        let names: Vec<_> = out.document.root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["JOB", "JOB"]);
        // folder still travels as a job attribute
        assert_eq!(out.document.root.children[0].attr("PARENT_FOLDER"), Some("X"));
    }

    #[test]
    fn rows_without_folder_go_to_root() {
        let rows = vec![
            JobRow::new().with(Field::JobName, "J0"),
            JobRow::new().with(Field::Folder, "X").with(Field::JobName, "J1"),
        ];
        let out = transform(&rows, &TransformConfig::default()).unwrap();
        let names: Vec<_> = out.document.root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["JOB", "SMART_FOLDER"]);
        assert_eq!(out.document.jobs().len(), 2);
    }

    #[test]
    fn report_collects_irregularities_with_row_numbers() {
        let rows = vec![
            JobRow::new().with(Field::JobName, "J1"),
            JobRow::new().with(Field::JobName, "J2").with(Field::Variables, "bad"),
        ];
        let out = transform(&rows, &TransformConfig::default()).unwrap();
        assert_eq!(out.report.irregularities.len(), 1);
        assert_eq!(out.report.irregularities[0].0, 2);
    }

    #[test]
    fn strict_transform_propagates_row_error() {
        let rows = vec![JobRow::new().with(Field::JobName, "J1").with(Field::Type, "Dummy")];
        let config = TransformConfig {
            mode: ParseMode::Strict,
            ..TransformConfig::default()
        };
        let err = transform(&rows, &config).unwrap_err();
        assert_eq!(err.row(), Some(1));
    }
}
