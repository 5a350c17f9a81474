//! Tree-to-table projection of trace runs.
//!
//! Every query surface goes through [`flatten`]: a pre-order, left-to-right
//! walk of each run's root set that emits one [`FlatRow`] per call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::format::{duration_label, duration_millis};
use crate::model::{metadata_display, RunRef, TraceRun, Visit};

/// One call projected into a table row. Rows are built fresh per query and
/// never point back at the node they came from except through `node_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    pub class_name: String,
    pub method_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Whole milliseconds, truncated.
    pub duration_millis: i64,
    pub duration_label: String,
    pub level: usize,
    pub metadata: String,
    pub node_id: Uuid,
}

/// Flatten runs in the order given. With `with_source`, rows carry the name
/// of the file each run was loaded from.
pub fn flatten<'a>(runs: impl IntoIterator<Item = RunRef<'a>>, with_source: bool) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    for r in runs {
        let source = with_source.then_some(r.source);
        flatten_run(r.run, source, &mut rows);
    }
    rows
}

/// Append the rows of one run. Nodes without a persisted id get a fresh
/// one that is only valid for this traversal.
pub fn flatten_run(run: &TraceRun, source: Option<&str>, rows: &mut Vec<FlatRow>) {
    rows.reserve(run.node_count());
    rows.extend(run.walk().map(|visit| to_row(visit, source)));
}

fn to_row(visit: Visit<'_>, source: Option<&str>) -> FlatRow {
    let node = visit.node;
    FlatRow {
        source_file: source.map(str::to_string),
        class_name: node.class_name.clone(),
        method_name: node.method_name.clone(),
        start_time: node.start_time,
        end_time: node.end_time(),
        duration_millis: duration_millis(node.duration),
        duration_label: duration_label(node.duration),
        level: visit.level,
        metadata: metadata_display(&node.metadata),
        node_id: node.id.unwrap_or_else(Uuid::new_v4),
    }
}
