//! Read-only selection over loaded runs and their flattened rows.
//!
//! Two run filters fall back to the whole collection when nothing matches
//! (an unmatched key means "no filter" to the caller). The class/method
//! filter does not: an empty answer is a real answer there.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{TraceError, TraceResult};
use crate::flatten::{flatten, FlatRow};
use crate::format::oa_date_key;
use crate::model::{metadata_display, wire::parse_timestamp, RunRef, RunSet};

/// Closed interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> TraceResult<Self> {
        if start > end {
            return Err(TraceError::InvalidArgument(format!(
                "time window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A window that admits every instant.
    pub fn unbounded() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Runs picked by a fallback filter.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub runs: Vec<RunRef<'a>>,
    /// False when nothing matched and `runs` is the whole collection.
    pub matched: bool,
}

impl<'a> Selection<'a> {
    fn or_everything(set: &'a RunSet, runs: Vec<RunRef<'a>>, filter: &str) -> Self {
        if runs.is_empty() {
            tracing::debug!(filter, "No run matched, falling back to the full collection");
            return Self {
                runs: set.iter().collect(),
                matched: false,
            };
        }
        Self { runs, matched: true }
    }
}

/// Runs whose name equals `name` and whose start time matches `start_key`.
///
/// The key is either the run's OLE Automation date as rendered by
/// [`oa_date_key`] or a timestamp equal to the run's start.
pub fn runs_by_name_and_start<'a>(set: &'a RunSet, name: &str, start_key: &str) -> Selection<'a> {
    let key = start_key.trim();
    let key_time = parse_timestamp(key).ok();
    let runs = set
        .iter()
        .filter(|r| r.run.name == name)
        .filter(|r| oa_date_key(r.run.start_time) == key || key_time == Some(r.run.start_time))
        .collect();
    Selection::or_everything(set, runs, "name+start")
}

/// Parse a comma-separated list of run identifiers. Blank entries are ignored,
/// anything else that is not a UUID is rejected.
pub fn parse_id_list(raw: &str) -> TraceResult<Vec<Uuid>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|e| TraceError::InvalidArgument(format!("invalid identifier '{s}': {e}")))
        })
        .collect::<TraceResult<Vec<Uuid>>>()?;
    if ids.is_empty() {
        return Err(TraceError::InvalidArgument(
            "identifier list is empty".to_string(),
        ));
    }
    Ok(ids)
}

/// Runs whose identifier is in the comma-separated `raw_ids`.
pub fn runs_by_ids<'a>(set: &'a RunSet, raw_ids: &str) -> TraceResult<Selection<'a>> {
    let wanted: HashSet<Uuid> = parse_id_list(raw_ids)?.into_iter().collect();
    let runs = set
        .iter()
        .filter(|r| r.run.id.is_some_and(|id| wanted.contains(&id)))
        .collect();
    Ok(Selection::or_everything(set, runs, "ids"))
}

/// Calls of `class_name::method_name` inside runs that started within
/// `window`, tagged with their file and ordered by start time.
pub fn method_calls(
    set: &RunSet,
    class_name: &str,
    method_name: &str,
    window: &TimeWindow,
) -> Vec<FlatRow> {
    let in_window = set.iter().filter(|r| window.contains(r.run.start_time));
    let mut rows: Vec<FlatRow> = flatten(in_window, true)
        .into_iter()
        .filter(|row| row.class_name == class_name && row.method_name == method_name)
        .collect();
    sort_by_start(&mut rows);
    rows
}

/// Ascending by start time; equal starts keep emission order.
pub fn sort_by_start(rows: &mut [FlatRow]) {
    rows.sort_by_key(|row| row.start_time);
}

/// One run summarised as a row of the run listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRow {
    pub source_file: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    /// The key [`runs_by_name_and_start`] accepts for this run.
    pub start_key: String,
    pub metadata: String,
    pub id: Option<Uuid>,
}

pub fn run_rows<'a>(runs: impl IntoIterator<Item = RunRef<'a>>) -> Vec<RunRow> {
    runs.into_iter()
        .map(|r| RunRow {
            source_file: r.source.to_string(),
            name: r.run.name.clone(),
            start_time: r.run.start_time,
            start_key: oa_date_key(r.run.start_time),
            metadata: metadata_display(&r.run.metadata),
            id: r.run.id,
        })
        .collect()
}
