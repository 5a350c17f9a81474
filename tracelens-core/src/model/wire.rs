//! JSON wire format for trace files.
//!
//! A file is an array of runs. Keys are PascalCase as written by the capturing
//! logger; camelCase is accepted too. `ExecutionTime` is a `TimeSpan` literal
//! (`[-][d.]hh:mm:ss[.fffffff]`) or a number of milliseconds.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Metadata, NodeId, TraceNode, TraceRun};
use crate::error::{TraceError, TraceResult};

const NANOS_PER_TICK: u64 = 100;

#[derive(Debug, Deserialize)]
struct WireRunIn {
    #[serde(rename = "Id", alias = "id", default)]
    id: Option<Uuid>,
    #[serde(rename = "Name", alias = "name", default)]
    name: Option<String>,
    #[serde(rename = "StartTime", alias = "startTime")]
    start_time: String,
    #[serde(rename = "Metadata", alias = "metadata", default)]
    metadata: Option<BTreeMap<String, Option<String>>>,
    #[serde(rename = "Data", alias = "data", default)]
    data: Option<Vec<Option<WireNodeIn>>>,
}

#[derive(Debug, Deserialize)]
struct WireNodeIn {
    #[serde(rename = "Id", alias = "id", default)]
    id: Option<Uuid>,
    #[serde(rename = "ClassName", alias = "className", default)]
    class_name: Option<String>,
    #[serde(rename = "MethodName", alias = "methodName", default)]
    method_name: Option<String>,
    #[serde(rename = "StartTime", alias = "startTime")]
    start_time: String,
    #[serde(rename = "ExecutionTime", alias = "executionTime")]
    execution_time: WireSpan,
    #[serde(rename = "Metadata", alias = "metadata", default)]
    metadata: Option<BTreeMap<String, Option<String>>>,
    #[serde(rename = "SubMethods", alias = "subMethods", default)]
    sub_methods: Option<Vec<Option<WireNodeIn>>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireSpan {
    Literal(String),
    Millis(f64),
}

#[derive(Debug, Serialize)]
struct WireRunOut<'a> {
    #[serde(rename = "Id", skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "StartTime")]
    start_time: String,
    #[serde(rename = "Metadata", skip_serializing_if = "BTreeMap::is_empty")]
    metadata: &'a Metadata,
    #[serde(rename = "Data")]
    data: Vec<WireNodeOut<'a>>,
}

#[derive(Debug, Serialize)]
struct WireNodeOut<'a> {
    #[serde(rename = "Id", skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    #[serde(rename = "ClassName")]
    class_name: &'a str,
    #[serde(rename = "MethodName")]
    method_name: &'a str,
    #[serde(rename = "StartTime")]
    start_time: String,
    #[serde(rename = "ExecutionTime")]
    execution_time: String,
    #[serde(rename = "Metadata", skip_serializing_if = "BTreeMap::is_empty")]
    metadata: &'a Metadata,
    #[serde(rename = "SubMethods")]
    sub_methods: Vec<WireNodeOut<'a>>,
}

/// Decode the runs held in one file's bytes. `path` only labels errors.
pub fn decode_runs(path: &Path, bytes: &[u8]) -> TraceResult<Vec<TraceRun>> {
    let wire: Vec<WireRunIn> =
        serde_json::from_slice(bytes).map_err(|e| TraceError::malformed(path, e.to_string()))?;
    wire.into_iter()
        .map(|run| build_run(run).map_err(|reason| TraceError::malformed(path, reason)))
        .collect()
}

/// Encode runs in the wire format, omitting empty metadata and absent ids.
pub fn encode_runs(runs: &[TraceRun]) -> TraceResult<String> {
    let wire: Vec<WireRunOut<'_>> = runs
        .iter()
        .map(|run| WireRunOut {
            id: run.id,
            name: &run.name,
            start_time: format_timestamp(run.start_time),
            metadata: &run.metadata,
            data: run.roots().iter().filter_map(|&id| node_out(run, id)).collect(),
        })
        .collect();
    Ok(serde_json::to_string(&wire)?)
}

fn node_out(run: &TraceRun, id: NodeId) -> Option<WireNodeOut<'_>> {
    let node = run.node(id)?;
    Some(WireNodeOut {
        id: node.id,
        class_name: &node.class_name,
        method_name: &node.method_name,
        start_time: format_timestamp(node.start_time),
        execution_time: format_timespan(node.duration),
        metadata: &node.metadata,
        sub_methods: node
            .children()
            .iter()
            .filter_map(|&child| node_out(run, child))
            .collect(),
    })
}

fn build_run(wire: WireRunIn) -> Result<TraceRun, String> {
    let start_time = parse_timestamp(&wire.start_time)?;
    let mut run = TraceRun::new(wire.name.unwrap_or_default(), start_time);
    run.id = wire.id.filter(|id| !id.is_nil());
    run.metadata = flatten_metadata(wire.metadata);

    for root in wire.data.unwrap_or_default().into_iter().flatten() {
        let (node, children) = build_node(root)?;
        let id = run.add_root(node);
        attach_children(&mut run, id, children)?;
    }
    Ok(run)
}

fn attach_children(
    run: &mut TraceRun,
    parent: NodeId,
    children: Vec<WireNodeIn>,
) -> Result<(), String> {
    for child in children {
        let (node, grandchildren) = build_node(child)?;
        let id = run
            .add_child(parent, node)
            .ok_or_else(|| "dangling parent while building call tree".to_string())?;
        attach_children(run, id, grandchildren)?;
    }
    Ok(())
}

fn build_node(wire: WireNodeIn) -> Result<(TraceNode, Vec<WireNodeIn>), String> {
    let start_time = parse_timestamp(&wire.start_time)?;
    let duration = match wire.execution_time {
        WireSpan::Literal(s) => parse_timespan(&s)?,
        WireSpan::Millis(ms) => millis_to_duration(ms)?,
    };
    if TimeDelta::from_std(duration)
        .ok()
        .and_then(|d| start_time.checked_add_signed(d))
        .is_none()
    {
        return Err(format!("execution time {duration:?} overflows the timestamp range"));
    }

    let mut node = TraceNode::new(
        wire.class_name.unwrap_or_default(),
        wire.method_name.unwrap_or_default(),
        start_time,
        duration,
    );
    node.id = wire.id.filter(|id| !id.is_nil());
    node.metadata = flatten_metadata(wire.metadata);

    let children = wire.sub_methods.unwrap_or_default().into_iter().flatten().collect();
    Ok((node, children))
}

fn flatten_metadata(raw: Option<BTreeMap<String, Option<String>>>) -> Metadata {
    raw.unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect()
}

/// Parse an ISO-8601 timestamp. Without an offset the value is taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp '{s}': {e}"))
}

pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a `TimeSpan` literal `[d.]hh:mm:ss[.fffffff]`. Negative spans are rejected.
pub fn parse_timespan(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let invalid = || format!("invalid execution time '{s}'");
    if s.starts_with('-') {
        return Err(format!("negative execution time '{s}'"));
    }

    let mut parts = s.split(':');
    let (Some(head), Some(minutes), Some(seconds), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let (days, hours) = match head.split_once('.') {
        Some((d, h)) => (d, h),
        None => ("0", head),
    };
    let (whole_seconds, fraction) = match seconds.split_once('.') {
        Some((w, f)) => (w, f),
        None => (seconds, ""),
    };
    if fraction.len() > 7 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let number = |field: &str, max: u64| -> Result<u64, String> {
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u64 = field.parse().map_err(|_| invalid())?;
        if value > max {
            return Err(invalid());
        }
        Ok(value)
    };
    let days = number(days, 10_675_199)?;
    let hours = number(hours, 23)?;
    let minutes = number(minutes, 59)?;
    let whole_seconds = number(whole_seconds, 59)?;
    let ticks = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<7}").parse::<u64>().map_err(|_| invalid())?
    };

    let secs = ((days * 24 + hours) * 60 + minutes) * 60 + whole_seconds;
    Ok(Duration::from_secs(secs) + Duration::from_nanos(ticks * NANOS_PER_TICK))
}

/// Render a duration as a `TimeSpan` literal, dropping sub-tick precision.
pub fn format_timespan(d: Duration) -> String {
    let total = d.as_secs();
    let days = total / 86_400;
    let hours = (total / 3_600) % 24;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;
    let ticks = u64::from(d.subsec_nanos()) / NANOS_PER_TICK;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}."));
    }
    out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if ticks > 0 {
        out.push_str(&format!(".{ticks:07}"));
    }
    out
}

fn millis_to_duration(ms: f64) -> Result<Duration, String> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(format!("invalid execution time {ms} ms"));
    }
    Duration::try_from_secs_f64(ms / 1000.0).map_err(|e| format!("invalid execution time {ms} ms: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"[
      {
        "Id": "6f1c2a34-0000-4000-8000-000000000001",
        "Name": "Nightly import",
        "StartTime": "2024-03-01T10:00:00.000+01:00",
        "Metadata": { "host": "srv-01" },
        "Data": [
          {
            "ClassName": "Importer",
            "MethodName": "Run",
            "StartTime": "2024-03-01T09:00:00.1234567Z",
            "ExecutionTime": "00:00:01.5000000",
            "SubMethods": [
              {
                "ClassName": "Importer",
                "MethodName": "Parse",
                "StartTime": "2024-03-01T09:00:00.2",
                "ExecutionTime": 250,
                "Metadata": { "rows": "12" },
                "SubMethods": null
              },
              null
            ]
          }
        ]
      },
      { "Name": "Empty", "StartTime": "2024-03-02T00:00:00Z", "Metadata": null, "Data": null }
    ]"#;

    #[test]
    fn test_decode_sample_file() {
        let runs = decode_runs(Path::new("sample.json"), SAMPLE.as_bytes()).unwrap();
        assert_eq!(runs.len(), 2);

        let run = &runs[0];
        assert_eq!(run.name, "Nightly import");
        assert!(run.id.is_some());
        assert_eq!(run.start_time, Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        assert_eq!(run.metadata.get("host").map(String::as_str), Some("srv-01"));
        assert_eq!(run.roots().len(), 1);
        assert_eq!(run.node_count(), 2);

        let root = run.node(run.roots()[0]).unwrap();
        assert_eq!(root.duration, Duration::from_millis(1500));
        assert!(root.id.is_none());
        let child = run.node(root.children()[0]).unwrap();
        assert_eq!(child.method_name, "Parse");
        assert_eq!(child.duration, Duration::from_millis(250));
        assert!(child.is_leaf());

        assert!(runs[1].is_empty());
        assert!(!runs[1].has_metadata());
    }

    #[test]
    fn test_camel_case_keys_accepted() {
        let json = r#"[{"name":"r","startTime":"2024-01-01T00:00:00Z","data":[
            {"className":"C","methodName":"m","startTime":"2024-01-01T00:00:00Z","executionTime":"00:00:00"}]}]"#;
        let runs = decode_runs(Path::new("camel.json"), json.as_bytes()).unwrap();
        assert_eq!(runs[0].nodes()[0].class_name, "C");
    }

    #[test]
    fn test_nil_uuid_is_absent() {
        let json = r#"[{"Id":"00000000-0000-0000-0000-000000000000","Name":"r","StartTime":"2024-01-01T00:00:00Z"}]"#;
        let runs = decode_runs(Path::new("nil.json"), json.as_bytes()).unwrap();
        assert!(runs[0].id.is_none());
    }

    #[test]
    fn test_negative_duration_is_malformed() {
        let json = r#"[{"Name":"r","StartTime":"2024-01-01T00:00:00Z","Data":[
            {"ClassName":"C","MethodName":"m","StartTime":"2024-01-01T00:00:00Z","ExecutionTime":"-00:00:01"}]}]"#;
        let err = decode_runs(Path::new("neg.json"), json.as_bytes()).unwrap_err();
        assert!(matches!(err, TraceError::Malformed { .. }));
        assert!(err.to_string().contains("neg.json"));
    }

    #[test]
    fn test_not_an_array_is_malformed() {
        let err = decode_runs(Path::new("obj.json"), br#"{"Name":"r"}"#).unwrap_err();
        assert!(matches!(err, TraceError::Malformed { .. }));
    }

    #[test]
    fn test_timespan_literals() {
        assert_eq!(parse_timespan("00:00:00").unwrap(), Duration::ZERO);
        assert_eq!(parse_timespan("00:00:00.999").unwrap(), Duration::from_millis(999));
        assert_eq!(parse_timespan("01:02:03.0000001").unwrap(), Duration::new(3723, 100));
        assert_eq!(parse_timespan("2.00:00:00").unwrap(), Duration::from_secs(172_800));
        assert!(parse_timespan("00:60:00").is_err());
        assert!(parse_timespan("1:2").is_err());
        assert!(parse_timespan("00:00:00.12345678").is_err());
        assert!(parse_timespan("abc").is_err());
    }

    #[test]
    fn test_format_timespan_matches_literal_shape() {
        assert_eq!(format_timespan(Duration::from_millis(1500)), "00:00:01.5000000");
        assert_eq!(format_timespan(Duration::from_secs(90_061)), "1.01:01:01");
        assert_eq!(format_timespan(Duration::ZERO), "00:00:00");
    }

    #[test]
    fn test_encode_omits_empty_metadata_and_absent_ids() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let mut bare = TraceRun::new("bare", start);
        bare.add_root(TraceNode::new("C", "m", start, Duration::from_millis(5)));
        let tagged = TraceRun::new("tagged", start).with_metadata("k", "v");

        let json = encode_runs(&[bare, tagged]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value[0].get("Metadata").is_none());
        assert!(value[0].get("Id").is_none());
        assert!(value[0]["Data"][0].get("Metadata").is_none());
        assert_eq!(value[1]["Metadata"]["k"], "v");
    }

    #[test]
    fn test_encoded_tree_decodes_to_same_shape() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let mut run = TraceRun::new("r", start);
        let a = run.add_root(TraceNode::new("C", "a", start, Duration::from_millis(30)));
        run.add_child(a, TraceNode::new("C", "a1", start, Duration::from_millis(10)).with_metadata("x", "1"))
            .unwrap();
        run.add_root(TraceNode::new("C", "b", start, Duration::from_millis(5)));

        let json = encode_runs(std::slice::from_ref(&run)).unwrap();
        let back = decode_runs(Path::new("mem"), json.as_bytes()).unwrap();
        assert_eq!(back, vec![run]);
    }
}
