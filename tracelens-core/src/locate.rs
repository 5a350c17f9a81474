//! Find the metadata attached to one call by its identifier.

use serde::Serialize;
use uuid::Uuid;

use crate::model::{RunRef, RunSet, TraceNode};

/// One key/value pair of a call's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

/// A located call and the run that holds it.
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub run: RunRef<'a>,
    pub node: &'a TraceNode,
}

/// First call whose id equals `id`, scanning runs in collection order and
/// each run depth-first pre-order. Later matches are never examined.
pub fn find_node(set: &RunSet, id: Uuid) -> Option<Located<'_>> {
    set.iter().find_map(|run| {
        run.run
            .walk()
            .find(|visit| visit.node.id == Some(id))
            .map(|visit| Located {
                run,
                node: visit.node,
            })
    })
}

/// Metadata of the first call matching `raw_id`, as key/value rows.
///
/// An unparseable identifier, an unknown one and a match without metadata
/// all yield no rows.
pub fn locate_metadata(set: &RunSet, raw_id: &str) -> Vec<MetadataEntry> {
    let id = match Uuid::parse_str(raw_id.trim()) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(id = raw_id, error = %e, "Ignoring malformed metadata identifier");
            return Vec::new();
        }
    };

    let Some(found) = find_node(set, id) else {
        tracing::debug!(%id, "No call carries this identifier");
        return Vec::new();
    };

    found
        .node
        .metadata
        .iter()
        .map(|(key, value)| MetadataEntry {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceFile, TraceRun};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn node(method: &str) -> TraceNode {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        TraceNode::new("Svc", method, start, Duration::from_millis(1))
    }

    fn run_with(nodes: Vec<(TraceNode, Option<usize>)>) -> TraceRun {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let mut run = TraceRun::new("r", start);
        let mut ids = Vec::new();
        for (n, parent) in nodes {
            let id = match parent {
                Some(p) => run.add_child(ids[p], n).unwrap(),
                None => run.add_root(n),
            };
            ids.push(id);
        }
        run
    }

    #[test]
    fn test_finds_nested_node() {
        let target = Uuid::new_v4();
        let run = run_with(vec![
            (node("root"), None),
            (node("leaf").with_id(target).with_metadata("rows", "12"), Some(0)),
        ]);
        let set = RunSet::single("f.json", vec![run]);

        let rows = locate_metadata(&set, &target.to_string());
        assert_eq!(
            rows,
            vec![MetadataEntry {
                key: "rows".to_string(),
                value: "12".to_string()
            }]
        );
    }

    #[test]
    fn test_first_match_wins_across_runs() {
        let shared = Uuid::new_v4();
        let first = run_with(vec![(node("a").with_id(shared).with_metadata("from", "first"), None)]);
        let second = run_with(vec![(node("b").with_id(shared).with_metadata("from", "second"), None)]);
        let set = RunSet::from_files(vec![
            SourceFile::new("one.json", vec![first]),
            SourceFile::new("two.json", vec![second]),
        ]);

        let rows = locate_metadata(&set, &shared.to_string());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "first");
        assert_eq!(find_node(&set, shared).unwrap().run.source, "one.json");
    }

    #[test]
    fn test_preorder_beats_later_root() {
        let shared = Uuid::new_v4();
        let run = run_with(vec![
            (node("a"), None),
            (node("b").with_id(shared).with_metadata("from", "second-root"), None),
            (node("a1").with_id(shared).with_metadata("from", "child-of-first"), Some(0)),
        ]);
        let set = RunSet::single("f.json", vec![run]);
        assert_eq!(locate_metadata(&set, &shared.to_string())[0].value, "child-of-first");
    }

    #[test]
    fn test_match_without_metadata_stops_search() {
        let shared = Uuid::new_v4();
        let run = run_with(vec![
            (node("bare").with_id(shared), None),
            (node("rich").with_id(shared).with_metadata("k", "v"), None),
        ]);
        let set = RunSet::single("f.json", vec![run]);
        assert!(locate_metadata(&set, &shared.to_string()).is_empty());
    }

    #[test]
    fn test_malformed_or_unknown_id_yields_nothing() {
        let run = run_with(vec![(node("a").with_id(Uuid::new_v4()).with_metadata("k", "v"), None)]);
        let set = RunSet::single("f.json", vec![run]);
        assert!(locate_metadata(&set, "not-a-uuid").is_empty());
        assert!(locate_metadata(&set, &Uuid::new_v4().to_string()).is_empty());
    }
}
