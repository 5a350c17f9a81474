//! Trace runs and their call trees.
//!
//! Each [`TraceRun`] owns its calls in a flat arena addressed by [`NodeId`];
//! roots and children are ordered index lists, so there is no recursive ownership.

use std::collections::BTreeMap;

mod node;
mod run;
pub mod wire;

pub use node::{NodeId, TraceNode};
pub use run::{PreOrder, RunRef, RunSet, SourceFile, TraceRun, Visit};

/// String key/value annotations on a run or a call.
pub type Metadata = BTreeMap<String, String>;

/// Metadata is only ever serialized when this holds.
pub fn has_metadata(map: &Metadata) -> bool {
    !map.is_empty()
}

/// Compact JSON of a metadata map, or the empty string when there is none.
pub fn metadata_display(map: &Metadata) -> String {
    if !has_metadata(map) {
        return String::new();
    }
    serde_json::to_string(map).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_display_is_conditional() {
        let mut map = Metadata::new();
        assert_eq!(metadata_display(&map), "");
        map.insert("b".to_string(), "2".to_string());
        map.insert("a".to_string(), "1".to_string());
        assert_eq!(metadata_display(&map), r#"{"a":"1","b":"2"}"#);
    }
}
