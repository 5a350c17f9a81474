use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{has_metadata, Metadata};

/// Index of a node inside the arena of the run that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One recorded call. Children are arena indices owned by the enclosing [`super::TraceRun`].
#[derive(Debug, Clone, PartialEq)]
pub struct TraceNode {
    pub id: Option<Uuid>,
    pub class_name: String,
    pub method_name: String,
    pub start_time: DateTime<Utc>,
    pub duration: Duration,
    pub metadata: Metadata,
    pub(crate) children: Vec<NodeId>,
}

impl TraceNode {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            id: None,
            class_name: class_name.into(),
            method_name: method_name.into(),
            start_time,
            duration,
            metadata: Metadata::new(),
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn has_metadata(&self) -> bool {
        has_metadata(&self.metadata)
    }

    /// `start_time + duration`, saturating at the maximum representable instant.
    pub fn end_time(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.duration)
            .ok()
            .and_then(|d| self.start_time.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
