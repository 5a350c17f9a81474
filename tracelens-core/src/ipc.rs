use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One query against trace files. `folder`/`pattern`/`recursive` fall back
/// to the `[scan]` config section when absent; `files` is a comma-separated
/// list of file names inside the folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum TraceQuery {
    ListFiles {
        folder: Option<String>,
    },
    Runs {
        folder: Option<String>,
        files: String,
    },
    Calls {
        folder: Option<String>,
        files: String,
        name: String,
        start_time: String,
    },
    CallsById {
        folder: Option<String>,
        files: String,
        ids: String,
    },
    Metadata {
        folder: Option<String>,
        files: String,
        id: String,
    },
    MethodCalls {
        folder: Option<String>,
        pattern: Option<String>,
        recursive: Option<bool>,
        byte_budget: Option<u64>,
        class_name: String,
        method_name: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueryResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub version: String,
}

impl QueryResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
