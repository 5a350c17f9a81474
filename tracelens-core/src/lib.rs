pub mod config;
pub mod error;
pub mod flatten;
pub mod format;
pub mod ipc;
pub mod locate;
pub mod model;
pub mod query;

pub use config::{IdentityPolicy, TraceLensConfig};
pub use error::{TraceError, TraceResult};
pub use flatten::{flatten, FlatRow};
pub use locate::{find_node, locate_metadata, MetadataEntry};
pub use model::{has_metadata, Metadata, NodeId, RunRef, RunSet, SourceFile, TraceNode, TraceRun};
pub use query::{RunRow, Selection, TimeWindow};
