pub mod budget;
pub mod listing;
pub mod loader;
pub mod sink;

pub use budget::{select_files, Candidate, FileSelection};
pub use listing::{list_files, FileDetails};
pub use loader::{load_batch, load_file, load_named, load_source, LoadReport, SkippedFile};
pub use sink::AppendSink;
