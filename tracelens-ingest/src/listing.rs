use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracelens_core::format::size_label;
use tracelens_core::{TraceError, TraceResult};
use walkdir::WalkDir;

use crate::budget::file_time;

/// Plain directory-listing facts about one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetails {
    pub file_name: String,
    pub path: String,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
    pub size_label: String,
    pub extension: String,
    pub read_only: bool,
}

/// Files directly inside `folder`, sorted by name.
pub fn list_files(folder: &Path) -> TraceResult<Vec<FileDetails>> {
    if !folder.is_dir() {
        return Err(TraceError::NotFound {
            path: folder.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(folder).to_path_buf();
            match e.into_io_error() {
                Some(io) => TraceError::from_io(path, io),
                None => TraceError::Other(format!("cannot list {}", path.display())),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| TraceError::Other(format!("{}: {e}", entry.path().display())))?;
        let path = entry.path();
        files.push(FileDetails {
            file_name: entry.file_name().to_string_lossy().into_owned(),
            path: path.display().to_string(),
            created: meta.created().ok().map(DateTime::<Utc>::from),
            last_modified: file_time(&meta),
            size: meta.len(),
            size_label: size_label(meta.len()),
            extension: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            read_only: meta.permissions().readonly(),
        });
    }
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(files)
}
