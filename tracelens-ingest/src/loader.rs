//! Reading trace files into [`RunSet`]s.
//!
//! A single file fails loudly. A batch loads every file on its own blocking
//! task; a file that cannot be read or parsed is logged and skipped so the
//! rest of the batch still answers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::task::{self, JoinSet};
use tracelens_core::model::wire::decode_runs;
use tracelens_core::{IdentityPolicy, RunSet, SourceFile, TraceError, TraceResult, TraceRun};

use crate::sink::AppendSink;

/// A file left out of a batch and the reason why.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of loading several files.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub set: RunSet,
    pub skipped: Vec<SkippedFile>,
}

/// Parse one file into its runs.
pub fn load_file(path: &Path) -> TraceResult<Vec<TraceRun>> {
    let bytes = std::fs::read(path).map_err(|e| TraceError::from_io(path, e))?;
    decode_runs(path, &bytes)
}

/// Parse one file and tag its runs with the file name.
pub fn load_source(path: &Path, policy: IdentityPolicy) -> TraceResult<SourceFile> {
    let mut file = SourceFile::new(display_name(path), load_file(path)?);
    if policy == IdentityPolicy::OnLoad {
        let assigned = file.assign_missing_ids();
        tracing::debug!(path = %path.display(), assigned, "Assigned missing identifiers");
    }
    Ok(file)
}

/// Load `paths` concurrently. The resulting set keeps the order of `paths`,
/// whatever order the loads finish in.
pub async fn load_batch(paths: Vec<PathBuf>, policy: IdentityPolicy) -> LoadReport {
    run_batch(paths, move |path| load_source(path, policy)).await
}

async fn run_batch<F>(paths: Vec<PathBuf>, load: F) -> LoadReport
where
    F: Fn(&Path) -> TraceResult<SourceFile> + Clone + Send + 'static,
{
    let started = Instant::now();
    let loaded: AppendSink<(usize, SourceFile)> = AppendSink::new();
    let skipped: AppendSink<(usize, SkippedFile)> = AppendSink::new();

    let mut tasks = JoinSet::new();
    let mut pending: HashMap<task::Id, (usize, PathBuf)> = HashMap::with_capacity(paths.len());
    for (index, path) in paths.into_iter().enumerate() {
        let loaded = loaded.clone();
        let skipped = skipped.clone();
        let load = load.clone();
        let task_path = path.clone();
        let handle = tasks.spawn_blocking(move || match load(&task_path) {
            Ok(file) => loaded.push((index, file)),
            Err(e) => {
                tracing::warn!(path = %task_path.display(), error = %e, "Skipping unreadable trace file");
                skipped.push((
                    index,
                    SkippedFile {
                        path: task_path,
                        reason: e.to_string(),
                    },
                ));
            }
        });
        pending.insert(handle.id(), (index, path));
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, ())) => {
                pending.remove(&id);
            }
            Err(e) => {
                let Some((index, path)) = pending.remove(&e.id()) else {
                    tracing::error!(error = %e, "Trace file loader task failed");
                    continue;
                };
                tracing::error!(path = %path.display(), error = %e, "Trace file loader task failed");
                skipped.push((
                    index,
                    SkippedFile {
                        path,
                        reason: format!("loader task failed: {e}"),
                    },
                ));
            }
        }
    }

    let mut files = loaded.drain();
    files.sort_by_key(|(index, _)| *index);
    let mut skipped = skipped.drain();
    skipped.sort_by_key(|(index, _)| *index);

    let report = LoadReport {
        set: RunSet::from_files(files.into_iter().map(|(_, f)| f).collect()),
        skipped: skipped.into_iter().map(|(_, s)| s).collect(),
    };
    tracing::info!(
        files = report.set.files().len(),
        runs = report.set.run_count(),
        skipped = report.skipped.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Deserializing done"
    );
    report
}

/// Split a comma-separated list of file names, dropping blanks.
pub fn split_names(names: &str) -> Vec<&str> {
    names
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect()
}

/// Load the comma-separated `names` from `folder`.
///
/// One name is a single-file load and any failure is returned. Several names
/// form a batch: unreadable files are skipped and listed in the report.
pub async fn load_named(
    folder: &Path,
    names: &str,
    policy: IdentityPolicy,
) -> TraceResult<LoadReport> {
    let names = split_names(names);
    match names.as_slice() {
        [] => Err(TraceError::InvalidArgument("no file name given".to_string())),
        [single] => {
            let path = folder.join(single);
            let file = tokio::task::spawn_blocking(move || load_source(&path, policy))
                .await
                .map_err(|e| TraceError::Other(format!("loader task failed: {e}")))??;
            Ok(LoadReport {
                set: RunSet::from_files(vec![file]),
                skipped: Vec::new(),
            })
        }
        many => {
            if !folder.is_dir() {
                return Err(TraceError::NotFound {
                    path: folder.to_path_buf(),
                });
            }
            let paths = many.iter().map(|n| folder.join(n)).collect();
            Ok(load_batch(paths, policy).await)
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
