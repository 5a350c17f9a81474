use std::path::PathBuf;
use std::time::Instant;

use serde_json::json;
use tracelens_core::ipc::{QueryResponse, TraceQuery};
use tracelens_core::query::{method_calls, run_rows, runs_by_ids, runs_by_name_and_start};
use tracelens_core::{flatten, locate_metadata, TimeWindow, TraceLensConfig};
use tracelens_ingest::{list_files, load_batch, load_named, select_files, FileSelection, LoadReport};

pub async fn handle_query(query: TraceQuery, config: &TraceLensConfig) -> QueryResponse {
    match query {
        TraceQuery::ListFiles { folder } => {
            let folder = resolve_folder(folder, config);
            match tokio::task::spawn_blocking(move || list_files(&folder)).await {
                Ok(Ok(files)) => QueryResponse::ok(json!({ "files": files })),
                Ok(Err(e)) => QueryResponse::err(e.to_string()),
                Err(e) => QueryResponse::err(format!("Listing task failed: {}", e)),
            }
        }
        TraceQuery::Runs { folder, files } => {
            match handle_runs(resolve_folder(folder, config), files, config).await {
                Ok(data) => QueryResponse::ok(data),
                Err(e) => QueryResponse::err(e.to_string()),
            }
        }
        TraceQuery::Calls {
            folder,
            files,
            name,
            start_time,
        } => {
            let folder = resolve_folder(folder, config);
            match handle_calls(folder, files, name, start_time, config).await {
                Ok(data) => QueryResponse::ok(data),
                Err(e) => QueryResponse::err(e.to_string()),
            }
        }
        TraceQuery::CallsById { folder, files, ids } => {
            let folder = resolve_folder(folder, config);
            match handle_calls_by_id(folder, files, ids, config).await {
                Ok(data) => QueryResponse::ok(data),
                Err(e) => QueryResponse::err(e.to_string()),
            }
        }
        TraceQuery::Metadata { folder, files, id } => {
            let folder = resolve_folder(folder, config);
            match handle_metadata(folder, files, id, config).await {
                Ok(data) => QueryResponse::ok(data),
                Err(e) => QueryResponse::err(e.to_string()),
            }
        }
        TraceQuery::MethodCalls {
            folder,
            pattern,
            recursive,
            byte_budget,
            class_name,
            method_name,
            start,
            end,
        } => {
            let window = match TimeWindow::new(start, end) {
                Ok(w) => w,
                Err(e) => return QueryResponse::err(e.to_string()),
            };
            let mut selection = FileSelection::from_config(&config.scan);
            if let Some(folder) = folder {
                selection.folder = PathBuf::from(folder);
            }
            if let Some(pattern) = pattern {
                selection.pattern = pattern;
            }
            if let Some(recursive) = recursive {
                selection.recursive = recursive;
            }
            if let Some(budget) = byte_budget {
                selection.byte_budget = budget;
            }
            selection.window = Some(window);

            match handle_method_calls(selection, class_name, method_name, window, config).await {
                Ok(data) => QueryResponse::ok(data),
                Err(e) => QueryResponse::err(e.to_string()),
            }
        }
    }
}

fn resolve_folder(folder: Option<String>, config: &TraceLensConfig) -> PathBuf {
    PathBuf::from(folder.unwrap_or_else(|| config.scan.folder.clone()))
}

async fn handle_runs(
    folder: PathBuf,
    files: String,
    config: &TraceLensConfig,
) -> anyhow::Result<serde_json::Value> {
    let report = load_named(&folder, &files, config.identity.policy).await?;
    Ok(json!({
        "runs": run_rows(report.set.iter()),
        "skipped": skipped(&report),
    }))
}

/// Calls of the runs matching a name and start-time key. When nothing
/// matches, every loaded run is flattened and `matched` is false.
async fn handle_calls(
    folder: PathBuf,
    files: String,
    name: String,
    start_time: String,
    config: &TraceLensConfig,
) -> anyhow::Result<serde_json::Value> {
    let report = load_named(&folder, &files, config.identity.policy).await?;
    let selection = runs_by_name_and_start(&report.set, &name, &start_time);
    let rows = flatten(selection.runs, report.set.files().len() > 1);
    Ok(json!({
        "matched": selection.matched,
        "rows": rows,
        "skipped": skipped(&report),
    }))
}

async fn handle_calls_by_id(
    folder: PathBuf,
    files: String,
    ids: String,
    config: &TraceLensConfig,
) -> anyhow::Result<serde_json::Value> {
    let report = load_named(&folder, &files, config.identity.policy).await?;
    let selection = runs_by_ids(&report.set, &ids)?;
    let rows = flatten(selection.runs, report.set.files().len() > 1);
    Ok(json!({
        "matched": selection.matched,
        "rows": rows,
        "skipped": skipped(&report),
    }))
}

async fn handle_metadata(
    folder: PathBuf,
    files: String,
    id: String,
    config: &TraceLensConfig,
) -> anyhow::Result<serde_json::Value> {
    let report = load_named(&folder, &files, config.identity.policy).await?;
    Ok(json!({
        "entries": locate_metadata(&report.set, &id),
        "skipped": skipped(&report),
    }))
}

/// Multi-file query: select under the byte budget, load concurrently, then
/// flatten and filter. Each phase logs its elapsed time.
async fn handle_method_calls(
    selection: FileSelection,
    class_name: String,
    method_name: String,
    window: TimeWindow,
    config: &TraceLensConfig,
) -> anyhow::Result<serde_json::Value> {
    let started = Instant::now();
    let candidates = tokio::task::spawn_blocking(move || select_files(&selection)).await??;
    tracing::info!(
        files = candidates.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "File selection done"
    );

    let paths = candidates.into_iter().map(|c| c.path).collect();
    let report = load_batch(paths, config.identity.policy).await;

    let started = Instant::now();
    let rows = method_calls(&report.set, &class_name, &method_name, &window);
    tracing::info!(
        class = %class_name,
        method = %method_name,
        rows = rows.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Flatten and filter done"
    );

    Ok(json!({
        "rows": rows,
        "skipped": skipped(&report),
    }))
}

fn skipped(report: &LoadReport) -> serde_json::Value {
    report
        .skipped
        .iter()
        .map(|s| json!({ "path": s.path.display().to_string(), "reason": s.reason }))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
