//! Picking which trace files a multi-file query loads.
//!
//! Candidates are matched by file-name pattern, kept when their timestamp is
//! inside the requested window, ordered newest first, and cut off at the
//! first file that would push the cumulative size over the byte budget.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracelens_core::config::{ScanConfig, DEFAULT_BYTE_BUDGET};
use tracelens_core::{TimeWindow, TraceError, TraceResult};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct FileSelection {
    pub folder: PathBuf,
    pub pattern: String,
    pub recursive: bool,
    pub byte_budget: u64,
    pub window: Option<TimeWindow>,
}

impl FileSelection {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            pattern: "*.*".to_string(),
            recursive: false,
            byte_budget: DEFAULT_BYTE_BUDGET,
            window: None,
        }
    }

    pub fn from_config(scan: &ScanConfig) -> Self {
        Self {
            folder: PathBuf::from(&scan.folder),
            pattern: scan.pattern.clone(),
            recursive: scan.recursive,
            byte_budget: scan.byte_budget,
            window: None,
        }
    }
}

/// A file eligible for loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Files to load for `selection`, most recent first, within the byte budget.
pub fn select_files(selection: &FileSelection) -> TraceResult<Vec<Candidate>> {
    if !selection.folder.is_dir() {
        return Err(TraceError::NotFound {
            path: selection.folder.clone(),
        });
    }
    let matcher = pattern_regex(&selection.pattern)?;

    let mut candidates: Vec<Candidate> = enumerate(&selection.folder, selection.recursive)
        .into_iter()
        .filter(|c| {
            c.path
                .file_name()
                .map(|n| matcher.is_match(&n.to_string_lossy()))
                .unwrap_or(false)
        })
        .filter(|c| selection.window.map_or(true, |w| w.contains(c.modified)))
        .collect();
    let matched = candidates.len();

    order_by_recency(&mut candidates);
    let selected = apply_budget(candidates, selection.byte_budget);
    tracing::debug!(
        folder = %selection.folder.display(),
        matched,
        selected = selected.len(),
        "Selected trace files"
    );
    Ok(selected)
}

/// Newest first; equal timestamps fall back to path order.
pub fn order_by_recency(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
}

/// Keep the longest prefix whose cumulative size stays within `budget`.
pub fn apply_budget(candidates: Vec<Candidate>, budget: u64) -> Vec<Candidate> {
    let mut total: u64 = 0;
    let mut kept = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match total.checked_add(candidate.size) {
            Some(next) if next <= budget => {
                total = next;
                kept.push(candidate);
            }
            _ => {
                tracing::debug!(
                    path = %candidate.path.display(),
                    total,
                    budget,
                    "Byte budget reached, dropping remaining files"
                );
                break;
            }
        }
    }
    kept
}

/// Compile a shell-style file-name pattern (`*`, `?`) into an anchored,
/// case-insensitive regex. `*.*` and the empty pattern match every name.
pub fn pattern_regex(pattern: &str) -> TraceResult<Regex> {
    let pattern = pattern.trim();
    let pattern = if pattern.is_empty() || pattern == "*.*" {
        "*"
    } else {
        pattern
    };

    let mut re = String::from("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| TraceError::InvalidArgument(format!("bad pattern '{pattern}': {e}")))
}

fn enumerate(folder: &Path, recursive: bool) -> Vec<Candidate> {
    let walker = WalkDir::new(folder).min_depth(1);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let meta = match e.metadata() {
                Ok(m) => m,
                Err(err) => {
                    tracing::warn!(path = %e.path().display(), error = %err, "Skipping file without metadata");
                    return None;
                }
            };
            Some(Candidate {
                size: meta.len(),
                modified: file_time(&meta),
                path: e.into_path(),
            })
        })
        .collect()
}

/// Last-modified time, else creation time, else the Unix epoch.
pub(crate) fn file_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    let t = meta
        .modified()
        .or_else(|_| meta.created())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    DateTime::<Utc>::from(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cand(name: &str, size: u64, hour: u32) -> Candidate {
        Candidate {
            path: PathBuf::from(name),
            size,
            modified: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
        }
    }

    fn names(c: &[Candidate]) -> Vec<String> {
        c.iter().map(|c| c.path.display().to_string()).collect()
    }

    #[test]
    fn test_budget_excludes_file_that_crosses() {
        let files = vec![
            cand("newest", 1_000_000_000, 3),
            cand("middle", 1_000_000_000, 2),
            cand("oldest", 1_000_000_000, 1),
        ];
        let kept = apply_budget(files, 2_000_000_000);
        assert_eq!(names(&kept), vec!["newest", "middle"]);
    }

    #[test]
    fn test_budget_stops_at_first_overflow() {
        let files = vec![cand("a", 60, 3), cand("big", 50, 2), cand("tiny", 1, 1)];
        assert_eq!(names(&apply_budget(files, 100)), vec!["a"]);
    }

    #[test]
    fn test_budget_zero_keeps_only_empty_files() {
        let files = vec![cand("empty", 0, 3), cand("one", 1, 2)];
        assert_eq!(names(&apply_budget(files, 0)), vec!["empty"]);
    }

    #[test]
    fn test_order_by_recency() {
        let mut files = vec![cand("b", 1, 1), cand("c", 1, 3), cand("a", 1, 1)];
        order_by_recency(&mut files);
        assert_eq!(names(&files), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_pattern_regex() {
        let all = pattern_regex("*.*").unwrap();
        assert!(all.is_match("run.json"));
        assert!(all.is_match("README"));

        let json = pattern_regex("*.json").unwrap();
        assert!(json.is_match("Metrics.JSON"));
        assert!(!json.is_match("metrics.json.bak"));

        let q = pattern_regex("run-?.json").unwrap();
        assert!(q.is_match("run-1.json"));
        assert!(!q.is_match("run-10.json"));

        let literal = pattern_regex("a+b(1).json").unwrap();
        assert!(literal.is_match("a+b(1).json"));
        assert!(!literal.is_match("aab1.json"));
    }

    #[test]
    fn test_missing_folder_is_not_found() {
        let sel = FileSelection::new("/definitely/not/a/folder");
        assert!(matches!(select_files(&sel), Err(TraceError::NotFound { .. })));
    }
}
