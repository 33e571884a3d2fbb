use crate::security::TMP_MARKER;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Age after which an orphaned temp file is assumed to belong to a crashed writer.
const STALE_AFTER: Duration = Duration::from_secs(300);

pub(crate) async fn purge_tmp(root: &Path, threshold: Option<Duration>) -> usize {
    let root = root.to_path_buf();
    let now = SystemTime::now();
    let threshold = threshold.unwrap_or(STALE_AFTER);

    match tokio::task::spawn_blocking(move || remove_stale(&root, now, threshold)).await {
        Ok((removed, failed)) => {
            if removed > 0 || failed > 0 {
                info!(removed, failed, "Cleaned up temporary save files");
            }
            removed
        },
        Err(e) => {
            error!(error = %e, "Temp file cleanup task panicked");
            0
        },
    }
}

fn remove_stale(root: &Path, now: SystemTime, threshold: Duration) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .flatten()
        .filter(|entry| is_tmp(entry) && is_stale(entry, now, threshold))
        .for_each(|entry| match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Temp file removal failed");
                failed += 1;
            },
        });

    (removed, failed)
}

pub(crate) fn is_tmp_name(name: &str) -> bool {
    name.contains(TMP_MARKER)
}

fn is_tmp(entry: &DirEntry) -> bool {
    entry.file_type().is_file() && entry.file_name().to_str().is_some_and(is_tmp_name)
}

fn is_stale(entry: &DirEntry, now: SystemTime, threshold: Duration) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .is_none_or(|age| age >= threshold)
}
