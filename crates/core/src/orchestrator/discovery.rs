//! Source directory enumeration.

use std::path::Path;

use crate::converter::{ConversionMode, WorkItem};

/// List the files of `source_dir` matching the mode's glob (`*.mca` or
/// `*.linear`) and turn each into a work item.
///
/// Non-recursive and case-sensitive. Hidden files are excluded the way a
/// shell glob excludes them. Results are sorted by file name.
pub async fn discover_work_items(
    source_dir: &Path,
    mode: ConversionMode,
    destination_dir: &Path,
    compression_level: u8,
) -> std::io::Result<Vec<WorkItem>> {
    let mut entries = tokio::fs::read_dir(source_dir).await?;
    let mut items = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden {
            continue;
        }

        // Follows symlinks, as the glob does.
        let is_file = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.is_file(),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                false
            }
        };
        if !is_file {
            continue;
        }

        if let Some(item) = WorkItem::new(path, mode, destination_dir.to_path_buf(), compression_level)
        {
            items.push(item);
        }
    }

    items.sort_by(|a, b| a.source_path().file_name().cmp(&b.source_path().file_name()));
    Ok(items)
}

/// Whether the item's destination exists and is newer than its source.
pub async fn is_up_to_date(item: &WorkItem) -> bool {
    let Ok(dest) = tokio::fs::metadata(item.destination_path()).await else {
        return false;
    };
    let Ok(src) = tokio::fs::metadata(item.source_path()).await else {
        return false;
    };
    match (dest.modified(), src.modified()) {
        (Ok(dest_time), Ok(src_time)) => dest_time > src_time,
        _ => false,
    }
}
