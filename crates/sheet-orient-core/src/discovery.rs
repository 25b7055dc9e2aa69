//! Recursive `.xlsx` discovery

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

/// Extension of the workbooks this tool touches.
pub const WORKBOOK_EXTENSION: &str = "xlsx";

/// All `.xlsx` files below `dir`, at any depth.
///
/// Entries are visited in file-name order so repeated runs see the same
/// sequence. Symlinks are not followed. Entries that cannot be read are
/// logged and skipped.
pub fn discover_workbooks(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        match entry {
            Ok(entry) if is_workbook(&entry) => found.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => tracing::warn!("Walk error: {e}"),
        }
    }

    tracing::debug!("Discovered {} workbook(s) under {}", found.len(), dir.display());
    found
}

fn is_workbook(entry: &DirEntry) -> bool {
    entry.file_type().is_file() && has_workbook_extension(entry.path())
}

/// `.xlsx`, compared ASCII case-insensitively (`REPORT.XLSX` counts).
pub fn has_workbook_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(WORKBOOK_EXTENSION))
}
