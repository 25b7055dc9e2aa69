//! The batch run: validate, launch, walk, set orientation, save, close, quit.

use std::path::{Path, PathBuf};

use crate::discovery::discover_workbooks;
use crate::error::{HostError, OrientError, Result};
use crate::filter::NameFilter;
use crate::host::{HostLauncher, SpreadsheetHost, WorkbookId};
use crate::orientation::Orientation;

/// Validated inputs for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub directory: PathBuf,
    pub filter: NameFilter,
    pub orientation: Orientation,
}

impl RunOptions {
    /// Validate raw command-line values.
    ///
    /// The directory is checked before the orientation token, and both
    /// before anything else happens.
    pub fn from_args(
        directory: impl Into<PathBuf>,
        pattern: &str,
        orientation: &str,
    ) -> Result<Self> {
        let directory = directory.into();
        if !directory.exists() {
            return Err(OrientError::DirectoryNotFound(directory));
        }
        if !directory.is_dir() {
            return Err(OrientError::NotADirectory(directory));
        }
        let orientation = orientation.parse::<Orientation>()?;

        Ok(Self {
            directory,
            filter: NameFilter::new(pattern),
            orientation,
        })
    }
}

/// A workbook that could not be opened and was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedWorkbook {
    pub path: PathBuf,
    pub error: HostError,
}

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub workbooks_found: usize,
    pub workbooks_processed: usize,
    pub skipped: Vec<SkippedWorkbook>,
    pub sheets_updated: usize,
}

/// Set the page orientation of matching worksheets in every workbook under
/// `options.directory`.
///
/// Workbooks that fail to open are logged and skipped, unless the failure
/// is the application's own (see [`HostError::is_host_failure`]), which stops
/// the run. Any failure after a workbook is open stops the run; the workbook
/// is still closed and the host still quit.
pub fn run<L: HostLauncher>(launcher: &L, options: &RunOptions) -> Result<RunSummary> {
    let host = launcher.launch().map_err(OrientError::Launch)?;
    let session = HostSession::new(&host);

    tracing::info!(
        "Setting {} orientation under {}{}",
        options.orientation,
        options.directory.display(),
        if options.filter.is_empty() {
            String::new()
        } else {
            format!(" for sheets containing '{}'", options.filter.as_str())
        }
    );

    let workbooks = discover_workbooks(&options.directory);
    let mut summary = RunSummary {
        workbooks_found: workbooks.len(),
        ..Default::default()
    };

    for path in workbooks {
        let id = match host.open_workbook(&path) {
            Ok(id) => id,
            Err(source) if source.is_host_failure() => {
                return Err(OrientError::HostLost { path, source });
            }
            Err(error) => {
                tracing::error!("Skipping {}: {error}", path.display());
                summary.skipped.push(SkippedWorkbook { path, error });
                continue;
            }
        };

        let workbook = OpenWorkbook::new(&host, id, &path);
        let updated = apply_to_workbook(&host, id, options)
            .and_then(|updated| host.save_workbook(id).map(|()| updated))
            .map_err(|source| OrientError::Workbook {
                path: path.clone(),
                source,
            })?;
        workbook.close().map_err(|source| OrientError::Workbook {
            path: path.clone(),
            source,
        })?;

        tracing::info!("Updated {updated} sheet(s) in {}", path.display());
        summary.workbooks_processed += 1;
        summary.sheets_updated += updated;
    }

    session.quit().map_err(OrientError::Quit)?;

    tracing::info!(
        "Done: {} of {} workbook(s) processed, {} skipped, {} sheet(s) updated",
        summary.workbooks_processed,
        summary.workbooks_found,
        summary.skipped.len(),
        summary.sheets_updated
    );
    Ok(summary)
}

/// Walk the sheets of one open workbook. Returns how many had their
/// orientation set.
fn apply_to_workbook<H: SpreadsheetHost>(
    host: &H,
    id: WorkbookId,
    options: &RunOptions,
) -> std::result::Result<usize, HostError> {
    let count = host.sheet_count(id)?;
    let mut updated = 0;

    for sheet in 1..=count {
        host.activate_sheet(id, sheet)?;

        let selected = if options.filter.is_empty() {
            true
        } else {
            let name = host.sheet_name(id, sheet)?;
            let hit = options.filter.matches(&name);
            tracing::debug!("Sheet {sheet} '{name}' matches filter: {hit}");
            hit
        };

        if selected {
            host.set_orientation(id, sheet, options.orientation)?;
            updated += 1;
        }
    }

    // Reopen on the first sheet rather than wherever the loop ended
    if count > 0 {
        host.activate_sheet(id, 1)?;
    }

    Ok(updated)
}

/// Closes its workbook when dropped unless [`OpenWorkbook::close`] already did.
struct OpenWorkbook<'h, H: SpreadsheetHost> {
    host: &'h H,
    id: WorkbookId,
    path: &'h Path,
    closed: bool,
}

impl<'h, H: SpreadsheetHost> OpenWorkbook<'h, H> {
    fn new(host: &'h H, id: WorkbookId, path: &'h Path) -> Self {
        Self {
            host,
            id,
            path,
            closed: false,
        }
    }

    fn close(mut self) -> std::result::Result<(), HostError> {
        self.closed = true;
        self.host.close_workbook(self.id)
    }
}

impl<H: SpreadsheetHost> Drop for OpenWorkbook<'_, H> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.host.close_workbook(self.id) {
            tracing::warn!("Failed to close {} ({}): {e}", self.path.display(), self.id);
        }
    }
}

/// Quits the host when dropped unless [`HostSession::quit`] already did.
struct HostSession<'h, H: SpreadsheetHost> {
    host: &'h H,
    done: bool,
}

impl<'h, H: SpreadsheetHost> HostSession<'h, H> {
    fn new(host: &'h H) -> Self {
        Self { host, done: false }
    }

    fn quit(mut self) -> std::result::Result<(), HostError> {
        self.done = true;
        self.host.quit()
    }
}

impl<H: SpreadsheetHost> Drop for HostSession<'_, H> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.host.quit() {
            tracing::warn!("Failed to quit spreadsheet application: {e}");
        }
    }
}
