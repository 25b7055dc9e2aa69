//! Capability interface to the spreadsheet application.
//!
//! The orchestrator only ever talks to these traits. The Excel COM adapter
//! lives in `sheet-orient-excel-com`; tests use an in-memory fake.

use std::fmt;
use std::path::Path;

use crate::error::HostError;
use crate::orientation::Orientation;

/// Opaque handle to a workbook opened by a [`SpreadsheetHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkbookId(pub u64);

impl fmt::Display for WorkbookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Starts the spreadsheet application.
pub trait HostLauncher {
    type Host: SpreadsheetHost;

    /// Start (or attach to) the application, ready to open workbooks.
    fn launch(&self) -> Result<Self::Host, HostError>;
}

/// A running spreadsheet application.
///
/// Worksheet indices are 1-based. Implementations hold their own interior
/// state, so every call takes `&self`.
pub trait SpreadsheetHost {
    fn open_workbook(&self, path: &Path) -> Result<WorkbookId, HostError>;

    fn sheet_count(&self, workbook: WorkbookId) -> Result<u32, HostError>;

    fn sheet_name(&self, workbook: WorkbookId, sheet: u32) -> Result<String, HostError>;

    /// Make a worksheet the active sheet. Some Excel versions only apply
    /// page-setup changes reliably to the active sheet.
    fn activate_sheet(&self, workbook: WorkbookId, sheet: u32) -> Result<(), HostError>;

    fn set_orientation(
        &self,
        workbook: WorkbookId,
        sheet: u32,
        orientation: Orientation,
    ) -> Result<(), HostError>;

    /// Save the workbook in place and mark it as saved.
    fn save_workbook(&self, workbook: WorkbookId) -> Result<(), HostError>;

    fn close_workbook(&self, workbook: WorkbookId) -> Result<(), HostError>;

    /// Terminate the application.
    fn quit(&self) -> Result<(), HostError>;
}
