//! # sheet-orient-core
//!
//! Batch logic for setting the print orientation of worksheets in every
//! `.xlsx` workbook below a directory.
//!
//! The spreadsheet application itself sits behind the [`HostLauncher`] and
//! [`SpreadsheetHost`] traits, so this crate never touches COM, processes,
//! or the workbook file format.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sheet_orient_core::{run, HostLauncher, RunOptions};
//!
//! fn landscape_details(launcher: &impl HostLauncher) -> sheet_orient_core::Result<()> {
//!     let options = RunOptions::from_args("/data/reports", "Detail", "landscape")?;
//!     let summary = run(launcher, &options)?;
//!     println!("{} sheets updated", summary.sheets_updated);
//!     Ok(())
//! }
//! ```

pub mod discovery;
pub mod error;
pub mod filter;
pub mod host;
pub mod orchestrator;
pub mod orientation;

pub use discovery::discover_workbooks;
pub use error::{HostError, OrientError, Result};
pub use filter::NameFilter;
pub use host::{HostLauncher, SpreadsheetHost, WorkbookId};
pub use orchestrator::{run, RunOptions, RunSummary, SkippedWorkbook};
pub use orientation::Orientation;
