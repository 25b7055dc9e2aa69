//! Excel host for sheet-orient, driven through a COM bridge process.
//!
//! This crate spawns `orient-com-bridge.exe` (under WINE on Linux, directly on
//! Windows), which automates Excel through COM, and talks to it over
//! JSON-over-stdio. [`ExcelLauncher`] and [`ExcelBridge`] implement the
//! `sheet-orient-core` host traits.
//!
//! # Architecture
//!
//! ```text
//! sheet_orient_core::run
//!     └── ExcelLauncher / ExcelBridge (this crate)
//!           └── spawns: [wine] orient-com-bridge.exe
//!                 └── COM: Excel.Application
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sheet_orient_core::{run, RunOptions};
//! use sheet_orient_excel_com::{ExcelBridgeConfig, ExcelLauncher};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let launcher = ExcelLauncher::new(ExcelBridgeConfig::default());
//!     let options = RunOptions::from_args("reports", "", "landscape")?;
//!     let summary = run(&launcher, &options)?;
//!     println!("{} sheets updated", summary.sheets_updated);
//!     Ok(())
//! }
//! ```

mod bridge;
mod host;

pub use bridge::{linux_to_wine_path, BridgeError, ExcelBridge, ExcelBridgeConfig, BRIDGE_EXE_NAME};
pub use host::{xl_orientation, ExcelLauncher};
