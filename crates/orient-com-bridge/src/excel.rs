//! Excel object model calls used by the orientation commands.

#![cfg(windows)]

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;

use orient_com_protocol::{ErrorKind, Failure};

use crate::dispatch::{
    variant_bool, variant_get_i32, variant_get_string, variant_i32, variant_str, DispatchObject,
};

// Win32 error codes returned when another process holds the file open.
const ERROR_SHARING_VIOLATION: i32 = 32;
const ERROR_LOCK_VIOLATION: i32 = 33;

/// An Excel.Application instance and the workbooks opened through it.
pub struct ExcelApp {
    app: DispatchObject,
    workbooks_collection: DispatchObject,
    workbooks: HashMap<u64, DispatchObject>,
    next_handle: u64,
}

impl ExcelApp {
    /// Create Excel.Application and apply the window visibility.
    ///
    /// If visibility cannot be applied, the freshly created instance is quit
    /// so a failed `Init` never leaves an Excel process behind.
    pub fn new(visible: bool) -> Result<Self, String> {
        let app = DispatchObject::create_from_progid("Excel.Application")?;

        let setup = (|| {
            app.set_property("Visible", variant_bool(visible))?;
            // Keep Excel from blocking on modal prompts (compatibility checker, overwrite).
            app.set_property("DisplayAlerts", variant_bool(false))?;
            app.get_child("Workbooks")
        })();

        match setup {
            Ok(workbooks_collection) => Ok(Self {
                app,
                workbooks_collection,
                workbooks: HashMap::new(),
                next_handle: 1,
            }),
            Err(e) => {
                let _ = app.invoke_method("Quit", &[]);
                Err(e)
            }
        }
    }

    /// Open a workbook from a file path. Returns the handle ID.
    pub fn open_workbook(&mut self, path: &str) -> Result<u64, Failure> {
        check_file_access(path)?;
        let wb = self
            .workbooks_collection
            .invoke_child("Open", &[variant_str(path)])?;
        let handle = self.next_handle;
        self.next_handle += 1;
        self.workbooks.insert(handle, wb);
        Ok(handle)
    }

    fn workbook(&self, handle: u64) -> Result<&DispatchObject, String> {
        self.workbooks
            .get(&handle)
            .ok_or_else(|| format!("Unknown workbook handle: {handle}"))
    }

    /// `Worksheets(index)`, 1-based.
    fn worksheet(&self, handle: u64, index: u32) -> Result<DispatchObject, String> {
        let sheets = self.workbook(handle)?.get_child("Worksheets")?;
        sheets.get_indexed("Item", variant_i32(index as i32))
    }

    pub fn sheet_count(&self, handle: u64) -> Result<u32, String> {
        let sheets = self.workbook(handle)?.get_child("Worksheets")?;
        let count = sheets.get_property("Count")?;
        variant_get_i32(&count)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| "Worksheets.Count did not return an integer".to_string())
    }

    pub fn sheet_name(&self, handle: u64, index: u32) -> Result<String, String> {
        let ws = self.worksheet(handle, index)?;
        let name = ws.get_property("Name")?;
        variant_get_string(&name).ok_or_else(|| format!("Worksheet {index} has no string Name"))
    }

    pub fn activate_sheet(&self, handle: u64, index: u32) -> Result<(), String> {
        self.worksheet(handle, index)?.invoke_method("Activate", &[])?;
        Ok(())
    }

    pub fn set_orientation(&self, handle: u64, index: u32, orientation: i32) -> Result<(), String> {
        let page_setup = self.worksheet(handle, index)?.get_child("PageSetup")?;
        page_setup.set_property("Orientation", variant_i32(orientation))
    }

    /// Save in place, then flag the workbook as saved so Close never prompts.
    pub fn save_workbook(&self, handle: u64) -> Result<(), String> {
        let wb = self.workbook(handle)?;
        wb.invoke_method("Save", &[])?;
        wb.set_property("Saved", variant_bool(true))
    }

    /// Close a workbook without saving.
    pub fn close_workbook(&mut self, handle: u64) -> Result<(), String> {
        let wb = self
            .workbooks
            .remove(&handle)
            .ok_or_else(|| format!("Unknown workbook handle: {handle}"))?;
        wb.invoke_method("Close", &[variant_bool(false)])?;
        Ok(())
    }

    /// Close every workbook still open and quit Excel.
    pub fn shutdown(mut self) -> Result<(), String> {
        let handles: Vec<u64> = self.workbooks.keys().copied().collect();
        for h in handles {
            if let Err(e) = self.close_workbook(h) {
                eprintln!("[orient-com-bridge] close of workbook {h} failed during shutdown: {e}");
            }
        }
        self.app.invoke_method("Quit", &[])?;
        Ok(())
    }
}

/// Classify the common reasons `Workbooks.Open` would fail before asking Excel,
/// whose own message collapses them into one.
fn check_file_access(path: &str) -> Result<(), Failure> {
    match OpenOptions::new().read(true).write(true).open(path) {
        Ok(_) => Ok(()),
        Err(e) => {
            let kind = match (e.raw_os_error(), e.kind()) {
                (Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION), _) => ErrorKind::Locked,
                (_, io::ErrorKind::NotFound) => ErrorKind::NotFound,
                (_, io::ErrorKind::PermissionDenied) => ErrorKind::PermissionDenied,
                _ => ErrorKind::Automation,
            };
            Err(Failure::new(kind, format!("cannot open '{path}': {e}")))
        }
    }
}
