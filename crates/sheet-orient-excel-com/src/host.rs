//! `sheet-orient-core` host traits implemented on top of the bridge.

use std::path::Path;

use orient_com_protocol::{ErrorKind, XL_LANDSCAPE, XL_PORTRAIT};
use sheet_orient_core::{HostError, HostLauncher, Orientation, SpreadsheetHost, WorkbookId};

use crate::bridge::{BridgeError, ExcelBridge, ExcelBridgeConfig};

/// `XlPageOrientation` code for an orientation.
pub fn xl_orientation(orientation: Orientation) -> i32 {
    match orientation {
        Orientation::Portrait => XL_PORTRAIT,
        Orientation::Landscape => XL_LANDSCAPE,
    }
}

impl From<BridgeError> for HostError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Remote { kind, message } => match kind {
                ErrorKind::NotFound => HostError::NotFound(message),
                ErrorKind::PermissionDenied => HostError::PermissionDenied(message),
                ErrorKind::Locked => HostError::Locked(message),
                ErrorKind::Automation => HostError::Automation(message),
                ErrorKind::NotInitialized => HostError::Unavailable(message),
                ErrorKind::Protocol => HostError::Protocol(message),
            },
            BridgeError::SpawnFailed(_)
            | BridgeError::LauncherNotFound(_)
            | BridgeError::BridgeExeNotFound(_) => HostError::Unavailable(e.to_string()),
            BridgeError::NotRunning
            | BridgeError::SendFailed(_)
            | BridgeError::ReadFailed(_)
            | BridgeError::Abandoned => HostError::Disconnected(e.to_string()),
            BridgeError::JsonError(_) | BridgeError::UnexpectedResponse(_) => {
                HostError::Protocol(e.to_string())
            }
            BridgeError::Timeout(after) => HostError::Timeout(after),
        }
    }
}

/// Starts Excel through the bridge process.
#[derive(Debug, Clone, Default)]
pub struct ExcelLauncher {
    config: ExcelBridgeConfig,
}

impl ExcelLauncher {
    pub fn new(config: ExcelBridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExcelBridgeConfig {
        &self.config
    }
}

impl HostLauncher for ExcelLauncher {
    type Host = ExcelBridge;

    fn launch(&self) -> Result<ExcelBridge, HostError> {
        ExcelBridge::start(self.config.clone()).map_err(|e| match e {
            // Whatever Init reports, Excel is not usable
            BridgeError::Remote { message, .. } => HostError::Unavailable(message),
            other => other.into(),
        })
    }
}

impl SpreadsheetHost for ExcelBridge {
    fn open_workbook(&self, path: &Path) -> Result<WorkbookId, HostError> {
        let handle = ExcelBridge::open_workbook(self, path)?;
        tracing::debug!("Opened {} as workbook #{handle}", path.display());
        Ok(WorkbookId(handle))
    }

    fn sheet_count(&self, workbook: WorkbookId) -> Result<u32, HostError> {
        Ok(ExcelBridge::sheet_count(self, workbook.0)?)
    }

    fn sheet_name(&self, workbook: WorkbookId, sheet: u32) -> Result<String, HostError> {
        Ok(ExcelBridge::sheet_name(self, workbook.0, sheet)?)
    }

    fn activate_sheet(&self, workbook: WorkbookId, sheet: u32) -> Result<(), HostError> {
        Ok(ExcelBridge::activate_sheet(self, workbook.0, sheet)?)
    }

    fn set_orientation(
        &self,
        workbook: WorkbookId,
        sheet: u32,
        orientation: Orientation,
    ) -> Result<(), HostError> {
        Ok(ExcelBridge::set_orientation(
            self,
            workbook.0,
            sheet,
            xl_orientation(orientation),
        )?)
    }

    fn save_workbook(&self, workbook: WorkbookId) -> Result<(), HostError> {
        Ok(ExcelBridge::save_workbook(self, workbook.0)?)
    }

    fn close_workbook(&self, workbook: WorkbookId) -> Result<(), HostError> {
        Ok(ExcelBridge::close_workbook(self, workbook.0)?)
    }

    fn quit(&self) -> Result<(), HostError> {
        Ok(self.shutdown()?)
    }
}
