//! Shared protocol types for communication between the sheet-orient client
//! and the Windows COM bridge process (run natively or under WINE).
//!
//! The protocol is JSON-over-stdio: one JSON object per line in each direction.
//! Worksheet indices are 1-based, matching Excel's `Worksheets` collection.

use serde::{Deserialize, Serialize};

/// `XlPageOrientation.xlPortrait`
pub const XL_PORTRAIT: i32 = 1;
/// `XlPageOrientation.xlLandscape`
pub const XL_LANDSCAPE: i32 = 2;

/// A command sent from the client to the bridge process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Monotonically increasing request ID for correlating responses.
    pub id: u64,
    /// The command to execute.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the client can send to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum Command {
    /// Initialize COM and create the Excel.Application instance.
    Init { visible: bool },

    /// Open an existing workbook from a file path (Windows path).
    /// Returns a workbook handle.
    OpenWorkbook { path: String },

    /// Number of worksheets in the workbook.
    SheetCount { workbook: u64 },

    /// Name of the worksheet at a 1-based index.
    SheetName { workbook: u64, sheet: u32 },

    /// Make the worksheet at a 1-based index the active sheet.
    ActivateSheet { workbook: u64, sheet: u32 },

    /// Set `PageSetup.Orientation` of a worksheet.
    /// `orientation` is an `XlPageOrientation` code ([`XL_PORTRAIT`], [`XL_LANDSCAPE`]).
    SetOrientation {
        workbook: u64,
        sheet: u32,
        orientation: i32,
    },

    /// Save the workbook in place and mark it as saved.
    SaveWorkbook { workbook: u64 },

    /// Close a workbook without saving.
    CloseWorkbook { workbook: u64 },

    /// Shut down the bridge: close all workbooks, quit Excel, uninitialize COM.
    Shutdown,
}

impl Command {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init { .. } => "Init",
            Command::OpenWorkbook { .. } => "OpenWorkbook",
            Command::SheetCount { .. } => "SheetCount",
            Command::SheetName { .. } => "SheetName",
            Command::ActivateSheet { .. } => "ActivateSheet",
            Command::SetOrientation { .. } => "SetOrientation",
            Command::SaveWorkbook { .. } => "SaveWorkbook",
            Command::CloseWorkbook { .. } => "CloseWorkbook",
            Command::Shutdown => "Shutdown",
        }
    }
}

/// A response sent from the bridge back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to (0 if the request could not be parsed).
    pub id: u64,
    /// The result of the command.
    #[serde(flatten)]
    pub result: ResponseResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseResult {
    #[serde(rename = "ok")]
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        kind: ErrorKind,
        message: String,
    },
}

/// Data returned in successful responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Handle to a newly opened workbook.
    WorkbookHandle { workbook: u64 },
    /// A worksheet count.
    Count { count: u32 },
    /// A worksheet name.
    Name { name: String },
}

/// Coarse classification of a bridge-side failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The file does not exist.
    NotFound,
    /// The file exists but cannot be opened for writing.
    PermissionDenied,
    /// The file is held open by another process.
    Locked,
    /// Excel (or COM) rejected the call.
    #[default]
    Automation,
    /// A command arrived before `Init`.
    NotInitialized,
    /// The request could not be parsed.
    Protocol,
}

/// A classified failure, as produced by the bridge's command handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Plain COM error strings are automation failures.
impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::new(ErrorKind::Automation, message)
    }
}

impl From<Failure> for ResponseResult {
    fn from(f: Failure) -> Self {
        ResponseResult::Error {
            kind: f.kind,
            message: f.message,
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let req = Request {
            id: 3,
            command: Command::SetOrientation {
                workbook: 1,
                sheet: 2,
                orientation: XL_LANDSCAPE,
            },
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 3,
                "cmd": "SetOrientation",
                "params": { "workbook": 1, "sheet": 2, "orientation": 2 }
            })
        );
    }

    #[test]
    fn test_unit_command_has_no_params() {
        let req = Request {
            id: 9,
            command: Command::Shutdown,
        };
        let line = serde_json::to_string(&req).unwrap();
        assert_eq!(line, r#"{"id":9,"cmd":"Shutdown"}"#);
        let back: Request = serde_json::from_str(&line).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_ok_response_without_data() {
        let resp: Response = serde_json::from_str(r#"{"id":1,"status":"ok"}"#).unwrap();
        assert_eq!(resp.id, 1);
        assert_eq!(resp.result, ResponseResult::Ok { data: None });
    }

    #[test]
    fn test_ok_response_data_variants() {
        let resp: Response =
            serde_json::from_str(r#"{"id":2,"status":"ok","data":{"workbook":7}}"#).unwrap();
        assert_eq!(
            resp.result,
            ResponseResult::Ok {
                data: Some(ResponseData::WorkbookHandle { workbook: 7 })
            }
        );

        let resp: Response =
            serde_json::from_str(r#"{"id":3,"status":"ok","data":{"count":4}}"#).unwrap();
        assert_eq!(
            resp.result,
            ResponseResult::Ok {
                data: Some(ResponseData::Count { count: 4 })
            }
        );

        let resp: Response =
            serde_json::from_str(r#"{"id":4,"status":"ok","data":{"name":"Detail1"}}"#).unwrap();
        assert_eq!(
            resp.result,
            ResponseResult::Ok {
                data: Some(ResponseData::Name {
                    name: "Detail1".into()
                })
            }
        );
    }

    #[test]
    fn test_error_kind_defaults_to_automation() {
        let resp: Response =
            serde_json::from_str(r#"{"id":5,"status":"error","message":"boom"}"#).unwrap();
        assert_eq!(
            resp.result,
            ResponseResult::Error {
                kind: ErrorKind::Automation,
                message: "boom".into()
            }
        );
    }

    #[test]
    fn test_error_kind_snake_case() {
        let result: ResponseResult = Failure::new(ErrorKind::PermissionDenied, "read-only").into();
        let value = serde_json::to_value(Response { id: 6, result }).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 6,
                "status": "error",
                "kind": "permission_denied",
                "message": "read-only"
            })
        );
    }
}
