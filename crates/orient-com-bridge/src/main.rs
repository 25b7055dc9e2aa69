//! Orientation COM bridge: a Windows process that drives Excel via COM,
//! controlled by JSON commands over stdin/stdout.
//!
//! Runs natively on Windows or, cross-compiled from Linux, under WINE.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! - Reads `Request` objects from stdin
//! - Writes `Response` objects to stdout
//! - Diagnostic messages go to stderr (never stdout)

#[cfg(windows)]
mod dispatch;
#[cfg(windows)]
mod excel;

#[cfg(not(windows))]
fn main() {
    eprintln!("orient-com-bridge must be compiled for Windows (--target x86_64-pc-windows-gnu)");
    eprintln!("and run natively or under WINE.");
    std::process::exit(1);
}

#[cfg(windows)]
fn main() {
    use std::io::{self, BufRead};

    use orient_com_protocol::*;

    eprintln!("[orient-com-bridge] Starting up...");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut excel: Option<excel::ExcelApp> = None;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[orient-com-bridge] stdin read error: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                let response = handle_command(&mut excel, &request);
                let done = matches!(request.command, Command::Shutdown)
                    && matches!(response.result, ResponseResult::Ok { .. });
                write_response(&mut out, &response);
                if done {
                    eprintln!("[orient-com-bridge] Shutdown complete, exiting.");
                    break;
                }
                continue;
            }
            Err(e) => {
                eprintln!("[orient-com-bridge] JSON parse error: {e} (line: {line})");
                Response {
                    id: 0,
                    result: Failure::new(ErrorKind::Protocol, format!("JSON parse error: {e}"))
                        .into(),
                }
            }
        };
        write_response(&mut out, &response);
    }

    // Client went away without Shutdown: never leave Excel running.
    if let Some(app) = excel.take() {
        eprintln!("[orient-com-bridge] stdin closed, shutting down Excel...");
        if let Err(e) = app.shutdown() {
            eprintln!("[orient-com-bridge] Excel shutdown failed: {e}");
        }
        uninit_com();
    }

    eprintln!("[orient-com-bridge] Process exiting.");
}

#[cfg(windows)]
fn write_response(out: &mut impl std::io::Write, response: &orient_com_protocol::Response) {
    match serde_json::to_string(response) {
        Ok(json) => {
            let _ = writeln!(out, "{json}");
            let _ = out.flush();
        }
        Err(e) => eprintln!("[orient-com-bridge] failed to encode response: {e}"),
    }
}

#[cfg(windows)]
fn handle_command(
    excel: &mut Option<excel::ExcelApp>,
    request: &orient_com_protocol::Request,
) -> orient_com_protocol::Response {
    use orient_com_protocol::*;

    let id = request.id;

    let result = match &request.command {
        Command::Init { visible } => init_com_and_excel(excel, *visible),
        Command::OpenWorkbook { path } => with_excel(excel, |app| {
            let handle = app.open_workbook(path)?;
            Ok(Some(ResponseData::WorkbookHandle { workbook: handle }))
        }),
        Command::SheetCount { workbook } => with_excel(excel, |app| {
            let count = app.sheet_count(*workbook)?;
            Ok(Some(ResponseData::Count { count }))
        }),
        Command::SheetName { workbook, sheet } => with_excel(excel, |app| {
            let name = app.sheet_name(*workbook, *sheet)?;
            Ok(Some(ResponseData::Name { name }))
        }),
        Command::ActivateSheet { workbook, sheet } => with_excel(excel, |app| {
            app.activate_sheet(*workbook, *sheet)?;
            Ok(None)
        }),
        Command::SetOrientation {
            workbook,
            sheet,
            orientation,
        } => with_excel(excel, |app| {
            app.set_orientation(*workbook, *sheet, *orientation)?;
            Ok(None)
        }),
        Command::SaveWorkbook { workbook } => with_excel(excel, |app| {
            app.save_workbook(*workbook)?;
            Ok(None)
        }),
        Command::CloseWorkbook { workbook } => with_excel(excel, |app| {
            app.close_workbook(*workbook)?;
            Ok(None)
        }),
        Command::Shutdown => match excel.take() {
            Some(app) => match app.shutdown() {
                Ok(()) => {
                    uninit_com();
                    ResponseResult::Ok { data: None }
                }
                Err(e) => Failure::from(format!("Shutdown failed: {e}")).into(),
            },
            None => ResponseResult::Ok { data: None },
        },
    };

    Response { id, result }
}

#[cfg(windows)]
fn init_com_and_excel(
    excel: &mut Option<excel::ExcelApp>,
    visible: bool,
) -> orient_com_protocol::ResponseResult {
    use orient_com_protocol::{Failure, ResponseResult};
    use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};

    if excel.is_some() {
        return ResponseResult::Ok { data: None };
    }

    // Excel requires a single-threaded apartment
    unsafe {
        if let Err(e) = CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok() {
            return Failure::from(format!("CoInitializeEx failed: {e}")).into();
        }
    }
    eprintln!("[orient-com-bridge] COM initialized (STA)");

    match excel::ExcelApp::new(visible) {
        Ok(app) => {
            eprintln!("[orient-com-bridge] Excel.Application created (visible={visible})");
            *excel = Some(app);
            ResponseResult::Ok { data: None }
        }
        Err(e) => {
            uninit_com();
            Failure::from(format!("Failed to start Excel.Application: {e}")).into()
        }
    }
}

#[cfg(windows)]
fn uninit_com() {
    unsafe {
        windows::Win32::System::Com::CoUninitialize();
    }
    eprintln!("[orient-com-bridge] COM uninitialized");
}

#[cfg(windows)]
fn with_excel(
    excel: &mut Option<excel::ExcelApp>,
    f: impl FnOnce(
        &mut excel::ExcelApp,
    ) -> Result<Option<orient_com_protocol::ResponseData>, orient_com_protocol::Failure>,
) -> orient_com_protocol::ResponseResult {
    use orient_com_protocol::{ErrorKind, Failure, ResponseResult};

    match excel.as_mut() {
        Some(app) => match f(app) {
            Ok(data) => ResponseResult::Ok { data },
            Err(failure) => failure.into(),
        },
        None => Failure::new(
            ErrorKind::NotInitialized,
            "Excel not initialized. Send 'Init' command first.",
        )
        .into(),
    }
}
