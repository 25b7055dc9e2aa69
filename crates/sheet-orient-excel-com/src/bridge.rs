//! Subprocess management and JSON IPC for the bridge process.

use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use orient_com_protocol::{
    Command as BridgeCommand, ErrorKind, Request, Response, ResponseData, ResponseResult,
};

/// Name of the bridge executable produced by the `orient-com-bridge` crate.
pub const BRIDGE_EXE_NAME: &str = "orient-com-bridge.exe";

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a bridge that stopped answering gets to run its end-of-input
/// cleanup (close workbooks, quit Excel) before it is killed.
const ABANDON_GRACE: Duration = Duration::from_secs(10);

/// Errors from the Excel COM bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to spawn bridge process: {0}")]
    SpawnFailed(#[from] io::Error),

    #[error("Launcher program not found: {0}. Install WINE or pass the bridge path directly.")]
    LauncherNotFound(PathBuf),

    #[error("Bridge executable not found at: {0}")]
    BridgeExeNotFound(PathBuf),

    #[error("Bridge process not running")]
    NotRunning,

    #[error("Failed to send command to bridge: {0}")]
    SendFailed(String),

    #[error("Failed to read response from bridge: {0}")]
    ReadFailed(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Bridge returned error: {message}")]
    Remote { kind: ErrorKind, message: String },

    #[error("Unexpected response data for {0}")]
    UnexpectedResponse(&'static str),

    #[error("Bridge did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Bridge was abandoned after a timeout; Excel may still be running")]
    Abandoned,
}

/// Configuration for the Excel COM bridge.
#[derive(Debug, Clone)]
pub struct ExcelBridgeConfig {
    /// Path to the bridge executable. If None, searched for next to the
    /// current binary and in the cross-compilation target directories.
    pub bridge_exe_path: Option<PathBuf>,

    /// Program used to start the bridge (`wine` on non-Windows hosts).
    /// None runs the bridge directly and passes paths through unconverted.
    pub launcher: Option<PathBuf>,

    /// Optional WINEPREFIX for the bridge process.
    pub wine_prefix: Option<PathBuf>,

    /// How long to wait for each response. None waits forever.
    pub timeout: Option<Duration>,

    /// Whether the Excel window is shown while the run is in progress.
    pub visible: bool,
}

impl Default for ExcelBridgeConfig {
    fn default() -> Self {
        Self {
            bridge_exe_path: None,
            launcher: if cfg!(windows) {
                None
            } else {
                Some(PathBuf::from("wine"))
            },
            wine_prefix: None,
            timeout: Some(Duration::from_secs(300)),
            visible: true,
        }
    }
}

/// A running bridge process with Excel initialized behind it.
///
/// Dropping the bridge without calling [`ExcelBridge::shutdown`] closes its
/// stdin, which makes the bridge quit Excel on its own, and then reaps the
/// process.
pub struct ExcelBridge {
    child: Mutex<Child>,
    stdin: Mutex<Option<ChildStdin>>,
    responses: Mutex<Receiver<io::Result<String>>>,
    next_id: AtomicU64,
    timeout: Option<Duration>,
    wine_paths: bool,
    finished: AtomicBool,
    abandoned: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ExcelBridge {
    /// Start the bridge process and initialize Excel.
    pub fn start(config: ExcelBridgeConfig) -> Result<Self, BridgeError> {
        let exe_path = config.bridge_exe_path.unwrap_or_else(find_bridge_exe);
        if !exe_path.exists() {
            return Err(BridgeError::BridgeExeNotFound(exe_path));
        }

        let mut cmd = match &config.launcher {
            Some(launcher) => {
                let mut cmd = std::process::Command::new(launcher);
                cmd.arg(&exe_path);
                cmd
            }
            None => std::process::Command::new(&exe_path),
        };
        if let Some(prefix) = &config.wine_prefix {
            cmd.env("WINEPREFIX", prefix);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit()); // Bridge diagnostics go to our stderr

        tracing::debug!("Starting bridge: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|e| match (&config.launcher, e.kind()) {
            (Some(launcher), io::ErrorKind::NotFound) => {
                BridgeError::LauncherNotFound(launcher.clone())
            }
            _ => BridgeError::SpawnFailed(e),
        })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BridgeError::SpawnFailed(io::Error::new(
                    io::ErrorKind::Other,
                    "bridge stdio was not piped",
                )));
            }
        };

        // Responses are read on their own thread so a hung bridge can be timed out.
        let (tx, rx) = mpsc::channel();
        let reader = thread::Builder::new()
            .name("orient-com-reader".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = reader {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BridgeError::SpawnFailed(e));
        }

        let bridge = Self {
            child: Mutex::new(child),
            stdin: Mutex::new(Some(stdin)),
            responses: Mutex::new(rx),
            next_id: AtomicU64::new(1),
            timeout: config.timeout,
            wine_paths: config.launcher.is_some(),
            finished: AtomicBool::new(false),
            abandoned: AtomicBool::new(false),
        };

        // On failure the bridge is dropped here, which reaps the process.
        bridge.send_command(BridgeCommand::Init {
            visible: config.visible,
        })?;
        tracing::info!("Excel bridge started from {}", exe_path.display());

        Ok(bridge)
    }

    /// Send a command to the bridge and wait for its response.
    fn send_command(&self, command: BridgeCommand) -> Result<Option<ResponseData>, BridgeError> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(BridgeError::NotRunning);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = command.name();
        let json = serde_json::to_string(&Request { id, command })?;
        tracing::debug!("-> bridge #{id} {json}");

        {
            let mut stdin = lock(&self.stdin);
            let stdin = stdin.as_mut().ok_or(BridgeError::NotRunning)?;
            writeln!(stdin, "{json}").map_err(|e| BridgeError::SendFailed(e.to_string()))?;
            stdin
                .flush()
                .map_err(|e| BridgeError::SendFailed(e.to_string()))?;
        }

        let response = self.await_response(id)?;
        match response.result {
            ResponseResult::Ok { data } => Ok(data),
            ResponseResult::Error { kind, message } => {
                tracing::debug!("<- bridge #{id} {name} failed ({kind:?}): {message}");
                Err(BridgeError::Remote { kind, message })
            }
        }
    }

    /// Read lines until the response for `id` arrives, discarding stale ones.
    fn await_response(&self, id: u64) -> Result<Response, BridgeError> {
        let rx = lock(&self.responses);
        let deadline = self.timeout.map(|t| (t, Instant::now() + t));

        loop {
            let line = match deadline {
                Some((timeout, at)) => {
                    match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                        Ok(line) => line,
                        Err(RecvTimeoutError::Timeout) => {
                            tracing::error!(
                                "Bridge did not answer request #{id} within {timeout:?}; closing it"
                            );
                            self.abandon();
                            return Err(BridgeError::Timeout(timeout));
                        }
                        Err(RecvTimeoutError::Disconnected) => return Err(BridgeError::NotRunning),
                    }
                }
                None => rx.recv().map_err(|_| BridgeError::NotRunning)?,
            };

            let line = line.map_err(|e| BridgeError::ReadFailed(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::debug!("<- bridge {line}");

            let response: Response = serde_json::from_str(line)?;
            // id 0 means the bridge could not parse what we sent
            if response.id == id || response.id == 0 {
                return Ok(response);
            }
            tracing::warn!("Discarding stale bridge response #{} (waiting for #{id})", response.id);
        }
    }

    /// Convert a local path into the form the bridge's Excel expects.
    pub fn host_path(&self, path: &Path) -> String {
        if self.wine_paths {
            linux_to_wine_path(path)
        } else {
            absolute(path).display().to_string()
        }
    }

    /// Open a workbook. Returns the bridge's handle for it.
    pub fn open_workbook(&self, path: &Path) -> Result<u64, BridgeError> {
        let data = self.send_command(BridgeCommand::OpenWorkbook {
            path: self.host_path(path),
        })?;
        match data {
            Some(ResponseData::WorkbookHandle { workbook }) => Ok(workbook),
            _ => Err(BridgeError::UnexpectedResponse("OpenWorkbook")),
        }
    }

    pub fn sheet_count(&self, workbook: u64) -> Result<u32, BridgeError> {
        match self.send_command(BridgeCommand::SheetCount { workbook })? {
            Some(ResponseData::Count { count }) => Ok(count),
            _ => Err(BridgeError::UnexpectedResponse("SheetCount")),
        }
    }

    pub fn sheet_name(&self, workbook: u64, sheet: u32) -> Result<String, BridgeError> {
        match self.send_command(BridgeCommand::SheetName { workbook, sheet })? {
            Some(ResponseData::Name { name }) => Ok(name),
            _ => Err(BridgeError::UnexpectedResponse("SheetName")),
        }
    }

    pub fn activate_sheet(&self, workbook: u64, sheet: u32) -> Result<(), BridgeError> {
        self.send_command(BridgeCommand::ActivateSheet { workbook, sheet })?;
        Ok(())
    }

    /// `orientation` is an `XlPageOrientation` code.
    pub fn set_orientation(
        &self,
        workbook: u64,
        sheet: u32,
        orientation: i32,
    ) -> Result<(), BridgeError> {
        self.send_command(BridgeCommand::SetOrientation {
            workbook,
            sheet,
            orientation,
        })?;
        Ok(())
    }

    pub fn save_workbook(&self, workbook: u64) -> Result<(), BridgeError> {
        self.send_command(BridgeCommand::SaveWorkbook { workbook })?;
        Ok(())
    }

    pub fn close_workbook(&self, workbook: u64) -> Result<(), BridgeError> {
        self.send_command(BridgeCommand::CloseWorkbook { workbook })?;
        Ok(())
    }

    /// Quit Excel and wait for the bridge process to exit.
    ///
    /// Calling this again after a clean shutdown is a no-op. After a timeout
    /// no `Shutdown` was ever acknowledged, so every call reports
    /// [`BridgeError::Abandoned`].
    pub fn shutdown(&self) -> Result<(), BridgeError> {
        if self.abandoned.load(Ordering::SeqCst) {
            return Err(BridgeError::Abandoned);
        }
        if self.finished.load(Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.send_command(BridgeCommand::Shutdown).map(|_| ());
        self.finish(self.timeout);
        result
    }

    /// Give up on a bridge that stopped answering. Closing stdin still lets
    /// it close workbooks and quit Excel once the stuck call returns.
    fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
        if !self.finish(Some(ABANDON_GRACE)) {
            tracing::error!("Bridge was killed before it could quit Excel");
        }
    }

    /// Close stdin (the bridge cleans up on EOF), then reap the process,
    /// killing it if it does not exit within `grace`. Returns whether it
    /// exited on its own.
    fn finish(&self, grace: Option<Duration>) -> bool {
        self.finished.store(true, Ordering::SeqCst);
        drop(lock(&self.stdin).take());

        let mut child = lock(&self.child);
        let deadline = grace.map(|t| Instant::now() + t);
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!("Bridge exited with {status}");
                    return true;
                }
                Ok(None) if deadline.map_or(true, |d| Instant::now() < d) => {
                    thread::sleep(EXIT_POLL_INTERVAL);
                }
                Ok(None) => {
                    tracing::warn!("Bridge did not exit in time; killing it");
                    break;
                }
                Err(e) => {
                    tracing::warn!("Failed to poll bridge process: {e}");
                    break;
                }
            }
        }
        let _ = child.kill();
        let _ = child.wait();
        false
    }
}

impl Drop for ExcelBridge {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::SeqCst) {
            tracing::debug!("Bridge dropped without shutdown; closing it");
            self.finish(self.timeout);
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

/// Convert a Linux filesystem path to a WINE (Windows) path.
///
/// WINE maps `/` to `Z:\`, so `/home/user/file.xlsx` becomes `Z:\home\user\file.xlsx`.
pub fn linux_to_wine_path(linux_path: &Path) -> String {
    format!("Z:{}", absolute(linux_path).display()).replace('/', "\\")
}

/// Look for the bridge exe next to the current executable, then in the
/// cross-compilation target directories.
fn find_bridge_exe() -> PathBuf {
    if let Ok(mut exe) = std::env::current_exe() {
        exe.pop();
        let candidate = exe.join(BRIDGE_EXE_NAME);
        if candidate.exists() {
            return candidate;
        }
    }

    for profile in ["release", "debug"] {
        let candidate = PathBuf::from("target/x86_64-pc-windows-gnu")
            .join(profile)
            .join(BRIDGE_EXE_NAME);
        if candidate.exists() {
            return candidate;
        }
    }

    PathBuf::from(BRIDGE_EXE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_to_wine_path_absolute() {
        assert_eq!(
            linux_to_wine_path(Path::new("/home/user/reports/q1.xlsx")),
            "Z:\\home\\user\\reports\\q1.xlsx"
        );
    }

    #[test]
    fn test_linux_to_wine_path_relative_is_anchored() {
        let converted = linux_to_wine_path(Path::new("q1.xlsx"));
        assert!(converted.starts_with("Z:\\"));
        assert!(converted.ends_with("\\q1.xlsx"));
    }

    #[test]
    fn test_default_config() {
        let config = ExcelBridgeConfig::default();
        assert!(config.visible);
        assert_eq!(config.timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.launcher.is_none(), cfg!(windows));
    }

    #[test]
    fn test_missing_bridge_exe() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ExcelBridgeConfig {
            bridge_exe_path: Some(dir.path().join(BRIDGE_EXE_NAME)),
            ..Default::default()
        };
        match ExcelBridge::start(config) {
            Err(BridgeError::BridgeExeNotFound(p)) => assert!(p.ends_with(BRIDGE_EXE_NAME)),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("bridge should not start"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_launcher() {
        let dir = tempfile::TempDir::new().unwrap();
        let exe = dir.path().join(BRIDGE_EXE_NAME);
        std::fs::write(&exe, b"").unwrap();
        let config = ExcelBridgeConfig {
            bridge_exe_path: Some(exe),
            launcher: Some(dir.path().join("no-such-wine")),
            ..Default::default()
        };
        assert!(matches!(
            ExcelBridge::start(config),
            Err(BridgeError::LauncherNotFound(_))
        ));
    }
}
