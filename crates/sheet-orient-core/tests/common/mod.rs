//! In-memory spreadsheet host for driving `run` without a real application.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sheet_orient_core::{HostError, HostLauncher, Orientation, SpreadsheetHost, WorkbookId};

/// A worksheet as the fake application sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeSheet {
    pub name: String,
    pub orientation: Orientation,
}

/// Persisted state of one workbook file.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeWorkbook {
    pub sheets: Vec<FakeSheet>,
    /// 1-based index of the sheet the file reopens on.
    pub active: u32,
}

impl FakeWorkbook {
    pub fn with_sheets(names: &[&str]) -> Self {
        Self {
            sheets: names
                .iter()
                .map(|n| FakeSheet {
                    name: n.to_string(),
                    orientation: Orientation::Portrait,
                })
                .collect(),
            active: 1,
        }
    }

    pub fn orientation_of(&self, name: &str) -> Orientation {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.orientation)
            .unwrap_or_else(|| panic!("no sheet named {name}"))
    }
}

/// Everything the fake host did, for assertions.
///
/// Workbooks are keyed by their path relative to the directory they were
/// added under, with `/` separators (`"A.xlsx"`, `"sub/A.xlsx"`).
#[derive(Debug, Default)]
pub struct FakeState {
    /// Saved workbook contents.
    pub disk: BTreeMap<String, FakeWorkbook>,
    /// Workbooks whose open should fail, and how.
    pub open_failures: HashMap<String, HostError>,
    /// `(workbook, sheet name)` whose orientation change should fail.
    pub orientation_failures: Vec<(String, String)>,
    /// Workbooks whose save should fail.
    pub save_failures: Vec<String>,
    /// Workbooks whose close should fail. They stay open.
    pub close_failures: Vec<String>,
    /// Returned by every `quit`.
    pub quit_failure: Option<HostError>,

    pub launches: usize,
    pub quits: usize,
    pub opened: Vec<String>,
    pub closed: Vec<String>,
    pub saved: Vec<String>,
    /// `(file name, sheet index)` in activation order.
    pub activations: Vec<(String, u32)>,

    root: PathBuf,
    open: HashMap<u64, (String, FakeWorkbook)>,
    next_handle: u64,
}

impl FakeState {
    /// Workbooks currently open in the fake application.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    fn key(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }
}

/// Launcher + host sharing one [`FakeState`].
#[derive(Clone, Default)]
pub struct FakeApp {
    pub state: Rc<RefCell<FakeState>>,
    pub fail_launch: Option<HostError>,
}

impl FakeApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workbook: creates an empty placeholder file at `dir/rel`
    /// and seeds the fake application's view of it under `rel`.
    ///
    /// Every workbook of one app must be added under the same `dir`.
    pub fn add_workbook(&self, dir: &Path, rel: &str, sheets: &[&str]) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"placeholder").unwrap();

        let mut state = self.state.borrow_mut();
        state.root = dir.to_path_buf();
        let key = state.key(&path);
        assert!(
            state.disk.insert(key.clone(), FakeWorkbook::with_sheets(sheets)).is_none(),
            "{key} added twice"
        );
        path
    }

    pub fn workbook(&self, key: &str) -> FakeWorkbook {
        self.state.borrow().disk[key].clone()
    }
}

pub struct FakeHost {
    state: Rc<RefCell<FakeState>>,
}

impl HostLauncher for FakeApp {
    type Host = FakeHost;

    fn launch(&self) -> Result<FakeHost, HostError> {
        self.state.borrow_mut().launches += 1;
        match &self.fail_launch {
            Some(e) => Err(e.clone()),
            None => Ok(FakeHost {
                state: Rc::clone(&self.state),
            }),
        }
    }
}

impl FakeHost {
    fn with_open<T>(
        &self,
        id: WorkbookId,
        f: impl FnOnce(&str, &mut FakeWorkbook) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let mut state = self.state.borrow_mut();
        let (name, wb) = state
            .open
            .get_mut(&id.0)
            .ok_or_else(|| HostError::Automation(format!("unknown workbook {id}")))?;
        let name = name.clone();
        f(&name, wb)
    }

    fn sheet_index(wb: &FakeWorkbook, sheet: u32) -> Result<usize, HostError> {
        if sheet == 0 || sheet as usize > wb.sheets.len() {
            return Err(HostError::Automation(format!("sheet index {sheet} out of range")));
        }
        Ok(sheet as usize - 1)
    }
}

impl SpreadsheetHost for FakeHost {
    fn open_workbook(&self, path: &Path) -> Result<WorkbookId, HostError> {
        let mut state = self.state.borrow_mut();
        let name = state.key(path);
        if let Some(e) = state.open_failures.get(&name) {
            return Err(e.clone());
        }
        let wb = state
            .disk
            .get(&name)
            .cloned()
            .ok_or_else(|| HostError::NotFound(name.clone()))?;
        state.next_handle += 1;
        let handle = state.next_handle;
        state.open.insert(handle, (name.clone(), wb));
        state.opened.push(name);
        Ok(WorkbookId(handle))
    }

    fn sheet_count(&self, workbook: WorkbookId) -> Result<u32, HostError> {
        self.with_open(workbook, |_, wb| Ok(wb.sheets.len() as u32))
    }

    fn sheet_name(&self, workbook: WorkbookId, sheet: u32) -> Result<String, HostError> {
        self.with_open(workbook, |_, wb| {
            let idx = Self::sheet_index(wb, sheet)?;
            Ok(wb.sheets[idx].name.clone())
        })
    }

    fn activate_sheet(&self, workbook: WorkbookId, sheet: u32) -> Result<(), HostError> {
        let name = self.with_open(workbook, |name, wb| {
            Self::sheet_index(wb, sheet)?;
            wb.active = sheet;
            Ok(name.to_string())
        })?;
        self.state.borrow_mut().activations.push((name, sheet));
        Ok(())
    }

    fn set_orientation(
        &self,
        workbook: WorkbookId,
        sheet: u32,
        orientation: Orientation,
    ) -> Result<(), HostError> {
        let failures = self.state.borrow().orientation_failures.clone();
        self.with_open(workbook, |name, wb| {
            let idx = Self::sheet_index(wb, sheet)?;
            let sheet_name = &wb.sheets[idx].name;
            if failures.iter().any(|(f, s)| f == name && s == sheet_name) {
                return Err(HostError::Automation(format!(
                    "PageSetup rejected on {sheet_name}"
                )));
            }
            wb.sheets[idx].orientation = orientation;
            Ok(())
        })
    }

    fn save_workbook(&self, workbook: WorkbookId) -> Result<(), HostError> {
        let (name, wb) = self.with_open(workbook, |name, wb| Ok((name.to_string(), wb.clone())))?;
        let mut state = self.state.borrow_mut();
        if state.save_failures.contains(&name) {
            return Err(HostError::PermissionDenied(name));
        }
        state.disk.insert(name.clone(), wb);
        state.saved.push(name);
        Ok(())
    }

    fn close_workbook(&self, workbook: WorkbookId) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        let name = state
            .open
            .get(&workbook.0)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| HostError::Automation(format!("unknown workbook {workbook}")))?;
        if state.close_failures.contains(&name) {
            return Err(HostError::Automation(format!("Close rejected on {name}")));
        }
        state.open.remove(&workbook.0);
        state.closed.push(name);
        Ok(())
    }

    fn quit(&self) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        state.quits += 1;
        match &state.quit_failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
