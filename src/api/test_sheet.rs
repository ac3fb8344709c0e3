//! Implements the `Sheet` trait using in-memory data.
//!
//! This is compiled into the release binary too, so the whole app can be run top-to-bottom
//! without Google Sheets by setting `KAKEIBO_IN_TEST_MODE`.

use crate::api::Sheet;
use crate::Result;
use anyhow::{bail, Context};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Sheet name to rows of cells.
pub(crate) type TestSheetState = HashMap<String, Vec<Vec<String>>>;

/// Every `TestSheet` with the same spreadsheet id shares one state, so a sheet created per request
/// sees the writes of earlier requests, just like a real spreadsheet.
static SPREADSHEETS: LazyLock<Mutex<HashMap<String, TestSheetState>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn spreadsheets() -> MutexGuard<'static, HashMap<String, TestSheetState>> {
    SPREADSHEETS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-memory spreadsheet. A spreadsheet id that has not been seen before starts out with the
/// seed data from this module.
#[derive(Debug, Clone)]
pub(crate) struct TestSheet {
    spreadsheet_id: String,
}

impl TestSheet {
    pub(crate) fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    #[cfg(test)]
    /// A copy of the current contents of the spreadsheet.
    pub(crate) fn get_state(&self) -> TestSheetState {
        self.with_state(|state| state.clone())
    }

    #[cfg(test)]
    /// Replaces the contents of the spreadsheet.
    pub(crate) fn set_state(&self, state: TestSheetState) {
        spreadsheets().insert(self.spreadsheet_id.clone(), state);
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TestSheetState) -> T) -> T {
        let mut all = spreadsheets();
        let state = all
            .entry(self.spreadsheet_id.clone())
            .or_insert_with(default_state);
        f(state)
    }

    fn with_sheet<T>(
        &self,
        sheet_name: &str,
        f: impl FnOnce(&mut Vec<Vec<String>>) -> T,
    ) -> Result<T> {
        self.with_state(|state| match state.get_mut(sheet_name) {
            Some(rows) => Ok(f(rows)),
            None => bail!("Sheet '{sheet_name}' not found"),
        })
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn read_column(
        &mut self,
        sheet_name: &str,
        column: u32,
        row_start: u32,
    ) -> Result<Vec<String>> {
        trace!("read_column {column} from row {row_start} of {sheet_name}");
        self.with_sheet(sheet_name, |rows| {
            let last = last_populated(rows);
            let start = (row_start.max(1) - 1) as usize;
            let col = (column.max(1) - 1) as usize;
            rows.iter()
                .take(last)
                .skip(start)
                .map(|row| row.get(col).cloned().unwrap_or_default())
                .collect()
        })
    }

    async fn last_row(&mut self, sheet_name: &str) -> Result<u32> {
        self.with_sheet(sheet_name, |rows| last_populated(rows) as u32)
    }

    async fn write_row(
        &mut self,
        sheet_name: &str,
        row: u32,
        start_column: u32,
        values: &[String],
    ) -> Result<()> {
        trace!("write_row {row} of {sheet_name}");
        if row == 0 || start_column == 0 {
            bail!("Rows and columns start at 1");
        }
        self.with_sheet(sheet_name, |rows| {
            let r = (row - 1) as usize;
            if rows.len() <= r {
                rows.resize(r + 1, Vec::new());
            }
            let cells = &mut rows[r];
            let start = (start_column - 1) as usize;
            if cells.len() < start + values.len() {
                cells.resize(start + values.len(), String::new());
            }
            cells[start..start + values.len()].clone_from_slice(values);
        })
    }
}

/// Number of rows up to and including the last one with a non-empty cell.
fn last_populated(rows: &[Vec<String>]) -> usize {
    rows.iter()
        .rposition(|row| row.iter().any(|cell| !cell.is_empty()))
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// Provides the seed data from this module.
fn default_state() -> TestSheetState {
    let mut map = HashMap::new();
    for (name, csv_data) in [(SHEET_2025, LEDGER_2025), (SHEET_2026, LEDGER_2026)] {
        match load_csv(csv_data) {
            Ok(rows) => {
                map.insert(name.to_string(), rows);
            }
            Err(e) => tracing::error!("Unable to load seed data for {name}: {e:#}"),
        }
    }
    map
}

/// Loads rows from CSV text. Lines of only commas become rows of empty cells.
fn load_csv(csv_data: &str) -> Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result.context("Bad seed CSV")?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

const SHEET_2025: &str = "2025";
const SHEET_2026: &str = "2026";

/// Seed ledger: a title, a blank row, two header rows and three entries.
const LEDGER_2025: &str = r##",2025年 家計簿,,,,,,,,,,,,,,,,
,,,,,,,,,,,,,,,,,
,支払者,日付,合計,外食全員,外食一部,日用品,,,,小計,除外8,,除外10,,小計,食費,メモ
,,,,,,税抜,税,,,,税抜,税,税抜,税,,,
,A,2025/12/1,1100,,,1000,100,,,1100,,,,,,,x
,B,2025/12/2,218,,,,,,,,100,8,100,10,218,,
,A,2025/12/3,3200,3200,,,,,,,,,,,,,スーパー
"##;

/// Seed ledger with headers only.
const LEDGER_2026: &str = r##",2026年 家計簿,,,,,,,,,,,,,,,,
,,,,,,,,,,,,,,,,,
,支払者,日付,合計,外食全員,外食一部,日用品,,,,小計,除外8,,除外10,,小計,食費,メモ
,,,,,,税抜,税,,,,税抜,税,税抜,税,,,
"##;
