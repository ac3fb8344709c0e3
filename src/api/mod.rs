//! The grid store seam. `Sheet` is the small set of cell operations the ledger needs, with a
//! Google implementation and an in-memory one for tests and offline runs.

mod a1;
mod files;
mod ledger;
mod oauth;
mod sheet;
mod test_sheet;

use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use sheet::GoogleSheet;

pub(crate) use a1::column_index;
pub(crate) use ledger::{Layout, Ledger};
pub(crate) use oauth::TokenProvider;
pub(crate) use test_sheet::TestSheet;

#[cfg(test)]
pub(crate) use test_sheet::TestSheetState;

/// Read and write access to spreadsheet cells is all the app needs.
const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// Environment variable that switches the app to the in-memory sheet.
const TEST_MODE_ENV: &str = "KAKEIBO_IN_TEST_MODE";

/// Selects which `Sheet` implementation backs the ledger.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Google,
    Testing,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    /// `Mode::Testing` when `KAKEIBO_IN_TEST_MODE` is set to a non-empty value, otherwise
    /// `Mode::Google`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Google,
        }
    }
}

/// Cell access for one spreadsheet. Rows and columns are 1-based, as in A1 notation.
#[async_trait::async_trait]
pub(crate) trait Sheet {
    /// Reads the cells of `column` from `row_start` down to the last populated row of the sheet.
    /// Empty cells are returned as empty strings.
    async fn read_column(
        &mut self,
        sheet_name: &str,
        column: u32,
        row_start: u32,
    ) -> Result<Vec<String>>;

    /// The last row that has any non-empty cell, or 0 for an empty sheet.
    async fn last_row(&mut self, sheet_name: &str) -> Result<u32>;

    /// Writes `values` into `row`, left to right, starting at `start_column`.
    async fn write_row(
        &mut self,
        sheet_name: &str,
        row: u32,
        start_column: u32,
        values: &[String],
    ) -> Result<()>;
}

/// Creates the `Sheet` for `mode`. Google sheets need a valid token, which is loaded (and
/// refreshed if expired) here.
pub(crate) async fn sheet(config: &Config, mode: Mode) -> Result<Box<dyn Sheet + Send>> {
    match mode {
        Mode::Google => {
            let token_provider =
                TokenProvider::load(config.client_secret_path(), config.token_path()).await?;
            let sheet = GoogleSheet::new(config.clone(), token_provider).await?;
            Ok(Box::new(sheet))
        }
        Mode::Testing => Ok(Box::new(TestSheet::new(config.spreadsheet_id()))),
    }
}
