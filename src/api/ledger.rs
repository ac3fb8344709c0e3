//! Finds the row a new entry goes into and writes it there.
//!
//! The target row is the first empty cell in the date column, scanning down from the first data
//! row. When the column has no gap the entry goes one past the last populated row. Finding the
//! row and writing it are two separate calls to the sheet with nothing held in between, so two
//! concurrent appends can pick the same row and the later write wins.

use crate::api::Sheet;
use crate::model::Row;
use crate::{Config, Result};
use anyhow::Context;
use tracing::{debug, trace};

/// Where the ledger lives within a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    /// First row below the header block.
    pub(crate) first_data_row: u32,
    /// The column the first row slot (payer) is written to.
    pub(crate) first_column: u32,
    /// The column scanned for the first empty row.
    pub(crate) date_column: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            first_data_row: 5,
            first_column: 2,
            date_column: 3,
        }
    }
}

impl Layout {
    pub(crate) fn from_config(config: &Config) -> Self {
        Self {
            first_data_row: config.first_data_row(),
            first_column: config.first_column(),
            date_column: config.date_column(),
        }
    }
}

/// Places rows into a `Sheet` according to a `Layout`.
pub(crate) struct Ledger {
    sheet: Box<dyn Sheet + Send>,
    layout: Layout,
}

impl Ledger {
    pub(crate) fn new(sheet: Box<dyn Sheet + Send>, layout: Layout) -> Self {
        Self { sheet, layout }
    }

    /// Returns the row the next entry in `sheet_name` should be written to.
    pub(crate) async fn locate_target_row(&mut self, sheet_name: &str) -> Result<u32> {
        let first = self.layout.first_data_row;
        let cells = self
            .sheet
            .read_column(sheet_name, self.layout.date_column, first)
            .await
            .with_context(|| format!("Failed to read the date column of '{sheet_name}'"))?;
        trace!("Scanned {} date cells in '{sheet_name}'", cells.len());

        if let Some(row) = first_empty_row(&cells, first) {
            debug!("Found an empty row at {row} in '{sheet_name}'");
            return Ok(row);
        }

        let last = self
            .sheet
            .last_row(sheet_name)
            .await
            .with_context(|| format!("Failed to find the last row of '{sheet_name}'"))?;
        let row = (last + 1).max(first);
        debug!("No empty row in '{sheet_name}', appending at {row}");
        Ok(row)
    }

    /// Writes all slots of `row` into `row_index` as one range, starting at the first column.
    pub(crate) async fn write(&mut self, sheet_name: &str, row_index: u32, row: &Row) -> Result<()> {
        self.sheet
            .write_row(
                sheet_name,
                row_index,
                self.layout.first_column,
                &row.to_sheet_values(),
            )
            .await
            .with_context(|| format!("Failed to write row {row_index} of '{sheet_name}'"))
    }

    /// Locates the target row, writes `row` there and returns the row number.
    pub(crate) async fn append(&mut self, sheet_name: &str, row: &Row) -> Result<u32> {
        let row_index = self.locate_target_row(sheet_name).await?;
        self.write(sheet_name, row_index, row).await?;
        Ok(row_index)
    }
}

/// The sheet row of the first empty cell, where `cells[0]` is at `first_row`.
fn first_empty_row(cells: &[String], first_row: u32) -> Option<u32> {
    cells
        .iter()
        .position(|cell| cell.is_empty())
        .map(|offset| first_row + offset as u32)
}
