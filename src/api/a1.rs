//! A1 notation helpers for building ranges like `'2025'!C5:C` or `'2025'!B7:R7`.

use crate::Result;
use anyhow::{bail, ensure};

/// Converts a 1-based column number to its letters: 1 is `A`, 26 is `Z`, 27 is `AA`.
/// Zero has no letters and yields an empty string.
pub fn column_letters(column: u32) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Converts column letters to a 1-based column number. Lowercase letters are accepted.
pub fn column_index(letters: &str) -> Result<u32> {
    let letters = letters.trim();
    ensure!(!letters.is_empty(), "A column name cannot be empty");
    let mut n: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            bail!("'{letters}' is not a column name");
        }
        let digit = u32::from(c.to_ascii_uppercase() as u8 - b'A') + 1;
        n = match n.checked_mul(26).and_then(|n| n.checked_add(digit)) {
            Some(n) => n,
            None => bail!("Column '{letters}' is out of range"),
        };
    }
    Ok(n)
}

/// Quotes a sheet name for use in a range. Names like `2025` would otherwise be ambiguous.
pub(super) fn quote_sheet(sheet_name: &str) -> String {
    format!("'{}'", sheet_name.replace('\'', "''"))
}

/// A whole sheet, wide enough for any ledger.
pub(super) fn sheet_range(sheet_name: &str) -> String {
    format!("{}!A:ZZ", quote_sheet(sheet_name))
}

/// An open-ended single column range, e.g. `'2025'!C5:C`.
pub(super) fn column_range(sheet_name: &str, column: u32, row_start: u32) -> String {
    let letters = column_letters(column);
    format!("{}!{letters}{row_start}:{letters}", quote_sheet(sheet_name))
}

/// A single row range `width` cells wide, e.g. `'2025'!B7:R7`.
pub(super) fn row_range(sheet_name: &str, row: u32, start_column: u32, width: usize) -> String {
    let end_column = start_column + (width.max(1) as u32) - 1;
    format!(
        "{}!{}{row}:{}{row}",
        quote_sheet(sheet_name),
        column_letters(start_column),
        column_letters(end_column),
    )
}
