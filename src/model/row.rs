//! Builds the fixed-width ledger row for a submission.
//!
//! The ledger sheet has seventeen columns per entry, starting at column B:
//!
//! | Slot | Column | Content |
//! |---|---|---|
//! | 0 | B | payer |
//! | 1 | C | date |
//! | 2 | D | total, tax included |
//! | 3 | E | dining out, whole family |
//! | 4 | F | dining out, part of the family |
//! | 5 | G | household goods, tax excluded (10%) |
//! | 6 | H | household goods, tax |
//! | 7–8 | I–J | unused, always blank |
//! | 9 | K | household goods subtotal |
//! | 10 | L | excluded 8%, tax excluded |
//! | 11 | M | excluded 8%, tax |
//! | 12 | N | excluded 10%, tax excluded |
//! | 13 | O | excluded 10%, tax |
//! | 14 | P | excluded subtotal |
//! | 15 | Q | food, tax included |
//! | 16 | R | memo |
//!
//! Every slot is always filled, with a blank string when there is nothing to show, because the
//! row is written as one contiguous range.

use crate::model::{Amount, Categories, Category};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Number of cells in a ledger row.
pub const ROW_WIDTH: usize = 17;

pub(crate) const PAYER: usize = 0;
pub(crate) const DATE: usize = 1;
pub(crate) const TOTAL: usize = 2;
pub(crate) const DINING_ALL_FAMILY: usize = 3;
pub(crate) const DINING_PARTIAL_FAMILY: usize = 4;
pub(crate) const HOUSEHOLD_TAX_EXCLUDED: usize = 5;
pub(crate) const HOUSEHOLD_TAX: usize = 6;
pub(crate) const HOUSEHOLD_SUBTOTAL: usize = 9;
pub(crate) const EXCLUDED_8_TAX_EXCLUDED: usize = 10;
pub(crate) const EXCLUDED_8_TAX: usize = 11;
pub(crate) const EXCLUDED_10_TAX_EXCLUDED: usize = 12;
pub(crate) const EXCLUDED_10_TAX: usize = 13;
pub(crate) const EXCLUDED_SUBTOTAL: usize = 14;
pub(crate) const FOOD: usize = 15;
pub(crate) const MEMO: usize = 16;

/// One cell of a ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Blank,
    Number(Amount),
    Text(String),
}

impl Cell {
    /// A number cell, or a blank one when the amount is zero or missing.
    fn amount_or_blank(amount: Option<Amount>) -> Cell {
        match amount {
            Some(amount) if amount.is_set() => Cell::Number(amount),
            _ => Cell::Blank,
        }
    }

    /// The value sent to the sheet. Numbers are written as plain digits so the sheet parses them.
    pub fn to_sheet_value(&self) -> String {
        self.to_string()
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Blank => true,
            Cell::Text(s) => s.is_empty(),
            Cell::Number(_) => false,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Blank => Ok(()),
            Cell::Number(amount) => Display::fmt(amount, f),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Cell::Blank => serializer.serialize_str(""),
            Cell::Number(amount) => amount.serialize(serializer),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// A consumption tax rate used by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxRate {
    /// The reduced 8% rate.
    Reduced,
    /// The standard 10% rate.
    Standard,
}

impl TaxRate {
    pub fn rate(&self) -> Decimal {
        match self {
            TaxRate::Reduced => Decimal::new(8, 2),
            TaxRate::Standard => Decimal::new(10, 2),
        }
    }
}

/// A tax-included amount split into its tax-excluded base and the tax.
///
/// Only the base is rounded (to whole yen, halves away from zero); the tax is whatever remains,
/// so `tax_excluded + tax` is always exactly the original amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxSplit {
    pub tax_excluded: Amount,
    pub tax: Amount,
}

impl TaxSplit {
    pub fn calc(total: Amount, rate: TaxRate) -> TaxSplit {
        let divisor = Decimal::ONE + rate.rate();
        let tax_excluded = (total.value() / divisor)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        TaxSplit {
            tax_excluded: Amount::new(tax_excluded),
            tax: Amount::new(total.value() - tax_excluded),
        }
    }
}

/// A complete ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Row([Cell; ROW_WIDTH]);

impl Row {
    pub fn cells(&self) -> &[Cell; ROW_WIDTH] {
        &self.0
    }

    pub fn get(&self, slot: usize) -> Option<&Cell> {
        self.0.get(slot)
    }

    /// The row as sheet values, in column order.
    pub fn to_sheet_values(&self) -> Vec<String> {
        self.0.iter().map(Cell::to_sheet_value).collect()
    }

    fn set(&mut self, slot: usize, cell: Cell) {
        self.0[slot] = cell;
    }

    /// Writes the split of `category` into the two given slots, returning the raw amount when it
    /// was set.
    fn set_tax_split(
        &mut self,
        categories: &Categories,
        category: Category,
        rate: TaxRate,
        slots: (usize, usize),
    ) -> Option<Amount> {
        let amount = categories.get(category)?;
        let split = TaxSplit::calc(amount, rate);
        self.set(slots.0, Cell::Number(split.tax_excluded));
        self.set(slots.1, Cell::Number(split.tax));
        Some(amount)
    }
}

/// Builds the ledger row for one entry. This is a pure function of its inputs.
///
/// The total in slot 2 is recomputed from `categories`, so it is authoritative even when the
/// caller's own total disagrees.
pub fn build_row(payer: &str, date: &str, categories: &Categories, memo: &str) -> Row {
    let mut row = Row::default();
    row.set(PAYER, Cell::from(payer));
    row.set(DATE, Cell::from(date));
    row.set(TOTAL, Cell::Number(categories.total()));

    row.set(
        DINING_ALL_FAMILY,
        Cell::amount_or_blank(categories.get(Category::DiningAllFamily)),
    );
    row.set(
        DINING_PARTIAL_FAMILY,
        Cell::amount_or_blank(categories.get(Category::DiningPartialFamily)),
    );

    if let Some(subtotal) = row.set_tax_split(
        categories,
        Category::HouseholdGoods,
        TaxRate::Standard,
        (HOUSEHOLD_TAX_EXCLUDED, HOUSEHOLD_TAX),
    ) {
        row.set(HOUSEHOLD_SUBTOTAL, Cell::Number(subtotal));
    }

    let excluded = [
        (
            Category::Excluded8,
            TaxRate::Reduced,
            (EXCLUDED_8_TAX_EXCLUDED, EXCLUDED_8_TAX),
        ),
        (
            Category::Excluded10,
            TaxRate::Standard,
            (EXCLUDED_10_TAX_EXCLUDED, EXCLUDED_10_TAX),
        ),
    ]
    .into_iter()
    .filter_map(|(category, rate, slots)| row.set_tax_split(categories, category, rate, slots))
    .fold(Amount::ZERO, |sum, amount| sum.saturating_add(amount));
    row.set(EXCLUDED_SUBTOTAL, Cell::amount_or_blank(Some(excluded)));

    row.set(FOOD, Cell::amount_or_blank(categories.get(Category::Food)));
    row.set(MEMO, Cell::from(memo));
    row
}
