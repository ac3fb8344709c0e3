//! Types that represent the core data model: submissions, categories, amounts and ledger rows.
mod amount;
mod category;
mod row;
mod submission;

pub use amount::{Amount, AmountError};
pub use category::{Categories, Category};
pub use row::{build_row, Cell, Row, TaxRate, TaxSplit, ROW_WIDTH};
pub use submission::{Normalized, Submission};
