//! kakeibo: appends household expense entries to a kakeibo (家計簿) Google Sheet.
//!
//! Entries arrive as small JSON submissions, over HTTP (`kakeibo serve`) or from the command line
//! (`kakeibo append`). Each one is normalized, turned into a fixed-width ledger row with its
//! consumption tax split out, and written into the first free row of the sheet.

mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
mod server;
mod utils;


pub use api::Mode;
pub use config::Config;
pub use error::{Error, ErrorType, Result};
pub use model::Amount;
