//! The expense categories a submission can carry.
//!
//! The ledger sheet has a fixed set of category columns, so `Category` is a closed enum and the
//! names a phone client sends are looked up in a static table. `Categories` keeps whatever names
//! arrived, known or not: unknown names never map to a column but still count towards the total.

use crate::model::Amount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// An expense bucket with its own column(s) in the ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Eating out with the whole family (`外食全員`).
    DiningAllFamily,
    /// Eating out with part of the family (`外食一部`).
    DiningPartialFamily,
    /// Household goods, taxed at 10% (`日用品`).
    HouseholdGoods,
    /// Excluded spending taxed at the reduced 8% rate (`除外8`).
    Excluded8,
    /// Excluded spending taxed at 10% (`除外10`).
    Excluded10,
    /// Groceries, recorded tax-included (`食費`).
    Food,
}

/// Wire name for every category. Lookups go through this table only.
const NAMES: [(&str, Category); 6] = [
    ("外食全員", Category::DiningAllFamily),
    ("外食一部", Category::DiningPartialFamily),
    ("日用品", Category::HouseholdGoods),
    ("除外8", Category::Excluded8),
    ("除外10", Category::Excluded10),
    ("食費", Category::Food),
];

impl Category {
    pub const ALL: [Category; 6] = [
        Category::DiningAllFamily,
        Category::DiningPartialFamily,
        Category::HouseholdGoods,
        Category::Excluded8,
        Category::Excluded10,
        Category::Food,
    ];

    /// Finds the category for a wire name. Names must match exactly.
    pub fn from_name(name: &str) -> Option<Category> {
        NAMES.iter().find(|(n, _)| *n == name).map(|(_, c)| *c)
    }

    /// The name clients send for this category.
    pub fn name(&self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, c)| c == self)
            .map(|(n, _)| *n)
            .unwrap_or_default()
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_name(s).ok_or_else(|| anyhow::anyhow!("Unknown category '{s}'"))
    }
}

/// Category name to amount, as submitted. Names outside the known vocabulary are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Categories(BTreeMap<String, Amount>);

impl Categories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the amount for `name`, replacing any previous amount.
    pub fn insert(&mut self, name: impl Into<String>, amount: Amount) {
        self.0.insert(name.into(), amount);
    }

    /// Removes every entry whose amount is zero.
    pub fn retain_set(&mut self) {
        self.0.retain(|_, amount| amount.is_set());
    }

    /// The amount entered for `category`, if it is non-zero.
    pub fn get(&self, category: Category) -> Option<Amount> {
        self.0.get(category.name()).copied().filter(Amount::is_set)
    }

    /// Sum of every non-zero amount, including names that map to no column.
    pub fn total(&self) -> Amount {
        self.0
            .values()
            .filter(|amount| amount.is_set())
            .fold(Amount::ZERO, |sum, amount| sum.saturating_add(*amount))
    }

    /// Names that do not belong to the known vocabulary.
    pub fn unknown_names(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .filter(|name| Category::from_name(name).is_none())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S> FromIterator<(S, Amount)> for Categories
where
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (S, Amount)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, amount)| (name.into(), amount))
                .collect(),
        )
    }
}
