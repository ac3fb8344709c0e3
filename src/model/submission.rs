//! The submission a client sends, and its normalization into canonical categories.

use crate::model::{Amount, Categories};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// One expense entry as sent by a client.
///
/// Two shapes are accepted. The current one carries a `categories` map; the legacy one carries a
/// single `category` and `amount`. Every field is optional and missing fields default to empty,
/// so a sparse submission still produces a (sparse) ledger row.
///
/// Text fields accept any JSON scalar and keep its text, so `"date": 20251201` is stored as
/// `"20251201"`. Amounts are kept as raw JSON until normalization so that invalid values can be
/// reported by strict validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default, deserialize_with = "text")]
    pub payer: String,

    /// Stored verbatim; never parsed as a date.
    #[serde(default, deserialize_with = "text")]
    pub date: String,

    /// Legacy single-category amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,

    /// Legacy single-category name.
    #[serde(default, deserialize_with = "text", skip_serializing_if = "String::is_empty")]
    pub category: String,

    #[serde(default, deserialize_with = "object")]
    pub categories: BTreeMap<String, Value>,

    #[serde(default, deserialize_with = "text")]
    pub memo: String,

    /// The sheet (tab) to append to. Falls back to the configured default when empty.
    #[serde(default, deserialize_with = "text", skip_serializing_if = "String::is_empty")]
    pub sheet_name: String,
}

/// The canonical categories of a submission together with their total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub categories: Categories,
    pub total: Amount,
}

impl Submission {
    /// Parses a submission from JSON text.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Reconciles the legacy and current shapes into canonical categories.
    ///
    /// The total is the sum of the non-zero category amounts. If that total is zero and both the
    /// legacy `amount` and `category` are set, the legacy pair becomes the only non-zero entry and
    /// the total becomes the legacy amount. Otherwise the legacy fields are ignored.
    ///
    /// Values that cannot be read as numbers count as zero.
    pub fn normalize(&self) -> Normalized {
        let mut categories: Categories = self
            .categories
            .iter()
            .map(|(name, value)| (name.clone(), lenient_amount(name, value)))
            .collect();
        let mut total = categories.total();

        if total.is_zero() {
            let legacy = self
                .amount
                .as_ref()
                .map(|value| lenient_amount("amount", value))
                .unwrap_or_default();
            if legacy.is_set() && !self.category.is_empty() {
                categories.retain_set();
                categories.insert(self.category.clone(), legacy);
                total = legacy;
            }
        }

        Normalized { categories, total }
    }

    /// Lists every amount that cannot be read as a number, as `name: reason` strings.
    pub fn invalid_amounts(&self) -> Vec<String> {
        let legacy = self.amount.iter().map(|value| ("amount", value));
        let named = self
            .categories
            .iter()
            .map(|(name, value)| (name.as_str(), value));
        legacy
            .chain(named)
            .filter_map(|(name, value)| {
                Amount::from_json(value)
                    .err()
                    .map(|e| format!("{name}: {e}"))
            })
            .collect()
    }

    /// Returns the requested sheet name as given, or `default` when it is empty.
    pub fn sheet_name_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.sheet_name.is_empty() {
            default
        } else {
            &self.sheet_name
        }
    }
}

fn lenient_amount(name: &str, value: &Value) -> Amount {
    match Amount::from_json(value) {
        Ok(amount) => amount,
        Err(e) => {
            warn!("Treating the amount for '{name}' as zero: {e}");
            Amount::ZERO
        }
    }
}

/// Reads any JSON scalar as text. `null` is empty.
fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Reads a JSON object; `null` or any non-object value is an empty map.
fn object<'de, D>(deserializer: D) -> Result<BTreeMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn yen(value: i64) -> Amount {
        Amount::from(value)
    }

    fn parse(json: &str) -> Submission {
        Submission::from_json(json).unwrap()
    }

    #[test]
    fn test_parse_current_shape() {
        let s = parse(
            r#"{"payer":"A","date":"2025/12/1","categories":{"日用品":1100},"memo":"x"}"#,
        );
        assert_eq!(s.payer, "A");
        assert_eq!(s.date, "2025/12/1");
        assert_eq!(s.memo, "x");
        assert_eq!(s.categories.len(), 1);
        assert!(s.amount.is_none());
        assert_eq!(s.sheet_name, "");
    }

    #[test]
    fn test_parse_empty_object() {
        let s = parse("{}");
        assert_eq!(s, Submission::default());
    }

    #[test]
    fn test_parse_scalar_text_fields() {
        let s = parse(r#"{"payer":null,"date":20251201,"sheetName":"2026"}"#);
        assert_eq!(s.payer, "");
        assert_eq!(s.date, "20251201");
        assert_eq!(s.sheet_name, "2026");
    }

    #[test]
    fn test_parse_categories_not_an_object() {
        let s = parse(r#"{"categories":[1,2,3]}"#);
        assert!(s.categories.is_empty());
    }

    #[test]
    fn test_normalize_sums_non_zero_values() {
        let s = parse(r#"{"categories":{"食費":1000,"外食全員":0,"除外8":null,"交通費":"220"}}"#);
        let n = s.normalize();
        assert_eq!(n.total, yen(1220));
        assert_eq!(n.categories.get(Category::Food), Some(yen(1000)));
    }

    #[test]
    fn test_normalize_legacy_with_empty_categories() {
        let s = parse(r#"{"payer":"ひろち","amount":1000,"category":"食費","memo":"テスト"}"#);
        let n = s.normalize();
        assert_eq!(n.total, yen(1000));
        let expected: Categories = [("食費", yen(1000))].into_iter().collect();
        assert_eq!(n.categories, expected);
    }

    #[test]
    fn test_normalize_legacy_with_all_zero_categories() {
        let s = parse(r#"{"amount":500,"category":"日用品","categories":{"食費":0,"除外8":""}}"#);
        let n = s.normalize();
        assert_eq!(n.total, yen(500));
        let expected: Categories = [("日用品", yen(500))].into_iter().collect();
        assert_eq!(n.categories, expected);
    }

    #[test]
    fn test_normalize_legacy_ignored_when_categories_present() {
        let s = parse(r#"{"amount":500,"category":"日用品","categories":{"食費":300}}"#);
        let n = s.normalize();
        assert_eq!(n.total, yen(300));
        assert_eq!(n.categories.get(Category::HouseholdGoods), None);
    }

    #[test]
    fn test_normalize_legacy_needs_both_fields() {
        let n = parse(r#"{"amount":500}"#).normalize();
        assert_eq!(n.total, Amount::ZERO);
        assert!(n.categories.is_empty());

        let n = parse(r#"{"category":"食費"}"#).normalize();
        assert_eq!(n.total, Amount::ZERO);
        assert!(n.categories.is_empty());

        let n = parse(r#"{"amount":0,"category":"食費"}"#).normalize();
        assert_eq!(n.total, Amount::ZERO);
    }

    #[test]
    fn test_normalize_legacy_keeps_offsetting_entries() {
        let s = parse(r#"{"amount":700,"category":"食費","categories":{"交通費":100,"返金":-100}}"#);
        let n = s.normalize();
        assert_eq!(n.total, yen(700));
        assert_eq!(n.categories.len(), 3);
        assert_eq!(n.categories.total(), yen(700));
    }

    #[test]
    fn test_normalize_garbage_counts_as_zero() {
        let s = parse(r#"{"categories":{"食費":"いっぱい","日用品":110}}"#);
        let n = s.normalize();
        assert_eq!(n.total, yen(110));
        assert_eq!(n.categories.get(Category::Food), None);
    }

    #[test]
    fn test_invalid_amounts() {
        let s = parse(r#"{"amount":"x","categories":{"食費":"いっぱい","日用品":110}}"#);
        let invalid = s.invalid_amounts();
        assert_eq!(
            invalid,
            vec![
                "amount: 'x' is not a number".to_string(),
                "食費: 'いっぱい' is not a number".to_string(),
            ]
        );
        assert!(parse(r#"{"categories":{"食費":1}}"#).invalid_amounts().is_empty());
    }

    #[test]
    fn test_sheet_name_or() {
        assert_eq!(parse("{}").sheet_name_or("2025"), "2025");
        assert_eq!(parse(r#"{"sheetName":""}"#).sheet_name_or("2025"), "2025");
        assert_eq!(parse(r#"{"sheetName":" 2025"}"#).sheet_name_or("2025"), " 2025");
        assert_eq!(parse(r#"{"sheetName":"  "}"#).sheet_name_or("2025"), "  ");
        assert_eq!(parse(r#"{"sheetName":"2026"}"#).sheet_name_or("2025"), "2026");
    }
}
