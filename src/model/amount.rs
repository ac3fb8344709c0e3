//! Amount type for handling yen values that arrive as JSON numbers or loosely formatted strings.
//!
//! Submissions come from phones and voice input, so amounts may be numbers (`1100`), numeric
//! strings (`"1100"`), or strings with a yen sign, thousands separators or a `円` suffix
//! (`"¥1,100"`, `"1,100円"`). All of these coerce to the same `Amount`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// A yen amount. Amounts are usually whole yen but fractional values are kept as given.
///
/// ```
/// # use kakeibo_sync::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("¥1,100").unwrap();
/// let b = Amount::from_str("1100円").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "1100");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// A zero amount counts as "not entered" everywhere in the ledger.
    pub fn is_set(&self) -> bool {
        !self.is_zero()
    }

    /// Adds two amounts, saturating instead of overflowing.
    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Coerces a JSON value into an `Amount`.
    ///
    /// `null` and `false` are zero and `true` is one. Numbers and numeric strings are parsed.
    /// Arrays, objects and non-numeric strings are errors.
    pub fn from_json(value: &Value) -> Result<Self, AmountError> {
        match value {
            Value::Null => Ok(Amount::ZERO),
            Value::Bool(b) => Ok(if *b { Amount::from(1_i64) } else { Amount::ZERO }),
            Value::Number(n) => parse_decimal(&n.to_string())
                .map(Amount)
                .ok_or_else(|| AmountError::new(n.to_string())),
            Value::String(s) => Amount::from_str(s),
            other => Err(AmountError::new(other.to_string())),
        }
    }

    /// Formats the amount for humans, e.g. `¥1,100` or `-¥980`.
    pub fn to_yen(&self) -> String {
        let sign = if self.0.is_sign_negative() && !self.is_zero() {
            "-"
        } else {
            ""
        };
        let num = self.0.abs().to_f64().unwrap_or_default();
        if self.0.is_integer() {
            format!("{sign}¥{}", format_num::format_num!(",.0f", num))
        } else {
            format!("{sign}¥{}", format_num::format_num!(",.2f", num))
        }
    }
}

/// An error that can occur when a value cannot be read as an amount.
#[derive(Clone, PartialEq, Eq)]
pub struct AmountError(String);

impl AmountError {
    fn new(input: impl Into<String>) -> Self {
        Self(input.into())
    }

    /// The text that failed to parse.
    pub fn input(&self) -> &str {
        &self.0
    }
}

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "AmountError({:?})", self.0)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a number", self.0)
    }
}

impl std::error::Error for AmountError {}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };

        let without_yen = unsigned
            .trim_start_matches(['¥', '￥'])
            .trim_end_matches('円')
            .trim();
        let without_commas: String = without_yen
            .chars()
            .filter(|c| *c != ',' && *c != '，')
            .collect();

        let value = parse_decimal(&without_commas).ok_or_else(|| AmountError::new(s))?;
        Ok(Amount(if negative { -value } else { value }))
    }
}

/// Parses plain or scientific notation, the two forms JSON numbers print as.
fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let normalized = self.0.normalize();
        match (normalized.is_integer(), normalized.to_i64()) {
            (true, Some(i)) => serializer.serialize_i64(i),
            _ => serializer.serialize_f64(normalized.to_f64().unwrap_or_default()),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Amount::from_json(&value).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount(value)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount(Decimal::from(value))
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yen(value: i64) -> Amount {
        Amount::from(value)
    }
    use serde_json::json;

    #[test]
    fn test_parse_plain() {
        let amount = Amount::from_str("1100").unwrap();
        assert_eq!(amount, yen(1100));
    }

    #[test]
    fn test_parse_yen_sign_and_commas() {
        assert_eq!(Amount::from_str("¥1,100").unwrap(), yen(1100));
        assert_eq!(Amount::from_str("￥12,345").unwrap(), yen(12345));
    }

    #[test]
    fn test_parse_yen_suffix() {
        assert_eq!(Amount::from_str("980円").unwrap(), yen(980));
    }

    #[test]
    fn test_parse_negative() {
        assert_eq!(Amount::from_str("-¥500").unwrap(), yen(-500));
        assert_eq!(Amount::from_str("-500").unwrap(), yen(-500));
    }

    #[test]
    fn test_parse_empty_and_whitespace() {
        assert_eq!(Amount::from_str("").unwrap(), Amount::ZERO);
        assert_eq!(Amount::from_str("  ").unwrap(), Amount::ZERO);
        assert_eq!(Amount::from_str("  300  ").unwrap(), yen(300));
    }

    #[test]
    fn test_parse_fraction() {
        let amount = Amount::from_str("10.5").unwrap();
        assert_eq!(amount.value(), Decimal::new(105, 1));
    }

    #[test]
    fn test_parse_garbage() {
        let err = Amount::from_str("たくさん").unwrap_err();
        assert_eq!(err.input(), "たくさん");
        assert_eq!(err.to_string(), "'たくさん' is not a number");
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Amount::from_json(&json!(1100)).unwrap(), yen(1100));
        assert_eq!(
            Amount::from_json(&json!(99.5)).unwrap().value(),
            Decimal::new(995, 1)
        );
        assert_eq!(Amount::from_json(&json!("2,000")).unwrap(), yen(2000));
        assert_eq!(Amount::from_json(&json!(null)).unwrap(), Amount::ZERO);
        assert_eq!(Amount::from_json(&json!(false)).unwrap(), Amount::ZERO);
        assert_eq!(Amount::from_json(&json!(true)).unwrap(), yen(1));
        assert!(Amount::from_json(&json!([1, 2])).is_err());
        assert!(Amount::from_json(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_from_json_scientific() {
        assert_eq!(Amount::from_json(&json!(1e3)).unwrap(), yen(1000));
    }

    #[test]
    fn test_display_is_normalized() {
        let amount = Amount::new(Decimal::new(100000, 2));
        assert_eq!(amount.to_string(), "1000");
    }

    #[test]
    fn test_to_yen() {
        assert_eq!(yen(1100).to_yen(), "¥1,100");
        assert_eq!(yen(-980).to_yen(), "-¥980");
        assert_eq!(Amount::ZERO.to_yen(), "¥0");
        assert_eq!(Amount::new(Decimal::new(12345, 1)).to_yen(), "¥1,234.50");
    }

    #[test]
    fn test_serialize() {
        assert_eq!(serde_json::to_string(&yen(1100)).unwrap(), "1100");
        assert_eq!(
            serde_json::to_string(&Amount::new(Decimal::new(105, 1))).unwrap(),
            "10.5"
        );
    }

    #[test]
    fn test_deserialize() {
        let amount: Amount = serde_json::from_str(r#""1,100円""#).unwrap();
        assert_eq!(amount, yen(1100));
        assert!(serde_json::from_str::<Amount>(r#""abc""#).is_err());
    }

    #[test]
    fn test_is_set() {
        assert!(!Amount::ZERO.is_set());
        assert!(yen(-1).is_set());
        assert!(yen(1).is_set());
    }
}
