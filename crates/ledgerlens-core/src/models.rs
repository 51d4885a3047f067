//! Domain models for Ledgerlens

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A ledger account owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A ledger transaction (read-only to the query engine)
///
/// Sign convention: **negative = expense (money out), positive = income
/// (money in)**. Aggregates work on magnitudes; the sign only matters for the
/// transaction-type filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub date: NaiveDate,
    /// Raw description as it appears on the statement
    pub name: String,
    /// Cleaned merchant name, when the ledger has one
    pub merchant_name: Option<String>,
    /// Negative = expense, positive = income
    pub amount: Decimal,
    pub category: Option<String>,
    pub is_income: bool,
    pub pending: bool,
}

impl Transaction {
    /// Merchant name, falling back to the statement description
    pub fn merchant_or_name(&self) -> &str {
        self.merchant_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_expense(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    pub fn is_inflow(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }
}

/// A new transaction to be imported (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub name: String,
    pub merchant_name: Option<String>,
    pub amount: Decimal,
    pub category: Option<String>,
    pub pending: bool,
    /// Hash for deduplication
    pub import_hash: String,
}

/// Subscription tier, as far as this subsystem cares about billing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }

    pub fn is_pro(&self) -> bool {
        matches!(self, Self::Pro)
    }

    pub fn from_is_pro(is_pro: bool) -> Self {
        if is_pro {
            Self::Pro
        } else {
            Self::Free
        }
    }
}

impl std::str::FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            _ => Err(format!("Unknown subscription tier: {}", s)),
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A metered feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// Natural-language transaction search
    Search,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
        }
    }

    pub fn all() -> &'static [Feature] {
        &[Self::Search]
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "search" => Ok(Self::Search),
            _ => Err(format!("Unknown feature: {}", s)),
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One day's usage of one feature by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub user_id: String,
    pub usage_date: NaiveDate,
    pub feature: Feature,
    pub count: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Token counts reported by a model call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tx(amount: Decimal) -> Transaction {
        Transaction {
            id: 1,
            account_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            name: "SQ *BLUE BOTTLE".to_string(),
            merchant_name: None,
            amount,
            category: None,
            is_income: false,
            pending: false,
        }
    }

    #[test]
    fn test_sign_convention() {
        assert!(tx(dec!(-4.50)).is_expense());
        assert!(!tx(dec!(-4.50)).is_inflow());
        assert!(tx(dec!(2500)).is_inflow());
        assert!(!tx(dec!(0)).is_expense());
        assert!(!tx(dec!(0)).is_inflow());
    }

    #[test]
    fn test_merchant_fallback() {
        let mut t = tx(dec!(-1));
        assert_eq!(t.merchant_or_name(), "SQ *BLUE BOTTLE");
        t.merchant_name = Some("Blue Bottle".to_string());
        assert_eq!(t.merchant_or_name(), "Blue Bottle");
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("PRO".parse::<SubscriptionTier>().unwrap(), SubscriptionTier::Pro);
        assert_eq!("free".parse::<SubscriptionTier>().unwrap(), SubscriptionTier::Free);
        assert!("gold".parse::<SubscriptionTier>().is_err());
        assert_eq!(SubscriptionTier::from_is_pro(true), SubscriptionTier::Pro);
    }

    #[test]
    fn test_feature_roundtrip() {
        for feature in Feature::all() {
            assert_eq!(feature.as_str().parse::<Feature>().unwrap(), *feature);
        }
    }
}
