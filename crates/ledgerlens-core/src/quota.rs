//! Per-user, per-feature daily quota gate
//!
//! `check_and_consume` either takes one unit of today's allowance or refuses,
//! in a single store statement. A refusal has no side effects. Days are UTC
//! calendar days.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::QuotaLimits;
use crate::db::{ConsumeOutcome, Database};
use crate::error::Result;
use crate::models::{Feature, SubscriptionTier, TokenUsage, UsageRecord};

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Units left today after this decision
    pub remaining: u32,
    pub limit: u32,
}

impl QuotaDecision {
    fn denied(limit: u32) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            limit,
        }
    }
}

/// Today's standing for one feature, for usage reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUsage {
    pub feature: Feature,
    pub used: u32,
    /// `None` when the tier is not entitled to the feature
    pub limit: Option<u32>,
    pub remaining: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Daily usage summary for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub user_id: String,
    pub tier: SubscriptionTier,
    pub date: NaiveDate,
    pub features: Vec<FeatureUsage>,
}

/// Gate in front of metered features
#[derive(Clone)]
pub struct QuotaGate {
    db: Database,
    limits: QuotaLimits,
}

impl QuotaGate {
    pub fn new(db: Database, limits: QuotaLimits) -> Self {
        Self { db, limits }
    }

    pub fn limits(&self) -> &QuotaLimits {
        &self.limits
    }

    /// Daily limit for the tier, `None` when not entitled
    pub fn limit_for(&self, feature: Feature, is_pro: bool) -> Option<u32> {
        self.limits
            .limit_for(SubscriptionTier::from_is_pro(is_pro), feature)
    }

    pub fn is_entitled(&self, feature: Feature, is_pro: bool) -> bool {
        self.limit_for(feature, is_pro).is_some()
    }

    /// Take one unit of today's (UTC) allowance if any is left
    pub fn check_and_consume(
        &self,
        user_id: &str,
        feature: Feature,
        is_pro: bool,
    ) -> Result<QuotaDecision> {
        self.check_and_consume_on(user_id, feature, is_pro, today_utc())
    }

    /// As [`QuotaGate::check_and_consume`], for an explicit day
    pub fn check_and_consume_on(
        &self,
        user_id: &str,
        feature: Feature,
        is_pro: bool,
        day: NaiveDate,
    ) -> Result<QuotaDecision> {
        let Some(limit) = self.limit_for(feature, is_pro) else {
            debug!(user_id, feature = %feature, is_pro, "Feature not entitled");
            return Ok(QuotaDecision::denied(0));
        };

        let decision = match self.db.try_consume(user_id, feature, day, limit)? {
            ConsumeOutcome::Consumed(count) => QuotaDecision {
                allowed: true,
                remaining: limit.saturating_sub(count),
                limit,
            },
            ConsumeOutcome::AtLimit => {
                info!(user_id, feature = %feature, limit, is_pro, "Daily quota exhausted");
                QuotaDecision::denied(limit)
            }
        };

        debug!(
            user_id,
            feature = %feature,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Quota decision"
        );
        Ok(decision)
    }

    /// Attach model token usage to today's record
    pub fn record_tokens(&self, user_id: &str, feature: Feature, usage: TokenUsage) -> Result<()> {
        self.record_tokens_on(user_id, feature, usage, today_utc())
    }

    pub fn record_tokens_on(
        &self,
        user_id: &str,
        feature: Feature,
        usage: TokenUsage,
        day: NaiveDate,
    ) -> Result<()> {
        if usage == TokenUsage::default() {
            return Ok(());
        }
        if !self.db.record_tokens(
            user_id,
            feature,
            day,
            usage.input_tokens,
            usage.output_tokens,
        )? {
            debug!(user_id, feature = %feature, "No usage row for token accounting");
        }
        Ok(())
    }

    /// Raw usage records for a day
    pub fn usage_for(&self, user_id: &str, day: NaiveDate) -> Result<Vec<UsageRecord>> {
        self.db.usage_for_day(user_id, day)
    }

    /// Per-feature standing for a day, including features not used yet
    pub fn report(&self, user_id: &str, tier: SubscriptionTier, day: NaiveDate) -> Result<UsageReport> {
        let records = self.usage_for(user_id, day)?;

        let features = Feature::all()
            .iter()
            .map(|feature| {
                let record = records.iter().find(|r| r.feature == *feature);
                let used = record.map_or(0, |r| r.count);
                let limit = self.limits.limit_for(tier, *feature);
                FeatureUsage {
                    feature: *feature,
                    used,
                    limit,
                    remaining: limit.map_or(0, |l| l.saturating_sub(used)),
                    input_tokens: record.map_or(0, |r| r.input_tokens),
                    output_tokens: record.map_or(0, |r| r.output_tokens),
                }
            })
            .collect();

        Ok(UsageReport {
            user_id: user_id.to_string(),
            tier,
            date: day,
            features,
        })
    }
}

/// Current UTC calendar day
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
