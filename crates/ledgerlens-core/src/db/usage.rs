//! Daily usage counters
//!
//! One row per (user, UTC day, feature). The quota check and the increment are
//! a single conditional upsert, so concurrent requests can never push a count
//! past its limit.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Feature, UsageRecord};

/// Result of one conditional increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The increment happened; carries the new count
    Consumed(u32),
    /// The counter was already at the limit; nothing changed
    AtLimit,
}

impl Database {
    /// Increment the day's counter if it is below `limit`
    ///
    /// Creates the row on first use. With `limit == 0` nothing is written.
    pub fn try_consume(
        &self,
        user_id: &str,
        feature: Feature,
        day: NaiveDate,
        limit: u32,
    ) -> Result<ConsumeOutcome> {
        if limit == 0 {
            return Ok(ConsumeOutcome::AtLimit);
        }

        let conn = self.conn()?;
        let new_count: Option<u32> = conn
            .query_row(
                r#"
                INSERT INTO usage_records (user_id, usage_date, feature, count)
                VALUES (?1, ?2, ?3, 1)
                ON CONFLICT(user_id, usage_date, feature) DO UPDATE
                    SET count = count + 1, updated_at = CURRENT_TIMESTAMP
                    WHERE usage_records.count < ?4
                RETURNING count
                "#,
                params![user_id, day.to_string(), feature.as_str(), limit],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match new_count {
            Some(count) => ConsumeOutcome::Consumed(count),
            None => ConsumeOutcome::AtLimit,
        })
    }

    /// Add model token usage to an existing day's record
    ///
    /// Never creates a row; returns false when there was nothing to update.
    pub fn record_tokens(
        &self,
        user_id: &str,
        feature: Feature,
        day: NaiveDate,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<bool> {
        let input = i64::try_from(input_tokens)
            .map_err(|_| Error::InvalidData("input token count out of range".into()))?;
        let output = i64::try_from(output_tokens)
            .map_err(|_| Error::InvalidData("output token count out of range".into()))?;

        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE usage_records
            SET input_tokens = input_tokens + ?4,
                output_tokens = output_tokens + ?5,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = ?1 AND usage_date = ?2 AND feature = ?3
            "#,
            params![user_id, day.to_string(), feature.as_str(), input, output],
        )?;
        Ok(updated > 0)
    }

    /// Current count for one feature on one day (0 when no row exists)
    pub fn usage_count(&self, user_id: &str, feature: Feature, day: NaiveDate) -> Result<u32> {
        let conn = self.conn()?;
        let count: Option<u32> = conn
            .query_row(
                "SELECT count FROM usage_records WHERE user_id = ? AND usage_date = ? AND feature = ?",
                params![user_id, day.to_string(), feature.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    /// All of a user's usage records for one day
    pub fn usage_for_day(&self, user_id: &str, day: NaiveDate) -> Result<Vec<UsageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, usage_date, feature, count, input_tokens, output_tokens,
                   created_at, updated_at
            FROM usage_records
            WHERE user_id = ? AND usage_date = ?
            ORDER BY feature
            "#,
        )?;

        let rows = stmt
            .query_map(params![user_id, day.to_string()], |row| {
                let feature_str: String = row.get(2)?;
                let input_tokens: i64 = row.get(4)?;
                let output_tokens: i64 = row.get(5)?;
                let created_at_str: String = row.get(6)?;
                let updated_at_str: String = row.get(7)?;

                // Rows for features this build doesn't know are skipped
                let Ok(feature) = feature_str.parse::<Feature>() else {
                    return Ok(None);
                };

                Ok(Some(UsageRecord {
                    user_id: row.get(0)?,
                    usage_date: day,
                    feature,
                    count: row.get(3)?,
                    input_tokens: input_tokens.max(0) as u64,
                    output_tokens: output_tokens.max(0) as u64,
                    created_at: parse_datetime(&created_at_str),
                    updated_at: parse_datetime(&updated_at_str),
                }))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().flatten().collect())
    }
}
