//! Subscription tier lookup

use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use super::Database;
use crate::error::Result;
use crate::models::SubscriptionTier;

impl Database {
    /// A user's tier; users without a row are on the free tier
    pub fn get_tier(&self, user_id: &str) -> Result<SubscriptionTier> {
        let conn = self.conn()?;
        let tier: Option<String> = conn
            .query_row(
                "SELECT tier FROM subscriptions WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match tier {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(user_id, tier = %raw, "Unknown stored tier, treating as free");
                SubscriptionTier::Free
            }),
            None => SubscriptionTier::Free,
        })
    }

    /// Whether the user is on the pro tier
    pub fn is_pro(&self, user_id: &str) -> Result<bool> {
        Ok(self.get_tier(user_id)?.is_pro())
    }

    /// Set a user's tier
    pub fn set_tier(&self, user_id: &str, tier: SubscriptionTier) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO subscriptions (user_id, tier) VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET tier = excluded.tier, updated_at = CURRENT_TIMESTAMP
            "#,
            params![user_id, tier.as_str()],
        )?;
        info!(user_id, tier = %tier, "Subscription tier updated");
        Ok(())
    }
}
