//! Per-user account commands: usage report and tier assignment

use anyhow::Result;
use ledgerlens_core::quota::{today_utc, QuotaGate, UsageReport};
use ledgerlens_core::{Database, LedgerlensConfig, SubscriptionTier};

pub fn cmd_usage(db: &Database, config: &LedgerlensConfig, user: &str) -> Result<UsageReport> {
    let tier = db.get_tier(user)?;
    let gate = QuotaGate::new(db.clone(), config.quotas.clone());
    let report = gate.report(user, tier, today_utc())?;

    println!();
    println!("📊 Usage for {} ({} tier) on {} (UTC)", report.user_id, report.tier, report.date);
    println!("   ─────────────────────────────────────────────────────");

    for usage in &report.features {
        match usage.limit {
            Some(limit) => println!(
                "   {:10} │ {:>5} / {:<5} │ {:>5} left │ tokens in {} out {}",
                usage.feature.as_str(),
                usage.used,
                limit,
                usage.remaining,
                usage.input_tokens,
                usage.output_tokens
            ),
            None => println!(
                "   {:10} │ not included in the {} tier",
                usage.feature.as_str(),
                report.tier
            ),
        }
    }

    Ok(report)
}

pub fn cmd_tier(db: &Database, user: &str, tier: SubscriptionTier) -> Result<()> {
    db.set_tier(user, tier)?;
    println!("✅ {} is now on the {} tier", user, tier);
    Ok(())
}
