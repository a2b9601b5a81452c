//! # ReelPay Payouts - Editor Payout Engine
//!
//! Computes what an editor earns for a project and settles it exactly once.
//!
//! ## Key Features
//!
//! - **Tier rates**: explicit override, then tier table, then a fixed fallback
//! - **Performance bands**: reliability (lateness) and quality (QC average)
//!   factors from sorted band tables
//! - **Editor cap**: factored payout never exceeds the project's cap
//! - **Incentive pool**: bonuses stack first-fit, in order, within the pool
//! - **Preview vs final**: a min/max range before work is scored, the
//!   definitive breakdown once it is
//!
//! ## Settlement Formula
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  base         = billable_minutes × tier_rate                            │
//! │  after        = base × reliability(late_minutes) × quality(qc_average)  │
//! │  capped       = min(after, editor_cap ?? 2 × base)                      │
//! │  final        = capped + Σ bonuses admitted within incentive pool       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Seed Bands
//!
//! | Late minutes ≥ | Reliability | QC average ≥ | Quality |
//! |----------------|-------------|--------------|---------|
//! | 0 | 1.00 | 0.0 | 0.85 |
//! | 60 | 0.95 | 4.0 | 0.95 |
//! | 180 | 0.85 | 4.5 | 1.00 |
//! | 9999 | 0.70 | 4.8 | 1.05 |

pub mod bands;
pub mod config;
pub mod engine;
pub mod notify;
pub mod preview;
pub mod rates;
pub mod report;
pub mod settlement;
pub mod unlock;

// Re-exports
pub use bands::{BandKind, BandTable};
pub use config::{LoggingConfig, PayoutConfig, SettlementConfig};
pub use engine::{PayoutEngine, RateCard};
pub use notify::{LogNotifier, RecordingNotifier};
pub use preview::PayoutPreview;
pub use rates::{RateSource, ResolvedRate, TierRateTable};
pub use report::ProjectPayoutReport;
pub use settlement::SettlementBreakdown;
pub use unlock::{
    aggregate_milestones, EditorAggregate, EditorSettlement, SkipReason, SkippedEditor,
    UnlockOrchestrator, UnlockOutcome, UnlockSummary,
};

/// Payout constants
pub mod constants {
    /// Rate used when an editor has neither an override nor a resolvable
    /// tier row. Equal to the seeded STANDARD rate.
    pub const FALLBACK_RATE_PER_MIN: f64 = 500.0;

    /// Cap multiple of base payout when the project sets no explicit cap
    pub const DEFAULT_CAP_MULTIPLE: f64 = 2.0;

    /// Reliability factor below the lowest band (lowest seeded band)
    pub const DEFAULT_RELIABILITY_FACTOR: f64 = 0.70;

    /// Quality factor below the lowest band (lowest seeded band)
    pub const DEFAULT_QUALITY_FACTOR: f64 = 0.85;

    /// QC average assumed for an editor none of whose milestones were scored
    pub const NEUTRAL_QC_AVERAGE: f64 = 4.5;

    /// Upper end of the QC scale
    pub const MAX_QC_AVERAGE: f64 = 5.0;

    /// Preview pessimistic reliability
    pub const PREVIEW_MIN_RELIABILITY: f64 = 0.85;

    /// Preview pessimistic quality
    pub const PREVIEW_MIN_QUALITY: f64 = 0.95;

    /// Preview optimistic reliability
    pub const PREVIEW_MAX_RELIABILITY: f64 = 1.00;

    /// Preview optimistic quality
    pub const PREVIEW_MAX_QUALITY: f64 = 1.05;
}

pub use constants::*;

/// Round a monetary figure to whole currency units.
///
/// Negative values cannot reach here past input validation; they clamp to
/// zero rather than wrap.
pub(crate) fn round_amount(value: f64) -> reelpay_core::Amount {
    value.round().max(0.0) as reelpay_core::Amount
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_amount() {
        assert_eq!(round_amount(4249.5), 4250);
        assert_eq!(round_amount(4249.49), 4249);
        assert_eq!(round_amount(0.0), 0);
    }

    #[test]
    fn test_preview_bounds_bracket_neutral() {
        assert!(PREVIEW_MIN_RELIABILITY * PREVIEW_MIN_QUALITY < 1.0);
        assert!(PREVIEW_MAX_RELIABILITY * PREVIEW_MAX_QUALITY > 1.0);
    }
}
