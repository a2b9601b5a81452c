//! Payout engine: the built rate card plus the calculators hung off it
//!
//! `RateCard` is validated and sorted once, at configuration load. The
//! calculators (`preview`, `settle`) only read it, so one engine can be
//! shared across threads behind an `Arc`.

use crate::bands::BandTable;
use crate::config::PayoutConfig;
use crate::rates::{ResolvedRate, TierRateTable};
use reelpay_core::{Editor, PayoutError, Project, Result};

/// Built pricing configuration
#[derive(Clone, Debug, PartialEq)]
pub struct RateCard {
    pub tiers: TierRateTable,
    pub reliability: BandTable,
    pub quality: BandTable,
    pub neutral_qc_average: f64,
}

impl RateCard {
    /// Validate configuration rows and build lookup tables
    pub fn from_config(config: &PayoutConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tiers: TierRateTable::new(&config.tier_rates)?,
            reliability: BandTable::reliability(&config.reliability_bands)?,
            quality: BandTable::quality(&config.quality_bands)?,
            neutral_qc_average: config.settlement.neutral_qc_average,
        })
    }
}

/// Payout calculator over a fixed rate card
#[derive(Clone, Debug)]
pub struct PayoutEngine {
    rate_card: RateCard,
}

impl PayoutEngine {
    pub fn new(rate_card: RateCard) -> Self {
        Self { rate_card }
    }

    /// Build an engine straight from configuration
    pub fn from_config(config: &PayoutConfig) -> Result<Self> {
        Ok(Self::new(RateCard::from_config(config)?))
    }

    pub fn rate_card(&self) -> &RateCard {
        &self.rate_card
    }

    /// Effective per-minute rate for an editor
    pub fn resolve_rate(&self, editor: &Editor) -> ResolvedRate {
        self.rate_card.tiers.resolve(editor)
    }

    /// Reject structurally invalid project/editor inputs before any math
    pub(crate) fn validate_inputs(project: &Project, editor: &Editor) -> Result<()> {
        PayoutError::check_non_negative("billable_minutes", project.billable_minutes)?;
        if let Some(cap) = project.editor_cap_amount {
            PayoutError::check_non_negative("editor_cap_amount", cap)?;
        }
        if let Some(pool) = project.incentive_pool_remaining {
            PayoutError::check_non_negative("incentive_pool_remaining", pool)?;
        }
        if let Some(rate) = editor.tier_rate_per_min {
            if !rate.is_finite() {
                return Err(PayoutError::InvalidInput {
                    field: "tier_rate_per_min",
                    value: rate,
                });
            }
        }
        Ok(())
    }
}
