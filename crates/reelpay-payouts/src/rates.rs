//! # Rate Resolution
//!
//! Resolves an editor's effective per-minute rate.
//!
//! | Step | Source | Condition |
//! |------|--------|-----------|
//! | 1 | Editor override | `tier_rate_per_min` set and positive |
//! | 2 | Tier table | editor has a tier with an active row |
//! | 3 | Fallback | always (`FALLBACK_RATE_PER_MIN`) |
//!
//! A missing tier row falls through silently. Settlement is never blocked
//! on incomplete pricing configuration.

use crate::constants::FALLBACK_RATE_PER_MIN;
use reelpay_core::{Editor, EditorTier, PayoutError, Result, TierRate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a resolved rate came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateSource {
    /// Explicit per-editor override
    Override,
    /// Active tier table row
    Tier(EditorTier),
    /// Hardcoded fallback
    Fallback,
}

/// Per-minute rate plus its provenance
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub rate_per_min: f64,
    pub source: RateSource,
}

/// Active tier rows keyed by tier
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TierRateTable {
    rows: HashMap<EditorTier, TierRate>,
}

impl TierRateTable {
    /// Build from configuration rows.
    ///
    /// Inactive rows are ignored. When a tier has several active rows the
    /// first one wins. Active rows must carry a positive, finite rate.
    pub fn new(rates: &[TierRate]) -> Result<Self> {
        let mut rows = HashMap::new();

        for rate in rates.iter().filter(|r| r.is_active) {
            if !rate.rate_per_min.is_finite() || rate.rate_per_min <= 0.0 {
                return Err(PayoutError::InvalidConfig(format!(
                    "tier {} rate {} must be positive",
                    rate.tier, rate.rate_per_min
                )));
            }
            if rows.contains_key(&rate.tier) {
                tracing::warn!(tier = %rate.tier, "Ignoring extra active tier rate row");
                continue;
            }
            rows.insert(rate.tier, rate.clone());
        }

        Ok(Self { rows })
    }

    /// Active rate for a tier, if configured
    pub fn rate_for(&self, tier: EditorTier) -> Option<f64> {
        self.rows.get(&tier).map(|row| row.rate_per_min)
    }

    /// Whether the tier may take rush orders (false when unconfigured)
    pub fn rush_eligible(&self, tier: EditorTier) -> bool {
        self.rows.get(&tier).map(|row| row.rush_eligible).unwrap_or(false)
    }

    /// Active rows in tier order
    pub fn rows(&self) -> Vec<&TierRate> {
        let mut rows: Vec<&TierRate> = self.rows.values().collect();
        rows.sort_by_key(|row| row.tier);
        rows
    }

    /// Resolve an editor's effective rate
    pub fn resolve(&self, editor: &Editor) -> ResolvedRate {
        if let Some(rate_per_min) = editor.rate_override() {
            return ResolvedRate {
                rate_per_min,
                source: RateSource::Override,
            };
        }

        if let Some(tier) = editor.tier {
            if let Some(rate_per_min) = self.rate_for(tier) {
                return ResolvedRate {
                    rate_per_min,
                    source: RateSource::Tier(tier),
                };
            }
        }

        ResolvedRate {
            rate_per_min: FALLBACK_RATE_PER_MIN,
            source: RateSource::Fallback,
        }
    }
}
