//! Payout configuration types
//!
//! Loaded from TOML. Every section has seeded defaults, so an empty file
//! (or no file at all) yields the documented rate card.
//!
//! ```toml
//! [settlement]
//! neutral_qc_average = 4.5
//!
//! [[tier_rates]]
//! tier = "STANDARD"
//! rate_per_min = 500.0
//!
//! [[reliability_bands]]
//! min_late_minutes = 60.0
//! factor = 0.95
//! ```

use crate::constants::{MAX_QC_AVERAGE, NEUTRAL_QC_AVERAGE};
use reelpay_core::{EditorTier, PayoutError, QualityBand, ReliabilityBand, Result, TierRate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete payout configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Per-tier default rates
    #[serde(default = "default_tier_rates")]
    pub tier_rates: Vec<TierRate>,

    /// Lateness bands
    #[serde(default = "default_reliability_bands")]
    pub reliability_bands: Vec<ReliabilityBand>,

    /// QC bands
    #[serde(default = "default_quality_bands")]
    pub quality_bands: Vec<QualityBand>,

    /// Settlement policy knobs
    #[serde(default)]
    pub settlement: SettlementConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            tier_rates: default_tier_rates(),
            reliability_bands: default_reliability_bands(),
            quality_bands: default_quality_bands(),
            settlement: SettlementConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PayoutConfig {
    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| PayoutError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PayoutError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded payout configuration");
        Ok(config)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PayoutError::Serialization(e.to_string()))
    }

    /// Checks that don't need the built tables
    pub fn validate(&self) -> Result<()> {
        let neutral = self.settlement.neutral_qc_average;
        if !(0.0..=MAX_QC_AVERAGE).contains(&neutral) {
            return Err(PayoutError::InvalidConfig(format!(
                "neutral_qc_average {} outside 0..={}",
                neutral, MAX_QC_AVERAGE
            )));
        }
        Ok(())
    }
}

/// Settlement policy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// QC average used for an editor with no scored milestones.
    /// Product policy: neutral, not zero.
    #[serde(default = "default_neutral_qc_average")]
    pub neutral_qc_average: f64,
}

fn default_neutral_qc_average() -> f64 {
    NEUTRAL_QC_AVERAGE
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            neutral_qc_average: default_neutral_qc_average(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Seeded tier rates
pub fn default_tier_rates() -> Vec<TierRate> {
    [
        (EditorTier::Junior, 350.0, false),
        (EditorTier::Standard, 500.0, false),
        (EditorTier::Senior, 700.0, true),
        (EditorTier::Elite, 1000.0, true),
    ]
    .into_iter()
    .map(|(tier, rate_per_min, rush_eligible)| TierRate {
        tier,
        rate_per_min,
        rush_eligible,
        is_active: true,
    })
    .collect()
}

/// Seeded reliability bands: 0/60/180/9999 late minutes
pub fn default_reliability_bands() -> Vec<ReliabilityBand> {
    [(0.0, 1.00), (60.0, 0.95), (180.0, 0.85), (9999.0, 0.70)]
        .into_iter()
        .map(|(min_late_minutes, factor)| ReliabilityBand {
            min_late_minutes,
            factor,
        })
        .collect()
}

/// Seeded quality bands: 0.0/4.0/4.5/4.8 QC average
pub fn default_quality_bands() -> Vec<QualityBand> {
    [(0.0, 0.85), (4.0, 0.95), (4.5, 1.00), (4.8, 1.05)]
        .into_iter()
        .map(|(min_qc_avg, factor)| QualityBand { min_qc_avg, factor })
        .collect()
}
