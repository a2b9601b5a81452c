//! # Performance Bands
//!
//! Threshold tables mapping a probe value to a payout factor.
//!
//! Both the reliability table (probe: aggregate late minutes) and the
//! quality table (probe: QC average) use the same lookup: the band with the
//! largest threshold that is `<=` the probe wins. Whether a higher probe is
//! better or worse lives only in the configured factors.
//!
//! Tables are sorted once when built, so a lookup is a binary search and
//! the result does not depend on the order rows were entered in.

use crate::constants::{DEFAULT_QUALITY_FACTOR, DEFAULT_RELIABILITY_FACTOR};
use reelpay_core::{PayoutError, QualityBand, ReliabilityBand, Result};
use serde::{Deserialize, Serialize};

/// Which band table a lookup runs against
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandKind {
    /// Keyed on aggregate late minutes
    Reliability,
    /// Keyed on QC average
    Quality,
}

impl BandKind {
    /// Factor returned when no band qualifies
    pub fn below_floor_factor(&self) -> f64 {
        match self {
            Self::Reliability => DEFAULT_RELIABILITY_FACTOR,
            Self::Quality => DEFAULT_QUALITY_FACTOR,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Reliability => "reliability",
            Self::Quality => "quality",
        }
    }
}

/// Sorted band table
#[derive(Clone, Debug, PartialEq)]
pub struct BandTable {
    kind: BandKind,

    /// (threshold, factor), ascending by threshold, thresholds unique
    rows: Vec<(f64, f64)>,
}

impl BandTable {
    /// Build a table from raw (threshold, factor) rows in any order.
    ///
    /// Rejects non-finite thresholds, negative or non-finite factors and
    /// duplicate thresholds.
    pub fn new(kind: BandKind, rows: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let mut rows: Vec<(f64, f64)> = rows.into_iter().collect();

        for &(threshold, factor) in &rows {
            if !threshold.is_finite() {
                return Err(PayoutError::InvalidConfig(format!(
                    "{} band threshold {} is not finite",
                    kind.name(),
                    threshold
                )));
            }
            if !factor.is_finite() || factor < 0.0 {
                return Err(PayoutError::InvalidConfig(format!(
                    "{} band factor {} at threshold {} must be a non-negative number",
                    kind.name(),
                    factor,
                    threshold
                )));
            }
        }

        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        if let Some(pair) = rows.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(PayoutError::InvalidConfig(format!(
                "duplicate {} band threshold {}",
                kind.name(),
                pair[0].0
            )));
        }

        Ok(Self { kind, rows })
    }

    /// Build the reliability table
    pub fn reliability(bands: &[ReliabilityBand]) -> Result<Self> {
        Self::new(
            BandKind::Reliability,
            bands.iter().map(|b| (b.min_late_minutes, b.factor)),
        )
    }

    /// Build the quality table
    pub fn quality(bands: &[QualityBand]) -> Result<Self> {
        Self::new(BandKind::Quality, bands.iter().map(|b| (b.min_qc_avg, b.factor)))
    }

    /// Factor of the band with the largest threshold `<= value`.
    ///
    /// Falls back to the kind's below-floor factor when the probe is under
    /// every threshold, the table is empty, or the probe is NaN.
    pub fn lookup(&self, value: f64) -> f64 {
        let idx = self.rows.partition_point(|&(threshold, _)| threshold <= value);
        if idx == 0 {
            self.kind.below_floor_factor()
        } else {
            self.rows[idx - 1].1
        }
    }

    pub fn kind(&self) -> BandKind {
        self.kind
    }

    /// Rows ascending by threshold
    pub fn rows(&self) -> &[(f64, f64)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
