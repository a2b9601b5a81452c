//! Core type definitions for ReelPay
//!
//! These mirror the documents held by the hosted database. Only the fields
//! the payout engine reads or writes are modelled; everything else on those
//! documents belongs to the dashboard screens.
//!
//! Field names serialize in camelCase so fixtures exported from the
//! database deserialize unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whole currency units. Every monetary figure leaving a calculator is
/// rounded into this type exactly once.
pub type Amount = u64;

macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

document_id!(
    /// Project document id
    ProjectId
);
document_id!(
    /// Editor (user) document id
    EditorId
);
document_id!(
    /// Milestone document id
    MilestoneId
);

/// Editor seniority classification, determines the default per-minute rate
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EditorTier {
    Junior,
    Standard,
    Senior,
    Elite,
}

impl EditorTier {
    pub const ALL: [EditorTier; 4] = [Self::Junior, Self::Standard, Self::Senior, Self::Elite];

    /// Get tier name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Junior => "JUNIOR",
            Self::Standard => "STANDARD",
            Self::Senior => "SENIOR",
            Self::Elite => "ELITE",
        }
    }
}

impl fmt::Display for EditorTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the admin-editable tier rate table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierRate {
    pub tier: EditorTier,

    /// Rate in currency units per billable minute
    #[serde(alias = "rate_per_min")]
    pub rate_per_min: f64,

    /// Whether editors of this tier may take rush orders
    #[serde(default, alias = "rush_eligible")]
    pub rush_eligible: bool,

    #[serde(default = "default_true", alias = "is_active")]
    pub is_active: bool,
}

/// Lateness band: applies `factor` once aggregate lateness reaches
/// `min_late_minutes`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityBand {
    #[serde(alias = "min_late_minutes")]
    pub min_late_minutes: f64,
    pub factor: f64,
}

/// Quality band: applies `factor` once the QC average (0-5) reaches
/// `min_qc_avg`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityBand {
    #[serde(alias = "min_qc_avg")]
    pub min_qc_avg: f64,
    pub factor: f64,
}

fn default_true() -> bool {
    true
}

/// Project lifecycle status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Draft,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

/// Project fields the payout engine reads
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,

    #[serde(default)]
    pub status: ProjectStatus,

    /// Contracted minutes of editing work
    pub billable_minutes: f64,

    /// Absolute ceiling on factored payout per assignment.
    /// Falls back to twice the base payout when unset.
    #[serde(default)]
    pub editor_cap_amount: Option<f64>,

    /// Budget that stacked bonuses may draw on. Unset means no bonuses.
    #[serde(default)]
    pub incentive_pool_remaining: Option<f64>,

    /// Set once payouts have been unlocked for the project
    #[serde(default)]
    pub payouts_unlocked_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_completed(&self) -> bool {
        self.status == ProjectStatus::Completed
    }
}

/// Editor fields the payout engine reads
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Editor {
    pub id: EditorId,

    #[serde(default)]
    pub name: String,

    /// Explicit per-minute rate; wins over the tier table when positive
    #[serde(default)]
    pub tier_rate_per_min: Option<f64>,

    #[serde(default)]
    pub tier: Option<EditorTier>,

    #[serde(default)]
    pub wallet_balance: f64,
}

impl Editor {
    /// Positive explicit override, if any
    pub fn rate_override(&self) -> Option<f64> {
        self.tier_rate_per_min.filter(|rate| *rate > 0.0)
    }

    /// Whether anything on the editor record can yield a rate.
    ///
    /// The rate resolver always falls back to a default, so this is the
    /// only way to tell a fully unconfigured editor apart.
    pub fn has_rate_source(&self) -> bool {
        self.rate_override().is_some() || self.tier.is_some()
    }
}

/// Milestone review status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneStatus {
    #[default]
    Pending,
    InProgress,
    Submitted,
    Approved,
    Rejected,
}

/// Milestone fields the payout engine reads
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: MilestoneId,
    pub project_id: ProjectId,

    #[serde(default)]
    pub assigned_editor_id: Option<EditorId>,

    #[serde(default)]
    pub status: MilestoneStatus,

    /// QC score average on a 0-5 scale; unscored milestones leave it unset
    #[serde(default)]
    pub qc_average: Option<f64>,

    #[serde(default)]
    pub late_minutes: Option<f64>,
}

impl Milestone {
    /// Approved and assigned: the only milestones that settle
    pub fn is_settleable(&self) -> bool {
        self.status == MilestoneStatus::Approved && self.assigned_editor_id.is_some()
    }
}

/// Bonus offered on top of the capped payout
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bonus {
    pub code: String,
    pub amount: f64,
}

impl Bonus {
    pub fn new(code: impl Into<String>, amount: f64) -> Self {
        Self {
            code: code.into(),
            amount,
        }
    }
}

/// Settlement record lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    /// Computed and persisted, wallet not yet credited
    #[default]
    Pending,
    /// Wallet credited; terminal
    Unlocked,
}

/// Settlement ledger row, one per (project, editor)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorPayoutRecord {
    pub project_id: ProjectId,
    pub editor_id: EditorId,

    pub billable_minutes: f64,
    pub tier_rate: f64,
    pub reliability_factor: f64,
    pub quality_factor: f64,

    pub base_payout: Amount,
    pub after_factors: Amount,
    pub capped_payout: Amount,
    pub bonus_amount: Amount,
    pub final_payout: Amount,

    pub qc_average: f64,
    pub late_minutes: f64,

    pub status: PayoutStatus,
    pub unlocked_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EditorPayoutRecord {
    pub fn key(&self) -> (ProjectId, EditorId) {
        (self.project_id.clone(), self.editor_id.clone())
    }

    /// Whether two records carry the same computed breakdown, ignoring
    /// lifecycle and timestamps
    pub fn same_breakdown(&self, other: &Self) -> bool {
        self.billable_minutes == other.billable_minutes
            && self.tier_rate == other.tier_rate
            && self.reliability_factor == other.reliability_factor
            && self.quality_factor == other.quality_factor
            && self.base_payout == other.base_payout
            && self.after_factors == other.after_factors
            && self.capped_payout == other.capped_payout
            && self.bonus_amount == other.bonus_amount
            && self.final_payout == other.final_payout
            && self.qc_average == other.qc_average
            && self.late_minutes == other.late_minutes
    }
}
