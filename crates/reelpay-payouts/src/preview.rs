//! # Payout Preview
//!
//! Min/max payout range shown on invitations and the team panel, before any
//! work exists to score. Lateness and QC are unknown at this point, so the
//! range uses fixed bounds instead of band lookups:
//!
//! | Case | Reliability | Quality |
//! |------|-------------|---------|
//! | Pessimistic | 0.85 | 0.95 |
//! | Optimistic | 1.00 | 1.05 |
//!
//! A preview is a pure function of the project and the editor.

use crate::constants::*;
use crate::engine::PayoutEngine;
use crate::rates::RateSource;
use crate::round_amount;
use reelpay_core::{Amount, Bonus, Editor, EditorId, Project, Result};
use serde::{Deserialize, Serialize};

/// Expected payout range for an editor on a project
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutPreview {
    pub billable_minutes: f64,
    pub tier_rate: f64,
    pub rate_source: RateSource,
    pub base: Amount,
    pub min_payout: Amount,
    pub max_payout: Amount,
    pub editor_cap: Amount,

    /// Bonus eligibility is not modelled yet; always empty
    pub eligible_bonuses: Vec<Bonus>,
}

impl PayoutEngine {
    /// Preview the payout range for `editor` on `project`
    pub fn preview(&self, project: &Project, editor: &Editor) -> Result<PayoutPreview> {
        Self::validate_inputs(project, editor)?;

        let rate = self.resolve_rate(editor);
        let base = project.billable_minutes * rate.rate_per_min;
        let editor_cap = project
            .editor_cap_amount
            .unwrap_or(base * DEFAULT_CAP_MULTIPLE);

        let min_gross = base * PREVIEW_MIN_RELIABILITY * PREVIEW_MIN_QUALITY;
        let max_gross = base * PREVIEW_MAX_RELIABILITY * PREVIEW_MAX_QUALITY;

        Ok(PayoutPreview {
            billable_minutes: project.billable_minutes,
            tier_rate: rate.rate_per_min,
            rate_source: rate.source,
            base: round_amount(base),
            min_payout: round_amount(min_gross.min(editor_cap)),
            max_payout: round_amount(max_gross.min(editor_cap)),
            editor_cap: round_amount(editor_cap),
            eligible_bonuses: Vec::new(),
        })
    }

    /// Preview every editor on a team panel, in the order given
    pub fn preview_team(
        &self,
        project: &Project,
        editors: &[Editor],
    ) -> Result<Vec<(EditorId, PayoutPreview)>> {
        editors
            .iter()
            .map(|editor| Ok((editor.id.clone(), self.preview(project, editor)?)))
            .collect()
    }
}
