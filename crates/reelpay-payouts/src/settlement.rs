//! # Final Settlement
//!
//! Definitive payout for one editor on a completed project, given the
//! editor's aggregate QC average and lateness.
//!
//! Multiplication order is fixed (base, reliability, quality, cap, bonus) so
//! identical inputs always round to identical outputs.
//!
//! Bonuses are admitted first-fit in the order given: a bonus that would
//! push the running total past the incentive pool is dropped and the next
//! one is tried. There is no repacking to squeeze more bonuses in.

use crate::constants::DEFAULT_CAP_MULTIPLE;
use crate::engine::PayoutEngine;
use crate::rates::RateSource;
use crate::round_amount;
use reelpay_core::{Amount, Bonus, Editor, PayoutError, Project, Result};
use serde::{Deserialize, Serialize};

/// Full settlement breakdown
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementBreakdown {
    pub billable_minutes: f64,
    pub tier_rate: f64,
    pub rate_source: RateSource,

    pub qc_average: f64,
    pub late_minutes: f64,
    pub reliability_factor: f64,
    pub quality_factor: f64,

    /// minutes × rate
    pub base_payout: Amount,

    /// base × reliability × quality
    pub after_factors: Amount,

    pub editor_cap: Amount,

    /// min(after_factors, editor_cap)
    pub capped_payout: Amount,

    pub bonus_amount: Amount,
    pub bonuses_applied: Vec<Bonus>,

    /// capped_payout + bonus_amount
    pub final_payout: Amount,
}

impl PayoutEngine {
    /// Settle `editor`'s payout on `project`.
    ///
    /// `qc_average` and `late_minutes` are already aggregated by the caller.
    pub fn settle(
        &self,
        project: &Project,
        editor: &Editor,
        qc_average: f64,
        late_minutes: f64,
        bonuses: &[Bonus],
    ) -> Result<SettlementBreakdown> {
        Self::validate_inputs(project, editor)?;
        PayoutError::check_non_negative("qc_average", qc_average)?;
        PayoutError::check_non_negative("late_minutes", late_minutes)?;
        for bonus in bonuses {
            PayoutError::check_non_negative("bonus.amount", bonus.amount)?;
        }

        let card = self.rate_card();
        let rate = self.resolve_rate(editor);
        let base = project.billable_minutes * rate.rate_per_min;

        let reliability_factor = card.reliability.lookup(late_minutes);
        let quality_factor = card.quality.lookup(qc_average);
        let after_factors = base * reliability_factor * quality_factor;

        let editor_cap = project
            .editor_cap_amount
            .unwrap_or(base * DEFAULT_CAP_MULTIPLE);
        let capped = after_factors.min(editor_cap);

        let pool = project.incentive_pool_remaining.unwrap_or(0.0);
        let (bonus_total, bonuses_applied) = admit_bonuses(bonuses, pool);

        tracing::debug!(
            project = %project.id,
            editor = %editor.id,
            rate = rate.rate_per_min,
            reliability_factor,
            quality_factor,
            bonuses = bonuses_applied.len(),
            "Settled payout"
        );

        // final_payout is the sum of the rounded parts
        let capped_payout = round_amount(capped);
        let bonus_amount = round_amount(bonus_total);

        Ok(SettlementBreakdown {
            billable_minutes: project.billable_minutes,
            tier_rate: rate.rate_per_min,
            rate_source: rate.source,
            qc_average,
            late_minutes,
            reliability_factor,
            quality_factor,
            base_payout: round_amount(base),
            after_factors: round_amount(after_factors),
            editor_cap: round_amount(editor_cap),
            capped_payout,
            bonus_amount,
            bonuses_applied,
            final_payout: capped_payout + bonus_amount,
        })
    }
}

/// First-fit, in-order bonus admission against the pool
fn admit_bonuses(bonuses: &[Bonus], pool: f64) -> (f64, Vec<Bonus>) {
    let mut total = 0.0;
    let mut applied = Vec::new();

    for bonus in bonuses {
        if total + bonus.amount <= pool {
            total += bonus.amount;
            applied.push(bonus.clone());
        }
    }

    (total, applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayoutConfig;
    use proptest::prelude::*;
    use reelpay_core::{EditorId, EditorTier, ProjectId, ProjectStatus};

    fn engine() -> PayoutEngine {
        PayoutEngine::from_config(&PayoutConfig::default()).unwrap()
    }

    fn project(cap: Option<f64>, pool: Option<f64>) -> Project {
        Project {
            id: ProjectId::new("p1"),
            status: ProjectStatus::Completed,
            billable_minutes: 10.0,
            editor_cap_amount: cap,
            incentive_pool_remaining: pool,
            payouts_unlocked_at: None,
        }
    }

    fn standard_editor() -> Editor {
        Editor {
            id: EditorId::new("e1"),
            name: "Standard".into(),
            tier_rate_per_min: None,
            tier: Some(EditorTier::Standard),
            wallet_balance: 0.0,
        }
    }

    #[test]
    fn test_on_time_good_quality() {
        let b = engine()
            .settle(&project(None, None), &standard_editor(), 4.6, 30.0, &[])
            .unwrap();

        assert_eq!(b.reliability_factor, 1.00);
        assert_eq!(b.quality_factor, 1.00);
        assert_eq!(b.base_payout, 5000);
        assert_eq!(b.after_factors, 5000);
        assert_eq!(b.editor_cap, 10_000);
        assert_eq!(b.capped_payout, 5000);
        assert_eq!(b.bonus_amount, 0);
        assert_eq!(b.final_payout, 5000);
    }

    #[test]
    fn test_late_delivery_penalized() {
        let b = engine()
            .settle(&project(None, None), &standard_editor(), 4.6, 200.0, &[])
            .unwrap();

        assert_eq!(b.reliability_factor, 0.85);
        assert_eq!(b.after_factors, 4250);
        assert_eq!(b.final_payout, 4250);
    }

    #[test]
    fn test_high_quality_exceeds_base() {
        let b = engine()
            .settle(&project(None, None), &standard_editor(), 4.9, 0.0, &[])
            .unwrap();

        assert_eq!(b.quality_factor, 1.05);
        assert_eq!(b.after_factors, 5250);
        assert_eq!(b.final_payout, 5250);
    }

    #[test]
    fn test_cap_then_bonus() {
        let bonuses = vec![Bonus::new("RUSH", 500.0)];
        let b = engine()
            .settle(
                &project(Some(4000.0), Some(1000.0)),
                &standard_editor(),
                4.9,
                0.0,
                &bonuses,
            )
            .unwrap();

        assert_eq!(b.after_factors, 5250);
        assert_eq!(b.capped_payout, 4000);
        assert_eq!(b.bonus_amount, 500);
        assert_eq!(b.bonuses_applied, bonuses);
        assert_eq!(b.final_payout, 4500);
    }

    #[test]
    fn test_no_pool_no_bonus() {
        let b = engine()
            .settle(
                &project(None, None),
                &standard_editor(),
                4.6,
                0.0,
                &[Bonus::new("RUSH", 500.0)],
            )
            .unwrap();

        assert_eq!(b.bonus_amount, 0);
        assert!(b.bonuses_applied.is_empty());
    }

    #[test]
    fn test_first_fit_in_order() {
        let bonuses = vec![
            Bonus::new("A", 600.0),
            Bonus::new("B", 500.0),
            Bonus::new("C", 400.0),
        ];
        let b = engine()
            .settle(&project(None, Some(1000.0)), &standard_editor(), 4.6, 0.0, &bonuses)
            .unwrap();

        // B is dropped (1100 > 1000), C still fits; no repacking into B + C
        let codes: Vec<&str> = b.bonuses_applied.iter().map(|x| x.code.as_str()).collect();
        assert_eq!(codes, vec!["A", "C"]);
        assert_eq!(b.bonus_amount, 1000);
        assert_eq!(b.final_payout, 6000);
    }

    #[test]
    fn test_zero_minutes_still_gets_bonus() {
        let mut p = project(None, Some(300.0));
        p.billable_minutes = 0.0;
        let b = engine()
            .settle(&p, &standard_editor(), 4.6, 0.0, &[Bonus::new("REFERRAL", 250.0)])
            .unwrap();

        assert_eq!(b.base_payout, 0);
        assert_eq!(b.capped_payout, 0);
        assert_eq!(b.final_payout, 250);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let e = standard_editor();
        let p = project(None, None);
        assert!(engine().settle(&p, &e, -0.1, 0.0, &[]).is_err());
        assert!(engine().settle(&p, &e, 4.0, f64::NAN, &[]).is_err());
        assert!(engine()
            .settle(&p, &e, 4.0, 0.0, &[Bonus::new("NEG", -10.0)])
            .is_err());
    }

    #[test]
    fn test_final_is_sum_of_rounded_parts() {
        let mut p = project(None, Some(1.0));
        p.billable_minutes = 1.0;
        let mut e = standard_editor();
        e.tier_rate_per_min = Some(100.45);

        let b = engine()
            .settle(&p, &e, 4.6, 0.0, &[Bonus::new("X", 0.45)])
            .unwrap();

        // 100.45 + 0.45 would round to 101 as one sum
        assert_eq!(b.capped_payout, 100);
        assert_eq!(b.bonus_amount, 0);
        assert_eq!(b.final_payout, 100);
        assert_eq!(b.final_payout, b.capped_payout + b.bonus_amount);
    }

    #[test]
    fn test_repeatable_output() {
        let engine = engine();
        let mut e = standard_editor();
        e.tier_rate_per_min = Some(437.77);
        let p = project(None, Some(120.0));
        let bonuses = vec![Bonus::new("X", 33.3), Bonus::new("Y", 99.9)];

        let first = engine.settle(&p, &e, 4.73, 61.5, &bonuses).unwrap();
        for _ in 0..10 {
            assert_eq!(engine.settle(&p, &e, 4.73, 61.5, &bonuses).unwrap(), first);
        }
    }

    proptest! {
        #[test]
        fn capped_never_exceeds_cap(
            minutes in 0.0f64..600.0,
            rate in 1.0f64..2000.0,
            cap in proptest::option::of(0.0f64..500_000.0),
            pool in proptest::option::of(0.0f64..5_000.0),
            qc in 0.0f64..5.0,
            late in 0.0f64..20_000.0,
            amounts in proptest::collection::vec(0.0f64..2_000.0, 0..6),
        ) {
            let mut p = project(cap, pool);
            p.billable_minutes = minutes;
            let mut e = standard_editor();
            e.tier_rate_per_min = Some(rate);
            let bonuses: Vec<Bonus> = amounts.iter().map(|a| Bonus::new("B", *a)).collect();

            let b = engine().settle(&p, &e, qc, late, &bonuses).unwrap();
            let pool = pool.unwrap_or(0.0);

            prop_assert!(b.capped_payout <= b.editor_cap);
            prop_assert!(b.bonus_amount <= round_amount(pool));
            prop_assert_eq!(b.final_payout, b.capped_payout + b.bonus_amount);
            let cap_raw = cap.unwrap_or(minutes * rate * DEFAULT_CAP_MULTIPLE);
            prop_assert!(b.final_payout <= round_amount(cap_raw) + round_amount(pool));
        }

        #[test]
        fn preview_brackets_normal_settlement(
            minutes in 0.0f64..600.0,
            qc in 4.0f64..5.0,
            late in 0.0f64..179.0,
        ) {
            let engine = engine();
            let mut p = project(None, None);
            p.billable_minutes = minutes;
            let e = standard_editor();

            let preview = engine.preview(&p, &e).unwrap();
            let settled = engine.settle(&p, &e, qc, late, &[]).unwrap();

            prop_assert!(preview.min_payout <= settled.final_payout);
            prop_assert!(settled.final_payout <= preview.max_payout);
        }
    }
}
