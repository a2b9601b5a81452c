//! Project payout report for the finance screen

use reelpay_core::{Amount, EditorPayoutRecord, PayoutStatus, ProjectId};
use serde::{Deserialize, Serialize};

/// Totals across a project's settlement records
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayoutReport {
    pub project_id: ProjectId,
    pub editors: usize,
    pub unlocked: usize,
    pub pending: usize,
    pub total_base: Amount,
    pub total_after_factors: Amount,
    pub total_capped: Amount,
    pub total_bonus: Amount,
    pub total_final: Amount,

    /// Final payouts already credited to wallets
    pub total_credited: Amount,

    /// What the cap and factors removed relative to base, summed
    pub total_withheld: Amount,
}

impl ProjectPayoutReport {
    pub fn from_records(project_id: ProjectId, records: &[EditorPayoutRecord]) -> Self {
        let mut report = Self {
            project_id,
            ..Default::default()
        };

        for record in records {
            report.editors += 1;
            match record.status {
                PayoutStatus::Unlocked => {
                    report.unlocked += 1;
                    report.total_credited += record.final_payout;
                }
                PayoutStatus::Pending => report.pending += 1,
            }
            report.total_base += record.base_payout;
            report.total_after_factors += record.after_factors;
            report.total_capped += record.capped_payout;
            report.total_bonus += record.bonus_amount;
            report.total_final += record.final_payout;
            report.total_withheld += record.base_payout.saturating_sub(record.capped_payout);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reelpay_core::EditorId;

    fn record(
        editor: &str,
        base: Amount,
        capped: Amount,
        bonus: Amount,
        status: PayoutStatus,
    ) -> EditorPayoutRecord {
        let now = Utc::now();
        EditorPayoutRecord {
            project_id: ProjectId::new("p1"),
            editor_id: EditorId::new(editor),
            billable_minutes: 10.0,
            tier_rate: 500.0,
            reliability_factor: 1.0,
            quality_factor: 1.0,
            base_payout: base,
            after_factors: capped,
            capped_payout: capped,
            bonus_amount: bonus,
            final_payout: capped + bonus,
            qc_average: 4.5,
            late_minutes: 0.0,
            status,
            unlocked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_totals() {
        let records = vec![
            record("a", 5000, 4250, 0, PayoutStatus::Unlocked),
            record("b", 3500, 3675, 200, PayoutStatus::Pending),
        ];
        let report = ProjectPayoutReport::from_records(ProjectId::new("p1"), &records);

        assert_eq!(report.editors, 2);
        assert_eq!(report.unlocked, 1);
        assert_eq!(report.pending, 1);
        assert_eq!(report.total_base, 8500);
        assert_eq!(report.total_final, 4250 + 3875);
        assert_eq!(report.total_credited, 4250);
        // Quality above 1.0 is not negative withholding
        assert_eq!(report.total_withheld, 750);
    }

    #[test]
    fn test_empty_project() {
        let report = ProjectPayoutReport::from_records(ProjectId::new("p9"), &[]);
        assert_eq!(report.editors, 0);
        assert_eq!(report.total_final, 0);
    }
}
