//! # Payout Unlock
//!
//! Finalizes a completed project's payouts: settles every editor with
//! approved work, persists one ledger record per editor and credits each
//! wallet exactly once.
//!
//! ## Project states
//!
//! ```text
//!   NOT_COMPLETED ──(status = COMPLETED)──► UNLOCK_PENDING ──(stamp)──► UNLOCKED
//! ```
//!
//! ## Exactly-once crediting
//!
//! The project stamp (`payouts_unlocked_at`) is written last, so a run that
//! dies half way is simply run again. Re-running is safe because:
//!
//! - records are upserted by (project, editor), same inputs give same rows;
//! - the wallet credit is gated on the record's `Pending -> Unlocked`
//!   transition, which the ledger performs atomically with the credit and
//!   only once per record.
//!
//! Unlocks of the same project are serialized by an in-process lock; a
//! second caller gets `UnlockOutcome::InProgress` instead of waiting.

use crate::engine::PayoutEngine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reelpay_core::{
    Amount, EditorDirectory, EditorId, EditorPayoutRecord, Milestone, Notifier, PayoutError,
    PayoutLedger, PayoutNotification, PayoutStatus, Project, ProjectId, ProjectStatus,
    ProjectStore, Result, UpsertOutcome,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// One editor's approved work on a project, aggregated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorAggregate {
    /// Approved milestones assigned to the editor
    pub milestone_count: usize,

    /// How many of those carried a QC average
    pub scored_count: usize,

    /// Mean over scored milestones, or the neutral default when none
    pub qc_average: f64,

    /// Sum over all milestones; unset counts as zero
    pub late_minutes: f64,
}

/// Group approved, assigned milestones by editor.
///
/// Unscored milestones are left out of the QC mean rather than counted as
/// zero. An editor with no scored milestone gets `neutral_qc_average`.
pub fn aggregate_milestones(
    milestones: &[Milestone],
    neutral_qc_average: f64,
) -> BTreeMap<EditorId, EditorAggregate> {
    let mut sums: BTreeMap<EditorId, (usize, usize, f64, f64)> = BTreeMap::new();

    for milestone in milestones.iter().filter(|m| m.is_settleable()) {
        let Some(editor_id) = milestone.assigned_editor_id.clone() else {
            continue;
        };
        let entry = sums.entry(editor_id).or_insert((0, 0, 0.0, 0.0));
        entry.0 += 1;
        if let Some(qc) = milestone.qc_average {
            entry.1 += 1;
            entry.2 += qc;
        }
        entry.3 += milestone.late_minutes.unwrap_or(0.0);
    }

    sums.into_iter()
        .map(|(editor_id, (count, scored, qc_sum, late))| {
            let qc_average = if scored > 0 {
                qc_sum / scored as f64
            } else {
                neutral_qc_average
            };
            (
                editor_id,
                EditorAggregate {
                    milestone_count: count,
                    scored_count: scored,
                    qc_average,
                    late_minutes: late,
                },
            )
        })
        .collect()
}

/// Why an editor was left out of an unlock
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Milestones reference an editor the directory does not know
    EditorNotFound,
    /// Neither a tier nor a positive rate override; cannot settle without a rate
    NoRateSource,
    /// Aggregated milestone data rejected by the calculator
    InvalidData(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEditor {
    pub editor_id: EditorId,
    pub reason: SkipReason,
}

/// Result of settling one editor during an unlock
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSettlement {
    pub editor_id: EditorId,
    pub milestones: usize,
    pub final_payout: Amount,
    pub record: UpsertOutcome,

    /// The record moved to `Unlocked` during this run
    pub newly_unlocked: bool,

    /// Amount credited to the wallet during this run
    pub credited: Amount,
}

/// Per-project unlock summary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockSummary {
    pub project_id: ProjectId,
    pub unlocked_at: DateTime<Utc>,
    pub settled: Vec<EditorSettlement>,
    pub skipped: Vec<SkippedEditor>,
    pub total_credited: Amount,
}

/// Outcome of an unlock attempt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnlockOutcome {
    /// Project not completed yet; nothing written
    NotReady { status: ProjectStatus },
    /// Payouts were unlocked earlier; nothing recomputed or credited
    AlreadyUnlocked { unlocked_at: DateTime<Utc> },
    /// Another unlock of this project is running
    InProgress,
    /// Payouts settled and stamped by this call
    Unlocked(UnlockSummary),
}

enum EditorOutcome {
    Settled(EditorSettlement),
    Skipped(SkippedEditor),
}

/// Releases the project's unlock slot on drop
struct UnlockGuard<'a> {
    in_flight: &'a Mutex<HashSet<ProjectId>>,
    project_id: ProjectId,
}

impl Drop for UnlockGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.project_id);
    }
}

/// Unlock orchestrator
pub struct UnlockOrchestrator<S> {
    engine: Arc<PayoutEngine>,
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    in_flight: Mutex<HashSet<ProjectId>>,
}

impl<S> UnlockOrchestrator<S>
where
    S: ProjectStore + EditorDirectory + PayoutLedger,
{
    pub fn new(engine: Arc<PayoutEngine>, store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            engine,
            store,
            notifier,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Unlock payouts for a project
    pub fn unlock(&self, project_id: &ProjectId, now: DateTime<Utc>) -> Result<UnlockOutcome> {
        let project = self.load_project(project_id)?;
        if let Some(outcome) = Self::precheck(&project) {
            return Ok(outcome);
        }

        let Some(_guard) = self.try_begin(project_id) else {
            tracing::info!(project = %project_id, "Unlock already running");
            return Ok(UnlockOutcome::InProgress);
        };

        // The stamp may have landed between the first read and the lock
        let project = self.load_project(project_id)?;
        if let Some(outcome) = Self::precheck(&project) {
            return Ok(outcome);
        }

        let milestones = self.store.milestones(project_id)?;
        let groups =
            aggregate_milestones(&milestones, self.engine.rate_card().neutral_qc_average);

        tracing::info!(
            project = %project_id,
            milestones = milestones.len(),
            editors = groups.len(),
            "Unlocking payouts"
        );

        let mut summary = UnlockSummary {
            project_id: project_id.clone(),
            unlocked_at: now,
            settled: Vec::new(),
            skipped: Vec::new(),
            total_credited: 0,
        };

        for (editor_id, aggregate) in &groups {
            match self.settle_editor(&project, editor_id, aggregate, now)? {
                EditorOutcome::Settled(settlement) => {
                    summary.total_credited += settlement.credited;
                    summary.settled.push(settlement);
                }
                EditorOutcome::Skipped(skipped) => summary.skipped.push(skipped),
            }
        }

        self.store.stamp_payouts_unlocked(project_id, now)?;

        tracing::info!(
            project = %project_id,
            settled = summary.settled.len(),
            skipped = summary.skipped.len(),
            total_credited = summary.total_credited,
            "Payouts unlocked"
        );

        Ok(UnlockOutcome::Unlocked(summary))
    }

    fn load_project(&self, project_id: &ProjectId) -> Result<Project> {
        self.store
            .project(project_id)?
            .ok_or_else(|| PayoutError::ProjectNotFound(project_id.clone()))
    }

    fn precheck(project: &Project) -> Option<UnlockOutcome> {
        if !project.is_completed() {
            return Some(UnlockOutcome::NotReady {
                status: project.status,
            });
        }
        project
            .payouts_unlocked_at
            .map(|unlocked_at| UnlockOutcome::AlreadyUnlocked { unlocked_at })
    }

    fn try_begin(&self, project_id: &ProjectId) -> Option<UnlockGuard<'_>> {
        if !self.in_flight.lock().insert(project_id.clone()) {
            return None;
        }
        Some(UnlockGuard {
            in_flight: &self.in_flight,
            project_id: project_id.clone(),
        })
    }

    fn settle_editor(
        &self,
        project: &Project,
        editor_id: &EditorId,
        aggregate: &EditorAggregate,
        now: DateTime<Utc>,
    ) -> Result<EditorOutcome> {
        let skip = |reason: SkipReason| {
            Ok(EditorOutcome::Skipped(SkippedEditor {
                editor_id: editor_id.clone(),
                reason,
            }))
        };

        let Some(editor) = self.store.editor(editor_id)? else {
            tracing::warn!(
                project = %project.id,
                editor = %editor_id,
                "Editor not found, payout skipped"
            );
            return skip(SkipReason::EditorNotFound);
        };

        if !editor.has_rate_source() {
            tracing::warn!(
                project = %project.id,
                editor = %editor_id,
                "Editor has no tier or rate override; cannot settle without a rate"
            );
            return skip(SkipReason::NoRateSource);
        }

        let breakdown = match self.engine.settle(
            project,
            &editor,
            aggregate.qc_average,
            aggregate.late_minutes,
            &[],
        ) {
            Ok(breakdown) => breakdown,
            Err(err @ PayoutError::InvalidInput { .. }) => {
                tracing::warn!(
                    project = %project.id,
                    editor = %editor_id,
                    error = %err,
                    "Payout skipped"
                );
                return skip(SkipReason::InvalidData(err.to_string()));
            }
            Err(err) => return Err(err),
        };

        let record = EditorPayoutRecord {
            project_id: project.id.clone(),
            editor_id: editor_id.clone(),
            billable_minutes: breakdown.billable_minutes,
            tier_rate: breakdown.tier_rate,
            reliability_factor: breakdown.reliability_factor,
            quality_factor: breakdown.quality_factor,
            base_payout: breakdown.base_payout,
            after_factors: breakdown.after_factors,
            capped_payout: breakdown.capped_payout,
            bonus_amount: breakdown.bonus_amount,
            final_payout: breakdown.final_payout,
            qc_average: breakdown.qc_average,
            late_minutes: breakdown.late_minutes,
            status: PayoutStatus::Pending,
            unlocked_at: None,
            created_at: now,
            updated_at: now,
        };
        let upsert = self.store.upsert_payout_record(record)?;

        if upsert == UpsertOutcome::Frozen {
            // Paid on an earlier run; report the stored amount, not today's inputs
            let paid = self
                .store
                .payout_record(&project.id, editor_id)?
                .ok_or_else(|| PayoutError::RecordNotFound {
                    project: project.id.clone(),
                    editor: editor_id.clone(),
                })?;
            if paid.final_payout != breakdown.final_payout {
                tracing::warn!(
                    project = %project.id,
                    editor = %editor_id,
                    paid = paid.final_payout,
                    recomputed = breakdown.final_payout,
                    "Inputs changed after payout; keeping the paid record"
                );
            }
            return Ok(EditorOutcome::Settled(EditorSettlement {
                editor_id: editor_id.clone(),
                milestones: aggregate.milestone_count,
                final_payout: paid.final_payout,
                record: upsert,
                newly_unlocked: false,
                credited: 0,
            }));
        }

        let newly_unlocked =
            self.store
                .unlock_and_credit(&project.id, editor_id, breakdown.final_payout, now)?;
        let credited = if newly_unlocked {
            breakdown.final_payout
        } else {
            tracing::debug!(
                project = %project.id,
                editor = %editor_id,
                "Record already unlocked, wallet untouched"
            );
            0
        };

        if credited > 0 {
            let notification = PayoutNotification {
                project_id: project.id.clone(),
                editor_id: editor_id.clone(),
                amount: credited,
                unlocked_at: now,
            };
            if let Err(err) = self.notifier.payout_unlocked(&notification) {
                tracing::warn!(editor = %editor_id, error = %err, "Payout notification failed");
            }
        }

        Ok(EditorOutcome::Settled(EditorSettlement {
            editor_id: editor_id.clone(),
            milestones: aggregate.milestone_count,
            final_payout: breakdown.final_payout,
            record: upsert,
            newly_unlocked,
            credited,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayoutConfig;
    use crate::notify::RecordingNotifier;
    use chrono::TimeZone;
    use reelpay_core::{Editor, EditorTier, MilestoneId, MilestoneStatus};
    use reelpay_storage::MemoryStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn milestone(
        id: &str,
        editor: Option<&str>,
        status: MilestoneStatus,
        qc: Option<f64>,
        late: Option<f64>,
    ) -> Milestone {
        Milestone {
            id: MilestoneId::new(id),
            project_id: ProjectId::new("p1"),
            assigned_editor_id: editor.map(EditorId::new),
            status,
            qc_average: qc,
            late_minutes: late,
        }
    }

    fn editor(id: &str, tier: Option<EditorTier>) -> Editor {
        Editor {
            id: EditorId::new(id),
            name: id.to_uppercase(),
            tier_rate_per_min: None,
            tier,
            wallet_balance: 0.0,
        }
    }

    fn setup(
        status: ProjectStatus,
    ) -> (
        Arc<MemoryStore>,
        Arc<RecordingNotifier>,
        UnlockOrchestrator<MemoryStore>,
    ) {
        let store = Arc::new(MemoryStore::new());
        store.insert_project(Project {
            id: ProjectId::new("p1"),
            status,
            billable_minutes: 10.0,
            editor_cap_amount: None,
            incentive_pool_remaining: None,
            payouts_unlocked_at: None,
        });
        store.insert_editor(editor("alice", Some(EditorTier::Standard)));
        store.insert_milestone(milestone(
            "m1",
            Some("alice"),
            MilestoneStatus::Approved,
            Some(4.4),
            Some(20.0),
        ));
        store.insert_milestone(milestone(
            "m2",
            Some("alice"),
            MilestoneStatus::Approved,
            Some(4.8),
            Some(10.0),
        ));

        let engine = Arc::new(PayoutEngine::from_config(&PayoutConfig::default()).unwrap());
        let notifier = Arc::new(RecordingNotifier::new());
        let orchestrator = UnlockOrchestrator::new(engine, store.clone(), notifier.clone());
        (store, notifier, orchestrator)
    }

    #[test]
    fn test_aggregate_excludes_unscored_and_unapproved() {
        let milestones = vec![
            milestone("m1", Some("a"), MilestoneStatus::Approved, Some(4.0), Some(15.0)),
            milestone("m2", Some("a"), MilestoneStatus::Approved, None, None),
            milestone("m3", Some("a"), MilestoneStatus::Submitted, Some(1.0), Some(500.0)),
            milestone("m4", None, MilestoneStatus::Approved, Some(1.0), Some(500.0)),
            milestone("m5", Some("b"), MilestoneStatus::Approved, None, Some(5.0)),
        ];
        let groups = aggregate_milestones(&milestones, 4.5);

        assert_eq!(groups.len(), 2);
        let a = &groups[&EditorId::new("a")];
        assert_eq!(a.milestone_count, 2);
        assert_eq!(a.scored_count, 1);
        assert_eq!(a.qc_average, 4.0);
        assert_eq!(a.late_minutes, 15.0);

        let b = &groups[&EditorId::new("b")];
        assert_eq!(b.qc_average, 4.5);
        assert_eq!(b.late_minutes, 5.0);
    }

    #[test]
    fn test_not_ready_writes_nothing() {
        let (store, notifier, orchestrator) = setup(ProjectStatus::Active);

        let outcome = orchestrator.unlock(&ProjectId::new("p1"), now()).unwrap();

        assert_eq!(
            outcome,
            UnlockOutcome::NotReady {
                status: ProjectStatus::Active
            }
        );
        assert!(store.records_for_project(&ProjectId::new("p1")).unwrap().is_empty());
        assert!(store.wallet_credits().is_empty());
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_unknown_project() {
        let (_, _, orchestrator) = setup(ProjectStatus::Completed);
        let result = orchestrator.unlock(&ProjectId::new("nope"), now());
        assert!(matches!(result, Err(PayoutError::ProjectNotFound(_))));
    }

    #[test]
    fn test_unlock_settles_and_credits() {
        let (store, notifier, orchestrator) = setup(ProjectStatus::Completed);

        let outcome = orchestrator.unlock(&ProjectId::new("p1"), now()).unwrap();
        let UnlockOutcome::Unlocked(summary) = outcome else {
            panic!("expected unlock");
        };

        // qc mean 4.6 -> 1.00, late 30 -> 1.00
        assert_eq!(summary.settled.len(), 1);
        assert_eq!(summary.settled[0].final_payout, 5000);
        assert_eq!(summary.settled[0].record, UpsertOutcome::Created);
        assert_eq!(summary.total_credited, 5000);

        let alice = store.editor(&EditorId::new("alice")).unwrap().unwrap();
        assert_eq!(alice.wallet_balance, 5000.0);
        assert_eq!(notifier.len(), 1);

        let record = store
            .payout_record(&ProjectId::new("p1"), &EditorId::new("alice"))
            .unwrap()
            .unwrap();
        assert_eq!(record.status, PayoutStatus::Unlocked);
        assert_eq!(record.unlocked_at, Some(now()));

        let project = store.project(&ProjectId::new("p1")).unwrap().unwrap();
        assert_eq!(project.payouts_unlocked_at, Some(now()));
    }

    #[test]
    fn test_second_unlock_is_noop() {
        let (store, notifier, orchestrator) = setup(ProjectStatus::Completed);
        let id = ProjectId::new("p1");

        orchestrator.unlock(&id, now()).unwrap();
        let record_before = store.payout_record(&id, &EditorId::new("alice")).unwrap();

        let later = now() + chrono::Duration::hours(1);
        let outcome = orchestrator.unlock(&id, later).unwrap();

        assert_eq!(outcome, UnlockOutcome::AlreadyUnlocked { unlocked_at: now() });
        assert_eq!(store.wallet_credits().len(), 1);
        assert_eq!(notifier.len(), 1);
        assert_eq!(store.payout_record(&id, &EditorId::new("alice")).unwrap(), record_before);
    }

    #[test]
    fn test_replay_after_lost_stamp_credits_once() {
        let (store, notifier, orchestrator) = setup(ProjectStatus::Completed);
        let id = ProjectId::new("p1");

        orchestrator.unlock(&id, now()).unwrap();

        // Simulate a crash that lost the project stamp
        let mut project = store.project(&id).unwrap().unwrap();
        project.payouts_unlocked_at = None;
        store.insert_project(project);

        let later = now() + chrono::Duration::minutes(5);
        let UnlockOutcome::Unlocked(summary) = orchestrator.unlock(&id, later).unwrap() else {
            panic!("expected a second full run");
        };

        assert_eq!(summary.settled[0].record, UpsertOutcome::Frozen);
        assert_eq!(summary.settled[0].final_payout, 5000);
        assert!(!summary.settled[0].newly_unlocked);
        assert_eq!(summary.total_credited, 0);
        assert_eq!(store.wallet_credits().len(), 1);
        assert_eq!(notifier.len(), 1);

        let alice = store.editor(&EditorId::new("alice")).unwrap().unwrap();
        assert_eq!(alice.wallet_balance, 5000.0);

        let record = store.payout_record(&id, &EditorId::new("alice")).unwrap().unwrap();
        assert_eq!(record.unlocked_at, Some(now()));
        assert_eq!(record.created_at, now());
        assert_eq!(record.updated_at, now());
    }

    #[test]
    fn test_unconfigured_editor_skipped_others_paid() {
        let (store, _, orchestrator) = setup(ProjectStatus::Completed);
        store.insert_editor(editor("bob", None));
        store.insert_milestone(milestone(
            "m3",
            Some("bob"),
            MilestoneStatus::Approved,
            Some(5.0),
            None,
        ));
        store.insert_milestone(milestone(
            "m4",
            Some("ghost"),
            MilestoneStatus::Approved,
            None,
            None,
        ));

        let UnlockOutcome::Unlocked(summary) =
            orchestrator.unlock(&ProjectId::new("p1"), now()).unwrap()
        else {
            panic!("expected unlock");
        };

        assert_eq!(summary.settled.len(), 1);
        assert_eq!(summary.settled[0].editor_id, EditorId::new("alice"));
        assert_eq!(
            summary.skipped,
            vec![
                SkippedEditor {
                    editor_id: EditorId::new("bob"),
                    reason: SkipReason::NoRateSource,
                },
                SkippedEditor {
                    editor_id: EditorId::new("ghost"),
                    reason: SkipReason::EditorNotFound,
                },
            ]
        );
        assert!(store
            .payout_record(&ProjectId::new("p1"), &EditorId::new("bob"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_concurrent_unlock_reports_in_progress() {
        let (store, _, orchestrator) = setup(ProjectStatus::Completed);
        let id = ProjectId::new("p1");

        let guard = orchestrator.try_begin(&id);
        assert!(guard.is_some());
        assert_eq!(orchestrator.unlock(&id, now()).unwrap(), UnlockOutcome::InProgress);
        assert!(store.wallet_credits().is_empty());

        drop(guard);
        assert!(matches!(
            orchestrator.unlock(&id, now()).unwrap(),
            UnlockOutcome::Unlocked(_)
        ));
    }

    #[test]
    fn test_zero_payout_unlocks_without_credit() {
        let (store, notifier, orchestrator) = setup(ProjectStatus::Completed);
        let mut project = store.project(&ProjectId::new("p1")).unwrap().unwrap();
        project.billable_minutes = 0.0;
        store.insert_project(project);

        let UnlockOutcome::Unlocked(summary) =
            orchestrator.unlock(&ProjectId::new("p1"), now()).unwrap()
        else {
            panic!("expected unlock");
        };

        assert!(summary.settled[0].newly_unlocked);
        assert_eq!(summary.settled[0].credited, 0);
        assert!(store.wallet_credits().is_empty());
        assert!(notifier.is_empty());
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn payout_unlocked(&self, _: &PayoutNotification) -> Result<()> {
            Err(PayoutError::Notification("gateway down".into()))
        }
    }

    #[test]
    fn test_notification_failure_does_not_fail_unlock() {
        let (store, _, _) = setup(ProjectStatus::Completed);
        let engine = Arc::new(PayoutEngine::from_config(&PayoutConfig::default()).unwrap());
        let orchestrator =
            UnlockOrchestrator::new(engine, store.clone(), Arc::new(FailingNotifier));

        let outcome = orchestrator.unlock(&ProjectId::new("p1"), now()).unwrap();

        assert!(matches!(outcome, UnlockOutcome::Unlocked(_)));
        assert_eq!(store.wallet_credits().len(), 1);
    }
}
