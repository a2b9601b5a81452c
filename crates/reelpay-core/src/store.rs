//! Collaborator interfaces
//!
//! The payout engine never reaches into an ambient database handle. The
//! orchestrator receives these traits explicitly; the calculators receive
//! plain values.

use crate::error::Result;
use crate::types::{
    Amount, Editor, EditorId, EditorPayoutRecord, Milestone, Project, ProjectId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read access to projects and their milestones
pub trait ProjectStore: Send + Sync {
    fn project(&self, project_id: &ProjectId) -> Result<Option<Project>>;

    fn milestones(&self, project_id: &ProjectId) -> Result<Vec<Milestone>>;

    /// Set `payouts_unlocked_at` on the project
    fn stamp_payouts_unlocked(&self, project_id: &ProjectId, at: DateTime<Utc>) -> Result<()>;
}

/// Read access to editor (user) records
pub trait EditorDirectory: Send + Sync {
    fn editor(&self, editor_id: &EditorId) -> Result<Option<Editor>>;
}

/// What an upsert did to the ledger row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Created,
    /// Pending row patched in place
    Updated,
    /// Row already `Unlocked`; the paid breakdown was left untouched
    Frozen,
}

/// Settlement ledger and wallet mutations
pub trait PayoutLedger: Send + Sync {
    fn payout_record(
        &self,
        project_id: &ProjectId,
        editor_id: &EditorId,
    ) -> Result<Option<EditorPayoutRecord>>;

    fn records_for_project(&self, project_id: &ProjectId) -> Result<Vec<EditorPayoutRecord>>;

    /// Insert the record, or patch the breakdown of the existing `Pending`
    /// row for the same (project, editor) in place.
    ///
    /// Patching keeps the stored `status`, `unlocked_at` and `created_at`.
    /// An `Unlocked` row records what was paid and is never patched; the
    /// call returns `UpsertOutcome::Frozen` instead.
    fn upsert_payout_record(&self, record: EditorPayoutRecord) -> Result<UpsertOutcome>;

    /// Atomically move the record from `Pending` to `Unlocked` and, when
    /// `amount > 0`, credit the editor's wallet by `amount`.
    ///
    /// Returns `false` without touching the wallet when the record is
    /// already `Unlocked`. This transition is the single source of truth
    /// for "has this editor been paid for this project".
    fn unlock_and_credit(
        &self,
        project_id: &ProjectId,
        editor_id: &EditorId,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Informational message sent after a wallet credit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutNotification {
    pub project_id: ProjectId,
    pub editor_id: EditorId,
    pub amount: Amount,
    pub unlocked_at: DateTime<Utc>,
}

/// Fire-and-forget notification dispatcher.
///
/// A failed notification is logged by the caller and never rolls back a
/// settlement.
pub trait Notifier: Send + Sync {
    fn payout_unlocked(&self, notification: &PayoutNotification) -> Result<()>;
}
