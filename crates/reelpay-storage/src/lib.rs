//! # ReelPay Storage
//!
//! In-memory implementation of the payout engine's collaborator traits.
//!
//! ## Layout
//!
//! - `memory` - `MemoryStore`: projects, editors, milestones, payout ledger
//!   and wallet credit log behind `parking_lot` locks
//! - `fixture` - JSON snapshots of a store, as exported from the dashboard
//!   database

pub mod fixture {
    //! JSON fixture files

    use chrono::{DateTime, Utc};
    use reelpay_core::{
        Amount, Editor, EditorId, EditorPayoutRecord, Milestone, PayoutError, Project, ProjectId,
        Result,
    };
    use serde::{Deserialize, Serialize};
    use std::path::Path;

    /// One wallet mutation. The ledger only ever adds.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WalletCredit {
        pub editor_id: EditorId,
        pub project_id: ProjectId,
        pub amount: Amount,
        pub is_addition: bool,
        pub at: DateTime<Utc>,
    }

    /// Serializable store contents
    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Fixture {
        #[serde(default)]
        pub projects: Vec<Project>,

        #[serde(default)]
        pub editors: Vec<Editor>,

        #[serde(default)]
        pub milestones: Vec<Milestone>,

        #[serde(default)]
        pub payout_records: Vec<EditorPayoutRecord>,

        #[serde(default)]
        pub wallet_credits: Vec<WalletCredit>,
    }

    impl Fixture {
        pub fn from_json(content: &str) -> Result<Self> {
            serde_json::from_str(content).map_err(|e| PayoutError::Serialization(e.to_string()))
        }

        pub fn to_json(&self) -> Result<String> {
            serde_json::to_string_pretty(self)
                .map_err(|e| PayoutError::Serialization(e.to_string()))
        }

        pub fn load(path: &Path) -> Result<Self> {
            let content = std::fs::read_to_string(path).map_err(|e| {
                PayoutError::Storage(format!("cannot read {}: {}", path.display(), e))
            })?;
            Self::from_json(&content)
        }

        pub fn save(&self, path: &Path) -> Result<()> {
            std::fs::write(path, self.to_json()?).map_err(|e| {
                PayoutError::Storage(format!("cannot write {}: {}", path.display(), e))
            })
        }
    }
}

pub mod memory {
    //! Lock-protected in-memory store

    use crate::fixture::{Fixture, WalletCredit};
    use chrono::{DateTime, Utc};
    use parking_lot::RwLock;
    use reelpay_core::{
        Amount, Editor, EditorDirectory, EditorId, EditorPayoutRecord, Milestone, PayoutError,
        PayoutLedger, PayoutStatus, Project, ProjectId, ProjectStore, Result, UpsertOutcome,
    };
    use std::collections::{BTreeMap, HashMap};

    type RecordKey = (ProjectId, EditorId);

    /// In-memory store.
    ///
    /// Lock order when several are held: records, editors, credits.
    pub struct MemoryStore {
        projects: RwLock<HashMap<ProjectId, Project>>,
        editors: RwLock<HashMap<EditorId, Editor>>,
        milestones: RwLock<Vec<Milestone>>,
        records: RwLock<BTreeMap<RecordKey, EditorPayoutRecord>>,
        credits: RwLock<Vec<WalletCredit>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self {
                projects: RwLock::new(HashMap::new()),
                editors: RwLock::new(HashMap::new()),
                milestones: RwLock::new(Vec::new()),
                records: RwLock::new(BTreeMap::new()),
                credits: RwLock::new(Vec::new()),
            }
        }

        pub fn from_fixture(fixture: Fixture) -> Self {
            let store = Self::new();
            for project in fixture.projects {
                store.insert_project(project);
            }
            for editor in fixture.editors {
                store.insert_editor(editor);
            }
            for milestone in fixture.milestones {
                store.insert_milestone(milestone);
            }
            {
                let mut records = store.records.write();
                for record in fixture.payout_records {
                    records.insert(record.key(), record);
                }
            }
            *store.credits.write() = fixture.wallet_credits;
            store
        }

        /// Current contents, sorted by id for stable output
        pub fn snapshot(&self) -> Fixture {
            let mut projects: Vec<Project> = self.projects.read().values().cloned().collect();
            projects.sort_by(|a, b| a.id.cmp(&b.id));

            let mut editors: Vec<Editor> = self.editors.read().values().cloned().collect();
            editors.sort_by(|a, b| a.id.cmp(&b.id));

            Fixture {
                projects,
                editors,
                milestones: self.milestones.read().clone(),
                payout_records: self.records.read().values().cloned().collect(),
                wallet_credits: self.credits.read().clone(),
            }
        }

        /// Insert or replace a project
        pub fn insert_project(&self, project: Project) {
            self.projects.write().insert(project.id.clone(), project);
        }

        /// Insert or replace an editor
        pub fn insert_editor(&self, editor: Editor) {
            self.editors.write().insert(editor.id.clone(), editor);
        }

        /// Insert or replace a milestone (by id)
        pub fn insert_milestone(&self, milestone: Milestone) {
            let mut milestones = self.milestones.write();
            match milestones.iter_mut().find(|m| m.id == milestone.id) {
                Some(existing) => *existing = milestone,
                None => milestones.push(milestone),
            }
        }

        pub fn editors(&self) -> Vec<Editor> {
            let mut editors: Vec<Editor> = self.editors.read().values().cloned().collect();
            editors.sort_by(|a, b| a.id.cmp(&b.id));
            editors
        }

        /// Every wallet mutation so far, oldest first
        pub fn wallet_credits(&self) -> Vec<WalletCredit> {
            self.credits.read().clone()
        }
    }

    impl Default for MemoryStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ProjectStore for MemoryStore {
        fn project(&self, project_id: &ProjectId) -> Result<Option<Project>> {
            Ok(self.projects.read().get(project_id).cloned())
        }

        fn milestones(&self, project_id: &ProjectId) -> Result<Vec<Milestone>> {
            Ok(self
                .milestones
                .read()
                .iter()
                .filter(|m| &m.project_id == project_id)
                .cloned()
                .collect())
        }

        fn stamp_payouts_unlocked(&self, project_id: &ProjectId, at: DateTime<Utc>) -> Result<()> {
            let mut projects = self.projects.write();
            let project = projects
                .get_mut(project_id)
                .ok_or_else(|| PayoutError::ProjectNotFound(project_id.clone()))?;
            project.payouts_unlocked_at = Some(at);
            Ok(())
        }
    }

    impl EditorDirectory for MemoryStore {
        fn editor(&self, editor_id: &EditorId) -> Result<Option<Editor>> {
            Ok(self.editors.read().get(editor_id).cloned())
        }
    }

    impl PayoutLedger for MemoryStore {
        fn payout_record(
            &self,
            project_id: &ProjectId,
            editor_id: &EditorId,
        ) -> Result<Option<EditorPayoutRecord>> {
            Ok(self
                .records
                .read()
                .get(&(project_id.clone(), editor_id.clone()))
                .cloned())
        }

        fn records_for_project(&self, project_id: &ProjectId) -> Result<Vec<EditorPayoutRecord>> {
            Ok(self
                .records
                .read()
                .values()
                .filter(|r| &r.project_id == project_id)
                .cloned()
                .collect())
        }

        fn upsert_payout_record(&self, record: EditorPayoutRecord) -> Result<UpsertOutcome> {
            let mut records = self.records.write();
            match records.get_mut(&record.key()) {
                Some(existing) if existing.status == PayoutStatus::Unlocked => {
                    tracing::debug!(
                        project = %existing.project_id,
                        editor = %existing.editor_id,
                        "Payout record already unlocked, breakdown kept"
                    );
                    Ok(UpsertOutcome::Frozen)
                }
                Some(existing) => {
                    let status = existing.status;
                    let unlocked_at = existing.unlocked_at;
                    let created_at = existing.created_at;
                    *existing = EditorPayoutRecord {
                        status,
                        unlocked_at,
                        created_at,
                        ..record
                    };
                    Ok(UpsertOutcome::Updated)
                }
                None => {
                    records.insert(record.key(), record);
                    Ok(UpsertOutcome::Created)
                }
            }
        }

        fn unlock_and_credit(
            &self,
            project_id: &ProjectId,
            editor_id: &EditorId,
            amount: Amount,
            at: DateTime<Utc>,
        ) -> Result<bool> {
            let mut records = self.records.write();
            let record = records
                .get_mut(&(project_id.clone(), editor_id.clone()))
                .ok_or_else(|| PayoutError::RecordNotFound {
                    project: project_id.clone(),
                    editor: editor_id.clone(),
                })?;

            if record.status == PayoutStatus::Unlocked {
                return Ok(false);
            }

            if amount > 0 {
                let mut editors = self.editors.write();
                let editor = editors.get_mut(editor_id).ok_or_else(|| {
                    PayoutError::Storage(format!("no wallet for editor {}", editor_id))
                })?;
                editor.wallet_balance += amount as f64;

                self.credits.write().push(WalletCredit {
                    editor_id: editor_id.clone(),
                    project_id: project_id.clone(),
                    amount,
                    is_addition: true,
                    at,
                });
            }

            record.status = PayoutStatus::Unlocked;
            record.unlocked_at = Some(at);
            record.updated_at = at;

            tracing::debug!(project = %project_id, editor = %editor_id, amount, "Wallet credited");
            Ok(true)
        }
    }
}

// Re-export for convenience
pub use fixture::{Fixture, WalletCredit};
pub use memory::MemoryStore;
