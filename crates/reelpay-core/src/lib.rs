//! # ReelPay Core
//!
//! Domain types shared by the ReelPay payout engine, its stores and the CLI.
//!
//! This crate provides:
//! - `Project`, `Editor`, `Milestone` - the document fields the engine reads
//! - `TierRate`, `ReliabilityBand`, `QualityBand` - admin-editable pricing rows
//! - `EditorPayoutRecord` - the settlement ledger row, one per project and editor
//! - `PayoutError` - the error taxonomy for payout operations
//! - `ProjectStore`, `EditorDirectory`, `PayoutLedger`, `Notifier` - the
//!   collaborator seams the unlock orchestrator reads from and writes to
//!
//! ## Settlement flow
//!
//! ```text
//!   Project ─┐
//!   Editor ──┼──► rate ──► bands (×2) ──► settle ──► EditorPayoutRecord
//!   Milestones (approved, aggregated) ─┘                 │
//!                                                        └──► wallet credit (once)
//! ```

pub mod error;
pub mod store;
pub mod types;

pub use error::*;
pub use store::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{PayoutError, Result};
    pub use crate::store::{
        EditorDirectory, Notifier, PayoutLedger, PayoutNotification, ProjectStore, UpsertOutcome,
    };
    pub use crate::types::*;
}
