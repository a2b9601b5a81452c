//! Notifier implementations

use parking_lot::Mutex;
use reelpay_core::{Notifier, PayoutNotification, Result};

/// Writes payout notifications to the log
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn payout_unlocked(&self, notification: &PayoutNotification) -> Result<()> {
        tracing::info!(
            project = %notification.project_id,
            editor = %notification.editor_id,
            amount = notification.amount,
            "Payout unlocked and credited"
        );
        Ok(())
    }
}

/// Keeps every notification in memory; handy for tests and dry runs
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<PayoutNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<PayoutNotification> {
        self.sent.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn payout_unlocked(&self, notification: &PayoutNotification) -> Result<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}
