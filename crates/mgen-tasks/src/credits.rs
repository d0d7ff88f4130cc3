//! Credit ledger port.
//!
//! The pipeline never executes refunds itself; on a failed task it marks
//! the original charge refund-eligible and a billing collaborator settles
//! it out of band.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mgen_models::TaskId;
use tracing::info;

use crate::error::TaskStoreResult;

/// A refund-eligible charge recorded after a task failure.
#[derive(Debug, Clone)]
pub struct RefundEntry {
    pub credit_id: String,
    pub task_id: TaskId,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// Bookkeeping port for charge reversal.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Mark `credit_id` refund-eligible because `task_id` failed.
    async fn mark_refundable(
        &self,
        credit_id: &str,
        task_id: &TaskId,
        reason: &str,
    ) -> TaskStoreResult<()>;
}

/// In-memory ledger for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryCreditLedger {
    entries: Mutex<Vec<RefundEntry>>,
}

impl MemoryCreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<RefundEntry> {
        self.entries.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl CreditLedger for MemoryCreditLedger {
    async fn mark_refundable(
        &self,
        credit_id: &str,
        task_id: &TaskId,
        reason: &str,
    ) -> TaskStoreResult<()> {
        info!(
            credit_id = %credit_id,
            task_id = %task_id,
            "marking charge refund-eligible"
        );
        self.entries.lock().expect("lock poisoned").push(RefundEntry {
            credit_id: credit_id.to_string(),
            task_id: task_id.clone(),
            reason: reason.to_string(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ledger_records_refund() {
        let ledger = MemoryCreditLedger::new();
        let task_id = TaskId::from_string("task-9");

        ledger
            .mark_refundable("credit-42", &task_id, "generation failed")
            .await
            .unwrap();

        let entries = ledger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].credit_id, "credit-42");
        assert_eq!(entries[0].task_id, task_id);
    }
}
