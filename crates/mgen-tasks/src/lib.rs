//! Task repository and credit ledger ports.
//!
//! The durable backing store is an external collaborator; this crate
//! defines the traits the pipeline depends on plus in-memory
//! implementations used by tests and local runs.

pub mod credits;
pub mod error;
pub mod memory;
pub mod repository;

pub use credits::{CreditLedger, MemoryCreditLedger, RefundEntry};
pub use error::{TaskStoreError, TaskStoreResult};
pub use memory::MemoryTaskRepository;
pub use repository::{ResultUrlPatch, TaskRepository};
