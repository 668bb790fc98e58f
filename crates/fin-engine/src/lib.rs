//! fin-engine
//!
//! Account, trade and read-path orchestration over a pluggable [`Store`].
//! [`MemoryStore`] is the in-process implementation; `fin-db` provides the
//! Postgres one.

mod engine;
mod error;
pub mod memory;
pub mod password;
pub mod store;

pub use engine::{DepositReceipt, Engine, EngineConfig};
pub use error::TradeError;
pub use memory::MemoryStore;
pub use store::{Store, StoreError, TradeReceipt, TransactionRow, UserId, UserRow};
