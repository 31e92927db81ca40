pub mod config;
pub mod error;
pub mod notify;
pub mod storage;
pub mod types;

pub use config::RewardsConfig;
pub use error::{LedgerError, RejectionReason, Result};
pub use notify::{BalanceChangedEvent, BalanceNotifier, NoopNotifier};
pub use storage::{CreditOutcome, LedgerStore, NewEarning, WeeklyCap, WithdrawalOutcome};
