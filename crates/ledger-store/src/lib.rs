mod balances;
mod earnings;
mod referrals;
mod store;
mod withdrawals;

pub use balances::BalanceTable;
pub use earnings::EarningTable;
pub use referrals::{AgentRegistry, ReferralGraph};
pub use store::MemoryLedgerStore;
pub use withdrawals::WithdrawalTable;
