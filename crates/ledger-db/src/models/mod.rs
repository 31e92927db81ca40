mod balance;
mod earning;
mod withdrawal;

pub use balance::DbBalance;
pub use earning::DbEarning;
pub use withdrawal::DbWithdrawal;
