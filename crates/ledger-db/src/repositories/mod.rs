mod agent;
mod balance;
mod earning;
mod referral;
mod withdrawal;

pub use agent::AgentRepository;
pub use balance::BalanceRepository;
pub use earning::EarningRepository;
pub use referral::ReferralRepository;
pub use withdrawal::WithdrawalRepository;
