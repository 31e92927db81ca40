//! Channel name builders for the balance event stream.

/// Balance channel for a user, watched by dashboards.
pub fn user_balance_channel(user_id: &str) -> String {
    format!("user:{}:balance", user_id)
}
