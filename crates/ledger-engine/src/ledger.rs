use ledger_core::error::{LedgerError, Result};
use ledger_core::notify::{BalanceChangedEvent, BalanceNotifier};
use ledger_core::storage::{CreditOutcome, LedgerStore, NewEarning};
use ledger_core::types::{Balance, EarningEntry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Single entry point for crediting earnings. Validation happens here, the
/// atomic insert-plus-increment in the store, and the balance-changed
/// notification after the store operation commits.
#[derive(Clone)]
pub struct EarningsLedger {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn BalanceNotifier>,
}

impl EarningsLedger {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn BalanceNotifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Credit an earning. A duplicate idempotency key is success: the
    /// original entry comes back and nothing is re-applied or re-announced.
    pub async fn add_earnings(&self, earning: NewEarning) -> Result<CreditOutcome> {
        if earning.amount <= 0 {
            return Err(LedgerError::Validation(format!(
                "earning amount must be positive, got {}",
                earning.amount
            )));
        }
        if earning.idempotency_key.canonical().is_empty() {
            return Err(LedgerError::Validation(
                "idempotency key must not be empty".to_string(),
            ));
        }

        let kind = earning.kind;
        let user_id = earning.user_id.clone();
        let outcome = self.store.credit_earning(earning).await?;
        match &outcome {
            CreditOutcome::Applied(entry) => {
                info!(
                    user = %user_id,
                    kind = %kind,
                    amount = entry.amount,
                    "earning credited"
                );
                self.announce(&user_id, BalanceChangedEvent::earning_trigger(kind))
                    .await;
            }
            CreditOutcome::Duplicate(entry) => {
                debug!(
                    user = %user_id,
                    key = %entry.idempotency_key,
                    "duplicate earning ignored"
                );
            }
        }
        Ok(outcome)
    }

    pub async fn balance(&self, user_id: &str) -> Result<Balance> {
        self.store.balance(user_id).await
    }

    pub async fn list_earnings(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EarningEntry>> {
        self.store.list_earnings(user_id, limit, offset).await
    }

    /// Publish the user's current balance. Fire-and-forget: a failed read is
    /// logged and the caller's result stands.
    pub(crate) async fn announce(&self, user_id: &str, trigger: String) {
        match self.store.balance(user_id).await {
            Ok(balance) => {
                self.notifier
                    .balance_changed(BalanceChangedEvent::from_balance(&balance, trigger))
                    .await;
            }
            Err(err) => {
                warn!(user = %user_id, error = %err, "balance read for notification failed");
            }
        }
    }
}
