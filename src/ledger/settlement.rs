//! Deposit and withdrawal requests with admin adjudication.
//!
//! Requests never move money. The balance delta is applied only when an
//! admin approves, in the same write batch that marks the transaction
//! completed; a second approval finds it completed and does nothing.

use super::store::Ledger;
use super::types::{BalanceField, TransactionKind, TransactionRecord, TransactionStatus};
use crate::errors::{WagerError, WagerResult};
use chrono::Utc;
use tracing::{info, warn};

/// Result of an admin decision on a transaction
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub transaction: TransactionRecord,
    /// The transaction had already reached this state; nothing was applied
    pub already_settled: bool,
    pub new_balance: i64,
}

impl Ledger {
    pub async fn request_deposit(
        &self,
        user_id: &str,
        amount: i64,
        payment_method: &str,
    ) -> WagerResult<TransactionRecord> {
        if amount < self.config().min_deposit {
            return Err(WagerError::InvalidInput(format!(
                "minimum deposit is {} cents",
                self.config().min_deposit
            )));
        }
        let payment_method = payment_method.trim();
        if payment_method.is_empty() {
            return Err(WagerError::InvalidInput("payment method is required".to_string()));
        }

        let mut txn = self.begin(&[user_id]).await?;
        let mut tx = TransactionRecord::pending(
            user_id,
            TransactionKind::Deposit,
            amount,
            format!("Deposit via {}", payment_method),
        );
        tx.payment_method = Some(payment_method.to_string());
        txn.record_transaction(&tx)?;
        txn.commit()?;

        info!(user_id, tx_id = %tx.id, amount, "deposit requested");
        Ok(tx)
    }

    pub async fn request_withdrawal(
        &self,
        user_id: &str,
        amount: i64,
        wallet_address: &str,
    ) -> WagerResult<TransactionRecord> {
        if amount < self.config().min_withdrawal {
            return Err(WagerError::InvalidInput(format!(
                "minimum withdrawal is {} cents",
                self.config().min_withdrawal
            )));
        }
        let wallet_address = wallet_address.trim();
        if wallet_address.is_empty() {
            return Err(WagerError::InvalidInput("wallet address is required".to_string()));
        }

        let mut txn = self.begin(&[user_id]).await?;
        let available = txn.account(user_id)?.balance;
        if amount > available {
            return Err(WagerError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        let mut tx = TransactionRecord::pending(
            user_id,
            TransactionKind::Withdrawal,
            -amount,
            format!("Withdrawal to {}", wallet_address),
        );
        tx.wallet_address = Some(wallet_address.to_string());
        txn.record_transaction(&tx)?;
        txn.commit()?;

        info!(user_id, tx_id = %tx.id, amount, "withdrawal requested");
        Ok(tx)
    }

    /// Apply a pending deposit or withdrawal exactly once
    pub async fn approve_transaction(&self, transaction_id: &str) -> WagerResult<SettlementOutcome> {
        let owner = self.transaction(transaction_id)?.user_id;
        let mut txn = self.begin(&[&owner]).await?;

        // Re-read under the owner's lock so concurrent approvals serialize
        let mut tx = self.transaction(transaction_id)?;
        match tx.status {
            TransactionStatus::Completed => {
                let new_balance = txn.account(&owner)?.balance;
                return Ok(SettlementOutcome {
                    transaction: tx,
                    already_settled: true,
                    new_balance,
                });
            }
            TransactionStatus::Rejected => {
                return Err(WagerError::InvalidInput(format!(
                    "transaction {} was rejected",
                    transaction_id
                )));
            }
            TransactionStatus::Pending => {}
        }

        let new_balance = match tx.kind {
            TransactionKind::Deposit => txn.credit(&owner, BalanceField::Real, tx.amount)?,
            TransactionKind::Withdrawal => txn
                .debit(&owner, BalanceField::Real, tx.amount.abs())
                .map_err(|e| {
                    warn!(tx_id = transaction_id, error = %e, "withdrawal no longer covered");
                    e
                })?,
            other => {
                return Err(WagerError::InvalidInput(format!(
                    "{:?} transactions are not adjudicated",
                    other
                )))
            }
        };

        tx.status = TransactionStatus::Completed;
        tx.settled_at = Some(Utc::now());
        txn.update_transaction(&tx)?;
        txn.commit()?;

        info!(tx_id = transaction_id, user_id = %owner, amount = tx.amount, "transaction approved");
        Ok(SettlementOutcome {
            transaction: tx,
            already_settled: false,
            new_balance,
        })
    }

    /// Decline a pending deposit or withdrawal
    pub async fn reject_transaction(&self, transaction_id: &str) -> WagerResult<SettlementOutcome> {
        let owner = self.transaction(transaction_id)?.user_id;
        let mut txn = self.begin(&[&owner]).await?;
        let new_balance = txn.account(&owner)?.balance;

        let mut tx = self.transaction(transaction_id)?;
        match tx.status {
            TransactionStatus::Rejected => {
                return Ok(SettlementOutcome {
                    transaction: tx,
                    already_settled: true,
                    new_balance,
                })
            }
            TransactionStatus::Completed => {
                return Err(WagerError::InvalidInput(format!(
                    "transaction {} is already completed",
                    transaction_id
                )))
            }
            TransactionStatus::Pending => {}
        }

        tx.status = TransactionStatus::Rejected;
        tx.settled_at = Some(Utc::now());
        txn.update_transaction(&tx)?;
        txn.commit()?;

        info!(tx_id = transaction_id, user_id = %owner, "transaction rejected");
        Ok(SettlementOutcome {
            transaction: tx,
            already_settled: false,
            new_balance,
        })
    }

    /// Move a transaction to the requested terminal status
    pub async fn settle_transaction(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> WagerResult<SettlementOutcome> {
        match status {
            TransactionStatus::Completed => self.approve_transaction(transaction_id).await,
            TransactionStatus::Rejected => self.reject_transaction(transaction_id).await,
            TransactionStatus::Pending => Err(WagerError::InvalidInput(
                "status must be completed or rejected".to_string(),
            )),
        }
    }
}
