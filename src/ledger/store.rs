//! Durable balances, game history and transaction log.
//!
//! Records are JSON values under prefixed keys. Per-user listings use
//! newest-first index keys: `prefix | inverted millis (be) | record id`,
//! holding the record id as value.
//!
//! All mutation goes through [`LedgerTxn`]: it holds the async mutex of every
//! account it touches, stages writes in memory and applies them in a single
//! RocksDB `WriteBatch` on commit. Dropping it without commit discards
//! everything.

use super::types::{
    apply_bps, Account, BalanceField, GameHistory, LedgerStats, OpenRoundBet, TransactionKind,
    TransactionRecord, TransactionStats, TransactionStatus, UserStats,
};
use crate::config::LedgerConfig;
use crate::errors::{StorageError, WagerError, WagerResult};
use crate::storage::OptimizedStorage;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rocksdb::WriteBatch;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

const ACCOUNT_PREFIX: &str = "user:account:";
const HISTORY_RECORD_PREFIX: &str = "history:record:";
const HISTORY_USER_PREFIX: &str = "history:user:";
const TX_RECORD_PREFIX: &str = "tx:record:";
const TX_USER_PREFIX: &str = "tx:user:";
const TX_RECENT_PREFIX: &[u8] = b"tx:recent:";
const TX_PENDING_PREFIX: &[u8] = b"tx:pending:";
const ROUND_BET_PREFIX: &str = "round:bet:";

fn account_key(user_id: &str) -> Vec<u8> {
    format!("{}{}", ACCOUNT_PREFIX, user_id).into_bytes()
}

fn record_key(prefix: &str, id: &str) -> Vec<u8> {
    format!("{}{}", prefix, id).into_bytes()
}

fn round_bet_key(round_id: u64, user_id: &str, field: BalanceField) -> Vec<u8> {
    let field = if field.is_demo() { "demo" } else { "real" };
    format!("{}{:020}:{}:{}", ROUND_BET_PREFIX, round_id, user_id, field).into_bytes()
}

fn user_index_prefix(base: &str, user_id: &str) -> Vec<u8> {
    format!("{}{}:", base, user_id).into_bytes()
}

fn newest_first_key(prefix: &[u8], at: DateTime<Utc>, id: &str) -> Vec<u8> {
    let inv_millis = u64::MAX - at.timestamp_millis().max(0) as u64;
    let mut key = Vec::with_capacity(prefix.len() + 8 + id.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(&inv_millis.to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> WagerResult<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| StorageError::WriteFailed(format!("Failed to encode record: {}", e)).into())
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> WagerResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::CorruptedData(format!("Failed to decode {}: {}", what, e)).into()
    })
}

/// Balance ledger over RocksDB with per-user serialization
pub struct Ledger {
    storage: OptimizedStorage,
    config: LedgerConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Ledger {
    pub fn new(storage: OptimizedStorage, config: LedgerConfig) -> Self {
        Self {
            storage,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load_account(&self, user_id: &str) -> WagerResult<Option<Account>> {
        match self.storage.get(&account_key(user_id))? {
            Some(bytes) => Ok(Some(decode(&bytes, "account")?)),
            None => Ok(None),
        }
    }

    /// Open an account. A missing balance starts at zero; a missing demo
    /// balance starts at the configured default.
    pub fn create_account(
        &self,
        display_name: &str,
        balance: Option<i64>,
        demo_balance: Option<i64>,
        referred_by: Option<&str>,
    ) -> WagerResult<Account> {
        self.create_account_with(display_name, balance, demo_balance, referred_by, |_, _| Ok(()))
            .map(|(account, ())| account)
    }

    /// Open an account and commit whatever `stage` adds to the same batch.
    /// Nothing is written if `stage` fails.
    pub fn create_account_with<T>(
        &self,
        display_name: &str,
        balance: Option<i64>,
        demo_balance: Option<i64>,
        referred_by: Option<&str>,
        stage: impl FnOnce(&Account, &mut WriteBatch) -> WagerResult<T>,
    ) -> WagerResult<(Account, T)> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(WagerError::InvalidInput("display name is required".to_string()));
        }

        let balance = balance.unwrap_or(0);
        let demo_balance = demo_balance.unwrap_or(self.config.default_demo_balance);
        if balance < 0 || demo_balance < 0 {
            return Err(WagerError::InvalidInput("balances cannot be negative".to_string()));
        }

        if let Some(referrer) = referred_by {
            if self.load_account(referrer)?.is_none() {
                return Err(WagerError::InvalidInput(format!("unknown referrer {}", referrer)));
            }
        }

        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            balance,
            demo_balance,
            referred_by: referred_by.map(str::to_string),
            referral_earnings: 0,
            created_at: Utc::now(),
        };
        let mut batch = WriteBatch::default();
        batch.put(account_key(&account.id), encode(&account)?);
        let staged = stage(&account, &mut batch)?;
        self.storage.write(batch)?;

        info!(user_id = %account.id, referred_by = ?account.referred_by, "account created");
        Ok((account, staged))
    }

    pub fn account(&self, user_id: &str) -> WagerResult<Account> {
        self.load_account(user_id)?
            .ok_or_else(|| WagerError::NotFound(format!("account {}", user_id)))
    }

    /// All accounts, oldest first
    pub fn list_accounts(&self) -> WagerResult<Vec<Account>> {
        let rows = self.storage.scan_prefix(ACCOUNT_PREFIX.as_bytes(), None, usize::MAX)?;
        let mut accounts = rows
            .iter()
            .map(|(_, value)| decode::<Account>(value, "account"))
            .collect::<WagerResult<Vec<_>>>()?;
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    /// Admin override of one or both balances
    pub async fn set_balances(
        &self,
        user_id: &str,
        balance: Option<i64>,
        demo_balance: Option<i64>,
    ) -> WagerResult<Account> {
        let mut txn = self.begin(&[user_id]).await?;
        if let Some(value) = balance {
            txn.set_balance(user_id, BalanceField::Real, value)?;
        }
        if let Some(value) = demo_balance {
            txn.set_balance(user_id, BalanceField::Demo, value)?;
        }
        let account = txn.account(user_id)?.clone();
        txn.commit()?;

        info!(user_id, balance = account.balance, demo_balance = account.demo_balance, "balances overridden");
        Ok(account)
    }

    /// Lock the given accounts and open a unit of work over them.
    ///
    /// Locks are taken in sorted id order so overlapping units never deadlock.
    pub async fn begin(&self, user_ids: &[&str]) -> WagerResult<LedgerTxn<'_>> {
        let mut ids: Vec<String> = user_ids.iter().map(|id| id.to_string()).collect();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            guards.push(self.user_lock(id).lock_owned().await);
        }

        let mut accounts = HashMap::with_capacity(ids.len());
        for id in ids {
            let account = self
                .load_account(&id)?
                .ok_or_else(|| WagerError::NotFound(format!("account {}", id)))?;
            accounts.insert(id, account);
        }

        Ok(LedgerTxn {
            ledger: self,
            _guards: guards,
            accounts,
            dirty: HashSet::new(),
            puts: Vec::new(),
            deletes: Vec::new(),
        })
    }

    /// Unit of work over a user and their referrer, if any.
    ///
    /// `referred_by` never changes after creation so it is safe to read
    /// before locking.
    pub async fn begin_with_referrer(&self, user_id: &str) -> WagerResult<LedgerTxn<'_>> {
        let account = self.account(user_id)?;
        match account.referred_by.as_deref() {
            Some(referrer) => self.begin(&[user_id, referrer]).await,
            None => self.begin(&[user_id]).await,
        }
    }

    fn load_indexed<T: DeserializeOwned>(&self, record_prefix: &str, id_bytes: &[u8]) -> WagerResult<T> {
        let id = std::str::from_utf8(id_bytes)
            .map_err(|e| StorageError::CorruptedData(format!("Invalid index entry: {}", e)))?;
        let bytes = self
            .storage
            .get(&record_key(record_prefix, id))?
            .ok_or_else(|| StorageError::CorruptedData(format!("Dangling index entry {}", id)))?;
        decode(&bytes, record_prefix)
    }

    /// Most recent game history rows for a user
    pub fn history_for(&self, user_id: &str, limit: usize) -> WagerResult<Vec<GameHistory>> {
        let prefix = user_index_prefix(HISTORY_USER_PREFIX, user_id);
        self.storage
            .scan_prefix(&prefix, None, limit)?
            .iter()
            .map(|(_, id)| self.load_indexed(HISTORY_RECORD_PREFIX, id))
            .collect()
    }

    /// Most recent transactions for a user
    pub fn transactions_for(&self, user_id: &str, limit: usize) -> WagerResult<Vec<TransactionRecord>> {
        let prefix = user_index_prefix(TX_USER_PREFIX, user_id);
        self.storage
            .scan_prefix(&prefix, None, limit)?
            .iter()
            .map(|(_, id)| self.load_indexed(TX_RECORD_PREFIX, id))
            .collect()
    }

    /// Most recent transactions across all users, optionally by status
    pub fn transactions_by_status(
        &self,
        status: Option<TransactionStatus>,
        limit: usize,
    ) -> WagerResult<Vec<TransactionRecord>> {
        match status {
            Some(TransactionStatus::Pending) => self
                .storage
                .scan_prefix(TX_PENDING_PREFIX, None, limit)?
                .iter()
                .map(|(_, id)| self.load_indexed(TX_RECORD_PREFIX, id))
                .collect(),
            None => self
                .storage
                .scan_prefix(TX_RECENT_PREFIX, None, limit)?
                .iter()
                .map(|(_, id)| self.load_indexed(TX_RECORD_PREFIX, id))
                .collect(),
            Some(wanted) => {
                let mut matched = Vec::new();
                for (_, id) in self.storage.scan_prefix(TX_RECENT_PREFIX, None, usize::MAX)? {
                    let record: TransactionRecord = self.load_indexed(TX_RECORD_PREFIX, &id)?;
                    if record.status == wanted {
                        matched.push(record);
                        if matched.len() >= limit {
                            break;
                        }
                    }
                }
                Ok(matched)
            }
        }
    }

    pub fn transaction(&self, transaction_id: &str) -> WagerResult<TransactionRecord> {
        match self.storage.get(&record_key(TX_RECORD_PREFIX, transaction_id))? {
            Some(bytes) => decode(&bytes, "transaction"),
            None => Err(WagerError::NotFound(format!("transaction {}", transaction_id))),
        }
    }

    pub fn user_stats(&self, user_id: &str) -> WagerResult<UserStats> {
        let rows = self.history_for(user_id, usize::MAX)?;
        let mut stats = UserStats::default();
        let mut per_game: BTreeMap<&str, u64> = BTreeMap::new();

        for row in &rows {
            stats.total_games += 1;
            if row.is_demo {
                stats.demo_games += 1;
            } else {
                stats.real_games += 1;
            }
            stats.total_bet += row.bet_amount;
            stats.total_won += row.win_amount;
            if row.net_amount() > 0 {
                stats.wins += 1;
                if stats.last_win.is_none() {
                    stats.last_win = Some(row.clone());
                }
            }
            *per_game.entry(row.game_code.as_str()).or_insert(0) += 1;
        }

        stats.favourite_game = per_game
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(code, _)| code.to_string());
        Ok(stats)
    }

    pub fn transaction_stats(&self, user_id: &str) -> WagerResult<TransactionStats> {
        let mut stats = TransactionStats::default();
        for tx in self.transactions_for(user_id, usize::MAX)? {
            match (tx.kind, tx.status) {
                (TransactionKind::Deposit, TransactionStatus::Completed) => stats.total_deposits += tx.amount,
                (TransactionKind::Deposit, TransactionStatus::Pending) => stats.pending_deposits += 1,
                (TransactionKind::Withdrawal, TransactionStatus::Completed) => {
                    stats.total_withdrawals += tx.amount.abs()
                }
                (TransactionKind::Withdrawal, TransactionStatus::Pending) => stats.pending_withdrawals += 1,
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Round stakes still waiting for a crash or cash-out
    pub fn open_round_bets(&self) -> WagerResult<Vec<OpenRoundBet>> {
        self.storage
            .scan_prefix(ROUND_BET_PREFIX.as_bytes(), None, usize::MAX)?
            .iter()
            .map(|(_, value)| decode(value, "open round bet"))
            .collect()
    }

    /// Return every stake left open by a round that never finished.
    ///
    /// Only safe before the scheduler starts: a live round's bets are open too.
    pub async fn refund_open_round_bets(&self) -> WagerResult<usize> {
        let open = self.open_round_bets()?;
        for bet in &open {
            let mut txn = self.begin(&[&bet.user_id]).await?;
            let new_balance = txn.credit(&bet.user_id, bet.field, bet.amount)?;
            txn.close_round_bet(bet.round_id, &bet.user_id, bet.field);
            if !bet.field.is_demo() {
                txn.record_transaction(&TransactionRecord::completed(
                    &bet.user_id,
                    TransactionKind::Push,
                    0,
                    format!("Round {} interrupted, stake returned", bet.round_id),
                ))?;
            }
            txn.commit()?;
            warn!(
                user_id = %bet.user_id,
                round_id = bet.round_id,
                amount = bet.amount,
                new_balance,
                "refunded stake from an unfinished round"
            );
        }
        Ok(open.len())
    }

    pub fn ledger_stats(&self) -> WagerResult<LedgerStats> {
        let mut stats = LedgerStats::default();

        for account in self.list_accounts()? {
            stats.accounts += 1;
            stats.total_balance += account.balance;
            stats.total_demo_balance += account.demo_balance;
        }

        for (_, value) in self.storage.scan_prefix(HISTORY_RECORD_PREFIX.as_bytes(), None, usize::MAX)? {
            let row: GameHistory = decode(&value, "game history")?;
            stats.games_played += 1;
            stats.total_wagered += row.bet_amount;
            stats.total_paid += row.win_amount;
        }

        stats.transactions = self
            .storage
            .scan_prefix(TX_RECORD_PREFIX.as_bytes(), None, usize::MAX)?
            .len() as u64;
        stats.pending_transactions = self
            .storage
            .scan_prefix(TX_PENDING_PREFIX, None, usize::MAX)?
            .len() as u64;

        Ok(stats)
    }
}

/// Staged, lock-holding set of ledger writes
pub struct LedgerTxn<'a> {
    ledger: &'a Ledger,
    _guards: Vec<OwnedMutexGuard<()>>,
    accounts: HashMap<String, Account>,
    dirty: HashSet<String>,
    puts: Vec<(Vec<u8>, Vec<u8>)>,
    deletes: Vec<Vec<u8>>,
}

impl<'a> LedgerTxn<'a> {
    pub fn account(&self, user_id: &str) -> WagerResult<&Account> {
        self.accounts.get(user_id).ok_or_else(|| not_locked(user_id))
    }

    fn account_mut(&mut self, user_id: &str) -> WagerResult<&mut Account> {
        let account = self.accounts.get_mut(user_id).ok_or_else(|| not_locked(user_id))?;
        self.dirty.insert(user_id.to_string());
        Ok(account)
    }

    /// Take `amount` from a balance, refusing to go below zero.
    /// Returns the new balance.
    pub fn debit(&mut self, user_id: &str, field: BalanceField, amount: i64) -> WagerResult<i64> {
        if amount < 0 {
            return Err(WagerError::InvalidInput("debit amount cannot be negative".to_string()));
        }
        let available = self.account(user_id)?.get(field);
        if amount > available {
            return Err(WagerError::InsufficientFunds {
                requested: amount,
                available,
            });
        }
        let slot = self.account_mut(user_id)?.slot_mut(field);
        *slot -= amount;
        Ok(*slot)
    }

    /// Add `amount` to a balance. Returns the new balance.
    pub fn credit(&mut self, user_id: &str, field: BalanceField, amount: i64) -> WagerResult<i64> {
        if amount < 0 {
            return Err(WagerError::InvalidInput("credit amount cannot be negative".to_string()));
        }
        let slot = self.account_mut(user_id)?.slot_mut(field);
        *slot = slot
            .checked_add(amount)
            .ok_or_else(|| WagerError::Internal(format!("balance overflow for {}", user_id)))?;
        Ok(*slot)
    }

    pub fn set_balance(&mut self, user_id: &str, field: BalanceField, value: i64) -> WagerResult<()> {
        if value < 0 {
            return Err(WagerError::InvalidInput("balances cannot be negative".to_string()));
        }
        *self.account_mut(user_id)?.slot_mut(field) = value;
        Ok(())
    }

    pub fn record_history(&mut self, row: &GameHistory) -> WagerResult<()> {
        self.puts.push((record_key(HISTORY_RECORD_PREFIX, &row.id), encode(row)?));
        self.puts.push((
            newest_first_key(&user_index_prefix(HISTORY_USER_PREFIX, &row.user_id), row.created_at, &row.id),
            row.id.clone().into_bytes(),
        ));
        Ok(())
    }

    pub fn record_transaction(&mut self, tx: &TransactionRecord) -> WagerResult<()> {
        let id = tx.id.clone().into_bytes();
        self.puts.push((record_key(TX_RECORD_PREFIX, &tx.id), encode(tx)?));
        self.puts.push((
            newest_first_key(&user_index_prefix(TX_USER_PREFIX, &tx.user_id), tx.created_at, &tx.id),
            id.clone(),
        ));
        self.puts.push((newest_first_key(TX_RECENT_PREFIX, tx.created_at, &tx.id), id.clone()));
        if tx.status == TransactionStatus::Pending {
            self.puts.push((newest_first_key(TX_PENDING_PREFIX, tx.created_at, &tx.id), id));
        }
        Ok(())
    }

    /// Rewrite an existing transaction, dropping it from the pending index
    /// once it has been decided
    pub fn update_transaction(&mut self, tx: &TransactionRecord) -> WagerResult<()> {
        self.puts.push((record_key(TX_RECORD_PREFIX, &tx.id), encode(tx)?));
        if tx.status != TransactionStatus::Pending {
            self.deletes.push(newest_first_key(TX_PENDING_PREFIX, tx.created_at, &tx.id));
        }
        Ok(())
    }

    /// Record a debited round stake until it is settled
    pub fn open_round_bet(&mut self, bet: &OpenRoundBet) -> WagerResult<()> {
        self.puts.push((round_bet_key(bet.round_id, &bet.user_id, bet.field), encode(bet)?));
        Ok(())
    }

    pub fn close_round_bet(&mut self, round_id: u64, user_id: &str, field: BalanceField) {
        self.deletes.push(round_bet_key(round_id, user_id, field));
    }

    /// Pay the loser's referrer their commission on a real-money loss.
    ///
    /// The referrer must be part of this unit of work (see
    /// [`Ledger::begin_with_referrer`]).
    pub fn credit_referral(&mut self, loser_id: &str, loss: i64) -> WagerResult<Option<TransactionRecord>> {
        let Some(referrer) = self.account(loser_id)?.referred_by.clone() else {
            return Ok(None);
        };

        let commission = apply_bps(loss, self.ledger.config.referral_commission_bps);
        if commission <= 0 {
            return Ok(None);
        }

        self.credit(&referrer, BalanceField::Real, commission)?;
        let earnings = &mut self.account_mut(&referrer)?.referral_earnings;
        *earnings = earnings
            .checked_add(commission)
            .ok_or_else(|| WagerError::Internal(format!("referral earnings overflow for {}", referrer)))?;

        let tx = TransactionRecord::completed(
            &referrer,
            TransactionKind::ReferralEarn,
            commission,
            format!("Referral commission on a loss by {}", loser_id),
        );
        self.record_transaction(&tx)?;

        debug!(referrer = %referrer, loser = loser_id, commission, "referral commission staged");
        Ok(Some(tx))
    }

    /// Apply every staged write atomically
    pub fn commit(self) -> WagerResult<()> {
        let mut batch = WriteBatch::default();
        for id in &self.dirty {
            if let Some(account) = self.accounts.get(id) {
                batch.put(account_key(id), encode(account)?);
            }
        }
        for (key, value) in &self.puts {
            batch.put(key, value);
        }
        for key in &self.deletes {
            batch.delete(key);
        }

        self.ledger.storage.write(batch).map_err(|e| {
            error!(error = %e, "ledger commit failed");
            WagerError::from(e)
        })
    }
}

fn not_locked(user_id: &str) -> WagerError {
    WagerError::Internal(format!("account {} is not part of this unit of work", user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let storage = OptimizedStorage::new(dir.path()).unwrap();
        (dir, Ledger::new(storage, LedgerConfig::default()))
    }

    #[tokio::test]
    async fn test_debit_rejects_overdraw_without_mutation() {
        let (_dir, ledger) = ledger();
        let user = ledger.create_account("alice", Some(5_000), None, None).unwrap();

        let mut txn = ledger.begin(&[&user.id]).await.unwrap();
        let err = txn.debit(&user.id, BalanceField::Real, 5_001).unwrap_err();
        assert_eq!(
            err,
            WagerError::InsufficientFunds {
                requested: 5_001,
                available: 5_000
            }
        );
        drop(txn);

        assert_eq!(ledger.account(&user.id).unwrap().balance, 5_000);
    }

    #[tokio::test]
    async fn test_uncommitted_unit_rolls_back() {
        let (_dir, ledger) = ledger();
        let user = ledger.create_account("bob", Some(1_000), None, None).unwrap();

        {
            let mut txn = ledger.begin(&[&user.id]).await.unwrap();
            txn.debit(&user.id, BalanceField::Real, 400).unwrap();
            let row = GameHistory::new(&user.id, "dice", 400, 0, "loss".into(), serde_json::Value::Null, false);
            txn.record_history(&row).unwrap();
        }

        assert_eq!(ledger.account(&user.id).unwrap().balance, 1_000);
        assert!(ledger.history_for(&user.id, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_applies_balance_and_records_together() {
        let (_dir, ledger) = ledger();
        let user = ledger.create_account("carol", Some(10_000), None, None).unwrap();

        let mut txn = ledger.begin(&[&user.id]).await.unwrap();
        txn.debit(&user.id, BalanceField::Real, 10_000).unwrap();
        let row = GameHistory::new(&user.id, "coin", 10_000, 19_000, "win".into(), serde_json::Value::Null, false);
        txn.credit(&user.id, BalanceField::Real, row.win_amount).unwrap();
        txn.record_history(&row).unwrap();
        txn.record_transaction(&TransactionRecord::completed(
            &user.id,
            TransactionKind::GameWin,
            row.net_amount(),
            "coin".into(),
        ))
        .unwrap();
        txn.commit().unwrap();

        assert_eq!(ledger.account(&user.id).unwrap().balance, 19_000);
        let history = ledger.history_for(&user.id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].win_amount, 19_000);
        let txs = ledger.transactions_for(&user.id, 10).unwrap();
        assert_eq!(txs[0].amount, 9_000);
    }

    #[tokio::test]
    async fn test_referral_commission_credits_referrer() {
        let (_dir, ledger) = ledger();
        let referrer = ledger.create_account("ref", Some(0), None, None).unwrap();
        let player = ledger
            .create_account("player", Some(10_000), None, Some(&referrer.id))
            .unwrap();

        let mut txn = ledger.begin_with_referrer(&player.id).await.unwrap();
        txn.debit(&player.id, BalanceField::Real, 10_000).unwrap();
        let paid = txn.credit_referral(&player.id, 10_000).unwrap().unwrap();
        txn.commit().unwrap();

        assert_eq!(paid.amount, 500);
        let referrer = ledger.account(&referrer.id).unwrap();
        assert_eq!(referrer.balance, 500);
        assert_eq!(referrer.referral_earnings, 500);
        assert_eq!(
            ledger.transactions_for(&referrer.id, 10).unwrap()[0].kind,
            TransactionKind::ReferralEarn
        );
    }

    #[tokio::test]
    async fn test_referral_rounding_to_zero_is_skipped() {
        let (_dir, ledger) = ledger();
        let referrer = ledger.create_account("ref", Some(0), None, None).unwrap();
        let player = ledger
            .create_account("player", Some(100), None, Some(&referrer.id))
            .unwrap();

        let mut txn = ledger.begin_with_referrer(&player.id).await.unwrap();
        assert!(txn.credit_referral(&player.id, 19).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transaction_stats_split_pending_from_completed() {
        let (_dir, ledger) = ledger();
        let user = ledger.create_account("gina", Some(0), None, None).unwrap();

        let mut txn = ledger.begin(&[&user.id]).await.unwrap();
        for tx in [
            TransactionRecord::completed(&user.id, TransactionKind::Deposit, 5_000, "card".into()),
            TransactionRecord::completed(&user.id, TransactionKind::Deposit, 2_500, "card".into()),
            TransactionRecord::pending(&user.id, TransactionKind::Deposit, 9_999, "card".into()),
            TransactionRecord::completed(&user.id, TransactionKind::Withdrawal, -3_000, "addr".into()),
            TransactionRecord::pending(&user.id, TransactionKind::Withdrawal, -1_000, "addr".into()),
            TransactionRecord::pending(&user.id, TransactionKind::Withdrawal, -1_000, "addr".into()),
            TransactionRecord::completed(&user.id, TransactionKind::GameWin, 700, "coin".into()),
        ] {
            txn.record_transaction(&tx).unwrap();
        }
        let mut rejected = TransactionRecord::pending(&user.id, TransactionKind::Deposit, 400, "card".into());
        rejected.status = TransactionStatus::Rejected;
        txn.record_transaction(&rejected).unwrap();
        txn.commit().unwrap();

        let stats = ledger.transaction_stats(&user.id).unwrap();
        assert_eq!(
            stats,
            TransactionStats {
                total_deposits: 7_500,
                total_withdrawals: 3_000,
                pending_deposits: 1,
                pending_withdrawals: 2,
            }
        );
    }

    #[test]
    fn test_failed_stage_writes_no_account() {
        let (_dir, ledger) = ledger();
        let err = ledger
            .create_account_with("frank", Some(100), None, None, |account, batch| {
                batch.put(b"side:record", account.id.as_bytes());
                Err::<(), _>(WagerError::Internal("stage failed".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, WagerError::Internal(_)));
        assert!(ledger.list_accounts().unwrap().is_empty());
        assert!(ledger.storage.get(b"side:record").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_referral_earnings_overflow_is_refused() {
        let (_dir, ledger) = ledger();
        let mut referrer = ledger.create_account("ref", Some(0), None, None).unwrap();
        referrer.referral_earnings = i64::MAX - 10;
        ledger
            .storage
            .put(&account_key(&referrer.id), &encode(&referrer).unwrap())
            .unwrap();
        let player = ledger
            .create_account("player", Some(10_000), None, Some(&referrer.id))
            .unwrap();

        let mut txn = ledger.begin_with_referrer(&player.id).await.unwrap();
        txn.debit(&player.id, BalanceField::Real, 10_000).unwrap();
        assert!(matches!(
            txn.credit_referral(&player.id, 10_000),
            Err(WagerError::Internal(_))
        ));
        drop(txn);

        let referrer = ledger.account(&referrer.id).unwrap();
        assert_eq!(referrer.balance, 0);
        assert_eq!(referrer.referral_earnings, i64::MAX - 10);
    }

    #[test]
    fn test_unknown_referrer_rejected() {
        let (_dir, ledger) = ledger();
        let err = ledger.create_account("x", None, None, Some("nobody")).unwrap_err();
        assert!(matches!(err, WagerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_set_balances_rejects_negative() {
        let (_dir, ledger) = ledger();
        let user = ledger.create_account("dan", Some(100), None, None).unwrap();

        assert!(ledger.set_balances(&user.id, Some(-1), None).await.is_err());
        let updated = ledger.set_balances(&user.id, Some(2_500), Some(0)).await.unwrap();
        assert_eq!(updated.balance, 2_500);
        assert_eq!(updated.demo_balance, 0);
    }

    #[tokio::test]
    async fn test_stats_aggregate_history() {
        let (_dir, ledger) = ledger();
        let user = ledger.create_account("eve", Some(100_000), None, None).unwrap();

        let mut txn = ledger.begin(&[&user.id]).await.unwrap();
        for (code, bps, demo) in [("dice", 19_000, false), ("dice", 0, true), ("coin", 0, false)] {
            let row = GameHistory::new(&user.id, code, 1_000, bps, "r".into(), serde_json::Value::Null, demo);
            txn.record_history(&row).unwrap();
        }
        txn.commit().unwrap();

        let stats = ledger.user_stats(&user.id).unwrap();
        assert_eq!(stats.total_games, 3);
        assert_eq!(stats.demo_games, 1);
        assert_eq!(stats.total_bet, 3_000);
        assert_eq!(stats.total_won, 1_900);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.favourite_game.as_deref(), Some("dice"));

        let totals = ledger.ledger_stats().unwrap();
        assert_eq!(totals.accounts, 1);
        assert_eq!(totals.games_played, 3);
        assert_eq!(totals.total_paid, 1_900);
    }
}
