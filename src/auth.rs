//! Identity resolution for user requests.
//!
//! Bearer tokens are opaque random strings handed out when an account is
//! opened. Only their SHA-256 digest is stored, so a leaked database does not
//! leak usable credentials.

use crate::errors::{WagerError, WagerResult};
use crate::ledger::{Account, Ledger};
use crate::storage::OptimizedStorage;
use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

const TOKEN_PREFIX: &str = "auth:token:";
const TOKEN_BYTES: usize = 32;

/// The authenticated caller as seen by wager and round handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: String,
    pub balance: i64,
    pub demo_balance: i64,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Map a presented credential to the current user, or `Unauthorized`
    async fn resolve_current_user(&self, credential: &str) -> WagerResult<CurrentUser>;
}

fn token_key(token: &str) -> Vec<u8> {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}{}", TOKEN_PREFIX, hex::encode(digest)).into_bytes()
}

/// Token digests persisted next to the ledger
#[derive(Clone)]
pub struct TokenStore {
    storage: OptimizedStorage,
}

impl TokenStore {
    pub fn new(storage: OptimizedStorage) -> Self {
        Self { storage }
    }

    /// Open an account together with its first token in one write. The
    /// plain token is returned once and never stored.
    pub fn open_account(
        &self,
        ledger: &Ledger,
        display_name: &str,
        balance: Option<i64>,
        demo_balance: Option<i64>,
        referred_by: Option<&str>,
    ) -> WagerResult<(Account, String)> {
        ledger.create_account_with(display_name, balance, demo_balance, referred_by, |account, batch| {
            let mut bytes = [0u8; TOKEN_BYTES];
            OsRng.fill_bytes(&mut bytes);
            let token = hex::encode(bytes);

            batch.put(token_key(&token), account.id.as_bytes());
            debug!(user_id = %account.id, "issued bearer token");
            Ok(token)
        })
    }

    pub fn revoke(&self, token: &str) -> WagerResult<()> {
        self.storage.delete(&token_key(token))?;
        Ok(())
    }

    pub fn lookup(&self, token: &str) -> WagerResult<Option<String>> {
        match self.storage.get(&token_key(token))? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| WagerError::Internal(format!("corrupted token record: {}", e))),
            None => Ok(None),
        }
    }
}

/// Resolves bearer tokens against the token store and the ledger
pub struct TokenAuthenticator {
    tokens: TokenStore,
    ledger: Arc<Ledger>,
}

impl TokenAuthenticator {
    pub fn new(tokens: TokenStore, ledger: Arc<Ledger>) -> Self {
        Self { tokens, ledger }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn resolve_current_user(&self, credential: &str) -> WagerResult<CurrentUser> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(WagerError::Unauthorized("missing credential".to_string()));
        }

        let Some(user_id) = self.tokens.lookup(credential)? else {
            return Err(WagerError::Unauthorized("invalid credential".to_string()));
        };

        match self.ledger.account(&user_id) {
            Ok(account) => Ok(CurrentUser {
                user_id: account.id,
                balance: account.balance,
                demo_balance: account.demo_balance,
            }),
            Err(WagerError::NotFound(_)) => {
                warn!(user_id = %user_id, "token refers to a missing account");
                Err(WagerError::Unauthorized("invalid credential".to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Constant-time comparison of the presented admin key
pub fn admin_key_matches(configured: Option<&str>, presented: Option<&str>) -> bool {
    match (configured, presented) {
        (Some(expected), Some(given)) if !expected.is_empty() => {
            let a = Sha256::digest(expected.as_bytes());
            let b = Sha256::digest(given.as_bytes());
            a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
        }
        _ => false,
    }
}
