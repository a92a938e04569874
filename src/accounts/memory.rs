use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::accounts::{
    repo::{AccountStore, StoreError},
    repo_types::{Account, UniqueField},
};

/// In-memory store for tests. Writes are staged on the transaction and only
/// become visible on commit.
#[derive(Default)]
pub struct MemoryAccountStore {
    rows: Mutex<HashMap<Uuid, Account>>,
    fail_commit: AtomicBool,
    commit_delay: Mutex<Option<Duration>>,
}

#[derive(Default)]
pub struct MemoryTx {
    staged: Vec<Account>,
}

impl MemoryTx {
    fn latest(&self, pred: impl Fn(&Account) -> bool) -> Option<&Account> {
        self.staged.iter().rev().find(|a| pred(*a))
    }
}

impl MemoryAccountStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn delay_commits(&self, delay: Duration) {
        *self.commit_delay.lock().unwrap() = Some(delay);
    }

    fn lookup(&self, tx: &MemoryTx, pred: impl Fn(&Account) -> bool) -> Option<Account> {
        if let Some(found) = tx.latest(&pred) {
            return Some(found.clone());
        }
        let rows = self.rows.lock().unwrap();
        rows.values()
            .filter(|row| !tx.staged.iter().any(|s| s.id == row.id))
            .find(|row| pred(*row))
            .cloned()
    }
}

fn conflict(a: &Account, b: &Account) -> Option<UniqueField> {
    if a.id == b.id {
        return None;
    }
    if a.email == b.email {
        return Some(UniqueField::Email);
    }
    if a.phone.is_some() && a.phone == b.phone {
        return Some(UniqueField::Phone);
    }
    if a.token.is_some() && a.token == b.token {
        return Some(UniqueField::Token);
    }
    None
}

fn check_unique<'a>(
    account: &Account,
    others: impl IntoIterator<Item = &'a Account>,
) -> Result<(), StoreError> {
    for other in others {
        if let Some(field) = conflict(account, other) {
            return Err(StoreError::Duplicate(field));
        }
    }
    Ok(())
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(MemoryTx::default())
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        let delay = *self.commit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut rows = self.rows.lock().unwrap();
        for account in &tx.staged {
            check_unique(account, rows.values())?;
        }
        for account in tx.staged {
            rows.insert(account.id, account);
        }
        Ok(())
    }

    async fn create(&self, tx: &mut Self::Tx, account: &Account) -> Result<(), StoreError> {
        let exists = self.lookup(tx, |a| a.id == account.id).is_some();
        if exists {
            return Err(StoreError::Duplicate(UniqueField::Id));
        }
        check_unique(account, &tx.staged)?;
        check_unique(account, self.rows.lock().unwrap().values())?;
        tx.staged.push(account.clone());
        Ok(())
    }

    async fn find_by_email(&self, tx: &mut Self::Tx, email: &str) -> Result<Account, StoreError> {
        self.lookup(tx, |a| a.email == email)
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_token(&self, tx: &mut Self::Tx, token: &str) -> Result<Account, StoreError> {
        self.lookup(tx, |a| a.token.as_deref() == Some(token))
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, tx: &mut Self::Tx, id: Uuid) -> Result<Account, StoreError> {
        self.lookup(tx, |a| a.id == id).ok_or(StoreError::NotFound)
    }

    async fn update(&self, tx: &mut Self::Tx, account: &Account) -> Result<(), StoreError> {
        check_unique(account, &tx.staged)?;
        tx.staged.retain(|a| a.id != account.id);
        tx.staged.push(account.clone());
        Ok(())
    }
}
