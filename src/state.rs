use std::sync::Arc;

use crate::accounts::{repo::AccountStore, services::AccountService};

/// Shared handles passed to every handler. Built once in `main`.
pub struct AppState<S: AccountStore> {
    pub accounts: Arc<AccountService<S>>,
}

impl<S: AccountStore> AppState<S> {
    pub fn new(accounts: AccountService<S>) -> Self {
        Self {
            accounts: Arc::new(accounts),
        }
    }
}

impl<S: AccountStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
        }
    }
}

#[cfg(test)]
impl AppState<crate::accounts::memory::MemoryAccountStore> {
    pub fn fake() -> Self {
        use crate::accounts::{memory::MemoryAccountStore, password::test_hasher};

        Self::new(AccountService::new(
            MemoryAccountStore::default(),
            test_hasher(),
            std::time::Duration::from_secs(5),
        ))
    }
}
