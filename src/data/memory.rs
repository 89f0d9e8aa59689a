use std::sync::Mutex;

use anyhow::anyhow;

use super::{Account, Snapshot, Store, StoredAccount, Transaction};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner
            .lock()
            .map(|snapshot| snapshot.clone())
            .unwrap_or_default()
    }
}

impl Store for MemoryStore {
    async fn upsert_accounts(&self, accounts: Vec<Account>) -> anyhow::Result<Vec<StoredAccount>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;

        Ok(inner.upsert_accounts(accounts))
    }

    async fn append_transactions(&self, transactions: Vec<Transaction>) -> anyhow::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;

        Ok(inner.append_transactions(transactions))
    }
}
