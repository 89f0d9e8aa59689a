use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::sync::Mutex;

use super::{Account, Snapshot, Store, StoredAccount, Transaction};

/// Keeps every account and transaction in one JSON document on disk,
/// rewritten after each change.
pub struct JsonFileStore {
    path: PathBuf,
    snapshot: Mutex<Snapshot>,
}

impl JsonFileStore {
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)
                .with_context(|| format!("error parsing {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no existing data, starting empty");
                Snapshot::default()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("error reading {}", path.display()));
            }
        };

        return Ok(Self {
            path,
            snapshot: Mutex::new(snapshot),
        });
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().await.clone()
    }

    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot).context("error serializing data")?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("error writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("error replacing {}", self.path.display()))?;

        Ok(())
    }
}

impl Store for JsonFileStore {
    async fn upsert_accounts(&self, accounts: Vec<Account>) -> anyhow::Result<Vec<StoredAccount>> {
        let mut snapshot = self.snapshot.lock().await;
        let stored = snapshot.upsert_accounts(accounts);
        self.save(&snapshot).await?;

        Ok(stored)
    }

    async fn append_transactions(&self, transactions: Vec<Transaction>) -> anyhow::Result<usize> {
        let mut snapshot = self.snapshot.lock().await;
        let added = snapshot.append_transactions(transactions);
        if added > 0 {
            self.save(&snapshot).await?;
        }

        Ok(added)
    }
}
