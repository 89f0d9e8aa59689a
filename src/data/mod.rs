use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod id;
pub use id::create_id;

mod json_file;
pub use json_file::JsonFileStore;

mod memory;
pub use memory::MemoryStore;

pub const CURRENCY: &str = "EUR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Bank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "type")]
    pub kind: AccountType,
    pub institution_label: String,
    pub label: String,
    pub balance: f64,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
}

impl Account {
    /// Accounts with the same key are the same account across runs.
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.institution_label, &self.number)
    }
}

/// An account the store has assigned an id to. Transactions can only
/// reference these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAccount {
    pub id: String,
    #[serde(flatten)]
    pub account: Account,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: DateTime<FixedOffset>,
    pub amount: f64,
    pub currency: String,
    /// Id of the [`StoredAccount`].
    pub account: String,
    pub fingerprint: String,
}

/// Dedup key of a transaction. `occurrence` tells apart identical rows of
/// the same export (two identical card payments on the same day).
pub fn fingerprint(
    account_id: &str,
    date: &DateTime<FixedOffset>,
    amount: f64,
    label: &str,
    occurrence: usize,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_id.as_bytes());
    hasher.update([0]);
    hasher.update(date.to_rfc3339_opts(SecondsFormat::Secs, false).as_bytes());
    hasher.update([0]);
    hasher.update(format!("{amount:.2}").as_bytes());
    hasher.update([0]);
    hasher.update(label.as_bytes());
    hasher.update([0]);
    hasher.update(occurrence.to_string().as_bytes());

    hex::encode(hasher.finalize())
}

/// Persistence collaborator.
pub trait Store: Send + Sync {
    /// Creates or updates accounts by [`Account::dedup_key`], returning them
    /// with their ids in input order.
    fn upsert_accounts(
        &self,
        accounts: Vec<Account>,
    ) -> impl Future<Output = anyhow::Result<Vec<StoredAccount>>> + Send;

    /// Appends transactions, skipping fingerprints already stored. Returns
    /// how many were added.
    fn append_transactions(
        &self,
        transactions: Vec<Transaction>,
    ) -> impl Future<Output = anyhow::Result<usize>> + Send;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub accounts: Vec<StoredAccount>,
    pub transactions: Vec<Transaction>,
}

impl Snapshot {
    pub fn upsert_accounts(&mut self, accounts: Vec<Account>) -> Vec<StoredAccount> {
        let mut stored = Vec::with_capacity(accounts.len());

        for account in accounts {
            let existing = self
                .accounts
                .iter_mut()
                .find(|sa| sa.account.dedup_key() == account.dedup_key());

            let saved = match existing {
                Some(sa) => {
                    // a lookup that yielded nothing keeps the known iban
                    let iban = account.iban.or_else(|| sa.account.iban.take());
                    sa.account = Account { iban, ..account };
                    sa.clone()
                }
                None => {
                    let sa = StoredAccount {
                        id: create_id(),
                        account,
                    };
                    self.accounts.push(sa.clone());
                    sa
                }
            };

            stored.push(saved);
        }

        stored
    }

    pub fn append_transactions(&mut self, transactions: Vec<Transaction>) -> usize {
        let mut known = self
            .transactions
            .iter()
            .map(|tx| tx.fingerprint.clone())
            .collect::<HashSet<_>>();

        let before = self.transactions.len();
        for tx in transactions {
            if known.insert(tx.fingerprint.clone()) {
                self.transactions.push(tx);
            }
        }

        self.transactions.len() - before
    }
}
