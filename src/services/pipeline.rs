use anyhow::Context;
use tracing::{info, warn};

use crate::{
    config::{Credentials, FailurePolicy, Settings},
    data::{Store, StoredAccount},
    error::{Result, ScrapeError},
    http::SessionClient,
};

use super::{
    accounts::list_accounts,
    auth::{Session, login_with_endpoints},
    iban::enrich_with_iban,
    statements::fetch_operations,
};

#[derive(Debug, Default)]
pub struct RunReport {
    pub accounts: Vec<StoredAccount>,
    pub transactions_fetched: usize,
    pub transactions_added: usize,
    /// Per-account failures that were isolated instead of aborting the run.
    pub failures: Vec<ScrapeError>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Login, list accounts, add IBANs, save accounts, then fetch and save each
/// account's statement, one account at a time.
#[tracing::instrument(skip_all)]
pub async fn run(
    settings: &Settings,
    credentials: &Credentials,
    store: &impl Store,
) -> Result<RunReport> {
    let client = SessionClient::new(&settings.base_url, settings.encoding)?;
    let session = login_with_endpoints(client, &settings.endpoints, credentials).await?;

    run_with_session(&session, settings, store).await
}

pub async fn run_with_session(
    session: &Session,
    settings: &Settings,
    store: &impl Store,
) -> Result<RunReport> {
    let mut report = RunReport::default();
    let policy = settings.failure_policy;

    let listed = list_accounts(session, settings).await?;

    let mut accounts = Vec::with_capacity(listed.len());
    for enriched in enrich_with_iban(session, settings, listed).await {
        match enriched {
            Ok(account) => accounts.push(account),
            Err(failure) => {
                isolate(policy, failure.error, &mut report.failures)?;
                accounts.push(failure.account);
            }
        }
    }

    report.accounts = store
        .upsert_accounts(accounts)
        .await
        .context("error saving accounts")?;

    // sequential, the export navigation state is per session
    for account in &report.accounts {
        let transactions = match fetch_operations(session, settings, account).await {
            Ok(transactions) => transactions,
            Err(err) => {
                isolate(policy, err, &mut report.failures)?;
                continue;
            }
        };

        report.transactions_fetched += transactions.len();
        let added = store
            .append_transactions(transactions)
            .await
            .with_context(|| format!("error saving operations of {}", account.account.number))?;
        report.transactions_added += added;

        info!("{added} new operations for {}", account.account.label);
    }

    info!(
        accounts = report.accounts.len(),
        fetched = report.transactions_fetched,
        added = report.transactions_added,
        failures = report.failures.len(),
        "run finished"
    );

    Ok(report)
}

fn isolate(policy: FailurePolicy, err: ScrapeError, failures: &mut Vec<ScrapeError>) -> Result<()> {
    if policy == FailurePolicy::FailFast || !err.is_per_account() {
        return Err(err);
    }

    warn!("{err}");
    failures.push(err);

    Ok(())
}
