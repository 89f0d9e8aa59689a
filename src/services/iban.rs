use futures::{StreamExt, stream};
use once_cell::sync::Lazy;
use scraper::Selector;
use tracing::{debug, info};

use crate::{
    config::Settings,
    data::Account,
    error::{Result, ScrapeError},
    http::{Document, Fields, document::element_text},
};

use super::auth::Session;

static IBAN: Lazy<Selector> = Lazy::new(|| Selector::parse(".iban").expect("iban"));

const ACCOUNT_NUMBER_FIELD: &str = "accountExternalNumber";

/// Lookup that failed, with the account left untouched.
#[derive(Debug)]
pub struct EnrichmentFailure {
    pub account: Account,
    pub error: ScrapeError,
}

/// Looks up the IBAN of every account, at most `settings.iban_concurrency`
/// at a time. Results are in input order and independent of each other.
#[tracing::instrument(skip_all, fields(accounts = accounts.len()))]
pub async fn enrich_with_iban(
    session: &Session,
    settings: &Settings,
    accounts: Vec<Account>,
) -> Vec<Result<Account, EnrichmentFailure>> {
    info!("fetching ibans");

    stream::iter(accounts)
        .map(move |account| async move {
            let lookup = lookup_iban(session, settings, &account.number).await;
            match lookup {
                Ok(iban) => Ok(Account { iban, ..account }),
                Err(source) => Err(EnrichmentFailure {
                    error: ScrapeError::Enrichment {
                        account_number: account.number.clone(),
                        source: Box::new(source),
                    },
                    account,
                }),
            }
        })
        .buffered(settings.iban_concurrency.max(1))
        .collect()
        .await
}

pub async fn lookup_iban(
    session: &Session,
    settings: &Settings,
    account_number: &str,
) -> Result<Option<String>> {
    let mut form = Fields::new();
    form.insert(ACCOUNT_NUMBER_FIELD.to_owned(), account_number.to_owned());

    let page = session
        .client()
        .post_document(&settings.endpoints.iban_lookup, Some(form))
        .await?;

    let iban = parse_iban(&page);
    if iban.is_none() {
        debug!("no iban for account {account_number}");
    }

    Ok(iban)
}

pub fn parse_iban(page: &Document) -> Option<String> {
    page.html()
        .select(&IBAN)
        .next()
        .map(|el| element_text(&el).trim().to_owned())
        .filter(|iban| !iban.is_empty())
}
