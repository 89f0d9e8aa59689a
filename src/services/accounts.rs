use once_cell::sync::Lazy;
use scraper::Selector;
use tracing::info;

use crate::{
    config::Settings,
    data::{Account, AccountType},
    error::{Result, ScrapeError},
    http::{Document, document::nth_text},
    statement_parsing::normalize::{Direction, parse_amount},
};

use super::auth::Session;

static CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("#content").expect("content"));
static ACCOUNT_BLOCK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#content table thead").expect("account block"));
static LABEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".tt_compte").expect("label"));
static BALANCE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".sum_solde span").expect("balance"));
static NUMBER: Lazy<Selector> = Lazy::new(|| Selector::parse(".nClient li").expect("number"));

const NUMBER_PREFIX: &str = "N°";

#[tracing::instrument(skip_all)]
pub async fn list_accounts(session: &Session, settings: &Settings) -> Result<Vec<Account>> {
    info!("getting accounts");

    let summary = session
        .client()
        .get_document(&settings.endpoints.accounts_summary)
        .await?;

    let accounts = parse_accounts(&summary, &settings.institution_label)?;
    info!("found {} accounts", accounts.len());

    Ok(accounts)
}

/// One account per table header block of the summary page. A page without
/// the content container is an error, a container without blocks means the
/// user has no accounts.
pub fn parse_accounts(summary: &Document, institution_label: &str) -> Result<Vec<Account>> {
    let unexpected = |details: String| ScrapeError::UnexpectedPage {
        url: summary.url().to_string(),
        details,
    };

    if summary.html().select(&CONTENT).next().is_none() {
        return Err(unexpected("no #content container".to_owned()));
    }

    let mut accounts = vec![];
    for (idx, block) in summary.html().select(&ACCOUNT_BLOCK).enumerate() {
        // the label may be a pseudo the user gave the account
        let label = nth_text(&block, &LABEL, 0).unwrap_or_default();

        let number = nth_text(&block, &NUMBER, 1)
            .map(|raw| raw.replace(NUMBER_PREFIX, "").trim().to_owned())
            .filter(|number| !number.is_empty())
            .ok_or_else(|| unexpected(format!("account block {idx} has no number")))?;

        let balance = nth_text(&block, &BALANCE, 1)
            .ok_or_else(|| unexpected(format!("account {number} has no balance")))?;
        let balance = parse_amount(&balance, Direction::Credit)?;

        accounts.push(Account {
            kind: AccountType::Bank,
            institution_label: institution_label.to_owned(),
            label,
            balance,
            number,
            iban: None,
        });
    }

    Ok(accounts)
}
