//! Statement export. The portal keeps the navigation state on the server,
//! keyed by session, so the export only works after the period selection
//! page has been requested for the same account. The two steps are modelled
//! as states: [`PeriodSelected`] then [`ExportReady`].

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::{
    config::Settings,
    data::{CURRENCY, StoredAccount, Transaction, TransactionType, fingerprint},
    error::{Result, ScrapeError},
    http::{Fields, FormState, extract_form},
    statement_parsing::{
        csv_table::{CsvTable, Row, describe_row},
        normalize::{DateNormalizer, Direction, PORTAL_DATE_FORMAT, parse_amount, years_before},
    },
};

use super::auth::Session;

pub const DATE_COLUMN: &str = "Date";
pub const LABEL_COLUMN: &str = "Libellé";
pub const AMOUNT_COLUMN: &str = "Montant";
pub const DIRECTION_COLUMN: &str = "Sens";

const ACCOUNT_NUMBER_FIELD: &str = "accountExternalNumber";
const ANCHOR_FIELD: &str = "dateSolde";
const START_FIELD: &str = "dateDebOp";
const END_FIELD: &str = "dateFinOp";
const FORMAT_FIELD: &str = "outputFormatType";
const CSV_FORMAT: &str = "3";

/// Dates covered by an export, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// The server has the account's statement page as its current navigation
/// state.
pub struct PeriodSelected<'a> {
    session: &'a Session,
    settings: &'a Settings,
    account: &'a StoredAccount,
}

/// The export form was served and filled in, ready to be submitted.
pub struct ExportReady<'a> {
    session: &'a Session,
    settings: &'a Settings,
    account: &'a StoredAccount,
    pub form: FormState,
    pub window: HistoryWindow,
}

#[tracing::instrument(skip_all, fields(account = %account.account.number))]
pub async fn select_period<'a>(
    session: &'a Session,
    settings: &'a Settings,
    account: &'a StoredAccount,
) -> Result<PeriodSelected<'a>> {
    let mut form = Fields::new();
    form.insert(
        ACCOUNT_NUMBER_FIELD.to_owned(),
        account.account.number.to_owned(),
    );

    // only the server side effect matters here
    session
        .client()
        .post_document(&settings.endpoints.select_period, Some(form))
        .await?;

    debug!("period selected");

    Ok(PeriodSelected {
        session,
        settings,
        account,
    })
}

impl<'a> PeriodSelected<'a> {
    #[tracing::instrument(skip_all, fields(account = %self.account.account.number))]
    pub async fn prepare_export(self) -> Result<ExportReady<'a>> {
        let page = self
            .session
            .client()
            .post_document(&self.settings.endpoints.prepare_download, None)
            .await?;

        let form = extract_form(&page, &self.settings.endpoints.download_form)?;
        let (form, window) = export_form(
            &form,
            &self.settings.date_normalizer(),
            self.settings.history_years,
        )
        .map_err(|err| match err {
            ScrapeError::UnexpectedPage { details, .. } => ScrapeError::UnexpectedPage {
                url: page.url().to_string(),
                details,
            },
            other => other,
        })?;

        debug!(start = %window.start, end = %window.end, "export ready");

        Ok(ExportReady {
            session: self.session,
            settings: self.settings,
            account: self.account,
            form,
            window,
        })
    }
}

impl ExportReady<'_> {
    #[tracing::instrument(skip_all, fields(account = %self.account.account.number))]
    pub async fn download(self) -> Result<Vec<Transaction>> {
        let table = self
            .session
            .client()
            .post_table(
                self.form.action.as_str(),
                self.form.fields,
                self.settings.export_delimiter,
            )
            .await?;

        debug!(rows = table.rows.len(), "export downloaded");

        to_transactions(&table, self.account, &self.settings.date_normalizer())
    }
}

/// Fills the export form: history starts `years` before the server's anchor
/// date and ends on it.
pub fn export_form(
    form: &FormState,
    normalizer: &DateNormalizer,
    years: u32,
) -> Result<(FormState, HistoryWindow)> {
    let anchor_raw = form
        .get(ANCHOR_FIELD)
        .map(str::trim)
        .filter(|anchor| !anchor.is_empty())
        .ok_or_else(|| ScrapeError::UnexpectedPage {
            url: form.action.to_string(),
            details: format!("export form has no {ANCHOR_FIELD}"),
        })?
        .to_owned();

    let end = normalizer.parse_date(&anchor_raw)?;
    let start = years_before(end, years).ok_or_else(|| ScrapeError::date(&anchor_raw))?;

    let form = form.merged([
        (START_FIELD, start.format(PORTAL_DATE_FORMAT).to_string()),
        (END_FIELD, anchor_raw),
        (FORMAT_FIELD, CSV_FORMAT.to_owned()),
    ]);

    Ok((form, HistoryWindow { start, end }))
}

/// Maps export rows to transactions, keeping the row order.
pub fn to_transactions(
    table: &CsvTable,
    account: &StoredAccount,
    normalizer: &DateNormalizer,
) -> Result<Vec<Transaction>> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut transactions = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let tx = to_transaction(row, account, normalizer, &mut seen).map_err(|source| {
            ScrapeError::StatementRow {
                account_number: account.account.number.to_owned(),
                row: describe_row(row),
                source: Box::new(source),
            }
        })?;

        transactions.push(tx);
    }

    Ok(transactions)
}

fn to_transaction(
    row: &Row,
    account: &StoredAccount,
    normalizer: &DateNormalizer,
    seen: &mut HashMap<String, usize>,
) -> Result<Transaction> {
    let column = |name: &str| row.get(name).map(String::as_str).unwrap_or_default();

    let label = column(LABEL_COLUMN).to_owned();
    let amount = parse_amount(
        column(AMOUNT_COLUMN),
        Direction::from_indicator(column(DIRECTION_COLUMN)),
    )?;
    let date = normalizer.normalize(column(DATE_COLUMN))?;

    let occurrence = seen
        .entry(format!("{}|{amount:.2}|{label}", date.date_naive()))
        .or_default();
    let fingerprint = fingerprint(&account.id, &date, amount, &label, *occurrence);
    *occurrence += 1;

    Ok(Transaction {
        label,
        kind: TransactionType::None,
        date,
        amount,
        currency: CURRENCY.to_owned(),
        account: account.id.to_owned(),
        fingerprint,
    })
}

/// Runs the whole export for one account.
#[tracing::instrument(skip_all, fields(account = %account.account.number))]
pub async fn fetch_operations(
    session: &Session,
    settings: &Settings,
    account: &StoredAccount,
) -> Result<Vec<Transaction>> {
    info!(
        "getting operations for {} over the last {} years",
        account.account.label, settings.history_years
    );

    let fetched: Result<Vec<Transaction>> = async {
        select_period(session, settings, account)
            .await?
            .prepare_export()
            .await?
            .download()
            .await
    }
    .await;

    fetched.map_err(|err| match err {
        ScrapeError::StatementRow { .. } => err,
        source => ScrapeError::Statement {
            account_number: account.account.number.to_owned(),
            source: Box::new(source),
        },
    })
}
