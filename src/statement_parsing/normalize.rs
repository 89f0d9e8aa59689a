use chrono::{DateTime, FixedOffset, Months, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::error::{Result, ScrapeError};

use super::locale::Locale;

/// Format the portal expects in its date fields.
pub const PORTAL_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Debit,
    #[default]
    Credit,
}

impl Direction {
    /// Anything other than `DEBIT` counts as a credit. The match ignores
    /// surrounding whitespace and case, so `" debit "` is a debit too.
    pub fn from_indicator(indicator: &str) -> Self {
        if indicator.trim().eq_ignore_ascii_case("DEBIT") {
            Direction::Debit
        } else {
            Direction::Credit
        }
    }
}

/// Parses an amount like `1 234,56 €` or `-12,30`, negating it for debits.
pub fn parse_amount(raw: &str, direction: Direction) -> Result<f64> {
    let cleaned = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '+' | '-'))
        .collect::<String>()
        .replace(',', ".");

    let value = leading_number(&cleaned).ok_or_else(|| ScrapeError::amount(raw))?;

    let amount = match direction {
        Direction::Debit => -value,
        Direction::Credit => value,
    };

    Ok(amount)
}

// Longest numeric prefix, so trailing noise like `12.30-` still yields 12.30.
fn leading_number(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let fraction_start = end + 1;
        let mut fraction_end = fraction_start;
        while fraction_end < bytes.len() && bytes[fraction_end].is_ascii_digit() {
            fraction_end += 1;
        }
        if fraction_end > fraction_start || has_digits {
            has_digits |= fraction_end > fraction_start;
            end = fraction_end;
        }
    }

    if !has_digits {
        return None;
    }

    s[..end].trim_end_matches('.').parse::<f64>().ok()
}

/// Turns portal dates into zoned timestamps at local midnight.
#[derive(Debug, Clone)]
pub struct DateNormalizer {
    time_zone: Tz,
    locale: Locale,
}

impl DateNormalizer {
    pub fn new(time_zone: Tz, locale: Locale) -> Self {
        return Self { time_zone, locale };
    }

    /// Accepts `15/01/2021`, `15-01-2021`, `15 janv. 2021` and `15/janv./2021`.
    pub fn parse_date(&self, raw: &str) -> Result<NaiveDate> {
        let parts = raw
            .split(|c: char| c.is_whitespace() || c == '/' || c == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>();

        let [day, month, year] = parts.as_slice() else {
            return Err(ScrapeError::date(raw));
        };

        let day = day.parse::<u32>().map_err(|_| ScrapeError::date(raw))?;
        let month = match month.parse::<u32>() {
            Ok(month) => month,
            Err(_) => self
                .locale
                .month_number(month)
                .ok_or_else(|| ScrapeError::date(raw))?,
        };
        if year.len() != 4 {
            return Err(ScrapeError::date(raw));
        }
        let year = year.parse::<i32>().map_err(|_| ScrapeError::date(raw))?;

        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| ScrapeError::date(raw))
    }

    pub fn normalize(&self, raw: &str) -> Result<DateTime<FixedOffset>> {
        let date = self.parse_date(raw)?;

        self.at_midnight(date).ok_or_else(|| ScrapeError::date(raw))
    }

    pub fn at_midnight(&self, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
        self.time_zone
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .earliest()
            .map(|dt| dt.fixed_offset())
    }
}

/// Calendar subtraction: day and month are kept, clamped to the end of the
/// month when the target year has no such day (29/02 -> 28/02).
pub fn years_before(date: NaiveDate, years: u32) -> Option<NaiveDate> {
    date.checked_sub_months(Months::new(years.checked_mul(12)?))
}

#[cfg(test)]
mod test {
    use chrono::{Datelike, NaiveDate, SecondsFormat};
    use chrono_tz::Europe::Paris;

    use crate::{
        error::{ScrapeError, ValueKind},
        statement_parsing::locale::Locale,
    };

    use super::{DateNormalizer, Direction, PORTAL_DATE_FORMAT, parse_amount, years_before};

    fn paris_fr() -> DateNormalizer {
        DateNormalizer::new(Paris, Locale::french())
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1 234,56", Direction::Credit).unwrap(), 1234.56);
        assert_eq!(parse_amount("1 234,56", Direction::Debit).unwrap(), -1234.56);
        assert_eq!(parse_amount(" 1.234,56 € ", Direction::Credit).unwrap(), 1234.56);
        assert_eq!(parse_amount("-12,30 EUR", Direction::Credit).unwrap(), -12.3);
        assert_eq!(parse_amount("+7", Direction::Credit).unwrap(), 7.0);
        assert_eq!(parse_amount("12,30-", Direction::Credit).unwrap(), 12.3);
        assert_eq!(parse_amount("0,5", Direction::Debit).unwrap(), -0.5);
    }

    #[test]
    fn test_parse_amount_sign_ignores_noise() {
        let plain = parse_amount("1234,56", Direction::Debit).unwrap();
        let noisy = parse_amount("\u{a0}1\u{a0}234,56\u{a0}€", Direction::Debit).unwrap();

        assert_eq!(plain, noisy);
    }

    #[test]
    fn test_parse_amount_malformed() {
        for raw in ["", "EUR", "--", ",", "n/a"] {
            match parse_amount(raw, Direction::Credit) {
                Err(ScrapeError::Normalization { kind, raw: got }) => {
                    assert_eq!(kind, ValueKind::Amount);
                    assert_eq!(got, raw);
                }
                other => panic!("expected normalization error for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_direction_from_indicator() {
        assert_eq!(Direction::from_indicator("DEBIT"), Direction::Debit);
        assert_eq!(Direction::from_indicator(" debit "), Direction::Debit);
        assert_eq!(Direction::from_indicator("CREDIT"), Direction::Credit);
        assert_eq!(Direction::from_indicator(""), Direction::Credit);
    }

    #[test]
    fn test_date_forms_agree() {
        let normalizer = paris_fr();

        let textual = normalizer.normalize("15 janv. 2021").unwrap();
        let numeric = normalizer.normalize("15/01/2021").unwrap();

        assert_eq!(textual, numeric);
        assert_eq!(
            textual.to_rfc3339_opts(SecondsFormat::Secs, false),
            "2021-01-15T00:00:00+01:00"
        );
    }

    #[test]
    fn test_date_summer_offset() {
        let date = paris_fr().normalize("1 août 2019").unwrap();

        assert_eq!(
            date.to_rfc3339_opts(SecondsFormat::Secs, false),
            "2019-08-01T00:00:00+02:00"
        );
    }

    #[test]
    fn test_date_other_forms() {
        let normalizer = paris_fr();

        assert_eq!(normalizer.parse_date("15/janv./2021").unwrap(), ymd(2021, 1, 15));
        assert_eq!(normalizer.parse_date("3 Décembre 2020").unwrap(), ymd(2020, 12, 3));
        assert_eq!(normalizer.parse_date("03-12-2020").unwrap(), ymd(2020, 12, 3));
    }

    #[test]
    fn test_date_alternate_locale() {
        let normalizer = DateNormalizer::new(chrono_tz::UTC, Locale::english());

        let date = normalizer.normalize("15 Jan 2021").unwrap();

        assert_eq!(date.day(), 15);
        assert_eq!(
            date.to_rfc3339_opts(SecondsFormat::Secs, false),
            "2021-01-15T00:00:00+00:00"
        );
        assert!(normalizer.normalize("15 janv. 2021").is_err());
    }

    #[test]
    fn test_date_malformed() {
        let normalizer = paris_fr();

        for raw in ["", "2021-01-15T00:00", "31/02/2021", "15 foo 2021", "15/01/21"] {
            match normalizer.normalize(raw) {
                Err(ScrapeError::Normalization { kind, raw: got }) => {
                    assert_eq!(kind, ValueKind::Date);
                    assert_eq!(got, raw);
                }
                other => panic!("expected normalization error for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_ten_year_window() {
        let start = years_before(ymd(2020, 12, 31), 10).unwrap();

        assert_eq!(start.format(PORTAL_DATE_FORMAT).to_string(), "31/12/2010");
    }

    #[test]
    fn test_ten_year_window_leap_day() {
        // 2010 is not a leap year, the day is clamped to the end of february.
        let start = years_before(ymd(2020, 2, 29), 10).unwrap();
        assert_eq!(start.format(PORTAL_DATE_FORMAT).to_string(), "28/02/2010");

        // 2008 is, the day is kept.
        let start = years_before(ymd(2020, 2, 29), 12).unwrap();
        assert_eq!(start.format(PORTAL_DATE_FORMAT).to_string(), "29/02/2008");
    }
}
