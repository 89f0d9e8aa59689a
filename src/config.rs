use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use dotenv::dotenv;
use encoding_rs::Encoding;
use serde::Deserialize;
use tracing::warn;

use crate::statement_parsing::{locale::Locale, normalize::DateNormalizer};

pub const DEFAULT_BASE_URL: &str = "https://www.credit-cooperatif.coop";
pub const INSTITUTION_LABEL: &str = "Crédit Coopératif";

#[derive(Deserialize)]
pub struct EnvironmentVariables {
    pub bank_login: String,
    pub bank_password: String,
    pub base_url: Option<String>,
    pub encoding: Option<String>,
    pub time_zone: Option<String>,
    pub locale: Option<String>,
    pub history_years: Option<u32>,
    pub iban_concurrency: Option<usize>,
    pub failure_policy: Option<FailurePolicy>,
    pub store_path: Option<String>,
}

/// What to do when one account's IBAN lookup or statement fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure, keep going with the other accounts.
    #[default]
    Isolate,
    /// Abort the run on the first failure.
    FailFast,
}

pub struct Config {
    pub credentials: Credentials,
    pub settings: Settings,
    pub store_path: String,
}

impl Config {
    pub fn new() -> Result<Self, anyhow::Error> {
        let _ = dotenv().map_err(|err| warn!("error loading .env: {:?}", err));

        let envs =
            envy::from_env::<EnvironmentVariables>().context("invalid environment variables")?;

        let mut settings = Settings::default();

        if let Some(base_url) = envs.base_url {
            settings.base_url = base_url;
        }
        if let Some(label) = envs.encoding {
            settings.encoding = Encoding::for_label(label.as_bytes())
                .ok_or_else(|| anyhow!("unknown encoding {label}"))?;
        }
        if let Some(tz) = envs.time_zone {
            settings.time_zone = tz
                .parse::<Tz>()
                .map_err(|err| anyhow!("invalid time zone {tz}: {err}"))?;
        }
        if let Some(locale) = envs.locale {
            settings.locale =
                Locale::from_name(&locale).ok_or_else(|| anyhow!("unsupported locale {locale}"))?;
        }
        if let Some(years) = envs.history_years {
            settings.history_years = years;
        }
        if let Some(concurrency) = envs.iban_concurrency {
            settings.iban_concurrency = concurrency.max(1);
        }
        if let Some(policy) = envs.failure_policy {
            settings.failure_policy = policy;
        }

        return Ok(Config {
            credentials: Credentials {
                login: envs.bank_login,
                password: envs.bank_password,
            },
            settings,
            store_path: envs.store_path.unwrap_or("bank-data.json".to_owned()),
        });
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

/// Paths on the portal, relative to the base url.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub login: String,
    pub login_form: String,
    pub login_error: String,
    pub accounts_summary: String,
    pub iban_lookup: String,
    pub select_period: String,
    pub prepare_download: String,
    pub download_form: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "portail/particuliers/login.do".to_owned(),
            login_form: "#AuthForm".to_owned(),
            login_error: ".errorForm-msg ul".to_owned(),
            accounts_summary: "portail/particuliers/mescomptes/synthese.do".to_owned(),
            iban_lookup: "portail/particuliers/mesoperations/ribiban/telechargementribajax.do"
                .to_owned(),
            select_period: "portail/particuliers/mescomptes/relevedesoperations.do".to_owned(),
            prepare_download: "portail/particuliers/mescomptes/telechargementoperationsajax.do"
                .to_owned(),
            download_form: "#downloadForm".to_owned(),
        }
    }
}

/// Everything locale, zone, charset or site dependent, passed explicitly to
/// the client and the normalizers.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub institution_label: String,
    pub encoding: &'static Encoding,
    pub time_zone: Tz,
    pub locale: Locale,
    pub history_years: u32,
    pub iban_concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub export_delimiter: u8,
    pub endpoints: Endpoints,
}

impl Settings {
    pub fn date_normalizer(&self) -> DateNormalizer {
        DateNormalizer::new(self.time_zone, self.locale.clone())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            institution_label: INSTITUTION_LABEL.to_owned(),
            encoding: encoding_rs::WINDOWS_1252,
            time_zone: chrono_tz::Europe::Paris,
            locale: Locale::french(),
            history_years: 10,
            iban_concurrency: 4,
            failure_policy: FailurePolicy::Isolate,
            export_delimiter: b';',
            endpoints: Endpoints::default(),
        }
    }
}
