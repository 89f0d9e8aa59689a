use std::sync::Arc;

use anyhow::{Context, anyhow};
use encoding_rs::Encoding;
use reqwest::{
    Client, ClientBuilder, Method,
    cookie::{CookieStore, Jar},
    header::{CONTENT_TYPE, HeaderValue},
};
use url::{Url, form_urlencoded};

use crate::{error::Result, error::ScrapeError, statement_parsing::csv_table::CsvTable};

pub mod document;
pub mod form;

pub use document::Document;
pub use form::{Fields, FormState, extract_form};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Document,
    CsvTable { delimiter: u8 },
}

#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Absolute URL, or a path resolved against the client's base URL.
    pub uri: String,
    pub method: Method,
    pub form: Option<Fields>,
    pub mode: ResponseMode,
}

impl RequestSpec {
    pub fn get(uri: impl Into<String>) -> Self {
        return Self {
            uri: uri.into(),
            method: Method::GET,
            form: None,
            mode: ResponseMode::Document,
        };
    }

    pub fn post(uri: impl Into<String>, form: Option<Fields>) -> Self {
        return Self {
            uri: uri.into(),
            method: Method::POST,
            form,
            mode: ResponseMode::Document,
        };
    }

    pub fn csv(mut self, delimiter: u8) -> Self {
        self.mode = ResponseMode::CsvTable { delimiter };
        self
    }
}

pub enum Response {
    Document(Document),
    Table(CsvTable),
}

/// HTTP client bound to one site: one cookie jar and one charset for every
/// request and response.
#[derive(Clone)]
pub struct SessionClient {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
    encoding: &'static Encoding,
}

impl SessionClient {
    pub fn new(base_url: &str, encoding: &'static Encoding) -> Result<Self> {
        let mut base_url = Url::parse(base_url).context("invalid base url")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let jar = Arc::new(Jar::default());
        let client = ClientBuilder::new()
            .cookie_provider(jar.clone())
            .build()
            .context("error creating http client")?;

        return Ok(Self {
            client,
            jar,
            base_url,
            encoding,
        });
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn resolve(&self, uri: &str) -> Result<Url> {
        let url = self
            .base_url
            .join(uri)
            .with_context(|| format!("invalid request uri {uri:?}"))?;

        Ok(url)
    }

    /// `Cookie` header the jar would send to `uri`.
    pub fn cookies_for(&self, uri: &str) -> Option<String> {
        let url = self.resolve(uri).ok()?;

        self.jar
            .cookies(&url)
            .and_then(|value| value.to_str().ok().map(|s| s.to_owned()))
    }

    #[tracing::instrument(skip(self, spec), fields(method = %spec.method, uri = %spec.uri))]
    pub async fn request(&self, spec: RequestSpec) -> Result<Response> {
        let url = self.resolve(&spec.uri)?;

        let mut req = self.client.request(spec.method.clone(), url.clone());
        if let Some(form) = &spec.form {
            req = req
                .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
                .body(encode_form(form, self.encoding));
        }

        let res = req.send().await.map_err(|source| ScrapeError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = res.status();
        // redirects are followed, keep the final url
        let final_url = res.url().clone();
        tracing::debug!(%status, %final_url, "response");

        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let bytes = res.bytes().await.map_err(|source| ScrapeError::Transport {
            url: url.to_string(),
            source,
        })?;
        let (body, _, had_errors) = self.encoding.decode(&bytes);
        if had_errors {
            tracing::warn!("response from {url} is not valid {}", self.encoding.name());
        }

        match spec.mode {
            ResponseMode::Document => Ok(Response::Document(
                Document::parse(&body, final_url, status).with_site(self.base_url.clone()),
            )),
            ResponseMode::CsvTable { delimiter } => {
                Ok(Response::Table(CsvTable::parse(&body, delimiter)?))
            }
        }
    }

    pub async fn get_document(&self, uri: &str) -> Result<Document> {
        self.request(RequestSpec::get(uri)).await?.into_document()
    }

    pub async fn post_document(&self, uri: &str, form: Option<Fields>) -> Result<Document> {
        self.request(RequestSpec::post(uri, form))
            .await?
            .into_document()
    }

    pub async fn post_table(&self, uri: &str, form: Fields, delimiter: u8) -> Result<CsvTable> {
        self.request(RequestSpec::post(uri, Some(form)).csv(delimiter))
            .await?
            .into_table()
    }
}

impl Response {
    pub fn into_document(self) -> Result<Document> {
        match self {
            Response::Document(doc) => Ok(doc),
            Response::Table(_) => Err(anyhow!("expected a document, got a table").into()),
        }
    }

    pub fn into_table(self) -> Result<CsvTable> {
        match self {
            Response::Table(table) => Ok(table),
            Response::Document(_) => Err(anyhow!("expected a table, got a document").into()),
        }
    }
}

/// `application/x-www-form-urlencoded` body with names and values encoded in
/// `encoding` before percent-encoding.
pub fn encode_form(fields: &Fields, encoding: &'static Encoding) -> String {
    let encode = |s: &str| {
        let (bytes, _, _) = encoding.encode(s);
        form_urlencoded::byte_serialize(&bytes).collect::<String>()
    };

    fields
        .iter()
        .map(|(name, value)| format!("{}={}", encode(name), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}
