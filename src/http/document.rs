use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{Result, ScrapeError};

/// A parsed HTML response together with where it came from.
pub struct Document {
    html: Html,
    url: Url,
    status: StatusCode,
    site: Option<Url>,
}

impl Document {
    pub fn parse(body: &str, url: Url, status: StatusCode) -> Self {
        return Self {
            html: Html::parse_document(body),
            url,
            status,
            site: None,
        };
    }

    /// Root of the site the page belongs to. Without a `<base href>`, relative
    /// links resolve against it instead of the page URL.
    pub fn with_site(mut self, site: Url) -> Self {
        self.site = Some(site);
        self
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Base for relative links: the first `<base href>` if any, else the
    /// site root, else the document URL.
    pub fn base_url(&self) -> Url {
        let fallback = || self.site.clone().unwrap_or_else(|| self.url.clone());

        let Ok(base) = selector("base[href]") else {
            return fallback();
        };

        self.html
            .select(&base)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| self.url.join(href).ok())
            .unwrap_or_else(fallback)
    }

    /// Concatenated text of every element matching `css`, trimmed.
    pub fn text_of(&self, css: &str) -> Result<String> {
        let sel = selector(css)?;

        Ok(self
            .html
            .select(&sel)
            .map(|el| element_text(&el))
            .collect::<String>()
            .trim()
            .to_owned())
    }
}

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| ScrapeError::InvalidSelector(format!("{css}: {err}")))
}

pub fn element_text(el: &ElementRef) -> String {
    el.text().collect()
}

/// Text of the `nth` match of `css` below `el`, trimmed.
pub fn nth_text(el: &ElementRef, css: &Selector, nth: usize) -> Option<String> {
    el.select(css)
        .nth(nth)
        .map(|found| element_text(&found).trim().to_owned())
}
