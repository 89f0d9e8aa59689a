use indexmap::IndexMap;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use url::Url;

use crate::error::{Result, ScrapeError};

use super::document::{Document, element_text, selector};

pub type Fields = IndexMap<String, String>;

static FORM_CONTROLS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("input, select, textarea").expect("form controls selector"));
static OPTIONS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("option").expect("options selector"));

/// Submission target and current values of a form, as captured from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub action: Url,
    pub fields: Fields,
}

impl FormState {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|value| value.as_str())
    }

    /// Copy of this state with `overrides` applied. Existing fields keep their
    /// position, new ones are appended.
    pub fn merged<I, K, V>(&self, overrides: I) -> FormState
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut fields = self.fields.clone();
        for (name, value) in overrides {
            fields.insert(name.into(), value.into());
        }

        FormState {
            action: self.action.clone(),
            fields,
        }
    }
}

#[tracing::instrument(skip(document), fields(url = %document.url()))]
pub fn extract_form(document: &Document, form_selector: &str) -> Result<FormState> {
    let sel = selector(form_selector)?;
    let forms = document.html().select(&sel).collect::<Vec<_>>();

    let form = match forms.as_slice() {
        [form] => *form,
        [] => {
            return Err(ScrapeError::FormNotFound {
                selector: form_selector.to_owned(),
                url: document.url().to_string(),
            });
        }
        many => {
            return Err(ScrapeError::AmbiguousForm {
                selector: form_selector.to_owned(),
                url: document.url().to_string(),
                count: many.len(),
            });
        }
    };

    let base = document.base_url();
    let action = match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => {
            base.join(action)
                .map_err(|err| ScrapeError::UnexpectedPage {
                    url: document.url().to_string(),
                    details: format!("invalid form action {action:?}: {err}"),
                })?
        }
        _ => document.url().clone(),
    };

    let mut fields = Fields::new();
    for control in form.select(&FORM_CONTROLS) {
        for (name, value) in serialize_control(&control) {
            fields.insert(name, value);
        }
    }

    tracing::debug!(%action, fields = fields.len(), "extracted form {form_selector}");

    Ok(FormState { action, fields })
}

fn serialize_control(control: &ElementRef) -> Vec<(String, String)> {
    let el = control.value();

    let Some(name) = el.attr("name").filter(|name| !name.is_empty()) else {
        return vec![];
    };
    if el.attr("disabled").is_some() {
        return vec![];
    }

    match el.name() {
        "input" => {
            let kind = el.attr("type").unwrap_or("text").to_ascii_lowercase();
            match kind.as_str() {
                "submit" | "button" | "image" | "reset" | "file" => vec![],
                "checkbox" | "radio" => {
                    if el.attr("checked").is_some() {
                        vec![(name.to_owned(), el.attr("value").unwrap_or("on").to_owned())]
                    } else {
                        vec![]
                    }
                }
                _ => vec![(name.to_owned(), el.attr("value").unwrap_or("").to_owned())],
            }
        }
        "select" => {
            let options = control.select(&OPTIONS).collect::<Vec<_>>();
            let selected = options
                .iter()
                .filter(|option| option.value().attr("selected").is_some())
                .collect::<Vec<_>>();

            let chosen: Vec<&ElementRef> = if el.attr("multiple").is_some() {
                selected
            } else {
                selected
                    .last()
                    .copied()
                    .or(options.first())
                    .into_iter()
                    .collect()
            };

            chosen
                .into_iter()
                .map(|option| (name.to_owned(), option_value(option)))
                .collect()
        }
        "textarea" => vec![(name.to_owned(), element_text(control))],
        _ => vec![],
    }
}

fn option_value(option: &ElementRef) -> String {
    match option.value().attr("value") {
        Some(value) => value.to_owned(),
        None => element_text(option).trim().to_owned(),
    }
}
