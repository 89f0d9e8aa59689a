use reqwest::StatusCode;
use tracing::{info, warn};

use crate::{
    config::{Credentials, Endpoints},
    error::{Result, ScrapeError},
    http::{Document, SessionClient, extract_form},
};

const USERNAME_FIELD: &str = "j_username";
const PASSWORD_FIELD: &str = "j_password";

/// Client that went through a successful login. Every later stage takes one
/// of these.
#[derive(Clone)]
pub struct Session {
    client: SessionClient,
}

impl Session {
    pub fn client(&self) -> &SessionClient {
        &self.client
    }
}

/// Decides from the login response whether the portal accepted the
/// credentials. `Err` carries the portal's message.
pub trait LoginValidator {
    fn validate(&self, status: StatusCode, document: &Document) -> Result<(), String>;
}

/// Login succeeded when the error region of the page is empty.
pub struct ErrorRegionValidator {
    pub selector: String,
}

impl LoginValidator for ErrorRegionValidator {
    fn validate(&self, _status: StatusCode, document: &Document) -> Result<(), String> {
        let message = document.text_of(&self.selector).map_err(|err| err.to_string())?;

        if message.is_empty() {
            Ok(())
        } else {
            Err(message)
        }
    }
}

#[tracing::instrument(skip(client, credentials, validator))]
pub async fn login(
    client: SessionClient,
    login_path: &str,
    form_selector: &str,
    credentials: &Credentials,
    validator: &impl LoginValidator,
) -> Result<Session> {
    info!("logging in");

    let login_page = client.get_document(login_path).await?;
    let form = extract_form(&login_page, form_selector)?.merged([
        (USERNAME_FIELD, credentials.login.as_str()),
        (PASSWORD_FIELD, credentials.password.as_str()),
    ]);
    drop(login_page);

    let result = client
        .post_document(form.action.as_str(), Some(form.fields))
        .await?;

    if let Err(message) = validator.validate(result.status(), &result) {
        warn!("login rejected: {message}");
        return Err(ScrapeError::Authentication(message));
    }

    info!("logged in");

    Ok(Session { client })
}

/// Login with the portal's own form and error region.
pub async fn login_with_endpoints(
    client: SessionClient,
    endpoints: &Endpoints,
    credentials: &Credentials,
) -> Result<Session> {
    let validator = ErrorRegionValidator {
        selector: endpoints.login_error.clone(),
    };

    login(
        client,
        &endpoints.login,
        &endpoints.login_form,
        credentials,
        &validator,
    )
    .await
}
