use std::{
    collections::HashMap,
    io,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    Form, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use coop_sync::config::{Credentials, Settings};
use encoding_rs::WINDOWS_1252;

pub const LOGIN: &str = "jdupont";
pub const PASSWORD: &str = "s3cret";
pub const LOGIN_ERROR: &str = "Identifiant ou mot de passe incorrect";

const SESSION_COOKIE: &str = "JSESSIONID=stub-session";

#[derive(Clone)]
pub struct StubAccount {
    pub label: String,
    pub number: String,
    pub balance: String,
    pub csv: String,
}

#[derive(Default)]
pub struct StubState {
    pub accounts: Mutex<Vec<StubAccount>>,
    pub date_solde: Mutex<String>,
    pub fail_iban_for: Mutex<Option<String>>,
    pub fail_export_for: Mutex<Option<String>>,
    /// `METHOD path` of every request, in arrival order.
    pub requests: Mutex<Vec<String>>,
    /// Fields of every export submission.
    pub exports: Mutex<Vec<HashMap<String, String>>>,
    selected_account: Mutex<Option<String>>,
}

impl StubState {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn exports(&self) -> Vec<HashMap<String, String>> {
        self.exports.lock().unwrap().clone()
    }

    fn log(&self, entry: &str) {
        self.requests.lock().unwrap().push(entry.to_owned());
    }
}

pub struct StubBank {
    pub addr: SocketAddr,
    pub state: Arc<StubState>,
}

impl StubBank {
    pub async fn start(accounts: Vec<StubAccount>) -> Self {
        let state = Arc::new(StubState::default());
        *state.accounts.lock().unwrap() = accounts;
        *state.date_solde.lock().unwrap() = "31/12/2020".to_owned();

        let app = Router::new()
            .route("/portail/particuliers/login.do", get(login_page))
            .route("/portail/particuliers/j_security_check", post(login_submit))
            .route("/portail/particuliers/mescomptes/synthese.do", get(summary))
            .route(
                "/portail/particuliers/mesoperations/ribiban/telechargementribajax.do",
                post(iban),
            )
            .route(
                "/portail/particuliers/mescomptes/relevedesoperations.do",
                post(select_period),
            )
            .route(
                "/portail/particuliers/mescomptes/telechargementoperationsajax.do",
                post(prepare_download),
            )
            .route(
                "/portail/particuliers/mescomptes/telechargement.do",
                post(download),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            base_url: format!("http://{}", self.addr),
            ..Settings::default()
        }
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        login: LOGIN.to_owned(),
        password: PASSWORD.to_owned(),
    }
}

pub fn wrong_credentials() -> Credentials {
    Credentials {
        login: LOGIN.to_owned(),
        password: "nope".to_owned(),
    }
}

pub fn account(label: &str, number: &str, balance: &str, csv: &str) -> StubAccount {
    StubAccount {
        label: label.to_owned(),
        number: number.to_owned(),
        balance: balance.to_owned(),
        csv: csv.to_owned(),
    }
}

/// Formatted log output of the current thread, captured while the guard
/// returned by [`CapturedLogs::start`] is alive.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn start() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn latin1(status: StatusCode, content_type: &'static str, body: &str) -> Response {
    let (bytes, _, _) = WINDOWS_1252.encode(body);

    (
        status,
        [(header::CONTENT_TYPE, content_type)],
        bytes.into_owned(),
    )
        .into_response()
}

fn html(body: &str) -> Response {
    latin1(StatusCode::OK, "text/html; charset=ISO-8859-1", body)
}

fn logged_in(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|cookies| cookies.contains(SESSION_COOKIE))
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "session expirée").into_response()
}

async fn login_page(State(state): State<Arc<StubState>>) -> Response {
    state.log("GET login.do");

    html(
        r#"<html><body>
          <span class="navSecurite">sécurité</span>
          <form id="AuthForm" method="post" action="/portail/particuliers/j_security_check">
            <input type="hidden" name="lt" value="LT-123">
            <input type="text" name="j_username" value="">
            <input type="password" name="j_password" value="">
            <input type="submit" value="Valider">
          </form>
        </body></html>"#,
    )
}

async fn login_submit(
    State(state): State<Arc<StubState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    state.log("POST j_security_check");

    let valid = fields.get("lt").map(String::as_str) == Some("LT-123")
        && fields.get("j_username").map(String::as_str) == Some(LOGIN)
        && fields.get("j_password").map(String::as_str) == Some(PASSWORD);

    if !valid {
        return html(&format!(
            r#"<div class="errorForm-msg"><ul><li>{LOGIN_ERROR}</li></ul></div>"#
        ));
    }

    let mut res = html(r#"<div class="errorForm-msg"><ul></ul></div><h1>Bienvenue</h1>"#);
    res.headers_mut().insert(
        header::SET_COOKIE,
        format!("{SESSION_COOKIE}; Path=/").parse().unwrap(),
    );
    res
}

async fn summary(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.log("GET synthese.do");
    if !logged_in(&headers) {
        return forbidden();
    }

    let blocks = state
        .accounts
        .lock()
        .unwrap()
        .iter()
        .map(|account| {
            format!(
                r#"<table><thead><tr>
                     <th><span class="tt_compte">{label}</span>
                       <ul class="nClient"><li>M. JEAN DUPONT</li><li>N°{number}</li></ul></th>
                     <th class="sum_solde"><span>Solde</span><span>{balance}</span></th>
                   </tr></thead></table>"#,
                label = account.label,
                number = account.number,
                balance = account.balance,
            )
        })
        .collect::<String>();

    html(&format!(r#"<div id="content">{blocks}</div>"#))
}

async fn iban(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let number = fields.get("accountExternalNumber").cloned().unwrap_or_default();
    state.log(&format!("POST telechargementribajax.do {number}"));
    if !logged_in(&headers) {
        return forbidden();
    }

    if state.fail_iban_for.lock().unwrap().as_deref() == Some(number.as_str()) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "erreur").into_response();
    }

    html(&format!(
        r#"<div><p>IBAN</p><span class="iban"> FR76 4255 9000 {number} </span></div>"#
    ))
}

async fn select_period(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let number = fields.get("accountExternalNumber").cloned().unwrap_or_default();
    state.log(&format!("POST relevedesoperations.do {number}"));
    if !logged_in(&headers) {
        return forbidden();
    }

    *state.selected_account.lock().unwrap() = Some(number);

    html("<h1>Relevé des opérations</h1>")
}

async fn prepare_download(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.log("POST telechargementoperationsajax.do");
    if !logged_in(&headers) {
        return forbidden();
    }

    let Some(number) = state.selected_account.lock().unwrap().clone() else {
        return (StatusCode::CONFLICT, "aucun compte").into_response();
    };
    let date_solde = state.date_solde.lock().unwrap().clone();

    html(&format!(
        r#"<form id="downloadForm" method="post" action="portail/particuliers/mescomptes/telechargement.do">
             <input type="hidden" name="dateSolde" value="{date_solde}">
             <input type="hidden" name="ticket" value="{number}">
             <input type="text" name="dateDebOp" value="">
             <input type="text" name="dateFinOp" value="">
             <select name="outputFormatType"><option value="1" selected>PDF</option><option value="3">CSV</option></select>
           </form>"#
    ))
}

async fn download(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    state.log("POST telechargement.do");
    if !logged_in(&headers) {
        return forbidden();
    }

    let selected = state.selected_account.lock().unwrap().take();
    let ticket = fields.get("ticket").cloned();
    state.exports.lock().unwrap().push(fields);

    let Some(number) = selected.filter(|number| Some(number) == ticket.as_ref()) else {
        return (StatusCode::CONFLICT, "navigation invalide").into_response();
    };

    if state.fail_export_for.lock().unwrap().as_deref() == Some(number.as_str()) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "erreur").into_response();
    }

    let csv = state
        .accounts
        .lock()
        .unwrap()
        .iter()
        .find(|account| account.number == number)
        .map(|account| account.csv.clone())
        .unwrap_or_default();

    latin1(StatusCode::OK, "text/csv; charset=ISO-8859-1", &csv)
}
