use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::WikiConfig;
use crate::error::{Error, Result};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Query-string parameters for one API request.
pub type Params = BTreeMap<String, String>;

/// Build a [`Params`] map from string pairs.
pub fn params<const N: usize>(pairs: [(&str, &str); N]) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    /// Used for requests whose parameters can outgrow a URL (long title lists).
    Post,
}

// ---------------------------------------------------------------------------
// Client abstraction (for testability)
// ---------------------------------------------------------------------------

/// An authenticated `action=query` capability against a MediaWiki API.
pub trait WikiClient {
    /// Run a query. Implementations add `action=query` and `format=json`.
    /// Returns the whole response body; API-level errors are reported as
    /// [`Error::BackendQuery`].
    fn query(&self, params: &Params, method: Method) -> Result<serde_json::Value>;
}

impl<T: WikiClient + ?Sized> WikiClient for &T {
    fn query(&self, params: &Params, method: Method) -> Result<serde_json::Value> {
        (**self).query(params, method)
    }
}

impl<T: WikiClient + ?Sized> WikiClient for Box<T> {
    fn query(&self, params: &Params, method: Method) -> Result<serde_json::Value> {
        (**self).query(params, method)
    }
}

/// Bot-password credentials for `action=login`.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolve login credentials from the configured environment variables.
/// No username means anonymous access; a username without a password is a
/// configuration error.
pub fn resolve_credentials(username_env: &str, password_env: &str) -> Result<Option<Credentials>> {
    let Ok(username) = std::env::var(username_env) else {
        return Ok(None);
    };
    if username.trim().is_empty() {
        return Ok(None);
    }
    let password = std::env::var(password_env).map_err(|_| {
        Error::ConfigValidation(format!(
            "${username_env} is set but ${password_env} is not"
        ))
    })?;
    Ok(Some(Credentials { username, password }))
}

/// MediaWiki Action API client over a cookie-carrying `ureq` agent.
pub struct MediaWikiClient {
    agent: ureq::Agent,
    api_url: String,
    assert_bot: bool,
}

impl MediaWikiClient {
    pub fn new(config: &WikiConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build();
        Self {
            agent,
            api_url: config.api_url.clone(),
            assert_bot: false,
        }
    }

    /// Connect and, when credentials are given, log in. `assert=bot` is only
    /// attached to queries after a successful login.
    pub fn connect(config: &WikiConfig, credentials: Option<&Credentials>) -> Result<Self> {
        let mut client = Self::new(config);
        if let Some(credentials) = credentials {
            client.login(credentials)?;
            client.assert_bot = config.assert_bot;
        } else {
            info!("no wiki credentials configured; querying anonymously");
        }
        Ok(client)
    }

    fn login(&self, credentials: &Credentials) -> Result<()> {
        let reply = self.send(
            &params([
                ("action", "query"),
                ("meta", "tokens"),
                ("type", "login"),
                ("format", "json"),
            ]),
            Method::Get,
        )?;
        let token = reply
            .pointer("/query/tokens/logintoken")
            .and_then(|t| t.as_str())
            .ok_or_else(|| Error::Login("response carried no login token".to_string()))?;

        let reply = self.send(
            &params([
                ("action", "login"),
                ("lgname", credentials.username.as_str()),
                ("lgpassword", credentials.password.as_str()),
                ("lgtoken", token),
                ("format", "json"),
            ]),
            Method::Post,
        )?;
        let result = reply
            .pointer("/login/result")
            .and_then(|r| r.as_str())
            .unwrap_or("Unknown");
        if result != "Success" {
            let reason = reply
                .pointer("/login/reason")
                .and_then(|r| r.as_str())
                .unwrap_or("no reason given");
            return Err(Error::Login(format!("{result}: {reason}")));
        }

        info!(user = %credentials.username, "logged in to wiki");
        Ok(())
    }

    fn send(&self, params: &Params, method: Method) -> Result<serde_json::Value> {
        let pairs: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut backoff_ms = INITIAL_BACKOFF_MS;
        for attempt in 1..=MAX_RETRIES {
            let outcome = match method {
                Method::Get => self
                    .agent
                    .get(&self.api_url)
                    .query_pairs(pairs.iter().copied())
                    .call(),
                Method::Post => self.agent.post(&self.api_url).send_form(&pairs),
            };
            match outcome {
                Ok(response) => {
                    let json: serde_json::Value = response.into_json().map_err(|e| {
                        Error::BackendQuery(format!("failed to parse API response: {e}"))
                    })?;
                    return check_api_error(json);
                }
                Err(ref e) if attempt < MAX_RETRIES && is_retryable(e) => {
                    warn!(
                        attempt,
                        error = %e,
                        backoff_ms,
                        "retrying wiki API after transient error"
                    );
                    thread::sleep(Duration::from_millis(backoff_ms));
                    backoff_ms *= 2;
                }
                Err(e) => {
                    return Err(Error::BackendQuery(format!("API request failed: {e}")));
                }
            }
        }
        unreachable!()
    }
}

impl WikiClient for MediaWikiClient {
    fn query(&self, params: &Params, method: Method) -> Result<serde_json::Value> {
        let mut full = params.clone();
        full.insert("action".to_string(), "query".to_string());
        full.insert("format".to_string(), "json".to_string());
        if self.assert_bot {
            full.insert("assert".to_string(), "bot".to_string());
        }
        debug!(?method, params = ?params, "wiki query");
        self.send(&full, method)
    }
}

/// Only retry rate-limits (429), server errors (5xx), and transport/network errors.
pub(crate) fn is_retryable(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Status(code, _) => *code == 429 || *code >= 500,
        ureq::Error::Transport(_) => true,
    }
}

/// MediaWiki reports failures in a 200 response body under `error`.
fn check_api_error(json: serde_json::Value) -> Result<serde_json::Value> {
    if let Some(error) = json.get("error") {
        let code = error.get("code").and_then(|c| c.as_str()).unwrap_or("unknown");
        let info = error.get("info").and_then(|i| i.as_str()).unwrap_or("");
        return Err(Error::BackendQuery(format!("{code}: {info}")));
    }
    if let Some(warnings) = json.get("warnings") {
        debug!(%warnings, "wiki API warnings");
    }
    Ok(json)
}
