//! Password authentication and the locally persisted session.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use masterski::helpers::{read_optional_data, remove_data, write_data};
use masterski::BackendError;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::supabase::{send, send_json, USER_AGENT};

/// Sessions this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Clone, Debug)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

/// On-disk form of [`Session`]; tokens are plain strings only here.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    user_id: Uuid,
    #[serde(default)]
    email: Option<String>,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id,
            email: session.email.clone(),
            access_token: session.access_token.expose_secret().clone(),
            refresh_token: session.refresh_token.expose_secret().clone(),
            expires_at: session.expires_at,
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            user_id: stored.user_id,
            email: stored.email,
            access_token: SecretString::new(stored.access_token),
            refresh_token: SecretString::new(stored.refresh_token),
            expires_at: stored.expires_at,
        }
    }
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<Option<Session>> {
        let Some(raw_data) = read_optional_data(&self.path)? else {
            return Ok(None);
        };

        let stored: StoredSession = serde_json::from_slice(&raw_data)
            .with_context(|| format!("reading session from {}", self.path.display()))?;

        Ok(Some(stored.into()))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        write_data(
            &self.path,
            serde_json::to_string_pretty(&StoredSession::from(session))?,
        )
    }

    pub fn clear(&self) -> Result<()> {
        remove_data(&self.path)
    }
}

#[derive(Deserialize)]
struct AuthUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|timestamp| Utc.timestamp_opt(timestamp, 0).single())
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in));

        Session {
            user_id: self.user.id,
            email: self.user.email,
            access_token: SecretString::new(self.access_token),
            refresh_token: SecretString::new(self.refresh_token),
            expires_at,
        }
    }
}

/// Sign-up answers with a session when accounts are confirmed automatically,
/// and with the bare user when an email confirmation is pending.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(AuthUser),
}

pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationPending { user_id: Uuid },
}

pub struct AuthClient {
    http: Client,
    base: Url,
    api_key: SecretString,
}

impl AuthClient {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            base: config.url.clone(),
            api_key: config.anon_key.clone(),
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        bearer: &SecretString,
    ) -> Result<RequestBuilder, BackendError> {
        let url = self
            .base
            .join(path)
            .map_err(|error| BackendError::Transport(format!("invalid endpoint {path}: {error}")))?;

        Ok(self
            .http
            .request(method, url)
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(bearer.expose_secret()))
    }

    async fn token(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, BackendError> {
        let request = self
            .request(Method::POST, "auth/v1/token", &self.api_key)?
            .query(&[("grant_type", grant_type)])
            .json(&body);

        let response: TokenResponse = serde_json::from_value(send_json(request).await?)?;

        Ok(response.into_session(Utc::now()))
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, BackendError> {
        let session = self
            .token(
                "password",
                json!({ "email": email, "password": password.expose_secret() }),
            )
            .await?;

        info!(user_id = %session.user_id, "signed in");

        Ok(session)
    }

    pub async fn refresh(&self, session: &Session) -> Result<Session, BackendError> {
        let session = self
            .token(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token.expose_secret() }),
            )
            .await?;

        debug!(user_id = %session.user_id, expires_at = %session.expires_at, "session refreshed");

        Ok(session)
    }

    /// Registers a new account, storing the names as user metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        first_name: &str,
        last_name: &str,
    ) -> Result<SignUpOutcome, BackendError> {
        let request = self
            .request(Method::POST, "auth/v1/signup", &self.api_key)?
            .json(&json!({
                "email": email,
                "password": password.expose_secret(),
                "data": { "first_name": first_name, "last_name": last_name },
            }));

        let outcome = match serde_json::from_value::<SignUpResponse>(send_json(request).await?)? {
            SignUpResponse::Session(response) => {
                SignUpOutcome::SignedIn(response.into_session(Utc::now()))
            }
            SignUpResponse::User(user) => SignUpOutcome::ConfirmationPending { user_id: user.id },
        };

        Ok(outcome)
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), BackendError> {
        let request = self.request(Method::POST, "auth/v1/logout", &session.access_token)?;

        send(request).await?;

        info!(user_id = %session.user_id, "signed out");

        Ok(())
    }
}
