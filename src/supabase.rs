//! Reqwest-backed adapter for the hosted backend.
//!
//! Owns transport details only: endpoint layout, auth headers, HTTP error
//! mapping and JSON decoding. Query semantics live in the lib.

use async_trait::async_trait;
use masterski::backend::{Backend, BackendError, Filter, Select, Upload};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::BackendConfig;

pub(crate) const USER_AGENT: &str = concat!("masterski/", env!("CARGO_PKG_VERSION"));
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const NO_ROWS_CODE: &str = "PGRST116";

pub struct SupabaseClient {
    http: Client,
    base: Url,
    api_key: SecretString,
    access_token: Option<SecretString>,
}

impl SupabaseClient {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            base: config.url.clone(),
            api_key: config.anon_key.clone(),
            access_token: None,
        })
    }

    /// Requests from now on act as the signed-in user.
    pub fn with_access_token(mut self, token: SecretString) -> Self {
        self.access_token = Some(token);
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path)
            .map_err(|error| BackendError::Transport(format!("invalid endpoint {path}: {error}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token.as_ref().unwrap_or(&self.api_key);

        self.http
            .request(method, url)
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
    }

    fn table(&self, table: &str) -> Result<Url, BackendError> {
        self.endpoint(&format!("rest/v1/{table}"))
    }
}

pub(crate) async fn send(request: RequestBuilder) -> Result<Vec<u8>, BackendError> {
    let response = request.send().await.map_err(map_transport_error)?;

    let status = response.status();
    let body = response.bytes().await.map_err(map_transport_error)?;
    debug!(status = status.as_u16(), bytes = body.len(), "backend response");

    if !status.is_success() {
        return Err(map_status_error(status, body.as_ref()));
    }

    Ok(body.to_vec())
}

/// An empty body decodes as `null`.
pub(crate) async fn send_json(request: RequestBuilder) -> Result<Value, BackendError> {
    let body = send(request).await?;

    if body.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_slice(&body)
        .map_err(|error| BackendError::Decode(format!("invalid backend JSON payload: {error}")))
}

fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_query_pair).collect()
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn select(&self, query: &Select) -> Result<Vec<Value>, BackendError> {
        let request = self
            .request(Method::GET, self.table(&query.table)?)
            .query(&query.query_pairs());

        match send_json(request).await? {
            Value::Array(rows) => Ok(rows),
            other => Err(BackendError::Decode(format!(
                "expected an array of rows, got {}",
                body_preview(other.to_string().as_bytes())
            ))),
        }
    }

    async fn select_single(&self, query: &Select) -> Result<Value, BackendError> {
        let request = self
            .request(Method::GET, self.table(&query.table)?)
            .header(ACCEPT, SINGLE_OBJECT)
            .query(&query.query_pairs());

        send_json(request).await
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let request = self
            .request(Method::POST, self.table(table)?)
            .header("Prefer", "return=representation")
            .json(&rows);

        match send_json(request).await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            row => Ok(vec![row]),
        }
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<(), BackendError> {
        let request = self
            .request(Method::PATCH, self.table(table)?)
            .query(&filter_pairs(filters))
            .json(&patch);

        send(request).await?;

        Ok(())
    }

    async fn upsert(&self, table: &str, row: Value) -> Result<(), BackendError> {
        let request = self
            .request(Method::POST, self.table(table)?)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&row);

        send(request).await?;

        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError> {
        let request = self
            .request(Method::POST, self.endpoint(&format!("rest/v1/rpc/{function}"))?)
            .json(&args);

        send_json(request).await
    }

    async fn upload(&self, upload: Upload) -> Result<Url, BackendError> {
        let object = format!("{}/{}", upload.bucket, upload.path);
        let request = self
            .request(Method::POST, self.endpoint(&format!("storage/v1/object/{object}"))?)
            .header(CONTENT_TYPE, upload.content_type.as_str())
            .header(CACHE_CONTROL, format!("max-age={}", upload.cache_control_secs))
            .header("x-upsert", upload.upsert.to_string())
            .body(upload.bytes);

        send(request).await?;

        self.endpoint(&format!("storage/v1/object/public/{object}"))
    }
}

/// Error body shared by the REST, auth and storage services. Each service
/// fills a different subset of the fields.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => None,
        }
    }

    fn message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

fn map_transport_error(error: reqwest::Error) -> BackendError {
    BackendError::Transport(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> BackendError {
    let parsed = serde_json::from_slice::<ErrorBody>(body).unwrap_or_default();

    if parsed.code().as_deref() == Some(NO_ROWS_CODE) {
        return BackendError::NotFound;
    }

    if status == StatusCode::UNAUTHORIZED {
        return BackendError::Unauthenticated;
    }

    let message = parsed.message().unwrap_or_else(|| {
        let body_preview = body_preview(body);
        if body_preview.is_empty() {
            format!("status {}", status.as_u16())
        } else {
            body_preview
        }
    });

    BackendError::Status {
        status: status.as_u16(),
        message,
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::config::BackendArgs;

    const REST_ERROR: &[u8] = br#"{"code":"23505","message":"duplicate key value"}"#;
    const AUTH_ERROR: &[u8] =
        br#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
    const STORAGE_ERROR: &[u8] =
        br#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#;

    fn client() -> SupabaseClient {
        let config = BackendConfig::from_args(&BackendArgs {
            supabase_url: Some("https://abc.supabase.co".to_owned()),
            supabase_anon_key: Some("anon".to_owned()),
        })
        .unwrap();

        SupabaseClient::new(&config).unwrap()
    }

    #[test]
    fn no_rows_code_maps_to_not_found() {
        let body = serde_json::to_vec(&json!({
            "code": "PGRST116",
            "details": "The result contains 0 rows",
            "message": "JSON object requested, multiple (or no) rows returned"
        }))
        .unwrap();

        assert!(matches!(
            map_status_error(StatusCode::NOT_ACCEPTABLE, &body),
            BackendError::NotFound
        ));
    }

    #[rstest]
    #[case::rest(REST_ERROR, "duplicate key value")]
    #[case::auth(AUTH_ERROR, "Invalid login credentials")]
    #[case::storage(STORAGE_ERROR, "The resource already exists")]
    #[case::plain(b"upstream   down".as_slice(), "upstream down")]
    #[case::empty(b"".as_slice(), "status 409")]
    fn status_errors_carry_the_backend_message(#[case] body: &[u8], #[case] expected: &str) {
        match map_status_error(StatusCode::CONFLICT, body) {
            BackendError::Status { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, expected);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unauthorized_maps_to_unauthenticated() {
        assert!(matches!(
            map_status_error(StatusCode::UNAUTHORIZED, br#"{"message":"JWT expired"}"#),
            BackendError::Unauthenticated
        ));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(400);

        let preview = body_preview(body.as_bytes());

        assert_eq!(preview.len(), 163);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn endpoints_stay_under_the_project_url() {
        let client = client();

        assert_eq!(
            client.table("lezioni_sci").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/lezioni_sci"
        );
        assert_eq!(
            client.endpoint("storage/v1/object/public/post_images/u/1.png").unwrap().as_str(),
            "https://abc.supabase.co/storage/v1/object/public/post_images/u/1.png"
        );
    }
}
