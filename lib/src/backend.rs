//! Port to the hosted backend.
//!
//! Every read and write the app performs is one of these calls against a
//! named remote table, a named remote procedure, or a storage bucket. The
//! backend owns the data and enforces row-level security; this side only
//! builds queries and decodes what comes back.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request to backend failed: {0}")]
    Transport(String),

    #[error("backend answered with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("no matching row")]
    NotFound,

    #[error("could not decode backend response: {0}")]
    Decode(String),

    #[error("{0}")]
    Rejected(String),

    #[error("you must be signed in")]
    Unauthenticated,
}

impl BackendError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}

/// Row filter, rendered the way the auto-generated REST interface expects
/// (`column=eq.value`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    Eq { column: String, value: String },
    Neq { column: String, value: String },
}

impl Filter {
    pub fn eq(column: &str, value: impl ToString) -> Self {
        Self::Eq {
            column: column.to_owned(),
            value: value.to_string(),
        }
    }

    pub fn neq(column: &str, value: impl ToString) -> Self {
        Self::Neq {
            column: column.to_owned(),
            value: value.to_string(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. } | Self::Neq { column, .. } => column,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Eq { value, .. } | Self::Neq { value, .. } => value,
        }
    }

    pub fn to_query_pair(&self) -> (String, String) {
        match self {
            Self::Eq { column, value } => (column.clone(), format!("eq.{value}")),
            Self::Neq { column, value } => (column.clone(), format!("neq.{value}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A filtered, ordered read of one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Select {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Select {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_owned(),
            columns: "*".to_owned(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = columns.to_owned();
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn neq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter::neq(column, value));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_owned(),
            ascending,
        });
        self
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_owned(), self.columns.clone())];

        pairs.extend(self.filters.iter().map(Filter::to_query_pair));

        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            pairs.push(("order".to_owned(), format!("{}.{direction}", order.column)));
        }

        pairs
    }
}

/// One object to store in a bucket.
#[derive(Clone, Debug)]
pub struct Upload {
    pub bucket: String,
    pub path: String,
    pub content_type: String,
    pub cache_control_secs: u32,
    pub upsert: bool,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn select(&self, query: &Select) -> Result<Vec<Value>, BackendError>;

    /// Exactly one row. Zero rows is [`BackendError::NotFound`].
    async fn select_single(&self, query: &Select) -> Result<Value, BackendError>;

    /// Inserts `rows` in one request and returns them as stored.
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError>;

    async fn update(&self, table: &str, filters: &[Filter], patch: Value)
        -> Result<(), BackendError>;

    async fn upsert(&self, table: &str, row: Value) -> Result<(), BackendError>;

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError>;

    /// Stores an object and returns its public URL.
    async fn upload(&self, upload: Upload) -> Result<Url, BackendError>;
}

pub async fn fetch_rows<T: DeserializeOwned>(
    backend: &dyn Backend,
    query: &Select,
) -> Result<Vec<T>, BackendError> {
    let rows = backend.select(query).await?;

    decode_rows(rows)
}

pub async fn fetch_optional<T: DeserializeOwned>(
    backend: &dyn Backend,
    query: &Select,
) -> Result<Option<T>, BackendError> {
    match backend.select_single(query).await {
        Ok(row) => Ok(Some(serde_json::from_value(row)?)),
        Err(BackendError::NotFound) => Ok(None),
        Err(error) => Err(error),
    }
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, BackendError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_filters_and_order_as_query_pairs() {
        let query = Select::from("lezioni_sci")
            .columns("nome_cliente,cognome_cliente")
            .eq("user_id", "42")
            .neq("id", 7)
            .order("data_lezione", false);

        assert_eq!(
            query.query_pairs(),
            vec![
                ("select".to_owned(), "nome_cliente,cognome_cliente".to_owned()),
                ("user_id".to_owned(), "eq.42".to_owned()),
                ("id".to_owned(), "neq.7".to_owned()),
                ("order".to_owned(), "data_lezione.desc".to_owned()),
            ]
        );
    }

    #[test]
    fn selects_every_column_by_default() {
        let query = Select::from("posts");

        assert_eq!(
            query.query_pairs(),
            vec![("select".to_owned(), "*".to_owned())]
        );
    }
}
