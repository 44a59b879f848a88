//! In-memory stand-in for the hosted backend.
//!
//! Applies equality filters and ordering the way the REST interface does,
//! returns whole rows regardless of the column list, and assigns numeric
//! ids and creation timestamps on insert.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use url::Url;

use crate::backend::{Backend, BackendError, Filter, Select, Upload};

#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<BTreeMap<String, Vec<Value>>>,
    next_id: Mutex<i64>,
    failing_tables: Mutex<HashSet<String>>,
    failing_rpc: Mutex<bool>,
    uploads: Mutex<Vec<Upload>>,
}

impl MemoryBackend {
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_owned())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Every write to `table` fails from now on.
    pub fn fail_writes_to(&self, table: &str) {
        self.failing_tables.lock().unwrap().insert(table.to_owned());
    }

    pub fn fail_rpc(&self) {
        *self.failing_rpc.lock().unwrap() = true;
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    fn check_writable(&self, table: &str) -> Result<(), BackendError> {
        if self.failing_tables.lock().unwrap().contains(table) {
            return Err(BackendError::Status {
                status: 500,
                message: format!("writes to {table} are failing"),
            });
        }

        Ok(())
    }

    fn matching(&self, table: &str, filters: &[Filter]) -> Vec<Value> {
        self.rows(table)
            .into_iter()
            .filter(|row| filters.iter().all(|filter| matches(row, filter)))
            .collect()
    }

    fn next_id(&self) -> i64 {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        *next_id
    }
}

fn render(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => "null".to_owned(),
        Some(other) => other.to_string(),
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let actual = render(row.get(filter.column()));

    match filter {
        Filter::Eq { value, .. } => &actual == value,
        Filter::Neq { value, .. } => &actual != value,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

fn merge(row: &mut Value, patch: &Value) {
    if let (Some(row), Some(patch)) = (row.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            row.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, query: &Select) -> Result<Vec<Value>, BackendError> {
        let mut rows = self.matching(&query.table, &query.filters);

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        Ok(rows)
    }

    async fn select_single(&self, query: &Select) -> Result<Value, BackendError> {
        let mut rows = self.select(query).await?;

        match rows.len() {
            0 => Err(BackendError::NotFound),
            1 => Ok(rows.remove(0)),
            count => Err(BackendError::Status {
                status: 406,
                message: format!("expected one row, found {count}"),
            }),
        }
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        self.check_writable(table)?;

        let stored = rows
            .into_iter()
            .map(|row| {
                let mut object = row.as_object().cloned().unwrap_or_else(Map::new);
                object
                    .entry("id")
                    .or_insert_with(|| json!(self.next_id()));
                object
                    .entry("created_at")
                    .or_insert_with(|| json!(Utc::now().to_rfc3339()));
                Value::Object(object)
            })
            .collect::<Vec<_>>();

        self.seed(table, stored.clone());

        Ok(stored)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<(), BackendError> {
        self.check_writable(table)?;

        let mut tables = self.tables.lock().unwrap();
        for row in tables.entry(table.to_owned()).or_default() {
            if filters.iter().all(|filter| matches(&*row, filter)) {
                merge(row, &patch);
            }
        }

        Ok(())
    }

    async fn upsert(&self, table: &str, row: Value) -> Result<(), BackendError> {
        self.check_writable(table)?;

        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_owned()).or_default();
        let id = row.get("id").cloned();

        match rows.iter_mut().find(|existing| existing.get("id") == id.as_ref()) {
            Some(existing) => merge(existing, &row),
            None => rows.push(row),
        }

        Ok(())
    }

    async fn rpc(&self, function: &str, _args: Value) -> Result<Value, BackendError> {
        if *self.failing_rpc.lock().unwrap() {
            return Err(BackendError::Status {
                status: 500,
                message: format!("{function} is failing"),
            });
        }

        match function {
            "get_comment_counts" => {
                let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
                for comment in self.rows("comments") {
                    if let Some(post_id) = comment.get("post_id").and_then(Value::as_i64) {
                        *counts.entry(post_id).or_default() += 1;
                    }
                }

                Ok(Value::Array(
                    counts
                        .into_iter()
                        .map(|(post_id, comment_count)| {
                            json!({ "post_id": post_id, "comment_count": comment_count })
                        })
                        .collect(),
                ))
            }
            _ => Err(BackendError::Status {
                status: 404,
                message: format!("unknown function {function}"),
            }),
        }
    }

    async fn upload(&self, upload: Upload) -> Result<Url, BackendError> {
        let url = Url::parse(&format!(
            "https://backend.test/storage/v1/object/public/{}/{}",
            upload.bucket, upload.path
        ))
        .map_err(|error| BackendError::Decode(error.to_string()))?;

        self.uploads.lock().unwrap().push(upload);

        Ok(url)
    }
}
