use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::entity::table_data;
use crate::schema::{ComputedKind, SchemaRecord};

mod rollups;
mod sea;

pub use sea::SeaOrmStore;

/// A column name -> value document, as stored in `table_data.data`.
pub type Document = Map<String, Value>;

// ---------- DTOs ----------

#[derive(Debug, Clone, PartialEq)]
pub struct RowDocument {
    pub id: Uuid,
    pub data: Document,
}

impl RowDocument {
    /// Parse a stored row. Anything that is not a JSON object reads as an
    /// empty document.
    pub fn from_model(model: table_data::Model) -> Self {
        let data = match serde_json::from_str::<Value>(&model.data) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::warn!(row_id = %model.id, "row data is not a JSON object, treating as empty");
                Map::new()
            }
        };
        Self { id: model.id, data }
    }
}

/// One `(row_id, column_name, rollup_value)` tuple produced by the rollup
/// aggregation delegate.
#[derive(Debug, Clone, PartialEq)]
pub struct RollupValue {
    pub row_id: Uuid,
    pub column_name: String,
    pub value: Value,
}

// ---------- errors ----------

#[derive(Debug)]
pub enum StoreError {
    Db(sea_orm::DbErr),
    Json(serde_json::Error),
    NotFound(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Db(e) => write!(f, "Database error: {e}"),
            StoreError::Json(e) => write!(f, "JSON error: {e}"),
            StoreError::NotFound(what) => write!(f, "{what} not found"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sea_orm::DbErr> for StoreError {
    fn from(e: sea_orm::DbErr) -> Self {
        StoreError::Db(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

// ---------- trait ----------

/// Everything the compute engine needs from the backing store.
///
/// Rows of databases the caller may not see are simply absent from fetch
/// results, never an error.
#[async_trait::async_trait]
pub trait ComputeStore: Send + Sync {
    /// Computed column definitions of `database_id` whose type is in `kinds`,
    /// ordered by position.
    async fn fetch_computed_schemas(
        &self,
        database_id: Uuid,
        kinds: &[ComputedKind],
    ) -> Result<Vec<SchemaRecord>, StoreError>;

    /// Rows of `database_id`; all of them when `row_ids` is `None`.
    async fn fetch_rows(
        &self,
        database_id: Uuid,
        row_ids: Option<&[Uuid]>,
    ) -> Result<Vec<RowDocument>, StoreError>;

    /// Aggregate every rollup column of `database_id` for the given rows.
    async fn batch_compute_rollups(
        &self,
        database_id: Uuid,
        row_ids: &[Uuid],
    ) -> Result<Vec<RollupValue>, StoreError>;

    /// Replace the stored document of one row.
    async fn update_row_data(&self, row_id: Uuid, data: &Document) -> Result<(), StoreError>;
}
