use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::{database, relation, table_data, table_schema};
use crate::schema::{ComputedKind, FormulaConfig, LookupConfig, RelationType, ReturnType, RollupConfig};
use crate::store::{Document, RowDocument};

// ---------- compute ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeColumnsRequest {
    pub database_id: Option<String>,
    pub row_ids: Option<Vec<Uuid>>,
    pub column_types: Option<Vec<ComputedKind>>,
}

// ---------- formulas ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateFormulaRequest {
    pub expression: Option<String>,
    pub row_data: Option<Value>,
    pub return_type: Option<ReturnType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateFormulaResponse {
    pub result: Value,
    pub expression: String,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateFormulaRequest {
    #[serde(default)]
    pub expression: String,
    pub return_type: Option<ReturnType>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub database_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ValidateFormulaResponse {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub references: Vec<String>,
}

// ---------- databases ----------

#[derive(Debug, Deserialize)]
pub struct CreateDatabaseRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub project_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<database::Model> for DatabaseResponse {
    fn from(m: database::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            color: m.color,
            icon: m.icon,
            project_id: m.project_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

// ---------- columns ----------

#[derive(Debug, Deserialize)]
pub struct CreateColumnRequest {
    pub column_name: String,
    pub column_type: String,
    pub position: Option<i32>,
    #[serde(default)]
    pub is_required: bool,
    pub lookup_config: Option<LookupConfig>,
    pub rollup_config: Option<RollupConfig>,
    pub formula_config: Option<FormulaConfig>,
}

#[derive(Debug, Serialize)]
pub struct ColumnResponse {
    pub id: Uuid,
    pub database_id: Uuid,
    pub column_name: String,
    pub column_type: String,
    pub position: i32,
    pub is_required: bool,
    pub lookup_config: Option<Value>,
    pub rollup_config: Option<Value>,
    pub formula_config: Option<Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<table_schema::Model> for ColumnResponse {
    fn from(m: table_schema::Model) -> Self {
        // Stored configs were serialized by this service; unreadable text
        // is shown as a JSON string rather than dropped.
        let config = |raw: Option<String>| {
            raw.map(|s| serde_json::from_str(&s).unwrap_or(Value::String(s)))
        };
        Self {
            id: m.id,
            database_id: m.database_id,
            column_name: m.column_name,
            column_type: m.column_type,
            position: m.position,
            is_required: m.is_required,
            lookup_config: config(m.lookup_config),
            rollup_config: config(m.rollup_config),
            formula_config: config(m.formula_config),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

// ---------- rows ----------

#[derive(Debug, Deserialize)]
pub struct RowRequest {
    #[serde(default)]
    pub data: Document,
}

#[derive(Debug, Serialize)]
pub struct RowResponse {
    pub id: Uuid,
    pub database_id: Uuid,
    pub data: Document,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<table_data::Model> for RowResponse {
    fn from(m: table_data::Model) -> Self {
        let (database_id, created_at, updated_at) = (m.database_id, m.created_at, m.updated_at);
        let RowDocument { id, data } = RowDocument::from_model(m);
        Self {
            id,
            database_id,
            data,
            created_at,
            updated_at,
        }
    }
}

// ---------- relations ----------

#[derive(Debug, Deserialize)]
pub struct CreateRelationRequest {
    pub source_database_id: Uuid,
    pub target_database_id: Uuid,
    #[serde(default)]
    pub relation_type: RelationType,
    pub source_column: String,
    pub target_column: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RelationResponse {
    pub id: Uuid,
    pub source_database_id: Uuid,
    pub target_database_id: Uuid,
    pub relation_type: String,
    pub source_column: String,
    pub target_column: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<relation::Model> for RelationResponse {
    fn from(m: relation::Model) -> Self {
        Self {
            id: m.id,
            source_database_id: m.source_database_id,
            target_database_id: m.target_database_id,
            relation_type: m.relation_type,
            source_column: m.source_column,
            target_column: m.target_column,
            created_at: m.created_at,
        }
    }
}
