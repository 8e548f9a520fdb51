use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::{table_data, table_schema};
use crate::schema::ColumnType;
use crate::store::{Document, RowDocument};

use super::{
    ApiErr, ApiJson, ApiState,
    dto::{RowRequest, RowResponse},
    jwt::AuthClaims,
    owned_database,
};

/// Missing, null, empty string and empty array do not satisfy a required
/// column.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(_) => false,
    }
}

/// Column names split by who may write them.
struct RowRules {
    computed: Vec<String>,
    required: Vec<String>,
}

async fn row_rules(state: &ApiState, database_id: Uuid) -> Result<RowRules, ApiErr> {
    let columns = table_schema::Entity::find()
        .filter(table_schema::Column::DatabaseId.eq(database_id))
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    let mut rules = RowRules {
        computed: Vec::new(),
        required: Vec::new(),
    };
    for column in columns {
        let computed = ColumnType::parse(&column.column_type).is_some_and(|t| t.is_computed());
        if computed {
            rules.computed.push(column.column_name);
        } else if column.is_required {
            rules.required.push(column.column_name);
        }
    }
    Ok(rules)
}

impl RowRules {
    fn check_writable(&self, data: &Document) -> Result<(), ApiErr> {
        if let Some(name) = self.computed.iter().find(|c| data.contains_key(*c)) {
            return Err(ApiErr::unprocessable(format!(
                "Column {name} is computed and cannot be written"
            )));
        }
        Ok(())
    }

    fn check_required(&self, data: &Document) -> Result<(), ApiErr> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|c| is_blank(data.get(*c)))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ApiErr::unprocessable(format!(
                "Missing required columns: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

async fn owned_row(
    state: &ApiState,
    database_id: Uuid,
    row_id: Uuid,
) -> Result<table_data::Model, ApiErr> {
    table_data::Entity::find_by_id(row_id)
        .filter(table_data::Column::DatabaseId.eq(database_id))
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Row not found"))
}

// ---------- GET /databases/{id}/rows ----------

pub async fn list_rows(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RowResponse>>, ApiErr> {
    owned_database(&state.db, claims.sub, id).await?;

    let models = table_data::Entity::find()
        .filter(table_data::Column::DatabaseId.eq(id))
        .order_by_asc(table_data::Column::CreatedAt)
        .order_by_asc(table_data::Column::Id)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(models.into_iter().map(RowResponse::from).collect()))
}

// ---------- POST /databases/{id}/rows ----------

pub async fn create_row(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<RowRequest>,
) -> Result<(StatusCode, Json<RowResponse>), ApiErr> {
    owned_database(&state.db, claims.sub, id).await?;

    let rules = row_rules(&state, id).await?;
    rules.check_writable(&body.data)?;
    rules.check_required(&body.data)?;

    let now = Utc::now().naive_utc();
    let model = table_data::ActiveModel {
        id: Set(Uuid::now_v7()),
        database_id: Set(id),
        data: Set(Value::Object(body.data).to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .map_err(ApiErr::internal)?;

    Ok((StatusCode::CREATED, Json(model.into())))
}

// ---------- PUT /databases/{id}/rows/{row_id} ----------

pub async fn update_row(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    Path((id, row_id)): Path<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<RowRequest>,
) -> Result<Json<RowResponse>, ApiErr> {
    owned_database(&state.db, claims.sub, id).await?;
    let model = owned_row(&state, id, row_id).await?;

    let rules = row_rules(&state, id).await?;
    rules.check_writable(&body.data)?;
    rules.check_required(&body.data)?;

    // The client's document replaces the row, except for values only the
    // compute engine may write.
    let stored = RowDocument::from_model(model.clone()).data;
    let mut data = body.data;
    for name in &rules.computed {
        if let Some(value) = stored.get(name) {
            data.insert(name.clone(), value.clone());
        }
    }

    let mut active: table_data::ActiveModel = model.into();
    active.data = Set(Value::Object(data).to_string());
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(&state.db).await.map_err(ApiErr::internal)?;

    Ok(Json(updated.into()))
}

// ---------- DELETE /databases/{id}/rows/{row_id} ----------

pub async fn delete_row(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    Path((id, row_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiErr> {
    owned_database(&state.db, claims.sub, id).await?;
    let model = owned_row(&state, id, row_id).await?;

    let active: table_data::ActiveModel = model.into();
    active.delete(&state.db).await.map_err(ApiErr::internal)?;

    Ok(StatusCode::NO_CONTENT)
}
