use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entity::{database, relation, table_data, table_schema};

use super::{
    ApiErr, ApiJson, ApiState,
    dto::{CreateDatabaseRequest, DatabaseResponse},
    jwt::AuthClaims,
    owned_database,
};

// ---------- GET /databases ----------

pub async fn list_databases(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
) -> Result<Json<Vec<DatabaseResponse>>, ApiErr> {
    let models = database::Entity::find()
        .filter(database::Column::OwnerId.eq(claims.sub))
        .order_by_asc(database::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(models.into_iter().map(DatabaseResponse::from).collect()))
}

// ---------- POST /databases ----------

pub async fn create_database(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    ApiJson(body): ApiJson<CreateDatabaseRequest>,
) -> Result<(StatusCode, Json<DatabaseResponse>), ApiErr> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiErr::unprocessable("Database name cannot be empty"));
    }

    let now = Utc::now().naive_utc();
    let model = database::ActiveModel {
        id: Set(Uuid::now_v7()),
        owner_id: Set(claims.sub),
        name: Set(name.to_string()),
        description: Set(body.description),
        color: Set(body.color),
        icon: Set(body.icon),
        project_id: Set(body.project_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .map_err(ApiErr::internal)?;

    tracing::info!(database_id = %model.id, owner = %claims.sub, "database created");
    Ok((StatusCode::CREATED, Json(model.into())))
}

// ---------- GET /databases/{id} ----------

pub async fn get_database(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DatabaseResponse>, ApiErr> {
    let model = owned_database(&state.db, claims.sub, id).await?;
    Ok(Json(model.into()))
}

// ---------- DELETE /databases/{id} ----------

pub async fn delete_database(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiErr> {
    let model = owned_database(&state.db, claims.sub, id).await?;

    let txn = state.db.begin().await.map_err(ApiErr::internal)?;

    relation::Entity::delete_many()
        .filter(
            Condition::any()
                .add(relation::Column::SourceDatabaseId.eq(id))
                .add(relation::Column::TargetDatabaseId.eq(id)),
        )
        .exec(&txn)
        .await
        .map_err(ApiErr::internal)?;
    table_data::Entity::delete_many()
        .filter(table_data::Column::DatabaseId.eq(id))
        .exec(&txn)
        .await
        .map_err(ApiErr::internal)?;
    table_schema::Entity::delete_many()
        .filter(table_schema::Column::DatabaseId.eq(id))
        .exec(&txn)
        .await
        .map_err(ApiErr::internal)?;

    let active: database::ActiveModel = model.into();
    active.delete(&txn).await.map_err(ApiErr::internal)?;

    txn.commit().await.map_err(ApiErr::internal)?;

    tracing::info!(database_id = %id, "database deleted");
    Ok(StatusCode::NO_CONTENT)
}
