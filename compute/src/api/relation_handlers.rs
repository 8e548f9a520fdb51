use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use uuid::Uuid;

use crate::entity::{database, relation};

use super::{
    ApiErr, ApiJson, ApiState,
    dto::{CreateRelationRequest, RelationResponse},
    jwt::AuthClaims,
    owned_database,
};

async fn owned_database_ids(state: &ApiState, owner: Uuid) -> Result<Vec<Uuid>, ApiErr> {
    database::Entity::find()
        .select_only()
        .column(database::Column::Id)
        .filter(database::Column::OwnerId.eq(owner))
        .into_tuple()
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)
}

// ---------- GET /relations ----------

pub async fn list_relations(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
) -> Result<Json<Vec<RelationResponse>>, ApiErr> {
    let owned = owned_database_ids(&state, claims.sub).await?;
    let models = relation::Entity::find()
        .filter(relation::Column::SourceDatabaseId.is_in(owned))
        .order_by_asc(relation::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(models.into_iter().map(RelationResponse::from).collect()))
}

// ---------- POST /relations ----------

pub async fn create_relation(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    ApiJson(body): ApiJson<CreateRelationRequest>,
) -> Result<(StatusCode, Json<RelationResponse>), ApiErr> {
    if body.source_column.trim().is_empty() {
        return Err(ApiErr::unprocessable("source_column cannot be empty"));
    }
    owned_database(&state.db, claims.sub, body.source_database_id).await?;
    owned_database(&state.db, claims.sub, body.target_database_id)
        .await
        .map_err(|_| ApiErr::unprocessable("Target database not found"))?;

    let model = relation::ActiveModel {
        id: Set(Uuid::now_v7()),
        source_database_id: Set(body.source_database_id),
        target_database_id: Set(body.target_database_id),
        relation_type: Set(body.relation_type.as_str().to_string()),
        source_column: Set(body.source_column.trim().to_string()),
        target_column: Set(body.target_column),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&state.db)
    .await
    .map_err(ApiErr::internal)?;

    Ok((StatusCode::CREATED, Json(model.into())))
}

// ---------- DELETE /relations/{id} ----------

pub async fn delete_relation(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiErr> {
    let model = relation::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Relation not found"))?;
    owned_database(&state.db, claims.sub, model.source_database_id)
        .await
        .map_err(|_| ApiErr::not_found("Relation not found"))?;

    let active: relation::ActiveModel = model.into();
    active.delete(&state.db).await.map_err(ApiErr::internal)?;

    Ok(StatusCode::NO_CONTENT)
}
