use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::table_schema;
use crate::formula;
use crate::schema::{ColumnType, FormulaConfig, RelationType};

use super::{
    ApiErr, ApiJson, ApiState,
    dto::{ColumnResponse, CreateColumnRequest},
    is_unique_violation,
    jwt::AuthClaims,
    owned_database,
};

async fn columns_of(
    db: &DatabaseConnection,
    database_id: Uuid,
) -> Result<Vec<table_schema::Model>, ApiErr> {
    table_schema::Entity::find()
        .filter(table_schema::Column::DatabaseId.eq(database_id))
        .order_by_asc(table_schema::Column::Position)
        .order_by_asc(table_schema::Column::CreatedAt)
        .all(db)
        .await
        .map_err(ApiErr::internal)
}

fn has_column(columns: &[table_schema::Model], name: &str) -> bool {
    columns.iter().any(|c| c.column_name == name)
}

// ---------- GET /databases/{id}/columns ----------

pub async fn list_columns(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ColumnResponse>>, ApiErr> {
    owned_database(&state.db, claims.sub, id).await?;
    let columns = columns_of(&state.db, id).await?;
    Ok(Json(columns.into_iter().map(ColumnResponse::from).collect()))
}

// ---------- POST /databases/{id}/columns ----------

pub async fn create_column(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<CreateColumnRequest>,
) -> Result<(StatusCode, Json<ColumnResponse>), ApiErr> {
    owned_database(&state.db, claims.sub, id).await?;

    let name = body.column_name.trim().to_string();
    if name.is_empty() {
        return Err(ApiErr::unprocessable("Column name cannot be empty"));
    }
    let column_type = ColumnType::parse(&body.column_type).ok_or_else(|| {
        ApiErr::unprocessable(format!("Unknown column type: {}", body.column_type))
    })?;

    let existing = columns_of(&state.db, id).await?;

    let (mut lookup_config, mut rollup_config, mut formula_config) = (None, None, None);
    match column_type {
        ColumnType::Lookup => {
            let cfg = body
                .lookup_config
                .ok_or_else(|| ApiErr::unprocessable("lookup_config is required"))?;
            if !has_column(&existing, &cfg.relation_column) {
                return Err(ApiErr::unprocessable(format!(
                    "Relation column not found: {}",
                    cfg.relation_column
                )));
            }
            owned_database(&state.db, claims.sub, cfg.target_database_id)
                .await
                .map_err(|_| ApiErr::unprocessable("Target database not found"))?;
            let target = columns_of(&state.db, cfg.target_database_id).await?;
            if !has_column(&target, &cfg.target_column) {
                return Err(ApiErr::unprocessable(format!(
                    "Target column not found: {}",
                    cfg.target_column
                )));
            }
            lookup_config = Some(serde_json::to_string(&cfg).map_err(ApiErr::internal)?);
        }
        ColumnType::Rollup => {
            let cfg = body
                .rollup_config
                .ok_or_else(|| ApiErr::unprocessable("rollup_config is required"))?;
            owned_database(&state.db, claims.sub, cfg.target_database_id)
                .await
                .map_err(|_| ApiErr::unprocessable("Target database not found"))?;
            let target = columns_of(&state.db, cfg.target_database_id).await?;
            // one_to_many keys live on the target rows; the other shapes keep
            // them on this database's rows.
            let relation_side = match cfg.relation_type {
                RelationType::OneToMany => &target,
                RelationType::ManyToOne | RelationType::ManyToMany => &existing,
            };
            if !has_column(relation_side, &cfg.relation_column) {
                return Err(ApiErr::unprocessable(format!(
                    "Relation column not found: {}",
                    cfg.relation_column
                )));
            }
            if !has_column(&target, &cfg.target_column) {
                return Err(ApiErr::unprocessable(format!(
                    "Target column not found: {}",
                    cfg.target_column
                )));
            }
            rollup_config = Some(serde_json::to_string(&cfg).map_err(ApiErr::internal)?);
        }
        ColumnType::Formula => {
            let cfg = body
                .formula_config
                .ok_or_else(|| ApiErr::unprocessable("formula_config is required"))?;
            let known: Vec<String> = existing.iter().map(|c| c.column_name.clone()).collect();
            let validation = formula::validate_formula(&cfg, Some(&known));
            if !validation.is_valid {
                return Err(ApiErr::unprocessable(validation.errors.join("; ")));
            }
            check_formula_cycles(&existing, &name, &cfg)?;
            formula_config = Some(serde_json::to_string(&cfg).map_err(ApiErr::internal)?);
        }
        _ => {}
    }

    let position = body.position.unwrap_or(existing.len() as i32);
    let now = Utc::now().naive_utc();
    let model = table_schema::ActiveModel {
        id: Set(Uuid::now_v7()),
        database_id: Set(id),
        column_name: Set(name),
        column_type: Set(column_type.as_str().to_string()),
        position: Set(position),
        is_required: Set(body.is_required),
        lookup_config: Set(lookup_config),
        rollup_config: Set(rollup_config),
        formula_config: Set(formula_config),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiErr::conflict("Column name already exists")
        } else {
            ApiErr::internal(e)
        }
    })?;

    tracing::info!(
        database_id = %id,
        column = %model.column_name,
        column_type = %model.column_type,
        "column created"
    );
    Ok((StatusCode::CREATED, Json(model.into())))
}

/// Reject a formula that would close a loop with the database's existing
/// formula columns.
fn check_formula_cycles(
    existing: &[table_schema::Model],
    name: &str,
    config: &FormulaConfig,
) -> Result<(), ApiErr> {
    let mut formulas: Vec<(String, String)> = existing
        .iter()
        .filter(|c| c.column_type == ColumnType::Formula.as_str())
        .filter_map(|c| {
            let raw = c.formula_config.as_deref()?;
            let stored: FormulaConfig = serde_json::from_str(raw).ok()?;
            Some((c.column_name.clone(), stored.expression))
        })
        .collect();
    formulas.push((name.to_string(), config.expression.clone()));

    formula::dependency_order(&formulas)
        .map(|_| ())
        .map_err(|e| ApiErr::unprocessable(e.to_string()))
}

// ---------- DELETE /databases/{id}/columns/{column_id} ----------

pub async fn delete_column(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    Path((id, column_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiErr> {
    owned_database(&state.db, claims.sub, id).await?;

    let model = table_schema::Entity::find_by_id(column_id)
        .filter(table_schema::Column::DatabaseId.eq(id))
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Column not found"))?;

    let active: table_schema::ActiveModel = model.into();
    active.delete(&state.db).await.map_err(ApiErr::internal)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::testutil::{Fixture, send};
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};
    use uuid::Uuid;

    async fn create(fx: &Fixture, database: Uuid, body: Value) -> (StatusCode, Value) {
        send(
            fx,
            Method::POST,
            &format!("/api/v1/databases/{database}/columns"),
            Some(body),
        )
        .await
    }

    #[tokio::test]
    async fn plain_columns_get_sequential_positions() {
        let fx = Fixture::new().await;
        let db = fx.database("Contacts").await;
        let (status, first) =
            create(&fx, db, json!({"column_name": "name", "column_type": "text"})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["position"], json!(0));
        let (_, second) = create(
            &fx,
            db,
            json!({"column_name": "email", "column_type": "email", "is_required": true}),
        )
        .await;
        assert_eq!(second["position"], json!(1));
        assert_eq!(second["is_required"], json!(true));

        let (status, listed) =
            send(&fx, Method::GET, &format!("/api/v1/databases/{db}/columns"), None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["column_name"].as_str())
            .collect();
        assert_eq!(names, ["name", "email"]);
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let fx = Fixture::new().await;
        let db = fx.database("Contacts").await;
        create(&fx, db, json!({"column_name": "name", "column_type": "text"})).await;
        let (status, body) =
            create(&fx, db, json!({"column_name": "name", "column_type": "number"})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], json!("Column name already exists"));
    }

    #[tokio::test]
    async fn unknown_type_and_blank_name_are_rejected() {
        let fx = Fixture::new().await;
        let db = fx.database("Contacts").await;
        let (status, body) =
            create(&fx, db, json!({"column_name": "x", "column_type": "spreadsheet"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], json!("Unknown column type: spreadsheet"));

        let (status, _) = create(&fx, db, json!({"column_name": " ", "column_type": "text"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn lookup_config_is_checked_against_both_schemas() {
        let fx = Fixture::new().await;
        let customers = fx.database("Customers").await;
        let orders = fx.database("Orders").await;
        fx.column(customers, "name", "text").await;
        fx.column(orders, "customer_id", "relation").await;

        let (status, body) = create(
            &fx,
            orders,
            json!({
                "column_name": "customer_name",
                "column_type": "lookup",
                "lookup_config": {
                    "relation_column": "customer_id",
                    "target_database_id": customers,
                    "target_column": "email",
                },
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], json!("Target column not found: email"));

        let (status, body) = create(
            &fx,
            orders,
            json!({
                "column_name": "customer_name",
                "column_type": "lookup",
                "lookup_config": {
                    "relation_column": "customer_id",
                    "target_database_id": customers,
                    "target_column": "name",
                },
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["lookup_config"]["target_column"], json!("name"));

        let (status, body) =
            create(&fx, orders, json!({"column_name": "x", "column_type": "lookup"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], json!("lookup_config is required"));
    }

    #[tokio::test]
    async fn rollup_relation_column_side_follows_relation_type() {
        let fx = Fixture::new().await;
        let customers = fx.database("Customers").await;
        let orders = fx.database("Orders").await;
        fx.column(orders, "customer_id", "relation").await;
        fx.column(orders, "amount", "number").await;

        let (status, body) = create(
            &fx,
            customers,
            json!({
                "column_name": "total",
                "column_type": "rollup",
                "rollup_config": {
                    "relation_column": "customer_id",
                    "target_database_id": orders,
                    "target_column": "amount",
                    "aggregation": "sum",
                },
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["rollup_config"]["relation_type"], json!("one_to_many"));

        let (status, body) = create(
            &fx,
            customers,
            json!({
                "column_name": "largest",
                "column_type": "rollup",
                "rollup_config": {
                    "relation_column": "customer_id",
                    "target_database_id": orders,
                    "target_column": "amount",
                    "aggregation": "max",
                    "relation_type": "many_to_one",
                },
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], json!("Relation column not found: customer_id"));
    }

    #[tokio::test]
    async fn foreign_target_database_is_rejected() {
        let fx = Fixture::new().await;
        let orders = fx.database("Orders").await;
        let theirs = fx.database_for(Uuid::now_v7(), "Theirs").await;
        fx.column(orders, "customer_id", "relation").await;
        fx.column(theirs, "name", "text").await;

        let (status, body) = create(
            &fx,
            orders,
            json!({
                "column_name": "peek",
                "column_type": "lookup",
                "lookup_config": {
                    "relation_column": "customer_id",
                    "target_database_id": theirs,
                    "target_column": "name",
                },
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], json!("Target database not found"));
    }

    #[tokio::test]
    async fn formula_columns_are_validated() {
        let fx = Fixture::new().await;
        let db = fx.database("Products").await;
        fx.column(db, "price", "number").await;

        let (status, body) = create(
            &fx,
            db,
            json!({
                "column_name": "gross",
                "column_type": "formula",
                "formula_config": {"expression": "price * (1 + vat)", "return_type": "number"},
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], json!("Unknown column: vat"));

        let (status, _) = create(
            &fx,
            db,
            json!({
                "column_name": "gross",
                "column_type": "formula",
                "formula_config": {"expression": "round(price * 1.2, 2)", "return_type": "number"},
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn formula_cycles_are_rejected() {
        let fx = Fixture::new().await;
        let db = fx.database("Loop").await;
        fx.column(db, "base", "number").await;
        // Stored directly: `a` reads a column that does not exist yet.
        fx.formula(db, "a", "b + 1").await;

        let (status, body) = create(
            &fx,
            db,
            json!({
                "column_name": "b",
                "column_type": "formula",
                "formula_config": {"expression": "a * base", "return_type": "number"},
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("circular dependency between formula columns")
        );
    }

    #[tokio::test]
    async fn delete_column_scoped_to_database() {
        let fx = Fixture::new().await;
        let db = fx.database("Contacts").await;
        let other = fx.database("Other").await;
        let (_, column) =
            create(&fx, db, json!({"column_name": "name", "column_type": "text"})).await;
        let column_id = column["id"].as_str().unwrap();

        let (status, _) = send(
            &fx,
            Method::DELETE,
            &format!("/api/v1/databases/{other}/columns/{column_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &fx,
            Method::DELETE,
            &format!("/api/v1/databases/{db}/columns/{column_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
