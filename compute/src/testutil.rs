//! Fixtures shared by the unit tests: an in-memory SQLite store seeded
//! through the entity models.

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::api::{ApiState, api_router, jwt};
use crate::entity::{database, table_data, table_schema};
use crate::store::{Document, SeaOrmStore};

pub const JWT_SECRET: &str = "test-jwt-secret-key-32-chars-pad";

pub struct Fixture {
    pub db: DatabaseConnection,
    pub owner: Uuid,
}

impl Fixture {
    pub async fn new() -> Self {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        Self {
            db,
            owner: Uuid::now_v7(),
        }
    }

    pub fn store(&self) -> SeaOrmStore {
        SeaOrmStore::for_owner(self.db.clone(), self.owner)
    }

    pub async fn database(&self, name: &str) -> Uuid {
        self.database_for(self.owner, name).await
    }

    pub async fn database_for(&self, owner: Uuid, name: &str) -> Uuid {
        let now = Utc::now().naive_utc();
        database::ActiveModel {
            id: Set(Uuid::now_v7()),
            owner_id: Set(owner),
            name: Set(name.to_string()),
            description: Set(None),
            color: Set(None),
            icon: Set(None),
            project_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .unwrap()
        .id
    }

    pub async fn row(&self, database_id: Uuid, data: Value) -> Uuid {
        let now = Utc::now().naive_utc();
        table_data::ActiveModel {
            id: Set(Uuid::now_v7()),
            database_id: Set(database_id),
            data: Set(data.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .unwrap()
        .id
    }

    pub async fn column(&self, database_id: Uuid, name: &str, column_type: &str) {
        self.insert_column(database_id, name, column_type, None, None, None)
            .await;
    }

    pub async fn lookup(
        &self,
        database_id: Uuid,
        name: &str,
        relation_column: &str,
        target: Uuid,
        target_column: &str,
    ) {
        let config = json!({
            "relation_column": relation_column,
            "target_database_id": target,
            "target_column": target_column,
        });
        self.insert_column(database_id, name, "lookup", Some(config.to_string()), None, None)
            .await;
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn rollup(
        &self,
        database_id: Uuid,
        name: &str,
        relation_column: &str,
        target: Uuid,
        target_column: &str,
        aggregation: &str,
        relation_type: &str,
    ) {
        let config = json!({
            "relation_column": relation_column,
            "target_database_id": target,
            "target_column": target_column,
            "aggregation": aggregation,
            "relation_type": relation_type,
        });
        self.insert_column(database_id, name, "rollup", None, Some(config.to_string()), None)
            .await;
    }

    pub async fn formula(&self, database_id: Uuid, name: &str, expression: &str) {
        let config = json!({ "expression": expression, "return_type": "number" });
        self.insert_column(database_id, name, "formula", None, None, Some(config.to_string()))
            .await;
    }

    pub async fn insert_column(
        &self,
        database_id: Uuid,
        name: &str,
        column_type: &str,
        lookup_config: Option<String>,
        rollup_config: Option<String>,
        formula_config: Option<String>,
    ) {
        let now = Utc::now().naive_utc();
        table_schema::ActiveModel {
            id: Set(Uuid::now_v7()),
            database_id: Set(database_id),
            column_name: Set(name.to_string()),
            column_type: Set(column_type.to_string()),
            position: Set(0),
            is_required: Set(false),
            lookup_config: Set(lookup_config),
            rollup_config: Set(rollup_config),
            formula_config: Set(formula_config),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .unwrap();
    }

    /// Current stored document of a row.
    pub async fn data(&self, row_id: Uuid) -> Document {
        let model = table_data::Entity::find_by_id(row_id)
            .one(&self.db)
            .await
            .unwrap()
            .unwrap();
        match serde_json::from_str(&model.data).unwrap() {
            Value::Object(map) => map,
            other => panic!("row {row_id} holds non-object data: {other}"),
        }
    }

    /// Overwrite a row's document directly, bypassing the API.
    pub async fn set_data(&self, row_id: Uuid, data: Value) {
        let model = table_data::Entity::find_by_id(row_id)
            .one(&self.db)
            .await
            .unwrap()
            .unwrap();
        let mut active: table_data::ActiveModel = model.into();
        active.data = Set(data.to_string());
        active.update(&self.db).await.unwrap();
    }
}

impl Fixture {
    pub fn state(&self) -> ApiState {
        ApiState {
            db: self.db.clone(),
            jwt_secret: JWT_SECRET.to_string(),
            jwt_expiry_hours: 1,
        }
    }

    pub fn token(&self) -> String {
        token_for(self.owner)
    }
}

pub fn token_for(user: Uuid) -> String {
    jwt::encode_jwt(&jwt::Claims::for_user(user, 1), JWT_SECRET).unwrap()
}

/// One request through the full router as the fixture's owner.
pub async fn send(
    fx: &Fixture,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_with(fx, Some(&fx.token()), method, uri, body).await
}

pub async fn send_with(
    fx: &Fixture,
    token: Option<&str>,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = api_router(fx.state()).oneshot(request).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}
