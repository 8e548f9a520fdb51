use axum::{
    Router,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::de::DeserializeOwned;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::set_header::response::SetResponseHeaderLayer;
use uuid::Uuid;

use crate::entity::database;

pub mod column_handlers;
pub mod compute_handlers;
pub mod database_handlers;
pub mod dto;
pub mod formula_handlers;
pub mod jwt;
pub mod relation_handlers;
pub mod row_handlers;

// ---------- shared state ----------

#[derive(Clone)]
pub struct ApiState {
    pub db: DatabaseConnection,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

// ---------- error type ----------

/// A JSON error response: `{"error": "..."}` with an HTTP status.
#[derive(Debug)]
pub struct ApiErr(StatusCode, String);

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(status, msg.into())
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(StatusCode::CONFLICT, msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, msg.into())
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self(StatusCode::UNPROCESSABLE_ENTITY, msg.into())
    }

    pub fn status(&self) -> StatusCode {
        self.0
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.1 });
        (self.0, Json(body)).into_response()
    }
}

/// Extractor: a JSON request body whose rejections render as `ApiErr`.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiErr;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiErr::bad_request(e.body_text()))?;
        Ok(Self(value))
    }
}

fn is_unique_violation(e: &DbErr) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE") || msg.contains("unique")
}

/// The caller's database, or 404 when it does not exist or belongs to
/// someone else.
async fn owned_database(
    db: &DatabaseConnection,
    owner: Uuid,
    id: Uuid,
) -> Result<database::Model, ApiErr> {
    database::Entity::find_by_id(id)
        .filter(database::Column::OwnerId.eq(owner))
        .one(db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Database not found"))
}

// ---------- router ----------

pub fn api_router(state: ApiState) -> Router {
    let allowed_origins: Vec<HeaderValue> = std::env::var("VH_CORS_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new() // no origins allowed = same-origin only
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api/v1", api_v1())
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .with_state(state)
}

fn api_v1() -> Router<ApiState> {
    Router::new()
        // computed columns
        .route("/compute-columns", post(compute_handlers::compute_columns))
        // formulas
        .route("/evaluate-formula", post(formula_handlers::evaluate_formula))
        .route("/validate-formula", post(formula_handlers::validate_formula))
        .route("/formula-functions", get(formula_handlers::list_functions))
        // databases
        .route(
            "/databases",
            get(database_handlers::list_databases).post(database_handlers::create_database),
        )
        .route(
            "/databases/{id}",
            get(database_handlers::get_database).delete(database_handlers::delete_database),
        )
        // columns
        .route(
            "/databases/{id}/columns",
            get(column_handlers::list_columns).post(column_handlers::create_column),
        )
        .route(
            "/databases/{id}/columns/{column_id}",
            delete(column_handlers::delete_column),
        )
        // rows
        .route(
            "/databases/{id}/rows",
            get(row_handlers::list_rows).post(row_handlers::create_row),
        )
        .route(
            "/databases/{id}/rows/{row_id}",
            put(row_handlers::update_row).delete(row_handlers::delete_row),
        )
        // relations
        .route(
            "/relations",
            get(relation_handlers::list_relations).post(relation_handlers::create_relation),
        )
        .route("/relations/{id}", delete(relation_handlers::delete_relation))
}
