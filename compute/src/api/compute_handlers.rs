use axum::{extract::State, response::Json};
use uuid::Uuid;

use crate::compute::{self, ComputeRequest, ComputeSummary};
use crate::store::SeaOrmStore;

use super::{ApiErr, ApiJson, ApiState, dto::ComputeColumnsRequest, jwt::AuthClaims};

// ---------- POST /compute-columns ----------

pub async fn compute_columns(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    ApiJson(body): ApiJson<ComputeColumnsRequest>,
) -> Result<Json<ComputeSummary>, ApiErr> {
    let raw = body
        .database_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiErr::bad_request("databaseId is required"))?;
    let database_id =
        Uuid::parse_str(raw).map_err(|_| ApiErr::bad_request("databaseId must be a UUID"))?;

    let store = SeaOrmStore::for_owner(state.db.clone(), claims.sub);
    if !store.is_visible(database_id).await.map_err(ApiErr::internal)? {
        return Err(ApiErr::not_found("Database not found"));
    }

    let request = ComputeRequest {
        database_id,
        row_ids: body.row_ids,
        column_types: body.column_types,
    };

    let summary = compute::compute_columns(&store, &request)
        .await
        .map_err(|e| {
            tracing::error!(database_id = %database_id, error = %e, "compute run failed");
            ApiErr::internal(e)
        })?;

    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use crate::testutil::{Fixture, send};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn lookup_run_over_http() {
        let fx = Fixture::new().await;
        let customers = fx.database("Customers").await;
        let orders = fx.database("Orders").await;
        fx.lookup(orders, "customer_name", "customer_id", customers, "name")
            .await;
        let acme = fx.row(customers, json!({"name": "Acme Corp"})).await;
        let order = fx.row(orders, json!({"customer_id": acme.to_string()})).await;

        let (status, body) = send(
            &fx,
            Method::POST,
            "/api/v1/compute-columns",
            Some(json!({"databaseId": orders, "columnTypes": ["lookup"]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["updated_rows"], json!(1));
        assert_eq!(body["lookup_updates"], json!(1));
        assert!(body.get("errors").is_none());
        assert_eq!(fx.data(order).await["customer_name"], json!("Acme Corp"));
    }

    #[tokio::test]
    async fn missing_or_malformed_database_id_is_a_bad_request() {
        let fx = Fixture::new().await;
        for body in [json!({}), json!({"databaseId": ""}), json!({"databaseId": "orders"})] {
            let (status, body) =
                send(&fx, Method::POST, "/api/v1/compute-columns", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_a_json_bad_request() {
        let fx = Fixture::new().await;
        let db = fx.database("Orders").await;
        for body in [
            json!({"databaseId": db, "columnTypes": ["formula"]}),
            json!({"databaseId": db, "rowIds": ["x"]}),
        ] {
            let (status, body) =
                send(&fx, Method::POST, "/api/v1/compute-columns", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string(), "{body}");
        }
    }

    #[tokio::test]
    async fn foreign_database_is_not_found() {
        let fx = Fixture::new().await;
        let theirs = fx.database_for(Uuid::now_v7(), "Theirs").await;
        let (status, _) = send(
            &fx,
            Method::POST,
            "/api/v1/compute-columns",
            Some(json!({"databaseId": theirs})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn nothing_to_compute_is_reported_in_the_message() {
        let fx = Fixture::new().await;
        let plain = fx.database("Plain").await;
        let (status, body) = send(
            &fx,
            Method::POST,
            "/api/v1/compute-columns",
            Some(json!({"databaseId": plain.to_string()})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("No computed columns found for this database"));
        assert_eq!(body["updated_rows"], json!(0));
    }
}
