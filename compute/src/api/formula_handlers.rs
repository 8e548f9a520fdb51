use axum::{extract::State, response::Json};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QuerySelect};
use serde_json::Value;

use crate::entity::table_schema;
use crate::formula::{self, functions::FunctionSpec};
use crate::schema::FormulaConfig;

use super::{
    ApiErr, ApiJson, ApiState,
    dto::{
        EvaluateFormulaRequest, EvaluateFormulaResponse, ValidateFormulaRequest,
        ValidateFormulaResponse,
    },
    jwt::AuthClaims,
    owned_database,
};

// ---------- POST /evaluate-formula ----------

pub async fn evaluate_formula(
    AuthClaims(_): AuthClaims,
    ApiJson(body): ApiJson<EvaluateFormulaRequest>,
) -> Result<Json<EvaluateFormulaResponse>, ApiErr> {
    let expression = body
        .expression
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiErr::bad_request("Missing expression parameter"))?;
    let row = match body.row_data {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ApiErr::bad_request("rowData must be an object")),
        None => return Err(ApiErr::bad_request("Missing rowData parameter")),
    };

    let now = Utc::now();
    let mut value = formula::evaluate(&expression, &row, now).map_err(|e| {
        tracing::debug!(expression = %expression, error = %e, "formula evaluation failed");
        ApiErr::bad_request(format!("Formula evaluation failed: {e}"))
    })?;
    if let Some(return_type) = body.return_type {
        value = formula::coerce(value, return_type)
            .map_err(|e| ApiErr::bad_request(format!("Formula evaluation failed: {e}")))?;
    }

    Ok(Json(EvaluateFormulaResponse {
        result: value.to_json(),
        expression,
        evaluated_at: now,
    }))
}

// ---------- POST /validate-formula ----------

pub async fn validate_formula(
    AuthClaims(claims): AuthClaims,
    State(state): State<ApiState>,
    ApiJson(body): ApiJson<ValidateFormulaRequest>,
) -> Result<Json<ValidateFormulaResponse>, ApiErr> {
    let known_columns = match body.database_id {
        Some(database_id) => {
            owned_database(&state.db, claims.sub, database_id).await?;
            let names: Vec<String> = table_schema::Entity::find()
                .select_only()
                .column(table_schema::Column::ColumnName)
                .filter(table_schema::Column::DatabaseId.eq(database_id))
                .into_tuple()
                .all(&state.db)
                .await
                .map_err(ApiErr::internal)?;
            Some(names)
        }
        None => None,
    };

    let config = FormulaConfig {
        expression: body.expression,
        return_type: body.return_type,
        dependencies: body.dependencies,
    };
    let validation = formula::validate_formula(&config, known_columns.as_deref());
    let references = formula::extract_column_references(&config.expression).unwrap_or_default();

    Ok(Json(ValidateFormulaResponse {
        is_valid: validation.is_valid,
        errors: validation.errors,
        references,
    }))
}

// ---------- GET /formula-functions ----------

pub async fn list_functions(AuthClaims(_): AuthClaims) -> Json<&'static [FunctionSpec]> {
    Json(formula::functions::FUNCTIONS)
}

#[cfg(test)]
mod tests {
    use crate::testutil::{Fixture, send, send_with};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn evaluates_against_row_data() {
        let fx = Fixture::new().await;
        let (status, body) = send(
            &fx,
            Method::POST,
            "/api/v1/evaluate-formula",
            Some(json!({
                "expression": "if({price} * qty > 100, 'bulk', 'single')",
                "rowData": {"price": 30, "qty": 4},
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], json!("bulk"));
        assert_eq!(body["expression"], json!("if({price} * qty > 100, 'bulk', 'single')"));
        assert!(body["evaluatedAt"].is_string());
    }

    #[tokio::test]
    async fn return_type_coerces_the_result() {
        let fx = Fixture::new().await;
        let (status, body) = send(
            &fx,
            Method::POST,
            "/api/v1/evaluate-formula",
            Some(json!({"expression": "concat(a, b)", "rowData": {"a": 1, "b": 2}, "returnType": "number"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], json!(12));
    }

    #[tokio::test]
    async fn bad_requests() {
        let fx = Fixture::new().await;
        let cases = [
            (json!({"rowData": {}}), "Missing expression parameter"),
            (json!({"expression": "1"}), "Missing rowData parameter"),
            (json!({"expression": "1", "rowData": [1]}), "rowData must be an object"),
        ];
        for (request, message) in cases {
            let (status, body) =
                send(&fx, Method::POST, "/api/v1/evaluate-formula", Some(request)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], json!(message));
        }

        let (status, body) = send(
            &fx,
            Method::POST,
            "/api/v1/evaluate-formula",
            Some(json!({"expression": "1 / 0", "rowData": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Formula evaluation failed: division by zero"));
    }

    #[tokio::test]
    async fn requires_a_token() {
        let fx = Fixture::new().await;
        let (status, _) = send_with(
            &fx,
            None,
            Method::POST,
            "/api/v1/evaluate-formula",
            Some(json!({"expression": "1", "rowData": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send_with(
            &fx,
            Some("not-a-jwt"),
            Method::GET,
            "/api/v1/formula-functions",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn validate_checks_known_columns() {
        let fx = Fixture::new().await;
        let orders = fx.database("Orders").await;
        fx.column(orders, "price", "number").await;

        let (status, body) = send(
            &fx,
            Method::POST,
            "/api/v1/validate-formula",
            Some(json!({
                "expression": "price * discount",
                "return_type": "number",
                "database_id": orders,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_valid"], json!(false));
        assert_eq!(body["errors"], json!(["Unknown column: discount"]));
        assert_eq!(body["references"], json!(["price", "discount"]));

        let (_, body) = send(
            &fx,
            Method::POST,
            "/api/v1/validate-formula",
            Some(json!({"expression": "round(price)", "return_type": "number"})),
        )
        .await;
        assert_eq!(body["is_valid"], json!(true));
    }

    #[tokio::test]
    async fn function_catalog_is_listed() {
        let fx = Fixture::new().await;
        let (status, body) = send(&fx, Method::GET, "/api/v1/formula-functions", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|f| f["name"].as_str())
            .collect();
        assert!(names.contains(&"dateDiff"));
        assert!(names.contains(&"isEmpty"));
    }
}
