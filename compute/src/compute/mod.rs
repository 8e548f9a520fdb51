//! Lookup/rollup computation over one database.
//!
//! A run is strictly sequential: schemas, rows, lookups, rollups, with one
//! write per changed row and no transaction around the whole pass. Failures
//! past the initial fetches are collected, never retried.

use serde::Serialize;
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

use crate::schema::{ColumnType, ComputedKind, SchemaRecord};
use crate::store::{ComputeStore, StoreError};

pub mod aggregate;
mod lookup;
mod rollup;
mod writeback;


pub use lookup::{LookupColumn, resolve_lookups};
pub use rollup::{RollupColumn, resolve_rollups};

// ---------- request / summary ----------

#[derive(Debug, Clone)]
pub struct ComputeRequest {
    pub database_id: Uuid,
    /// `None` or empty means every row of the database.
    pub row_ids: Option<Vec<Uuid>>,
    /// `None` means both lookups and rollups.
    pub column_types: Option<Vec<ComputedKind>>,
}

impl ComputeRequest {
    pub fn all(database_id: Uuid) -> Self {
        Self {
            database_id,
            row_ids: None,
            column_types: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputeSummary {
    pub success: bool,
    pub updated_rows: usize,
    pub lookup_updates: usize,
    pub rollup_updates: usize,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComputeSummary {
    fn nothing_to_do(started: Instant, message: &str) -> Self {
        Self {
            success: true,
            updated_rows: 0,
            lookup_updates: 0,
            rollup_updates: 0,
            duration_ms: elapsed_ms(started),
            errors: Vec::new(),
            message: Some(message.to_string()),
        }
    }
}

/// Per-resolver result: rows written and the errors met on the way.
#[derive(Debug, Default)]
pub struct ResolverOutcome {
    pub updates: usize,
    pub errors: Vec<String>,
}

// ---------- errors ----------

/// Failures that abort a run before any row is touched.
#[derive(Debug)]
pub enum ComputeError {
    Schemas(StoreError),
    Rows(StoreError),
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeError::Schemas(e) => write!(f, "Failed to fetch schemas: {e}"),
            ComputeError::Rows(e) => write!(f, "Failed to fetch rows: {e}"),
        }
    }
}

impl std::error::Error for ComputeError {}

// ---------- orchestrator ----------

pub async fn compute_columns(
    store: &dyn ComputeStore,
    request: &ComputeRequest,
) -> Result<ComputeSummary, ComputeError> {
    let started = Instant::now();
    let database_id = request.database_id;

    let kinds = request
        .column_types
        .clone()
        .unwrap_or_else(|| ComputedKind::ALL.to_vec());

    let schemas = store
        .fetch_computed_schemas(database_id, &kinds)
        .await
        .map_err(ComputeError::Schemas)?;
    if schemas.is_empty() {
        return Ok(ComputeSummary::nothing_to_do(
            started,
            "No computed columns found for this database",
        ));
    }

    let row_ids = request.row_ids.as_deref().filter(|ids| !ids.is_empty());
    let mut rows = store
        .fetch_rows(database_id, row_ids)
        .await
        .map_err(ComputeError::Rows)?;
    if rows.is_empty() {
        return Ok(ComputeSummary::nothing_to_do(started, "No rows found to update"));
    }

    let mut errors = Vec::new();
    let (lookups, rollups) = split_columns(&schemas, &mut errors);

    let mut lookup_updates = 0;
    if !lookups.is_empty() {
        let outcome = resolve_lookups(store, &mut rows, &lookups).await;
        lookup_updates = outcome.updates;
        errors.extend(outcome.errors);
    }

    let mut rollup_updates = 0;
    if !rollups.is_empty() {
        let outcome = resolve_rollups(store, database_id, &mut rows, &rollups).await;
        rollup_updates = outcome.updates;
        errors.extend(outcome.errors);
    }

    let summary = ComputeSummary {
        success: errors.is_empty(),
        updated_rows: rows.len(),
        lookup_updates,
        rollup_updates,
        duration_ms: elapsed_ms(started),
        errors,
        message: None,
    };

    tracing::info!(
        database_id = %database_id,
        rows = summary.updated_rows,
        lookup_updates,
        rollup_updates,
        errors = summary.errors.len(),
        duration_ms = summary.duration_ms,
        "computed columns refreshed"
    );

    Ok(summary)
}

/// Parse the configs of the fetched schemas. Broken ones become error
/// entries and are left out of the run.
fn split_columns(
    schemas: &[SchemaRecord],
    errors: &mut Vec<String>,
) -> (Vec<LookupColumn>, Vec<RollupColumn>) {
    let mut lookups = Vec::new();
    let mut rollups = Vec::new();

    for schema in schemas {
        match schema.column_type {
            ColumnType::Lookup => match schema.lookup() {
                Ok(config) => lookups.push(LookupColumn {
                    column_name: schema.column_name.clone(),
                    config,
                }),
                Err(e) => errors.push(format!(
                    "Column {} has an invalid lookup config: {e}",
                    schema.column_name
                )),
            },
            ColumnType::Rollup => match schema.rollup() {
                Ok(config) => rollups.push(RollupColumn {
                    column_name: schema.column_name.clone(),
                    config,
                }),
                Err(e) => errors.push(format!(
                    "Column {} has an invalid rollup config: {e}",
                    schema.column_name
                )),
            },
            _ => {}
        }
    }

    (lookups, rollups)
}

fn elapsed_ms(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}
