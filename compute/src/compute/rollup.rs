use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::schema::RollupConfig;
use crate::store::{ComputeStore, RowDocument};

use super::ResolverOutcome;
use super::writeback::Staged;

#[derive(Debug, Clone)]
pub struct RollupColumn {
    pub column_name: String,
    pub config: RollupConfig,
}

/// Merge the store's batch rollup results into `rows`.
///
/// The aggregation itself belongs to the store; this side issues exactly one
/// batch call for the whole row set and writes back what changed.
pub async fn resolve_rollups(
    store: &dyn ComputeStore,
    database_id: Uuid,
    rows: &mut [RowDocument],
    columns: &[RollupColumn],
) -> ResolverOutcome {
    let row_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    let results = match store.batch_compute_rollups(database_id, &row_ids).await {
        Ok(results) => results,
        Err(e) => {
            tracing::warn!(database_id = %database_id, error = %e, "batch rollup failed");
            return ResolverOutcome {
                updates: 0,
                errors: vec![format!("Failed to compute rollups: {e}")],
            };
        }
    };

    let wanted: HashSet<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();
    let mut by_row: HashMap<Uuid, Vec<(String, Value)>> = HashMap::new();
    for result in results {
        if wanted.contains(result.column_name.as_str()) {
            by_row
                .entry(result.row_id)
                .or_default()
                .push((result.column_name, result.value));
        }
    }

    let mut staged = Staged::new(rows);
    for (index, row) in rows.iter().enumerate() {
        if let Some(values) = by_row.remove(&row.id) {
            for (column, value) in values {
                staged.set(index, &column, value);
            }
        }
    }

    let mut errors = Vec::new();
    let updates = staged.persist(store, rows, &mut errors).await;
    ResolverOutcome { updates, errors }
}
