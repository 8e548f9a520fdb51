//! Batch rollup aggregation: the store-side counterpart of a
//! `batch_compute_rollups(database_id, row_ids)` stored procedure.

use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::compute::aggregate::aggregate;
use crate::schema::{ComputedKind, RelationType, RollupConfig};

use super::{ComputeStore, Document, RollupValue, RowDocument, SeaOrmStore, StoreError};

pub(super) async fn batch_compute_rollups(
    store: &SeaOrmStore,
    database_id: Uuid,
    row_ids: &[Uuid],
) -> Result<Vec<RollupValue>, StoreError> {
    if row_ids.is_empty() {
        return Ok(Vec::new());
    }

    let schemas = store
        .fetch_computed_schemas(database_id, &[ComputedKind::Rollup])
        .await?;
    if schemas.is_empty() {
        return Ok(Vec::new());
    }

    let sources = store.fetch_rows(database_id, Some(row_ids)).await?;

    // One load per target database, shared by every rollup pointing at it.
    let mut full_tables: HashMap<Uuid, Vec<RowDocument>> = HashMap::new();
    let mut by_id: HashMap<Uuid, HashMap<Uuid, Document>> = HashMap::new();
    let mut results = Vec::with_capacity(sources.len() * schemas.len());

    for schema in &schemas {
        let config = match schema.rollup() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(column = %schema.column_name, error = %e, "skipping rollup column");
                continue;
            }
        };

        let related = match config.relation_type {
            RelationType::OneToMany => {
                if !full_tables.contains_key(&config.target_database_id) {
                    let rows = store.fetch_rows(config.target_database_id, None).await?;
                    full_tables.insert(config.target_database_id, rows);
                }
                let targets = &full_tables[&config.target_database_id];
                back_references(&sources, targets, &config)
            }
            RelationType::ManyToOne | RelationType::ManyToMany => {
                let cache = by_id.entry(config.target_database_id).or_default();
                let missing: Vec<Uuid> = sources
                    .iter()
                    .flat_map(|s| referenced_ids(s.data.get(&config.relation_column)))
                    .filter(|id| !cache.contains_key(id))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                if !missing.is_empty() {
                    for row in store
                        .fetch_rows(config.target_database_id, Some(&missing))
                        .await?
                    {
                        cache.insert(row.id, row.data);
                    }
                }
                forward_references(&sources, cache, &config)
            }
        };

        for (source, docs) in sources.iter().zip(related) {
            let values: Vec<Option<&Value>> =
                docs.iter().map(|d| d.get(&config.target_column)).collect();
            results.push(RollupValue {
                row_id: source.id,
                column_name: schema.column_name.clone(),
                value: aggregate(config.aggregation, &values),
            });
        }
    }

    Ok(results)
}

/// Related targets per source row (same order as `sources`) when the targets
/// point back at the source through `relation_column`.
fn back_references<'a>(
    sources: &[RowDocument],
    targets: &'a [RowDocument],
    config: &RollupConfig,
) -> Vec<Vec<&'a Document>> {
    let mut index: HashMap<Uuid, Vec<&'a Document>> = HashMap::new();
    for target in targets {
        for id in referenced_ids(target.data.get(&config.relation_column)) {
            index.entry(id).or_default().push(&target.data);
        }
    }
    sources
        .iter()
        .map(|s| index.remove(&s.id).unwrap_or_default())
        .collect()
}

/// Related targets per source row when the source holds the target ids.
fn forward_references<'a>(
    sources: &[RowDocument],
    cache: &'a HashMap<Uuid, Document>,
    config: &RollupConfig,
) -> Vec<Vec<&'a Document>> {
    sources
        .iter()
        .map(|s| {
            referenced_ids(s.data.get(&config.relation_column))
                .iter()
                .filter_map(|id| cache.get(id))
                .collect()
        })
        .collect()
}

/// Ids held by a relation field: one id string or an array of them.
/// Duplicates are dropped so a row is never counted twice.
fn referenced_ids(value: Option<&Value>) -> Vec<Uuid> {
    let mut ids = Vec::new();
    let mut push = |v: &Value| {
        if let Some(id) = v.as_str().and_then(|s| Uuid::parse_str(s.trim()).ok())
            && !ids.contains(&id)
        {
            ids.push(id);
        }
    };
    match value {
        Some(Value::Array(items)) => items.iter().for_each(&mut push),
        Some(v) => push(v),
        None => {}
    }
    ids
}
