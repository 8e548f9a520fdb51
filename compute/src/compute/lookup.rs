use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

use crate::schema::LookupConfig;
use crate::store::{ComputeStore, Document, RowDocument};

use super::ResolverOutcome;
use super::writeback::Staged;

#[derive(Debug, Clone)]
pub struct LookupColumn {
    pub column_name: String,
    pub config: LookupConfig,
}

/// Project target columns onto `rows`, one fetch per target database.
///
/// Keys that are absent, not UUIDs or dangling resolve to null. A failed
/// target fetch skips that target's columns and leaves their stored values.
pub async fn resolve_lookups(
    store: &dyn ComputeStore,
    rows: &mut [RowDocument],
    columns: &[LookupColumn],
) -> ResolverOutcome {
    let mut errors = Vec::new();
    let mut staged = Staged::new(rows);

    for (target, group) in group_by_target(columns) {
        let keys: BTreeSet<Uuid> = group
            .iter()
            .flat_map(|c| {
                rows.iter()
                    .filter_map(move |r| foreign_key(&r.data, &c.config.relation_column))
            })
            .collect();

        let cache: HashMap<Uuid, Document> = if keys.is_empty() {
            HashMap::new()
        } else {
            let ids: Vec<Uuid> = keys.into_iter().collect();
            match store.fetch_rows(target, Some(&ids)).await {
                Ok(found) => found.into_iter().map(|r| (r.id, r.data)).collect(),
                Err(e) => {
                    tracing::warn!(target_database_id = %target, error = %e, "lookup target fetch failed");
                    errors.push(format!(
                        "Failed to fetch target records from {target}: {e}"
                    ));
                    continue;
                }
            }
        };

        for (index, row) in rows.iter().enumerate() {
            for column in &group {
                let value = foreign_key(&row.data, &column.config.relation_column)
                    .and_then(|id| cache.get(&id))
                    .and_then(|doc| doc.get(&column.config.target_column))
                    .cloned()
                    .unwrap_or(Value::Null);
                staged.set(index, &column.column_name, value);
            }
        }
    }

    let updates = staged.persist(store, rows, &mut errors).await;
    ResolverOutcome { updates, errors }
}

fn group_by_target(columns: &[LookupColumn]) -> BTreeMap<Uuid, Vec<&LookupColumn>> {
    let mut groups: BTreeMap<Uuid, Vec<&LookupColumn>> = BTreeMap::new();
    for column in columns {
        groups
            .entry(column.config.target_database_id)
            .or_default()
            .push(column);
    }
    groups
}

fn foreign_key(data: &Document, relation_column: &str) -> Option<Uuid> {
    let raw = data.get(relation_column)?.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    Uuid::parse_str(raw).ok()
}
