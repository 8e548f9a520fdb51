use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::{database, table_data, table_schema};
use crate::schema::{ComputedKind, SchemaRecord};

use super::{ComputeStore, Document, RollupValue, RowDocument, StoreError, rollups};

/// Max ids per `IN (...)` list, below SQLite's bound-parameter limit.
const FETCH_CHUNK: usize = 500;

/// `ComputeStore` backed by the SeaORM connection.
///
/// With an owner set, databases owned by someone else are invisible: their
/// schemas and rows come back empty and their rows cannot be updated.
#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
    owner: Option<Uuid>,
}

impl SeaOrmStore {
    /// Unscoped store, for trusted callers such as the CLI scheduler entry.
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, owner: None }
    }

    pub fn for_owner(db: DatabaseConnection, owner: Uuid) -> Self {
        Self {
            db,
            owner: Some(owner),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn is_visible(&self, database_id: Uuid) -> Result<bool, StoreError> {
        let mut query = database::Entity::find_by_id(database_id);
        if let Some(owner) = self.owner {
            query = query.filter(database::Column::OwnerId.eq(owner));
        }
        Ok(query.count(&self.db).await? > 0)
    }
}

#[async_trait::async_trait]
impl ComputeStore for SeaOrmStore {
    async fn fetch_computed_schemas(
        &self,
        database_id: Uuid,
        kinds: &[ComputedKind],
    ) -> Result<Vec<SchemaRecord>, StoreError> {
        if kinds.is_empty() || !self.is_visible(database_id).await? {
            return Ok(Vec::new());
        }

        let models = table_schema::Entity::find()
            .filter(table_schema::Column::DatabaseId.eq(database_id))
            .filter(table_schema::Column::ColumnType.is_in(kinds.iter().map(|k| k.as_str())))
            .order_by_asc(table_schema::Column::Position)
            .all(&self.db)
            .await?;

        let records = models
            .iter()
            .filter_map(|m| match SchemaRecord::from_model(m) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(column = %m.column_name, error = %e, "skipping column schema");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    async fn fetch_rows(
        &self,
        database_id: Uuid,
        row_ids: Option<&[Uuid]>,
    ) -> Result<Vec<RowDocument>, StoreError> {
        if !self.is_visible(database_id).await? {
            return Ok(Vec::new());
        }

        let base = || {
            table_data::Entity::find()
                .filter(table_data::Column::DatabaseId.eq(database_id))
                .order_by_asc(table_data::Column::CreatedAt)
                .order_by_asc(table_data::Column::Id)
        };

        let models = match row_ids {
            None => base().all(&self.db).await?,
            Some(ids) => {
                let mut models = Vec::with_capacity(ids.len());
                for chunk in ids.chunks(FETCH_CHUNK) {
                    let batch = base()
                        .filter(table_data::Column::Id.is_in(chunk.iter().copied()))
                        .all(&self.db)
                        .await?;
                    models.extend(batch);
                }
                models
            }
        };

        Ok(models.into_iter().map(RowDocument::from_model).collect())
    }

    async fn batch_compute_rollups(
        &self,
        database_id: Uuid,
        row_ids: &[Uuid],
    ) -> Result<Vec<RollupValue>, StoreError> {
        rollups::batch_compute_rollups(self, database_id, row_ids).await
    }

    async fn update_row_data(&self, row_id: Uuid, data: &Document) -> Result<(), StoreError> {
        let model = table_data::Entity::find_by_id(row_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Row {row_id}")))?;

        if !self.is_visible(model.database_id).await? {
            return Err(StoreError::NotFound(format!("Row {row_id}")));
        }

        let mut active: table_data::ActiveModel = model.into();
        active.data = Set(serde_json::to_string(data)?);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(&self.db).await?;
        Ok(())
    }
}
