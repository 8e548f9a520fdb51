use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// A declared link between two databases. Cycles are allowed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "relations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub source_database_id: Uuid,
    pub target_database_id: Uuid,
    pub relation_type: String,
    pub source_column: String,
    pub target_column: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::database::Entity",
        from = "Column::SourceDatabaseId",
        to = "super::database::Column::Id",
        on_delete = "Cascade"
    )]
    SourceDatabase,
    #[sea_orm(
        belongs_to = "super::database::Entity",
        from = "Column::TargetDatabaseId",
        to = "super::database::Column::Id",
        on_delete = "Cascade"
    )]
    TargetDatabase,
}

impl ActiveModelBehavior for ActiveModel {}
