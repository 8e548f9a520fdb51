use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "table_schemas")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub database_id: Uuid,
    pub column_name: String,
    /// One of the `schema::ColumnType` names (e.g. "text", "lookup").
    pub column_type: String,
    pub position: i32,
    pub is_required: bool,
    /// JSON text, present for `lookup` columns.
    pub lookup_config: Option<String>,
    /// JSON text, present for `rollup` columns.
    pub rollup_config: Option<String>,
    /// JSON text, present for `formula` columns.
    pub formula_config: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::database::Entity",
        from = "Column::DatabaseId",
        to = "super::database::Column::Id",
        on_delete = "Cascade"
    )]
    Database,
}

impl Related<super::database::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Database.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
