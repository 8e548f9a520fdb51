use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// A user-defined table ("database" in platform terms).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "databases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub project_id: Option<Uuid>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::table_schema::Entity")]
    TableSchema,
    #[sea_orm(has_many = "super::table_data::Entity")]
    TableData,
}

impl Related<super::table_schema::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TableSchema.def()
    }
}

impl Related<super::table_data::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TableData.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
