pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_databases;
mod m20261001_000002_create_table_schemas;
mod m20261001_000003_create_table_data;
mod m20261001_000004_create_relations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_databases::Migration),
            Box::new(m20261001_000002_create_table_schemas::Migration),
            Box::new(m20261001_000003_create_table_data::Migration),
            Box::new(m20261001_000004_create_relations::Migration),
        ]
    }
}
