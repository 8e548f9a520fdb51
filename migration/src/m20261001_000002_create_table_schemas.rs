use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TableSchemas::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TableSchemas::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TableSchemas::DatabaseId).uuid().not_null())
                    .col(ColumnDef::new(TableSchemas::ColumnName).string().not_null())
                    .col(ColumnDef::new(TableSchemas::ColumnType).string().not_null())
                    .col(
                        ColumnDef::new(TableSchemas::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TableSchemas::IsRequired)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(TableSchemas::LookupConfig).text().null())
                    .col(ColumnDef::new(TableSchemas::RollupConfig).text().null())
                    .col(ColumnDef::new(TableSchemas::FormulaConfig).text().null())
                    .col(
                        ColumnDef::new(TableSchemas::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(TableSchemas::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TableSchemas::Table, TableSchemas::DatabaseId)
                            .to(Databases::Table, Databases::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_table_schemas_database_column")
                    .table(TableSchemas::Table)
                    .col(TableSchemas::DatabaseId)
                    .col(TableSchemas::ColumnName)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TableSchemas::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TableSchemas {
    Table,
    Id,
    DatabaseId,
    ColumnName,
    ColumnType,
    Position,
    IsRequired,
    LookupConfig,
    RollupConfig,
    FormulaConfig,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Databases {
    Table,
    Id,
}
