use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TableData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TableData::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TableData::DatabaseId).uuid().not_null())
                    // JSON object text: column name -> value
                    .col(
                        ColumnDef::new(TableData::Data)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(TableData::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(TableData::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TableData::Table, TableData::DatabaseId)
                            .to(Databases::Table, Databases::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_table_data_database")
                    .table(TableData::Table)
                    .col(TableData::DatabaseId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TableData::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TableData {
    Table,
    Id,
    DatabaseId,
    Data,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Databases {
    Table,
    Id,
}
