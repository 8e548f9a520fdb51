use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Relations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Relations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Relations::SourceDatabaseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Relations::TargetDatabaseId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Relations::RelationType).string().not_null())
                    .col(ColumnDef::new(Relations::SourceColumn).string().not_null())
                    .col(ColumnDef::new(Relations::TargetColumn).string().null())
                    .col(
                        ColumnDef::new(Relations::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Relations::Table, Relations::SourceDatabaseId)
                            .to(Databases::Table, Databases::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Relations::Table, Relations::TargetDatabaseId)
                            .to(Databases::Table, Databases::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Relations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Relations {
    Table,
    Id,
    SourceDatabaseId,
    TargetDatabaseId,
    RelationType,
    SourceColumn,
    TargetColumn,
    CreatedAt,
}

#[derive(Iden)]
enum Databases {
    Table,
    Id,
}
