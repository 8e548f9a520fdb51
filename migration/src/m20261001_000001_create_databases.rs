use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Databases::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Databases::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Databases::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Databases::Name).string().not_null())
                    .col(ColumnDef::new(Databases::Description).text().null())
                    .col(ColumnDef::new(Databases::Color).string().null())
                    .col(ColumnDef::new(Databases::Icon).string().null())
                    .col(ColumnDef::new(Databases::ProjectId).uuid().null())
                    .col(
                        ColumnDef::new(Databases::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Databases::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_databases_owner")
                    .table(Databases::Table)
                    .col(Databases::OwnerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Databases::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Databases {
    Table,
    Id,
    OwnerId,
    Name,
    Description,
    Color,
    Icon,
    ProjectId,
    CreatedAt,
    UpdatedAt,
}
