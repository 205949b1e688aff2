use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Bids {
    Table,
    ProjectId,
    FreelancerId,
}

/// One bid per freelancer per project. Inserts race against this index, not
/// against an application-level existence check.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_bids_project_freelancer_unique")
                    .table(Bids::Table)
                    .col(Bids::ProjectId)
                    .col(Bids::FreelancerId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_bids_project_freelancer_unique")
                    .table(Bids::Table)
                    .to_owned(),
            )
            .await
    }
}
