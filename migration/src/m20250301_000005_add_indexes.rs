use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Projects {
    Table,
    OwnerId,
    AcceptedFreelancerId,
    Status,
}

#[derive(DeriveIden)]
enum Bids {
    Table,
    ProjectId,
    FreelancerId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Owner listings and history
        manager
            .create_index(
                Index::create()
                    .name("idx_projects_owner_id")
                    .table(Projects::Table)
                    .col(Projects::OwnerId)
                    .to_owned(),
            )
            .await?;

        // Freelancer "assigned to me" listings
        manager
            .create_index(
                Index::create()
                    .name("idx_projects_accepted_freelancer_id")
                    .table(Projects::Table)
                    .col(Projects::AcceptedFreelancerId)
                    .to_owned(),
            )
            .await?;

        // Open-project board
        manager
            .create_index(
                Index::create()
                    .name("idx_projects_status")
                    .table(Projects::Table)
                    .col(Projects::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bids_project_id")
                    .table(Bids::Table)
                    .col(Bids::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bids_freelancer_id")
                    .table(Bids::Table)
                    .col(Bids::FreelancerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_projects_owner_id").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_projects_accepted_freelancer_id")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_projects_status").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_bids_project_id").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_bids_freelancer_id").to_owned())
            .await?;

        Ok(())
    }
}
