use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Whitelist entries for campaigns that restrict participation
        manager
            .create_table(
                Table::create()
                    .table(AllowedPhones::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AllowedPhones::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AllowedPhones::CampaignId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AllowedPhones::Phone).string_len(10).not_null())
                    .col(ColumnDef::new(AllowedPhones::Name).string_len(128).null())
                    .col(ColumnDef::new(AllowedPhones::Source).string_len(32).not_null())
                    .col(
                        ColumnDef::new(AllowedPhones::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_allowed_phones_campaign")
                            .from(AllowedPhones::Table, AllowedPhones::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_allowed_phones_campaign_phone")
                    .table(AllowedPhones::Table)
                    .col(AllowedPhones::CampaignId)
                    .col(AllowedPhones::Phone)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AllowedPhones::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AllowedPhones {
    Table,
    Id,
    CampaignId,
    Phone,
    Name,
    Source,
    AddedAt,
}

#[derive(DeriveIden)]
enum Campaigns {
    Table,
    Id,
}
