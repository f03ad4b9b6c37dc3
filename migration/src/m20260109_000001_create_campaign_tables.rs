use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Campaigns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Campaigns::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Campaigns::Slug)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Campaigns::Name).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Campaigns::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Campaigns::RedirectUrl)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Campaigns::ExpirationDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    // Schedule window is stored as "HH:MM" strings plus a UTC
                    // offset; evaluation happens in src/schedule.rs
                    .col(ColumnDef::new(Campaigns::ScheduleStart).string_len(5).null())
                    .col(ColumnDef::new(Campaigns::ScheduleEnd).string_len(5).null())
                    .col(
                        ColumnDef::new(Campaigns::ScheduleOffsetMinutes)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Campaigns::RequireWhitelist)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Campaigns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Campaigns::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Prizes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Prizes::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Prizes::CampaignId).string_len(36).not_null())
                    .col(ColumnDef::new(Prizes::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Prizes::Weight).integer().not_null())
                    .col(ColumnDef::new(Prizes::Color).string_len(16).not_null())
                    .col(ColumnDef::new(Prizes::CouponType).string_len(32).not_null())
                    .col(ColumnDef::new(Prizes::CouponValue).integer().null())
                    .col(ColumnDef::new(Prizes::CouponCode).string_len(64).null())
                    .col(ColumnDef::new(Prizes::MaxWins).integer().null())
                    .col(
                        ColumnDef::new(Prizes::WinCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Prizes::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Prizes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prizes_campaign")
                            .from(Prizes::Table, Prizes::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Stable selection order for the wheel is (created_at, id)
        manager
            .create_index(
                Index::create()
                    .name("idx_prizes_campaign_created")
                    .table(Prizes::Table)
                    .col(Prizes::CampaignId)
                    .col(Prizes::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Prizes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Campaigns::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Campaigns {
    Table,
    Id,
    Slug,
    Name,
    Active,
    RedirectUrl,
    ExpirationDate,
    ScheduleStart,
    ScheduleEnd,
    ScheduleOffsetMinutes,
    RequireWhitelist,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Prizes {
    Table,
    Id,
    CampaignId,
    Name,
    Weight,
    Color,
    CouponType,
    CouponValue,
    CouponCode,
    MaxWins,
    WinCount,
    Active,
    CreatedAt,
}
