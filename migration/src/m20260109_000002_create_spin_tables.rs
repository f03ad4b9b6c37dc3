use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Spins::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Spins::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Spins::CampaignId).string_len(36).not_null())
                    .col(ColumnDef::new(Spins::PrizeId).string_len(36).not_null())
                    .col(ColumnDef::new(Spins::Phone).string_len(10).null())
                    .col(ColumnDef::new(Spins::Email).string_len(254).null())
                    .col(ColumnDef::new(Spins::CouponCode).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Spins::IpAddress)
                            .string_len(45) // IPv6 max length
                            .not_null(),
                    )
                    .col(ColumnDef::new(Spins::UserAgent).string_len(512).not_null())
                    .col(
                        ColumnDef::new(Spins::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_spins_campaign")
                            .from(Spins::Table, Spins::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    // Restrict: the spin history is the audit trail, a prize
                    // with recorded wins cannot be deleted out from under it
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_spins_prize")
                            .from(Spins::Table, Spins::PrizeId)
                            .to(Prizes::Table, Prizes::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One spin per normalized identity per campaign. NULLs are distinct,
        // so single-channel identities never collide on the absent channel.
        manager
            .create_index(
                Index::create()
                    .name("idx_spins_campaign_phone")
                    .table(Spins::Table)
                    .col(Spins::CampaignId)
                    .col(Spins::Phone)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_spins_campaign_email")
                    .table(Spins::Table)
                    .col(Spins::CampaignId)
                    .col(Spins::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index for rate limiting by source address
        manager
            .create_index(
                Index::create()
                    .name("idx_spins_ip_time")
                    .table(Spins::Table)
                    .col(Spins::IpAddress)
                    .col(Spins::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Coupons::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Coupons::Code).string_len(64).not_null())
                    .col(ColumnDef::new(Coupons::PrizeId).string_len(36).not_null())
                    .col(ColumnDef::new(Coupons::SpinId).string_len(36).not_null())
                    .col(ColumnDef::new(Coupons::Phone).string_len(10).null())
                    .col(ColumnDef::new(Coupons::Email).string_len(254).null())
                    .col(
                        ColumnDef::new(Coupons::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Coupons::Used)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Coupons::RedeemedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Coupons::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupons_prize")
                            .from(Coupons::Table, Coupons::PrizeId)
                            .to(Prizes::Table, Prizes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupons_spin")
                            .from(Coupons::Table, Coupons::SpinId)
                            .to(Spins::Table, Spins::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Not unique: prizes configured with a fixed coupon code share that
        // code across every winner. Generated codes are kept unique by the
        // in-transaction exists check in codegen.
        manager
            .create_index(
                Index::create()
                    .name("idx_coupons_code")
                    .table(Coupons::Table)
                    .col(Coupons::Code)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_coupons_spin")
                    .table(Coupons::Table)
                    .col(Coupons::SpinId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Coupons::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Spins::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Spins {
    Table,
    Id,
    CampaignId,
    PrizeId,
    Phone,
    Email,
    CouponCode,
    IpAddress,
    UserAgent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Coupons {
    Table,
    Id,
    Code,
    PrizeId,
    SpinId,
    Phone,
    Email,
    ExpiresAt,
    Used,
    RedeemedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Campaigns {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Prizes {
    Table,
    Id,
}
