//! Coupon entity: the redeemable issued atomically with its spin.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Redemption code; generated codes are unique, prize-fixed codes are
    /// shared by design
    #[sea_orm(column_type = "String(StringLen::N(64))")]
    pub code: String,
    #[sea_orm(column_type = "String(StringLen::N(36))")]
    pub prize_id: String,
    #[sea_orm(column_type = "String(StringLen::N(36))")]
    pub spin_id: String,
    #[sea_orm(column_type = "String(StringLen::N(10))")]
    pub phone: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(254))")]
    pub email: Option<String>,
    pub expires_at: DateTimeWithTimeZone,
    /// Flipped by the external redemption workflow
    pub used: bool,
    pub redeemed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::prize::Entity",
        from = "Column::PrizeId",
        to = "super::prize::Column::Id"
    )]
    Prize,
    #[sea_orm(
        belongs_to = "super::spin::Entity",
        from = "Column::SpinId",
        to = "super::spin::Column::Id"
    )]
    Spin,
}

impl Related<super::prize::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prize.def()
    }
}

impl Related<super::spin::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Spin.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
