//! Spin entity: one successful allocation per identity per campaign.
//!
//! Rows are immutable once written. Unique indexes on (campaign_id, phone)
//! and (campaign_id, email) back the at-most-one-spin guarantee.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "spins")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(column_type = "String(StringLen::N(36))")]
    pub campaign_id: String,
    #[sea_orm(column_type = "String(StringLen::N(36))")]
    pub prize_id: String,
    /// Normalized phone (last 10 digits), when supplied
    #[sea_orm(column_type = "String(StringLen::N(10))")]
    pub phone: Option<String>,
    /// Normalized email (trimmed, lowercased), when supplied
    #[sea_orm(column_type = "String(StringLen::N(254))")]
    pub email: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(64))")]
    pub coupon_code: String,
    /// Source address of the request (for rate limiting)
    #[sea_orm(column_type = "String(StringLen::N(45))")]
    pub ip_address: String,
    #[sea_orm(column_type = "String(StringLen::N(512))")]
    pub user_agent: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaign::Entity",
        from = "Column::CampaignId",
        to = "super::campaign::Column::Id"
    )]
    Campaign,
    #[sea_orm(
        belongs_to = "super::prize::Entity",
        from = "Column::PrizeId",
        to = "super::prize::Column::Id"
    )]
    Prize,
    #[sea_orm(has_one = "super::coupon::Entity")]
    Coupon,
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl Related<super::prize::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prize.def()
    }
}

impl Related<super::coupon::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Coupon.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
