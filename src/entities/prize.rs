//! Prize entity: a wheel segment with weight, coupon template, and win cap.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prizes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(column_type = "String(StringLen::N(36))")]
    pub campaign_id: String,
    #[sea_orm(column_type = "String(StringLen::N(128))")]
    pub name: String,
    /// Relative draw probability; non-positive weights never win
    pub weight: i32,
    /// Wheel segment color, display only
    #[sea_orm(column_type = "String(StringLen::N(16))")]
    pub color: String,
    /// percent_off | fixed_amount | free_shipping
    #[sea_orm(column_type = "String(StringLen::N(32))")]
    pub coupon_type: String,
    pub coupon_value: Option<i32>,
    /// Fixed redemption code shared by every winner, when set
    #[sea_orm(column_type = "String(StringLen::N(64))")]
    pub coupon_code: Option<String>,
    /// Lifetime award cap (NULL = unlimited)
    pub max_wins: Option<i32>,
    /// Times awarded so far; only ever incremented
    pub win_count: i32,
    pub active: bool,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Under its cap (or uncapped) and therefore awardable on the normal path.
    pub fn has_capacity(&self) -> bool {
        match self.max_wins {
            None => true,
            Some(max) => self.win_count < max,
        }
    }

    pub fn is_capped(&self) -> bool {
        self.max_wins.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaign::Entity",
        from = "Column::CampaignId",
        to = "super::campaign::Column::Id"
    )]
    Campaign,
    #[sea_orm(has_many = "super::spin::Entity")]
    Spin,
    #[sea_orm(has_many = "super::coupon::Entity")]
    Coupon,
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl Related<super::spin::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Spin.def()
    }
}

impl Related<super::coupon::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Coupon.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
