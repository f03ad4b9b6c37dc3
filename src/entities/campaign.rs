//! Campaign entity: one promotional wheel with its own prize set and rules.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaigns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// URL-safe identifier, unique across campaigns
    #[sea_orm(column_type = "String(StringLen::N(64))")]
    pub slug: String,
    #[sea_orm(column_type = "String(StringLen::N(128))")]
    pub name: String,
    /// Soft-disable switch; campaigns are never physically deleted
    pub active: bool,
    /// Where the wheel sends winners after their spin
    #[sea_orm(column_type = "String(StringLen::N(512))")]
    pub redirect_url: String,
    pub expiration_date: Option<DateTimeWithTimeZone>,
    /// Daily window start, "HH:MM" in the campaign's local time
    #[sea_orm(column_type = "String(StringLen::N(5))")]
    pub schedule_start: Option<String>,
    /// Daily window end, "HH:MM"; may be earlier than start (crosses midnight)
    #[sea_orm(column_type = "String(StringLen::N(5))")]
    pub schedule_end: Option<String>,
    /// Campaign-local offset in minutes east of UTC
    pub schedule_offset_minutes: Option<i32>,
    pub require_whitelist: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// A campaign is live when it is active and not past its expiration.
    /// The schedule window is a separate predicate (see `crate::schedule`).
    pub fn is_live(&self) -> bool {
        if !self.active {
            return false;
        }
        match self.expiration_date {
            None => true,
            Some(expiry) => expiry > Utc::now().fixed_offset(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::prize::Entity")]
    Prize,
    #[sea_orm(has_many = "super::spin::Entity")]
    Spin,
    #[sea_orm(has_many = "super::allowed_phone::Entity")]
    AllowedPhone,
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

impl Related<super::allowed_phone::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AllowedPhone.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
