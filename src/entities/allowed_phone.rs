//! Whitelist entry for campaigns that restrict who may spin.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allowed_phones")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(column_type = "String(StringLen::N(36))")]
    pub campaign_id: String,
    /// Normalized phone, unique per campaign
    #[sea_orm(column_type = "String(StringLen::N(10))")]
    pub phone: String,
    #[sea_orm(column_type = "String(StringLen::N(128))")]
    pub name: Option<String>,
    /// Provenance tag, e.g. "manual" or "import"
    #[sea_orm(column_type = "String(StringLen::N(32))")]
    pub source: String,
    pub added_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaign::Entity",
        from = "Column::CampaignId",
        to = "super::campaign::Column::Id"
    )]
    Campaign,
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
