use serde::Serialize;

use crate::entities::{campaign, prize};
use crate::schedule::ScheduleStatus;

/// The live campaign with its active prizes, as read from the ledger. This
/// is what the public-view cache holds; projections happen per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCampaign {
    pub campaign: campaign::Model,
    pub prizes: Vec<prize::Model>,
}

/// Public campaign fields. No weights, no win counts: the wheel client must
/// not be able to infer odds or remaining stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignView {
    pub id: String,
    pub name: String,
    pub redirect_url: String,
}

impl From<&campaign::Model> for CampaignView {
    fn from(model: &campaign::Model) -> Self {
        Self {
            id: model.id.clone(),
            name: model.name.clone(),
            redirect_url: model.redirect_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrizeView {
    pub id: String,
    pub name: String,
    pub color: String,
    pub coupon_type: String,
    pub coupon_value: Option<i32>,
}

impl From<&prize::Model> for PrizeView {
    fn from(model: &prize::Model) -> Self {
        Self {
            id: model.id.clone(),
            name: model.name.clone(),
            color: model.color.clone(),
            coupon_type: model.coupon_type.clone(),
            coupon_value: model.coupon_value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignResponse {
    pub campaign: CampaignView,
    pub prizes: Vec<PrizeView>,
    pub schedule: ScheduleStatus,
}
