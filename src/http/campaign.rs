//! Public campaign view: what the wheel frontend needs to render itself.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::eligibility;
use crate::entities::prize;
use crate::models::campaign::{CampaignResponse, CampaignView, LiveCampaign, PrizeView};
use crate::schedule;
use crate::state::AppState;

use super::HttpError;

const LIVE_CAMPAIGN_KEY: &str = "live";

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_campaign))
}

async fn get_campaign(
    State(state): State<AppState>,
) -> Result<Json<CampaignResponse>, HttpError> {
    let display = match state.cache.live_campaign.get(LIVE_CAMPAIGN_KEY).await {
        Some(cached) => cached,
        None => {
            let campaign = eligibility::find_live_campaign(&state.database)
                .await
                .map_err(|err| {
                    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                })?
                .ok_or_else(|| {
                    HttpError::new(StatusCode::NOT_FOUND, "No active campaign".to_string())
                })?;

            let prizes = prize::Entity::find()
                .filter(prize::Column::CampaignId.eq(&campaign.id))
                .filter(prize::Column::Active.eq(true))
                .order_by_asc(prize::Column::CreatedAt)
                .order_by_asc(prize::Column::Id)
                .all(&state.database)
                .await
                .map_err(|err| {
                    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                })?;

            let display = Arc::new(LiveCampaign { campaign, prizes });
            state
                .cache
                .live_campaign
                .insert(LIVE_CAMPAIGN_KEY.to_string(), Arc::clone(&display))
                .await;
            display
        }
    };

    // Schedule state is time-dependent, so it is never cached
    let campaign = &display.campaign;
    let window = schedule::is_open(
        campaign.schedule_start.as_deref(),
        campaign.schedule_end.as_deref(),
        campaign.schedule_offset_minutes.unwrap_or(0),
        Utc::now(),
    );

    Ok(Json(CampaignResponse {
        campaign: CampaignView::from(campaign),
        prizes: display.prizes.iter().map(PrizeView::from).collect(),
        schedule: window,
    }))
}
