//! Public spin endpoints: the advisory verify step the wheel calls before
//! spinning, and the execute step that performs the allocation itself.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::eligibility::{self, IneligibleReason};
use crate::engine::{AllocationError, SpinRequest};
use crate::entities::campaign;
use crate::identity::SpinIdentity;
use crate::models::campaign::PrizeView;
use crate::schedule::{self, ScheduleStatus};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verify", post(verify_spin))
        .route("/execute", post(execute_spin))
}

#[derive(Debug, Deserialize)]
pub struct SpinPayload {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IneligibleReason>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub prize_index: usize,
    pub prize: PrizeView,
    pub coupon: CouponView,
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
pub struct CouponView {
    pub code: String,
    pub expires_at: DateTime<FixedOffset>,
}

/// Advisory eligibility check. Always 200 with a verdict; the authoritative
/// answer is whatever the allocation transaction says later.
async fn verify_spin(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<SpinPayload>,
) -> Result<Json<VerifyResponse>, HttpError> {
    let identity = match SpinIdentity::from_raw(payload.phone.as_deref(), payload.email.as_deref())
    {
        Ok(identity) => identity,
        Err(err) => {
            return Ok(Json(VerifyResponse {
                eligible: false,
                reason: None,
                message: err.to_string(),
            }));
        }
    };

    let source_ip = source_ip(&headers, addr);
    let campaign = eligibility::find_live_campaign(&state.database)
        .await
        .map_err(internal)?;

    if let Some(campaign) = &campaign {
        let window = campaign_window(campaign);
        if !window.open {
            return Ok(Json(VerifyResponse {
                eligible: false,
                reason: Some(IneligibleReason::NoActiveCampaign),
                message: closed_message(&window),
            }));
        }
    }

    let verdict = eligibility::check_eligibility(
        &state.database,
        &state.config.rate_limiting,
        campaign.as_ref(),
        &identity,
        &source_ip,
    )
    .await
    .map_err(internal)?;

    let message = match verdict.reason {
        Some(reason) => reason.message().to_string(),
        None => "Ready to spin!".to_string(),
    };
    Ok(Json(VerifyResponse {
        eligible: verdict.eligible,
        reason: verdict.reason,
        message,
    }))
}

/// Perform the allocation: advisory short-circuit first, then the engine's
/// transactional sequence.
async fn execute_spin(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<SpinPayload>,
) -> Result<Json<ExecuteResponse>, HttpError> {
    let identity = SpinIdentity::from_raw(payload.phone.as_deref(), payload.email.as_deref())
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let source_ip = source_ip(&headers, addr);
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let campaign = eligibility::find_live_campaign(&state.database)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            HttpError::with_reason(
                StatusCode::NOT_FOUND,
                IneligibleReason::NoActiveCampaign.message().to_string(),
                IneligibleReason::NoActiveCampaign.as_str(),
            )
        })?;

    // A closed schedule window reads the same as an inactive campaign
    let window = campaign_window(&campaign);
    if !window.open {
        return Err(HttpError::with_reason(
            StatusCode::NOT_FOUND,
            closed_message(&window),
            IneligibleReason::NoActiveCampaign.as_str(),
        ));
    }

    let advisory = eligibility::check_eligibility(
        &state.database,
        &state.config.rate_limiting,
        Some(&campaign),
        &identity,
        &source_ip,
    )
    .await
    .map_err(internal)?;
    if let Some(reason) = advisory.reason {
        return Err(eligibility_error(reason));
    }

    let request = SpinRequest {
        phone: payload.phone,
        email: payload.email,
        ip_address: source_ip,
        user_agent,
    };
    let outcome = state
        .engine
        .allocate(&campaign.id, &request)
        .await
        .map_err(allocation_error)?;

    Ok(Json(ExecuteResponse {
        success: true,
        prize_index: outcome.prize_index,
        prize: PrizeView::from(&outcome.prize),
        coupon: CouponView {
            code: outcome.coupon.code,
            expires_at: outcome.coupon.expires_at,
        },
        redirect_url: outcome.redirect_url,
    }))
}

fn campaign_window(campaign: &campaign::Model) -> ScheduleStatus {
    schedule::is_open(
        campaign.schedule_start.as_deref(),
        campaign.schedule_end.as_deref(),
        campaign.schedule_offset_minutes.unwrap_or(0),
        Utc::now(),
    )
}

fn closed_message(window: &ScheduleStatus) -> String {
    match &window.next_open_display {
        Some(opens_at) => format!("The wheel is closed right now. Come back at {opens_at}."),
        None => "The wheel is closed right now.".to_string(),
    }
}

fn eligibility_error(reason: IneligibleReason) -> HttpError {
    let status = match reason {
        IneligibleReason::NoActiveCampaign => StatusCode::NOT_FOUND,
        IneligibleReason::NotWhitelisted => StatusCode::FORBIDDEN,
        IneligibleReason::AlreadySpun => StatusCode::CONFLICT,
        IneligibleReason::RateLimited => StatusCode::TOO_MANY_REQUESTS,
    };
    HttpError::with_reason(status, reason.message().to_string(), reason.as_str())
}

fn allocation_error(err: AllocationError) -> HttpError {
    match err {
        AllocationError::Identity(err) => HttpError::new(StatusCode::BAD_REQUEST, err.to_string()),
        AllocationError::NoActiveCampaign => eligibility_error(IneligibleReason::NoActiveCampaign),
        AllocationError::AlreadySpun => eligibility_error(IneligibleReason::AlreadySpun),
        AllocationError::NoPrizesConfigured => HttpError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "The wheel has no prizes configured".to_string(),
        ),
        AllocationError::CodeSpaceExhausted { .. } | AllocationError::Conflict { .. } => {
            HttpError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "The wheel is busy. Please try again.".to_string(),
            )
        }
        AllocationError::Ledger(err) => {
            HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn internal(err: sea_orm::DbErr) -> HttpError {
    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// First hop of X-Forwarded-For when present, else the socket peer.
fn source_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "10.1.2.3:55555".parse().unwrap()
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(source_ip(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn missing_or_empty_header_falls_back_to_peer() {
        assert_eq!(source_ip(&HeaderMap::new(), peer()), "10.1.2.3");

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "".parse().unwrap());
        assert_eq!(source_ip(&headers, peer()), "10.1.2.3");
    }
}
