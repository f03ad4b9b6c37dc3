//! Administration surface: campaign and prize management, whitelist upkeep,
//! spin history, and raw campaign counters. Authentication is expected to be
//! handled by the deployment (reverse proxy or gateway) in front of these
//! routes.

use std::collections::{HashMap, HashSet};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::entities::{allowed_phone, campaign, coupon, prize, spin};
use crate::identity;
use crate::models::spin::{CampaignStats, PrizeTally, SpinEntry, SpinPage};
use crate::state::AppState;

use super::HttpError;

/// Upper bound on one page of the spin listing
const MAX_SPIN_PAGE: u64 = 500;

/// Whitelist entries returned per listing request
const MAX_PHONE_LISTING: u64 = 500;

const COUPON_TYPES: [&str; 3] = ["percent_off", "fixed_amount", "free_shipping"];

const DEFAULT_REDIRECT_URL: &str = "https://gateway.market/dashboard";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/campaigns/{id}",
            get(get_campaign).patch(update_campaign),
        )
        .route(
            "/campaigns/{id}/prizes",
            get(list_prizes).post(create_prize),
        )
        .route("/prizes/{id}", patch(update_prize).delete(delete_prize))
        .route(
            "/campaigns/{id}/phones",
            get(list_phones).post(add_phones),
        )
        .route("/campaigns/{id}/spins", get(list_spins))
        .route("/campaigns/{id}/stats", get(get_stats))
}

#[derive(Debug, Serialize)]
struct AdminCampaign {
    #[serde(flatten)]
    campaign: campaign::Model,
    spin_count: u64,
}

async fn list_campaigns(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminCampaign>>, HttpError> {
    let campaigns = campaign::Entity::find()
        .order_by_desc(campaign::Column::CreatedAt)
        .all(&state.database)
        .await
        .map_err(internal)?;

    let mut views = Vec::with_capacity(campaigns.len());
    for model in campaigns {
        let spin_count = spin::Entity::find()
            .filter(spin::Column::CampaignId.eq(&model.id))
            .count(&state.database)
            .await
            .map_err(internal)?;
        views.push(AdminCampaign {
            campaign: model,
            spin_count,
        });
    }
    Ok(Json(views))
}

async fn get_campaign(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AdminCampaign>, HttpError> {
    let model = load_campaign(&state, &id).await?;
    let spin_count = spin::Entity::find()
        .filter(spin::Column::CampaignId.eq(&model.id))
        .count(&state.database)
        .await
        .map_err(internal)?;
    Ok(Json(AdminCampaign {
        campaign: model,
        spin_count,
    }))
}

#[derive(Debug, Deserialize)]
struct CreateCampaignPayload {
    name: String,
    slug: Option<String>,
    active: Option<bool>,
    redirect_url: Option<String>,
    expiration_date: Option<DateTime<FixedOffset>>,
    require_whitelist: Option<bool>,
}

async fn create_campaign(
    State(state): State<AppState>,
    Json(payload): Json<CreateCampaignPayload>,
) -> Result<Json<campaign::Model>, HttpError> {
    if payload.name.trim().is_empty() {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "Campaign name must not be empty".to_string(),
        ));
    }

    let slug = payload.slug.unwrap_or_else(|| slugify(&payload.name));
    let now = Utc::now().fixed_offset();
    let model = campaign::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        slug: Set(slug),
        name: Set(payload.name),
        active: Set(payload.active.unwrap_or(true)),
        redirect_url: Set(payload
            .redirect_url
            .unwrap_or_else(|| DEFAULT_REDIRECT_URL.to_string())),
        expiration_date: Set(payload.expiration_date),
        schedule_start: Set(None),
        schedule_end: Set(None),
        schedule_offset_minutes: Set(None),
        require_whitelist: Set(payload.require_whitelist.unwrap_or(false)),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let created = model.insert(&state.database).await.map_err(|err| {
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            HttpError::new(StatusCode::CONFLICT, "Slug already in use".to_string())
        } else {
            internal(err)
        }
    })?;
    info!(campaign = %created.slug, "campaign created");
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
struct UpdateCampaignPayload {
    name: Option<String>,
    active: Option<bool>,
    redirect_url: Option<String>,
    expiration_date: Option<DateTime<FixedOffset>>,
    schedule_start: Option<String>,
    schedule_end: Option<String>,
    schedule_offset_minutes: Option<i32>,
    require_whitelist: Option<bool>,
}

async fn update_campaign(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateCampaignPayload>,
) -> Result<Json<campaign::Model>, HttpError> {
    let existing = load_campaign(&state, &id).await?;

    let mut model: campaign::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        model.name = Set(name);
    }
    if let Some(active) = payload.active {
        model.active = Set(active);
    }
    if let Some(redirect_url) = payload.redirect_url {
        model.redirect_url = Set(redirect_url);
    }
    if let Some(expiration_date) = payload.expiration_date {
        model.expiration_date = Set(Some(expiration_date));
    }
    if let Some(schedule_start) = payload.schedule_start {
        model.schedule_start = Set(Some(schedule_start));
    }
    if let Some(schedule_end) = payload.schedule_end {
        model.schedule_end = Set(Some(schedule_end));
    }
    if let Some(offset) = payload.schedule_offset_minutes {
        model.schedule_offset_minutes = Set(Some(offset));
    }
    if let Some(require_whitelist) = payload.require_whitelist {
        model.require_whitelist = Set(require_whitelist);
    }
    model.updated_at = Set(Utc::now().fixed_offset());

    let updated = model.update(&state.database).await.map_err(internal)?;

    // The public view may hold the old settings until its TTL lapses; drop
    // it now so admin edits show up immediately
    state.cache.live_campaign.invalidate_all();

    Ok(Json(updated))
}

async fn list_prizes(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<prize::Model>>, HttpError> {
    load_campaign(&state, &id).await?;
    let prizes = prize::Entity::find()
        .filter(prize::Column::CampaignId.eq(&id))
        .order_by_desc(prize::Column::Weight)
        .all(&state.database)
        .await
        .map_err(internal)?;
    Ok(Json(prizes))
}

#[derive(Debug, Deserialize)]
struct CreatePrizePayload {
    name: String,
    weight: Option<i32>,
    color: Option<String>,
    coupon_type: Option<String>,
    coupon_value: Option<i32>,
    coupon_code: Option<String>,
    max_wins: Option<i32>,
    active: Option<bool>,
}

async fn create_prize(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<CreatePrizePayload>,
) -> Result<Json<prize::Model>, HttpError> {
    load_campaign(&state, &id).await?;

    let weight = payload.weight.unwrap_or(10);
    let coupon_type = payload
        .coupon_type
        .unwrap_or_else(|| "percent_off".to_string());
    validate_prize_fields(Some(weight), Some(&coupon_type), payload.max_wins)?;

    let model = prize::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        campaign_id: Set(id),
        name: Set(payload.name),
        weight: Set(weight),
        color: Set(payload.color.unwrap_or_else(|| "#FFD700".to_string())),
        coupon_type: Set(coupon_type),
        coupon_value: Set(payload.coupon_value),
        coupon_code: Set(payload.coupon_code),
        max_wins: Set(payload.max_wins),
        win_count: Set(0),
        active: Set(payload.active.unwrap_or(true)),
        created_at: Set(Utc::now().fixed_offset()),
    };
    let created = model.insert(&state.database).await.map_err(internal)?;
    state.cache.live_campaign.invalidate_all();
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
struct UpdatePrizePayload {
    name: Option<String>,
    weight: Option<i32>,
    color: Option<String>,
    coupon_type: Option<String>,
    coupon_value: Option<i32>,
    coupon_code: Option<String>,
    max_wins: Option<i32>,
    active: Option<bool>,
}

async fn update_prize(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePrizePayload>,
) -> Result<Json<prize::Model>, HttpError> {
    let existing = prize::Entity::find_by_id(&id)
        .one(&state.database)
        .await
        .map_err(internal)?
        .ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, "Prize not found".to_string()))?;

    validate_prize_fields(payload.weight, payload.coupon_type.as_deref(), payload.max_wins)?;

    let mut model: prize::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        model.name = Set(name);
    }
    if let Some(weight) = payload.weight {
        model.weight = Set(weight);
    }
    if let Some(color) = payload.color {
        model.color = Set(color);
    }
    if let Some(coupon_type) = payload.coupon_type {
        model.coupon_type = Set(coupon_type);
    }
    if let Some(coupon_value) = payload.coupon_value {
        model.coupon_value = Set(Some(coupon_value));
    }
    if let Some(coupon_code) = payload.coupon_code {
        model.coupon_code = Set(Some(coupon_code));
    }
    if let Some(max_wins) = payload.max_wins {
        model.max_wins = Set(Some(max_wins));
    }
    if let Some(active) = payload.active {
        model.active = Set(active);
    }

    let updated = model.update(&state.database).await.map_err(internal)?;
    state.cache.live_campaign.invalidate_all();
    Ok(Json(updated))
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    success: bool,
}

async fn delete_prize(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DeleteResponse>, HttpError> {
    let awarded = spin::Entity::find()
        .filter(spin::Column::PrizeId.eq(&id))
        .count(&state.database)
        .await
        .map_err(internal)?;
    if awarded > 0 {
        return Err(HttpError::new(
            StatusCode::CONFLICT,
            "Prize has recorded spins; deactivate it instead".to_string(),
        ));
    }

    let result = prize::Entity::delete_by_id(&id)
        .exec(&state.database)
        .await
        .map_err(internal)?;
    if result.rows_affected == 0 {
        return Err(HttpError::new(
            StatusCode::NOT_FOUND,
            "Prize not found".to_string(),
        ));
    }
    state.cache.live_campaign.invalidate_all();
    Ok(Json(DeleteResponse { success: true }))
}

#[derive(Debug, Serialize)]
struct PhoneListing {
    phones: Vec<allowed_phone::Model>,
    total: u64,
}

async fn list_phones(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PhoneListing>, HttpError> {
    load_campaign(&state, &id).await?;
    let total = allowed_phone::Entity::find()
        .filter(allowed_phone::Column::CampaignId.eq(&id))
        .count(&state.database)
        .await
        .map_err(internal)?;
    let phones = allowed_phone::Entity::find()
        .filter(allowed_phone::Column::CampaignId.eq(&id))
        .order_by_desc(allowed_phone::Column::AddedAt)
        .limit(MAX_PHONE_LISTING)
        .all(&state.database)
        .await
        .map_err(internal)?;
    Ok(Json(PhoneListing { phones, total }))
}

#[derive(Debug, Deserialize)]
struct PhoneItem {
    phone: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddPhonesPayload {
    phone: Option<String>,
    name: Option<String>,
    phones: Option<Vec<PhoneItem>>,
}

#[derive(Debug, Serialize)]
struct AddPhonesResponse {
    added: u32,
    skipped: u32,
}

/// Add whitelist entries, one or many. Numbers that fail normalization or
/// already exist are counted as skipped rather than failing the batch.
async fn add_phones(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<AddPhonesPayload>,
) -> Result<Json<AddPhonesResponse>, HttpError> {
    load_campaign(&state, &id).await?;

    let mut items: Vec<PhoneItem> = Vec::new();
    if let Some(phone) = payload.phone {
        items.push(PhoneItem {
            phone,
            name: payload.name,
        });
    }
    if let Some(batch) = payload.phones {
        items.extend(batch);
    }
    if items.is_empty() {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "No phones provided".to_string(),
        ));
    }

    let mut added = 0u32;
    let mut skipped = 0u32;
    for item in items {
        let Ok(normalized) = identity::normalize_phone(&item.phone) else {
            skipped += 1;
            continue;
        };
        let entry = allowed_phone::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            campaign_id: Set(id.clone()),
            phone: Set(normalized),
            name: Set(item.name),
            source: Set("manual".to_string()),
            added_at: Set(Utc::now().fixed_offset()),
        };
        match entry.insert(&state.database).await {
            Ok(_) => added += 1,
            Err(err) => {
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    skipped += 1;
                } else {
                    return Err(internal(err));
                }
            }
        }
    }

    info!(campaign = %id, added, skipped, "whitelist updated");
    Ok(Json(AddPhonesResponse { added, skipped }))
}

#[derive(Debug, Deserialize, Default)]
struct SpinPageQuery {
    limit: Option<u64>,
    offset: Option<u64>,
}

async fn list_spins(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<SpinPageQuery>,
) -> Result<Json<SpinPage>, HttpError> {
    load_campaign(&state, &id).await?;
    let limit = query.limit.unwrap_or(100).min(MAX_SPIN_PAGE);
    let offset = query.offset.unwrap_or(0);

    let total = spin::Entity::find()
        .filter(spin::Column::CampaignId.eq(&id))
        .count(&state.database)
        .await
        .map_err(internal)?;

    let spins = spin::Entity::find()
        .filter(spin::Column::CampaignId.eq(&id))
        .order_by_desc(spin::Column::CreatedAt)
        .limit(limit)
        .offset(offset)
        .all(&state.database)
        .await
        .map_err(internal)?;

    let prizes: HashMap<String, prize::Model> = prize::Entity::find()
        .filter(prize::Column::CampaignId.eq(&id))
        .all(&state.database)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    let spin_ids: Vec<String> = spins.iter().map(|s| s.id.clone()).collect();
    let coupons: HashMap<String, coupon::Model> = if spin_ids.is_empty() {
        HashMap::new()
    } else {
        coupon::Entity::find()
            .filter(coupon::Column::SpinId.is_in(spin_ids))
            .all(&state.database)
            .await
            .map_err(internal)?
            .into_iter()
            .map(|c| (c.spin_id.clone(), c))
            .collect()
    };

    let entries = spins
        .into_iter()
        .map(|s| {
            let prize = prizes.get(&s.prize_id);
            let coupon = coupons.get(&s.id);
            SpinEntry {
                id: s.id.clone(),
                phone: s.phone,
                email: s.email,
                prize_name: prize.map(|p| p.name.clone()).unwrap_or_default(),
                prize_color: prize.map(|p| p.color.clone()).unwrap_or_default(),
                coupon_code: s.coupon_code,
                redeemed: coupon.map(|c| c.used).unwrap_or(false),
                redeemed_at: coupon
                    .and_then(|c| c.redeemed_at)
                    .map(|t| t.with_timezone(&Utc)),
                created_at: s.created_at.with_timezone(&Utc),
                ip_address: s.ip_address,
            }
        })
        .collect();

    Ok(Json(SpinPage {
        spins: entries,
        total,
        limit,
        offset,
    }))
}

async fn get_stats(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CampaignStats>, HttpError> {
    load_campaign(&state, &id).await?;

    let total_spins = spin::Entity::find()
        .filter(spin::Column::CampaignId.eq(&id))
        .count(&state.database)
        .await
        .map_err(internal)?;

    // Unique identities: distinct phones vs distinct emails, whichever set
    // is larger, since either channel identifies a customer
    let identity_rows: Vec<(Option<String>, Option<String>)> = spin::Entity::find()
        .filter(spin::Column::CampaignId.eq(&id))
        .select_only()
        .column(spin::Column::Phone)
        .column(spin::Column::Email)
        .into_tuple()
        .all(&state.database)
        .await
        .map_err(internal)?;
    let phones: HashSet<&String> = identity_rows.iter().filter_map(|(p, _)| p.as_ref()).collect();
    let emails: HashSet<&String> = identity_rows.iter().filter_map(|(_, e)| e.as_ref()).collect();
    let unique_identities = phones.len().max(emails.len()) as u64;

    let coupons_redeemed = coupon::Entity::find()
        .join(JoinType::InnerJoin, coupon::Relation::Prize.def())
        .filter(prize::Column::CampaignId.eq(&id))
        .filter(coupon::Column::Used.eq(true))
        .count(&state.database)
        .await
        .map_err(internal)?;

    let prizes = prize::Entity::find()
        .filter(prize::Column::CampaignId.eq(&id))
        .order_by_asc(prize::Column::CreatedAt)
        .all(&state.database)
        .await
        .map_err(internal)?;
    let prize_distribution = prizes
        .into_iter()
        .map(|p| PrizeTally {
            percentage: if total_spins > 0 {
                f64::from(p.win_count) / total_spins as f64 * 100.0
            } else {
                0.0
            },
            name: p.name,
            count: p.win_count,
        })
        .collect();

    Ok(Json(CampaignStats {
        total_spins,
        unique_identities,
        coupons_redeemed,
        redemption_rate: if total_spins > 0 {
            coupons_redeemed as f64 / total_spins as f64 * 100.0
        } else {
            0.0
        },
        prize_distribution,
    }))
}

async fn load_campaign(state: &AppState, id: &str) -> Result<campaign::Model, HttpError> {
    campaign::Entity::find_by_id(id)
        .one(&state.database)
        .await
        .map_err(internal)?
        .ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, "Campaign not found".to_string()))
}

fn validate_prize_fields(
    weight: Option<i32>,
    coupon_type: Option<&str>,
    max_wins: Option<i32>,
) -> Result<(), HttpError> {
    if let Some(weight) = weight {
        if weight <= 0 {
            return Err(HttpError::new(
                StatusCode::BAD_REQUEST,
                "Prize weight must be a positive integer".to_string(),
            ));
        }
    }
    if let Some(coupon_type) = coupon_type {
        if !COUPON_TYPES.contains(&coupon_type) {
            return Err(HttpError::new(
                StatusCode::BAD_REQUEST,
                format!("Unknown coupon type '{coupon_type}'"),
            ));
        }
    }
    if let Some(max_wins) = max_wins {
        if max_wins < 0 {
            return Err(HttpError::new(
                StatusCode::BAD_REQUEST,
                "Max wins cannot be negative".to_string(),
            ));
        }
    }
    Ok(())
}

fn internal(err: sea_orm::DbErr) -> HttpError {
    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn slugify(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_mirrors_campaign_naming() {
        assert_eq!(slugify("Gateway Market Launch"), "gateway-market-launch");
        assert_eq!(slugify("25% Off!"), "25--off-");
    }

    #[test]
    fn prize_validation_rejects_bad_input() {
        assert!(validate_prize_fields(Some(0), None, None).is_err());
        assert!(validate_prize_fields(Some(10), Some("percent_off"), Some(50)).is_ok());
        assert!(validate_prize_fields(None, Some("mystery"), None).is_err());
        assert!(validate_prize_fields(None, None, Some(-1)).is_err());
    }
}
