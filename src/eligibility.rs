//! Advisory eligibility checks.
//!
//! This is the fast path consulted before the wheel is even shown. It never
//! mutates state, and nothing here is authoritative: the allocation engine
//! re-verifies the already-spun check and prize capacity inside its
//! transaction, because only the ledger can arbitrate concurrent requests.

use chrono::{Duration, Utc};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use serde::Serialize;

use crate::config::RateLimitingConfig;
use crate::entities::{allowed_phone, campaign, spin};
use crate::identity::SpinIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    NoActiveCampaign,
    NotWhitelisted,
    AlreadySpun,
    RateLimited,
}

impl IneligibleReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoActiveCampaign => "no_active_campaign",
            Self::NotWhitelisted => "not_whitelisted",
            Self::AlreadySpun => "already_spun",
            Self::RateLimited => "rate_limited",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::NoActiveCampaign => "No active campaign",
            Self::NotWhitelisted => "This phone number is not eligible for this promotion.",
            Self::AlreadySpun => "You have already used your spin for this campaign!",
            Self::RateLimited => "Too many attempts. Please try again later.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IneligibleReason>,
}

impl Eligibility {
    pub fn ok() -> Self {
        Self {
            eligible: true,
            reason: None,
        }
    }

    pub fn blocked(reason: IneligibleReason) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
        }
    }
}

/// The newest live campaign, the one the public wheel serves.
pub async fn find_live_campaign<C: ConnectionTrait>(
    conn: &C,
) -> Result<Option<campaign::Model>, DbErr> {
    let now = Utc::now().fixed_offset();
    campaign::Entity::find()
        .filter(campaign::Column::Active.eq(true))
        .filter(
            Condition::any()
                .add(campaign::Column::ExpirationDate.is_null())
                .add(campaign::Column::ExpirationDate.gt(now)),
        )
        .order_by_desc(campaign::Column::CreatedAt)
        .one(conn)
        .await
}

/// Whether this identity already holds a spin in the campaign, matching on
/// phone OR email, whichever is supplied. Shared with the engine's in-
/// transaction re-check.
pub async fn spin_exists<C: ConnectionTrait>(
    conn: &C,
    campaign_id: &str,
    identity: &SpinIdentity,
) -> Result<bool, DbErr> {
    let mut by_identity = Condition::any();
    if let Some(phone) = &identity.phone {
        by_identity = by_identity.add(spin::Column::Phone.eq(phone));
    }
    if let Some(email) = &identity.email {
        by_identity = by_identity.add(spin::Column::Email.eq(email));
    }

    let existing = spin::Entity::find()
        .filter(spin::Column::CampaignId.eq(campaign_id))
        .filter(by_identity)
        .one(conn)
        .await?;
    Ok(existing.is_some())
}

pub async fn is_whitelisted<C: ConnectionTrait>(
    conn: &C,
    campaign_id: &str,
    normalized_phone: &str,
) -> Result<bool, DbErr> {
    let entry = allowed_phone::Entity::find()
        .filter(allowed_phone::Column::CampaignId.eq(campaign_id))
        .filter(allowed_phone::Column::Phone.eq(normalized_phone))
        .one(conn)
        .await?;
    Ok(entry.is_some())
}

/// Spins recorded from `source_ip` across all campaigns in the trailing
/// window.
pub async fn recent_spins_from_source<C: ConnectionTrait>(
    conn: &C,
    source_ip: &str,
    window_minutes: i64,
) -> Result<u64, DbErr> {
    let cutoff = (Utc::now() - Duration::minutes(window_minutes)).fixed_offset();
    spin::Entity::find()
        .filter(spin::Column::IpAddress.eq(source_ip))
        .filter(spin::Column::CreatedAt.gt(cutoff))
        .count(conn)
        .await
}

/// Evaluate the eligibility policy in order; the first failing check wins.
pub async fn check_eligibility<C: ConnectionTrait>(
    conn: &C,
    limits: &RateLimitingConfig,
    campaign: Option<&campaign::Model>,
    identity: &SpinIdentity,
    source_ip: &str,
) -> Result<Eligibility, DbErr> {
    let Some(campaign) = campaign.filter(|c| c.is_live()) else {
        return Ok(Eligibility::blocked(IneligibleReason::NoActiveCampaign));
    };

    if campaign.require_whitelist {
        if let Some(phone) = &identity.phone {
            if !is_whitelisted(conn, &campaign.id, phone).await? {
                return Ok(Eligibility::blocked(IneligibleReason::NotWhitelisted));
            }
        }
    }

    if spin_exists(conn, &campaign.id, identity).await? {
        return Ok(Eligibility::blocked(IneligibleReason::AlreadySpun));
    }

    let recent = recent_spins_from_source(conn, source_ip, limits.window_minutes).await?;
    if recent >= limits.source_spin_limit {
        return Ok(Eligibility::blocked(IneligibleReason::RateLimited));
    }

    Ok(Eligibility::ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_serialize_as_snake_case() {
        let json = serde_json::to_string(&Eligibility::blocked(IneligibleReason::AlreadySpun))
            .expect("serialize");
        assert_eq!(json, r#"{"eligible":false,"reason":"already_spun"}"#);
        assert_eq!(
            serde_json::to_string(&Eligibility::ok()).expect("serialize"),
            r#"{"eligible":true}"#
        );
    }
}
