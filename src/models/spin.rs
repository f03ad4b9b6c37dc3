use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row of the admin spin listing, joined with its prize and coupon.
#[derive(Debug, Clone, Serialize)]
pub struct SpinEntry {
    pub id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub prize_name: String,
    pub prize_color: String,
    pub coupon_code: String,
    pub redeemed: bool,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub ip_address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpinPage {
    pub spins: Vec<SpinEntry>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Raw counters for a campaign; anything fancier belongs in an external
/// reporting tool.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignStats {
    pub total_spins: u64,
    pub unique_identities: u64,
    pub coupons_redeemed: u64,
    pub redemption_rate: f64,
    pub prize_distribution: Vec<PrizeTally>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrizeTally {
    pub name: String,
    pub count: i32,
    pub percentage: f64,
}
