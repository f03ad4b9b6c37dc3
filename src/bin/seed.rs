//! Seed the database with the demo campaign and its wheel, mirroring the
//! launch configuration. Safe to run repeatedly: existing rows are left
//! alone.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use migration::MigratorTrait;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter,
};
use spinwheel_api::config::ApiConfig;
use spinwheel_api::entities::{campaign, prize};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const CAMPAIGN_SLUG: &str = "gateway-launch";

struct PrizeSeed {
    name: &'static str,
    weight: i32,
    color: &'static str,
    coupon_type: &'static str,
    coupon_value: Option<i32>,
    max_wins: Option<i32>,
}

const PRIZES: [PrizeSeed; 6] = [
    PrizeSeed {
        name: "10% Off",
        weight: 40,
        color: "#FFD700",
        coupon_type: "percent_off",
        coupon_value: Some(10),
        max_wins: None,
    },
    PrizeSeed {
        name: "$5 Off",
        weight: 25,
        color: "#FF6B6B",
        coupon_type: "fixed_amount",
        coupon_value: Some(5),
        max_wins: None,
    },
    PrizeSeed {
        name: "15% Off",
        weight: 15,
        color: "#4ECDC4",
        coupon_type: "percent_off",
        coupon_value: Some(15),
        max_wins: None,
    },
    PrizeSeed {
        name: "Free Shipping",
        weight: 10,
        color: "#9B59B6",
        coupon_type: "free_shipping",
        coupon_value: None,
        max_wins: None,
    },
    PrizeSeed {
        name: "$20 Off",
        weight: 7,
        color: "#3498DB",
        coupon_type: "fixed_amount",
        coupon_value: Some(20),
        max_wins: None,
    },
    PrizeSeed {
        name: "25% Off!",
        weight: 3,
        color: "#E74C3C",
        coupon_type: "percent_off",
        coupon_value: Some(25),
        max_wins: Some(50),
    },
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        ))
        .with_target(false)
        .compact()
        .init();

    let config = ApiConfig::load().context("Failed to load configuration")?;
    let mut options = ConnectOptions::new(config.database.url.clone());
    options
        .max_connections(2)
        .sqlx_logging(false)
        .acquire_timeout(Duration::from_secs(10));
    let database = Database::connect(options)
        .await
        .context("Failed to connect to PostgreSQL")?;
    migration::Migrator::up(&database, None)
        .await
        .context("Database migrations failed")?;

    seed(&database).await
}

async fn seed(database: &DatabaseConnection) -> Result<()> {
    let campaign_id = match campaign::Entity::find()
        .filter(campaign::Column::Slug.eq(CAMPAIGN_SLUG))
        .one(database)
        .await?
    {
        Some(existing) => {
            info!(campaign = CAMPAIGN_SLUG, "campaign already present");
            existing.id
        }
        None => {
            let now = Utc::now().fixed_offset();
            let expiration = (Utc::now() + chrono::Duration::days(90)).fixed_offset();
            let model = campaign::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                slug: Set(CAMPAIGN_SLUG.to_string()),
                name: Set("Gateway Market Launch".to_string()),
                active: Set(true),
                redirect_url: Set("https://gateway.market/dashboard".to_string()),
                expiration_date: Set(Some(expiration)),
                schedule_start: Set(None),
                schedule_end: Set(None),
                schedule_offset_minutes: Set(None),
                require_whitelist: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
            };
            let created = model.insert(database).await?;
            info!(campaign = CAMPAIGN_SLUG, "campaign created");
            created.id
        }
    };

    for (index, seed) in PRIZES.iter().enumerate() {
        let existing = prize::Entity::find()
            .filter(prize::Column::CampaignId.eq(&campaign_id))
            .filter(prize::Column::Name.eq(seed.name))
            .one(database)
            .await?;
        if existing.is_some() {
            continue;
        }

        // Stagger created_at so the wheel order matches the seed order
        let created_at =
            (Utc::now() + chrono::Duration::milliseconds(index as i64)).fixed_offset();
        let model = prize::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            campaign_id: Set(campaign_id.clone()),
            name: Set(seed.name.to_string()),
            weight: Set(seed.weight),
            color: Set(seed.color.to_string()),
            coupon_type: Set(seed.coupon_type.to_string()),
            coupon_value: Set(seed.coupon_value),
            coupon_code: Set(None),
            max_wins: Set(seed.max_wins),
            win_count: Set(0),
            active: Set(true),
            created_at: Set(created_at),
        };
        model.insert(database).await?;
        info!(prize = seed.name, weight = seed.weight, "prize created");
    }

    info!("seeding complete");
    Ok(())
}
