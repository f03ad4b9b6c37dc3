//! Ledger-backed allocation properties, run against an in-memory SQLite
//! database with the production migrations applied. The pool is capped at a
//! single connection so every transaction observes the ledger exactly as a
//! concurrent deployment would after serialization, which is what makes the
//! engine's in-transaction re-checks observable.

use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter,
};
use uuid::Uuid;

use spinwheel_api::codegen::CODE_ALPHABET;
use spinwheel_api::config::{EngineConfig, RateLimitingConfig};
use spinwheel_api::eligibility::{self, IneligibleReason};
use spinwheel_api::engine::{AllocationError, SpinEngine, SpinRequest};
use spinwheel_api::entities::{allowed_phone, campaign, coupon, prize, spin};
use spinwheel_api::identity::SpinIdentity;

async fn test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

fn engine_for(db: &DatabaseConnection) -> SpinEngine {
    SpinEngine::new(db.clone(), EngineConfig::default())
}

fn request(phone: &str) -> SpinRequest {
    SpinRequest {
        phone: Some(phone.to_string()),
        email: None,
        ip_address: "203.0.113.5".to_string(),
        user_agent: "allocation-tests".to_string(),
    }
}

async fn seed_campaign(
    db: &DatabaseConnection,
    slug: &str,
    require_whitelist: bool,
) -> campaign::Model {
    let now = Utc::now().fixed_offset();
    campaign::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        slug: Set(slug.to_string()),
        name: Set(slug.to_string()),
        active: Set(true),
        redirect_url: Set("https://gateway.market/dashboard".to_string()),
        expiration_date: Set(None),
        schedule_start: Set(None),
        schedule_end: Set(None),
        schedule_offset_minutes: Set(None),
        require_whitelist: Set(require_whitelist),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert campaign")
}

/// `order` staggers created_at so wheel order is deterministic.
async fn seed_prize(
    db: &DatabaseConnection,
    campaign_id: &str,
    name: &str,
    weight: i32,
    max_wins: Option<i32>,
    coupon_code: Option<&str>,
    order: i64,
) -> prize::Model {
    let created_at = (Utc::now() + chrono::Duration::milliseconds(order)).fixed_offset();
    prize::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        campaign_id: Set(campaign_id.to_string()),
        name: Set(name.to_string()),
        weight: Set(weight),
        color: Set("#FFD700".to_string()),
        coupon_type: Set("percent_off".to_string()),
        coupon_value: Set(Some(10)),
        coupon_code: Set(coupon_code.map(str::to_string)),
        max_wins: Set(max_wins),
        win_count: Set(0),
        active: Set(true),
        created_at: Set(created_at),
    }
    .insert(db)
    .await
    .expect("insert prize")
}

async fn seed_gateway_wheel(db: &DatabaseConnection, campaign_id: &str) {
    let weights = [
        ("10% Off", 40, None),
        ("$5 Off", 25, None),
        ("15% Off", 15, None),
        ("Free Shipping", 10, None),
        ("$20 Off", 7, None),
        ("25% Off!", 3, Some(50)),
    ];
    for (order, (name, weight, max_wins)) in weights.into_iter().enumerate() {
        seed_prize(db, campaign_id, name, weight, max_wins, None, order as i64).await;
    }
}

#[tokio::test]
async fn gateway_launch_scenario() {
    let db = test_db().await;
    let campaign = seed_campaign(&db, "gateway-launch", false).await;
    seed_gateway_wheel(&db, &campaign.id).await;
    let engine = engine_for(&db);

    let outcome = engine
        .allocate(&campaign.id, &request("+1 (555) 123-4567"))
        .await
        .expect("first spin succeeds");

    let winner = prize::Entity::find_by_id(&outcome.prize.id)
        .one(&db)
        .await
        .unwrap()
        .expect("winning prize exists");
    assert_eq!(winner.win_count, 1, "exactly one win recorded");
    assert!(!outcome.fallback);
    assert_eq!(outcome.redirect_url, "https://gateway.market/dashboard");

    let coupon_days =
        (outcome.coupon.expires_at.with_timezone(&Utc) - Utc::now()).num_days();
    assert!(
        (29..=30).contains(&coupon_days),
        "coupon carries the 30-day expiration, got {coupon_days} days"
    );

    let stored = spin::Entity::find()
        .filter(spin::Column::CampaignId.eq(&campaign.id))
        .one(&db)
        .await
        .unwrap()
        .expect("spin recorded");
    assert_eq!(stored.phone.as_deref(), Some("5551234567"));
    assert_eq!(stored.coupon_code, outcome.coupon.code);

    // The same customer, differently formatted, is still the same customer
    let again = engine
        .allocate(&campaign.id, &request("555-123-4567"))
        .await;
    assert!(matches!(again, Err(AllocationError::AlreadySpun)));

    let total = spin::Entity::find()
        .filter(spin::Column::CampaignId.eq(&campaign.id))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(total, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_allocations_for_one_identity_yield_single_success() {
    let db = test_db().await;
    let campaign = seed_campaign(&db, "one-spin", false).await;
    seed_prize(&db, &campaign.id, "10% Off", 100, None, None, 0).await;
    let engine = engine_for(&db);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let campaign_id = campaign.id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .allocate(&campaign_id, &request("+1 (555) 987-6543"))
                .await
        }));
    }

    let mut successes = 0;
    let mut already_spun = 0;
    for handle in handles {
        match handle.await.expect("task completes") {
            Ok(_) => successes += 1,
            Err(AllocationError::AlreadySpun) => already_spun += 1,
            Err(other) => panic!("unexpected allocation error: {other}"),
        }
    }
    assert_eq!(successes, 1, "exactly one winner");
    assert_eq!(already_spun, 7);

    let total = spin::Entity::find()
        .filter(spin::Column::CampaignId.eq(&campaign.id))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(total, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn capped_prize_never_exceeds_max_wins() {
    let db = test_db().await;
    let campaign = seed_campaign(&db, "capped", false).await;
    // The consolation prize is first in wheel order with weight zero: the
    // normal path can never award it, so it is exactly the fallback target.
    let consolation = seed_prize(&db, &campaign.id, "Consolation", 0, None, None, 0).await;
    let grand = seed_prize(&db, &campaign.id, "Grand", 100, Some(3), None, 1).await;
    let engine = engine_for(&db);

    let mut handles = Vec::new();
    for i in 0..10u32 {
        let engine = engine.clone();
        let campaign_id = campaign.id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .allocate(&campaign_id, &request(&format!("555200{i:04}")))
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .expect("task completes")
            .expect("every player still wins something");
    }

    let grand = prize::Entity::find_by_id(&grand.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let consolation = prize::Entity::find_by_id(&consolation.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(grand.win_count, 3, "capped prize settles at exactly max_wins");
    assert_eq!(
        consolation.win_count, 7,
        "excess allocations land on the first active prize via the fallback path"
    );
}

#[tokio::test]
async fn generated_codes_are_unique_and_well_formed() {
    let db = test_db().await;
    let campaign = seed_campaign(&db, "codes", false).await;
    seed_prize(&db, &campaign.id, "10% Off", 100, None, None, 0).await;
    let engine = engine_for(&db);

    let mut codes = Vec::new();
    for i in 0..30u32 {
        let outcome = engine
            .allocate(&campaign.id, &request(&format!("555300{i:04}")))
            .await
            .expect("allocation succeeds");
        codes.push(outcome.coupon.code);
    }

    for code in &codes {
        let (prefix, suffix) = code.split_once('-').expect("prefix-suffix shape");
        assert_eq!(prefix, "GATEWAY");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    let mut deduped = codes.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), codes.len(), "no two coupons share a code");
}

#[tokio::test]
async fn fixed_coupon_code_is_shared_verbatim() {
    let db = test_db().await;
    let campaign = seed_campaign(&db, "fixed-code", false).await;
    seed_prize(&db, &campaign.id, "VIP Deal", 100, None, Some("WELCOME20"), 0).await;
    let engine = engine_for(&db);

    for i in 0..3u32 {
        let outcome = engine
            .allocate(&campaign.id, &request(&format!("555400{i:04}")))
            .await
            .expect("allocation succeeds");
        assert_eq!(outcome.coupon.code, "WELCOME20");
    }

    let coupons = coupon::Entity::find()
        .filter(coupon::Column::Code.eq("WELCOME20"))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(coupons, 3);
}

#[tokio::test]
async fn either_identity_channel_blocks_a_second_spin() {
    let db = test_db().await;
    let campaign = seed_campaign(&db, "channels", false).await;
    seed_prize(&db, &campaign.id, "10% Off", 100, None, None, 0).await;
    let engine = engine_for(&db);

    let both = SpinRequest {
        phone: Some("5551230000".to_string()),
        email: Some("Jane@Example.com".to_string()),
        ip_address: "203.0.113.5".to_string(),
        user_agent: "allocation-tests".to_string(),
    };
    engine
        .allocate(&campaign.id, &both)
        .await
        .expect("first spin succeeds");

    let email_only = SpinRequest {
        phone: None,
        email: Some("jane@example.com".to_string()),
        ip_address: "203.0.113.6".to_string(),
        user_agent: "allocation-tests".to_string(),
    };
    let second = engine.allocate(&campaign.id, &email_only).await;
    assert!(matches!(second, Err(AllocationError::AlreadySpun)));
}

#[tokio::test]
async fn allocation_edge_failures() {
    let db = test_db().await;
    let engine = engine_for(&db);

    // Identity is validated before the ledger is touched
    let no_identity = SpinRequest {
        phone: None,
        email: None,
        ip_address: "203.0.113.5".to_string(),
        user_agent: "allocation-tests".to_string(),
    };
    let err = engine.allocate("anything", &no_identity).await.unwrap_err();
    assert!(matches!(err, AllocationError::Identity(_)));

    // Unknown campaign
    let err = engine
        .allocate("missing-campaign", &request("5551239999"))
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::NoActiveCampaign));

    // Expired campaign is not live
    let expired = seed_campaign(&db, "expired", false).await;
    let mut model: campaign::ActiveModel = expired.clone().into();
    model.expiration_date = Set(Some(
        (Utc::now() - chrono::Duration::days(1)).fixed_offset(),
    ));
    model.update(&db).await.unwrap();
    let err = engine
        .allocate(&expired.id, &request("5551239999"))
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::NoActiveCampaign));

    // Live campaign without prizes is a configuration error
    let empty = seed_campaign(&db, "empty", false).await;
    let err = engine
        .allocate(&empty.id, &request("5551239999"))
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::NoPrizesConfigured));
}

#[tokio::test]
async fn eligibility_policy_order_and_whitelist() {
    let db = test_db().await;
    let limits = RateLimitingConfig::default();
    let identity = SpinIdentity::from_raw(Some("5551234567"), None).unwrap();

    // No campaign at all
    let verdict =
        eligibility::check_eligibility(&db, &limits, None, &identity, "198.51.100.7")
            .await
            .unwrap();
    assert_eq!(verdict.reason, Some(IneligibleReason::NoActiveCampaign));

    // Whitelist required and phone not listed
    let campaign = seed_campaign(&db, "vip", true).await;
    seed_prize(&db, &campaign.id, "10% Off", 100, None, None, 0).await;
    let verdict = eligibility::check_eligibility(
        &db,
        &limits,
        Some(&campaign),
        &identity,
        "198.51.100.7",
    )
    .await
    .unwrap();
    assert_eq!(verdict.reason, Some(IneligibleReason::NotWhitelisted));

    // Listed phone passes
    allowed_phone::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        campaign_id: Set(campaign.id.clone()),
        phone: Set("5551234567".to_string()),
        name: Set(Some("Jane".to_string())),
        source: Set("manual".to_string()),
        added_at: Set(Utc::now().fixed_offset()),
    }
    .insert(&db)
    .await
    .unwrap();
    let verdict = eligibility::check_eligibility(
        &db,
        &limits,
        Some(&campaign),
        &identity,
        "198.51.100.7",
    )
    .await
    .unwrap();
    assert!(verdict.eligible);

    // After the spin is recorded the same identity is blocked
    let engine = engine_for(&db);
    engine
        .allocate(&campaign.id, &request("5551234567"))
        .await
        .expect("whitelisted spin succeeds");
    let verdict = eligibility::check_eligibility(
        &db,
        &limits,
        Some(&campaign),
        &identity,
        "198.51.100.7",
    )
    .await
    .unwrap();
    assert_eq!(verdict.reason, Some(IneligibleReason::AlreadySpun));
}

#[tokio::test]
async fn source_rate_limit_spans_campaigns() {
    let db = test_db().await;
    let limits = RateLimitingConfig::default();
    let engine = engine_for(&db);

    // Five spins from the same address spread over two campaigns
    for (slug, start) in [("first", 0u32), ("second", 3u32)] {
        let campaign = seed_campaign(&db, slug, false).await;
        seed_prize(&db, &campaign.id, "10% Off", 100, None, None, 0).await;
        let spins = if start == 0 { 3 } else { 2 };
        for i in 0..spins {
            engine
                .allocate(&campaign.id, &request(&format!("555500{:04}", start + i)))
                .await
                .expect("allocation succeeds");
        }
    }

    let campaign = eligibility::find_live_campaign(&db).await.unwrap().unwrap();
    let fresh = SpinIdentity::from_raw(Some("5559990000"), None).unwrap();
    let verdict = eligibility::check_eligibility(
        &db,
        &limits,
        Some(&campaign),
        &fresh,
        "203.0.113.5",
    )
    .await
    .unwrap();
    assert_eq!(verdict.reason, Some(IneligibleReason::RateLimited));

    // A different source address is unaffected
    let verdict = eligibility::check_eligibility(
        &db,
        &limits,
        Some(&campaign),
        &fresh,
        "203.0.113.99",
    )
    .await
    .unwrap();
    assert!(verdict.eligible);
}

#[tokio::test]
async fn check_eligibility_is_read_only_and_repeatable() {
    let db = test_db().await;
    let limits = RateLimitingConfig::default();
    let campaign = seed_campaign(&db, "read-only", false).await;
    seed_prize(&db, &campaign.id, "10% Off", 100, None, None, 0).await;
    let identity = SpinIdentity::from_raw(None, Some("repeat@example.com")).unwrap();

    let before = spin::Entity::find().count(&db).await.unwrap();
    let first = eligibility::check_eligibility(
        &db,
        &limits,
        Some(&campaign),
        &identity,
        "198.51.100.9",
    )
    .await
    .unwrap();
    let second = eligibility::check_eligibility(
        &db,
        &limits,
        Some(&campaign),
        &identity,
        "198.51.100.9",
    )
    .await
    .unwrap();
    let after = spin::Entity::find().count(&db).await.unwrap();

    assert_eq!(first, second);
    assert!(first.eligible);
    assert_eq!(before, after, "the advisory check never writes");
}
