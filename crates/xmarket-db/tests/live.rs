//! Live integration tests for xmarket-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/xmarket-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::Utc;
use rust_decimal::Decimal;
use xmarket_core::{
    product_group_id, CanonicalListing, CatalogSink, CrossMarketGroup, ExpansionTier,
    GroupedListing, SinkError,
};
use xmarket_db::{
    complete_search_run, create_search_run, fail_search_run, get_search_run,
    list_product_groups, list_search_run_markets, record_market_outcome, start_search_run,
    DbError, MarketOutcome, PgCatalogSink,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn grouped(market: &str, item_id: &str, title: &str, price: i64) -> GroupedListing {
    GroupedListing {
        listing: CanonicalListing {
            item_id: item_id.to_string(),
            title: title.to_string(),
            original_price: Decimal::from(price),
            original_currency: "USD".to_string(),
            price_usd: Decimal::from(price),
            condition: "New".to_string(),
            seller: String::new(),
            seller_feedback_score: 0,
            location: String::new(),
            country: market.to_string(),
            shipping_cost: Decimal::ZERO,
            image_url: format!("https://img.example.com/{item_id}.jpg"),
            category: String::new(),
            watch_count: 0,
            market_code: market.to_string(),
            market_name: format!("eBay {market}"),
            fetched_at: Utc::now(),
            listed_at: None,
        },
        market_code: market.to_string(),
        market_name: format!("eBay {market}"),
    }
}

fn make_group(key: &str, members: &[(&str, &str, i64)]) -> CrossMarketGroup {
    let listings: Vec<GroupedListing> = members
        .iter()
        .map(|(market, item_id, price)| grouped(market, item_id, key, *price))
        .collect();
    let mut markets: Vec<String> = Vec::new();
    for l in &listings {
        if !markets.contains(&l.market_code) {
            markets.push(l.market_code.clone());
        }
    }
    let prices = listings.iter().map(|l| l.listing.price_usd);
    CrossMarketGroup {
        key: key.to_string(),
        representative_title: key.to_string(),
        market_count: markets.len(),
        tier: ExpansionTier::for_market_count(markets.len()),
        markets,
        listing_count: listings.len(),
        min_price_usd: prices.clone().min().expect("non-empty group"),
        max_price_usd: prices.max().expect("non-empty group"),
        listings,
    }
}

async fn insert_foreign_group(pool: &sqlx::PgPool, id: &str) {
    sqlx::query(
        "INSERT INTO product_groups \
             (id, source, comparison_key, title, search_term, market_count, tier, \
              min_price_usd, max_price_usd) \
         VALUES ($1, 'manual', 'hand curated', 'Hand Curated', 'manual', 2, 'multi', 1, 2)",
    )
    .bind(id)
    .execute(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_foreign_group failed for '{id}': {e}"));
}

// ---------------------------------------------------------------------------
// Section 1: Search Run Lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn search_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let run = create_search_run(&pool, "iphone 13", "cli")
        .await
        .expect("create_search_run failed");

    assert_eq!(run.status, "queued");
    assert!(run.started_at.is_none());
    assert_eq!(run.listings_found, 0);

    start_search_run(&pool, run.id, 3)
        .await
        .expect("start_search_run failed");
    complete_search_run(&pool, run.id, 27, 4)
        .await
        .expect("complete_search_run failed");

    let fetched = get_search_run(&pool, run.id)
        .await
        .expect("get_search_run failed");

    assert_eq!(fetched.status, "succeeded");
    assert!(fetched.started_at.is_some(), "started_at should be set");
    assert!(fetched.completed_at.is_some(), "completed_at should be set");
    assert_eq!(fetched.markets_attempted, 3);
    assert_eq!(fetched.listings_found, 27);
    assert_eq!(fetched.groups_found, 4);
    assert!(fetched.error_message.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn search_run_lifecycle_queued_to_failed(pool: sqlx::PgPool) {
    let run = create_search_run(&pool, "kindle", "cli")
        .await
        .expect("create failed");
    start_search_run(&pool, run.id, 2)
        .await
        .expect("start failed");
    fail_search_run(&pool, run.id, "catalog write failed")
        .await
        .expect("fail failed");

    let fetched = get_search_run(&pool, run.id).await.expect("get failed");
    assert_eq!(fetched.status, "failed");
    assert!(fetched.completed_at.is_some());
    assert_eq!(fetched.error_message.as_deref(), Some("catalog write failed"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn search_run_cannot_complete_directly_from_queued(pool: sqlx::PgPool) {
    let run = create_search_run(&pool, "kindle", "cli")
        .await
        .expect("create failed");

    let err = complete_search_run(&pool, run.id, 1, 0)
        .await
        .expect_err("completing a queued run should fail");

    assert!(matches!(
        err,
        DbError::InvalidSearchRunTransition {
            expected_status: "running",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn search_run_start_fails_for_unknown_id(pool: sqlx::PgPool) {
    let err = start_search_run(&pool, 999_999, 1)
        .await
        .expect_err("starting an unknown run should fail");
    assert!(matches!(
        err,
        DbError::InvalidSearchRunTransition {
            expected_status: "queued",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_search_run_returns_not_found(pool: sqlx::PgPool) {
    let err = get_search_run(&pool, 424_242)
        .await
        .expect_err("unknown run should not be found");
    assert!(matches!(err, DbError::NotFound), "got {err:?}");
}

// ---------------------------------------------------------------------------
// Section 2: Per-Market Outcomes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn market_outcomes_are_recorded_and_overwritten(pool: sqlx::PgPool) {
    let run = create_search_run(&pool, "iphone", "cli")
        .await
        .expect("create failed");

    record_market_outcome(
        &pool,
        run.id,
        "US",
        MarketOutcome::Succeeded {
            listings_found: 10,
            total_results: 2417,
        },
    )
    .await
    .expect("record US failed");
    record_market_outcome(
        &pool,
        run.id,
        "DE",
        MarketOutcome::Failed {
            error_message: "unexpected HTTP status 503 from market DE",
        },
    )
    .await
    .expect("record DE failed");
    // Re-recording replaces the earlier row.
    record_market_outcome(
        &pool,
        run.id,
        "US",
        MarketOutcome::Succeeded {
            listings_found: 8,
            total_results: 2400,
        },
    )
    .await
    .expect("re-record US failed");

    let rows = list_search_run_markets(&pool, run.id)
        .await
        .expect("list failed");
    assert_eq!(rows.len(), 2);

    let us = rows.iter().find(|r| r.market_code == "US").expect("US row");
    assert_eq!(us.status, "succeeded");
    assert_eq!(us.listings_found, 8);
    assert_eq!(us.total_results, 2400);

    let de = rows.iter().find(|r| r.market_code == "DE").expect("DE row");
    assert_eq!(de.status, "failed");
    assert_eq!(
        de.error_message.as_deref(),
        Some("unexpected HTTP status 503 from market DE")
    );
}

// ---------------------------------------------------------------------------
// Section 3: Catalog Sink
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn catalog_write_round_trips_counts(pool: sqlx::PgPool) {
    let sink = PgCatalogSink::new(pool.clone());
    let groups = vec![
        make_group(
            "apple iphone 13 <cap>",
            &[("US", "u1", 700), ("US", "u2", 650), ("GB", "g1", 635)],
        ),
        make_group(
            "nintendo switch oled",
            &[
                ("US", "u3", 100),
                ("GB", "g2", 105),
                ("DE", "d1", 98),
                ("FR", "f1", 110),
            ],
        ),
    ];

    let report = sink
        .write_run("iphone", &groups)
        .await
        .expect("write_run failed");
    assert_eq!(report.products_written, 2);
    assert_eq!(report.listings_written, 6);
    assert_eq!(sink.count_records().await.expect("count failed"), report);

    let rows = list_product_groups(&pool).await.expect("list failed");
    assert_eq!(rows[0].id, product_group_id("nintendo switch oled"));
    assert_eq!(rows[0].tier, "global");
    assert_eq!(rows[0].min_price_usd, Decimal::from(98));
    assert_eq!(rows[1].market_count, 2);

    let us_price: Decimal = sqlx::query_scalar(
        "SELECT price_usd FROM market_listings \
         WHERE product_group_id = $1 AND market_code = 'US'",
    )
    .bind(product_group_id("apple iphone 13 <cap>"))
    .fetch_one(&pool)
    .await
    .expect("listing lookup failed");
    assert_eq!(us_price, Decimal::from(650), "cheapest US listing is kept");
}

#[sqlx::test(migrations = "../../migrations")]
async fn catalog_write_replaces_only_engine_rows(pool: sqlx::PgPool) {
    insert_foreign_group(&pool, "manual-1").await;
    let sink = PgCatalogSink::new(pool.clone());

    sink.write_run(
        "kindle",
        &[make_group("kindle paperwhite", &[("US", "k1", 140), ("GB", "k2", 150)])],
    )
    .await
    .expect("first write failed");
    let report = sink
        .write_run(
            "pixel",
            &[make_group("pixel 8", &[("US", "p1", 600), ("DE", "p2", 640)])],
        )
        .await
        .expect("second write failed");

    assert_eq!(sink.count_records().await.expect("count failed"), report);
    let engine_rows = list_product_groups(&pool).await.expect("list failed");
    assert_eq!(engine_rows.len(), 1);
    assert_eq!(engine_rows[0].search_term, "pixel");

    let foreign: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_groups WHERE id = 'manual-1'")
        .fetch_one(&pool)
        .await
        .expect("count foreign failed");
    assert_eq!(foreign, 1, "rows from other sources must survive");
}

#[sqlx::test(migrations = "../../migrations")]
async fn catalog_rejects_single_market_group_without_writing(pool: sqlx::PgPool) {
    let sink = PgCatalogSink::new(pool.clone());
    sink.write_run(
        "kindle",
        &[make_group("kindle paperwhite", &[("US", "k1", 140), ("GB", "k2", 150)])],
    )
    .await
    .expect("seed write failed");

    let err = sink
        .write_run(
            "bad",
            &[
                make_group("pixel 8", &[("US", "p1", 600), ("DE", "p2", 640)]),
                make_group("lonely", &[("US", "l1", 10)]),
            ],
        )
        .await
        .expect_err("single-market group must be rejected");
    assert!(
        matches!(err, SinkError::InsufficientMarkets { market_count: 1, .. }),
        "got {err:?}"
    );

    let rows = list_product_groups(&pool).await.expect("list failed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].search_term, "kindle", "previous run is untouched");
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_run_clears_engine_rows(pool: sqlx::PgPool) {
    let sink = PgCatalogSink::new(pool.clone());
    sink.write_run(
        "kindle",
        &[make_group("kindle paperwhite", &[("US", "k1", 140), ("GB", "k2", 150)])],
    )
    .await
    .expect("seed write failed");

    let report = sink.write_run("nothing", &[]).await.expect("empty write failed");
    assert_eq!(report.products_written, 0);
    assert_eq!(
        sink.count_records().await.expect("count failed").listings_written,
        0
    );
}
