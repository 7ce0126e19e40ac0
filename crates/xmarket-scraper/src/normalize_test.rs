use std::str::FromStr;

use chrono::{TimeZone, Utc};
use serde_json::json;

use super::*;

fn market_gb() -> MarketEndpoint {
    MarketEndpoint {
        code: "GB".to_owned(),
        name: "United Kingdom".to_owned(),
        global_id: "EBAY-GB".to_owned(),
        currency: "GBP".to_owned(),
    }
}

fn metadata() -> ResponseMetadata {
    ResponseMetadata {
        total_results: 120,
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        api_version: "1.13.0".to_owned(),
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn full_item() -> RawItem {
    RawItem::new(json!({
        "itemId": ["266012345678"],
        "title": ["Apple iPhone 13 128GB Midnight"],
        "sellingStatus": [{"currentPrice": [{"@currencyId": "GBP", "__value__": "499.99"}]}],
        "condition": [{"conditionDisplayName": ["Used"]}],
        "sellerInfo": [{"sellerUserName": ["phones_uk"], "feedbackScore": ["2210"]}],
        "location": ["Leeds,United Kingdom"],
        "country": ["GB"],
        "shippingInfo": [{"shippingServiceCost": [{"@currencyId": "GBP", "__value__": "4.00"}]}],
        "galleryURL": ["https://i.example.com/thumbs/1.jpg"],
        "primaryCategory": [{"categoryName": ["Mobile & Smart Phones"]}],
        "listingInfo": [{"watchCount": ["12"], "startTime": ["2024-04-28T09:00:00.000Z"]}]
    }))
}

#[test]
fn normalize_item_maps_every_field() {
    let listing = normalize_item(&full_item(), &market_gb(), &metadata(), &CurrencyTable::default());
    assert_eq!(listing.item_id, "266012345678");
    assert_eq!(listing.title, "Apple iPhone 13 128GB Midnight");
    assert_eq!(listing.original_price, dec("499.99"));
    assert_eq!(listing.original_currency, "GBP");
    assert_eq!(listing.price_usd, dec("634.99"));
    assert_eq!(listing.condition, "Used");
    assert_eq!(listing.seller, "phones_uk");
    assert_eq!(listing.seller_feedback_score, 2210);
    assert_eq!(listing.location, "Leeds,United Kingdom");
    assert_eq!(listing.country, "GB");
    assert_eq!(listing.shipping_cost, dec("5.08"));
    assert_eq!(listing.image_url, "https://i.example.com/thumbs/1.jpg");
    assert_eq!(listing.category, "Mobile & Smart Phones");
    assert_eq!(listing.watch_count, 12);
    assert_eq!(listing.market_code, "GB");
    assert_eq!(listing.market_name, "United Kingdom");
    assert_eq!(listing.fetched_at, metadata().timestamp);
    assert!(listing.listed_at.is_some());
}

#[test]
fn normalize_item_defaults_every_missing_field() {
    let listing = normalize_item(
        &RawItem::new(json!({})),
        &market_gb(),
        &metadata(),
        &CurrencyTable::default(),
    );
    assert_eq!(listing.item_id, "");
    assert_eq!(listing.title, "");
    assert_eq!(listing.original_price, Decimal::ZERO);
    assert_eq!(listing.original_currency, "GBP", "falls back to market currency");
    assert_eq!(listing.price_usd, Decimal::ZERO);
    assert_eq!(listing.seller_feedback_score, 0);
    assert_eq!(listing.shipping_cost, Decimal::ZERO);
    assert_eq!(listing.watch_count, 0);
    assert!(listing.listed_at.is_none());
    assert_eq!(listing.market_code, "GB");
}

#[test]
fn normalize_item_clamps_negative_price() {
    let item = RawItem::new(json!({
        "sellingStatus": [{"currentPrice": [{"@currencyId": "USD", "__value__": "-5.00"}]}]
    }));
    let listing = normalize_item(&item, &market_gb(), &metadata(), &CurrencyTable::default());
    assert_eq!(listing.price_usd, Decimal::ZERO);
}

#[test]
fn normalize_item_zeroes_a_price_too_large_to_convert() {
    let item = RawItem::new(json!({
        "title": ["Gold plated kettle"],
        "sellingStatus": [{"currentPrice": [{"@currencyId": "GBP", "__value__": "70000000000000000000000000000"}]}],
        "shippingInfo": [{"shippingServiceCost": [{"@currencyId": "GBP", "__value__": "70000000000000000000000000000"}]}]
    }));
    let listing = normalize_item(&item, &market_gb(), &metadata(), &CurrencyTable::default());
    assert_eq!(listing.title, "Gold plated kettle");
    assert_eq!(listing.original_price, Decimal::ZERO);
    assert_eq!(listing.original_currency, "GBP");
    assert_eq!(listing.price_usd, Decimal::ZERO);
    assert_eq!(listing.shipping_cost, Decimal::ZERO);
}

#[test]
fn normalize_page_survives_an_overflowing_price() {
    let page = SearchPage {
        ack: "Success".to_owned(),
        error_message: None,
        metadata: metadata(),
        items: vec![
            full_item(),
            RawItem::new(json!({
                "sellingStatus": [{"currentPrice": [{"@currencyId": "GBP", "__value__": "70000000000000000000000000000"}]}]
            })),
        ],
    };
    let listings = normalize_page(&page, &market_gb(), &CurrencyTable::default());
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].price_usd, dec("634.99"));
    assert_eq!(listings[1].price_usd, Decimal::ZERO);
}

#[test]
fn normalize_item_unknown_currency_passes_through() {
    let item = RawItem::new(json!({
        "sellingStatus": [{"currentPrice": [{"@currencyId": "PLN", "__value__": "199.999"}]}]
    }));
    let listing = normalize_item(&item, &market_gb(), &metadata(), &CurrencyTable::default());
    assert_eq!(listing.original_currency, "PLN");
    assert_eq!(listing.price_usd, dec("200.00"));
}

#[test]
fn normalize_page_keeps_bad_items_alongside_good_ones() {
    let page = SearchPage {
        ack: "Success".to_owned(),
        error_message: None,
        metadata: metadata(),
        items: vec![
            full_item(),
            RawItem::new(json!({"title": "not wrapped", "sellingStatus": "garbage"})),
            full_item(),
        ],
    };
    let listings = normalize_page(&page, &market_gb(), &CurrencyTable::default());
    assert_eq!(listings.len(), 3);
    assert_eq!(listings[1].title, "not wrapped");
    assert_eq!(listings[1].price_usd, Decimal::ZERO);
}
