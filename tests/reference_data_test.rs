//! Integration test: the shipped historical feeds
//!
//! Loads the JSON tables under data/ and checks the lookups the engine relies
//! on: ordering, the genesis and pool-unlock events, the starter miner, and
//! how interpolation behaves at the edges of each series.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use hashtycoon::data::{
    DIFFICULTY_FEED, EVENT_FEED, EffectKind, HARDWARE_FEED, HEADLINE_FEED, NETWORK_HASHRATE_FEED,
    PRICE_FEED, ReferenceData,
};
use hashtycoon::error::DataError;
use hashtycoon::interpolation::{difficulty_at, network_hashrate_at, price_at};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data")
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn shipped() -> ReferenceData {
    ReferenceData::load(&data_dir()).expect("shipped feeds load")
}

#[test]
fn test_every_feed_loads_sorted() {
    let data = shipped();
    assert!(!data.difficulty.is_empty());
    assert!(!data.price.is_empty());
    assert!(!data.network_hashrate.is_empty());
    assert!(!data.hardware.is_empty());
    assert!(!data.headlines.is_empty());

    for window in data.events.windows(2) {
        assert!(window[0].date <= window[1].date);
    }
    for window in data.price.samples().windows(2) {
        assert!(window[0].date < window[1].date);
    }
}

#[test]
fn test_genesis_and_pool_unlock_are_scripted() {
    let data = shipped();
    let genesis = data.event_on(day(2009, 1, 3)).expect("genesis event");
    assert!(genesis.effect.is_none());

    let unlock = data
        .events
        .iter()
        .find(|event| {
            event
                .effect
                .is_some_and(|effect| effect.kind == EffectKind::UnlockMiningPools)
        })
        .expect("pool unlock event");
    assert_eq!(unlock.date, day(2010, 12, 16));
}

#[test]
fn test_starter_miner_is_on_sale_at_genesis() {
    let data = shipped();
    let starter = &data.hardware[0];
    assert!(starter.is_available_on(day(2009, 1, 3)));
    assert!(starter.hashrate > 0.0);
    for spec in &data.hardware {
        assert!(spec.base_price > 0.0, "{} has no price", spec.name);
        assert!(spec.power_cost > 0.0, "{} has no power cost", spec.name);
    }
}

#[test]
fn test_market_opens_with_first_exchange_rate() {
    let data = shipped();
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    assert_eq!(price_at(&data, day(2009, 6, 1), &mut rng), None);
    assert_eq!(price_at(&data, day(2009, 10, 5), &mut rng), Some(0.00076));

    let quote = price_at(&data, day(2012, 1, 1), &mut rng).unwrap();
    assert!((5.0..=5.54).contains(&quote), "quote {quote}");
}

#[test]
fn test_deterministic_series_hold_at_the_edges() {
    let data = shipped();
    assert_eq!(difficulty_at(&data, day(2009, 1, 3)), 1.0);
    assert_eq!(network_hashrate_at(&data, day(2008, 12, 1)), 7_000_000.0);

    let last = data.network_hashrate.last().unwrap();
    assert_eq!(network_hashrate_at(&data, day(2030, 1, 1)), last.value);
}

#[test]
fn test_headlines_cover_the_opening_days() {
    let data = shipped();
    assert!(!data.active_headlines(day(2009, 1, 3)).is_empty());
}

#[test]
fn test_missing_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = ReferenceData::load(&dir.path().join("nowhere")).unwrap_err();
    assert!(matches!(err, DataError::Io { .. }));
}

#[test]
fn test_empty_catalog_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    for feed in [
        DIFFICULTY_FEED,
        PRICE_FEED,
        NETWORK_HASHRATE_FEED,
        EVENT_FEED,
        HEADLINE_FEED,
    ] {
        fs::copy(data_dir().join(feed), dir.path().join(feed)).unwrap();
    }
    fs::write(dir.path().join(HARDWARE_FEED), "[]").unwrap();

    let err = ReferenceData::load(dir.path()).unwrap_err();
    assert!(matches!(err, DataError::EmptyFeed { feed } if feed == HARDWARE_FEED));
}

#[test]
fn test_malformed_feed_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    for feed in [
        PRICE_FEED,
        NETWORK_HASHRATE_FEED,
        HARDWARE_FEED,
        EVENT_FEED,
        HEADLINE_FEED,
    ] {
        fs::copy(data_dir().join(feed), dir.path().join(feed)).unwrap();
    }
    fs::write(dir.path().join(DIFFICULTY_FEED), "{ not json").unwrap();

    let err = ReferenceData::load(dir.path()).unwrap_err();
    assert!(matches!(err, DataError::Parse { .. }));
}
