//! Historical reference tables.
//!
//! Every feed is a date-sorted JSON array loaded once at startup. The tables
//! are immutable afterwards and shared read-only with the engine, the
//! transaction layer and the presentation.

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::constants::FALLBACK_NETWORK_HASHRATE;
use crate::error::DataError;

pub const DIFFICULTY_FEED: &str = "difficulty.json";
pub const PRICE_FEED: &str = "prices.json";
pub const NETWORK_HASHRATE_FEED: &str = "network_hashrate.json";
pub const HARDWARE_FEED: &str = "hardware.json";
pub const EVENT_FEED: &str = "events.json";
pub const HEADLINE_FEED: &str = "headlines.json";

/// One dated point of a historical series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSample<T> {
    pub date: NaiveDate,
    pub value: T,
}

impl<T> HistoricalSample<T> {
    pub fn new(date: NaiveDate, value: T) -> Self {
        Self { date, value }
    }
}

/// Where a query date falls relative to the samples of a [`Series`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bracket<'a, T> {
    Empty,
    Before(&'a HistoricalSample<T>),
    Exact(&'a HistoricalSample<T>),
    Between(&'a HistoricalSample<T>, &'a HistoricalSample<T>),
    After(&'a HistoricalSample<T>),
}

/// Samples sorted ascending by date. Duplicate dates are not supported.
#[derive(Debug, Clone, PartialEq)]
pub struct Series<T> {
    samples: Vec<HistoricalSample<T>>,
}

impl<T> Default for Series<T> {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
        }
    }
}

impl<T> Series<T> {
    pub fn new(mut samples: Vec<HistoricalSample<T>>) -> Self {
        samples.sort_by_key(|sample| sample.date);
        Self { samples }
    }

    pub fn samples(&self) -> &[HistoricalSample<T>] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&HistoricalSample<T>> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&HistoricalSample<T>> {
        self.samples.last()
    }

    /// Last sample dated on or before `date`.
    pub fn at_or_before(&self, date: NaiveDate) -> Option<&HistoricalSample<T>> {
        let idx = self.samples.partition_point(|sample| sample.date <= date);
        idx.checked_sub(1).map(|i| &self.samples[i])
    }

    /// First sample dated strictly after `date`.
    pub fn after(&self, date: NaiveDate) -> Option<&HistoricalSample<T>> {
        let idx = self.samples.partition_point(|sample| sample.date <= date);
        self.samples.get(idx)
    }

    pub fn bracket(&self, date: NaiveDate) -> Bracket<'_, T> {
        match (self.at_or_before(date), self.after(date)) {
            (None, None) => Bracket::Empty,
            (None, Some(next)) => Bracket::Before(next),
            (Some(prev), _) if prev.date == date => Bracket::Exact(prev),
            (Some(prev), Some(next)) => Bracket::Between(prev, next),
            (Some(prev), None) => Bracket::After(prev),
        }
    }
}

/// Immutable catalog entry for a purchasable miner model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSpec {
    pub name: String,
    pub hashrate: f64,
    pub base_price: f64,
    /// Electricity cost per billing cycle.
    pub power_cost: f64,
    pub available_year: i32,
    /// Calendar month (1-12). Absent means January.
    #[serde(default)]
    pub available_month: Option<u32>,
}

impl HardwareSpec {
    pub fn release_date(&self) -> NaiveDate {
        let month = self.available_month.unwrap_or(1).clamp(1, 12);
        NaiveDate::from_ymd_opt(self.available_year, month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Purchasability gate on the in-game calendar.
    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        date >= self.release_date()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Price,
    PriceIncrease,
    PriceMultiplier,
    PriceDrop,
    Difficulty,
    PowerCost,
    UnlockMiningPools,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventEffect {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEvent {
    #[serde(deserialize_with = "deserialize_day")]
    pub date: NaiveDate,
    #[serde(alias = "event")]
    pub description: String,
    #[serde(default)]
    pub effect: Option<EventEffect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Headline {
    pub text: String,
    #[serde(deserialize_with = "deserialize_day")]
    pub start_date: NaiveDate,
    #[serde(default, deserialize_with = "deserialize_optional_day")]
    pub end_date: Option<NaiveDate>,
}

impl Headline {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.is_none_or(|end| end >= date)
    }
}

#[derive(Deserialize)]
struct DifficultyRecord {
    #[serde(deserialize_with = "deserialize_day")]
    date: NaiveDate,
    difficulty: f64,
}

#[derive(Deserialize)]
struct PriceRecord {
    #[serde(deserialize_with = "deserialize_day")]
    date: NaiveDate,
    price: f64,
}

#[derive(Deserialize)]
struct HashrateRecord {
    #[serde(deserialize_with = "deserialize_day")]
    date: NaiveDate,
    hashrate: f64,
}

/// All reference feeds, loaded once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub difficulty: Series<f64>,
    pub price: Series<f64>,
    pub network_hashrate: Series<f64>,
    pub hardware: Vec<HardwareSpec>,
    pub events: Vec<HistoricalEvent>,
    pub headlines: Vec<Headline>,
}

impl ReferenceData {
    pub fn new(
        difficulty: Series<f64>,
        price: Series<f64>,
        network_hashrate: Series<f64>,
        hardware: Vec<HardwareSpec>,
        mut events: Vec<HistoricalEvent>,
        mut headlines: Vec<Headline>,
    ) -> Self {
        events.sort_by_key(|event| event.date);
        headlines.sort_by_key(|headline| headline.start_date);
        let network_hashrate = Series::new(
            network_hashrate
                .samples
                .into_iter()
                .map(|sample| HistoricalSample::new(sample.date, valid_hashrate(sample.value)))
                .collect(),
        );
        Self {
            difficulty,
            price,
            network_hashrate,
            hardware,
            events,
            headlines,
        }
    }

    /// Loads every feed from `dir`. Any missing, malformed or empty feed is fatal.
    pub fn load(dir: &Path) -> Result<Self, DataError> {
        let difficulty: Vec<DifficultyRecord> = read_feed(dir, DIFFICULTY_FEED)?;
        let price: Vec<PriceRecord> = read_feed(dir, PRICE_FEED)?;
        let hashrate: Vec<HashrateRecord> = read_feed(dir, NETWORK_HASHRATE_FEED)?;
        let hardware: Vec<HardwareSpec> = read_feed(dir, HARDWARE_FEED)?;
        let events: Vec<HistoricalEvent> = read_feed(dir, EVENT_FEED)?;
        let headlines: Vec<Headline> = read_feed(dir, HEADLINE_FEED)?;

        let data = Self::new(
            Series::new(
                difficulty
                    .into_iter()
                    .map(|r| HistoricalSample::new(r.date, r.difficulty))
                    .collect(),
            ),
            Series::new(
                price
                    .into_iter()
                    .map(|r| HistoricalSample::new(r.date, r.price))
                    .collect(),
            ),
            Series::new(
                hashrate
                    .into_iter()
                    .map(|r| HistoricalSample::new(r.date, r.hashrate))
                    .collect(),
            ),
            hardware,
            events,
            headlines,
        );
        info!(
            difficulty = data.difficulty.len(),
            price = data.price.len(),
            network_hashrate = data.network_hashrate.len(),
            hardware = data.hardware.len(),
            events = data.events.len(),
            headlines = data.headlines.len(),
            "reference data loaded"
        );
        Ok(data)
    }

    pub fn hardware(&self, name: &str) -> Option<&HardwareSpec> {
        self.hardware.iter().find(|spec| spec.name == name)
    }

    /// Events dated strictly after `start` and on or before `end`, in date order.
    pub fn events_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = &HistoricalEvent> {
        self.events
            .iter()
            .filter(move |event| event.date > start && event.date <= end)
    }

    /// Events dated on or before `date`.
    pub fn events_through(&self, date: NaiveDate) -> impl Iterator<Item = &HistoricalEvent> {
        self.events.iter().filter(move |event| event.date <= date)
    }

    pub fn event_on(&self, date: NaiveDate) -> Option<&HistoricalEvent> {
        self.events.iter().find(|event| event.date == date)
    }

    /// Value of a `price` event dated exactly on `date`, if any.
    pub fn price_event_on(&self, date: NaiveDate) -> Option<f64> {
        self.events
            .iter()
            .filter(|event| event.date == date)
            .filter_map(|event| event.effect)
            .find(|effect| effect.kind == EffectKind::Price)
            .map(|effect| effect.value)
    }

    pub fn active_headlines(&self, date: NaiveDate) -> Vec<&Headline> {
        self.headlines
            .iter()
            .filter(|headline| headline.is_active_on(date))
            .collect()
    }
}

fn valid_hashrate(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        FALLBACK_NETWORK_HASHRATE
    }
}

fn read_feed<T: DeserializeOwned>(dir: &Path, file: &'static str) -> Result<Vec<T>, DataError> {
    let path = dir.join(file);
    let raw = fs::read_to_string(&path).map_err(|source| DataError::Io {
        path: path.clone(),
        source,
    })?;
    let records: Vec<T> =
        serde_json::from_str(&raw).map_err(|source| DataError::Parse { path, source })?;
    if records.is_empty() {
        return Err(DataError::EmptyFeed { feed: file });
    }
    Ok(records)
}

/// Parses `YYYY-MM-DD` or an RFC 3339 timestamp, keeping only the UTC day.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|ts| ts.naive_utc().date())
        })
}

pub(crate) fn deserialize_day<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_day(&raw).ok_or_else(|| D::Error::custom(format!("invalid date: {raw}")))
}

fn deserialize_optional_day<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_day(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date: {raw}"))),
    }
}
