//! Session persistence.
//!
//! The state is stored as one framed blob under [`SAVE_KEY`]:
//! - version magic (8 bytes, little endian)
//! - payload length (4 bytes, little endian)
//! - JSON payload
//! - blake3 checksum of everything before it (32 bytes)
//!
//! Only owned raw fields are written. Everything derived (miner hashrates,
//! aggregate hashrate, today's quote) is rebuilt from the live hardware
//! catalog on load, and every field is decoded leniently so a hand-edited or
//! older payload degrades to safe defaults instead of failing.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::{
    BILL_CYCLE_DAYS, BLOCKS_PER_DIFFICULTY_ADJUSTMENT, SAVE_KEY, SAVE_VERSION_MAGIC,
    STARTING_CASH, STARTING_DIFFICULTY, game_start_date,
};
use crate::data::{HardwareSpec, parse_day};
use crate::error::{DataError, SaveError, sanitize};
use crate::state::{ChartTimeframe, EconomicState, MinerInstance, PriceHistory, PricePoint, SimSpeed};

const HEADER_LEN: usize = 12;
const CHECKSUM_LEN: usize = 32;

/// Byte-blob storage keyed by string.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SaveError>;
    fn set(&mut self, key: &str, blob: &[u8]) -> Result<(), SaveError>;
    fn remove(&mut self, key: &str) -> Result<(), SaveError>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.sav"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SaveError> {
        match fs::read(self.path(key)) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, blob: &[u8]) -> Result<(), SaveError> {
        let mut file = fs::File::create(self.path(key))?;
        file.write_all(blob)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SaveError> {
        match fs::remove_file(self.path(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    fn poisoned() -> SaveError {
        SaveError::Io(io::Error::other("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SaveError> {
        let entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, blob: &[u8]) -> Result<(), SaveError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SaveError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SavedMiner {
    pub name: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub durability: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub power_cost: f64,
}

/// The persisted snapshot: owned fields only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SavePayload {
    #[serde(deserialize_with = "lenient_f64")]
    pub cash: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub coin: f64,
    #[serde(deserialize_with = "lenient_date")]
    pub date: NaiveDate,
    #[serde(deserialize_with = "lenient_vec")]
    pub miners: Vec<SavedMiner>,
    #[serde(deserialize_with = "lenient_u64")]
    pub block_counter: u64,
    #[serde(deserialize_with = "lenient_f64")]
    pub current_difficulty: f64,
    #[serde(deserialize_with = "lenient_i64")]
    pub days_until_bill: i64,
    #[serde(deserialize_with = "lenient_bool")]
    pub mining_pools_available: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub in_mining_pool: bool,
    #[serde(deserialize_with = "lenient_f64")]
    pub pool_fee: f64,
    #[serde(deserialize_with = "lenient_value")]
    pub speed: SimSpeed,
    #[serde(deserialize_with = "lenient_value")]
    pub chart_timeframe: ChartTimeframe,
    #[serde(deserialize_with = "lenient_f64_vec")]
    pub short_history: Vec<f64>,
    #[serde(deserialize_with = "lenient_vec")]
    pub long_history: Vec<PricePoint>,
    #[serde(deserialize_with = "lenient_bool")]
    pub has_reached_million: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub skip_event_notifications: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub skip_hardware_notifications: bool,
    #[serde(deserialize_with = "lenient_value")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Default for SavePayload {
    fn default() -> Self {
        Self {
            cash: STARTING_CASH,
            coin: 0.0,
            date: game_start_date(),
            miners: Vec::new(),
            block_counter: 0,
            current_difficulty: STARTING_DIFFICULTY,
            days_until_bill: BILL_CYCLE_DAYS,
            mining_pools_available: false,
            in_mining_pool: false,
            pool_fee: 0.0,
            speed: SimSpeed::Normal,
            chart_timeframe: ChartTimeframe::ThirtyDays,
            short_history: Vec::new(),
            long_history: Vec::new(),
            has_reached_million: false,
            skip_event_notifications: false,
            skip_hardware_notifications: false,
            saved_at: None,
        }
    }
}

impl SavePayload {
    pub fn capture(state: &EconomicState) -> Self {
        Self {
            cash: state.cash,
            coin: state.coin,
            date: state.date,
            miners: state
                .miners
                .iter()
                .map(|miner| SavedMiner {
                    name: miner.hardware_name.clone(),
                    durability: miner.durability(),
                    power_cost: miner.power_cost,
                })
                .collect(),
            block_counter: state.block_counter,
            current_difficulty: state.current_difficulty,
            days_until_bill: state.days_until_bill,
            mining_pools_available: state.mining_pools_available,
            in_mining_pool: state.in_mining_pool,
            pool_fee: state.pool_fee,
            speed: state.speed,
            chart_timeframe: state.chart_timeframe,
            short_history: state.price_history.short().iter().copied().collect(),
            long_history: state.price_history.long().iter().copied().collect(),
            has_reached_million: state.has_reached_million,
            skip_event_notifications: state.skip_event_notifications,
            skip_hardware_notifications: state.skip_hardware_notifications,
            saved_at: Some(Utc::now()),
        }
    }
}

/// Rebuilds a live state from a snapshot against the current catalog.
///
/// Miners of models no longer in the catalog are dropped. Hashrates come from
/// the catalog; a persisted power cost is kept when it is a positive number
/// since events may have scaled it.
pub fn reconcile(payload: SavePayload, catalog: &[HardwareSpec]) -> Result<EconomicState, DataError> {
    let mut state = EconomicState::fresh(catalog)?;

    state.miners = payload
        .miners
        .into_iter()
        .filter_map(|saved| {
            let Some(spec) = catalog.iter().find(|spec| spec.name == saved.name) else {
                warn!(hardware = %saved.name, "saved miner not in catalog, dropping");
                return None;
            };
            let power_cost = if saved.power_cost.is_finite() && saved.power_cost > 0.0 {
                saved.power_cost
            } else {
                spec.power_cost
            };
            Some(MinerInstance::from_parts(
                &spec.name,
                spec.hashrate,
                power_cost,
                saved.durability,
            ))
        })
        .collect();

    state.cash = sanitize(payload.cash);
    state.coin = sanitize(payload.coin).max(0.0);
    state.date = payload.date;
    state.block_counter = payload.block_counter;
    state.current_difficulty = match sanitize(payload.current_difficulty) {
        d if d > 0.0 => d,
        _ => STARTING_DIFFICULTY,
    };
    state.days_until_bill = payload.days_until_bill;
    state.mining_pools_available = payload.mining_pools_available;
    state.in_mining_pool = payload.in_mining_pool && payload.mining_pools_available;
    state.pool_fee = if state.in_mining_pool {
        sanitize(payload.pool_fee).clamp(0.0, 1.0)
    } else {
        0.0
    };
    state.speed = payload.speed;
    state.chart_timeframe = payload.chart_timeframe;
    state.price_history = PriceHistory::from_parts(payload.short_history, payload.long_history);
    state.current_price = None;
    state.has_reached_million = payload.has_reached_million;
    state.skip_event_notifications = payload.skip_event_notifications;
    state.skip_hardware_notifications = payload.skip_hardware_notifications;
    state.recompute_hashrate();
    let repaired = state.clamp_corrupt();
    if !repaired.is_empty() {
        warn!(fields = ?repaired, "saved counters out of range, clamped");
    }
    Ok(state)
}

pub fn encode(payload: &SavePayload) -> Result<Vec<u8>, SaveError> {
    let data = serde_json::to_vec(payload)?;
    let data_len = u32::try_from(data.len())
        .map_err(|_| SaveError::Io(io::Error::other("save payload too large")))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + data.len() + CHECKSUM_LEN);
    blob.extend_from_slice(&SAVE_VERSION_MAGIC.to_le_bytes());
    blob.extend_from_slice(&data_len.to_le_bytes());
    blob.extend_from_slice(&data);
    let checksum = blake3::hash(&blob);
    blob.extend_from_slice(checksum.as_bytes());
    Ok(blob)
}

pub fn decode(blob: &[u8]) -> Result<SavePayload, SaveError> {
    if blob.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(SaveError::Truncated);
    }
    let (magic, rest) = blob.split_at(8);
    let version = u64::from_le_bytes(magic.try_into().map_err(|_| SaveError::Truncated)?);
    if version != SAVE_VERSION_MAGIC {
        return Err(SaveError::Version {
            expected: SAVE_VERSION_MAGIC,
            found: version,
        });
    }
    let (length, rest) = rest.split_at(4);
    let data_len = u32::from_le_bytes(length.try_into().map_err(|_| SaveError::Truncated)?) as usize;
    if rest.len() < data_len + CHECKSUM_LEN {
        return Err(SaveError::Truncated);
    }

    let framed = &blob[..HEADER_LEN + data_len];
    let stored = &blob[HEADER_LEN + data_len..HEADER_LEN + data_len + CHECKSUM_LEN];
    if blake3::hash(framed).as_bytes() != stored {
        return Err(SaveError::Checksum);
    }

    Ok(serde_json::from_slice(&framed[HEADER_LEN..])?)
}

pub fn save_state(store: &mut dyn KeyValueStore, state: &EconomicState) -> Result<(), SaveError> {
    let blob = encode(&SavePayload::capture(state))?;
    store.set(SAVE_KEY, &blob)?;
    debug!(bytes = blob.len(), date = %state.date, "session saved");
    Ok(())
}

/// The stored payload, or `None` when nothing was saved yet.
pub fn load_payload(store: &dyn KeyValueStore) -> Result<Option<SavePayload>, SaveError> {
    match store.get(SAVE_KEY)? {
        Some(blob) => decode(&blob).map(Some),
        None => Ok(None),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value).unwrap_or(0.0))
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value).map(|n| n.max(0.0) as u64).unwrap_or(0))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value).map(|n| n as i64).unwrap_or(0))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    })
}

fn lenient_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .and_then(parse_day)
        .unwrap_or_else(game_start_date))
}

fn lenient_value<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Keeps the entries that decode and drops the rest.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_f64_vec<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().map(|item| number(item).unwrap_or(0.0)).collect(),
        _ => Vec::new(),
    })
}
