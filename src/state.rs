//! The player-owned economic state: the aggregate root that the engine and
//! the transaction layer mutate.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::{
    BILL_CYCLE_DAYS, BLOCKS_PER_DIFFICULTY_ADJUSTMENT, LONG_HISTORY_CAP, MAX_DURABILITY, SHORT_HISTORY_CAP, STARTING_CASH,
    STARTING_DIFFICULTY, game_start_date,
};
use crate::data::HardwareSpec;
use crate::error::{DataError, sanitize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimSpeed {
    #[default]
    Normal,
    Fast,
    Faster,
}

impl SimSpeed {
    /// Calendar days advanced per tick.
    pub fn step_days(self) -> u32 {
        match self {
            SimSpeed::Normal => 1,
            SimSpeed::Fast => 7,
            SimSpeed::Faster => 30,
        }
    }

    /// Wall-clock time between ticks.
    pub fn tick_interval(self) -> Duration {
        match self {
            SimSpeed::Normal => Duration::from_millis(1000),
            SimSpeed::Fast => Duration::from_millis(500),
            SimSpeed::Faster => Duration::from_millis(200),
        }
    }

    pub fn next(self) -> Self {
        match self {
            SimSpeed::Normal => SimSpeed::Fast,
            SimSpeed::Fast => SimSpeed::Faster,
            SimSpeed::Faster => SimSpeed::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SimSpeed::Normal => "Normal",
            SimSpeed::Fast => "Fast",
            SimSpeed::Faster => "Faster",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartTimeframe {
    #[default]
    ThirtyDays,
    Monthly,
    Yearly,
    All,
}

impl ChartTimeframe {
    pub fn next(self) -> Self {
        match self {
            ChartTimeframe::ThirtyDays => ChartTimeframe::Monthly,
            ChartTimeframe::Monthly => ChartTimeframe::Yearly,
            ChartTimeframe::Yearly => ChartTimeframe::All,
            ChartTimeframe::All => ChartTimeframe::ThirtyDays,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChartTimeframe::ThirtyDays => "30 days",
            ChartTimeframe::Monthly => "Monthly",
            ChartTimeframe::Yearly => "Yearly",
            ChartTimeframe::All => "All",
        }
    }
}

/// One owned unit of mining hardware.
///
/// `current_hashrate` is always derived from `base_hashrate` and
/// `durability`; it is never set directly.
#[derive(Debug, Clone, PartialEq)]
pub struct MinerInstance {
    pub hardware_name: String,
    pub base_hashrate: f64,
    pub power_cost: f64,
    durability: f64,
    current_hashrate: f64,
}

impl MinerInstance {
    pub fn new(spec: &HardwareSpec, durability: f64) -> Self {
        Self::from_parts(&spec.name, spec.hashrate, spec.power_cost, durability)
    }

    pub fn from_parts(name: &str, base_hashrate: f64, power_cost: f64, durability: f64) -> Self {
        let mut miner = Self {
            hardware_name: name.to_string(),
            base_hashrate: sanitize(base_hashrate),
            power_cost: sanitize(power_cost),
            durability: MAX_DURABILITY,
            current_hashrate: 0.0,
        };
        miner.set_durability(durability);
        miner
    }

    pub fn durability(&self) -> f64 {
        self.durability
    }

    pub fn current_hashrate(&self) -> f64 {
        self.current_hashrate
    }

    pub fn set_durability(&mut self, durability: f64) {
        self.durability = sanitize(durability).clamp(0.0, MAX_DURABILITY);
        self.recompute_hashrate();
    }

    pub fn degrade(&mut self, amount: f64) {
        self.set_durability(self.durability - amount.max(0.0));
    }

    pub fn repair(&mut self) {
        self.set_durability(MAX_DURABILITY);
    }

    /// Re-snapshots the catalog hashrate, e.g. after a catalog change.
    pub fn rebase(&mut self, base_hashrate: f64) {
        self.base_hashrate = sanitize(base_hashrate);
        self.recompute_hashrate();
    }

    fn recompute_hashrate(&mut self) {
        self.current_hashrate = if self.durability <= 0.0 {
            0.0
        } else {
            sanitize(self.base_hashrate * self.durability / MAX_DURABILITY)
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Short (30-day) and long (1200-sample) price windows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    short: VecDeque<f64>,
    long: VecDeque<PricePoint>,
}

impl PriceHistory {
    pub fn from_parts(short: Vec<f64>, long: Vec<PricePoint>) -> Self {
        let mut history = Self::default();
        for price in short {
            history.push_short(price);
        }
        for point in long {
            history.push_long(point);
        }
        history
    }

    /// Appends a sample. A second sample for the newest day replaces it, so
    /// the long window holds at most one sample per day in date order.
    pub fn record(&mut self, date: NaiveDate, price: f64) {
        let price = sanitize(price);
        if let Some(last) = self.long.back_mut() {
            if last.date == date {
                last.price = price;
                if let Some(newest) = self.short.back_mut() {
                    *newest = price;
                }
                return;
            }
        }
        self.push_short(price);
        self.push_long(PricePoint { date, price });
    }

    fn push_short(&mut self, price: f64) {
        self.short.push_back(sanitize(price));
        while self.short.len() > SHORT_HISTORY_CAP {
            self.short.pop_front();
        }
    }

    fn push_long(&mut self, point: PricePoint) {
        self.long.push_back(PricePoint {
            date: point.date,
            price: sanitize(point.price),
        });
        while self.long.len() > LONG_HISTORY_CAP {
            self.long.pop_front();
        }
    }

    pub fn short(&self) -> &VecDeque<f64> {
        &self.short
    }

    pub fn long(&self) -> &VecDeque<PricePoint> {
        &self.long
    }

    /// Samples to plot for the selected timeframe, oldest first.
    pub fn chart_series(&self, timeframe: ChartTimeframe, today: NaiveDate) -> Vec<PricePoint> {
        match timeframe {
            ChartTimeframe::ThirtyDays => {
                let len = self.short.len();
                self.short
                    .iter()
                    .enumerate()
                    .map(|(i, price)| PricePoint {
                        date: today - chrono::Days::new((len - 1 - i) as u64),
                        price: *price,
                    })
                    .collect()
            }
            ChartTimeframe::Monthly => self.every_nth(30),
            ChartTimeframe::Yearly => self.every_nth(365),
            ChartTimeframe::All => self.every_nth(self.long.len().div_ceil(100).max(1)),
        }
    }

    fn every_nth(&self, n: usize) -> Vec<PricePoint> {
        self.long.iter().step_by(n.max(1)).copied().collect()
    }
}

/// Per-model view of the fleet, in first-acquired order.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetEntry {
    pub name: String,
    pub count: usize,
    pub hashrate: f64,
    pub durability: f64,
    pub power_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EconomicState {
    pub cash: f64,
    pub coin: f64,
    pub date: NaiveDate,
    pub miners: Vec<MinerInstance>,
    aggregate_hashrate: f64,
    /// Blocks since the last difficulty adjustment.
    pub block_counter: u64,
    pub current_difficulty: f64,
    pub days_until_bill: i64,
    pub mining_pools_available: bool,
    pub in_mining_pool: bool,
    pub pool_fee: f64,
    pub speed: SimSpeed,
    pub chart_timeframe: ChartTimeframe,
    pub price_history: PriceHistory,
    /// Today's quote; `None` while no market exists. Never persisted.
    pub current_price: Option<f64>,
    pub has_reached_million: bool,
    pub skip_event_notifications: bool,
    pub skip_hardware_notifications: bool,
}

impl EconomicState {
    /// A new session: starting cash and one unit of the first catalog entry.
    pub fn fresh(catalog: &[HardwareSpec]) -> Result<Self, DataError> {
        let starter = catalog
            .first()
            .ok_or(DataError::EmptyFeed { feed: "hardware" })?;
        let mut state = Self {
            cash: STARTING_CASH,
            coin: 0.0,
            date: game_start_date(),
            miners: vec![MinerInstance::new(starter, MAX_DURABILITY)],
            aggregate_hashrate: 0.0,
            block_counter: 0,
            current_difficulty: STARTING_DIFFICULTY,
            days_until_bill: BILL_CYCLE_DAYS,
            mining_pools_available: false,
            in_mining_pool: false,
            pool_fee: 0.0,
            speed: SimSpeed::Normal,
            chart_timeframe: ChartTimeframe::ThirtyDays,
            price_history: PriceHistory::default(),
            current_price: None,
            has_reached_million: false,
            skip_event_notifications: false,
            skip_hardware_notifications: false,
        };
        state.recompute_hashrate();
        Ok(state)
    }

    pub fn aggregate_hashrate(&self) -> f64 {
        self.aggregate_hashrate
    }

    /// Sum of every miner's current hashrate, computed from scratch.
    pub fn fleet_hashrate(&self) -> f64 {
        self.miners
            .iter()
            .map(|miner| sanitize(miner.current_hashrate()))
            .sum()
    }

    pub fn recompute_hashrate(&mut self) {
        self.aggregate_hashrate = self.fleet_hashrate();
    }

    pub fn monthly_power_cost(&self) -> f64 {
        self.miners.iter().map(|miner| sanitize(miner.power_cost)).sum()
    }

    pub fn owned_count(&self, name: &str) -> usize {
        self.miners
            .iter()
            .filter(|miner| miner.hardware_name == name)
            .count()
    }

    pub fn fleet(&self) -> Vec<FleetEntry> {
        let mut entries: Vec<FleetEntry> = Vec::new();
        for miner in &self.miners {
            match entries.iter_mut().find(|e| e.name == miner.hardware_name) {
                Some(entry) => {
                    entry.count += 1;
                    entry.hashrate += miner.current_hashrate();
                    entry.durability = miner.durability();
                }
                None => entries.push(FleetEntry {
                    name: miner.hardware_name.clone(),
                    count: 1,
                    hashrate: miner.current_hashrate(),
                    durability: miner.durability(),
                    power_cost: miner.power_cost,
                }),
            }
        }
        entries
    }

    pub fn market_open(&self) -> bool {
        self.current_price.is_some()
    }

    /// Pulls corrupted fields back into range: non-finite balances become 0,
    /// a non-finite or non-positive difficulty restarts at the genesis value,
    /// and the block and bill counters are held inside one cycle. Returns the
    /// names of the fields that were changed.
    pub fn clamp_corrupt(&mut self) -> Vec<&'static str> {
        let mut repaired = Vec::new();
        if !self.cash.is_finite() {
            self.cash = 0.0;
            repaired.push("cash");
        }
        if !self.coin.is_finite() {
            self.coin = 0.0;
            repaired.push("coin");
        }
        if !self.current_difficulty.is_finite() || self.current_difficulty <= 0.0 {
            self.current_difficulty = STARTING_DIFFICULTY;
            repaired.push("difficulty");
        }
        if self.block_counter >= BLOCKS_PER_DIFFICULTY_ADJUSTMENT {
            self.block_counter = BLOCKS_PER_DIFFICULTY_ADJUSTMENT - 1;
            repaired.push("block_counter");
        }
        let days_until_bill = self.days_until_bill.clamp(-BILL_CYCLE_DAYS, BILL_CYCLE_DAYS);
        if days_until_bill != self.days_until_bill {
            self.days_until_bill = days_until_bill;
            repaired.push("days_until_bill");
        }
        repaired
    }

    /// Sets today's quote and appends it to both price windows.
    pub fn record_price(&mut self, date: NaiveDate, price: Option<f64>) {
        self.current_price = price;
        self.price_history.record(date, price.unwrap_or(0.0));
    }
}
