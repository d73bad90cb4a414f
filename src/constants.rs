use chrono::NaiveDate;

// Chain timing
pub const BLOCKS_PER_DAY: u64 = 144;
pub const BLOCKS_PER_DIFFICULTY_ADJUSTMENT: u64 = 2016;
pub const DAYS_PER_DIFFICULTY_ADJUSTMENT: f64 =
    BLOCKS_PER_DIFFICULTY_ADJUSTMENT as f64 / BLOCKS_PER_DAY as f64;

// Economy
pub const STARTING_CASH: f64 = 1000.0;
pub const BILL_CYCLE_DAYS: i64 = 30;
pub const WIN_THRESHOLD: f64 = 1_000_000.0;
pub const STARTING_DIFFICULTY: f64 = 1.0;

// Price history windows
pub const SHORT_HISTORY_CAP: usize = 30;
pub const LONG_HISTORY_CAP: usize = 1200;

// Price model
pub const PRICE_JITTER: f64 = 0.1; // full band, i.e. +/-5%
pub const PRICE_FLOOR: f64 = 0.001;
pub const EXTRAPOLATION_ANNUAL_GROWTH: f64 = 0.15;
pub const EXTRAPOLATION_DAILY_VOLATILITY: f64 = 0.03;
pub const CORRECTION_BASE_CHANCE: f64 = 0.1;
pub const CORRECTION_MIN_DROP: f64 = 0.2;
pub const CORRECTION_MAX_DROP: f64 = 0.4;
pub const PRICE_CEILING: f64 = 1_000_000.0;
pub const EXTRAPOLATED_PRICE_FLOOR: f64 = 0.01;

// Difficulty
pub const FALLBACK_DIFFICULTY_GROWTH: f64 = 1.1;
pub const MAX_DIFFICULTY_GROWTH: f64 = 1.2;
pub const DEFAULT_DIFFICULTY: f64 = 1.0;

// Network
pub const FALLBACK_NETWORK_HASHRATE: f64 = 7_000_000.0;

// Hardware
pub const HARDWARE_PRICE_HALVING_DAYS: f64 = 182.5;
pub const HARDWARE_PRICE_FLOOR: f64 = 100.0;
pub const HARDWARE_RESALE_FRACTION: f64 = 0.1;
pub const REPAIR_COST_PER_UNIT: f64 = 50.0;
pub const MAX_DURABILITY: f64 = 100.0;
pub const DAILY_DURABILITY_BUDGET: f64 = 1.0;

// Mining pools
pub const POOL_FEE: f64 = 0.02;
pub const POOL_NETWORK_SHARE: f64 = 0.3;

// Persistence
pub const SAVE_KEY: &str = "bitcoin-tycoon";
pub const SAVE_VERSION_MAGIC: u64 = 0x4853_4854_5943_0001; // "HSHTYC" + v1

// Presentation
pub const HEARTBEAT_MS: u64 = 100;
pub const HEADLINE_ROTATE_SECS: f64 = 4.0;
pub const MAX_MESSAGES: usize = 5;

/// First day of every fresh session: the genesis block.
pub fn game_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2009, 1, 3).expect("genesis date is valid")
}

/// Block subsidy for the halving era the given year falls in.
pub fn block_reward_for_year(year: i32) -> f64 {
    if year < 2012 {
        50.0
    } else if year < 2016 {
        25.0
    } else if year < 2020 {
        12.5
    } else {
        6.25
    }
}
