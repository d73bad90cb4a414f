//! Time advancement.
//!
//! One call advances the state by a whole step (1, 7 or 30 days). Days are
//! simulated strictly one at a time for price and wear; events, block
//! counting, billing, rewards, the win check and the hardware shop are then
//! settled once for the step, in that order.

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};
use tracing::{debug, info, warn};

use crate::constants::{
    BILL_CYCLE_DAYS, BLOCKS_PER_DAY, BLOCKS_PER_DIFFICULTY_ADJUSTMENT,
    DAILY_DURABILITY_BUDGET, DAYS_PER_DIFFICULTY_ADJUSTMENT, FALLBACK_DIFFICULTY_GROWTH,
    MAX_DIFFICULTY_GROWTH, POOL_NETWORK_SHARE, WIN_THRESHOLD, block_reward_for_year,
};
use crate::data::{EffectKind, EventEffect, HistoricalEvent, ReferenceData};
use crate::error::{SimError, sanitize};
use crate::interpolation::{network_hashrate_at, price_at};
use crate::market::HardwareMarket;
use crate::state::EconomicState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepOutcome {
    #[default]
    Continue,
    Won,
    Lost,
}

/// Everything that happened during one step, for the session to present.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
    /// Events whose effects were applied, in date order.
    pub applied_events: Vec<HistoricalEvent>,
    /// Events to present; empty while event notifications are suppressed.
    pub queued_events: Vec<HistoricalEvent>,
    pub new_hardware: Vec<String>,
    pub difficulty_adjustments: u32,
    pub bills_paid: u32,
    pub billed: f64,
    pub blocks_found: u64,
    pub mined: f64,
    pub notices: Vec<String>,
    pub outcome: StepOutcome,
}

pub fn advance<R: Rng + ?Sized>(
    state: &mut EconomicState,
    data: &ReferenceData,
    market: &mut HardwareMarket,
    days: u32,
    rng: &mut R,
) -> Result<StepReport, SimError> {
    let repaired = state.clamp_corrupt();
    if !repaired.is_empty() {
        warn!(fields = ?repaired, "corrupt state clamped before step");
    }

    let start = state.date;
    let mut report = StepReport {
        start,
        end: start,
        days,
        ..Default::default()
    };

    let mut date = start;
    for _ in 0..days {
        date = date.succ_opt().ok_or(SimError::CalendarOverflow(date))?;
        simulate_day(state, data, date, rng);
    }
    report.end = date;
    debug!(%start, end = %date, days, "step simulated");

    let crossed: Vec<HistoricalEvent> = data.events_between(start, date).cloned().collect();
    for event in &crossed {
        if let Some(effect) = event.effect {
            if let Some(notice) = apply_effect(state, date, effect) {
                report.notices.push(notice);
            }
        }
        info!(date = %event.date, event = %event.description, "historical event applied");
    }
    if !state.skip_event_notifications {
        report.queued_events = crossed.clone();
    }
    report.applied_events = crossed;
    state.date = date;

    state.block_counter = state
        .block_counter
        .saturating_add(BLOCKS_PER_DAY * u64::from(days));
    while state.block_counter >= BLOCKS_PER_DIFFICULTY_ADJUSTMENT {
        adjust_difficulty(state, data);
        state.block_counter -= BLOCKS_PER_DIFFICULTY_ADJUSTMENT;
        report.difficulty_adjustments += 1;
    }

    state.days_until_bill = state.days_until_bill.saturating_sub(i64::from(days));
    while state.days_until_bill <= 0 {
        if report.outcome != StepOutcome::Lost {
            let bill = state.monthly_power_cost();
            report.bills_paid += 1;
            report.billed += bill;
            if pay_bill(state, bill) {
                report.outcome = StepOutcome::Lost;
            }
        }
        state.days_until_bill += BILL_CYCLE_DAYS;
    }
    if report.outcome == StepOutcome::Lost {
        warn!(date = %state.date, "cash exhausted by electricity bill");
        return Ok(report);
    }

    let (mined, blocks_found) = mine(state, data, days, rng);
    report.mined = mined;
    report.blocks_found = blocks_found;
    state.coin = sanitize(state.coin + mined).max(0.0);
    if mined > 0.0 {
        debug!(mined, blocks_found, "coin mined");
    }

    if !state.has_reached_million && state.cash >= WIN_THRESHOLD {
        state.has_reached_million = true;
        report.outcome = StepOutcome::Won;
        info!(cash = state.cash, "win threshold reached");
    }

    market.refresh_prices(&data.hardware, state.date);
    report.new_hardware = market.refresh_availability(
        &data.hardware,
        state.date,
        !state.skip_hardware_notifications,
    );

    Ok(report)
}

fn simulate_day<R: Rng + ?Sized>(
    state: &mut EconomicState,
    data: &ReferenceData,
    date: NaiveDate,
    rng: &mut R,
) {
    let price = price_at(data, date, rng);
    state.record_price(date, price);

    let fleet = state.miners.len();
    if fleet > 0 {
        let wear = DAILY_DURABILITY_BUDGET / fleet as f64;
        for miner in &mut state.miners {
            miner.degrade(wear);
        }
    }
    state.recompute_hashrate();
}

/// Applies an event effect to the state. Returns a notice for the player
/// when the effect deserves one.
pub fn apply_effect(state: &mut EconomicState, date: NaiveDate, effect: EventEffect) -> Option<String> {
    match effect.kind {
        EffectKind::Price => {
            state.record_price(date, Some(sanitize(effect.value)));
            None
        }
        EffectKind::PriceIncrease | EffectKind::PriceMultiplier | EffectKind::PriceDrop => {
            if let Some(price) = state.current_price {
                state.record_price(date, Some(sanitize(price * effect.value)));
            }
            None
        }
        EffectKind::Difficulty => {
            state.current_difficulty = sanitize(state.current_difficulty * effect.value);
            None
        }
        EffectKind::PowerCost => {
            for miner in &mut state.miners {
                miner.power_cost = sanitize(miner.power_cost * effect.value);
            }
            None
        }
        EffectKind::UnlockMiningPools => {
            state.mining_pools_available = true;
            Some("Mining pools are now available! Check the Mining Pool section.".to_string())
        }
    }
}

/// Compounds the running difficulty by the growth rate implied by the
/// historical samples bracketing the current date. Returns the rate applied.
pub fn adjust_difficulty(state: &mut EconomicState, data: &ReferenceData) -> f64 {
    let prev = data.difficulty.at_or_before(state.date);
    let next = data.difficulty.after(state.date);
    let growth = match (prev, next) {
        (Some(prev), Some(next)) => {
            let span = (next.date - prev.date).num_days() as f64;
            let periods = span / DAYS_PER_DIFFICULTY_ADJUSTMENT;
            if periods > 0.0 && prev.value > 0.0 {
                (next.value / prev.value).powf(1.0 / periods)
            } else {
                1.0
            }
        }
        (Some(_), None) => FALLBACK_DIFFICULTY_GROWTH,
        (None, _) => 1.0,
    };
    let growth = if growth.is_finite() { growth } else { 1.0 }.min(MAX_DIFFICULTY_GROWTH);
    state.current_difficulty = sanitize(state.current_difficulty * growth);
    info!(
        date = %state.date,
        growth,
        difficulty = state.current_difficulty,
        "difficulty adjusted"
    );
    growth
}

/// Deducts the bill. Returns true when cash is exhausted.
fn pay_bill(state: &mut EconomicState, bill: f64) -> bool {
    state.cash = sanitize(state.cash - bill);
    info!(bill, cash = state.cash, "electricity bill paid");
    if state.cash <= 0.0 {
        state.cash = 0.0;
        return true;
    }
    false
}

/// Coin earned over the step and the number of solo blocks found.
fn mine<R: Rng + ?Sized>(
    state: &EconomicState,
    data: &ReferenceData,
    days: u32,
    rng: &mut R,
) -> (f64, u64) {
    let hashrate = state.aggregate_hashrate();
    let network = network_hashrate_at(data, state.date);
    if hashrate <= 0.0 || state.current_difficulty <= 0.0 || !network.is_finite() || network <= 0.0 {
        return (0.0, 0);
    }
    let reward = block_reward_for_year(state.date.year());
    let daily_total = BLOCKS_PER_DAY as f64 * reward;

    if state.in_mining_pool {
        let pool_base = network * POOL_NETWORK_SHARE;
        let pool_total = pool_base + hashrate;
        let pool_share = hashrate / pool_total;
        let pool_network_share = pool_total / network;
        let mined = daily_total * pool_network_share * (1.0 - state.pool_fee) * pool_share
            * f64::from(days);
        return (sanitize(mined).max(0.0), 0);
    }

    let trials = BLOCKS_PER_DAY * u64::from(days);
    let probability = (hashrate / network).clamp(0.0, 1.0);
    let Ok(block) = Bernoulli::new(probability) else {
        return (0.0, 0);
    };
    let mut found = 0u64;
    for _ in 0..trials {
        if block.sample(rng) {
            found += 1;
        }
    }
    let mined = (found as f64 * reward).min(daily_total * f64::from(days));
    (sanitize(mined), found)
}
