//! Point-in-time lookups over the historical series.
//!
//! Difficulty and network hashrate are deterministic: linear between
//! bracketing samples, holding the nearest known value outside the data.
//! Price is deliberately noisy (uniform jitter inside the data, compounding
//! growth plus volatility and occasional crashes beyond it), so callers inject
//! the random source.

use chrono::NaiveDate;
use rand::Rng;

use crate::constants::{
    CORRECTION_BASE_CHANCE, CORRECTION_MAX_DROP, CORRECTION_MIN_DROP, DEFAULT_DIFFICULTY,
    EXTRAPOLATED_PRICE_FLOOR, EXTRAPOLATION_ANNUAL_GROWTH, EXTRAPOLATION_DAILY_VOLATILITY,
    FALLBACK_NETWORK_HASHRATE, PRICE_CEILING, PRICE_FLOOR, PRICE_JITTER,
};
use crate::data::{Bracket, HistoricalSample, ReferenceData, Series};

/// Linear interpolation by elapsed-day fraction between two samples.
pub fn lerp(prev: &HistoricalSample<f64>, next: &HistoricalSample<f64>, date: NaiveDate) -> f64 {
    let span = (next.date - prev.date).num_days();
    if span <= 0 {
        return prev.value;
    }
    let elapsed = (date - prev.date).num_days() as f64;
    prev.value + (next.value - prev.value) * elapsed / span as f64
}

/// Deterministic lookup that holds the first value before the data and the
/// last value after it. `None` only for an empty series.
pub fn hold_value_at(series: &Series<f64>, date: NaiveDate) -> Option<f64> {
    match series.bracket(date) {
        Bracket::Empty => None,
        Bracket::Before(first) => Some(first.value),
        Bracket::Exact(sample) => Some(sample.value),
        Bracket::Between(prev, next) => Some(lerp(prev, next, date)),
        Bracket::After(last) => Some(last.value),
    }
}

pub fn difficulty_at(data: &ReferenceData, date: NaiveDate) -> f64 {
    match hold_value_at(&data.difficulty, date) {
        Some(value) if value.is_finite() => value,
        _ => DEFAULT_DIFFICULTY,
    }
}

pub fn network_hashrate_at(data: &ReferenceData, date: NaiveDate) -> f64 {
    match hold_value_at(&data.network_hashrate, date) {
        Some(value) if value.is_finite() && value > 0.0 => value,
        _ => FALLBACK_NETWORK_HASHRATE,
    }
}

/// Market price on `date`, or `None` while no market exists (before the
/// first price sample, or no price data at all).
pub fn price_at<R: Rng + ?Sized>(data: &ReferenceData, date: NaiveDate, rng: &mut R) -> Option<f64> {
    let first = data.price.first()?;
    if date < first.date {
        return None;
    }
    if let Some(fixed) = data.price_event_on(date) {
        return Some(fixed);
    }
    match data.price.bracket(date) {
        Bracket::Exact(sample) => Some(round_price(jitter(sample.value, rng))),
        Bracket::Between(prev, next) => Some(round_price(jitter(lerp(prev, next, date), rng))),
        Bracket::After(last) => Some(extrapolate(last, date, rng)),
        Bracket::Before(_) | Bracket::Empty => None,
    }
}

fn jitter<R: Rng + ?Sized>(price: f64, rng: &mut R) -> f64 {
    price * (1.0 + rng.gen_range(-0.5..0.5) * PRICE_JITTER)
}

fn round_price(price: f64) -> f64 {
    ((price * 100.0).round() / 100.0).max(PRICE_FLOOR)
}

fn extrapolate<R: Rng + ?Sized>(last: &HistoricalSample<f64>, date: NaiveDate, rng: &mut R) -> f64 {
    let days = (date - last.date).num_days() as f64;
    let daily_growth = (1.0 + EXTRAPOLATION_ANNUAL_GROWTH).powf(1.0 / 365.0) - 1.0;
    let mut price = last.value * (1.0 + daily_growth).powf(days);
    price *= 1.0 + rng.gen_range(-0.5..0.5) * EXTRAPOLATION_DAILY_VOLATILITY;

    let correction_chance = ((days % 365.0) / 365.0 * CORRECTION_BASE_CHANCE).clamp(0.0, 1.0);
    if rng.gen_bool(correction_chance) {
        price *= 1.0 - rng.gen_range(CORRECTION_MIN_DROP..CORRECTION_MAX_DROP);
    }

    let price = price.min(PRICE_CEILING);
    ((price * 100.0).round() / 100.0).max(EXTRAPOLATED_PRICE_FLOOR)
}
