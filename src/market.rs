//! Hardware shop: time-decaying prices, the purchasable set, and yield
//! estimates for listings.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::constants::{
    BLOCKS_PER_DAY, BILL_CYCLE_DAYS, HARDWARE_PRICE_FLOOR, HARDWARE_PRICE_HALVING_DAYS,
    game_start_date,
};
use crate::data::HardwareSpec;
use crate::error::sanitize;

/// Price of a model on `date`: halves every 182.5 days after release, never
/// below the floor (or the base price, when that is already lower).
pub fn hardware_price_on(spec: &HardwareSpec, date: NaiveDate) -> f64 {
    let release = spec.release_date();
    if date < release {
        return spec.base_price;
    }
    let days_since_release = (date - release).num_days() as f64;
    let reductions = (days_since_release / HARDWARE_PRICE_HALVING_DAYS).floor() as u32;
    let floor = HARDWARE_PRICE_FLOOR.min(spec.base_price);
    let mut price = spec.base_price;
    for _ in 0..reductions {
        price = (price * 0.5).max(floor);
        if price <= floor {
            break;
        }
    }
    price
}

/// Expected coin per billing month for `hashrate` competing against
/// `network_hashrate`.
pub fn estimated_monthly_coin(hashrate: f64, network_hashrate: f64, block_reward: f64) -> f64 {
    let total = network_hashrate + hashrate;
    if total <= 0.0 {
        return 0.0;
    }
    let share = hashrate / total;
    sanitize(share * BLOCKS_PER_DAY as f64 * block_reward * BILL_CYCLE_DAYS as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HardwareListing {
    pub name: String,
    pub hashrate: f64,
    pub current_price: f64,
    pub power_cost: f64,
    pub release_date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct HardwareMarket {
    prices: HashMap<String, f64>,
    available: Vec<String>,
    seen: HashSet<String>,
}

impl HardwareMarket {
    /// Prices and availability as of `date`, with everything already on sale
    /// marked as seen so it is never announced.
    pub fn new(catalog: &[HardwareSpec], date: NaiveDate) -> Self {
        let mut market = Self::default();
        market.refresh_prices(catalog, date);
        market.refresh_availability(catalog, date, false);
        market
    }

    pub fn refresh_prices(&mut self, catalog: &[HardwareSpec], date: NaiveDate) {
        for spec in catalog {
            self.prices
                .insert(spec.name.clone(), hardware_price_on(spec, date));
        }
    }

    /// Recomputes the purchasable set and returns the models to announce.
    ///
    /// With `announce` off every available model is silently marked as seen.
    pub fn refresh_availability(
        &mut self,
        catalog: &[HardwareSpec],
        date: NaiveDate,
        announce: bool,
    ) -> Vec<String> {
        let available: Vec<&HardwareSpec> = catalog
            .iter()
            .filter(|spec| spec.is_available_on(date))
            .collect();
        let mut fresh = Vec::new();
        for spec in &available {
            if announce {
                if spec.release_date() > game_start_date() && self.seen.insert(spec.name.clone()) {
                    debug!(hardware = %spec.name, "new hardware available");
                    fresh.push(spec.name.clone());
                }
            } else {
                self.seen.insert(spec.name.clone());
            }
        }
        self.available = available.iter().map(|spec| spec.name.clone()).collect();
        fresh
    }

    pub fn current_price(&self, name: &str) -> Option<f64> {
        self.prices.get(name).copied()
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.available.iter().any(|candidate| candidate == name)
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn listing(&self, catalog: &[HardwareSpec], name: &str) -> Option<HardwareListing> {
        let spec = catalog.iter().find(|spec| spec.name == name)?;
        Some(HardwareListing {
            name: spec.name.clone(),
            hashrate: spec.hashrate,
            current_price: self.current_price(name).unwrap_or(spec.base_price),
            power_cost: spec.power_cost,
            release_date: spec.release_date(),
        })
    }

    /// Purchasable models in catalog order.
    pub fn listings(&self, catalog: &[HardwareSpec]) -> Vec<HardwareListing> {
        self.available
            .iter()
            .filter_map(|name| self.listing(catalog, name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn spec(name: &str, year: i32, month: Option<u32>, base_price: f64) -> HardwareSpec {
        HardwareSpec {
            name: name.to_string(),
            hashrate: 1_000_000.0,
            base_price,
            power_cost: 20.0,
            available_year: year,
            available_month: month,
        }
    }

    #[test]
    fn test_price_halves_every_half_year() {
        let gpu = spec("GPU", 2010, Some(1), 1600.0);
        assert_eq!(hardware_price_on(&gpu, day(2009, 12, 31)), 1600.0);
        assert_eq!(hardware_price_on(&gpu, day(2010, 1, 1)), 1600.0);
        assert_eq!(hardware_price_on(&gpu, day(2010, 7, 2)), 1600.0);
        // 183 days after release
        assert_eq!(hardware_price_on(&gpu, day(2010, 7, 3)), 800.0);
        assert_eq!(hardware_price_on(&gpu, day(2010, 12, 31)), 800.0);
        // 365 days: two full halving periods
        assert_eq!(hardware_price_on(&gpu, day(2011, 1, 1)), 400.0);
        // floored at 100
        assert_eq!(hardware_price_on(&gpu, day(2020, 1, 1)), HARDWARE_PRICE_FLOOR);
    }

    #[test]
    fn test_cheap_hardware_never_rises_to_floor() {
        let cpu = spec("CPU", 2009, None, 60.0);
        assert_eq!(hardware_price_on(&cpu, day(2015, 1, 1)), 60.0);
    }

    #[test]
    fn test_initial_market_announces_nothing() {
        let catalog = vec![spec("CPU", 2009, None, 60.0), spec("GPU", 2010, Some(7), 400.0)];
        let mut market = HardwareMarket::new(&catalog, day(2009, 1, 3));
        assert!(market.is_available("CPU"));
        assert!(!market.is_available("GPU"));

        let fresh = market.refresh_availability(&catalog, day(2010, 6, 30), true);
        assert!(fresh.is_empty());

        let fresh = market.refresh_availability(&catalog, day(2010, 7, 1), true);
        assert_eq!(fresh, vec!["GPU".to_string()]);
        assert!(market.is_available("GPU"));

        // announced once only
        let fresh = market.refresh_availability(&catalog, day(2010, 7, 2), true);
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_silent_refresh_marks_seen() {
        let catalog = vec![spec("CPU", 2009, None, 60.0), spec("GPU", 2010, Some(7), 400.0)];
        let mut market = HardwareMarket::new(&catalog, day(2009, 1, 3));
        assert!(market.refresh_availability(&catalog, day(2011, 1, 1), false).is_empty());
        assert!(market.refresh_availability(&catalog, day(2011, 1, 2), true).is_empty());
    }

    #[test]
    fn test_listings_follow_catalog_order() {
        let catalog = vec![spec("CPU", 2009, None, 60.0), spec("GPU", 2009, Some(2), 400.0)];
        let market = HardwareMarket::new(&catalog, day(2009, 3, 1));
        let names: Vec<_> = market.listings(&catalog).into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["CPU", "GPU"]);
    }

    #[test]
    fn test_monthly_estimate() {
        let estimate = estimated_monthly_coin(1.0, 99.0, 50.0);
        assert!((estimate - 0.01 * 144.0 * 50.0 * 30.0).abs() < 1e-9);
        assert_eq!(estimated_monthly_coin(0.0, 0.0, 50.0), 0.0);
    }
}
