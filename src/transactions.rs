//! Player-initiated trades: hardware buy/sell/repair, coin buy/sell and
//! mining pool membership.
//!
//! Every operation validates first and mutates only on success, so a
//! rejected request leaves the state exactly as it was.

use std::fmt;

use tracing::info;

use crate::constants::{HARDWARE_RESALE_FRACTION, MAX_DURABILITY, POOL_FEE, REPAIR_COST_PER_UNIT};
use crate::data::HardwareSpec;
use crate::error::{TransactionError, sanitize};
use crate::market::HardwareMarket;
use crate::state::{EconomicState, MinerInstance};

/// What a successful transaction did, phrased for the player.
#[derive(Debug, Clone, PartialEq)]
pub enum Receipt {
    BoughtHardware { name: String, price: f64 },
    SoldHardware { name: String, count: usize, refund: f64 },
    Repaired { name: String, count: usize, cost: f64 },
    BoughtCoin { amount: f64, cost: f64 },
    SoldCoin { amount: f64, proceeds: f64 },
    JoinedPool,
    LeftPool,
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Receipt::BoughtHardware { name, price } => write!(f, "Bought {name} for ${price:.2}!"),
            Receipt::SoldHardware { name, count, refund } => {
                write!(f, "Sold {count} {name}(s) for ${refund:.2}!")
            }
            Receipt::Repaired { name, cost, .. } => write!(f, "Repaired {name} miners for ${cost:.2}!"),
            Receipt::BoughtCoin { amount, cost } => write!(f, "Bought {amount:.8} BTC for ${cost:.2}!"),
            Receipt::SoldCoin { amount, proceeds } => {
                write!(f, "Sold {amount:.8} BTC for ${proceeds:.2}!")
            }
            Receipt::JoinedPool => write!(
                f,
                "Joined Slush Pool! You'll now earn more consistent rewards (2% fee)."
            ),
            Receipt::LeftPool => write!(f, "Left Slush Pool. You're now mining solo again."),
        }
    }
}

pub fn buy_hardware(
    state: &mut EconomicState,
    market: &HardwareMarket,
    catalog: &[HardwareSpec],
    name: &str,
) -> Result<Receipt, TransactionError> {
    if !market.is_available(name) {
        return Err(TransactionError::HardwareUnavailable(name.to_string()));
    }
    let spec = catalog
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| TransactionError::UnknownHardware(name.to_string()))?;
    let price = market.current_price(name).unwrap_or(spec.base_price);
    if state.cash < price {
        return Err(TransactionError::InsufficientFunds {
            needed: price,
            available: state.cash,
        });
    }

    state.cash = sanitize(state.cash - price);

    // same-model units share one blended durability
    let existing: Vec<f64> = state
        .miners
        .iter()
        .filter(|miner| miner.hardware_name == name)
        .map(|miner| miner.durability())
        .collect();
    let blended = (existing.iter().sum::<f64>() + MAX_DURABILITY) / (existing.len() + 1) as f64;
    for miner in state.miners.iter_mut().filter(|m| m.hardware_name == name) {
        miner.set_durability(blended);
    }
    state.miners.push(MinerInstance::new(spec, blended));
    state.recompute_hashrate();

    info!(hardware = name, price, durability = blended, "hardware bought");
    Ok(Receipt::BoughtHardware {
        name: name.to_string(),
        price,
    })
}

pub fn sell_hardware(
    state: &mut EconomicState,
    catalog: &[HardwareSpec],
    name: &str,
    count: usize,
) -> Result<Receipt, TransactionError> {
    let owned = state.owned_count(name);
    if count == 0 || count > owned {
        return Err(TransactionError::InsufficientInventory {
            name: name.to_string(),
            owned,
        });
    }
    let spec = catalog
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| TransactionError::UnknownHardware(name.to_string()))?;

    let refund = sanitize(spec.base_price * HARDWARE_RESALE_FRACTION * count as f64);
    let mut remaining = count;
    state.miners.retain(|miner| {
        if remaining > 0 && miner.hardware_name == name {
            remaining -= 1;
            false
        } else {
            true
        }
    });
    state.cash = sanitize(state.cash + refund);
    state.recompute_hashrate();

    info!(hardware = name, count, refund, "hardware sold");
    Ok(Receipt::SoldHardware {
        name: name.to_string(),
        count,
        refund,
    })
}

/// Repairs every owned unit of `name` at once.
pub fn repair_hardware(state: &mut EconomicState, name: &str) -> Result<Receipt, TransactionError> {
    let count = state.owned_count(name);
    if count == 0 {
        return Err(TransactionError::NotOwned(name.to_string()));
    }
    let cost = REPAIR_COST_PER_UNIT * count as f64;
    if state.cash < cost {
        return Err(TransactionError::InsufficientFunds {
            needed: cost,
            available: state.cash,
        });
    }

    state.cash = sanitize(state.cash - cost);
    for miner in state.miners.iter_mut().filter(|m| m.hardware_name == name) {
        miner.repair();
    }
    state.recompute_hashrate();

    info!(hardware = name, count, cost, "hardware repaired");
    Ok(Receipt::Repaired {
        name: name.to_string(),
        count,
        cost,
    })
}

fn quote(state: &EconomicState) -> Result<f64, TransactionError> {
    state.current_price.ok_or(TransactionError::MarketUnavailable)
}

/// Buys `amount` coin at today's quote.
pub fn buy_coin(state: &mut EconomicState, amount: f64) -> Result<Receipt, TransactionError> {
    let price = quote(state)?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(TransactionError::InvalidQuantity);
    }
    let cost = amount * price;
    if !cost.is_finite() || cost > state.cash {
        return Err(TransactionError::InsufficientFunds {
            needed: sanitize(cost),
            available: state.cash,
        });
    }

    state.cash = sanitize(state.cash - cost);
    state.coin = sanitize(state.coin + amount);
    info!(amount, price, cost, "coin bought");
    Ok(Receipt::BoughtCoin { amount, cost })
}

/// Sells `amount` coin at today's quote. Proceeds are rounded to cents.
pub fn sell_coin(state: &mut EconomicState, amount: f64) -> Result<Receipt, TransactionError> {
    let price = quote(state)?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(TransactionError::InvalidQuantity);
    }
    if amount > state.coin {
        return Err(TransactionError::InsufficientCoin {
            available: state.coin,
        });
    }

    let proceeds = sanitize((amount * price * 100.0).round() / 100.0);
    state.cash = sanitize(state.cash + proceeds);
    state.coin = sanitize(state.coin - amount).max(0.0);
    info!(amount, price, proceeds, "coin sold");
    Ok(Receipt::SoldCoin { amount, proceeds })
}

pub fn join_pool(state: &mut EconomicState) -> Result<Receipt, TransactionError> {
    if !state.mining_pools_available {
        return Err(TransactionError::PoolsLocked);
    }
    if state.in_mining_pool {
        return Err(TransactionError::AlreadyPooled);
    }
    state.in_mining_pool = true;
    state.pool_fee = POOL_FEE;
    info!(fee = POOL_FEE, "joined mining pool");
    Ok(Receipt::JoinedPool)
}

pub fn leave_pool(state: &mut EconomicState) -> Result<Receipt, TransactionError> {
    if !state.in_mining_pool {
        return Err(TransactionError::NotPooled);
    }
    state.in_mining_pool = false;
    state.pool_fee = 0.0;
    state.recompute_hashrate();
    info!("left mining pool");
    Ok(Receipt::LeftPool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{catalog, day};

    fn setup() -> (EconomicState, HardwareMarket, Vec<HardwareSpec>) {
        let catalog = catalog();
        let state = EconomicState::fresh(&catalog).unwrap();
        let market = HardwareMarket::new(&catalog, state.date);
        (state, market, catalog)
    }

    #[test]
    fn test_buy_blends_durability_across_model() {
        let (mut state, market, catalog) = setup();
        state.miners[0].set_durability(40.0);
        state.recompute_hashrate();

        let receipt = buy_hardware(&mut state, &market, &catalog, "CPU").unwrap();

        assert_eq!(receipt.to_string(), "Bought CPU for $60.00!");
        assert_eq!(state.cash, 940.0);
        assert_eq!(state.owned_count("CPU"), 2);
        for miner in &state.miners {
            assert_eq!(miner.durability(), 70.0);
        }
        assert_eq!(state.aggregate_hashrate(), state.fleet_hashrate());
        assert_eq!(state.aggregate_hashrate(), 2_800_000.0);
    }

    #[test]
    fn test_buy_rejects_unreleased_or_unaffordable() {
        let (mut state, market, catalog) = setup();
        let before = state.clone();

        let err = buy_hardware(&mut state, &market, &catalog, "GPU").unwrap_err();
        assert_eq!(err, TransactionError::HardwareUnavailable("GPU".to_string()));

        state.cash = 59.0;
        let err = buy_hardware(&mut state, &market, &catalog, "CPU").unwrap_err();
        assert!(matches!(err, TransactionError::InsufficientFunds { .. }));
        assert_eq!(state.miners, before.miners);
        assert_eq!(state.cash, 59.0);
    }

    #[test]
    fn test_buy_at_decayed_price() {
        let catalog = catalog();
        let mut state = EconomicState::fresh(&catalog).unwrap();
        state.date = day(2011, 6, 1);
        let market = HardwareMarket::new(&catalog, state.date);
        state.cash = 10_000.0;

        buy_hardware(&mut state, &market, &catalog, "GPU").unwrap();
        // released 2010-07-01, 335 days: one halving
        assert_eq!(state.cash, 10_000.0 - 200.0);
    }

    #[test]
    fn test_sell_refunds_tenth_of_base_price() {
        let (mut state, market, catalog) = setup();
        buy_hardware(&mut state, &market, &catalog, "CPU").unwrap();
        buy_hardware(&mut state, &market, &catalog, "CPU").unwrap();
        let cash = state.cash;

        let receipt = sell_hardware(&mut state, &catalog, "CPU", 2).unwrap();

        assert_eq!(receipt.to_string(), "Sold 2 CPU(s) for $12.00!");
        assert_eq!(state.cash, cash + 12.0);
        assert_eq!(state.owned_count("CPU"), 1);
        assert_eq!(state.aggregate_hashrate(), state.fleet_hashrate());
    }

    #[test]
    fn test_sell_more_than_owned_is_rejected_untouched() {
        let (mut state, _, catalog) = setup();
        let before = state.clone();

        let err = sell_hardware(&mut state, &catalog, "CPU", 2).unwrap_err();
        assert_eq!(err.to_string(), "Invalid amount! You have 1 CPU(s).");
        assert_eq!(state, before);

        assert!(sell_hardware(&mut state, &catalog, "CPU", 0).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_repair_costs_per_unit() {
        let (mut state, market, catalog) = setup();
        state.cash = 10_000.0;
        buy_hardware(&mut state, &market, &catalog, "CPU").unwrap();
        buy_hardware(&mut state, &market, &catalog, "CPU").unwrap();
        for miner in &mut state.miners {
            miner.degrade(30.0);
        }
        state.recompute_hashrate();
        let cash = state.cash;

        let receipt = repair_hardware(&mut state, "CPU").unwrap();

        assert_eq!(receipt, Receipt::Repaired { name: "CPU".to_string(), count: 3, cost: 150.0 });
        assert_eq!(state.cash, cash - 150.0);
        assert!(state.miners.iter().all(|m| m.durability() == 100.0));
        assert_eq!(state.aggregate_hashrate(), 3.0 * 2_000_000.0);
    }

    #[test]
    fn test_repair_without_funds_changes_nothing() {
        let (mut state, market, catalog) = setup();
        buy_hardware(&mut state, &market, &catalog, "CPU").unwrap();
        buy_hardware(&mut state, &market, &catalog, "CPU").unwrap();
        for miner in &mut state.miners {
            miner.degrade(30.0);
        }
        state.recompute_hashrate();
        state.cash = 149.0;
        let before = state.clone();

        let err = repair_hardware(&mut state, "CPU").unwrap_err();

        assert_eq!(
            err,
            TransactionError::InsufficientFunds {
                needed: 150.0,
                available: 149.0
            }
        );
        assert_eq!(state, before);
        assert!(matches!(
            repair_hardware(&mut state, "GPU"),
            Err(TransactionError::NotOwned(_))
        ));
    }

    #[test]
    fn test_coin_trades_need_a_market() {
        let (mut state, _, _) = setup();
        state.coin = 5.0;
        assert_eq!(buy_coin(&mut state, 1.0), Err(TransactionError::MarketUnavailable));
        assert_eq!(sell_coin(&mut state, 1.0), Err(TransactionError::MarketUnavailable));
        assert_eq!(state.cash, 1000.0);
        assert_eq!(state.coin, 5.0);
    }

    #[test]
    fn test_coin_round_trip_at_quote() {
        let (mut state, _, _) = setup();
        state.current_price = Some(2.5);

        buy_coin(&mut state, 100.0).unwrap();
        assert_eq!(state.cash, 750.0);
        assert_eq!(state.coin, 100.0);

        let receipt = sell_coin(&mut state, 40.0).unwrap();
        assert_eq!(receipt.to_string(), "Sold 40.00000000 BTC for $100.00!");
        assert_eq!(state.cash, 850.0);
        assert_eq!(state.coin, 60.0);
    }

    #[test]
    fn test_coin_trade_validation() {
        let (mut state, _, _) = setup();
        state.current_price = Some(10.0);
        assert_eq!(buy_coin(&mut state, 0.0), Err(TransactionError::InvalidQuantity));
        assert_eq!(buy_coin(&mut state, f64::NAN), Err(TransactionError::InvalidQuantity));
        assert!(matches!(
            buy_coin(&mut state, 101.0),
            Err(TransactionError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            sell_coin(&mut state, 0.5),
            Err(TransactionError::InsufficientCoin { .. })
        ));
        assert_eq!(state.cash, 1000.0);
        assert_eq!(state.coin, 0.0);
    }

    #[test]
    fn test_pool_membership() {
        let (mut state, _, _) = setup();
        assert_eq!(join_pool(&mut state), Err(TransactionError::PoolsLocked));

        state.mining_pools_available = true;
        join_pool(&mut state).unwrap();
        assert!(state.in_mining_pool);
        assert_eq!(state.pool_fee, POOL_FEE);
        assert_eq!(join_pool(&mut state), Err(TransactionError::AlreadyPooled));

        leave_pool(&mut state).unwrap();
        assert!(!state.in_mining_pool);
        assert_eq!(state.pool_fee, 0.0);
        assert_eq!(leave_pool(&mut state), Err(TransactionError::NotPooled));
    }
}
