//! Integration test: whole sessions against the shipped feeds
//!
//! Drives a session through the public API the way the terminal front-end
//! does: start, acknowledge or skip prompts, tick at various speeds, trade,
//! and resume from a save file on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use hashtycoon::constants::{SAVE_KEY, STARTING_CASH};
use hashtycoon::data::{HistoricalEvent, ReferenceData};
use hashtycoon::market::HardwareListing;
use hashtycoon::save::{self, FileStore, KeyValueStore, SavePayload, SavedMiner};
use hashtycoon::scheduler::SchedulerState;
use hashtycoon::session::{Presenter, Session, SessionStatus};
use hashtycoon::state::SimSpeed;
use hashtycoon::transactions::Receipt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Default)]
struct Recorder {
    messages: Vec<String>,
    events: Vec<String>,
    hardware: Vec<String>,
}

impl Presenter for Recorder {
    fn notify(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    fn prompt_event(&mut self, event: &HistoricalEvent) {
        self.events.push(event.description.clone());
    }

    fn prompt_hardware(&mut self, listing: &HardwareListing) {
        self.hardware.push(listing.name.clone());
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn shipped() -> Arc<ReferenceData> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
    Arc::new(ReferenceData::load(&dir).expect("shipped feeds load"))
}

fn open(dir: &Path) -> Session<ChaCha8Rng> {
    let store = FileStore::new(dir).unwrap();
    Session::restore(shipped(), Box::new(store), ChaCha8Rng::seed_from_u64(2009)).unwrap()
}

fn save_path(dir: &Path) -> PathBuf {
    dir.join(format!("{SAVE_KEY}.sav"))
}

/// Runs at the fastest speed, skipping every prompt, until `target`.
fn run_until(session: &mut Session<ChaCha8Rng>, ui: &mut Recorder, target: NaiveDate) {
    for _ in 0..1000 {
        if session.state().date >= target {
            return;
        }
        if session.prompt().is_some() {
            session.skip_all(ui);
            continue;
        }
        while session.state().speed != SimSpeed::Faster {
            session.cycle_speed();
        }
        session.tick(ui);
    }
    panic!("session never reached {target}");
}

#[test]
fn test_new_game_opens_on_genesis_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let mut ui = Recorder::default();
    let mut session = open(dir.path());
    session.start(&mut ui);

    assert_eq!(session.state().date, day(2009, 1, 3));
    assert_eq!(session.state().cash, STARTING_CASH);
    assert_eq!(session.state().miners.len(), 1);
    assert_eq!(ui.events.len(), 1);
    assert_eq!(session.scheduler_state(), SchedulerState::PausedForEvent);
    assert!(!session.state().market_open());
    assert!(save_path(dir.path()).exists());
}

#[test]
fn test_first_month_pays_one_bill_and_mines() {
    let dir = tempfile::tempdir().unwrap();
    let mut ui = Recorder::default();
    let mut session = open(dir.path());
    session.start(&mut ui);
    session.skip_all(&mut ui);

    let mut bills = 0;
    for _ in 0..31 {
        let report = session.tick(&mut ui).expect("clock is running");
        bills += report.bills_paid;
    }

    let power = session.data().hardware[0].power_cost;
    assert_eq!(bills, 1);
    assert_eq!(session.state().cash, STARTING_CASH - power);
    assert!(session.state().coin > 0.0);
    assert_eq!(session.state().date, day(2009, 2, 3));
}

#[test]
fn test_market_opens_and_coin_can_be_sold() {
    let dir = tempfile::tempdir().unwrap();
    let mut ui = Recorder::default();
    let mut session = open(dir.path());
    session.start(&mut ui);

    run_until(&mut session, &mut ui, day(2009, 9, 1));
    assert!(!session.state().market_open());
    assert!(session.sell_coin(1.0, &mut ui).is_err());

    run_until(&mut session, &mut ui, day(2009, 11, 1));
    assert!(session.state().market_open());

    let cash = session.state().cash;
    let coin = session.state().coin;
    let receipt = session.sell_coin(coin / 2.0, &mut ui).unwrap();
    assert!(matches!(receipt, Receipt::SoldCoin { .. }));
    assert!(session.state().cash > cash);
    assert!((session.state().coin - coin / 2.0).abs() < 1e-6);
}

#[test]
fn test_new_hardware_is_announced_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut ui = Recorder::default();
    let mut session = open(dir.path());
    session.start(&mut ui);
    session.skip_all(&mut ui);

    while session.state().speed != SimSpeed::Faster {
        session.cycle_speed();
    }
    while session.prompt().is_none() {
        session.tick(&mut ui).expect("clock is running");
    }

    assert_eq!(ui.hardware, vec![session.data().hardware[1].name.clone()]);
    assert_eq!(session.scheduler_state(), SchedulerState::PausedForNotification);

    session.acknowledge(&mut ui);
    assert_eq!(session.state().speed, SimSpeed::Normal);
    for _ in 0..5 {
        session.tick(&mut ui);
    }
    assert_eq!(ui.hardware.len(), 1);
}

#[test]
fn test_pools_unlock_on_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let mut ui = Recorder::default();
    let mut session = open(dir.path());
    session.start(&mut ui);

    run_until(&mut session, &mut ui, day(2010, 11, 1));
    assert!(!session.state().mining_pools_available);
    assert!(session.join_pool(&mut ui).is_err());

    run_until(&mut session, &mut ui, day(2011, 1, 1));
    assert!(session.state().mining_pools_available);
    assert!(ui.messages.iter().any(|m| m.starts_with("Mining pools are now available")));

    // the starter has worn out by now
    let starter = session.data().hardware[0].name.clone();
    session.buy_hardware(&starter, &mut ui).unwrap();
    session.join_pool(&mut ui).unwrap();
    assert!(session.state().in_mining_pool);
    let coin = session.state().coin;
    session.tick(&mut ui).unwrap();
    assert!(session.state().coin > coin);

    session.leave_pool(&mut ui).unwrap();
    assert!(!session.state().in_mining_pool);
}

#[test]
fn test_save_file_resumes_the_same_game() {
    let dir = tempfile::tempdir().unwrap();
    let mut ui = Recorder::default();
    let mut session = open(dir.path());
    session.start(&mut ui);
    run_until(&mut session, &mut ui, day(2010, 8, 1));
    let starter = session.data().hardware[0].name.clone();
    session.buy_hardware(&starter, &mut ui).unwrap();
    let saved = session.state().clone();
    drop(session);

    let resumed = open(dir.path());
    assert_eq!(resumed.status(), SessionStatus::Playing);
    assert_eq!(resumed.state().date, saved.date);
    assert_eq!(resumed.state().cash, saved.cash);
    assert_eq!(resumed.state().coin, saved.coin);
    assert_eq!(resumed.state().miners, saved.miners);
    assert_eq!(resumed.state().aggregate_hashrate(), saved.aggregate_hashrate());
    assert_eq!(resumed.state().days_until_bill, saved.days_until_bill);
    assert!(resumed.state().market_open());
}

#[test]
fn test_tampered_save_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let mut ui = Recorder::default();
    let mut session = open(dir.path());
    session.start(&mut ui);
    session.skip_all(&mut ui);
    for _ in 0..3 {
        session.tick(&mut ui);
    }
    drop(session);

    let path = save_path(dir.path());
    let mut blob = fs::read(&path).unwrap();
    let mid = blob.len() / 2;
    blob[mid] ^= 0xff;
    fs::write(&path, blob).unwrap();

    let fresh = open(dir.path());
    assert_eq!(fresh.state().date, day(2009, 1, 3));
    assert_eq!(fresh.state().cash, STARTING_CASH);
    assert!(!path.exists());
}

#[test]
fn test_restore_reconciles_against_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let data = shipped();
    let s9 = data.hardware("Antminer S9").expect("S9 in catalog").clone();
    let payload = SavePayload {
        cash: 5000.0,
        coin: 2.5,
        date: day(2017, 1, 1),
        miners: vec![
            SavedMiner {
                name: s9.name.clone(),
                durability: 50.0,
                power_cost: 0.0,
            },
            SavedMiner {
                name: "Retired Prototype".to_string(),
                durability: 100.0,
                power_cost: 10.0,
            },
        ],
        mining_pools_available: false,
        in_mining_pool: true,
        ..SavePayload::default()
    };
    let mut store = FileStore::new(dir.path()).unwrap();
    store.set(SAVE_KEY, &save::encode(&payload).unwrap()).unwrap();

    let session = open(dir.path());
    let state = session.state();
    assert_eq!(state.miners.len(), 1);
    assert_eq!(state.miners[0].power_cost, s9.power_cost);
    assert_eq!(state.aggregate_hashrate(), s9.hashrate * 0.5);
    assert!(!state.in_mining_pool);
    assert!(state.market_open());
}

#[test]
fn test_lost_game_stays_lost_after_restart_of_process() {
    let dir = tempfile::tempdir().unwrap();
    let payload = SavePayload {
        cash: 0.0,
        date: day(2011, 3, 1),
        ..SavePayload::default()
    };
    let mut store = FileStore::new(dir.path()).unwrap();
    store.set(SAVE_KEY, &save::encode(&payload).unwrap()).unwrap();

    let mut ui = Recorder::default();
    let mut session = open(dir.path());
    session.start(&mut ui);
    assert_eq!(session.status(), SessionStatus::Lost);
    assert!(session.tick(&mut ui).is_none());

    session.restart(&mut ui);
    assert_eq!(session.status(), SessionStatus::Playing);
    assert_eq!(session.state().date, day(2009, 1, 3));
}
