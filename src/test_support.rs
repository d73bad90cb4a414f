//! Small hand-built reference tables shared by the unit tests.

use chrono::NaiveDate;

use crate::data::{
    EffectKind, EventEffect, HardwareSpec, Headline, HistoricalEvent, HistoricalSample,
    ReferenceData, Series,
};
use crate::market::HardwareListing;
use crate::session::Presenter;

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn hardware(name: &str, hashrate: f64, base_price: f64, year: i32, month: Option<u32>) -> HardwareSpec {
    HardwareSpec {
        name: name.to_string(),
        hashrate,
        base_price,
        power_cost: 10.0,
        available_year: year,
        available_month: month,
    }
}

pub fn event(date: NaiveDate, text: &str, effect: Option<(EffectKind, f64)>) -> HistoricalEvent {
    HistoricalEvent {
        date,
        description: text.to_string(),
        effect: effect.map(|(kind, value)| EventEffect { kind, value }),
    }
}

pub fn catalog() -> Vec<HardwareSpec> {
    vec![
        hardware("CPU", 2_000_000.0, 60.0, 2009, None),
        hardware("GPU", 40_000_000.0, 400.0, 2010, Some(7)),
        hardware("FPGA", 800_000_000.0, 1500.0, 2011, Some(6)),
    ]
}

pub fn tables() -> ReferenceData {
    ReferenceData::new(
        Series::new(vec![
            HistoricalSample::new(day(2009, 1, 3), 1.0),
            HistoricalSample::new(day(2010, 1, 3), 10.0),
            HistoricalSample::new(day(2011, 1, 3), 100.0),
        ]),
        Series::new(vec![
            HistoricalSample::new(day(2010, 1, 1), 0.01),
            HistoricalSample::new(day(2011, 1, 1), 0.30),
            HistoricalSample::new(day(2012, 1, 1), 5.00),
        ]),
        Series::new(vec![HistoricalSample::new(day(2009, 1, 3), 8_000_000.0)]),
        catalog(),
        vec![
            event(day(2009, 1, 3), "Genesis block", None),
            event(day(2009, 1, 12), "First transaction", None),
            event(
                day(2010, 12, 16),
                "Mining pools appear",
                Some((EffectKind::UnlockMiningPools, 0.0)),
            ),
        ],
        vec![Headline {
            text: "Satoshi posts the whitepaper".to_string(),
            start_date: day(2008, 10, 31),
            end_date: Some(day(2009, 12, 31)),
        }],
    )
}

/// Tables with a single network-hashrate sample so `h/H` is fixed.
pub fn flat_network(network_hashrate: f64) -> ReferenceData {
    let mut data = tables();
    data.network_hashrate = Series::new(vec![HistoricalSample::new(day(2009, 1, 3), network_hashrate)]);
    data
}

/// Presenter that records every callback.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub messages: Vec<String>,
    pub events: Vec<String>,
    pub hardware: Vec<String>,
    pub renders: usize,
}

impl Presenter for RecordingPresenter {
    fn render(&mut self, _state: &crate::state::EconomicState) {
        self.renders += 1;
    }

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
