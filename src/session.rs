//! The session context: owns the economic state, the scheduler, the hardware
//! market, the random source and the save store, and is the only thing the
//! front-end talks to.
//!
//! Every mutating call reports back through a [`Presenter`] and persists the
//! state afterwards. Nothing here fails outward once the session exists:
//! rejected transactions become notifications, save failures are logged, and a
//! failed step resets the session.

use std::sync::Arc;

use chrono::Datelike;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{error, info, warn};

use crate::constants::{SAVE_KEY, block_reward_for_year};
use crate::data::{EffectKind, HardwareSpec, Headline, HistoricalEvent, ReferenceData};
use crate::engine::{self, StepOutcome, StepReport};
use crate::error::{DataError, TransactionError, sanitize};
use crate::interpolation::{difficulty_at, network_hashrate_at, price_at};
use crate::market::{HardwareListing, HardwareMarket, estimated_monthly_coin};
use crate::save::{self, KeyValueStore};
use crate::scheduler::{Prompt, Scheduler, SchedulerState};
use crate::state::{EconomicState, PricePoint, SimSpeed};
use crate::transactions::{self, Receipt};

/// Callbacks into the presentation layer. The core owns no rendering.
pub trait Presenter {
    fn render(&mut self, _state: &EconomicState) {}
    fn notify(&mut self, message: &str);
    fn prompt_event(&mut self, event: &HistoricalEvent);
    fn prompt_hardware(&mut self, listing: &HardwareListing);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Playing,
    Won,
    Lost,
}

/// Expected monthly output of some hashrate at today's network conditions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct YieldEstimate {
    pub coin: f64,
    /// Cash value at today's quote; 0 while no market exists.
    pub cash: f64,
}

pub struct Session<R: Rng = StdRng> {
    data: Arc<ReferenceData>,
    state: EconomicState,
    scheduler: Scheduler,
    market: HardwareMarket,
    status: SessionStatus,
    rng: R,
    store: Box<dyn KeyValueStore>,
}

impl<R: Rng> Session<R> {
    /// A brand new game. Nothing is written until the first mutation.
    pub fn new(
        data: Arc<ReferenceData>,
        store: Box<dyn KeyValueStore>,
        rng: R,
    ) -> Result<Self, DataError> {
        let state = EconomicState::fresh(&data.hardware)?;
        let market = HardwareMarket::new(&data.hardware, state.date);
        Ok(Self {
            data,
            state,
            scheduler: Scheduler::new(),
            market,
            status: SessionStatus::Playing,
            rng,
            store,
        })
    }

    /// Resumes the saved game, or starts fresh when there is none. A save that
    /// cannot be decoded is discarded.
    pub fn restore(
        data: Arc<ReferenceData>,
        mut store: Box<dyn KeyValueStore>,
        mut rng: R,
    ) -> Result<Self, DataError> {
        let payload = match save::load_payload(store.as_ref()) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "discarding unreadable save");
                if let Err(err) = store.remove(SAVE_KEY) {
                    warn!(error = %err, "failed to remove unreadable save");
                }
                None
            }
        };
        let Some(payload) = payload else {
            return Self::new(data, store, rng);
        };

        let mut state = save::reconcile(payload, &data.hardware)?;
        state.current_price = price_at(&data, state.date, &mut rng);
        let market = HardwareMarket::new(&data.hardware, state.date);
        let status = if state.cash <= 0.0 {
            SessionStatus::Lost
        } else {
            SessionStatus::Playing
        };
        info!(date = %state.date, cash = state.cash, ?status, "session restored");
        Ok(Self {
            data,
            state,
            scheduler: Scheduler::new(),
            market,
            status,
            rng,
            store,
        })
    }

    /// Applies the effects of everything that already happened by today and
    /// presents today's event, then lets the clock run.
    pub fn start(&mut self, presenter: &mut dyn Presenter) {
        if self.status == SessionStatus::Lost {
            presenter.render(&self.state);
            return;
        }
        for event in self.data.events_through(self.state.date) {
            match event.effect {
                Some(effect) if effect.kind == EffectKind::Price => {
                    self.state.current_price = Some(sanitize(effect.value));
                }
                Some(effect) if effect.kind == EffectKind::UnlockMiningPools => {
                    self.state.mining_pools_available = true;
                }
                _ => {}
            }
        }
        if !self.state.skip_event_notifications {
            if let Some(today) = self.data.event_on(self.state.date) {
                self.scheduler.enqueue_events([today.clone()]);
            }
        }
        self.present_prompt(presenter);
        self.persist();
        presenter.render(&self.state);
        info!(date = %self.state.date, "session started");
    }

    /// Advances one step if nothing is holding the clock.
    pub fn tick(&mut self, presenter: &mut dyn Presenter) -> Option<StepReport> {
        if self.status != SessionStatus::Playing || !self.scheduler.can_tick() {
            return None;
        }
        let days = self.state.speed.step_days();
        let report = match engine::advance(
            &mut self.state,
            &self.data,
            &mut self.market,
            days,
            &mut self.rng,
        ) {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "step failed, resetting session");
                presenter.notify("Something went wrong. The game has been restarted.");
                self.restart(presenter);
                return None;
            }
        };

        for notice in &report.notices {
            presenter.notify(notice);
        }
        if report.mined > 0.0 {
            presenter.notify(&format!("Mined {:.8} BTC!", report.mined));
        }
        match report.outcome {
            StepOutcome::Lost => {
                self.status = SessionStatus::Lost;
                presenter.notify("You ran out of cash to pay the electricity bill. Game over!");
                info!(date = %self.state.date, "session lost");
            }
            StepOutcome::Won => {
                self.status = SessionStatus::Won;
                presenter.notify("Congratulations! You reached $1,000,000!");
                info!(date = %self.state.date, "session won");
            }
            StepOutcome::Continue => {}
        }
        if self.status != SessionStatus::Lost {
            self.scheduler.enqueue_events(report.queued_events.iter().cloned());
            self.scheduler.enqueue_hardware(report.new_hardware.iter().cloned());
            self.present_prompt(presenter);
        }

        self.persist();
        presenter.render(&self.state);
        Some(report)
    }

    /// Dismisses the prompt in front. The clock resumes at normal speed once
    /// both queues are empty.
    pub fn acknowledge(&mut self, presenter: &mut dyn Presenter) {
        if !self.scheduler.acknowledge() {
            return;
        }
        self.after_prompt(presenter);
    }

    /// Drops every queued prompt of the kind in front and stops that kind from
    /// being queued again.
    pub fn skip_all(&mut self, presenter: &mut dyn Presenter) {
        match self.scheduler.current() {
            Some(Prompt::Event(_)) => {
                self.scheduler.skip_all_events();
                self.state.skip_event_notifications = true;
            }
            Some(Prompt::Hardware(_)) => {
                self.scheduler.skip_all_hardware();
                self.state.skip_hardware_notifications = true;
            }
            None => return,
        }
        self.after_prompt(presenter);
    }

    fn after_prompt(&mut self, presenter: &mut dyn Presenter) {
        if self.scheduler.current().is_some() {
            self.present_prompt(presenter);
        } else {
            self.state.speed = SimSpeed::Normal;
        }
        self.persist();
        presenter.render(&self.state);
    }

    fn present_prompt(&self, presenter: &mut dyn Presenter) {
        match self.scheduler.current() {
            Some(Prompt::Event(event)) => presenter.prompt_event(event),
            Some(Prompt::Hardware(name)) => {
                if let Some(listing) = self.market.listing(&self.data.hardware, name) {
                    presenter.prompt_hardware(&listing);
                }
            }
            None => {}
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.scheduler.is_user_paused() {
            self.scheduler.resume();
        } else {
            self.scheduler.pause_by_user();
        }
    }

    pub fn pause(&mut self) {
        self.scheduler.pause_by_user();
    }

    pub fn resume(&mut self) {
        self.scheduler.resume();
    }

    pub fn cycle_speed(&mut self) {
        self.state.speed = self.state.speed.next();
        self.persist();
    }

    pub fn cycle_chart(&mut self) {
        self.state.chart_timeframe = self.state.chart_timeframe.next();
        self.persist();
    }

    pub fn buy_hardware(
        &mut self,
        name: &str,
        presenter: &mut dyn Presenter,
    ) -> Result<Receipt, TransactionError> {
        self.transact(presenter, |state, market, catalog| {
            transactions::buy_hardware(state, market, catalog, name)
        })
    }

    pub fn sell_hardware(
        &mut self,
        name: &str,
        count: usize,
        presenter: &mut dyn Presenter,
    ) -> Result<Receipt, TransactionError> {
        self.transact(presenter, |state, _, catalog| {
            transactions::sell_hardware(state, catalog, name, count)
        })
    }

    pub fn repair_hardware(
        &mut self,
        name: &str,
        presenter: &mut dyn Presenter,
    ) -> Result<Receipt, TransactionError> {
        self.transact(presenter, |state, _, _| transactions::repair_hardware(state, name))
    }

    pub fn buy_coin(
        &mut self,
        amount: f64,
        presenter: &mut dyn Presenter,
    ) -> Result<Receipt, TransactionError> {
        self.transact(presenter, |state, _, _| transactions::buy_coin(state, amount))
    }

    pub fn sell_coin(
        &mut self,
        amount: f64,
        presenter: &mut dyn Presenter,
    ) -> Result<Receipt, TransactionError> {
        self.transact(presenter, |state, _, _| transactions::sell_coin(state, amount))
    }

    pub fn join_pool(&mut self, presenter: &mut dyn Presenter) -> Result<Receipt, TransactionError> {
        self.transact(presenter, |state, _, _| transactions::join_pool(state))
    }

    pub fn leave_pool(&mut self, presenter: &mut dyn Presenter) -> Result<Receipt, TransactionError> {
        self.transact(presenter, |state, _, _| transactions::leave_pool(state))
    }

    fn transact<F>(&mut self, presenter: &mut dyn Presenter, op: F) -> Result<Receipt, TransactionError>
    where
        F: FnOnce(&mut EconomicState, &HardwareMarket, &[HardwareSpec]) -> Result<Receipt, TransactionError>,
    {
        if self.status != SessionStatus::Playing {
            return Err(TransactionError::SessionOver);
        }
        match op(&mut self.state, &self.market, &self.data.hardware) {
            Ok(receipt) => {
                presenter.notify(&receipt.to_string());
                self.persist();
                presenter.render(&self.state);
                Ok(receipt)
            }
            Err(err) => {
                presenter.notify(&err.to_string());
                Err(err)
            }
        }
    }

    /// Throws the current game away and starts over from the genesis block.
    pub fn restart(&mut self, presenter: &mut dyn Presenter) {
        match EconomicState::fresh(&self.data.hardware) {
            Ok(state) => self.state = state,
            Err(err) => {
                error!(error = %err, "cannot build a fresh session");
                return;
            }
        }
        self.market = HardwareMarket::new(&self.data.hardware, self.state.date);
        self.scheduler.reset();
        self.status = SessionStatus::Playing;
        info!("session restarted");
        self.start(presenter);
    }

    /// Dismisses the win screen. The win never fires again for this game.
    pub fn continue_after_win(&mut self, presenter: &mut dyn Presenter) {
        if self.status == SessionStatus::Won {
            self.status = SessionStatus::Playing;
            presenter.render(&self.state);
        }
    }

    fn persist(&mut self) {
        if let Err(err) = save::save_state(self.store.as_mut(), &self.state) {
            warn!(error = %err, "failed to save session");
        }
    }

    pub fn state(&self) -> &EconomicState {
        &self.state
    }

    pub fn data(&self) -> &ReferenceData {
        &self.data
    }

    pub fn market(&self) -> &HardwareMarket {
        &self.market
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn prompt(&self) -> Option<Prompt<'_>> {
        self.scheduler.current()
    }

    pub fn is_paused(&self) -> bool {
        self.scheduler.is_user_paused()
    }

    pub fn listings(&self) -> Vec<HardwareListing> {
        self.market.listings(&self.data.hardware)
    }

    pub fn network_hashrate(&self) -> f64 {
        network_hashrate_at(&self.data, self.state.date)
    }

    /// Historical difficulty for today, for comparison with the running value.
    pub fn historical_difficulty(&self) -> f64 {
        difficulty_at(&self.data, self.state.date)
    }

    pub fn block_reward(&self) -> f64 {
        block_reward_for_year(self.state.date.year())
    }

    pub fn estimate(&self, hashrate: f64) -> YieldEstimate {
        let coin = estimated_monthly_coin(hashrate, self.network_hashrate(), self.block_reward());
        YieldEstimate {
            coin,
            cash: sanitize(coin * self.state.current_price.unwrap_or(0.0)),
        }
    }

    pub fn headlines(&self) -> Vec<&Headline> {
        self.data.active_headlines(self.state.date)
    }

    pub fn chart(&self) -> Vec<PricePoint> {
        self.state
            .price_history
            .chart_series(self.state.chart_timeframe, self.state.date)
    }
}
