use std::collections::VecDeque;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use hashtycoon::constants::{HEADLINE_ROTATE_SECS, MAX_MESSAGES};
use hashtycoon::data::HistoricalEvent;
use hashtycoon::market::HardwareListing;
use hashtycoon::session::{Presenter, Session, SessionStatus};
use hashtycoon::state::EconomicState;

const COIN_LOT: f64 = 1.0;
const COIN_BULK_LOT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneFocus {
    Fleet,
    Shop,
    Bank,
}

impl PaneFocus {
    fn next(self) -> Self {
        match self {
            PaneFocus::Fleet => PaneFocus::Shop,
            PaneFocus::Shop => PaneFocus::Bank,
            PaneFocus::Bank => PaneFocus::Fleet,
        }
    }

    fn prev(self) -> Self {
        match self {
            PaneFocus::Fleet => PaneFocus::Bank,
            PaneFocus::Shop => PaneFocus::Fleet,
            PaneFocus::Bank => PaneFocus::Shop,
        }
    }
}

/// Modal content handed over by the session's prompt callbacks.
#[derive(Debug, Clone)]
pub enum Modal {
    Event { date: NaiveDate, text: String },
    Hardware(HardwareListing),
}

/// The terminal side of the presenter: the message feed and the open modal.
#[derive(Debug, Default)]
pub struct MessageFeed {
    pub messages: VecDeque<String>,
    pub modal: Option<Modal>,
}

impl MessageFeed {
    fn push_message(&mut self, msg: impl Into<String>) {
        self.messages.push_front(msg.into());
        while self.messages.len() > MAX_MESSAGES {
            self.messages.pop_back();
        }
    }
}

impl Presenter for MessageFeed {
    fn notify(&mut self, message: &str) {
        self.push_message(message);
    }

    fn prompt_event(&mut self, event: &HistoricalEvent) {
        self.modal = Some(Modal::Event {
            date: event.date,
            text: event.description.clone(),
        });
    }

    fn prompt_hardware(&mut self, listing: &HardwareListing) {
        self.modal = Some(Modal::Hardware(listing.clone()));
    }

    fn render(&mut self, state: &EconomicState) {
        tracing::trace!(date = %state.date, cash = state.cash, "frame state updated");
    }
}

pub struct App {
    pub focus: PaneFocus,
    pub should_quit: bool,
    pub session: Session,
    pub feed: MessageFeed,
    pub fleet_selected: usize,
    pub shop_selected: usize,
    pub headline_index: usize,
    tick_clock: Duration,
    headline_clock: Duration,
}

impl App {
    pub fn new(mut session: Session) -> Self {
        let mut feed = MessageFeed::default();
        session.start(&mut feed);
        if session.status() == SessionStatus::Lost {
            feed.push_message("Your last game ended. Press N to start over.");
        }
        Self {
            focus: PaneFocus::Fleet,
            should_quit: false,
            session,
            feed,
            fleet_selected: 0,
            shop_selected: 0,
            headline_index: 0,
            tick_clock: Duration::ZERO,
            headline_clock: Duration::ZERO,
        }
    }

    /// Heartbeat. Runs at most one simulation step per call, once the
    /// interval for the current speed has elapsed.
    pub fn on_tick(&mut self, dt: Duration) {
        self.headline_clock += dt;
        if self.headline_clock.as_secs_f64() >= HEADLINE_ROTATE_SECS {
            self.headline_clock = Duration::ZERO;
            self.headline_index = self.headline_index.wrapping_add(1);
        }

        self.tick_clock += dt;
        let interval = self.session.state().speed.tick_interval();
        if self.tick_clock >= interval {
            self.tick_clock = Duration::ZERO;
            self.session.tick(&mut self.feed);
            self.clamp_selection();
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Char('q' | 'Q'))
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            self.should_quit = true;
            return;
        }

        match self.session.status() {
            SessionStatus::Lost => {
                if matches!(key.code, KeyCode::Char('n' | 'N')) {
                    self.restart();
                }
                return;
            }
            SessionStatus::Won => {
                match key.code {
                    KeyCode::Enter => self.session.continue_after_win(&mut self.feed),
                    KeyCode::Char('n' | 'N') => self.restart(),
                    _ => {}
                }
                return;
            }
            SessionStatus::Playing => {}
        }

        if self.feed.modal.is_some() {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => {
                    self.feed.modal = None;
                    self.session.acknowledge(&mut self.feed);
                }
                KeyCode::Char('x' | 'X') => {
                    self.feed.modal = None;
                    self.session.skip_all(&mut self.feed);
                }
                KeyCode::Char('b' | 'B') => self.buy_from_announcement(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.prev(),
            KeyCode::Char(' ') => {
                self.session.toggle_pause();
                let msg = if self.session.is_paused() { "Paused" } else { "Resumed" };
                self.feed.push_message(msg);
            }
            KeyCode::Char('f' | 'F') => {
                self.session.cycle_speed();
                self.tick_clock = Duration::ZERO;
                let label = self.session.state().speed.label();
                self.feed.push_message(format!("Speed: {label}"));
            }
            KeyCode::Char('c' | 'C') => self.session.cycle_chart(),
            KeyCode::Char('p' | 'P') => {
                if self.session.state().in_mining_pool {
                    let _ = self.session.leave_pool(&mut self.feed);
                } else {
                    let _ = self.session.join_pool(&mut self.feed);
                }
            }
            KeyCode::Char('N') if key.modifiers.contains(KeyModifiers::SHIFT) => self.restart(),
            _ => match self.focus {
                PaneFocus::Fleet => self.handle_fleet_input(key),
                PaneFocus::Shop => self.handle_shop_input(key),
                PaneFocus::Bank => self.handle_bank_input(key),
            },
        }
        self.clamp_selection();
    }

    /// Closes a hardware announcement, buys one unit and leaves the shop
    /// focused on that listing.
    fn buy_from_announcement(&mut self) {
        let Some(Modal::Hardware(listing)) = &self.feed.modal else {
            return;
        };
        let name = listing.name.clone();
        self.feed.modal = None;
        self.session.acknowledge(&mut self.feed);
        let _ = self.session.buy_hardware(&name, &mut self.feed);
        self.focus = PaneFocus::Shop;
        if let Some(index) = self.session.listings().iter().position(|l| l.name == name) {
            self.shop_selected = index;
        }
    }

    fn restart(&mut self) {
        self.feed.modal = None;
        self.session.restart(&mut self.feed);
        self.fleet_selected = 0;
        self.shop_selected = 0;
        self.tick_clock = Duration::ZERO;
    }

    fn handle_fleet_input(&mut self, key: KeyEvent) {
        let fleet = self.session.state().fleet();
        match key.code {
            KeyCode::Up => self.fleet_selected = select_previous(self.fleet_selected, fleet.len()),
            KeyCode::Down => self.fleet_selected = select_next(self.fleet_selected, fleet.len()),
            KeyCode::Char('s') => {
                if let Some(entry) = fleet.get(self.fleet_selected) {
                    let _ = self.session.sell_hardware(&entry.name, 1, &mut self.feed);
                }
            }
            KeyCode::Char('S') => {
                if let Some(entry) = fleet.get(self.fleet_selected) {
                    let _ = self.session.sell_hardware(&entry.name, entry.count, &mut self.feed);
                }
            }
            KeyCode::Char('r' | 'R') => {
                if let Some(entry) = fleet.get(self.fleet_selected) {
                    let _ = self.session.repair_hardware(&entry.name, &mut self.feed);
                }
            }
            _ => {}
        }
    }

    fn handle_shop_input(&mut self, key: KeyEvent) {
        let listings = self.session.listings();
        match key.code {
            KeyCode::Up => self.shop_selected = select_previous(self.shop_selected, listings.len()),
            KeyCode::Down => self.shop_selected = select_next(self.shop_selected, listings.len()),
            KeyCode::Enter => {
                if let Some(listing) = listings.get(self.shop_selected) {
                    let _ = self.session.buy_hardware(&listing.name, &mut self.feed);
                }
            }
            _ => {}
        }
    }

    fn handle_bank_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left => {
                let _ = self.session.sell_coin(COIN_LOT, &mut self.feed);
            }
            KeyCode::Right => {
                let _ = self.session.buy_coin(COIN_LOT, &mut self.feed);
            }
            KeyCode::Char('m' | 'M') => {
                let _ = self.session.sell_coin(COIN_BULK_LOT, &mut self.feed);
            }
            KeyCode::Char('b' | 'B') => {
                let _ = self.session.buy_coin(COIN_BULK_LOT, &mut self.feed);
            }
            KeyCode::Char('a' | 'A') => {
                let coin = self.session.state().coin;
                let _ = self.session.sell_coin(coin, &mut self.feed);
            }
            _ => {}
        }
    }

    fn clamp_selection(&mut self) {
        let fleet = self.session.state().fleet().len();
        let shop = self.session.market().available().len();
        self.fleet_selected = self.fleet_selected.min(fleet.saturating_sub(1));
        self.shop_selected = self.shop_selected.min(shop.saturating_sub(1));
    }
}

fn select_next(selected: usize, len: usize) -> usize {
    if len == 0 { 0 } else { (selected + 1) % len }
}

fn select_previous(selected: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else if selected == 0 {
        len - 1
    } else {
        selected - 1
    }
}

pub fn format_price_delta(delta: f64) -> String {
    if delta.abs() < 0.005 {
        "±0.00".to_string()
    } else if delta >= 0.0 {
        format!("+{:.2}", delta)
    } else {
        format!("{:.2}", delta)
    }
}

pub fn format_hashrate(hashrate: f64) -> String {
    const UNITS: [&str; 7] = ["H/s", "kH/s", "MH/s", "GH/s", "TH/s", "PH/s", "EH/s"];
    let mut value = hashrate;
    let mut idx = 0usize;
    while value >= 1000.0 && idx + 1 < UNITS.len() {
        value /= 1000.0;
        idx += 1;
    }
    format!("{:.2} {}", value, UNITS[idx])
}
