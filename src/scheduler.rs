//! Pause gate for the tick driver.
//!
//! Two FIFO queues hold the prompts waiting for the player: crossed historical
//! events and newly released hardware. Ticking is suspended while either queue
//! has an entry or the player paused explicitly. Events are always presented
//! before hardware notices.

use std::collections::VecDeque;

use tracing::debug;

use crate::data::HistoricalEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Running,
    PausedForEvent,
    PausedForNotification,
    PausedByUser,
}

/// The entry currently waiting for acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prompt<'a> {
    Event(&'a HistoricalEvent),
    Hardware(&'a str),
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    state: SchedulerState,
    events: VecDeque<HistoricalEvent>,
    hardware: VecDeque<String>,
    user_paused: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// True only in `Running`: no prompt queued and no user pause.
    pub fn can_tick(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn is_user_paused(&self) -> bool {
        self.user_paused
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn pending_hardware(&self) -> usize {
        self.hardware.len()
    }

    pub fn enqueue_events<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = HistoricalEvent>,
    {
        let before = self.events.len();
        self.events.extend(events);
        if self.events.len() > before {
            debug!(queued = self.events.len() - before, "events queued");
        }
        self.transition();
    }

    pub fn enqueue_hardware<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.hardware.len();
        self.hardware.extend(names);
        if self.hardware.len() > before {
            debug!(queued = self.hardware.len() - before, "hardware notices queued");
        }
        self.transition();
    }

    pub fn current(&self) -> Option<Prompt<'_>> {
        if let Some(event) = self.events.front() {
            return Some(Prompt::Event(event));
        }
        self.hardware.front().map(|name| Prompt::Hardware(name.as_str()))
    }

    /// Pops the front event. Returns it, or `None` when no event was waiting.
    pub fn acknowledge_event(&mut self) -> Option<HistoricalEvent> {
        let event = self.events.pop_front();
        self.transition();
        event
    }

    pub fn acknowledge_hardware(&mut self) -> Option<String> {
        let name = self.hardware.pop_front();
        self.transition();
        name
    }

    /// Acknowledges whatever prompt is in front.
    pub fn acknowledge(&mut self) -> bool {
        if !self.events.is_empty() {
            self.acknowledge_event().is_some()
        } else {
            self.acknowledge_hardware().is_some()
        }
    }

    /// Drains the event queue. Returns how many prompts were dropped.
    pub fn skip_all_events(&mut self) -> usize {
        let dropped = self.events.len();
        self.events.clear();
        self.transition();
        dropped
    }

    pub fn skip_all_hardware(&mut self) -> usize {
        let dropped = self.hardware.len();
        self.hardware.clear();
        self.transition();
        dropped
    }

    pub fn pause_by_user(&mut self) {
        self.user_paused = true;
        self.transition();
    }

    pub fn resume(&mut self) {
        self.user_paused = false;
        self.transition();
    }

    /// Drops every prompt and the user pause.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn transition(&mut self) {
        let next = if !self.events.is_empty() {
            SchedulerState::PausedForEvent
        } else if !self.hardware.is_empty() {
            SchedulerState::PausedForNotification
        } else if self.user_paused {
            SchedulerState::PausedByUser
        } else {
            SchedulerState::Running
        };
        if next != self.state {
            debug!(from = ?self.state, to = ?next, "scheduler transition");
            self.state = next;
        }
    }
}
