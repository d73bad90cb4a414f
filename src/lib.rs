//! Hashtycoon - a mining tycoon replaying Bitcoin history day by day.
//!
//! The library holds the whole simulation: reference data, interpolation,
//! the time-advancement engine, the prompt scheduler, transactions,
//! persistence and the session context. The terminal front-end lives in the
//! binary.

pub mod constants;
pub mod data;
pub mod engine;
pub mod error;
pub mod interpolation;
pub mod market;
pub mod save;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod transactions;

#[cfg(test)]
pub(crate) mod test_support;
