//! Zephyr: the state and derivation core of a single-user project manager.
//!
//! Tasks and projects, a lightweight CRM (customers, deals, interactions), a
//! pomodoro focus timer, a completion-streak tracker, and an on-demand
//! standup report, all persisted through a pluggable key-value JSON store.
//! Due dates are opportunistically mirrored into an external calendar.
//!
//! [`Session`] wires everything together; the individual stores and
//! derivation functions are usable on their own.

pub mod calendar;
pub mod pomodoro;
pub mod samples;
pub mod services;
pub mod standup;
pub mod state;
pub mod storage;
pub mod streak;
pub mod types;
pub mod util;

pub use state::{load_config, Config, Session};
