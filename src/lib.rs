//! Chime: web-controlled relay bell scheduler.
//!
//! Drives a single relay (e.g. a school bell on a Raspberry Pi GPIO pin)
//! at recurring times of day, on a configurable subset of weekdays, for a
//! configurable ring duration.
//!
//! # Architecture
//!
//! - **Trigger codec**: translates between the persisted 5-field cron
//!   lines, the internal [`trigger::TriggerSpec`], and the wire form the
//!   control UI exchanges.
//! - **Schedule store**: owns the one current schedule (trigger set +
//!   ring duration) and writes every replacement through to the settings
//!   file.
//! - **Relay driver**: the physical output; one `ring` operation with a
//!   global actuation lock.
//! - **Bell engine**: arms one tokio task per trigger and hot-reloads the
//!   whole armed set atomically when the schedule changes.
//! - **Control API**: authenticated axum routes the web UI talks to.

pub mod config;
pub mod engine;
pub mod error;
pub mod relay;
pub mod schedule;
pub mod server;
pub mod trigger;

pub use config::Settings;
pub use engine::BellEngine;
pub use error::{BellError, Result};
pub use relay::Relay;
pub use schedule::{Schedule, ScheduleStore};
pub use trigger::{DayGroup, TriggerSpec, WireTrigger};
