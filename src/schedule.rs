//! The current schedule and its write-through store.
//!
//! A [`Schedule`] is the full set of trigger specs plus the single global
//! ring duration. The [`ScheduleStore`] owns the one current schedule:
//! readers always see a complete old or new value, and every replacement
//! is followed by a best-effort write-back to the settings file.

use crate::config::Settings;
use crate::error::Result;
use crate::trigger::{self, TriggerSpec};
use std::path::PathBuf;
use std::sync::Mutex;

/// The full trigger set plus ring duration.
///
/// `ring_duration == 0` is a valid state: every trigger still fires, but
/// the relay driver treats the ring as a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Ordered trigger specs.
    pub triggers: Vec<TriggerSpec>,
    /// Ring duration in seconds.
    pub ring_duration: u64,
}

impl Schedule {
    /// Build a schedule from persisted trigger lines, silently skipping
    /// malformed entries.
    pub fn from_lines<S: AsRef<str>>(lines: &[S], ring_duration: u64) -> Self {
        Self {
            triggers: trigger::parse_lines(lines),
            ring_duration,
        }
    }

    /// Render the triggers back to persisted line form.
    pub fn to_lines(&self) -> Vec<String> {
        self.triggers.iter().map(TriggerSpec::to_line).collect()
    }
}

/// Owner of the single current [`Schedule`].
pub struct ScheduleStore {
    current: Mutex<Schedule>,
    settings_path: PathBuf,
}

impl ScheduleStore {
    /// Build the store from loaded settings.
    pub fn from_settings(settings: &Settings, settings_path: PathBuf) -> Self {
        let schedule = Schedule::from_lines(&settings.trigger_lines, settings.ring_duration);
        Self {
            current: Mutex::new(schedule),
            settings_path,
        }
    }

    /// Build a store with no backing file (tests, dry runs). Replacements
    /// still swap in memory; persistence becomes a no-op.
    pub fn in_memory(schedule: Schedule) -> Self {
        Self {
            current: Mutex::new(schedule),
            settings_path: PathBuf::new(),
        }
    }

    /// Snapshot of the current schedule.
    pub fn current(&self) -> Schedule {
        self.lock().clone()
    }

    /// Current ring duration in seconds.
    pub fn ring_duration(&self) -> u64 {
        self.lock().ring_duration
    }

    /// Replace the current schedule wholesale and write it through to the
    /// settings file. The in-memory swap always takes effect; a persist
    /// failure is logged and does not roll it back — the next restart
    /// would come up with the last successfully persisted schedule.
    pub fn replace(&self, schedule: Schedule) {
        *self.lock() = schedule.clone();
        self.write_back(&schedule);
    }

    /// Replace only the trigger set, keeping the ring duration that is
    /// current at swap time. The read and the swap happen under one lock
    /// acquisition, so a concurrent duration update is never reverted.
    pub fn replace_triggers(&self, triggers: Vec<TriggerSpec>) {
        let snapshot = {
            let mut current = self.lock();
            current.triggers = triggers;
            current.clone()
        };
        self.write_back(&snapshot);
    }

    /// Replace only the ring duration, keeping the trigger set that is
    /// current at swap time.
    pub fn replace_duration(&self, ring_duration: u64) {
        let snapshot = {
            let mut current = self.lock();
            current.ring_duration = ring_duration;
            current.clone()
        };
        self.write_back(&snapshot);
    }

    fn write_back(&self, schedule: &Schedule) {
        if let Err(e) = self.persist(&schedule.to_lines(), schedule.ring_duration) {
            tracing::error!(error = %e, "cannot persist schedule; running schedule differs from disk");
        }
    }

    fn persist(&self, lines: &[String], ring_duration: u64) -> Result<()> {
        if self.settings_path.as_os_str().is_empty() {
            return Ok(());
        }
        Settings::persist_schedule(&self.settings_path, lines, ring_duration)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Schedule> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
