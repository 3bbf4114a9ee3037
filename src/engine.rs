//! The bell scheduling engine.
//!
//! Owns the live set of armed trigger jobs. Each armed job is one spawned
//! tokio task that sleeps until its trigger's next wall-clock instant,
//! dispatches a ring on an independent task, and re-arms for the next
//! matching day. Hot reload atomically replaces one generation of armed
//! jobs with the next under a single engine lock.

use crate::relay::Relay;
use crate::schedule::{Schedule, ScheduleStore};
use crate::trigger::TriggerSpec;
use chrono::{DateTime, Datelike, Local, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No armed jobs; nothing fires.
    Stopped,
    /// One generation of armed jobs is live.
    Armed,
}

/// One trigger bound to a running timer task.
struct ArmedJob {
    spec: TriggerSpec,
    handle: JoinHandle<()>,
}

struct Inner {
    jobs: Vec<ArmedJob>,
    generation: u64,
    state: EngineState,
}

/// The scheduling engine.
///
/// Constructed once at process start and shared with the control surface
/// via `Arc`. All mutation goes through one async lock, so concurrent
/// reload requests serialize: each completes in full, and the last to
/// acquire the lock determines the final armed generation.
pub struct BellEngine {
    store: Arc<ScheduleStore>,
    relay: Arc<Relay>,
    inner: Mutex<Inner>,
}

impl BellEngine {
    /// Build a stopped engine over the given store and relay.
    pub fn new(store: Arc<ScheduleStore>, relay: Arc<Relay>) -> Self {
        Self {
            store,
            relay,
            inner: Mutex::new(Inner {
                jobs: Vec::new(),
                generation: 0,
                state: EngineState::Stopped,
            }),
        }
    }

    /// Arm the current schedule. Transitions STOPPED → ARMED.
    pub async fn start(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == EngineState::Armed {
            tracing::warn!("engine already armed; ignoring start");
            return;
        }
        self.arm(&mut inner);
    }

    /// Hot-reload: discard every armed job of the current generation and
    /// arm a fresh set from the store's current schedule.
    ///
    /// The engine lock is held across the whole stop/re-arm sequence, so
    /// at most one reload is in flight and no job of the old generation
    /// can fire once its handle is gone. A ring already in progress runs
    /// on a detached task and completes regardless.
    pub async fn reload(&self) {
        let mut inner = self.inner.lock().await;
        Self::disarm(&mut inner).await;
        self.arm(&mut inner);
    }

    /// Discard all armed jobs. Transitions ARMED → STOPPED.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        Self::disarm(&mut inner).await;
        inner.state = EngineState::Stopped;
        tracing::info!(generation = inner.generation, "engine stopped");
    }

    /// Number of currently armed jobs.
    pub async fn armed_len(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    /// Generation counter; bumps on every arm/reload cycle.
    pub async fn generation(&self) -> u64 {
        self.inner.lock().await.generation
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> EngineState {
        self.inner.lock().await.state
    }

    /// Hour/minute/day of each armed job, for logs and tests.
    pub async fn armed_specs(&self) -> Vec<TriggerSpec> {
        self.inner.lock().await.jobs.iter().map(|j| j.spec).collect()
    }

    fn arm(&self, inner: &mut Inner) {
        // The schedule is read once here, not per fire: a job always rings
        // with the duration that was current when its generation was armed.
        let schedule = self.store.current();
        inner.generation += 1;

        for spec in &schedule.triggers {
            inner.jobs.push(self.arm_one(*spec, &schedule));
        }
        inner.state = EngineState::Armed;

        tracing::info!(
            generation = inner.generation,
            jobs = inner.jobs.len(),
            ring_duration = schedule.ring_duration,
            "schedule armed"
        );
    }

    fn arm_one(&self, spec: TriggerSpec, schedule: &Schedule) -> ArmedJob {
        let relay = Arc::clone(&self.relay);
        let duration = schedule.ring_duration;

        let handle = tokio::spawn(async move {
            loop {
                let now = Local::now();
                let Some(at) = next_fire(now, &spec) else {
                    // Cannot happen for a valid spec; bail rather than spin.
                    tracing::error!(trigger = %spec.describe(), "no next fire instant");
                    return;
                };
                let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;

                // Dispatch on an independent task so a long ring never
                // delays this job's own timekeeping or other triggers.
                let relay = Arc::clone(&relay);
                let label = spec.describe();
                tokio::spawn(async move {
                    relay.ring(&label, duration).await;
                });

                // Step past the fire instant so the recomputation above
                // lands on the next matching day, not this one again.
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        });

        ArmedJob { spec, handle }
    }

    /// Abort every armed job and wait for each task to terminate, so no
    /// old-generation trigger can fire after this returns.
    async fn disarm(inner: &mut Inner) {
        for job in inner.jobs.drain(..) {
            job.handle.abort();
            let _ = job.handle.await;
            tracing::debug!(trigger = %job.spec.describe(), "armed job removed");
        }
    }
}

/// Next wall-clock instant strictly after `after` where the trigger's
/// `(hour, minute, second = 0)` and weekday group match.
///
/// DST gaps that swallow the trigger time skip that day.
pub fn next_fire<Tz: TimeZone>(after: DateTime<Tz>, spec: &TriggerSpec) -> Option<DateTime<Tz>> {
    let tz = after.timezone();
    for day_offset in 0..=7u64 {
        let date = after.date_naive() + chrono::Days::new(day_offset);
        if !spec.days.matches(date.weekday()) {
            continue;
        }
        let Some(naive) = date.and_hms_opt(u32::from(spec.hour), u32::from(spec.minute), 0) else {
            continue;
        };
        let Some(at) = tz.from_local_datetime(&naive).earliest() else {
            continue;
        };
        if at > after {
            return Some(at);
        }
    }
    None
}
