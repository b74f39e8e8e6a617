//! The watch engine.
//!
//! Drives page lifetimes for one course: load a fresh snapshot, run decision
//! cycles against it, and either act, reload, or settle. Each outer
//! iteration is a full page reload -- everything restarts against fresh
//! state and only the persisted ledger crosses the boundary.

use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::driver::{decide, Decision, DriverState};
use crate::page::PagePort;
use crate::scheduler::timer::TargetTimer;
use crate::status::StatusLog;
use crate::storage::ledger::AttemptLedger;
use crate::storage::store::{ConfigStore, StoreKey};
use crate::storage::StoreError;

/// Terminal settlements of one watch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// An unregister control was observed: registration succeeded (or had
    /// already succeeded before we looked).
    Registered,
    /// The attempt budget is consumed; stopped until the user edits config.
    Exhausted,
    /// No (valid) schedule is stored for this course.
    InvalidSchedule,
}

/// One settled watch run and the course key it ran against (scraped off the
/// page, so the caller learns it here).
#[derive(Debug, Clone)]
pub struct Settled {
    pub outcome: WatchOutcome,
    pub course: String,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Pause before the reload that follows a failed cycle.
    pub reload_delay: Duration,
    /// How often to re-read storage while waiting, so edits made by another
    /// process (the CLI) are picked up without an in-process notification.
    pub poll_interval: Duration,
    /// Budget used for courses without a stored override.
    pub default_max_attempts: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            reload_delay: Duration::from_millis(250),
            poll_interval: Duration::from_secs(2),
            default_max_attempts: crate::storage::store::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

struct CourseState {
    target: Option<DateTime<Utc>>,
    attempts: u32,
    max_attempts: u32,
    priority: Vec<String>,
}

fn read_course_state(
    store: &ConfigStore,
    ledger: &AttemptLedger,
    course: &str,
    default_max_attempts: u32,
) -> Result<CourseState, StoreError> {
    let target = match store.schedule(course)? {
        Some(schedule) => match schedule.resolve() {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(course = %course, error = %e, "stored schedule is invalid");
                None
            }
        },
        None => None,
    };
    Ok(CourseState {
        target,
        attempts: ledger.get()?,
        max_attempts: ledger
            .max_attempts_override()?
            .unwrap_or(default_max_attempts),
        priority: store.priority_list(course)?,
    })
}

/// Drive page lifetimes until the machine settles. The first decision cycle
/// of every lifetime runs immediately on load, so a target that elapsed
/// while the process was down is caught without waiting for any timer.
pub async fn watch_course(
    port: &dyn PagePort,
    store: &ConfigStore,
    status: &StatusLog,
    opts: &EngineOptions,
) -> Result<Settled> {
    let run_id = Uuid::new_v4();
    let mut changes = store.subscribe();
    let mut timer = TargetTimer::new();
    let mut announced_target: Option<DateTime<Utc>> = None;

    info!(run = %run_id, "watch run starting");

    'lifetime: loop {
        timer.cancel();

        let page = match port.load().await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "page load failed; will reload");
                tokio::time::sleep(opts.reload_delay).await;
                continue 'lifetime;
            }
        };
        let course = page.course.clone();
        if let Err(e) = store.merge_sessions(&course, &page.session_ids()) {
            // Inventory is advisory; the cycle goes on without it.
            warn!(course = %course, error = %e, "session inventory merge failed");
        }
        let ledger = AttemptLedger::new(store.pool().clone(), course.clone());

        'cycle: loop {
            let state = match read_course_state(store, &ledger, &course, opts.default_max_attempts)
            {
                Ok(state) => state,
                Err(e) => {
                    // Abort the cycle without touching anything; the reload
                    // retries against a fresh connection.
                    warn!(course = %course, error = %e, "storage read failed; cycle aborted");
                    tokio::time::sleep(opts.reload_delay).await;
                    continue 'lifetime;
                }
            };

            let now = Utc::now();
            let decision = decide(
                now,
                state.target,
                state.attempts,
                state.max_attempts,
                &state.priority,
                &page,
            );
            let driver_state = decision.state().to_string();

            match decision {
                Decision::InvalidSchedule => {
                    status.record(
                        &course,
                        Some(run_id),
                        &driver_state,
                        "no valid schedule stored; idle until one is saved",
                    );
                    return Ok(Settled {
                        outcome: WatchOutcome::InvalidSchedule,
                        course,
                    });
                }

                Decision::Wait { until } => {
                    if timer.target() != Some(until) {
                        timer.arm(now, until);
                    }
                    if announced_target != Some(until) {
                        announced_target = Some(until);
                        status.record(
                            &course,
                            Some(run_id),
                            &driver_state,
                            &format!("armed for {until}"),
                        );
                    }
                    tokio::select! {
                        fired = timer.fired() => {
                            info!(course = %course, target = %fired, "timer fired");
                            continue 'cycle;
                        }
                        change = changes.recv() => match change {
                            Ok(change)
                                if change.course == course
                                    && matches!(
                                        change.key,
                                        StoreKey::Schedule
                                            | StoreKey::PriorityList
                                            | StoreKey::Attempts
                                    ) =>
                            {
                                // Stale timer: the write invalidates it; a
                                // fresh lifetime re-reads and re-arms.
                                info!(course = %course, key = ?change.key, "configuration changed while waiting");
                                continue 'lifetime;
                            }
                            Ok(_) => continue 'cycle,
                            Err(RecvError::Lagged(_)) => continue 'lifetime,
                            Err(RecvError::Closed) => bail!("config store change channel closed"),
                        },
                        _ = tokio::time::sleep(opts.poll_interval) => {
                            // Cross-process edits carry no notification;
                            // re-reading is how we spot them.
                            continue 'cycle;
                        }
                    }
                }

                Decision::Exhausted => {
                    status.record(
                        &course,
                        Some(run_id),
                        &driver_state,
                        &format!(
                            "stopped: attempt budget exhausted ({}/{})",
                            state.attempts, state.max_attempts
                        ),
                    );
                    return Ok(Settled {
                        outcome: WatchOutcome::Exhausted,
                        course,
                    });
                }

                Decision::AlreadyRegistered => {
                    status.record(
                        &course,
                        Some(run_id),
                        &driver_state,
                        "already registered; nothing to do",
                    );
                    return Ok(Settled {
                        outcome: WatchOutcome::Registered,
                        course,
                    });
                }

                Decision::Invoke { tier, control } => {
                    status.record(
                        &course,
                        Some(run_id),
                        &driver_state,
                        &format!("invoking {tier} action for session {}", control.session),
                    );
                    if let Err(e) = port.invoke(&control).await {
                        // Not fatal: the control may have vanished between
                        // observation and submission. Fresh state decides.
                        warn!(course = %course, session = %control.session, error = %e, "invoke failed");
                        status.record(
                            &course,
                            Some(run_id),
                            &DriverState::Evaluating.to_string(),
                            &format!("invoke failed for session {}: {e}", control.session),
                        );
                    }
                    // The submission navigates; observe the outcome on the
                    // next load.
                    tokio::time::sleep(opts.reload_delay).await;
                    continue 'lifetime;
                }

                Decision::Retry => {
                    match ledger.increment() {
                        Ok(count) => {
                            status.record(
                                &course,
                                Some(run_id),
                                &driver_state,
                                &format!(
                                    "no action available; reload ({count}/{})",
                                    state.max_attempts
                                ),
                            );
                        }
                        Err(e) => {
                            // Count not durable: skip the increment rather
                            // than guessing, and retry the whole cycle.
                            warn!(course = %course, error = %e, "attempt persist failed");
                        }
                    }
                    tokio::time::sleep(opts.reload_delay).await;
                    continue 'lifetime;
                }
            }
        }
    }
}

/// Block until the user edits the schedule or priority list for `course`.
/// Terminal states call this before another watch run is allowed.
pub async fn wait_for_config_edit(
    store: &ConfigStore,
    course: &str,
    poll_interval: Duration,
) -> Result<()> {
    let mut changes = store.subscribe();
    let baseline = (store.schedule(course)?, store.priority_list(course)?);

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(change)
                    if change.course == course
                        && matches!(change.key, StoreKey::Schedule | StoreKey::PriorityList) =>
                {
                    return Ok(());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => return Ok(()),
                Err(RecvError::Closed) => bail!("config store change channel closed"),
            },
            _ = tokio::time::sleep(poll_interval) => {
                let current = (store.schedule(course)?, store.priority_list(course)?);
                if current != baseline {
                    return Ok(());
                }
            }
        }
    }
}
