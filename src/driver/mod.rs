//! The registration decision state machine.
//!
//! `decide` is a pure function of the clock, the persisted configuration and
//! one page snapshot. All side effects -- invoking a control, incrementing
//! the attempt ledger, reloading the page -- are carried out by the watch
//! engine according to the returned decision, so every transition here is
//! unit-testable without a page or a database.

use chrono::{DateTime, Utc};

use crate::page::{Control, PageSnapshot};

/// Driver states, as observed from the outside. The `Display` strings are
/// what the status log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Before the target instant.
    Waiting,
    /// Target reached, cycle in progress (ends in a reload).
    Evaluating,
    /// Registered already, or an action was taken.
    Done,
    /// Attempt budget consumed; nothing runs until the schedule changes.
    Exhausted,
    /// No schedule or unparseable schedule; permanently idle until one is
    /// saved.
    ScheduledInvalid,
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverState::Waiting => write!(f, "waiting"),
            DriverState::Evaluating => write!(f, "evaluating"),
            DriverState::Done => write!(f, "done"),
            DriverState::Exhausted => write!(f, "exhausted"),
            DriverState::ScheduledInvalid => write!(f, "schedule-invalid"),
        }
    }
}

/// Which fallback tier produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTier {
    Primary,
    Waitlist,
}

impl std::fmt::Display for ActionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionTier::Primary => write!(f, "primary"),
            ActionTier::Waitlist => write!(f, "waitlist"),
        }
    }
}

/// Outcome of one decision cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No valid target instant exists. Terminal until the schedule changes.
    InvalidSchedule,
    /// The target instant is still ahead; arm the timer for it.
    Wait { until: DateTime<Utc> },
    /// The attempt budget is consumed. Terminal until the schedule changes.
    Exhausted,
    /// An unregister control is visible; registration already succeeded.
    AlreadyRegistered,
    /// Invoke this control, then end the cycle. The outcome is observed
    /// after the resulting navigation, never from the submission itself.
    Invoke { tier: ActionTier, control: Control },
    /// No listed session has any available action: persist one more failed
    /// cycle and reload for fresh page state.
    Retry,
}

impl Decision {
    pub fn state(&self) -> DriverState {
        match self {
            Decision::InvalidSchedule => DriverState::ScheduledInvalid,
            Decision::Wait { .. } => DriverState::Waiting,
            Decision::Exhausted => DriverState::Exhausted,
            Decision::AlreadyRegistered | Decision::Invoke { .. } => DriverState::Done,
            Decision::Retry => DriverState::Evaluating,
        }
    }
}

/// Run one decision cycle.
///
/// Guard order is load-bearing: the time gate comes before any page
/// inspection, so nothing is ever evaluated -- let alone invoked -- before
/// the configured instant. `now == target` evaluates.
pub fn decide(
    now: DateTime<Utc>,
    target: Option<DateTime<Utc>>,
    attempt_count: u32,
    max_attempts: u32,
    priority: &[String],
    page: &PageSnapshot,
) -> Decision {
    let Some(target) = target else {
        return Decision::InvalidSchedule;
    };
    if now < target {
        return Decision::Wait { until: target };
    }
    if attempt_count >= max_attempts {
        return Decision::Exhausted;
    }
    if page.is_already_registered() {
        return Decision::AlreadyRegistered;
    }

    let candidates = dedup_first(priority);

    // Two full passes: every primary candidate outranks any waitlist
    // candidate, regardless of list position.
    for id in &candidates {
        if let Some(control) = page.primary_action(id.as_str()) {
            return Decision::Invoke {
                tier: ActionTier::Primary,
                control: control.clone(),
            };
        }
    }
    for id in &candidates {
        if let Some(control) = page.waitlist_action(id.as_str()) {
            return Decision::Invoke {
                tier: ActionTier::Waitlist,
                control: control.clone(),
            };
        }
    }

    Decision::Retry
}

/// Collapse duplicates to their first occurrence, preserving order.
fn dedup_first(priority: &[String]) -> Vec<&String> {
    let mut seen = Vec::new();
    for id in priority {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}
