//! End-to-end watch engine scenarios against an in-memory page port.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;

use seatsniper::page::{Control, ControlKind, PageError, PagePort, PageSnapshot, SessionRow};
use seatsniper::scheduler::{watch_course, EngineOptions, TargetSchedule, WatchOutcome};
use seatsniper::status::StatusLog;
use seatsniper::storage::ledger::AttemptLedger;
use seatsniper::storage::open_pool;
use seatsniper::storage::store::ConfigStore;

const COURSE: &str = "Advanced Software Engineering";

struct FakeState {
    current: PageSnapshot,
    /// Snapshot the page flips to after the first invoke (models the
    /// server accepting the registration).
    after_invoke: Option<PageSnapshot>,
    loads: usize,
    invoked: Vec<String>,
}

struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    fn new(current: PageSnapshot) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                current,
                after_invoke: None,
                loads: 0,
                invoked: Vec::new(),
            }),
        })
    }

    fn with_flip(current: PageSnapshot, after_invoke: PageSnapshot) -> Arc<Self> {
        let page = Self::new(current);
        page.state.lock().unwrap().after_invoke = Some(after_invoke);
        page
    }

    fn loads(&self) -> usize {
        self.state.lock().unwrap().loads
    }

    fn invoked(&self) -> Vec<String> {
        self.state.lock().unwrap().invoked.clone()
    }
}

#[async_trait]
impl PagePort for FakePage {
    async fn load(&self) -> Result<PageSnapshot, PageError> {
        let mut state = self.state.lock().unwrap();
        state.loads += 1;
        Ok(state.current.clone())
    }

    async fn invoke(&self, control: &Control) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.invoked.push(control.session.clone());
        if let Some(next) = state.after_invoke.take() {
            state.current = next;
        }
        Ok(())
    }
}

fn control(session: &str, kind: ControlKind) -> Control {
    Control {
        kind,
        session: session.to_string(),
        action: format!("register?sid={session}"),
        fields: vec![("sid".to_string(), session.to_string())],
        enabled: true,
        label: "anmelden".to_string(),
    }
}

fn open_row(id: &str) -> SessionRow {
    SessionRow {
        id: id.to_string(),
        primary: Some(control(id, ControlKind::Primary)),
        waitlist: None,
    }
}

fn closed_row(id: &str) -> SessionRow {
    SessionRow {
        id: id.to_string(),
        primary: None,
        waitlist: None,
    }
}

fn page(rows: Vec<SessionRow>, registered: bool) -> PageSnapshot {
    PageSnapshot {
        course: COURSE.to_string(),
        rows,
        unregister_present: registered,
    }
}

fn past_schedule() -> TargetSchedule {
    let t = Local::now() - chrono::Duration::hours(1);
    TargetSchedule {
        date: t.format("%Y-%m-%d").to_string(),
        time: t.format("%H:%M:%S").to_string(),
        millis: None,
    }
}

fn future_schedule(secs: i64) -> TargetSchedule {
    let t = Local::now() + chrono::Duration::seconds(secs);
    TargetSchedule {
        date: t.format("%Y-%m-%d").to_string(),
        time: t.format("%H:%M:%S%.3f").to_string(),
        millis: None,
    }
}

fn fixture(dir: &tempfile::TempDir) -> (ConfigStore, StatusLog) {
    let pool = open_pool(dir.path().join("watch.db").to_str().unwrap()).unwrap();
    (ConfigStore::new(pool.clone()), StatusLog::new(pool))
}

fn fast_opts() -> EngineOptions {
    EngineOptions {
        reload_delay: Duration::ZERO,
        poll_interval: Duration::from_secs(60),
        default_max_attempts: 10,
    }
}

#[tokio::test]
async fn test_empty_priority_list_exhausts_budget() {
    let dir = tempfile::tempdir().unwrap();
    let (store, status) = fixture(&dir);
    store.set_schedule(COURSE, &past_schedule()).unwrap();
    store.set_max_attempts(COURSE, 3).unwrap();

    let port = FakePage::new(page(vec![open_row("5471")], false));

    let settled = watch_course(&*port, &store, &status, &fast_opts())
        .await
        .unwrap();

    assert_eq!(settled.outcome, WatchOutcome::Exhausted);
    assert_eq!(settled.course, COURSE);
    // Three failed cycles, then the exhausted check fires on the fourth load.
    assert!(port.invoked().is_empty());
    assert_eq!(port.loads(), 4);
    let ledger = AttemptLedger::new(store.pool().clone(), COURSE);
    assert_eq!(ledger.get().unwrap(), 3);

    // The terminal entry is user-visible.
    let entries = status.recent(Some(COURSE), 5).unwrap();
    assert!(entries[0].message.contains("stopped"));
}

#[tokio::test]
async fn test_invoke_then_observe_registration() {
    let dir = tempfile::tempdir().unwrap();
    let (store, status) = fixture(&dir);
    store.set_schedule(COURSE, &past_schedule()).unwrap();
    store
        .set_priority_list(COURSE, &["5471".to_string()])
        .unwrap();

    let port = FakePage::with_flip(
        page(vec![open_row("5471")], false),
        page(vec![closed_row("5471")], true),
    );

    let settled = watch_course(&*port, &store, &status, &fast_opts())
        .await
        .unwrap();

    assert_eq!(settled.outcome, WatchOutcome::Registered);
    assert_eq!(port.invoked(), vec!["5471"]);
    // Invoking consumed no budget.
    let ledger = AttemptLedger::new(store.pool().clone(), COURSE);
    assert_eq!(ledger.get().unwrap(), 0);
}

#[tokio::test]
async fn test_already_registered_takes_no_action() {
    let dir = tempfile::tempdir().unwrap();
    let (store, status) = fixture(&dir);
    store.set_schedule(COURSE, &past_schedule()).unwrap();
    store
        .set_priority_list(COURSE, &["5471".to_string()])
        .unwrap();

    let port = FakePage::new(page(vec![open_row("5471")], true));

    let settled = watch_course(&*port, &store, &status, &fast_opts())
        .await
        .unwrap();

    assert_eq!(settled.outcome, WatchOutcome::Registered);
    assert!(port.invoked().is_empty());
    assert_eq!(port.loads(), 1);
}

#[tokio::test]
async fn test_missing_schedule_settles_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let (store, status) = fixture(&dir);

    let port = FakePage::new(page(vec![open_row("5471")], false));

    let settled = watch_course(&*port, &store, &status, &fast_opts())
        .await
        .unwrap();

    assert_eq!(settled.outcome, WatchOutcome::InvalidSchedule);
    assert!(port.invoked().is_empty());
}

#[tokio::test]
async fn test_scraped_sessions_are_merged_into_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let (store, status) = fixture(&dir);

    let port = FakePage::new(page(vec![open_row("5471"), closed_row("5650")], false));

    let _ = watch_course(&*port, &store, &status, &fast_opts())
        .await
        .unwrap();

    assert_eq!(store.sessions(COURSE).unwrap(), vec!["5471", "5650"]);
}

#[tokio::test]
async fn test_schedule_edit_while_waiting_rearms_and_fires() {
    let dir = tempfile::tempdir().unwrap();
    let (store, status) = fixture(&dir);
    // Far enough out that the timer cannot fire during the test.
    store.set_schedule(COURSE, &future_schedule(3600)).unwrap();
    store.set_max_attempts(COURSE, 1).unwrap();

    let port = FakePage::new(page(vec![closed_row("5471")], false));
    let engine_port = port.clone();
    let engine_store = store.clone();
    let engine_status = status.clone();

    let handle = tokio::spawn(async move {
        watch_course(&*engine_port, &engine_store, &engine_status, &fast_opts()).await
    });

    // Let the engine reach the waiting state, then move the target into the
    // past. The stale timer must be discarded in favour of the new target.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());
    store.set_schedule(COURSE, &past_schedule()).unwrap();

    let settled = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("engine settled after the edit")
        .unwrap()
        .unwrap();

    assert_eq!(settled.outcome, WatchOutcome::Exhausted);
    assert!(port.invoked().is_empty());
}
