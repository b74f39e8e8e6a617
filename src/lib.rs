//! Seatsniper -- time-triggered auto-registration for time-gated course
//! sign-up pages.
//!
//! This crate provides the core library: target-time scheduling, the
//! bounded-retry registration state machine, page scraping, persistent
//! per-course configuration, and the read-only status API.

pub mod api;
pub mod config;
pub mod driver;
pub mod page;
pub mod scheduler;
pub mod status;
pub mod storage;

use std::time::Duration;

use anyhow::Result;

use crate::config::SniperConfig;
use crate::page::http::HttpPage;
use crate::scheduler::EngineOptions;
use crate::status::StatusLog;
use crate::storage::store::ConfigStore;

/// Start the watch daemon for one course page: scrape, arm, retry until
/// settled, then hold for configuration edits and go again. Runs until the
/// process is terminated.
pub async fn watch(
    url: &str,
    course_override: Option<String>,
    status_bind: Option<String>,
    cfg: &SniperConfig,
) -> Result<()> {
    tracing::info!(db_path = %cfg.storage.db_path, "initializing database");
    let pool = storage::open_pool(&cfg.storage.db_path)?;
    let store = ConfigStore::new(pool.clone());
    let status = StatusLog::new(pool);

    let port = HttpPage::new(
        url,
        &cfg.page.user_agent,
        cfg.page.timeout_secs,
        course_override,
    )?;

    if let Some(bind) = status_bind {
        let state = api::AppState {
            store: store.clone(),
            status: status.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = api::serve(&bind, state).await {
                tracing::error!(error = %e, "status API failed");
            }
        });
    }

    let opts = EngineOptions {
        reload_delay: Duration::from_millis(cfg.page.reload_delay_ms),
        poll_interval: Duration::from_secs(cfg.page.poll_interval_secs),
        default_max_attempts: cfg.registration.max_attempts,
    };

    loop {
        let settled = scheduler::watch_course(&port, &store, &status, &opts).await?;
        tracing::info!(
            course = %settled.course,
            outcome = ?settled.outcome,
            "watch settled; holding until the schedule or priority list changes"
        );
        scheduler::wait_for_config_edit(&store, &settled.course, opts.poll_interval).await?;
    }
}
