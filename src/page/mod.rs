//! Page state -- snapshot model, inspector queries, and the page port.
//!
//! A `PageSnapshot` is an immutable model of the rendered course page at one
//! load. All inspector queries are pure reads over it; the only side effect
//! in this module tree is `PagePort::invoke`, which submits a registration
//! form. Outcome is never taken from the submission response -- the next
//! `load` re-observes the page, the same way a post-submit navigation would
//! land the user on a refreshed view.

pub mod annotate;
pub mod http;
pub mod parse;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("page fetch failed: {0}")]
    Fetch(String),
    #[error("page parse failed: {0}")]
    Parse(String),
    #[error("control no longer present for session {0}")]
    ControlUnavailable(String),
}

/// What a scraped submit control does when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// The main "register" control for a session.
    Primary,
    /// The fallback "join waitlist" control.
    Waitlist,
    /// An unregister control; its presence means registration already
    /// succeeded.
    Unregister,
}

/// A submittable control scraped off the page: form target plus the fields
/// the submission carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub kind: ControlKind,
    pub session: String,
    /// Form action, possibly relative to the page URL.
    pub action: String,
    pub fields: Vec<(String, String)>,
    pub enabled: bool,
    pub label: String,
}

/// One registerable session row on the page.
#[derive(Debug, Clone, Default)]
pub struct SessionRow {
    pub id: String,
    pub primary: Option<Control>,
    pub waitlist: Option<Control>,
}

/// Immutable model of the course page at one load.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub course: String,
    pub rows: Vec<SessionRow>,
    pub unregister_present: bool,
}

impl PageSnapshot {
    /// True if an unregister-style control is present on the page.
    pub fn is_already_registered(&self) -> bool {
        self.unregister_present
    }

    /// Session identifiers in page order.
    pub fn session_ids(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.id.clone()).collect()
    }

    fn row(&self, session_id: &str) -> Option<&SessionRow> {
        self.rows.iter().find(|r| r.id == session_id)
    }

    /// The enabled primary-registration control for a session, if any.
    /// Missing row, missing control and disabled control are all `None`.
    pub fn primary_action(&self, session_id: &str) -> Option<&Control> {
        self.row(session_id)
            .and_then(|r| r.primary.as_ref())
            .filter(|c| c.enabled)
    }

    /// The enabled waitlist-join control for a session, if any.
    pub fn waitlist_action(&self, session_id: &str) -> Option<&Control> {
        self.row(session_id)
            .and_then(|r| r.waitlist.as_ref())
            .filter(|c| c.enabled)
    }
}

/// Where page state comes from and where registration actions go.
#[async_trait]
pub trait PagePort: Send + Sync {
    /// Fetch and parse the current page. Every call models a fresh page
    /// load, so this doubles as the full-page-reload primitive.
    async fn load(&self) -> Result<PageSnapshot, PageError>;

    /// Submit a registration control. No return value is relied upon; the
    /// subsequent `load` is how the outcome gets observed.
    async fn invoke(&self, control: &Control) -> Result<(), PageError>;
}
