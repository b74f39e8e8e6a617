//! HTTP-backed page port.
//!
//! Loads the course page with a plain GET and submits registration controls
//! as form POSTs against the scraped form action. Cookies ride along so an
//! existing browser-exported session keeps working across the reload loop.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use super::{parse::parse_page, Control, PageError, PagePort, PageSnapshot};

pub struct HttpPage {
    client: Client,
    url: Url,
    /// Overrides the scraped course key when set (CLI `--course`).
    course_override: Option<String>,
}

impl HttpPage {
    pub fn new(
        url: &str,
        user_agent: &str,
        timeout_secs: u64,
        course_override: Option<String>,
    ) -> Result<Self, PageError> {
        let url = Url::parse(url).map_err(|e| PageError::Fetch(format!("invalid url: {e}")))?;
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(|e| PageError::Fetch(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            url,
            course_override,
        })
    }

    fn resolve_action(&self, action: &str) -> Result<Url, PageError> {
        if action.is_empty() {
            // An empty form action posts back to the page itself.
            return Ok(self.url.clone());
        }
        self.url
            .join(action)
            .map_err(|e| PageError::Fetch(format!("invalid form action '{action}': {e}")))
    }
}

#[async_trait]
impl PagePort for HttpPage {
    async fn load(&self) -> Result<PageSnapshot, PageError> {
        tracing::debug!(url = %self.url, "loading course page");
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| PageError::Fetch(format!("GET {} failed: {e}", self.url)))?
            .error_for_status()
            .map_err(|e| PageError::Fetch(format!("GET {} failed: {e}", self.url)))?;

        let html = response
            .text()
            .await
            .map_err(|e| PageError::Fetch(format!("response read failed: {e}")))?;

        let mut snapshot = parse_page(&html, self.url.as_str())?;
        if let Some(course) = &self.course_override {
            snapshot.course = course.clone();
        }
        Ok(snapshot)
    }

    async fn invoke(&self, control: &Control) -> Result<(), PageError> {
        let target = self.resolve_action(&control.action)?;
        tracing::info!(
            session = %control.session,
            label = %control.label,
            url = %target,
            "submitting registration form"
        );
        self.client
            .post(target.clone())
            .form(&control.fields)
            .send()
            .await
            .map_err(|e| PageError::Fetch(format!("POST {target} failed: {e}")))?;
        // Status and body are intentionally ignored; the next load observes
        // the outcome.
        Ok(())
    }
}
