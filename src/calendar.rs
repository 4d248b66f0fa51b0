//! External calendar bridge.
//!
//! The task store mirrors due dates into a third-party calendar through the
//! [`CalendarBridge`] trait; tests substitute a fake. The HTTP implementation
//! talks to the calendar sync endpoint with bounded retries. Every failure
//! degrades: readers fall back to the last fetched events, then to a fixed
//! set of demonstration events.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::storage::{keys, Storage, StorageExt};
use crate::types::{CalendarEvent, TaskEventRequest};

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("calendar API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("calendar bridge not configured")]
    NotConfigured,
}

/// Read/write boundary to the external calendar.
#[async_trait]
pub trait CalendarBridge: Send + Sync {
    /// Events from now through `days_ahead` days.
    async fn events(&self, days_ahead: i64) -> Result<Vec<CalendarEvent>, CalendarError>;

    /// Mirror a task into the calendar as a `[Task] <title>` event with a
    /// one-hour duration starting at the due time.
    async fn create_task_event(
        &self,
        request: &TaskEventRequest,
    ) -> Result<CalendarEvent, CalendarError>;
}

// =============================================================================
// Retry policy
// =============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(attempt: u32, policy: &RetryPolicy) -> StdDuration {
    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    StdDuration::from_millis(base)
}

async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, CalendarError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(CalendarError::Http);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) && attempt < attempts {
                    let delay = retry_delay(attempt, policy);
                    log::warn!(
                        "calendar retry {}/{} after status {} (sleep {:?})",
                        attempt,
                        attempts,
                        status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                let retryable_transport = err.is_timeout() || err.is_connect();
                if retryable_transport && attempt < attempts {
                    let delay = retry_delay(attempt, policy);
                    log::warn!(
                        "calendar retry {}/{} after transport error: {} (sleep {:?})",
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(CalendarError::Http(err));
            }
        }
    }

    unreachable!("retry loop always returns on the final attempt")
}

// =============================================================================
// HTTP implementation
// =============================================================================

/// Wire format of the sync endpoint's event listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    #[serde(default)]
    events: Vec<RawCalendarEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCalendarEvent {
    #[serde(default)]
    id: String,
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    html_link: Option<String>,
    #[serde(default)]
    is_all_day: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventResponse {
    event: RawCalendarEvent,
}

pub struct HttpCalendarBridge {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    retry: RetryPolicy,
}

impl HttpCalendarBridge {
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_token,
            retry: RetryPolicy::default(),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn normalize_event(raw: RawCalendarEvent, now: DateTime<Utc>) -> CalendarEvent {
    let start = raw.start_date.unwrap_or(now);
    CalendarEvent {
        id: raw.id,
        title: raw.summary.unwrap_or_else(|| "(No title)".to_string()),
        description: raw.description.filter(|d| !d.is_empty()),
        start_date: start,
        end_date: raw.end_date.unwrap_or(start),
        location: raw.location.filter(|l| !l.is_empty()),
        html_link: raw.html_link.unwrap_or_default(),
        is_all_day: raw.is_all_day,
    }
}

#[async_trait]
impl CalendarBridge for HttpCalendarBridge {
    async fn events(&self, days_ahead: i64) -> Result<Vec<CalendarEvent>, CalendarError> {
        let request = self
            .authorize(self.client.get(format!("{}/events", self.base_url)))
            .query(&[("days", days_ahead.to_string())]);

        let resp = send_with_retry(request, &self.retry).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let now = Utc::now();
        let body: EventsResponse = resp.json().await?;
        Ok(body
            .events
            .into_iter()
            .map(|raw| normalize_event(raw, now))
            .collect())
    }

    async fn create_task_event(
        &self,
        request: &TaskEventRequest,
    ) -> Result<CalendarEvent, CalendarError> {
        let description = request
            .description
            .clone()
            .unwrap_or_else(|| format!("Priority: {}", request.priority.as_str()));

        let body = serde_json::json!({
            "summary": format!("[Task] {}", request.title),
            "description": description,
            "startDate": request.due_date,
            "endDate": request.due_date + Duration::hours(1),
        });

        let req = self
            .authorize(self.client.post(format!("{}/events", self.base_url)))
            .json(&body);

        let resp = send_with_retry(req, &self.retry).await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreateEventResponse = resp.json().await?;
        Ok(normalize_event(created.event, Utc::now()))
    }
}

// =============================================================================
// Degraded-mode reads
// =============================================================================

/// Where a batch of displayed events actually came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarDataSource {
    Live,
    /// Bridge unavailable; serving the last successfully fetched batch.
    Cached,
    /// Bridge unavailable and nothing cached; serving demonstration events.
    Demo,
}

/// Fixed demonstration events, pinned relative to `now`.
pub fn demo_events(now: DateTime<Utc>) -> Vec<CalendarEvent> {
    let demo = |id: &str, title: &str, description: &str, days: i64, location: &str, all_day| {
        CalendarEvent {
            id: id.to_string(),
            title: title.to_string(),
            description: Some(description.to_string()),
            start_date: now + Duration::days(days),
            end_date: now + Duration::days(days),
            location: Some(location.to_string()),
            html_link: "#".to_string(),
            is_all_day: all_day,
        }
    };

    vec![
        demo(
            "demo-1",
            "Team Standup",
            "Daily standup meeting with the development team",
            1,
            "Conference Room A",
            false,
        ),
        demo(
            "demo-2",
            "Project Review",
            "Quarterly project review with stakeholders",
            3,
            "Zoom",
            false,
        ),
        demo(
            "demo-3",
            "Sprint Planning",
            "Plan the next sprint cycle",
            5,
            "War Room",
            true,
        ),
        demo(
            "demo-4",
            "Client Meeting",
            "Review progress with the client",
            7,
            "Office",
            false,
        ),
    ]
}

/// Fetch events, caching successes and degrading to cached then demo data on
/// any failure. Never returns an error; the source tells the caller whether
/// to show a demo/stale indicator.
pub async fn events_with_fallback(
    bridge: &dyn CalendarBridge,
    storage: &dyn Storage,
    days_ahead: i64,
    now: DateTime<Utc>,
) -> (Vec<CalendarEvent>, CalendarDataSource) {
    match bridge.events(days_ahead).await {
        Ok(events) => {
            if let Err(e) = storage.save(keys::CALENDAR_EVENTS, &events) {
                log::warn!("failed to cache calendar events: {}", e);
            }
            (events, CalendarDataSource::Live)
        }
        Err(err) => {
            log::warn!("calendar fetch failed, degrading: {}", err);
            match storage.load::<Vec<CalendarEvent>>(keys::CALENDAR_EVENTS) {
                Ok(Some(cached)) if !cached.is_empty() => (cached, CalendarDataSource::Cached),
                _ => (demo_events(now), CalendarDataSource::Demo),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::Priority;

    struct FailingBridge;

    #[async_trait]
    impl CalendarBridge for FailingBridge {
        async fn events(&self, _days_ahead: i64) -> Result<Vec<CalendarEvent>, CalendarError> {
            Err(CalendarError::NotConfigured)
        }

        async fn create_task_event(
            &self,
            _request: &TaskEventRequest,
        ) -> Result<CalendarEvent, CalendarError> {
            Err(CalendarError::NotConfigured)
        }
    }

    struct FixedBridge(Vec<CalendarEvent>);

    #[async_trait]
    impl CalendarBridge for FixedBridge {
        async fn events(&self, _days_ahead: i64) -> Result<Vec<CalendarEvent>, CalendarError> {
            Ok(self.0.clone())
        }

        async fn create_task_event(
            &self,
            request: &TaskEventRequest,
        ) -> Result<CalendarEvent, CalendarError> {
            Ok(CalendarEvent {
                id: "created".to_string(),
                title: format!("[Task] {}", request.title),
                description: request.description.clone(),
                start_date: request.due_date,
                end_date: request.due_date + Duration::hours(1),
                location: None,
                html_link: String::new(),
                is_all_day: false,
            })
        }
    }

    #[tokio::test]
    async fn failure_without_cache_serves_demo_events() {
        let storage = MemoryStorage::new();
        let now = Utc::now();

        let (events, source) = events_with_fallback(&FailingBridge, &storage, 30, now).await;

        assert_eq!(source, CalendarDataSource::Demo);
        assert_eq!(events.len(), 4);
        assert!(events.iter().any(|e| e.is_all_day));
    }

    #[tokio::test]
    async fn failure_with_cache_serves_cached_events() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        let live = vec![CalendarEvent {
            id: "e1".to_string(),
            title: "Kickoff".to_string(),
            description: None,
            start_date: now,
            end_date: now + Duration::hours(1),
            location: None,
            html_link: String::new(),
            is_all_day: false,
        }];

        // A successful fetch populates the cache...
        let (events, source) =
            events_with_fallback(&FixedBridge(live.clone()), &storage, 30, now).await;
        assert_eq!(source, CalendarDataSource::Live);
        assert_eq!(events, live);

        // ...and a later failure replays it instead of demo data.
        let (events, source) = events_with_fallback(&FailingBridge, &storage, 30, now).await;
        assert_eq!(source, CalendarDataSource::Cached);
        assert_eq!(events, live);
    }

    #[tokio::test]
    async fn task_events_are_prefixed_and_one_hour_long() {
        let now = Utc::now();
        let bridge = FixedBridge(Vec::new());
        let event = bridge
            .create_task_event(&TaskEventRequest {
                title: "Ship report".to_string(),
                description: None,
                due_date: now,
                priority: Priority::High,
            })
            .await
            .unwrap();

        assert_eq!(event.title, "[Task] Ship report");
        assert_eq!(event.end_date - event.start_date, Duration::hours(1));
    }

    #[test]
    fn raw_events_normalize_with_defaults() {
        let json = r#"{
            "events": [
                {
                    "id": "evt-1",
                    "summary": "Planning",
                    "startDate": "2026-03-02T15:00:00Z",
                    "endDate": "2026-03-02T16:00:00Z",
                    "htmlLink": "https://calendar.example/evt-1"
                },
                {
                    "id": "evt-2",
                    "startDate": "2026-03-03T00:00:00Z",
                    "endDate": "2026-03-04T00:00:00Z",
                    "isAllDay": true,
                    "description": ""
                }
            ]
        }"#;

        let parsed: EventsResponse = serde_json::from_str(json).unwrap();
        let now = Utc::now();
        let events: Vec<CalendarEvent> = parsed
            .events
            .into_iter()
            .map(|raw| normalize_event(raw, now))
            .collect();

        assert_eq!(events[0].title, "Planning");
        assert_eq!(events[0].html_link, "https://calendar.example/evt-1");
        assert_eq!(events[1].title, "(No title)");
        assert!(events[1].is_all_day);
        assert!(events[1].description.is_none());
    }
}
