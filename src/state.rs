//! Session root.
//!
//! [`Session`] is the dependency-injection point: it constructs the storage
//! adapter, the optional calendar bridge, and every store exactly once, then
//! owns the operations that span stores (streak refresh after task mutations,
//! the customer/deal cascade, pomodoro minutes feeding daily stats). A UI
//! shell holds one `Session` for its lifetime; tests build one over
//! [`MemoryStorage`](crate::storage::MemoryStorage) and a fake bridge.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{CalendarBridge, HttpCalendarBridge};
use crate::pomodoro::{PhaseEnd, PomodoroTimer};
use crate::services::customers::CustomerStore;
use crate::services::deals::DealStore;
use crate::services::interactions::InteractionStore;
use crate::services::tasks::TaskStore;
use crate::standup;
use crate::storage::{JsonFileStorage, Storage};
use crate::streak::StreakTracker;
use crate::types::{
    Project, ProjectDraft, ProjectPatch, StandupReport, Status, Task, TaskDraft, TaskPatch,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Overrides the default `~/.zephyr` data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Base URL of the calendar sync endpoint; unset disables the bridge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_token: Option<String>,
}

/// Default data directory, `~/.zephyr`.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".zephyr")
}

/// Read `~/.zephyr/config.json`. A missing file is a normal first run and
/// yields the defaults; an unreadable one is an error the shell can surface.
pub fn load_config() -> Result<Config, String> {
    let config_path = default_data_dir().join("config.json");
    if !config_path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read {}: {}", config_path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {}", config_path.display(), e))
}

pub struct Session {
    tasks: TaskStore,
    customers: CustomerStore,
    deals: DealStore,
    interactions: InteractionStore,
    streak: StreakTracker,
    pomodoro: PomodoroTimer,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        let data_dir = config
            .data_dir
            .clone()
            .unwrap_or_else(default_data_dir);
        let storage: Arc<dyn Storage> = Arc::new(JsonFileStorage::new(data_dir));

        let calendar: Option<Arc<dyn CalendarBridge>> = config.calendar_url.as_ref().map(|url| {
            Arc::new(HttpCalendarBridge::new(
                url.clone(),
                config.calendar_token.clone(),
            )) as Arc<dyn CalendarBridge>
        });

        Self::with_storage(storage, calendar)
    }

    /// Wire every store over an explicit storage adapter and bridge. Tests
    /// inject fakes here.
    pub fn with_storage(
        storage: Arc<dyn Storage>,
        calendar: Option<Arc<dyn CalendarBridge>>,
    ) -> Self {
        let tasks = TaskStore::load(storage.clone(), calendar);
        let customers = CustomerStore::load(storage.clone());
        let deals = DealStore::load(storage.clone());
        let interactions = InteractionStore::load(storage.clone());
        let mut streak = StreakTracker::load(storage.clone());
        let pomodoro = PomodoroTimer::load(storage);

        // Bring the snapshot in line with whatever the task collection says.
        streak.refresh(tasks.tasks(), Utc::now().date_naive());

        Self {
            tasks,
            customers,
            deals,
            interactions,
            streak,
            pomodoro,
        }
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn customers(&self) -> &CustomerStore {
        &self.customers
    }

    pub fn deals(&self) -> &DealStore {
        &self.deals
    }

    pub fn interactions(&self) -> &InteractionStore {
        &self.interactions
    }

    pub fn streak(&self) -> &StreakTracker {
        &self.streak
    }

    pub fn pomodoro(&self) -> &PomodoroTimer {
        &self.pomodoro
    }

    // =========================================================================
    // Task mutations — every one re-derives the streak snapshot
    // =========================================================================

    pub fn create_task(&mut self, draft: TaskDraft) -> Task {
        let task = self.tasks.create_task(draft);
        self.refresh_streak();
        task
    }

    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Option<Task> {
        let task = self.tasks.update_task(id, patch);
        self.refresh_streak();
        task
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        let deleted = self.tasks.delete_task(id);
        if deleted {
            self.refresh_streak();
        }
        deleted
    }

    pub fn move_task(&mut self, id: &str, status: Status) -> Option<Task> {
        let task = self.tasks.move_task(id, status);
        self.refresh_streak();
        task
    }

    pub fn create_project(&mut self, draft: ProjectDraft) -> Project {
        self.tasks.create_project(draft)
    }

    pub fn update_project(&mut self, id: &str, patch: ProjectPatch) -> Option<Project> {
        self.tasks.update_project(id, patch)
    }

    pub fn delete_project(&mut self, id: &str) -> bool {
        self.tasks.delete_project(id)
    }

    fn refresh_streak(&mut self) {
        self.streak
            .refresh(self.tasks.tasks(), Utc::now().date_naive());
    }

    // =========================================================================
    // CRM mutations
    // =========================================================================

    pub fn customers_mut(&mut self) -> &mut CustomerStore {
        &mut self.customers
    }

    pub fn deals_mut(&mut self) -> &mut DealStore {
        &mut self.deals
    }

    pub fn interactions_mut(&mut self) -> &mut InteractionStore {
        &mut self.interactions
    }

    /// Delete a customer and every deal owned by it. Two independent deletes
    /// with no transaction boundary between them; a crash in the middle
    /// leaves orphaned deals behind.
    pub fn delete_customer_cascade(&mut self, customer_id: &str) -> bool {
        let removed_deals = self.deals.delete_for_customer(customer_id);
        if removed_deals > 0 {
            log::debug!(
                "removed {} deal(s) for customer {}",
                removed_deals,
                customer_id
            );
        }
        self.customers.delete(customer_id)
    }

    // =========================================================================
    // Derivations
    // =========================================================================

    pub fn standup(&self, now: DateTime<Utc>) -> StandupReport {
        standup::generate(self.tasks.tasks(), now.date_naive(), now)
    }

    // =========================================================================
    // Pomodoro — completed work phases feed daily focus minutes
    // =========================================================================

    pub fn pomodoro_mut(&mut self) -> &mut PomodoroTimer {
        &mut self.pomodoro
    }

    /// One-second countdown tick; credits focus minutes when a work phase
    /// completes.
    pub fn tick_pomodoro(&mut self, now: DateTime<Utc>) -> Option<PhaseEnd> {
        let end = self.pomodoro.tick(now)?;
        self.credit_focus_minutes(&end, now);
        Some(end)
    }

    /// Skip the current phase, applying the natural-expiry transition.
    pub fn skip_pomodoro(&mut self, now: DateTime<Utc>) -> PhaseEnd {
        let end = self.pomodoro.skip(now);
        self.credit_focus_minutes(&end, now);
        end
    }

    fn credit_focus_minutes(&mut self, end: &PhaseEnd, now: DateTime<Utc>) {
        if let PhaseEnd::WorkFinished { .. } = end {
            let minutes = self.pomodoro.settings().work_duration;
            self.streak.add_pomodoro_minutes(minutes, now.date_naive());
        }
    }
}
