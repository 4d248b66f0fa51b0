//! Task and project store.
//!
//! Owns the canonical task and project collections, applies the
//! completed-at invariant on status transitions, and opportunistically
//! mirrors due dates to the external calendar. Calendar sync is
//! fire-and-forget: it never blocks, fails, or rolls back a CRUD call.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::calendar::CalendarBridge;
use crate::samples;
use crate::storage::{keys, load_or_sample, DataOrigin, Storage, StorageExt};
use crate::types::{
    Priority, Project, ProjectDraft, ProjectPatch, Status, Task, TaskDraft, TaskEventRequest,
    TaskPatch, TaskStats,
};
use crate::util::generate_id;

/// Persisted set of task ids that have been mirrored to the calendar at
/// least once. Shared with the background sync tasks, which mark entries
/// after a successful push.
#[derive(Clone)]
pub struct SyncLedger {
    storage: Arc<dyn Storage>,
    synced: Arc<parking_lot::Mutex<HashSet<String>>>,
}

impl SyncLedger {
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let synced = match storage.load::<Vec<String>>(keys::SYNCED_TASKS) {
            Ok(Some(ids)) => ids.into_iter().collect(),
            Ok(None) => HashSet::new(),
            Err(e) => {
                log::warn!("unreadable synced-task markers, starting empty: {}", e);
                HashSet::new()
            }
        };
        Self {
            storage,
            synced: Arc::new(parking_lot::Mutex::new(synced)),
        }
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.synced.lock().contains(task_id)
    }

    pub fn mark(&self, task_id: &str) {
        let mut guard = self.synced.lock();
        if guard.insert(task_id.to_string()) {
            self.persist(&guard);
        }
    }

    pub fn forget(&self, task_id: &str) {
        let mut guard = self.synced.lock();
        if guard.remove(task_id) {
            self.persist(&guard);
        }
    }

    fn persist(&self, synced: &HashSet<String>) {
        let mut ids: Vec<&String> = synced.iter().collect();
        ids.sort();
        if let Err(e) = self.storage.save(keys::SYNCED_TASKS, &ids) {
            log::warn!("failed to persist synced-task markers: {}", e);
        }
    }
}

pub struct TaskStore {
    storage: Arc<dyn Storage>,
    calendar: Option<Arc<dyn CalendarBridge>>,
    ledger: SyncLedger,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    task_origin: DataOrigin,
}

impl TaskStore {
    /// Load tasks and projects, seeding sample data on first run and falling
    /// back to it (logged) when the stored documents are unreadable.
    pub fn load(storage: Arc<dyn Storage>, calendar: Option<Arc<dyn CalendarBridge>>) -> Self {
        let now = Utc::now();
        let (tasks, task_origin) =
            load_or_sample(storage.as_ref(), keys::TASKS, || samples::sample_tasks(now));
        let (projects, _) = load_or_sample(storage.as_ref(), keys::PROJECTS, || {
            samples::sample_projects(now)
        });
        let ledger = SyncLedger::load(storage.clone());

        Self {
            storage,
            calendar,
            ledger,
            tasks,
            projects,
            task_origin,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn origin(&self) -> DataOrigin {
        self.task_origin
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn tasks_for_project(&self, project_id: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.project_id.as_deref() == Some(project_id))
            .collect()
    }

    pub fn tasks_with_status(&self, status: Status) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    pub fn is_synced(&self, task_id: &str) -> bool {
        self.ledger.contains(task_id)
    }

    // =========================================================================
    // Task CRUD
    // =========================================================================

    /// New tasks go to the front of the collection. A due date triggers a
    /// best-effort calendar mirror.
    pub fn create_task(&mut self, draft: TaskDraft) -> Task {
        let now = Utc::now();
        let status = draft.status.unwrap_or(Status::Todo);
        let task = Task {
            id: generate_id(),
            title: draft.title,
            description: draft.description,
            status,
            priority: draft.priority.unwrap_or(Priority::Medium),
            due_date: draft.due_date,
            project_id: draft.project_id,
            category: draft.category,
            tags: draft.tags,
            created_at: now,
            updated_at: now,
            completed_at: (status == Status::Done).then_some(now),
        };

        self.tasks.insert(0, task.clone());
        self.persist_tasks();

        if task.due_date.is_some() {
            self.dispatch_calendar_sync(&task);
        }

        task
    }

    /// Merge a patch into a task. Returns `None` for an unknown id.
    ///
    /// Transitioning into done stamps `completed_at` with the transition
    /// time; transitioning out clears it. A due-date change re-triggers the
    /// calendar mirror.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Option<Task> {
        let now = Utc::now();
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;

        let was_done = task.status == Status::Done;
        let old_due = task.due_date;

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if patch.clear_due_date {
            task.due_date = None;
        } else if let Some(due) = patch.due_date {
            task.due_date = Some(due);
        }
        if patch.clear_project {
            task.project_id = None;
        } else if let Some(project_id) = patch.project_id {
            task.project_id = Some(project_id);
        }
        if let Some(category) = patch.category {
            task.category = category;
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }
        if let Some(status) = patch.status {
            task.status = status;
            let is_done = status == Status::Done;
            if is_done && !was_done {
                task.completed_at = Some(now);
            } else if !is_done && was_done {
                task.completed_at = None;
            }
        }
        task.updated_at = now;

        let updated = task.clone();
        self.persist_tasks();

        if updated.due_date != old_due && updated.due_date.is_some() {
            self.dispatch_calendar_sync(&updated);
        }

        Some(updated)
    }

    /// Remove the task and forget its synced marker.
    pub fn delete_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return false;
        }
        self.ledger.forget(id);
        self.persist_tasks();
        true
    }

    /// Sugar over [`Self::update_task`] for drag-and-drop style moves.
    pub fn move_task(&mut self, id: &str, status: Status) -> Option<Task> {
        self.update_task(
            id,
            TaskPatch {
                status: Some(status),
                ..TaskPatch::default()
            },
        )
    }

    /// Counts per status plus overdue (due strictly before `now`, not done).
    pub fn stats(&self, now: DateTime<Utc>) -> TaskStats {
        let count = |status| self.tasks.iter().filter(|t| t.status == status).count();
        TaskStats {
            total: self.tasks.len(),
            todo: count(Status::Todo),
            in_progress: count(Status::InProgress),
            done: count(Status::Done),
            overdue: self
                .tasks
                .iter()
                .filter(|t| t.status != Status::Done)
                .filter(|t| t.due_date.is_some_and(|due| due < now))
                .count(),
        }
    }

    // =========================================================================
    // Project CRUD
    // =========================================================================

    pub fn create_project(&mut self, draft: ProjectDraft) -> Project {
        let now = Utc::now();
        let project = Project {
            id: generate_id(),
            name: draft.name,
            description: draft.description,
            color: draft.color,
            created_at: now,
            updated_at: now,
        };
        self.projects.insert(0, project.clone());
        self.persist_projects();
        project
    }

    pub fn update_project(&mut self, id: &str, patch: ProjectPatch) -> Option<Project> {
        let project = self.projects.iter_mut().find(|p| p.id == id)?;
        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(description) = patch.description {
            project.description = description;
        }
        if let Some(color) = patch.color {
            project.color = color;
        }
        project.updated_at = Utc::now();
        let updated = project.clone();
        self.persist_projects();
        Some(updated)
    }

    /// Delete a project and null out `project_id` on referencing tasks.
    /// Tasks themselves are never cascade-deleted.
    pub fn delete_project(&mut self, id: &str) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != id);
        if self.projects.len() == before {
            return false;
        }

        let now = Utc::now();
        let mut touched = false;
        for task in &mut self.tasks {
            if task.project_id.as_deref() == Some(id) {
                task.project_id = None;
                task.updated_at = now;
                touched = true;
            }
        }

        self.persist_projects();
        if touched {
            self.persist_tasks();
        }
        true
    }

    // =========================================================================
    // Persistence + calendar dispatch
    // =========================================================================

    fn persist_tasks(&self) {
        if let Err(e) = self.storage.save(keys::TASKS, &self.tasks) {
            log::warn!("failed to persist tasks: {}", e);
        }
    }

    fn persist_projects(&self) {
        if let Err(e) = self.storage.save(keys::PROJECTS, &self.projects) {
            log::warn!("failed to persist projects: {}", e);
        }
    }

    /// Spawn an at-most-once, best-effort calendar mirror for `task`.
    ///
    /// Requires an ambient tokio runtime; without one the sync is skipped
    /// with a diagnostic. The spawned future records the synced marker on
    /// success and only logs on failure — there is no caller-visible error
    /// channel.
    fn dispatch_calendar_sync(&self, task: &Task) {
        let Some(bridge) = self.calendar.clone() else {
            return;
        };
        let Some(due_date) = task.due_date else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::debug!("no async runtime, skipping calendar sync for task {}", task.id);
            return;
        };

        let request = TaskEventRequest {
            title: task.title.clone(),
            description: (!task.description.is_empty()).then(|| task.description.clone()),
            due_date,
            priority: task.priority,
        };
        let ledger = self.ledger.clone();
        let task_id = task.id.clone();

        handle.spawn(async move {
            match bridge.create_task_event(&request).await {
                Ok(_) => ledger.mark(&task_id),
                Err(e) => log::warn!("calendar sync failed for task {}: {}", task_id, e),
            }
        });
    }
}
