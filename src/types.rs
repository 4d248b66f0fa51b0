use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Tasks + projects
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Todo,
    InProgress,
    Done,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in-progress",
            Status::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Sort rank for standup ordering: urgent < high < medium < low.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

/// A single task. `completed_at` is non-null iff the task is done: the store
/// stamps it on the transition into done and clears it on the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Caller-supplied fields for a new task. Ids and timestamps are assigned by
/// the store.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
}

/// Partial update for a task. Nullable fields pair an optional new value with
/// an explicit `clear_*` flag so "leave unchanged", "set", and "clear" are
/// three distinct states.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clear_due_date: bool,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub clear_project: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Pure projection over the task collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    /// Due strictly before now and not done.
    pub overdue: usize,
}

// =============================================================================
// CRM: customers, deals, interactions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Prospect,
    Former,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub status: CustomerStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerDraft {
    pub name: String,
    pub company: String,
    pub email: String,
    pub phone: String,
    pub status: Option<CustomerStatus>,
    pub tags: Vec<String>,
    pub address: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<CustomerStatus>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub total: usize,
    pub active: usize,
    pub prospects: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DealStage {
    Lead,
    Contacted,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    pub const ALL: [DealStage; 6] = [
        DealStage::Lead,
        DealStage::Contacted,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    /// Closed-won or closed-lost.
    pub fn is_closed(&self) -> bool {
        matches!(self, DealStage::ClosedWon | DealStage::ClosedLost)
    }
}

/// A deal belongs to exactly one customer. The foreign key is not enforced at
/// the storage layer; deleting a customer cascades through
/// [`crate::state::Session::delete_customer_cascade`] at the call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub customer_id: String,
    pub title: String,
    pub value: f64,
    pub stage: DealStage,
    pub expected_close: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DealDraft {
    pub customer_id: String,
    pub title: String,
    pub value: f64,
    pub stage: Option<DealStage>,
    pub expected_close: Option<NaiveDate>,
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub stage: Option<DealStage>,
    #[serde(default)]
    pub expected_close: Option<NaiveDate>,
    #[serde(default)]
    pub clear_expected_close: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealStats {
    pub total_deals: usize,
    pub open_deals: usize,
    pub closed_won: usize,
    pub closed_lost: usize,
    pub pipeline_value: f64,
    pub closed_won_value: f64,
    pub closed_lost_value: f64,
    /// closed-won / (closed-won + closed-lost), nearest integer percent.
    /// 0 when no deals have closed either way.
    pub conversion_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Call,
    Email,
    Meeting,
    Visit,
    Note,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub customer_id: String,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InteractionDraft {
    pub customer_id: String,
    pub interaction_type: InteractionType,
    pub date: DateTime<Utc>,
    pub notes: String,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionPatch {
    #[serde(default)]
    pub interaction_type: Option<InteractionType>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    pub clear_follow_up_date: bool,
}

// =============================================================================
// Pomodoro
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    Work,
    ShortBreak,
    LongBreak,
}

/// One logged focus session. The log is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub id: String,
    pub task_id: Option<String>,
    pub task_title: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Minutes.
    pub duration: u32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSettings {
    /// Minutes.
    pub work_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
    pub sessions_before_long_break: u32,
    pub auto_start_breaks: bool,
    pub auto_start_pomodoros: bool,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            sessions_before_long_break: 4,
            auto_start_breaks: false,
            auto_start_pomodoros: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSettingsPatch {
    #[serde(default)]
    pub work_duration: Option<u32>,
    #[serde(default)]
    pub short_break_duration: Option<u32>,
    #[serde(default)]
    pub long_break_duration: Option<u32>,
    #[serde(default)]
    pub sessions_before_long_break: Option<u32>,
    #[serde(default)]
    pub auto_start_breaks: Option<bool>,
    #[serde(default)]
    pub auto_start_pomodoros: Option<bool>,
}

// =============================================================================
// Streaks
// =============================================================================

/// Persisted streak snapshot, recomputed from the task collection on every
/// derivation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakData {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_completed_date: Option<NaiveDate>,
    /// Unique, ascending.
    pub completed_dates: Vec<NaiveDate>,
    pub total_tasks_completed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    pub tasks_completed: u32,
    pub tasks_created: u32,
    pub pomodoro_minutes: u32,
}

impl DailyStats {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            tasks_completed: 0,
            tasks_created: 0,
            pomodoro_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakStatus {
    pub has_completed_today: bool,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub is_streak_active: bool,
    pub days_until_streak_break: u32,
}

/// One entry of the trailing seven-day progress strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayProgress {
    pub date: NaiveDate,
    pub completed: bool,
    pub count: u32,
}

// =============================================================================
// Standup
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandupItem {
    pub task_id: String,
    pub title: String,
    pub status: Status,
    pub notes: Option<String>,
}

/// Derived three-bucket summary. Buckets are independent classifications, not
/// a partition: the same task may appear in both `today` and `blockers`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandupReport {
    pub generated_at: DateTime<Utc>,
    pub yesterday: Vec<StandupItem>,
    pub today: Vec<StandupItem>,
    pub blockers: Vec<StandupItem>,
}

// =============================================================================
// Calendar
// =============================================================================

/// A normalized event from the external calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: Option<String>,
    pub html_link: String,
    pub is_all_day: bool,
}

/// Payload mirrored to the external calendar when a task gains a due date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(serde_json::to_string(&Status::Todo).unwrap(), "\"todo\"");
    }

    #[test]
    fn deal_stage_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&DealStage::ClosedWon).unwrap(),
            "\"closed-won\""
        );
        let parsed: DealStage = serde_json::from_str("\"closed-lost\"").unwrap();
        assert_eq!(parsed, DealStage::ClosedLost);
    }

    #[test]
    fn priority_rank_orders_urgent_first() {
        assert!(Priority::Urgent.rank() < Priority::High.rank());
        assert!(Priority::High.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::Low.rank());
    }

    #[test]
    fn timer_mode_uses_camel_case_names() {
        assert_eq!(
            serde_json::to_string(&TimerMode::ShortBreak).unwrap(),
            "\"shortBreak\""
        );
    }

    #[test]
    fn task_patch_defaults_to_no_changes() {
        let patch: TaskPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.title.is_none());
        assert!(!patch.clear_due_date);
        assert!(!patch.clear_project);
    }

    #[test]
    fn interaction_type_field_renames_to_type() {
        let json = r#"{
            "id": "i1",
            "customerId": "c1",
            "type": "call",
            "date": "2026-03-01T10:00:00Z",
            "notes": "intro call",
            "followUpDate": "2026-03-08",
            "createdAt": "2026-03-01T10:00:00Z"
        }"#;
        let parsed: Interaction = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.interaction_type, InteractionType::Call);
        assert_eq!(
            parsed.follow_up_date,
            Some(chrono::NaiveDate::from_ymd_opt(2026, 3, 8).unwrap())
        );
    }
}
