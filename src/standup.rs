//! Standup report synthesis.
//!
//! A pure projection of the task collection into three buckets: what was
//! completed yesterday, what is on deck today, and what is blocked. The
//! buckets are independent classifications, not a partition — an urgent
//! overdue task shows up under both "today" and "blockers". Nothing here is
//! persisted; the report is regenerated on demand.

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{Priority, StandupItem, StandupReport, Status, Task};
use crate::util::previous_day;

/// Build the three-bucket report for `today` from the full task collection.
pub fn generate(tasks: &[Task], today: NaiveDate, now: DateTime<Utc>) -> StandupReport {
    let yesterday = previous_day(today);

    let yesterday_items: Vec<StandupItem> = tasks
        .iter()
        .filter(|t| t.status == Status::Done)
        .filter(|t| t.completed_at.is_some_and(|at| at.date_naive() == yesterday))
        .map(|t| item(t, None))
        .collect();

    // In progress, due today, or slipping: todo with a due date behind us.
    let mut today_tasks: Vec<&Task> = tasks
        .iter()
        .filter(|t| match t.status {
            Status::InProgress => true,
            Status::Todo => t.due_date.is_some_and(|due| due.date_naive() <= today),
            Status::Done => false,
        })
        .collect();
    today_tasks.sort_by_key(|t| t.priority.rank());
    let today_items: Vec<StandupItem> = today_tasks.into_iter().map(|t| item(t, None)).collect();

    let blocker_items: Vec<StandupItem> = tasks
        .iter()
        .filter(|t| t.status != Status::Done)
        .filter_map(|t| {
            let overdue_since = t
                .due_date
                .map(|due| due.date_naive())
                .filter(|due| *due < today);
            match (t.priority, overdue_since) {
                (Priority::Urgent, Some(due)) => {
                    Some(item(t, Some(format!("Overdue since {}", due))))
                }
                (Priority::Urgent, None) => Some(item(t, Some("Urgent priority".to_string()))),
                (Priority::High, Some(due)) => Some(item(
                    t,
                    Some(format!("High priority task, overdue since {}", due)),
                )),
                _ => None,
            }
        })
        .collect();

    StandupReport {
        generated_at: now,
        yesterday: yesterday_items,
        today: today_items,
        blockers: blocker_items,
    }
}

fn item(task: &Task, notes: Option<String>) -> StandupItem {
    StandupItem {
        task_id: task.id.clone(),
        title: task.title.clone(),
        status: task.status,
        notes,
    }
}

fn status_marker(status: Status) -> &'static str {
    match status {
        Status::InProgress => "🔄",
        _ => "⏳",
    }
}

/// Plain-text/markdown rendition with the fixed section headers.
pub fn render_markdown(report: &StandupReport, today: NaiveDate) -> String {
    let mut out = String::new();

    out.push_str(&format!("📅 Daily Standup — {}\n\n", today));

    out.push_str("✅ Yesterday\n");
    if report.yesterday.is_empty() {
        out.push_str("Nothing completed yesterday.\n");
    } else {
        for item in &report.yesterday {
            out.push_str(&format!("- {}\n", item.title));
        }
    }

    out.push_str("\n📋 Today\n");
    if report.today.is_empty() {
        out.push_str("Nothing planned yet.\n");
    } else {
        for item in &report.today {
            out.push_str(&format!("- {} {}\n", status_marker(item.status), item.title));
        }
    }

    out.push_str("\n🚧 Blockers\n");
    if report.blockers.is_empty() {
        out.push_str("No blockers 🎉\n");
    } else {
        for item in &report.blockers {
            match &item.notes {
                Some(notes) => out.push_str(&format!("- ⚠️ {} ({})\n", item.title, notes)),
                None => out.push_str(&format!("- ⚠️ {}\n", item.title)),
            }
        }
    }

    out
}

/// Render the report and place it on the system clipboard.
pub fn copy_to_clipboard(report: &StandupReport, today: NaiveDate) -> Result<(), arboard::Error> {
    let text = render_markdown(report, today);
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text)
}
