//! Streak derivation.
//!
//! The streak is a projection of the task collection: tasks with a non-null
//! `completed_at` are grouped by calendar day, a day with at least one
//! completion is "active", and the current streak is the run of consecutive
//! active days ending today — or ending yesterday, so finishing nothing *yet*
//! today does not kill a live streak. Days on which tasks were merely created
//! never count.
//!
//! [`recompute`] is the authoritative path and re-runs on every change to the
//! task collection; it is idempotent over its inputs. [`record_completion`]
//! is the cheap incremental path for a single just-completed task.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::storage::{keys, Storage, StorageExt};
use crate::types::{DailyStats, DayProgress, StreakData, StreakStatus, Task};
use crate::util::previous_day;

/// Rebuild the streak snapshot from the full task collection.
///
/// `previous` supplies the persisted longest-streak floor: the longest run is
/// re-derived from scratch each pass, but never reported lower than a value
/// already achieved (completion history may since have been edited away).
pub fn recompute(tasks: &[Task], today: NaiveDate, previous: &StreakData) -> StreakData {
    let by_day = completions_by_day(tasks);
    let active: BTreeSet<NaiveDate> = by_day.keys().copied().collect();
    let completed_dates: Vec<NaiveDate> = active.iter().copied().collect();

    let yesterday = previous_day(today);
    let anchor = if active.contains(&today) {
        Some(today)
    } else if active.contains(&yesterday) {
        Some(yesterday)
    } else {
        None
    };

    let mut current_streak = 0u32;
    if let Some(anchor) = anchor {
        let mut day = anchor;
        loop {
            current_streak += 1;
            let prev = previous_day(day);
            if prev == day || !active.contains(&prev) {
                break;
            }
            day = prev;
        }
    }

    let longest_streak = longest_run(&completed_dates)
        .max(current_streak)
        .max(previous.longest_streak);

    let total_tasks_completed = tasks.iter().filter(|t| t.completed_at.is_some()).count() as u32;

    StreakData {
        current_streak,
        longest_streak,
        last_completed_date: completed_dates.last().copied(),
        completed_dates,
        total_tasks_completed,
    }
}

/// Incremental update for one task completed on `today`.
///
/// The first completion of a day extends the streak when yesterday (or today
/// itself) was the last completed day, otherwise restarts it at 1. Later
/// completions on the same day only bump the total. Never decrements.
pub fn record_completion(previous: &StreakData, today: NaiveDate) -> StreakData {
    let first_completion_today = !previous.completed_dates.contains(&today);

    let current_streak = if first_completion_today {
        match previous.last_completed_date {
            None => previous.current_streak + 1,
            Some(last) if last == today || last == previous_day(today) => {
                previous.current_streak + 1
            }
            Some(_) => 1,
        }
    } else {
        previous.current_streak
    };

    let mut completed_dates = previous.completed_dates.clone();
    if first_completion_today {
        completed_dates.push(today);
        completed_dates.sort();
    }

    StreakData {
        current_streak,
        longest_streak: previous.longest_streak.max(current_streak),
        last_completed_date: Some(today),
        completed_dates,
        total_tasks_completed: previous.total_tasks_completed + 1,
    }
}

fn completions_by_day(tasks: &[Task]) -> BTreeMap<NaiveDate, u32> {
    let mut by_day = BTreeMap::new();
    for task in tasks {
        if let Some(completed_at) = task.completed_at {
            *by_day.entry(completed_at.date_naive()).or_insert(0) += 1;
        }
    }
    by_day
}

/// Longest consecutive run in an ascending, unique date list.
fn longest_run(dates: &[NaiveDate]) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;
    for &date in dates {
        run = match prev {
            Some(p) if previous_day(date) == p => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(date);
    }
    longest
}

// =============================================================================
// Persistence wrapper
// =============================================================================

/// Owns the persisted streak snapshot and the per-day stats map.
pub struct StreakTracker {
    storage: Arc<dyn Storage>,
    data: StreakData,
    daily: BTreeMap<NaiveDate, DailyStats>,
}

impl StreakTracker {
    /// Unreadable snapshots degrade to empty defaults with a logged warning;
    /// there is no sample dataset for streaks.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let data = match storage.load::<StreakData>(keys::STREAK_DATA) {
            Ok(Some(data)) => data,
            Ok(None) => StreakData::default(),
            Err(e) => {
                log::warn!("unreadable streak data, starting over: {}", e);
                StreakData::default()
            }
        };
        let daily = match storage.load::<BTreeMap<NaiveDate, DailyStats>>(keys::DAILY_STATS) {
            Ok(Some(daily)) => daily,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                log::warn!("unreadable daily stats, starting over: {}", e);
                BTreeMap::new()
            }
        };
        Self {
            storage,
            data,
            daily,
        }
    }

    pub fn data(&self) -> &StreakData {
        &self.data
    }

    pub fn daily_stats(&self, date: NaiveDate) -> Option<&DailyStats> {
        self.daily.get(&date)
    }

    /// Authoritative derivation pass; call after any task-collection change.
    pub fn refresh(&mut self, tasks: &[Task], today: NaiveDate) {
        self.data = recompute(tasks, today, &self.data);

        for (date, completed) in completions_by_day(tasks) {
            let entry = self
                .daily
                .entry(date)
                .or_insert_with(|| DailyStats::empty(date));
            entry.tasks_completed = completed;
        }
        let mut created_by_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
        for task in tasks {
            *created_by_day.entry(task.created_at.date_naive()).or_insert(0) += 1;
        }
        for (date, created) in created_by_day {
            let entry = self
                .daily
                .entry(date)
                .or_insert_with(|| DailyStats::empty(date));
            entry.tasks_created = created;
        }

        self.persist();
    }

    /// Incremental path for a single completion event.
    pub fn record_completion(&mut self, today: NaiveDate) {
        self.data = record_completion(&self.data, today);
        let entry = self
            .daily
            .entry(today)
            .or_insert_with(|| DailyStats::empty(today));
        entry.tasks_completed += 1;
        self.persist();
    }

    /// Credit focus minutes to today's stats (fed by the pomodoro timer).
    pub fn add_pomodoro_minutes(&mut self, minutes: u32, today: NaiveDate) {
        let entry = self
            .daily
            .entry(today)
            .or_insert_with(|| DailyStats::empty(today));
        entry.pomodoro_minutes += minutes;
        self.persist();
    }

    pub fn status(&self, today: NaiveDate) -> StreakStatus {
        let has_completed_today = self.data.completed_dates.contains(&today);
        StreakStatus {
            has_completed_today,
            current_streak: self.data.current_streak,
            longest_streak: self.data.longest_streak,
            is_streak_active: self.data.current_streak > 0,
            days_until_streak_break: if has_completed_today { 0 } else { 1 },
        }
    }

    /// Trailing seven days ending today.
    pub fn weekly_progress(&self, today: NaiveDate) -> Vec<DayProgress> {
        (0..7)
            .rev()
            .map(|offset| {
                let date = today - chrono::Duration::days(offset);
                DayProgress {
                    date,
                    completed: self.data.completed_dates.contains(&date),
                    count: self
                        .daily
                        .get(&date)
                        .map(|d| d.tasks_completed)
                        .unwrap_or(0),
                }
            })
            .collect()
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save(keys::STREAK_DATA, &self.data) {
            log::warn!("failed to persist streak data: {}", e);
        }
        if let Err(e) = self.storage.save(keys::DAILY_STATS, &self.daily) {
            log::warn!("failed to persist daily stats: {}", e);
        }
    }
}
