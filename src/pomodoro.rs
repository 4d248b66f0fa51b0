//! Pomodoro countdown state machine.
//!
//! Three phases (work, short break, long break) driven by an external
//! one-second tick. The timer itself never spawns anything: the owning shell
//! calls [`PomodoroTimer::tick`] once per second while the timer is running
//! and reacts to the returned [`PhaseEnd`]. Completed work phases are logged
//! to an append-only session list; breaks are not logged.
//!
//! The completed-session counter is scoped to the process session, so the
//! "every Nth work phase earns a long break" cadence restarts on relaunch.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::storage::{keys, Storage, StorageExt};
use crate::types::{PomodoroSession, PomodoroSettings, PomodoroSettingsPatch, TimerMode};
use crate::util::generate_id;

const SECS_PER_MINUTE: u32 = 60;

/// Task reference bound to a running work phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTask {
    pub id: String,
    pub title: String,
}

/// What happened when a phase reached zero (naturally or via skip).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEnd {
    /// A work phase finished and a session was logged.
    WorkFinished { next: TimerMode },
    /// A break finished; the timer is back on a work phase.
    BreakFinished,
}

pub struct PomodoroTimer {
    storage: Arc<dyn Storage>,
    settings: PomodoroSettings,
    sessions: Vec<PomodoroSession>,
    mode: TimerMode,
    remaining_secs: u32,
    running: bool,
    completed_count: u32,
    active_task: Option<ActiveTask>,
    /// When the current work run began; survives pause/resume, cleared on
    /// reset and phase changes.
    run_started_at: Option<DateTime<Utc>>,
}

impl PomodoroTimer {
    /// Unreadable settings or session logs degrade to defaults with a logged
    /// warning; the timer always comes up paused on a full work phase.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let settings = match storage.load::<PomodoroSettings>(keys::POMODORO_SETTINGS) {
            Ok(Some(settings)) => settings,
            Ok(None) => PomodoroSettings::default(),
            Err(e) => {
                log::warn!("unreadable pomodoro settings, using defaults: {}", e);
                PomodoroSettings::default()
            }
        };
        let sessions = match storage.load::<Vec<PomodoroSession>>(keys::POMODORO_SESSIONS) {
            Ok(Some(sessions)) => sessions,
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("unreadable pomodoro session log, starting empty: {}", e);
                Vec::new()
            }
        };

        let remaining_secs = settings.work_duration * SECS_PER_MINUTE;
        Self {
            storage,
            settings,
            sessions,
            mode: TimerMode::Work,
            remaining_secs,
            running: false,
            completed_count: 0,
            active_task: None,
            run_started_at: None,
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_count
    }

    pub fn settings(&self) -> &PomodoroSettings {
        &self.settings
    }

    pub fn active_task(&self) -> Option<&ActiveTask> {
        self.active_task.as_ref()
    }

    /// The append-only session log, oldest first.
    pub fn sessions(&self) -> &[PomodoroSession] {
        &self.sessions
    }

    fn phase_secs(&self, mode: TimerMode) -> u32 {
        let minutes = match mode {
            TimerMode::Work => self.settings.work_duration,
            TimerMode::ShortBreak => self.settings.short_break_duration,
            TimerMode::LongBreak => self.settings.long_break_duration,
        };
        minutes * SECS_PER_MINUTE
    }

    // =========================================================================
    // Controls
    // =========================================================================

    /// Begin or resume the current phase. A task reference passed here is
    /// carried onto the session logged when the work phase completes;
    /// resuming without one keeps the existing binding.
    pub fn start(&mut self, task: Option<ActiveTask>, now: DateTime<Utc>) {
        if let Some(task) = task {
            self.active_task = Some(task);
        }
        if self.run_started_at.is_none() {
            self.run_started_at = Some(now);
        }
        self.running = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Back to a paused, full-length work phase with no bound task.
    pub fn reset(&mut self) {
        self.mode = TimerMode::Work;
        self.remaining_secs = self.phase_secs(TimerMode::Work);
        self.running = false;
        self.active_task = None;
        self.run_started_at = None;
    }

    /// Jump straight to `mode` at full duration, paused.
    pub fn switch_mode(&mut self, mode: TimerMode) {
        self.mode = mode;
        self.remaining_secs = self.phase_secs(mode);
        self.running = false;
        self.run_started_at = None;
    }

    /// One second of countdown. Returns the transition when this tick
    /// finished the phase; `None` while paused or mid-phase.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<PhaseEnd> {
        if !self.running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return None;
        }
        Some(self.complete_phase(now))
    }

    /// Force the current phase to complete immediately, applying the same
    /// transition rule as natural expiry.
    pub fn skip(&mut self, now: DateTime<Utc>) -> PhaseEnd {
        self.complete_phase(now)
    }

    fn complete_phase(&mut self, now: DateTime<Utc>) -> PhaseEnd {
        match self.mode {
            TimerMode::Work => {
                self.log_session(now);
                self.completed_count += 1;

                let cadence = self.settings.sessions_before_long_break.max(1);
                let next = if self.completed_count % cadence == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                };

                self.enter_phase(next, self.settings.auto_start_breaks, now);
                PhaseEnd::WorkFinished { next }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => {
                self.enter_phase(TimerMode::Work, self.settings.auto_start_pomodoros, now);
                PhaseEnd::BreakFinished
            }
        }
    }

    fn enter_phase(&mut self, mode: TimerMode, auto_start: bool, now: DateTime<Utc>) {
        self.mode = mode;
        self.remaining_secs = self.phase_secs(mode);
        self.running = auto_start;
        self.run_started_at = auto_start.then_some(now);
    }

    fn log_session(&mut self, now: DateTime<Utc>) {
        let duration = self.settings.work_duration;
        let start_time = self
            .run_started_at
            .take()
            .unwrap_or(now - Duration::minutes(duration as i64));

        self.sessions.push(PomodoroSession {
            id: generate_id(),
            task_id: self.active_task.as_ref().map(|t| t.id.clone()),
            task_title: self.active_task.as_ref().map(|t| t.title.clone()),
            start_time,
            end_time: now,
            duration,
            completed: true,
            created_at: now,
        });

        if let Err(e) = self.storage.save(keys::POMODORO_SESSIONS, &self.sessions) {
            log::warn!("failed to persist pomodoro sessions: {}", e);
        }
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Merge a settings patch. While paused, a change to the current phase's
    /// duration re-bases the remaining time to the new full length; a running
    /// countdown and the other phases are left alone.
    pub fn update_settings(&mut self, patch: PomodoroSettingsPatch) {
        let old_phase_secs = self.phase_secs(self.mode);

        if let Some(minutes) = patch.work_duration {
            self.settings.work_duration = minutes;
        }
        if let Some(minutes) = patch.short_break_duration {
            self.settings.short_break_duration = minutes;
        }
        if let Some(minutes) = patch.long_break_duration {
            self.settings.long_break_duration = minutes;
        }
        if let Some(count) = patch.sessions_before_long_break {
            self.settings.sessions_before_long_break = count;
        }
        if let Some(auto) = patch.auto_start_breaks {
            self.settings.auto_start_breaks = auto;
        }
        if let Some(auto) = patch.auto_start_pomodoros {
            self.settings.auto_start_pomodoros = auto;
        }

        if !self.running && self.phase_secs(self.mode) != old_phase_secs {
            self.remaining_secs = self.phase_secs(self.mode);
        }

        if let Err(e) = self.storage.save(keys::POMODORO_SETTINGS, &self.settings) {
            log::warn!("failed to persist pomodoro settings: {}", e);
        }
    }

    // =========================================================================
    // Session queries
    // =========================================================================

    pub fn todays_sessions(&self, today: NaiveDate) -> Vec<&PomodoroSession> {
        self.sessions
            .iter()
            .filter(|s| s.completed && s.created_at.date_naive() == today)
            .collect()
    }

    pub fn total_focus_minutes_today(&self, today: NaiveDate) -> u32 {
        self.todays_sessions(today).iter().map(|s| s.duration).sum()
    }
}

/// `"MM:SS"` for countdown display.
pub fn format_time(total_secs: u32) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn timer() -> PomodoroTimer {
        PomodoroTimer::load(Arc::new(MemoryStorage::new()))
    }

    fn run_to_completion(timer: &mut PomodoroTimer, now: DateTime<Utc>) -> PhaseEnd {
        loop {
            if let Some(end) = timer.tick(now) {
                return end;
            }
        }
    }

    #[test]
    fn loads_paused_on_full_work_phase() {
        let timer = timer();
        assert_eq!(timer.mode(), TimerMode::Work);
        assert_eq!(timer.remaining_secs(), 25 * 60);
        assert!(!timer.is_running());
    }

    #[test]
    fn work_expiry_logs_session_and_pauses_short_break() {
        let mut timer = timer();
        let started = Utc::now();
        timer.start(None, started);

        let end = run_to_completion(&mut timer, started + Duration::minutes(25));

        assert_eq!(
            end,
            PhaseEnd::WorkFinished {
                next: TimerMode::ShortBreak
            }
        );
        assert_eq!(timer.sessions().len(), 1);
        let session = &timer.sessions()[0];
        assert_eq!(session.duration, 25);
        assert!(session.completed);
        assert_eq!(session.start_time, started);

        // autoStartBreaks is off by default: loaded but paused.
        assert_eq!(timer.mode(), TimerMode::ShortBreak);
        assert!(!timer.is_running());
        assert_eq!(timer.remaining_secs(), 5 * 60);
    }

    #[test]
    fn every_fourth_work_phase_earns_a_long_break() {
        let mut timer = timer();
        let now = Utc::now();

        for round in 1..=4u32 {
            timer.start(None, now);
            let end = timer.skip(now);
            if round == 4 {
                assert_eq!(
                    end,
                    PhaseEnd::WorkFinished {
                        next: TimerMode::LongBreak
                    }
                );
            } else {
                assert_eq!(
                    end,
                    PhaseEnd::WorkFinished {
                        next: TimerMode::ShortBreak
                    }
                );
            }
            // Skip the break to get back onto a work phase.
            assert_eq!(timer.skip(now), PhaseEnd::BreakFinished);
        }
        assert_eq!(timer.completed_count(), 4);
    }

    #[test]
    fn break_expiry_returns_to_paused_work() {
        let mut timer = timer();
        let now = Utc::now();
        timer.switch_mode(TimerMode::ShortBreak);
        timer.start(None, now);

        let end = timer.skip(now);
        assert_eq!(end, PhaseEnd::BreakFinished);
        assert_eq!(timer.mode(), TimerMode::Work);
        assert!(!timer.is_running());
        assert_eq!(timer.remaining_secs(), 25 * 60);
    }

    #[test]
    fn auto_start_breaks_keeps_the_timer_running() {
        let mut timer = timer();
        let now = Utc::now();
        timer.update_settings(PomodoroSettingsPatch {
            auto_start_breaks: Some(true),
            ..PomodoroSettingsPatch::default()
        });

        timer.start(None, now);
        timer.skip(now);

        assert_eq!(timer.mode(), TimerMode::ShortBreak);
        assert!(timer.is_running());
    }

    #[test]
    fn reset_clears_task_and_restores_full_work_phase() {
        let mut timer = timer();
        let now = Utc::now();
        timer.start(
            Some(ActiveTask {
                id: "t1".to_string(),
                title: "Deep work".to_string(),
            }),
            now,
        );
        timer.tick(now);
        assert!(timer.remaining_secs() < 25 * 60);

        timer.reset();
        assert_eq!(timer.mode(), TimerMode::Work);
        assert_eq!(timer.remaining_secs(), 25 * 60);
        assert!(!timer.is_running());
        assert!(timer.active_task().is_none());
    }

    #[test]
    fn bound_task_is_carried_onto_the_logged_session() {
        let mut timer = timer();
        let now = Utc::now();
        timer.start(
            Some(ActiveTask {
                id: "t1".to_string(),
                title: "Deep work".to_string(),
            }),
            now,
        );
        timer.skip(now);

        let session = &timer.sessions()[0];
        assert_eq!(session.task_id.as_deref(), Some("t1"));
        assert_eq!(session.task_title.as_deref(), Some("Deep work"));
    }

    #[test]
    fn pause_survives_without_losing_run_start() {
        let mut timer = timer();
        let started = Utc::now();
        timer.start(None, started);
        timer.tick(started);
        timer.pause();
        assert!(timer.tick(started).is_none());

        // Resume keeps the original run start for the logged session.
        timer.start(None, started + Duration::minutes(10));
        timer.skip(started + Duration::minutes(30));
        assert_eq!(timer.sessions()[0].start_time, started);
    }

    #[test]
    fn duration_change_while_paused_rebases_current_phase_only() {
        let mut timer = timer();
        timer.update_settings(PomodoroSettingsPatch {
            work_duration: Some(50),
            ..PomodoroSettingsPatch::default()
        });
        assert_eq!(timer.remaining_secs(), 50 * 60);

        // A change to a different phase's duration leaves the countdown alone.
        timer.update_settings(PomodoroSettingsPatch {
            short_break_duration: Some(10),
            ..PomodoroSettingsPatch::default()
        });
        assert_eq!(timer.remaining_secs(), 50 * 60);
    }

    #[test]
    fn duration_change_while_running_does_not_rebase() {
        let mut timer = timer();
        let now = Utc::now();
        timer.start(None, now);
        timer.tick(now);
        let before = timer.remaining_secs();

        timer.update_settings(PomodoroSettingsPatch {
            work_duration: Some(50),
            ..PomodoroSettingsPatch::default()
        });
        assert_eq!(timer.remaining_secs(), before);
    }

    #[test]
    fn session_log_persists_across_loads() {
        let storage = Arc::new(MemoryStorage::new());
        let now = Utc::now();

        let mut timer = PomodoroTimer::load(storage.clone());
        timer.start(None, now);
        timer.skip(now);
        assert_eq!(timer.sessions().len(), 1);

        let reloaded = PomodoroTimer::load(storage);
        assert_eq!(reloaded.sessions(), timer.sessions());
        // The long-break cadence restarts with the process session.
        assert_eq!(reloaded.completed_count(), 0);
    }

    #[test]
    fn settings_persist_across_loads() {
        let storage = Arc::new(MemoryStorage::new());

        let mut timer = PomodoroTimer::load(storage.clone());
        timer.update_settings(PomodoroSettingsPatch {
            work_duration: Some(45),
            sessions_before_long_break: Some(3),
            ..PomodoroSettingsPatch::default()
        });

        let reloaded = PomodoroTimer::load(storage);
        assert_eq!(reloaded.settings().work_duration, 45);
        assert_eq!(reloaded.settings().sessions_before_long_break, 3);
        assert_eq!(reloaded.remaining_secs(), 45 * 60);
    }

    #[test]
    fn todays_sessions_sum_focus_minutes() {
        let mut timer = timer();
        let now = Utc::now();
        let today = now.date_naive();

        timer.start(None, now);
        timer.skip(now);
        timer.skip(now); // break
        timer.start(None, now);
        timer.skip(now);

        assert_eq!(timer.todays_sessions(today).len(), 2);
        assert_eq!(timer.total_focus_minutes_today(today), 50);

        let other_day = today.pred_opt().unwrap();
        assert_eq!(timer.total_focus_minutes_today(other_day), 0);
    }

    #[test]
    fn format_time_pads_minutes_and_seconds() {
        assert_eq!(format_time(25 * 60), "25:00");
        assert_eq!(format_time(5 * 60 + 7), "05:07");
        assert_eq!(format_time(0), "00:00");
    }
}
