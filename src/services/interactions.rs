//! Interaction store and follow-up scheduling.
//!
//! Follow-up state is never stored: "upcoming" and "overdue" are query-time
//! classifications against the current day. Nothing here delivers reminders.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use crate::samples;
use crate::storage::{keys, load_or_sample, DataOrigin, Storage, StorageExt};
use crate::types::{Interaction, InteractionDraft, InteractionPatch};
use crate::util::generate_id;

const RECENT_WINDOW_DAYS: i64 = 30;

pub struct InteractionStore {
    storage: Arc<dyn Storage>,
    interactions: Vec<Interaction>,
    origin: DataOrigin,
}

impl InteractionStore {
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let now = Utc::now();
        let (interactions, origin) = load_or_sample(storage.as_ref(), keys::INTERACTIONS, || {
            samples::sample_interactions(now)
        });
        Self {
            storage,
            interactions,
            origin,
        }
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    pub fn get(&self, id: &str) -> Option<&Interaction> {
        self.interactions.iter().find(|i| i.id == id)
    }

    pub fn create(&mut self, draft: InteractionDraft) -> Interaction {
        let interaction = Interaction {
            id: generate_id(),
            customer_id: draft.customer_id,
            interaction_type: draft.interaction_type,
            date: draft.date,
            notes: draft.notes,
            follow_up_date: draft.follow_up_date,
            created_at: Utc::now(),
        };
        self.interactions.insert(0, interaction.clone());
        self.persist();
        interaction
    }

    pub fn update(&mut self, id: &str, patch: InteractionPatch) -> Option<Interaction> {
        let interaction = self.interactions.iter_mut().find(|i| i.id == id)?;
        if let Some(kind) = patch.interaction_type {
            interaction.interaction_type = kind;
        }
        if let Some(date) = patch.date {
            interaction.date = date;
        }
        if let Some(notes) = patch.notes {
            interaction.notes = notes;
        }
        if patch.clear_follow_up_date {
            interaction.follow_up_date = None;
        } else if let Some(follow_up) = patch.follow_up_date {
            interaction.follow_up_date = Some(follow_up);
        }
        let updated = interaction.clone();
        self.persist();
        Some(updated)
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.interactions.len();
        self.interactions.retain(|i| i.id != id);
        if self.interactions.len() == before {
            return false;
        }
        self.persist();
        true
    }

    /// Timeline for one customer, newest first.
    pub fn for_customer(&self, customer_id: &str) -> Vec<&Interaction> {
        let mut timeline: Vec<&Interaction> = self
            .interactions
            .iter()
            .filter(|i| i.customer_id == customer_id)
            .collect();
        timeline.sort_by(|a, b| b.date.cmp(&a.date));
        timeline
    }

    pub fn last_for_customer(&self, customer_id: &str) -> Option<&Interaction> {
        self.for_customer(customer_id).into_iter().next()
    }

    /// Follow-ups due today or later, soonest first.
    pub fn upcoming_follow_ups(&self, today: NaiveDate) -> Vec<&Interaction> {
        let mut upcoming: Vec<&Interaction> = self
            .interactions
            .iter()
            .filter(|i| i.follow_up_date.is_some_and(|d| d >= today))
            .collect();
        upcoming.sort_by_key(|i| i.follow_up_date);
        upcoming
    }

    /// Follow-ups strictly before today.
    pub fn overdue_follow_ups(&self, today: NaiveDate) -> Vec<&Interaction> {
        let mut overdue: Vec<&Interaction> = self
            .interactions
            .iter()
            .filter(|i| i.follow_up_date.is_some_and(|d| d < today))
            .collect();
        overdue.sort_by_key(|i| i.follow_up_date);
        overdue
    }

    pub fn todays_follow_up_count(&self, today: NaiveDate) -> usize {
        self.interactions
            .iter()
            .filter(|i| i.follow_up_date == Some(today))
            .count()
    }

    /// Interactions from the trailing 30 days, newest first.
    pub fn recent(&self, today: NaiveDate) -> Vec<&Interaction> {
        let cutoff = today - Duration::days(RECENT_WINDOW_DAYS);
        let mut recent: Vec<&Interaction> = self
            .interactions
            .iter()
            .filter(|i| i.date.date_naive() >= cutoff)
            .collect();
        recent.sort_by(|a, b| b.date.cmp(&a.date));
        recent
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save(keys::INTERACTIONS, &self.interactions) {
            log::warn!("failed to persist interactions: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::InteractionType;
    use chrono::{DateTime, Utc};

    fn empty_store() -> InteractionStore {
        let mut store = InteractionStore::load(Arc::new(MemoryStorage::new()));
        let ids: Vec<String> = store.interactions().iter().map(|i| i.id.clone()).collect();
        for id in ids {
            store.delete(&id);
        }
        store
    }

    fn draft(
        customer_id: &str,
        date: DateTime<Utc>,
        follow_up: Option<NaiveDate>,
    ) -> InteractionDraft {
        InteractionDraft {
            customer_id: customer_id.to_string(),
            interaction_type: InteractionType::Call,
            date,
            notes: String::new(),
            follow_up_date: follow_up,
        }
    }

    #[test]
    fn follow_up_today_is_upcoming_not_overdue() {
        let mut store = empty_store();
        let now = Utc::now();
        let today = now.date_naive();

        store.create(draft("c1", now, Some(today)));

        assert_eq!(store.upcoming_follow_ups(today).len(), 1);
        assert!(store.overdue_follow_ups(today).is_empty());
        assert_eq!(store.todays_follow_up_count(today), 1);
    }

    #[test]
    fn follow_up_classification_splits_past_and_future() {
        let mut store = empty_store();
        let now = Utc::now();
        let today = now.date_naive();

        store.create(draft("c1", now, Some(today - Duration::days(2))));
        store.create(draft("c1", now, Some(today + Duration::days(2))));
        store.create(draft("c1", now, None));

        let upcoming = store.upcoming_follow_ups(today);
        let overdue = store.overdue_follow_ups(today);
        assert_eq!(upcoming.len(), 1);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].follow_up_date, Some(today - Duration::days(2)));
    }

    #[test]
    fn customer_timeline_is_newest_first() {
        let mut store = empty_store();
        let now = Utc::now();

        store.create(draft("c1", now - Duration::days(5), None));
        let latest = store.create(draft("c1", now - Duration::days(1), None));
        store.create(draft("c2", now, None));

        let timeline = store.for_customer("c1");
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].id, latest.id);
        assert_eq!(store.last_for_customer("c1").unwrap().id, latest.id);
    }

    #[test]
    fn recent_window_excludes_old_interactions() {
        let mut store = empty_store();
        let now = Utc::now();
        let today = now.date_naive();

        store.create(draft("c1", now - Duration::days(40), None));
        store.create(draft("c1", now - Duration::days(3), None));

        assert_eq!(store.recent(today).len(), 1);
    }

    #[test]
    fn patch_can_clear_follow_up() {
        let mut store = empty_store();
        let now = Utc::now();
        let interaction = store.create(draft("c1", now, Some(now.date_naive())));

        let updated = store
            .update(
                &interaction.id,
                InteractionPatch {
                    clear_follow_up_date: true,
                    ..InteractionPatch::default()
                },
            )
            .unwrap();
        assert!(updated.follow_up_date.is_none());
    }
}
