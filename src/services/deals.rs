//! Deal store and pipeline statistics.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use crate::samples;
use crate::storage::{keys, load_or_sample, DataOrigin, Storage, StorageExt};
use crate::types::{Deal, DealDraft, DealPatch, DealStage, DealStats};
use crate::util::generate_id;

/// Horizon for the "upcoming" pipeline view.
const UPCOMING_WINDOW_DAYS: i64 = 30;

pub struct DealStore {
    storage: Arc<dyn Storage>,
    deals: Vec<Deal>,
    origin: DataOrigin,
}

impl DealStore {
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let now = Utc::now();
        let (deals, origin) =
            load_or_sample(storage.as_ref(), keys::DEALS, || samples::sample_deals(now));
        Self {
            storage,
            deals,
            origin,
        }
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    pub fn get(&self, id: &str) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == id)
    }

    pub fn create(&mut self, draft: DealDraft) -> Deal {
        let now = Utc::now();
        let deal = Deal {
            id: generate_id(),
            customer_id: draft.customer_id,
            title: draft.title,
            value: draft.value,
            stage: draft.stage.unwrap_or(DealStage::Lead),
            expected_close: draft.expected_close,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        self.deals.insert(0, deal.clone());
        self.persist();
        deal
    }

    pub fn update(&mut self, id: &str, patch: DealPatch) -> Option<Deal> {
        let deal = self.deals.iter_mut().find(|d| d.id == id)?;
        if let Some(title) = patch.title {
            deal.title = title;
        }
        if let Some(value) = patch.value {
            deal.value = value;
        }
        if let Some(stage) = patch.stage {
            deal.stage = stage;
        }
        if patch.clear_expected_close {
            deal.expected_close = None;
        } else if let Some(close) = patch.expected_close {
            deal.expected_close = Some(close);
        }
        if let Some(notes) = patch.notes {
            deal.notes = notes;
        }
        deal.updated_at = Utc::now();
        let updated = deal.clone();
        self.persist();
        Some(updated)
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.deals.len();
        self.deals.retain(|d| d.id != id);
        if self.deals.len() == before {
            return false;
        }
        self.persist();
        true
    }

    /// Sugar over [`Self::update`] for pipeline drag-and-drop.
    pub fn move_stage(&mut self, id: &str, stage: DealStage) -> Option<Deal> {
        self.update(
            id,
            DealPatch {
                stage: Some(stage),
                ..DealPatch::default()
            },
        )
    }

    pub fn for_customer(&self, customer_id: &str) -> Vec<&Deal> {
        self.deals
            .iter()
            .filter(|d| d.customer_id == customer_id)
            .collect()
    }

    /// Delete every deal owned by `customer_id`, returning how many went.
    /// Called from the session-level customer cascade.
    pub fn delete_for_customer(&mut self, customer_id: &str) -> usize {
        let before = self.deals.len();
        self.deals.retain(|d| d.customer_id != customer_id);
        let removed = before - self.deals.len();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    pub fn with_stage(&self, stage: DealStage) -> Vec<&Deal> {
        self.deals.iter().filter(|d| d.stage == stage).collect()
    }

    /// Pipeline-ordered grouping for the board view.
    pub fn by_stage(&self) -> Vec<(DealStage, Vec<&Deal>)> {
        DealStage::ALL
            .iter()
            .map(|&stage| (stage, self.with_stage(stage)))
            .collect()
    }

    /// Open deals expected to close within the next 30 days (past-due
    /// expected closes included), soonest first.
    pub fn upcoming(&self, today: NaiveDate) -> Vec<&Deal> {
        let horizon = today + Duration::days(UPCOMING_WINDOW_DAYS);
        let mut upcoming: Vec<&Deal> = self
            .deals
            .iter()
            .filter(|d| !d.stage.is_closed())
            .filter(|d| d.expected_close.is_some_and(|close| close <= horizon))
            .collect();
        upcoming.sort_by_key(|d| d.expected_close);
        upcoming
    }

    pub fn stats(&self) -> DealStats {
        let open: Vec<&Deal> = self.deals.iter().filter(|d| !d.stage.is_closed()).collect();
        let won: Vec<&Deal> = self.with_stage(DealStage::ClosedWon);
        let lost: Vec<&Deal> = self.with_stage(DealStage::ClosedLost);

        let sum = |deals: &[&Deal]| deals.iter().map(|d| d.value).sum::<f64>();
        let total_closed = won.len() + lost.len();
        let conversion_rate = if total_closed > 0 {
            (won.len() as f64 / total_closed as f64 * 100.0).round() as u32
        } else {
            0
        };

        DealStats {
            total_deals: self.deals.len(),
            open_deals: open.len(),
            closed_won: won.len(),
            closed_lost: lost.len(),
            pipeline_value: sum(&open),
            closed_won_value: sum(&won),
            closed_lost_value: sum(&lost),
            conversion_rate,
        }
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save(keys::DEALS, &self.deals) {
            log::warn!("failed to persist deals: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn empty_store() -> DealStore {
        let mut store = DealStore::load(Arc::new(MemoryStorage::new()));
        let ids: Vec<String> = store.deals().iter().map(|d| d.id.clone()).collect();
        for id in ids {
            store.delete(&id);
        }
        store
    }

    fn draft(title: &str, value: f64, stage: DealStage) -> DealDraft {
        DealDraft {
            customer_id: "customer-1".to_string(),
            title: title.to_string(),
            value,
            stage: Some(stage),
            ..DealDraft::default()
        }
    }

    #[test]
    fn conversion_rate_rounds_to_nearest_percent() {
        let mut store = empty_store();
        store.create(draft("w1", 100.0, DealStage::ClosedWon));
        store.create(draft("w2", 100.0, DealStage::ClosedWon));
        store.create(draft("w3", 100.0, DealStage::ClosedWon));
        store.create(draft("l1", 100.0, DealStage::ClosedLost));

        assert_eq!(store.stats().conversion_rate, 75);
    }

    #[test]
    fn conversion_rate_is_zero_without_closed_deals() {
        let mut store = empty_store();
        store.create(draft("open", 5_000.0, DealStage::Proposal));
        assert_eq!(store.stats().conversion_rate, 0);
    }

    #[test]
    fn pipeline_value_excludes_closed_stages() {
        let mut store = empty_store();
        store.create(draft("lead", 1_000.0, DealStage::Lead));
        store.create(draft("negotiation", 2_000.0, DealStage::Negotiation));
        store.create(draft("won", 10_000.0, DealStage::ClosedWon));
        store.create(draft("lost", 7_000.0, DealStage::ClosedLost));

        let stats = store.stats();
        assert_eq!(stats.pipeline_value, 3_000.0);
        assert_eq!(stats.closed_won_value, 10_000.0);
        assert_eq!(stats.closed_lost_value, 7_000.0);
        assert_eq!(stats.open_deals, 2);
    }

    #[test]
    fn upcoming_is_open_within_horizon_sorted_soonest_first() {
        let mut store = empty_store();
        let today = Utc::now().date_naive();

        store.create(DealDraft {
            expected_close: Some(today + Duration::days(20)),
            ..draft("later", 1.0, DealStage::Proposal)
        });
        store.create(DealDraft {
            expected_close: Some(today + Duration::days(5)),
            ..draft("soon", 1.0, DealStage::Lead)
        });
        store.create(DealDraft {
            expected_close: Some(today + Duration::days(45)),
            ..draft("beyond horizon", 1.0, DealStage::Lead)
        });
        store.create(DealDraft {
            expected_close: Some(today + Duration::days(3)),
            ..draft("closed already", 1.0, DealStage::ClosedWon)
        });

        let upcoming = store.upcoming(today);
        let titles: Vec<&str> = upcoming.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["soon", "later"]);
    }

    #[test]
    fn move_stage_updates_in_place() {
        let mut store = empty_store();
        let deal = store.create(draft("mover", 500.0, DealStage::Lead));
        let moved = store.move_stage(&deal.id, DealStage::Contacted).unwrap();
        assert_eq!(moved.stage, DealStage::Contacted);
        assert_eq!(store.with_stage(DealStage::Lead).len(), 0);
    }

    #[test]
    fn delete_for_customer_removes_only_their_deals() {
        let mut store = empty_store();
        store.create(draft("mine", 1.0, DealStage::Lead));
        store.create(DealDraft {
            customer_id: "customer-2".to_string(),
            ..draft("theirs", 1.0, DealStage::Lead)
        });

        assert_eq!(store.delete_for_customer("customer-1"), 1);
        assert_eq!(store.deals().len(), 1);
        assert_eq!(store.deals()[0].customer_id, "customer-2");
    }
}
