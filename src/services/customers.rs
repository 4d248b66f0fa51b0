//! Customer store.

use std::sync::Arc;

use chrono::Utc;

use crate::samples;
use crate::storage::{keys, load_or_sample, DataOrigin, Storage, StorageExt};
use crate::types::{Customer, CustomerDraft, CustomerPatch, CustomerStats, CustomerStatus};
use crate::util::generate_id;

pub struct CustomerStore {
    storage: Arc<dyn Storage>,
    customers: Vec<Customer>,
    origin: DataOrigin,
}

impl CustomerStore {
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let now = Utc::now();
        let (customers, origin) = load_or_sample(storage.as_ref(), keys::CUSTOMERS, || {
            samples::sample_customers(now)
        });
        Self {
            storage,
            customers,
            origin,
        }
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    pub fn get(&self, id: &str) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == id)
    }

    pub fn create(&mut self, draft: CustomerDraft) -> Customer {
        let now = Utc::now();
        let customer = Customer {
            id: generate_id(),
            name: draft.name,
            company: draft.company,
            email: draft.email,
            phone: draft.phone,
            status: draft.status.unwrap_or(CustomerStatus::Prospect),
            tags: draft.tags,
            address: draft.address,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        self.customers.insert(0, customer.clone());
        self.persist();
        customer
    }

    pub fn update(&mut self, id: &str, patch: CustomerPatch) -> Option<Customer> {
        let customer = self.customers.iter_mut().find(|c| c.id == id)?;
        if let Some(name) = patch.name {
            customer.name = name;
        }
        if let Some(company) = patch.company {
            customer.company = company;
        }
        if let Some(email) = patch.email {
            customer.email = email;
        }
        if let Some(phone) = patch.phone {
            customer.phone = phone;
        }
        if let Some(status) = patch.status {
            customer.status = status;
        }
        if let Some(tags) = patch.tags {
            customer.tags = tags;
        }
        if let Some(address) = patch.address {
            customer.address = address;
        }
        if let Some(notes) = patch.notes {
            customer.notes = notes;
        }
        customer.updated_at = Utc::now();
        let updated = customer.clone();
        self.persist();
        Some(updated)
    }

    /// Removes only the customer record. Owned deals are cleaned up by the
    /// session-level cascade, not here.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.customers.len();
        self.customers.retain(|c| c.id != id);
        if self.customers.len() == before {
            return false;
        }
        self.persist();
        true
    }

    pub fn with_status(&self, status: CustomerStatus) -> Vec<&Customer> {
        self.customers
            .iter()
            .filter(|c| c.status == status)
            .collect()
    }

    pub fn with_tag(&self, tag: &str) -> Vec<&Customer> {
        self.customers
            .iter()
            .filter(|c| c.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    /// Case-insensitive substring match over name, company, and email.
    pub fn search(&self, query: &str) -> Vec<&Customer> {
        let needle = query.to_lowercase();
        self.customers
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&needle)
                    || c.company.to_lowercase().contains(&needle)
                    || c.email.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn stats(&self) -> CustomerStats {
        CustomerStats {
            total: self.customers.len(),
            active: self
                .customers
                .iter()
                .filter(|c| c.status == CustomerStatus::Active)
                .count(),
            prospects: self
                .customers
                .iter()
                .filter(|c| c.status == CustomerStatus::Prospect)
                .count(),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save(keys::CUSTOMERS, &self.customers) {
            log::warn!("failed to persist customers: {}", e);
        }
    }
}
