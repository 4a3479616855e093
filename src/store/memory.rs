//! Process-local record store

use super::{RecordId, ResourceStore, matches_canonical};
use crate::error::{CarePlanError, Result};
use crate::model::{ClinicalRecord, ResourceKind, validate_id};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Record store backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<(ResourceKind, String), ClinicalRecord>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn create(&self, record: ClinicalRecord) -> Result<RecordId> {
        validate_id(record.id())?;
        let record_id = RecordId::of(&record);

        match self
            .records
            .entry((record_id.kind.clone(), record_id.id.clone()))
        {
            Entry::Occupied(_) => Err(CarePlanError::DuplicateId {
                kind: record_id.kind,
                id: record_id.id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                log::debug!("Created {record_id}");
                Ok(record_id)
            }
        }
    }

    async fn get(&self, kind: &ResourceKind, id: &str) -> Result<ClinicalRecord> {
        self.records
            .get(&(kind.clone(), id.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CarePlanError::NotFound {
                kind: kind.clone(),
                id: id.to_string(),
            })
    }

    async fn find_by_url(
        &self,
        kind: &ResourceKind,
        url: &str,
        version: Option<&str>,
    ) -> Result<Option<ClinicalRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| {
                &entry.key().0 == kind && matches_canonical(entry.value(), url, version)
            })
            .min_by(|a, b| a.key().1.cmp(&b.key().1))
            .map(|entry| entry.value().clone()))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }
}
