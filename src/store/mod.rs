//! Keyed storage of clinical records
//!
//! Records are keyed by resource kind and id. The store is append-only:
//! records can be created and read back, never updated or deleted.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::model::{ClinicalRecord, ResourceKind};
use async_trait::async_trait;

/// Identity of a stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Resource kind
    pub kind: ResourceKind,
    /// Logical id
    pub id: String,
}

impl RecordId {
    /// Identity of `record`
    pub fn of(record: &ClinicalRecord) -> Self {
        Self {
            kind: record.kind(),
            id: record.id().to_string(),
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Durable keyed storage of clinical records
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Persist a new record; fails with `DuplicateId` when the kind already
    /// holds that id, leaving the store unchanged
    async fn create(&self, record: ClinicalRecord) -> Result<RecordId>;

    /// Read a record back; fails with `NotFound` when absent
    async fn get(&self, kind: &ResourceKind, id: &str) -> Result<ClinicalRecord>;

    /// Record of `kind` whose canonical url equals `url` and, when `version`
    /// is given, whose business version equals it; ties go to the lowest id
    async fn find_by_url(
        &self,
        kind: &ResourceKind,
        url: &str,
        version: Option<&str>,
    ) -> Result<Option<ClinicalRecord>>;

    /// Total number of stored records
    async fn count(&self) -> Result<usize>;
}

/// Whether `record` carries canonical `url` and, when given, business `version`
fn matches_canonical(record: &ClinicalRecord, url: &str, version: Option<&str>) -> bool {
    record.url() == Some(url) && version.is_none_or(|version| record.version() == Some(version))
}
