//! File-backed record store
//!
//! Layout: `<data_dir>/<ResourceType>/<id>.json`, one FHIR JSON document per
//! record.

use super::{RecordId, ResourceStore, matches_canonical};
use crate::error::{CarePlanError, Result};
use crate::model::{ClinicalRecord, ModelError, ResourceKind, validate_id};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Record store persisting one JSON file per record
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `data_dir`
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).await.map_err(|e| {
            CarePlanError::storage(format!("creating {}", data_dir.display()), e)
        })?;
        log::debug!("Opened file store at {}", data_dir.display());
        Ok(Self { data_dir })
    }

    /// Root directory of the store
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn kind_dir(&self, kind: &ResourceKind) -> Result<PathBuf> {
        let name = kind.as_str();
        let safe = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric());
        if !safe {
            return Err(ModelError::Decode {
                resource_type: name.to_string(),
                message: "resource type must be alphanumeric".to_string(),
            }
            .into());
        }
        Ok(self.data_dir.join(name))
    }

    fn record_path(&self, kind: &ResourceKind, id: &str) -> Result<PathBuf> {
        Ok(self.kind_dir(kind)?.join(format!("{id}.json")))
    }

    async fn read_record(path: &Path) -> Result<ClinicalRecord> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| CarePlanError::storage(format!("reading {}", path.display()), e))?;
        Ok(ClinicalRecord::from_json_str(&text)?)
    }

    async fn discard_staging(staging: &Path) {
        match fs::remove_file(staging).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not remove staging file {}: {e}", staging.display()),
        }
    }

    /// Paths of every record file of one kind
    async fn record_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CarePlanError::storage(format!("listing {}", dir.display()), e));
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CarePlanError::storage(format!("listing {}", dir.display()), e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl ResourceStore for FileStore {
    async fn create(&self, record: ClinicalRecord) -> Result<RecordId> {
        validate_id(record.id())?;
        let record_id = RecordId::of(&record);
        let dir = self.kind_dir(&record_id.kind)?;
        let path = dir.join(format!("{}.json", record_id.id));

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CarePlanError::storage(format!("creating {}", dir.display()), e))?;

        // Write the whole document aside, then link it into place: the link
        // fails if the id is taken, so readers never see a partial record.
        let staging = dir.join(format!(".{}.{}.tmp", record_id.id, Uuid::new_v4()));
        let json = serde_json::to_vec_pretty(&record.to_json())
            .map_err(|e| CarePlanError::storage("encoding record", e.into()))?;
        if let Err(e) = fs::write(&staging, json).await {
            Self::discard_staging(&staging).await;
            return Err(CarePlanError::storage(format!("writing {}", staging.display()), e));
        }

        let linked = fs::hard_link(&staging, &path).await;
        Self::discard_staging(&staging).await;

        match linked {
            Ok(()) => {
                log::debug!("Created {record_id} at {}", path.display());
                Ok(record_id)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(CarePlanError::DuplicateId {
                kind: record_id.kind,
                id: record_id.id,
            }),
            Err(e) => Err(CarePlanError::storage(
                format!("writing {}", path.display()),
                e,
            )),
        }
    }

    async fn get(&self, kind: &ResourceKind, id: &str) -> Result<ClinicalRecord> {
        let not_found = || CarePlanError::NotFound {
            kind: kind.clone(),
            id: id.to_string(),
        };
        if validate_id(id).is_err() {
            return Err(not_found());
        }

        let path = self.record_path(kind, id)?;
        match fs::try_exists(&path).await {
            Ok(true) => Self::read_record(&path).await,
            Ok(false) => Err(not_found()),
            Err(e) => Err(CarePlanError::storage(
                format!("checking {}", path.display()),
                e,
            )),
        }
    }

    async fn find_by_url(
        &self,
        kind: &ResourceKind,
        url: &str,
        version: Option<&str>,
    ) -> Result<Option<ClinicalRecord>> {
        let dir = self.kind_dir(kind)?;
        let mut best: Option<ClinicalRecord> = None;
        for path in Self::record_files(&dir).await? {
            let record = Self::read_record(&path).await?;
            if !matches_canonical(&record, url, version) {
                continue;
            }
            if best.as_ref().is_none_or(|current| record.id() < current.id()) {
                best = Some(record);
            }
        }
        Ok(best)
    }

    async fn count(&self) -> Result<usize> {
        let mut entries = fs::read_dir(&self.data_dir).await.map_err(|e| {
            CarePlanError::storage(format!("listing {}", self.data_dir.display()), e)
        })?;

        let mut total = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            CarePlanError::storage(format!("listing {}", self.data_dir.display()), e)
        })? {
            let is_dir = entry.file_type().await.is_ok_and(|kind| kind.is_dir());
            if is_dir {
                total += Self::record_files(&entry.path()).await?.len();
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityDefinition, Encounter, Patient, Reference};
    use pretty_assertions::assert_eq;
    use serde_json::Map;
    use tempfile::TempDir;

    fn encounter() -> ClinicalRecord {
        Encounter {
            id: "Test-Encounter".to_string(),
            status: Some("in-progress".to_string()),
            subject: Some(Reference::to("Patient", "Test-Patient")),
            extra: Map::new(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_layout_and_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let record = encounter();
        store.create(record.clone()).await.unwrap();

        assert!(dir.path().join("Encounter/Test-Encounter.json").exists());
        assert_eq!(
            store
                .get(&ResourceKind::Encounter, "Test-Encounter")
                .await
                .unwrap(),
            record
        );
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.create(Patient::new("Test-Patient").into()).await.unwrap();
            store.create(encounter()).await.unwrap();
        }

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        assert!(matches!(
            reopened.create(Patient::new("Test-Patient").into()).await,
            Err(CarePlanError::DuplicateId { .. })
        ));
        assert_eq!(reopened.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_records() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        assert!(matches!(
            store.get(&ResourceKind::Patient, "absent").await,
            Err(CarePlanError::NotFound { .. })
        ));
        assert!(matches!(
            store.get(&ResourceKind::Patient, "../escape").await,
            Err(CarePlanError::NotFound { .. })
        ));
        assert!(
            store
                .find_by_url(&ResourceKind::ActivityDefinition, "http://example.org/x", None)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_find_by_url() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let url = "http://example.org/ActivityDefinition/ADTest";
        store
            .create(ActivityDefinition::new("ADTest", url).into())
            .await
            .unwrap();

        let found = store
            .find_by_url(&ResourceKind::ActivityDefinition, url, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), "ADTest");
    }

    #[tokio::test]
    async fn test_find_by_url_prefers_version_then_lowest_id() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let url = "http://example.org/ActivityDefinition/AD";
        // `a-b.json` sorts before `a.json` on disk; ids must still compare as ids
        for (id, version) in [("a-b", "v2"), ("a", "v1")] {
            let mut definition = ActivityDefinition::new(id, url);
            definition.version = Some(version.to_string());
            store.create(definition.into()).await.unwrap();
        }
        let kind = ResourceKind::ActivityDefinition;

        let unpinned = store.find_by_url(&kind, url, None).await.unwrap().unwrap();
        assert_eq!(unpinned.id(), "a");
        let pinned = store.find_by_url(&kind, url, Some("v2")).await.unwrap().unwrap();
        assert_eq!(pinned.id(), "a-b");
        assert!(store.find_by_url(&kind, url, Some("v3")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_staging_files_are_removed() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.create(Patient::new("p1").into()).await.unwrap();
        assert!(matches!(
            store.create(Patient::new("p1").into()).await,
            Err(CarePlanError::DuplicateId { .. })
        ));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("Patient"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");

        let staging = dir.path().join(".p2.partial.tmp");
        std::fs::write(&staging, b"{").unwrap();
        FileStore::discard_staging(&staging).await;
        assert!(!staging.exists());
        // already gone is fine
        FileStore::discard_staging(&staging).await;
    }
}
