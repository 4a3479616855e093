//! Care-plan engine - the main entry point

use crate::config::{EngineConfig, StoreConfig};
use crate::error::Result;
use crate::expression::ExpressionEvaluator;
use crate::model::{ClinicalRecord, FhirPathValue, GeneratedPlan, ResourceKind};
use crate::store::{FileStore, MemoryStore, RecordId, ResourceStore};
use crate::workflow::CarePlanGenerator;
use std::sync::Arc;

/// Store, expression evaluator and generator wired together from one
/// [`EngineConfig`]
pub struct CarePlanEngine {
    store: Arc<dyn ResourceStore>,
    evaluator: Arc<ExpressionEvaluator>,
    generator: CarePlanGenerator,
}

impl CarePlanEngine {
    /// Build an engine, opening the configured store
    pub async fn new(config: EngineConfig) -> Result<Self> {
        let store: Arc<dyn ResourceStore> = match &config.store {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::Directory(dir) => Arc::new(FileStore::open(dir.clone()).await?),
        };
        log::debug!("Engine configured with {config:?}");
        Ok(Self::with_store(store, &config))
    }

    /// Build an engine over an existing store
    pub fn with_store(store: Arc<dyn ResourceStore>, config: &EngineConfig) -> Self {
        let evaluator = Arc::new(ExpressionEvaluator::new(
            config.expression_cache_size,
            config.strict_paths,
        ));
        let generator = CarePlanGenerator::new(Arc::clone(&store), Arc::clone(&evaluator));
        Self {
            store,
            evaluator,
            generator,
        }
    }

    /// Persist a new record
    pub async fn create(&self, record: ClinicalRecord) -> Result<RecordId> {
        self.store.create(record).await
    }

    /// Decode FHIR JSON text and persist it
    pub async fn create_json(&self, text: &str) -> Result<RecordId> {
        let record = ClinicalRecord::from_json_str(text)?;
        self.store.create(record).await
    }

    /// Read a record back
    pub async fn get(&self, kind: &ResourceKind, id: &str) -> Result<ClinicalRecord> {
        self.store.get(kind, id).await
    }

    /// Generate a CarePlan; see [`CarePlanGenerator::generate_care_plan`]
    pub async fn generate_care_plan(
        &self,
        plan_definition_id: &str,
        patient_id: &str,
        encounter_id: &str,
    ) -> Result<GeneratedPlan> {
        self.generator
            .generate_care_plan(plan_definition_id, patient_id, encounter_id)
            .await
    }

    /// Evaluate an expression against records; see [`ExpressionEvaluator::evaluate`]
    pub fn evaluate(
        &self,
        language: &str,
        expression: &str,
        records: &[&ClinicalRecord],
    ) -> Result<FhirPathValue> {
        self.evaluator.evaluate(language, expression, records)
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }
}
