//! Shared fixtures for integration tests

#![allow(dead_code)]

use octofhir_careplan::{CarePlanEngine, ClinicalRecord, EngineConfig};
use serde_json::{Value, json};

pub const AD_TEST_URL: &str = "http://example.org/ActivityDefinition/ADTest";

pub fn patient() -> Value {
    json!({
        "resourceType": "Patient",
        "id": "Test-Patient",
        "gender": "female"
    })
}

pub fn encounter() -> Value {
    json!({
        "resourceType": "Encounter",
        "id": "Test-Encounter",
        "status": "in-progress",
        "subject": {"reference": "Patient/Test-Patient"}
    })
}

pub fn activity_definition(id: &str, url: &str) -> Value {
    json!({
        "resourceType": "ActivityDefinition",
        "id": id,
        "url": url,
        "version": "1.0.0",
        "status": "active",
        "kind": "ServiceRequest",
        "description": format!("Activity {id}")
    })
}

/// A FHIRPath applicability condition
pub fn condition(expression: &str) -> Value {
    json!({
        "kind": "applicability",
        "expression": {"language": "text/fhirpath", "expression": expression}
    })
}

pub fn plan_definition(id: &str, actions: Vec<Value>) -> Value {
    json!({
        "resourceType": "PlanDefinition",
        "id": id,
        "status": "active",
        "action": actions
    })
}

pub async fn store(engine: &CarePlanEngine, resource: Value) {
    let record = ClinicalRecord::from_json(resource).expect("fixture decodes");
    engine.create(record).await.expect("fixture is stored");
}

/// In-memory engine holding the patient, the encounter and ADTest
pub async fn seeded_engine() -> CarePlanEngine {
    let engine = CarePlanEngine::new(EngineConfig::in_memory())
        .await
        .expect("in-memory engine");
    store(&engine, patient()).await;
    store(&engine, encounter()).await;
    store(&engine, activity_definition("ADTest", AD_TEST_URL)).await;
    engine
}
