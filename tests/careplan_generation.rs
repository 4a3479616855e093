//! End-to-end care-plan generation scenarios

use octofhir_careplan::model::CarePlanActivity;
use octofhir_careplan::{
    CarePlanEngine, CarePlanError, ClinicalRecord, GeneratedPlan, ResourceKind, Result,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

mod utils;
use utils::*;

fn canonicals(activities: &[CarePlanActivity]) -> Vec<String> {
    activities
        .iter()
        .map(|activity| activity.detail.instantiates_canonical.join(","))
        .collect()
}

async fn generate(engine: &CarePlanEngine, plan_id: &str) -> Result<GeneratedPlan> {
    engine
        .generate_care_plan(plan_id, "Test-Patient", "Test-Encounter")
        .await
}

#[tokio::test]
async fn unconditional_action_yields_one_activity() {
    let engine = seeded_engine().await;
    store(
        &engine,
        plan_definition(
            "Test-PlanDefinition",
            vec![json!({"definitionCanonical": AD_TEST_URL})],
        ),
    )
    .await;

    let plan = generate(&engine, "Test-PlanDefinition").await.unwrap();

    assert_eq!(plan.status, "draft");
    assert_eq!(plan.intent, "plan");
    assert_eq!(plan.instantiates_canonical, vec!["PlanDefinition/Test-PlanDefinition"]);
    assert_eq!(plan.subject.reference.as_deref(), Some("Patient/Test-Patient"));
    assert_eq!(
        plan.encounter.as_ref().and_then(|e| e.reference.as_deref()),
        Some("Encounter/Test-Encounter")
    );
    assert!(plan.created.is_some());

    assert_eq!(plan.activity.len(), 1);
    let detail = &plan.activity[0].detail;
    assert_eq!(detail.status, "not-started");
    assert_eq!(detail.kind.as_deref(), Some("ServiceRequest"));
    assert_eq!(detail.description.as_deref(), Some("Activity ADTest"));
    assert_eq!(detail.instantiates_canonical, vec![AD_TEST_URL]);
    assert_eq!(
        detail.subject.as_ref().and_then(|s| s.reference.as_deref()),
        Some("Patient/Test-Patient")
    );
}

#[tokio::test]
async fn literal_true_condition_matches_unconditional_action() {
    let engine = seeded_engine().await;
    store(
        &engine,
        plan_definition(
            "Test-PlanDefinition",
            vec![json!({"definitionCanonical": AD_TEST_URL})],
        ),
    )
    .await;
    store(
        &engine,
        plan_definition(
            "Test-PlanDefinitionCondition",
            vec![json!({
                "condition": [condition("true")],
                "definitionCanonical": AD_TEST_URL
            })],
        ),
    )
    .await;

    let unconditional = generate(&engine, "Test-PlanDefinition").await.unwrap();
    let conditional = generate(&engine, "Test-PlanDefinitionCondition").await.unwrap();

    assert_eq!(conditional.activity.len(), 1);
    assert_eq!(conditional.activity, unconditional.activity);
    assert_ne!(conditional.id, unconditional.id);
}

#[tokio::test]
async fn activities_follow_action_order() {
    let engine = seeded_engine().await;
    for id in ["first", "second", "third"] {
        store(
            &engine,
            activity_definition(id, &format!("http://example.org/ActivityDefinition/{id}")),
        )
        .await;
    }
    store(
        &engine,
        plan_definition(
            "ordered",
            vec![
                json!({"definitionCanonical": "http://example.org/ActivityDefinition/third"}),
                json!({"definitionCanonical": "http://example.org/ActivityDefinition/first"}),
                json!({"definitionCanonical": "http://example.org/ActivityDefinition/second"}),
            ],
        ),
    )
    .await;

    let plan = generate(&engine, "ordered").await.unwrap();
    assert_eq!(
        canonicals(&plan.activity),
        vec![
            "http://example.org/ActivityDefinition/third",
            "http://example.org/ActivityDefinition/first",
            "http://example.org/ActivityDefinition/second",
        ]
    );
}

#[tokio::test]
async fn false_condition_skips_action() {
    let engine = seeded_engine().await;
    store(
        &engine,
        plan_definition(
            "gendered",
            vec![
                json!({
                    "id": "male-only",
                    "condition": [condition("%patient.gender = 'male'")],
                    "definitionCanonical": AD_TEST_URL
                }),
                json!({
                    "id": "female-in-progress",
                    "condition": [
                        condition("%patient.gender = 'female'"),
                        condition("%encounter.status = 'in-progress'")
                    ],
                    "definitionCanonical": AD_TEST_URL
                }),
            ],
        ),
    )
    .await;

    let plan = generate(&engine, "gendered").await.unwrap();
    assert_eq!(plan.activity.len(), 1);
    assert_eq!(plan.activity[0].action_id.as_deref(), Some("female-in-progress"));
}

#[tokio::test]
async fn short_circuits_on_first_false_condition() {
    let engine = seeded_engine().await;
    // the second condition would fail to evaluate if it were reached
    store(
        &engine,
        plan_definition(
            "short-circuit",
            vec![json!({
                "condition": [condition("false"), condition("%patient.deceased")],
                "definitionCanonical": AD_TEST_URL
            })],
        ),
    )
    .await;

    let plan = generate(&engine, "short-circuit").await.unwrap();
    assert!(plan.activity.is_empty());
}

#[tokio::test]
async fn start_and_stop_conditions_are_ignored() {
    let engine = seeded_engine().await;
    store(
        &engine,
        plan_definition(
            "triggers",
            vec![json!({
                "condition": [{
                    "kind": "start",
                    "expression": {"language": "text/fhirpath", "expression": "false"}
                }],
                "definitionCanonical": AD_TEST_URL
            })],
        ),
    )
    .await;

    let plan = generate(&engine, "triggers").await.unwrap();
    assert_eq!(plan.activity.len(), 1);
}

#[tokio::test]
async fn canonical_resolution_fallbacks() {
    let engine = seeded_engine().await;
    store(
        &engine,
        json!({"resourceType": "ActivityDefinition", "id": "local", "status": "active"}),
    )
    .await;
    store(
        &engine,
        plan_definition(
            "fallbacks",
            vec![
                json!({"definitionCanonical": format!("{AD_TEST_URL}|1.0.0")}),
                json!({"definitionCanonical": "http://elsewhere.org/fhir/ActivityDefinition/local"}),
                json!({"definitionCanonical": "local"}),
            ],
        ),
    )
    .await;

    let plan = generate(&engine, "fallbacks").await.unwrap();
    assert_eq!(plan.activity.len(), 3);
    assert_eq!(
        plan.activity[0].detail.description.as_deref(),
        Some("Activity ADTest")
    );
}

#[tokio::test]
async fn versioned_canonical_picks_matching_definition() {
    const URL: &str = "http://example.org/ActivityDefinition/AD";

    for _ in 0..10 {
        let engine = seeded_engine().await;
        for version in ["v3", "v1", "v4", "v2"] {
            store(
                &engine,
                json!({
                    "resourceType": "ActivityDefinition",
                    "id": format!("ad-{version}"),
                    "url": URL,
                    "version": version,
                    "status": "active",
                    "description": version
                }),
            )
            .await;
        }
        store(
            &engine,
            plan_definition(
                "versions",
                vec![
                    json!({"definitionCanonical": format!("{URL}|v2")}),
                    json!({"definitionCanonical": URL}),
                ],
            ),
        )
        .await;
        store(
            &engine,
            plan_definition(
                "unknown-version",
                vec![json!({"definitionCanonical": format!("{URL}|v9")})],
            ),
        )
        .await;

        let plan = generate(&engine, "versions").await.unwrap();
        let descriptions: Vec<_> = plan
            .activity
            .iter()
            .map(|activity| activity.detail.description.as_deref())
            .collect();
        assert_eq!(descriptions, vec![Some("v2"), Some("v1")]);

        let error = generate(&engine, "unknown-version").await.unwrap_err();
        assert!(matches!(
            error.innermost(),
            CarePlanError::UnresolvedReference { reference, .. } if reference == &format!("{URL}|v9")
        ));
    }
}

#[tokio::test]
async fn unresolved_canonical_fails_whole_request() {
    let engine = seeded_engine().await;
    store(
        &engine,
        plan_definition(
            "dangling",
            vec![
                json!({"definitionCanonical": AD_TEST_URL}),
                json!({
                    "action": [
                        {"definitionCanonical": AD_TEST_URL},
                        {"definitionCanonical": "http://example.org/ActivityDefinition/missing"}
                    ]
                }),
            ],
        ),
    )
    .await;

    let error = generate(&engine, "dangling").await.unwrap_err();
    match &error {
        CarePlanError::ActionFailed {
            plan_definition_id,
            action_path,
            source,
        } => {
            assert_eq!(plan_definition_id, "dangling");
            assert_eq!(action_path, "1.1");
            assert!(matches!(
                source.as_ref(),
                CarePlanError::UnresolvedReference { reference, .. }
                    if reference == "http://example.org/ActivityDefinition/missing"
            ));
        }
        other => panic!("Expected ActionFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_language_aborts() {
    let engine = seeded_engine().await;
    store(
        &engine,
        plan_definition(
            "cql",
            vec![json!({
                "condition": [{
                    "kind": "applicability",
                    "expression": {"language": "text/cql", "expression": "true"}
                }],
                "definitionCanonical": AD_TEST_URL
            })],
        ),
    )
    .await;

    let error = generate(&engine, "cql").await.unwrap_err();
    assert!(matches!(
        error.innermost(),
        CarePlanError::UnsupportedLanguage { language } if language == "text/cql"
    ));
}

#[tokio::test]
async fn non_boolean_condition_is_an_error() {
    let engine = seeded_engine().await;
    store(
        &engine,
        plan_definition(
            "stringly",
            vec![json!({
                "condition": [condition("%patient.gender")],
                "definitionCanonical": AD_TEST_URL
            })],
        ),
    )
    .await;

    let error = generate(&engine, "stringly").await.unwrap_err();
    assert!(matches!(error.innermost(), CarePlanError::Evaluation { .. }));
}

#[tokio::test]
async fn nested_actions_follow_their_parent() {
    let engine = seeded_engine().await;
    store(
        &engine,
        activity_definition("child", "http://example.org/ActivityDefinition/child"),
    )
    .await;
    store(
        &engine,
        plan_definition(
            "nested",
            vec![
                json!({
                    "id": "parent",
                    "definitionCanonical": AD_TEST_URL,
                    "action": [
                        {"id": "child-a", "definitionCanonical": "http://example.org/ActivityDefinition/child"},
                        {"id": "child-b", "definitionCanonical": "http://example.org/ActivityDefinition/child"}
                    ]
                }),
                json!({
                    "id": "skipped-group",
                    "condition": [condition("false")],
                    "action": [{"id": "never", "definitionCanonical": AD_TEST_URL}]
                }),
                json!({"id": "last", "definitionCanonical": AD_TEST_URL}),
            ],
        ),
    )
    .await;

    let plan = generate(&engine, "nested").await.unwrap();
    let ids: Vec<_> = plan
        .activity
        .iter()
        .map(|activity| activity.action_id.as_deref().unwrap_or("-"))
        .collect();
    assert_eq!(ids, vec!["parent", "child-a", "child-b", "last"]);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let engine = seeded_engine().await;
    store(
        &engine,
        plan_definition("known", vec![json!({"definitionCanonical": AD_TEST_URL})]),
    )
    .await;

    let error = generate(&engine, "unknown").await.unwrap_err();
    assert!(matches!(
        error,
        CarePlanError::NotFound { kind: ResourceKind::PlanDefinition, ref id } if id == "unknown"
    ));

    let error = engine
        .generate_care_plan("known", "nobody", "Test-Encounter")
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        CarePlanError::NotFound {
            kind: ResourceKind::Patient,
            ..
        }
    ));

    let error = engine
        .generate_care_plan("known", "Test-Patient", "nowhere")
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        CarePlanError::NotFound {
            kind: ResourceKind::Encounter,
            ..
        }
    ));
}

#[tokio::test]
async fn generated_plan_is_not_stored() {
    let engine = seeded_engine().await;
    store(
        &engine,
        plan_definition("p", vec![json!({"definitionCanonical": AD_TEST_URL})]),
    )
    .await;
    let before = engine.store().count().await.unwrap();

    let plan = generate(&engine, "p").await.unwrap();
    assert_eq!(engine.store().count().await.unwrap(), before);

    // the caller may persist it
    engine.create(ClinicalRecord::CarePlan(plan.clone())).await.unwrap();
    let stored = engine.get(&ResourceKind::CarePlan, &plan.id).await.unwrap();
    assert_eq!(stored, ClinicalRecord::CarePlan(plan));
}

#[tokio::test]
async fn create_get_and_duplicate() {
    let engine = seeded_engine().await;

    let stored = engine.get(&ResourceKind::Patient, "Test-Patient").await.unwrap();
    assert_eq!(stored.to_json(), patient());

    let error = engine.create_json(&patient().to_string()).await.unwrap_err();
    assert!(matches!(error, CarePlanError::DuplicateId { .. }));
    assert_eq!(engine.store().count().await.unwrap(), 3);

    let error = engine.create_json("{\"resourceType\": \"Patient\"}").await.unwrap_err();
    assert!(matches!(error, CarePlanError::InvalidResource(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_generation() {
    let engine = Arc::new(seeded_engine().await);
    store(
        &engine,
        plan_definition(
            "shared",
            vec![json!({
                "condition": [condition("%patient.gender = 'female'")],
                "definitionCanonical": AD_TEST_URL
            })],
        ),
    )
    .await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .generate_care_plan("shared", "Test-Patient", "Test-Encounter")
                .await
        }));
    }

    for handle in handles {
        let plan = handle.await.unwrap().unwrap();
        assert_eq!(plan.activity.len(), 1);
    }
}
