//! Rule-driven care-plan generation for FHIR R4
//!
//! Evaluates a PlanDefinition against a patient's clinical context and
//! produces a CarePlan. Applicability conditions are written in FHIRPath and
//! evaluated by the parser and tree-walking evaluator in this crate.
//!
//! ```no_run
//! use octofhir_careplan::{CarePlanEngine, EngineConfig};
//!
//! # async fn run() -> octofhir_careplan::Result<()> {
//! let engine = CarePlanEngine::new(EngineConfig::in_memory()).await?;
//! engine.create_json(r#"{"resourceType": "Patient", "id": "p1"}"#).await?;
//! let plan = engine.generate_care_plan("plan", "p1", "visit").await?;
//! println!("{}", plan.activity.len());
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod model;
pub mod parser;
pub mod store;
pub mod workflow;

pub use config::{EngineConfig, StoreConfig};
pub use engine::CarePlanEngine;
pub use error::{CarePlanError, Result};
pub use expression::ExpressionEvaluator;
pub use model::{ClinicalRecord, FhirPathValue, GeneratedPlan, ResourceKind};
pub use parser::{ParseError, parse_expression as parse};
pub use store::{FileStore, MemoryStore, RecordId, ResourceStore};
pub use workflow::{CarePlanGenerator, PlanInterpreter};
