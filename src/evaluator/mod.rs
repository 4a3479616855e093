//! FHIRPath expression evaluator
//!
//! Walks the parsed AST against a context of FHIR resources. Values follow
//! FHIRPath collection semantics; boolean operators use three-valued logic.

mod context;
mod engine;
mod error;
mod functions;

pub use context::EvaluationContext;
pub use engine::FhirPathEngine;
pub use error::{EvaluationError, EvaluationResult};
