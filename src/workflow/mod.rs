//! Plan interpretation and care-plan generation

pub mod activity;
pub mod generator;
pub mod interpreter;

pub use activity::{ActivityBinding, instantiate};
pub use generator::CarePlanGenerator;
pub use interpreter::{ActionOutcome, ActionState, PlanContext, PlanInterpreter};
