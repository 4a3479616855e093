//! Abstract Syntax Tree (AST) definitions for FHIRPath expressions
//!
//! The tree covers the FHIRPath subset used by plan conditions: literals,
//! member navigation, environment variables, function invocations and the
//! logical, equality, relational, membership and additive operators.

mod expression;
mod operator;

pub use expression::*;
pub use operator::*;
