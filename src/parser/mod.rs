//! FHIRPath expression parser
//!
//! Converts expression text into an [`ExpressionNode`](crate::ast::ExpressionNode)
//! tree using a hand-written tokenizer and a Pratt parser.

pub mod error;
pub mod pratt;
pub mod tokenizer;

pub use error::{ParseError, ParseResult};
pub use pratt::parse_expression;
