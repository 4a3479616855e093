//! Expression AST node definitions

use super::operator::{BinaryOperator, UnaryOperator};

/// AST representation of FHIRPath expressions
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// Literal value (string, number, boolean, empty)
    Literal(LiteralValue),

    /// Identifier (property name or resource type)
    Identifier(String),

    /// Environment variable (`%patient`) or special variable (`$this`)
    Variable(String),

    /// Function call without an explicit focus, e.g. `exists()`
    FunctionCall {
        /// Function name
        name: String,
        /// Function arguments
        args: Vec<ExpressionNode>,
    },

    /// Method call on a focus, e.g. `name.exists()`
    MethodCall {
        /// Focus expression
        base: Box<ExpressionNode>,
        /// Function name
        method: String,
        /// Function arguments
        args: Vec<ExpressionNode>,
    },

    /// Binary operation (comparison, logical, collection)
    BinaryOp {
        /// The operator
        op: BinaryOperator,
        /// Left operand
        left: Box<ExpressionNode>,
        /// Right operand
        right: Box<ExpressionNode>,
    },

    /// Unary operation (negation)
    UnaryOp {
        /// The operator
        op: UnaryOperator,
        /// The operand
        operand: Box<ExpressionNode>,
    },

    /// Path navigation (object.property)
    Path {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Property name
        path: String,
    },

    /// Index access (collection[index])
    Index {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Index expression
        index: Box<ExpressionNode>,
    },
}

/// Literal values in FHIRPath
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Boolean literal
    Boolean(bool),
    /// Integer literal
    Integer(i64),
    /// Decimal literal (stored as string to preserve precision)
    Decimal(String),
    /// String literal
    String(String),
    /// Empty collection literal `{}`
    Null,
}

impl ExpressionNode {
    /// Create a literal expression
    pub fn literal(value: LiteralValue) -> Self {
        Self::Literal(value)
    }

    /// Create an identifier expression
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    /// Create a variable reference
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Create a function call expression
    pub fn function_call(name: impl Into<String>, args: Vec<ExpressionNode>) -> Self {
        Self::FunctionCall {
            name: name.into(),
            args,
        }
    }

    /// Create a method call expression
    pub fn method_call(
        base: ExpressionNode,
        method: impl Into<String>,
        args: Vec<ExpressionNode>,
    ) -> Self {
        Self::MethodCall {
            base: Box::new(base),
            method: method.into(),
            args,
        }
    }

    /// Create a binary operation expression
    pub fn binary_op(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a unary operation expression
    pub fn unary_op(op: UnaryOperator, operand: ExpressionNode) -> Self {
        Self::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a path navigation expression
    pub fn path(base: ExpressionNode, path: impl Into<String>) -> Self {
        Self::Path {
            base: Box::new(base),
            path: path.into(),
        }
    }

    /// Create an index access expression
    pub fn index(base: ExpressionNode, index: ExpressionNode) -> Self {
        Self::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// Check if this expression is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Get the literal value if this is a literal expression
    pub fn as_literal(&self) -> Option<&LiteralValue> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Get the identifier name if this is an identifier expression
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_creation() {
        let literal = ExpressionNode::literal(LiteralValue::Integer(42));
        assert!(literal.is_literal());
        assert_eq!(literal.as_literal(), Some(&LiteralValue::Integer(42)));

        let identifier = ExpressionNode::identifier("gender");
        assert_eq!(identifier.as_identifier(), Some("gender"));
        assert!(identifier.as_literal().is_none());
    }

    #[test]
    fn test_nested_construction() {
        // %encounter.status = 'in-progress'
        let expr = ExpressionNode::binary_op(
            BinaryOperator::Equal,
            ExpressionNode::path(ExpressionNode::variable("encounter"), "status"),
            ExpressionNode::literal(LiteralValue::String("in-progress".to_string())),
        );

        match expr {
            ExpressionNode::BinaryOp {
                op: BinaryOperator::Equal,
                left,
                ..
            } => assert!(matches!(*left, ExpressionNode::Path { .. })),
            _ => panic!("Expected equality"),
        }
    }
}
