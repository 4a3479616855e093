//! Pratt parser for FHIRPath expressions
//!
//! Operator precedence is data-driven: every binary operator maps to one
//! [`Precedence`] level and the main loop climbs precedence from there.

use super::error::{ParseError, ParseResult};
use super::tokenizer::{Token, Tokenizer};
use crate::ast::{BinaryOperator, ExpressionNode, LiteralValue, UnaryOperator};

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Lowest precedence - implies (right associative)
    Implies = 1,
    /// Logical OR and XOR
    Or = 2,
    /// Logical AND
    And = 3,
    /// Membership operators (in, contains)
    Membership = 4,
    /// Equality operators (=, !=)
    Equality = 5,
    /// Inequality operators (<, >, <=, >=)
    Inequality = 6,
    /// Union operator (|)
    Union = 7,
    /// Additive operators (+, -, &)
    Additive = 8,
    /// Unary operators (+, -)
    Unary = 9,
    /// Invocation/Indexing (., [])
    Invocation = 10,
}

impl Precedence {
    /// Get the next higher precedence level for left-associative operators
    #[inline(always)]
    pub const fn next_level(self) -> Self {
        match self {
            Precedence::Implies => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Membership,
            Precedence::Membership => Precedence::Equality,
            Precedence::Equality => Precedence::Inequality,
            Precedence::Inequality => Precedence::Union,
            Precedence::Union => Precedence::Additive,
            Precedence::Additive => Precedence::Unary,
            Precedence::Unary => Precedence::Invocation,
            Precedence::Invocation => Precedence::Invocation,
        }
    }

    /// Check if this precedence is right associative
    #[inline(always)]
    pub const fn is_right_associative(self) -> bool {
        matches!(self, Precedence::Implies)
    }
}

#[inline(always)]
fn get_precedence(token: &Token<'_>) -> Option<Precedence> {
    match token {
        Token::Equal | Token::NotEqual => Some(Precedence::Equality),
        Token::And => Some(Precedence::And),
        Token::Or | Token::Xor => Some(Precedence::Or),
        Token::Plus | Token::Minus | Token::Ampersand => Some(Precedence::Additive),
        Token::LessThan
        | Token::LessThanOrEqual
        | Token::GreaterThan
        | Token::GreaterThanOrEqual => Some(Precedence::Inequality),
        Token::In | Token::Contains => Some(Precedence::Membership),
        Token::Union => Some(Precedence::Union),
        Token::Implies => Some(Precedence::Implies),
        _ => None,
    }
}

#[inline(always)]
fn token_to_binary_op(token: &Token<'_>) -> Option<BinaryOperator> {
    match token {
        Token::Equal => Some(BinaryOperator::Equal),
        Token::NotEqual => Some(BinaryOperator::NotEqual),
        Token::And => Some(BinaryOperator::And),
        Token::Or => Some(BinaryOperator::Or),
        Token::Xor => Some(BinaryOperator::Xor),
        Token::Implies => Some(BinaryOperator::Implies),
        Token::LessThan => Some(BinaryOperator::LessThan),
        Token::LessThanOrEqual => Some(BinaryOperator::LessThanOrEqual),
        Token::GreaterThan => Some(BinaryOperator::GreaterThan),
        Token::GreaterThanOrEqual => Some(BinaryOperator::GreaterThanOrEqual),
        Token::In => Some(BinaryOperator::In),
        Token::Contains => Some(BinaryOperator::Contains),
        Token::Plus => Some(BinaryOperator::Add),
        Token::Minus => Some(BinaryOperator::Subtract),
        Token::Ampersand => Some(BinaryOperator::Concatenate),
        Token::Union => Some(BinaryOperator::Union),
        _ => None,
    }
}

/// Deepest operator and invocation nesting an expression may have
///
/// The evaluator walks the tree recursively, so this also bounds its stack use.
pub const MAX_DEPTH: usize = 128;

/// Pratt parser over a [`Tokenizer`]
///
/// ### Precedence Levels (highest to lowest):
/// - **Invocation** (10): `.`, `[]`
/// - **Unary** (9): `+`, `-`
/// - **Additive** (8): `+`, `-`, `&`
/// - **Union** (7): `|`
/// - **Inequality** (6): `<`, `>`, `<=`, `>=`
/// - **Equality** (5): `=`, `!=`
/// - **Membership** (4): `in`, `contains`
/// - **And** (3): `and`
/// - **Or** (2): `or`, `xor`
/// - **Implies** (1): `implies` (right-associative)
pub struct PrattParser<'input> {
    tokenizer: Tokenizer<'input>,
    current_token: Option<Token<'input>>,
    current_position: usize,
    /// Nesting of the node under construction, see [`MAX_DEPTH`]
    depth: usize,
}

impl<'input> PrattParser<'input> {
    /// Create new parser; the first token is read lazily by [`PrattParser::parse`]
    #[inline]
    pub fn new(input: &'input str) -> Self {
        Self {
            tokenizer: Tokenizer::new(input),
            current_token: None,
            current_position: 0,
            depth: 0,
        }
    }

    #[inline(always)]
    fn advance(&mut self) -> ParseResult<()> {
        self.current_token = self.tokenizer.next_token()?;
        self.current_position = self.tokenizer.token_start();
        Ok(())
    }

    #[inline(always)]
    fn current(&self) -> Option<&Token<'input>> {
        self.current_token.as_ref()
    }

    fn unexpected(&self) -> ParseError {
        match &self.current_token {
            Some(token) => ParseError::UnexpectedToken {
                token: token.describe(),
                position: self.current_position,
            },
            None => ParseError::UnexpectedEndOfInput {
                position: self.tokenizer.position(),
            },
        }
    }

    /// Enter one more level of nesting
    fn descend(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep {
                max_depth: MAX_DEPTH,
                position: self.current_position,
            });
        }
        Ok(())
    }

    fn expect(&mut self, expected: Token<'input>) -> ParseResult<()> {
        match &self.current_token {
            Some(token) if std::mem::discriminant(token) == std::mem::discriminant(&expected) => {
                self.advance()
            }
            Some(_) => Err(ParseError::ExpectedToken {
                expected: format!("'{}'", expected.describe()),
                position: self.current_position,
            }),
            None => Err(ParseError::UnexpectedEndOfInput {
                position: self.tokenizer.position(),
            }),
        }
    }

    /// Parse primary expression (literals, identifiers, variables, parenthesized expressions)
    fn parse_primary(&mut self) -> ParseResult<ExpressionNode> {
        match self.current() {
            Some(Token::Identifier(name)) => {
                let name = *name;
                self.advance()?;
                if let Some(Token::LeftParen) = self.current() {
                    let args = self.parse_arguments()?;
                    Ok(ExpressionNode::function_call(name, args))
                } else {
                    Ok(ExpressionNode::identifier(name))
                }
            }

            Some(Token::Integer(value)) => {
                let value = *value;
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Integer(value)))
            }

            Some(Token::Decimal(value)) => {
                let value = value.to_string();
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Decimal(value)))
            }

            Some(Token::String(value)) => {
                let raw = *value;
                let position = self.current_position;
                self.advance()?;
                let processed = process_string_escapes(raw, position)?;
                Ok(ExpressionNode::literal(LiteralValue::String(processed)))
            }

            Some(Token::True) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Boolean(true)))
            }
            Some(Token::False) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Boolean(false)))
            }

            Some(Token::LeftParen) => {
                self.advance()?;
                let expr = self.parse_expression_with_precedence(Precedence::Implies)?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }

            // %patient, %'vs-name'
            Some(Token::Percent) => {
                self.advance()?;
                match self.current() {
                    Some(Token::Identifier(name)) | Some(Token::String(name)) => {
                        let name = *name;
                        self.advance()?;
                        Ok(ExpressionNode::variable(name))
                    }
                    _ => Err(ParseError::ExpectedToken {
                        expected: "variable name after '%'".to_string(),
                        position: self.current_position,
                    }),
                }
            }

            Some(Token::DollarThis) => {
                self.advance()?;
                Ok(ExpressionNode::variable("this"))
            }

            Some(Token::Minus) => {
                self.advance()?;
                let operand = self.parse_expression_with_precedence(Precedence::Unary)?;
                Ok(ExpressionNode::unary_op(UnaryOperator::Negate, operand))
            }
            Some(Token::Plus) => {
                self.advance()?;
                let operand = self.parse_expression_with_precedence(Precedence::Unary)?;
                Ok(ExpressionNode::unary_op(UnaryOperator::Positive, operand))
            }

            Some(Token::LeftBrace) => {
                self.advance()?;
                self.expect(Token::RightBrace)?;
                Ok(ExpressionNode::literal(LiteralValue::Null))
            }

            _ => Err(self.unexpected()),
        }
    }

    /// Parse a parenthesised argument list; current token must be `(`
    fn parse_arguments(&mut self) -> ParseResult<Vec<ExpressionNode>> {
        self.expect(Token::LeftParen)?;
        let mut args = Vec::new();

        if let Some(Token::RightParen) = self.current() {
            self.advance()?;
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression_with_precedence(Precedence::Implies)?);

            match self.current() {
                Some(Token::Comma) => self.advance()?,
                Some(Token::RightParen) => {
                    self.advance()?;
                    return Ok(args);
                }
                Some(_) => {
                    return Err(ParseError::ExpectedToken {
                        expected: "',' or ')' in function arguments".to_string(),
                        position: self.current_position,
                    });
                }
                None => {
                    return Err(ParseError::UnexpectedEndOfInput {
                        position: self.tokenizer.position(),
                    });
                }
            }
        }
    }

    /// Parse postfix expressions (method calls, indexing, path navigation)
    fn parse_postfix(&mut self, mut left: ExpressionNode) -> ParseResult<ExpressionNode> {
        loop {
            match self.current() {
                Some(Token::Dot) => {
                    self.advance()?;
                    // keywords double as member names after a dot, e.g. `name.contains('x')`
                    let name = match self.current() {
                        Some(Token::Identifier(name)) => *name,
                        Some(Token::Contains) => "contains",
                        Some(Token::In) => "in",
                        _ => {
                            return Err(ParseError::ExpectedToken {
                                expected: "identifier after '.'".to_string(),
                                position: self.current_position,
                            });
                        }
                    };
                    self.advance()?;
                    self.descend()?;

                    left = if let Some(Token::LeftParen) = self.current() {
                        let args = self.parse_arguments()?;
                        ExpressionNode::method_call(left, name, args)
                    } else {
                        ExpressionNode::path(left, name)
                    };
                }
                Some(Token::LeftBracket) => {
                    self.advance()?;
                    self.descend()?;
                    let index = self.parse_expression_with_precedence(Precedence::Implies)?;
                    self.expect(Token::RightBracket)?;
                    left = ExpressionNode::index(left, index);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    /// Core Pratt parsing algorithm
    fn parse_expression_with_precedence(
        &mut self,
        min_precedence: Precedence,
    ) -> ParseResult<ExpressionNode> {
        // postfix and operator chains below add to the depth until we return
        let base_depth = self.depth;
        self.descend()?;

        let mut left = self.parse_primary()?;
        left = self.parse_postfix(left)?;

        while let Some(current_token) = self.current() {
            let precedence = match get_precedence(current_token) {
                Some(prec) if prec >= min_precedence => prec,
                _ => break,
            };

            let op = token_to_binary_op(current_token).ok_or_else(|| self.unexpected())?;
            self.advance()?;
            self.descend()?;

            let next_min_precedence = if precedence.is_right_associative() {
                precedence
            } else {
                precedence.next_level()
            };

            let right = self.parse_expression_with_precedence(next_min_precedence)?;
            left = ExpressionNode::binary_op(op, left, right);
        }

        self.depth = base_depth;
        Ok(left)
    }

    /// Parse complete input
    pub fn parse(&mut self) -> ParseResult<ExpressionNode> {
        self.advance()?;
        if self.current_token.is_none() {
            return Err(ParseError::EmptyExpression);
        }

        let expr = self.parse_expression_with_precedence(Precedence::Implies)?;

        // Ensure we consumed all input
        if self.current_token.is_some() {
            return Err(self.unexpected());
        }

        Ok(expr)
    }
}

/// Process escape sequences in string literals, including Unicode escapes
fn process_string_escapes(input: &str, position: usize) -> ParseResult<String> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }

        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('f') => result.push('\u{000C}'),
            Some('\\') => result.push('\\'),
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some('`') => result.push('`'),
            Some('/') => result.push('/'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(unicode_char) => result.push(unicode_char),
                    None => {
                        return Err(ParseError::InvalidEscape {
                            sequence: format!("\\u{hex}"),
                            position,
                        });
                    }
                }
            }
            Some(other) => {
                return Err(ParseError::InvalidEscape {
                    sequence: format!("\\{other}"),
                    position,
                });
            }
            None => {
                return Err(ParseError::InvalidEscape {
                    sequence: "\\".to_string(),
                    position,
                });
            }
        }
    }

    Ok(result)
}

/// Parse an expression string into an AST
#[inline]
pub fn parse_expression(input: &str) -> ParseResult<ExpressionNode> {
    PrattParser::new(input).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(Precedence::Additive > Precedence::Equality);
        assert!(Precedence::Equality > Precedence::And);
        assert!(Precedence::And > Precedence::Or);
        assert!(Precedence::Or > Precedence::Implies);
    }

    #[test]
    fn test_boolean_literal() {
        let result = parse_expression("true").unwrap();
        assert_eq!(result, ExpressionNode::literal(LiteralValue::Boolean(true)));
    }

    #[test]
    fn test_path_expressions() {
        let result = parse_expression("Patient").unwrap();
        assert!(matches!(result, ExpressionNode::Identifier(_)));

        let result = parse_expression("Patient.gender").unwrap();
        assert_eq!(
            result,
            ExpressionNode::path(ExpressionNode::identifier("Patient"), "gender")
        );

        let result = parse_expression("%encounter.subject.reference").unwrap();
        assert!(matches!(result, ExpressionNode::Path { .. }));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let result = parse_expression("a or b and c").unwrap();
        if let ExpressionNode::BinaryOp {
            op: BinaryOperator::Or,
            right,
            ..
        } = result
        {
            assert!(matches!(
                *right,
                ExpressionNode::BinaryOp {
                    op: BinaryOperator::And,
                    ..
                }
            ));
        } else {
            panic!("Expected or with and on the right");
        }
    }

    #[test]
    fn test_associativity() {
        let result = parse_expression("a implies b implies c").unwrap();
        if let ExpressionNode::BinaryOp {
            op: BinaryOperator::Implies,
            left,
            right,
        } = result
        {
            assert!(matches!(*left, ExpressionNode::Identifier(_)));
            assert!(matches!(
                *right,
                ExpressionNode::BinaryOp {
                    op: BinaryOperator::Implies,
                    ..
                }
            ));
        } else {
            panic!("Expected right-associative implies");
        }
    }

    #[test]
    fn test_function_calls() {
        let result = parse_expression("exists()").unwrap();
        assert!(matches!(result, ExpressionNode::FunctionCall { .. }));

        let result =
            parse_expression("%patient.name.where(use = 'official').exists()").unwrap();
        assert!(matches!(result, ExpressionNode::MethodCall { .. }));
    }

    #[test]
    fn test_index_and_unary() {
        let result = parse_expression("name[0].given").unwrap();
        assert!(matches!(result, ExpressionNode::Path { .. }));

        let result = parse_expression("-1").unwrap();
        assert_eq!(
            result,
            ExpressionNode::unary_op(
                UnaryOperator::Negate,
                ExpressionNode::literal(LiteralValue::Integer(1))
            )
        );
    }

    #[test]
    fn test_string_escapes() {
        let result = parse_expression(r"'it\'s A'").unwrap();
        assert_eq!(
            result,
            ExpressionNode::literal(LiteralValue::String("it's A".to_string()))
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_expression("   "), Err(ParseError::EmptyExpression));
        assert!(matches!(
            parse_expression("true and"),
            Err(ParseError::UnexpectedEndOfInput { .. })
        ));
        assert!(matches!(
            parse_expression("(true"),
            Err(ParseError::UnexpectedEndOfInput { .. })
        ));
        assert_eq!(
            parse_expression("true true"),
            Err(ParseError::UnexpectedToken {
                token: "true".to_string(),
                position: 5,
            })
        );
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}true{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_expression(&nested(40)).is_ok());

        let too_deep = [
            nested(1000),
            format!("{}1", "-".repeat(1000)),
            format!("true{}", " implies true".repeat(1000)),
            format!("1{}", " + 1".repeat(1000)),
            format!("name{}", ".given".repeat(1000)),
            format!("{}true{}", "iif(".repeat(1000), ", 1)".repeat(1000)),
        ];
        for text in &too_deep {
            assert!(
                matches!(
                    parse_expression(text),
                    Err(ParseError::TooDeep { max_depth: MAX_DEPTH, .. })
                ),
                "{}",
                &text[..20]
            );
        }

        // sibling arguments do not add up
        let flat_args = format!("f({})", vec!["((1))"; 200].join(", "));
        assert!(parse_expression(&flat_args).is_ok());
    }
}
