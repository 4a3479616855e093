//! Tokenizer for FHIRPath expressions
//!
//! Zero-copy: string, decimal and identifier tokens borrow slices of the input.
//! ASCII is handled on the byte fast path; identifiers may also contain Unicode
//! XID characters.

use super::error::{ParseError, ParseResult};

/// Lexical token borrowed from the expression text
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'input> {
    // Literals
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Decimal literal as string slice, parsed on demand (e.g., 3.14)
    Decimal(&'input str),
    /// String literal body without quotes, escapes unprocessed
    String(&'input str),

    /// Identifier, including backtick-delimited identifiers without the backticks
    Identifier(&'input str),

    // Keywords
    /// Boolean literal true
    True,
    /// Boolean literal false
    False,
    /// Logical AND operator (and keyword)
    And,
    /// Logical OR operator (or keyword)
    Or,
    /// Logical XOR operator (xor keyword)
    Xor,
    /// Logical implication operator (implies keyword)
    Implies,
    /// Membership operator (in keyword)
    In,
    /// Containment operator (contains keyword)
    Contains,

    // Operators
    /// Addition operator (+)
    Plus,
    /// Subtraction operator (-)
    Minus,
    /// Equality operator (=)
    Equal,
    /// Inequality operator (!=)
    NotEqual,
    /// Less than operator (<)
    LessThan,
    /// Less than or equal operator (<=)
    LessThanOrEqual,
    /// Greater than operator (>)
    GreaterThan,
    /// Greater than or equal operator (>=)
    GreaterThanOrEqual,
    /// String concatenation operator (&)
    Ampersand,
    /// Union operator (|)
    Union,

    // Delimiters
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left square bracket [
    LeftBracket,
    /// Right square bracket ]
    RightBracket,
    /// Left curly brace {
    LeftBrace,
    /// Right curly brace }
    RightBrace,
    /// Dot operator (.) for member access
    Dot,
    /// Comma separator (,)
    Comma,
    /// Percent sign (%) introducing an environment variable
    Percent,
    /// Special variable $this
    DollarThis,
}

impl<'input> Token<'input> {
    /// Get keyword token for a word, if it is reserved
    #[inline]
    pub fn from_keyword(s: &str) -> Option<Token<'input>> {
        match s {
            "true" => Some(Token::True),
            "false" => Some(Token::False),
            "and" => Some(Token::And),
            "or" => Some(Token::Or),
            "xor" => Some(Token::Xor),
            "implies" => Some(Token::Implies),
            "in" => Some(Token::In),
            "contains" => Some(Token::Contains),
            _ => None,
        }
    }

    /// Get identifier string if this token is an identifier
    #[inline]
    pub fn as_identifier(&self) -> Option<&'input str> {
        match self {
            Token::Identifier(s) => Some(s),
            _ => None,
        }
    }

    /// Human readable rendering used in error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Integer(i) => i.to_string(),
            Token::Decimal(d) => (*d).to_string(),
            Token::String(s) => format!("'{s}'"),
            Token::Identifier(s) => (*s).to_string(),
            Token::True => "true".into(),
            Token::False => "false".into(),
            Token::And => "and".into(),
            Token::Or => "or".into(),
            Token::Xor => "xor".into(),
            Token::Implies => "implies".into(),
            Token::In => "in".into(),
            Token::Contains => "contains".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Equal => "=".into(),
            Token::NotEqual => "!=".into(),
            Token::LessThan => "<".into(),
            Token::LessThanOrEqual => "<=".into(),
            Token::GreaterThan => ">".into(),
            Token::GreaterThanOrEqual => ">=".into(),
            Token::Ampersand => "&".into(),
            Token::Union => "|".into(),
            Token::LeftParen => "(".into(),
            Token::RightParen => ")".into(),
            Token::LeftBracket => "[".into(),
            Token::RightBracket => "]".into(),
            Token::LeftBrace => "{".into(),
            Token::RightBrace => "}".into(),
            Token::Dot => ".".into(),
            Token::Comma => ",".into(),
            Token::Percent => "%".into(),
            Token::DollarThis => "$this".into(),
        }
    }
}

/// Check if a character can start an identifier
pub fn is_identifier_start(c: char) -> bool {
    unicode_xid::UnicodeXID::is_xid_start(c) || c == '_'
}

/// Check if a character can continue an identifier
pub fn is_identifier_continue(c: char) -> bool {
    unicode_xid::UnicodeXID::is_xid_continue(c)
}

/// Tokenizer over a borrowed expression string
#[derive(Clone)]
pub struct Tokenizer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    pos: usize,
    token_start: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a new tokenizer
    #[inline]
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            token_start: 0,
        }
    }

    /// Byte offset of the most recently produced token
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    #[inline(always)]
    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.byte_at(0) {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn skip_single_line_comment(&mut self) {
        self.pos += 2;
        while let Some(b) = self.byte_at(0) {
            if matches!(b, b'\n' | b'\r') {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_multi_line_comment(&mut self) -> ParseResult<()> {
        let start = self.pos;
        self.pos += 2;
        while self.pos + 1 < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/' {
                self.pos += 2;
                return Ok(());
            }
            self.pos += 1;
        }
        Err(ParseError::UnexpectedToken {
            token: "unclosed comment".to_string(),
            position: start,
        })
    }

    fn parse_number(&mut self) -> ParseResult<Token<'input>> {
        let start = self.pos;
        while matches!(self.byte_at(0), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }

        let is_decimal = self.byte_at(0) == Some(b'.')
            && matches!(self.byte_at(1), Some(b) if b.is_ascii_digit());

        if is_decimal {
            self.pos += 1;
            while matches!(self.byte_at(0), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
            }
            return Ok(Token::Decimal(&self.input[start..self.pos]));
        }

        let digits = &self.input[start..self.pos];
        digits
            .parse::<i64>()
            .map(Token::Integer)
            .map_err(|_| ParseError::InvalidLiteral {
                literal_type: "integer".to_string(),
                value: digits.to_string(),
                position: start,
            })
    }

    fn parse_identifier(&mut self) -> &'input str {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !is_identifier_continue(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.input[start..self.pos]
    }

    /// Scan a literal delimited by `quote`, skipping escaped characters
    fn parse_delimited(&mut self, quote: u8) -> ParseResult<&'input str> {
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;

        while let Some(b) = self.byte_at(0) {
            if b == quote {
                let content = &self.input[start..self.pos];
                self.pos += 1;
                return Ok(content);
            }
            if b == b'\\' && self.pos + 1 < self.bytes.len() {
                self.pos += 1;
            }
            // step over a whole UTF-8 scalar
            let width = self.peek_char().map(char::len_utf8).unwrap_or(1);
            self.pos += width;
        }

        Err(ParseError::UnclosedString { position: open })
    }

    /// Produce the next token, or `None` at end of input
    pub fn next_token(&mut self) -> ParseResult<Option<Token<'input>>> {
        loop {
            self.skip_whitespace();
            match (self.byte_at(0), self.byte_at(1)) {
                (Some(b'/'), Some(b'/')) => self.skip_single_line_comment(),
                (Some(b'/'), Some(b'*')) => self.skip_multi_line_comment()?,
                _ => break,
            }
        }

        self.token_start = self.pos;
        let Some(first) = self.byte_at(0) else {
            return Ok(None);
        };

        let single = |tokenizer: &mut Self, token: Token<'input>| {
            tokenizer.pos += 1;
            token
        };

        let token = match first {
            b'.' => single(self, Token::Dot),
            b'(' => single(self, Token::LeftParen),
            b')' => single(self, Token::RightParen),
            b'[' => single(self, Token::LeftBracket),
            b']' => single(self, Token::RightBracket),
            b'{' => single(self, Token::LeftBrace),
            b'}' => single(self, Token::RightBrace),
            b',' => single(self, Token::Comma),
            b'+' => single(self, Token::Plus),
            b'-' => single(self, Token::Minus),
            b'&' => single(self, Token::Ampersand),
            b'|' => single(self, Token::Union),
            b'%' => single(self, Token::Percent),
            b'=' => single(self, Token::Equal),
            b'!' => {
                if self.byte_at(1) == Some(b'=') {
                    self.pos += 2;
                    Token::NotEqual
                } else {
                    return Err(ParseError::UnexpectedToken {
                        token: "!".to_string(),
                        position: self.pos,
                    });
                }
            }
            b'<' => {
                if self.byte_at(1) == Some(b'=') {
                    self.pos += 2;
                    Token::LessThanOrEqual
                } else {
                    single(self, Token::LessThan)
                }
            }
            b'>' => {
                if self.byte_at(1) == Some(b'=') {
                    self.pos += 2;
                    Token::GreaterThanOrEqual
                } else {
                    single(self, Token::GreaterThan)
                }
            }
            b'$' => {
                let rest = &self.input[self.pos + 1..];
                let after = rest.get(4..).and_then(|s| s.chars().next());
                if rest.starts_with("this") && !after.is_some_and(is_identifier_continue) {
                    self.pos += 5;
                    Token::DollarThis
                } else {
                    return Err(ParseError::UnexpectedToken {
                        token: "$".to_string(),
                        position: self.pos,
                    });
                }
            }
            b'0'..=b'9' => self.parse_number()?,
            b'\'' => Token::String(self.parse_delimited(b'\'')?),
            b'`' => Token::Identifier(self.parse_delimited(b'`')?),
            _ => {
                let ch = self.peek_char().unwrap_or(first as char);
                if is_identifier_start(ch) {
                    let ident = self.parse_identifier();
                    Token::from_keyword(ident).unwrap_or(Token::Identifier(ident))
                } else {
                    return Err(ParseError::UnexpectedToken {
                        token: ch.to_string(),
                        position: self.pos,
                    });
                }
            }
        };

        Ok(Some(token))
    }

    /// Tokenize the whole input
    pub fn tokenize_all(&mut self) -> ParseResult<Vec<Token<'input>>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}
