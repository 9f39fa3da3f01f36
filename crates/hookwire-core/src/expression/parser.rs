//! Recursive-descent parser for mapping expressions
//!
//! The grammar only produces expression nodes: there is no call syntax,
//! assignment, statement or declaration form to reach.

use serde_json::Value;

use super::ExpressionError;
use super::lexer::{Lexer, Token, TokenKind};

/// Maximum nesting of parentheses, brackets, ternaries and unary operators
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Number, string, boolean or null literal
    Literal(Value),
    /// `${path}` placeholder
    Placeholder(String),
    /// Bare identifier, resolvable only through bound paths
    Identifier(String),
    /// `[a, b, ...]`
    Array(Vec<Expr>),
    /// `object.property`
    Member {
        /// Accessed value
        object: Box<Expr>,
        /// Property name
        property: String,
    },
    /// `object[index]`
    Index {
        /// Accessed value
        object: Box<Expr>,
        /// Index or key expression
        index: Box<Expr>,
    },
    /// Prefix operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Arithmetic, comparison or equality operator
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Short-circuiting operator
    Logical {
        /// Operator
        op: LogicalOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand, evaluated only when needed
        right: Box<Expr>,
    },
    /// `condition ? then_expr : else_expr`
    Conditional {
        /// Condition
        condition: Box<Expr>,
        /// Value when truthy
        then_expr: Box<Expr>,
        /// Value when falsy
        else_expr: Box<Expr>,
    },
}

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Negate,
    /// `+`
    Plus,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+` (numeric addition or string concatenation)
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Remainder,
    /// `==` / `===`
    Equal,
    /// `!=` / `!==`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
}

/// Short-circuiting operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `??`
    Coalesce,
}

/// Parse expression source into a tree, collecting placeholder paths in
/// first-seen order.
pub fn parse(src: &str) -> Result<(Expr, Vec<String>), ExpressionError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        placeholders: Vec::new(),
    };
    if parser.peek() == &TokenKind::Eof {
        return Err(ExpressionError::Empty);
    }
    let expr = parser.expression()?;
    parser.expect(TokenKind::Eof)?;
    Ok((expr, parser.placeholders))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    placeholders: Vec<String>,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if kind != TokenKind::Eof {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ExpressionError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {}", kind.describe())))
        }
    }

    fn unexpected(&self, context: &str) -> ExpressionError {
        ExpressionError::Syntax {
            offset: self.offset(),
            message: format!("{context}, found {}", self.peek().describe()),
        }
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<T, ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ExpressionError::TooDeep {
                limit: MAX_NESTING_DEPTH,
            });
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr, ExpressionError> {
        let condition = self.coalesce()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }
        let then_expr = self.expression()?;
        self.expect(TokenKind::Colon)?;
        let else_expr = self.expression()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    fn coalesce(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.or()?;
        while self.eat(&TokenKind::QuestionQuestion) {
            let right = self.or()?;
            left = logical(LogicalOp::Coalesce, left, right);
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.and()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.and()?;
            left = logical(LogicalOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.equality()?;
            left = logical(LogicalOp::And, left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Equal,
                TokenKind::NotEq => BinaryOp::NotEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinaryOp::Less,
                TokenKind::Le => BinaryOp::LessEqual,
                TokenKind::Gt => BinaryOp::Greater,
                TokenKind::Ge => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Remainder,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = match self.peek() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let property = match self.peek() {
                        TokenKind::Ident(name) => name.clone(),
                        // `a.true` / `a.null` are valid property names
                        TokenKind::True => "true".to_string(),
                        TokenKind::False => "false".to_string(),
                        TokenKind::Null => "null".to_string(),
                        TokenKind::Number(Value::Number(n)) if n.is_u64() => n.to_string(),
                        _ => return Err(self.unexpected("expected property name")),
                    };
                    self.advance();
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::LParen => {
                    return Err(ExpressionError::Syntax {
                        offset: self.offset(),
                        message: "function calls are not allowed".to_string(),
                    });
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let offset = self.offset();
        match self.advance() {
            TokenKind::Number(n) => Ok(Expr::Literal(n)),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::String(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Value::Null)),
            TokenKind::Placeholder(path) => {
                if !self.placeholders.contains(&path) {
                    self.placeholders.push(path.clone());
                }
                Ok(Expr::Placeholder(path))
            }
            TokenKind::Ident(name) => Ok(Expr::Identifier(name)),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.nested(|p| {
                let mut items = Vec::new();
                if p.eat(&TokenKind::RBracket) {
                    return Ok(Expr::Array(items));
                }
                loop {
                    items.push(p.expression()?);
                    if p.eat(&TokenKind::RBracket) {
                        return Ok(Expr::Array(items));
                    }
                    p.expect(TokenKind::Comma)?;
                }
            }),
            other => Err(ExpressionError::Syntax {
                offset,
                message: format!("expected a value, found {}", other.describe()),
            }),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_expr(src: &str) -> Expr {
        parse(src).unwrap().0
    }

    #[test]
    fn test_precedence_multiplication_binds_tighter() {
        assert_eq!(
            parse_expr("1 + 2 * 3"),
            binary(
                BinaryOp::Add,
                Expr::Literal(json!(1)),
                binary(
                    BinaryOp::Multiply,
                    Expr::Literal(json!(2)),
                    Expr::Literal(json!(3))
                )
            )
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        assert_eq!(
            parse_expr("5 - 2 - 1"),
            binary(
                BinaryOp::Subtract,
                binary(
                    BinaryOp::Subtract,
                    Expr::Literal(json!(5)),
                    Expr::Literal(json!(2))
                ),
                Expr::Literal(json!(1))
            )
        );
    }

    #[test]
    fn test_dotted_identifier_parses_as_member_chain() {
        assert_eq!(
            parse_expr("user.address.zip"),
            Expr::Member {
                object: Box::new(Expr::Member {
                    object: Box::new(Expr::Identifier("user".to_string())),
                    property: "address".to_string(),
                }),
                property: "zip".to_string(),
            }
        );
    }

    #[test]
    fn test_placeholders_collected_once_in_order() {
        let (_, paths) = parse("${b} + ${a} + ${b}").unwrap();
        assert_eq!(paths, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_ternary_is_right_associative() {
        let expr = parse_expr("a ? 1 : b ? 2 : 3");
        match expr {
            Expr::Conditional { else_expr, .. } => {
                assert!(matches!(*else_expr, Expr::Conditional { .. }));
            }
            other => panic!("Expected conditional, got {other:?}"),
        }
    }

    #[test]
    fn test_calls_rejected() {
        let err = parse("${x}.toString()").unwrap_err();
        assert!(err.to_string().contains("function calls are not allowed"));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse("1 2").is_err());
        assert!(parse("(1").is_err());
        assert!(parse("[1, 2").is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(parse("   ").unwrap_err(), ExpressionError::Empty);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(
            parse(&deep).unwrap_err(),
            ExpressionError::TooDeep {
                limit: MAX_NESTING_DEPTH
            }
        );
        let unary = format!("{}1", "!".repeat(100));
        assert!(matches!(
            parse(&unary).unwrap_err(),
            ExpressionError::TooDeep { .. }
        ));
    }
}
