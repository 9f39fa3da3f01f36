//! Mapping expressions
//!
//! Expressions are user-authored strings with `${path}` placeholders
//! embedded in a small arithmetic/logical grammar:
//!
//! ```text
//! ${price} * ${quantity}
//! ${user.address.zip}
//! ${status} == 'active' ? 'on' : 'off'
//! ```
//!
//! # Evaluation
//!
//! 1. Every `${path}` is resolved against the payload by walking the dotted
//!    path; a missing segment resolves to `null`.
//! 2. The text with placeholder wrappers stripped is screened by a denylist
//!    (statement separators, backticks, `function`, `eval`, `import`,
//!    `export`, `class`). Keywords match anywhere, so `${classification}`
//!    is rejected too.
//! 3. The expression is parsed by a grammar that has no statements, calls
//!    or declarations, and evaluated with only the bound paths in scope.
//!
//! Any failure yields `null` from [`evaluate_expression`]; use
//! [`try_evaluate_expression`] to see why.
//!
//! # Equality
//!
//! `==` and `===` are both strict, as are `!=` and `!==`: `${n} == '5'` is
//! `false` when `n` is the number `5`. Numbers compare by value, so `2 == 2.0`
//! holds. Compare like-typed values, or build a string first with
//! `'' + ${n} == '5'`.

mod eval;
mod lexer;
pub mod parser;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;

pub use eval::{Bindings, resolve_path, truthy};
pub use parser::{Expr, MAX_NESTING_DEPTH};

/// Longest accepted expression source, in bytes
pub const MAX_EXPRESSION_LENGTH: usize = 2048;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

static FORBIDDEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[;`]|function|eval|import|export|class")
        .expect("denylist pattern is valid")
});

/// Reasons an expression produced no value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// Expression had no tokens
    #[error("expression is empty")]
    Empty,

    /// Expression source exceeds the length limit
    #[error("expression is longer than {limit} bytes")]
    TooLong {
        /// Maximum accepted length
        limit: usize,
    },

    /// Denylist guard tripped
    #[error("expression contains forbidden pattern '{pattern}'")]
    Forbidden {
        /// Matched text
        pattern: String,
    },

    /// Malformed expression
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset into the expression source
        offset: usize,
        /// Description of the problem
        message: String,
    },

    /// Nesting limit exceeded
    #[error("expression nests deeper than {limit} levels")]
    TooDeep {
        /// Maximum nesting depth
        limit: usize,
    },

    /// Bare name that is not a bound placeholder path
    #[error("unresolved identifier '{name}'")]
    Unresolved {
        /// Name as written
        name: String,
    },

    /// Runtime type error
    #[error("type error: {0}")]
    Type(String),
}

/// A parsed, reusable expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
    placeholders: Vec<String>,
}

impl Expression {
    /// Screen and parse expression source
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        if source.len() > MAX_EXPRESSION_LENGTH {
            return Err(ExpressionError::TooLong {
                limit: MAX_EXPRESSION_LENGTH,
            });
        }
        check_forbidden(&strip_placeholders(source))?;
        let (ast, placeholders) = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            ast,
            placeholders,
        })
    }

    /// Original source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct placeholder paths in first-seen order
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Parsed tree
    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Bare identifiers not covered by any placeholder path.
    ///
    /// These can never resolve, so the expression always yields `null`.
    pub fn unbound_identifiers(&self) -> Vec<String> {
        eval::unbound_identifiers(&self.ast, &self.placeholders)
    }

    /// Resolve every placeholder path against `data`
    pub fn bind(&self, data: &Map<String, Value>) -> Bindings {
        self.placeholders
            .iter()
            .map(|path| {
                let value = resolve_path(data, path).cloned().unwrap_or(Value::Null);
                (path.clone(), value)
            })
            .collect()
    }

    /// Evaluate against a payload
    pub fn evaluate(&self, data: &Map<String, Value>) -> Result<Value, ExpressionError> {
        eval::evaluate(&self.ast, &self.bind(data))
    }
}

/// Distinct `${path}` placeholder paths in first-seen order
pub fn placeholders(expression: &str) -> Vec<&str> {
    let mut paths: Vec<&str> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(expression) {
        if let Some(path) = caps.get(1).map(|m| m.as_str().trim())
            && !paths.contains(&path)
        {
            paths.push(path);
        }
    }
    paths
}

/// Replace each `${path}` with the bare `path`
pub fn strip_placeholders(expression: &str) -> Cow<'_, str> {
    PLACEHOLDER.replace_all(expression, "$1")
}

/// Reject text containing statement separators, backticks, or
/// code-introducing keywords.
pub fn check_forbidden(text: &str) -> Result<(), ExpressionError> {
    match FORBIDDEN.find(text) {
        Some(m) => Err(ExpressionError::Forbidden {
            pattern: m.as_str().to_string(),
        }),
        None => Ok(()),
    }
}

/// Evaluate an expression against a payload, reporting why it failed
pub fn try_evaluate_expression(
    expression: &str,
    data: &Map<String, Value>,
) -> Result<Value, ExpressionError> {
    Expression::parse(expression)?.evaluate(data)
}

/// Evaluate an expression against a payload.
///
/// Never fails: any rejection or evaluation error yields `Value::Null`.
pub fn evaluate_expression(expression: &str, data: &Map<String, Value>) -> Value {
    match try_evaluate_expression(expression, data) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(expression, error = %e, "expression evaluated to null");
            Value::Null
        }
    }
}
