//! Evaluation failures. Each variant maps to the Python exception class a
//! learner would expect to see for the same mistake.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EvalError {
  #[error("SyntaxError: {0}")]
  Syntax(String),
  #[error("NameError: {0}")]
  Name(String),
  #[error("TypeError: {0}")]
  Type(String),
  #[error("ValueError: {0}")]
  Value(String),
  #[error("ZeroDivisionError: {0}")]
  ZeroDivision(String),
  #[error("IndexError: {0}")]
  Index(String),
  #[error("KeyError: {0}")]
  Key(String),
  #[error("AttributeError: {0}")]
  Attribute(String),
  #[error("OverflowError: {0}")]
  Overflow(String),
  #[error("LimitExceeded: {0}")]
  Limit(String),
}

impl EvalError {
  pub fn syntax(msg: impl Into<String>) -> Self { EvalError::Syntax(msg.into()) }
  pub fn name(msg: impl Into<String>) -> Self { EvalError::Name(msg.into()) }
  pub fn type_err(msg: impl Into<String>) -> Self { EvalError::Type(msg.into()) }
  pub fn value(msg: impl Into<String>) -> Self { EvalError::Value(msg.into()) }
  pub fn zero_div(msg: impl Into<String>) -> Self { EvalError::ZeroDivision(msg.into()) }
  pub fn index(msg: impl Into<String>) -> Self { EvalError::Index(msg.into()) }
  pub fn key(msg: impl Into<String>) -> Self { EvalError::Key(msg.into()) }
  pub fn attribute(msg: impl Into<String>) -> Self { EvalError::Attribute(msg.into()) }
  pub fn overflow() -> Self { EvalError::Overflow("integer result too large".into()) }
  pub fn limit(msg: impl Into<String>) -> Self { EvalError::Limit(msg.into()) }
}

pub type EvalResult<T> = Result<T, EvalError>;
