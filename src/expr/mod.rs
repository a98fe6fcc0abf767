//! A small, read-only expression language with Python semantics.
//!
//! Used twice: to compute reference answers from generated templates
//! (trusted limits) and to run learner submissions (configured limits).
//! Both paths share the interpreter, so a correct submission reproduces the
//! reference value exactly.
//!
//! There is no assignment, no attribute access beyond an allowlist of
//! methods, and no way to reach anything outside the supplied bindings.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

mod ast;
mod budget;
mod builtins;
mod error;
mod interp;
mod lexer;
mod parser;
mod value;

pub use error::{EvalError, EvalResult};
pub use value::{Dict, Range, Value};

/// Variable name -> value visible to an expression.
pub type Bindings = BTreeMap<String, Value>;

/// Resource caps for a single evaluation.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EvalLimits {
  pub max_code_len: usize,
  pub max_depth: usize,
  pub max_steps: u64,
  pub max_collection_len: usize,
  /// Values plus string bytes one evaluation may allocate in total.
  pub max_cells: u64,
  pub timeout_ms: u64,
}

impl Default for EvalLimits {
  /// Limits for learner submissions.
  fn default() -> Self {
    Self {
      max_code_len: 2_000,
      max_depth: 64,
      max_steps: 200_000,
      max_collection_len: 100_000,
      max_cells: 2_000_000,
      timeout_ms: 250,
    }
  }
}

impl EvalLimits {
  /// Limits for templates assembled from the schema.
  pub fn trusted() -> Self {
    Self {
      max_code_len: 10_000,
      max_depth: 128,
      max_steps: 10_000_000,
      max_collection_len: 1_000_000,
      max_cells: 50_000_000,
      timeout_ms: 2_000,
    }
  }
}

pub fn evaluate(code: &str, bindings: &Bindings, limits: &EvalLimits) -> EvalResult<Value> {
  let code_len = code.chars().count();
  if code_len > limits.max_code_len {
    return Err(EvalError::limit(format!("expression longer than {} characters", limits.max_code_len)));
  }
  let tree = parser::parse(code, limits.max_depth)?;
  let mut interp = interp::Interpreter::new(bindings, limits);
  let result = interp.eval(&tree);
  let budget = interp.budget();
  debug!(target: "expr", code_len, steps = budget.steps(), cells = budget.cells(), ok = result.is_ok(), "expression evaluated");
  result
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bind(pairs: &[(&str, Value)]) -> Bindings {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
  }

  fn eval(code: &str, b: &Bindings) -> EvalResult<Value> {
    evaluate(code, b, &EvalLimits::default())
  }

  fn ints(xs: &[i64]) -> Value { Value::from(xs.to_vec()) }

  #[test]
  fn squares_of_int_sequence() {
    let b = bind(&[("nums", ints(&[3, -2, 5]))]);
    assert_eq!(eval("[x**2 for x in nums]", &b).unwrap(), ints(&[9, 4, 25]));
    assert_eq!(eval("[n**2 for n in nums]", &b).unwrap(), ints(&[9, 4, 25]));
  }

  #[test]
  fn uppercase_filter_over_words() {
    let b = bind(&[("words", Value::from(vec!["CAT", "dog", "FROG"]))]);
    assert_eq!(
      eval("[x for x in words if x.isupper()]", &b).unwrap(),
      Value::from(vec!["CAT", "FROG"])
    );
  }

  #[test]
  fn cartesian_product_of_two_sequences() {
    let b = bind(&[("nums", ints(&[1, 2])), ("nums2", ints(&[1, 2, 3]))]);
    let got = eval("[(x, y) for x in nums for y in nums2]", &b).unwrap();
    let expected = Value::List(
      [(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3)]
        .iter()
        .map(|(a, b)| Value::Tuple(vec![Value::Int(*a), Value::Int(*b)]))
        .collect(),
    );
    assert_eq!(got, expected);
  }

  #[test]
  fn dict_items_unpack_in_comprehension() {
    let mut d = Dict::new();
    d.insert("red".into(), Value::Int(60)).unwrap();
    d.insert("gold".into(), Value::Int(10)).unwrap();
    let b = bind(&[("data", Value::Dict(d))]);
    assert_eq!(eval("[k for k, v in data.items() if v > 50]", &b).unwrap(), Value::from(vec!["red"]));
    let doubled = eval("{k: v * 2 for k, v in data.items()}", &b).unwrap();
    assert_eq!(doubled.repr(), "{'red': 120, 'gold': 20}");
  }

  #[test]
  fn python_numeric_semantics() {
    let b = Bindings::new();
    assert_eq!(eval("-7 // 2", &b).unwrap(), Value::Int(-4));
    assert_eq!(eval("-7 % 10", &b).unwrap(), Value::Int(3));
    assert_eq!(eval("7 / 2", &b).unwrap(), Value::Float(3.5));
    assert_eq!(eval("2 ** -1", &b).unwrap(), Value::Float(0.5));
    assert_eq!(eval("-3 ** 2", &b).unwrap(), Value::Int(-9));
    assert_eq!(eval("12.5 // 2", &b).unwrap(), Value::Float(6.0));
    assert_eq!(eval("True + 1", &b).unwrap(), Value::Int(2));
  }

  #[test]
  fn string_indexing_and_slicing() {
    let b = bind(&[("w", Value::from("banana"))]);
    assert_eq!(eval("w[0]", &b).unwrap(), Value::from("b"));
    assert_eq!(eval("w[-1]", &b).unwrap(), Value::from("a"));
    assert_eq!(eval("w[::-1]", &b).unwrap(), Value::from("ananab"));
    assert_eq!(eval("w[1:4]", &b).unwrap(), Value::from("ana"));
    assert_eq!(eval("w * 2", &b).unwrap(), Value::from("bananabanana"));
    assert!(matches!(eval("w[10]", &b), Err(EvalError::Index(_))));
  }

  #[test]
  fn conditional_chain_labels() {
    let b = bind(&[("nums", ints(&[4, -1, 0]))]);
    let got = eval("['pos' if x > 0 else 'neg' if x < 0 else 'zero' for x in nums]", &b).unwrap();
    assert_eq!(got, Value::from(vec!["pos", "neg", "zero"]));
  }

  #[test]
  fn ranges_iterate_and_compare() {
    let b = bind(&[("i", Value::Range(Range::new(0, 5, 1).unwrap()))]);
    assert_eq!(eval("[x % 2 for x in i]", &b).unwrap(), ints(&[0, 1, 0, 1, 0]));
    assert_eq!(eval("i", &b).unwrap().repr(), "range(0, 5)");
    assert_eq!(eval("list(i[1:3])", &b).unwrap(), ints(&[1, 2]));
  }

  #[test]
  fn builtins_and_generator_arguments() {
    let b = bind(&[("nums", ints(&[3, 1, 2]))]);
    assert_eq!(eval("sum(x for x in nums if x > 1)", &b).unwrap(), Value::Int(5));
    assert_eq!(eval("sorted(nums)", &b).unwrap(), ints(&[1, 2, 3]));
    assert_eq!(eval("len(nums), max(nums)", &b).unwrap().repr(), "(3, 3)");
  }

  #[test]
  fn comprehension_variables_do_not_leak() {
    let b = bind(&[("nums", ints(&[1]))]);
    assert!(matches!(eval("[x for x in nums] + [x]", &b), Err(EvalError::Name(_))));
  }

  #[test]
  fn failures_are_typed() {
    let b = bind(&[("nums", ints(&[1, 0]))]);
    assert!(matches!(eval("[for in]", &b), Err(EvalError::Syntax(_))));
    assert!(matches!(eval("[10 // x for x in nums]", &b), Err(EvalError::ZeroDivision(_))));
    assert!(matches!(eval("undefined_name", &b), Err(EvalError::Name(_))));
    assert!(matches!(eval("nums + 1", &b), Err(EvalError::Type(_))));
    assert!(matches!(eval("__import__('os')", &b), Err(EvalError::Name(_))));
    assert!(matches!(eval("nums.append(3)", &b), Err(EvalError::Attribute(_))));
  }

  #[test]
  fn limits_stop_runaway_submissions() {
    let b = Bindings::new();
    let tight = EvalLimits { max_steps: 1_000, ..EvalLimits::default() };
    let err = evaluate("[x for x in range(100000)]", &b, &tight).unwrap_err();
    assert!(matches!(err, EvalError::Limit(_)));
    let err = evaluate("list(range(10**9))", &b, &EvalLimits::default()).unwrap_err();
    assert!(matches!(err, EvalError::Limit(_)));
    let long = "1+".repeat(2_000) + "1";
    assert!(matches!(eval(&long, &b), Err(EvalError::Limit(_))));
  }

  #[test]
  fn nested_repetition_cannot_exhaust_memory() {
    let b = Bindings::new();
    let small = EvalLimits { max_collection_len: 1_000, max_cells: 100_000, ..EvalLimits::default() };
    assert!(matches!(evaluate("[[0]*1000]*1000", &b, &small), Err(EvalError::Limit(_))));
    assert!(matches!(eval("[[0]*100000]*100000", &b), Err(EvalError::Limit(_))));
    assert!(matches!(eval("[[0]*100000]*300", &b), Err(EvalError::Limit(_))));
    assert!(matches!(eval("[row for row in [[0]*1000] for _ in range(5000)]", &b), Err(EvalError::Limit(_))));
    assert_eq!(eval("len([[0]*10]*10)", &b).unwrap(), Value::Int(10));
  }

  #[test]
  fn string_growth_is_bounded() {
    let b = Bindings::new();
    assert!(matches!(eval("('a'*100000).replace('a', 'a'*2000)", &b), Err(EvalError::Limit(_))));
    assert!(matches!(eval("'-'.join(['ab'*1000]*1000)", &b), Err(EvalError::Limit(_))));
    assert_eq!(eval("'a.b'.replace('.', '::')", &b).unwrap(), Value::from("a::b"));
  }

  #[test]
  fn range_arithmetic_at_the_edges_does_not_panic() {
    let b = Bindings::new();
    assert!(matches!(eval("range(0, 10, 3)[::-2**62*2]", &b), Err(EvalError::Overflow(_))));
    assert_eq!(
      eval("list(range(-2**62*2, 2**62, 2**62))", &b).unwrap(),
      ints(&[i64::MIN, -(1 << 62), 0])
    );
    assert_eq!(eval("[1, 2, 3][1::2**62-1+2**62]", &b).unwrap(), ints(&[2]));
    assert_eq!(eval("list(range(10)[::-3])", &b).unwrap(), ints(&[9, 6, 3, 0]));
  }

  #[test]
  fn bindings_are_left_untouched() {
    let b = bind(&[("nums", ints(&[1, 2]))]);
    let before = b.clone();
    let _ = eval("[x * 2 for x in nums]", &b);
    assert_eq!(b, before);
  }
}
