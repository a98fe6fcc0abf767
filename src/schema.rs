//! Static registry of comprehension fragments.
//!
//! Each fragment pairs a code snippet written against the element names
//! (`x`, or `k`/`v` for maps) with the English phrase used in prompts.
//! Tables are keyed by operand kind; `resolve` picks the kind for a shape.

use crate::domain::{InputShape, OperandKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fragment {
  pub code: &'static str,
  pub desc: &'static str,
}

macro_rules! frag {
  ($code:expr, $desc:expr) => {
    Fragment { code: $code, desc: $desc }
  };
}

/// Operand kind whose fragments are valid for elements of `shape`.
pub fn resolve(shape: InputShape) -> OperandKind {
  match shape {
    InputShape::IntSequence | InputShape::FloatSequence | InputShape::Range => OperandKind::Int,
    InputShape::WordSequence => OperandKind::Str,
    InputShape::KeyedMap => OperandKind::DictItem,
  }
}

pub fn transforms_for(kind: OperandKind) -> &'static [Fragment] {
  match kind {
    OperandKind::Int => TRANSFORMS_INT,
    OperandKind::Str => TRANSFORMS_STR,
    OperandKind::DictItem => TRANSFORMS_DICT_ITEM,
  }
}

pub fn filters_for(kind: OperandKind) -> &'static [Fragment] {
  match kind {
    OperandKind::Int => FILTERS_INT,
    OperandKind::Str => FILTERS_STR,
    OperandKind::DictItem => FILTERS_DICT_ITEM,
  }
}

/// Conditional-expression fragments. There are none for map items.
pub fn conditionals_for(kind: OperandKind) -> &'static [Fragment] {
  match kind {
    OperandKind::Int => CONDITIONALS_INT,
    OperandKind::Str => CONDITIONALS_STR,
    OperandKind::DictItem => &[],
  }
}

const TRANSFORMS_INT: &[Fragment] = &[
  frag!("x**2", "the square of each number"),
  frag!("abs(x)", "the absolute value"),
  frag!("x + 10", "each number plus 10"),
  frag!("x * 2", "double each number"),
  frag!("x - 5", "each number minus 5"),
  frag!("x // 2", "each number divided by 2"),
  frag!("-x", "the negation of each number"),
  frag!("x % 10", "remainder when divided by 10"),
];

const TRANSFORMS_STR: &[Fragment] = &[
  frag!("len(x)", "the length of each word"),
  frag!("x.upper()", "the word in uppercase"),
  frag!("x[0]", "the first letter of each word"),
  frag!("x.lower()", "the word in lowercase"),
  frag!("x[::-1]", "each word reversed"),
  frag!("x * 2", "each word repeated twice"),
  frag!("x[-1]", "the last letter of each word"),
];

const TRANSFORMS_DICT_ITEM: &[Fragment] = &[
  frag!("k", "the key"),
  frag!("v", "the value"),
  frag!("v * 2", "double the value"),
  frag!("len(k)", "the key length"),
  frag!("v // 2", "the value divided by 2"),
  frag!("v + 10", "the value plus 10"),
];

const FILTERS_INT: &[Fragment] = &[
  frag!("x % 2 == 0", "is even"),
  frag!("x > 10", "is greater than 10"),
  frag!("x < 0", "is negative"),
  frag!("x > 0", "is positive"),
  frag!("x % 3 == 0", "is divisible by 3"),
  frag!("x >= 0", "is non-negative"),
  frag!("x <= 0", "is non-positive"),
  frag!("abs(x) > 5", "absolute value is greater than 5"),
];

const FILTERS_STR: &[Fragment] = &[
  frag!("len(x) > 4", "has more than 4 letters"),
  frag!("'a' in x", "contains the letter 'a'"),
  frag!("x.startswith('c')", "starts with 'c'"),
  frag!("len(x) < 3", "has less than 3 letters"),
  frag!("x.isupper()", "is all uppercase"),
  frag!("x.islower()", "is all lowercase"),
  frag!("x.endswith('e')", "ends with 'e'"),
  frag!("len(x) == 4", "has exactly 4 letters"),
];

const FILTERS_DICT_ITEM: &[Fragment] = &[
  frag!("v % 2 == 0", "value is even"),
  frag!("len(k) > 3", "key length > 3"),
  frag!("v > 50", "value is greater than 50"),
  frag!("v < 20", "value is less than 20"),
  frag!("len(k) == 3", "key length is exactly 3"),
];

const CONDITIONALS_INT: &[Fragment] = &[
  frag!("x if x > 0 else 0", "keep positive numbers, map others to 0"),
  frag!("'even' if x % 2 == 0 else 'odd'", "replace with 'even' or 'odd'"),
  frag!("x if x > 0 else -x", "keep absolute value representation"),
  frag!("x * 2 if x > 5 else x", "double if greater than 5"),
  frag!("'pos' if x > 0 else 'neg' if x < 0 else 'zero'", "positive, negative, or zero label"),
];

const CONDITIONALS_STR: &[Fragment] = &[
  frag!("x.upper() if len(x) > 4 else x", "uppercase long words only"),
  frag!("len(x) if 'a' in x else -1", "length if 'a' is present, else -1"),
  frag!("x.lower() if x.isupper() else x", "lowercase if all uppercase"),
  frag!("x + 's' if len(x) > 3 else x", "add 's' if longer than 3 letters"),
];

#[cfg(test)]
mod tests {
  use super::*;
  use crate::expr::{evaluate, Bindings, EvalLimits, Value};
  use crate::samples;

  /// Run every fragment of every table against freshly sampled data of each
  /// compatible shape.
  #[test]
  fn every_fragment_evaluates_on_its_shapes() {
    let mut rng = rand::thread_rng();
    for _ in 0..20 {
      for shape in InputShape::ALL {
        let kind = resolve(shape);
        let var = shape.var_name();
        let mut bindings = Bindings::new();
        bindings.insert(var.to_string(), samples::sample(shape, &mut rng));
        let (pattern, src) = (shape.element_pattern(), shape.iter_source());

        for f in transforms_for(kind).iter().chain(conditionals_for(kind)) {
          let code = format!("[{} for {pattern} in {src}]", f.code);
          let out = evaluate(&code, &bindings, &EvalLimits::trusted());
          assert!(out.is_ok(), "{code} on {shape}: {out:?}");
        }
        let element = if shape == InputShape::KeyedMap { "(k, v)" } else { "x" };
        for f in filters_for(kind) {
          let code = format!("[{element} for {pattern} in {src} if {}]", f.code);
          let out = evaluate(&code, &bindings, &EvalLimits::trusted());
          assert!(matches!(out, Ok(Value::List(_))), "{code} on {shape}: {out:?}");
        }
      }
    }
  }

  #[test]
  fn map_items_have_no_conditionals() {
    assert!(conditionals_for(OperandKind::DictItem).is_empty());
    assert_eq!(resolve(InputShape::Range), OperandKind::Int);
    assert_eq!(resolve(InputShape::FloatSequence), OperandKind::Int);
    assert_eq!(resolve(InputShape::KeyedMap), OperandKind::DictItem);
  }
}
