//! Runtime values of the expression language and their Python-compatible
//! equality, ordering and text rendering.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Number};

use super::error::{EvalError, EvalResult};

#[derive(Clone, Debug)]
pub enum Value {
  None,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
  List(Vec<Value>),
  Tuple(Vec<Value>),
  Dict(Dict),
  Range(Range),
}

/// Insertion-ordered mapping. Keys are compared with Python equality, so
/// `1` and `1.0` address the same slot.
#[derive(Clone, Debug, Default)]
pub struct Dict {
  entries: Vec<(Value, Value)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
  pub start: i64,
  pub stop: i64,
  pub step: i64,
}

impl Dict {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn get(&self, key: &Value) -> Option<&Value> {
    self.entries.iter().find(|(k, _)| k.py_eq(key)).map(|(_, v)| v)
  }

  pub fn contains_key(&self, key: &Value) -> bool { self.get(key).is_some() }

  /// Insert or overwrite; an overwritten key keeps its original position.
  pub fn insert(&mut self, key: Value, value: Value) -> EvalResult<()> {
    key.ensure_hashable()?;
    match self.entries.iter_mut().find(|(k, _)| k.py_eq(&key)) {
      Some(slot) => slot.1 = value,
      None => self.entries.push((key, value)),
    }
    Ok(())
  }

  pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> { self.entries.iter() }

  pub fn keys(&self) -> Vec<Value> { self.entries.iter().map(|(k, _)| k.clone()).collect() }

  pub fn values(&self) -> Vec<Value> { self.entries.iter().map(|(_, v)| v.clone()).collect() }

  pub fn items(&self) -> Vec<Value> {
    self.entries.iter().map(|(k, v)| Value::Tuple(vec![k.clone(), v.clone()])).collect()
  }
}

impl Range {
  pub fn new(start: i64, stop: i64, step: i64) -> EvalResult<Self> {
    if step == 0 {
      return Err(EvalError::value("range() arg 3 must not be zero"));
    }
    Ok(Self { start, stop, step })
  }

  pub fn len(&self) -> usize {
    let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
    let n = if step > 0 {
      (stop - start + step - 1) / step
    } else {
      (start - stop - step - 1) / (-step)
    };
    n.max(0) as usize
  }

  /// The `i`-th element, or `None` past the end.
  pub fn get(&self, i: usize) -> Option<i64> {
    if i >= self.len() {
      return None;
    }
    i64::try_from(self.start as i128 + self.step as i128 * i as i128).ok()
  }

  pub fn contains(&self, x: i64) -> bool {
    let in_bounds = if self.step > 0 {
      x >= self.start && x < self.stop
    } else {
      x <= self.start && x > self.stop
    };
    in_bounds && (x as i128 - self.start as i128) % self.step as i128 == 0
  }
}

impl Value {
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::None => "NoneType",
      Value::Bool(_) => "bool",
      Value::Int(_) => "int",
      Value::Float(_) => "float",
      Value::Str(_) => "str",
      Value::List(_) => "list",
      Value::Tuple(_) => "tuple",
      Value::Dict(_) => "dict",
      Value::Range(_) => "range",
    }
  }

  pub fn truthy(&self) -> bool {
    match self {
      Value::None => false,
      Value::Bool(b) => *b,
      Value::Int(i) => *i != 0,
      Value::Float(f) => *f != 0.0,
      Value::Str(s) => !s.is_empty(),
      Value::List(v) | Value::Tuple(v) => !v.is_empty(),
      Value::Dict(d) => !d.is_empty(),
      Value::Range(r) => r.len() > 0,
    }
  }

  /// Allocation weight charged against the evaluation budget.
  pub fn cells(&self) -> u64 {
    match self {
      Value::Str(s) => 1 + s.len() as u64,
      Value::List(items) | Value::Tuple(items) => 1 + total_cells(items),
      Value::Dict(d) => 1 + d.iter().map(|(k, v)| k.cells() + v.cells()).sum::<u64>(),
      _ => 1,
    }
  }

  /// Integer view of bools and ints (Python treats `True` as `1`).
  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Bool(b) => Some(*b as i64),
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_float(&self) -> Option<f64> {
    match self {
      Value::Float(f) => Some(*f),
      other => other.as_int().map(|i| i as f64),
    }
  }

  pub fn is_number(&self) -> bool {
    matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_))
  }

  pub fn ensure_hashable(&self) -> EvalResult<()> {
    match self {
      Value::List(_) | Value::Dict(_) => {
        Err(EvalError::type_err(format!("unhashable type: '{}'", self.type_name())))
      }
      Value::Tuple(items) => items.iter().try_for_each(Value::ensure_hashable),
      _ => Ok(()),
    }
  }

  /// Python `==`.
  pub fn py_eq(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::None, Value::None) => true,
      (Value::Str(a), Value::Str(b)) => a == b,
      (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
      }
      (Value::Dict(a), Value::Dict(b)) => {
        a.len() == b.len()
          && a.iter().all(|(k, v)| b.get(k).map(|w| v.py_eq(w)).unwrap_or(false))
      }
      (Value::Range(a), Value::Range(b)) => {
        let n = a.len();
        n == b.len() && (n == 0 || (a.start == b.start && (n == 1 || a.step == b.step)))
      }
      (a, b) if a.is_number() && b.is_number() => match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => x == y,
        _ => a.as_float() == b.as_float(),
      },
      _ => false,
    }
  }

  /// Python ordering. `Ok(None)` means unordered (a NaN was involved).
  pub fn py_cmp(&self, other: &Value, op: &str) -> EvalResult<Option<Ordering>> {
    match (self, other) {
      (a, b) if a.is_number() && b.is_number() => match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => Ok(Some(x.cmp(&y))),
        _ => Ok(a.as_float().and_then(|x| b.as_float().and_then(|y| x.partial_cmp(&y)))),
      },
      (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
      (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
        for (x, y) in a.iter().zip(b) {
          if !x.py_eq(y) {
            return x.py_cmp(y, op);
          }
        }
        Ok(Some(a.len().cmp(&b.len())))
      }
      _ => Err(EvalError::type_err(format!(
        "'{}' not supported between instances of '{}' and '{}'",
        op,
        self.type_name(),
        other.type_name()
      ))),
    }
  }

  /// Python `repr()`.
  pub fn repr(&self) -> String {
    let mut out = String::new();
    self.write_repr(&mut out);
    out
  }

  /// Python `str()`: strings render bare, everything else as `repr()`.
  pub fn to_display(&self) -> String {
    match self {
      Value::Str(s) => s.clone(),
      other => other.repr(),
    }
  }

  fn write_repr(&self, out: &mut String) {
    match self {
      Value::None => out.push_str("None"),
      Value::Bool(true) => out.push_str("True"),
      Value::Bool(false) => out.push_str("False"),
      Value::Int(i) => out.push_str(&i.to_string()),
      Value::Float(f) => out.push_str(&float_repr(*f)),
      Value::Str(s) => out.push_str(&str_repr(s)),
      Value::List(items) => {
        out.push('[');
        write_seq(items, out);
        out.push(']');
      }
      Value::Tuple(items) => {
        out.push('(');
        write_seq(items, out);
        if items.len() == 1 {
          out.push(',');
        }
        out.push(')');
      }
      Value::Dict(d) => {
        out.push('{');
        for (i, (k, v)) in d.iter().enumerate() {
          if i > 0 {
            out.push_str(", ");
          }
          k.write_repr(out);
          out.push_str(": ");
          v.write_repr(out);
        }
        out.push('}');
      }
      Value::Range(r) => {
        if r.step == 1 {
          out.push_str(&format!("range({}, {})", r.start, r.stop));
        } else {
          out.push_str(&format!("range({}, {}, {})", r.start, r.stop, r.step));
        }
      }
    }
  }

  /// Wire form. Ranges expand to arrays when `expand_ranges` is set and are
  /// otherwise sent as their `repr()`.
  pub fn to_json(&self, expand_ranges: bool) -> serde_json::Value {
    use serde_json::Value as J;
    match self {
      Value::None => J::Null,
      Value::Bool(b) => J::Bool(*b),
      Value::Int(i) => J::Number((*i).into()),
      Value::Float(f) => Number::from_f64(*f).map(J::Number).unwrap_or(J::Null),
      Value::Str(s) => J::String(s.clone()),
      Value::List(items) | Value::Tuple(items) => {
        J::Array(items.iter().map(|v| v.to_json(expand_ranges)).collect())
      }
      Value::Dict(d) => {
        let mut map = Map::new();
        for (k, v) in d.iter() {
          map.insert(k.to_display(), v.to_json(expand_ranges));
        }
        J::Object(map)
      }
      Value::Range(r) if expand_ranges => {
        J::Array((0..r.len()).filter_map(|i| r.get(i)).map(|n| J::Number(n.into())).collect())
      }
      Value::Range(_) => J::String(self.repr()),
    }
  }
}

pub fn total_cells(items: &[Value]) -> u64 { items.iter().map(Value::cells).sum() }

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool { self.py_eq(other) }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_display())
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self { Value::Int(i) }
}

impl From<f64> for Value {
  fn from(f: f64) -> Self { Value::Float(f) }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Value::Str(s.to_string()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Value::Str(s) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(items: Vec<T>) -> Self { Value::List(items.into_iter().map(Into::into).collect()) }
}

fn write_seq(items: &[Value], out: &mut String) {
  for (i, v) in items.iter().enumerate() {
    if i > 0 {
      out.push_str(", ");
    }
    v.write_repr(out);
  }
}

/// Shortest round-trip float text in Python's layout: `2.0`, `0.1`,
/// `1e+16`, `1.5e-05`, `inf`, `nan`.
pub fn float_repr(f: f64) -> String {
  if f.is_nan() {
    return "nan".into();
  }
  if f.is_infinite() {
    return if f > 0.0 { "inf".into() } else { "-inf".into() };
  }
  let abs = f.abs();
  if abs != 0.0 && (abs >= 1e16 || abs < 1e-4) {
    let sci = format!("{:e}", f);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let (sign, digits) = match exp.strip_prefix('-') {
      Some(d) => ('-', d),
      None => ('+', exp),
    };
    return format!("{mantissa}e{sign}{digits:0>2}");
  }
  let s = format!("{}", f);
  if s.contains('.') { s } else { format!("{s}.0") }
}

fn str_repr(s: &str) -> String {
  let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
  let mut out = String::with_capacity(s.len() + 2);
  out.push(quote);
  for ch in s.chars() {
    match ch {
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\t' => out.push_str("\\t"),
      '\r' => out.push_str("\\r"),
      c if c == quote => {
        out.push('\\');
        out.push(c);
      }
      c => out.push(c),
    }
  }
  out.push(quote);
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn repr_matches_python_layout() {
    let v = Value::List(vec![
      Value::Int(1),
      Value::Str("it's".into()),
      Value::Tuple(vec![Value::Float(2.0)]),
      Value::None,
      Value::Bool(true),
    ]);
    assert_eq!(v.repr(), "[1, \"it's\", (2.0,), None, True]");
    assert_eq!(Value::Str("cat".into()).to_display(), "cat");
    assert_eq!(Value::Range(Range::new(0, 7, 1).unwrap()).repr(), "range(0, 7)");
  }

  #[test]
  fn float_repr_uses_python_exponents() {
    assert_eq!(float_repr(1e16), "1e+16");
    assert_eq!(float_repr(0.000015), "1.5e-05");
    assert_eq!(float_repr(-3.5), "-3.5");
    assert_eq!(float_repr(0.1 + 0.2), "0.30000000000000004");
  }

  #[test]
  fn dict_equality_ignores_order_and_numeric_kind() {
    let mut a = Dict::new();
    a.insert("red".into(), Value::Int(2)).unwrap();
    a.insert("blue".into(), Value::Int(4)).unwrap();
    let mut b = Dict::new();
    b.insert("blue".into(), Value::Float(4.0)).unwrap();
    b.insert("red".into(), Value::Int(2)).unwrap();
    assert!(Value::Dict(a).py_eq(&Value::Dict(b)));
  }

  #[test]
  fn list_and_tuple_are_never_equal() {
    let l = Value::List(vec![Value::Int(1)]);
    let t = Value::Tuple(vec![Value::Int(1)]);
    assert!(!l.py_eq(&t));
  }

  #[test]
  fn range_length_and_membership() {
    let r = Range::new(10, 0, -3).unwrap();
    assert_eq!(r.len(), 4);
    assert!(r.contains(4));
    assert!(!r.contains(5));
    assert!(Range::new(0, 1, 0).is_err());
  }

  #[test]
  fn range_elements_near_the_integer_edges() {
    let r = Range::new(i64::MIN, 1 << 62, 1 << 62).unwrap();
    assert_eq!(r.len(), 3);
    assert_eq!(r.get(2), Some(0));
    assert_eq!(r.get(3), None);
  }

  #[test]
  fn empty_containers_are_falsy() {
    let mut d = Dict::new();
    assert!(!Value::Dict(d.clone()).truthy());
    d.insert(Value::Int(0), Value::None).unwrap();
    assert!(Value::Dict(d).truthy());
    assert!(!Value::Range(Range::new(3, 3, 1).unwrap()).truthy());
  }

  #[test]
  fn cells_count_nested_values_and_bytes() {
    let inner = Value::List(vec![Value::Int(0); 3]);
    assert_eq!(Value::List(vec![inner.clone(), inner]).cells(), 9);
    assert_eq!(Value::from("abc").cells(), 4);
  }

  #[test]
  fn unhashable_keys_are_rejected() {
    let mut d = Dict::new();
    let err = d.insert(Value::List(vec![]), Value::None).unwrap_err();
    assert!(matches!(err, EvalError::Type(_)));
  }
}
