//! Tree-walking evaluator. Reads bindings, never writes them; comprehension
//! variables live on a private stack that is unwound as each loop ends.

use super::ast::{BinOp, Clause, CmpOp, Expr, LogicalOp, Target, UnaryOp};
use super::budget::Budget;
use super::builtins;
use super::error::{EvalError, EvalResult};
use super::value::{total_cells, Dict, Range, Value};
use super::{Bindings, EvalLimits};

pub struct Interpreter<'a> {
  globals: &'a Bindings,
  locals: Vec<(String, Value)>,
  budget: Budget<'a>,
}

enum Sink<'e> {
  List { element: &'e Expr, out: Vec<Value> },
  Dict { key: &'e Expr, value: &'e Expr, out: Dict },
}

impl<'a> Interpreter<'a> {
  pub fn new(globals: &'a Bindings, limits: &'a EvalLimits) -> Self {
    Self { globals, locals: Vec::new(), budget: Budget::new(limits) }
  }

  pub fn budget(&self) -> &Budget<'a> { &self.budget }

  /// Names resolve to copies, so every lookup pays for what it clones.
  fn lookup(&mut self, name: &str) -> EvalResult<Value> {
    let found = match self.locals.iter().rev().find(|(n, _)| n == name) {
      Some((_, v)) => Some(v),
      None => self.globals.get(name),
    };
    if let Some(v) = found {
      self.budget.charge(v.cells())?;
      return Ok(v.clone());
    }
    if builtins::is_builtin(name) {
      return Err(EvalError::type_err(format!("builtin '{name}' can only be called")));
    }
    Err(EvalError::name(format!("name '{name}' is not defined")))
  }

  pub fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
    self.budget.tick()?;
    match expr {
      Expr::Int(i) => Ok(Value::Int(*i)),
      Expr::Float(f) => Ok(Value::Float(*f)),
      Expr::Str(s) => {
        self.budget.charge(s.len() as u64)?;
        Ok(Value::Str(s.clone()))
      }
      Expr::Bool(b) => Ok(Value::Bool(*b)),
      Expr::None => Ok(Value::None),
      Expr::Name(n) => self.lookup(n),
      Expr::List(items) => Ok(Value::List(self.eval_all(items)?)),
      Expr::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
      Expr::Dict(pairs) => {
        let mut d = Dict::new();
        for (k, v) in pairs {
          let key = self.eval(k)?;
          let value = self.eval(v)?;
          d.insert(key, value)?;
        }
        Ok(Value::Dict(d))
      }
      Expr::Unary { op, operand } => {
        let v = self.eval(operand)?;
        unary_op(*op, v)
      }
      Expr::Binary { left, op, right } => {
        let l = self.eval(left)?;
        let r = self.eval(right)?;
        binary_op(*op, l, r, &mut self.budget)
      }
      Expr::Logical { left, op, right } => {
        let l = self.eval(left)?;
        match (op, l.truthy()) {
          (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(l),
          _ => self.eval(right),
        }
      }
      Expr::Compare { first, rest } => {
        let mut left = self.eval(first)?;
        for (op, e) in rest {
          let right = self.eval(e)?;
          if !compare(*op, &left, &right)? {
            return Ok(Value::Bool(false));
          }
          left = right;
        }
        Ok(Value::Bool(true))
      }
      Expr::IfElse { cond, then, otherwise } => {
        if self.eval(cond)?.truthy() {
          self.eval(then)
        } else {
          self.eval(otherwise)
        }
      }
      Expr::Index { object, index } => {
        let obj = self.eval(object)?;
        let idx = self.eval(index)?;
        index_value(&obj, &idx, &mut self.budget)
      }
      Expr::Slice { object, lower, upper, step } => {
        let obj = self.eval(object)?;
        let lower = self.slice_bound(lower.as_deref())?;
        let upper = self.slice_bound(upper.as_deref())?;
        let step = self.slice_bound(step.as_deref())?;
        slice_value(&obj, lower, upper, step, &mut self.budget)
      }
      Expr::Call { func, args, kwargs } => {
        let args = self.eval_all(args)?;
        let mut kw = Vec::with_capacity(kwargs.len());
        for (name, e) in kwargs {
          kw.push((name.clone(), self.eval(e)?));
        }
        builtins::call_builtin(func, args, kw, &mut self.budget)
      }
      Expr::MethodCall { object, method, args } => {
        let obj = self.eval(object)?;
        let args = self.eval_all(args)?;
        builtins::call_method(&obj, method, args, &mut self.budget)
      }
      Expr::ListComp { element, clauses } => {
        let mut sink = Sink::List { element, out: Vec::new() };
        self.run_clauses(clauses, &mut sink)?;
        match sink {
          Sink::List { out, .. } => Ok(Value::List(out)),
          Sink::Dict { out, .. } => Ok(Value::Dict(out)),
        }
      }
      Expr::DictComp { key, value, clauses } => {
        let mut sink = Sink::Dict { key, value, out: Dict::new() };
        self.run_clauses(clauses, &mut sink)?;
        match sink {
          Sink::List { out, .. } => Ok(Value::List(out)),
          Sink::Dict { out, .. } => Ok(Value::Dict(out)),
        }
      }
    }
  }

  fn eval_all(&mut self, items: &[Expr]) -> EvalResult<Vec<Value>> {
    let mut out = Vec::with_capacity(items.len());
    for e in items {
      out.push(self.eval(e)?);
    }
    Ok(out)
  }

  fn slice_bound(&mut self, e: Option<&Expr>) -> EvalResult<Option<i64>> {
    let Some(e) = e else { return Ok(None) };
    match self.eval(e)? {
      Value::None => Ok(None),
      v => v
        .as_int()
        .map(Some)
        .ok_or_else(|| EvalError::type_err("slice indices must be integers or None")),
    }
  }

  fn run_clauses(&mut self, clauses: &[Clause], sink: &mut Sink<'_>) -> EvalResult<()> {
    let Some((clause, rest)) = clauses.split_first() else {
      return self.emit(sink);
    };
    match clause {
      Clause::If(cond) => {
        if self.eval(cond)?.truthy() {
          self.run_clauses(rest, sink)?;
        }
        Ok(())
      }
      Clause::For { target, iter } => {
        let source = self.eval(iter)?;
        for item in iterate(&source, &mut self.budget)? {
          self.budget.tick()?;
          let mark = self.locals.len();
          self.bind(target, item)?;
          self.run_clauses(rest, sink)?;
          self.locals.truncate(mark);
        }
        Ok(())
      }
    }
  }

  fn emit(&mut self, sink: &mut Sink<'_>) -> EvalResult<()> {
    let len = match sink {
      Sink::List { element, out } => {
        let v = self.eval(element)?;
        out.push(v);
        out.len()
      }
      Sink::Dict { key, value, out } => {
        let k = self.eval(key)?;
        let v = self.eval(value)?;
        out.insert(k, v)?;
        out.len()
      }
    };
    self.budget.check_len(len)
  }

  fn bind(&mut self, target: &Target, value: Value) -> EvalResult<()> {
    match target {
      Target::Name(n) => {
        self.locals.push((n.clone(), value));
        Ok(())
      }
      Target::Tuple(targets) => {
        let items = iterate(&value, &mut self.budget)?;
        if items.len() > targets.len() {
          return Err(EvalError::value(format!("too many values to unpack (expected {})", targets.len())));
        }
        if items.len() < targets.len() {
          return Err(EvalError::value(format!(
            "not enough values to unpack (expected {}, got {})",
            targets.len(),
            items.len()
          )));
        }
        for (t, v) in targets.iter().zip(items) {
          self.bind(t, v)?;
        }
        Ok(())
      }
    }
  }
}

/// Materialise anything iterable into its elements.
pub(super) fn iterate(v: &Value, budget: &mut Budget<'_>) -> EvalResult<Vec<Value>> {
  match v {
    Value::List(items) | Value::Tuple(items) => {
      budget.charge(total_cells(items))?;
      Ok(items.clone())
    }
    Value::Str(s) => {
      budget.charge((s.chars().count() + s.len()) as u64)?;
      Ok(s.chars().map(|c| Value::Str(c.to_string())).collect())
    }
    Value::Dict(d) => {
      budget.charge(d.iter().map(|(k, _)| k.cells()).sum())?;
      Ok(d.keys())
    }
    Value::Range(r) => {
      let n = r.len();
      budget.check_len(n)?;
      budget.charge(n as u64)?;
      let mut out = Vec::with_capacity(n);
      for i in 0..n {
        budget.poll()?;
        out.push(Value::Int(r.get(i).ok_or_else(EvalError::overflow)?));
      }
      Ok(out)
    }
    other => Err(EvalError::type_err(format!("'{}' object is not iterable", other.type_name()))),
  }
}

fn unary_op(op: UnaryOp, v: Value) -> EvalResult<Value> {
  match (op, &v) {
    (UnaryOp::Not, _) => Ok(Value::Bool(!v.truthy())),
    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
    (UnaryOp::Pos, Value::Float(f)) => Ok(Value::Float(*f)),
    (UnaryOp::Neg, _) if v.as_int().is_some() => {
      v.as_int().and_then(i64::checked_neg).map(Value::Int).ok_or_else(EvalError::overflow)
    }
    (UnaryOp::Pos, _) if v.as_int().is_some() => Ok(Value::Int(v.as_int().unwrap_or_default())),
    _ => {
      let sym = if op == UnaryOp::Neg { "-" } else { "+" };
      Err(EvalError::type_err(format!("bad operand type for unary {sym}: '{}'", v.type_name())))
    }
  }
}

fn unsupported(op: BinOp, a: &Value, b: &Value) -> EvalError {
  EvalError::type_err(format!(
    "unsupported operand type(s) for {}: '{}' and '{}'",
    op.symbol(),
    a.type_name(),
    b.type_name()
  ))
}

/// Floor division rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> EvalResult<i64> {
  let q = a.checked_div(b).ok_or_else(EvalError::overflow)?;
  if (a % b != 0) && ((a < 0) != (b < 0)) {
    Ok(q - 1)
  } else {
    Ok(q)
  }
}

/// Modulo whose sign follows the divisor.
fn floor_mod(a: i64, b: i64) -> i64 {
  let r = a.wrapping_rem(b);
  if r != 0 && ((r < 0) != (b < 0)) {
    r + b
  } else {
    r
  }
}

fn float_mod(a: f64, b: f64) -> f64 {
  let r = a % b;
  if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
    r + b
  } else {
    r
  }
}

/// `items * n`. The whole result is paid for before the first copy.
fn repeat(items: &[Value], n: i64, budget: &mut Budget<'_>) -> EvalResult<Vec<Value>> {
  if n <= 0 || items.is_empty() {
    return Ok(Vec::new());
  }
  let copies = usize::try_from(n).unwrap_or(usize::MAX);
  budget.check_len(items.len().saturating_mul(copies))?;
  budget.charge(total_cells(items).saturating_mul(copies as u64))?;
  let mut out = Vec::with_capacity(items.len() * copies);
  for _ in 0..copies {
    budget.poll()?;
    out.extend_from_slice(items);
  }
  Ok(out)
}

fn repeat_str(s: &str, n: i64, budget: &mut Budget<'_>) -> EvalResult<String> {
  if n <= 0 || s.is_empty() {
    return Ok(String::new());
  }
  let copies = usize::try_from(n).unwrap_or(usize::MAX);
  budget.check_len(s.chars().count().saturating_mul(copies))?;
  budget.charge((s.len() as u64).saturating_mul(copies as u64))?;
  let mut out = String::with_capacity(s.len() * copies);
  for _ in 0..copies {
    budget.poll()?;
    out.push_str(s);
  }
  Ok(out)
}

pub(super) fn binary_op(op: BinOp, a: Value, b: Value, budget: &mut Budget<'_>) -> EvalResult<Value> {
  // int (or bool) on both sides
  if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
    return int_op(op, x, y);
  }
  if a.is_number() && b.is_number() {
    let (x, y) = (a.as_float().unwrap_or_default(), b.as_float().unwrap_or_default());
    return float_op(op, x, y);
  }
  match (op, &a, &b) {
    (BinOp::Add, Value::Str(x), Value::Str(y)) => {
      budget.check_len(x.len() + y.len())?;
      budget.charge((x.len() + y.len()) as u64)?;
      Ok(Value::Str(format!("{x}{y}")))
    }
    (BinOp::Add, Value::List(x), Value::List(y)) => {
      budget.check_len(x.len() + y.len())?;
      budget.charge(total_cells(x) + total_cells(y))?;
      Ok(Value::List(x.iter().chain(y).cloned().collect()))
    }
    (BinOp::Add, Value::Tuple(x), Value::Tuple(y)) => {
      budget.check_len(x.len() + y.len())?;
      budget.charge(total_cells(x) + total_cells(y))?;
      Ok(Value::Tuple(x.iter().chain(y).cloned().collect()))
    }
    (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if n.as_int().is_some() => {
      Ok(Value::Str(repeat_str(s, n.as_int().unwrap_or_default(), budget)?))
    }
    (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items)) if n.as_int().is_some() => {
      Ok(Value::List(repeat(items, n.as_int().unwrap_or_default(), budget)?))
    }
    (BinOp::Mul, Value::Tuple(items), n) | (BinOp::Mul, n, Value::Tuple(items)) if n.as_int().is_some() => {
      Ok(Value::Tuple(repeat(items, n.as_int().unwrap_or_default(), budget)?))
    }
    _ => Err(unsupported(op, &a, &b)),
  }
}

fn int_op(op: BinOp, x: i64, y: i64) -> EvalResult<Value> {
  let overflow = EvalError::overflow;
  match op {
    BinOp::Add => x.checked_add(y).map(Value::Int).ok_or_else(overflow),
    BinOp::Sub => x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
    BinOp::Mul => x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
    BinOp::Div => {
      if y == 0 {
        return Err(EvalError::zero_div("division by zero"));
      }
      Ok(Value::Float(x as f64 / y as f64))
    }
    BinOp::FloorDiv => {
      if y == 0 {
        return Err(EvalError::zero_div("integer division or modulo by zero"));
      }
      floor_div(x, y).map(Value::Int)
    }
    BinOp::Mod => {
      if y == 0 {
        return Err(EvalError::zero_div("integer division or modulo by zero"));
      }
      Ok(Value::Int(floor_mod(x, y)))
    }
    BinOp::Pow => {
      if y < 0 {
        if x == 0 {
          return Err(EvalError::zero_div("0.0 cannot be raised to a negative power"));
        }
        return Ok(Value::Float((x as f64).powf(y as f64)));
      }
      match x {
        0 | 1 => Ok(Value::Int(if y == 0 { 1 } else { x })),
        -1 => Ok(Value::Int(if y % 2 == 0 { 1 } else { -1 })),
        _ => {
          let exp = u32::try_from(y).map_err(|_| EvalError::overflow())?;
          x.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
        }
      }
    }
  }
}

fn float_op(op: BinOp, x: f64, y: f64) -> EvalResult<Value> {
  match op {
    BinOp::Add => Ok(Value::Float(x + y)),
    BinOp::Sub => Ok(Value::Float(x - y)),
    BinOp::Mul => Ok(Value::Float(x * y)),
    BinOp::Div => {
      if y == 0.0 {
        return Err(EvalError::zero_div("float division by zero"));
      }
      Ok(Value::Float(x / y))
    }
    BinOp::FloorDiv => {
      if y == 0.0 {
        return Err(EvalError::zero_div("float floor division by zero"));
      }
      Ok(Value::Float((x / y).floor()))
    }
    BinOp::Mod => {
      if y == 0.0 {
        return Err(EvalError::zero_div("float modulo"));
      }
      Ok(Value::Float(float_mod(x, y)))
    }
    BinOp::Pow => {
      if x == 0.0 && y < 0.0 {
        return Err(EvalError::zero_div("0.0 cannot be raised to a negative power"));
      }
      if x < 0.0 && y.fract() != 0.0 {
        return Err(EvalError::value("negative number cannot be raised to a fractional power"));
      }
      let r = x.powf(y);
      if r.is_infinite() && x.is_finite() && y.is_finite() {
        return Err(EvalError::Overflow("numerical result out of range".into()));
      }
      Ok(Value::Float(r))
    }
  }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> EvalResult<bool> {
  use std::cmp::Ordering::*;
  let ordered = |want: fn(std::cmp::Ordering) -> bool| -> EvalResult<bool> {
    Ok(a.py_cmp(b, op.symbol())?.map(want).unwrap_or(false))
  };
  match op {
    CmpOp::Eq => Ok(a.py_eq(b)),
    CmpOp::NotEq => Ok(!a.py_eq(b)),
    CmpOp::Lt => ordered(|o| o == Less),
    CmpOp::Le => ordered(|o| o != Greater),
    CmpOp::Gt => ordered(|o| o == Greater),
    CmpOp::Ge => ordered(|o| o != Less),
    CmpOp::In => contains(b, a),
    CmpOp::NotIn => contains(b, a).map(|found| !found),
    CmpOp::Is => Ok(identical(a, b)),
    CmpOp::IsNot => Ok(!identical(a, b)),
  }
}

/// Approximates object identity: singletons and small immutable scalars
/// compare by value, containers are never identical.
fn identical(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::None, Value::None) => true,
    (Value::Bool(x), Value::Bool(y)) => x == y,
    (Value::Int(x), Value::Int(y)) => x == y,
    (Value::Str(x), Value::Str(y)) => x == y,
    _ => false,
  }
}

pub(super) fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
  match container {
    Value::Str(s) => match item {
      Value::Str(sub) => Ok(s.contains(sub.as_str())),
      other => Err(EvalError::type_err(format!(
        "'in <string>' requires string as left operand, not {}",
        other.type_name()
      ))),
    },
    Value::List(items) | Value::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(item))),
    Value::Dict(d) => {
      item.ensure_hashable()?;
      Ok(d.contains_key(item))
    }
    Value::Range(r) => Ok(match item {
      Value::Float(f) if f.fract() == 0.0 && f.is_finite() => r.contains(*f as i64),
      other => other.as_int().map(|i| r.contains(i)).unwrap_or(false),
    }),
    other => Err(EvalError::type_err(format!("argument of type '{}' is not iterable", other.type_name()))),
  }
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
  let len = len as i128;
  let idx = if i < 0 { i as i128 + len } else { i as i128 };
  (0..len).contains(&idx).then_some(idx as usize)
}

pub(super) fn index_value(obj: &Value, idx: &Value, budget: &mut Budget<'_>) -> EvalResult<Value> {
  if let Value::Dict(d) = obj {
    idx.ensure_hashable()?;
    let v = d.get(idx).ok_or_else(|| EvalError::key(idx.repr()))?;
    budget.charge(v.cells())?;
    return Ok(v.clone());
  }
  let len = match obj {
    Value::List(items) | Value::Tuple(items) => items.len(),
    Value::Str(s) => s.chars().count(),
    Value::Range(r) => r.len(),
    other => {
      return Err(EvalError::type_err(format!("'{}' object is not subscriptable", other.type_name())));
    }
  };
  let i = idx.as_int().ok_or_else(|| {
    EvalError::type_err(format!(
      "{} indices must be integers or slices, not {}",
      obj.type_name(),
      idx.type_name()
    ))
  })?;
  let Some(pos) = normalize_index(i, len) else {
    let what = match obj {
      Value::Str(_) => "string",
      Value::Range(_) => "range object",
      other => other.type_name(),
    };
    return Err(EvalError::index(format!("{what} index out of range")));
  };
  Ok(match obj {
    Value::List(items) | Value::Tuple(items) => {
      budget.charge(items[pos].cells())?;
      items[pos].clone()
    }
    Value::Str(s) => {
      budget.charge(2)?;
      Value::Str(s.chars().nth(pos).map(String::from).unwrap_or_default())
    }
    Value::Range(r) => Value::Int(r.get(pos).ok_or_else(EvalError::overflow)?),
    _ => Value::None,
  })
}

/// Resolve slice bounds to concrete `(start, stop, step)` the way Python does.
fn adjust_slice(len: usize, lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> EvalResult<(i64, i64, i64)> {
  let step = step.unwrap_or(1);
  if step == 0 {
    return Err(EvalError::value("slice step cannot be zero"));
  }
  let n = i64::try_from(len).map_err(|_| EvalError::overflow())?;
  let clamp = |x: i64| -> i64 {
    if x < 0 {
      let x = x + n;
      if x < 0 {
        if step < 0 { -1 } else { 0 }
      } else {
        x
      }
    } else if x >= n {
      if step < 0 { n - 1 } else { n }
    } else {
      x
    }
  };
  let (start, stop) = if step > 0 {
    (lower.map(clamp).unwrap_or(0), upper.map(clamp).unwrap_or(n))
  } else {
    (lower.map(clamp).unwrap_or(n - 1), upper.map(clamp).unwrap_or(-1))
  };
  Ok((start, stop, step))
}

fn slice_indices(start: i64, stop: i64, step: i64) -> impl Iterator<Item = usize> {
  let mut i = start;
  std::iter::from_fn(move || {
    let more = if step > 0 { i < stop } else { i > stop };
    if !more {
      return None;
    }
    let cur = i;
    // stepping past either end of i64 also ends the walk
    i = i.checked_add(step).unwrap_or(stop);
    Some(cur as usize)
  })
}

fn to_i64(n: i128) -> EvalResult<i64> { i64::try_from(n).map_err(|_| EvalError::overflow()) }

pub(super) fn slice_value(
  obj: &Value,
  lower: Option<i64>,
  upper: Option<i64>,
  step: Option<i64>,
  budget: &mut Budget<'_>,
) -> EvalResult<Value> {
  match obj {
    Value::List(items) | Value::Tuple(items) => {
      let (start, stop, step) = adjust_slice(items.len(), lower, upper, step)?;
      let picked: Vec<usize> = slice_indices(start, stop, step).collect();
      budget.charge(picked.iter().map(|&i| items[i].cells()).sum())?;
      let picked: Vec<Value> = picked.into_iter().map(|i| items[i].clone()).collect();
      Ok(if matches!(obj, Value::List(_)) { Value::List(picked) } else { Value::Tuple(picked) })
    }
    Value::Str(s) => {
      let chars: Vec<char> = s.chars().collect();
      let (start, stop, step) = adjust_slice(chars.len(), lower, upper, step)?;
      budget.charge(s.len() as u64)?;
      Ok(Value::Str(slice_indices(start, stop, step).map(|i| chars[i]).collect()))
    }
    Value::Range(r) => {
      let (start, stop, step) = adjust_slice(r.len(), lower, upper, step)?;
      let at = |k: i64| to_i64(r.start as i128 + k as i128 * r.step as i128);
      Ok(Value::Range(Range::new(at(start)?, at(stop)?, to_i64(r.step as i128 * step as i128)?)?))
    }
    other => Err(EvalError::type_err(format!("'{}' object is not subscriptable", other.type_name()))),
  }
}
