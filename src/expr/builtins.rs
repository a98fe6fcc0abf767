//! The allowlisted builtin functions and methods.

use super::ast::BinOp;
use super::budget::Budget;
use super::error::{EvalError, EvalResult};
use super::interp::{binary_op, iterate};
use super::value::{total_cells, Dict, Range, Value};

const BUILTINS: &[&str] = &[
  "abs", "len", "str", "int", "float", "bool", "round", "min", "max", "sum", "sorted", "reversed",
  "list", "tuple", "dict", "range", "enumerate", "zip", "any", "all",
];

pub fn is_builtin(name: &str) -> bool { BUILTINS.contains(&name) }

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
  let n = args.len();
  if n >= min && n <= max {
    return Ok(());
  }
  let expected = match (min, max) {
    (a, b) if a == b => format!("exactly {a}"),
    (0, b) => format!("at most {b}"),
    (a, usize::MAX) => format!("at least {a}"),
    (a, b) => format!("from {a} to {b}"),
  };
  Err(EvalError::type_err(format!("{name}() takes {expected} argument(s) ({n} given)")))
}

fn int_arg(name: &str, v: &Value) -> EvalResult<i64> {
  v.as_int().ok_or_else(|| {
    EvalError::type_err(format!("{name}(): '{}' object cannot be interpreted as an integer", v.type_name()))
  })
}

fn float_to_int(f: f64) -> EvalResult<i64> {
  if f.is_nan() {
    return Err(EvalError::value("cannot convert float NaN to integer"));
  }
  if f.is_infinite() || f >= 9.223_372_036_854_776e18 || f < -9.223_372_036_854_776e18 {
    return Err(EvalError::Overflow("cannot convert float to integer".into()));
  }
  Ok(f as i64)
}

pub fn call_builtin(
  name: &str,
  mut args: Vec<Value>,
  kwargs: Vec<(String, Value)>,
  budget: &mut Budget<'_>,
) -> EvalResult<Value> {
  if !is_builtin(name) {
    return Err(EvalError::name(format!("name '{name}' is not defined")));
  }
  let mut reverse = false;
  for (key, value) in &kwargs {
    match (name, key.as_str()) {
      ("sorted", "reverse") => reverse = value.truthy(),
      _ => {
        return Err(EvalError::type_err(format!("{name}() got an unexpected keyword argument '{key}'")));
      }
    }
  }

  match name {
    "abs" => {
      arity(name, &args, 1, 1)?;
      match &args[0] {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        v => v
          .as_int()
          .ok_or_else(|| EvalError::type_err(format!("bad operand type for abs(): '{}'", v.type_name())))?
          .checked_abs()
          .map(Value::Int)
          .ok_or_else(EvalError::overflow),
      }
    }
    "len" => {
      arity(name, &args, 1, 1)?;
      let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) | Value::Tuple(items) => items.len(),
        Value::Dict(d) => d.len(),
        Value::Range(r) => r.len(),
        other => {
          return Err(EvalError::type_err(format!("object of type '{}' has no len()", other.type_name())));
        }
      };
      i64::try_from(n).map(Value::Int).map_err(|_| EvalError::overflow())
    }
    "str" => {
      arity(name, &args, 0, 1)?;
      let out = args.first().map(Value::to_display).unwrap_or_default();
      budget.charge(out.len() as u64)?;
      Ok(Value::Str(out))
    }
    "int" => {
      arity(name, &args, 0, 1)?;
      match args.first() {
        None => Ok(Value::Int(0)),
        Some(Value::Float(f)) => float_to_int(f.trunc()).map(Value::Int),
        Some(Value::Str(s)) => s
          .trim()
          .replace('_', "")
          .parse::<i64>()
          .map(Value::Int)
          .map_err(|_| EvalError::value(format!("invalid literal for int() with base 10: {}", Value::Str(s.clone()).repr()))),
        Some(v) => v.as_int().map(Value::Int).ok_or_else(|| {
          EvalError::type_err(format!("int() argument must be a string or a number, not '{}'", v.type_name()))
        }),
      }
    }
    "float" => {
      arity(name, &args, 0, 1)?;
      match args.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Str(s)) => s
          .trim()
          .parse::<f64>()
          .map(Value::Float)
          .map_err(|_| EvalError::value(format!("could not convert string to float: {}", Value::Str(s.clone()).repr()))),
        Some(v) => v.as_float().map(Value::Float).ok_or_else(|| {
          EvalError::type_err(format!("float() argument must be a string or a number, not '{}'", v.type_name()))
        }),
      }
    }
    "bool" => {
      arity(name, &args, 0, 1)?;
      Ok(Value::Bool(args.first().map(Value::truthy).unwrap_or(false)))
    }
    "round" => {
      arity(name, &args, 1, 2)?;
      let digits = match args.get(1) {
        None | Some(Value::None) => None,
        Some(v) => Some(int_arg(name, v)?),
      };
      match (&args[0], digits) {
        (Value::Float(f), None) => float_to_int(f.round_ties_even()).map(Value::Int),
        (Value::Float(f), Some(d)) => {
          let scale = 10f64.powi(d.clamp(-308, 308) as i32);
          Ok(Value::Float((f * scale).round_ties_even() / scale))
        }
        (v, Some(d)) if d < 0 && v.as_int().is_some() => {
          let scale = 10f64.powi(d.unsigned_abs().min(18) as i32);
          let x = v.as_int().unwrap_or_default() as f64;
          float_to_int((x / scale).round_ties_even() * scale).map(Value::Int)
        }
        (v, _) => v.as_int().map(Value::Int).ok_or_else(|| {
          EvalError::type_err(format!("type {} doesn't define __round__ method", v.type_name()))
        }),
      }
    }
    "min" | "max" => {
      arity(name, &args, 1, usize::MAX)?;
      let items = if args.len() == 1 { iterate(&args[0], budget)? } else { args };
      let mut iter = items.into_iter();
      let mut best = iter
        .next()
        .ok_or_else(|| EvalError::value(format!("{name}() arg is an empty sequence")))?;
      let (op, want) = if name == "min" { ("<", std::cmp::Ordering::Less) } else { (">", std::cmp::Ordering::Greater) };
      for v in iter {
        budget.poll()?;
        if v.py_cmp(&best, op)? == Some(want) {
          best = v;
        }
      }
      Ok(best)
    }
    "sum" => {
      arity(name, &args, 1, 2)?;
      let start = if args.len() == 2 { args.pop().unwrap_or(Value::Int(0)) } else { Value::Int(0) };
      if matches!(start, Value::Str(_)) {
        return Err(EvalError::type_err("sum() can't sum strings [use ''.join(seq) instead]"));
      }
      let mut acc = start;
      for v in iterate(&args[0], budget)? {
        budget.poll()?;
        acc = binary_op(BinOp::Add, acc, v, budget)?;
      }
      Ok(acc)
    }
    "sorted" => {
      arity(name, &args, 1, 1)?;
      let items = iterate(&args[0], budget)?;
      Ok(Value::List(sort_values(items, reverse, budget)?))
    }
    "reversed" => {
      arity(name, &args, 1, 1)?;
      if matches!(args[0], Value::Dict(_)) {
        return Err(EvalError::type_err("'dict' object is not reversible"));
      }
      let mut items = iterate(&args[0], budget)?;
      items.reverse();
      Ok(Value::List(items))
    }
    "list" => {
      arity(name, &args, 0, 1)?;
      Ok(Value::List(match args.first() {
        Some(v) => iterate(v, budget)?,
        None => Vec::new(),
      }))
    }
    "tuple" => {
      arity(name, &args, 0, 1)?;
      Ok(Value::Tuple(match args.first() {
        Some(v) => iterate(v, budget)?,
        None => Vec::new(),
      }))
    }
    "dict" => {
      arity(name, &args, 0, 1)?;
      let mut d = Dict::new();
      match args.first() {
        None => {}
        Some(Value::Dict(src)) => {
          budget.charge(args[0].cells())?;
          d = src.clone();
        }
        Some(v) => {
          for (i, pair) in iterate(v, budget)?.into_iter().enumerate() {
            let kv = iterate(&pair, budget).map_err(|_| {
              EvalError::type_err(format!("cannot convert dictionary update sequence element #{i} to a sequence"))
            })?;
            let [k, v]: [Value; 2] = kv.try_into().map_err(|kv: Vec<Value>| {
              EvalError::value(format!(
                "dictionary update sequence element #{i} has length {}; 2 is required",
                kv.len()
              ))
            })?;
            d.insert(k, v)?;
          }
        }
      }
      Ok(Value::Dict(d))
    }
    "range" => {
      arity(name, &args, 1, 3)?;
      let ints = args.iter().map(|v| int_arg(name, v)).collect::<EvalResult<Vec<i64>>>()?;
      let r = match ints.as_slice() {
        [stop] => Range::new(0, *stop, 1)?,
        [start, stop] => Range::new(*start, *stop, 1)?,
        [start, stop, step] => Range::new(*start, *stop, *step)?,
        _ => return Err(EvalError::type_err("range expected at most 3 arguments")),
      };
      Ok(Value::Range(r))
    }
    "enumerate" => {
      arity(name, &args, 1, 2)?;
      let start = match args.get(1) {
        Some(v) => int_arg(name, v)?,
        None => 0,
      };
      let items = iterate(&args[0], budget)?;
      budget.charge(2 * items.len() as u64)?;
      let mut out = Vec::with_capacity(items.len());
      for (i, v) in items.into_iter().enumerate() {
        let n = i64::try_from(i).ok().and_then(|i| start.checked_add(i)).ok_or_else(EvalError::overflow)?;
        out.push(Value::Tuple(vec![Value::Int(n), v]));
      }
      Ok(Value::List(out))
    }
    "zip" => {
      let mut columns = Vec::with_capacity(args.len());
      for v in &args {
        columns.push(iterate(v, budget)?);
      }
      let n = columns.iter().map(Vec::len).min().unwrap_or(0);
      budget.check_len(n)?;
      budget.charge(n as u64 + columns.iter().map(|c| total_cells(&c[..n])).sum::<u64>())?;
      Ok(Value::List(
        (0..n).map(|i| Value::Tuple(columns.iter().map(|c| c[i].clone()).collect())).collect(),
      ))
    }
    "any" => {
      arity(name, &args, 1, 1)?;
      Ok(Value::Bool(iterate(&args[0], budget)?.iter().any(Value::truthy)))
    }
    "all" => {
      arity(name, &args, 1, 1)?;
      Ok(Value::Bool(iterate(&args[0], budget)?.iter().all(Value::truthy)))
    }
    _ => Err(EvalError::name(format!("name '{name}' is not defined"))),
  }
}

/// Stable merge sort with a fallible comparison.
fn sort_values(items: Vec<Value>, reverse: bool, budget: &mut Budget<'_>) -> EvalResult<Vec<Value>> {
  if items.len() <= 1 {
    return Ok(items);
  }
  let mut left = items;
  let right = left.split_off(left.len() / 2);
  let left = sort_values(left, reverse, budget)?;
  let right = sort_values(right, reverse, budget)?;

  let mut out = Vec::with_capacity(left.len() + right.len());
  let mut l = left.into_iter().peekable();
  let mut r = right.into_iter().peekable();
  while let (Some(a), Some(b)) = (l.peek(), r.peek()) {
    budget.poll()?;
    let take_right = if reverse {
      b.py_cmp(a, ">")? == Some(std::cmp::Ordering::Greater)
    } else {
      b.py_cmp(a, "<")? == Some(std::cmp::Ordering::Less)
    };
    let next = if take_right { r.next() } else { l.next() };
    out.extend(next);
  }
  out.extend(l);
  out.extend(r);
  Ok(out)
}

fn str_arg<'v>(method: &str, v: &'v Value) -> EvalResult<&'v str> {
  match v {
    Value::Str(s) => Ok(s),
    other => Err(EvalError::type_err(format!("{method}() argument must be str, not {}", other.type_name()))),
  }
}

fn no_attr(obj: &Value, method: &str) -> EvalError {
  EvalError::attribute(format!("'{}' object has no attribute '{method}'", obj.type_name()))
}

pub fn call_method(obj: &Value, method: &str, args: Vec<Value>, budget: &mut Budget<'_>) -> EvalResult<Value> {
  if method.starts_with('_') {
    return Err(no_attr(obj, method));
  }
  match obj {
    Value::Str(s) => str_method(s, method, args, budget),
    Value::List(items) | Value::Tuple(items) => match method {
      "count" => {
        arity(method, &args, 1, 1)?;
        Ok(Value::Int(items.iter().filter(|v| v.py_eq(&args[0])).count() as i64))
      }
      "index" => {
        arity(method, &args, 1, 1)?;
        items
          .iter()
          .position(|v| v.py_eq(&args[0]))
          .map(|i| Value::Int(i as i64))
          .ok_or_else(|| EvalError::value(format!("{} is not in {}", args[0].repr(), obj.type_name())))
      }
      _ => Err(no_attr(obj, method)),
    },
    Value::Dict(d) => match method {
      "items" => {
        arity(method, &args, 0, 0)?;
        budget.charge(obj.cells() + d.len() as u64)?;
        Ok(Value::List(d.items()))
      }
      "keys" => {
        arity(method, &args, 0, 0)?;
        budget.charge(d.iter().map(|(k, _)| k.cells()).sum::<u64>() + 1)?;
        Ok(Value::List(d.keys()))
      }
      "values" => {
        arity(method, &args, 0, 0)?;
        budget.charge(d.iter().map(|(_, v)| v.cells()).sum::<u64>() + 1)?;
        Ok(Value::List(d.values()))
      }
      "get" => {
        arity(method, &args, 1, 2)?;
        args[0].ensure_hashable()?;
        match d.get(&args[0]) {
          Some(v) => {
            budget.charge(v.cells())?;
            Ok(v.clone())
          }
          None => Ok(args.get(1).cloned().unwrap_or(Value::None)),
        }
      }
      _ => Err(no_attr(obj, method)),
    },
    _ => Err(no_attr(obj, method)),
  }
}

fn has_cased(s: &str) -> bool { s.chars().any(|c| c.is_uppercase() || c.is_lowercase()) }

/// Pay for a list of string parts before it is materialised.
fn charge_parts(parts: &[&str], budget: &mut Budget<'_>) -> EvalResult<()> {
  budget.check_len(parts.len())?;
  budget.charge(parts.iter().map(|p| 1 + p.len() as u64).sum::<u64>() + 1)
}

fn str_method(s: &str, method: &str, args: Vec<Value>, budget: &mut Budget<'_>) -> EvalResult<Value> {
  match method {
    "upper" => {
      arity(method, &args, 0, 0)?;
      budget.charge(s.len() as u64)?;
      Ok(Value::Str(s.to_uppercase()))
    }
    "lower" => {
      arity(method, &args, 0, 0)?;
      budget.charge(s.len() as u64)?;
      Ok(Value::Str(s.to_lowercase()))
    }
    "isupper" => {
      arity(method, &args, 0, 0)?;
      Ok(Value::Bool(has_cased(s) && !s.chars().any(char::is_lowercase)))
    }
    "islower" => {
      arity(method, &args, 0, 0)?;
      Ok(Value::Bool(has_cased(s) && !s.chars().any(char::is_uppercase)))
    }
    "isalpha" => {
      arity(method, &args, 0, 0)?;
      Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)))
    }
    "isdigit" => {
      arity(method, &args, 0, 0)?;
      Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_numeric)))
    }
    "startswith" | "endswith" => {
      arity(method, &args, 1, 1)?;
      let candidates: Vec<&Value> = match &args[0] {
        Value::Tuple(items) => items.iter().collect(),
        v => vec![v],
      };
      let mut hit = false;
      for c in candidates {
        let c = str_arg(method, c)?;
        hit |= if method == "startswith" { s.starts_with(c) } else { s.ends_with(c) };
      }
      Ok(Value::Bool(hit))
    }
    "strip" => {
      arity(method, &args, 0, 1)?;
      budget.charge(s.len() as u64)?;
      match args.first() {
        None | Some(Value::None) => Ok(Value::Str(s.trim().to_string())),
        Some(v) => {
          let set: Vec<char> = str_arg(method, v)?.chars().collect();
          Ok(Value::Str(s.trim_matches(|c: char| set.contains(&c)).to_string()))
        }
      }
    }
    "title" => {
      arity(method, &args, 0, 0)?;
      budget.charge(s.len() as u64)?;
      let mut out = String::with_capacity(s.len());
      let mut prev_cased = false;
      for c in s.chars() {
        if prev_cased {
          out.extend(c.to_lowercase());
        } else {
          out.extend(c.to_uppercase());
        }
        prev_cased = c.is_alphabetic();
      }
      Ok(Value::Str(out))
    }
    "capitalize" => {
      arity(method, &args, 0, 0)?;
      budget.charge(s.len() as u64)?;
      let mut chars = s.chars();
      let out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
      };
      Ok(Value::Str(out))
    }
    "replace" => {
      arity(method, &args, 2, 2)?;
      let old = str_arg(method, &args[0])?;
      let new = str_arg(method, &args[1])?;
      let count = (if old.is_empty() { s.chars().count() + 1 } else { s.matches(old).count() }) as u64;
      let projected = (s.len() as u64 - count * old.len() as u64).saturating_add(count.saturating_mul(new.len() as u64));
      budget.check_len(usize::try_from(projected).unwrap_or(usize::MAX))?;
      budget.charge(projected)?;
      let out = if old.is_empty() {
        let mut out = String::with_capacity(projected as usize);
        out.push_str(new);
        for c in s.chars() {
          budget.poll()?;
          out.push(c);
          out.push_str(new);
        }
        out
      } else {
        s.replace(old, new)
      };
      Ok(Value::Str(out))
    }
    "split" => {
      arity(method, &args, 0, 1)?;
      let parts: Vec<&str> = match args.first() {
        None | Some(Value::None) => s.split_whitespace().collect(),
        Some(v) => {
          let sep = str_arg(method, v)?;
          if sep.is_empty() {
            return Err(EvalError::value("empty separator"));
          }
          s.split(sep).collect()
        }
      };
      charge_parts(&parts, budget)?;
      Ok(Value::List(parts.into_iter().map(Value::from).collect()))
    }
    "join" => {
      arity(method, &args, 1, 1)?;
      let items = iterate(&args[0], budget)?;
      let mut parts = Vec::with_capacity(items.len());
      for (i, v) in items.iter().enumerate() {
        match v {
          Value::Str(p) => parts.push(p.as_str()),
          other => {
            return Err(EvalError::type_err(format!(
              "sequence item {i}: expected str instance, {} found",
              other.type_name()
            )));
          }
        }
      }
      let projected = parts
        .iter()
        .map(|p| p.len() as u64)
        .sum::<u64>()
        .saturating_add((s.len() as u64).saturating_mul(parts.len().saturating_sub(1) as u64));
      budget.check_len(usize::try_from(projected).unwrap_or(usize::MAX))?;
      budget.charge(projected)?;
      Ok(Value::Str(parts.join(s)))
    }
    "count" => {
      arity(method, &args, 1, 1)?;
      let sub = str_arg(method, &args[0])?;
      let n = if sub.is_empty() { s.chars().count() + 1 } else { s.matches(sub).count() };
      Ok(Value::Int(n as i64))
    }
    "find" => {
      arity(method, &args, 1, 1)?;
      let sub = str_arg(method, &args[0])?;
      Ok(Value::Int(match s.find(sub) {
        Some(byte) => s[..byte].chars().count() as i64,
        None => -1,
      }))
    }
    _ => Err(EvalError::attribute(format!("'str' object has no attribute '{method}'"))),
  }
}
