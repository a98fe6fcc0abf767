//! Random sample data for each input shape.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::InputShape;
use crate::expr::{Dict, Range, Value};

pub const SEQUENCE_LEN: usize = 10;

pub const WORDS: &[&str] = &[
  "apple", "banana", "cat", "dog", "elephant", "frog", "ghost", "house", "ice", "jungle", "kite", "lemon",
];

pub const MAP_KEYS: &[&str] = &["red", "blue", "green", "gold", "silver"];

/// Name and contents of the fixed second sequence used by product exercises.
pub const SECONDARY_VAR: &str = "nums2";

pub fn secondary_sequence() -> Value { Value::from(vec![1_i64, 2, 3]) }

/// Draw one value of the given shape.
pub fn sample<R: Rng + ?Sized>(shape: InputShape, rng: &mut R) -> Value {
  match shape {
    InputShape::IntSequence => {
      Value::List((0..SEQUENCE_LEN).map(|_| Value::Int(rng.gen_range(-10..=50))).collect())
    }
    InputShape::FloatSequence => Value::List(
      (0..SEQUENCE_LEN)
        .map(|_| Value::Float(round2(rng.gen_range(-10.0..=50.0))))
        .collect(),
    ),
    InputShape::WordSequence => Value::List(
      (0..SEQUENCE_LEN)
        .filter_map(|_| WORDS.choose(rng))
        .map(|w| Value::from(*w))
        .collect(),
    ),
    InputShape::KeyedMap => {
      let mut keys = MAP_KEYS.to_vec();
      keys.shuffle(rng);
      let mut dict = Dict::new();
      for key in keys {
        // String keys are always hashable.
        let _ = dict.insert(Value::from(key), Value::Int(rng.gen_range(1..=100)));
      }
      Value::Dict(dict)
    }
    InputShape::Range => {
      let stop = rng.gen_range(5..=15);
      Range::new(0, stop, 1).map(Value::Range).unwrap_or(Value::List(Vec::new()))
    }
  }
}

fn round2(f: f64) -> f64 { (f * 100.0).round() / 100.0 }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn samples_stay_within_bounds() {
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
      match sample(InputShape::IntSequence, &mut rng) {
        Value::List(xs) => {
          assert_eq!(xs.len(), SEQUENCE_LEN);
          assert!(xs.iter().all(|x| matches!(x, Value::Int(n) if (-10..=50).contains(n))));
        }
        other => panic!("unexpected {other:?}"),
      }
      match sample(InputShape::FloatSequence, &mut rng) {
        Value::List(xs) => assert!(xs.iter().all(|x| match x {
          Value::Float(f) => (-10.0..=50.0).contains(f) && (f * 100.0 - (f * 100.0).round()).abs() < 1e-6,
          _ => false,
        })),
        other => panic!("unexpected {other:?}"),
      }
      match sample(InputShape::WordSequence, &mut rng) {
        Value::List(xs) => {
          assert_eq!(xs.len(), SEQUENCE_LEN);
          assert!(xs.iter().all(|w| matches!(w, Value::Str(s) if WORDS.contains(&s.as_str()))));
        }
        other => panic!("unexpected {other:?}"),
      }
      match sample(InputShape::Range, &mut rng) {
        Value::Range(r) => assert!((5..=15).contains(&r.len()) && r.start == 0),
        other => panic!("unexpected {other:?}"),
      }
    }
  }

  #[test]
  fn maps_use_every_key_once() {
    let mut rng = rand::thread_rng();
    let Value::Dict(d) = sample(InputShape::KeyedMap, &mut rng) else { panic!("expected dict") };
    assert_eq!(d.len(), MAP_KEYS.len());
    for key in MAP_KEYS {
      let v = d.get(&Value::from(*key)).expect("key present");
      assert!(matches!(v, Value::Int(n) if (1..=100).contains(n)));
    }
  }
}
