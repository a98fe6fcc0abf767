//! Domain models: input shapes, operand kinds, difficulty levels, exercises
//! and grading outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expr::{Bindings, Value};

/// Category of generated sample data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputShape {
  IntSequence,
  FloatSequence,
  WordSequence,
  KeyedMap,
  Range,
}

impl InputShape {
  pub const ALL: [InputShape; 5] = [
    InputShape::IntSequence,
    InputShape::FloatSequence,
    InputShape::WordSequence,
    InputShape::KeyedMap,
    InputShape::Range,
  ];

  /// Name the sample data is bound to.
  pub fn var_name(self) -> &'static str {
    match self {
      InputShape::IntSequence => "nums",
      InputShape::FloatSequence => "vals",
      InputShape::WordSequence => "words",
      InputShape::KeyedMap => "data",
      InputShape::Range => "i",
    }
  }

  /// Iteration source inside a comprehension (`data.items()` for maps).
  pub fn iter_source(self) -> String {
    match self {
      InputShape::KeyedMap => format!("{}.items()", self.var_name()),
      _ => self.var_name().to_string(),
    }
  }

  /// Comprehension target; maps unpack into two names.
  pub fn element_pattern(self) -> &'static str {
    match self {
      InputShape::KeyedMap => "k, v",
      _ => "x",
    }
  }
}

impl fmt::Display for InputShape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      InputShape::IntSequence => "list[int]",
      InputShape::FloatSequence => "list[float]",
      InputShape::WordSequence => "list[str]",
      InputShape::KeyedMap => "dict",
      InputShape::Range => "range",
    })
  }
}

/// Element type a schema fragment is written against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandKind {
  Int,
  Str,
  DictItem,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Level must be between 1 and 6")]
pub struct LevelOutOfRange(pub i64);

/// Difficulty 1..=6; each level selects one code-template shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Level(u8);

impl Level {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 6;

  pub const ONE: Level = Level(1);

  pub fn get(self) -> u8 { self.0 }

  pub fn all() -> impl Iterator<Item = Level> { (Self::MIN..=Self::MAX).map(Level) }

  /// Levels whose templates cannot accept a two-name unpack target.
  pub fn excludes_keyed_map(self) -> bool { matches!(self.0, 3 | 5 | 6) }
}

impl TryFrom<i64> for Level {
  type Error = LevelOutOfRange;

  fn try_from(n: i64) -> Result<Self, Self::Error> {
    if (Self::MIN as i64..=Self::MAX as i64).contains(&n) {
      Ok(Level(n as u8))
    } else {
      Err(LevelOutOfRange(n))
    }
  }
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// One generated practice problem. `code` is the reference solution and
/// never leaves the server. `level` is the level the learner asked for;
/// `template_level` differs from it only after a level-1 fallback.
#[derive(Clone, Debug)]
pub struct Exercise {
  pub id: String,
  pub level: Level,
  pub template_level: Level,
  pub shape: InputShape,
  pub prompt: String,
  pub code: String,
  pub bindings: Bindings,
  pub answer: Value,
}

/// Result of grading one submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GradingOutcome {
  pub correct: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_result: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expected: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn level_range_is_inclusive() {
    assert!(Level::try_from(0).is_err());
    assert_eq!(Level::try_from(1).map(Level::get), Ok(1));
    assert_eq!(Level::try_from(6).map(Level::get), Ok(6));
    assert_eq!(Level::try_from(7), Err(LevelOutOfRange(7)));
    assert_eq!(Level::all().count(), 6);
  }

  #[test]
  fn only_maps_unpack_two_names() {
    for shape in InputShape::ALL {
      let pattern = shape.element_pattern();
      assert_eq!(pattern.contains(','), shape == InputShape::KeyedMap, "{shape}");
    }
    assert_eq!(InputShape::KeyedMap.iter_source(), "data.items()");
  }
}
