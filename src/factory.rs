//! Exercise synthesis.
//!
//! Flow:
//! 1) Pick an input shape and sample data for it.
//! 2) Select registry fragments for the level's template.
//! 3) Render the prompt and the reference code.
//! 4) Evaluate the code to obtain the answer.
//!
//! Attempts are bounded. Keyed-map input drawn for a level that cannot
//! unpack it is re-rolled at the same level; a reference that fails to
//! evaluate drops to level 1. When every attempt is spent a level-1
//! int-sequence exercise is built as the last resort.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{Exercise, InputShape, Level};
use crate::expr::{evaluate, Bindings, EvalError, EvalLimits, Value};
use crate::samples;
use crate::schema::{self, Fragment};
use crate::util::fill_template;

/// Relative weights of levels 1..=6 when the caller does not ask for one.
pub const LEVEL_WEIGHTS: [u32; 6] = [1, 2, 2, 1, 2, 2];

#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("no {table} fragments available for level {level} on {shape}")]
  MissingFragment { table: &'static str, level: Level, shape: InputShape },
  #[error("reference solution failed after {attempts} attempts: {source}")]
  Exhausted { attempts: usize, source: EvalError },
}

/// Prompt and code templates for one level.
struct LevelTemplate {
  prompt: &'static str,
  code: &'static str,
}

const TEMPLATES: [LevelTemplate; 6] = [
  LevelTemplate { prompt: "Create a list of {desc} from '{var}'", code: "[{expr} for {iv} in {src}]" },
  LevelTemplate { prompt: "Find items in '{var}' where {cond_desc}", code: "[{iv} for {iv} in {src} if {cond}]" },
  LevelTemplate { prompt: "From '{var}': {desc}", code: "[{expr} for {iv} in {src}]" },
  LevelTemplate {
    prompt: "Create a list of tuples (x, y) for every x in '{var}' and y in '{other}'",
    code: "[(x, y) for x in {src} for y in {other}]",
  },
  LevelTemplate { prompt: "Create a dict mapping each item in '{var}' to {desc}", code: "{{iv}: {expr} for {iv} in {src}}" },
  LevelTemplate {
    prompt: "Dict of items in '{var}' mapped to {desc}, ONLY IF {cond_desc}",
    code: "{{iv}: {expr} for {iv} in {src} if {cond}}",
  },
];

/// Fragments chosen for one exercise. `projection` is a transform or, at
/// level 3, a conditional.
#[derive(Clone, Copy, Debug, Default)]
pub struct Selection {
  pub projection: Option<Fragment>,
  pub filter: Option<Fragment>,
}

/// A rendered exercise whose answer has not been computed yet.
#[derive(Clone, Debug)]
pub struct Draft {
  pub level: Level,
  pub shape: InputShape,
  pub prompt: String,
  pub code: String,
  pub bindings: Bindings,
}

impl Draft {
  /// Evaluate the reference code and seal the exercise under a fresh id,
  /// reported at the `requested` level.
  pub fn solve(self, requested: Level) -> Result<Exercise, EvalError> {
    let answer = evaluate(&self.code, &self.bindings, &EvalLimits::trusted())?;
    Ok(Exercise {
      id: Uuid::new_v4().to_string(),
      level: requested,
      template_level: self.level,
      shape: self.shape,
      prompt: self.prompt,
      code: self.code,
      bindings: self.bindings,
      answer,
    })
  }
}

pub fn pick_level<R: Rng + ?Sized>(rng: &mut R) -> Level {
  let idx = WeightedIndex::new(LEVEL_WEIGHTS).map(|d| d.sample(rng)).unwrap_or(0);
  Level::try_from(idx as i64 + 1).unwrap_or(Level::ONE)
}

/// Choose fragments for `level` from the tables of `shape`'s operand kind.
pub fn select<R: Rng + ?Sized>(level: Level, shape: InputShape, rng: &mut R) -> Selection {
  let kind = schema::resolve(shape);
  let projection = match level.get() {
    1 | 5 | 6 => schema::transforms_for(kind).choose(rng).copied(),
    3 => schema::conditionals_for(kind).choose(rng).copied(),
    _ => None,
  };
  let filter = match level.get() {
    2 | 6 => schema::filters_for(kind).choose(rng).copied(),
    _ => None,
  };
  Selection { projection, filter }
}

/// Render prompt and reference code for explicit data and fragments.
pub fn compose(level: Level, shape: InputShape, data: Value, selection: &Selection) -> Result<Draft, GenerateError> {
  let lvl = level.get();
  let needs_projection = matches!(lvl, 1 | 3 | 5 | 6);
  let needs_filter = matches!(lvl, 2 | 6);

  let projection = match selection.projection {
    Some(f) => f,
    None if needs_projection => {
      let table = if lvl == 3 { "conditional" } else { "transform" };
      return Err(GenerateError::MissingFragment { table, level, shape });
    }
    None => Fragment { code: "", desc: "" },
  };
  let filter = match selection.filter {
    Some(f) => f,
    None if needs_filter => return Err(GenerateError::MissingFragment { table: "filter", level, shape }),
    None => Fragment { code: "", desc: "" },
  };

  let var = shape.var_name();
  let src = shape.iter_source();
  let pairs = [
    ("var", var),
    ("iv", shape.element_pattern()),
    ("src", src.as_str()),
    ("other", samples::SECONDARY_VAR),
    ("expr", projection.code),
    ("desc", projection.desc),
    ("cond", filter.code),
    ("cond_desc", filter.desc),
  ];
  let tpl = &TEMPLATES[usize::from(lvl - 1)];

  let mut bindings = Bindings::new();
  bindings.insert(var.to_string(), data);
  if lvl == 4 {
    bindings.insert(samples::SECONDARY_VAR.to_string(), samples::secondary_sequence());
  }

  Ok(Draft {
    level,
    shape,
    prompt: fill_template(tpl.prompt, &pairs),
    code: fill_template(tpl.code, &pairs),
    bindings,
  })
}

/// Produce a ready exercise for `level`, within `max_attempts` draws.
pub fn generate(level: Level, max_attempts: usize) -> Result<Exercise, GenerateError> {
  let mut rng = rand::thread_rng();
  let requested = level;
  let mut level = level;

  for attempt in 1..=max_attempts {
    let shape = *InputShape::ALL.choose(&mut rng).unwrap_or(&InputShape::IntSequence);
    if shape == InputShape::KeyedMap && level.excludes_keyed_map() {
      debug!(target: "exercise", %level, attempt, "keyed map drawn for incompatible level; re-rolling");
      continue;
    }

    let selection = select(level, shape, &mut rng);
    let data = samples::sample(shape, &mut rng);
    let draft = compose(level, shape, data, &selection)?;
    match draft.solve(requested) {
      Ok(ex) => {
        info!(target: "exercise", id = %ex.id, %requested, template_level = %ex.template_level, %shape, attempt, "exercise generated");
        return Ok(ex);
      }
      Err(e) => {
        error!(target: "exercise", %level, %shape, error = %e, attempt, "reference failed to evaluate; falling back to level 1");
        level = Level::ONE;
      }
    }
  }

  warn!(target: "exercise", %requested, max_attempts, "attempts exhausted; using int-sequence fallback");
  let shape = InputShape::IntSequence;
  let selection = select(Level::ONE, shape, &mut rng);
  let draft = compose(Level::ONE, shape, samples::sample(shape, &mut rng), &selection)?;
  draft.solve(requested).map_err(|source| GenerateError::Exhausted { attempts: max_attempts, source })
}
