//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Parsing the requested level
//!   - Issuing a question (generate + store + DTO)
//!   - Grading a submission against a stored exercise

use thiserror::Error;
use tracing::{info, instrument};

use crate::config::{AppConfig, DisplayCfg};
use crate::domain::{Exercise, GradingOutcome, Level, LevelOutOfRange};
use crate::expr::{evaluate, EvalLimits};
use crate::protocol::{to_question_out, QuestionOut};
use crate::state::{AppState, IssueError};
use crate::util::clip;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GradeError {
  #[error("Question not found")]
  UnknownExercise(String),
}

/// Interpret the raw `level` parameter. Anything that is not an integer
/// counts as absent; an integer must be in range.
pub fn parse_level(raw: Option<&str>) -> Result<Option<Level>, LevelOutOfRange> {
  match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
    Some(n) => Level::try_from(n).map(Some),
    None => Ok(None),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn new_question(state: &AppState, level: Option<Level>) -> Result<QuestionOut, IssueError> {
  let ex = state.issue_exercise(level).await?;
  info!(target: "exercise", id = %ex.id, level = %ex.level, shape = %ex.shape, "question issued");
  Ok(to_question_out(&ex, &state.config.display))
}

/// Evaluate `code` against the exercise bindings and compare with the
/// stored answer. Never mutates the exercise.
pub fn grade(ex: &Exercise, code: &str, limits: &EvalLimits, display: &DisplayCfg) -> GradingOutcome {
  match evaluate(code, &ex.bindings, limits) {
    Ok(value) => GradingOutcome {
      correct: value == ex.answer,
      user_result: Some(clip(&value.to_display(), display.result_chars)),
      expected: Some(clip(&ex.answer.to_display(), display.result_chars)),
      error: None,
    },
    Err(e) => GradingOutcome { correct: false, user_result: None, expected: None, error: Some(e.to_string()) },
  }
}

#[instrument(level = "info", skip(state, code), fields(%id, code_len = code.len()))]
pub async fn grade_submission(state: &AppState, id: &str, code: &str) -> Result<GradingOutcome, GradeError> {
  let ex = state.get_exercise(id).await.ok_or_else(|| GradeError::UnknownExercise(id.to_string()))?;
  let AppConfig { limits, display, .. } = state.config.clone();
  let code = code.to_string();
  let outcome = tokio::task::spawn_blocking(move || grade(&ex, &code, &limits, &display))
    .await
    .unwrap_or_else(|e| GradingOutcome {
      correct: false,
      user_result: None,
      expected: None,
      error: Some(format!("evaluation aborted: {e}")),
    });
  info!(target: "exercise", %id, correct = outcome.correct, failed = outcome.error.is_some(), "submission graded");
  Ok(outcome)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::InputShape;
  use crate::expr::{Bindings, Value};

  fn squares_exercise() -> Exercise {
    let mut bindings = Bindings::new();
    bindings.insert("nums".into(), Value::from(vec![3_i64, -2, 5]));
    Exercise {
      id: "sq".into(),
      level: Level::ONE,
      template_level: Level::ONE,
      shape: InputShape::IntSequence,
      prompt: "Create a list of the square of each number from 'nums'".into(),
      code: "[x**2 for x in nums]".into(),
      bindings,
      answer: Value::from(vec![9_i64, 4, 25]),
    }
  }

  #[test]
  fn level_parameter_parsing() {
    assert_eq!(parse_level(None), Ok(None));
    assert_eq!(parse_level(Some("abc")), Ok(None));
    assert_eq!(parse_level(Some("4")).map(|l| l.map(Level::get)), Ok(Some(4)));
    assert_eq!(parse_level(Some("0")), Err(LevelOutOfRange(0)));
    assert_eq!(parse_level(Some("9")), Err(LevelOutOfRange(9)));
  }

  #[test]
  fn equivalent_code_is_correct() {
    let ex = squares_exercise();
    let out = grade(&ex, "[n**2 for n in nums]", &EvalLimits::default(), &DisplayCfg::default());
    assert!(out.correct);
    assert_eq!(out.user_result.as_deref(), Some("[9, 4, 25]"));
    assert_eq!(out.expected.as_deref(), Some("[9, 4, 25]"));
  }

  #[test]
  fn wrong_value_is_incorrect_not_an_error() {
    let ex = squares_exercise();
    let out = grade(&ex, "[x * 2 for x in nums]", &EvalLimits::default(), &DisplayCfg::default());
    assert!(!out.correct);
    assert!(out.error.is_none());
    assert_eq!(out.user_result.as_deref(), Some("[6, -4, 10]"));
  }

  #[test]
  fn invalid_code_reports_cause() {
    let ex = squares_exercise();
    let out = grade(&ex, "[for in]", &EvalLimits::default(), &DisplayCfg::default());
    assert!(!out.correct);
    assert!(out.error.as_deref().is_some_and(|e| e.starts_with("SyntaxError")));
  }

  #[test]
  fn results_are_clipped() {
    let ex = squares_exercise();
    let display = DisplayCfg { context_chars: 60, result_chars: 5 };
    let out = grade(&ex, "list(range(50))", &EvalLimits::default(), &display);
    assert_eq!(out.user_result.as_deref(), Some("[0, 1"));
    assert_eq!(out.expected.as_deref(), Some("[9, 4"));
  }

  #[tokio::test]
  async fn grading_is_idempotent_and_unknown_ids_are_rejected() {
    let state = AppState::new(AppConfig::default());
    let ex = state.store.put(squares_exercise()).await.unwrap();
    let first = grade_submission(&state, &ex.id, "[x**2 for x in nums]").await.unwrap();
    let second = grade_submission(&state, &ex.id, "[x**2 for x in nums]").await.unwrap();
    assert_eq!(first, second);
    assert!(first.correct);
    assert_eq!(state.get_exercise(&ex.id).await.unwrap().answer, Value::from(vec![9_i64, 4, 25]));

    let err = grade_submission(&state, "nope", "1").await.unwrap_err();
    assert_eq!(err, GradeError::UnknownExercise("nope".into()));
  }

  #[tokio::test]
  async fn issued_questions_can_be_answered_with_their_reference() {
    let state = AppState::new(AppConfig::default());
    for _ in 0..20 {
      let q = new_question(&state, None).await.unwrap();
      let ex = state.get_exercise(&q.id).await.unwrap();
      let out = grade_submission(&state, &q.id, &ex.code).await.unwrap();
      assert!(out.correct, "{} -> {:?}", ex.code, out);
    }
  }
}
