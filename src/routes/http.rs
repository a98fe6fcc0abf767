//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; user code is logged by length only.

use std::sync::Arc;
use axum::{extract::{State, Query}, http::StatusCode, Json, response::{IntoResponse, Response}};
use tracing::{error, info, instrument};

use crate::domain::GradingOutcome;
use crate::logic::{grade_submission, new_question, parse_level};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, exercises: state.store.len().await })
}

#[instrument(level = "info", skip(state), fields(level = ?q.level))]
pub async fn http_get_question(
  State(state): State<Arc<AppState>>,
  Query(q): Query<QuestionQuery>,
) -> Response {
  let level = match parse_level(q.level.as_deref()) {
    Ok(level) => level,
    Err(e) => return (StatusCode::BAD_REQUEST, Json(ErrorOut { error: e.to_string() })).into_response(),
  };
  match new_question(&state, level).await {
    Ok(question) => Json(question).into_response(),
    Err(e) => {
      error!(target: "exercise", error = %e, "HTTP question failed");
      (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorOut { error: e.to_string() })).into_response()
    }
  }
}

#[instrument(level = "info", skip(state, body), fields(id = ?body.id, code_len = body.code.len()))]
pub async fn http_post_check(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CheckIn>,
) -> Response {
  let rejected = |error: String| {
    let outcome = GradingOutcome { correct: false, user_result: None, expected: None, error: Some(error) };
    (StatusCode::BAD_REQUEST, Json(outcome)).into_response()
  };
  let Some(id) = body.id.filter(|id| !id.is_empty()) else {
    return rejected("Question not found".into());
  };
  match grade_submission(&state, &id, &body.code).await {
    Ok(outcome) if outcome.error.is_some() => (StatusCode::BAD_REQUEST, Json(outcome)).into_response(),
    Ok(outcome) => {
      info!(target: "exercise", %id, correct = outcome.correct, "HTTP check evaluated");
      Json(outcome).into_response()
    }
    Err(e) => rejected(e.to_string()),
  }
}
