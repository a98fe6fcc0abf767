//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Field names match what the browser client reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DisplayCfg;
use crate::domain::{Exercise, GradingOutcome, Level};
use crate::util::truncate_display;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    NewQuestion {
        #[serde(default)]
        level: Option<i64>,
    },
    Check {
        id: String,
        code: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Question {
        question: QuestionOut,
    },
    CheckResult(GradingOutcome),
    Error {
        message: String,
    },
}

/// DTO used by both WS and HTTP for exercise delivery. The reference code
/// stays on the server.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub id: String,
    pub level: Level,
    pub prompt: String,
    /// `str()` of each binding, truncated for display.
    pub context_display: BTreeMap<String, String>,
    /// Bindings as JSON with ranges expanded.
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Expected value; a range answer is sent as its `repr()`.
    pub answer: serde_json::Value,
}

/// Convert a stored `Exercise` to the public DTO.
pub fn to_question_out(ex: &Exercise, display: &DisplayCfg) -> QuestionOut {
    let context_display = ex
        .bindings
        .iter()
        .map(|(k, v)| (k.clone(), truncate_display(&v.to_display(), display.context_chars)))
        .collect();
    let context = ex.bindings.iter().map(|(k, v)| (k.clone(), v.to_json(true))).collect();
    QuestionOut {
        id: ex.id.clone(),
        level: ex.level,
        prompt: ex.prompt.clone(),
        context_display,
        context,
        answer: ex.answer.to_json(false),
    }
}

//
// HTTP request/response DTOs
//

/// `level` stays a string so non-numeric input can be treated as absent.
#[derive(Debug, Deserialize)]
pub struct QuestionQuery {
    pub level: Option<String>,
}

#[derive(Deserialize)]
pub struct CheckIn {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub code: String,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub exercises: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InputShape;
    use crate::expr::{Bindings, Range, Value};

    #[test]
    fn question_out_expands_ranges_and_truncates_display() {
        let mut bindings = Bindings::new();
        bindings.insert("i".into(), Value::Range(Range::new(0, 3, 1).unwrap()));
        bindings.insert("words".into(), Value::from(vec!["elephant"; 10]));
        let ex = Exercise {
            id: "q1".into(),
            level: Level::try_from(2).unwrap(),
            template_level: Level::ONE,
            shape: InputShape::Range,
            prompt: "p".into(),
            code: "i".into(),
            bindings,
            answer: Value::Range(Range::new(0, 3, 1).unwrap()),
        };
        let out = serde_json::to_value(to_question_out(&ex, &DisplayCfg::default())).unwrap();
        assert_eq!(out["level"], 2);
        assert_eq!(out["context"]["i"], serde_json::json!([0, 1, 2]));
        assert_eq!(out["context_display"]["i"], "range(0, 3)");
        let shown = out["context_display"]["words"].as_str().unwrap();
        assert!(shown.ends_with("...") && shown.chars().count() == 63, "{shown}");
        assert_eq!(out["answer"], "range(0, 3)");
        assert!(out.get("code").is_none());
    }

    #[test]
    fn ws_messages_are_tagged() {
        let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"new_question"}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::NewQuestion { level: None }));
        let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"check","id":"a","code":"1"}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::Check { .. }));

        let reply = ServerWsMessage::CheckResult(GradingOutcome {
            correct: true,
            user_result: Some("[1]".into()),
            expected: Some("[1]".into()),
            error: None,
        });
        let json = serde_json::to_value(reply).unwrap();
        assert_eq!(json["type"], "check_result");
        assert_eq!(json["correct"], true);
        assert!(json.get("error").is_none());
    }
}
