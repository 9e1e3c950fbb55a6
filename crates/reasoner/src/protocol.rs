use serde::{Deserialize, Serialize};

use crate::types::{EngineError, ResolutionTask};

/// A request sent to the engine as one JSON line.
///
/// Wire format: `{"cmd": "<command>", "payload": {<args>}}`; commands
/// without arguments omit the payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd", content = "payload", rename_all = "snake_case")]
pub enum EngineRequest {
    PendingTasks,
    GroundTruth { task_ids: Vec<u64> },
    SetPriorities { priorities: Vec<f64> },
    Promote { threshold: f64 },
    Step,
    AssertFact { formula: String },
    KnowledgeBase,
    Reset,
}

impl EngineRequest {
    /// Command name, used when reporting which call failed.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PendingTasks => "pending_tasks",
            Self::GroundTruth { .. } => "ground_truth",
            Self::SetPriorities { .. } => "set_priorities",
            Self::Promote { .. } => "promote",
            Self::Step => "step",
            Self::AssertFact { .. } => "assert_fact",
            Self::KnowledgeBase => "knowledge_base",
            Self::Reset => "reset",
        }
    }

    /// Serialize to a single JSON line (without the trailing newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Wire format of every response line. Exactly one field is expected to be set;
/// `{"ok": true}` acknowledges commands that return nothing.
#[derive(Debug, Deserialize)]
struct ResponseWire {
    #[serde(default)]
    tasks: Option<Vec<ResolutionTask>>,
    #[serde(default)]
    records: Option<Vec<String>>,
    #[serde(default)]
    clauses: Option<Vec<String>>,
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// A response received from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineResponse {
    /// Reply to `pending_tasks`.
    Tasks(Vec<ResolutionTask>),
    /// Reply to `ground_truth`.
    Records(Vec<String>),
    /// Reply to `knowledge_base`.
    Clauses(Vec<String>),
    /// Acknowledgement for commands without a result.
    Ack,
    /// The engine rejected the request.
    Error(String),
}

impl EngineResponse {
    /// Parse one JSON response line.
    pub fn parse(json: &str) -> Result<Self, EngineError> {
        let wire: ResponseWire = serde_json::from_str(json)
            .map_err(|e| EngineError::Protocol(format!("Invalid JSON: {e}. Raw: {json}")))?;

        if let Some(error) = wire.error {
            return Ok(Self::Error(error));
        }
        if let Some(tasks) = wire.tasks {
            return Ok(Self::Tasks(tasks));
        }
        if let Some(records) = wire.records {
            return Ok(Self::Records(records));
        }
        if let Some(clauses) = wire.clauses {
            return Ok(Self::Clauses(clauses));
        }
        match wire.ok {
            Some(true) => Ok(Self::Ack),
            _ => Err(EngineError::Protocol(format!("Unrecognized response: {json}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_unit_command_has_no_payload() {
        let json = EngineRequest::Step.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["cmd"], "step");
        assert!(parsed.get("payload").is_none());
    }

    #[test]
    fn serialize_set_priorities() {
        let req = EngineRequest::SetPriorities {
            priorities: vec![0.25, 1.0],
        };
        let parsed: serde_json::Value = serde_json::from_str(&req.to_json().unwrap()).unwrap();
        assert_eq!(parsed["cmd"], "set_priorities");
        assert_eq!(parsed["payload"]["priorities"][0], 0.25);
        assert_eq!(parsed["payload"]["priorities"][1], 1.0);
    }

    #[test]
    fn serialize_assert_fact() {
        let req = EngineRequest::AssertFact {
            formula: "distanceAt(a, 3, 0).".to_string(),
        };
        let json = req.to_json().unwrap();
        assert!(json.contains("\"assert_fact\""));
        assert!(json.contains("distanceAt(a, 3, 0)."));
        assert_eq!(req.name(), "assert_fact");
    }

    #[test]
    fn parse_tasks() {
        let json = r#"{"tasks":[{"id":3,"left":"distanceAt(a, 1, 0)","right":"distanceAt(Item1, D1, T)"}]}"#;
        match EngineResponse::parse(json).unwrap() {
            EngineResponse::Tasks(tasks) => {
                assert_eq!(tasks.len(), 1);
                assert_eq!(tasks[0].id, 3);
                assert_eq!(tasks[0].right.as_str(), "distanceAt(Item1, D1, T)");
            }
            other => panic!("Expected Tasks, got {other:?}"),
        }
    }

    #[test]
    fn parse_empty_task_list() {
        assert_eq!(
            EngineResponse::parse(r#"{"tasks":[]}"#).unwrap(),
            EngineResponse::Tasks(vec![])
        );
    }

    #[test]
    fn parse_ack_and_error() {
        assert_eq!(EngineResponse::parse(r#"{"ok":true}"#).unwrap(), EngineResponse::Ack);
        assert_eq!(
            EngineResponse::parse(r#"{"error":"no such task"}"#).unwrap(),
            EngineResponse::Error("no such task".into())
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(EngineResponse::parse("not json {{").is_err());
        assert!(EngineResponse::parse(r#"{"ok":false}"#).is_err());
        assert!(EngineResponse::parse(r#"{}"#).is_err());
    }
}
