use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors that can occur while talking to the resolution engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Engine process exited unexpectedly.
    #[error("engine process exited unexpectedly")]
    ProcessDied,

    /// JSON parse error or a response that does not fit the request.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Response parsed, but its content is unusable (e.g. bad verdict token).
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The engine reported an error for the request.
    #[error("engine error: {0}")]
    Engine(String),

    /// IO error from process communication.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Logical connectives that structure a formula but are not subjects.
const CONNECTIVES: &[&str] = &["and", "or", "not", "if", "fif", "bif"];

/// An opaque logical expression as printed by the engine,
/// e.g. `distanceAt(a, 3, T)`.
///
/// Identifiers starting with an uppercase letter or `_` are variables;
/// every other identifier (predicate and function names, constants,
/// numerals) is a constant symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression(String);

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant symbols occurring in the expression, in first-occurrence
    /// order and without duplicates.
    pub fn constants(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for token in self
            .0
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
        {
            let first = token.chars().next().unwrap_or('_');
            if first.is_uppercase() || first == '_' {
                continue;
            }
            if CONNECTIVES.contains(&token) {
                continue;
            }
            if !seen.contains(&token) {
                seen.push(token);
            }
        }
        seen
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A candidate resolution the engine is waiting to prioritize: the positive
/// literal of one clause against the negative literal of another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionTask {
    /// Engine-assigned task identifier.
    pub id: u64,
    /// Positive literal.
    pub left: Expression,
    /// Negative literal.
    pub right: Expression,
}

impl ResolutionTask {
    pub fn new(id: u64, left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            id,
            left: Expression::new(left),
            right: Expression::new(right),
        }
    }

    /// The input pair scored by the prefilter.
    pub fn pair(&self) -> (&Expression, &Expression) {
        (&self.left, &self.right)
    }
}

/// Parse one ground-truth record into a unify verdict.
///
/// A record is a tab-separated token line; the final token carries the
/// verdict (`1`/`true`/`unify` or `0`/`false`/`fail`).
pub fn parse_verdict(record: &str) -> Result<bool, EngineError> {
    let token = record
        .trim_end_matches(['\r', '\n'])
        .split('\t')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .last()
        .ok_or_else(|| EngineError::MalformedResponse("empty ground-truth record".into()))?;

    match token.to_ascii_lowercase().as_str() {
        "1" | "true" | "unify" => Ok(true),
        "0" | "false" | "fail" => Ok(false),
        other => Err(EngineError::MalformedResponse(format!(
            "unrecognized verdict token '{other}' in record '{record}'"
        ))),
    }
}

/// How to launch the engine process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine executable.
    pub program: PathBuf,
    /// Extra arguments passed before the knowledge-base path.
    #[serde(default)]
    pub args: Vec<String>,
    /// Knowledge-base file loaded at startup and on every reset.
    #[serde(default)]
    pub kb_path: Option<PathBuf>,
    /// Working directory for the engine process.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}
