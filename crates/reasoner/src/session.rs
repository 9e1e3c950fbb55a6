use std::io::{BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::engine::ReasoningEngine;
use crate::protocol::{EngineRequest, EngineResponse};
use crate::types::{EngineConfig, EngineError, ResolutionTask};

/// A resolution engine running as a child process.
///
/// Communicates via JSON lines over stdin/stdout: one request line, one
/// response line. The session is strictly sequential; there is never more
/// than one request in flight.
pub struct EngineSession {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    requests_handled: u64,
}

impl EngineSession {
    /// Spawn the engine process and wait for its "ready." line.
    ///
    /// Launched as `<program> <args...> [kb_path]`.
    pub fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args);
        if let Some(kb) = &config.kb_path {
            cmd.arg(kb);
        }
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = BufWriter::new(
            child
                .stdin
                .take()
                .ok_or_else(|| EngineError::Protocol("Failed to capture stdin".into()))?,
        );
        let stdout = BufReader::new(
            child
                .stdout
                .take()
                .ok_or_else(|| EngineError::Protocol("Failed to capture stdout".into()))?,
        );

        let mut session = Self {
            child,
            stdin,
            stdout,
            requests_handled: 0,
        };
        session.consume_ready_line()?;

        tracing::debug!(
            program = %config.program.display(),
            kb = ?config.kb_path,
            "Spawned engine session"
        );

        Ok(session)
    }

    fn consume_ready_line(&mut self) -> Result<(), EngineError> {
        let mut line = String::new();
        match self.stdout.read_line(&mut line)? {
            0 => Err(EngineError::ProcessDied),
            _ => {
                let trimmed = line.trim();
                if trimmed != "ready." {
                    tracing::warn!(line = trimmed, "Unexpected first line from engine");
                }
                Ok(())
            }
        }
    }

    /// Number of requests answered since spawn.
    pub fn requests_handled(&self) -> u64 {
        self.requests_handled
    }

    /// Write one JSON line and read one response line.
    fn send_line(&mut self, json: &str) -> Result<String, EngineError> {
        self.stdin.write_all(json.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;

        let mut response_line = String::new();
        match self.stdout.read_line(&mut response_line)? {
            0 => Err(EngineError::ProcessDied),
            _ => {
                self.requests_handled += 1;
                Ok(response_line)
            }
        }
    }

    fn request(&mut self, request: EngineRequest) -> Result<EngineResponse, EngineError> {
        let json = request
            .to_json()
            .map_err(|e| EngineError::Protocol(format!("Serialization error: {e}")))?;
        let line = self.send_line(&json)?;
        match EngineResponse::parse(line.trim())? {
            EngineResponse::Error(msg) => {
                tracing::debug!(cmd = request.name(), error = %msg, "Engine rejected request");
                Err(EngineError::Engine(msg))
            }
            response => Ok(response),
        }
    }

    fn expect_ack(&mut self, request: EngineRequest) -> Result<(), EngineError> {
        let name = request.name();
        match self.request(request)? {
            EngineResponse::Ack => Ok(()),
            other => Err(EngineError::Protocol(format!(
                "Expected ack for {name}, got {other:?}"
            ))),
        }
    }

    /// Kill the child process.
    pub fn shutdown(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        tracing::debug!("Engine session shut down");
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ReasoningEngine for EngineSession {
    fn pending_tasks(&mut self) -> Result<Vec<ResolutionTask>, EngineError> {
        match self.request(EngineRequest::PendingTasks)? {
            EngineResponse::Tasks(tasks) => Ok(tasks),
            other => Err(EngineError::Protocol(format!(
                "Expected tasks from pending_tasks, got {other:?}"
            ))),
        }
    }

    fn ground_truth_labels(&mut self, tasks: &[ResolutionTask]) -> Result<Vec<String>, EngineError> {
        let task_ids = tasks.iter().map(|t| t.id).collect();
        let records = match self.request(EngineRequest::GroundTruth { task_ids })? {
            EngineResponse::Records(records) => records,
            other => {
                return Err(EngineError::Protocol(format!(
                    "Expected records from ground_truth, got {other:?}"
                )))
            }
        };
        if records.len() != tasks.len() {
            return Err(EngineError::MalformedResponse(format!(
                "{} ground-truth records for {} tasks",
                records.len(),
                tasks.len()
            )));
        }
        Ok(records)
    }

    fn set_priorities(&mut self, priorities: &[f64]) -> Result<(), EngineError> {
        self.expect_ack(EngineRequest::SetPriorities {
            priorities: priorities.to_vec(),
        })
    }

    fn promote(&mut self, threshold: f64) -> Result<(), EngineError> {
        self.expect_ack(EngineRequest::Promote { threshold })
    }

    fn step(&mut self) -> Result<(), EngineError> {
        self.expect_ack(EngineRequest::Step)
    }

    fn assert_fact(&mut self, formula: &str) -> Result<(), EngineError> {
        self.expect_ack(EngineRequest::AssertFact {
            formula: formula.to_string(),
        })
    }

    fn knowledge_base(&mut self) -> Result<Vec<String>, EngineError> {
        match self.request(EngineRequest::KnowledgeBase)? {
            EngineResponse::Clauses(clauses) => Ok(clauses),
            other => Err(EngineError::Protocol(format!(
                "Expected clauses from knowledge_base, got {other:?}"
            ))),
        }
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        self.expect_ack(EngineRequest::Reset)
    }
}
