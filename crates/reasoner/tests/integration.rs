//! Integration tests for the JSON-lines engine session.
//!
//! A small POSIX shell script stands in for the engine: it prints the
//! "ready." banner and then answers each request line by matching on the
//! command name.

#![cfg(unix)]

use std::io::Write;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::SeedableRng;
use reasoner::{parse_verdict, workload, EngineConfig, EngineError, EngineSession, ReasoningEngine};

const FAKE_ENGINE: &str = r#"
echo ready.
while IFS= read -r line; do
  case "$line" in
    *'"pending_tasks"'*) printf '%s\n' '{"tasks":[{"id":1,"left":"distanceAt(a, 1, 0)","right":"distanceAt(Item1, D1, T)"},{"id":2,"left":"distanceAt(b, 4, 0)","right":"distanceBetweenBoundedBy(D1, a, b, T)"}]}' ;;
    *'"ground_truth"'*) printf '%s\n' '{"records":["distanceAt(a, 1, 0)\tdistanceAt(Item1, D1, T)\t1","distanceAt(b, 4, 0)\tdistanceBetweenBoundedBy(D1, a, b, T)\t0"]}' ;;
    *'"knowledge_base"'*) printf '%s\n' '{"clauses":["0: distanceAt(a, 1, 0)","1: distanceBetweenBoundedBy(1, a, b, 0)"]}' ;;
    *'"promote"'*) printf '%s\n' '{"error":"threshold rejected"}' ;;
    *) printf '%s\n' '{"ok":true}' ;;
  esac
done
"#;

const DYING_ENGINE: &str = "echo ready.\nread line\nexit 0\n";

fn script_config(dir: &tempfile::TempDir, body: &str) -> EngineConfig {
    let path: PathBuf = dir.path().join("engine.sh");
    let mut file = std::fs::File::create(&path).expect("create script");
    file.write_all(body.as_bytes()).expect("write script");
    EngineConfig {
        program: PathBuf::from("sh"),
        args: vec![path.to_string_lossy().into_owned()],
        kb_path: None,
        working_dir: Some(dir.path().to_path_buf()),
    }
}

#[test]
fn test_session_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = EngineSession::spawn(&script_config(&dir, FAKE_ENGINE)).unwrap();

    let tasks = session.pending_tasks().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1].left.as_str(), "distanceAt(b, 4, 0)");

    let records = session.ground_truth_labels(&tasks).unwrap();
    let verdicts: Vec<bool> = records.iter().map(|r| parse_verdict(r).unwrap()).collect();
    assert_eq!(verdicts, vec![true, false]);

    session.set_priorities(&[0.5, 0.9]).unwrap();
    session.step().unwrap();
    session.assert_fact("distanceAt(a, 3, 1).").unwrap();
    session.reset().unwrap();

    let kb = session.knowledge_base().unwrap();
    assert!(kb.iter().any(|c| c.contains("distanceBetweenBoundedBy")));

    assert_eq!(session.requests_handled(), 7);
}

#[test]
fn test_engine_error_is_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = EngineSession::spawn(&script_config(&dir, FAKE_ENGINE)).unwrap();

    match session.promote(1.0) {
        Err(EngineError::Engine(msg)) => assert_eq!(msg, "threshold rejected"),
        other => panic!("Expected engine error, got {other:?}"),
    }
    // The session stays usable after a rejected request.
    session.step().unwrap();
}

#[test]
fn test_record_count_mismatch_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = EngineSession::spawn(&script_config(&dir, FAKE_ENGINE)).unwrap();
    let tasks = session.pending_tasks().unwrap();

    let err = session.ground_truth_labels(&tasks[..1]).unwrap_err();
    assert!(matches!(err, EngineError::MalformedResponse(_)), "got {err:?}");
}

#[test]
fn test_dead_engine_reports_process_died() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = EngineSession::spawn(&script_config(&dir, DYING_ENGINE)).unwrap();

    let err = session.pending_tasks().unwrap_err();
    assert!(matches!(err, EngineError::ProcessDied), "got {err:?}");
}

#[test]
fn test_explosion_against_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = EngineSession::spawn(&script_config(&dir, FAKE_ENGINE)).unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    let pending = workload::explosion(&mut session, 4, 10, &mut rng).unwrap();
    assert_eq!(pending.len(), 2);
    // 2 facts + pending_tasks + step per explosion step
    assert_eq!(session.requests_handled(), 16);
}
