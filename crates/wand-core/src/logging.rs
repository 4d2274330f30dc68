//! Turn log and persistence sinks
//!
//! Every executed turn becomes a [`TurnRecord`] in a hash-chained
//! [`TurnLog`]: each record stores the SHA-256 of its predecessor, so
//! [`TurnLog::verify_integrity`] detects edits and reordering. Records are
//! also forwarded to a [`SessionSink`] for persistence.

use crate::error::LogError;
use crate::types::{SessionId, SessionSummary};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use wand_state::StateMap;

const GENESIS: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// What happened in one turn, before chaining
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDraft {
    /// Raw selection, or the proposal text for an interrupt
    pub choice: String,
    /// Description of the executed unit
    pub unit: String,
    /// Budget after the turn
    pub turns_left: i64,
    /// Whether the turn kept its charge
    pub consumed: bool,
    /// Ran as an accepted interrupt
    pub interrupted: bool,
    /// State after the unit ran
    pub state: StateMap,
}

/// One chained log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Position in the log, from 0
    pub seq: u64,
    /// Owning session
    pub session_id: SessionId,
    /// Raw selection
    pub choice: String,
    /// Executed unit
    pub unit: String,
    /// Budget after the turn
    pub turns_left: i64,
    /// Whether the turn kept its charge
    pub consumed: bool,
    /// Ran as an accepted interrupt
    pub interrupted: bool,
    /// When the record was appended
    pub timestamp: DateTime<Utc>,
    /// State after the unit ran
    pub state: StateMap,
    /// Hex hash of the previous record
    pub prev_hash: String,
    /// Hex hash of this record
    pub hash: String,
}

/// Append-only hash-chained turn log
#[derive(Debug)]
pub struct TurnLog {
    session_id: SessionId,
    inner: Mutex<Vec<TurnRecord>>,
}

impl TurnLog {
    /// Empty log for `session_id`
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            inner: Mutex::default(),
        }
    }

    /// Chain and append a turn
    ///
    /// # Errors
    /// `LogError::Serialize` if the state cannot be hashed.
    pub fn append(&self, draft: TurnDraft) -> Result<TurnRecord, LogError> {
        let mut guard = self.inner.lock();
        let prev_hash = guard
            .last()
            .map_or_else(|| GENESIS.to_string(), |r| r.hash.clone());

        let mut record = TurnRecord {
            seq: guard.len() as u64,
            session_id: self.session_id.clone(),
            choice: draft.choice,
            unit: draft.unit,
            turns_left: draft.turns_left,
            consumed: draft.consumed,
            interrupted: draft.interrupted,
            timestamp: Utc::now(),
            state: draft.state,
            prev_hash,
            hash: String::new(),
        };
        record.hash = compute_hash(&record)?;
        guard.push(record.clone());
        Ok(record)
    }

    /// Copy of all records
    #[must_use]
    pub fn records(&self) -> Vec<TurnRecord> {
        self.inner.lock().clone()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// No records yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Check the hash chain
    ///
    /// # Errors
    /// `LogError::IntegrityViolation` naming the first bad record.
    pub fn verify_integrity(&self) -> Result<(), LogError> {
        verify_chain(&self.inner.lock())
    }

    #[cfg(test)]
    fn tamper(&self, seq: usize, f: impl FnOnce(&mut TurnRecord)) {
        if let Some(r) = self.inner.lock().get_mut(seq) {
            f(r);
        }
    }
}

/// Verify a sequence of records read back from a sink
///
/// # Errors
/// `LogError::IntegrityViolation` naming the first bad record.
pub fn verify_chain(records: &[TurnRecord]) -> Result<(), LogError> {
    let mut prev = GENESIS.to_string();
    for r in records {
        if r.prev_hash != prev || r.hash != compute_hash(r)? {
            return Err(LogError::IntegrityViolation { seq: r.seq });
        }
        prev.clone_from(&r.hash);
    }
    Ok(())
}

fn compute_hash(record: &TurnRecord) -> Result<String, LogError> {
    let mut hasher = Sha256::new();
    hasher.update(record.seq.to_le_bytes());
    hasher.update(record.session_id.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(record.choice.as_bytes());
    hasher.update([0]);
    hasher.update(record.unit.as_bytes());
    hasher.update([0]);
    hasher.update(record.turns_left.to_le_bytes());
    hasher.update([u8::from(record.consumed), u8::from(record.interrupted)]);
    hasher.update(record.timestamp.to_rfc3339().as_bytes());
    hasher.update(serde_json::to_vec(&record.state)?);
    hasher.update(record.prev_hash.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Persistence for turn records and final state
pub trait SessionSink: Send + Sync {
    /// Store one record
    ///
    /// # Errors
    /// Sink-specific I/O or serialization failures.
    fn record_turn(&self, record: &TurnRecord) -> Result<(), LogError>;

    /// Store the final state when the session ends
    ///
    /// # Errors
    /// Sink-specific I/O or serialization failures.
    fn save_final(&self, summary: &SessionSummary, state: &StateMap) -> Result<(), LogError>;
}

/// Final save as stored by sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSave {
    /// Session outcome
    pub summary: SessionSummary,
    /// Last live state
    pub state: StateMap,
}

/// Keeps everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    turns: Mutex<Vec<TurnRecord>>,
    finals: Mutex<Vec<FinalSave>>,
}

impl MemorySink {
    /// Create empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded turns
    #[must_use]
    pub fn turns(&self) -> Vec<TurnRecord> {
        self.turns.lock().clone()
    }

    /// Final saves, one per finished session
    #[must_use]
    pub fn finals(&self) -> Vec<FinalSave> {
        self.finals.lock().clone()
    }
}

impl SessionSink for MemorySink {
    fn record_turn(&self, record: &TurnRecord) -> Result<(), LogError> {
        self.turns.lock().push(record.clone());
        Ok(())
    }

    fn save_final(&self, summary: &SessionSummary, state: &StateMap) -> Result<(), LogError> {
        self.finals.lock().push(FinalSave {
            summary: summary.clone(),
            state: state.clone(),
        });
        Ok(())
    }
}

/// Writes `<id>.jsonl` (one record per line) and `<id>.final.json`
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    dir: PathBuf,
}

impl JsonLinesSink {
    /// Sink writing under `dir`, created if missing
    ///
    /// # Errors
    /// `LogError::Io` if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LogError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the turn file for `id`
    #[must_use]
    pub fn turns_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.jsonl"))
    }

    /// Path of the final save for `id`
    #[must_use]
    pub fn final_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.final.json"))
    }

    /// Read back the turn records for `id`
    ///
    /// # Errors
    /// I/O or decode failures.
    pub fn read_turns(&self, id: &SessionId) -> Result<Vec<TurnRecord>, LogError> {
        read_jsonl(&self.turns_path(id))
    }
}

fn read_jsonl(path: &Path) -> Result<Vec<TurnRecord>, LogError> {
    std::fs::read_to_string(path)?
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(LogError::from))
        .collect()
}

impl SessionSink for JsonLinesSink {
    fn record_turn(&self, record: &TurnRecord) -> Result<(), LogError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.turns_path(&record.session_id))?;
        file.write_all(&line)?;
        Ok(())
    }

    fn save_final(&self, summary: &SessionSummary, state: &StateMap) -> Result<(), LogError> {
        let save = FinalSave {
            summary: summary.clone(),
            state: state.clone(),
        };
        std::fs::write(
            self.final_path(&summary.session_id),
            serde_json::to_vec_pretty(&save)?,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EndReason;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn draft(choice: &str) -> TurnDraft {
        let mut state = StateMap::new();
        state.insert("document".into(), json!(["a", ""]));
        TurnDraft {
            choice: choice.into(),
            unit: "Undo.".into(),
            turns_left: 4,
            consumed: true,
            interrupted: false,
            state,
        }
    }

    #[test]
    fn chain_links_records() {
        let log = TurnLog::new(SessionId::new("s"));
        let a = log.append(draft("1")).unwrap();
        let b = log.append(draft("2")).unwrap();
        assert_eq!(a.prev_hash, GENESIS);
        assert_eq!(b.prev_hash, a.hash);
        assert_eq!(b.seq, 1);
        log.verify_integrity().unwrap();
    }

    #[test]
    fn tampering_is_detected() {
        let log = TurnLog::new(SessionId::new("s"));
        for c in ["1", "2", "3"] {
            log.append(draft(c)).unwrap();
        }
        log.tamper(1, |r| r.turns_left = 99);
        assert!(matches!(
            log.verify_integrity(),
            Err(LogError::IntegrityViolation { seq: 1 })
        ));
    }

    #[test]
    fn jsonl_sink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("logs")).unwrap();
        let id = SessionId::new("abc");
        let log = TurnLog::new(id.clone());
        for c in ["1", "Done"] {
            sink.record_turn(&log.append(draft(c)).unwrap()).unwrap();
        }

        let back = sink.read_turns(&id).unwrap();
        assert_eq!(back, log.records());
        verify_chain(&back).unwrap();

        let summary = SessionSummary {
            session_id: id.clone(),
            reason: EndReason::UserDone,
            turns_left: 3,
            turns_used: 1,
            records: 2,
        };
        sink.save_final(&summary, &StateMap::new()).unwrap();
        let text = std::fs::read_to_string(sink.final_path(&id)).unwrap();
        let save: FinalSave = serde_json::from_str(&text).unwrap();
        assert_eq!(save.summary, summary);
    }
}
