//! The session state store

use crate::error::StateError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Key prefix under which event flags live
pub const EVENT_PREFIX: &str = "event:";

/// Full state mapping; ordered so snapshots serialize deterministically
pub type StateMap = BTreeMap<String, Value>;

/// Key/value state for one session
///
/// Two snapshots are kept: the latest checkpoint and the one before it.
/// `checkpoint()` only rotates them when the live state moved since the
/// latest one, so the loop can checkpoint every iteration and undo still
/// lands on the state before the previous turn.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    live: StateMap,
    committed: Option<StateMap>,
    prior: Option<StateMap>,
}

impl StateStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `initial`
    #[must_use]
    pub fn from_map(initial: StateMap) -> Self {
        Self {
            live: initial,
            ..Self::default()
        }
    }

    /// Raw value for `key`, `None` if never written
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.live.get(key)
    }

    /// Decode the value for `key`
    ///
    /// A stored JSON `null` reads as absent.
    ///
    /// # Errors
    /// `StateError::Decode` if the stored value is not a `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        match self.live.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| StateError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Truthiness of `key`: absent, `null`, `false`, `0` and `""` are false
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        match self.live.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
        }
    }

    /// Write a raw value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.live.insert(key.into(), value.into());
    }

    /// Encode and write a value
    ///
    /// # Errors
    /// `StateError::Encode` if `value` cannot be represented as JSON.
    pub fn set_as<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), StateError> {
        let key = key.into();
        let encoded = serde_json::to_value(value).map_err(|source| StateError::Encode {
            key: key.clone(),
            source,
        })?;
        self.live.insert(key, encoded);
        Ok(())
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.live.remove(key)
    }

    /// Whether `key` has been written
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.live.contains_key(key)
    }

    /// The whole live mapping
    #[inline]
    #[must_use]
    pub fn dump(&self) -> &StateMap {
        &self.live
    }

    /// Take a checkpoint of the live state
    ///
    /// A no-op when nothing changed since the latest checkpoint.
    pub fn checkpoint(&mut self) -> &StateMap {
        if self.committed.as_ref() != Some(&self.live) {
            self.prior = self.committed.take();
            self.committed = Some(self.live.clone());
            debug!(keys = self.live.len(), "state checkpoint taken");
        }
        &self.live
    }

    /// Whether a checkpoint older than the live state exists
    #[must_use]
    pub fn can_undo(&self) -> bool {
        match &self.committed {
            Some(committed) if *committed != self.live => true,
            _ => self.prior.is_some(),
        }
    }

    /// Replace the live state with the most recent checkpoint strictly
    /// older than it
    ///
    /// Both snapshots are dropped afterwards, so a second call without an
    /// intervening [`checkpoint`](Self::checkpoint) returns `false`.
    pub fn restore_last_checkpoint(&mut self) -> bool {
        let target = match self.committed.take() {
            Some(committed) if committed != self.live => Some(committed),
            committed => self.prior.take().or(committed),
        };
        self.prior = None;

        match target {
            Some(snapshot) => {
                debug!(keys = snapshot.len(), "state restored from checkpoint");
                self.live = snapshot;
                true
            }
            None => false,
        }
    }

    /// Raise the event flag `name`
    pub fn trigger_event(&mut self, name: &str) {
        self.live.insert(event_key(name), Value::Bool(true));
    }

    /// Read the event flag `name`, clearing it unless `peek` is set
    pub fn consume_event(&mut self, name: &str, peek: bool) -> bool {
        let key = event_key(name);
        let raised = matches!(self.live.get(&key), Some(Value::Bool(true)));
        if raised && !peek {
            self.live.remove(&key);
        }
        raised
    }

    /// Read the event flag `name` without clearing it
    #[must_use]
    pub fn peek_event(&self, name: &str) -> bool {
        matches!(self.live.get(&event_key(name)), Some(Value::Bool(true)))
    }
}

fn event_key(name: &str) -> String {
    format!("{EVENT_PREFIX}{name}")
}
