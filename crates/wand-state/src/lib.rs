//! Wand State
//!
//! Flat key/value session state with checkpointing and single-level undo.
//!
//! - Reads of unknown keys return `None`, never an error
//! - Values are `serde_json::Value`, with typed accessors on top
//! - Checkpoints are deep copies of the whole map
//! - Event flags are one-shot booleans stored alongside ordinary keys
//!
//! # Example
//!
//! ```rust
//! use wand_state::StateStore;
//!
//! let mut state = StateStore::new();
//! state.set("did_opening", true);
//! state.checkpoint();
//!
//! state.set("did_opening", false);
//! assert!(state.restore_last_checkpoint());
//! assert_eq!(state.get("did_opening"), Some(&serde_json::Value::Bool(true)));
//! ```

#![warn(unreachable_pub)]

mod error;
mod store;

pub use error::StateError;
pub use store::{StateMap, StateStore, EVENT_PREFIX};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
