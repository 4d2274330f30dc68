//! Communication registry
//!
//! Holds the units a session was built with and answers the two per-turn
//! questions: which units may be offered, and which unit wants to
//! interrupt. The unit list is fixed at construction.

use crate::config::UnitsConfig;
use crate::error::ConfigError;
use crate::session::Session;
use crate::units::{filter_by_tags, preset, Communication};
use std::sync::Arc;

/// Sort key for [`CommunicationRegistry::available`]
pub type SortKey = fn(&dyn Communication) -> String;

fn by_description(unit: &dyn Communication) -> String {
    unit.description().to_string()
}

/// Read-only unit list for one session
#[derive(Clone)]
pub struct CommunicationRegistry {
    units: Vec<Arc<dyn Communication>>,
    sort_key: SortKey,
}

impl std::fmt::Debug for CommunicationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.units.iter().map(|u| u.description()))
            .finish()
    }
}

impl CommunicationRegistry {
    /// Registry over `units`, in registration order
    #[must_use]
    pub fn new(units: Vec<Arc<dyn Communication>>) -> Self {
        Self {
            units,
            sort_key: by_description,
        }
    }

    /// Registry for a configured preset and tag filter
    ///
    /// # Errors
    /// `ConfigError::UnknownPreset`.
    pub fn from_config(config: &UnitsConfig) -> Result<Self, ConfigError> {
        let units: Vec<_> = preset(&config.preset)?
            .into_iter()
            .map(|kind| kind.build())
            .collect();
        let units = match &config.filtering_tags {
            Some(tags) => filter_by_tags(units, tags),
            None => units,
        };
        Ok(Self::new(units))
    }

    /// Present available units ordered by `key` instead of description
    #[must_use]
    pub fn with_sort_key(mut self, key: SortKey) -> Self {
        self.sort_key = key;
        self
    }

    /// Every registered unit, in registration order
    #[inline]
    #[must_use]
    pub fn units(&self) -> &[Arc<dyn Communication>] {
        &self.units
    }

    /// Number of registered units
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// No units registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units whose `can_activate` holds, stably sorted by the sort key
    #[must_use]
    pub fn available(&self, session: &Session) -> Vec<Arc<dyn Communication>> {
        let mut units: Vec<_> = self
            .units
            .iter()
            .filter(|u| u.can_activate(session))
            .cloned()
            .collect();
        let key = self.sort_key;
        units.sort_by_cached_key(|u| key(u.as_ref()));
        units
    }

    /// Units with positive interrupt confidence, in registration order
    ///
    /// Confidence is treated as a yes/no signal; callers use the first.
    #[must_use]
    pub fn interrupt_preferred(&self, session: &Session) -> Vec<Arc<dyn Communication>> {
        self.units
            .iter()
            .filter(|u| u.confidence_to_interrupt(session) > 0.0)
            .cloned()
            .collect()
    }
}
