//! Scripted position provider for tests and dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{EphemerisError, EphemerisProvider, HorizontalCoordinates, Result};

/// Provider that answers lookups from a prearranged script.
///
/// Each lookup pops the next scripted entry, which may be a position or an
/// error. When the script runs out the provider falls back to a fixed
/// position if one was given, otherwise reports the object as not found.
#[derive(Debug, Default)]
pub struct FixedEphemeris {
    script: Mutex<VecDeque<Result<HorizontalCoordinates>>>,
    fallback: Option<HorizontalCoordinates>,
}

impl FixedEphemeris {
    /// Provider that always answers with `position`.
    pub fn fixed(position: HorizontalCoordinates) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(position),
        }
    }

    /// Provider that plays `script` in order, then has nothing left.
    pub fn with_script<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<HorizontalCoordinates>>,
    {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: None,
        }
    }

    /// Append one entry to the script.
    pub fn push(&self, entry: Result<HorizontalCoordinates>) {
        self.script.lock().unwrap().push_back(entry);
    }

    /// Scripted entries not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl EphemerisProvider for FixedEphemeris {
    fn apparent_position(&self, name: &str) -> Result<HorizontalCoordinates> {
        if let Some(entry) = self.script.lock().unwrap().pop_front() {
            return entry;
        }
        self.fallback.ok_or_else(|| EphemerisError::ObjectNotFound {
            name: name.to_string(),
        })
    }
}
