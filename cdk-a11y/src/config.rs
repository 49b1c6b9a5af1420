//! Serializable keyboard navigation settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::typeahead::DEFAULT_TYPEAHEAD_DEBOUNCE_INTERVAL;

/// Horizontal reading direction; decides which arrow key expands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Left to right: Right expands, Left collapses.
    #[default]
    Ltr,
    /// Right to left: Left expands, Right collapses.
    Rtl,
}

/// Keyboard navigation settings a host can load from its own config file.
///
/// ```toml
/// activation_follows_focus = false
/// orientation = "rtl"
/// typeahead_debounce_ms = 300
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyNavConfig {
    /// Activate items as soon as they receive focus.
    pub activation_follows_focus: bool,
    /// Reading direction.
    pub orientation: Orientation,
    /// Typeahead debounce in milliseconds; `None` disables typeahead.
    pub typeahead_debounce_ms: Option<u64>,
}

impl Default for KeyNavConfig {
    fn default() -> Self {
        Self {
            activation_follows_focus: false,
            orientation: Orientation::Ltr,
            typeahead_debounce_ms: Some(DEFAULT_TYPEAHEAD_DEBOUNCE_INTERVAL.as_millis() as u64),
        }
    }
}

impl KeyNavConfig {
    /// The typeahead debounce as a duration.
    pub fn typeahead_debounce(&self) -> Option<Duration> {
        self.typeahead_debounce_ms.map(Duration::from_millis)
    }
}
